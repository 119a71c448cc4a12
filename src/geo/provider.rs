//! Geo-IP providers and their response normalizers

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::USER_AGENT, Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::geo::user_agent::UserAgent;
use crate::geo::GeoResult;

/// UA the `me` service allow-lists
const SUBCHECK_USER_AGENT: &str = "subs-check (https://github.com/beck-8/subs-check)";

/// UA expected by the curated proxy endpoint
const CURL_USER_AGENT: &str = "curl/8.7.1";

/// A service that reports the caller's egress IP and country
#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Look up the egress location of `client`.
    ///
    /// Never fails: any problem yields an unresolved result.
    async fn locate(&self, client: &Client, timeout: Duration) -> GeoResult;
}

/// Why a provider body was rejected
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("provider status {status:?}: {message}")]
    Status { status: String, message: String },
}

/// Normalizes one provider's body into a `GeoResult`
pub type ParseFn = fn(&[u8]) -> Result<GeoResult, ParseError>;

/// Plain `GET` provider with a provider-specific parser
#[derive(Clone)]
pub struct HttpGeoProvider {
    name: &'static str,
    url: String,
    user_agent: UserAgent,
    parse: ParseFn,
}

impl HttpGeoProvider {
    pub fn new(name: &'static str, url: impl Into<String>, user_agent: UserAgent, parse: ParseFn) -> Self {
        Self {
            name,
            url: url.into(),
            user_agent,
            parse,
        }
    }
}

#[async_trait]
impl GeoProvider for HttpGeoProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn locate(&self, client: &Client, timeout: Duration) -> GeoResult {
        let request = client
            .get(&self.url)
            .timeout(timeout)
            .header(USER_AGENT, self.user_agent.value());

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(provider = self.name, "Geo request failed: {}", e);
                return GeoResult::default();
            }
        };

        if response.status() != StatusCode::OK {
            debug!(provider = self.name, status = %response.status(), "Geo provider returned non-200");
            return GeoResult::default();
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                debug!(provider = self.name, "Reading geo response failed: {}", e);
                return GeoResult::default();
            }
        };

        match (self.parse)(&body) {
            Ok(geo) => geo,
            Err(e) => {
                debug!(provider = self.name, "Rejected geo response: {}", e);
                GeoResult::default()
            }
        }
    }
}

/// `{"ip": "...", "country_code": "..."}`
pub fn parse_flat(body: &[u8]) -> Result<GeoResult, ParseError> {
    #[derive(Deserialize)]
    struct Flat {
        #[serde(default)]
        ip: String,
        #[serde(default)]
        country_code: String,
    }

    let flat: Flat = serde_json::from_slice(body)?;
    Ok(GeoResult::new(flat.country_code, flat.ip))
}

/// ip-api.com: `{"query", "countryCode", "status", "message"}`, gated on `status == "success"`
pub fn parse_ip_api(body: &[u8]) -> Result<GeoResult, ParseError> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct IpApi {
        #[serde(default)]
        query: String,
        #[serde(default)]
        country_code: String,
        #[serde(default)]
        status: String,
        #[serde(default)]
        message: String,
    }

    let data: IpApi = serde_json::from_slice(body)?;
    if data.status != "success" {
        return Err(ParseError::Status {
            status: data.status,
            message: data.message,
        });
    }
    Ok(GeoResult::new(data.country_code, data.query))
}

/// EdgeOne: `{"eo": {"geo": {"countryCodeAlpha2"}, "clientIp"}}`
pub fn parse_edgeone(body: &[u8]) -> Result<GeoResult, ParseError> {
    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    struct Geo {
        #[serde(default)]
        country_code_alpha2: String,
    }

    #[derive(Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    struct Eo {
        #[serde(default)]
        geo: Geo,
        #[serde(default)]
        client_ip: String,
    }

    #[derive(Deserialize)]
    struct Envelope {
        #[serde(default)]
        eo: Eo,
    }

    let envelope: Envelope = serde_json::from_slice(body)?;
    Ok(GeoResult::new(
        envelope.eo.geo.country_code_alpha2,
        envelope.eo.client_ip,
    ))
}

/// Cloudflare trace: newline separated `key=value` pairs with `loc=` and `ip=`
pub fn parse_cf_trace(body: &[u8]) -> Result<GeoResult, ParseError> {
    let text = String::from_utf8_lossy(body);
    let mut geo = GeoResult::default();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(loc) = line.strip_prefix("loc=") {
            geo.country_code = loc.to_string();
        } else if let Some(ip) = line.strip_prefix("ip=") {
            geo.ip = ip.to_string();
        }
    }

    Ok(geo)
}

/// Providers in priority order
pub fn default_providers() -> Vec<HttpGeoProvider> {
    vec![
        HttpGeoProvider::new(
            "me",
            "https://ip.122911.xyz/api/ipinfo",
            UserAgent::Fixed(SUBCHECK_USER_AGENT),
            parse_flat,
        ),
        HttpGeoProvider::new(
            "iplark",
            "https://f3bca0e28e6b.aapq.net/ipapi/ipcat",
            UserAgent::Fixed(CURL_USER_AGENT),
            parse_flat,
        ),
        HttpGeoProvider::new("ipapi.co", "https://ipapi.co/json", UserAgent::Random, parse_flat),
        HttpGeoProvider::new(
            "ip-api",
            "http://ip-api.com/json/?fields=status,message,countryCode,query",
            UserAgent::Random,
            parse_ip_api,
        ),
        HttpGeoProvider::new(
            "cloudflare",
            "https://www.cloudflare.com/cdn-cgi/trace",
            UserAgent::Random,
            parse_cf_trace,
        ),
        // Least accurate of the set
        HttpGeoProvider::new(
            "edgeone",
            "https://functions-geolocation.edgeone.app/geo",
            UserAgent::Random,
            parse_edgeone,
        ),
    ]
}
