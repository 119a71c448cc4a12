//! Node list parsing

use crate::proxy::models::{Proxy, ProxyType};
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

/// `[scheme://][user:pass@]host:port[:user:pass]`
static NODE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<scheme>[A-Za-z0-9]+)://)?(?:(?P<user>[^:@/]+):(?P<pass>[^@/]+)@)?(?P<host>[^:@/\s]+):(?P<port>\d{1,5})(?::(?P<tuser>[^:]+):(?P<tpass>[^:]+))?/?$",
    )
    .expect("Invalid node regex")
});

/// Parser for plain-text node lists
pub struct ProxyParser;

impl ProxyParser {
    /// Parse one line.
    ///
    /// Accepts `IP:PORT`, `IP:PORT:USER:PASS`, `USER:PASS@IP:PORT` and the
    /// `scheme://` forms of those. A trailing `#name` is ignored, as are
    /// blank lines and `#` comments.
    pub fn parse_line(line: &str, default_type: ProxyType) -> Option<Proxy> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let line = line.split('#').next().unwrap_or_default().trim();

        let caps = NODE_REGEX.captures(line)?;
        let proxy_type = match caps.name("scheme") {
            Some(scheme) => ProxyType::from_scheme(scheme.as_str())?,
            None => default_type,
        };
        let port: u16 = caps["port"].parse().ok()?;
        let proxy = Proxy::new(&caps["host"], port, proxy_type);

        let credentials = caps
            .name("user")
            .zip(caps.name("pass"))
            .or_else(|| caps.name("tuser").zip(caps.name("tpass")));

        Some(match credentials {
            Some((user, pass)) => proxy.with_credentials(user.as_str(), pass.as_str()),
            None => proxy,
        })
    }

    /// Parse every recognizable line of `content`
    pub fn parse_string(content: &str, default_type: ProxyType) -> Vec<Proxy> {
        content
            .lines()
            .filter_map(|line| Self::parse_line(line, default_type))
            .collect()
    }

    pub fn parse_file<P: AsRef<Path>>(path: P, default_type: ProxyType) -> Result<Vec<Proxy>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse_string(&content, default_type))
    }
}
