//! Overwrite URL rewriting: date placeholders and GitHub raw proxying

use chrono::Datelike;

const GITHUB_RAW_PREFIX: &str = "https://raw.githubusercontent.com";

/// Expand date placeholders in `template`, then route GitHub raw URLs through `github_proxy`.
///
/// Supported placeholders:
/// - `{Y}` - four digit year (2024)
/// - `{m}` - two digit month (01-12)
/// - `{d}` - two digit day (01-31)
/// - `{Ymd}` - 20240307
/// - `{Y_m_d}` - 2024_03_07
/// - `{Y-m-d}` - 2024-03-07
///
/// Anything else in braces is left untouched.
pub fn rewrite<D: Datelike>(template: &str, now: &D, github_proxy: &str) -> String {
    let url = format_time_placeholders(template, now);
    if url.starts_with(GITHUB_RAW_PREFIX) {
        format!("{}{}", github_proxy, url)
    } else {
        url
    }
}

fn format_time_placeholders<D: Datelike>(template: &str, now: &D) -> String {
    let year = format!("{:04}", now.year());
    let month = format!("{:02}", now.month());
    let day = format!("{:02}", now.day());

    [
        ("{Y}", year.clone()),
        ("{m}", month.clone()),
        ("{d}", day.clone()),
        ("{Ymd}", format!("{year}{month}{day}")),
        ("{Y_m_d}", format!("{year}_{month}_{day}")),
        ("{Y-m-d}", format!("{year}-{month}-{day}")),
    ]
    .iter()
    .fold(template.to_string(), |url, (token, value)| {
        url.replace(token, value)
    })
}
