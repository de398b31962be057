//! Rate-limit headers of a chat completion response.

use std::time::Duration;

use reqwest::header::HeaderMap;

pub const HEADER_LIMIT_REQUESTS: &str = "x-ratelimit-limit-requests";
pub const HEADER_LIMIT_TOKENS: &str = "x-ratelimit-limit-tokens";
pub const HEADER_REMAINING_REQUESTS: &str = "x-ratelimit-remaining-requests";
pub const HEADER_REMAINING_TOKENS: &str = "x-ratelimit-remaining-tokens";
pub const HEADER_RESET_REQUESTS: &str = "x-ratelimit-reset-requests";
pub const HEADER_RESET_TOKENS: &str = "x-ratelimit-reset-tokens";

/// Rate-limit counters read from response headers.
///
/// Missing or malformed counters read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub limit_requests: u64,
    pub limit_tokens: u64,
    pub remaining_requests: u64,
    pub remaining_tokens: u64,
    pub reset_requests: ResetTime,
    pub reset_tokens: ResetTime,
}

impl RateLimitHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            limit_requests: header_u64(headers, HEADER_LIMIT_REQUESTS),
            limit_tokens: header_u64(headers, HEADER_LIMIT_TOKENS),
            remaining_requests: header_u64(headers, HEADER_REMAINING_REQUESTS),
            remaining_tokens: header_u64(headers, HEADER_REMAINING_TOKENS),
            reset_requests: ResetTime::new(header_str(headers, HEADER_RESET_REQUESTS)),
            reset_tokens: ResetTime::new(header_str(headers, HEADER_RESET_TOKENS)),
        }
    }
}

/// Reset interval as sent by the server, e.g. `6m0s` or `20ms`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetTime(String);

impl ResetTime {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn duration(&self) -> Option<Duration> {
        parse_duration(&self.0)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or("")
}

fn header_u64(headers: &HeaderMap, name: &str) -> u64 {
    header_str(headers, name).parse().unwrap_or(0)
}

/// Parse a sequence of `<number><unit>` terms (`h`, `m`, `s`, `ms`, `us`, `µs`, `ns`).
fn parse_duration(input: &str) -> Option<Duration> {
    let mut rest = input.trim();
    if rest.is_empty() {
        return None;
    }
    if rest == "0" {
        return Some(Duration::ZERO);
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return None;
        }
        let number: f64 = rest[..number_len].parse().ok()?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "h" => 3_600e9,
            "m" => 60e9,
            "s" => 1e9,
            "ms" => 1e6,
            "us" | "µs" => 1e3,
            "ns" => 1.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total_nanos += number * scale;
    }

    Some(Duration::from_nanos(total_nanos.round() as u64))
}
