//! Common-log-format access lines.

use std::net::IpAddr;

use chrono::{DateTime, Local, TimeZone};

use crate::event::AnalyticsEvent;

/// Tracing target access lines are written to.
pub const ACCESS_LOG_TARGET: &str = "duplex::access";

/// Fields of one access line.
///
/// Format:
/// `ip sessionId username [timestamp] "METHOD url HTTP/version" statusCode - "referer" "userAgent"`
/// with `-` for anything missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccessRecord {
    pub ip: Option<IpAddr>,
    pub session_id: Option<String>,
    pub username: Option<String>,
    pub method: Option<String>,
    pub url: Option<String>,
    pub http_version: String,
    pub status_code: Option<u16>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

impl AccessRecord {
    /// Access record for an event delivered in-process.
    pub fn from_event(event: &AnalyticsEvent) -> Self {
        Self {
            ip: event.origin.ip,
            session_id: event.session_id.clone(),
            username: event.origin.username.clone(),
            method: Some(event.method.clone()),
            url: Some(event.url.clone()),
            http_version: event.origin.http_version.clone(),
            status_code: Some(event.status_code),
            referer: event.referer.clone(),
            user_agent: event.origin.user_agent.clone(),
        }
    }

    /// Format with an explicit timestamp.
    pub fn format_at<Tz>(&self, timestamp: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let ip = self.ip.map(|ip| ip.to_string());
        let status = self.status_code.map(|s| s.to_string());
        let method = self
            .method
            .as_deref()
            .map(str::to_ascii_uppercase)
            .unwrap_or_else(|| "-".to_string());
        let version = if self.http_version.is_empty() {
            "1.1"
        } else {
            self.http_version.as_str()
        };

        format!(
            "{} {} {} [{}] \"{} {} HTTP/{}\" {} - \"{}\" \"{}\"",
            dash(ip.as_deref()),
            dash(self.session_id.as_deref()),
            dash(self.username.as_deref()),
            timestamp.format("%d/%b/%Y:%H:%M:%S %z"),
            method,
            dash(self.url.as_deref()),
            version,
            dash(status.as_deref()),
            dash(self.referer.as_deref()),
            dash(self.user_agent.as_deref()),
        )
    }

    /// Format with the current local time and write to the access target.
    pub fn log(&self) -> String {
        let line = self.format_at(&Local::now());
        tracing::info!(target: ACCESS_LOG_TARGET, "{}", line);
        line
    }
}

fn dash(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "-",
    }
}
