use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::kernel::error::{Error, Result};

fn host_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[?(?:[a-zA-Z0-9\-:\]_]+\.?)+$").expect("host regex must compile"))
}

/// An inbound HTTP request, as far as the kernel needs to see it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: String,
    host: String,
    uri: String,
    script_name: String,
    is_https: bool,
    server_protocol: String,
    headers: BTreeMap<String, String>,
    cookies: BTreeMap<String, String>,
}

impl Request {
    /// Request for `uri` (path plus optional query) on `localhost`
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            host: "localhost".to_string(),
            uri: uri.into(),
            script_name: "/index.php".to_string(),
            is_https: false,
            server_protocol: "HTTP/1.1".to_string(),
            headers: BTreeMap::new(),
            cookies: BTreeMap::new(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new("GET", uri)
    }

    /// Host header value, optionally with a port
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Path of the front controller script that received the request
    pub fn with_script_name(mut self, script_name: impl Into<String>) -> Self {
        self.script_name = script_name.into();
        self
    }

    pub fn with_https(mut self, is_https: bool) -> Self {
        self.is_https = is_https;
        self
    }

    pub fn with_server_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.server_protocol = protocol.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        self.with_header("user-agent", user_agent)
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Raw host header including any port
    pub fn http_host(&self) -> &str {
        &self.host
    }

    /// Lowercased host without port
    pub fn host(&self) -> String {
        let host = self.host.trim_end_matches('.');
        let without_port = if host.starts_with('[') {
            // IPv6 literal: keep up to the closing bracket
            match host.find(']') {
                Some(end) => &host[..=end],
                None => host,
            }
        } else {
            host.split(':').next().unwrap_or(host)
        };
        without_port.to_ascii_lowercase()
    }

    pub fn port(&self) -> u16 {
        let explicit = if self.host.starts_with('[') {
            self.host.rsplit_once("]:").map(|(_, port)| port)
        } else {
            self.host.rsplit_once(':').map(|(_, port)| port)
        };
        explicit
            .and_then(|port| port.parse().ok())
            .unwrap_or(if self.is_https { 443 } else { 80 })
    }

    pub fn scheme(&self) -> &'static str {
        if self.is_https { "https" } else { "http" }
    }

    pub fn is_https(&self) -> bool {
        self.is_https
    }

    /// `scheme://host[:port]`, port omitted when it is the scheme default
    pub fn scheme_and_http_host(&self) -> String {
        let port = self.port();
        let default_port = if self.is_https { 443 } else { 80 };
        if port == default_port {
            format!("{}://{}", self.scheme(), self.host())
        } else {
            format!("{}://{}:{}", self.scheme(), self.host(), port)
        }
    }

    /// Request URI including any query string
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Request URI without the query string
    pub fn path(&self) -> &str {
        self.uri.split_once('?').map(|(path, _)| path).unwrap_or(&self.uri)
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn server_protocol(&self) -> &str {
        &self.server_protocol
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn has_cookie(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    pub fn cookies(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// GET and HEAD responses may be served from a cache
    pub fn is_method_cacheable(&self) -> bool {
        matches!(self.method.as_str(), "GET" | "HEAD")
    }
}

/// Reject host headers that could not have come from a well-behaved client.
///
/// Bounds the total length and the number of labels and colons, then checks
/// the character set.
pub fn validate_host(host: &str) -> Result<()> {
    let valid = !host.is_empty()
        && host.len() <= 1000
        && host.matches('.').count() <= 100
        && host.matches(':').count() <= 100
        && host_re().is_match(host);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidHost { host: host.to_string() })
    }
}
