use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::storage::ConfigStorage;

const DEFAULT_PROTOCOLS: [&str; 2] = ["http", "https"];

/// URL schemes links may use
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPolicy {
    allowed: Vec<String>,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PROTOCOLS)
    }
}

impl UrlPolicy {
    pub fn new<I, S>(protocols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: protocols.into_iter().map(|p| p.into().to_ascii_lowercase()).collect(),
        }
    }

    /// `protocols` of `system.filter`, or http/https when the configuration
    /// is missing or unreadable (e.g. during install)
    pub fn from_config(storage: &dyn ConfigStorage) -> Result<Self> {
        let configured = storage
            .read(constants::CONFIG_FILTER)?
            .and_then(|data| data.get::<Vec<String>>("protocols"));
        Ok(match configured {
            Some(protocols) if !protocols.is_empty() => Self::new(protocols),
            _ => Self::default(),
        })
    }

    pub fn allowed_protocols(&self) -> &[String] {
        &self.allowed
    }

    pub fn allows(&self, protocol: &str) -> bool {
        self.allowed.iter().any(|allowed| allowed.eq_ignore_ascii_case(protocol))
    }

    /// Remove disallowed scheme prefixes until what is left starts with an
    /// allowed scheme or none at all. `javascript:alert(1)` becomes
    /// `alert(1)`.
    pub fn strip_dangerous_protocols(&self, uri: &str) -> String {
        let mut uri = uri.to_string();
        loop {
            let Some(colon) = uri.find(':') else {
                return uri;
            };
            let first_delimiter = uri.find(['/', '?', '#']);
            if first_delimiter.is_some_and(|delimiter| delimiter < colon) {
                return uri;
            }
            if self.allows(&uri[..colon]) {
                return uri;
            }
            uri = uri[colon + 1..].to_string();
        }
    }
}
