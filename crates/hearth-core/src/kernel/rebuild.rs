use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::kernel::constants;
use crate::kernel::error::{Error, Result};
use crate::site::Settings;

type HmacSha256 = Hmac<Sha256>;

/// `timestamp` and `token` query parameters of a signed rebuild link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildToken {
    pub timestamp: u64,
    /// URL-safe base64 HMAC-SHA256 of the timestamp, keyed by the hash salt
    pub token: String,
}

impl RebuildToken {
    /// Sign `timestamp` with the site's hash salt
    pub fn sign(hash_salt: &str, timestamp: u64) -> Result<Self> {
        let mut mac = HmacSha256::new_from_slice(hash_salt.as_bytes())
            .map_err(|e| Error::Other(format!("Unusable hash salt: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        Ok(Self {
            timestamp,
            token: URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()),
        })
    }

    /// Pull the token out of a query string. `None` unless both parameters
    /// are present and the timestamp is numeric.
    pub fn from_query(query: &str) -> Option<Self> {
        let mut timestamp = None;
        let mut token = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "timestamp" => timestamp = value.parse().ok(),
                "token" => token = Some(value.into_owned()),
                _ => {}
            }
        }
        Some(Self {
            timestamp: timestamp?,
            token: token?,
        })
    }

    /// Query string carrying this token
    pub fn to_query(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("timestamp", &self.timestamp.to_string())
            .append_pair("token", &self.token)
            .finish()
    }

    /// Signed with `hash_salt`, not from the future and at most
    /// [`constants::REBUILD_TOKEN_LIFETIME`] seconds old at `now`
    pub fn verify(&self, hash_salt: &str, now: u64) -> bool {
        if self.timestamp > now || now - self.timestamp > constants::REBUILD_TOKEN_LIFETIME {
            return false;
        }
        let Ok(signature) = URL_SAFE_NO_PAD.decode(&self.token) else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(hash_salt.as_bytes()) else {
            return false;
        };
        mac.update(self.timestamp.to_string().as_bytes());
        mac.verify_slice(&signature).is_ok()
    }
}

/// A rebuild may run when `rebuild_access` is on or the query carries a
/// valid signed token
pub fn rebuild_allowed(settings: &Settings, query: Option<&str>, now: u64) -> bool {
    if settings.is_enabled("rebuild_access") {
        return true;
    }
    let Some(token) = query.and_then(RebuildToken::from_query) else {
        return false;
    };
    match settings.hash_salt() {
        Ok(salt) => token.verify(&salt, now),
        Err(e) => {
            log::warn!("Rejecting signed rebuild request: {}", e);
            false
        }
    }
}

/// Seconds since the Unix epoch
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
