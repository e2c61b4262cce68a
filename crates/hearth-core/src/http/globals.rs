use sha2::{Digest, Sha256};
use url::Url;

use crate::http::request::Request;
use crate::kernel::error::{Error, Result};

/// Request-derived values legacy code expects to find: base URL and path,
/// cookie domain and session cookie name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestGlobals {
    /// Absolute URL of the installation, no trailing slash
    pub base_url: String,
    /// Path of the installation below the host, with a trailing slash
    pub base_path: String,
    /// Scheme and host part of `base_url`
    pub base_root: String,
    pub base_secure_url: String,
    pub base_insecure_url: String,
    /// Front controller segment to put in generated URLs, empty for clean URLs
    pub script_path: String,
    /// Domain session cookies are scoped to, absent for hosts that cannot
    /// carry one (single-label hosts, IP addresses)
    pub cookie_domain: Option<String>,
    /// Session cookie name, `SESS…` or `SSESS…` over HTTPS
    pub session_name: String,
}

impl RequestGlobals {
    /// Derive the globals from a request and the optional `base_url` and
    /// `cookie_domain` overrides of the site bootstrap file
    pub fn from_request(request: &Request, base_url: Option<&str>, cookie_domain: Option<&str>) -> Result<Self> {
        let (base_url, base_path, base_root) = match base_url {
            Some(configured) => split_base_url(configured)?,
            None => derive_base_url(request),
        };
        let base_secure_url = base_url.replacen("http://", "https://", 1);
        let base_insecure_url = base_url.replacen("https://", "http://", 1);
        let script_path = script_path(request, &base_path);

        let (session_seed, raw_domain) = match cookie_domain {
            Some(domain) => (domain.to_string(), domain.to_string()),
            None => {
                let seed = base_url
                    .split_once("://")
                    .map(|(_, rest)| rest.to_string())
                    .unwrap_or_else(|| base_url.clone());
                (seed, request.http_host().to_string())
            }
        };
        let cookie_domain = normalize_cookie_domain(&raw_domain);
        let prefix = if request.is_https() { "SSESS" } else { "SESS" };
        let session_name = format!("{}{}", prefix, session_hash(&session_seed));

        Ok(Self {
            base_url,
            base_path,
            base_root,
            base_secure_url,
            base_insecure_url,
            script_path,
            cookie_domain,
            session_name,
        })
    }

    /// Internal path of the request: the URI without query string, base
    /// path or front controller name, percent-decoded and without
    /// surrounding slashes
    pub fn request_path(&self, request: &Request) -> String {
        let decoded = urlencoding::decode(request.path())
            .map(|path| path.into_owned())
            .unwrap_or_else(|_| request.path().to_string());
        let mut path = decoded.strip_prefix(self.base_path.as_str()).unwrap_or(decoded.trim_start_matches('/'));
        let script = script_basename(request.script_name());
        if !script.is_empty() {
            if path == script {
                path = "";
            } else if let Some(rest) = path.strip_prefix(script).and_then(|rest| rest.strip_prefix('/')) {
                path = rest;
            }
        }
        path.trim_matches('/').to_string()
    }
}

fn split_base_url(configured: &str) -> Result<(String, String, String)> {
    let base_url = configured.trim_end_matches('/').to_string();
    let parsed = Url::parse(&base_url).map_err(|e| Error::Other(format!("Invalid base_url '{}': {}", configured, e)))?;
    let path = parsed.path().trim_end_matches('/');
    let base_root = base_url
        .strip_suffix(path)
        .filter(|_| !path.is_empty())
        .unwrap_or(&base_url)
        .to_string();
    Ok((base_url.clone(), format!("{}/", path), base_root))
}

fn derive_base_url(request: &Request) -> (String, String, String) {
    let base_root = request.scheme_and_http_host();
    let dir = script_dir(request.script_name());
    if dir.is_empty() {
        return (base_root.clone(), "/".to_string(), base_root);
    }
    // Scripts below /core (installer, rebuild) share the base path of the site
    let dir = dir.strip_suffix("/core").unwrap_or(dir);
    (format!("{}{}", base_root, dir), format!("{}/", dir), base_root)
}

fn script_path(request: &Request, base_path: &str) -> String {
    let Some(relative) = request.script_name().strip_prefix(base_path) else {
        return String::new();
    };
    let script_path = format!("{}/", relative);
    let uri = format!("{}/", request.path());
    if uri.starts_with(&format!("{}{}", base_path, script_path)) {
        script_path
    } else {
        String::new()
    }
}

/// Directory of the script name without trailing slashes
fn script_dir(script_name: &str) -> &str {
    match script_name.rfind('/') {
        Some(index) => script_name[..index].trim_end_matches(['/', '\\']),
        None => "",
    }
}

fn script_basename(script_name: &str) -> &str {
    script_name.rsplit('/').next().unwrap_or(script_name)
}

/// Strip leading dots, `www.` and any port, then prefix with a dot. Domains
/// need a dot besides the leading one and must not be numeric.
pub fn normalize_cookie_domain(raw: &str) -> Option<String> {
    let domain = raw.trim_start_matches('.');
    let domain = domain.strip_prefix("www.").unwrap_or(domain);
    let domain = domain.split(':').next().unwrap_or(domain);
    let cookie_domain = format!(".{}", domain);
    let numeric = {
        let digits: String = cookie_domain.chars().filter(|c| *c != '.').collect();
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
    };
    if cookie_domain.split('.').count() > 2 && !numeric {
        Some(cookie_domain)
    } else {
        None
    }
}

/// First 32 hex characters of the SHA-256 of `seed`
pub fn session_hash(seed: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(seed.as_bytes()));
    digest[..32].to_string()
}
