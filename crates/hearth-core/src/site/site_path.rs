use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::kernel::constants;
use crate::kernel::error::Result;
use crate::storage::{StorageProvider, StorageSystemError};

fn test_user_agent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^simpletest(\d+)").expect("test user agent regex must compile"))
}

/// Test run id carried by a test harness user agent, `simpletest123...` -> `123`
pub fn test_run_id(user_agent: &str) -> Option<&str> {
    test_user_agent_re()
        .captures(user_agent)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str())
}

/// Site directory used by a test run
pub fn test_site_path(run_id: &str) -> PathBuf {
    Path::new(constants::TEST_SITES_DIR).join(run_id)
}

/// Finds the site directory serving a host and script path
#[derive(Debug)]
pub struct SitePathResolver<'a> {
    provider: &'a dyn StorageProvider,
    aliases: BTreeMap<String, String>,
}

impl<'a> SitePathResolver<'a> {
    /// Resolver over the application root, reading `sites/sites.toml` if present
    pub fn new(provider: &'a dyn StorageProvider) -> Result<Self> {
        let alias_file = Path::new(constants::SITES_ALIAS_FILE);
        let aliases = if provider.is_file(alias_file) {
            let contents = provider.read_to_string(alias_file)?;
            toml::from_str(&contents).map_err(|e| StorageSystemError::deserialization("toml", e))?
        } else {
            BTreeMap::new()
        };
        Ok(Self { provider, aliases })
    }

    pub fn with_aliases(provider: &'a dyn StorageProvider, aliases: BTreeMap<String, String>) -> Self {
        Self { provider, aliases }
    }

    /// Most specific site directory for `http_host` and `script_name`.
    ///
    /// Candidates combine a host suffix (port first, then labels from the
    /// right) with a prefix of the script path's directories. Longer path
    /// prefixes are tried first, and for each one longer host suffixes
    /// first. A candidate matches when its directory holds a settings file,
    /// or merely exists if `require_settings` is false. Falls back to
    /// `sites/default`.
    pub fn resolve(&self, http_host: &str, script_name: &str, require_settings: bool) -> PathBuf {
        let uri: Vec<&str> = script_name.split('/').collect();
        let host_labels = host_labels(http_host);

        for i in (1..uri.len()).rev() {
            let path_part = uri[..i].join(".");
            for j in (1..=host_labels.len()).rev() {
                let host_part = host_labels[host_labels.len() - j..].join(".");
                let mut dir = format!("{}{}", host_part, path_part);
                if let Some(alias) = self.aliases.get(&dir) {
                    if self.provider.is_dir(&self.site_dir(alias)) {
                        dir = alias.clone();
                    }
                }
                let candidate = self.site_dir(&dir);
                if self.provider.is_file(&candidate.join(constants::SETTINGS_FILE))
                    || (!require_settings && self.provider.is_dir(&candidate))
                {
                    log::debug!("Site path for host '{}' resolved to {}", http_host, candidate.display());
                    return candidate;
                }
            }
        }
        PathBuf::from(constants::DEFAULT_SITE_PATH)
    }

    fn site_dir(&self, dir: &str) -> PathBuf {
        Path::new(constants::SITES_DIR).join(dir)
    }
}

/// `www.example.com:8080` -> `["8080", "www", "example", "com"]`
fn host_labels(http_host: &str) -> Vec<String> {
    let host = http_host.trim_end_matches('.').to_ascii_lowercase();
    let mut parts: Vec<&str> = host.split(':').collect();
    parts.reverse();
    parts
        .join(".")
        .split('.')
        .filter(|label| !label.is_empty())
        .map(str::to_string)
        .collect()
}
