use std::sync::atomic::{AtomicBool, Ordering};

use crate::site::Settings;

/// A session cookie that has to be expired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredCookie {
    pub name: String,
    pub secure: bool,
}

/// Session write switch and cookie naming rules, the `session.helper` service
#[derive(Debug)]
pub struct SessionHelper {
    enabled: AtomicBool,
    mixed_mode: bool,
}

impl SessionHelper {
    /// Mixed mode (`mixed_mode_sessions`) lets a site share sessions between
    /// HTTP and HTTPS
    pub fn new(settings: &Settings) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            mixed_mode: settings.get_or("mixed_mode_sessions", false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Stop session data from being saved for the rest of the request
    pub fn disable(&self) -> &Self {
        self.enabled.store(false, Ordering::SeqCst);
        self
    }

    pub fn enable(&self) -> &Self {
        self.enabled.store(true, Ordering::SeqCst);
        self
    }

    pub fn is_mixed_mode(&self) -> bool {
        self.mixed_mode
    }

    /// Name of the plain-HTTP counterpart of a session cookie: `SSESS…` -> `SESS…`
    pub fn insecure_name<'a>(&self, name: &'a str) -> &'a str {
        if name.starts_with("SS") { &name[1..] } else { name }
    }

    /// Cookies to expire once an anonymous session holds no data anymore
    pub fn cookies_to_clear(&self, session_name: &str, is_https: bool) -> Vec<ExpiredCookie> {
        let mut cookies = vec![ExpiredCookie {
            name: session_name.to_string(),
            secure: is_https,
        }];
        if is_https {
            cookies.push(ExpiredCookie {
                name: self.insecure_name(session_name).to_string(),
                secure: false,
            });
        } else if self.mixed_mode {
            cookies.push(ExpiredCookie {
                name: format!("S{}", session_name),
                secure: true,
            });
        }
        cookies
    }
}

/// Whether a request carries a session cookie for either scheme
pub fn has_session_cookie<'a, I>(cookie_names: I, session_name: &str) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let insecure = session_name.strip_prefix('S').filter(|rest| rest.starts_with("SESS"));
    cookie_names
        .into_iter()
        .any(|name| name == session_name || Some(name) == insecure || name == format!("S{}", session_name))
}
