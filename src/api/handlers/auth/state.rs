//! Auth configuration shared by the session handlers.

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    /// Only mark cookies secure when the frontend is served over HTTPS.
    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}
