use clap::{Arg, ArgMatches, Command};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";

/// One year; keeps `now + ttl` far from the `chrono` range limits.
pub const MAX_SESSION_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the TTL is outside `1..=MAX_SESSION_TTL_SECONDS`.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let frontend_base_url = matches
            .get_one::<String>(ARG_FRONTEND_BASE_URL)
            .cloned()
            .unwrap_or_else(|| "http://localhost:5173".to_string());
        let session_ttl_seconds = matches
            .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .unwrap_or(43_200);
        if !(1..=MAX_SESSION_TTL_SECONDS).contains(&session_ttl_seconds) {
            anyhow::bail!(
                "--{ARG_SESSION_TTL_SECONDS} must be between 1 and {MAX_SESSION_TTL_SECONDS}"
            );
        }

        Ok(Self {
            frontend_base_url,
            session_ttl_seconds,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend base URL, used as the CORS origin and sign-in request URI")
                .env("ROLLCALL_FRONTEND_BASE_URL")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("ROLLCALL_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_SESSION_TTL_SECONDS)),
        )
}
