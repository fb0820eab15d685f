//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, which today is always the
//! API server with its store, identity provider and session settings.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_DSN, ARG_PORT, auth, identity};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|v| !v.trim().is_empty());

    let identity_opts = identity::Options::parse(matches)?;
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        identity_url: identity_opts.url,
        identity_api_key: identity_opts.api_key,
        federated_timeout_seconds: identity_opts.federated_timeout_seconds,
        frontend_base_url: auth_opts.frontend_base_url,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(
            [
                ("ROLLCALL_PORT", Some("8443")),
                ("ROLLCALL_DSN", Some("postgres://user@localhost:5432/rollcall")),
                ("ROLLCALL_IDENTITY_API_KEY", Some("api-key")),
                ("ROLLCALL_FRONTEND_BASE_URL", Some("https://rollcall.dev")),
                ("ROLLCALL_SESSION_TTL_SECONDS", Some("600")),
                ("ROLLCALL_FEDERATED_TIMEOUT_SECONDS", None::<&str>),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["rollcall"]);
                let result = handler(&matches);
                assert!(result.is_ok());
                if let Ok(Action::Server(args)) = result {
                    assert_eq!(args.port, 8443);
                    assert_eq!(
                        args.dsn.as_deref(),
                        Some("postgres://user@localhost:5432/rollcall")
                    );
                    assert_eq!(args.identity_api_key.expose_secret(), "api-key");
                    assert_eq!(args.frontend_base_url, "https://rollcall.dev");
                    assert_eq!(args.session_ttl_seconds, 600);
                    assert_eq!(args.federated_timeout_seconds, 120);
                }
            },
        );
    }

    #[test]
    fn blank_dsn_falls_back_to_memory() {
        temp_env::with_vars(
            [
                ("ROLLCALL_DSN", Some("")),
                ("ROLLCALL_IDENTITY_API_KEY", Some("api-key")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["rollcall"]);
                let result = handler(&matches);
                assert!(matches!(result, Ok(Action::Server(Args { dsn: None, .. }))));
            },
        );
    }

    #[test]
    fn blank_identity_api_key_rejected() {
        temp_env::with_vars(
            [
                ("ROLLCALL_DSN", None::<&str>),
                ("ROLLCALL_IDENTITY_API_KEY", None::<&str>),
            ],
            || {
                let matches = crate::cli::commands::new()
                    .get_matches_from(vec!["rollcall", "--identity-api-key", " "]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(
                        err.to_string()
                            .contains("missing required argument: --identity-api-key")
                    );
                }
            },
        );
    }
}
