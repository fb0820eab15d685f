use crate::identity::DEFAULT_IDENTITY_URL;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_IDENTITY_API_KEY: &str = "identity-api-key";
pub const ARG_IDENTITY_URL: &str = "identity-url";
pub const ARG_FEDERATED_TIMEOUT_SECONDS: &str = "federated-timeout-seconds";

#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub api_key: SecretString,
    pub federated_timeout_seconds: u64,
}

impl Options {
    /// Parse identity provider arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the API key is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let api_key = matches
            .get_one::<String>(ARG_IDENTITY_API_KEY)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_IDENTITY_API_KEY}"))?;

        let url = matches
            .get_one::<String>(ARG_IDENTITY_URL)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IDENTITY_URL.to_string());

        Ok(Self {
            url,
            api_key: SecretString::from(api_key),
            federated_timeout_seconds: matches
                .get_one::<u64>(ARG_FEDERATED_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(120),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_IDENTITY_API_KEY)
                .long(ARG_IDENTITY_API_KEY)
                .help("API key of the identity provider project")
                .env("ROLLCALL_IDENTITY_API_KEY")
                .required(true),
        )
        .arg(
            Arg::new(ARG_IDENTITY_URL)
                .long(ARG_IDENTITY_URL)
                .help("Base URL of the identity provider REST API")
                .env("ROLLCALL_IDENTITY_URL")
                .default_value(DEFAULT_IDENTITY_URL),
        )
        .arg(
            Arg::new(ARG_FEDERATED_TIMEOUT_SECONDS)
                .long(ARG_FEDERATED_TIMEOUT_SECONDS)
                .help("Seconds to wait for the federated sign-in exchange")
                .env("ROLLCALL_FEDERATED_TIMEOUT_SECONDS")
                .default_value("120")
                .value_parser(clap::value_parser!(u64)),
        )
}
