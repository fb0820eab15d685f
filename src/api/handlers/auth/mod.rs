//! Auth endpoints: credential login, federated login, session and logout.
//!
//! Flow Overview:
//! 1) The client posts credentials (or a provider credential) with its device
//!    fingerprint.
//! 2) The attendance flow runs the device gate and the provider call.
//! 3) On success a random session token is issued as an `HttpOnly` cookie and
//!    only its SHA-256 hash is stored.
//! 4) On failure any presented session is deleted and the cookie is cleared.

pub mod federated;
pub mod login;
pub mod session;
mod state;
pub mod types;
pub(crate) mod utils;

pub use state::AuthConfig;
