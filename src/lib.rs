//! # Rollcall (Class Attendance)
//!
//! `rollcall` records class attendance. Users sign in with email/password or a
//! Google credential, create classes, and check in to a class by scanning the
//! QR code that encodes its check-in URL.
//!
//! ## Device Binding
//!
//! Every login carries a best-effort device fingerprint supplied by the browser.
//! A fingerprint binds to the first email that signs in with it; later logins
//! from the same fingerprint with a different email are rejected before the
//! identity provider is called. Missing fingerprints and unknown fingerprints are
//! allowed through (fail-open).
//!
//! ## Check-In
//!
//! The QR payload is a URL whose last path segment is the class id. Recording
//! attendance is a single atomic store operation, so `checked_in_count` always
//! equals the size of `checked_in_ids` even under concurrent scans.
//!
//! ## Collaborators
//!
//! The identity provider, the document store, the device fingerprint source and
//! the camera capture are traits passed through [`attendance::Attendance`],
//! never global handles, so each can be swapped for a test double.

pub mod api;
pub mod attendance;
pub mod capture;
pub mod cli;
pub mod identity;
pub mod store;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
