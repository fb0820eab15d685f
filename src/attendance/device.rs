//! Device gate.
//!
//! A read-only check run before every credential verification. It never writes
//! a binding; bindings are recorded only after a login succeeds (see `login`).
//! The gate is fail-open: no fingerprint, or a fingerprint nobody has bound yet,
//! lets the login through.

use axum::http::HeaderMap;
use thiserror::Error;
use tracing::{debug, warn};

use super::Attendance;
use crate::store::{DeviceBindings, StoreError};

pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Device fingerprint collaborator: a best-effort stable id for the current device.
pub trait FingerprintSource: Send + Sync {
    fn fingerprint(&self) -> Option<String>;
}

impl FingerprintSource for Option<String> {
    fn fingerprint(&self) -> Option<String> {
        normalize_fingerprint(self.as_deref())
    }
}

/// Fingerprint reported by the browser with a request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClientFingerprint(Option<String>);

impl ClientFingerprint {
    /// The body field wins over the `x-device-id` header.
    #[must_use]
    pub fn from_request(body: Option<&str>, headers: &HeaderMap) -> Self {
        let header = headers
            .get(DEVICE_ID_HEADER)
            .and_then(|value| value.to_str().ok());
        Self(normalize_fingerprint(body).or_else(|| normalize_fingerprint(header)))
    }
}

impl FingerprintSource for ClientFingerprint {
    fn fingerprint(&self) -> Option<String> {
        self.0.clone()
    }
}

fn normalize_fingerprint(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Why the gate let a login through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    NoFingerprint,
    FirstUse,
    Matches,
}

#[derive(Debug, Error)]
pub enum DeviceGateError {
    #[error("This device is already bound to another account ({bound_email}) and cannot be used.")]
    BoundToOther { bound_email: String },
    #[error("Could not verify this device: {0}")]
    Store(#[from] StoreError),
}

/// Compare the stored binding for `fingerprint` against `email`.
///
/// # Errors
/// Returns `BoundToOther` when the fingerprint belongs to a different email, or
/// `Store` if the lookup fails.
pub async fn check_device<S>(
    bindings: &S,
    fingerprint: Option<&str>,
    email: &str,
) -> Result<GateDecision, DeviceGateError>
where
    S: DeviceBindings + ?Sized,
{
    let Some(fingerprint) = fingerprint else {
        warn!("no device fingerprint supplied, allowing login");
        return Ok(GateDecision::NoFingerprint);
    };

    let Some(binding) = bindings.get_binding(fingerprint).await? else {
        debug!("device fingerprint not bound yet, allowing login");
        return Ok(GateDecision::FirstUse);
    };

    if binding.email.trim() != email.trim() {
        warn!("device fingerprint bound to another account, rejecting login");
        return Err(DeviceGateError::BoundToOther {
            bound_email: binding.email,
        });
    }

    debug!("device fingerprint matches account");
    Ok(GateDecision::Matches)
}

impl Attendance {
    /// Run the device gate for `email` with the caller's fingerprint.
    ///
    /// # Errors
    /// See [`check_device`].
    pub async fn check_device<F>(
        &self,
        source: &F,
        email: &str,
    ) -> Result<GateDecision, DeviceGateError>
    where
        F: FingerprintSource + ?Sized,
    {
        let fingerprint = source.fingerprint();
        check_device(self.store(), fingerprint.as_deref(), email).await
    }

    /// Record `fingerprint -> email` unless the fingerprint is already bound.
    /// Failures are logged; they never fail the login that triggered them.
    pub(crate) async fn remember_device(&self, fingerprint: Option<&str>, email: &str) {
        let Some(fingerprint) = fingerprint else {
            return;
        };
        match self.store().bind_device(fingerprint, email).await {
            Ok(true) => debug!("device fingerprint bound to account"),
            Ok(false) => {}
            Err(err) => warn!("Failed to record device binding: {err}"),
        }
    }
}
