//! Attendance flows.
//!
//! [`Attendance`] is the explicit context every flow runs against: the document
//! store, the identity provider and the federated sign-in timeout. Handlers
//! build one at startup and share it; tests build one over [`MemoryStore`] and
//! a scripted identity provider.
//!
//! Flow Overview:
//! 1) Login (credential or federated): device gate, provider call, forced
//!    sign-out on any failure, first-write-wins device binding on success.
//! 2) Class creation: validate the trimmed name and the caller, then one insert.
//! 3) Check-in: stop capture, resolve the class id from the QR payload, then a
//!    single atomic store write.
//!
//! [`MemoryStore`]: crate::store::MemoryStore

pub mod checkin;
pub mod classes;
pub mod device;
pub mod login;
pub mod model;

#[cfg(test)]
pub(crate) mod test_support;

use std::{sync::Arc, time::Duration};

use crate::{identity::IdentityProvider, store::Store};

pub use checkin::{CheckInError, CheckInOutcome, class_id_from_payload};
pub use classes::CreateClassError;
pub use device::{ClientFingerprint, DeviceGateError, FingerprintSource, GateDecision};
pub use login::{Destination, FederatedLoginError, LoginError, LoginOutcome, ProfileError};

const DEFAULT_FEDERATED_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct Attendance {
    store: Arc<dyn Store>,
    identity: Arc<dyn IdentityProvider>,
    federated_timeout: Duration,
}

impl Attendance {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            store,
            identity,
            federated_timeout: DEFAULT_FEDERATED_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_federated_timeout(mut self, timeout: Duration) -> Self {
        self.federated_timeout = timeout;
        self
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    #[must_use]
    pub fn federated_timeout(&self) -> Duration {
        self.federated_timeout
    }
}

impl std::fmt::Debug for Attendance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attendance")
            .field("store", &self.store.backend())
            .field("federated_timeout", &self.federated_timeout)
            .finish_non_exhaustive()
    }
}
