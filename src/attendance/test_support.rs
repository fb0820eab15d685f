use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use secrecy::SecretString;

use super::Attendance;
use crate::{
    identity::{
        AuthErrorCode, AuthenticatedUser, FederatedCredential, IdentityError, IdentityProvider,
    },
    store::MemoryStore,
};

/// Identity provider double that replays fixed answers and counts calls.
pub(crate) struct ScriptedIdentity {
    password: Result<AuthenticatedUser, IdentityError>,
    federated: Result<AuthenticatedUser, IdentityError>,
    federated_delay: Option<Duration>,
    pub(crate) password_calls: AtomicUsize,
    pub(crate) federated_calls: AtomicUsize,
    pub(crate) sign_outs: AtomicUsize,
}

impl ScriptedIdentity {
    pub(crate) fn accepting(uid: &str, email: &str) -> Self {
        let user = AuthenticatedUser {
            uid: uid.to_string(),
            email: Some(email.to_string()),
        };
        Self {
            password: Ok(user.clone()),
            federated: Ok(user),
            federated_delay: None,
            password_calls: AtomicUsize::new(0),
            federated_calls: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
        }
    }

    pub(crate) fn rejecting(code: AuthErrorCode, message: &str) -> Self {
        let error = IdentityError::new(code, message);
        Self {
            password: Err(error.clone()),
            federated: Err(error),
            ..Self::accepting("unused", "unused@x.com")
        }
    }

    pub(crate) fn with_federated_user(mut self, uid: &str, email: Option<&str>) -> Self {
        self.federated = Ok(AuthenticatedUser {
            uid: uid.to_string(),
            email: email.map(str::to_string),
        });
        self
    }

    pub(crate) fn with_federated_delay(mut self, delay: Duration) -> Self {
        self.federated_delay = Some(delay);
        self
    }

    pub(crate) fn provider_calls(&self) -> usize {
        self.password_calls.load(Ordering::SeqCst) + self.federated_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for ScriptedIdentity {
    async fn sign_in_with_password(
        &self,
        _email: &str,
        _password: &SecretString,
    ) -> Result<AuthenticatedUser, IdentityError> {
        self.password_calls.fetch_add(1, Ordering::SeqCst);
        self.password.clone()
    }

    async fn sign_in_federated(
        &self,
        _credential: &FederatedCredential,
    ) -> Result<AuthenticatedUser, IdentityError> {
        self.federated_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.federated_delay {
            tokio::time::sleep(delay).await;
        }
        self.federated.clone()
    }

    async fn sign_out(&self) {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) fn attendance(store: &Arc<MemoryStore>, identity: &Arc<ScriptedIdentity>) -> Attendance {
    Attendance::new(store.clone(), identity.clone())
}
