//! QR check-in.
//!
//! A QR code carries a URL whose last path segment is the class id. Scanning
//! stops the capture before anything is validated, then the check-in is one
//! atomic store write, so concurrent scans by the same user count once.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;
use utoipa::ToSchema;

use super::{Attendance, model::Caller};
use crate::{
    capture::{Capture, CaptureGuard},
    store::{CheckInRecord, Classes, StoreError},
};

const CHECKED_IN_NOTICE: &str = "Checked in successfully!";
const ALREADY_CHECKED_IN_NOTICE: &str = "You have already checked in!";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckInOutcome {
    CheckedIn {
        class_id: String,
        checked_in_count: i64,
    },
    AlreadyCheckedIn {
        class_id: String,
    },
    /// Unknown class ids end the flow silently.
    ClassNotFound {
        class_id: String,
    },
}

impl CheckInOutcome {
    /// Text shown to the user, if any.
    #[must_use]
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            Self::CheckedIn { .. } => Some(CHECKED_IN_NOTICE),
            Self::AlreadyCheckedIn { .. } => Some(ALREADY_CHECKED_IN_NOTICE),
            Self::ClassNotFound { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CheckInError {
    #[error("Unable to check in, please try again.")]
    InvalidPayload,
    #[error("Unable to check in, please try again.")]
    NotSignedIn,
    #[error("Check-in failed.")]
    Store(#[from] StoreError),
}

/// Extract the class id from a scanned payload: the last path segment of the
/// URL it encodes. A trailing slash leaves that segment empty, which is invalid.
#[must_use]
pub fn class_id_from_payload(payload: &str) -> Option<String> {
    let url = Url::parse(payload.trim()).ok()?;
    url.path_segments()?
        .next_back()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

impl Attendance {
    /// Handle one decoded QR payload for `caller`.
    ///
    /// `capture` is stopped before the payload is looked at. `on_checked_in`
    /// runs only when this call actually added the caller to the class.
    ///
    /// # Errors
    /// Returns `InvalidPayload` or `NotSignedIn` without touching the store, or
    /// `Store` if the write fails.
    pub async fn check_in<C, F>(
        &self,
        capture: CaptureGuard<C>,
        payload: &str,
        caller: Option<&Caller>,
        on_checked_in: F,
    ) -> Result<CheckInOutcome, CheckInError>
    where
        C: Capture,
        F: FnOnce(&CheckInOutcome) + Send,
    {
        drop(capture);

        let class_id = class_id_from_payload(payload).ok_or(CheckInError::InvalidPayload)?;
        let caller = caller.ok_or(CheckInError::NotSignedIn)?;

        let Some(class) = self.store().get_class(&class_id).await? else {
            debug!(class_id = %class_id, "check-in for unknown class");
            return Ok(CheckInOutcome::ClassNotFound { class_id });
        };

        if class.is_checked_in(&caller.user_id) {
            return Ok(CheckInOutcome::AlreadyCheckedIn { class_id });
        }

        let outcome = match self
            .store()
            .record_check_in(&class_id, &caller.user_id, Utc::now())
            .await?
        {
            CheckInRecord::CheckedIn { checked_in_count } => CheckInOutcome::CheckedIn {
                class_id,
                checked_in_count,
            },
            CheckInRecord::AlreadyCheckedIn => CheckInOutcome::AlreadyCheckedIn { class_id },
            CheckInRecord::ClassNotFound => CheckInOutcome::ClassNotFound { class_id },
        };

        if let CheckInOutcome::CheckedIn {
            class_id,
            checked_in_count,
        } = &outcome
        {
            info!(class_id = %class_id, checked_in_count, "checked in");
            on_checked_in(&outcome);
        }

        Ok(outcome)
    }
}
