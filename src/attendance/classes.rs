//! Class creation and lookup.

use chrono::Utc;
use thiserror::Error;
use tracing::info;
use ulid::Ulid;

use super::{
    Attendance,
    model::{Caller, ClassRecord, NewClass},
};
use crate::store::{Classes, StoreError};

#[derive(Debug, Error)]
pub enum CreateClassError {
    #[error("Please enter a class name first.")]
    EmptyName,
    #[error("You are not signed in.")]
    NotSignedIn,
    #[error("Error: {0}")]
    Store(#[from] StoreError),
}

impl Attendance {
    /// Create a class owned by `caller`, who becomes its only member.
    ///
    /// The name is trimmed; nothing is written when it is empty or when there
    /// is no caller.
    ///
    /// # Errors
    /// Returns `EmptyName`, `NotSignedIn`, or `Store` when the insert fails.
    pub async fn create_class(
        &self,
        name: &str,
        caller: Option<&Caller>,
    ) -> Result<ClassRecord, CreateClassError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CreateClassError::EmptyName);
        }
        let caller = caller.ok_or(CreateClassError::NotSignedIn)?;

        let record = self
            .store()
            .create_class(NewClass {
                id: Ulid::new().to_string(),
                name: name.to_string(),
                owner_id: caller.user_id.clone(),
                owner_email: caller.email.clone(),
                created_at: Utc::now(),
            })
            .await?;

        info!(class_id = %record.id, "class created");
        Ok(record)
    }

    /// Classes `caller` owns or belongs to.
    ///
    /// # Errors
    /// Returns an error if the store query fails.
    pub async fn classes_for(&self, caller: &Caller) -> Result<Vec<ClassRecord>, StoreError> {
        self.store().classes_for_user(&caller.user_id).await
    }

    /// A single class, only if `caller` may see it.
    ///
    /// # Errors
    /// Returns an error if the store query fails.
    pub async fn class_for(
        &self,
        caller: &Caller,
        class_id: &str,
    ) -> Result<Option<ClassRecord>, StoreError> {
        Ok(self
            .store()
            .get_class(class_id)
            .await?
            .filter(|class| class.is_visible_to(&caller.user_id)))
    }
}
