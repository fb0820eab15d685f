//! In-memory store.
//!
//! All collections live behind one `RwLock`, so every trait method is atomic
//! with respect to the others, including the check-in read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{CheckInRecord, Classes, DeviceBindings, Sessions, Store, StoreError, Users};
use crate::attendance::model::{Caller, ClassRecord, DeviceBinding, NewClass, UserProfile};

#[derive(Default, Debug)]
struct State {
    devices: HashMap<String, String>,
    classes: HashMap<String, ClassRecord>,
    users: HashMap<String, UserProfile>,
    sessions: HashMap<Vec<u8>, (Caller, DateTime<Utc>)>,
}

#[derive(Default, Debug)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceBindings for MemoryStore {
    async fn get_binding(&self, fingerprint: &str) -> Result<Option<DeviceBinding>, StoreError> {
        let state = self.state.read().await;
        Ok(state.devices.get(fingerprint).map(|email| DeviceBinding {
            fingerprint: fingerprint.to_string(),
            email: email.clone(),
        }))
    }

    async fn bind_device(&self, fingerprint: &str, email: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.devices.contains_key(fingerprint) {
            return Ok(false);
        }
        state
            .devices
            .insert(fingerprint.to_string(), email.to_string());
        Ok(true)
    }
}

#[async_trait]
impl Classes for MemoryStore {
    async fn create_class(&self, class: NewClass) -> Result<ClassRecord, StoreError> {
        let record = class.into_record();
        let mut state = self.state.write().await;
        state.classes.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get_class(&self, class_id: &str) -> Result<Option<ClassRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state.classes.get(class_id).cloned())
    }

    async fn classes_for_user(&self, user_id: &str) -> Result<Vec<ClassRecord>, StoreError> {
        let state = self.state.read().await;
        let mut classes: Vec<ClassRecord> = state
            .classes
            .values()
            .filter(|class| class.is_visible_to(user_id))
            .cloned()
            .collect();
        classes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(classes)
    }

    async fn record_check_in(
        &self,
        class_id: &str,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> Result<CheckInRecord, StoreError> {
        let mut state = self.state.write().await;
        let Some(class) = state.classes.get_mut(class_id) else {
            return Ok(CheckInRecord::ClassNotFound);
        };
        if class.is_checked_in(user_id) {
            return Ok(CheckInRecord::AlreadyCheckedIn);
        }
        class.checked_in_ids.push(user_id.to_string());
        class.checked_in_count = i64::try_from(class.checked_in_ids.len())
            .map_err(|_| StoreError::Unavailable("check-in count overflow".to_string()))?;
        class.last_checked_in_at = Some(at);
        class.updated_at = at;
        Ok(CheckInRecord::CheckedIn {
            checked_in_count: class.checked_in_count,
        })
    }
}

#[async_trait]
impl Users for MemoryStore {
    async fn user_exists(&self, user_id: &str) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state.users.contains_key(user_id))
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.users.contains_key(&profile.id) {
            return Ok(false);
        }
        state.users.insert(profile.id.clone(), profile.clone());
        Ok(true)
    }
}

#[async_trait]
impl Sessions for MemoryStore {
    async fn insert_session(
        &self,
        token_hash: &[u8],
        caller: &Caller,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        state.sessions.retain(|_, (_, expires)| *expires > now);
        state
            .sessions
            .insert(token_hash.to_vec(), (caller.clone(), expires_at));
        Ok(())
    }

    async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<Caller>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .get(token_hash)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(caller, _)| caller.clone()))
    }

    async fn delete_session(&self, token_hash: &[u8]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.sessions.remove(token_hash);
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use chrono::Duration;
    use std::sync::Arc;

    fn new_class(id: &str, owner: &str) -> NewClass {
        NewClass {
            id: id.to_string(),
            name: format!("class {id}"),
            owner_id: owner.to_string(),
            owner_email: format!("{owner}@x.com"),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn bind_device_is_first_write_wins() -> Result<()> {
        let store = MemoryStore::new();
        assert!(store.bind_device("dev-1", "first@x.com").await?);
        assert!(!store.bind_device("dev-1", "second@x.com").await?);
        let binding = store.get_binding("dev-1").await?;
        assert_eq!(
            binding.map(|b| b.email),
            Some("first@x.com".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn record_check_in_outcomes() -> Result<()> {
        let store = MemoryStore::new();
        store.create_class(new_class("c1", "owner")).await?;

        let now = Utc::now();
        assert_eq!(
            store.record_check_in("c1", "student", now).await?,
            CheckInRecord::CheckedIn {
                checked_in_count: 1
            }
        );
        assert_eq!(
            store.record_check_in("c1", "student", now).await?,
            CheckInRecord::AlreadyCheckedIn
        );
        assert_eq!(
            store.record_check_in("missing", "student", now).await?,
            CheckInRecord::ClassNotFound
        );

        let class = store.get_class("c1").await?;
        assert_eq!(class.as_ref().map(|c| c.checked_in_count), Some(1));
        assert_eq!(class.and_then(|c| c.last_checked_in_at), Some(now));
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_check_ins_keep_count_in_sync() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        store.create_class(new_class("c1", "owner")).await?;

        let mut handles = Vec::new();
        for n in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .record_check_in("c1", &format!("student-{}", n % 16), Utc::now())
                    .await
            }));
        }
        for handle in handles {
            handle.await??;
        }

        let class = store.get_class("c1").await?;
        assert!(class.is_some());
        if let Some(class) = class {
            assert_eq!(class.checked_in_ids.len(), 16);
            assert_eq!(class.checked_in_count, 16);
        }
        Ok(())
    }

    #[tokio::test]
    async fn classes_for_user_filters_by_membership() -> Result<()> {
        let store = MemoryStore::new();
        store.create_class(new_class("a", "alice")).await?;
        store.create_class(new_class("b", "bob")).await?;

        let classes = store.classes_for_user("alice").await?;
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].id, "a");
        Ok(())
    }

    #[tokio::test]
    async fn expired_sessions_are_not_returned() -> Result<()> {
        let store = MemoryStore::new();
        let caller = Caller {
            user_id: "u1".to_string(),
            email: "u1@x.com".to_string(),
        };
        store
            .insert_session(b"live", &caller, Utc::now() + Duration::hours(1))
            .await?;
        store
            .insert_session(b"stale", &caller, Utc::now() - Duration::seconds(1))
            .await?;

        assert_eq!(store.lookup_session(b"live").await?, Some(caller));
        assert_eq!(store.lookup_session(b"stale").await?, None);

        store.delete_session(b"live").await?;
        assert_eq!(store.lookup_session(b"live").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn insert_session_purges_expired_entries() -> Result<()> {
        let store = MemoryStore::new();
        let caller = Caller {
            user_id: "u1".to_string(),
            email: "u1@x.com".to_string(),
        };
        store
            .insert_session(b"stale", &caller, Utc::now() - Duration::seconds(1))
            .await?;
        store
            .insert_session(b"fresh", &caller, Utc::now() + Duration::hours(1))
            .await?;

        let state = store.state.read().await;
        assert_eq!(state.sessions.len(), 1);
        assert!(state.sessions.contains_key(b"fresh".as_slice()));
        Ok(())
    }

    #[tokio::test]
    async fn create_profile_rejects_duplicates() -> Result<()> {
        let store = MemoryStore::new();
        let profile = UserProfile {
            id: "u1".to_string(),
            email: "u1@x.com".to_string(),
            display_name: None,
            created_at: Utc::now(),
        };
        assert!(!store.user_exists("u1").await?);
        assert!(store.create_profile(&profile).await?);
        assert!(!store.create_profile(&profile).await?);
        assert!(store.user_exists("u1").await?);
        Ok(())
    }
}
