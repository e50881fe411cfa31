use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{RefreshStore, SessionStore, UserStore};
use crate::domain::{LoginRecord, NewUser, RefreshCredential, User, UserStatus};
use crate::error::{AppError, AuthError, DatabaseError};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    /// Keyed by user id, so a user can never hold two credentials
    credentials: HashMap<Uuid, RefreshCredential>,
}

/// In-process store. Each operation holds one lock for its whole duration,
/// which gives the same all-or-nothing behavior as the Postgres transactions.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>, AppError> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }

    /// Administrative status change (suspension, activation)
    pub fn set_status(&self, user_id: Uuid, status: UserStatus) -> Result<(), AppError> {
        let mut state = self.state()?;
        let user = state.users.get_mut(&user_id).ok_or_else(|| {
            AppError::Database(DatabaseError::QueryExecution(format!(
                "no user with id {}",
                user_id
            )))
        })?;
        user.status = status;
        user.updated_at = Utc::now();
        Ok(())
    }

    /// Number of stored refresh credentials across all users
    pub fn credential_count(&self) -> Result<usize, AppError> {
        Ok(self.state()?.credentials.len())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state()?;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state()?.users.get(&id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut state = self.state()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "Email already registered".to_string(),
            )));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
            status: user.status,
            image: user.image,
            last_login_at: None,
            last_login_ip: None,
            login_count: 0,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl RefreshStore for MemoryStore {
    async fn find_refresh_credential(
        &self,
        user_id: Uuid,
    ) -> Result<Option<RefreshCredential>, AppError> {
        Ok(self.state()?.credentials.get(&user_id).cloned())
    }

    async fn delete_refresh_credential(&self, user_id: Uuid) -> Result<bool, AppError> {
        Ok(self.state()?.credentials.remove(&user_id).is_some())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn establish_session(
        &self,
        credential: RefreshCredential,
        login: LoginRecord,
    ) -> Result<User, AppError> {
        let mut state = self.state()?;

        let user = match state.users.get_mut(&credential.user_id) {
            Some(user) if user.status.may_authenticate() => user,
            Some(_) => return Err(AppError::Auth(AuthError::AccountInactive)),
            None => return Err(AppError::Auth(AuthError::InvalidCredentials)),
        };
        user.status = UserStatus::Active;
        user.last_login_at = Some(login.at);
        user.last_login_ip = login.ip;
        user.login_count += 1;
        user.updated_at = login.at;
        let user = user.clone();

        state.credentials.insert(credential.user_id, credential);

        Ok(user)
    }

    async fn end_session(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut state = self.state()?;
        state.credentials.remove(&user_id);

        if let Some(user) = state.users.get_mut(&user_id) {
            if user.status == UserStatus::Active {
                user.status = UserStatus::Inactive;
                user.updated_at = Utc::now();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use chrono::Duration;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            name: "Jane".to_string(),
            password_hash: "hash".to_string(),
            role: Role::Editor,
            status: UserStatus::Inactive,
            image: None,
        }
    }

    fn credential(user_id: Uuid, hash: &str) -> RefreshCredential {
        let now = Utc::now();
        RefreshCredential {
            user_id,
            token_hash: hash.to_string(),
            created_at: now,
            expires_at: now + Duration::days(7),
        }
    }

    fn login() -> LoginRecord {
        LoginRecord {
            at: Utc::now(),
            ip: Some("127.0.0.1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let store = MemoryStore::new();
        store.create_user(new_user("jane@example.com")).await.unwrap();

        let err = store.create_user(new_user("jane@example.com")).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Database(DatabaseError::UniqueConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_establish_session_replaces_credential() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("jane@example.com")).await.unwrap();

        store.establish_session(credential(user.id, "first"), login()).await.unwrap();
        let updated = store
            .establish_session(credential(user.id, "second"), login())
            .await
            .unwrap();

        assert_eq!(store.credential_count().unwrap(), 1);
        let stored = store.find_refresh_credential(user.id).await.unwrap().unwrap();
        assert_eq!(stored.token_hash, "second");
        assert_eq!(updated.status, UserStatus::Active);
        assert_eq!(updated.login_count, 2);
        assert_eq!(updated.last_login_ip.as_deref(), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_establish_session_for_missing_user_writes_nothing() {
        let store = MemoryStore::new();
        let result = store
            .establish_session(credential(Uuid::new_v4(), "orphan"), login())
            .await;

        assert!(result.is_err());
        assert_eq!(store.credential_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_establish_session_refuses_suspended_user() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("jane@example.com")).await.unwrap();
        store.set_status(user.id, UserStatus::Suspended).unwrap();

        let err = store
            .establish_session(credential(user.id, "h"), login())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Auth(AuthError::AccountInactive)));
        assert_eq!(store.credential_count().unwrap(), 0);
        let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.status, UserStatus::Suspended);
        assert_eq!(user.login_count, 0);
    }

    #[tokio::test]
    async fn test_end_session_is_idempotent() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("jane@example.com")).await.unwrap();
        store.establish_session(credential(user.id, "h"), login()).await.unwrap();

        store.end_session(user.id).await.unwrap();
        store.end_session(user.id).await.unwrap();

        assert!(store.find_refresh_credential(user.id).await.unwrap().is_none());
        let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.status, UserStatus::Inactive);
    }

    #[tokio::test]
    async fn test_end_session_keeps_suspension() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("jane@example.com")).await.unwrap();
        store.set_status(user.id, UserStatus::Suspended).unwrap();

        store.end_session(user.id).await.unwrap();

        let user = store.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.status, UserStatus::Suspended);
    }
}
