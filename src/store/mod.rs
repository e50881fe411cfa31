/// Persistence for users and refresh credentials
///
/// The session manager only talks to these traits. `PgStore` backs them
/// with Postgres; `MemoryStore` keeps everything in process for tests and
/// local runs.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{LoginRecord, NewUser, RefreshCredential, User};
use crate::error::AppError;

/// Lookup and creation of user records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// `email` must already be normalized (trimmed, lowercase)
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Fails with a unique-constraint error when the email is taken
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;
}

/// Read access to the single refresh credential of a user
#[async_trait]
pub trait RefreshStore: Send + Sync {
    async fn find_refresh_credential(
        &self,
        user_id: Uuid,
    ) -> Result<Option<RefreshCredential>, AppError>;

    /// Returns whether a credential existed
    async fn delete_refresh_credential(&self, user_id: Uuid) -> Result<bool, AppError>;
}

/// Multi-record session writes that must be atomic
#[async_trait]
pub trait SessionStore: UserStore + RefreshStore {
    /// In one transaction: mark the user Active with fresh login metadata,
    /// delete any refresh credential they hold and insert `credential`.
    ///
    /// Only Active or Inactive users are updated. Returns the updated user
    /// row, `AccountInactive` when the user is now Suspended or Pending, or
    /// `InvalidCredentials` when the user no longer exists. Nothing is
    /// written in either error case.
    async fn establish_session(
        &self,
        credential: RefreshCredential,
        login: LoginRecord,
    ) -> Result<User, AppError>;

    /// Delete the user's refresh credential and flip an Active user to
    /// Inactive. Safe to repeat.
    async fn end_session(&self, user_id: Uuid) -> Result<(), AppError>;
}
