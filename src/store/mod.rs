//! Storage seams consumed by the order engine.
//!
//! The engine holds these as trait objects so the durable backend can be
//! swapped without touching lifecycle logic. Every conditional write is a
//! single atomic operation on the backend; callers never read, decide and
//! then write in two round-trips.

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::engine::query::OrderQuery;
use crate::models::address::Address;
use crate::models::order::{Order, OrderStatus};
use crate::models::user::{Role, UserProfile};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    Duplicate(Uuid),

    #[error("no such record: {0}")]
    Missing(Uuid),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Result of a conditional status write.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusWrite {
    Applied(Order),
    /// The stored status no longer matched `expected`.
    Stale(Order),
    Missing,
}

/// Result of an atomic courier claim.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(Order),
    /// The requesting courier already held the claim; nothing was written.
    AlreadyHeld(Order),
    HeldByOther(Order),
    NotClaimable(Order),
    Missing,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Moves the order to `next` only if its stored status is still
    /// `expected`. `owner_if_unset` fills `ownerId` in the same write when it
    /// is empty.
    async fn set_status_if(
        &self,
        id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
        owner_if_unset: Option<Uuid>,
    ) -> Result<StatusWrite, StoreError>;

    /// Sets `courierId` if the order is `courier_assigned` and the slot is
    /// empty or already holds `courier_id`.
    async fn claim(&self, id: Uuid, courier_id: Uuid) -> Result<ClaimOutcome, StoreError>;

    async fn set_rating(
        &self,
        id: Uuid,
        rating: f64,
        review: Option<String>,
    ) -> Result<Option<Order>, StoreError>;

    async fn set_hidden(&self, id: Uuid, role: Role, hidden: bool)
        -> Result<Option<Order>, StoreError>;

    /// Orders matching `query`, newest first.
    async fn list(&self, query: &OrderQuery) -> Result<Vec<Order>, StoreError>;

    /// Every non-null rating on orders owned by `owner_id`.
    ///
    /// Read and write-back via [`Directory::set_user_rating`] are separate
    /// calls; a durable backend with concurrent raters should recompute and
    /// write the aggregate in one transaction.
    async fn owner_ratings(&self, owner_id: Uuid) -> Result<Vec<f64>, StoreError>;

    async fn len(&self) -> Result<usize, StoreError>;
}

/// Read access to users and addresses, plus the owner rating write-back.
#[async_trait]
pub trait Directory: Send + Sync {
    async fn get_user(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError>;

    async fn get_address(&self, id: Uuid) -> Result<Option<Address>, StoreError>;

    async fn set_user_rating(&self, id: Uuid, rating: f64) -> Result<(), StoreError>;
}
