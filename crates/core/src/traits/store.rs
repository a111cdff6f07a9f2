//! State store trait

use async_trait::async_trait;

use crate::{StateBag, StateScope, StateWrite, StoreError};

/// Scoped key-value persistence
///
/// `id` is the user ID for [`StateScope::User`] and the conversation ID for
/// the other scopes. A missing entry reads as an empty bag.
///
/// Stores do not lock anything themselves: the turn dispatcher serializes
/// read-modify-write cycles per conversation and per user.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// Load a bag, empty if nothing was stored
    async fn get(&self, scope: StateScope, id: &str) -> Result<StateBag, StoreError>;

    /// Replace a bag
    async fn set(&self, scope: StateScope, id: &str, bag: StateBag) -> Result<(), StoreError>;

    /// Replace several bags as one unit
    ///
    /// Either every write lands or, on error, none of them is visible.
    async fn commit(&self, writes: Vec<StateWrite>) -> Result<(), StoreError>;

    /// Remove a bag
    async fn delete(&self, scope: StateScope, id: &str) -> Result<(), StoreError>;

    /// Backend name for logging
    fn backend(&self) -> &str;
}
