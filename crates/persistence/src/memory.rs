//! In-memory state store

use async_trait::async_trait;
use dashmap::DashMap;

use supportbot_core::{StateBag, StateScope, StateStore, StateWrite, StoreError};

/// State kept in process memory
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    bags: DashMap<(StateScope, String), StateBag>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bags across all scopes
    pub fn len(&self) -> usize {
        self.bags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bags.is_empty()
    }

    pub fn clear(&self) {
        self.bags.clear();
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, scope: StateScope, id: &str) -> Result<StateBag, StoreError> {
        Ok(self
            .bags
            .get(&(scope, id.to_string()))
            .map(|bag| bag.value().clone())
            .unwrap_or_default())
    }

    async fn set(&self, scope: StateScope, id: &str, bag: StateBag) -> Result<(), StoreError> {
        self.bags.insert((scope, id.to_string()), bag);
        Ok(())
    }

    async fn commit(&self, writes: Vec<StateWrite>) -> Result<(), StoreError> {
        for write in writes {
            self.bags.insert((write.scope, write.id), write.bag);
        }
        Ok(())
    }

    async fn delete(&self, scope: StateScope, id: &str) -> Result<(), StoreError> {
        self.bags.remove(&(scope, id.to_string()));
        Ok(())
    }

    fn backend(&self) -> &str {
        "memory"
    }
}
