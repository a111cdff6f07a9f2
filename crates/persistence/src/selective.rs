//! Selective persistence
//!
//! Some deployments must not keep user or conversation data beyond the
//! process. [`SelectiveStore`] serves those scopes from memory and forwards
//! the others to the durable backend. The dialog stack always goes to the
//! durable backend.

use std::sync::Arc;

use async_trait::async_trait;

use supportbot_config::PersistenceConfig;
use supportbot_core::{StateBag, StateScope, StateStore, StateWrite, StoreError};

use crate::memory::InMemoryStateStore;

pub struct SelectiveStore {
    durable: Arc<dyn StateStore>,
    volatile: InMemoryStateStore,
    persist_user: bool,
    persist_conversation: bool,
    name: String,
}

impl SelectiveStore {
    pub fn new(durable: Arc<dyn StateStore>, config: &PersistenceConfig) -> Self {
        let name = format!("selective({})", durable.backend());
        tracing::info!(
            backend = durable.backend(),
            persist_user_data = config.persist_user_data,
            persist_conversation_data = config.persist_conversation_data,
            "Selective persistence enabled"
        );
        Self {
            durable,
            volatile: InMemoryStateStore::new(),
            persist_user: config.persist_user_data,
            persist_conversation: config.persist_conversation_data,
            name,
        }
    }

    /// Whether a scope is written to the durable backend
    pub fn is_persisted(&self, scope: StateScope) -> bool {
        match scope {
            StateScope::User => self.persist_user,
            StateScope::Conversation => self.persist_conversation,
            StateScope::DialogStack => true,
        }
    }

    fn route(&self, scope: StateScope) -> &dyn StateStore {
        if self.is_persisted(scope) {
            self.durable.as_ref()
        } else {
            &self.volatile
        }
    }
}

#[async_trait]
impl StateStore for SelectiveStore {
    async fn get(&self, scope: StateScope, id: &str) -> Result<StateBag, StoreError> {
        self.route(scope).get(scope, id).await
    }

    async fn set(&self, scope: StateScope, id: &str, bag: StateBag) -> Result<(), StoreError> {
        self.route(scope).set(scope, id, bag).await
    }

    async fn commit(&self, writes: Vec<StateWrite>) -> Result<(), StoreError> {
        let (durable, volatile): (Vec<_>, Vec<_>) = writes
            .into_iter()
            .partition(|write| self.is_persisted(write.scope));

        // Memory writes cannot fail, so they follow the durable commit
        if !durable.is_empty() {
            self.durable.commit(durable).await?;
        }
        self.volatile.commit(volatile).await
    }

    async fn delete(&self, scope: StateScope, id: &str) -> Result<(), StoreError> {
        self.route(scope).delete(scope, id).await
    }

    fn backend(&self) -> &str {
        &self.name
    }
}
