// src/strategy/store.rs

//! Catalog store seams for strategies and their attachments.
//!
//! Each trait mirrors one collaborator repository. `MemoryCatalog`
//! implements all of them behind a single lock and is what the tests and
//! in-process setups use.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

use super::{Field, FieldKind, Filter, FilterOp, Selector, Strategy, Visibility};

#[async_trait]
pub trait StrategyStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Strategy>>;
}

#[async_trait]
pub trait SelectorStore: Send + Sync {
    async fn list_for_strategy(&self, strategy_id: Uuid) -> Result<Vec<Selector>>;
}

#[async_trait]
pub trait FieldStore: Send + Sync {
    async fn list_for_strategy(&self, strategy_id: Uuid) -> Result<Vec<Field>>;
}

#[async_trait]
pub trait FilterStore: Send + Sync {
    async fn list_for_strategy(&self, strategy_id: Uuid) -> Result<Vec<Filter>>;
}

#[derive(Default)]
struct CatalogState {
    strategies: HashMap<Uuid, Strategy>,
    selectors: HashMap<Uuid, Selector>,
    fields: HashMap<Uuid, Field>,
    filters: HashMap<Uuid, Filter>,
    // Many-to-many attachment tables
    strategy_selectors: HashMap<Uuid, HashSet<Uuid>>,
    strategy_fields: HashMap<Uuid, HashSet<Uuid>>,
    strategy_filters: HashMap<Uuid, HashSet<Uuid>>,
}

/// In-memory catalog implementing every strategy-related store.
#[derive(Default)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_strategy(&self, user_id: Uuid, name: &str) -> Strategy {
        let strategy = Strategy {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        let mut state = self.state.write().await;
        state.strategies.insert(strategy.id, strategy.clone());
        strategy
    }

    pub async fn insert_selector(
        &self,
        user_id: Uuid,
        value: &str,
        visibility: Visibility,
    ) -> Selector {
        let selector = Selector {
            id: Uuid::new_v4(),
            user_id,
            value: value.to_string(),
            visibility,
        };
        let mut state = self.state.write().await;
        state.selectors.insert(selector.id, selector.clone());
        selector
    }

    pub async fn insert_field(
        &self,
        user_id: Uuid,
        selector_id: Uuid,
        name: &str,
        kind: FieldKind,
    ) -> Field {
        let field = Field {
            id: Uuid::new_v4(),
            user_id,
            selector_id,
            name: name.to_string(),
            kind,
        };
        let mut state = self.state.write().await;
        state.fields.insert(field.id, field.clone());
        field
    }

    pub async fn insert_filter(
        &self,
        user_id: Uuid,
        field_id: Uuid,
        name: &str,
        op: FilterOp,
        value: &str,
    ) -> Filter {
        let filter = Filter {
            id: Uuid::new_v4(),
            user_id,
            field_id,
            name: name.to_string(),
            op,
            value: value.to_string(),
        };
        let mut state = self.state.write().await;
        state.filters.insert(filter.id, filter.clone());
        filter
    }

    pub async fn attach_selector(&self, strategy_id: Uuid, selector_id: Uuid) {
        let mut state = self.state.write().await;
        state
            .strategy_selectors
            .entry(strategy_id)
            .or_default()
            .insert(selector_id);
    }

    pub async fn attach_field(&self, strategy_id: Uuid, field_id: Uuid) {
        let mut state = self.state.write().await;
        state
            .strategy_fields
            .entry(strategy_id)
            .or_default()
            .insert(field_id);
    }

    pub async fn attach_filter(&self, strategy_id: Uuid, filter_id: Uuid) {
        let mut state = self.state.write().await;
        state
            .strategy_filters
            .entry(strategy_id)
            .or_default()
            .insert(filter_id);
    }
}

#[async_trait]
impl StrategyStore for MemoryCatalog {
    async fn get(&self, id: Uuid) -> Result<Option<Strategy>> {
        let state = self.state.read().await;
        Ok(state.strategies.get(&id).cloned())
    }
}

#[async_trait]
impl SelectorStore for MemoryCatalog {
    async fn list_for_strategy(&self, strategy_id: Uuid) -> Result<Vec<Selector>> {
        let state = self.state.read().await;
        Ok(attached(&state.strategy_selectors, &state.selectors, strategy_id))
    }
}

#[async_trait]
impl FieldStore for MemoryCatalog {
    async fn list_for_strategy(&self, strategy_id: Uuid) -> Result<Vec<Field>> {
        let state = self.state.read().await;
        Ok(attached(&state.strategy_fields, &state.fields, strategy_id))
    }
}

#[async_trait]
impl FilterStore for MemoryCatalog {
    async fn list_for_strategy(&self, strategy_id: Uuid) -> Result<Vec<Filter>> {
        let state = self.state.read().await;
        Ok(attached(&state.strategy_filters, &state.filters, strategy_id))
    }
}

fn attached<T: Clone>(
    links: &HashMap<Uuid, HashSet<Uuid>>,
    items: &HashMap<Uuid, T>,
    strategy_id: Uuid,
) -> Vec<T> {
    links
        .get(&strategy_id)
        .map(|ids| ids.iter().filter_map(|id| items.get(id).cloned()).collect())
        .unwrap_or_default()
}
