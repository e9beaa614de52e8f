// src/strategy/mod.rs

//! Extraction strategies and their resolution.
//!
//! A strategy is a named, reusable extraction configuration. Selectors,
//! fields, and filters are attached to it after creation; the assembler's
//! job is to load the whole composition in one read-only pass.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RanagError, Result};

mod store;

pub use store::{
    FieldStore, FilterStore, MemoryCatalog, SelectorStore, StrategyStore,
};

/// Who may see and reuse a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// Type of an extracted field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    String,
    Integer,
    Float,
}

/// Predicate applied to a field's extracted value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Equals,
    Contains,
}

/// A content-locating expression, e.g. a CSS-like path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selector {
    pub id: Uuid,
    pub user_id: Uuid,
    pub value: String,
    pub visibility: Visibility,
}

/// A named, typed output slot bound to exactly one selector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub id: Uuid,
    pub user_id: Uuid,
    pub selector_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
}

/// An include/exclude predicate over one field's value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub id: Uuid,
    pub user_id: Uuid,
    pub field_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub op: FilterOp,
    pub value: String,
}

/// A named extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A strategy together with its attached selectors, fields, and filters.
///
/// This is what gets serialized onto the wire for each dispatch.
#[derive(Debug, Clone)]
pub struct ResolvedStrategy {
    pub strategy: Strategy,
    pub selectors: Vec<Selector>,
    pub fields: Vec<Field>,
    pub filters: Vec<Filter>,
}

/// Resolves strategies into their constituent parts.
///
/// Read-only composition over the individual catalog stores; performs no
/// validation beyond existence of the strategy itself.
pub struct StrategyAssembler {
    strategies: Arc<dyn StrategyStore>,
    selectors: Arc<dyn SelectorStore>,
    fields: Arc<dyn FieldStore>,
    filters: Arc<dyn FilterStore>,
}

impl StrategyAssembler {
    pub fn new(
        strategies: Arc<dyn StrategyStore>,
        selectors: Arc<dyn SelectorStore>,
        fields: Arc<dyn FieldStore>,
        filters: Arc<dyn FilterStore>,
    ) -> Self {
        Self {
            strategies,
            selectors,
            fields,
            filters,
        }
    }

    /// Build an assembler with every store backed by one catalog.
    pub fn from_catalog(catalog: Arc<MemoryCatalog>) -> Self {
        Self::new(
            catalog.clone(),
            catalog.clone(),
            catalog.clone(),
            catalog,
        )
    }

    /// Load a strategy and everything attached to it.
    pub async fn resolve(&self, strategy_id: Uuid) -> Result<ResolvedStrategy> {
        let strategy = self
            .strategies
            .get(strategy_id)
            .await?
            .ok_or_else(|| RanagError::not_found("strategy", strategy_id))?;

        let selectors = self.selectors.list_for_strategy(strategy_id).await?;
        let fields = self.fields.list_for_strategy(strategy_id).await?;
        let filters = self.filters.list_for_strategy(strategy_id).await?;

        tracing::debug!(
            strategy_id = %strategy_id,
            selectors = selectors.len(),
            fields = fields.len(),
            filters = filters.len(),
            "strategy resolved"
        );

        Ok(ResolvedStrategy {
            strategy,
            selectors,
            fields,
            filters,
        })
    }
}
