//! Change feed event envelope
//!
//! The feed delivers raw rows at-least-once and without ordering guarantees.
//! Decoding happens on the consuming side so a malformed row can be dropped
//! without tearing down the subscription.

use super::snapshot::Order;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Row change kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// Row change delivered by the change feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// The new row, undecoded
    pub row: serde_json::Value,
}

impl ChangeEvent {
    pub fn insert(row: serde_json::Value) -> Self {
        Self {
            kind: ChangeKind::Insert,
            row,
        }
    }

    pub fn update(row: serde_json::Value) -> Self {
        Self {
            kind: ChangeKind::Update,
            row,
        }
    }
}

/// What a viewer is attached to
///
/// Customer tracking follows one order; kitchen and manager dashboards follow
/// a tenant's whole active-order set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum SubscriptionKey {
    Order(String),
    Tenant(String),
}

impl SubscriptionKey {
    pub fn order(id: impl Into<String>) -> Self {
        Self::Order(id.into())
    }

    pub fn tenant(id: impl Into<String>) -> Self {
        Self::Tenant(id.into())
    }

    /// Whether a decoded order belongs to this key
    pub fn matches(&self, order: &Order) -> bool {
        match self {
            SubscriptionKey::Order(id) => order.id == *id,
            SubscriptionKey::Tenant(tenant) => order.tenant_id == *tenant,
        }
    }

    /// Feed-side filter on a raw row
    pub fn matches_row(&self, row: &serde_json::Value) -> bool {
        let (field, expected) = match self {
            SubscriptionKey::Order(id) => ("id", id),
            SubscriptionKey::Tenant(tenant) => ("tenant_id", tenant),
        };
        row.get(field).and_then(|v| v.as_str()) == Some(expected.as_str())
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionKey::Order(id) => write!(f, "order:{}", id),
            SubscriptionKey::Tenant(id) => write!(f, "tenant:{}", id),
        }
    }
}
