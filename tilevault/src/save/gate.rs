//! Confirmation hooks.
//!
//! A [`SaveGate`] sees the fully computed [`SaveStatus`] (tile count,
//! zoom range, known tables) before any download starts and decides
//! whether, and into which table, the save proceeds. A [`RemovalGate`]
//! confirms dropping the active table.

use super::status::SaveStatus;
use crate::store::BoxFuture;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Proceed into the table named by the request.
    Proceed,
    /// Proceed into the named table.
    ProceedInto(String),
    /// Abandon the save.
    Decline,
}

pub trait SaveGate: Send + Sync {
    fn confirm<'a>(&'a self, status: &'a SaveStatus) -> BoxFuture<'a, GateDecision>;
}

pub trait RemovalGate: Send + Sync {
    /// Returns true to drop `table`.
    fn confirm<'a>(&'a self, table: &'a str, status: &'a SaveStatus) -> BoxFuture<'a, bool>;
}

/// Gate answering every request with the same decision.
#[derive(Debug, Clone)]
pub struct FixedGate(pub GateDecision);

impl SaveGate for FixedGate {
    fn confirm<'a>(&'a self, _status: &'a SaveStatus) -> BoxFuture<'a, GateDecision> {
        let decision = self.0.clone();
        Box::pin(async move { decision })
    }
}

impl RemovalGate for FixedGate {
    fn confirm<'a>(&'a self, _table: &'a str, _status: &'a SaveStatus) -> BoxFuture<'a, bool> {
        let allow = self.0 != GateDecision::Decline;
        Box::pin(async move { allow })
    }
}
