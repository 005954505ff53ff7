// src/hook/mod.rs

//! Relation hook descriptions and the handoff used to deliver them.
//!
//! - [`HookKind`] / [`HookInfo`] describe one lifecycle event for a relation.
//! - [`handoff`] is the rendezvous between the background reconciliation
//!   loop and the single hook executor consuming its output.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{RelationId, UnitName};

pub mod handoff;

pub use handoff::{handoff, HookReceiver, HookSender};

/// The four relation lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookKind {
    Joined,
    Changed,
    Departed,
    Broken,
}

impl HookKind {
    /// Hook name suffix as seen by the workload, e.g. `relation-joined`.
    pub fn as_str(self) -> &'static str {
        match self {
            HookKind::Joined => "relation-joined",
            HookKind::Changed => "relation-changed",
            HookKind::Departed => "relation-departed",
            HookKind::Broken => "relation-broken",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single relation hook that must run for the local unit.
///
/// `remote_unit` is empty for [`HookKind::Broken`]; `change_version` is only
/// meaningful for `Joined` and `Changed`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HookInfo {
    pub kind: HookKind,
    pub relation_id: RelationId,
    pub remote_unit: UnitName,
    pub change_version: i64,
}

impl HookInfo {
    pub fn joined(relation_id: RelationId, unit: impl Into<UnitName>, version: i64) -> Self {
        Self {
            kind: HookKind::Joined,
            relation_id,
            remote_unit: unit.into(),
            change_version: version,
        }
    }

    pub fn changed(relation_id: RelationId, unit: impl Into<UnitName>, version: i64) -> Self {
        Self {
            kind: HookKind::Changed,
            relation_id,
            remote_unit: unit.into(),
            change_version: version,
        }
    }

    pub fn departed(relation_id: RelationId, unit: impl Into<UnitName>) -> Self {
        Self {
            kind: HookKind::Departed,
            relation_id,
            remote_unit: unit.into(),
            change_version: 0,
        }
    }

    pub fn broken(relation_id: RelationId) -> Self {
        Self {
            kind: HookKind::Broken,
            relation_id,
            remote_unit: UnitName::new(),
            change_version: 0,
        }
    }

    /// Full hook name for a relation endpoint, e.g. `db-relation-changed`.
    pub fn hook_name(&self, endpoint: &str) -> String {
        format!("{endpoint}-{}", self.kind)
    }
}

impl fmt::Display for HookInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            HookKind::Broken => write!(f, "{} (relation {})", self.kind, self.relation_id),
            HookKind::Departed => write!(
                f,
                "{} {} (relation {})",
                self.kind, self.remote_unit, self.relation_id
            ),
            HookKind::Joined | HookKind::Changed => write!(
                f,
                "{} {} v{} (relation {})",
                self.kind, self.remote_unit, self.change_version, self.relation_id
            ),
        }
    }
}
