// src/relation/state.rs

//! Persisted relation membership as seen by the local unit.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::hook::{HookInfo, HookKind};
use crate::types::{RelationId, UnitName};

/// Why a hook is not acceptable for the current [`RelationState`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    #[error("expected relation {expected}, got relation {got}")]
    WrongRelation {
        expected: RelationId,
        got: RelationId,
    },

    #[error("relation is broken and cannot be changed further")]
    Broken,

    #[error("cannot run \"relation-broken\" while units still present")]
    UnitsStillPresent,

    #[error("expected \"relation-changed\" for \"{0}\"")]
    ExpectedChanged(UnitName),

    #[error("unit already joined")]
    AlreadyJoined,

    #[error("unit has not joined")]
    NotJoined,
}

/// A hook that cannot run against the current relation state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("inappropriate \"{kind}\" for \"{unit}\": {reason}")]
pub struct ValidationError {
    pub kind: HookKind,
    pub unit: UnitName,
    pub reason: ValidationReason,
}

/// Relation state for a single relation.
///
/// `members` maps each remote unit that has had a `joined` hook committed
/// (and no `departed` since) to the settings version last committed for it.
/// `changed_pending` names a unit whose `joined` has been committed but whose
/// initial `changed` has not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationState {
    pub relation_id: RelationId,
    pub members: BTreeMap<UnitName, i64>,
    pub changed_pending: Option<UnitName>,
    pub broken: bool,
}

impl RelationState {
    pub fn new(relation_id: RelationId) -> Self {
        Self {
            relation_id,
            members: BTreeMap::new(),
            changed_pending: None,
            broken: false,
        }
    }

    pub fn is_member(&self, unit: &str) -> bool {
        self.members.contains_key(unit)
    }

    /// Check that `hi` is the kind of hook that may run next.
    pub fn validate(&self, hi: &HookInfo) -> Result<(), ValidationError> {
        self.check(hi).map_err(|reason| ValidationError {
            kind: hi.kind,
            unit: hi.remote_unit.clone(),
            reason,
        })
    }

    fn check(&self, hi: &HookInfo) -> Result<(), ValidationReason> {
        if hi.relation_id != self.relation_id {
            return Err(ValidationReason::WrongRelation {
                expected: self.relation_id,
                got: hi.relation_id,
            });
        }
        if self.broken {
            return Err(ValidationReason::Broken);
        }

        match hi.kind {
            HookKind::Broken if self.members.is_empty() => Ok(()),
            HookKind::Broken => Err(ValidationReason::UnitsStillPresent),
            HookKind::Joined | HookKind::Changed | HookKind::Departed => {
                self.check_unit_hook(hi)
            }
        }
    }

    fn check_unit_hook(&self, hi: &HookInfo) -> Result<(), ValidationReason> {
        if let Some(pending) = &self.changed_pending {
            if *pending == hi.remote_unit && hi.kind == HookKind::Changed {
                return Ok(());
            }
            return Err(ValidationReason::ExpectedChanged(pending.clone()));
        }

        let joined = self.is_member(&hi.remote_unit);
        match (hi.kind, joined) {
            (HookKind::Joined, true) => Err(ValidationReason::AlreadyJoined),
            (HookKind::Changed | HookKind::Departed, false) => Err(ValidationReason::NotJoined),
            _ => Ok(()),
        }
    }

    /// Record the effect of a committed hook.
    ///
    /// Callers are expected to have run [`validate`](Self::validate) first.
    pub fn apply(&mut self, hi: &HookInfo) {
        match hi.kind {
            HookKind::Joined => {
                self.members
                    .insert(hi.remote_unit.clone(), hi.change_version);
                self.changed_pending = Some(hi.remote_unit.clone());
            }
            HookKind::Changed => {
                self.members
                    .insert(hi.remote_unit.clone(), hi.change_version);
                self.changed_pending = None;
            }
            HookKind::Departed => {
                self.members.remove(&hi.remote_unit);
                self.changed_pending = None;
            }
            HookKind::Broken => {
                self.members.clear();
                self.changed_pending = None;
                self.broken = true;
            }
        }
    }
}
