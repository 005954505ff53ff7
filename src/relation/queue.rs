// src/relation/queue.rs

//! Pure hook generator.
//!
//! [`HookQueue`] turns membership batches into the ordered hooks needed to
//! bring the local unit in sync. It owns no channels and performs no IO, so
//! the whole reconciliation algorithm can be exercised synchronously; the
//! async shell around it lives in `engine::hook_loop`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::hook::{HookInfo, HookKind};
use crate::relation::state::RelationState;
use crate::scope::MembershipChange;
use crate::types::{RelationId, UnitName};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Reconciling against a live watcher; the next batch is a full snapshot.
    AwaitingSnapshot,
    /// Reconciling against a live watcher.
    Alive,
    /// Draining members towards `broken`; watcher input is ignored.
    Dying,
}

/// Ordered queue of hooks for one relation.
///
/// `known` is the membership the local unit will observe once every queued
/// hook has run: persisted members plus the effect of queued hooks. Batches
/// are diffed against it, never against the persisted state directly.
#[derive(Debug)]
pub struct HookQueue {
    relation_id: RelationId,
    mode: Mode,
    known: BTreeMap<UnitName, i64>,
    pending: VecDeque<HookInfo>,
}

impl HookQueue {
    /// Queue for a relation that is alive.
    ///
    /// If a `joined` was committed without its companion `changed`, that
    /// `changed` is queued first.
    pub fn alive(state: &RelationState) -> Self {
        let mut queue = Self::empty(state, Mode::AwaitingSnapshot);
        queue.push_pending_changed(state);
        queue
    }

    /// Queue for a relation that is dying: finish any pending `changed`,
    /// depart every member in name order, then break.
    ///
    /// Empty if `relation-broken` has already been committed.
    pub fn dying(state: &RelationState) -> Self {
        let mut queue = Self::empty(state, Mode::Dying);
        if state.broken {
            return queue;
        }
        queue.push_pending_changed(state);

        let members: Vec<UnitName> = queue.known.keys().cloned().collect();
        for unit in members {
            queue.push(HookInfo::departed(state.relation_id, unit));
        }
        queue.push(HookInfo::broken(state.relation_id));
        queue
    }

    fn empty(state: &RelationState, mode: Mode) -> Self {
        Self {
            relation_id: state.relation_id,
            mode,
            known: state.members.clone(),
            pending: VecDeque::new(),
        }
    }

    fn push_pending_changed(&mut self, state: &RelationState) {
        if let Some(unit) = &state.changed_pending {
            let version = state.members.get(unit).copied().unwrap_or_default();
            self.push(HookInfo::changed(state.relation_id, unit.clone(), version));
        }
    }

    pub fn relation_id(&self) -> RelationId {
        self.relation_id
    }

    pub fn is_dying(&self) -> bool {
        self.mode == Mode::Dying
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Next hook to deliver, if any.
    pub fn peek(&self) -> Option<&HookInfo> {
        self.pending.front()
    }

    /// Remove the next hook once it has been delivered.
    pub fn pop(&mut self) -> Option<HookInfo> {
        self.pending.pop_front()
    }

    /// Units the local unit will consider joined after the queue drains.
    pub fn known_units(&self) -> impl Iterator<Item = &str> {
        self.known.keys().map(String::as_str)
    }

    /// Fold one watcher batch into the queue.
    pub fn apply(&mut self, change: MembershipChange) {
        let MembershipChange {
            changed,
            mut departed,
        } = change;

        match self.mode {
            Mode::Dying => {
                debug!(
                    relation = self.relation_id,
                    changed = changed.len(),
                    departed = departed.len(),
                    "relation dying; ignoring membership change"
                );
                return;
            }
            Mode::AwaitingSnapshot => {
                // Anything we know about that the first batch does not
                // mention left while we were not watching.
                departed.extend(
                    self.known
                        .keys()
                        .filter(|unit| !changed.contains_key(*unit))
                        .cloned(),
                );
                self.mode = Mode::Alive;
            }
            Mode::Alive => {}
        }

        let departed: BTreeSet<UnitName> = departed.into_iter().collect();
        for unit in &departed {
            if self.known.remove(unit).is_some() {
                self.push(HookInfo::departed(self.relation_id, unit.clone()));
            }
        }

        for (unit, version) in changed {
            if departed.contains(&unit) {
                continue;
            }
            match self.known.get(&unit).copied() {
                None => {
                    self.push(HookInfo::joined(self.relation_id, unit.clone(), version));
                    self.push(HookInfo::changed(self.relation_id, unit.clone(), version));
                }
                Some(known) if known != version => {
                    self.push(HookInfo::changed(self.relation_id, unit.clone(), version));
                }
                Some(_) => continue,
            }
            self.known.insert(unit, version);
        }
    }

    fn push(&mut self, hi: HookInfo) {
        debug!(relation = self.relation_id, hook = %hi, "queued hook");
        debug_assert!(
            self.pending.back().map(|h| h.kind) != Some(HookKind::Broken),
            "no hook may follow relation-broken"
        );
        self.pending.push_back(hi);
    }
}
