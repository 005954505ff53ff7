// src/scope/memory.rs

//! In-process membership store.
//!
//! Good enough to drive a relationer end to end: units enter and leave scope,
//! settings writes bump a per-unit version, and every watcher sees the other
//! units (never its own) as a snapshot followed by incremental batches.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::{RelhooksError, Result};
use crate::scope::{BoxFuture, Endpoint, MembershipChange, MembershipWatcher, RelationUnit};
use crate::types::{is_valid_unit_name, RelationId, Settings, UnitName};

#[derive(Debug)]
struct UnitRecord {
    version: i64,
    settings: Settings,
}

#[derive(Debug)]
struct WatcherSlot {
    observer: UnitName,
    tx: mpsc::UnboundedSender<MembershipChange>,
}

#[derive(Debug, Default)]
struct Inner {
    in_scope: BTreeMap<UnitName, UnitRecord>,
    /// Last settings version per unit, kept across leave/enter.
    versions: BTreeMap<UnitName, i64>,
    watchers: Vec<WatcherSlot>,
}

impl Inner {
    fn notify(&mut self, unit: &str, change: MembershipChange) {
        self.watchers.retain(|slot| {
            if slot.observer == unit {
                return !slot.tx.is_closed();
            }
            slot.tx.send(change.clone()).is_ok()
        });
    }
}

/// One relation in the in-memory store.
#[derive(Debug, Clone)]
pub struct MemoryRelation {
    id: RelationId,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryRelation {
    pub fn new(id: RelationId) -> Self {
        Self {
            id,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    pub fn id(&self) -> RelationId {
        self.id
    }

    /// Handle for `unit` participating through `endpoint`.
    pub fn unit(&self, unit: impl Into<UnitName>, endpoint: Endpoint) -> MemoryRelationUnit {
        MemoryRelationUnit {
            relation: self.clone(),
            unit: unit.into(),
            endpoint,
        }
    }

    /// Units currently in scope.
    pub fn units_in_scope(&self) -> Vec<UnitName> {
        self.lock().in_scope.keys().cloned().collect()
    }

    pub fn in_scope(&self, unit: &str) -> bool {
        self.lock().in_scope.contains_key(unit)
    }

    /// Current settings version of a unit in scope.
    pub fn version_of(&self, unit: &str) -> Option<i64> {
        self.lock().in_scope.get(unit).map(|r| r.version)
    }

    pub fn settings_of(&self, unit: &str) -> Option<Settings> {
        self.lock().in_scope.get(unit).map(|r| r.settings.clone())
    }

    /// Put `unit` in scope. Returns `false` if it already was.
    pub fn enter(&self, unit: &str, settings: Settings) -> Result<bool> {
        if !is_valid_unit_name(unit) {
            return Err(RelhooksError::Scope(format!("invalid unit name {unit:?}")));
        }

        let mut inner = self.lock();
        if inner.in_scope.contains_key(unit) {
            return Ok(false);
        }

        let version = inner.versions.get(unit).map_or(0, |v| v + 1);
        inner.versions.insert(unit.to_string(), version);
        inner
            .in_scope
            .insert(unit.to_string(), UnitRecord { version, settings });
        debug!(relation = self.id, unit, version, "unit entered scope");

        let mut change = MembershipChange::default();
        change.changed.insert(unit.to_string(), version);
        inner.notify(unit, change);
        Ok(true)
    }

    /// Take `unit` out of scope. Returns `false` if it was not in scope.
    pub fn leave(&self, unit: &str) -> bool {
        let mut inner = self.lock();
        if inner.in_scope.remove(unit).is_none() {
            return false;
        }
        debug!(relation = self.id, unit, "unit left scope");

        inner.notify(
            unit,
            MembershipChange {
                changed: BTreeMap::new(),
                departed: vec![unit.to_string()],
            },
        );
        true
    }

    /// Replace the settings of a unit in scope, bumping its version.
    pub fn write_settings(&self, unit: &str, settings: Settings) -> Result<i64> {
        let mut inner = self.lock();
        let Some(record) = inner.in_scope.get_mut(unit) else {
            return Err(RelhooksError::Scope(format!(
                "unit {unit:?} is not in scope of relation {}",
                self.id
            )));
        };

        record.version += 1;
        record.settings = settings;
        let version = record.version;
        inner.versions.insert(unit.to_string(), version);
        debug!(relation = self.id, unit, version, "unit settings changed");

        let mut change = MembershipChange::default();
        change.changed.insert(unit.to_string(), version);
        inner.notify(unit, change);
        Ok(version)
    }

    /// Watch every unit in scope other than `observer`.
    pub fn watch(&self, observer: &str) -> MemoryWatcher {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();

        let snapshot = MembershipChange {
            changed: inner
                .in_scope
                .iter()
                .filter(|(unit, _)| unit.as_str() != observer)
                .map(|(unit, record)| (unit.clone(), record.version))
                .collect(),
            departed: Vec::new(),
        };
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(snapshot);

        inner.watchers.push(WatcherSlot {
            observer: observer.to_string(),
            tx,
        });
        MemoryWatcher { rx }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A unit's handle onto a [`MemoryRelation`].
#[derive(Debug, Clone)]
pub struct MemoryRelationUnit {
    relation: MemoryRelation,
    unit: UnitName,
    endpoint: Endpoint,
}

impl MemoryRelationUnit {
    pub fn relation(&self) -> &MemoryRelation {
        &self.relation
    }

    /// Replace this unit's settings.
    pub fn write_settings(&self, settings: Settings) -> Result<i64> {
        self.relation.write_settings(&self.unit, settings)
    }
}

impl RelationUnit for MemoryRelationUnit {
    fn relation_id(&self) -> RelationId {
        self.relation.id
    }

    fn unit_name(&self) -> &str {
        &self.unit
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn enter_scope(&self, settings: Settings) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.relation.enter(&self.unit, settings)?;
            Ok(())
        })
    }

    fn leave_scope(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.relation.leave(&self.unit);
            Ok(())
        })
    }

    fn watch(&self) -> Result<Box<dyn MembershipWatcher>> {
        Ok(Box::new(self.relation.watch(&self.unit)))
    }
}

/// Watcher over a [`MemoryRelation`].
#[derive(Debug)]
pub struct MemoryWatcher {
    rx: mpsc::UnboundedReceiver<MembershipChange>,
}

impl MembershipWatcher for MemoryWatcher {
    fn next(&mut self) -> BoxFuture<'_, Option<Result<MembershipChange>>> {
        Box::pin(async move { self.rx.recv().await.map(Ok) })
    }
}
