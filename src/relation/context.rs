// src/relation/context.rs

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use crate::types::{RelationId, UnitName};

#[derive(Debug)]
struct Inner {
    relation_id: RelationId,
    endpoint: String,
    units: BTreeSet<UnitName>,
}

/// The relation as visible to a running hook.
///
/// A cheap, shared handle: clones observe the same membership, so a hook
/// executor can hold one while the relationer keeps it up to date.
#[derive(Debug, Clone)]
pub struct RelationContext {
    inner: Arc<RwLock<Inner>>,
}

impl RelationContext {
    pub fn new(
        relation_id: RelationId,
        endpoint: impl Into<String>,
        units: impl IntoIterator<Item = UnitName>,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                relation_id,
                endpoint: endpoint.into(),
                units: units.into_iter().collect(),
            })),
        }
    }

    pub fn relation_id(&self) -> RelationId {
        self.read(|inner| inner.relation_id)
    }

    /// Endpoint name, used as the hook name prefix.
    pub fn name(&self) -> String {
        self.read(|inner| inner.endpoint.clone())
    }

    /// Remote units currently visible, in name order.
    pub fn unit_names(&self) -> Vec<UnitName> {
        self.read(|inner| inner.units.iter().cloned().collect())
    }

    pub fn contains(&self, unit: &str) -> bool {
        self.read(|inner| inner.units.contains(unit))
    }

    pub(crate) fn add_unit(&self, unit: &str) {
        self.write(|inner| {
            inner.units.insert(unit.to_string());
        });
    }

    pub(crate) fn remove_unit(&self, unit: &str) {
        self.write(|inner| {
            inner.units.remove(unit);
        });
    }

    pub(crate) fn clear(&self) {
        self.write(|inner| inner.units.clear());
    }

    // Poisoning is ignored: every update leaves the set consistent.
    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }
}
