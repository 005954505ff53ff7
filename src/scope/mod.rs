// src/scope/mod.rs

//! Interface to the distributed membership store.
//!
//! The relationer never talks to the store directly; it goes through a
//! [`RelationUnit`] handle (enter/leave scope, watch the other members) and
//! the [`MembershipWatcher`] it returns. Production deployments provide
//! their own implementation; [`memory`] is an in-process store used by the
//! scenario runner and the tests.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

use crate::errors::Result;
use crate::types::{RelationId, Settings, UnitName};

pub mod memory;

pub use memory::{MemoryRelation, MemoryRelationUnit, MemoryWatcher};

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One batch of membership changes observed by a watcher.
///
/// `changed` maps each unit whose settings changed (or which just entered
/// scope) to its current settings version. The first batch a watcher yields
/// lists every unit in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipChange {
    pub changed: BTreeMap<UnitName, i64>,
    pub departed: Vec<UnitName>,
}

impl MembershipChange {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.departed.is_empty()
    }
}

/// The local unit's endpoint in a relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    /// Implicit endpoints (e.g. `juju-info`) never run hooks.
    pub implicit: bool,
}

impl Endpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implicit: false,
        }
    }

    pub fn implicit(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implicit: true,
        }
    }

    pub fn is_implicit(&self) -> bool {
        self.implicit
    }
}

/// Stream of membership batches for the other units of a relation.
pub trait MembershipWatcher: Send {
    /// Next batch; `None` once the watcher has been closed by the store.
    fn next(&mut self) -> BoxFuture<'_, Option<Result<MembershipChange>>>;
}

/// The local unit's participation in one relation.
pub trait RelationUnit: Send + Sync {
    fn relation_id(&self) -> RelationId;

    fn unit_name(&self) -> &str;

    fn endpoint(&self) -> &Endpoint;

    /// Announce the local unit in the relation scope with `settings`.
    ///
    /// Entering a scope the unit is already in must be a no-op.
    fn enter_scope(&self, settings: Settings) -> BoxFuture<'_, Result<()>>;

    /// Withdraw the local unit from the relation scope.
    fn leave_scope(&self) -> BoxFuture<'_, Result<()>>;

    /// Start watching the other units in scope.
    fn watch(&self) -> Result<Box<dyn MembershipWatcher>>;
}
