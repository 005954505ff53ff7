#![allow(dead_code, unused_imports)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use relhooks::engine::Relationer;
use relhooks::hook::{handoff, HookReceiver};
use relhooks::relation::read_state_dir;
use relhooks::scope::{Endpoint, MemoryRelation};

pub use relhooks_test_utils::init_tracing;

/// Relation id used by every fixture.
pub const REL_ID: i64 = 0;

/// A relationer for unit `u/0` wired to an in-memory relation and a
/// temporary state root.
pub struct Fixture {
    pub relation: MemoryRelation,
    pub hooks: HookReceiver,
    pub relationer: Relationer,
    pub state_root: TempDir,
}

impl Fixture {
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_unit("u/0", endpoint)
    }

    pub fn with_unit(unit: &str, endpoint: Endpoint) -> Self {
        let state_root = TempDir::new().expect("temp state root");
        let relation = MemoryRelation::new(REL_ID);
        let (relationer, hooks) = relationer_for(&relation, unit, endpoint, &state_root);
        Self {
            relation,
            hooks,
            relationer,
            state_root,
        }
    }

    /// Path of this relation's state directory.
    pub fn dir_path(&self) -> PathBuf {
        self.state_root.path().join(REL_ID.to_string())
    }

    /// Replace the relationer with a fresh one reading the persisted state,
    /// as an agent restart would.
    pub fn restart(&mut self, unit: &str, endpoint: Endpoint) {
        let (relationer, hooks) = relationer_for(&self.relation, unit, endpoint, &self.state_root);
        self.relationer = relationer;
        self.hooks = hooks;
    }
}

fn relationer_for(
    relation: &MemoryRelation,
    unit: &str,
    endpoint: Endpoint,
    state_root: &TempDir,
) -> (Relationer, HookReceiver) {
    let dir = read_state_dir(state_root.path(), REL_ID).expect("read state dir");
    let (tx, rx) = handoff();
    let ru = relation.unit(unit, endpoint);
    (Relationer::new(Arc::new(ru), dir, tx), rx)
}
