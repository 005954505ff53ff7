// src/relation/statedir.rs

//! On-disk persistence of [`RelationState`] for crash recovery.
//!
//! Layout under a state root:
//!
//! ```text
//! <root>/<relation-id>/state.toml
//! ```
//!
//! `state.toml` is replaced atomically (temp file, fsync, rename) on every
//! committed hook. A missing directory or file reads back as an empty state.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{RelhooksError, Result};
use crate::hook::{HookInfo, HookKind};
use crate::relation::state::RelationState;
use crate::types::{is_valid_unit_name, RelationId, UnitName};

/// File name of the serialized state inside a relation directory.
pub const STATE_FILE: &str = "state.toml";

const STATE_TMP_FILE: &str = "state.toml.tmp";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DiskState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    changed_pending: Option<UnitName>,
    #[serde(default)]
    members: BTreeMap<UnitName, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_hook: Option<DiskHook>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DiskHook {
    kind: HookKind,
    #[serde(default)]
    remote_unit: UnitName,
    #[serde(default)]
    change_version: i64,
}

/// Durable home of one relation's [`RelationState`].
///
/// The in-memory copy is only replaced after the disk write succeeded, so
/// the two never disagree after an I/O failure.
#[derive(Debug)]
pub struct StateDir {
    path: PathBuf,
    state: RelationState,
    last_hook: Option<HookInfo>,
}

impl StateDir {
    /// Directory backing this state.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn relation_id(&self) -> RelationId {
        self.state.relation_id
    }

    /// Current (committed) state.
    pub fn state(&self) -> &RelationState {
        &self.state
    }

    /// Last hook durably written, if the directory has recorded one.
    pub fn last_hook(&self) -> Option<&HookInfo> {
        self.last_hook.as_ref()
    }

    /// Create the directory if it does not exist yet.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// Durably record a committed hook and update the in-memory state.
    ///
    /// A `broken` hook removes the directory altogether.
    pub fn write(&mut self, hi: &HookInfo) -> Result<()> {
        self.state.validate(hi)?;

        if hi.kind == HookKind::Broken {
            return self.remove().map_err(|e| write_error(hi, e));
        }

        let mut next = self.state.clone();
        next.apply(hi);

        self.persist(&next, hi).map_err(|e| write_error(hi, e))?;
        debug!(
            relation = self.state.relation_id,
            hook = %hi,
            "recorded hook in state directory"
        );

        self.state = next;
        self.last_hook = Some(hi.clone());
        Ok(())
    }

    /// Remove the directory and mark the relation broken.
    ///
    /// Removing a directory that was never created is not an error.
    pub fn remove(&mut self) -> io::Result<()> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => info!(path = ?self.path, "removed relation state directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        self.state.members.clear();
        self.state.changed_pending = None;
        self.state.broken = true;
        self.last_hook = None;
        Ok(())
    }

    fn persist(&self, state: &RelationState, hi: &HookInfo) -> io::Result<()> {
        fs::create_dir_all(&self.path)?;

        let disk = DiskState {
            changed_pending: state.changed_pending.clone(),
            members: state.members.clone(),
            last_hook: Some(DiskHook {
                kind: hi.kind,
                remote_unit: hi.remote_unit.clone(),
                change_version: hi.change_version,
            }),
        };
        let contents = toml::to_string(&disk).map_err(io::Error::other)?;

        let tmp = self.path.join(STATE_TMP_FILE);
        {
            let mut file = File::create(&tmp)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, self.path.join(STATE_FILE))
    }
}

fn write_error(hi: &HookInfo, source: io::Error) -> RelhooksError {
    RelhooksError::StateWrite {
        kind: hi.kind,
        unit: hi.remote_unit.clone(),
        source,
    }
}

/// Load the state for `relation_id` stored under `root`.
///
/// Nothing is created on disk; call [`StateDir::ensure`] for that.
pub fn read_state_dir(root: impl AsRef<Path>, relation_id: RelationId) -> Result<StateDir> {
    let path = root.as_ref().join(relation_id.to_string());
    let mut state = RelationState::new(relation_id);

    let contents = match fs::read_to_string(path.join(STATE_FILE)) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(StateDir {
                path,
                state,
                last_hook: None,
            });
        }
        Err(e) => return Err(e.into()),
    };

    let disk: DiskState = toml::from_str(&contents).map_err(|e| RelhooksError::CorruptState {
        path: path.clone(),
        reason: e.to_string(),
    })?;

    for unit in disk.members.keys() {
        if !is_valid_unit_name(unit) {
            return Err(RelhooksError::CorruptState {
                path,
                reason: format!("invalid unit name {unit:?}"),
            });
        }
    }
    if let Some(pending) = &disk.changed_pending {
        if !disk.members.contains_key(pending) {
            return Err(RelhooksError::CorruptState {
                path,
                reason: format!("changed-pending unit {pending:?} is not a member"),
            });
        }
    }

    state.members = disk.members;
    state.changed_pending = disk.changed_pending;
    let last_hook = disk.last_hook.map(|h| HookInfo {
        kind: h.kind,
        relation_id,
        remote_unit: h.remote_unit,
        change_version: h.change_version,
    });

    debug!(
        relation = relation_id,
        members = state.members.len(),
        "loaded relation state"
    );

    Ok(StateDir {
        path,
        state,
        last_hook,
    })
}

/// Load every relation state directory found under `root`.
///
/// Entries whose names are not relation ids are ignored; a missing root is
/// treated as empty.
pub fn read_all_state_dirs(root: impl AsRef<Path>) -> Result<BTreeMap<RelationId, StateDir>> {
    let root = root.as_ref();
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };

    let mut dirs = BTreeMap::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(relation_id) = name.to_str().and_then(|n| n.parse::<RelationId>().ok()) else {
            warn!(entry = ?entry.path(), "ignoring non-relation entry in state root");
            continue;
        };
        dirs.insert(relation_id, read_state_dir(root, relation_id)?);
    }

    Ok(dirs)
}
