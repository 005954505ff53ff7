// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::types::{RelationId, Settings, UnitName};

/// Top-level scenario configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// state_dir = ".relhooks"
/// settle = "100ms"
///
/// [relation.ring]
/// id = 0
/// local_unit = "u/0"
/// steps = [
///   { action = "enter", unit = "u/1" },
///   { action = "dying" },
/// ]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Global settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Relations from `[relation.<endpoint>]`, keyed by endpoint name.
    #[serde(default)]
    pub relation: BTreeMap<String, RelationConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Root directory holding one state directory per relation id.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// How long the hook stream must stay quiet before a step is considered
    /// fully processed (e.g. `"100ms"`, `"2s"`).
    #[serde(default = "default_settle")]
    pub settle: String,
}

fn default_state_dir() -> String {
    ".relhooks".to_string()
}

fn default_settle() -> String {
    "100ms".to_string()
}

fn default_local_unit() -> String {
    "u/0".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            settle: default_settle(),
        }
    }
}

impl ConfigSection {
    /// Parsed `settle` duration. Only valid after validation.
    pub fn settle_duration(&self) -> Duration {
        parse_duration(&self.settle).unwrap_or(Duration::from_millis(100))
    }
}

/// `[relation.<endpoint>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RelationConfig {
    /// Relation id; also the name of its state directory.
    pub id: RelationId,

    /// The unit running the relationer.
    #[serde(default = "default_local_unit")]
    pub local_unit: UnitName,

    /// Implicit endpoints never run hooks.
    #[serde(default)]
    pub implicit: bool,

    /// Settings the local unit publishes when joining.
    #[serde(default)]
    pub settings: Settings,

    /// Membership changes to play against the relation, in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One scripted change to the relation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Step {
    /// A remote unit enters scope.
    Enter {
        unit: UnitName,
        #[serde(default)]
        settings: Settings,
    },
    /// A remote unit rewrites its settings.
    Change {
        unit: UnitName,
        #[serde(default)]
        settings: Settings,
    },
    /// A remote unit leaves scope.
    Leave { unit: UnitName },
    /// The relation starts dying.
    Dying,
}

impl Step {
    /// Remote unit named by this step, if any.
    pub fn unit(&self) -> Option<&str> {
        match self {
            Step::Enter { unit, .. } | Step::Change { unit, .. } | Step::Leave { unit } => {
                Some(unit)
            }
            Step::Dying => None,
        }
    }
}

/// Parse a duration string such as `"250ms"`, `"3s"`, `"1m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => scaled_secs(value, 60),
        "h" => scaled_secs(value, 60 * 60),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}

fn scaled_secs(value: u64, secs_per_unit: u64) -> Result<Duration, String> {
    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration too large: {value} x {secs_per_unit}s"))
}
