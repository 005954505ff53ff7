// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{parse_duration, ConfigFile, RelationConfig, Step};
use crate::errors::{RelhooksError, Result};
use crate::types::is_valid_unit_name;

/// Check a parsed config for semantic problems.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_relations(cfg)?;
    validate_global_config(cfg)?;
    validate_relation_ids(cfg)?;
    for (name, rel) in cfg.relation.iter() {
        validate_relation(name, rel)?;
    }
    Ok(())
}

fn ensure_has_relations(cfg: &ConfigFile) -> Result<()> {
    if cfg.relation.is_empty() {
        return Err(RelhooksError::ConfigError(
            "config must contain at least one [relation.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &ConfigFile) -> Result<()> {
    if cfg.config.state_dir.trim().is_empty() {
        return Err(RelhooksError::ConfigError(
            "[config].state_dir must not be empty".to_string(),
        ));
    }

    parse_duration(&cfg.config.settle)
        .map_err(|e| RelhooksError::ConfigError(format!("[config].settle: {e}")))?;

    Ok(())
}

fn validate_relation_ids(cfg: &ConfigFile) -> Result<()> {
    let mut seen: BTreeMap<i64, &str> = BTreeMap::new();
    for (name, rel) in cfg.relation.iter() {
        if rel.id < 0 {
            return Err(RelhooksError::ConfigError(format!(
                "relation '{}' has negative id {}",
                name, rel.id
            )));
        }
        if let Some(other) = seen.insert(rel.id, name) {
            return Err(RelhooksError::ConfigError(format!(
                "relations '{}' and '{}' share id {}",
                other, name, rel.id
            )));
        }
    }
    Ok(())
}

fn validate_relation(name: &str, rel: &RelationConfig) -> Result<()> {
    if !is_valid_unit_name(&rel.local_unit) {
        return Err(RelhooksError::ConfigError(format!(
            "relation '{}' has invalid local_unit '{}'",
            name, rel.local_unit
        )));
    }

    for (idx, step) in rel.steps.iter().enumerate() {
        let Some(unit) = step.unit() else {
            continue;
        };
        if !is_valid_unit_name(unit) {
            return Err(RelhooksError::ConfigError(format!(
                "relation '{}' step {} names invalid unit '{}'",
                name, idx, unit
            )));
        }
        if unit == rel.local_unit {
            return Err(RelhooksError::ConfigError(format!(
                "relation '{}' step {} acts on the local unit '{}'",
                name, idx, unit
            )));
        }
    }

    let dying_steps = rel.steps.iter().filter(|s| **s == Step::Dying).count();
    if dying_steps > 1 {
        return Err(RelhooksError::ConfigError(format!(
            "relation '{}' has {} dying steps; at most one is allowed",
            name, dying_steps
        )));
    }

    Ok(())
}
