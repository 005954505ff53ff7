#![allow(dead_code)]

use std::collections::BTreeMap;

use relhooks::config::{ConfigFile, ConfigSection, RelationConfig, Step};
use relhooks::types::Settings;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: ConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: ConfigFile {
                config: ConfigSection::default(),
                relation: BTreeMap::new(),
            },
        }
    }

    pub fn state_dir(mut self, dir: &str) -> Self {
        self.config.config.state_dir = dir.to_string();
        self
    }

    pub fn settle(mut self, settle: &str) -> Self {
        self.config.config.settle = settle.to_string();
        self
    }

    pub fn with_relation(mut self, name: &str, relation: RelationConfig) -> Self {
        self.config.relation.insert(name.to_string(), relation);
        self
    }

    pub fn build(self) -> ConfigFile {
        self.config
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RelationConfig`.
pub struct RelationConfigBuilder {
    relation: RelationConfig,
}

impl RelationConfigBuilder {
    pub fn new(id: i64) -> Self {
        Self {
            relation: RelationConfig {
                id,
                local_unit: "u/0".to_string(),
                implicit: false,
                settings: Settings::new(),
                steps: vec![],
            },
        }
    }

    pub fn local_unit(mut self, unit: &str) -> Self {
        self.relation.local_unit = unit.to_string();
        self
    }

    pub fn implicit(mut self, val: bool) -> Self {
        self.relation.implicit = val;
        self
    }

    pub fn setting(mut self, key: &str, value: &str) -> Self {
        self.relation
            .settings
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn enter(mut self, unit: &str) -> Self {
        self.relation.steps.push(Step::Enter {
            unit: unit.to_string(),
            settings: Settings::new(),
        });
        self
    }

    pub fn change(mut self, unit: &str) -> Self {
        self.relation.steps.push(Step::Change {
            unit: unit.to_string(),
            settings: Settings::new(),
        });
        self
    }

    pub fn leave(mut self, unit: &str) -> Self {
        self.relation.steps.push(Step::Leave {
            unit: unit.to_string(),
        });
        self
    }

    pub fn dying(mut self) -> Self {
        self.relation.steps.push(Step::Dying);
        self
    }

    pub fn build(self) -> RelationConfig {
        self.relation
    }
}

/// Settings map from key/value pairs.
pub fn settings(pairs: &[(&str, &str)]) -> Settings {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
