// src/types.rs

//! Small identifier types shared by the relation and scope layers.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Numeric identifier of a relation, stable for the relation's lifetime.
pub type RelationId = i64;

/// Name of a unit, e.g. `"mysql/0"`.
pub type UnitName = String;

/// Settings a unit publishes when it enters a relation scope.
pub type Settings = BTreeMap<String, String>;

static UNIT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]*[a-z][a-z0-9]*)*/(0|[1-9][0-9]*)$")
        .expect("unit name pattern is valid")
});

/// Whether `name` is a well-formed unit name (`<service>/<number>`).
pub fn is_valid_unit_name(name: &str) -> bool {
    UNIT_NAME.is_match(name)
}
