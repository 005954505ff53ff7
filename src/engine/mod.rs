// src/engine/mod.rs

//! Relation hook engine.
//!
//! - [`relationer`] owns one relation's state directory and context and
//!   exposes the join / start / stop / prepare / commit / dying protocol.
//! - [`hook_loop`] is the background task feeding the relationer's hook
//!   handoff from a [`HookQueue`](crate::relation::HookQueue).
//! - [`runtime`] drives a relationer through scripted membership changes,
//!   acting as its hook executor loop.

mod hook_loop;
pub mod relationer;
pub mod runtime;

pub use relationer::Relationer;
pub use runtime::{ScenarioReport, ScenarioRuntime};
