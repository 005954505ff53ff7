// src/engine/runtime.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::{RelationConfig, Step};
use crate::engine::relationer::Relationer;
use crate::errors::Result;
use crate::exec::{HookExecutor, HookRun};
use crate::hook::{handoff, HookInfo, HookKind, HookReceiver};
use crate::relation::{read_state_dir, RelationState};
use crate::scope::{Endpoint, MemoryRelation};

/// Outcome of a scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Hooks committed during the run, in delivery order.
    pub runs: Vec<HookRun>,
    /// Persisted state after the run.
    pub state: RelationState,
}

impl ScenarioReport {
    pub fn hooks(&self) -> Vec<HookInfo> {
        self.runs.iter().map(|r| r.info.clone()).collect()
    }
}

/// Plays scripted membership changes against a relationer and acts as its
/// hook executor loop: every delivered hook is prepared, handed to the
/// [`HookExecutor`] and committed.
///
/// A step counts as processed once no hook has arrived for `settle`.
pub struct ScenarioRuntime<E: HookExecutor> {
    relationer: Relationer,
    hooks: HookReceiver,
    relation: MemoryRelation,
    executor: E,
    settle: Duration,
    runs: Vec<HookRun>,
}

impl<E: HookExecutor> std::fmt::Debug for ScenarioRuntime<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRuntime")
            .field("relationer", &self.relationer)
            .field("settle", &self.settle)
            .finish_non_exhaustive()
    }
}

impl<E: HookExecutor> ScenarioRuntime<E> {
    pub fn new(
        relationer: Relationer,
        hooks: HookReceiver,
        relation: MemoryRelation,
        executor: E,
        settle: Duration,
    ) -> Self {
        Self {
            relationer,
            hooks,
            relation,
            executor,
            settle,
            runs: Vec::new(),
        }
    }

    /// Build a runtime for one configured relation, with state under
    /// `state_root` and a fresh in-memory store.
    pub fn from_config(
        endpoint: &str,
        cfg: &RelationConfig,
        state_root: &Path,
        settle: Duration,
        executor: E,
    ) -> Result<Self> {
        let relation = MemoryRelation::new(cfg.id);
        let endpoint = if cfg.implicit {
            Endpoint::implicit(endpoint)
        } else {
            Endpoint::new(endpoint)
        };
        let unit = relation.unit(cfg.local_unit.clone(), endpoint);
        let dir = read_state_dir(state_root, cfg.id)?;
        let (tx, rx) = handoff();
        let relationer =
            Relationer::new(Arc::new(unit), dir, tx).with_settings(cfg.settings.clone());

        Ok(Self::new(relationer, rx, relation, executor, settle))
    }

    pub fn relationer(&self) -> &Relationer {
        &self.relationer
    }

    pub fn relation(&self) -> &MemoryRelation {
        &self.relation
    }

    /// Join, start hooks, play `steps`, then stop hooks.
    pub async fn run(mut self, steps: &[Step]) -> Result<ScenarioReport> {
        info!(relation = self.relation.id(), steps = steps.len(), "scenario started");

        let played = self.play(steps).await;
        let stopped = self.relationer.stop_hooks().await;
        played?;
        stopped?;

        info!(
            relation = self.relation.id(),
            hooks = self.runs.len(),
            "scenario finished"
        );
        Ok(ScenarioReport {
            runs: self.runs,
            state: self.relationer.state().clone(),
        })
    }

    async fn play(&mut self, steps: &[Step]) -> Result<()> {
        self.relationer.join().await?;
        self.relationer.start_hooks()?;
        self.drain().await?;

        for step in steps {
            debug!(relation = self.relation.id(), ?step, "applying step");
            self.apply_step(step).await?;
            self.drain().await?;
        }
        Ok(())
    }

    async fn apply_step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Enter { unit, settings } => {
                self.relation.enter(unit, settings.clone())?;
            }
            Step::Change { unit, settings } => {
                self.relation.write_settings(unit, settings.clone())?;
            }
            Step::Leave { unit } => {
                self.relation.leave(unit);
            }
            Step::Dying => self.relationer.set_dying().await?,
        }
        Ok(())
    }

    /// Run hooks until the stream stays quiet for `settle` or the relation
    /// breaks.
    async fn drain(&mut self) -> Result<()> {
        loop {
            let hi = match timeout(self.settle, self.hooks.recv()).await {
                Ok(Some(hi)) => hi,
                Ok(None) | Err(_) => return Ok(()),
            };
            let broken = hi.kind == HookKind::Broken;
            self.run_hook(hi).await?;
            if broken {
                return Ok(());
            }
        }
    }

    async fn run_hook(&mut self, hi: HookInfo) -> Result<()> {
        let name = self.relationer.prepare_hook(&hi)?;
        let run = HookRun {
            name,
            info: hi.clone(),
            members: self.relationer.context().unit_names(),
        };

        self.executor.run_hook(run.clone()).await?;
        self.relationer.commit_hook(&hi).await?;
        self.runs.push(run);
        Ok(())
    }
}
