// src/engine/relationer.rs

use std::sync::Arc;

use tracing::{debug, info};

use crate::engine::hook_loop::HookLoop;
use crate::errors::Result;
use crate::hook::{HookInfo, HookKind, HookSender};
use crate::relation::{HookQueue, RelationContext, RelationState, StateDir};
use crate::scope::RelationUnit;
use crate::types::Settings;

/// Manages the local unit's participation in one relation.
///
/// A relationer joins the relation scope, runs a background loop turning
/// membership changes into hooks delivered through a [`HookSender`], and
/// applies the two-phase `prepare_hook` / `commit_hook` protocol used by the
/// hook executor to advance the persisted [`RelationState`].
///
/// Protocol misuse (double `start_hooks`, `join` after `set_dying`, running
/// hooks for an implicit relation) panics; everything else is a `Result`.
pub struct Relationer {
    unit: Arc<dyn RelationUnit>,
    dir: StateDir,
    ctx: RelationContext,
    hooks: HookSender,
    settings: Settings,
    hook_loop: Option<HookLoop>,
    dying: bool,
}

impl std::fmt::Debug for Relationer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relationer")
            .field("relation_id", &self.dir.relation_id())
            .field("unit", &self.unit.unit_name())
            .field("endpoint", self.unit.endpoint())
            .field("hook_loop", &self.hook_loop)
            .field("dying", &self.dying)
            .finish_non_exhaustive()
    }
}

impl Relationer {
    pub fn new(unit: Arc<dyn RelationUnit>, dir: StateDir, hooks: HookSender) -> Self {
        let ctx = RelationContext::new(
            unit.relation_id(),
            unit.endpoint().name.clone(),
            dir.state().members.keys().cloned(),
        );
        Self {
            unit,
            dir,
            ctx,
            hooks,
            settings: Settings::new(),
            hook_loop: None,
            dying: false,
        }
    }

    /// Settings published when entering scope.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Shared view of the relation for hook execution.
    pub fn context(&self) -> RelationContext {
        self.ctx.clone()
    }

    pub fn is_implicit(&self) -> bool {
        self.unit.endpoint().is_implicit()
    }

    pub fn is_dying(&self) -> bool {
        self.dying
    }

    pub fn hooks_started(&self) -> bool {
        self.hook_loop.is_some()
    }

    /// Committed relation state.
    pub fn state(&self) -> &RelationState {
        self.dir.state()
    }

    /// Enter the relation scope so other units can see the local unit.
    ///
    /// The state directory is not created here; it appears when the first
    /// hook is prepared.
    pub async fn join(&mut self) -> Result<()> {
        if self.dying {
            panic!("dying relationer must not join!");
        }
        self.unit.enter_scope(self.settings.clone()).await?;
        info!(
            relation = self.dir.relation_id(),
            unit = self.unit.unit_name(),
            "joined relation scope"
        );
        Ok(())
    }

    /// Mark the relation dying.
    ///
    /// Implicit relations leave scope and drop their state right away. For
    /// other relations, a running hook loop is restarted so that it drains the
    /// remaining members and finishes with `relation-broken`.
    pub async fn set_dying(&mut self) -> Result<()> {
        if self.is_implicit() {
            self.die().await?;
        }
        self.dying = true;
        info!(relation = self.dir.relation_id(), "relation dying");

        if self.hook_loop.is_some() {
            self.stop_hooks().await?;
            self.start_hooks()?;
        }
        Ok(())
    }

    /// Start delivering hooks in the background.
    pub fn start_hooks(&mut self) -> Result<()> {
        if self.is_implicit() {
            return Ok(());
        }
        if self.hook_loop.is_some() {
            panic!("hooks already started!");
        }

        let state = self.dir.state();
        let hook_loop = if self.dying {
            HookLoop::spawn(HookQueue::dying(state), None, self.hooks.clone())
        } else {
            let watcher = self.unit.watch()?;
            HookLoop::spawn(HookQueue::alive(state), Some(watcher), self.hooks.clone())
        };
        self.hook_loop = Some(hook_loop);
        Ok(())
    }

    /// Stop delivering hooks and wait for the background loop to exit.
    ///
    /// Safe to call when hooks are not running. Returns the loop's error if
    /// it had failed.
    pub async fn stop_hooks(&mut self) -> Result<()> {
        match self.hook_loop.take() {
            Some(hook_loop) => hook_loop.stop().await,
            None => Ok(()),
        }
    }

    /// Check that `hi` may run and return its hook name.
    ///
    /// Persisted state is left untouched, so preparing the same hook again
    /// after a crash behaves identically.
    pub fn prepare_hook(&mut self, hi: &HookInfo) -> Result<String> {
        if self.is_implicit() {
            panic!("implicit relations must not run hooks");
        }
        self.dir.state().validate(hi)?;
        self.dir.ensure()?;

        match hi.kind {
            HookKind::Joined | HookKind::Changed => self.ctx.add_unit(&hi.remote_unit),
            HookKind::Departed | HookKind::Broken => {}
        }

        let name = hi.hook_name(&self.unit.endpoint().name);
        debug!(relation = self.dir.relation_id(), hook = %name, unit = %hi.remote_unit, "prepared hook");
        Ok(name)
    }

    /// Record that `hi` ran successfully.
    pub async fn commit_hook(&mut self, hi: &HookInfo) -> Result<()> {
        if self.is_implicit() {
            panic!("implicit relations must not run hooks");
        }

        match hi.kind {
            HookKind::Broken => {
                self.dir.state().validate(hi)?;
                self.die().await?;
                self.ctx.clear();
            }
            HookKind::Departed => {
                self.dir.write(hi)?;
                self.ctx.remove_unit(&hi.remote_unit);
            }
            HookKind::Joined | HookKind::Changed => self.dir.write(hi)?,
        }

        debug!(relation = self.dir.relation_id(), hook = %hi, "committed hook");
        Ok(())
    }

    async fn die(&mut self) -> Result<()> {
        self.unit.leave_scope().await?;
        self.dir.remove()?;
        info!(relation = self.dir.relation_id(), "left relation scope");
        Ok(())
    }
}
