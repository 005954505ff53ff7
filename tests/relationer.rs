mod common;

use std::fs;
use std::sync::Arc;

use tokio::time::timeout;

use common::{Fixture, REL_ID};
use relhooks::engine::Relationer;
use relhooks::errors::{RelhooksError, Result};
use relhooks::hook::{handoff, HookInfo};
use relhooks::relation::{read_state_dir, STATE_FILE};
use relhooks::scope::{
    BoxFuture, Endpoint, MembershipChange, MembershipWatcher, RelationUnit,
};
use relhooks::types::{RelationId, Settings};
use relhooks_test_utils::builders::settings;
use relhooks_test_utils::probe::{expect_and_commit, expect_hook, expect_no_hook, LONG_WAIT, SHORT_WAIT};

async fn next_change(w: &mut dyn MembershipWatcher) -> MembershipChange {
    timeout(LONG_WAIT, w.next())
        .await
        .expect("timed out waiting for membership change")
        .expect("watcher closed")
        .expect("watcher error")
}

#[tokio::test]
async fn join_enters_scope_and_broken_commit_leaves_it() {
    common::init_tracing();
    let mut fx = Fixture::new(Endpoint::new("ring"));
    let mut w = fx.relation.watch("u/1");
    assert!(next_change(&mut w).await.is_empty());

    fx.relationer.join().await.unwrap();
    let change = next_change(&mut w).await;
    assert_eq!(change.changed.get("u/0"), Some(&0));
    assert!(!fx.dir_path().exists(), "join must not create the state dir");

    // Joining again is a no-op.
    fx.relationer.join().await.unwrap();
    assert!(timeout(SHORT_WAIT, w.next()).await.is_err());

    let broken = HookInfo::broken(REL_ID);
    let name = fx.relationer.prepare_hook(&broken).unwrap();
    assert_eq!(name, "ring-relation-broken");
    assert!(fx.dir_path().is_dir());

    fx.relationer.commit_hook(&broken).await.unwrap();
    let change = next_change(&mut w).await;
    assert_eq!(change.departed, vec!["u/0".to_string()]);
    assert!(!fx.relation.in_scope("u/0"));
    assert!(!fx.dir_path().exists());
}

#[tokio::test]
async fn start_stop_hooks_resumes_from_committed_state() {
    common::init_tracing();
    let mut fx = Fixture::new(Endpoint::new("ring"));
    assert!(!fx.relationer.is_implicit());

    fx.relationer.join().await.unwrap();
    expect_no_hook(&mut fx.hooks).await;
    fx.relationer.start_hooks().unwrap();
    assert!(fx.relationer.hooks_started());
    expect_no_hook(&mut fx.hooks).await;

    fx.relation.enter("u/1", settings(&[("addr", "u1.local")])).unwrap();
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::joined(REL_ID, "u/1", 0)).await;
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::changed(REL_ID, "u/1", 0)).await;
    expect_no_hook(&mut fx.hooks).await;

    fx.relationer.stop_hooks().await.unwrap();
    assert!(!fx.relationer.hooks_started());

    // Changes while stopped are picked up on the next start.
    fx.relation.leave("u/1");
    fx.relation.enter("u/2", Settings::new()).unwrap();
    assert_eq!(fx.relation.write_settings("u/2", settings(&[("k", "v")])).unwrap(), 1);
    expect_no_hook(&mut fx.hooks).await;

    // Stopping twice is fine.
    fx.relationer.stop_hooks().await.unwrap();
    expect_no_hook(&mut fx.hooks).await;

    fx.relationer.start_hooks().unwrap();
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::departed(REL_ID, "u/1")).await;
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::joined(REL_ID, "u/2", 1)).await;
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::changed(REL_ID, "u/2", 1)).await;
    expect_no_hook(&mut fx.hooks).await;
    fx.relationer.stop_hooks().await.unwrap();

    assert_eq!(fx.relationer.state().members.get("u/2"), Some(&1));
    assert!(!fx.relationer.state().is_member("u/1"));
}

#[tokio::test]
#[should_panic(expected = "hooks already started!")]
async fn start_hooks_twice_panics() {
    let mut fx = Fixture::new(Endpoint::new("ring"));
    fx.relationer.start_hooks().unwrap();
    let _ = fx.relationer.start_hooks();
}

#[tokio::test]
async fn prepare_and_commit_follow_the_hook_protocol() {
    common::init_tracing();
    let mut fx = Fixture::new(Endpoint::new("ring"));
    let ctx = fx.relationer.context();
    assert_eq!(ctx.name(), "ring");
    assert_eq!(ctx.relation_id(), REL_ID);
    assert!(ctx.unit_names().is_empty());

    // Changed before joined is refused, and leaves no trace on disk.
    let err = fx
        .relationer
        .prepare_hook(&HookInfo::changed(REL_ID, "u/1", 7))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        r#"inappropriate "relation-changed" for "u/1": unit has not joined"#
    );
    assert!(!fx.dir_path().exists());

    let joined = HookInfo::joined(REL_ID, "u/1", 7);
    assert_eq!(fx.relationer.prepare_hook(&joined).unwrap(), "ring-relation-joined");
    assert!(fx.dir_path().is_dir());
    assert!(!fx.dir_path().join(STATE_FILE).exists());
    // Prepared units are visible to the hook, but nothing is committed yet.
    assert_eq!(ctx.unit_names(), vec!["u/1".to_string()]);
    assert!(fx.relationer.state().members.is_empty());

    fx.relationer.commit_hook(&joined).await.unwrap();
    assert_eq!(fx.relationer.state().members.get("u/1"), Some(&7));
    assert_eq!(fx.relationer.state().changed_pending.as_deref(), Some("u/1"));

    // The initial changed must come next.
    let err = fx
        .relationer
        .prepare_hook(&HookInfo::departed(REL_ID, "u/1"))
        .unwrap_err();
    assert!(err.to_string().contains(r#"expected "relation-changed" for "u/1""#));

    let changed = HookInfo::changed(REL_ID, "u/1", 7);
    assert_eq!(fx.relationer.prepare_hook(&changed).unwrap(), "ring-relation-changed");
    fx.relationer.commit_hook(&changed).await.unwrap();
    assert_eq!(fx.relationer.state().changed_pending, None);

    let departed = HookInfo::departed(REL_ID, "u/1");
    assert_eq!(fx.relationer.prepare_hook(&departed).unwrap(), "ring-relation-departed");
    assert!(ctx.contains("u/1"), "departing unit stays visible until commit");
    fx.relationer.commit_hook(&departed).await.unwrap();
    assert!(!ctx.contains("u/1"));
    assert!(fx.relationer.state().members.is_empty());

    // Everything committed is durable.
    let reread = read_state_dir(fx.state_root.path(), REL_ID).unwrap();
    assert_eq!(reread.state(), fx.relationer.state());
    assert_eq!(reread.last_hook(), Some(&departed));
}

#[tokio::test]
async fn set_dying_drains_members_then_breaks() {
    common::init_tracing();
    let mut fx = Fixture::new(Endpoint::new("ring"));
    fx.relation.enter("u/1", Settings::new()).unwrap();

    fx.relationer.join().await.unwrap();
    fx.relationer.start_hooks().unwrap();
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::joined(REL_ID, "u/1", 0)).await;

    // The alive loop is now offering the initial changed; dying withdraws
    // that offer and the dying loop offers it again.
    fx.relationer.set_dying().await.unwrap();
    assert!(fx.relationer.is_dying());
    assert!(fx.relationer.hooks_started());

    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::changed(REL_ID, "u/1", 0)).await;
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::departed(REL_ID, "u/1")).await;
    let name =
        expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::broken(REL_ID)).await;
    assert_eq!(name, "ring-relation-broken");
    expect_no_hook(&mut fx.hooks).await;

    assert!(!fx.relation.in_scope("u/0"));
    assert!(!fx.dir_path().exists());
    assert!(fx.relationer.context().unit_names().is_empty());

    let err = fx
        .relationer
        .prepare_hook(&HookInfo::broken(REL_ID))
        .unwrap_err();
    assert!(
        err.to_string()
            .ends_with("relation is broken and cannot be changed further"),
        "{err}"
    );

    fx.relationer.stop_hooks().await.unwrap();
}

#[tokio::test]
async fn broken_relation_delivers_nothing_after_restart() {
    common::init_tracing();
    let mut fx = Fixture::new(Endpoint::new("ring"));
    fx.relation.enter("u/1", Settings::new()).unwrap();
    fx.relationer.join().await.unwrap();
    fx.relationer.start_hooks().unwrap();

    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::joined(REL_ID, "u/1", 0)).await;
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::changed(REL_ID, "u/1", 0)).await;
    fx.relationer.set_dying().await.unwrap();
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::departed(REL_ID, "u/1")).await;
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::broken(REL_ID)).await;
    assert!(fx.relationer.state().broken);

    fx.relationer.stop_hooks().await.unwrap();
    fx.relationer.start_hooks().unwrap();
    expect_no_hook(&mut fx.hooks).await;

    // Dying again is just as quiet.
    fx.relationer.set_dying().await.unwrap();
    expect_no_hook(&mut fx.hooks).await;
    fx.relationer.stop_hooks().await.unwrap();
}

#[tokio::test]
#[should_panic(expected = "dying relationer must not join!")]
async fn join_after_set_dying_panics() {
    let mut fx = Fixture::new(Endpoint::new("ring"));
    fx.relationer.set_dying().await.unwrap();
    let _ = fx.relationer.join().await;
}

#[tokio::test]
async fn dying_ignores_units_arriving_late() {
    common::init_tracing();
    let mut fx = Fixture::new(Endpoint::new("ring"));
    fx.relationer.join().await.unwrap();
    fx.relationer.start_hooks().unwrap();

    fx.relation.enter("u/1", Settings::new()).unwrap();
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::joined(REL_ID, "u/1", 0)).await;
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::changed(REL_ID, "u/1", 0)).await;

    fx.relation.write_settings("u/1", settings(&[("a", "b")])).unwrap();
    // Delivered, but the executor decides to die instead of running it.
    expect_hook(&mut fx.hooks, &HookInfo::changed(REL_ID, "u/1", 1)).await;

    fx.relationer.set_dying().await.unwrap();
    fx.relation.enter("u/2", Settings::new()).unwrap();

    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::departed(REL_ID, "u/1")).await;
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::broken(REL_ID)).await;
    expect_no_hook(&mut fx.hooks).await;
    fx.relationer.stop_hooks().await.unwrap();
}

#[tokio::test]
async fn implicit_relationer_never_runs_hooks() {
    common::init_tracing();
    let mut fx = Fixture::with_unit("mysql/0", Endpoint::implicit("juju-info"));
    assert!(fx.relationer.is_implicit());

    fx.relationer.join().await.unwrap();
    assert!(fx.relation.in_scope("mysql/0"));
    assert!(!fx.dir_path().exists());

    fx.relationer.start_hooks().unwrap();
    assert!(!fx.relationer.hooks_started());
    fx.relation.enter("logging/0", Settings::new()).unwrap();
    expect_no_hook(&mut fx.hooks).await;

    fs::create_dir_all(fx.dir_path()).unwrap();
    fx.relationer.set_dying().await.unwrap();
    assert!(!fx.relation.in_scope("mysql/0"));
    assert!(!fx.dir_path().exists());

    fx.relationer.stop_hooks().await.unwrap();
    expect_no_hook(&mut fx.hooks).await;
}

#[tokio::test]
#[should_panic(expected = "implicit relations must not run hooks")]
async fn implicit_relationer_refuses_prepare() {
    let mut fx = Fixture::with_unit("mysql/0", Endpoint::implicit("juju-info"));
    let _ = fx.relationer.prepare_hook(&HookInfo::joined(REL_ID, "logging/0", 0));
}

#[tokio::test]
async fn uncommitted_hook_is_offered_again_after_restart() {
    common::init_tracing();
    let mut fx = Fixture::new(Endpoint::new("ring"));
    fx.relation.enter("u/1", Settings::new()).unwrap();
    fx.relationer.join().await.unwrap();
    fx.relationer.start_hooks().unwrap();

    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &HookInfo::joined(REL_ID, "u/1", 0)).await;
    let changed = expect_hook(&mut fx.hooks, &HookInfo::changed(REL_ID, "u/1", 0)).await;

    // Preparing is repeatable and has no durable effect.
    assert_eq!(fx.relationer.prepare_hook(&changed).unwrap(), "ring-relation-changed");
    assert_eq!(fx.relationer.prepare_hook(&changed).unwrap(), "ring-relation-changed");
    assert_eq!(fx.relationer.state().changed_pending.as_deref(), Some("u/1"));

    // Crash before commit.
    fx.relationer.stop_hooks().await.unwrap();
    fx.restart("u/0", Endpoint::new("ring"));
    assert_eq!(fx.relationer.state().changed_pending.as_deref(), Some("u/1"));
    assert!(fx.relationer.context().contains("u/1"));

    fx.relationer.join().await.unwrap();
    fx.relationer.start_hooks().unwrap();
    expect_and_commit(&mut fx.hooks, &mut fx.relationer, &changed).await;
    expect_no_hook(&mut fx.hooks).await;
    fx.relationer.stop_hooks().await.unwrap();
}

struct FailingUnit {
    endpoint: Endpoint,
}

struct FailingWatcher;

impl MembershipWatcher for FailingWatcher {
    fn next(&mut self) -> BoxFuture<'_, Option<Result<MembershipChange>>> {
        Box::pin(async { Some(Err(RelhooksError::Watcher("store unavailable".to_string()))) })
    }
}

impl RelationUnit for FailingUnit {
    fn relation_id(&self) -> RelationId {
        REL_ID
    }

    fn unit_name(&self) -> &str {
        "u/0"
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn enter_scope(&self, _settings: Settings) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn leave_scope(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn watch(&self) -> Result<Box<dyn MembershipWatcher>> {
        Ok(Box::new(FailingWatcher))
    }
}

#[tokio::test]
async fn watcher_failure_is_reported_by_stop_hooks() {
    common::init_tracing();
    let root = tempfile::tempdir().unwrap();
    let dir = read_state_dir(root.path(), REL_ID).unwrap();
    let (tx, mut rx) = handoff();
    let unit = FailingUnit {
        endpoint: Endpoint::new("ring"),
    };
    let mut relationer = Relationer::new(Arc::new(unit), dir, tx);

    relationer.start_hooks().unwrap();
    expect_no_hook(&mut rx).await;

    let err = relationer.stop_hooks().await.unwrap_err();
    assert!(matches!(err, RelhooksError::Watcher(_)), "{err}");
    assert!(err.to_string().contains("store unavailable"));
    assert!(!relationer.hooks_started());
}
