use std::time::Duration;

use relhooks::hook::{HookInfo, HookReceiver};
use relhooks::engine::Relationer;

/// How long to wait for a hook that should arrive.
pub const LONG_WAIT: Duration = Duration::from_secs(5);

/// How long to watch for a hook that should not arrive.
pub const SHORT_WAIT: Duration = Duration::from_millis(50);

/// Wait for the next hook and check it equals `expect`.
pub async fn expect_hook(hooks: &mut HookReceiver, expect: &HookInfo) -> HookInfo {
    match tokio::time::timeout(LONG_WAIT, hooks.recv()).await {
        Ok(Some(hi)) => {
            assert_eq!(&hi, expect, "unexpected hook");
            hi
        }
        Ok(None) => panic!("hook stream closed while waiting for {expect}"),
        Err(_) => panic!("timed out waiting for {expect}"),
    }
}

/// Like [`expect_hook`], then prepare and commit the hook on `relationer`
/// the way a hook executor would.
pub async fn expect_and_commit(
    hooks: &mut HookReceiver,
    relationer: &mut Relationer,
    expect: &HookInfo,
) -> String {
    let hi = expect_hook(hooks, expect).await;
    let name = relationer.prepare_hook(&hi).expect("prepare hook");
    relationer.commit_hook(&hi).await.expect("commit hook");
    name
}

/// Check that no hook is offered for a short while.
pub async fn expect_no_hook(hooks: &mut HookReceiver) {
    if let Ok(Some(hi)) = tokio::time::timeout(SHORT_WAIT, hooks.recv()).await {
        panic!("got unexpected hook {hi}");
    }
}
