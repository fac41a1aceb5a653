//! Backend worker dispatch

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;

use kabinet::channels::{CallEnvelope, BACKEND_INBOX, DISPATCH_CHANNEL};
use kabinet_messages::DispatchFailure;

use crate::common::{cpu_only, harness, release, FakeRuntime};

#[tokio::test]
async fn test_unknown_function_is_reported_and_worker_survives() {
    let h = harness(FakeRuntime::with_images(&["demo/vanilla:1"]), cpu_only()).await;
    let mut failures = h
        .state
        .broadcaster
        .listen::<DispatchFailure>(DISPATCH_CHANNEL, &["all"])
        .await;

    h.state
        .dispatcher
        .send(CallEnvelope {
            function_name: "explode".to_string(),
            args: vec![json!(1)],
            kwargs: Default::default(),
        })
        .await
        .unwrap();

    let failure = tokio::time::timeout(Duration::from_secs(5), failures.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failure.function_name, "explode");
    assert!(failure.error.contains("explode"));

    assert!(h.state.store.list_pods(None).await.unwrap().is_empty());
    assert!(h.state.store.list_deployments(None).await.unwrap().is_empty());
    assert_eq!(h.runtime.pulls(), 0);
    assert_eq!(h.runtime.runs(), 0);
    assert!(!h.worker.is_finished());

    // The worker still serves real jobs afterwards
    let (_, flavours) = release(
        h.state.store.as_ref(),
        &[("vanilla", "demo/vanilla:1", json!([]))],
    )
    .await;
    let mut updates = h.state.backend.watch_flavour(&flavours[0].id).await.unwrap();
    h.state.backend.pull_flavour(&flavours[0]).await.unwrap();

    let done = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(update) = updates.next().await {
            if update.is_pulled() {
                return true;
            }
        }
        false
    })
    .await
    .unwrap();
    assert!(done);
}

#[tokio::test]
async fn test_malformed_envelope_is_dropped() {
    let h = harness(FakeRuntime::default(), cpu_only()).await;
    let mut failures = h
        .state
        .broadcaster
        .listen::<DispatchFailure>(DISPATCH_CHANNEL, &["all"])
        .await;

    h.state
        .layer
        .send(BACKEND_INBOX, json!({"args": []}))
        .await
        .unwrap();

    let failure = tokio::time::timeout(Duration::from_secs(5), failures.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(failure.function_name, "<malformed>");
    assert!(!h.worker.is_finished());
}

#[tokio::test]
async fn test_pull_job_without_flavour_argument_is_reported() {
    let h = harness(FakeRuntime::default(), cpu_only()).await;
    let mut failures = h
        .state
        .broadcaster
        .listen::<DispatchFailure>(DISPATCH_CHANNEL, &["all"])
        .await;

    h.state
        .dispatcher
        .send(CallEnvelope {
            function_name: "pull_flavour".to_string(),
            args: Vec::new(),
            kwargs: Default::default(),
        })
        .await
        .unwrap();

    let failure = tokio::time::timeout(Duration::from_secs(5), failures.next())
        .await
        .unwrap()
        .unwrap();
    assert!(failure.error.contains("flavour_id"));
    assert_eq!(h.runtime.pulls(), 0);
}
