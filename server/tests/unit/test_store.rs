//! Store semantics and snapshot persistence

use serde_json::json;

use kabinet::errors::KabinetError;
use kabinet::filesys::file::File;
use kabinet::flavours::Selector;
use kabinet::models::{Backend, Flavour, Pod, PodStatus, Release, Setup};
use kabinet::services::agents::{declare_resource, DeclareResourceInput};
use kabinet::services::pods::{create_deployment, create_pod, update_pod, CreateDeploymentInput, CreatePodInput};
use kabinet::storage::{MemoryStore, Store};

use crate::common::{cpu_only, harness, release, FakeRuntime};

#[tokio::test]
async fn test_upserts_keep_first_id() {
    let store = MemoryStore::new();

    let first = store.upsert_release(Release::new("app", "1.0.0")).await.unwrap();
    let again = store.upsert_release(Release::new("app", "1.0.0")).await.unwrap();
    assert_eq!(first.id, again.id);

    let f1 = store
        .upsert_flavour(Flavour::new(&first.id, "vanilla", "demo:1", Vec::new()))
        .await
        .unwrap();
    let f1_again = store
        .upsert_flavour(Flavour::new(&first.id, "vanilla", "demo:2", Vec::new()))
        .await
        .unwrap();
    assert_eq!(f1.id, f1_again.id);
    assert_eq!(f1_again.image, "demo:2");

    let b1 = store.upsert_backend(Backend::new("host", "alice", "cli")).await.unwrap();
    let b2 = store.upsert_backend(Backend::new("host", "alice", "cli")).await.unwrap();
    let b3 = store.upsert_backend(Backend::new("host", "bob", "cli")).await.unwrap();
    assert_eq!(b1.id, b2.id);
    assert_ne!(b1.id, b3.id);
}

#[tokio::test]
async fn test_flavours_keep_ingestion_order() {
    let store = MemoryStore::new();
    let rel = store.upsert_release(Release::new("app", "1.0.0")).await.unwrap();
    for name in ["zeta", "alpha", "mid"] {
        store
            .upsert_flavour(Flavour::new(&rel.id, name, format!("demo/{}", name), Vec::new()))
            .await
            .unwrap();
    }

    let names: Vec<String> = store
        .list_flavours(&rel.id)
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
}

#[tokio::test]
async fn test_get_or_create_pod_is_keyed_by_backend_and_pod_id() {
    let store = MemoryStore::new();

    let (first, created) = store.get_or_create_pod(Pod::new("b1", "c1", "d1")).await.unwrap();
    assert!(created);
    let (second, created) = store.get_or_create_pod(Pod::new("b1", "c1", "d1")).await.unwrap();
    assert!(!created);
    assert_eq!(first.id, second.id);

    let (other, created) = store.get_or_create_pod(Pod::new("b2", "c1", "d1")).await.unwrap();
    assert!(created);
    assert_ne!(other.id, first.id);

    assert_eq!(store.list_pods(Some("b1")).await.unwrap().len(), 1);
    assert_eq!(store.list_pods(None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_records_are_not_found() {
    let store = MemoryStore::new();
    assert!(store.get_pod("nope").await.unwrap_err().is_not_found());
    assert!(store.get_setup("nope").await.unwrap_err().is_not_found());
    assert!(matches!(
        store.update_pod_status("nope", PodStatus::Running).await,
        Err(KabinetError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");

    let selectors = Selector::decode_list(&json!([{"kind": "cpu", "min_count": 2}])).unwrap();
    let (release_id, setup_id, pod_id) = {
        let store = MemoryStore::open(File::new(&path)).await.unwrap();
        let rel = store.upsert_release(Release::new("app", "1.0.0")).await.unwrap();
        store
            .upsert_flavour(Flavour::new(&rel.id, "b", "demo/b", Vec::new()))
            .await
            .unwrap();
        store
            .upsert_flavour(Flavour::new(&rel.id, "a", "demo/a", selectors.clone()))
            .await
            .unwrap();
        let setup = store
            .insert_setup(Setup::new(&rel.id, "arkitekt", "token-123"))
            .await
            .unwrap();
        let (pod, _) = store.get_or_create_pod(Pod::new("b1", "c1", "d1")).await.unwrap();
        store.flush().await.unwrap();
        (rel.id, setup.id, pod.id)
    };

    let store = MemoryStore::open(File::new(&path)).await.unwrap();
    let flavours = store.list_flavours(&release_id).await.unwrap();
    assert_eq!(flavours.len(), 2);
    assert_eq!(flavours[0].name, "b");
    assert_eq!(flavours[1].selectors, selectors);

    let setup = store.get_setup(&setup_id).await.unwrap();
    assert!(setup
        .container_env()
        .contains(&("FAKTS_TOKEN".to_string(), "token-123".to_string())));
    assert_eq!(store.get_pod(&pod_id).await.unwrap().pod_id, "c1");
}

#[tokio::test]
async fn test_missing_snapshot_opens_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::open(File::new(dir.path().join("state.json")))
        .await
        .unwrap();
    assert!(store.list_pods(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_agent_reported_pods() {
    let h = harness(FakeRuntime::default(), cpu_only()).await;
    let store = h.state.store.as_ref();
    let backend_id = h.state.backend.record().id.clone();
    let (_, flavours) = release(store, &[("vanilla", "demo/vanilla:1", json!([]))]).await;

    let resource = declare_resource(
        store,
        &backend_id,
        DeclareResourceInput {
            local_id: "gpu-0".to_string(),
            name: "GPU 0".to_string(),
            qualifiers: Default::default(),
        },
    )
    .await
    .unwrap();

    let deployment = create_deployment(
        store,
        &backend_id,
        CreateDeploymentInput {
            flavour_id: flavours[0].id.clone(),
            local_id: "external-1".to_string(),
            secret_params: Default::default(),
            untyped_params: Default::default(),
        },
    )
    .await
    .unwrap();

    let pod = create_pod(
        store,
        &h.state.broadcaster,
        &backend_id,
        CreatePodInput {
            deployment_id: deployment.id.clone(),
            local_id: "external-1".to_string(),
            resource_id: Some(resource.id.clone()),
        },
    )
    .await
    .unwrap();
    assert_eq!(pod.resource_id.as_deref(), Some(resource.id.as_str()));

    let updated = update_pod(store, &h.state.broadcaster, &pod.id, "running")
        .await
        .unwrap();
    assert_eq!(updated.status, PodStatus::Running);

    let err = update_pod(store, &h.state.broadcaster, &pod.id, "runing")
        .await
        .unwrap_err();
    assert!(matches!(err, KabinetError::SchemaError(_)), "{:?}", err);
    assert_eq!(store.get_pod(&pod.id).await.unwrap().status, PodStatus::Running);

    let err = create_pod(
        store,
        &h.state.broadcaster,
        "someone-else",
        CreatePodInput {
            deployment_id: deployment.id,
            local_id: "external-2".to_string(),
            resource_id: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, KabinetError::ValidationError(_)));
}
