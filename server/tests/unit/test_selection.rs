//! Flavour rating and selection through the docker backend

use serde_json::json;

use kabinet::errors::{KabinetError, RateError};
use kabinet::flavours::{Capabilities, GpuInfo, SelectionOrder};
use kabinet::models::BackendKind;
use kabinet::services::catalog::{register_release, FlavourInput, ReleaseInput};
use kabinet::services::setups::{create_setup, CreateSetupInput};

use crate::common::{cpu_only, harness, harness_with, release, test_options, FakeRuntime};

fn setup_input(release_id: &str, flavour_id: Option<String>) -> CreateSetupInput {
    CreateSetupInput {
        release_id: release_id.to_string(),
        flavour_id,
        installer: "arkitekt".to_string(),
        command: None,
        api_token: "secret-token".to_string(),
        fakts_url: None,
        instance_id: None,
    }
}

#[tokio::test]
async fn test_cpu_host_falls_back_to_vanilla() {
    let h = harness(
        FakeRuntime::with_images(&["demo/cuda:1", "demo/vanilla:1"]),
        cpu_only(),
    )
    .await;
    let store = h.state.store.as_ref();
    let (rel, _) = release(
        store,
        &[
            ("cuda", "demo/cuda:1", json!([{"kind": "cuda"}])),
            ("vanilla", "demo/vanilla:1", json!([])),
        ],
    )
    .await;

    let selection = h.state.backend.get_fitting_flavour(&rel).await.unwrap();
    assert_eq!(selection.flavour.name, "vanilla");
    assert_eq!(selection.score, 0);

    assert_eq!(selection.rejections.len(), 1);
    let rejection = &selection.rejections[0];
    assert_eq!(rejection.flavour_name, "cuda");
    match &rejection.error {
        RateError::UnmetSelector { kind, reason } => {
            assert_eq!(kind, "cuda");
            assert!(reason.contains("no GPU"));
        }
        other => panic!("unexpected rejection {:?}", other),
    }
}

#[tokio::test]
async fn test_gpu_host_prefers_weighted_flavour_when_highest_first() {
    let mut options = test_options();
    options.docker.selection_order = SelectionOrder::HighestFirst;
    let caps = Capabilities {
        gpu: Some(GpuInfo {
            count: 1,
            cuda_version: Some("12.2".to_string()),
            ..Default::default()
        }),
        ..cpu_only()
    };
    let h = harness_with(
        options,
        FakeRuntime::with_images(&["demo/cuda:1", "demo/vanilla:1"]),
        caps,
    )
    .await;
    let (rel, _) = release(
        h.state.store.as_ref(),
        &[
            ("vanilla", "demo/vanilla:1", json!([])),
            ("cuda", "demo/cuda:1", json!([{"kind": "cuda", "weight": 10}])),
        ],
    )
    .await;

    let selection = h.state.backend.get_fitting_flavour(&rel).await.unwrap();
    assert_eq!(selection.flavour.name, "cuda");
    assert_eq!(selection.score, 10);
    assert!(selection.rejections.is_empty());
}

#[tokio::test]
async fn test_default_order_keeps_lowest_score() {
    let caps = Capabilities {
        gpu: Some(GpuInfo {
            count: 1,
            ..Default::default()
        }),
        ..cpu_only()
    };
    let h = harness(
        FakeRuntime::with_images(&["demo/cuda:1", "demo/vanilla:1"]),
        caps,
    )
    .await;
    let (rel, _) = release(
        h.state.store.as_ref(),
        &[
            ("cuda", "demo/cuda:1", json!([{"kind": "cuda", "weight": 10}])),
            ("vanilla", "demo/vanilla:1", json!([])),
        ],
    )
    .await;

    let selection = h.state.backend.get_fitting_flavour(&rel).await.unwrap();
    assert_eq!(selection.flavour.name, "vanilla");
}

#[tokio::test]
async fn test_missing_images_leave_no_flavour() {
    let h = harness(FakeRuntime::default(), cpu_only()).await;
    let (rel, _) = release(
        h.state.store.as_ref(),
        &[
            ("cuda", "demo/cuda:1", json!([{"kind": "cuda"}])),
            ("vanilla", "demo/vanilla:1", json!([])),
        ],
    )
    .await;

    let err = h.state.backend.get_fitting_flavour(&rel).await.unwrap_err();
    match &err {
        KabinetError::NoFlavourAvailable {
            release_id,
            rejections,
        } => {
            assert_eq!(release_id, &rel.id);
            assert_eq!(rejections.len(), 2);
            assert!(rejections
                .iter()
                .all(|r| matches!(r.error, RateError::ImageNotFound(_))));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.to_string().contains("demo/vanilla:1"));
}

#[tokio::test]
async fn test_unknown_selector_kind_rejects_release() {
    let h = harness(FakeRuntime::default(), cpu_only()).await;

    let err = register_release(
        h.state.store.as_ref(),
        ReleaseInput {
            app: "demo-app".to_string(),
            version: "2.0.0".to_string(),
            scopes: Vec::new(),
            logo: None,
            entrypoint: None,
            flavours: vec![FlavourInput {
                name: "tpu".to_string(),
                image: "demo/tpu:2".to_string(),
                selectors: json!([{"kind": "tpu"}]),
                builder: String::new(),
                manifest: json!({}),
                requirements: json!([]),
            }],
        },
    )
    .await
    .unwrap_err();

    match err {
        KabinetError::SchemaError(msg) => assert!(msg.contains("tpu")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_create_setup_resolves_flavour() {
    let h = harness(FakeRuntime::with_images(&["demo/vanilla:1"]), cpu_only()).await;
    let store = h.state.store.as_ref();
    let (rel, flavours) = release(
        store,
        &[
            ("cuda", "demo/cuda:1", json!([{"kind": "cuda"}])),
            ("vanilla", "demo/vanilla:1", json!([])),
        ],
    )
    .await;

    let setup = create_setup(store, h.state.backend.as_ref(), setup_input(&rel.id, None))
        .await
        .unwrap();
    assert_eq!(setup.flavour_id.as_deref(), Some(flavours[1].id.as_str()));

    // A pinned flavour is taken as-is, even one this host could not rate
    let pinned = create_setup(
        store,
        h.state.backend.as_ref(),
        setup_input(&rel.id, Some(flavours[0].id.clone())),
    )
    .await
    .unwrap();
    assert_eq!(pinned.flavour_id.as_deref(), Some(flavours[0].id.as_str()));
}

#[tokio::test]
async fn test_pinned_flavour_must_belong_to_release() {
    let h = harness(FakeRuntime::default(), cpu_only()).await;
    let store = h.state.store.as_ref();
    let (rel, _) = release(store, &[("vanilla", "demo/vanilla:1", json!([]))]).await;
    let (_, other) = register_release(
        store,
        ReleaseInput {
            app: "other-app".to_string(),
            version: "0.1.0".to_string(),
            scopes: Vec::new(),
            logo: None,
            entrypoint: None,
            flavours: vec![FlavourInput {
                name: "vanilla".to_string(),
                image: "other/vanilla:0.1".to_string(),
                selectors: json!([]),
                builder: String::new(),
                manifest: json!({}),
                requirements: json!([]),
            }],
        },
    )
    .await
    .unwrap();

    let err = create_setup(
        store,
        h.state.backend.as_ref(),
        setup_input(&rel.id, Some(other[0].id.clone())),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, KabinetError::ValidationError(_)));
}

#[tokio::test]
async fn test_declared_only_backend_rejects_operations() {
    let mut options = test_options();
    options.backend.kind = BackendKind::Kubernetes;
    let h = harness_with(options, FakeRuntime::default(), cpu_only()).await;
    let (rel, _) = release(
        h.state.store.as_ref(),
        &[("vanilla", "demo/vanilla:1", json!([]))],
    )
    .await;

    assert_eq!(h.state.backend.kind(), BackendKind::Kubernetes);
    match h.state.backend.get_fitting_flavour(&rel).await {
        Err(KabinetError::NotImplementedByBackend { backend, operation }) => {
            assert_eq!(backend, "kubernetes");
            assert_eq!(operation, "get_fitting_flavour");
        }
        other => panic!("unexpected result {:?}", other.map(|s| s.flavour.name)),
    }
}
