//! FSM unit tests

use kabinet::deploy::fsm::{SetupEvent, SetupFsm, SetupState};

#[test]
fn test_fsm_initial_state() {
    let fsm = SetupFsm::new("setup-1");
    assert_eq!(fsm.state(), &SetupState::NoFlavourSelected);
    assert_eq!(fsm.setup_id(), "setup-1");
    assert!(fsm.error().is_none());
    assert!(fsm.flavour_id().is_none());
}

#[test]
fn test_fsm_pull_flow() {
    let mut fsm = SetupFsm::new("setup-1");

    fsm.process(SetupEvent::SelectFlavour("flavour-1".to_string()))
        .unwrap();
    assert_eq!(fsm.state(), &SetupState::FlavourSelected);
    assert_eq!(fsm.flavour_id(), Some("flavour-1"));

    fsm.process(SetupEvent::PullDispatched).unwrap();
    assert_eq!(fsm.state(), &SetupState::ImagePullPending);

    fsm.process(SetupEvent::ImageReady).unwrap();
    assert_eq!(fsm.state(), &SetupState::ImageReady);

    fsm.process(SetupEvent::StartContainer("kabinet-abc".to_string()))
        .unwrap();
    assert_eq!(fsm.state(), &SetupState::ContainerStarting);
    assert_eq!(fsm.container_name(), Some("kabinet-abc"));

    fsm.process(SetupEvent::RecordPod("pod-1".to_string())).unwrap();
    assert_eq!(fsm.state(), &SetupState::PodRecorded);
    assert_eq!(fsm.pod_id(), Some("pod-1"));
    assert!(fsm.state().is_terminal());
}

#[test]
fn test_fsm_failure_from_any_non_terminal_state() {
    let mut fsm = SetupFsm::new("setup-1");
    fsm.process(SetupEvent::SelectFlavour("flavour-1".to_string()))
        .unwrap();
    fsm.process(SetupEvent::PullDispatched).unwrap();

    fsm.process(SetupEvent::Fail("pull timed out".to_string()))
        .unwrap();
    assert_eq!(fsm.state(), &SetupState::Failed);
    assert_eq!(fsm.error(), Some("pull timed out"));
}

#[test]
fn test_fsm_rejects_out_of_order_events() {
    let mut fsm = SetupFsm::new("setup-1");

    assert!(fsm.process(SetupEvent::ImageReady).is_err());
    assert!(fsm
        .process(SetupEvent::StartContainer("c".to_string()))
        .is_err());
    assert_eq!(fsm.state(), &SetupState::NoFlavourSelected);

    fsm.process(SetupEvent::SelectFlavour("flavour-1".to_string()))
        .unwrap();
    assert!(fsm
        .process(SetupEvent::RecordPod("pod-1".to_string()))
        .is_err());
}

#[test]
fn test_fsm_recorded_pod_is_final() {
    let mut fsm = SetupFsm::new("setup-1");
    fsm.process(SetupEvent::SelectFlavour("f".to_string())).unwrap();
    fsm.process(SetupEvent::ImageReady).unwrap();
    fsm.process(SetupEvent::StartContainer("c".to_string())).unwrap();
    fsm.process(SetupEvent::RecordPod("p".to_string())).unwrap();

    assert!(fsm.process(SetupEvent::Fail("late".to_string())).is_err());
    assert_eq!(fsm.state(), &SetupState::PodRecorded);
}

#[test]
fn test_state_serializes_screaming_snake_case() {
    assert_eq!(
        serde_json::to_string(&SetupState::ImagePullPending).unwrap(),
        "\"IMAGE_PULL_PENDING\""
    );
}
