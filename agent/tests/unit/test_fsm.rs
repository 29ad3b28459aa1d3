//! FSM unit tests

use hupagent::hup::fsm::{UpdateEvent, UpdateFsm, UpdatePhase};

fn resolved(max_attempts: u32) -> UpdateFsm {
    let mut fsm = UpdateFsm::new(max_attempts);
    fsm.process(UpdateEvent::Begin).unwrap();
    fsm.process(UpdateEvent::Online).unwrap();
    fsm.process(UpdateEvent::Idle).unwrap();
    fsm.process(UpdateEvent::TargetResolved).unwrap();
    fsm
}

#[test]
fn test_fsm_initial_state() {
    let fsm = UpdateFsm::new(3);
    assert_eq!(fsm.phase(), UpdatePhase::Pending);
    assert!(fsm.error().is_none());
    assert_eq!(fsm.attempts(), 0);
    assert_eq!(fsm.max_attempts(), 3);
}

#[test]
fn test_fsm_zero_budget_allows_one_attempt() {
    let fsm = UpdateFsm::new(0);
    assert_eq!(fsm.max_attempts(), 1);
    assert!(fsm.can_retry());
}

#[test]
fn test_fsm_nothing_to_do() {
    let mut fsm = UpdateFsm::new(3);
    fsm.process(UpdateEvent::Begin).unwrap();
    fsm.process(UpdateEvent::Online).unwrap();
    fsm.process(UpdateEvent::Idle).unwrap();

    assert_eq!(
        fsm.process(UpdateEvent::NoTarget).unwrap(),
        UpdatePhase::NothingToDo
    );
    assert!(fsm.process(UpdateEvent::Retry).is_err());
    assert_eq!(fsm.attempts(), 0);
}

#[test]
fn test_fsm_resolve_failure() {
    let mut fsm = UpdateFsm::new(3);
    fsm.process(UpdateEvent::Begin).unwrap();
    fsm.process(UpdateEvent::Online).unwrap();
    fsm.process(UpdateEvent::Idle).unwrap();
    fsm.process(UpdateEvent::ResolveFailed("backend down".to_string()))
        .unwrap();

    assert_eq!(fsm.phase(), UpdatePhase::Failed);
    assert_eq!(fsm.error(), Some("backend down"));
    assert_eq!(fsm.attempts(), 0);
}

#[test]
fn test_fsm_retry_after_failure() {
    let mut fsm = resolved(3);
    assert_eq!(fsm.attempts(), 1);

    // First attempt fails while starting
    fsm.process(UpdateEvent::AttemptFailed("error 1".to_string()))
        .unwrap();
    assert_eq!(fsm.phase(), UpdatePhase::Backoff);

    // Second attempt fails while running
    fsm.process(UpdateEvent::Retry).unwrap();
    assert_eq!(fsm.attempts(), 2);
    fsm.process(UpdateEvent::UpdateStarted).unwrap();
    fsm.process(UpdateEvent::AttemptFailed("error 2".to_string()))
        .unwrap();
    assert_eq!(fsm.phase(), UpdatePhase::Backoff);
    assert_eq!(fsm.error(), Some("error 2"));

    // Third attempt succeeds
    fsm.process(UpdateEvent::Retry).unwrap();
    fsm.process(UpdateEvent::UpdateStarted).unwrap();
    fsm.process(UpdateEvent::Completed).unwrap();
    assert_eq!(fsm.phase(), UpdatePhase::Succeeded);
    assert_eq!(fsm.attempts(), 3);
    assert!(fsm.error().is_none());
}

#[test]
fn test_fsm_budget_exhausted() {
    let mut fsm = resolved(2);

    fsm.process(UpdateEvent::AttemptFailed("error 1".to_string()))
        .unwrap();
    fsm.process(UpdateEvent::Retry).unwrap();
    let phase = fsm
        .process(UpdateEvent::AttemptFailed("error 2".to_string()))
        .unwrap();

    assert_eq!(phase, UpdatePhase::Failed);
    assert!(!fsm.can_retry());
    assert!(fsm.process(UpdateEvent::Retry).is_err());
    assert_eq!(fsm.attempts(), 2);
}

#[test]
fn test_fsm_invalid_transitions() {
    let mut fsm = UpdateFsm::new(3);

    // Can't start an update before the device is checked
    assert!(fsm.process(UpdateEvent::UpdateStarted).is_err());
    assert!(fsm.process(UpdateEvent::Retry).is_err());
    assert_eq!(fsm.phase(), UpdatePhase::Pending);

    // Can't leave a terminal phase
    let mut fsm = resolved(1);
    fsm.process(UpdateEvent::UpdateStarted).unwrap();
    fsm.process(UpdateEvent::Completed).unwrap();
    assert!(fsm.process(UpdateEvent::Retry).is_err());
    assert!(fsm.process(UpdateEvent::Begin).is_err());
    assert_eq!(fsm.phase(), UpdatePhase::Succeeded);
}
