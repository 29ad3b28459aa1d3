//! Target version resolution tests

use tokio_test::{assert_err, assert_ok};

use hupagent::errors::AgentError;
use hupagent::hup::version::resolve_target;

use crate::support::{supported, Fail, FakeApi, DEVICE_TYPE};

#[tokio::test]
async fn test_unpinned_returns_recommendation() {
    let api = FakeApi::online("2.1.0")
        .supported_replies(vec![Ok(supported(Some("2.3.0"), &["2.4.0-beta", "2.3.0"]))]);

    let target = assert_ok!(resolve_target(&api, DEVICE_TYPE, "2.1.0", None).await);
    assert_eq!(target.as_deref(), Some("2.3.0"));
}

#[tokio::test]
async fn test_unpinned_without_recommendation_is_none() {
    let api = FakeApi::online("2.1.0")
        .supported_replies(vec![Ok(supported(None, &["2.4.0-beta"]))]);

    let target = assert_ok!(resolve_target(&api, DEVICE_TYPE, "2.1.0", None).await);
    assert_eq!(target, None);
}

#[tokio::test]
async fn test_empty_pin_follows_recommendation() {
    let api = FakeApi::online("2.1.0")
        .supported_replies(vec![Ok(supported(Some("2.3.0"), &["2.4.0", "2.3.0"]))]);

    let target = assert_ok!(resolve_target(&api, DEVICE_TYPE, "2.1.0", Some("  ")).await);
    assert_eq!(target.as_deref(), Some("2.3.0"));
}

#[tokio::test]
async fn test_pinned_returns_first_substring_match() {
    let api = FakeApi::online("2.1.0").supported_replies(vec![Ok(supported(
        Some("12.3.0"),
        &["12.3.0", "2.3.10", "2.3.1+rev1"],
    ))]);

    // Permissive on purpose: "2.3" also matches "12.3.0"
    let target = assert_ok!(resolve_target(&api, DEVICE_TYPE, "2.1.0", Some("2.3")).await);
    assert_eq!(target.as_deref(), Some("12.3.0"));

    let target = assert_ok!(resolve_target(&api, DEVICE_TYPE, "2.1.0", Some("2.3.1")).await);
    assert_eq!(target.as_deref(), Some("2.3.10"));

    let target = assert_ok!(resolve_target(&api, DEVICE_TYPE, "2.1.0", Some("+rev1")).await);
    assert_eq!(target.as_deref(), Some("2.3.1+rev1"));
}

#[tokio::test]
async fn test_pinned_without_match_is_none() {
    let api = FakeApi::online("2.1.0")
        .supported_replies(vec![Ok(supported(Some("2.3.0"), &["2.3.0", "2.2.0"]))]);

    let target = assert_ok!(resolve_target(&api, DEVICE_TYPE, "2.1.0", Some("9.9")).await);
    assert_eq!(target, None);
}

#[tokio::test]
async fn test_backend_failure_propagates() {
    let api = FakeApi::online("2.1.0").supported_replies(vec![Err(Fail::Api)]);

    let err = assert_err!(resolve_target(&api, DEVICE_TYPE, "2.1.0", None).await);
    assert!(matches!(err, AgentError::ApiError(_)));
    assert_eq!(api.calls().supported_versions, 1);
}
