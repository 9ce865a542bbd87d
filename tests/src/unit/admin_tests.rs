use super::support::ScriptedBackend;
use deepdesk_core::{AccessState, AdminGate};

#[tokio::test]
async fn gate_starts_loading_and_grants_admins() {
    let gate = AdminGate::new();
    assert_eq!(gate.state(), AccessState::Loading);
    let backend = ScriptedBackend {
        is_admin: true,
        ..ScriptedBackend::default()
    };
    assert_eq!(gate.resolve(&backend).await, AccessState::Granted);
    assert!(gate.is_granted());
}

#[tokio::test]
async fn non_admins_are_denied() {
    let gate = AdminGate::new();
    let state = gate.resolve(&ScriptedBackend::default()).await;
    assert!(matches!(state, AccessState::Denied(_)));
}

#[tokio::test]
async fn errors_deny() {
    let gate = AdminGate::new();
    let state = gate.resolve(&ScriptedBackend::failing(502)).await;
    assert_eq!(state, AccessState::Denied("Backend request failed".into()));
    assert!(!gate.is_granted());
}
