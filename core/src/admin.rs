use crate::client::BackendApi;
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessState {
    Loading,
    Granted,
    Denied(String),
}

/// Client-side admin check that decides whether the admin dashboard renders.
///
/// This only hides UI. The backend enforces access on every admin call.
#[derive(Clone)]
pub struct AdminGate {
    state: Arc<RwLock<AccessState>>,
}

impl AdminGate {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(AccessState::Loading)),
        }
    }

    pub fn state(&self) -> AccessState {
        self.state.read().clone()
    }

    pub fn is_granted(&self) -> bool {
        matches!(*self.state.read(), AccessState::Granted)
    }

    pub async fn resolve(&self, api: &dyn BackendApi) -> AccessState {
        *self.state.write() = AccessState::Loading;
        let next = match api.admin_check().await {
            Ok(check) if check.is_admin => AccessState::Granted,
            Ok(check) => {
                tracing::info!(email = ?check.email, "admin access denied");
                AccessState::Denied("Admin access required".to_string())
            }
            Err(err) => {
                tracing::warn!(%err, "admin check failed");
                AccessState::Denied(err.user_message())
            }
        };
        *self.state.write() = next.clone();
        next
    }
}

impl Default for AdminGate {
    fn default() -> Self {
        Self::new()
    }
}
