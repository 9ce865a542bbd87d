pub mod config;
pub mod gateway;
pub mod routes;
pub mod session;

pub use config::{load_server_settings, ServerSettings};
pub use gateway::{Credential, ErrorEnvelope, ForwardRequest, Gateway, ResponseKind};
pub use routes::{router, GatewayState, RouteSpec, ROUTES};
pub use session::{Identity, SessionRegistry};
