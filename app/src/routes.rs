use crate::gateway::{Credential, ErrorEnvelope, ForwardRequest, Gateway, ResponseKind};
use crate::session::{Identity, SessionRegistry};
use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, on, post, MethodFilter, MethodRouter},
    Json, Router,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_cookies::{Cookie, CookieManagerLayer, Cookies};

/// Largest request body forwarded to the backend.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Delete,
}

impl Verb {
    fn filter(self) -> MethodFilter {
        match self {
            Self::Get => MethodFilter::GET,
            Self::Post => MethodFilter::POST,
            Self::Delete => MethodFilter::DELETE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAuth {
    /// Session required; backend sees the bearer secret.
    Bearer,
    /// Session required; backend sees the user's email.
    UserEmail,
    /// No session; backend sees the bearer secret.
    Public,
}

#[derive(Debug, Clone, Copy)]
pub struct RouteSpec {
    pub path: &'static str,
    pub verb: Verb,
    pub auth: RouteAuth,
    pub kind: ResponseKind,
    /// Append the session email as `user_id` to the backend query.
    pub inject_user: bool,
}

const fn route(path: &'static str, verb: Verb, auth: RouteAuth, kind: ResponseKind) -> RouteSpec {
    RouteSpec {
        path,
        verb,
        auth,
        kind,
        inject_user: false,
    }
}

const fn scoped(path: &'static str, verb: Verb) -> RouteSpec {
    RouteSpec {
        path,
        verb,
        auth: RouteAuth::Bearer,
        kind: ResponseKind::Json,
        inject_user: true,
    }
}

use self::RouteAuth::{Bearer, Public, UserEmail};
use self::Verb::{Delete, Get, Post};
use crate::gateway::ResponseKind::{Binary, Json as JsonKind, Stream};

pub const ROUTES: &[RouteSpec] = &[
    route("/api/chat", Post, Bearer, JsonKind),
    route("/api/research", Post, Bearer, JsonKind),
    route("/api/research/save-blog", Post, Bearer, JsonKind),
    scoped("/api/research-blogs", Get),
    scoped("/api/research-blogs/{id}", Get),
    route("/api/research-blogs/save-with-chat", Post, Bearer, JsonKind),
    route("/api/research-blogs/{id}/generate-slides", Post, Bearer, JsonKind),
    route("/api/presentations/generate", Post, Bearer, JsonKind),
    route("/api/presentations/export", Post, Bearer, Binary),
    route("/api/presentations/save", Post, Bearer, JsonKind),
    scoped("/api/presentations", Get),
    scoped("/api/presentations/{id}", Get),
    scoped("/api/presentations/{id}", Delete),
    route("/api/presentations/download/{filename}", Get, Bearer, Binary),
    route("/api/presentations/images/{filename}", Get, Bearer, Binary),
    route("/api/zstyle/outline", Post, Bearer, JsonKind),
    route("/api/zstyle/slides/stream", Post, Bearer, Stream),
    route("/api/zslides/generate/stream", Post, Bearer, Stream),
    route("/api/chat-to-presentation/stream", Post, Bearer, Stream),
    route("/api/models", Get, Bearer, JsonKind),
    route("/api/search-engines", Get, Bearer, JsonKind),
    route("/api/slide-generators", Get, Bearer, JsonKind),
    route("/api/plans", Get, Bearer, JsonKind),
    route("/api/user/subscription", Get, UserEmail, JsonKind),
    route("/api/user/usage", Get, UserEmail, JsonKind),
    route("/api/admin/stats", Get, UserEmail, JsonKind),
    route("/api/admin/users", Get, UserEmail, JsonKind),
    route("/api/admin/plans", Get, UserEmail, JsonKind),
    route("/api/admin/users/role", Post, UserEmail, JsonKind),
    route("/api/admin/subscriptions/assign", Post, UserEmail, JsonKind),
    route("/api/health", Get, Public, JsonKind),
];

#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Gateway,
    pub sessions: SessionRegistry,
    pub cookie_name: Arc<str>,
}

impl GatewayState {
    pub fn new(gateway: Gateway, sessions: SessionRegistry, cookie_name: &str) -> Self {
        Self {
            gateway,
            sessions,
            cookie_name: Arc::from(cookie_name),
        }
    }

    async fn identity(&self, cookies: &Cookies) -> Option<Identity> {
        let cookie = cookies.get(&self.cookie_name)?;
        self.sessions.identity(cookie.value()).await
    }
}

pub fn router(state: GatewayState) -> Router {
    let mut by_path: BTreeMap<&'static str, MethodRouter<GatewayState>> = BTreeMap::new();
    for entry in ROUTES {
        let handler = move |State(state): State<GatewayState>, cookies: Cookies, request: Request| async move {
            forward_route(entry, state, cookies, request).await
        };
        let method_router = match by_path.remove(entry.path) {
            Some(existing) => existing.on(entry.verb.filter(), handler),
            None => on(entry.verb.filter(), handler),
        };
        by_path.insert(entry.path, method_router);
    }

    let mut router = Router::new()
        .route("/api/admin/check", get(admin_check))
        .route("/api/auth/session", get(auth_session))
        .route("/api/auth/signout", post(auth_signout));
    for (path, method_router) in by_path {
        router = router.route(path, method_router);
    }
    router.layer(CookieManagerLayer::new()).with_state(state)
}

fn unauthorized() -> Response {
    ErrorEnvelope::new("Unauthorized").into_response_with(StatusCode::UNAUTHORIZED)
}

async fn forward_route(
    entry: &'static RouteSpec,
    state: GatewayState,
    cookies: Cookies,
    request: Request,
) -> Response {
    let identity = match entry.auth {
        RouteAuth::Public => None,
        RouteAuth::Bearer | RouteAuth::UserEmail => match state.identity(&cookies).await {
            Some(identity) => Some(identity),
            None => {
                tracing::debug!(path = entry.path, "rejected request without session");
                return unauthorized();
            }
        },
    };

    let credential = match (entry.auth, &identity) {
        (RouteAuth::UserEmail, Some(identity)) => Credential::UserEmail(identity.email.clone()),
        _ => Credential::Bearer,
    };
    let user_id = identity
        .as_ref()
        .filter(|_| entry.inject_user)
        .map(|identity| identity.email.clone());

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(err) => {
            return ErrorEnvelope::new("Request body too large")
                .with_details(err.to_string())
                .into_response_with(StatusCode::PAYLOAD_TOO_LARGE)
        }
    };

    state
        .gateway
        .forward(ForwardRequest {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            user_id,
            content_type: parts.headers.get(CONTENT_TYPE).cloned(),
            body,
            credential,
            kind: entry.kind,
        })
        .await
}

async fn admin_check(State(state): State<GatewayState>, cookies: Cookies) -> Response {
    match state.identity(&cookies).await {
        Some(identity) => state.gateway.probe_admin(&identity.email).await,
        None => unauthorized(),
    }
}

async fn auth_session(State(state): State<GatewayState>, cookies: Cookies) -> Response {
    match state.identity(&cookies).await {
        Some(identity) => Json(identity).into_response(),
        None => unauthorized(),
    }
}

async fn auth_signout(State(state): State<GatewayState>, cookies: Cookies) -> Response {
    if let Some(cookie) = cookies.get(&state.cookie_name) {
        state.sessions.destroy_session(cookie.value()).await;
        let mut removal = Cookie::new(state.cookie_name.to_string(), "");
        removal.set_path("/");
        cookies.remove(removal);
    }
    StatusCode::NO_CONTENT.into_response()
}
