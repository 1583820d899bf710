//! Handler chain: context registry first, fallback handler last.

use std::sync::{Arc, OnceLock};

use axum::Router;
use axum::extract::{Request, State};
use axum::http::header::HOST;
use axum::response::Response;
use tower_http::trace::TraceLayer;
use tracing::debug;

use super::HTTP_TARGET;
use super::context::decode_path;
use super::fallback::{self, LocalEndpoint};
use super::registry::ContextRegistry;
use crate::realm::LoginService;

/// Routes each request to the best matching context, or to the fallback
/// handler when none matches.
#[derive(Debug)]
pub(crate) struct HandlerChain {
    registry: Arc<ContextRegistry>,
    realm: OnceLock<Arc<LoginService>>,
}

impl HandlerChain {
    pub(crate) fn new(registry: Arc<ContextRegistry>) -> Self {
        Self {
            registry,
            realm: OnceLock::new(),
        }
    }

    /// Attaches the security realm. Only the first realm is kept.
    pub(crate) fn attach_realm(&self, realm: Arc<LoginService>) -> bool {
        self.realm.set(realm).is_ok()
    }

    pub(crate) fn realm(&self) -> Option<&LoginService> {
        self.realm.get().map(Arc::as_ref)
    }

    /// Builds the router one connector serves.
    ///
    /// Every request reaches the fallback service, which resolves the
    /// registry per request so hot deployments apply without a new router.
    pub(crate) fn router(self: &Arc<Self>, endpoint: LocalEndpoint) -> Router {
        Router::new()
            .fallback(route_request)
            .with_state(Routing {
                chain: Arc::clone(self),
                endpoint,
            })
            .layer(TraceLayer::new_for_http())
    }

    pub(crate) async fn dispatch(
        &self,
        request: Request,
        endpoint: Option<LocalEndpoint>,
    ) -> Response {
        let host = request_host(&request);
        let path = decode_path(request.uri().path());
        match self.registry.resolve(host.as_deref(), &path) {
            Some(context) => context.serve(request, self.realm()).await,
            None => fallback::respond(request.method(), &path, &self.registry.infos(), endpoint),
        }
    }
}

#[derive(Clone)]
struct Routing {
    chain: Arc<HandlerChain>,
    endpoint: LocalEndpoint,
}

async fn route_request(State(routing): State<Routing>, request: Request) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let response = routing.chain.dispatch(request, Some(routing.endpoint)).await;
    debug!(
        target: HTTP_TARGET,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        "request handled"
    );
    response
}

/// Host the request was addressed to, without its port.
fn request_host(request: &Request) -> Option<String> {
    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host())?;
    let name = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    Some(name.to_owned())
}
