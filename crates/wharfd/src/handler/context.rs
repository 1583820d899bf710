//! Deployed web contexts serving static content from a resource base.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::RwLock;

use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{ALLOW, AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Redirect, Response};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use tower::ServiceExt as _;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};
use wharf_types::{ContextInfo, ContextState};

use super::HTTP_TARGET;
use crate::realm::{AuthOutcome, LoginService};

/// Characters re-encoded when a decoded path is handed to the file service.
const PATH_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Static settings for a context, produced by a deployer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSettings {
    /// Path prefix, always starting with `/` and never ending with one unless
    /// it is the root.
    pub context_path: String,
    /// Deployer key that produced the context.
    pub origin: String,
    /// Directory the context serves from.
    pub resource_base: PathBuf,
    /// Files tried, in order, when a directory is requested.
    pub welcome_files: Vec<String>,
    /// Whether directories without a welcome file are listed.
    pub directory_listing: bool,
    /// Role a principal needs to access the context.
    pub required_role: Option<String>,
    /// Host name the context is restricted to.
    pub virtual_host: Option<String>,
}

/// A context attached to the handler chain.
#[derive(Debug)]
pub struct WebContext {
    settings: ContextSettings,
    state: RwLock<ContextState>,
}

impl WebContext {
    /// Builds a stopped context.
    #[must_use]
    pub fn new(settings: ContextSettings) -> Self {
        Self {
            settings,
            state: RwLock::new(ContextState::Stopped),
        }
    }

    /// Starts the context. A missing resource base leaves it `Failed`.
    pub fn start(&self) -> ContextState {
        let next = if self.settings.resource_base.is_dir() {
            ContextState::Running
        } else {
            warn!(
                target: HTTP_TARGET,
                context = %self.settings.context_path,
                resource_base = %self.settings.resource_base.display(),
                "resource base missing; context failed"
            );
            ContextState::Failed
        };
        self.set_state(next);
        if next == ContextState::Running {
            info!(
                target: HTTP_TARGET,
                context = %self.settings.context_path,
                origin = %self.settings.origin,
                "context started"
            );
        }
        next
    }

    pub fn stop(&self) {
        self.set_state(ContextState::Stopped);
        debug!(
            target: HTTP_TARGET,
            context = %self.settings.context_path,
            "context stopped"
        );
    }

    #[must_use]
    pub fn state(&self) -> ContextState {
        *self
            .state
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn context_path(&self) -> &str {
        &self.settings.context_path
    }

    #[must_use]
    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    #[must_use]
    pub fn info(&self) -> ContextInfo {
        ContextInfo {
            context_path: self.settings.context_path.clone(),
            origin: self.settings.origin.clone(),
            resource_base: self.settings.resource_base.display().to_string(),
            state: self.state(),
            virtual_host: self.settings.virtual_host.clone(),
        }
    }

    /// Returns `true` when this context claims the decoded `path` for `host`.
    pub(crate) fn matches(&self, host: Option<&str>, path: &str) -> bool {
        if let Some(virtual_host) = &self.settings.virtual_host
            && !host.is_some_and(|host| host.eq_ignore_ascii_case(virtual_host))
        {
            return false;
        }
        path_within(&self.settings.context_path, path)
    }

    /// Answers a request this context claimed.
    pub(crate) async fn serve(&self, request: Request, realm: Option<&LoginService>) -> Response {
        if self.state() != ContextState::Running {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
        if let (Some(role), Some(realm)) = (&self.settings.required_role, realm) {
            let authorization = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok());
            match realm.authorise(authorization, role) {
                AuthOutcome::Granted(_) => {}
                AuthOutcome::Unauthenticated => {
                    return (
                        StatusCode::UNAUTHORIZED,
                        [(WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", realm.name()))],
                    )
                        .into_response();
                }
                AuthOutcome::Forbidden(_) => return StatusCode::FORBIDDEN.into_response(),
            }
        }
        if request.method() != Method::GET && request.method() != Method::HEAD {
            return (StatusCode::METHOD_NOT_ALLOWED, [(ALLOW, "GET, HEAD")]).into_response();
        }

        let decoded = decode_path(request.uri().path());
        let relative = relative_path(&self.settings.context_path, &decoded).to_owned();
        let directory = local_path(&self.settings.resource_base, &relative)
            .filter(|target| target.is_dir());
        let Some(directory) = directory else {
            return self.forward(request, &relative).await;
        };
        if !decoded.ends_with('/') {
            return Redirect::permanent(&format!("{}/", request.uri().path())).into_response();
        }
        for welcome in &self.settings.welcome_files {
            if directory.join(welcome).is_file() {
                return self.forward(request, &format!("{relative}{welcome}")).await;
            }
        }
        if !self.settings.directory_listing {
            return StatusCode::FORBIDDEN.into_response();
        }
        match list_directory(&directory, &decoded) {
            Ok(page) => Html(page).into_response(),
            Err(error) => {
                warn!(
                    target: HTTP_TARGET,
                    directory = %directory.display(),
                    error = %error,
                    "failed to list directory"
                );
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }

    /// Hands the request to the file service with the context prefix removed.
    async fn forward(&self, mut request: Request, relative: &str) -> Response {
        let path = utf8_percent_encode(relative, PATH_ESCAPES).to_string();
        let target = match request.uri().query() {
            Some(query) => format!("{path}?{query}"),
            None => path,
        };
        match target.parse::<Uri>() {
            Ok(uri) => *request.uri_mut() = uri,
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        }
        let files =
            ServeDir::new(&self.settings.resource_base).append_index_html_on_directories(false);
        match files.oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        }
    }

    fn set_state(&self, next: ContextState) {
        *self
            .state
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = next;
    }
}

/// Returns `true` if `path` equals `prefix` or lies below it.
pub(crate) fn path_within(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

pub(crate) fn decode_path(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

fn relative_path<'a>(context_path: &str, request_path: &'a str) -> &'a str {
    if context_path == "/" {
        return request_path;
    }
    request_path
        .strip_prefix(context_path)
        .unwrap_or(request_path)
}

/// Maps a decoded request path onto the resource base, rejecting traversal.
fn local_path(base: &Path, relative: &str) -> Option<PathBuf> {
    let mut target = base.to_path_buf();
    for component in Path::new(relative.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(target)
}

fn list_directory(directory: &Path, request_path: &str) -> io::Result<String> {
    let mut names = fs::read_dir(directory)?
        .filter_map(Result::ok)
        .map(|entry| {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() {
                name.push('/');
            }
            name
        })
        .collect::<Vec<_>>();
    names.sort();
    let title = escape_html(request_path);
    let mut body = format!(
        "<HTML>\n<HEAD>\n<TITLE>{title}</TITLE>\n</HEAD>\n<BODY>\n<H1>{title}</H1>\n<ul>\n"
    );
    for name in names {
        let href = utf8_percent_encode(&name, PATH_ESCAPES);
        let name = escape_html(&name);
        body.push_str(&format!("<li><a href=\"{href}\">{name}</a></li>\n"));
    }
    body.push_str("</ul>\n</BODY>\n</HTML>\n");
    Ok(body)
}

pub(crate) fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
