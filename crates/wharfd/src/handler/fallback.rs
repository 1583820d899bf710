//! Handler invoked when no context claims a request.

use axum::http::{Method, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc2822;
use wharf_types::{ContextInfo, ContextState, Scheme};

use super::context::escape_html;

const PAGE_TITLE: &str = "Welcome to wharf";

/// Connection details used to build absolute links for virtual-host contexts.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocalEndpoint {
    pub(crate) scheme: Scheme,
    pub(crate) port: u16,
}

/// Answers `GET /` with a status page and every other request with 404.
///
/// The status page itself is served with status 404 so that clients never
/// mistake it for a deployed application.
pub(crate) fn respond(
    method: &Method,
    path: &str,
    contexts: &[ContextInfo],
    endpoint: Option<LocalEndpoint>,
) -> Response {
    if method != Method::GET || path != "/" {
        return StatusCode::NOT_FOUND.into_response();
    }
    let page = render_welcome(contexts, endpoint, OffsetDateTime::now_utc());
    (StatusCode::NOT_FOUND, Html(page)).into_response()
}

pub(crate) fn render_welcome(
    contexts: &[ContextInfo],
    endpoint: Option<LocalEndpoint>,
    now: OffsetDateTime,
) -> String {
    let timestamp = now
        .format(&Rfc2822)
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    let mut page = format!(
        "<HTML>\n<HEAD>\n<TITLE>{PAGE_TITLE}</TITLE>\n</HEAD>\n<BODY>\n<H2>{PAGE_TITLE}</H2>\n\
         <p>wharf is running successfully. ({timestamp})</p>\n"
    );

    if contexts.is_empty() {
        page.push_str("<p>There are currently no apps deployed.</p>\n");
    } else {
        page.push_str("<p>Available contexts are: </p><ul>\n");
        for context in contexts {
            page.push_str(&render_entry(context, endpoint));
            page.push('\n');
        }
        page.push_str("</ul>\n");
    }
    page.push_str("</BODY>\n</HTML>\n");
    page
}

fn render_entry(context: &ContextInfo, endpoint: Option<LocalEndpoint>) -> String {
    let path = escape_html(&context.context_path);
    let host_suffix = match (&context.virtual_host, endpoint) {
        (Some(host), Some(endpoint)) => format!("&nbsp;@&nbsp;{}:{}", escape_html(host), endpoint.port),
        (Some(host), None) => format!("&nbsp;@&nbsp;{}", escape_html(host)),
        (None, _) => String::new(),
    };
    let origin = escape_html(&context.origin);
    match context.state {
        ContextState::Running => {
            let href = match (&context.virtual_host, endpoint) {
                (Some(host), Some(endpoint)) => format!(
                    "{}://{}:{}{}",
                    endpoint.scheme,
                    escape_html(host),
                    endpoint.port,
                    link_path(&path)
                ),
                _ => link_path(&path),
            };
            format!("<li><a href=\"{href}\">{path}{host_suffix}&nbsp;-->&nbsp;{origin}</a></li>")
        }
        ContextState::Stopped => {
            format!("<li>{path}{host_suffix}&nbsp;--->&nbsp;{origin} [stopped]</li>")
        }
        ContextState::Failed => {
            format!("<li>{path}{host_suffix}&nbsp;--->&nbsp;{origin} [failed]</li>")
        }
    }
}

fn link_path(path: &str) -> String {
    if path.ends_with('/') {
        path.to_owned()
    } else {
        format!("{path}/")
    }
}
