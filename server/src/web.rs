use crate::search::{SearchOutcome, SearchResponse, SearchService};
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct AppState {
    pub service: SearchService,
    /// `None` disables the per-request timeout.
    pub request_timeout: Option<Duration>,
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index).post(search_handler))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Bind on all interfaces and serve until the process is stopped.
pub async fn serve(state: SharedState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("menu-search listening on {addr}");
    axum::serve(listener, router(state)).await
}

async fn index() -> Html<String> {
    Html(render_page("", None))
}

#[derive(Debug, Deserialize)]
struct SearchForm {
    #[serde(default)]
    query: String,
}

async fn search_handler(
    State(state): State<SharedState>,
    Form(form): Form<SearchForm>,
) -> Response {
    let query = form.query.trim();
    if query.is_empty() {
        return Html(render_page("", None)).into_response();
    }

    let response = match state.request_timeout {
        Some(limit) => match tokio::time::timeout(limit, state.service.search(query)).await {
            Ok(response) => response,
            Err(_) => {
                warn!("Search for {query:?} timed out after {limit:?}");
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "The search request timed out.",
                )
                    .into_response();
            }
        },
        None => state.service.search(query).await,
    };

    Html(render_page(query, Some(&response))).into_response()
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({
        "service": "menu-search",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok",
    }))
}

/// Replace the five HTML metacharacters so user text and backend messages
/// can be embedded in markup verbatim.
fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_page(query: &str, response: Option<&SearchResponse>) -> String {
    let mut page = String::new();
    page.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    page.push_str("<meta charset=\"utf-8\">\n<title>Menu Search</title>\n");
    page.push_str(
        "<style>\n\
         body { font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }\n\
         input[type=text] { width: 24rem; padding: 0.4rem; }\n\
         table { border-collapse: collapse; margin-top: 1rem; }\n\
         td, th { border: 1px solid #999; padding: 0.4rem 0.8rem; text-align: left; }\n\
         .error { color: #b00020; }\n\
         .empty { color: #555; }\n\
         pre { background: #f4f4f4; padding: 1rem; overflow-x: auto; }\n\
         </style>\n",
    );
    page.push_str("</head>\n<body>\n<h1>Menu Search</h1>\n");
    page.push_str("<form method=\"post\" action=\"/\">\n");
    page.push_str(&format!(
        "<input type=\"text\" name=\"query\" value=\"{}\" placeholder=\"e.g. beef noodle soup\" autofocus>\n",
        escape_html(query)
    ));
    page.push_str("<button type=\"submit\">Search</button>\n</form>\n");

    if let Some(response) = response {
        match &response.outcome {
            SearchOutcome::Results(hits) if !hits.is_empty() => {
                page.push_str("<h2>Results</h2>\n<table>\n<tr><th>Item</th><th>Score</th></tr>\n");
                for hit in hits {
                    page.push_str(&format!(
                        "<tr><td>{}</td><td>{:.4}</td></tr>\n",
                        escape_html(&hit.name),
                        hit.score
                    ));
                }
                page.push_str("</table>\n");
            }
            SearchOutcome::Results(_) => {
                page.push_str("<p class=\"empty\">No menu items matched the query.</p>\n");
            }
            SearchOutcome::Error(message) => {
                page.push_str(&format!(
                    "<p class=\"error\">{}</p>\n",
                    escape_html(message)
                ));
            }
        }

        if !response.log.is_empty() {
            page.push_str("<h2>Search log</h2>\n<pre>");
            page.push_str(&escape_html(&response.log.to_text()));
            page.push_str("</pre>\n");
        }
    }

    page.push_str("</body>\n</html>\n");
    page
}
