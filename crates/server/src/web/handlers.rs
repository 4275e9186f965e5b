//! Route handlers.
//!
//! Each path-bearing handler resolves its `path` query parameter through the
//! sandbox first; nothing touches the filesystem with an unresolved path.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Form, Query, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use protocol::messages::{parent_path, ListResponse, ManifestResponse};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::pages;
use super::AppState;
use crate::files::{Listing, Manifest, ResolvedPath};

/// `?path=` query parameter. Missing means the root.
#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    #[serde(default)]
    pub path: String,
}

/// Login form body.
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

/// Redirect requests without a valid session to the login page.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.gate.is_authorized(request.headers()) {
        return next.run(request).await;
    }
    debug!(uri = %request.uri(), "Unauthenticated request, redirecting to login");
    Redirect::to("/login").into_response()
}

pub async fn index() -> Redirect {
    Redirect::to("/browse")
}

pub async fn login_page() -> Html<String> {
    Html(pages::login_page(false))
}

pub async fn login(State(state): State<Arc<AppState>>, Form(form): Form<LoginForm>) -> Response {
    if !state.gate.verify_password(&form.password) {
        warn!("Rejected login attempt with wrong password");
        return (StatusCode::UNAUTHORIZED, Html(pages::login_page(true))).into_response();
    }

    info!("Session opened");
    (
        [(header::SET_COOKIE, state.gate.login_cookie())],
        Redirect::to("/browse"),
    )
        .into_response()
}

pub async fn logout(State(state): State<Arc<AppState>>) -> Response {
    (
        [(header::SET_COOKIE, state.gate.logout_cookie())],
        Redirect::to("/login"),
    )
        .into_response()
}

pub async fn browse(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Response {
    list(state, query.path)
        .await
        .map(|(dir, listing)| Html(pages::browse_page(dir.relative(), &listing)).into_response())
        .unwrap_or_else(ApiError::into_text_response)
}

pub async fn api_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let (dir, listing) = list(state, query.path).await?;

    Ok(Json(ListResponse {
        path: dir.relative().to_string(),
        parent: parent_path(dir.relative()),
        dirs: listing.dirs.iter().map(|e| e.to_protocol()).collect(),
        files: listing.files.iter().map(|e| e.to_protocol()).collect(),
    }))
}

pub async fn folder_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Result<Json<ManifestResponse>, ApiError> {
    let manifest = manifest(state, query.path).await?;
    Ok(Json(ManifestResponse {
        files: manifest.into_inner(),
    }))
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PathQuery>,
) -> Response {
    stream_file(state, query.path)
        .await
        .unwrap_or_else(ApiError::into_text_response)
}

async fn list(state: Arc<AppState>, path: String) -> Result<(ResolvedPath, Listing), ApiError> {
    blocking(move || {
        let dir = state.sandbox.resolve(&path)?;
        let listing = state.browser.list(&dir)?;
        Ok((dir, listing))
    })
    .await
}

async fn manifest(state: Arc<AppState>, path: String) -> Result<Manifest, ApiError> {
    blocking(move || {
        let dir = state.sandbox.resolve(&path)?;
        Ok(state.manifests.build(&dir)?)
    })
    .await
}

async fn stream_file(state: Arc<AppState>, path: String) -> Result<Response, ApiError> {
    let file = blocking({
        let state = Arc::clone(&state);
        move || Ok(state.sandbox.resolve(&path)?)
    })
    .await?;
    let download = state.transfer.open(&file).await?;

    info!(path = %file.relative(), len = download.len, "Starting download");

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, download.len.into());
    headers.insert(
        header::CONTENT_DISPOSITION,
        header::HeaderValue::from_str(&content_disposition(&download.name))
            .map_err(|e| ApiError::Internal(e.to_string()))?,
    );

    Ok((headers, Body::from_stream(download.stream)).into_response())
}

/// Run filesystem work off the async reactor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// `attachment` disposition with an ASCII fallback and a UTF-8 filename.
fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            ' '..='~' if c != '"' && c != '\\' => c,
            _ => '_',
        })
        .collect();
    let encoded = urlencoding::encode(name);
    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\"; filename*=UTF-8''report.pdf"
        );
    }

    #[test]
    fn test_content_disposition_unicode() {
        let value = content_disposition("résumé 1.txt");
        assert!(value.starts_with("attachment; filename=\"r_sum_ 1.txt\""));
        assert!(value.ends_with("filename*=UTF-8''r%C3%A9sum%C3%A9%201.txt"));
        assert!(value.is_ascii());
    }

    #[test]
    fn test_content_disposition_quotes() {
        let value = content_disposition("say \"hi\".txt");
        assert!(value.contains("filename=\"say _hi_.txt\""));
        assert!(value.contains("say%20%22hi%22.txt"));
    }
}
