//! Filesystem-backed static route kind.
//!
//! Each `static` endpoint descriptor names a `route` prefix and a
//! `staticPath` directory on disk. Unlike the teacher's `conduit-static`
//! (which served `rust-embed`-compiled-in SPA assets), this serves files
//! from an operator-configured directory at request time — the gateway has
//! no UI assets of its own to embed.

use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio_util::io::ReaderStream;

/// The route synthesizer mounts a `static` descriptor as
/// `/{route}/{*tail}` with a closure capturing a clone of `StaticRoot` that
/// calls [`StaticRoot::serve`] with the matched `tail`.
///
/// A single `static` route kind handler, rooted at `root` on disk.
#[derive(Clone, Debug)]
pub struct StaticRoot {
    root: PathBuf,
}

impl StaticRoot {
    /// Build a handler rooted at `staticPath`. The directory need not exist
    /// yet at construction time — it's checked per-request.
    pub fn new(static_path: impl Into<PathBuf>) -> Self {
        Self { root: static_path.into() }
    }

    /// Resolve `requested` (the tail of the URL past the route prefix)
    /// against the root, rejecting any attempt to escape it via `..` or an
    /// absolute path component.
    fn resolve(&self, requested: &str) -> Option<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(requested).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(resolved)
    }

    /// Serve `requested` (URL-decoded path tail), defaulting to `index.html`
    /// for directory requests.
    pub async fn serve(&self, requested: &str) -> Response {
        let Some(mut path) = self.resolve(requested) else {
            return (StatusCode::BAD_REQUEST, "invalid path").into_response();
        };

        if path.is_dir() {
            path.push("index.html");
        }

        match tokio::fs::File::open(&path).await {
            Ok(file) => {
                let mime = mime_guess::from_path(&path).first_or_octet_stream();
                let stream = ReaderStream::new(file);
                let body = Body::from_stream(stream);
                Response::builder()
                    .status(StatusCode::OK)
                    .header(header::CONTENT_TYPE, mime.as_ref())
                    .body(body)
                    .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                (StatusCode::NOT_FOUND, "not found").into_response()
            }
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "static file read failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "read error").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"hi").unwrap();
        let root = StaticRoot::new(dir.path());
        let resp = root.serve("hello.txt").await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let root = StaticRoot::new(dir.path());
        let resp = root.serve("nope.txt").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let root = StaticRoot::new(dir.path());
        let resp = root.serve("../../etc/passwd").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn directory_request_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), b"<html></html>").unwrap();
        let root = StaticRoot::new(dir.path());
        let resp = root.serve(".").await;
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
