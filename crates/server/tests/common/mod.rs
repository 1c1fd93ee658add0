//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with spy backends injected, so the HTTP surface can be exercised without
//! ffmpeg or network access.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use stickerline_core::{
    remote::RemoteConverter,
    sticker::{EncoderConfig, StickerEncoder},
    temp::TempWorkspace,
    testing::{SpyRemote, SpyTranscoder},
    transcoder::LocalTranscoder,
    Config, ConversionOrchestrator, OrchestratorConfig,
};
use stickerline_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use stickerline_core::testing::fixtures;

/// Test fixture for API testing with spy backends.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_convert() {
///     let fixture = TestFixture::new().await;
///
///     let form = MultipartForm::new()
///         .file("file", "s.webp", "image/webp", fixtures::animated_webp())
///         .text("target", "video");
///     let response = fixture.post_form("/api/v1/convert", form).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Local transcoder spy
    pub transcoder: SpyTranscoder,
    /// Remote converter spy, when enabled
    pub remote: Option<SpyRemote>,
    /// Working directory of the orchestrator
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub bytes: Bytes,
    /// Parsed JSON body, `Null` for binary responses.
    pub body: Value,
}

impl TestResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

impl TestFixture {
    /// Create a new test fixture with default spies.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.workspace.dir = temp_dir.path().join("tmp");
        if let Some(max) = test_config.max_upload_bytes {
            config.server.max_upload_bytes = max;
        }

        let transcoder = test_config.transcoder;
        let remote = test_config.remote;

        let local: Arc<dyn LocalTranscoder> = Arc::new(transcoder.clone());
        let remote_backend = remote
            .clone()
            .map(|r| Arc::new(r) as Arc<dyn RemoteConverter>);
        let encoder =
            StickerEncoder::new(EncoderConfig::default()).with_transcoder(local.clone());

        let orchestrator = ConversionOrchestrator::new(
            OrchestratorConfig::default(),
            TempWorkspace::new(config.workspace.dir.clone()),
            local,
            remote_backend,
            encoder,
        )
        .with_download_results(test_config.download_results);

        let state = Arc::new(AppState::new(config, orchestrator));
        let router = create_router(state);

        Self {
            router,
            transcoder,
            remote,
            temp_dir,
        }
    }

    /// Files left in the working directory.
    pub fn leftover_files(&self) -> usize {
        std::fs::read_dir(self.temp_dir.path().join("tmp"))
            .map(|d| d.count())
            .unwrap_or(0)
    }

    /// Send a GET request.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a multipart POST request.
    pub async fn post_form(&self, path: &str, form: MultipartForm) -> TestResponse {
        let (content_type, body) = form.build();
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            bytes,
            body,
        }
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub transcoder: SpyTranscoder,
    pub remote: Option<SpyRemote>,
    pub download_results: bool,
    pub max_upload_bytes: Option<usize>,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            transcoder: SpyTranscoder::succeeding(fixtures::mp4_header()),
            remote: Some(SpyRemote::succeeding(fixtures::mp4_header())),
            download_results: true,
            max_upload_bytes: None,
        }
    }
}

impl TestConfig {
    /// ffmpeg missing, remote succeeding.
    pub fn remote_only() -> Self {
        Self {
            transcoder: SpyTranscoder::unavailable(),
            ..Default::default()
        }
    }

    /// ffmpeg missing, remote failing.
    pub fn nothing_works() -> Self {
        Self {
            transcoder: SpyTranscoder::unavailable(),
            remote: Some(SpyRemote::failing()),
            ..Default::default()
        }
    }
}

/// Minimal multipart/form-data body builder.
#[derive(Debug, Default)]
pub struct MultipartForm {
    parts: Vec<(String, Option<(String, String)>, Vec<u8>)>,
}

impl MultipartForm {
    const BOUNDARY: &'static str = "stickerline-test-boundary";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.parts
            .push((name.to_string(), None, value.as_bytes().to_vec()));
        self
    }

    pub fn file(mut self, name: &str, filename: &str, mime: &str, bytes: Vec<u8>) -> Self {
        self.parts.push((
            name.to_string(),
            Some((filename.to_string(), mime.to_string())),
            bytes,
        ));
        self
    }

    /// Content type header and encoded body.
    pub fn build(self) -> (String, Vec<u8>) {
        let mut body = Vec::new();
        for (name, file, data) in self.parts {
            body.extend_from_slice(format!("--{}\r\n", Self::BOUNDARY).as_bytes());
            match file {
                Some((filename, mime)) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                            name, filename, mime
                        )
                        .as_bytes(),
                    );
                }
                None => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                }
            }
            body.extend_from_slice(&data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", Self::BOUNDARY).as_bytes());

        (
            format!("multipart/form-data; boundary={}", Self::BOUNDARY),
            body,
        )
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            String::from_utf8_lossy(&$response.bytes)
        );
    };
}
