//! Mock HTTP transport for testing.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::remote::{FormField, HttpResponse, HttpTransport, TransportError};

/// A recorded request for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: Url,
    /// Form fields for POSTs, empty for GETs.
    pub fields: Vec<FormField>,
}

#[derive(Debug, Clone)]
enum Canned {
    Response { status: u16, body: Bytes },
    Failure(TransportError),
}

/// Mock implementation of [`HttpTransport`].
///
/// Responses are keyed by URL regardless of method. Unregistered URLs get an
/// empty 404.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    routes: Arc<RwLock<HashMap<String, Canned>>>,
    requests: Arc<RwLock<Vec<RecordedRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` with status 200 at `url`.
    pub async fn respond_html(&self, url: &str, html: String) {
        self.respond(url, 200, Bytes::from(html)).await;
    }

    pub async fn respond(&self, url: &str, status: u16, body: Bytes) {
        self.routes
            .write()
            .await
            .insert(normalize(url), Canned::Response { status, body });
    }

    /// Fail every request to `url` with `error`.
    pub async fn fail(&self, url: &str, error: TransportError) {
        self.routes
            .write()
            .await
            .insert(normalize(url), Canned::Failure(error));
    }

    /// Get all recorded requests.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().await.clone()
    }

    async fn answer(
        &self,
        method: &'static str,
        url: &Url,
        fields: Vec<FormField>,
    ) -> Result<HttpResponse, TransportError> {
        self.requests.write().await.push(RecordedRequest {
            method,
            url: url.clone(),
            fields,
        });

        match self.routes.read().await.get(url.as_str()).cloned() {
            Some(Canned::Response { status, body }) => Ok(HttpResponse {
                status,
                final_url: url.clone(),
                body,
            }),
            Some(Canned::Failure(error)) => Err(error),
            None => Ok(HttpResponse {
                status: 404,
                final_url: url.clone(),
                body: Bytes::new(),
            }),
        }
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post_form(
        &self,
        url: &Url,
        fields: Vec<FormField>,
    ) -> Result<HttpResponse, TransportError> {
        self.answer("POST", url, fields).await
    }

    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        self.answer("GET", url, Vec::new()).await
    }
}
