//! HTTP transport port and its reqwest implementation.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, Url};
use std::time::Duration;
use tracing::debug;

use super::config::RemoteConfig;
use super::error::TransportError;

/// One multipart form field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormField {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        filename: String,
        mime: String,
        bytes: Bytes,
    },
}

impl FormField {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        mime: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self::File {
            name: name.into(),
            filename: filename.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Text { name, .. } | Self::File { name, .. } => name,
        }
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// URL after redirects; relative links in the body resolve against it.
    pub final_url: Url,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Minimal HTTP client used by the remote fallback and URL fetching.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POSTs `fields` as `multipart/form-data`.
    async fn post_form(
        &self,
        url: &Url,
        fields: Vec<FormField>,
    ) -> Result<HttpResponse, TransportError>;

    /// GETs `url`.
    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by `reqwest`, following redirects with a cookie jar.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &RemoteConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    async fn read(response: reqwest::Response) -> Result<HttpResponse, TransportError> {
        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let body = response.bytes().await?;
        debug!(%final_url, status, bytes = body.len(), "HTTP response");
        Ok(HttpResponse {
            status,
            final_url,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_form(
        &self,
        url: &Url,
        fields: Vec<FormField>,
    ) -> Result<HttpResponse, TransportError> {
        let mut form = multipart::Form::new();
        for field in fields {
            form = match field {
                FormField::Text { name, value } => form.text(name, value),
                FormField::File {
                    name,
                    filename,
                    mime,
                    bytes,
                } => {
                    let part = multipart::Part::bytes(bytes.to_vec())
                        .file_name(filename)
                        .mime_str(&mime)
                        .map_err(|e| TransportError::Request(e.to_string()))?;
                    form.part(name, part)
                }
            };
        }

        debug!(%url, "POST multipart");
        let response = self.client.post(url.clone()).multipart(form).send().await?;
        Self::read(response).await
    }

    async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
        debug!(%url, "GET");
        let response = self.client.get(url.clone()).send().await?;
        Self::read(response).await
    }
}
