//! Upload, convert, scrape: the web-form conversion flow.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::sync::Arc;
use tracing::{debug, info};

use super::config::RemoteConfig;
use super::error::RemoteError;
use super::html;
use super::transport::{FormField, HttpResponse, HttpTransport};
use super::{RemoteConverter, RemoteTarget};
use crate::media::InputMedia;

/// State carried from the upload step to the convert step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSession {
    /// Hidden inputs of the conversion form, in document order.
    pub upload_form_fields: Vec<(String, String)>,
    /// Name of the uploaded file on the remote side.
    pub result_token: String,
}

/// [`RemoteConverter`] that drives an ezgif-style site through its HTML forms.
pub struct FormScrapeConverter {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl FormScrapeConverter {
    pub fn new(config: &RemoteConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn route_url(&self, target: RemoteTarget, token: Option<&str>) -> Result<Url, RemoteError> {
        let raw = match token {
            Some(token) => format!("{}/{}/{}", self.base_url, target.route(), token),
            None => format!("{}/{}", self.base_url, target.route()),
        };
        Url::parse(&raw).map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// Step 1: upload the media, scrape the conversion form.
    pub async fn upload(
        &self,
        input: &InputMedia,
        target: RemoteTarget,
    ) -> Result<RemoteSession, RemoteError> {
        let url = self.route_url(target, None)?;
        let source_url = input
            .source_url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_default();
        let fields = vec![
            FormField::text("new-image-url", source_url),
            FormField::file("new-image", "image.webp", "image/webp", input.bytes.clone()),
        ];

        let response = self
            .transport
            .post_form(&url, fields)
            .await
            .map_err(|e| RemoteError::transport("upload", e))?;
        let page = expect_success("upload", response)?.text();

        let form = html::first_form(&page).ok_or(RemoteError::MissingForm)?;
        let upload_form_fields = html::input_fields(form);
        let result_token = upload_form_fields
            .iter()
            .find(|(name, _)| name == "file")
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty())
            .ok_or(RemoteError::MissingToken)?;

        debug!(token = %result_token, fields = upload_form_fields.len(), "Remote upload accepted");
        Ok(RemoteSession {
            upload_form_fields,
            result_token,
        })
    }

    /// Step 2: submit the conversion form, resolve the result locator.
    pub async fn submit(
        &self,
        session: &RemoteSession,
        target: RemoteTarget,
    ) -> Result<Url, RemoteError> {
        let url = self.route_url(target, Some(&session.result_token))?;
        let fields = session
            .upload_form_fields
            .iter()
            .map(|(name, value)| FormField::text(name.clone(), value.clone()))
            .collect();

        let response = self
            .transport
            .post_form(&url, fields)
            .await
            .map_err(|e| RemoteError::transport("convert", e))?;
        let response = expect_success("convert", response)?;
        let page = response.text();

        let src = match target {
            RemoteTarget::Mp4 => html::video_source(&page),
            RemoteTarget::Png => html::output_image(&page),
        }
        .ok_or(RemoteError::MissingResult)?;

        response
            .final_url
            .join(&src)
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", src, e)))
    }
}

fn expect_success(step: &'static str, response: HttpResponse) -> Result<HttpResponse, RemoteError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(RemoteError::Status {
            step,
            status: response.status,
        })
    }
}

#[async_trait]
impl RemoteConverter for FormScrapeConverter {
    fn name(&self) -> &str {
        "form-scrape"
    }

    async fn convert(&self, input: &InputMedia, target: RemoteTarget) -> Result<Url, RemoteError> {
        let session = self.upload(input, target).await?;
        let locator = self.submit(&session, target).await?;
        info!(%locator, route = target.route(), "Remote conversion finished");
        Ok(locator)
    }

    async fn download(&self, locator: &Url) -> Result<Bytes, RemoteError> {
        let response = self
            .transport
            .get(locator)
            .await
            .map_err(|e| RemoteError::transport("download", e))?;
        let body = expect_success("download", response)?.body;
        if body.is_empty() {
            return Err(RemoteError::EmptyDownload);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::TransportError;
    use crate::testing::{fixtures, MockTransport};

    const BASE: &str = "https://ezgif.com";

    fn converter(transport: &MockTransport) -> FormScrapeConverter {
        FormScrapeConverter::new(&RemoteConfig::default(), Arc::new(transport.clone()))
    }

    fn sticker() -> InputMedia {
        InputMedia::new(fixtures::animated_webp(), "image/webp")
    }

    #[tokio::test]
    async fn test_full_mp4_flow() {
        let transport = MockTransport::new();
        transport
            .respond_html(&format!("{}/webp-to-mp4", BASE), fixtures::ezgif_upload_page("ezgif-1-abc.webp"))
            .await;
        transport
            .respond_html(
                &format!("{}/webp-to-mp4/ezgif-1-abc.webp", BASE),
                fixtures::ezgif_video_page("//s3.ezgif.com/tmp/ezgif-1-abc.mp4"),
            )
            .await;

        let locator = converter(&transport)
            .convert(&sticker(), RemoteTarget::Mp4)
            .await
            .unwrap();
        assert_eq!(locator.as_str(), "https://s3.ezgif.com/tmp/ezgif-1-abc.mp4");

        let requests = transport.requests().await;
        assert_eq!(requests.len(), 2);

        let upload = &requests[0];
        assert_eq!(upload.fields[0], FormField::text("new-image-url", ""));
        match &upload.fields[1] {
            FormField::File {
                name,
                filename,
                bytes,
                ..
            } => {
                assert_eq!(name, "new-image");
                assert_eq!(filename, "image.webp");
                assert_eq!(bytes.as_ref(), fixtures::animated_webp().as_slice());
            }
            other => panic!("unexpected field: {:?}", other),
        }

        // Second POST replays the scraped fields verbatim
        let convert = &requests[1];
        assert_eq!(
            convert.fields,
            vec![
                FormField::text("file", "ezgif-1-abc.webp"),
                FormField::text("token", "abc123"),
            ]
        );
    }

    #[tokio::test]
    async fn test_png_flow_resolves_relative_locator() {
        let transport = MockTransport::new();
        transport
            .respond_html(&format!("{}/webp-to-png", BASE), fixtures::ezgif_upload_page("f.webp"))
            .await;
        transport
            .respond_html(
                &format!("{}/webp-to-png/f.webp", BASE),
                fixtures::ezgif_image_page("/tmp/f.png"),
            )
            .await;

        let locator = converter(&transport)
            .convert(&sticker(), RemoteTarget::Png)
            .await
            .unwrap();
        assert_eq!(locator.as_str(), "https://ezgif.com/tmp/f.png");
    }

    #[tokio::test]
    async fn test_source_url_is_forwarded() {
        let transport = MockTransport::new();
        transport
            .respond_html(&format!("{}/webp-to-mp4", BASE), fixtures::ezgif_upload_page("u.webp"))
            .await;
        transport
            .respond_html(
                &format!("{}/webp-to-mp4/u.webp", BASE),
                fixtures::ezgif_video_page("https://s3.ezgif.com/u.mp4"),
            )
            .await;

        let input = InputMedia::from_url("https://cdn.example.com/s.webp".parse().unwrap(), "image/webp");
        converter(&transport)
            .convert(&input, RemoteTarget::Mp4)
            .await
            .unwrap();

        let upload = &transport.requests().await[0];
        assert_eq!(
            upload.fields[0],
            FormField::text("new-image-url", "https://cdn.example.com/s.webp")
        );
    }

    #[tokio::test]
    async fn test_missing_form() {
        let transport = MockTransport::new();
        transport
            .respond_html(&format!("{}/webp-to-mp4", BASE), "<html>busy</html>".to_string())
            .await;

        let err = converter(&transport)
            .convert(&sticker(), RemoteTarget::Mp4)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::MissingForm));
        assert_eq!(transport.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_token() {
        let transport = MockTransport::new();
        transport
            .respond_html(
                &format!("{}/webp-to-mp4", BASE),
                "<form><input name=\"other\" value=\"x\"></form>".to_string(),
            )
            .await;

        let err = converter(&transport)
            .convert(&sticker(), RemoteTarget::Mp4)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::MissingToken));
    }

    #[tokio::test]
    async fn test_missing_result() {
        let transport = MockTransport::new();
        transport
            .respond_html(&format!("{}/webp-to-mp4", BASE), fixtures::ezgif_upload_page("a.webp"))
            .await;
        transport
            .respond_html(
                &format!("{}/webp-to-mp4/a.webp", BASE),
                "<p>Conversion failed</p>".to_string(),
            )
            .await;

        let err = converter(&transport)
            .convert(&sticker(), RemoteTarget::Mp4)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::MissingResult));
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let transport = MockTransport::new();
        transport
            .respond(&format!("{}/webp-to-mp4", BASE), 503, Bytes::from_static(b"down"))
            .await;

        let err = converter(&transport)
            .convert(&sticker(), RemoteTarget::Mp4)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Status {
                step: "upload",
                status: 503
            }
        ));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let transport = MockTransport::new();
        transport
            .fail(&format!("{}/webp-to-mp4", BASE), TransportError::Timeout)
            .await;

        let err = converter(&transport)
            .convert(&sticker(), RemoteTarget::Mp4)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Transport {
                step: "upload",
                source: TransportError::Timeout
            }
        ));
    }

    #[tokio::test]
    async fn test_download() {
        let transport = MockTransport::new();
        let locator: Url = "https://s3.ezgif.com/tmp/a.mp4".parse().unwrap();
        transport
            .respond(locator.as_str(), 200, Bytes::from(fixtures::mp4_header()))
            .await;
        let empty: Url = "https://s3.ezgif.com/tmp/empty.mp4".parse().unwrap();
        transport.respond(empty.as_str(), 200, Bytes::new()).await;

        let converter = converter(&transport);
        let bytes = converter.download(&locator).await.unwrap();
        assert_eq!(bytes.as_ref(), fixtures::mp4_header().as_slice());
        assert!(matches!(
            converter.download(&empty).await,
            Err(RemoteError::EmptyDownload)
        ));
    }
}
