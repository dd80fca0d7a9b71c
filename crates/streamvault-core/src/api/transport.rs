//! The seam between the session pipeline and the network.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use tracing::debug;

use super::request::FileUpload;
use super::{ApiError, ApiRequest, ApiResponse};

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Sends a request to the backend and returns whatever came back.
/// Implementations report non-2xx statuses as `Ok` responses; only
/// failures to complete the exchange are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;

    /// Value of a cookie the backend has set on this client, if any.
    fn cookie(&self, _name: &str) -> Option<String> {
        None
    }
}

/// reqwest-backed transport. Cookies persist in a shared jar and are sent
/// on every request, so cookie-only credentials keep working.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    jar: Arc<Jar>,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;
        let jar = Arc::new(Jar::default());

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .cookie_provider(jar.clone())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            jar,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Resolve a request path against the base URL. Absolute URLs pass through.
    fn url_for(&self, path: &str) -> Result<Url, ApiError> {
        let raw = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url(), path.trim_start_matches('/'))
        };
        Url::parse(&raw).map_err(|e| ApiError::Transport(format!("Invalid request URL {}: {}", raw, e)))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(&request.path)?;
        debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());
        if let Some(ref upload) = request.upload {
            builder = builder.multipart(multipart_form(upload)?);
        } else if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "Response received");

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.base_url)?;
        let cookies = header.to_str().ok()?;
        cookies.split(';').find_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
    }
}

fn multipart_form(upload: &FileUpload) -> Result<Form, ApiError> {
    let mut part = Part::bytes(upload.bytes.clone()).file_name(upload.file_name.clone());
    if let Some(ref mime_type) = upload.mime_type {
        part = part.mime_str(mime_type)?;
    }
    Ok(Form::new().part(upload.field.clone(), part))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_joins_relative_paths() {
        let transport = HttpTransport::new("https://api.example.com/api").unwrap();
        assert_eq!(
            transport.url_for("/auth/me").unwrap().as_str(),
            "https://api.example.com/api/auth/me"
        );
        assert_eq!(
            transport.url_for("videos?page=2").unwrap().as_str(),
            "https://api.example.com/api/videos?page=2"
        );
        assert_eq!(
            transport.url_for("https://cdn.example.com/a.mp4").unwrap().as_str(),
            "https://cdn.example.com/a.mp4"
        );
    }

    #[test]
    fn test_cookie_lookup_reads_jar() {
        let transport = HttpTransport::new("http://localhost:8080/api").unwrap();
        assert_eq!(transport.cookie("jwt"), None);

        let url = Url::parse("http://localhost:8080/api").unwrap();
        transport.jar.add_cookie_str("jwt=abc.def.ghi; Path=/", &url);
        transport.jar.add_cookie_str("theme=dark; Path=/", &url);

        assert_eq!(transport.cookie("jwt").as_deref(), Some("abc.def.ghi"));
        assert_eq!(transport.cookie("theme").as_deref(), Some("dark"));
        assert_eq!(transport.cookie("missing"), None);
    }

    #[test]
    fn test_multipart_form_rejects_bad_mime_type() {
        let mut upload = FileUpload {
            field: "file".to_string(),
            file_name: "me.png".to_string(),
            mime_type: Some("image/png".to_string()),
            bytes: b"png".to_vec(),
        };
        assert!(multipart_form(&upload).is_ok());

        upload.mime_type = Some("not a mime".to_string());
        assert!(matches!(multipart_form(&upload), Err(ApiError::NetworkError(_))));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(HttpTransport::new("not a url").is_err());
    }
}
