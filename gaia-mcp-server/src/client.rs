//! Client for the ProtoGaia REST API.
//!
//! Covers the three operations the tools need: multipart image upload, style
//! creation and recipe-driven image generation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use gaia_mcp_common::error::{Error, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE, ETAG, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

/// Upper bound for any call to the Gaia API. Follows the gateway timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Upper bound for fetching a source image.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Part size for multipart uploads.
pub const UPLOAD_CHUNK_SIZE: usize = 10 * 1024 * 1024;

const FETCH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                                (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Resource an uploaded file is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssociatedResource {
    Style,
    None,
}

/// File record returned by the upload endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub uploaded: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitUploadResponse {
    key: String,
    upload_id: String,
    upload_urls: Vec<String>,
    file: UploadFile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadedPart {
    e_tag: Option<String>,
    part_number: usize,
}

/// A URL that could not be uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedUpload {
    pub url: String,
    pub error: String,
}

/// Outcome of [`ApiClient::upload_images`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    pub uploaded: Vec<UploadFile>,
    pub failed: Vec<FailedUpload>,
}

impl UploadReport {
    /// URLs of the uploaded files, skipping files without one.
    pub fn urls(&self) -> Vec<String> {
        self.uploaded.iter().filter_map(|file| file.url.clone()).collect()
    }
}

/// Style record returned by `/api/sd-styles`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdStyle {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Result of a generation recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImagesResponse {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Gaia API client scoped to one base URL and credential.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    credential: Option<String>,
}

impl ApiClient {
    /// Create a client. `credential`, when present, is sent as a bearer token.
    pub fn new(base_url: impl Into<String>, credential: Option<String>) -> Result<Self> {
        let base_url = base_url.into();
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::api(&base_url, 0, format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Upload every image in `image_urls`.
    ///
    /// Failures are collected per URL and never abort the batch.
    #[instrument(level = "info", skip_all, fields(count = image_urls.len()))]
    pub async fn upload_images(&self, image_urls: &[String]) -> UploadReport {
        let mut report = UploadReport::default();

        for url in image_urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                warn!(url = %url, "Skipping non-HTTP image URL");
                report.failed.push(FailedUpload {
                    url: url.clone(),
                    error: "URL must start with http:// or https://".to_string(),
                });
                continue;
            }

            match self.upload_image(url, AssociatedResource::Style).await {
                Ok(file) => {
                    info!(url = %url, file_id = %file.id, "Upload completed");
                    report.uploaded.push(file);
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Failed to upload image");
                    report.failed.push(FailedUpload {
                        url: url.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if !report.failed.is_empty() {
            warn!(
                failed = report.failed.len(),
                total = image_urls.len(),
                "Some image uploads failed"
            );
        }

        report
    }

    async fn upload_image(&self, url: &str, resource: AssociatedResource) -> Result<UploadFile> {
        let image = self.fetch_image(url).await?;
        let size = imagesize::blob_size(&image)
            .map_err(|e| Error::validation(format!("Failed to extract image dimensions: {}", e)))?;
        debug!(url, width = size.width, height = size.height, bytes = image.len(), "Fetched image");

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        let init: Vec<InitUploadResponse> = self
            .post_json(
                "/api/upload/initialize",
                &json!({
                    "files": [{
                        "filename": format!("image_{}.png", millis),
                        "mimetype": "image/png",
                        "metadata": { "width": size.width, "height": size.height },
                        "fileSize": image.len(),
                    }],
                    "associatedResource": resource,
                    "chunkSize": UPLOAD_CHUNK_SIZE,
                }),
            )
            .await?;
        let upload = init.into_iter().next().ok_or_else(|| {
            Error::api(
                "/api/upload/initialize",
                200,
                "Failed to initialize upload: no upload info returned",
            )
        })?;

        debug!(url, chunks = upload.upload_urls.len(), "Uploading chunks");
        let parts = futures::future::try_join_all(upload.upload_urls.iter().enumerate().map(
            |(index, presigned)| {
                let start = (index * UPLOAD_CHUNK_SIZE).min(image.len());
                let end = (start + UPLOAD_CHUNK_SIZE).min(image.len());
                self.put_chunk(presigned, image[start..end].to_vec(), index + 1)
            },
        ))
        .await?;

        let response = self
            .authorized(self.http.post(self.url("/api/upload/complete")))
            .json(&json!([{
                "key": upload.key,
                "uploadId": upload.upload_id,
                "parts": parts,
            }]))
            .send()
            .await
            .map_err(|e| request_error("/api/upload/complete", e))?;
        ensure_success("/api/upload/complete", response).await?;

        Ok(upload.file)
    }

    async fn put_chunk(
        &self,
        presigned: &str,
        chunk: Vec<u8>,
        part_number: usize,
    ) -> Result<UploadedPart> {
        let response = self
            .http
            .put(presigned)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(chunk)
            .send()
            .await
            .map_err(|e| request_error(presigned, e))?;
        let response = ensure_success(presigned, response).await?;

        let e_tag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(UploadedPart { e_tag, part_number })
    }

    /// Download a source image, requiring an `image/*` content type.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .timeout(FETCH_TIMEOUT)
            .header(ACCEPT, "image/*")
            .header(USER_AGENT, FETCH_USER_AGENT)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;
        let response = ensure_success(url, response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(Error::api(
                url,
                response.status().as_u16(),
                format!("Invalid content type: {}", content_type),
            ));
        }

        let bytes = response.bytes().await.map_err(|e| request_error(url, e))?;
        Ok(bytes.to_vec())
    }

    /// Create a public style from already uploaded images.
    #[instrument(
        level = "info",
        skip(self, image_urls, description),
        fields(images = image_urls.len())
    )]
    pub async fn create_style(
        &self,
        image_urls: &[String],
        name: &str,
        description: Option<&str>,
    ) -> Result<SdStyle> {
        let images: Vec<Value> = image_urls
            .iter()
            .map(|url| json!({ "url": url, "weight": 0.5 }))
            .collect();

        self.post_json(
            "/api/sd-styles",
            &json!({
                "images": images,
                "name": name,
                "description": description,
                "isDraft": false,
            }),
        )
        .await
    }

    /// Run the generation recipe `recipe_id` with `params`.
    #[instrument(level = "info", skip(self, params))]
    pub async fn generate_images(&self, recipe_id: &str, params: Value) -> Result<ImagesResponse> {
        self.post_json(
            "/api/recipe/agi-tasks/create-task",
            &json!({ "recipeId": recipe_id, "params": params }),
        )
        .await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credential {
            Some(credential) => request.bearer_auth(credential),
            None => request,
        }
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        debug!(path, "POST");
        let response = self
            .authorized(self.http.post(self.url(path)))
            .json(body)
            .send()
            .await
            .map_err(|e| request_error(path, e))?;
        let response = ensure_success(path, response).await?;

        let status = response.status().as_u16();
        response
            .json::<T>()
            .await
            .map_err(|e| Error::api(path, status, format!("Failed to parse response: {}", e)))
    }
}

fn request_error(endpoint: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        return Error::Timeout;
    }
    let status = err.status().map(|s| s.as_u16()).unwrap_or(0);
    Error::api(endpoint, status, err.to_string())
}

/// Pass successful responses through; classify everything else.
async fn ensure_success(endpoint: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::from_status(endpoint, status.as_u16(), error_message(&body)))
}

/// The `message` field of a JSON error body, or the body itself.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| match value.get("message") {
            Some(Value::String(message)) => Some(message.clone()),
            Some(Value::Array(messages)) => Some(
                messages
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            _ => None,
        })
        .unwrap_or_else(|| body.to_string())
}
