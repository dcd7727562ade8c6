use std::time::Duration;

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3/files";

const BOUNDARY: &str = "-------314159265358979323846";
const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("drive upload transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("drive api error ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("drive response did not include a webViewLink")]
    MissingLink,
    #[error("failed to encode upload metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub upload_url: Url,
    pub folder_id: String,
    pub demo_token: String,
    pub demo_latency: Duration,
}

/// A file picked for the document-verification task.
#[derive(Debug, Clone, Copy)]
pub struct UploadRequest<'a> {
    pub case_name: &'a str,
    pub file_name: &'a str,
    pub mime_type: Option<&'a str>,
    pub bytes: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: Option<String>,
    pub web_view_link: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata<'a> {
    name: String,
    mime_type: &'a str,
    parents: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    web_view_link: Option<String>,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    config: DriveConfig,
}

impl DriveClient {
    pub fn new(config: DriveConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn folder_link(&self) -> String {
        format!(
            "https://drive.google.com/drive/folders/{}",
            self.config.folder_id
        )
    }

    pub fn demo_token(&self) -> &str {
        &self.config.demo_token
    }

    pub fn is_demo_credential(&self, credential: &str) -> bool {
        credential.trim() == self.config.demo_token
    }

    /// Uploads one file into the configured folder and returns its shareable
    /// link. Single attempt; any failure is returned to the caller as is.
    pub async fn upload(
        &self,
        credential: &str,
        request: UploadRequest<'_>,
    ) -> Result<UploadedFile, UploadError> {
        if self.is_demo_credential(credential) {
            tokio::time::sleep(self.config.demo_latency).await;
            info!(file_name = request.file_name, "demo upload simulated");
            return Ok(UploadedFile {
                id: None,
                web_view_link: self.folder_link(),
            });
        }

        let mime_type = request
            .mime_type
            .filter(|mime| !mime.trim().is_empty())
            .unwrap_or(FALLBACK_MIME);
        let metadata = FileMetadata {
            name: drive_file_name(request.case_name, request.file_name),
            mime_type,
            parents: [self.config.folder_id.as_str()],
        };
        let metadata_json = serde_json::to_vec(&metadata)?;
        let body = multipart_related_body(&metadata_json, mime_type, request.bytes);

        let mut url = self.config.upload_url.clone();
        url.query_pairs_mut()
            .append_pair("uploadType", "multipart")
            .append_pair("fields", "id,webViewLink");

        let response = self
            .http
            .post(url)
            .bearer_auth(credential.trim())
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={BOUNDARY}"),
            )
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "drive upload rejected");
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: UploadResponse = response.json().await?;
        let web_view_link = parsed.web_view_link.ok_or(UploadError::MissingLink)?;
        let file_id = parsed.id.as_deref().unwrap_or_default();
        info!(file_id, "drive upload stored");
        Ok(UploadedFile {
            id: parsed.id,
            web_view_link,
        })
    }
}

pub fn drive_file_name(case_name: &str, file_name: &str) -> String {
    format!("[온보딩_{case_name}]_{file_name}")
}

/// Builds a `multipart/related` body: JSON metadata part, then the media part.
fn multipart_related_body(metadata_json: &[u8], content_type: &str, media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata_json.len() + media.len() + 256);
    push_part(&mut body, "application/json; charset=UTF-8", metadata_json);
    push_part(&mut body, content_type, media);
    let closing = format!("--{BOUNDARY}--");
    body.extend_from_slice(closing.as_bytes());
    body
}

fn push_part(body: &mut Vec<u8>, content_type: &str, payload: &[u8]) {
    let header = format!("--{BOUNDARY}\r\nContent-Type: {content_type}\r\n\r\n");
    body.extend_from_slice(header.as_bytes());
    body.extend_from_slice(payload);
    body.extend_from_slice(b"\r\n");
}

#[cfg(test)]
#[path = "tests/drive_tests.rs"]
mod tests;
