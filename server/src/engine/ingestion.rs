//! Knowledge-Base Ingestion Relay
//!
//! Forwards a file upload or a URL to the engine's ingestion webhook as a
//! multipart form. Success only means the engine accepted the submission; the
//! outcome arrives later as a signed callback.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::classify_transport_error;
use crate::config::EngineConfig;
use crate::error::{RelayError, RelayResult};

/// Multipart field carrying the uploaded file.
pub const FILE_PART_NAME: &str = "Upload_PDF";

/// Kind of content being submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    /// An uploaded document.
    File,
    /// A single web page.
    Webpage,
    /// A whole website, crawled by the engine.
    Website,
}

impl SourceType {
    /// Parse a caller-supplied source type (case-insensitive, trimmed).
    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Some(Self::File),
            "webpage" => Some(Self::Webpage),
            "website" => Some(Self::Website),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Webpage => "webpage",
            Self::Website => "website",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file as received from the caller.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Unvalidated submission, straight from the caller.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub source_type: String,
    pub user_id: Uuid,
    pub bot_id: Uuid,
    pub file: Option<UploadedFile>,
    pub url: Option<String>,
}

/// What a validated submission carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionSource {
    File {
        filename: String,
        content_type: String,
        bytes: Bytes,
    },
    Url {
        source_type: SourceType,
        url: String,
    },
}

/// A validated submission. Exists only for the duration of one relay call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub user_id: Uuid,
    pub bot_id: Uuid,
    pub source: SubmissionSource,
}

/// Limits applied to uploaded files.
#[derive(Debug, Clone)]
pub struct UploadLimits {
    pub max_upload_size: usize,
    pub allowed_mime_types: Vec<String>,
}

impl SubmissionRequest {
    /// Check the request and normalize it into a [`Submission`].
    pub fn validate(self, limits: &UploadLimits) -> RelayResult<Submission> {
        let source_type = SourceType::parse_str(&self.source_type)
            .ok_or_else(|| RelayError::Validation("Invalid source_type".to_string()))?;

        let source = match source_type {
            SourceType::File => validate_file(self.file, limits)?,
            SourceType::Webpage | SourceType::Website => SubmissionSource::Url {
                source_type,
                url: validate_url(self.url.as_deref())?,
            },
        };

        Ok(Submission {
            user_id: self.user_id,
            bot_id: self.bot_id,
            source,
        })
    }
}

impl Submission {
    pub const fn source_type(&self) -> SourceType {
        match &self.source {
            SubmissionSource::File { .. } => SourceType::File,
            SubmissionSource::Url { source_type, .. } => *source_type,
        }
    }

    /// Multipart form sent to the ingestion webhook.
    fn into_form(self) -> RelayResult<Form> {
        let source_type = self.source_type();
        let form = Form::new()
            .text("user_id", self.user_id.to_string())
            .text("bot_id", self.bot_id.to_string())
            .text("source_type", source_type.as_str());

        match self.source {
            SubmissionSource::File {
                filename,
                content_type,
                bytes,
            } => {
                let part = Part::bytes(bytes.to_vec())
                    .file_name(filename.clone())
                    .mime_str(&content_type)
                    .map_err(|_| RelayError::Validation("Invalid content type".to_string()))?;
                Ok(form
                    .text("filename", filename)
                    .text("content_type", content_type)
                    .part(FILE_PART_NAME, part))
            }
            SubmissionSource::Url { url, .. } => Ok(form.text("url", url)),
        }
    }
}

fn validate_file(
    file: Option<UploadedFile>,
    limits: &UploadLimits,
) -> RelayResult<SubmissionSource> {
    let file = file.ok_or_else(|| {
        RelayError::Validation("file is required for source_type=file".to_string())
    })?;

    if file.bytes.is_empty() {
        return Err(RelayError::Validation("File is empty".to_string()));
    }
    if file.bytes.len() > limits.max_upload_size {
        return Err(RelayError::Validation(format!(
            "File too large (max: {} bytes)",
            limits.max_upload_size
        )));
    }

    let filename = file
        .filename
        .as_deref()
        .map(sanitize_filename)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| RelayError::Validation("Invalid filename".to_string()))?;

    let content_type = file
        .content_type
        .as_deref()
        .map(essence)
        .filter(|ct| !ct.is_empty())
        .or_else(|| {
            mime_guess::from_path(&filename)
                .first()
                .map(|m| m.essence_str().to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    if !limits.allowed_mime_types.contains(&content_type) {
        return Err(RelayError::Validation(format!(
            "Unsupported file type: {content_type}"
        )));
    }

    // Magic byte check for formats `infer` can recognise
    if infer::is_mime_supported(&content_type) {
        let detected = infer::get(&file.bytes).map(|kind| kind.mime_type());
        if detected != Some(content_type.as_str()) {
            warn!(
                claimed_mime = %content_type,
                detected_mime = detected.unwrap_or("unknown"),
                size = file.bytes.len(),
                "Uploaded file content does not match its declared type"
            );
            return Err(RelayError::Validation(format!(
                "File content does not match {content_type}"
            )));
        }
    }

    Ok(SubmissionSource::File {
        filename,
        content_type,
        bytes: file.bytes,
    })
}

fn validate_url(url: Option<&str>) -> RelayResult<String> {
    let url = url
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            RelayError::Validation("url is required for webpage/website".to_string())
        })?;

    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
            Ok(url.to_string())
        }
        _ => Err(RelayError::Validation(
            "url must be an absolute http(s) URL".to_string(),
        )),
    }
}

/// Keep only the final path component of a client-supplied filename.
fn sanitize_filename(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

/// MIME type without parameters, lower-cased.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Forwards submissions to the engine's ingestion webhook.
#[derive(Clone)]
pub struct IngestionRelay {
    client: reqwest::Client,
    config: Arc<EngineConfig>,
    limits: UploadLimits,
}

impl IngestionRelay {
    pub fn new(client: reqwest::Client, config: Arc<EngineConfig>, limits: UploadLimits) -> Self {
        Self {
            client,
            config,
            limits,
        }
    }

    /// Validate and forward one submission. Exactly one outbound call is made;
    /// failures are not retried.
    #[instrument(
        skip(self, request),
        fields(bot_id = %request.bot_id, source_type = %request.source_type)
    )]
    pub async fn submit(&self, request: SubmissionRequest) -> RelayResult<()> {
        let submission = request.validate(&self.limits)?;
        let bot_id = submission.bot_id;
        let source_type = submission.source_type();
        let form = submission.into_form()?;

        let response = self
            .client
            .post(&self.config.ingest_url)
            .timeout(self.config.request_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Ingestion request to automation engine failed");
                classify_transport_error(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::upstream_rejected(status.as_u16(), &body));
        }

        info!(bot_id = %bot_id, source_type = %source_type, "Submission accepted for ingestion");
        Ok(())
    }
}
