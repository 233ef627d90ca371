//! `POST /analyze`: dental photos plus symptoms, answered by the vision model.
//!
//! Every outcome is a 200 with either `{analysis}` or `{error}`.

use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum::extract::State;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::response::Json;
use dentassist_config::{AnalyzeMode, AppConfig};
use dentassist_core::image::{ImagePart, resolve_mime_type};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::SharedState;

pub const NO_IMAGES_ERROR: &str = "Please upload at least one image.";

const IMAGE_FIELDS: [&str; 2] = ["file", "files"];

/// Where uploads go and how the model gets to see them.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub mode: AnalyzeMode,
    pub upload_dir: PathBuf,
    /// No trailing slash.
    pub public_base_url: String,
}

impl UploadSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            mode: config.analyze.mode,
            upload_dir: config.analyze.upload_dir.clone(),
            public_base_url: config.public_base_url(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AnalyzeResponse {
    Analysis { analysis: String },
    Error { error: String },
}

impl AnalyzeResponse {
    fn error(message: impl Into<String>) -> Json<Self> {
        Json(Self::Error {
            error: message.into(),
        })
    }
}

struct Upload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

pub async fn analyze_handler(
    State(state): State<SharedState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Json<AnalyzeResponse> {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected /analyze body");
            return AnalyzeResponse::error(rejection.body_text());
        }
    };

    let (uploads, symptoms) = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            warn!(error = %e, "Malformed multipart body");
            return AnalyzeResponse::error(e.body_text());
        }
    };

    if uploads.is_empty() {
        return AnalyzeResponse::error(NO_IMAGES_ERROR);
    }

    info!(
        images = uploads.len(),
        symptoms_len = symptoms.len(),
        mode = ?state.uploads.mode,
        "/analyze request"
    );

    let images = match state.uploads.mode {
        AnalyzeMode::Inline => uploads.iter().map(inline_image).collect(),
        AnalyzeMode::LocalUrl => match store_all(&state.uploads, &uploads).await {
            Ok(images) => images,
            Err(e) => {
                warn!(
                    error = %e,
                    dir = %state.uploads.upload_dir.display(),
                    "Failed to store upload"
                );
                return AnalyzeResponse::error(format!("Failed to store upload: {e}"));
            }
        },
    };

    match state.analyzer.analyze(images, &symptoms).await {
        Ok(analysis) => Json(AnalyzeResponse::Analysis { analysis }),
        Err(e) => AnalyzeResponse::error(e.to_string()),
    }
}

/// Collect image fields (`file` / `files`) and the `symptoms` text.
/// Empty file parts (a form submitted with nothing chosen) are skipped.
async fn read_form(mut multipart: Multipart) -> Result<(Vec<Upload>, String), MultipartError> {
    let mut uploads = Vec::new();
    let mut symptoms = String::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "symptoms" {
            symptoms = field.text().await?;
        } else if IMAGE_FIELDS.contains(&name.as_str()) {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            if !bytes.is_empty() {
                uploads.push(Upload {
                    file_name,
                    content_type,
                    bytes,
                });
            }
        }
    }

    Ok((uploads, symptoms))
}

fn mime_of(upload: &Upload) -> String {
    resolve_mime_type(upload.content_type.as_deref(), upload.file_name.as_deref())
}

fn inline_image(upload: &Upload) -> ImagePart {
    ImagePart::inline(&upload.bytes, Some(&mime_of(upload)))
}

/// Write every upload or none: a failed write removes the files already
/// stored for this request.
async fn store_all(
    settings: &UploadSettings,
    uploads: &[Upload],
) -> std::io::Result<Vec<ImagePart>> {
    tokio::fs::create_dir_all(&settings.upload_dir).await?;

    let mut written = Vec::with_capacity(uploads.len());
    let mut images = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let stored = stored_name(upload.file_name.as_deref());
        let path = settings.upload_dir.join(&stored);
        written.push(path.clone());
        if let Err(e) = tokio::fs::write(&path, &upload.bytes).await {
            remove_stored(&written).await;
            return Err(e);
        }
        let url = format!("{}/files/{}", settings.public_base_url, stored);
        images.push(ImagePart::url(url, mime_of(upload)));
    }
    Ok(images)
}

async fn remove_stored(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not remove partial upload");
            }
        }
    }
}

/// `<uuid>_<final path component>`; client-supplied directories are dropped.
pub fn stored_name(file_name: Option<&str>) -> String {
    let base = file_name
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .filter(|base| !base.is_empty() && *base != "." && *base != "..")
        .and_then(|base| Path::new(base).file_name())
        .and_then(|base| base.to_str())
        .unwrap_or("upload");
    format!("{}_{}", uuid::Uuid::new_v4(), base)
}
