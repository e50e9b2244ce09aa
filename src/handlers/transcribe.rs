//! # Transcription Endpoint
//!
//! `POST /transcribe` accepts a multipart form with a required `file` field
//! plus optional `language` and `model` fields, and returns the transcript
//! with per-segment timing.
//!
//! The handler is the single error boundary for the request: the model name
//! is validated before any disk I/O, every later failure is mapped to one
//! processing error carrying the elapsed time, and the scratch workspace is
//! removed on every exit path.

use crate::error::{AppError, AppResult};
use crate::scratch::ScratchWorkspace;
use crate::state::AppState;
use crate::transcription::{self, ModelSize, Segment, TranscriptionOutcome};
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse};
use anyhow::anyhow;
use futures_util::StreamExt;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// Response payload for a successful transcription.
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub model: String,
    pub language: String,
    pub text: String,
    pub segments: Vec<Segment>,
    pub processing_time_seconds: f64,
}

/// Collected multipart fields, before validation.
#[derive(Debug, Default)]
struct TranscribeForm {
    file: Option<(Option<String>, Vec<u8>)>,
    language: Option<String>,
    model: Option<String>,
}

pub async fn transcribe_audio(
    state: web::Data<AppState>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    let started = Instant::now();
    let config = state.config();

    let form = read_form(payload, config.limits.max_upload_bytes).await?;

    let model_name = form
        .model
        .unwrap_or_else(|| config.models.default_model.clone());
    // Model validation happens before any disk I/O; no scratch workspace
    // exists yet on the rejection path.
    let model_size: ModelSize = model_name.parse().map_err(|_| {
        AppError::invalid_input(format!(
            "Invalid model. Must be one of: {}",
            ModelSize::NAMES.join(", ")
        ))
    })?;

    let (client_filename, file_bytes) = form
        .file
        .ok_or_else(|| AppError::invalid_input("Missing required form field 'file'"))?;
    let language = normalize_language(form.language);

    info!(
        model = %model_name,
        language = ?language,
        file = ?client_filename,
        size_bytes = file_bytes.len(),
        "Received transcription request"
    );

    let workspace = ScratchWorkspace::create()
        .map_err(|e| AppError::processing(&e, started.elapsed().as_secs_f64()))?;

    let download_root = PathBuf::from(&config.models.download_root);
    let result = run_pipeline(
        &workspace,
        file_bytes,
        client_filename.as_deref(),
        model_size,
        download_root,
        language,
    )
    .await;

    let elapsed = started.elapsed().as_secs_f64();
    workspace.cleanup();

    match result {
        Ok(outcome) => {
            info!(
                model = %model_name,
                language = %outcome.language,
                segments = outcome.segments.len(),
                elapsed_seconds = elapsed,
                "Transcription complete"
            );
            Ok(HttpResponse::Ok().json(TranscribeResponse {
                model: model_name,
                language: outcome.language,
                text: outcome.text,
                segments: outcome.segments,
                processing_time_seconds: elapsed,
            }))
        }
        Err(e) => {
            error!(
                model = %model_name,
                elapsed_seconds = elapsed,
                error = %e,
                "Transcription failed"
            );
            error!("Error chain: {e:?}");
            Err(AppError::processing(&e, elapsed))
        }
    }
}

/// Stage the upload and run the blocking transcription pipeline off the I/O
/// threads. The model call can block for a long time, so it goes through
/// `web::block` onto the blocking pool.
async fn run_pipeline(
    workspace: &ScratchWorkspace,
    file_bytes: Vec<u8>,
    client_filename: Option<&str>,
    model_size: ModelSize,
    download_root: PathBuf,
    language: Option<String>,
) -> anyhow::Result<TranscriptionOutcome> {
    let staged = workspace.stage_upload(&file_bytes, client_filename)?;
    info!(
        staged = %staged.display(),
        size_bytes = file_bytes.len(),
        "Staged upload"
    );

    let outcome = web::block(move || {
        transcription::transcribe_file(&staged, model_size, &download_root, language.as_deref())
    })
    .await
    .map_err(|e| anyhow!("transcription task failed: {e}"))??;

    Ok(outcome)
}

/// Absent, empty, or `"auto"` all mean language auto-detection.
fn normalize_language(language: Option<String>) -> Option<String> {
    language.filter(|l| !l.is_empty() && l != "auto")
}

/// Drain the multipart stream into memory, enforcing the upload size bound
/// per chunk as the file field arrives.
async fn read_form(mut payload: Multipart, max_upload_bytes: usize) -> AppResult<TranscribeForm> {
    let mut form = TranscribeForm::default();

    while let Some(item) = payload.next().await {
        let mut field = item?;
        let Some(name) = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map(str::to_string)
        else {
            continue;
        };

        match name.as_str() {
            "file" => {
                let filename = field
                    .content_disposition()
                    .and_then(|cd| cd.get_filename())
                    .map(str::to_string);

                let mut bytes = Vec::new();
                while let Some(chunk) = field.next().await {
                    let chunk = chunk?;
                    if bytes.len() + chunk.len() > max_upload_bytes {
                        return Err(AppError::invalid_input(format!(
                            "Uploaded file exceeds the {max_upload_bytes} byte limit"
                        )));
                    }
                    bytes.extend_from_slice(&chunk);
                }
                form.file = Some((filename, bytes));
            }
            "language" => form.language = Some(read_text_field(&mut field).await?),
            "model" => form.model = Some(read_text_field(&mut field).await?),
            _ => {
                // Unknown fields are drained and ignored.
                while let Some(chunk) = field.next().await {
                    chunk?;
                }
            }
        }
    }

    Ok(form)
}

async fn read_text_field(field: &mut Field) -> AppResult<String> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    String::from_utf8(bytes)
        .map_err(|_| AppError::invalid_input("Form fields must be valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{test, App};

    fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, content) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        body
    }

    async fn post_transcribe(
        config: AppConfig,
        parts: &[(&str, Option<&str>, &[u8])],
    ) -> (actix_web::http::StatusCode, serde_json::Value) {
        let state = AppState::new(config);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/transcribe", web::post().to(transcribe_audio)),
        )
        .await;

        let boundary = "------------------------transcribetest";
        let request = test::TestRequest::post()
            .uri("/transcribe")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(multipart_body(boundary, parts))
            .to_request();

        let response = test::call_service(&app, request).await;
        let status = response.status();
        let body = test::read_body(response).await;
        let value = serde_json::from_slice(&body).unwrap();
        (status, value)
    }

    #[actix_web::test]
    async fn test_unknown_model_is_rejected_with_valid_names() {
        let (status, body) = post_transcribe(
            AppConfig::default(),
            &[
                ("file", Some("clip.wav"), b"RIFF fake"),
                ("model", None, b"xlarge"),
            ],
        )
        .await;

        assert_eq!(status, actix_web::http::StatusCode::BAD_REQUEST);
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.contains("Invalid model"));
        for name in ModelSize::NAMES {
            assert!(detail.contains(name), "detail should list {name}");
        }
    }

    #[actix_web::test]
    async fn test_missing_file_is_rejected() {
        let (status, body) =
            post_transcribe(AppConfig::default(), &[("model", None, b"tiny")]).await;

        assert_eq!(status, actix_web::http::StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("file"));
    }

    #[actix_web::test]
    async fn test_oversized_upload_is_rejected() {
        let mut config = AppConfig::default();
        config.limits.max_upload_bytes = 8;

        let (status, body) = post_transcribe(
            config,
            &[
                ("file", Some("clip.wav"), b"more than eight bytes"),
                ("model", None, b"tiny"),
            ],
        )
        .await;

        assert_eq!(status, actix_web::http::StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("limit"));
    }

    #[actix_web::test]
    async fn test_processing_failure_reports_diagnostics() {
        // Point the model root at an empty directory: staging succeeds, the
        // model load fails, and the handler must surface the 500 contract.
        let empty_root = tempfile::TempDir::new().unwrap();
        let mut config = AppConfig::default();
        config.models.download_root = empty_root.path().to_str().unwrap().to_string();

        let (status, body) = post_transcribe(
            config,
            &[
                ("file", Some("clip.wav"), b"not really audio"),
                ("model", None, b"tiny"),
            ],
        )
        .await;

        assert_eq!(status, actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
        let detail = &body["detail"];
        assert!(detail["error"].as_str().unwrap().contains("tiny"));
        assert!(!detail["traceback"].as_str().unwrap().is_empty());
        assert!(detail["processing_time_seconds"].as_f64().unwrap() >= 0.0);
    }

    #[::core::prelude::v1::test]
    fn test_normalize_language() {
        assert_eq!(normalize_language(None), None);
        assert_eq!(normalize_language(Some("auto".to_string())), None);
        assert_eq!(normalize_language(Some(String::new())), None);
        assert_eq!(
            normalize_language(Some("fr".to_string())),
            Some("fr".to_string())
        );
    }
}
