/// Interview Service Client: the single point of entry for calls to the external
/// question/scoring service (resume extraction, question generation, answer scoring).
///
/// No other module talks HTTP. The session controller only sees the
/// `InterviewService` trait, so tests drive it with an in-memory fake.
use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::evaluation::Evaluation;
use crate::models::question::Question;
use crate::models::resume::ResumeFile;
use crate::session::config::RequestedDifficulty;

pub const DEFAULT_SERVICE_URL: &str = "http://localhost:8000";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("service returned no questions")]
    NoQuestions,
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

/// Body of `POST /generate_questions`.
///
/// With `auto_select_count` the count is left to the service and
/// `num_questions` is omitted from the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub resume_text: String,
    pub difficulty: RequestedDifficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_questions: Option<u8>,
    pub job_description: String,
    pub auto_select_count: bool,
}

#[derive(Debug, Serialize)]
struct EvaluateRequest<'a> {
    question: &'a str,
    answer: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    extracted_text: String,
}

#[derive(Debug, Deserialize)]
struct QuestionsResponse {
    #[serde(default)]
    questions: Vec<Question>,
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// The external question/scoring service as the controller sees it.
/// Implementations receive copies of session data, never a live reference.
#[async_trait]
pub trait InterviewService: Send + Sync {
    /// Returns the text extracted from the resume.
    async fn upload_resume(&self, file: &ResumeFile) -> Result<String, ServiceError>;

    /// May return an empty list; the controller decides what that means.
    async fn generate_questions(
        &self,
        request: &GenerateRequest,
    ) -> Result<Vec<Question>, ServiceError>;

    async fn evaluate_answer(&self, question: &str, answer: &str)
        -> Result<Evaluation, ServiceError>;
}

// ────────────────────────────────────────────────────────────────────────────
// HTTP implementation
// ────────────────────────────────────────────────────────────────────────────

/// reqwest-backed client. No request timeout: the per-question timer is the
/// only pacing in a session, and a slow call simply stays in flight.
#[derive(Clone)]
pub struct ServiceClient {
    client: Client,
    base_url: String,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl InterviewService for ServiceClient {
    async fn upload_resume(&self, file: &ResumeFile) -> Result<String, ServiceError> {
        let part = multipart::Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(file.mime_type())?;
        let form = multipart::Form::new().part("file", part);

        debug!(
            "Uploading resume {} ({} bytes)",
            file.file_name,
            file.bytes.len()
        );
        let response = self
            .client
            .post(self.url("upload_resume"))
            .multipart(form)
            .send()
            .await?;

        let body: UploadResponse = read_json(response, "Upload failed").await?;
        Ok(body.extracted_text)
    }

    async fn generate_questions(
        &self,
        request: &GenerateRequest,
    ) -> Result<Vec<Question>, ServiceError> {
        let response = self
            .client
            .post(self.url("generate_questions"))
            .json(request)
            .send()
            .await?;

        let body: QuestionsResponse =
            read_json(response, "Failed to generate questions").await?;
        debug!("Service generated {} questions", body.questions.len());
        Ok(body.questions)
    }

    async fn evaluate_answer(
        &self,
        question: &str,
        answer: &str,
    ) -> Result<Evaluation, ServiceError> {
        let response = self
            .client
            .post(self.url("evaluate_answer"))
            .json(&EvaluateRequest { question, answer })
            .send()
            .await?;

        let evaluation: Evaluation = read_json(response, "Evaluation failed").await?;
        Ok(evaluation.normalized())
    }
}

/// Decodes a 2xx body as `T`; anything else becomes `ServiceError::Api`
/// carrying the service's `detail` when it sent one.
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    fallback_message: &str,
) -> Result<T, ServiceError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!("Interview service returned {}: {}", status, body);
        return Err(ServiceError::Api {
            status: status.as_u16(),
            message: error_detail(&body).unwrap_or_else(|| fallback_message.to_string()),
        });
    }

    Ok(serde_json::from_str(&body)?)
}

/// Extracts `detail` from an error body. Validation errors send a list of
/// objects under `detail`; those are reduced to their `msg` fields.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        _ => None,
    }
}
