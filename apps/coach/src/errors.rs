use std::path::PathBuf;

use thiserror::Error;

use crate::service_client::ServiceError;
use crate::speech::SpeechError;

/// Rejected before any network call. The session stays where it is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Please select a resume file first")]
    NoFileSelected,

    #[error("Unsupported file type: {0} (expected .pdf, .docx or .txt)")]
    UnsupportedFileType(String),

    #[error("Question count must be between 1 and 20, got {0}")]
    InvalidQuestionCount(u8),

    #[error("Seconds per question must be 30 to 600 in steps of 30, got {0}")]
    InvalidTimerDuration(u32),
}

#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path has no usable file name: {}", .0.display())]
    MissingFileName(PathBuf),
}

/// Any failure the controller can surface to the user.
/// None of them are fatal; each maps to a message on the session snapshot.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Speech(#[from] SpeechError),
}

impl SessionError {
    /// Text shown to the user. Collaborator details are logged, not shown.
    pub fn user_message(&self) -> String {
        match self {
            SessionError::Input(e) => e.to_string(),
            SessionError::Service(ServiceError::Api { status, message }) => {
                tracing::warn!("Interview service returned {status}: {message}");
                message.clone()
            }
            SessionError::Service(ServiceError::Http(e)) => {
                tracing::warn!("Interview service unreachable: {e}");
                "Could not reach the interview service".to_string()
            }
            SessionError::Service(ServiceError::Parse(e)) => {
                tracing::warn!("Interview service response parse error: {e}");
                "Unexpected response from the interview service".to_string()
            }
            SessionError::Service(ServiceError::NoQuestions) => {
                "No questions were generated. Please try again.".to_string()
            }
            SessionError::Speech(SpeechError::Unavailable(what)) => {
                format!("{what} is not supported in this environment.")
            }
            SessionError::Speech(SpeechError::Failed(reason)) => {
                tracing::warn!("Speech capability failed: {reason}");
                format!("Speech error: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_surfaces_service_detail() {
        let err = SessionError::from(ServiceError::Api {
            status: 500,
            message: "Resume parser not loaded".to_string(),
        });
        assert_eq!(err.user_message(), "Resume parser not loaded");
    }

    #[test]
    fn test_no_questions_message() {
        let err = SessionError::from(ServiceError::NoQuestions);
        assert_eq!(
            err.user_message(),
            "No questions were generated. Please try again."
        );
    }

    #[test]
    fn test_unavailable_capability_message() {
        let err = SessionError::from(SpeechError::Unavailable("Speech recognition".to_string()));
        assert_eq!(
            err.user_message(),
            "Speech recognition is not supported in this environment."
        );
    }

    #[test]
    fn test_input_error_message_is_display() {
        let err = SessionError::from(InputError::InvalidQuestionCount(25));
        assert!(err.user_message().contains("25"));
    }
}
