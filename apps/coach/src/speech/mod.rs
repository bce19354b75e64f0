//! Speech capabilities: text-to-speech for questions, speech-to-text for answers.
//!
//! Both are external providers. The controller owns when they run and what
//! their results do to the session; implementations only produce audio or text.

use async_trait::async_trait;
use thiserror::Error;

pub mod console;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpeechError {
    #[error("{0} is unavailable")]
    Unavailable(String),

    #[error("speech capability failed: {0}")]
    Failed(String),
}

/// Speech output. `speak` resolves when the utterance ends.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), SpeechError>;

    /// Best-effort stop of in-flight output. No guarantee of immediate silence.
    fn cancel(&self);
}

/// Single-shot speech input: one utterance per call, not a stream.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// `Ok(None)` when the capture ended without any speech.
    async fn listen(&self) -> Result<Option<String>, SpeechError>;
}
