use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{SpeechError, SpeechRecognizer, SpeechSynthesizer};

/// Terminal stand-in for speech output: prints the text and holds the
/// "speaking" state for as long as reading it aloud would take.
pub struct ConsoleNarrator {
    words_per_minute: u32,
}

impl ConsoleNarrator {
    pub fn new(words_per_minute: u32) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for ConsoleNarrator {
    async fn speak(&self, text: &str) -> Result<(), SpeechError> {
        println!("  (interviewer) {text}");
        tokio::time::sleep(speaking_time(text, self.words_per_minute)).await;
        Ok(())
    }

    fn cancel(&self) {
        // The controller aborts the task awaiting `speak`, which drops the sleep.
        debug!("Narration cancelled");
    }
}

/// Time to read `text` aloud at `words_per_minute`.
pub fn speaking_time(text: &str, words_per_minute: u32) -> Duration {
    let words = text.split_whitespace().count() as u64;
    Duration::from_millis(words * 60_000 / u64::from(words_per_minute.max(1)))
}

/// A terminal has no microphone.
pub struct UnsupportedRecognizer;

#[async_trait]
impl SpeechRecognizer for UnsupportedRecognizer {
    async fn listen(&self) -> Result<Option<String>, SpeechError> {
        Err(SpeechError::Unavailable("Speech recognition".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaking_time_scales_with_words() {
        assert_eq!(speaking_time("", 160), Duration::ZERO);
        assert_eq!(speaking_time("one two", 120), Duration::from_secs(1));
        assert_eq!(
            speaking_time("a b c d e f g h i j", 60),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_zero_wpm_does_not_divide_by_zero() {
        assert_eq!(speaking_time("word", 0), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_narrator_holds_for_reading_time() {
        let narrator = ConsoleNarrator::new(60);
        let started = tokio::time::Instant::now();
        narrator.speak("three short words").await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_recognizer_reports_unavailable() {
        let err = UnsupportedRecognizer.listen().await.unwrap_err();
        assert_eq!(err, SpeechError::Unavailable("Speech recognition".to_string()));
    }
}
