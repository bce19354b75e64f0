pub const LISTENING_TRANSCRIPT: &str = "Listening...";
pub const RECOGNITION_ERROR_TRANSCRIPT: &str = "Error recognizing speech.";

/// Status of the speech channel.
///
/// Speaking and listening are not mutually exclusive: a capture may start
/// while the question is still being read out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceState {
    pub enabled: bool,
    pub speaking: bool,
    pub listening: bool,
    pub last_transcript: String,
    /// Sequence number of the latest speech request.
    utterance: u64,
}

impl VoiceState {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    /// Marks a new utterance as started and returns its sequence number.
    pub fn begin_utterance(&mut self) -> u64 {
        self.utterance += 1;
        self.speaking = true;
        self.utterance
    }

    /// Returns false when `utterance` was superseded by a later request.
    pub fn finish_utterance(&mut self, utterance: u64) -> bool {
        if utterance != self.utterance {
            return false;
        }
        self.speaking = false;
        true
    }

    pub fn cancel_utterance(&mut self) {
        self.utterance += 1;
        self.speaking = false;
    }

    pub fn begin_capture(&mut self) {
        self.listening = true;
        self.last_transcript = LISTENING_TRANSCRIPT.to_string();
    }
}
