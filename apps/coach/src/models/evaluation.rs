use serde::{Deserialize, Serialize};

pub const MAX_SCORE: f32 = 10.0;
/// Scores at or above this count as strong answers.
pub const STRONG_SCORE: f32 = 7.0;
pub const FAIR_SCORE: f32 = 5.0;

/// Scoring service verdict for one answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f32, // 0 – 10
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub improvements: String,
    #[serde(default)]
    pub ideal_answer: String,
    #[serde(default)]
    pub missing_keywords: Vec<String>,
}

impl Evaluation {
    /// Clamps the score into 0 – 10. Non-finite scores become 0.
    pub fn normalized(mut self) -> Self {
        self.score = if self.score.is_finite() {
            self.score.clamp(0.0, MAX_SCORE)
        } else {
            0.0
        };
        self
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_score(self.score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Strong,
    Fair,
    Weak,
}

impl ScoreBand {
    pub fn from_score(score: f32) -> Self {
        if score >= STRONG_SCORE {
            ScoreBand::Strong
        } else if score >= FAIR_SCORE {
            ScoreBand::Fair
        } else {
            ScoreBand::Weak
        }
    }
}
