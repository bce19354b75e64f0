//! Interview configuration accepted when leaving `Configuring`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::InputError;
use crate::service_client::GenerateRequest;

pub const MIN_QUESTIONS: u8 = 1;
pub const MAX_QUESTIONS: u8 = 20;
pub const DEFAULT_QUESTIONS: u8 = 5;

pub const MIN_SECONDS_PER_QUESTION: u32 = 30;
pub const MAX_SECONDS_PER_QUESTION: u32 = 600;
pub const SECONDS_STEP: u32 = 30;
pub const DEFAULT_SECONDS_PER_QUESTION: u32 = 120;

/// Difficulty asked of the generator. `Mixed` lets it vary per question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestedDifficulty {
    Easy,
    Medium,
    Hard,
    #[default]
    Mixed,
}

impl fmt::Display for RequestedDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestedDifficulty::Easy => "easy",
            RequestedDifficulty::Medium => "medium",
            RequestedDifficulty::Hard => "hard",
            RequestedDifficulty::Mixed => "mixed",
        };
        f.write_str(label)
    }
}

impl FromStr for RequestedDifficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(RequestedDifficulty::Easy),
            "medium" => Ok(RequestedDifficulty::Medium),
            "hard" => Ok(RequestedDifficulty::Hard),
            "mixed" => Ok(RequestedDifficulty::Mixed),
            other => Err(format!(
                "unknown difficulty '{other}' (expected easy, medium, hard or mixed)"
            )),
        }
    }
}

/// Either a fixed count or "let the generator decide".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionCount {
    Fixed(u8),
    Auto,
}

impl Default for QuestionCount {
    fn default() -> Self {
        QuestionCount::Fixed(DEFAULT_QUESTIONS)
    }
}

impl FromStr for QuestionCount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(QuestionCount::Auto);
        }
        s.parse::<u8>()
            .map(QuestionCount::Fixed)
            .map_err(|_| format!("'{s}' is not a question count (1-20 or auto)"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewConfig {
    pub difficulty: RequestedDifficulty,
    pub question_count: QuestionCount,
    pub job_description: String,
    pub timer_enabled: bool,
    pub seconds_per_question: u32,
    pub voice_enabled: bool,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            difficulty: RequestedDifficulty::default(),
            question_count: QuestionCount::default(),
            job_description: String::new(),
            timer_enabled: false,
            seconds_per_question: DEFAULT_SECONDS_PER_QUESTION,
            voice_enabled: false,
        }
    }
}

impl InterviewConfig {
    pub fn validate(&self) -> Result<(), InputError> {
        if let QuestionCount::Fixed(n) = self.question_count {
            if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&n) {
                return Err(InputError::InvalidQuestionCount(n));
            }
        }
        validate_seconds(self.seconds_per_question)
    }

    /// Body for the generator. The count is omitted when it is `Auto`.
    pub fn generate_request(&self, resume_text: &str) -> GenerateRequest {
        let (num_questions, auto_select_count) = match self.question_count {
            QuestionCount::Fixed(n) => (Some(n), false),
            QuestionCount::Auto => (None, true),
        };
        GenerateRequest {
            resume_text: resume_text.to_string(),
            difficulty: self.difficulty,
            num_questions,
            job_description: self.job_description.trim().to_string(),
            auto_select_count,
        }
    }
}

pub fn validate_seconds(seconds: u32) -> Result<(), InputError> {
    let in_range = (MIN_SECONDS_PER_QUESTION..=MAX_SECONDS_PER_QUESTION).contains(&seconds);
    if in_range && seconds % SECONDS_STEP == 0 {
        Ok(())
    } else {
        Err(InputError::InvalidTimerDuration(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(InterviewConfig::default().validate().is_ok());
    }

    #[test]
    fn test_question_count_bounds() {
        let mut config = InterviewConfig::default();
        config.question_count = QuestionCount::Fixed(0);
        assert_eq!(config.validate(), Err(InputError::InvalidQuestionCount(0)));
        config.question_count = QuestionCount::Fixed(21);
        assert_eq!(config.validate(), Err(InputError::InvalidQuestionCount(21)));
        config.question_count = QuestionCount::Fixed(20);
        assert!(config.validate().is_ok());
        config.question_count = QuestionCount::Auto;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_seconds_must_be_step_of_thirty() {
        assert!(validate_seconds(30).is_ok());
        assert!(validate_seconds(600).is_ok());
        assert_eq!(validate_seconds(45), Err(InputError::InvalidTimerDuration(45)));
        assert_eq!(validate_seconds(0), Err(InputError::InvalidTimerDuration(0)));
        assert_eq!(validate_seconds(630), Err(InputError::InvalidTimerDuration(630)));
    }

    #[test]
    fn test_generate_request_fixed_count() {
        let config = InterviewConfig {
            difficulty: RequestedDifficulty::Medium,
            question_count: QuestionCount::Fixed(3),
            job_description: "  Platform engineer  ".to_string(),
            ..InterviewConfig::default()
        };
        let request = config.generate_request("resume");
        assert_eq!(request.num_questions, Some(3));
        assert!(!request.auto_select_count);
        assert_eq!(request.job_description, "Platform engineer");
        assert_eq!(request.difficulty, RequestedDifficulty::Medium);
    }

    #[test]
    fn test_generate_request_auto_passes_flag_not_number() {
        let config = InterviewConfig {
            question_count: QuestionCount::Auto,
            ..InterviewConfig::default()
        };
        let request = config.generate_request("resume");
        assert_eq!(request.num_questions, None);
        assert!(request.auto_select_count);
    }

    #[test]
    fn test_parse_question_count() {
        assert_eq!("auto".parse::<QuestionCount>(), Ok(QuestionCount::Auto));
        assert_eq!("7".parse::<QuestionCount>(), Ok(QuestionCount::Fixed(7)));
        assert!("seven".parse::<QuestionCount>().is_err());
    }
}
