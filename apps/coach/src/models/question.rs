use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of interview question. Coding questions may carry starter content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Technical,
    Behavioral,
    Coding,
}

impl fmt::Display for QuestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuestionCategory::Technical => "technical",
            QuestionCategory::Behavioral => "behavioral",
            QuestionCategory::Coding => "coding",
        };
        f.write_str(label)
    }
}

/// Difficulty of a single generated question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        };
        f.write_str(label)
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{other}'")),
        }
    }
}

/// A question as produced by the question-generation service.
/// Never mutated once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u64,
    pub text: String,
    #[serde(rename = "type")]
    pub category: QuestionCategory,
    pub difficulty: Difficulty,
    /// Hint shown under the prompt.
    #[serde(default)]
    pub context: String,
    /// The service sends `""` for non-coding questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_code: Option<String>,
}

impl Question {
    /// Starter content for a coding question, if there is any worth pre-filling.
    pub fn starter_code(&self) -> Option<&str> {
        if self.category != QuestionCategory::Coding {
            return None;
        }
        self.initial_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_deserializes_service_shape() {
        let json = r#"{
            "id": 3,
            "text": "Reverse a linked list.",
            "type": "coding",
            "difficulty": "medium",
            "context": "Think about pointers.",
            "initial_code": "fn reverse() {}"
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.category, QuestionCategory::Coding);
        assert_eq!(q.difficulty, Difficulty::Medium);
        assert_eq!(q.starter_code(), Some("fn reverse() {}"));
    }

    #[test]
    fn test_empty_initial_code_is_not_starter() {
        let json = r#"{"id": 1, "text": "Explain CAP.", "type": "coding",
                       "difficulty": "hard", "context": "", "initial_code": ""}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.starter_code(), None);
    }

    #[test]
    fn test_starter_ignored_for_non_coding_questions() {
        let json = r#"{"id": 1, "text": "Tell me about a conflict.", "type": "behavioral",
                       "difficulty": "easy", "initial_code": "x"}"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.context, "");
        assert_eq!(q.starter_code(), None);
    }

    #[test]
    fn test_difficulty_from_str_is_case_insensitive() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("mixed".parse::<Difficulty>().is_err());
    }
}
