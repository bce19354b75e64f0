//! Results view built from a completed session.

use std::fmt;

use crate::models::evaluation::{ScoreBand, STRONG_SCORE};
use crate::models::question::{Difficulty, QuestionCategory};

use super::state::SessionState;

pub const NO_ANSWER: &str = "No answer provided.";
pub const NO_FEEDBACK: &str = "No feedback available.";
pub const NO_IMPROVEMENTS: &str = "No specific improvements.";
pub const NO_IDEAL_ANSWER: &str = "No ideal answer provided.";

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionReport {
    pub index: usize,
    pub question: String,
    pub category: QuestionCategory,
    pub difficulty: Difficulty,
    pub answer: String,
    /// 0 when the question has no evaluation.
    pub score: f32,
    pub band: ScoreBand,
    pub feedback: String,
    pub improvements: String,
    pub ideal_answer: String,
    pub missing_keywords: Vec<String>,
    pub evaluated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    /// Mean over the questions that were actually scored.
    pub average_score: f32,
    pub strong_answers: usize,
    pub questions: Vec<QuestionReport>,
}

impl SessionReport {
    pub fn from_state(state: &SessionState) -> Self {
        let evaluations = state.evaluations();

        let average_score = if evaluations.is_empty() {
            0.0
        } else {
            evaluations.values().map(|e| e.score).sum::<f32>() / evaluations.len() as f32
        };
        let strong_answers = evaluations
            .values()
            .filter(|e| e.score >= STRONG_SCORE)
            .count();

        let questions = state
            .questions()
            .iter()
            .enumerate()
            .map(|(index, question)| {
                let evaluation = evaluations.get(&index);
                let score = evaluation.map_or(0.0, |e| e.score);
                QuestionReport {
                    index,
                    question: question.text.clone(),
                    category: question.category,
                    difficulty: question.difficulty,
                    answer: non_empty_or(state.answers().get(index), NO_ANSWER),
                    score,
                    band: ScoreBand::from_score(score),
                    feedback: non_empty_or(evaluation.map(|e| e.feedback.as_str()), NO_FEEDBACK),
                    improvements: non_empty_or(
                        evaluation.map(|e| e.improvements.as_str()),
                        NO_IMPROVEMENTS,
                    ),
                    ideal_answer: non_empty_or(
                        evaluation.map(|e| e.ideal_answer.as_str()),
                        NO_IDEAL_ANSWER,
                    ),
                    missing_keywords: evaluation
                        .map(|e| e.missing_keywords.clone())
                        .unwrap_or_default(),
                    evaluated: evaluation.is_some(),
                }
            })
            .collect();

        Self {
            average_score,
            strong_answers,
            questions,
        }
    }
}

fn non_empty_or(value: Option<&str>, placeholder: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(placeholder)
        .to_string()
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Average score: {:.1} / 10", self.average_score)?;
        writeln!(
            f,
            "Questions: {}   Strong answers (7+): {}",
            self.questions.len(),
            self.strong_answers
        )?;
        for q in &self.questions {
            let marker = match q.band {
                ScoreBand::Strong => "+",
                ScoreBand::Fair => "~",
                ScoreBand::Weak => "-",
            };
            writeln!(f)?;
            writeln!(
                f,
                "[{marker}] {}. {} ({} / {}) {}/10",
                q.index + 1,
                q.question,
                q.category,
                q.difficulty,
                q.score
            )?;
            writeln!(f, "    Your answer:  \"{}\"", q.answer)?;
            writeln!(f, "    Feedback:     {}", q.feedback)?;
            writeln!(f, "    Improvements: {}", q.improvements)?;
            if !q.missing_keywords.is_empty() {
                writeln!(f, "    Missing:      {}", q.missing_keywords.join(", "))?;
            }
            writeln!(f, "    Ideal answer: {}", q.ideal_answer)?;
        }
        Ok(())
    }
}
