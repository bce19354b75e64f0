//! Session state and its transition function.
//!
//! `SessionState::apply` is the only way session state changes. It is
//! synchronous and performs no I/O: it returns the `Effect`s the controller
//! must run (timers, speech, service calls). Every completion coming back from
//! an effect carries the `epoch` it was started under; completions from an
//! older epoch are discarded.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{InputError, SessionError};
use crate::models::evaluation::Evaluation;
use crate::models::question::Question;
use crate::models::resume::ResumeFile;
use crate::service_client::{GenerateRequest, ServiceError};
use crate::speech::SpeechError;

use super::config::{validate_seconds, InterviewConfig};
use super::evaluation::EvaluationItem;
use super::report::NO_ANSWER;
use super::timer::{TickOutcome, TimerState};
use super::voice::{VoiceState, RECOGNITION_ERROR_TRANSCRIPT};

pub type EvaluationSet = BTreeMap<usize, Evaluation>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Uploading,
    Configuring,
    Generating,
    InProgress,
    Evaluating,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Idle => "idle",
            Phase::Uploading => "uploading",
            Phase::Configuring => "configuring",
            Phase::Generating => "generating",
            Phase::InProgress => "in progress",
            Phase::Evaluating => "evaluating",
            Phase::Complete => "complete",
        };
        f.write_str(label)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Answer set
// ────────────────────────────────────────────────────────────────────────────

/// Answers keyed by question position. Absent index means "no answer yet".
/// Indices outside `[0, question_count)` are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSet {
    answers: BTreeMap<usize, String>,
    question_count: usize,
}

impl AnswerSet {
    pub fn new(question_count: usize) -> Self {
        Self {
            answers: BTreeMap::new(),
            question_count,
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    /// Overwrites the answer. Returns false for an out-of-range index.
    pub fn set(&mut self, index: usize, text: impl Into<String>) -> bool {
        if index >= self.question_count {
            return false;
        }
        self.answers.insert(index, text.into());
        true
    }

    /// Appends recognized speech, separated by a space when the answer
    /// already has content.
    pub fn append(&mut self, index: usize, text: &str) -> bool {
        if index >= self.question_count {
            return false;
        }
        let entry = self.answers.entry(index).or_default();
        if !entry.is_empty() {
            entry.push(' ');
        }
        entry.push_str(text);
        true
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Events and effects
// ────────────────────────────────────────────────────────────────────────────

/// User intent.
#[derive(Debug, Clone)]
pub enum Command {
    SelectFile(ResumeFile),
    Upload,
    Configure(InterviewConfig),
    Generate,
    EditAnswer(String),
    Next,
    Previous,
    Submit,
    Listen,
    RepeatQuestion,
    SetTimerEnabled(bool),
    SetTimerSeconds(u32),
    SetVoiceEnabled(bool),
    StartNew,
    Review,
}

/// Result of an effect, delivered back to the controller.
#[derive(Debug)]
pub enum Completion {
    Uploaded {
        epoch: u64,
        result: Result<String, ServiceError>,
    },
    QuestionsGenerated {
        epoch: u64,
        result: Result<Vec<Question>, ServiceError>,
    },
    Tick {
        run: u64,
    },
    SpeechEnded {
        utterance: u64,
        result: Result<(), SpeechError>,
    },
    Heard {
        epoch: u64,
        result: Result<Option<String>, SpeechError>,
    },
    Evaluated {
        epoch: u64,
        results: EvaluationSet,
    },
}

#[derive(Debug)]
pub enum Event {
    Command(Command),
    Completion(Completion),
}

impl From<Command> for Event {
    fn from(command: Command) -> Self {
        Event::Command(command)
    }
}

impl From<Completion> for Event {
    fn from(completion: Completion) -> Self {
        Event::Completion(completion)
    }
}

/// Work the controller performs on behalf of the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Upload {
        epoch: u64,
        file: Arc<ResumeFile>,
    },
    Generate {
        epoch: u64,
        request: GenerateRequest,
    },
    /// Replaces any running tick source. Ticks carry `run` back.
    StartTimer {
        run: u64,
    },
    StopTimer,
    /// Cancels in-flight speech output, then speaks `text`.
    Speak {
        utterance: u64,
        text: String,
    },
    CancelSpeech,
    Listen {
        epoch: u64,
    },
    Evaluate {
        epoch: u64,
        items: Vec<EvaluationItem>,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Session state
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    session_id: Option<Uuid>,
    phase: Phase,
    /// Bumped on every phase change and every active-question change.
    epoch: u64,
    /// Bumped on every timer start and stop; only ticks of the latest run count.
    timer_run: u64,
    resume: Option<Arc<ResumeFile>>,
    resume_text: String,
    config: InterviewConfig,
    questions: Vec<Question>,
    current_index: usize,
    answers: AnswerSet,
    evaluations: EvaluationSet,
    timer: TimerState,
    voice: VoiceState,
    last_error: Option<String>,
    /// Bumped each time an error is raised, so repeats are distinguishable.
    error_seq: u64,
    notice: Option<String>,
    notice_seq: u64,
    completed_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// A fresh `Idle` session whose form starts from `config`.
    pub fn new(config: InterviewConfig) -> Self {
        Self {
            timer: TimerState::new(config.timer_enabled, config.seconds_per_question),
            voice: VoiceState::new(config.voice_enabled),
            config,
            ..Self::default()
        }
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn timer_run(&self) -> u64 {
        self.timer_run
    }

    pub fn resume_name(&self) -> Option<&str> {
        self.resume.as_deref().map(|r| r.file_name.as_str())
    }

    pub fn resume_text(&self) -> &str {
        &self.resume_text
    }

    pub fn config(&self) -> &InterviewConfig {
        &self.config
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 >= self.questions.len()
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn evaluations(&self) -> &EvaluationSet {
        &self.evaluations
    }

    pub fn timer(&self) -> &TimerState {
        &self.timer
    }

    pub fn voice(&self) -> &VoiceState {
        &self.voice
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn error_seq(&self) -> u64 {
        self.error_seq
    }

    /// Transient capability message; cleared by the next command.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn notice_seq(&self) -> u64 {
        self.notice_seq
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Applies one event and returns the effects to run, in order.
    /// Events that do not apply to the current phase are ignored.
    pub fn apply(&mut self, event: impl Into<Event>) -> Vec<Effect> {
        match event.into() {
            Event::Command(command) => self.handle_command(command),
            Event::Completion(completion) => self.handle_completion(completion),
        }
    }

    fn handle_command(&mut self, command: Command) -> Vec<Effect> {
        use Command::*;

        self.notice = None;
        match (self.phase, command) {
            (Phase::Idle, SelectFile(file)) => {
                debug!("Selected resume {}", file.file_name);
                self.resume = Some(Arc::new(file));
                self.last_error = None;
                vec![]
            }
            (Phase::Idle, Upload) => self.start_upload(),
            (Phase::Idle | Phase::Configuring, Configure(config)) => {
                match config.validate() {
                    Ok(()) => {
                        self.timer = TimerState::new(config.timer_enabled, config.seconds_per_question);
                        self.voice.enabled = config.voice_enabled;
                        self.config = config;
                        self.last_error = None;
                    }
                    Err(e) => self.report_input_error(e),
                }
                vec![]
            }
            (Phase::Configuring, Generate) => self.start_generation(),
            (Phase::InProgress, EditAnswer(text)) => {
                self.answers.set(self.current_index, text);
                vec![]
            }
            (Phase::InProgress, Next) if !self.is_last_question() => {
                self.go_to(self.current_index + 1)
            }
            (Phase::InProgress, Previous) if self.current_index > 0 => {
                self.go_to(self.current_index - 1)
            }
            (Phase::InProgress, Submit) if self.is_last_question() => self.submit(),
            (Phase::InProgress, Listen) if self.voice.enabled && !self.voice.listening => {
                self.voice.begin_capture();
                vec![Effect::Listen { epoch: self.epoch }]
            }
            (Phase::InProgress, RepeatQuestion) => self.speak_current(),
            (Phase::Idle | Phase::Configuring, SetTimerEnabled(enabled)) => {
                self.config.timer_enabled = enabled;
                self.timer.enabled = enabled;
                vec![]
            }
            (Phase::InProgress, SetTimerEnabled(enabled)) => {
                self.config.timer_enabled = enabled;
                self.timer.enabled = enabled;
                if enabled {
                    self.timer.reset();
                    vec![self.start_timer()]
                } else {
                    vec![self.stop_timer()]
                }
            }
            (Phase::Idle | Phase::Configuring, SetTimerSeconds(seconds)) => {
                match validate_seconds(seconds) {
                    Ok(()) => {
                        self.config.seconds_per_question = seconds;
                        self.timer = TimerState::new(self.config.timer_enabled, seconds);
                        self.last_error = None;
                    }
                    Err(e) => self.report_input_error(e),
                }
                vec![]
            }
            (Phase::InProgress, SetTimerSeconds(seconds)) => {
                // The running countdown keeps going; the next question gets the new duration.
                match validate_seconds(seconds) {
                    Ok(()) => {
                        self.config.seconds_per_question = seconds;
                        self.timer.seconds_per_question = seconds;
                        self.last_error = None;
                    }
                    Err(e) => self.report_input_error(e),
                }
                vec![]
            }
            (Phase::Idle | Phase::Configuring, SetVoiceEnabled(enabled)) => {
                self.config.voice_enabled = enabled;
                self.voice.enabled = enabled;
                vec![]
            }
            (Phase::InProgress, SetVoiceEnabled(enabled)) => {
                self.config.voice_enabled = enabled;
                self.voice.enabled = enabled;
                if enabled {
                    self.speak_current()
                } else if self.voice.speaking {
                    self.voice.cancel_utterance();
                    vec![Effect::CancelSpeech]
                } else {
                    vec![]
                }
            }
            (Phase::Complete, StartNew) => {
                info!("Starting a new session");
                // Counters survive the reset so nothing from the old session matches.
                let fresh = SessionState {
                    timer_run: self.timer_run,
                    error_seq: self.error_seq,
                    notice_seq: self.notice_seq,
                    ..SessionState::new(self.config.clone())
                };
                *self = fresh;
                vec![self.stop_timer(), Effect::CancelSpeech]
            }
            (Phase::Complete, Review) => {
                self.set_phase(Phase::InProgress);
                self.current_index = 0;
                self.enter_question()
            }
            (phase, command) => {
                debug!("Ignoring {command:?} while {phase}");
                vec![]
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) -> Vec<Effect> {
        match completion {
            Completion::Uploaded { epoch, result } => {
                if !self.is_current(epoch, Phase::Uploading) {
                    warn!("Discarding stale upload result (epoch {epoch})");
                    return vec![];
                }
                match result {
                    Ok(text) => {
                        let session_id = Uuid::new_v4();
                        info!(%session_id, "Resume extracted ({} chars)", text.len());
                        self.session_id = Some(session_id);
                        self.resume_text = text;
                        self.last_error = None;
                        self.set_phase(Phase::Configuring);
                    }
                    Err(e) => {
                        let message = SessionError::from(e).user_message();
                        self.raise_error(format!("Error processing resume: {message}"));
                        self.set_phase(Phase::Idle);
                    }
                }
                vec![]
            }
            Completion::QuestionsGenerated { epoch, result } => {
                if !self.is_current(epoch, Phase::Generating) {
                    warn!("Discarding stale question list (epoch {epoch})");
                    return vec![];
                }
                match result {
                    Ok(questions) if !questions.is_empty() => self.begin_interview(questions),
                    Ok(_) => self.generation_failed(ServiceError::NoQuestions),
                    Err(e) => self.generation_failed(e),
                }
            }
            Completion::Tick { run } => {
                if run != self.timer_run || self.phase != Phase::InProgress || !self.timer.enabled {
                    debug!("Discarding stray tick (timer run {run})");
                    return vec![];
                }
                match self.timer.tick() {
                    TickOutcome::Counting(_) => vec![],
                    TickOutcome::Expired if self.is_last_question() => {
                        info!("Time is up on the last question, submitting");
                        self.submit()
                    }
                    TickOutcome::Expired => {
                        info!("Time is up on question {}, advancing", self.current_index + 1);
                        self.go_to(self.current_index + 1)
                    }
                }
            }
            Completion::SpeechEnded { utterance, result } => {
                if self.voice.finish_utterance(utterance) {
                    if let Err(e) = result {
                        self.raise_notice(SessionError::from(e).user_message());
                    }
                }
                vec![]
            }
            Completion::Heard { epoch, result } => {
                self.voice.listening = false;
                match result {
                    Ok(Some(text)) => {
                        if self.is_current(epoch, Phase::InProgress) {
                            self.answers.append(self.current_index, &text);
                            self.voice.last_transcript = text;
                        } else {
                            warn!("Discarding transcript captured for an inactive question");
                            self.voice.last_transcript.clear();
                        }
                    }
                    Ok(None) => self.voice.last_transcript.clear(),
                    Err(e) => {
                        // Only a failed capture is a recognition error; a missing
                        // capability is just reported.
                        self.voice.last_transcript = match e {
                            SpeechError::Failed(_) => RECOGNITION_ERROR_TRANSCRIPT.to_string(),
                            SpeechError::Unavailable(_) => String::new(),
                        };
                        self.raise_notice(SessionError::from(e).user_message());
                    }
                }
                vec![]
            }
            Completion::Evaluated { epoch, results } => {
                if !self.is_current(epoch, Phase::Evaluating) {
                    warn!("Discarding stale evaluation results (epoch {epoch})");
                    return vec![];
                }
                info!(
                    "Evaluation settled: {}/{} answers scored",
                    results.len(),
                    self.questions.len()
                );
                self.evaluations = results;
                self.completed_at = Some(Utc::now());
                self.set_phase(Phase::Complete);
                vec![]
            }
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Transition helpers
    // ────────────────────────────────────────────────────────────────────────

    fn is_current(&self, epoch: u64, phase: Phase) -> bool {
        self.epoch == epoch && self.phase == phase
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase == phase {
            return;
        }
        info!("Session phase {} -> {}", self.phase, phase);
        self.phase = phase;
        self.epoch += 1;
    }

    fn raise_error(&mut self, message: String) {
        self.last_error = Some(message);
        self.error_seq += 1;
    }

    fn raise_notice(&mut self, message: String) {
        self.notice = Some(message);
        self.notice_seq += 1;
    }

    fn report_input_error(&mut self, error: InputError) {
        debug!("Rejected input: {error}");
        self.raise_error(SessionError::from(error).user_message());
    }

    fn start_timer(&mut self) -> Effect {
        self.timer_run += 1;
        Effect::StartTimer {
            run: self.timer_run,
        }
    }

    fn stop_timer(&mut self) -> Effect {
        self.timer_run += 1;
        Effect::StopTimer
    }

    fn start_upload(&mut self) -> Vec<Effect> {
        let Some(file) = self.resume.clone() else {
            self.report_input_error(InputError::NoFileSelected);
            return vec![];
        };
        if let Err(e) = file.validate_type() {
            self.report_input_error(e);
            return vec![];
        }
        self.last_error = None;
        self.set_phase(Phase::Uploading);
        vec![Effect::Upload {
            epoch: self.epoch,
            file,
        }]
    }

    fn start_generation(&mut self) -> Vec<Effect> {
        if let Err(e) = self.config.validate() {
            self.report_input_error(e);
            return vec![];
        }
        self.last_error = None;
        self.set_phase(Phase::Generating);
        vec![Effect::Generate {
            epoch: self.epoch,
            request: self.config.generate_request(&self.resume_text),
        }]
    }

    fn generation_failed(&mut self, error: ServiceError) -> Vec<Effect> {
        let message = SessionError::from(error).user_message();
        self.raise_error(format!("Error generating questions: {message}"));
        self.set_phase(Phase::Configuring);
        vec![]
    }

    fn begin_interview(&mut self, questions: Vec<Question>) -> Vec<Effect> {
        info!("Starting interview with {} questions", questions.len());
        self.answers = AnswerSet::new(questions.len());
        self.questions = questions;
        self.evaluations.clear();
        self.completed_at = None;
        self.current_index = 0;
        self.timer = TimerState::new(self.config.timer_enabled, self.config.seconds_per_question);
        self.voice = VoiceState::new(self.config.voice_enabled);
        self.last_error = None;
        self.set_phase(Phase::InProgress);
        self.enter_question()
    }

    fn go_to(&mut self, index: usize) -> Vec<Effect> {
        self.current_index = index;
        self.epoch += 1;
        self.enter_question()
    }

    /// Runs on every change of the active question while `InProgress`:
    /// pre-fills coding starter content, resets the timer, re-speaks.
    fn enter_question(&mut self) -> Vec<Effect> {
        let index = self.current_index;
        if let Some(starter) = self.questions.get(index).and_then(|q| q.starter_code()) {
            if self.answers.get(index).map_or(true, str::is_empty) {
                let starter = starter.to_string();
                self.answers.set(index, starter);
            }
        }

        self.timer.reset();
        let mut effects = if self.timer.enabled {
            vec![self.start_timer()]
        } else {
            vec![self.stop_timer()]
        };
        effects.extend(self.speak_current());
        effects
    }

    fn speak_current(&mut self) -> Vec<Effect> {
        if !self.voice.enabled {
            return vec![];
        }
        let Some(text) = self.current_question().map(|q| q.text.clone()) else {
            return vec![];
        };
        let utterance = self.voice.begin_utterance();
        vec![Effect::Speak { utterance, text }]
    }

    fn submit(&mut self) -> Vec<Effect> {
        let items: Vec<EvaluationItem> = self
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| EvaluationItem {
                index,
                question: question.text.clone(),
                answer: self
                    .answers
                    .get(index)
                    .filter(|a| !a.is_empty())
                    .unwrap_or(NO_ANSWER)
                    .to_string(),
            })
            .collect();

        self.set_phase(Phase::Evaluating);
        let mut effects = vec![self.stop_timer()];
        if self.voice.speaking {
            self.voice.cancel_utterance();
            effects.push(Effect::CancelSpeech);
        }
        effects.push(Effect::Evaluate {
            epoch: self.epoch,
            items,
        });
        effects
    }
}
