//! The session actor.
//!
//! `SessionController` owns the one `SessionState` of a session. Commands
//! arrive from a `SessionHandle`, completions arrive from the tasks the
//! controller spawns, and each is applied through `SessionState::apply`.
//! The returned effects are executed here and a fresh snapshot is published
//! on a `watch` channel after every event.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::service_client::InterviewService;
use crate::speech::{SpeechRecognizer, SpeechSynthesizer};

use super::config::InterviewConfig;
use super::evaluation::evaluate_all;
use super::state::{Command, Completion, Effect, Event, SessionState};
use super::timer::spawn_ticker;

/// External providers the controller drives.
#[derive(Clone)]
pub struct Collaborators {
    pub service: Arc<dyn InterviewService>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
}

#[derive(Debug, Error)]
#[error("session controller has stopped")]
pub struct ControllerStopped;

// ────────────────────────────────────────────────────────────────────────────
// Handle
// ────────────────────────────────────────────────────────────────────────────

/// Front-end side of a running controller.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn send(&self, command: Command) -> Result<(), ControllerStopped> {
        self.commands.send(command).map_err(|_| ControllerStopped)
    }

    /// Latest published state.
    pub fn snapshot(&self) -> SessionState {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.snapshots.clone()
    }

    /// Closes the command channel and waits for the controller to clean up.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(e) = self.task.await {
            warn!("Session controller exited abnormally: {e}");
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

/// A spawned task that is aborted when replaced or dropped.
#[derive(Default)]
struct TaskSlot(Option<JoinHandle<()>>);

impl TaskSlot {
    fn replace(&mut self, handle: JoinHandle<()>) {
        self.cancel();
        self.0 = Some(handle);
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct SessionController {
    state: SessionState,
    collaborators: Collaborators,
    snapshots: watch::Sender<SessionState>,
    completions: mpsc::UnboundedSender<Completion>,
    ticker: TaskSlot,
    speech: TaskSlot,
    capture: TaskSlot,
    /// Upload, generation and evaluation calls.
    calls: JoinSet<Completion>,
}

impl SessionController {
    /// Starts a controller for a fresh `Idle` session.
    pub fn spawn(config: InterviewConfig, collaborators: Collaborators) -> SessionHandle {
        let state = SessionState::new(config);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(state.clone());

        let controller = SessionController {
            state,
            collaborators,
            snapshots: snapshot_tx,
            completions: completion_tx,
            ticker: TaskSlot::default(),
            speech: TaskSlot::default(),
            capture: TaskSlot::default(),
            calls: JoinSet::new(),
        };
        let task = tokio::spawn(controller.run(command_rx, completion_rx));

        SessionHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        info!("Session controller started");
        loop {
            let event: Event = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => command.into(),
                    None => break,
                },
                Some(completion) = completions.recv() => completion.into(),
                Some(joined) = self.calls.join_next(), if !self.calls.is_empty() => match joined {
                    Ok(completion) => completion.into(),
                    Err(e) => {
                        warn!("Service call task failed: {e}");
                        continue;
                    }
                },
            };

            let effects = self.state.apply(event);
            for effect in effects {
                self.execute(effect);
            }
            self.snapshots.send_replace(self.state.clone());
        }

        self.ticker.cancel();
        self.speech.cancel();
        self.capture.cancel();
        self.calls.abort_all();
        info!("Session controller stopped");
    }

    fn execute(&mut self, effect: Effect) {
        debug!("Running {effect:?}");
        match effect {
            Effect::Upload { epoch, file } => {
                let service = Arc::clone(&self.collaborators.service);
                self.calls.spawn(async move {
                    let result = service.upload_resume(&file).await;
                    if let Err(e) = &result {
                        warn!("Resume upload failed: {e}");
                    }
                    Completion::Uploaded { epoch, result }
                });
            }
            Effect::Generate { epoch, request } => {
                let service = Arc::clone(&self.collaborators.service);
                self.calls.spawn(async move {
                    let result = service.generate_questions(&request).await;
                    if let Err(e) = &result {
                        warn!("Question generation failed: {e}");
                    }
                    Completion::QuestionsGenerated { epoch, result }
                });
            }
            Effect::StartTimer { run } => {
                self.ticker
                    .replace(spawn_ticker(run, self.completions.clone()));
            }
            Effect::StopTimer => self.ticker.cancel(),
            Effect::Speak { utterance, text } => {
                self.collaborators.synthesizer.cancel();
                let synthesizer = Arc::clone(&self.collaborators.synthesizer);
                let completions = self.completions.clone();
                self.speech.replace(tokio::spawn(async move {
                    let result = synthesizer.speak(&text).await;
                    let _ = completions.send(Completion::SpeechEnded { utterance, result });
                }));
            }
            Effect::CancelSpeech => {
                self.collaborators.synthesizer.cancel();
                self.speech.cancel();
            }
            Effect::Listen { epoch } => {
                let recognizer = Arc::clone(&self.collaborators.recognizer);
                let completions = self.completions.clone();
                self.capture.replace(tokio::spawn(async move {
                    let result = recognizer.listen().await;
                    let _ = completions.send(Completion::Heard { epoch, result });
                }));
            }
            Effect::Evaluate { epoch, items } => {
                info!("Evaluating {} answers", items.len());
                let service = Arc::clone(&self.collaborators.service);
                self.calls.spawn(async move {
                    let results = evaluate_all(service.as_ref(), items).await;
                    Completion::Evaluated { epoch, results }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::{timeout, Instant};

    use crate::models::evaluation::Evaluation;
    use crate::models::question::{Difficulty, Question, QuestionCategory};
    use crate::models::resume::ResumeFile;
    use crate::service_client::{GenerateRequest, ServiceError};
    use crate::session::config::{QuestionCount, RequestedDifficulty};
    use crate::session::report::{SessionReport, NO_ANSWER};
    use crate::session::state::Phase;
    use crate::speech::console::UnsupportedRecognizer;
    use crate::speech::SpeechError;

    /// Three questions; scoring "Q2" always fails.
    struct FakeService {
        evaluated: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl InterviewService for FakeService {
        async fn upload_resume(&self, file: &ResumeFile) -> Result<String, ServiceError> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(format!("text of {}", file.file_name))
        }

        async fn generate_questions(
            &self,
            request: &GenerateRequest,
        ) -> Result<Vec<Question>, ServiceError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let count = request.num_questions.unwrap_or(3);
            Ok((1..=u64::from(count))
                .map(|i| Question {
                    id: i,
                    text: format!("Q{i}"),
                    category: QuestionCategory::Technical,
                    difficulty: Difficulty::Medium,
                    context: String::new(),
                    initial_code: None,
                })
                .collect())
        }

        async fn evaluate_answer(
            &self,
            question: &str,
            answer: &str,
        ) -> Result<Evaluation, ServiceError> {
            self.evaluated
                .lock()
                .unwrap()
                .push((question.to_string(), answer.to_string()));
            tokio::time::sleep(Duration::from_secs(1)).await;
            if question == "Q2" {
                return Err(ServiceError::Api {
                    status: 503,
                    message: "overloaded".to_string(),
                });
            }
            Ok(Evaluation {
                score: 8.0,
                feedback: format!("Good answer to {question}"),
                improvements: String::new(),
                ideal_answer: String::new(),
                missing_keywords: vec![],
            })
        }
    }

    /// Each utterance takes five seconds.
    #[derive(Default)]
    struct FakeSynthesizer {
        spoken: Mutex<Vec<String>>,
        cancels: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSynthesizer {
        async fn speak(&self, text: &str) -> Result<(), SpeechError> {
            self.spoken.lock().unwrap().push(text.to_string());
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedRecognizer {
        phrases: Mutex<VecDeque<&'static str>>,
    }

    #[async_trait]
    impl SpeechRecognizer for ScriptedRecognizer {
        async fn listen(&self) -> Result<Option<String>, SpeechError> {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(self.phrases.lock().unwrap().pop_front().map(str::to_string))
        }
    }

    struct Harness {
        handle: SessionHandle,
        rx: watch::Receiver<SessionState>,
        service: Arc<FakeService>,
        synthesizer: Arc<FakeSynthesizer>,
    }

    fn start(config: InterviewConfig, recognizer: Arc<dyn SpeechRecognizer>) -> Harness {
        let service = Arc::new(FakeService {
            evaluated: Mutex::new(vec![]),
        });
        let synthesizer = Arc::new(FakeSynthesizer::default());
        let handle = SessionController::spawn(
            config,
            Collaborators {
                service: service.clone(),
                synthesizer: synthesizer.clone(),
                recognizer,
            },
        );
        let rx = handle.subscribe();
        Harness {
            handle,
            rx,
            service,
            synthesizer,
        }
    }

    fn config(timer: Option<u32>, voice: bool) -> InterviewConfig {
        InterviewConfig {
            difficulty: RequestedDifficulty::Mixed,
            question_count: QuestionCount::Fixed(3),
            job_description: String::new(),
            timer_enabled: timer.is_some(),
            seconds_per_question: timer.unwrap_or(120),
            voice_enabled: voice,
        }
    }

    async fn wait_until(
        rx: &mut watch::Receiver<SessionState>,
        what: &str,
        predicate: impl FnMut(&SessionState) -> bool,
    ) -> SessionState {
        let state = timeout(Duration::from_secs(3600), rx.wait_for(predicate))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
            .expect("controller stopped");
        (*state).clone()
    }

    async fn reach_first_question(h: &mut Harness) -> SessionState {
        h.handle
            .send(Command::SelectFile(ResumeFile::new("cv.pdf", vec![1, 2])))
            .unwrap();
        h.handle.send(Command::Upload).unwrap();
        wait_until(&mut h.rx, "configuring", |s| s.phase() == Phase::Configuring).await;
        h.handle.send(Command::Generate).unwrap();
        wait_until(&mut h.rx, "in progress", |s| s.phase() == Phase::InProgress).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_a_full_session_with_partial_evaluation() {
        let mut h = start(config(None, false), Arc::new(UnsupportedRecognizer));
        let state = reach_first_question(&mut h).await;
        assert_eq!(state.resume_text(), "text of cv.pdf");
        assert_eq!(state.questions().len(), 3);

        h.handle
            .send(Command::EditAnswer("Ownership".to_string()))
            .unwrap();
        h.handle.send(Command::Next).unwrap();
        h.handle.send(Command::Next).unwrap();
        h.handle
            .send(Command::EditAnswer("Borrowing".to_string()))
            .unwrap();
        h.handle.send(Command::Submit).unwrap();

        let started = Instant::now();
        let state = wait_until(&mut h.rx, "complete", |s| s.phase() == Phase::Complete).await;
        // One-second calls in parallel, not three in a row.
        assert!(started.elapsed() < Duration::from_secs(2));

        assert_eq!(state.evaluations().keys().copied().collect::<Vec<_>>(), vec![0, 2]);
        let mut evaluated = h.service.evaluated.lock().unwrap().clone();
        evaluated.sort();
        assert_eq!(
            evaluated,
            vec![
                ("Q1".to_string(), "Ownership".to_string()),
                ("Q2".to_string(), NO_ANSWER.to_string()),
                ("Q3".to_string(), "Borrowing".to_string()),
            ]
        );

        let report = SessionReport::from_state(&state);
        assert!((report.average_score - 8.0).abs() < f32::EPSILON);
        assert_eq!(report.questions[1].score, 0.0);

        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_c_timer_drives_session_to_complete() {
        let mut h = start(config(Some(30), false), Arc::new(UnsupportedRecognizer));
        reach_first_question(&mut h).await;
        let started = Instant::now();

        let state = wait_until(&mut h.rx, "second question", |s| s.current_index() == 1).await;
        assert_eq!(state.timer().seconds_remaining, 30);
        assert!(started.elapsed() >= Duration::from_secs(30));

        let state = wait_until(&mut h.rx, "complete", |s| s.phase() == Phase::Complete).await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(90), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(95), "elapsed {elapsed:?}");
        assert_eq!(state.timer().seconds_remaining, 0);
        assert_eq!(state.evaluations().len(), 2);
        assert!(!state.evaluations().contains_key(&1));

        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_submit() {
        let mut h = start(config(Some(60), false), Arc::new(UnsupportedRecognizer));
        reach_first_question(&mut h).await;
        h.handle.send(Command::Next).unwrap();
        h.handle.send(Command::Next).unwrap();
        wait_until(&mut h.rx, "last question", |s| s.current_index() == 2).await;
        tokio::time::sleep(Duration::from_millis(5500)).await;
        h.handle.send(Command::Submit).unwrap();

        let state = wait_until(&mut h.rx, "complete", |s| s.phase() == Phase::Complete).await;
        let remaining = state.timer().seconds_remaining;
        assert!(remaining < 60);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(h.handle.snapshot().timer().seconds_remaining, remaining);
        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_scenario_d_spoken_answers_append() {
        let recognizer = Arc::new(ScriptedRecognizer {
            phrases: Mutex::new(VecDeque::from(["I used React", "for the frontend"])),
        });
        let mut h = start(config(None, true), recognizer);
        reach_first_question(&mut h).await;

        h.handle.send(Command::Listen).unwrap();
        wait_until(&mut h.rx, "first phrase", |s| {
            s.answers().get(0) == Some("I used React")
        })
        .await;
        h.handle.send(Command::Listen).unwrap();
        let state = wait_until(&mut h.rx, "second phrase", |s| {
            !s.voice().listening && s.voice().last_transcript == "for the frontend"
        })
        .await;

        assert_eq!(state.answers().get(0), Some("I used React for the frontend"));
        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_change_cancels_speech_and_respeaks() {
        let mut h = start(config(None, true), Arc::new(UnsupportedRecognizer));
        let state = reach_first_question(&mut h).await;
        assert!(state.voice().speaking);

        h.handle.send(Command::Next).unwrap();
        let state = wait_until(&mut h.rx, "second question", |s| s.current_index() == 1).await;
        assert!(state.voice().speaking);

        let state = wait_until(&mut h.rx, "speech end", |s| !s.voice().speaking).await;
        assert_eq!(state.current_index(), 1);
        let spoken = h.synthesizer.spoken.lock().unwrap().clone();
        assert_eq!(spoken.last().map(String::as_str), Some("Q2"));
        assert!(h.synthesizer.cancels.load(Ordering::SeqCst) >= 2);

        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_recognizer_is_a_notice() {
        let mut h = start(config(None, true), Arc::new(UnsupportedRecognizer));
        reach_first_question(&mut h).await;

        h.handle.send(Command::Listen).unwrap();
        let state = wait_until(&mut h.rx, "notice", |s| s.notice().is_some()).await;
        assert_eq!(state.phase(), Phase::InProgress);
        assert_eq!(
            state.notice(),
            Some("Speech recognition is not supported in this environment.")
        );
        h.handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_snapshot_channel() {
        let mut h = start(config(Some(30), true), Arc::new(UnsupportedRecognizer));
        reach_first_question(&mut h).await;
        let mut rx = h.handle.subscribe();

        h.handle.shutdown().await;
        let drained = timeout(Duration::from_secs(1), async {
            while rx.changed().await.is_ok() {}
        })
        .await;
        assert!(drained.is_ok());
    }
}
