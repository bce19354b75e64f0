//! Line-oriented terminal front end.
//!
//! Typed lines become controller commands; snapshots from the controller are
//! rendered as they change. Nothing here mutates session state directly.

use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::debug;

use crate::models::resume::ResumeFile;
use crate::session::config::{QuestionCount, RequestedDifficulty};
use crate::session::controller::SessionHandle;
use crate::session::report::SessionReport;
use crate::session::state::{Command, Phase, SessionState};

pub const HELP: &str = "\
Commands:
  file <path>          select a resume (.pdf, .docx, .txt)
  upload               upload the selected resume
  difficulty <level>   easy | medium | hard | mixed
  count <n|auto>       number of questions (1-20) or let the service decide
  jd <text>            job description to tailor questions to
  timer <off|on|secs>  per-question countdown (30-600, steps of 30)
  voice <on|off>       read questions aloud
  generate             generate questions and start the interview
  answer <text>        set the answer to the current question
  next | prev          move between questions
  listen               capture a spoken answer
  repeat               read the current question again
  submit               submit all answers (last question only)
  status | report      show progress or results
  review | new         revisit answers or start over
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerSetting {
    Off,
    On,
    Seconds(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    File(PathBuf),
    Upload,
    Difficulty(RequestedDifficulty),
    Count(QuestionCount),
    JobDescription(String),
    Timer(TimerSetting),
    Voice(bool),
    Generate,
    Answer(String),
    Next,
    Previous,
    Submit,
    Listen,
    Repeat,
    Status,
    Report,
    New,
    Review,
    Help,
    Quit,
}

/// Parses one typed line. `Ok(None)` for a blank line, `Err` with a usage hint
/// for anything unknown or malformed.
pub fn parse(line: &str) -> Result<Option<Input>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let input = match (word.to_ascii_lowercase().as_str(), rest) {
        ("file", "") => return Err("usage: file <path>".to_string()),
        ("file", path) => Input::File(PathBuf::from(path)),
        ("upload", "") => Input::Upload,
        ("difficulty", level) => Input::Difficulty(level.parse()?),
        ("count", n) => Input::Count(n.parse()?),
        ("jd", text) => Input::JobDescription(text.to_string()),
        ("timer", "off") => Input::Timer(TimerSetting::Off),
        ("timer", "on") => Input::Timer(TimerSetting::On),
        ("timer", secs) => Input::Timer(TimerSetting::Seconds(
            secs.parse()
                .map_err(|_| "usage: timer <off|on|seconds>".to_string())?,
        )),
        ("voice", "on") => Input::Voice(true),
        ("voice", "off") => Input::Voice(false),
        ("voice", _) => return Err("usage: voice <on|off>".to_string()),
        ("generate", "") => Input::Generate,
        ("answer", text) => Input::Answer(text.to_string()),
        ("next", "") => Input::Next,
        ("prev", "") => Input::Previous,
        ("submit", "") => Input::Submit,
        ("listen", "") => Input::Listen,
        ("repeat", "") => Input::Repeat,
        ("status", "") => Input::Status,
        ("report", "") => Input::Report,
        ("new", "") => Input::New,
        ("review", "") => Input::Review,
        ("help", "") => Input::Help,
        ("quit" | "exit", "") => Input::Quit,
        _ => return Err(format!("Unknown command '{line}'. Type `help` for a list.")),
    };
    Ok(Some(input))
}

/// Reads stdin until `quit` or EOF, then shuts the controller down.
pub async fn run(handle: SessionHandle) -> Result<()> {
    let renderer = tokio::spawn(render(handle.subscribe()));
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse(&line) {
            Ok(None) => {}
            Ok(Some(Input::Quit)) => break,
            Ok(Some(input)) => dispatch(&handle, input).await?,
            Err(hint) => println!("{hint}"),
        }
    }

    handle.shutdown().await;
    renderer.await?;
    Ok(())
}

async fn dispatch(handle: &SessionHandle, input: Input) -> Result<()> {
    debug!("Input {input:?}");
    let command = match input {
        Input::File(path) => match ResumeFile::load(&path).await {
            Ok(file) => Command::SelectFile(file),
            Err(e) => {
                println!("{e}");
                return Ok(());
            }
        },
        Input::Upload => Command::Upload,
        Input::Difficulty(difficulty) => {
            let mut config = handle.snapshot().config().clone();
            config.difficulty = difficulty;
            Command::Configure(config)
        }
        Input::Count(count) => {
            let mut config = handle.snapshot().config().clone();
            config.question_count = count;
            Command::Configure(config)
        }
        Input::JobDescription(text) => {
            let mut config = handle.snapshot().config().clone();
            config.job_description = text;
            Command::Configure(config)
        }
        Input::Timer(TimerSetting::Off) => Command::SetTimerEnabled(false),
        Input::Timer(TimerSetting::On) => Command::SetTimerEnabled(true),
        Input::Timer(TimerSetting::Seconds(seconds)) => {
            let state = handle.snapshot();
            if let Some(hint) = timer_seconds_hint(&state) {
                println!("{hint}");
            }
            if !state.timer().enabled {
                handle.send(Command::SetTimerSeconds(seconds))?;
                Command::SetTimerEnabled(true)
            } else {
                Command::SetTimerSeconds(seconds)
            }
        }
        Input::Voice(enabled) => Command::SetVoiceEnabled(enabled),
        Input::Generate => Command::Generate,
        Input::Answer(text) => Command::EditAnswer(text),
        Input::Next => Command::Next,
        Input::Previous => Command::Previous,
        Input::Submit => Command::Submit,
        Input::Listen => Command::Listen,
        Input::Repeat => Command::RepeatQuestion,
        Input::New => Command::StartNew,
        Input::Review => Command::Review,
        Input::Status => {
            println!("{}", status_line(&handle.snapshot()));
            return Ok(());
        }
        Input::Report => {
            let state = handle.snapshot();
            if state.phase() == Phase::Complete {
                print!("{}", SessionReport::from_state(&state));
            } else {
                println!("No results yet ({}).", state.phase());
            }
            return Ok(());
        }
        Input::Help => {
            println!("{HELP}");
            return Ok(());
        }
        Input::Quit => return Ok(()),
    };
    handle.send(command)?;
    Ok(())
}

/// Explains when a duration change made outside the setup phases takes effect.
fn timer_seconds_hint(state: &SessionState) -> Option<&'static str> {
    match state.phase() {
        Phase::Idle | Phase::Configuring => None,
        Phase::InProgress => Some("The new duration applies from the next question."),
        _ => Some("The timer duration can only be changed before or during an interview."),
    }
}

pub fn status_line(state: &SessionState) -> String {
    let config = state.config();
    let count = match config.question_count {
        QuestionCount::Fixed(n) => n.to_string(),
        QuestionCount::Auto => "auto".to_string(),
    };
    let timer = if config.timer_enabled {
        format!("{}s", config.seconds_per_question)
    } else {
        "off".to_string()
    };
    let mut line = format!(
        "[{}] resume: {}  difficulty: {}  questions: {}  timer: {}  voice: {}",
        state.phase(),
        state.resume_name().unwrap_or("none"),
        config.difficulty,
        count,
        timer,
        if config.voice_enabled { "on" } else { "off" },
    );
    if let Some(id) = state.session_id() {
        line.push_str(&format!("\n  session {id}"));
    }
    if state.phase() == Phase::InProgress {
        line.push_str(&format!(
            "\n  question {}/{}, {} answered",
            state.current_index() + 1,
            state.questions().len(),
            state.answers().len()
        ));
        if state.timer().enabled {
            line.push_str(&format!(", {}s left", state.timer().seconds_remaining));
        }
    }
    line
}

// ────────────────────────────────────────────────────────────────────────────
// Rendering
// ────────────────────────────────────────────────────────────────────────────

async fn render(mut snapshots: watch::Receiver<SessionState>) {
    let mut view = View::default();
    while snapshots.changed().await.is_ok() {
        let state = snapshots.borrow_and_update().clone();
        for line in view.update(&state) {
            println!("{line}");
        }
    }
}

/// What has already been printed, so each change is shown once.
#[derive(Debug, Default)]
struct View {
    phase: Phase,
    epoch: u64,
    error_seq: u64,
    notice_seq: u64,
    transcript: String,
}

/// Seconds left at which a countdown warning is printed.
const TIMER_WARNING: u32 = 10;

impl View {
    fn update(&mut self, state: &SessionState) -> Vec<String> {
        let mut out = Vec::new();

        if state.phase() != self.phase || state.epoch() != self.epoch {
            match state.phase() {
                Phase::Idle if self.phase == Phase::Complete => {
                    out.push("New session. Select a resume with `file <path>`.".to_string())
                }
                Phase::Uploading => out.push("Uploading resume...".to_string()),
                Phase::Configuring if self.phase != Phase::Configuring => out.push(
                    "Resume processed. Adjust the settings, then type `generate`.".to_string(),
                ),
                Phase::Generating => out.push("Generating questions...".to_string()),
                Phase::InProgress => out.extend(question_lines(state)),
                Phase::Evaluating => out.push("Evaluating answers...".to_string()),
                Phase::Complete => {
                    if let Some(at) = state.completed_at() {
                        out.push(format!("\nInterview complete at {}", at.format("%H:%M:%S UTC")));
                    }
                    out.push(SessionReport::from_state(state).to_string());
                }
                _ => {}
            }
            self.phase = state.phase();
            self.epoch = state.epoch();
        } else if state.phase() == Phase::InProgress
            && state.timer().enabled
            && state.timer().seconds_remaining == TIMER_WARNING
        {
            out.push(format!("  {TIMER_WARNING} seconds left"));
        }

        if state.error_seq() != self.error_seq {
            self.error_seq = state.error_seq();
            if let Some(error) = state.last_error() {
                out.push(format!("! {error}"));
            }
        }
        if state.notice_seq() != self.notice_seq {
            self.notice_seq = state.notice_seq();
            if let Some(notice) = state.notice() {
                out.push(format!("* {notice}"));
            }
        }
        if state.voice().last_transcript != self.transcript {
            self.transcript = state.voice().last_transcript.clone();
            if !self.transcript.is_empty() {
                out.push(format!("  (heard) {}", self.transcript));
            }
        }
        out
    }
}

fn question_lines(state: &SessionState) -> Vec<String> {
    let Some(question) = state.current_question() else {
        return vec![];
    };
    let mut lines = vec![format!(
        "\nQuestion {}/{} ({} / {})",
        state.current_index() + 1,
        state.questions().len(),
        question.category,
        question.difficulty
    )];
    lines.push(format!("  {}", question.text));
    if !question.context.is_empty() {
        lines.push(format!("  Hint: {}", question.context));
    }
    if let Some(answer) = state.answers().get(state.current_index()) {
        lines.push(format!("  Current answer: {answer}"));
    }
    if state.timer().enabled {
        lines.push(format!("  {}s on the clock", state.timer().seconds_remaining));
    }
    lines
}
