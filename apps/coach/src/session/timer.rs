//! Per-question countdown. The state lives in `SessionState`; the tick source
//! is a task owned by the controller.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::config::DEFAULT_SECONDS_PER_QUESTION;
use super::state::Completion;

pub const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerState {
    pub enabled: bool,
    pub seconds_per_question: u32,
    pub seconds_remaining: u32,
}

impl Default for TimerState {
    fn default() -> Self {
        TimerState::new(false, DEFAULT_SECONDS_PER_QUESTION)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Counting(u32),
    /// Remaining time hit zero on this tick.
    Expired,
}

impl TimerState {
    pub fn new(enabled: bool, seconds_per_question: u32) -> Self {
        Self {
            enabled,
            seconds_per_question,
            seconds_remaining: seconds_per_question,
        }
    }

    pub fn reset(&mut self) {
        self.seconds_remaining = self.seconds_per_question;
    }

    /// Decrements by one, clamping at zero. Reports `Expired` when the
    /// remaining time would drop below one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.seconds_remaining <= 1 {
            self.seconds_remaining = 0;
            TickOutcome::Expired
        } else {
            self.seconds_remaining -= 1;
            TickOutcome::Counting(self.seconds_remaining)
        }
    }
}

/// Starts a one-second tick source for timer run `run`. The first tick fires one
/// second after the call. Stops by itself once the controller is gone.
pub fn spawn_ticker(run: u64, completions: UnboundedSender<Completion>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval_at(Instant::now() + TICK, TICK);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if completions.send(Completion::Tick { run }).is_err() {
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_tick_counts_down_then_expires_once_at_zero() {
        let mut timer = TimerState::new(true, 3);
        assert_eq!(timer.tick(), TickOutcome::Counting(2));
        assert_eq!(timer.tick(), TickOutcome::Counting(1));
        assert_eq!(timer.tick(), TickOutcome::Expired);
        assert_eq!(timer.seconds_remaining, 0);
    }

    #[test]
    fn test_remaining_is_monotonic_until_reset() {
        let mut timer = TimerState::new(true, 30);
        let mut last = timer.seconds_remaining;
        for _ in 0..40 {
            timer.tick();
            assert!(timer.seconds_remaining <= last);
            last = timer.seconds_remaining;
        }
        assert_eq!(timer.seconds_remaining, 0);
        timer.reset();
        assert_eq!(timer.seconds_remaining, 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_fires_every_second_with_run() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = Instant::now();
        let handle = spawn_ticker(7, tx);

        for expected in 1..=3u64 {
            match rx.recv().await {
                Some(Completion::Tick { run }) => assert_eq!(run, 7),
                other => panic!("unexpected completion: {other:?}"),
            }
            assert_eq!(started.elapsed().as_secs(), expected);
        }
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_ticker_stops_sending() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_ticker(1, tx);
        handle.abort();
        let _ = handle.await;
        assert!(rx.recv().await.is_none());
    }
}
