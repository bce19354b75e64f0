//! Evaluation fan-out/fan-in: one scoring call per question, all in flight at
//! once, every outcome awaited. Failed calls are dropped from the result set.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::service_client::InterviewService;

use super::state::EvaluationSet;

/// One scoring request. `answer` already carries the placeholder when the
/// question was left unanswered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationItem {
    pub index: usize,
    pub question: String,
    pub answer: String,
}

/// Scores every item concurrently and waits for all of them to settle.
/// A failing item never aborts the batch; its index is simply absent.
pub async fn evaluate_all(service: &dyn InterviewService, items: Vec<EvaluationItem>) -> EvaluationSet {
    let total = items.len();
    let calls = items.into_iter().map(|item| async move {
        match service.evaluate_answer(&item.question, &item.answer).await {
            Ok(evaluation) => Some((item.index, evaluation)),
            Err(e) => {
                warn!(index = item.index, "Dropping failed evaluation: {e}");
                None
            }
        }
    });

    let results: EvaluationSet = join_all(calls).await.into_iter().flatten().collect();
    debug!("{}/{} evaluations succeeded", results.len(), total);
    results
}
