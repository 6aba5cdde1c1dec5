use std::time::Duration;

use serde_json::Value;

use super::observer::{notify, PollObserver, PollTarget};
use super::state::PollState;
use crate::error::{GradingError, GradingResult};
use crate::host::GradingClient;

/// A handle whose report can be polled.
pub(crate) trait Pollable: Send + Sync {
    fn label(&self) -> String;

    /// Storage path of the handle's report.
    fn report_path(&self) -> String;

    fn target(&self) -> PollTarget<'_>;

    fn state(&self) -> PollState;

    /// Fold a freshly fetched report into the handle.
    fn apply(&self, document: &Value, entity: &[u8]) -> GradingResult<PollState>;

    /// Record that a poll ran out of attempts.
    fn mark_exhausted(&self);
}

/// One fetch, folded into the handle when the report is ready.
async fn attempt<P: Pollable>(
    client: &GradingClient,
    handle: &P,
    path: &str,
    index: u32,
) -> GradingResult<()> {
    match client.fetch_report(path).await? {
        Some(entity) => {
            let document = client.decode(&entity)?;
            let state = handle.apply(&document, &entity)?;
            tracing::debug!(handle = %handle.label(), index, %state, "report applied");
        }
        None => {
            tracing::debug!(handle = %handle.label(), index, "report not ready");
        }
    }
    Ok(())
}

/// Fetch `handle`'s report until `done` holds or `budget` attempts were made.
///
/// "Not ready" answers consume an attempt; anything the client cannot
/// interpret stops the poll at once, after the observer has seen that
/// attempt. There is no wait after the last attempt.
pub(crate) async fn poll<P, F>(
    client: &GradingClient,
    handle: &P,
    budget: u32,
    step: Duration,
    observer: Option<&dyn PollObserver>,
    done: F,
) -> GradingResult<()>
where
    P: Pollable,
    F: Fn(&P) -> bool,
{
    if budget == 0 {
        handle.mark_exhausted();
        return Err(GradingError::Timeout { attempts: 0 });
    }

    let path = handle.report_path();
    for index in 0..budget {
        let outcome = attempt(client, handle, &path, index).await;
        notify(observer, index, handle.target());
        outcome?;

        if done(handle) {
            tracing::info!(handle = %handle.label(), attempts = index + 1, state = %handle.state(), "poll complete");
            return Ok(());
        }
        if index + 1 < budget {
            tokio::time::sleep(step).await;
        }
    }

    handle.mark_exhausted();
    tracing::info!(handle = %handle.label(), attempts = budget, "poll budget exhausted");
    Err(GradingError::Timeout { attempts: budget })
}
