//! Batch dispatcher
//!
//! One worker task per claimed borrower, gated by a semaphore. Workers never
//! abort the batch: every per-borrower failure is folded into the summary,
//! and a worker that holds a claim always releases it (via `complete` or
//! `fail`) on every exit path, including cancellation.

use std::sync::Arc;

use chrono::Utc;
use eyre::{Result, WrapErr};
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tokio::time::{Duration, timeout};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analysis::ConversationAnalyzer;
use crate::config::DispatchConfig;
use crate::domain::{
    AnalysisResult, BatchSummary, BorrowerRecord, Category, FailReason,
};
use crate::schedule::follow_up;
use crate::store::{BorrowerStore, StoreError};
use crate::telephony::{CallPlacer, normalize_mobile};

enum AttemptOutcome {
    Completed,
    Failed,
}

/// Orchestrates call batches against the store, placer, and analyzer
pub struct CallDispatcher {
    store: BorrowerStore,
    placer: Arc<dyn CallPlacer>,
    analyzer: ConversationAnalyzer,
    config: DispatchConfig,
}

impl CallDispatcher {
    pub fn new(
        store: BorrowerStore,
        placer: Arc<dyn CallPlacer>,
        analyzer: ConversationAnalyzer,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            placer,
            analyzer,
            config,
        }
    }

    /// Run a batch without external cancellation
    pub async fn dispatch(
        &self,
        owner_id: &str,
        category: Option<Category>,
        max_parallel: Option<usize>,
    ) -> Result<BatchSummary> {
        let (_hold, cancel) = watch::channel(false);
        self.dispatch_with_cancel(owner_id, category, max_parallel, cancel)
            .await
    }

    /// Run a batch, stopping early when the watch channel flips to true.
    ///
    /// Cancellation is observed between claims and at every suspension point
    /// inside a worker; a cancelled worker releases its claim before exiting.
    /// Only store unavailability aborts the batch with an error.
    pub async fn dispatch_with_cancel(
        &self,
        owner_id: &str,
        category: Option<Category>,
        max_parallel: Option<usize>,
        cancel: watch::Receiver<bool>,
    ) -> Result<BatchSummary> {
        let batch_id = Uuid::now_v7();
        let max_parallel = max_parallel.unwrap_or(self.config.max_parallel).max(1);

        let candidates = self
            .store
            .list_eligible(owner_id, category)
            .await
            .wrap_err("listing eligible borrowers")?;
        info!(
            batch = %batch_id,
            "dispatch: starting batch of {} candidates (max parallel {})",
            candidates.len(),
            max_parallel,
        );

        let semaphore = Arc::new(Semaphore::new(max_parallel));
        let mut workers = JoinSet::new();
        let mut summary = BatchSummary::default();
        let mut fatal: Option<StoreError> = None;

        for record in candidates {
            if *cancel.borrow() {
                debug!(batch = %batch_id, "dispatch: cancelled before claiming {}", record.id);
                break;
            }
            match self.store.try_claim(owner_id, &record.id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(batch = %batch_id, "dispatch: skipping {}, claim held elsewhere", record.id);
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            }

            workers.spawn(run_attempt(
                self.store.clone(),
                self.placer.clone(),
                self.analyzer.clone(),
                self.config.clone(),
                owner_id.to_string(),
                record,
                semaphore.clone(),
                cancel.clone(),
            ));
        }

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(AttemptOutcome::Completed) => summary.completed += 1,
                Ok(AttemptOutcome::Failed) => summary.failed += 1,
                Err(e) => {
                    error!(batch = %batch_id, "dispatch: worker panicked: {}", e);
                    summary.failed += 1;
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e).wrap_err("claiming borrower records");
        }

        info!(batch = %batch_id, "dispatch: finished: {}", summary);
        Ok(summary)
    }
}

/// One claimed call attempt, start to finish.
///
/// The claim is already held on entry; every return path below either
/// completes the record or fails it back to Idle.
#[allow(clippy::too_many_arguments)]
async fn run_attempt(
    store: BorrowerStore,
    placer: Arc<dyn CallPlacer>,
    analyzer: ConversationAnalyzer,
    config: DispatchConfig,
    owner_id: String,
    record: BorrowerRecord,
    semaphore: Arc<Semaphore>,
    mut cancel: watch::Receiver<bool>,
) -> AttemptOutcome {
    let permit = tokio::select! {
        permit = semaphore.acquire_owned() => permit,
        _ = cancelled(&mut cancel) => {
            return release(&store, &owner_id, &record.id, FailReason::Cancelled).await;
        }
    };
    // acquire fails only if the semaphore is closed, which never happens here
    let _permit = match permit {
        Ok(p) => p,
        Err(_) => return release(&store, &owner_id, &record.id, FailReason::Cancelled).await,
    };

    let mobile = normalize_mobile(&record.mobile);
    let call_timeout = Duration::from_secs(config.call_timeout_secs);

    let mut transcript = None;
    let mut last_reason = FailReason::Unreachable;
    for attempt in 1..=config.max_attempts.max(1) {
        let placed = tokio::select! {
            placed = timeout(call_timeout, placer.place_call(&mobile, record.language)) => placed,
            _ = cancelled(&mut cancel) => {
                return release(&store, &owner_id, &record.id, FailReason::Cancelled).await;
            }
        };
        match placed {
            Ok(Ok(turns)) => {
                transcript = Some(turns);
                break;
            }
            Ok(Err(e)) => {
                warn!("run_attempt: {} attempt {} failed: {}", record.id, attempt, e);
                last_reason = e.fail_reason();
            }
            Err(_) => {
                warn!("run_attempt: {} attempt {} timed out", record.id, attempt);
                last_reason = FailReason::Timeout;
            }
        }
    }
    let Some(transcript) = transcript else {
        return release(&store, &owner_id, &record.id, last_reason).await;
    };

    // a transcript exists, so the borrower was reached; from here on the
    // attempt completes even if analysis is down
    let analysis = tokio::select! {
        analyzed = analyzer.analyze(&transcript) => match analyzed {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("run_attempt: analysis for {} degraded: {}", record.id, e);
                AnalysisResult::degraded()
            }
        },
        _ = cancelled(&mut cancel) => {
            return release(&store, &owner_id, &record.id, FailReason::Cancelled).await;
        }
    };

    let follow_up_date = follow_up(analysis.intent, analysis.payment_date, Utc::now().date_naive());
    match store
        .complete(&owner_id, &record.id, analysis, follow_up_date, transcript)
        .await
    {
        Ok(()) => AttemptOutcome::Completed,
        Err(StoreError::NotClaimed(id)) => {
            // someone mutated the record out from under a live attempt
            error!("run_attempt: completion of {} lost its claim", id);
            AttemptOutcome::Failed
        }
        Err(e) => {
            error!("run_attempt: completing {} failed: {}", record.id, e);
            AttemptOutcome::Failed
        }
    }
}

async fn release(
    store: &BorrowerStore,
    owner_id: &str,
    borrower_id: &str,
    reason: FailReason,
) -> AttemptOutcome {
    if let Err(e) = store.fail(owner_id, borrower_id, reason).await {
        error!("release: could not release claim on {}: {}", borrower_id, e);
    }
    AttemptOutcome::Failed
}

/// Resolves when cancellation is requested; pends forever if the sender is
/// gone (an uncancellable batch)
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|flagged| *flagged).await.is_err() {
        std::future::pending::<()>().await;
    }
}
