use crate::backtest::runner::{BacktestResult, BacktestRunner};
use crate::error::CoreError;
use crate::models::Candle;
use crate::Result;
use std::sync::Arc;

/// One independent backtest: a configured runner and the series it replays
#[derive(Debug, Clone)]
pub struct BacktestJob {
    pub name: String,
    pub runner: BacktestRunner,
    pub candles: Arc<Vec<Candle>>,
}

impl BacktestJob {
    pub fn new(name: impl Into<String>, runner: BacktestRunner, candles: Arc<Vec<Candle>>) -> Self {
        Self {
            name: name.into(),
            runner,
            candles,
        }
    }
}

/// Outcome of one job, in submission order
#[derive(Debug)]
pub struct BatchOutcome {
    pub name: String,
    pub result: Result<BacktestResult>,
}

/// Run independent backtests concurrently on the blocking pool
///
/// Each job owns its own ledger and curves; nothing is shared but the
/// immutable strategies and candles. Outcomes come back in job order.
pub async fn run_batch(jobs: Vec<BacktestJob>) -> Vec<BatchOutcome> {
    tracing::info!("Running {} backtests concurrently", jobs.len());

    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let name = job.name.clone();
            let handle = tokio::task::spawn_blocking(move || job.runner.run(&job.candles));
            (name, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (index, (name, handle)) in handles.into_iter().enumerate() {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(CoreError::Batch {
                job: index,
                reason: e.to_string(),
            }),
        };

        if let Err(e) = &result {
            tracing::warn!("Backtest '{}' failed: {}", name, e);
        }
        outcomes.push(BatchOutcome { name, result });
    }

    outcomes
}
