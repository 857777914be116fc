use std::collections::HashMap;
use std::mem;
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, error, info, trace};
use smetrics_core::core::metrics::{CounterMetric, Metric, MetricType};
use tokio::select;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::MetricReporter;
use crate::errors::Result;
use crate::source::MetricSource;

/// The metrics which have been gathered since the last report.
#[derive(Debug, Default)]
struct PendingBatch {
    metrics: Vec<Metric>,
    index: HashMap<(MetricType, String), usize>,
}

impl PendingBatch {
    fn merge(&mut self, metric: Metric) {
        let key = (metric.metric_type(), metric.name().to_string());
        match self.index.get(&key).copied() {
            None => {
                self.index.insert(key, self.metrics.len());
                self.metrics.push(metric);
            }
            Some(position) => {
                let merged = match (&self.metrics[position], metric) {
                    (Metric::Counter(current), Metric::Counter(delta)) => {
                        CounterMetric::new(delta.name, current.value.saturating_add(delta.value))
                            .into()
                    }
                    (_, metric) => metric,
                };
                self.metrics[position] = merged;
            }
        }
    }

    fn take(&mut self) -> Vec<Metric> {
        self.index.clear();
        mem::take(&mut self.metrics)
    }
}

/// The agent which polls its metric sources and reports the gathered metrics.
#[derive(Debug)]
pub struct MetricAgent {
    sources: Vec<Box<dyn MetricSource>>,
    reporter: Box<dyn MetricReporter>,
    pending: Mutex<PendingBatch>,
}

impl MetricAgent {
    pub fn new(sources: Vec<Box<dyn MetricSource>>, reporter: Box<dyn MetricReporter>) -> Self {
        Self {
            sources,
            reporter,
            pending: Mutex::new(PendingBatch::default()),
        }
    }

    /// Poll all sources and merge the results into the pending batch.
    ///
    /// A gauge replaces the pending value of the same gauge, the delta of a counter is
    /// added to the pending delta of the same counter.
    pub fn gather(&self) {
        let metrics: Vec<Metric> = self.sources.iter().flat_map(|e| e.poll()).collect();
        trace!("Gathered {} metrics", metrics.len());

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        for metric in metrics {
            pending.merge(metric);
        }
    }

    /// Send the pending batch to the server.
    ///
    /// The pending batch is reset before it's sent, a failed report drops the batch.
    pub async fn report(&self) -> Result<()> {
        let metrics = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if metrics.is_empty() {
            trace!("No pending metrics to report");
            return Ok(());
        }

        self.reporter.send(metrics).await
    }

    /// Gather and report metrics on the given intervals until the token is cancelled.
    pub async fn run(
        &self,
        poll_interval: Duration,
        report_interval: Duration,
        cancellation_token: CancellationToken,
    ) {
        let mut poll = interval_at(Instant::now() + poll_interval, poll_interval);
        let mut report = interval_at(Instant::now() + report_interval, report_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        report.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Polling metrics every {:?}, reporting every {:?}",
            poll_interval, report_interval
        );
        loop {
            select! {
                _ = cancellation_token.cancelled() => break,
                _ = poll.tick() => self.gather(),
                _ = report.tick() => {
                    if let Err(e) = self.report().await {
                        error!("Failed to report metrics, {}", e);
                    }
                }
            }
        }
        debug!("Metrics agent has been stopped");
    }
}
