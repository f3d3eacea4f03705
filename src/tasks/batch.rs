use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use tokio::{sync::Semaphore, task::JoinSet, time::sleep};

use crate::{
    classifier::Classifier,
    config::{DetectionConfig, FetchConfig},
    domain::{DetectionResult, ErrorKind, FetchOutcome},
    fetcher::{normalize_address, PageFetcher},
    infrastructure::shutdown::ShutdownListener,
};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub max_workers: usize,
    pub timeout: Duration,
    /// Pause after each completion before the next one is handled.
    pub pacing_delay: Duration,
}

impl BatchOptions {
    pub fn from_config(detection: &DetectionConfig, fetch: &FetchConfig) -> Self {
        Self {
            max_workers: detection.max_workers,
            timeout: fetch.timeout,
            pacing_delay: detection.pacing_delay,
        }
    }
}

/// Runs fetch-and-classify over a batch of addresses with at most
/// `max_workers` fetches in flight.
pub struct BatchCoordinator {
    fetcher: Arc<dyn PageFetcher>,
    classifier: Arc<Classifier>,
    options: BatchOptions,
}

impl BatchCoordinator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        classifier: Arc<Classifier>,
        options: BatchOptions,
    ) -> Self {
        Self {
            fetcher,
            classifier,
            options,
        }
    }

    pub async fn run<P>(&self, addresses: Vec<String>, on_progress: P) -> Vec<DetectionResult>
    where
        P: FnMut(usize, usize),
    {
        self.run_until(addresses, on_progress, None).await
    }

    /// Like [`run`](Self::run), but stops early once `shutdown` fires. Every
    /// address still yields exactly one result; those that had not completed
    /// are reported as not processed.
    ///
    /// Workers live in a [`JoinSet`], so dropping the returned future aborts
    /// every fetch that is still queued or in flight.
    pub async fn run_until<P>(
        &self,
        addresses: Vec<String>,
        mut on_progress: P,
        shutdown: Option<ShutdownListener>,
    ) -> Vec<DetectionResult>
    where
        P: FnMut(usize, usize),
    {
        let addresses = dedup(addresses);
        let total = addresses.len();
        if total == 0 {
            return Vec::new();
        }

        let max_workers = self.options.max_workers.max(1);
        tracing::info!(target: "batch", total, max_workers, "starting batch");

        let semaphore = Arc::new(Semaphore::new(max_workers));
        let mut workers = JoinSet::new();
        let mut pending = HashMap::with_capacity(total);

        for address in addresses {
            let worker = Worker {
                fetcher: self.fetcher.clone(),
                classifier: self.classifier.clone(),
                semaphore: semaphore.clone(),
                timeout: self.options.timeout,
                shutdown: shutdown.clone(),
            };
            let handle = workers.spawn(worker.process(address.clone()));
            pending.insert(handle.id(), address);
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = workers.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(err) => {
                    let address = pending.remove(&err.id()).unwrap_or_default();
                    tracing::error!(target: "batch", address = %address, error = %err, "worker task failed");
                    DetectionResult::failed(
                        address,
                        ErrorKind::OtherError("worker task failed".to_string()),
                    )
                }
            };
            results.push(result);
            on_progress(results.len(), total);

            let stopping = shutdown.as_ref().is_some_and(|s| s.is_triggered());
            if results.len() < total && !stopping && !self.options.pacing_delay.is_zero() {
                sleep(self.options.pacing_delay).await;
            }
        }

        tracing::info!(target: "batch", total, "batch finished");
        results
    }
}

struct Worker {
    fetcher: Arc<dyn PageFetcher>,
    classifier: Arc<Classifier>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    shutdown: Option<ShutdownListener>,
}

impl Worker {
    async fn process(mut self, address: String) -> DetectionResult {
        let permit = tokio::select! {
            biased;
            _ = cancelled(&mut self.shutdown) => None,
            permit = self.semaphore.clone().acquire_owned() => permit.ok(),
        };
        let Some(_permit) = permit else {
            return DetectionResult::not_processed(address);
        };

        let outcome = tokio::select! {
            biased;
            _ = cancelled(&mut self.shutdown) => None,
            outcome = self.fetcher.fetch(&address, self.timeout) => Some(outcome),
        };
        let Some(outcome) = outcome else {
            tracing::debug!(target: "batch", address = %address, "fetch abandoned on shutdown");
            return DetectionResult::not_processed(address);
        };

        match outcome {
            FetchOutcome::Success { body, final_url } => {
                let matches = self.classifier.classify(&body);
                tracing::debug!(
                    target: "batch",
                    address = %address,
                    final_url = %final_url,
                    matched = matches.len(),
                    "classified"
                );
                DetectionResult::success(address, final_url, matches)
            }
            FetchOutcome::Failure { kind, message } => {
                tracing::warn!(target: "batch", address = %address, status = %kind, error = %message, "fetch failed");
                let attempted = normalize_address(&address).ok().map(|url| url.to_string());
                DetectionResult::failed(address, kind).with_final_url(attempted)
            }
        }
    }
}

async fn cancelled(shutdown: &mut Option<ShutdownListener>) {
    match shutdown {
        Some(listener) => listener.notified().await,
        None => std::future::pending().await,
    }
}

/// Exact, case-sensitive dedup that keeps first-seen order.
fn dedup(addresses: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(addresses.len());
    addresses
        .into_iter()
        .filter(|address| seen.insert(address.clone()))
        .collect()
}
