use std::{io, path::Path, sync::Arc};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::{
    classifier::Classifier,
    config::AppConfig,
    dataset,
    fetcher::{HttpFetcher, PageFetcher},
    infrastructure::{directories, shutdown::Shutdown},
    report::{self, BatchSummary},
    signatures::SignatureSet,
    tasks::{BatchCoordinator, BatchOptions},
};

pub struct EspDetectorApp {
    config: Arc<AppConfig>,
    coordinator: BatchCoordinator,
    shutdown: Shutdown,
}

impl EspDetectorApp {
    pub fn initialize(config: AppConfig, shutdown: Shutdown) -> Result<Self> {
        let fetcher =
            HttpFetcher::new(&config.fetch).context("failed to build HTTP client")?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher), shutdown))
    }

    pub fn with_fetcher(
        config: AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        shutdown: Shutdown,
    ) -> Self {
        let config = Arc::new(config);
        let signatures = SignatureSet::lookup();
        tracing::debug!(target: "app", signatures = signatures.len(), "signature database loaded");

        let coordinator = BatchCoordinator::new(
            fetcher,
            Arc::new(Classifier::new(signatures)),
            BatchOptions::from_config(&config.detection, &config.fetch),
        );

        Self {
            config,
            coordinator,
            shutdown,
        }
    }

    /// Reads `input`, detects every unique address and writes the report to
    /// `output`, or as CSV to stdout when no output path is given.
    pub async fn run(self, input: &Path, output: Option<&Path>) -> Result<BatchSummary> {
        let EspDetectorApp {
            config,
            coordinator,
            shutdown,
        } = self;

        let dataset = dataset::read_input(input, config.input.url_column.as_deref())
            .with_context(|| format!("failed to read {}", input.display()))?;

        tracing::info!(
            target: "app",
            input = %input.display(),
            column = %dataset.url_column,
            unique = dataset.addresses.len(),
            max_workers = config.detection.max_workers,
            timeout_secs = config.fetch.timeout.as_secs(),
            "detecting ESPs"
        );

        let started_at = Utc::now();
        let results = coordinator
            .run_until(
                dataset.addresses.clone(),
                |completed, total| {
                    tracing::info!(target: "app", completed, total, "Processing: {completed}/{total} URLs...");
                },
                Some(shutdown.subscribe()),
            )
            .await;
        let summary = BatchSummary::from_results(&results, started_at, Utc::now());

        let rows = report::aggregate(&results, &dataset.metadata);
        let headers = report::headers(&dataset.metadata);
        match output {
            Some(path) => {
                directories::ensure_parent(path)?;
                dataset::write_report(path, &headers, &rows, &summary)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!(target: "report", output = %path.display(), "report written");
            }
            None => {
                dataset::write_csv(io::stdout().lock(), &headers, &rows)
                    .context("failed to write report to stdout")?;
            }
        }

        log_summary(&summary);
        Ok(summary)
    }
}

fn log_summary(summary: &BatchSummary) {
    let elapsed = summary.finished_at - summary.started_at;
    tracing::info!(
        target: "report",
        total = summary.total,
        detected = summary.detected,
        errors = summary.errors,
        not_processed = summary.not_processed,
        elapsed_ms = elapsed.num_milliseconds(),
        "processing complete"
    );
    if summary.distribution.is_empty() {
        tracing::info!(target: "report", "no ESPs detected in this batch");
    }
    for entry in &summary.distribution {
        tracing::info!(target: "report", esp = %entry.esp, sites = entry.sites, "ESP distribution");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::{
        config::{DetectionConfig, DirectoryConfig, FetchConfig, InputConfig, LoggingConfig},
        domain::{ErrorKind, FetchOutcome},
    };

    struct CannedFetcher;

    #[async_trait]
    impl PageFetcher for CannedFetcher {
        async fn fetch(&self, address: &str, _timeout: Duration) -> FetchOutcome {
            match address {
                "shop.test" => FetchOutcome::Success {
                    body: "<script>window._learnq = []; attn.tv</script>".to_string(),
                    final_url: "https://shop.test/".to_string(),
                },
                "gone.test" => FetchOutcome::failure(ErrorKind::HttpError(410), "gone"),
                _ => FetchOutcome::Success {
                    body: String::new(),
                    final_url: format!("https://{address}/"),
                },
            }
        }
    }

    fn config() -> AppConfig {
        AppConfig {
            detection: DetectionConfig {
                max_workers: 2,
                pacing_delay: Duration::ZERO,
            },
            fetch: FetchConfig::default(),
            input: InputConfig::default(),
            directories: DirectoryConfig {
                logs_dir: "logs".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn writes_one_row_per_unique_address() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("sites.csv");
        std::fs::write(
            &input,
            "Company,Website\nShop,shop.test\nGone,gone.test\nPlain,plain.test\nShop again,shop.test\n",
        )
        .unwrap();
        let output = dir.path().join("out/results.csv");

        let (shutdown, _) = Shutdown::new();
        let app = EspDetectorApp::with_fetcher(config(), Arc::new(CannedFetcher), shutdown);
        let summary = app.run(&input, Some(&output)).await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.detected, 1);
        assert_eq!(summary.errors, 1);

        let text = std::fs::read_to_string(&output).unwrap();
        let mut lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines.remove(0),
            "Company,url,final_url,esp,all_esps,confidence,status"
        );
        lines.sort();
        assert_eq!(
            lines,
            vec![
                "Gone,gone.test,https://gone.test/,Not Detected,None,0,HTTP Error: 410",
                "Plain,plain.test,https://plain.test/,Not Detected,None,0,Success",
                "Shop,shop.test,https://shop.test/,Attentive,\"Attentive (1), Klaviyo (1)\",1,Success",
            ]
        );
    }

    #[tokio::test]
    async fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (shutdown, _) = Shutdown::new();
        let app = EspDetectorApp::with_fetcher(config(), Arc::new(CannedFetcher), shutdown);
        let err = app
            .run(&dir.path().join("absent.csv"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
