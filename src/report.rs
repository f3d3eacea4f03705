use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::domain::{DetectionResult, DetectionStatus};

pub const NOT_DETECTED: &str = "Not Detected";
pub const NO_MATCHES: &str = "None";

/// Appended to a metadata column whose name is already taken by a detection
/// column or an earlier metadata column.
pub const CLASH_SUFFIX: &str = "_input";

/// Caller-supplied columns keyed by exact address. The first row seen for an
/// address wins.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    columns: Vec<String>,
    rows: HashMap<String, Vec<String>>,
}

impl Metadata {
    /// Column names are made unique against the detection columns and each
    /// other, so `status` from the input becomes `status_input`.
    pub fn new(columns: Vec<String>) -> Self {
        let mut taken: HashSet<String> = ReportRow::DETECTION_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .collect();
        let columns = columns
            .into_iter()
            .map(|mut name| {
                while !taken.insert(name.clone()) {
                    name.push_str(CLASH_SUFFIX);
                }
                name
            })
            .collect();

        Self {
            columns,
            rows: HashMap::new(),
        }
    }

    pub fn insert(&mut self, address: impl Into<String>, values: Vec<String>) {
        self.rows.entry(address.into()).or_insert(values);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn values_for(&self, address: &str) -> Vec<String> {
        let mut values = self.rows.get(address).cloned().unwrap_or_default();
        values.resize(self.columns.len(), String::new());
        values
    }
}

/// A reporting-ready record: metadata values followed by the detection fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    #[serde(flatten, serialize_with = "serialize_metadata")]
    pub metadata: Vec<(String, String)>,
    pub url: String,
    pub final_url: String,
    pub esp: String,
    pub all_esps: String,
    pub confidence: usize,
    pub status: String,
}

impl ReportRow {
    pub const DETECTION_COLUMNS: [&'static str; 6] =
        ["url", "final_url", "esp", "all_esps", "confidence", "status"];

    fn from_result(result: &DetectionResult, metadata: Vec<(String, String)>) -> Self {
        Self {
            metadata,
            url: result.input_address.clone(),
            final_url: result.final_url.clone().unwrap_or_default(),
            esp: result
                .primary_esp
                .clone()
                .unwrap_or_else(|| NOT_DETECTED.to_string()),
            all_esps: result
                .all_esps_label()
                .unwrap_or_else(|| NO_MATCHES.to_string()),
            confidence: result.confidence,
            status: result.status.to_string(),
        }
    }

    /// Metadata values followed by the detection fields, in header order.
    pub fn record(&self) -> Vec<String> {
        let mut record: Vec<String> = self.metadata.iter().map(|(_, v)| v.clone()).collect();
        record.extend([
            self.url.clone(),
            self.final_url.clone(),
            self.esp.clone(),
            self.all_esps.clone(),
            self.confidence.to_string(),
            self.status.clone(),
        ]);
        record
    }
}

fn serialize_metadata<S: Serializer>(
    metadata: &[(String, String)],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(metadata.iter().map(|(column, value)| (column, value)))
}

/// Joins every result to its metadata. Order follows `results`.
pub fn aggregate(results: &[DetectionResult], metadata: &Metadata) -> Vec<ReportRow> {
    results
        .iter()
        .map(|result| {
            let values = metadata
                .columns()
                .iter()
                .cloned()
                .zip(metadata.values_for(&result.input_address))
                .collect();
            ReportRow::from_result(result, values)
        })
        .collect()
}

pub fn headers(metadata: &Metadata) -> Vec<String> {
    metadata
        .columns()
        .iter()
        .cloned()
        .chain(ReportRow::DETECTION_COLUMNS.iter().map(|c| c.to_string()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EspCount {
    pub esp: String,
    pub sites: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub detected: usize,
    pub errors: usize,
    pub not_processed: usize,
    pub distribution: Vec<EspCount>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchSummary {
    pub fn from_results(
        results: &[DetectionResult],
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut errors = 0;
        let mut not_processed = 0;

        for result in results {
            match &result.status {
                DetectionStatus::Success => {}
                DetectionStatus::Failed(_) => errors += 1,
                DetectionStatus::NotProcessed => not_processed += 1,
            }
            if let Some(esp) = &result.primary_esp {
                *counts.entry(esp.as_str()).or_default() += 1;
            }
        }

        let mut distribution: Vec<EspCount> = counts
            .into_iter()
            .map(|(esp, sites)| EspCount {
                esp: esp.to_string(),
                sites,
            })
            .collect();
        // BTreeMap already yields names ascending; stable sort keeps that for ties.
        distribution.sort_by(|a, b| b.sites.cmp(&a.sites));

        Self {
            total: results.len(),
            detected: distribution.iter().map(|c| c.sites).sum(),
            errors,
            not_processed,
            distribution,
            started_at,
            finished_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;

    use super::*;
    use crate::{
        classifier::Classifier,
        domain::{ErrorKind, EspMatch, FetchOutcome},
        fetcher::PageFetcher,
        signatures::SignatureSet,
        tasks::{BatchCoordinator, BatchOptions},
    };

    fn success(address: &str, matches: Vec<EspMatch>) -> DetectionResult {
        DetectionResult::success(address.into(), format!("https://{address}/"), matches)
    }

    #[test]
    fn joins_metadata_by_exact_address() {
        let mut metadata = Metadata::new(vec!["company_name".into()]);
        metadata.insert("shop.test", vec!["Shop Co".into()]);
        metadata.insert("shop.test", vec!["Ignored Duplicate".into()]);

        let results = vec![
            success("shop.test", vec![EspMatch::new("Klaviyo", 2)]),
            success("Shop.test", vec![]),
        ];
        let rows = aggregate(&results, &metadata);

        assert_eq!(
            rows[0].metadata,
            vec![("company_name".to_string(), "Shop Co".to_string())]
        );
        assert_eq!(
            rows[1].metadata,
            vec![("company_name".to_string(), String::new())]
        );
    }

    #[test]
    fn clashing_metadata_columns_get_suffixed() {
        let mut metadata = Metadata::new(vec![
            "status".into(),
            "company".into(),
            "company".into(),
            "url".into(),
        ]);
        metadata.insert(
            "shop.test",
            vec!["active customer".into(), "Shop".into(), "Shop Ltd".into(), "old.test".into()],
        );

        assert_eq!(
            headers(&metadata),
            vec![
                "status_input",
                "company",
                "company_input",
                "url_input",
                "url",
                "final_url",
                "esp",
                "all_esps",
                "confidence",
                "status",
            ]
        );

        let rows = aggregate(&[success("shop.test", vec![])], &metadata);
        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["status_input"], "active customer");
        assert_eq!(json["status"], "Success");
        assert_eq!(json["url_input"], "old.test");
        assert_eq!(json["url"], "shop.test");
        assert_eq!(json["company_input"], "Shop Ltd");
        assert_eq!(json["confidence"], 0);
    }

    #[test]
    fn renders_detection_fields() {
        let results = vec![
            success(
                "multi.test",
                vec![EspMatch::new("Klaviyo", 3), EspMatch::new("Attentive", 1)],
            ),
            DetectionResult::failed("down.test".into(), ErrorKind::ConnectionError),
        ];
        let rows = aggregate(&results, &Metadata::default());

        assert_eq!(rows[0].esp, "Klaviyo");
        assert_eq!(rows[0].all_esps, "Klaviyo (3), Attentive (1)");
        assert_eq!(rows[0].confidence, 3);
        assert_eq!(rows[0].final_url, "https://multi.test/");
        assert_eq!(rows[0].status, "Success");

        assert_eq!(rows[1].esp, NOT_DETECTED);
        assert_eq!(rows[1].all_esps, NO_MATCHES);
        assert_eq!(rows[1].confidence, 0);
        assert_eq!(rows[1].final_url, "");
        assert_eq!(rows[1].status, "Connection Error");
    }

    #[test]
    fn record_follows_header_order() {
        let mut metadata = Metadata::new(vec!["company".into(), "region".into()]);
        metadata.insert("a.test", vec!["A".into(), "EU".into()]);
        let rows = aggregate(&[success("a.test", vec![])], &metadata);

        assert_eq!(
            headers(&metadata),
            vec!["company", "region", "url", "final_url", "esp", "all_esps", "confidence", "status"]
        );
        assert_eq!(
            rows[0].record(),
            vec!["A", "EU", "a.test", "https://a.test/", "Not Detected", "None", "0", "Success"]
        );
    }

    #[test]
    fn summary_counts_statuses_and_distribution() {
        let now = Utc::now();
        let results = vec![
            success("k1.test", vec![EspMatch::new("Klaviyo", 1)]),
            success("k2.test", vec![EspMatch::new("Klaviyo", 2)]),
            success("a.test", vec![EspMatch::new("Attentive", 1)]),
            success("d.test", vec![EspMatch::new("Drip", 1)]),
            success("none.test", vec![]),
            DetectionResult::failed("t.test".into(), ErrorKind::Timeout),
            DetectionResult::not_processed("n.test".into()),
        ];
        let summary = BatchSummary::from_results(&results, now, now);

        assert_eq!(summary.total, 7);
        assert_eq!(summary.detected, 4);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.not_processed, 1);
        let names: Vec<_> = summary.distribution.iter().map(|c| c.esp.as_str()).collect();
        assert_eq!(names, vec!["Klaviyo", "Attentive", "Drip"]);
        assert_eq!(summary.distribution[0].sites, 2);
    }

    struct DemoFetcher;

    #[async_trait]
    impl PageFetcher for DemoFetcher {
        async fn fetch(&self, address: &str, _timeout: Duration) -> FetchOutcome {
            let body = if address.starts_with("klaviyo") {
                "<script src=\"//static.klaviyo.com/onsite/js/klaviyo.js\"></script>"
            } else {
                ""
            };
            FetchOutcome::Success {
                body: body.to_string(),
                final_url: format!("https://{address}/"),
            }
        }
    }

    #[tokio::test]
    async fn end_to_end_with_reduced_signatures() {
        let signatures = SignatureSet::new([(
            "Klaviyo".to_string(),
            vec![r"static\.klaviyo\.com".to_string()],
        )])
        .unwrap();
        let coordinator = BatchCoordinator::new(
            Arc::new(DemoFetcher),
            Arc::new(Classifier::new(Arc::new(signatures))),
            BatchOptions {
                max_workers: 2,
                timeout: Duration::from_secs(5),
                pacing_delay: Duration::ZERO,
            },
        );

        let results = coordinator
            .run(
                vec!["klaviyo-demo.test".to_string(), "plain-demo.test".to_string()],
                |_, _| {},
            )
            .await;
        let rows = aggregate(&results, &Metadata::default());

        assert_eq!(rows.len(), 2);
        let klaviyo = rows.iter().find(|r| r.url == "klaviyo-demo.test").unwrap();
        assert_eq!((klaviyo.esp.as_str(), klaviyo.confidence), ("Klaviyo", 1));
        let plain = rows.iter().find(|r| r.url == "plain-demo.test").unwrap();
        assert_eq!((plain.esp.as_str(), plain.confidence), (NOT_DETECTED, 0));
    }
}
