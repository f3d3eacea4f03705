use serde::Serialize;

use super::types::{DetectionStatus, ErrorKind, EspMatch};
use crate::classifier::primary;

/// One record per deduplicated input address.
///
/// `primary_esp` and `confidence` are derived from `all_matches`, so
/// `primary_esp` is set exactly when something matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    pub input_address: String,
    pub final_url: Option<String>,
    pub primary_esp: Option<String>,
    pub all_matches: Vec<EspMatch>,
    pub confidence: usize,
    pub status: DetectionStatus,
}

impl DetectionResult {
    pub fn success(input_address: String, final_url: String, all_matches: Vec<EspMatch>) -> Self {
        let (primary_esp, confidence) = match primary(&all_matches) {
            Some(head) => (Some(head.esp.clone()), head.count),
            None => (None, 0),
        };
        Self {
            input_address,
            final_url: Some(final_url),
            primary_esp,
            all_matches,
            confidence,
            status: DetectionStatus::Success,
        }
    }

    pub fn failed(input_address: String, kind: ErrorKind) -> Self {
        Self::empty(input_address, DetectionStatus::Failed(kind))
    }

    pub fn not_processed(input_address: String) -> Self {
        Self::empty(input_address, DetectionStatus::NotProcessed)
    }

    /// Records the URL that was attempted, for rows that never got a response.
    pub fn with_final_url(mut self, final_url: Option<String>) -> Self {
        self.final_url = final_url;
        self
    }

    fn empty(input_address: String, status: DetectionStatus) -> Self {
        Self {
            input_address,
            final_url: None,
            primary_esp: None,
            all_matches: Vec::new(),
            confidence: 0,
            status,
        }
    }

    /// `"Klaviyo (3), Mailchimp (1)"`, or `None` when nothing matched.
    pub fn all_esps_label(&self) -> Option<String> {
        if self.all_matches.is_empty() {
            return None;
        }
        Some(
            self.all_matches
                .iter()
                .map(|m| format!("{} ({})", m.esp, m.count))
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_takes_primary_from_head_of_matches() {
        let result = DetectionResult::success(
            "shop.test".into(),
            "https://shop.test/".into(),
            vec![EspMatch::new("Klaviyo", 3), EspMatch::new("Mailchimp", 1)],
        );
        assert_eq!(result.primary_esp.as_deref(), Some("Klaviyo"));
        assert_eq!(result.confidence, 3);
        assert_eq!(
            result.all_esps_label().as_deref(),
            Some("Klaviyo (3), Mailchimp (1)")
        );
    }

    #[test]
    fn success_without_matches_has_no_primary() {
        let result =
            DetectionResult::success("plain.test".into(), "https://plain.test/".into(), vec![]);
        assert!(result.primary_esp.is_none());
        assert_eq!(result.confidence, 0);
        assert!(result.all_esps_label().is_none());
        assert!(result.status.is_success());
    }

    #[test]
    fn status_renders_report_text() {
        let failed = DetectionResult::failed("a.test".into(), ErrorKind::HttpError(503));
        assert_eq!(failed.status.to_string(), "HTTP Error: 503");
        assert_eq!(
            DetectionStatus::Failed(ErrorKind::ConnectionError).to_string(),
            "Connection Error"
        );
        assert_eq!(
            DetectionResult::not_processed("b.test".into())
                .status
                .to_string(),
            "Not Processed"
        );
    }
}
