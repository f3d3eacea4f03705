use std::sync::Arc;

use crate::{domain::EspMatch, signatures::SignatureSet};

/// Scores page HTML against a signature set.
#[derive(Debug, Clone)]
pub struct Classifier {
    signatures: Arc<SignatureSet>,
}

impl Classifier {
    pub fn new(signatures: Arc<SignatureSet>) -> Self {
        Self { signatures }
    }

    /// Counts, per ESP, how many distinct patterns occur in `body`. ESPs with no
    /// hits are left out. Ordered by count descending, then name ascending, so
    /// the first entry is the primary ESP.
    pub fn classify(&self, body: &str) -> Vec<EspMatch> {
        if body.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<EspMatch> = self
            .signatures
            .iter()
            .filter_map(|signature| {
                let count = signature
                    .patterns
                    .iter()
                    .filter(|pattern| pattern.is_match(body))
                    .count();
                (count > 0).then(|| EspMatch::new(signature.name.clone(), count))
            })
            .collect();

        matches.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.esp.cmp(&b.esp)));
        matches
    }
}

/// Highest count wins; ties go to the lexicographically smallest name.
pub fn primary(matches: &[EspMatch]) -> Option<&EspMatch> {
    matches
        .iter()
        .min_by(|a, b| b.count.cmp(&a.count).then_with(|| a.esp.cmp(&b.esp)))
}
