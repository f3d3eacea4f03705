use std::{collections::HashSet, sync::Arc};

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid pattern {pattern:?} for {esp}: {source}")]
    InvalidPattern {
        esp: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("duplicate ESP name: {0}")]
    DuplicateEsp(String),
}

#[derive(Debug, Clone)]
pub struct EspSignature {
    pub name: String,
    pub patterns: Vec<Regex>,
}

/// Ordered ESP name → compiled detection rules. Immutable once built and safe
/// to share across workers.
#[derive(Debug, Clone)]
pub struct SignatureSet {
    entries: Vec<EspSignature>,
}

const BUILTIN: &[(&str, &[&str])] = &[
    (
        "Klaviyo",
        &[
            r"klaviyo\.com",
            r"static\.klaviyo\.com",
            r"a\.klaviyo\.com",
            r"klaviyo-account",
            r"klaviyo/klaviyo\.js",
            r"klaviyo\.push",
            r"_learnq",
        ],
    ),
    (
        "Mailchimp",
        &[
            r"mailchimp\.com",
            r"list-manage\.com",
            r"mc\.us\d+\.list-manage\.com",
            r"chimpstatic\.com",
        ],
    ),
    ("Omnisend", &[r"omnisend\.com", r"omnisnippet", r"omnisrc"]),
    ("Attentive", &[r"attentive\.com", r"attn\.tv", r"attentivemobile"]),
    ("Postscript", &[r"postscript\.io", r"pscr\.pt"]),
    ("Listrak", &[r"listrak\.com", r"listrakbi\.com"]),
    ("Drip", &[r"drip\.com", r"getdrip\.com"]),
    ("ActiveCampaign", &[r"activecampaign\.com", r"activehosted\.com"]),
    ("ConvertKit", &[r"convertkit\.com", r"ck\.page"]),
    ("Constant Contact", &[r"constantcontact\.com", r"ctctcdn\.com"]),
    (
        "Sendinblue",
        &[r"sendinblue\.com", r"sibautomation", r"brevo\.com"],
    ),
    ("Yotpo", &[r"yotpo\.com", r"staticw2\.yotpo\.com"]),
    ("Privy", &[r"privy\.com", r"static\.privy\.com"]),
    ("Justuno", &[r"justuno\.com", r"cjs\.js"]),
    ("EmailOctopus", &[r"emailoctopus\.com"]),
    ("SendGrid", &[r"sendgrid\.com", r"sendgrid\.net"]),
    ("Mailgun", &[r"mailgun\.com"]),
    ("Campaign Monitor", &[r"createsend\.com", r"campaignmonitor\.com"]),
    ("GetResponse", &[r"getresponse\.com"]),
    ("AWeber", &[r"aweber\.com"]),
];

static DEFAULT_SET: Lazy<Arc<SignatureSet>> = Lazy::new(|| {
    let entries = BUILTIN.iter().map(|(name, patterns)| {
        (
            name.to_string(),
            patterns.iter().map(|p| p.to_string()).collect(),
        )
    });
    Arc::new(SignatureSet::new(entries).expect("built-in signatures compile"))
});

impl SignatureSet {
    pub fn new<I>(entries: I) -> Result<Self, SignatureError>
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let mut seen = HashSet::new();
        let mut compiled = Vec::new();

        for (name, patterns) in entries {
            if !seen.insert(name.clone()) {
                return Err(SignatureError::DuplicateEsp(name));
            }
            let patterns = patterns
                .into_iter()
                .map(|pattern| {
                    RegexBuilder::new(&pattern)
                        .case_insensitive(true)
                        .build()
                        .map_err(|source| SignatureError::InvalidPattern {
                            esp: name.clone(),
                            pattern,
                            source,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            compiled.push(EspSignature { name, patterns });
        }

        Ok(Self { entries: compiled })
    }

    /// The built-in database. Every call hands out the same shared value.
    pub fn lookup() -> Arc<SignatureSet> {
        DEFAULT_SET.clone()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EspSignature> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
