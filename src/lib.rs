//! Detects which Email Service Provider a website uses by fetching its HTML
//! and matching it against a signature database.
//!
//! The pipeline is [`BatchCoordinator`] → [`PageFetcher`] → [`Classifier`] →
//! [`report::aggregate`]. The CSV front end lives in [`dataset`] and [`app`].

pub mod app;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod fetcher;
pub mod infrastructure;
pub mod report;
pub mod signatures;
pub mod tasks;

pub use classifier::Classifier;
pub use domain::{DetectionResult, DetectionStatus, ErrorKind, EspMatch, FetchOutcome};
pub use fetcher::{HttpFetcher, PageFetcher};
pub use signatures::SignatureSet;
pub use tasks::{BatchCoordinator, BatchOptions};
