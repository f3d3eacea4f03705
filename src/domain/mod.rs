pub mod result;
pub mod types;

pub use result::DetectionResult;
pub use types::{DetectionStatus, ErrorKind, EspMatch, FetchOutcome};
