pub mod batch;

pub use batch::{BatchCoordinator, BatchOptions};
