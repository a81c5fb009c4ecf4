pub mod extraction;
pub mod extraction_outcomes;
pub mod session_maintenance;

pub use extraction::{extraction_worker, run_pending_jobs};
pub use extraction_outcomes::extraction_outcome_worker;
pub use session_maintenance::session_maintenance_worker;
