pub mod job;
pub mod pattern;
pub mod repository;
pub mod sink;

pub use job::run_backup;
pub use pattern::matches_any;
pub use repository::{Repository, DEFAULT_DATE_FORMAT};
pub use sink::DumpSink;
