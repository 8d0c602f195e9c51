//! Command implementations for tagsync-cli

pub mod apply;
pub mod diff;
pub mod recover;
pub mod scan;

pub use apply::run_apply;
pub use diff::run_diff;
pub use recover::run_recover;
pub use scan::{run_scan, run_update};
