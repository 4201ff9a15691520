pub mod cache;
pub mod lock;
pub mod report;
