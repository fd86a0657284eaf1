pub mod purge;
pub mod spool_selector;
pub mod types;
