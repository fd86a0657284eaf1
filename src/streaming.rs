pub mod consumer;
pub mod job;
pub mod types;
