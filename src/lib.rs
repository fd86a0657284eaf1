pub mod capture_library;
pub mod configuration;
pub mod error_handling;
pub mod event_decoding;
pub mod extraction;
pub mod spool;
pub mod streaming;
pub mod time_resolver;
pub mod web_interface;
