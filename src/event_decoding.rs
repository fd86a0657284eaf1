pub mod decoder_chain;
pub mod eve_json;
pub mod fast_alert;
pub mod protocols;
pub mod types;
