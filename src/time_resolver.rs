pub mod resolver;
pub mod types;
