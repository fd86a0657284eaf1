pub mod capture_trait;
#[cfg(feature = "libpcap")]
pub mod libpcap;
#[cfg(test)]
pub mod memory;
pub mod types;
