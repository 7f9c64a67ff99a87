//! Core traits for PSDNS
//!
//! - [`DnsApi`]: typed domain and record operations against a DNS API

pub mod dns_api;

pub use dns_api::DnsApi;
