//! Oracle Consensus Library
//!
//! Multi-source price consensus validation for oracle feeds

pub mod config;
pub mod oracle;
pub mod types;
