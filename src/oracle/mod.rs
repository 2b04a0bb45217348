//! Oracle module - multi-source price consensus
//!
//! Screens fixed-point quotes from independent oracles (Pyth, Switchboard,
//! internal feeds) and accepts a median consensus only when every admissible
//! source agrees with it within the instrument's policy. Advisory
//! manipulation heuristics run alongside without affecting the verdict.

mod aggregator;
mod fixed;
pub mod health;
mod manipulation;
mod policy;
mod quote;
mod screen;
pub mod sources;
mod verdict;

pub use aggregator::validate_consensus;
pub use health::SourceHealth;
pub use manipulation::{detect_manipulation, ManipulationAlert, ManipulationThresholds};
pub use policy::{Policy, PolicyError};
pub use quote::{Quote, QuoteError, MAX_EXPONENT, MIN_EXPONENT};
pub use screen::screen_quote;
pub use verdict::{Consensus, Rejection, RejectionKind, Verdict};
