//! Safety screening for task payloads.
//!
//! A payload is rejected when it textually matches any pattern in a
//! configured deny-list (process spawning, arbitrary file access, reflective
//! evaluation, global introspection). Matching is case-insensitive regex
//! search over the raw payload text.
//!
//! This is a coarse gate against authoring mistakes, not a sandbox: it can
//! over-block legitimate payloads and under-block obfuscated ones.
//!
//! Screening runs twice per task: when a producer submits it and again
//! immediately before the executor hands it to a strategy.
//!
//! Error handling:
//! - Invalid regex patterns are config errors (exit 1), not rejections (exit 2)

mod patterns;
mod types;


pub use patterns::DenyList;
pub use types::Screening;
