//! Compiled deny-list matching.

use super::types::Screening;
use crate::config::Config;
use crate::error::{RelayError, Result};
use regex::{Regex, RegexBuilder};

/// Compiled deny-list patterns.
///
/// Compile once and share; screening is read-only, so the watcher and the
/// executor each hold a clone.
#[derive(Clone)]
pub struct DenyList {
    /// Compiled regexes paired with their original string representations.
    patterns: Vec<(Regex, String)>,
}

impl std::fmt::Debug for DenyList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenyList")
            .field(
                "patterns",
                &self.patterns.iter().map(|(_, s)| s).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl DenyList {
    /// Compile the deny-list from config.
    ///
    /// # Returns
    ///
    /// * `Ok(DenyList)` - Successfully compiled patterns
    /// * `Err(RelayError::UserError)` - If any pattern fails to compile
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.safety.deny_patterns)
    }

    /// Compile a deny-list from raw pattern strings.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    RelayError::UserError(format!(
                        "invalid regex pattern in safety.deny_patterns: '{}' - {}\n\
                         Fix: edit config.yaml and correct or remove this pattern.",
                        pattern, e
                    ))
                })?;
            compiled.push((regex, pattern.to_string()));
        }

        Ok(Self { patterns: compiled })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Screen a payload against every pattern, in configured order.
    ///
    /// The first matching pattern decides the rejection.
    pub fn screen(&self, payload: &str) -> Screening {
        for (regex, pattern) in &self.patterns {
            if let Some(found) = regex.find(payload) {
                let line = payload[..found.start()].matches('\n').count() + 1;
                return Screening::Rejected {
                    pattern: pattern.clone(),
                    matched: found.as_str().to_string(),
                    line,
                };
            }
        }
        Screening::Allowed
    }
}
