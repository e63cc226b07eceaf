//! Implementation of `hostrelay screen`.

use super::print_json;
use crate::config::Config;
use crate::error::Result;
use crate::exit_codes;
use crate::safety::{DenyList, Screening};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ScreenResult {
    allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl From<Screening> for ScreenResult {
    fn from(screening: Screening) -> Self {
        let reason = screening.reason();
        match screening {
            Screening::Allowed => Self {
                allowed: true,
                pattern: None,
                matched: None,
                line: None,
                reason,
            },
            Screening::Rejected {
                pattern,
                matched,
                line,
            } => Self {
                allowed: false,
                pattern: Some(pattern),
                matched: Some(matched),
                line: Some(line),
                reason,
            },
        }
    }
}

/// Report which deny pattern, if any, `payload` hits. Nothing is written.
pub fn cmd_screen(config: &Config, payload: &str) -> Result<i32> {
    let deny = DenyList::from_config(config)?;
    let result = ScreenResult::from(deny.screen(payload));

    print_json(&result)?;
    Ok(if result.allowed {
        exit_codes::SUCCESS
    } else {
        exit_codes::SAFETY_REJECTED
    })
}
