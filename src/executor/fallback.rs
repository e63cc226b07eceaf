//! Manual fallback artifact: a self-contained launcher a human can run to
//! finish a task the engine could not execute.

use crate::config::FallbackSettings;
use crate::error::{RelayError, Result};
use crate::fs::atomic_write_file;
use crate::strategy::task_vars;
use crate::task::Task;
use crate::template::{applescript_escape, render_template};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ManualFallback {
    settings: FallbackSettings,
    app_name: String,
}

impl ManualFallback {
    pub fn new(settings: FallbackSettings, app_name: impl Into<String>) -> Self {
        Self {
            settings,
            app_name: app_name.into(),
        }
    }

    /// Where the artifact for `task` is written.
    pub fn artifact_path(&self, task: &Task) -> PathBuf {
        task.sibling_path(&self.settings.suffix)
    }

    /// Render the artifact: activation steps, the task file path, and the
    /// payload as a comment block.
    pub fn render(&self, task: &Task) -> Result<String> {
        let mut variables = task_vars(task, &self.app_name);
        for value in variables.values_mut() {
            *value = applescript_escape(value);
        }
        variables.insert("payload".to_string(), comment_block(&task.payload));

        render_template(&self.settings.template, &variables).map_err(|e| {
            RelayError::UserError(format!(
                "fallback.template: {}\n\
                 Fix: edit config.yaml; available variables are task_id, app_name, script_path, payload.",
                e
            ))
        })
    }

    /// Write the artifact beside the task file and return its path.
    pub fn write(&self, task: &Task) -> Result<PathBuf> {
        let content = self.render(task)?;
        let path = self.artifact_path(task);
        atomic_write_file(&path, &content)?;
        Ok(path)
    }
}

/// Prefix every payload line so the artifact stays a valid script.
fn comment_block(payload: &str) -> String {
    payload
        .lines()
        .map(|line| {
            if line.is_empty() {
                "--".to_string()
            } else {
                format!("-- {}", line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
