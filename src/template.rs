//! `{variable}` substitution for command lines and launcher scripts.
//!
//! Strategy commands, the readiness query, and launcher artifacts are all
//! configured as templates. The variables available to them are:
//!
//! - `{script_path}` - absolute path of the task file the host should run
//! - `{app_name}` - host application name, as used by the automation bridge
//! - `{task_id}` - identifier of the task being dispatched
//!
//! # Syntax
//!
//! - `{name}` - Substitutes the value of variable `name`
//! - `{{` - Renders as literal `{`
//! - `}}` - Renders as literal `}`
//!
//! Undefined variables are errors rather than silent empty substitutions.

use crate::error::{RelayError, Result};
use std::collections::HashMap;
use thiserror::Error;

/// Error type for template rendering failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("undefined variable '{name}' at position {position} in template")]
    UndefinedVariable { name: String, position: usize },

    #[error("unmatched '{{' at position {position} in template")]
    UnmatchedBrace { position: usize },

    #[error("empty variable name '{{}}' at position {position} in template")]
    EmptyVariableName { position: usize },
}

/// Render a template string by substituting variables.
///
/// ```
/// use hostrelay::template::{render_template, vars};
///
/// let vars = vars([("app_name", "Host"), ("script_path", "/tmp/a.jsx")]);
/// let rendered = render_template("tell application \"{app_name}\" to open \"{script_path}\"", &vars).unwrap();
/// assert_eq!(rendered, "tell application \"Host\" to open \"/tmp/a.jsx\"");
/// ```
pub fn render_template(
    template: &str,
    variables: &HashMap<String, String>,
) -> std::result::Result<String, TemplateError> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '{' => {
                if let Some((_, '{')) = chars.peek() {
                    chars.next();
                    result.push('{');
                    continue;
                }

                let mut var_name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, c)) => var_name.push(c),
                        None => return Err(TemplateError::UnmatchedBrace { position: pos }),
                    }
                }

                let var_name = var_name.trim();
                if var_name.is_empty() {
                    return Err(TemplateError::EmptyVariableName { position: pos });
                }

                match variables.get(var_name) {
                    Some(value) => result.push_str(value),
                    None => {
                        return Err(TemplateError::UndefinedVariable {
                            name: var_name.to_string(),
                            position: pos,
                        });
                    }
                }
            }
            '}' => {
                if let Some((_, '}')) = chars.peek() {
                    chars.next();
                }
                result.push('}');
            }
            _ => result.push(ch),
        }
    }

    Ok(result)
}

/// Split a command template into words, then render each word.
///
/// Splitting happens before substitution so that values containing spaces
/// (host install paths usually do) stay a single argument.
pub fn render_command(
    template: &str,
    variables: &HashMap<String, String>,
) -> Result<Vec<String>> {
    let words = shell_words::split(template).map_err(|e| {
        RelayError::UserError(format!(
            "failed to parse command template '{}': {}\n\
             Fix: check for unmatched quotes or invalid escape sequences.",
            template, e
        ))
    })?;

    words
        .iter()
        .map(|word| {
            render_template(word, variables).map_err(|e| {
                RelayError::UserError(format!("command template '{}': {}", template, e))
            })
        })
        .collect()
}

/// Escape a value for interpolation inside an AppleScript string literal.
pub fn applescript_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Helper to create a variables map from a list of key-value pairs.
pub fn vars<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_substitution() {
        let vars = vars([("app_name", "Host App"), ("task_id", "relay_1_0001")]);
        let result = render_template("{app_name} runs {task_id}", &vars).unwrap();
        assert_eq!(result, "Host App runs relay_1_0001");
    }

    #[test]
    fn test_escape_braces() {
        let vars = HashMap::new();
        let result = render_template("set x to {{1, 2}}", &vars).unwrap();
        assert_eq!(result, "set x to {1, 2}");
    }

    #[test]
    fn test_lone_closing_brace() {
        let vars = HashMap::new();
        let result = render_template("a } b", &vars).unwrap();
        assert_eq!(result, "a } b");
    }

    #[test]
    fn test_undefined_variable_error() {
        let vars = HashMap::new();
        let err = render_template("open {script_path}", &vars).unwrap_err();
        assert_eq!(
            err,
            TemplateError::UndefinedVariable {
                name: "script_path".to_string(),
                position: 5,
            }
        );
    }

    #[test]
    fn test_unmatched_brace_error() {
        let vars = HashMap::new();
        let err = render_template("open {script_path", &vars).unwrap_err();
        assert_eq!(err, TemplateError::UnmatchedBrace { position: 5 });
    }

    #[test]
    fn test_empty_variable_name_error() {
        let vars = HashMap::new();
        let err = render_template("open { }", &vars).unwrap_err();
        assert_eq!(err, TemplateError::EmptyVariableName { position: 5 });
    }

    #[test]
    fn test_error_display() {
        let err = TemplateError::UnmatchedBrace { position: 5 };
        assert_eq!(err.to_string(), "unmatched '{' at position 5 in template");

        let err = TemplateError::EmptyVariableName { position: 3 };
        assert_eq!(
            err.to_string(),
            "empty variable name '{}' at position 3 in template"
        );
    }

    #[test]
    fn test_render_command_keeps_paths_with_spaces_whole() {
        let vars = vars([("script_path", "/Users/me/My Scripts/relay_1_0001.jsx")]);
        let argv = render_command("runner -run {script_path}", &vars).unwrap();
        assert_eq!(
            argv,
            vec![
                "runner".to_string(),
                "-run".to_string(),
                "/Users/me/My Scripts/relay_1_0001.jsx".to_string(),
            ]
        );
    }

    #[test]
    fn test_render_command_quoted_words() {
        let vars = vars([("app_name", "Host App")]);
        let argv = render_command(
            r#"osascript -e 'tell application "{app_name}" to get version'"#,
            &vars,
        )
        .unwrap();
        assert_eq!(argv.len(), 3);
        assert_eq!(argv[2], r#"tell application "Host App" to get version"#);
    }

    #[test]
    fn test_render_command_unmatched_quote() {
        let err = render_command("echo \"unmatched", &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("failed to parse command template"));
    }

    #[test]
    fn test_applescript_escape() {
        assert_eq!(
            applescript_escape(r#"C:\scripts\"quoted".jsx"#),
            r#"C:\\scripts\\\"quoted\".jsx"#
        );
    }
}
