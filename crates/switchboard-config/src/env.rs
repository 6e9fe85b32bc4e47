use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Failure while expanding `{{ env.VAR }}` placeholders
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvExpansionError {
    /// Referenced variable is unset and no default was given
    #[error("environment variable not found: `{name}` (line {line})")]
    Missing {
        /// Variable name
        name: String,
        /// 1-based line number in the config file
        line: usize,
    },
    /// Placeholder used a scope other than `env.`
    #[error("only variables scoped with 'env.' are supported: `{key}` (line {line})")]
    UnsupportedScope {
        /// The full placeholder key
        key: String,
        /// 1-based line number in the config file
        line: usize,
    },
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `{{ env.VAR }}` or `{{ env.VAR | default("fallback") }}`
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*([a-zA-Z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#).expect("must be valid regex")
    })
}

/// Expand `{{ env.VAR }}` placeholders in raw config text
///
/// Comment lines are copied through untouched so that a commented-out
/// secret does not force the variable to exist.
pub fn expand_env(input: &str) -> Result<String, EnvExpansionError> {
    let mut lines = Vec::new();

    for (i, line) in input.lines().enumerate() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_owned());
            continue;
        }
        lines.push(expand_line(line, i + 1)?);
    }

    let mut output = lines.join("\n");
    if input.ends_with('\n') {
        output.push('\n');
    }

    Ok(output)
}

fn expand_line(line: &str, line_no: usize) -> Result<String, EnvExpansionError> {
    let mut result = String::with_capacity(line.len());
    let mut last_end = 0;

    for captures in placeholder().captures_iter(line) {
        let (start, end) = span(&captures);
        result.push_str(&line[last_end..start]);
        result.push_str(&resolve(&captures, line_no)?);
        last_end = end;
    }

    result.push_str(&line[last_end..]);
    Ok(result)
}

fn span(captures: &Captures<'_>) -> (usize, usize) {
    captures.get(0).map_or((0, 0), |m| (m.start(), m.end()))
}

fn resolve(captures: &Captures<'_>, line: usize) -> Result<String, EnvExpansionError> {
    let key = captures.get(1).map_or("", |m| m.as_str());
    let default_value = captures.get(2).map(|m| m.as_str());

    let Some(name) = key.strip_prefix("env.").filter(|rest| !rest.is_empty() && !rest.contains('.')) else {
        return Err(EnvExpansionError::UnsupportedScope {
            key: key.to_owned(),
            line,
        });
    };

    match (std::env::var(name), default_value) {
        (Ok(value), _) => Ok(value),
        (Err(_), Some(default)) => Ok(default.to_owned()),
        (Err(_), None) => Err(EnvExpansionError::Missing {
            name: name.to_owned(),
            line,
        }),
    }
}
