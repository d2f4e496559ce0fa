//! Environment variable interpolation for job files.
//!
//! Supported forms:
//! - `$VAR` and `${VAR}`: the variable must be set
//! - `${VAR:-fallback}`: fallback when VAR is unset or empty
//! - `${VAR-fallback}`: fallback only when VAR is unset
//! - `$$`: a literal `$`
//!
//! Values containing line breaks are rejected: a substituted value must not
//! be able to add keys to the YAML document.

use regex::{Captures, Regex};
use std::env;
use std::sync::LazyLock;

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$
        |
        \$\{
            (?P<braced>[A-Za-z_][A-Za-z0-9_]*)
            (?: (?P<op>:?-) (?P<fallback>[^}]*) )?
        \}
        |
        \$(?P<bare>[A-Za-z_][A-Za-z0-9_]*)
        ",
    )
    .expect("Invalid regex pattern")
});

/// Substitute environment variables in `input`.
///
/// Every problem is collected so a job file with several missing variables
/// reports all of them at once.
pub fn interpolate(input: &str) -> Result<String, Vec<String>> {
    let mut errors = Vec::new();

    let text = REFERENCE.replace_all(input, |caps: &Captures| {
        resolve(caps, &mut errors).unwrap_or_else(|| caps[0].to_string())
    });

    if errors.is_empty() {
        Ok(text.into_owned())
    } else {
        Err(errors)
    }
}

/// Value for one reference, or `None` (with an error recorded) when it
/// cannot be resolved.
fn resolve(caps: &Captures, errors: &mut Vec<String>) -> Option<String> {
    if &caps[0] == "$$" {
        return Some("$".to_string());
    }

    let name = caps
        .name("braced")
        .or_else(|| caps.name("bare"))
        .map_or("", |m| m.as_str());
    let empty_uses_fallback = caps.name("op").is_some_and(|op| op.as_str() == ":-");
    let fallback = caps.name("fallback").map(|m| m.as_str());

    match env::var(name) {
        Ok(value) if value.contains(['\n', '\r']) => {
            errors.push(format!(
                "environment variable '{name}' contains newlines, which is not allowed"
            ));
            None
        }
        Ok(value) if value.is_empty() && empty_uses_fallback => {
            Some(fallback.unwrap_or_default().to_string())
        }
        Ok(value) => Some(value),
        Err(_) => match fallback {
            Some(fallback) => Some(fallback.to_string()),
            None => {
                errors.push(format!("environment variable '{name}' is not set"));
                None
            }
        },
    }
}
