//! State-template placeholder substitution for prompts.
//!
//! Placeholders look like `{name}`, `{name?}`, `{ns:name}`, `{ns:name?}` with
//! `ns` one of `app`, `user`, `temp`. The double-brace form `{{...}}` is
//! accepted too and normalized to single-brace before substitution.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

static DOUBLE_BRACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{((?:app|user|temp):)?([A-Za-z_][A-Za-z0-9_]*)(\??)\}\}").unwrap());

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{((?:app|user|temp):)?([A-Za-z_][A-Za-z0-9_]*)(\??)\}").unwrap());

/// `artifact.<...>` placeholders don't follow the `ns:name` grammar (the
/// body after the dot isn't restricted to `[A-Za-z0-9_]`), so they're
/// recognized by their own pattern rather than falling out of
/// [`PLACEHOLDER`]. They never look anything up: required ones are left
/// intact, optional ones resolve to empty, same as any other unknown
/// placeholder.
static ARTIFACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{artifact\.([^{}]*?)(\?)?\}").unwrap());

fn resolve_artifact_placeholders(input: &str) -> String {
    ARTIFACT
        .replace_all(input, |caps: &regex::Captures| {
            if caps.get(2).is_some() {
                String::new()
            } else {
                caps.get(0).unwrap().as_str().to_string()
            }
        })
        .into_owned()
}

fn normalize_double_braces(input: &str) -> String {
    DOUBLE_BRACE
        .replace_all(input, |caps: &regex::Captures| {
            format!(
                "{{{}{}{}}}",
                caps.get(1).map(|m| m.as_str()).unwrap_or(""),
                &caps[2],
                &caps[3],
            )
        })
        .into_owned()
}

/// Substitutes `{name}` / `{ns:name}` placeholders in `template` using
/// `state`. Keys in `state` are matched against the placeholder's full body
/// (including any `ns:` prefix, but never the `?` suffix or braces) — so a
/// placeholder `{user:name}` is looked up under the key `"user:name"`.
///
/// Unknown optional placeholders resolve to the empty string; unknown
/// required placeholders are left in the output verbatim (single-brace
/// form), so the downstream model can still observe the gap. `artifact.`
/// placeholders are reserved: left intact unless marked optional, in which
/// case they resolve to empty like any other unknown optional placeholder.
pub fn inject_session_state(template: &str, state: &HashMap<String, String>) -> String {
    let normalized = normalize_double_braces(template);
    let normalized = resolve_artifact_placeholders(&normalized);
    PLACEHOLDER
        .replace_all(&normalized, |caps: &regex::Captures| {
            let prefix = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let name = &caps[2];
            let optional = &caps[3] == "?";
            let key = format!("{prefix}{name}");

            if let Some(value) = state.get(&key) {
                return value.clone();
            }
            if optional {
                String::new()
            } else {
                format!("{{{key}}}")
            }
        })
        .into_owned()
}
