//! Version gate - npm-style semver ranges checked with the `semver` crate
//!
//! Plugins declare ranges the way package manifests do (`^1.0.0`,
//! `>=1.2 <2`, `1.0.0 - 1.4.0`, `1.x || 2.x`). Each alternative is rewritten
//! into a [`VersionReq`] before matching.

use semver::{Version, VersionReq};

const OPERATOR_CHARS: &[char] = &['<', '>', '=', '~', '^'];

/// Does `installed` fall inside `range`? Unparsable input never matches.
pub fn satisfies(installed: &str, range: &str) -> bool {
    let Ok(version) = Version::parse(strip_v(installed.trim())) else {
        tracing::debug!("Unparsable plugin version: {}", installed);
        return false;
    };

    range.split("||").any(|alternative| match requirement(alternative) {
        Some(req) => req.matches(&version),
        None => {
            tracing::debug!("Unparsable version range: {}", alternative.trim());
            false
        }
    })
}

/// One space-separated comparator set as a `VersionReq`
fn requirement(set: &str) -> Option<VersionReq> {
    let tokens: Vec<&str> = set.split_whitespace().collect();

    let comparators = match tokens.as_slice() {
        [] => return Some(VersionReq::STAR),
        [low, "-", high] => vec![format!(">={}", strip_v(low)), format!("<={}", strip_v(high))],
        _ => join_operators(&tokens)?.iter().map(|token| comparator(token)).collect(),
    };

    VersionReq::parse(&comparators.join(", ")).ok()
}

/// Glue a detached operator (`>= 1.2.0`) onto the version after it
fn join_operators(tokens: &[&str]) -> Option<Vec<String>> {
    let mut joined = Vec::with_capacity(tokens.len());
    let mut pending = String::new();

    for token in tokens {
        if token.chars().all(|c| OPERATOR_CHARS.contains(&c)) {
            pending.push_str(token);
            continue;
        }
        joined.push(format!("{}{}", pending, token));
        pending.clear();
    }

    pending.is_empty().then_some(joined)
}

/// A bare version pins exactly; `semver` would read it as a caret range
fn comparator(token: &str) -> String {
    let version = token.trim_start_matches(OPERATOR_CHARS);
    let operator = &token[..token.len() - version.len()];
    let version = strip_v(version);

    if operator.is_empty() && !is_wildcard(version) {
        format!("={}", version)
    } else {
        format!("{}{}", operator, version)
    }
}

fn is_wildcard(version: &str) -> bool {
    version
        .split('.')
        .any(|part| matches!(part, "*" | "x" | "X"))
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}
