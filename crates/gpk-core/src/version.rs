//! Semver tag evaluation.
//!
//! Git tags carry versions as `v1.2.3`. This module parses them, tests
//! range satisfaction with npm range syntax (`^`, `~`, comparators,
//! hyphen ranges, x-ranges, `||` unions) and orders tag lists by semver
//! precedence so the highest satisfying tag can be selected.

use semver::{Version, VersionReq};
use std::cmp::Ordering;

/// Parse a tag into a version, stripping a single leading `v`.
///
/// Returns `None` for tags that do not parse as semver.
#[must_use]
pub fn parse(tag: &str) -> Option<Version> {
    let stripped = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(stripped).ok()
}

/// Test whether `version` satisfies `range`.
///
/// `||` alternatives are satisfied if any branch matches. An unparsable
/// range satisfies nothing.
#[must_use]
pub fn satisfies(version: &Version, range: &str) -> bool {
    range
        .split("||")
        .map(str::trim)
        .filter(|alt| !alt.is_empty())
        .filter_map(|alt| parse_range(alt).ok())
        .any(|req| req.matches(version))
}

/// Sort tags by semver precedence.
///
/// Tags that do not parse compare lower than any valid tag. Ties on
/// precedence (identical parsed versions) break toward the
/// lexicographically higher tag name.
pub fn sort_tags(tags: &mut [String], descending: bool) {
    tags.sort_by(|a, b| {
        let ord = compare_tags(a, b);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

fn compare_tags(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(va), Some(vb)) => va.cmp(&vb).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Return the highest tag whose parsed version satisfies `range`.
#[must_use]
pub fn match_tag<'a>(tags: &'a [String], range: &str) -> Option<&'a str> {
    let mut sorted: Vec<&str> = tags.iter().map(String::as_str).collect();
    sorted.sort_by(|a, b| compare_tags(b, a));

    sorted
        .into_iter()
        .find(|tag| parse(tag).is_some_and(|v| satisfies(&v, range)))
}

/// Return the highest tag with a non-prerelease version, optionally
/// constrained by `range`.
#[must_use]
pub fn match_tag_stable<'a>(tags: &'a [String], range: Option<&str>) -> Option<&'a str> {
    let mut sorted: Vec<&str> = tags.iter().map(String::as_str).collect();
    sorted.sort_by(|a, b| compare_tags(b, a));

    sorted.into_iter().find(|tag| {
        parse(tag).is_some_and(|v| {
            v.pre.is_empty() && range.is_none_or(|r| satisfies(&v, r))
        })
    })
}

/// Parse a single (non-`||`) range, handling npm syntax the `semver`
/// crate does not accept directly.
///
/// Handles:
/// - Standard comparators: `^1.0.0`, `~1.0.0`, `>=1.0.0`, `<2`, `=1.2.3`
/// - Hyphen ranges: `1.0.0 - 2.0.0`
/// - X-ranges: `1.x`, `1.0.x`, `*`
/// - Space-separated comparators: `>=2.1.2 <3.0.0`
fn parse_range(range: &str) -> Result<VersionReq, semver::Error> {
    let range = range.trim();

    if range.is_empty() {
        return VersionReq::parse("*");
    }

    // Hyphen range: "1.0.0 - 2.0.0" -> ">=1.0.0, <=2.0.0"
    if let Some((start, end)) = range.split_once(" - ") {
        let converted = format!(">={}, <={}", start.trim(), end.trim());
        return VersionReq::parse(&converted);
    }

    // X-ranges: "*", "1.x", "1.0.x"
    if let Some(converted) = convert_x_range(range) {
        return VersionReq::parse(&converted);
    }

    // Space-separated comparators mean AND in npm ranges; the semver
    // crate wants commas.
    VersionReq::parse(&join_comparators(range))
}

/// Convert an x-range to comparator form, or `None` if `range` is not
/// an x-range.
fn convert_x_range(range: &str) -> Option<String> {
    if range == "*" || range.eq_ignore_ascii_case("x") {
        return Some(">=0.0.0".to_string());
    }

    let is_x = |s: &str| s == "*" || s.eq_ignore_ascii_case("x");
    let parts: Vec<&str> = range.split('.').collect();

    match parts.as_slice() {
        [major, rest] if is_x(rest) => {
            let m: u64 = major.parse().ok()?;
            Some(format!(">={m}.0.0, <{}.0.0", m + 1))
        }
        [major, minor, rest] if is_x(rest) => {
            let m: u64 = major.parse().ok()?;
            let n: u64 = minor.parse().ok()?;
            Some(format!(">={m}.{n}.0, <{m}.{}.0", n + 1))
        }
        _ => None,
    }
}

/// Rejoin whitespace-separated comparators with commas, keeping bare
/// operators attached to the version that follows them.
fn join_comparators(range: &str) -> String {
    let mut out = String::new();
    let mut pending_op = String::new();

    for token in range.split_whitespace() {
        if token.chars().any(|c| c.is_ascii_digit()) {
            if !out.is_empty() && pending_op.is_empty() {
                out.push_str(", ");
            }
            out.push_str(&pending_op);
            out.push_str(token);
            pending_op.clear();
        } else {
            // Operator detached from its version, e.g. ">= 1.0.0".
            if !out.is_empty() {
                out.push_str(", ");
            }
            pending_op = token.to_string();
        }
    }

    if out.is_empty() {
        range.to_string()
    } else {
        out
    }
}
