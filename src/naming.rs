//! Physical naming convention
//!
//! Version 0 of a logical file is stored under its own name; version `k >= 1`
//! is stored as `<name>.v<k>`. Any name ending in `.v` followed by digits is
//! reserved for version slots and never accepted from callers.

use std::sync::OnceLock;

use regex::Regex;

fn version_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.v([0-9]+)$").expect("static pattern"))
}

/// Check whether a name addresses a version slot (`foo.v3`)
pub fn is_version_name(name: &str) -> bool {
    version_suffix().is_match(name)
}

/// Storage name for version `version` of `logical`
pub fn physical_name(logical: &str, version: u32) -> String {
    if version == 0 {
        logical.to_string()
    } else {
        format!("{}.v{}", logical, version)
    }
}

/// Split a storage name into its logical name and version number.
///
/// Returns `None` for suffixed names that `physical_name` would never produce
/// (`foo.v0`, `foo.v01`, or digits that overflow a `u32`).
pub fn parse_physical(physical: &str) -> Option<(String, u32)> {
    let Some(caps) = version_suffix().captures(physical) else {
        return Some((physical.to_string(), 0));
    };

    let digits = caps.get(1)?;
    if digits.as_str().starts_with('0') {
        return None;
    }
    let version: u32 = digits.as_str().parse().ok()?;
    let logical = &physical[..caps.get(0)?.start()];
    Some((logical.to_string(), version))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_pattern() {
        assert!(is_version_name("testfile.v5"));
        assert!(is_version_name("a.b.v12"));
        assert!(is_version_name(".v0"));
        assert!(!is_version_name("file.version"));
        assert!(!is_version_name("file.v"));
        assert!(!is_version_name("file.v1x"));
        assert!(!is_version_name("filev1"));
    }

    #[test]
    fn test_physical_name() {
        assert_eq!(physical_name("foo", 0), "foo");
        assert_eq!(physical_name("foo", 1), "foo.v1");
        assert_eq!(physical_name("foo", 10), "foo.v10");
    }

    #[test]
    fn test_parse_physical() {
        assert_eq!(parse_physical("foo"), Some(("foo".to_string(), 0)));
        assert_eq!(parse_physical("foo.v7"), Some(("foo".to_string(), 7)));
        assert_eq!(parse_physical("a.v1.v2"), Some(("a.v1".to_string(), 2)));
        assert_eq!(parse_physical("file.version"), Some(("file.version".to_string(), 0)));
    }

    #[test]
    fn test_parse_rejects_non_canonical() {
        assert_eq!(parse_physical("foo.v0"), None);
        assert_eq!(parse_physical("foo.v01"), None);
        assert_eq!(parse_physical("foo.v99999999999"), None);
    }
}
