//! Policy name to backend path mapping.
//!
//! ```text
//! auth.user            -> policies/auth/user.rego
//! auth.user.regression -> policies/auth/user/regression.rego
//! ```
//!
//! Segments are restricted to `[A-Za-z0-9_-]`, so a name can never climb
//! out of the root (`..`, `/`, `\`) and two distinct names never share a path.

use std::path::PathBuf;

use crate::error::{LoadError, LoadResult};

/// Root segment every policy path starts with.
pub const POLICY_ROOT: &str = "policies";

/// Extension appended to the final segment.
pub const POLICY_EXTENSION: &str = "rego";

/// Map a dotted policy name to its backend-relative path (`/`-separated).
///
/// # Examples
///
/// ```
/// use regolet_loader::to_path;
///
/// assert_eq!(to_path("auth.user").unwrap(), "policies/auth/user.rego");
/// assert!(to_path("").is_err());
/// ```
pub fn to_path(name: &str) -> LoadResult<String> {
    let segments = segments(name)?;
    Ok(format!(
        "{}/{}.{}",
        POLICY_ROOT,
        segments.join("/"),
        POLICY_EXTENSION
    ))
}

/// Same mapping as [`to_path`], as a platform path for filesystem joins.
pub fn to_relative_path(name: &str) -> LoadResult<PathBuf> {
    let segments = segments(name)?;
    let mut path = PathBuf::from(POLICY_ROOT);
    if let Some((last, parents)) = segments.split_last() {
        path.extend(parents);
        path.push(format!("{}.{}", last, POLICY_EXTENSION));
    }
    Ok(path)
}

fn segments(name: &str) -> LoadResult<Vec<&str>> {
    let invalid = |reason: &str| LoadError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("policy name cannot be empty"));
    }

    let segments: Vec<&str> = name.split('.').collect();
    for segment in &segments {
        if segment.is_empty() {
            return Err(invalid("policy name cannot contain empty segments"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid(
                "policy name may only contain letters, digits, '_', '-' and '.'",
            ));
        }
    }

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_to_path_two_segments() {
        assert_eq!(to_path("auth.user").unwrap(), "policies/auth/user.rego");
    }

    #[test]
    fn test_to_path_single_segment() {
        assert_eq!(to_path("example").unwrap(), "policies/example.rego");
    }

    #[test]
    fn test_to_path_deep() {
        assert_eq!(
            to_path("auth.user.regression").unwrap(),
            "policies/auth/user/regression.rego"
        );
    }

    #[test]
    fn test_to_path_deterministic() {
        assert_eq!(to_path("a.b_c-d").unwrap(), to_path("a.b_c-d").unwrap());
    }

    #[test]
    fn test_to_path_injective() {
        let names = [
            "auth",
            "auth.user",
            "auth.users",
            "auth_user",
            "auth-user",
            "authuser",
            "auth.user.admin",
            "auth.user_admin",
            "Auth.user",
            "a.b.c.d",
            "a.bc.d",
            "ab.c.d",
        ];
        let paths: HashSet<String> = names.iter().map(|n| to_path(n).unwrap()).collect();
        assert_eq!(paths.len(), names.len());
    }

    #[test]
    fn test_to_path_empty() {
        assert!(matches!(
            to_path(""),
            Err(LoadError::InvalidName { .. })
        ));
    }

    #[test]
    fn test_to_path_empty_segments() {
        for name in [".auth", "auth.", "auth..user", "."] {
            assert!(
                matches!(to_path(name), Err(LoadError::InvalidName { .. })),
                "expected {name:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_to_path_illegal_characters() {
        for name in ["auth/user", "auth\\user", "auth user", "auth.us\0er", "ünï.code"] {
            assert!(
                matches!(to_path(name), Err(LoadError::InvalidName { .. })),
                "expected {name:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_relative_path_matches_string_path() {
        let path = to_relative_path("auth.user").unwrap();
        assert_eq!(
            path,
            PathBuf::from("policies").join("auth").join("user.rego")
        );
    }
}
