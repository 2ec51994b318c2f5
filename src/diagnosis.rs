//! Explains 401 responses. The server rejects valid keys on endpoints that
//! carry an id in the path, and drops the Authorization header when the
//! request is redirected from the bare domain, so a plain "unauthorized" is
//! rarely the whole story.

use crate::credentials::{API_KEY_ENV, CANONICAL_HOST, DEFAULT_API_BASE};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDiagnosis {
    PathParamBug(String),
    HostNamingBug(String),
    InvalidKey(String),
}

impl AuthDiagnosis {
    pub fn message(&self) -> &str {
        match self {
            AuthDiagnosis::PathParamBug(message)
            | AuthDiagnosis::HostNamingBug(message)
            | AuthDiagnosis::InvalidKey(message) => message,
        }
    }
}

impl fmt::Display for AuthDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Best-effort: an invalid key on a deep path is still reported as the
/// path-parameter defect.
pub fn diagnose_unauthorized(
    path: &str,
    base_url: &str,
    server_error: Option<&str>,
) -> AuthDiagnosis {
    if has_entity_segment(path) {
        let detail = server_error
            .map(|error| format!(" Server said: {}.", error.trim_end_matches('.')))
            .unwrap_or_default();
        return AuthDiagnosis::PathParamBug(format!(
            "Authentication failed on {}.{} This is a known server bug: endpoints with an id \
             in the path reject valid API keys with 401. Affected: comments, votes, follows \
             and subscriptions. Your key is probably fine; try again later.",
            strip_query(path),
            detail
        ));
    }

    if !base_url.contains(CANONICAL_HOST) {
        return AuthDiagnosis::HostNamingBug(format!(
            "Authentication failed against {}. Requests to hosts other than {} are redirected \
             and the redirect strips the Authorization header. Use {} as the API base.",
            base_url, CANONICAL_HOST, DEFAULT_API_BASE
        ));
    }

    AuthDiagnosis::InvalidKey(format!(
        "Invalid or missing API key. Run `moltbook auth <key>` or set {}.",
        API_KEY_ENV
    ))
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(path, _)| path)
}

/// More than one segment after the resource root, e.g. `/posts/abc/comments`.
fn has_entity_segment(path: &str) -> bool {
    strip_query(path)
        .split('/')
        .filter(|segment| !segment.is_empty())
        .count()
        > 2
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL_BASE: &str = "https://www.moltbook.com/api/v1";

    #[test]
    fn deep_path_is_the_path_parameter_bug() {
        let diagnosis =
            diagnose_unauthorized("/posts/abc123/comments", CANONICAL_BASE, Some("Unauthorized"));

        assert!(matches!(diagnosis, AuthDiagnosis::PathParamBug(_)));
        assert!(diagnosis.message().contains("/posts/abc123/comments"));
        assert!(diagnosis.message().contains("Server said: Unauthorized."));
        assert!(diagnosis.message().contains("comments, votes"));
    }

    #[test]
    fn path_parameter_bug_takes_priority_over_host() {
        let diagnosis =
            diagnose_unauthorized("/agents/clawd/follow", "https://moltbook.com/api/v1", None);

        assert!(matches!(diagnosis, AuthDiagnosis::PathParamBug(_)));
        assert!(!diagnosis.message().contains("Server said"));
    }

    #[test]
    fn bare_domain_is_the_host_naming_bug() {
        let diagnosis = diagnose_unauthorized("/posts", "https://moltbook.com/api/v1", None);

        assert!(matches!(diagnosis, AuthDiagnosis::HostNamingBug(_)));
        assert!(diagnosis.message().contains(CANONICAL_BASE));
    }

    #[test]
    fn canonical_host_with_shallow_path_is_an_invalid_key() {
        for path in ["/posts", "/posts/abc123", "/agents/me", "/feed?sort=new&limit=5"] {
            let diagnosis = diagnose_unauthorized(path, CANONICAL_BASE, Some("nope"));
            assert!(
                matches!(diagnosis, AuthDiagnosis::InvalidKey(_)),
                "{} -> {:?}",
                path,
                diagnosis
            );
        }
    }

    #[test]
    fn query_string_does_not_count_as_segments() {
        assert!(!has_entity_segment("/agents/profile?name=a/b/c"));
        assert!(has_entity_segment("/posts/1/comments?sort=top"));
    }

    #[test]
    fn display_prints_the_message() {
        let diagnosis = diagnose_unauthorized("/posts", CANONICAL_BASE, None);
        assert_eq!(diagnosis.to_string(), diagnosis.message());
    }
}
