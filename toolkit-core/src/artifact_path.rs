//! Artifact path scheme: maps an (app, user, session,
//! filename) tuple to the storage key a pluggable artifact backend persists
//! under. A filename prefixed with `"user:"` is treated as user-scoped and
//! stored outside any one session.

/// Builds the storage path for a session-scoped artifact, or a user-scoped
/// one when `filename` starts with `"user:"`. `version`, when present, is
/// appended as a final path segment.
pub fn build_artifact_path(
    app: &str,
    user: &str,
    session: &str,
    filename: &str,
    version: Option<&str>,
) -> String {
    let mut path = if let Some(stripped) = filename.strip_prefix("user:") {
        format!("{app}/{user}/user/{stripped}")
    } else {
        format!("{app}/{user}/{session}/{filename}")
    };
    if let Some(v) = version {
        path.push('/');
        path.push_str(v);
    }
    path
}

/// True when `filename` refers to a user-scoped artifact rather than a
/// session-scoped one.
pub fn is_user_scoped(filename: &str) -> bool {
    filename.starts_with("user:")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_scoped_path() {
        let path = build_artifact_path("app", "u1", "sess1", "report.pdf", None);
        assert_eq!(path, "app/u1/sess1/report.pdf");
    }

    #[test]
    fn session_scoped_path_with_version() {
        let path = build_artifact_path("app", "u1", "sess1", "report.pdf", Some("3"));
        assert_eq!(path, "app/u1/sess1/report.pdf/3");
    }

    #[test]
    fn user_scoped_path_omits_session_segment() {
        let path = build_artifact_path("app", "u1", "sess1", "user:avatar.png", None);
        assert_eq!(path, "app/u1/user/avatar.png");
    }

    #[test]
    fn user_scoped_detection() {
        assert!(is_user_scoped("user:avatar.png"));
        assert!(!is_user_scoped("report.pdf"));
    }
}
