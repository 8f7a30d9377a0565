use std::path::{Path, PathBuf};

/// Local mirror location for a repository, keyed by name under the
/// working root. Deliberately not job-scoped: mirrors persist across runs
/// as a local cache.
pub fn mirror_path(root: &Path, repo: &str) -> PathBuf {
    root.join(sanitize_repo_name(repo))
}

fn sanitize_repo_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            _ => ch,
        })
        .collect();
    while sanitized.ends_with('.') || sanitized.ends_with(' ') {
        sanitized.pop();
    }
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}
