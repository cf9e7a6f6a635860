//! Repository URL shape checks. No network access.

use std::sync::LazyLock;

use regex::Regex;

static REPO_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:www\.)?(?:github\.com|gitlab\.com|bitbucket\.org)/[\w.\-]+/[\w.\-]+?(?:\.git)?/?$",
    )
    .expect("repository url regex should compile")
});

static EMBEDDED_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"https?://(?:www\.)?(?:github\.com|gitlab\.com|bitbucket\.org)/[\w.\-]+/[\w.\-]+",
    )
    .expect("embedded url regex should compile")
});

/// True if `url` looks like a repository on a known hosting provider.
pub fn is_valid_repo_url(url: &str) -> bool {
    REPO_URL_RE.is_match(url.trim())
}

/// Find the first hosting-provider repository URL inside free text.
pub fn extract_repo_url(text: &str) -> Option<String> {
    EMBEDDED_URL_RE
        .find(text)
        .map(|m| m.as_str().trim_end_matches('.').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_hosts() {
        assert!(is_valid_repo_url("https://github.com/org/repo"));
        assert!(is_valid_repo_url("https://gitlab.com/group/project.git"));
        assert!(is_valid_repo_url("http://bitbucket.org/team/thing/"));
    }

    #[test]
    fn rejects_other_shapes() {
        assert!(!is_valid_repo_url("ftp://bad"));
        assert!(!is_valid_repo_url("https://example.com/org/repo"));
        assert!(!is_valid_repo_url("https://github.com/org"));
        assert!(!is_valid_repo_url("https://github.com/org/repo/tree/main"));
        assert!(!is_valid_repo_url(""));
    }

    #[test]
    fn extracts_url_from_sentence() {
        let found = extract_repo_url("please review https://github.com/org/my-repo. thanks");
        assert_eq!(found.as_deref(), Some("https://github.com/org/my-repo"));
    }

    #[test]
    fn extract_keeps_dotted_repo_names() {
        let found = extract_repo_url("review https://github.com/vercel/next.js please");
        assert_eq!(found.as_deref(), Some("https://github.com/vercel/next.js"));
        let found = extract_repo_url("see https://gitlab.com/group/project.git.");
        assert_eq!(found.as_deref(), Some("https://gitlab.com/group/project.git"));
        assert!(is_valid_repo_url("https://github.com/vercel/next.js"));
    }

    #[test]
    fn extract_ignores_unknown_hosts() {
        assert_eq!(extract_repo_url("review ftp://bad"), None);
    }
}
