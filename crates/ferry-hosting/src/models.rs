use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct RepoItem {
    pub(crate) name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommitItem {
    pub(crate) sha: String,
}

pub(crate) fn first_commit_sha(commits: Vec<CommitItem>) -> Option<String> {
    commits.into_iter().next().map(|commit| commit.sha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repo_item_keeps_only_the_name() {
        let value = json!({
            "id": 7,
            "name": "repo",
            "clone_url": "https://github.com/me/repo.git",
            "private": true
        });
        let repo: RepoItem = serde_json::from_value(value).unwrap();
        assert_eq!(repo.name, "repo");
    }

    #[test]
    fn first_commit_sha_takes_the_most_recent() {
        let commits: Vec<CommitItem> = serde_json::from_value(json!([
            { "sha": "aaa111" },
            { "sha": "bbb222" }
        ]))
        .unwrap();
        assert_eq!(first_commit_sha(commits), Some("aaa111".to_string()));
    }

    #[test]
    fn empty_commit_list_is_absent() {
        assert_eq!(first_commit_sha(Vec::new()), None);
    }
}
