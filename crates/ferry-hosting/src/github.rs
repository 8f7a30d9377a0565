use crate::http::{send_with_retry, send_with_retry_allow_statuses};
use crate::models::{CommitItem, RepoItem, first_commit_sha};
use crate::paging::next_page_from_link_header;
use ferry_core::error::UpstreamError;
use ferry_core::hosting::{HostingClient, HostingFuture};
use ferry_core::model::{Credential, RepoVisibility};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::json;
use tracing::{info, warn};

const USER_AGENT: &str = "git-ferry";
const PAGE_SIZE: u32 = 100;

/// GitHub REST client. Bearer auth when a credential is supplied,
/// anonymous otherwise (public source repositories only).
pub struct GitHubClient {
    client: Client,
    api_base: String,
    clone_host: String,
}

impl GitHubClient {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self::with_endpoints(
            Client::builder().build()?,
            "https://api.github.com",
            "github.com",
        ))
    }

    pub fn with_endpoints(
        client: Client,
        api_base: impl Into<String>,
        clone_host: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into(),
            clone_host: clone_host.into(),
        }
    }

    fn get(&self, url: String, credential: Option<&Credential>) -> RequestBuilder {
        let mut builder = self.client.get(url).header("User-Agent", USER_AGENT);
        if let Some(credential) = credential {
            builder = builder.bearer_auth(credential.secret());
        }
        builder
    }

    /// The authenticated listing sees private repositories through the
    /// owner affiliation filter; the anonymous one can only enumerate the
    /// account's public repositories.
    fn repos_url(&self, account: &str, authenticated: bool, page: u32) -> String {
        if authenticated {
            format!(
                "{}/user/repos?per_page={PAGE_SIZE}&affiliation=owner&sort=updated&direction=desc&page={page}",
                self.api_base
            )
        } else {
            format!(
                "{}/users/{account}/repos?per_page={PAGE_SIZE}&type=owner&sort=updated&direction=desc&page={page}",
                self.api_base
            )
        }
    }

    async fn fetch_repos_page(
        &self,
        account: &str,
        credential: Option<&Credential>,
        page: u32,
    ) -> Result<(Vec<RepoItem>, Option<u32>), UpstreamError> {
        let url = self.repos_url(account, credential.is_some(), page);
        let builder = self.get(url, credential);
        let response = send_with_retry(|| clone_builder(&builder)).await?;
        let next_page = next_page_from_link_header(response.headers());
        let payload: Vec<RepoItem> = response
            .json()
            .await
            .map_err(|err| UpstreamError::Payload(err.to_string()))?;
        Ok((payload, next_page))
    }
}

impl HostingClient for GitHubClient {
    fn list_owned_repos<'a>(
        &'a self,
        account: &'a str,
        credential: Option<&'a Credential>,
    ) -> HostingFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut page = 1;
            let mut names = Vec::new();
            loop {
                let (repos, next_page) = self.fetch_repos_page(account, credential, page).await?;
                names.extend(repos.into_iter().map(|repo| repo.name));
                match next_page {
                    Some(next) => page = next,
                    None => break,
                }
            }
            info!(account = %account, count = names.len(), "listed owned repositories");
            Ok(names)
        })
    }

    fn latest_commit<'a>(
        &'a self,
        account: &'a str,
        repo: &'a str,
        credential: Option<&'a Credential>,
    ) -> HostingFuture<'a, Option<String>> {
        Box::pin(async move {
            let url = format!("{}/repos/{account}/{repo}/commits?per_page=1", self.api_base);
            let builder = self.get(url, credential);
            // Empty repositories answer 409 and deleted ones 404; every
            // failure degrades to absent so the caller syncs instead of
            // skipping.
            let response = match send_with_retry(|| clone_builder(&builder)).await {
                Ok(response) => response,
                Err(err) => {
                    warn!(account = %account, repo = %repo, error = %err, "could not get latest commit");
                    return Ok(None);
                }
            };
            let commits: Vec<CommitItem> = match response.json().await {
                Ok(commits) => commits,
                Err(err) => {
                    warn!(account = %account, repo = %repo, error = %err, "could not decode latest commit");
                    return Ok(None);
                }
            };
            Ok(first_commit_sha(commits))
        })
    }

    fn create_repo<'a>(
        &'a self,
        _account: &'a str,
        name: &'a str,
        credential: &'a Credential,
        visibility: RepoVisibility,
    ) -> HostingFuture<'a, ()> {
        Box::pin(async move {
            let builder = self
                .client
                .post(format!("{}/user/repos", self.api_base))
                .header("User-Agent", USER_AGENT)
                .bearer_auth(credential.secret())
                .json(&create_payload(name, visibility));
            let response = send_with_retry_allow_statuses(
                || clone_builder(&builder),
                &[StatusCode::UNPROCESSABLE_ENTITY],
            )
            .await?;
            if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
                // Already exists: a racing create is harmless.
                info!(repo = %name, "repository already exists in target account");
            }
            let _ = response.bytes().await;
            Ok(())
        })
    }

    fn clone_url(&self, account: &str, repo: &str) -> String {
        format!("https://{}/{account}/{repo}.git", self.clone_host)
    }
}

fn clone_builder(builder: &RequestBuilder) -> Result<RequestBuilder, UpstreamError> {
    builder
        .try_clone()
        .ok_or_else(|| UpstreamError::Request("clone request".to_string()))
}

fn create_payload(name: &str, visibility: RepoVisibility) -> serde_json::Value {
    json!({ "name": name, "private": visibility.is_private() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GitHubClient {
        GitHubClient::with_endpoints(Client::new(), "https://api.github.com", "github.com")
    }

    #[test]
    fn authenticated_listing_uses_owner_affiliation() {
        let url = client().repos_url("me", true, 2);
        assert!(url.starts_with("https://api.github.com/user/repos?"));
        assert!(url.contains("affiliation=owner"));
        assert!(url.contains("page=2"));
    }

    #[test]
    fn anonymous_listing_targets_the_account() {
        let url = client().repos_url("me", false, 1);
        assert!(url.starts_with("https://api.github.com/users/me/repos?"));
        assert!(url.contains("type=owner"));
    }

    #[test]
    fn clone_url_is_credential_free() {
        let url = client().clone_url("me", "repo");
        assert_eq!(url, "https://github.com/me/repo.git");
    }

    #[test]
    fn create_payload_maps_visibility() {
        let private = create_payload("repo", RepoVisibility::Private);
        assert_eq!(private["private"], true);
        let public = create_payload("repo", RepoVisibility::Public);
        assert_eq!(public["private"], false);
        assert_eq!(public["name"], "repo");
    }
}
