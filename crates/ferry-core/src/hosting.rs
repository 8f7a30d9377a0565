use crate::error::UpstreamError;
use crate::model::{Credential, RepoVisibility};
use std::future::Future;
use std::pin::Pin;

pub type HostingFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, UpstreamError>> + Send + 'a>>;

/// Client for the hosting REST API of a GitHub-like platform. The engine
/// only needs these four capabilities; everything else about the platform
/// stays behind the implementation.
pub trait HostingClient: Send + Sync {
    /// Repositories owned by `account`, in the order the API returns them.
    /// That order drives processing order for the whole job.
    fn list_owned_repos<'a>(
        &'a self,
        account: &'a str,
        credential: Option<&'a Credential>,
    ) -> HostingFuture<'a, Vec<String>>;

    /// Most recent commit id of the repository's default history, or
    /// `None` when the repository is empty or the lookup failed. Callers
    /// treat absence as "cannot determine, do not skip".
    fn latest_commit<'a>(
        &'a self,
        account: &'a str,
        repo: &'a str,
        credential: Option<&'a Credential>,
    ) -> HostingFuture<'a, Option<String>>;

    /// Create a repository under the credential's account. An
    /// already-exists response counts as success; a racing create is
    /// harmless.
    fn create_repo<'a>(
        &'a self,
        account: &'a str,
        name: &'a str,
        credential: &'a Credential,
        visibility: RepoVisibility,
    ) -> HostingFuture<'a, ()>;

    /// Canonical HTTPS clone URL for a repository, without credentials.
    fn clone_url(&self, account: &str, repo: &str) -> String;
}
