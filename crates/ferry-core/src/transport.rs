pub mod embedded;
pub mod process;

use crate::error::TransportError;
use crate::model::Credential;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

pub use embedded::Git2Transport;
pub use process::GitCliTransport;

pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// The three physical git operations the engine needs, plus the local
/// validity check. Two variants exist: one shells out to the external git
/// client, one drives embedded libgit2. The orchestrator never knows
/// which one it holds.
pub trait MirrorTransport: Send + Sync {
    /// True only when `path` holds a structurally valid bare mirror.
    /// Stale or partial directories report false and are replaced by the
    /// next clone.
    fn has_local_mirror<'a>(&'a self, path: &'a Path) -> TransportFuture<'a, bool>;

    /// Create a bare, full-history mirror of `source_url` at `dest`.
    /// Whatever was at `dest` beforehand is removed first; a failed clone
    /// leaves nothing behind that `has_local_mirror` would accept.
    fn clone_mirror<'a>(
        &'a self,
        source_url: &'a str,
        dest: &'a Path,
        credential: Option<&'a Credential>,
    ) -> TransportFuture<'a, ()>;

    /// Fetch from every configured remote with pruning of deleted refs.
    fn update_mirror<'a>(
        &'a self,
        path: &'a Path,
        credential: Option<&'a Credential>,
    ) -> TransportFuture<'a, ()>;

    /// Ensure a "target" remote pointing at `target_url`, then force-push
    /// all branches and tags. Refs already deleted from the source are
    /// not removed from the target.
    fn push_mirror<'a>(
        &'a self,
        path: &'a Path,
        target_url: &'a str,
        credential: &'a Credential,
    ) -> TransportFuture<'a, ()>;
}

pub(crate) async fn run_blocking<T, F>(op: F) -> Result<T, TransportError>
where
    F: FnOnce() -> Result<T, TransportError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(op).await {
        Ok(result) => result,
        Err(err) => Err(TransportError::Task(err.to_string())),
    }
}
