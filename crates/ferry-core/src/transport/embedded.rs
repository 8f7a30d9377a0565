use crate::error::TransportError;
use crate::model::Credential;
use crate::transport::{MirrorTransport, TransportFuture, run_blocking};
use git2::{AutotagOption, Cred, FetchOptions, FetchPrune, PushOptions, RemoteCallbacks, Repository};
use std::fs;
use std::path::Path;
use tracing::info;

const MIRROR_REFSPEC: &str = "+refs/*:refs/*";

/// Mirror transport backed by embedded libgit2. All libgit2 calls run on
/// the blocking thread pool.
pub struct Git2Transport;

impl Git2Transport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Git2Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorTransport for Git2Transport {
    fn has_local_mirror<'a>(&'a self, path: &'a Path) -> TransportFuture<'a, bool> {
        let path = path.to_path_buf();
        Box::pin(async move {
            run_blocking(move || Ok(path.exists() && Repository::open_bare(&path).is_ok())).await
        })
    }

    fn clone_mirror<'a>(
        &'a self,
        source_url: &'a str,
        dest: &'a Path,
        credential: Option<&'a Credential>,
    ) -> TransportFuture<'a, ()> {
        let source_url = source_url.to_string();
        let dest = dest.to_path_buf();
        let credential = credential.cloned();
        Box::pin(async move {
            run_blocking(move || clone_mirror_blocking(&source_url, &dest, credential.as_ref()))
                .await
        })
    }

    fn update_mirror<'a>(
        &'a self,
        path: &'a Path,
        credential: Option<&'a Credential>,
    ) -> TransportFuture<'a, ()> {
        let path = path.to_path_buf();
        let credential = credential.cloned();
        Box::pin(
            async move { run_blocking(move || update_mirror_blocking(&path, credential.as_ref())).await },
        )
    }

    fn push_mirror<'a>(
        &'a self,
        path: &'a Path,
        target_url: &'a str,
        credential: &'a Credential,
    ) -> TransportFuture<'a, ()> {
        let path = path.to_path_buf();
        let target_url = target_url.to_string();
        let credential = credential.clone();
        Box::pin(async move {
            run_blocking(move || push_mirror_blocking(&path, &target_url, &credential)).await
        })
    }
}

fn clone_mirror_blocking(
    source_url: &str,
    dest: &Path,
    credential: Option<&Credential>,
) -> Result<(), TransportError> {
    if dest.exists() {
        // Stale or partial directory from an earlier attempt.
        fs::remove_dir_all(dest)?;
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    info!(path = %dest.display(), "cloning mirror");
    if let Err(err) = init_and_fetch(source_url, dest, credential) {
        cleanup_partial_clone(dest);
        return Err(TransportError::Clone(err.message().to_string()));
    }
    Ok(())
}

fn init_and_fetch(
    source_url: &str,
    dest: &Path,
    credential: Option<&Credential>,
) -> Result<(), git2::Error> {
    let repo = Repository::init_bare(dest)?;
    let mut config = repo.config()?;
    config.set_bool("remote.origin.mirror", true)?;
    let mut remote = repo.remote_with_fetch("origin", source_url, MIRROR_REFSPEC)?;
    let mut options = fetch_options(credential);
    remote.fetch(&[] as &[&str], Some(&mut options), None)?;
    Ok(())
}

fn cleanup_partial_clone(dest: &Path) {
    if let Err(err) = fs::remove_dir_all(dest) {
        tracing::warn!(path = %dest.display(), error = %err, "failed to remove partial clone");
    }
}

fn update_mirror_blocking(path: &Path, credential: Option<&Credential>) -> Result<(), TransportError> {
    let repo =
        Repository::open(path).map_err(|err| TransportError::Fetch(err.message().to_string()))?;
    let names = remote_names(&repo).map_err(|err| TransportError::Fetch(err.message().to_string()))?;
    info!(path = %path.display(), remotes = names.len(), "fetching mirror remotes");
    for name in &names {
        fetch_remote(&repo, name, credential)
            .map_err(|err| TransportError::Fetch(format!("remote {name}: {}", err.message())))?;
    }
    Ok(())
}

fn remote_names(repo: &Repository) -> Result<Vec<String>, git2::Error> {
    Ok(repo
        .remotes()?
        .iter()
        .flatten()
        .map(|name| name.to_string())
        .collect())
}

fn fetch_remote(
    repo: &Repository,
    name: &str,
    credential: Option<&Credential>,
) -> Result<(), git2::Error> {
    let mut remote = repo.find_remote(name)?;
    let mut options = fetch_options(credential);
    remote.fetch(&[] as &[&str], Some(&mut options), None)
}

fn push_mirror_blocking(
    path: &Path,
    target_url: &str,
    credential: &Credential,
) -> Result<(), TransportError> {
    let repo =
        Repository::open(path).map_err(|err| TransportError::Push(err.message().to_string()))?;
    ensure_target_remote(&repo, target_url)
        .map_err(|err| TransportError::Push(err.message().to_string()))?;
    let refspecs = mirror_push_refspecs(&repo)
        .map_err(|err| TransportError::Push(err.message().to_string()))?;
    if refspecs.is_empty() {
        info!(path = %path.display(), "mirror has no refs to push");
        return Ok(());
    }
    let mut remote = repo
        .find_remote("target")
        .map_err(|err| TransportError::Push(err.message().to_string()))?;
    let mut options = PushOptions::new();
    options.remote_callbacks(credential_callbacks(Some(credential)));
    remote
        .push(&refspecs, Some(&mut options))
        .map_err(|err| TransportError::Push(err.message().to_string()))?;
    Ok(())
}

fn ensure_target_remote(repo: &Repository, target_url: &str) -> Result<(), git2::Error> {
    match repo.find_remote("target") {
        Ok(remote) => {
            if remote.url().unwrap_or_default() != target_url {
                repo.remote_set_url("target", target_url)?;
            }
        }
        Err(_) => {
            repo.remote("target", target_url)?;
        }
    }
    Ok(())
}

/// Force-update refspecs for every local branch and tag. Deliberately no
/// deletion specs: refs gone from the source stay on the target.
fn mirror_push_refspecs(repo: &Repository) -> Result<Vec<String>, git2::Error> {
    let mut specs = Vec::new();
    for reference in repo.references()? {
        let reference = reference?;
        let Some(name) = reference.name() else {
            continue;
        };
        if name.starts_with("refs/heads/") || name.starts_with("refs/tags/") {
            specs.push(format!("+{name}:{name}"));
        }
    }
    Ok(specs)
}

fn fetch_options(credential: Option<&Credential>) -> FetchOptions<'static> {
    let mut options = FetchOptions::new();
    options.remote_callbacks(credential_callbacks(credential));
    options.prune(FetchPrune::On);
    options.download_tags(AutotagOption::All);
    options
}

fn credential_callbacks(credential: Option<&Credential>) -> RemoteCallbacks<'static> {
    let credential = credential.cloned();
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, _username_from_url, _allowed| {
        // Token as username with an empty password, the convention the
        // hosting platforms accept for PAT-authenticated git over HTTPS.
        match credential.as_ref() {
            Some(credential) => Cred::userpass_plaintext(credential.secret(), ""),
            None => Cred::default(),
        }
    });
    callbacks
}
