use crate::error::TransportError;
use crate::model::Credential;
use crate::transport::{MirrorTransport, TransportFuture};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

/// Mirror transport that shells out to the external git client.
/// Credentials travel as URL userinfo (token as username), so every error
/// string is scrubbed before it leaves this module.
pub struct GitCliTransport {
    program: PathBuf,
}

impl GitCliTransport {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    fn git(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.stdin(Stdio::null());
        command
    }
}

impl Default for GitCliTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorTransport for GitCliTransport {
    fn has_local_mirror<'a>(&'a self, path: &'a Path) -> TransportFuture<'a, bool> {
        Box::pin(async move {
            if !path.exists() {
                return Ok(false);
            }
            let mut command = self.git();
            command
                .current_dir(path)
                .arg("rev-parse")
                .arg("--is-bare-repository");
            match run(command, &[]).await {
                Ok(output) => Ok(output == "true"),
                Err(_) => Ok(false),
            }
        })
    }

    fn clone_mirror<'a>(
        &'a self,
        source_url: &'a str,
        dest: &'a Path,
        credential: Option<&'a Credential>,
    ) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            if dest.exists() {
                // Stale or partial directory from an earlier attempt.
                fs::remove_dir_all(dest)?;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            info!(path = %dest.display(), "cloning mirror");
            let url = authenticated_url(source_url, credential);
            let mut command = self.git();
            command.arg("clone").arg("--mirror").arg(&url).arg(dest);
            if let Err(message) = run(command, &secrets(credential)).await {
                if dest.exists() {
                    let _ = fs::remove_dir_all(dest);
                }
                return Err(TransportError::Clone(message));
            }
            Ok(())
        })
    }

    fn update_mirror<'a>(
        &'a self,
        path: &'a Path,
        credential: Option<&'a Credential>,
    ) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            info!(path = %path.display(), "fetching mirror remotes");
            let mut command = self.git();
            command
                .current_dir(path)
                .arg("remote")
                .arg("update")
                .arg("--prune");
            run(command, &secrets(credential))
                .await
                .map_err(TransportError::Fetch)?;
            Ok(())
        })
    }

    fn push_mirror<'a>(
        &'a self,
        path: &'a Path,
        target_url: &'a str,
        credential: &'a Credential,
    ) -> TransportFuture<'a, ()> {
        Box::pin(async move {
            let url = authenticated_url(target_url, Some(credential));
            let guarded = [credential];
            self.ensure_target_remote(path, &url, &guarded).await?;

            let mut command = self.git();
            command
                .current_dir(path)
                .arg("push")
                .arg("target")
                .arg("+refs/heads/*:refs/heads/*")
                .arg("+refs/tags/*:refs/tags/*");
            run(command, &guarded).await.map_err(TransportError::Push)?;
            Ok(())
        })
    }
}

impl GitCliTransport {
    async fn ensure_target_remote(
        &self,
        path: &Path,
        url: &str,
        guarded: &[&Credential],
    ) -> Result<(), TransportError> {
        let mut command = self.git();
        command
            .current_dir(path)
            .arg("remote")
            .arg("get-url")
            .arg("target");
        match run(command, guarded).await {
            Ok(current) if current == url => Ok(()),
            Ok(_) => {
                let mut command = self.git();
                command
                    .current_dir(path)
                    .arg("remote")
                    .arg("set-url")
                    .arg("target")
                    .arg(url);
                run(command, guarded).await.map_err(TransportError::Push)?;
                Ok(())
            }
            Err(_) => {
                let mut command = self.git();
                command
                    .current_dir(path)
                    .arg("remote")
                    .arg("add")
                    .arg("target")
                    .arg(url);
                run(command, guarded).await.map_err(TransportError::Push)?;
                Ok(())
            }
        }
    }
}

async fn run(mut command: Command, guarded: &[&Credential]) -> Result<String, String> {
    let output = command
        .output()
        .await
        .map_err(|err| format!("spawn git: {err}"))?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(redact(stderr.trim(), guarded))
    }
}

fn secrets(credential: Option<&Credential>) -> Vec<&Credential> {
    credential.into_iter().collect()
}

fn authenticated_url(url: &str, credential: Option<&Credential>) -> String {
    let Some(credential) = credential else {
        return url.to_string();
    };
    match url.split_once("://") {
        Some((scheme, rest)) => format!("{scheme}://{}@{rest}", credential.secret()),
        None => url.to_string(),
    }
}

fn redact(text: &str, guarded: &[&Credential]) -> String {
    let mut scrubbed = text.to_string();
    for credential in guarded {
        if !credential.secret().is_empty() {
            scrubbed = scrubbed.replace(credential.secret(), "***");
        }
    }
    scrubbed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authenticated_url_embeds_token_as_userinfo() {
        let credential = Credential::new("tok123");
        assert_eq!(
            authenticated_url("https://github.com/me/repo.git", Some(&credential)),
            "https://tok123@github.com/me/repo.git"
        );
    }

    #[test]
    fn authenticated_url_without_credential_is_unchanged() {
        assert_eq!(
            authenticated_url("https://github.com/me/repo.git", None),
            "https://github.com/me/repo.git"
        );
    }

    #[test]
    fn authenticated_url_leaves_schemeless_urls_alone() {
        let credential = Credential::new("tok123");
        assert_eq!(
            authenticated_url("github.com/me/repo.git", Some(&credential)),
            "github.com/me/repo.git"
        );
    }

    #[test]
    fn redact_scrubs_every_occurrence() {
        let credential = Credential::new("tok123");
        let scrubbed = redact(
            "fatal: could not read from 'https://tok123@github.com': tok123 rejected",
            &[&credential],
        );
        assert!(!scrubbed.contains("tok123"));
        assert_eq!(scrubbed.matches("***").count(), 2);
    }
}
