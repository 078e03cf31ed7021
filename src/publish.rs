//! Отправляет собранные артефакты в удалённый git-репозиторий через CLI `git`.

use std::path::Path;
use std::process::Output;

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("authentication to the remote failed: {0}")]
    Authentication(String),

    #[error("remote unreachable: {0}")]
    Network(String),

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub commit: String,
    pub branch: String,
    pub files_changed: usize,
}

// Только фразы удалённой стороны; локальный "Permission denied" это не ошибка авторизации.
const AUTH_MARKERS: &[&str] = &[
    "authentication failed",
    "could not read username",
    "could not read password",
    "invalid username or password",
    "the requested url returned error: 401",
    "the requested url returned error: 403",
    "permission denied (publickey",
];

const NETWORK_MARKERS: &[&str] = &[
    "could not resolve host",
    "connection refused",
    "connection timed out",
    "network is unreachable",
    "failed to connect",
    "unable to access",
];

/// Определяет вид ошибки git по его stderr.
pub fn classify_stderr(command: &str, stderr: &str) -> PublishError {
    let lower = stderr.to_lowercase();
    let message = stderr.trim().to_string();
    if AUTH_MARKERS.iter().any(|m| lower.contains(m)) {
        PublishError::Authentication(message)
    } else if NETWORK_MARKERS.iter().any(|m| lower.contains(m)) {
        PublishError::Network(message)
    } else {
        PublishError::Git {
            command: command.to_string(),
            stderr: message,
        }
    }
}

pub fn default_commit_message(now: DateTime<Local>) -> String {
    format!("Auto-commit: Updated files {}", now.format("%Y-%m-%d %H:%M:%S"))
}

async fn run_git(tree: &Path, args: &[&str]) -> Result<Output, PublishError> {
    tracing::debug!(tree = %tree.display(), ?args, "git");
    Ok(Command::new("git")
        .args(args)
        .current_dir(tree)
        .env("GIT_TERMINAL_PROMPT", "0")
        .kill_on_drop(true)
        .output()
        .await?)
}

async fn git(tree: &Path, args: &[&str]) -> Result<String, PublishError> {
    let output = run_git(tree, args).await?;
    if !output.status.success() {
        let command = args.first().copied().unwrap_or_default();
        return Err(classify_stderr(
            command,
            &String::from_utf8_lossy(&output.stderr),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Строки `status --porcelain` рабочего дерева.
pub async fn pending_changes(tree: &Path) -> Result<Vec<String>, PublishError> {
    let status = git(tree, &["status", "--porcelain"]).await?;
    Ok(status
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect())
}

async fn ensure_origin(tree: &Path, remote_url: &str) -> Result<(), PublishError> {
    let current = run_git(tree, &["remote", "get-url", "origin"]).await?;
    if !current.status.success() {
        git(tree, &["remote", "add", "origin", remote_url]).await?;
        tracing::info!(remote = remote_url, "origin added");
    } else if String::from_utf8_lossy(&current.stdout).trim() != remote_url {
        git(tree, &["remote", "set-url", "origin", remote_url]).await?;
        tracing::info!(remote = remote_url, "origin re-bound");
    }
    Ok(())
}

/// В `HEAD` есть коммиты, которых ещё нет в `branch` на `origin`, например
/// после неудачного push.
async fn unpushed_commits(tree: &Path, branch: &str) -> Result<bool, PublishError> {
    let head = run_git(tree, &["rev-parse", "--verify", "--quiet", "HEAD"]).await?;
    if !head.status.success() {
        return Ok(false);
    }
    let head = String::from_utf8_lossy(&head.stdout).trim().to_string();

    let remote_ref = format!("refs/heads/{branch}");
    let listing = git(tree, &["ls-remote", "origin", &remote_ref]).await?;
    let Some(remote_head) = listing.split_whitespace().next() else {
        return Ok(true);
    };
    if remote_head == head {
        return Ok(false);
    }
    let contained = run_git(tree, &["merge-base", "--is-ancestor", &head, remote_head]).await?;
    Ok(!contained.status.success())
}

async fn head_files(tree: &Path) -> Result<usize, PublishError> {
    let files = git(
        tree,
        &["diff-tree", "--no-commit-id", "--name-only", "-r", "--root", "HEAD"],
    )
    .await?;
    Ok(files.lines().filter(|l| !l.trim().is_empty()).count())
}

/// Коммитит всё в `tree` и отправляет в `branch` на `remote_url`.
///
/// При необходимости создаёт репозиторий и remote `origin`. Если дерево
/// чистое, повторно отправляются коммиты от прошлого неудачного push;
/// `NothingToCommit` только когда `HEAD` уже есть на remote.
pub async fn publish(
    tree: &Path,
    remote_url: &str,
    branch: &str,
    message: Option<&str>,
) -> Result<PublishOutcome, PublishError> {
    if !tree.join(".git").exists() {
        git(tree, &["init"]).await?;
        tracing::info!(tree = %tree.display(), "repository initialized");
    }
    ensure_origin(tree, remote_url).await?;

    git(tree, &["add", "--all"]).await?;
    let changes = pending_changes(tree).await?;
    let files_changed = if changes.is_empty() {
        if !unpushed_commits(tree, branch).await? {
            return Err(PublishError::NothingToCommit);
        }
        tracing::info!(branch, "working tree clean, pushing unpublished commits");
        head_files(tree).await?
    } else {
        for change in &changes {
            tracing::info!(change = %change, "pending");
        }
        let message = message
            .map(str::to_string)
            .unwrap_or_else(|| default_commit_message(Local::now()));
        git(tree, &["commit", "-m", &message]).await?;
        changes.len()
    };
    let commit = git(tree, &["rev-parse", "HEAD"]).await?.trim().to_string();

    let refspec = format!("HEAD:refs/heads/{branch}");
    git(tree, &["push", "origin", &refspec]).await?;
    tracing::info!(%commit, branch, files = files_changed, "published");

    Ok(PublishOutcome {
        commit,
        branch: branch.to_string(),
        files_changed,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_classify_stderr() {
        let auth = classify_stderr(
            "push",
            "remote: Invalid username or password.\nfatal: Authentication failed for 'https://example.com/x.git/'",
        );
        assert!(matches!(auth, PublishError::Authentication(_)));

        let net = classify_stderr(
            "push",
            "fatal: unable to access 'https://example.com/x.git/': Could not resolve host: example.com",
        );
        assert!(matches!(net, PublishError::Network(_)));

        let other = classify_stderr("commit", "error: pathspec 'x' did not match any file(s)");
        assert!(matches!(other, PublishError::Git { ref command, .. } if command == "commit"));

        let forbidden = classify_stderr(
            "push",
            "fatal: unable to access 'https://example.com/x.git/': The requested URL returned error: 403",
        );
        assert!(matches!(forbidden, PublishError::Authentication(_)));

        let ssh = classify_stderr(
            "push",
            "git@example.com: Permission denied (publickey).\nfatal: Could not read from remote repository.",
        );
        assert!(matches!(ssh, PublishError::Authentication(_)));
    }

    #[test]
    fn test_local_permission_error_is_not_auth() {
        let local = classify_stderr(
            "add",
            "fatal: Unable to create '/srv/lab/.git/index.lock': Permission denied",
        );
        assert!(matches!(local, PublishError::Git { ref command, .. } if command == "add"));
    }

    #[test]
    fn test_default_commit_message() {
        let now = Local.with_ymd_and_hms(2026, 10, 19, 9, 5, 0).unwrap();
        assert_eq!(
            default_commit_message(now),
            "Auto-commit: Updated files 2026-10-19 09:05:00"
        );
    }
}
