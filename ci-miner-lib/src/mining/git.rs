use super::LOG_TARGET;
use crate::Result;
use core::time::Duration;
use ohno::{IntoAppError, bail};
use std::fs;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use url::Url;

const GIT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Clone or update a local copy of a repository.
///
/// `all_branches` controls whether every remote branch is fetched or only the default one.
pub async fn get_repo(repo_path: &Path, repo_url: &Url, all_branches: bool) -> Result<()> {
    let start_time = std::time::Instant::now();

    get_repo_core(repo_path, repo_url, all_branches).await?;

    log::debug!(target: LOG_TARGET, "Prepared local repository from '{repo_url}' in {:.3}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

async fn get_repo_core(repo_path: &Path, repo_url: &Url, all_branches: bool) -> Result<()> {
    let path_str = repo_path.to_str().into_app_err("invalid UTF-8 in repository path")?;

    if !repo_path.exists() {
        if let Some(parent) = repo_path.parent() {
            fs::create_dir_all(parent).into_app_err_with(|| format!("could not create directory '{}'", parent.display()))?;
        }

        return clone_repo(path_str, repo_url, all_branches).await;
    }

    if !repo_path.join(".git").exists() {
        log::warn!(target: LOG_TARGET, "Repository path '{path_str}' exists but .git directory missing, re-cloning");
        fs::remove_dir_all(repo_path).into_app_err_with(|| format!("could not remove stale repository directory '{path_str}'"))?;
        return clone_repo(path_str, repo_url, all_branches).await;
    }

    log::info!(target: LOG_TARGET, "Updating repository '{repo_url}'");

    // --prune removes refs that no longer exist on remote
    // --force allows updating refs even if they're not fast-forward
    let output = run_git_with_timeout(&["-C", path_str, "fetch", "origin", "--prune", "--force"]).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        log::warn!(target: LOG_TARGET, "Git fetch failed ({}), removing and re-cloning", stderr.trim());
        fs::remove_dir_all(path_str).into_app_err_with(|| format!("could not remove stale repository '{path_str}'"))?;
        return clone_repo(path_str, repo_url, all_branches).await;
    }

    // Discard any local state and match the upstream of the checked-out branch
    let output = run_git_with_timeout(&["-C", path_str, "reset", "--hard", "@{upstream}"]).await?;
    check_git_output(&output, "git reset")
}

async fn clone_repo(repo_path: &str, repo_url: &Url, all_branches: bool) -> Result<()> {
    log::info!(target: LOG_TARGET, "Cloning repository '{repo_url}'");

    let mut args = vec!["clone", "--no-tags"];
    if !all_branches {
        args.push("--single-branch");
    }
    args.push(repo_url.as_str());
    args.push(repo_path);

    let output = run_git_with_timeout(&args).await?;
    check_git_output(&output, "git clone")
}

pub fn check_git_output(output: &std::process::Output, operation: &str) -> Result<()> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{operation} failed: {}", stderr.trim());
    }
    Ok(())
}

pub async fn run_git_with_timeout(args: &[&str]) -> Result<std::process::Output> {
    let child = Command::new("git")
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .into_app_err("could not spawn git command")?;

    match tokio::time::timeout(GIT_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e).into_app_err_with(|| format!("'git {}' failed to run", args.join(" "))),
        Err(_) => {
            bail!("'git {}' timed out after {} seconds", args.join(" "), GIT_TIMEOUT.as_secs());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{ExitStatus, Output};

    fn exit_status(code: i32) -> ExitStatus {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            ExitStatus::from_raw(code << 8)
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::ExitStatusExt;
            ExitStatus::from_raw(code.cast_unsigned())
        }
    }

    #[test]
    fn test_check_git_output_success() {
        let output = Output {
            status: exit_status(0),
            stdout: vec![],
            stderr: vec![],
        };

        check_git_output(&output, "git log").unwrap();
    }

    #[test]
    fn test_check_git_output_failure_includes_stderr() {
        let output = Output {
            status: exit_status(128),
            stdout: vec![],
            stderr: b"fatal: not a git repository\n".to_vec(),
        };

        let error_msg = check_git_output(&output, "git status").unwrap_err().to_string();
        assert!(error_msg.contains("git status failed"));
        assert!(error_msg.contains("not a git repository"));
    }

    #[tokio::test]
    async fn test_get_repo_clones_local_repository() {
        let source = tempfile::tempdir().unwrap();
        let source_path = source.path().to_str().unwrap();
        for args in [
            vec!["init", "-q", "-b", "main", source_path],
            vec!["-C", source_path, "-c", "user.name=T", "-c", "user.email=t@example.com", "commit", "-q", "--allow-empty", "-m", "init"],
        ] {
            let output = run_git_with_timeout(&args).await.unwrap();
            check_git_output(&output, "setup").unwrap();
        }

        let work = tempfile::tempdir().unwrap();
        let dest = work.path().join("clone");
        let url = Url::parse(&format!("file://{}", source.path().display())).unwrap();

        get_repo(&dest, &url, false).await.unwrap();
        assert!(dest.join(".git").exists());

        // A second call updates in place
        get_repo(&dest, &url, false).await.unwrap();
        assert!(dest.join(".git").exists());
    }
}
