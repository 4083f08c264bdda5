use crate::RuntimeError;
use std::path::Path;
use std::process::Command;
use tracing::debug;

const GITHUB_HTTPS: &str = "https://github.com/";

/// Access to service source checkouts.
pub trait SourceControl: Send + Sync {
    fn name(&self) -> &str;

    /// Clone `url` into `dest`, which must not exist yet.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), RuntimeError>;

    /// Refresh remote tag references of an existing checkout without
    /// touching its working tree.
    fn fetch_tags(&self, repo: &Path) -> Result<(), RuntimeError>;
}

/// The URL to clone from. GitHub HTTPS URLs are rewritten to SSH unless
/// `use_https` is set; anything else is passed through.
pub fn clone_url(repository: &str, use_https: bool) -> String {
    if use_https {
        return repository.to_owned();
    }
    match repository.strip_prefix(GITHUB_HTTPS) {
        Some(path) => {
            let path = path.trim_end_matches('/');
            let path = path.strip_suffix(".git").unwrap_or(path);
            format!("git@github.com:{path}.git")
        }
        None => repository.to_owned(),
    }
}

/// Shells out to the `git` binary on `PATH`.
#[derive(Debug, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    fn run(args: &[&str]) -> Result<(), RuntimeError> {
        debug!("exec: git {}", args.join(" "));
        let status = Command::new("git")
            .args(args)
            .status()
            .map_err(|e| RuntimeError::Spawn {
                program: "git".to_owned(),
                source: e,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(RuntimeError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                detail: status.to_string(),
            })
        }
    }
}

impl SourceControl for GitCli {
    fn name(&self) -> &'static str {
        "git"
    }

    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), RuntimeError> {
        let dest = dest.to_string_lossy();
        Self::run(&["clone", url, &dest])
    }

    fn fetch_tags(&self, repo: &Path) -> Result<(), RuntimeError> {
        let repo = repo.to_string_lossy();
        Self::run(&["-C", &repo, "fetch", "--tags"])
    }
}
