/*
 * Version-control access for the examples repository. Only the handful of operations
 * the sync needs are exposed, behind `VcsOperations` so the sync state machine can be
 * exercised without a network or a `git` binary. `GitCliRepository` drives the
 * command-line client.
 */
use std::fs;
use std::io;
use std::path::Path;
use std::process::{Command, Output};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("Could not run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("'git {command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("Remote branch '{0}' was not found")]
    RemoteBranchMissing(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, VcsError>;

pub trait VcsOperations: Send + Sync {
    fn exists(&self, root: &Path) -> bool;
    fn local_head(&self, root: &Path) -> Result<String>;
    fn remote_head(&self, url: &str, branch: &str) -> Result<String>;
    fn clone_repo(&self, url: &str, branch: &str, root: &Path) -> Result<()>;
    // Fast-forward only; a diverged local copy is an error.
    fn pull(&self, root: &Path, url: &str, branch: &str) -> Result<()>;
}

pub struct GitCliRepository {
    program: String,
}

impl GitCliRepository {
    pub fn new() -> Self {
        Self::with_program("git")
    }

    pub fn with_program(program: &str) -> Self {
        GitCliRepository {
            program: program.to_string(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        log::debug!("GitCliRepository: Running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| VcsError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl Default for GitCliRepository {
    fn default() -> Self {
        Self::new()
    }
}

/*
 * Picks the commit id for `refs/heads/<branch>` out of `git ls-remote` output, which
 * is one `<sha>\t<ref>` pair per line.
 */
pub fn parse_ls_remote(stdout: &str, branch: &str) -> Option<String> {
    let wanted = format!("refs/heads/{branch}");
    stdout.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some(sha), Some(reference)) if reference == wanted => Some(sha.to_string()),
            _ => None,
        }
    })
}

impl VcsOperations for GitCliRepository {
    fn exists(&self, root: &Path) -> bool {
        root.join(".git").is_dir()
    }

    fn local_head(&self, root: &Path) -> Result<String> {
        let root_str = root.to_string_lossy();
        let output = self.run(&["-C", &root_str, "rev-parse", "HEAD"])?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn remote_head(&self, url: &str, branch: &str) -> Result<String> {
        let reference = format!("refs/heads/{branch}");
        let output = self.run(&["ls-remote", url, &reference])?;
        parse_ls_remote(&String::from_utf8_lossy(&output.stdout), branch)
            .ok_or_else(|| VcsError::RemoteBranchMissing(branch.to_string()))
    }

    fn clone_repo(&self, url: &str, branch: &str, root: &Path) -> Result<()> {
        if let Some(parent) = root.parent() {
            fs::create_dir_all(parent)?;
        }
        let root_str = root.to_string_lossy();
        self.run(&["clone", "--branch", branch, "--single-branch", url, &root_str])?;
        log::info!("GitCliRepository: Cloned {url} ({branch}) into {root:?}.");
        Ok(())
    }

    fn pull(&self, root: &Path, url: &str, branch: &str) -> Result<()> {
        let root_str = root.to_string_lossy();
        self.run(&["-C", &root_str, "pull", "--ff-only", url, branch])?;
        log::info!("GitCliRepository: Pulled {branch} into {root:?}.");
        Ok(())
    }
}
