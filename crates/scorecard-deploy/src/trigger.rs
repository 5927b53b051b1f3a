//! What starts a deployment, and which runs compete with each other.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Source of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// A commit landed on a branch.
    Push { git_ref: String },
    /// Someone asked for a deploy explicitly.
    Manual { git_ref: String },
}

impl Trigger {
    pub fn push(git_ref: &str) -> Self {
        Self::Push {
            git_ref: normalize_ref(git_ref),
        }
    }

    pub fn manual(git_ref: &str) -> Self {
        Self::Manual {
            git_ref: normalize_ref(git_ref),
        }
    }

    pub fn git_ref(&self) -> &str {
        match self {
            Self::Push { git_ref } | Self::Manual { git_ref } => git_ref,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Push { .. } => "push",
            Self::Manual { .. } => "manual",
        }
    }

    /// Pushes deploy only from the main branch; manual runs always deploy.
    pub fn should_deploy(&self, main_branch: &str) -> bool {
        match self {
            Self::Push { git_ref } => *git_ref == normalize_ref(main_branch),
            Self::Manual { .. } => true,
        }
    }

    pub fn concurrency_group(&self) -> String {
        concurrency_group(self.git_ref())
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {}", self.kind(), self.git_ref())
    }
}

/// Expand a bare branch name to `refs/heads/<name>`.
pub fn normalize_ref(git_ref: &str) -> String {
    let git_ref = git_ref.trim();
    if git_ref.starts_with("refs/") {
        git_ref.to_string()
    } else {
        format!("refs/heads/{}", git_ref)
    }
}

/// Runs in the same group cancel each other.
pub fn concurrency_group(git_ref: &str) -> String {
    format!("deploy-{}", normalize_ref(git_ref))
}
