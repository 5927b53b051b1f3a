//! Cancel-in-progress concurrency groups.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::info;
use uuid::Uuid;

struct ActiveRun {
    run_id: String,
    cancel: watch::Sender<bool>,
}

/// Handed to a run when it joins its group.
#[derive(Debug)]
pub struct RunTicket {
    pub group: String,
    pub run_id: String,
    /// Flips to `true` when a newer run takes over the group.
    pub cancel: watch::Receiver<bool>,
    /// Run that this one cancelled, if any.
    pub superseded: Option<String>,
}

/// At most one active run per group; a new run cancels the old one.
#[derive(Clone, Default)]
pub struct ConcurrencyGroups {
    active: Arc<Mutex<HashMap<String, ActiveRun>>>,
}

impl ConcurrencyGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run, cancelling whatever was running in `group`.
    pub async fn begin(&self, group: &str) -> RunTicket {
        let run_id = Uuid::new_v4().to_string();
        let (tx, rx) = watch::channel(false);

        let previous = self.active.lock().await.insert(
            group.to_string(),
            ActiveRun {
                run_id: run_id.clone(),
                cancel: tx,
            },
        );

        let superseded = previous.map(|prev| {
            info!(group, "Cancelling run {} in favour of {}", prev.run_id, run_id);
            prev.cancel.send_replace(true);
            prev.run_id
        });

        RunTicket {
            group: group.to_string(),
            run_id,
            cancel: rx,
            superseded,
        }
    }

    /// Release `group` if `run_id` still owns it. Returns whether it did.
    pub async fn finish(&self, group: &str, run_id: &str) -> bool {
        let mut active = self.active.lock().await;
        if active.get(group).is_some_and(|run| run.run_id == run_id) {
            active.remove(group);
            true
        } else {
            false
        }
    }

    /// Running run id for `group`.
    pub async fn current(&self, group: &str) -> Option<String> {
        self.active.lock().await.get(group).map(|run| run.run_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_run_cancels_previous() {
        let groups = ConcurrencyGroups::new();

        let first = groups.begin("deploy-refs/heads/main").await;
        assert!(first.superseded.is_none());
        assert!(!*first.cancel.borrow());

        let second = groups.begin("deploy-refs/heads/main").await;
        assert_eq!(second.superseded.as_deref(), Some(first.run_id.as_str()));
        assert!(*first.cancel.borrow());
        assert!(!*second.cancel.borrow());
        assert_eq!(
            groups.current("deploy-refs/heads/main").await.as_deref(),
            Some(second.run_id.as_str())
        );
    }

    #[tokio::test]
    async fn test_groups_are_independent() {
        let groups = ConcurrencyGroups::new();

        let main = groups.begin("deploy-refs/heads/main").await;
        let feature = groups.begin("deploy-refs/heads/feature").await;

        assert!(feature.superseded.is_none());
        assert!(!*main.cancel.borrow());
    }

    #[tokio::test]
    async fn test_finish_only_releases_owner() {
        let groups = ConcurrencyGroups::new();
        let group = "deploy-refs/heads/main";

        let first = groups.begin(group).await;
        let second = groups.begin(group).await;

        // The superseded run finishing late must not evict its replacement.
        assert!(!groups.finish(group, &first.run_id).await);
        assert_eq!(groups.current(group).await.as_deref(), Some(second.run_id.as_str()));

        assert!(groups.finish(group, &second.run_id).await);
        assert!(groups.current(group).await.is_none());
    }
}
