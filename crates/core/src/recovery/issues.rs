//! Registry of active and resolved issues for one run.

use chrono::Utc;
use po_protocol::issue_models::{Issue, IssueType, Severity};
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Active and resolved issues, keyed by issue id.
///
/// Detecting the same issue type on the same stage while an earlier issue is
/// still active updates that issue instead of creating a new one.
#[derive(Debug, Default)]
pub struct IssueRegistry {
    active: BTreeMap<String, Issue>,
    resolved: BTreeMap<String, Issue>,
    registered: u64,
}

impl IssueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a detection. Returns the issue and whether it is new.
    pub fn register(
        &mut self,
        issue_type: IssueType,
        stage: &str,
        severity: Severity,
        message: impl Into<String>,
    ) -> (Issue, bool) {
        let now = Utc::now();
        let message = message.into();

        if let Some(existing) = self
            .active
            .values_mut()
            .find(|issue| issue.issue_type == issue_type && issue.stage == stage)
        {
            existing.last_seen = now;
            existing.occurrences += 1;
            existing.message = message;
            existing.severity = existing.severity.max(severity);
            debug!(
                issue_id = %existing.id,
                occurrences = existing.occurrences,
                "Repeated issue detection"
            );
            return (existing.clone(), false);
        }

        let issue = Issue {
            id: Uuid::new_v4().to_string(),
            issue_type,
            stage: stage.to_string(),
            severity,
            message,
            first_seen: now,
            last_seen: now,
            occurrences: 1,
        };
        info!(
            issue_id = %issue.id,
            issue_type = %issue_type,
            stage = %stage,
            "Issue registered"
        );
        self.registered += 1;
        self.active.insert(issue.id.clone(), issue.clone());
        (issue, true)
    }

    /// Re-insert an issue that was active when a checkpoint was taken.
    pub fn restore_active(&mut self, issue: Issue) {
        self.active.insert(issue.id.clone(), issue);
    }

    /// Move an issue to the resolved set. Returns it if it was active.
    pub fn resolve(&mut self, id: &str) -> Option<Issue> {
        let issue = self.active.remove(id)?;
        info!(issue_id = %id, "Issue resolved");
        self.resolved.insert(issue.id.clone(), issue.clone());
        Some(issue)
    }

    pub fn get(&self, id: &str) -> Option<&Issue> {
        self.active.get(id)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    /// Active issues ordered by first detection.
    pub fn active(&self) -> Vec<Issue> {
        let mut issues: Vec<Issue> = self.active.values().cloned().collect();
        issues.sort_by_key(|issue| issue.first_seen);
        issues
    }

    pub fn active_ids(&self) -> Vec<String> {
        self.active().into_iter().map(|issue| issue.id).collect()
    }

    pub fn resolved(&self) -> Vec<Issue> {
        self.resolved.values().cloned().collect()
    }

    pub fn registered_count(&self) -> u64 {
        self.registered
    }

    pub fn resolved_count(&self) -> u64 {
        self.resolved.len() as u64
    }

    pub fn active_count(&self) -> u64 {
        self.active.len() as u64
    }
}
