//! Statically registered recovery workflows.

use po_protocol::issue_models::IssueType;
use po_protocol::workflow_models::Workflow;
use tracing::warn;

/// Workflows available without asking a provider.
///
/// Several workflows may target the same issue type. Lookup prefers one
/// scoped to the issue's stage over an unscoped one; among equally specific
/// workflows the most recently registered wins.
#[derive(Debug, Clone, Default)]
pub struct WorkflowRegistry {
    workflows: Vec<Workflow>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_workflows(workflows: impl IntoIterator<Item = Workflow>) -> Self {
        let mut registry = Self::new();
        for workflow in workflows {
            registry.register(workflow);
        }
        registry
    }

    /// Add a workflow, replacing any earlier one with the same name.
    ///
    /// A workflow without actions would report success without recovering
    /// anything; it is dropped and `false` returned.
    pub fn register(&mut self, workflow: Workflow) -> bool {
        if workflow.actions.is_empty() {
            warn!(workflow = %workflow.name, "Ignoring workflow with no actions");
            return false;
        }
        self.workflows.retain(|w| w.name != workflow.name);
        self.workflows.push(workflow);
        true
    }

    pub fn lookup(&self, issue_type: IssueType, stage: &str) -> Option<&Workflow> {
        let newest = |scope: Option<&str>| {
            self.workflows
                .iter()
                .rev()
                .find(|w| w.issue_type == issue_type && w.stage.as_deref() == scope)
        };

        newest(Some(stage)).or_else(|| newest(None))
    }

    pub fn workflows(&self) -> &[Workflow] {
        &self.workflows
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
