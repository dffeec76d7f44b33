use serde::{Deserialize, Serialize};

/// A CircleCI pipeline, as listed by the v2 project pipeline endpoint.
///
/// Only the id is needed to expand into workflows; everything else the API
/// returns is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
    pub id: String,
}

/// A workflow within a pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Workflow {
    pub id: String,
}

/// A job within a workflow.
///
/// Approval and gate jobs never ran anywhere, so they carry no
/// `job_number`; such jobs expand into nothing.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub job_number: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

/// The v1.1 per-job build record, with its nested step/action structure.
#[derive(Debug, Clone, Deserialize)]
pub struct JobDetail {
    pub lifecycle: String,
    #[serde(default)]
    pub build_time_millis: Option<i64>,
    pub workflows: WorkflowInfo,
    pub build_url: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowInfo {
    pub job_name: String,
    pub job_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub run_time_millis: Option<i64>,
}

/// The terminal output unit: one flat record per (step, action) pair.
///
/// Every field is a denormalized copy; nothing references the upstream
/// job or workflow objects once expansion completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeafRecord {
    pub lifecycle: String,
    pub total: Option<i64>,
    pub job_name: String,
    pub action_name: String,
    pub step_total: Option<i64>,
    pub status: String,
    pub workflow_job_id: String,
    pub build_url: String,
}
