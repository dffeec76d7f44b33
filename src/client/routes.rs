use url::Url;

use crate::config::CircleCiConfig;
use crate::error::{CiStreamError, Result};

/// Endpoint URLs for one crawled project.
///
/// Pipelines, workflows and jobs live on the v2 API; per-job build details
/// only exist on v1.1.
#[derive(Debug, Clone)]
pub struct ApiRoutes {
    v2: Url,
    v1: Url,
    vcs: String,
    org: String,
    repo: String,
}

impl ApiRoutes {
    pub fn new(config: &CircleCiConfig, org: &str, repo: &str) -> Result<Self> {
        Ok(Self {
            v2: parse_base(&config.api_base_url)?,
            v1: parse_base(&config.api_v1_base_url)?,
            vcs: config.vcs.clone(),
            org: org.to_owned(),
            repo: repo.to_owned(),
        })
    }

    /// Paginated pipeline listing for the project.
    pub fn pipelines(&self) -> Result<Url> {
        self.join_v2(&format!(
            "project/{}/{}/{}/pipeline",
            self.vcs, self.org, self.repo
        ))
    }

    /// One-shot workflow listing for a pipeline.
    pub fn workflows(&self, pipeline_id: &str) -> Result<Url> {
        self.join_v2(&format!("pipeline/{pipeline_id}/workflow"))
    }

    /// Paginated job listing for a workflow.
    pub fn jobs(&self, workflow_id: &str) -> Result<Url> {
        self.join_v2(&format!("workflow/{workflow_id}/job"))
    }

    /// v1.1 build detail for a numbered job.
    pub fn job_detail(&self, job_number: u64) -> Result<Url> {
        self.v1
            .join(&format!(
                "project/{}/{}/{}/{job_number}",
                self.vcs, self.org, self.repo
            ))
            .map_err(|e| CiStreamError::Config(format!("Invalid job detail URL: {e}")))
    }

    fn join_v2(&self, path: &str) -> Result<Url> {
        self.v2
            .join(path)
            .map_err(|e| CiStreamError::Config(format!("Invalid API URL: {e}")))
    }
}

/// Parse a base URL, normalizing to a trailing slash so joins append
/// instead of replacing the last path segment.
fn parse_base(base: &str) -> Result<Url> {
    let normalized = if base.ends_with('/') {
        base.to_owned()
    } else {
        format!("{base}/")
    };

    Url::parse(&normalized).map_err(|e| CiStreamError::Config(format!("Invalid base URL: {e}")))
}
