use log::debug;

use super::types::{Job, JobDetail, LeafRecord, Pipeline, Workflow};
use crate::client::{ApiRoutes, CircleCiClient, Page};
use crate::error::Result;

/// Fetch all workflows of a pipeline in one shot.
///
/// The endpoint answers in page shape, but a pipeline's workflow count is
/// small enough that the first page is all there is to consume.
pub async fn fetch_workflows(
    client: &CircleCiClient,
    routes: &ApiRoutes,
    pipeline: &Pipeline,
) -> Result<Vec<Workflow>> {
    let url = routes.workflows(&pipeline.id)?;
    let page: Page<Workflow> = client.get_json(url).await?;
    Ok(page.items)
}

/// Fetch the v1.1 build detail for a job.
///
/// Jobs without a `job_number` (approval/gate steps that never executed)
/// yield `None` instead of failing; the caller counts the skip.
pub async fn fetch_job_detail(
    client: &CircleCiClient,
    routes: &ApiRoutes,
    job: &Job,
) -> Result<Option<JobDetail>> {
    let Some(job_number) = job.job_number else {
        debug!(
            "Skipping job without job_number: {}",
            job.name.as_deref().unwrap_or("<unnamed>")
        );
        return Ok(None);
    };

    let url = routes.job_detail(job_number)?;
    let detail: JobDetail = client.get_json(url).await?;
    Ok(Some(detail))
}

/// Flatten a job's nested step/action structure into leaf records.
///
/// One record per (step, action) pair, each carrying denormalized copies of
/// the job-level fields.
pub fn flatten_detail(detail: &JobDetail) -> Vec<LeafRecord> {
    detail
        .steps
        .iter()
        .flat_map(|step| step.actions.iter())
        .map(|action| LeafRecord {
            lifecycle: detail.lifecycle.clone(),
            total: detail.build_time_millis,
            job_name: detail.workflows.job_name.clone(),
            action_name: action.name.clone(),
            step_total: action.run_time_millis,
            status: action.status.clone(),
            workflow_job_id: detail.workflows.job_id.clone(),
            build_url: detail.build_url.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Token;
    use crate::config::{CircleCiConfig, CrawlConfig};
    use crate::crawl::types::{Action, Step, WorkflowInfo};
    use std::sync::Arc;

    fn detail_fixture() -> JobDetail {
        JobDetail {
            lifecycle: "finished".to_string(),
            build_time_millis: Some(9000),
            workflows: WorkflowInfo {
                job_name: "build".to_string(),
                job_id: "wf-job-1".to_string(),
            },
            build_url: "https://circleci.com/gh/acme/widgets/7".to_string(),
            steps: vec![Step {
                actions: vec![
                    Action {
                        name: "checkout".to_string(),
                        status: "success".to_string(),
                        run_time_millis: Some(150),
                    },
                    Action {
                        name: "run tests".to_string(),
                        status: "failed".to_string(),
                        run_time_millis: Some(8000),
                    },
                ],
            }],
        }
    }

    #[test]
    fn one_record_per_action_with_job_fields_carried_forward() {
        let records = flatten_detail(&detail_fixture());

        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.lifecycle, "finished");
            assert_eq!(record.total, Some(9000));
            assert_eq!(record.job_name, "build");
            assert_eq!(record.workflow_job_id, "wf-job-1");
            assert_eq!(record.build_url, "https://circleci.com/gh/acme/widgets/7");
        }
        assert_eq!(records[0].action_name, "checkout");
        assert_eq!(records[0].step_total, Some(150));
        assert_eq!(records[1].action_name, "run tests");
        assert_eq!(records[1].status, "failed");
    }

    #[test]
    fn detail_without_steps_flattens_to_nothing() {
        let mut detail = detail_fixture();
        detail.steps.clear();
        assert!(flatten_detail(&detail).is_empty());
    }

    #[tokio::test]
    async fn job_without_number_is_skipped_without_any_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/").expect(0).create_async().await;

        let config = CircleCiConfig {
            api_base_url: server.url(),
            api_v1_base_url: server.url(),
            ..CircleCiConfig::default()
        };
        let routes = ApiRoutes::new(&config, "acme", "widgets").unwrap();
        let crawl = CrawlConfig {
            max_attempts: 1,
            ..CrawlConfig::default()
        };
        let client =
            Arc::new(CircleCiClient::new(Some(&Token::from("t")), &crawl).unwrap());

        let job = Job {
            job_number: None,
            name: Some("hold".to_string()),
        };

        let result = fetch_job_detail(&client, &routes, &job).await.unwrap();
        assert!(result.is_none());
        mock.assert_async().await;
    }
}
