//! The `github-actions` CI provider.
//!
//! Renders a deploy workflow for GitHub Actions from the provider payload.
//! The rendering is deterministic: fixed key order, jobs and steps emitted
//! in pipeline order.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

use super::{CiProvider, Provider, ProviderPayload};

const GITHUB_ID: &str = "github-actions";

/// Payload schema for the `github-actions` provider.
#[derive(Debug, Clone, Deserialize)]
pub struct GithubCiConfig {
    /// Branch that triggers the deploy workflow.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Runner label.
    #[serde(default = "default_runner")]
    pub runs_on: String,

    /// Environment passed to `stagecraft deploy`.
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_runner() -> String {
    "ubuntu-latest".to_string()
}

fn default_environment() -> String {
    "staging".to_string()
}

impl Default for GithubCiConfig {
    fn default() -> Self {
        Self {
            branch: default_branch(),
            runs_on: default_runner(),
            environment: default_environment(),
        }
    }
}

#[derive(Debug, Serialize)]
struct Workflow {
    name: String,
    on: Trigger,
    jobs: Jobs,
}

#[derive(Debug, Serialize)]
struct Trigger {
    push: Branches,
}

#[derive(Debug, Serialize)]
struct Branches {
    branches: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Jobs {
    deploy: Job,
}

#[derive(Debug, Serialize)]
struct Job {
    #[serde(rename = "runs-on")]
    runs_on: String,
    steps: Vec<Step>,
}

#[derive(Debug, Serialize)]
struct Step {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    uses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run: Option<String>,
}

#[derive(Debug)]
pub struct GithubActions;

impl Provider for GithubActions {
    fn id(&self) -> &'static str {
        GITHUB_ID
    }
}

impl CiProvider for GithubActions {
    fn render_pipeline(&self, config: &ProviderPayload) -> Result<String, ProviderError> {
        let parsed: GithubCiConfig = config.parse(GITHUB_ID)?;

        let workflow = Workflow {
            name: "deploy".to_string(),
            on: Trigger {
                push: Branches {
                    branches: vec![parsed.branch],
                },
            },
            jobs: Jobs {
                deploy: Job {
                    runs_on: parsed.runs_on,
                    steps: vec![
                        Step {
                            name: "Checkout".to_string(),
                            uses: Some("actions/checkout@v4".to_string()),
                            run: None,
                        },
                        Step {
                            name: "Deploy".to_string(),
                            uses: None,
                            run: Some(format!(
                                "stagecraft deploy --env={} --commit=$GITHUB_SHA",
                                parsed.environment
                            )),
                        },
                    ],
                },
            },
        };

        serde_yaml::to_string(&workflow).map_err(|e| ProviderError::Failed {
            capability: "ci".to_string(),
            id: GITHUB_ID.to_string(),
            message: e.to_string(),
        })
    }
}
