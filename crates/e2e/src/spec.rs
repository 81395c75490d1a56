//! Declarative YAML scenarios
//!
//! Step arguments arrive as plain strings; roles, fixture kinds, pages and
//! methods are parsed when the step runs so a bad value fails that step with
//! the matching error kind.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{E2eError, E2eResult};

/// A complete scenario parsed from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    /// Unique name for this scenario
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering scenarios
    #[serde(default)]
    pub tags: Vec<String>,

    /// Steps to execute in order
    pub steps: Vec<Step>,
}

/// A single step in a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Authenticate as a configured role and send the token as a header
    ApiLogin { role: String },

    /// Authenticate with explicit credentials and send the token as a header
    ApiLoginWith { email: String, password: String },

    /// Send the active token as the `token` form param
    TokenAsFormParam,

    Accept { media_type: String },

    ContentType { media_type: String },

    Header { name: String, value: String },

    PathParam { name: String, value: String },

    QueryParam { name: String, value: String },

    FormParam { name: String, value: String },

    /// Generate a fixture and add its fields as form params
    RandomFixture { kind: String },

    /// Execute the pending request
    Send { method: String, endpoint: String },

    ExpectStatus { code: u16 },

    ExpectContentType { media_type: String },

    ExpectNotNull { path: String },

    ExpectAllNotNull { paths: Vec<String> },

    /// Response field equals the last path param value
    ExpectEqualsPathParam { path: String },

    ExpectField { path: String, value: String },

    UiLogin { role: String },

    UiLoginWith { email: String, password: String },

    Navigate { page: String },

    /// Fixture vs database vs API vs UI
    VerifyCreated,

    /// Fixture vs database only
    VerifyDatabase,

    CreatedUserCanLogin,

    CreatedUserNameShown,
}

impl Step {
    /// Short label for logs and reports
    pub fn name(&self) -> String {
        match self {
            Step::ApiLogin { role } => format!("api_login:{}", role),
            Step::ApiLoginWith { email, .. } => format!("api_login_with:{}", email),
            Step::TokenAsFormParam => "token_as_form_param".to_string(),
            Step::Accept { media_type } => format!("accept:{}", media_type),
            Step::ContentType { media_type } => format!("content_type:{}", media_type),
            Step::Header { name, .. } => format!("header:{}", name),
            Step::PathParam { name, value } => format!("path_param:{}={}", name, value),
            Step::QueryParam { name, value } => format!("query_param:{}={}", name, value),
            Step::FormParam { name, .. } => format!("form_param:{}", name),
            Step::RandomFixture { kind } => format!("random_fixture:{}", kind),
            Step::Send { method, endpoint } => format!("send:{} {}", method.to_ascii_uppercase(), endpoint),
            Step::ExpectStatus { code } => format!("expect_status:{}", code),
            Step::ExpectContentType { media_type } => format!("expect_content_type:{}", media_type),
            Step::ExpectNotNull { path } => format!("expect_not_null:{}", path),
            Step::ExpectAllNotNull { paths } => format!("expect_all_not_null:{}", paths.join(",")),
            Step::ExpectEqualsPathParam { path } => format!("expect_equals_path_param:{}", path),
            Step::ExpectField { path, .. } => format!("expect_field:{}", path),
            Step::UiLogin { role } => format!("ui_login:{}", role),
            Step::UiLoginWith { email, .. } => format!("ui_login_with:{}", email),
            Step::Navigate { page } => format!("navigate:{}", page),
            Step::VerifyCreated => "verify_created".to_string(),
            Step::VerifyDatabase => "verify_database".to_string(),
            Step::CreatedUserCanLogin => "created_user_can_login".to_string(),
            Step::CreatedUserNameShown => "created_user_name_shown".to_string(),
        }
    }

    /// Whether the step drives the browser
    pub fn uses_ui(&self) -> bool {
        matches!(
            self,
            Step::UiLogin { .. }
                | Step::UiLoginWith { .. }
                | Step::Navigate { .. }
                | Step::VerifyCreated
                | Step::CreatedUserCanLogin
                | Step::CreatedUserNameShown
        )
    }
}

impl ScenarioSpec {
    /// Parse a scenario from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a scenario from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load all scenarios from a directory tree, sorted by file path
    pub fn load_all(dir: &Path) -> E2eResult<Vec<Self>> {
        let mut specs = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let spec = Self::from_file(entry.path())?;
            specs.push(spec);
        }

        Ok(specs)
    }

    /// Filter scenarios by tag
    pub fn filter_by_tag(specs: Vec<Self>, tag: &str) -> Vec<Self> {
        specs.into_iter().filter(|s| s.tags.iter().any(|t| t == tag)).collect()
    }

    /// Whether any step needs a browser session
    pub fn uses_ui(&self) -> bool {
        self.steps.iter().any(Step::uses_ui)
    }
}
