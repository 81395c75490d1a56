//! Scenario runner: executes YAML scenarios step by step against the API,
//! the browser and the database

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::auth::{TokenProvider, TOKEN_HEADER};
use crate::config::HarnessConfig;
use crate::context::ScenarioContext;
use crate::credentials::{CredentialResolver, Credentials, Role};
use crate::db::{DatabaseVerifier, RowSource, SqliteSource};
use crate::error::{E2eError, E2eResult, FailureKind, Mismatch};
use crate::fixture::FixtureGenerator;
use crate::request::{HttpTransport, Method, ReqwestTransport};
use crate::spec::{ScenarioSpec, Step};
use crate::ui::{Identity, LibraryUi, NavPage, PlaywrightBrowser, UiActions};
use crate::verify::{self, CrossLayerVerifier};

/// The outbound collaborators a scenario is wired to
pub trait ScenarioBackends: Send + Sync {
    fn transport(&self) -> Arc<dyn HttpTransport>;

    fn resolver(&self) -> CredentialResolver;

    /// Opened on a scenario's first database step
    fn rows(&self) -> E2eResult<Arc<dyn RowSource>>;

    /// A fresh browser session; opened on a scenario's first UI step
    fn ui_session(&self) -> E2eResult<Box<dyn UiActions>>;

    fn generator(&self) -> FixtureGenerator {
        FixtureGenerator::new()
    }
}

/// Real API, Playwright and SQLite, all from `HarnessConfig`
pub struct LiveBackends {
    config: Arc<HarnessConfig>,
    transport: Arc<ReqwestTransport>,
}

impl LiveBackends {
    pub fn new(config: HarnessConfig) -> E2eResult<Self> {
        let transport = ReqwestTransport::new(&config.api_base_url, config.http_timeout())?;
        Ok(Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        })
    }
}

impl ScenarioBackends for LiveBackends {
    fn transport(&self) -> Arc<dyn HttpTransport> {
        self.transport.clone()
    }

    fn resolver(&self) -> CredentialResolver {
        CredentialResolver::new(self.config.clone())
    }

    fn rows(&self) -> E2eResult<Arc<dyn RowSource>> {
        let source = SqliteSource::open(&self.config.database_path, self.config.db_busy_timeout())?;
        Ok(Arc::new(source))
    }

    fn ui_session(&self) -> E2eResult<Box<dyn UiActions>> {
        let browser = PlaywrightBrowser::new(&self.config.browser)?;
        Ok(Box::new(LibraryUi::new(
            browser,
            self.resolver(),
            &self.config.ui_base_url,
            self.config.ui_wait(),
        )))
    }
}

/// State of one running scenario. Dropped when the scenario ends.
pub struct Scenario<'b> {
    backends: &'b dyn ScenarioBackends,
    ctx: ScenarioContext,
    transport: Arc<dyn HttpTransport>,
    tokens: TokenProvider,
    generator: FixtureGenerator,
    ui: Option<Box<dyn UiActions>>,
    db: Option<DatabaseVerifier>,
}

impl<'b> Scenario<'b> {
    pub fn new(backends: &'b dyn ScenarioBackends) -> Self {
        let transport = backends.transport();
        let tokens = TokenProvider::new(transport.clone(), backends.resolver());
        Self {
            backends,
            ctx: ScenarioContext::new(),
            transport,
            tokens,
            generator: backends.generator(),
            ui: None,
            db: None,
        }
    }

    pub fn context(&self) -> &ScenarioContext {
        &self.ctx
    }

    pub async fn run_step(&mut self, step: &Step) -> E2eResult<()> {
        match step {
            Step::ApiLogin { role } => {
                let credentials = self.tokens.resolver().resolve(role.parse::<Role>()?)?;
                self.api_login(&credentials).await
            }
            Step::ApiLoginWith { email, password } => {
                self.api_login(&Credentials::new(email, password)).await
            }
            Step::TokenAsFormParam => {
                let token = self.ctx.active_token()?.to_string();
                self.ctx.pending_mut().set_form_param("token", &token);
                Ok(())
            }
            Step::Accept { media_type } => {
                self.ctx.pending_mut().set_accept_type(media_type);
                Ok(())
            }
            Step::ContentType { media_type } => {
                self.ctx.pending_mut().set_content_type(media_type);
                Ok(())
            }
            Step::Header { name, value } => {
                self.ctx.pending_mut().set_header(name, value);
                Ok(())
            }
            Step::PathParam { name, value } => {
                self.ctx.set_path_param(name, value);
                Ok(())
            }
            Step::QueryParam { name, value } => {
                self.ctx.pending_mut().set_query_param(name, value);
                Ok(())
            }
            Step::FormParam { name, value } => {
                self.ctx.pending_mut().set_form_param(name, value);
                Ok(())
            }
            Step::RandomFixture { kind } => {
                let fixture = self.generator.generate(kind)?;
                for (field, value) in fixture.expected_values() {
                    self.ctx.pending_mut().set_form_param(&field, &value);
                }
                debug!("Generated {} fixture", fixture.kind());
                self.ctx.set_fixture(fixture);
                Ok(())
            }
            Step::Send { method, endpoint } => {
                let method: Method = method.parse()?;
                self.ctx.send(self.transport.as_ref(), method, endpoint).await?;
                Ok(())
            }
            Step::ExpectStatus { code } => self.ctx.response()?.expect_status(*code),
            Step::ExpectContentType { media_type } => self.ctx.response()?.expect_content_type(media_type),
            Step::ExpectNotNull { path } => self.ctx.response()?.expect_not_null([path.as_str()]),
            Step::ExpectAllNotNull { paths } => self
                .ctx
                .response()?
                .expect_not_null(paths.iter().map(String::as_str)),
            Step::ExpectEqualsPathParam { path } => {
                let expected = self.ctx.last_path_param()?;
                self.ctx.response()?.expect_field(path, expected)
            }
            Step::ExpectField { path, value } => self.ctx.response()?.expect_field(path, value),
            Step::UiLogin { role } => {
                let identity = Identity::Role(role.parse()?);
                self.ui()?.login(&identity).await
            }
            Step::UiLoginWith { email, password } => {
                let identity = Identity::Credentials(Credentials::new(email, password));
                self.ui()?.login(&identity).await
            }
            Step::Navigate { page } => {
                let page: NavPage = page.parse()?;
                self.ui()?.navigate(page).await
            }
            Step::VerifyCreated => {
                open_db(&mut self.db, self.backends)?;
                open_ui(&mut self.ui, self.backends)?;
                let (Some(db), Some(ui)) = (self.db.as_mut(), self.ui.as_deref_mut()) else {
                    return Err(E2eError::MissingContext("open UI and database sessions"));
                };
                let report = CrossLayerVerifier::new(self.transport.as_ref(), db, ui)
                    .verify_created(&self.ctx)
                    .await?;
                info!(
                    "Entity {} consistent ({} db, {} api, {} ui field(s))",
                    report.entity_id, report.db_fields, report.api_fields, report.ui_fields
                );
                Ok(())
            }
            Step::VerifyDatabase => {
                let db = open_db(&mut self.db, self.backends)?;
                let report = verify::verify_database(&self.ctx, db)?;
                info!("Entity {} matches the database ({} field(s))", report.entity_id, report.db_fields);
                Ok(())
            }
            Step::CreatedUserCanLogin => {
                let ui = open_ui(&mut self.ui, self.backends)?;
                verify::created_user_can_login(&self.ctx, ui).await
            }
            Step::CreatedUserNameShown => {
                let ui = open_ui(&mut self.ui, self.backends)?;
                verify::created_user_name_shown(&self.ctx, ui).await
            }
        }
    }

    async fn api_login(&mut self, credentials: &Credentials) -> E2eResult<()> {
        let token = self.ctx.session_token(&self.tokens, credentials).await?;
        self.ctx.pending_mut().set_header(TOKEN_HEADER, &token);
        Ok(())
    }

    fn ui(&mut self) -> E2eResult<&mut (dyn UiActions + 'static)> {
        open_ui(&mut self.ui, self.backends)
    }
}

fn open_ui<'a>(
    slot: &'a mut Option<Box<dyn UiActions>>,
    backends: &dyn ScenarioBackends,
) -> E2eResult<&'a mut (dyn UiActions + 'static)> {
    if slot.is_none() {
        *slot = Some(backends.ui_session()?);
    }
    slot.as_deref_mut()
        .ok_or(E2eError::MissingContext("a browser session"))
}

fn open_db<'a>(
    slot: &'a mut Option<DatabaseVerifier>,
    backends: &dyn ScenarioBackends,
) -> E2eResult<&'a mut DatabaseVerifier> {
    if slot.is_none() {
        *slot = Some(DatabaseVerifier::new(backends.rows()?));
    }
    slot.as_mut().ok_or(E2eError::MissingContext("a database connection"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of executing a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub kind: Option<FailureKind>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<Mismatch>,
}

impl StepResult {
    fn skipped(step: &Step) -> Self {
        Self {
            step_name: step.name(),
            status: StepStatus::Skipped,
            duration_ms: 0,
            kind: None,
            error: None,
            mismatches: Vec::new(),
        }
    }
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub kind: Option<FailureKind>,
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mismatches: Vec<Mismatch>,
}

impl ScenarioResult {
    /// The failure is a harness problem rather than a defect in the library app
    pub fn is_harness_fault(&self) -> bool {
        self.kind.map(FailureKind::is_harness_fault).unwrap_or(false)
    }
}

/// Result of running all scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub harness_faults: usize,
    pub duration_ms: u64,
    pub results: Vec<ScenarioResult>,
}

/// Configuration for the scenario runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            specs_dir: PathBuf::from("scenarios"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Main scenario runner
pub struct ScenarioRunner {
    backends: Arc<dyn ScenarioBackends>,
    specs_dir: PathBuf,
    output_dir: PathBuf,
}

impl ScenarioRunner {
    /// Runner against the live application described by `config`
    pub fn new(harness: HarnessConfig, config: RunnerConfig) -> E2eResult<Self> {
        Ok(Self::with_backends(Arc::new(LiveBackends::new(harness)?), config))
    }

    pub fn with_backends(backends: Arc<dyn ScenarioBackends>, config: RunnerConfig) -> Self {
        Self {
            backends,
            specs_dir: config.specs_dir,
            output_dir: config.output_dir,
        }
    }

    /// Run all scenarios in the specs directory
    pub async fn run_all(&self) -> E2eResult<SuiteResult> {
        let specs = ScenarioSpec::load_all(&self.specs_dir)?;
        Ok(self.run_specs(&specs).await)
    }

    /// Run scenarios matching a tag
    pub async fn run_tagged(&self, tag: &str) -> E2eResult<SuiteResult> {
        let specs = ScenarioSpec::filter_by_tag(ScenarioSpec::load_all(&self.specs_dir)?, tag);
        Ok(self.run_specs(&specs).await)
    }

    /// Run a specific scenario by name
    pub async fn run_named(&self, name: &str) -> E2eResult<ScenarioResult> {
        let specs = ScenarioSpec::load_all(&self.specs_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::Config(format!("Scenario not found: {}", name)))?;

        Ok(self.run_scenario(&spec).await)
    }

    /// Run a list of scenarios, one after another
    pub async fn run_specs(&self, specs: &[ScenarioSpec]) -> SuiteResult {
        let start = Instant::now();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;
        let mut harness_faults = 0;

        info!("Running {} scenario(s)...", specs.len());

        for spec in specs {
            let result = self.run_scenario(spec).await;
            if result.success {
                passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                failed += 1;
                if result.is_harness_fault() {
                    harness_faults += 1;
                }
                error!(
                    "✗ {} - {}",
                    result.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            results.push(result);
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Scenario Results: {} passed, {} failed ({} harness fault(s)) ({} ms)",
            passed, failed, harness_faults, duration_ms
        );

        SuiteResult {
            total: specs.len(),
            passed,
            failed,
            harness_faults,
            duration_ms,
            results,
        }
    }

    /// Run a single scenario in a fresh context
    pub async fn run_scenario(&self, spec: &ScenarioSpec) -> ScenarioResult {
        let start = Instant::now();
        debug!("Running scenario: {}", spec.name);

        let mut scenario = Scenario::new(self.backends.as_ref());
        let mut steps = Vec::with_capacity(spec.steps.len());
        let mut failure: Option<E2eError> = None;

        for step in &spec.steps {
            if failure.is_some() {
                steps.push(StepResult::skipped(step));
                continue;
            }

            let step_start = Instant::now();
            let step_name = step.name();
            debug!("Executing step: {}", step_name);
            let outcome = scenario.run_step(step).await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(()) => steps.push(StepResult {
                    step_name,
                    status: StepStatus::Passed,
                    duration_ms,
                    kind: None,
                    error: None,
                    mismatches: Vec::new(),
                }),
                Err(e) => {
                    warn!("Step {} failed: {}", step_name, e);
                    steps.push(StepResult {
                        step_name,
                        status: StepStatus::Failed,
                        duration_ms,
                        kind: Some(e.kind()),
                        error: Some(e.to_string()),
                        mismatches: mismatch_list(&e),
                    });
                    failure = Some(e);
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        ScenarioResult {
            name: spec.name.clone(),
            success: failure.is_none(),
            duration_ms,
            steps,
            kind: failure.as_ref().map(E2eError::kind),
            error: failure.as_ref().map(ToString::to_string),
            mismatches: failure.as_ref().map(mismatch_list).unwrap_or_default(),
        }
    }

    /// Write scenario results to JSON file
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        write_results(&self.output_dir, results)
    }
}

pub fn write_results(output_dir: &Path, results: &SuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(output_dir)?;

    let path = output_dir.join("scenario-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

fn mismatch_list(e: &E2eError) -> Vec<Mismatch> {
    e.mismatches().map(|m| m.0.clone()).unwrap_or_default()
}
