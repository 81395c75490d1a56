//! Playwright-backed `Browser`
//!
//! Every call runs one short Node script. The session survives between
//! scripts through a storage-state file (cookies, local storage) plus the
//! current URL and the page actions performed since the last navigation,
//! which are replayed before the next action.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tempfile::TempDir;
use tokio::process::Command as TokioCommand;
use tracing::{debug, warn};

use crate::config::BrowserConfig;
use crate::error::{E2eError, E2eResult};
use crate::ui::{Browser, Locator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Engine {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Engine {
    fn as_str(&self) -> &'static str {
        match self {
            Engine::Chromium => "chromium",
            Engine::Firefox => "firefox",
            Engine::Webkit => "webkit",
        }
    }
}

impl FromStr for Engine {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Engine::Chromium),
            "firefox" => Ok(Engine::Firefox),
            "webkit" | "safari" => Ok(Engine::Webkit),
            other => Err(E2eError::Config(format!("unknown browser engine '{}'", other))),
        }
    }
}

/// One page interaction, rendered into a script body
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Goto(String),
    WaitVisible { selector: String, timeout_ms: u64 },
    Fill { selector: String, value: String },
    Click(String),
    Press { selector: String, key: String },
    Text(String),
}

impl Action {
    fn to_js(&self) -> String {
        match self {
            Action::Goto(url) => format!("await page.goto({});", js_str(url)),
            // Playwright treats timeout 0 as "no timeout"; a zero wait is a single check
            Action::WaitVisible { selector, timeout_ms: 0 } => {
                format!("value = await page.locator({}).first().isVisible();", js_str(selector))
            }
            Action::WaitVisible { selector, timeout_ms } => format!(
                "value = await page.locator({}).first().waitFor({{ state: 'visible', timeout: {} }})\n      \
                 .then(() => true)\n      \
                 .catch((e) => {{ if (e.name === 'TimeoutError') return false; throw e; }});",
                js_str(selector),
                timeout_ms
            ),
            Action::Fill { selector, value } => {
                format!("await page.locator({}).first().fill({});", js_str(selector), js_str(value))
            }
            Action::Click(selector) => format!("await page.locator({}).first().click();", js_str(selector)),
            Action::Press { selector, key } => {
                format!("await page.locator({}).first().press({});", js_str(selector), js_str(key))
            }
            Action::Text(selector) => {
                format!("value = await page.locator({}).first().innerText();", js_str(selector))
            }
        }
    }

    /// Whether the action changes page state and must be replayed
    fn mutates_page(&self) -> bool {
        matches!(self, Action::Fill { .. } | Action::Click(_) | Action::Press { .. })
    }

    /// Time the script itself is allowed to spend waiting in the page
    fn wait_budget(&self) -> Duration {
        match self {
            Action::WaitVisible { timeout_ms, .. } => Duration::from_millis(*timeout_ms),
            _ => Duration::ZERO,
        }
    }
}

/// JSON line printed by every script
#[derive(Debug, Deserialize)]
struct ScriptOutcome {
    ok: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

pub struct PlaywrightBrowser {
    engine: Engine,
    headless: bool,
    viewport_width: u32,
    viewport_height: u32,
    workdir: TempDir,
    current_url: Option<String>,
    replay: Vec<String>,
    node: PathBuf,
    node_args: Vec<String>,
    script_timeout: Duration,
}

impl PlaywrightBrowser {
    pub fn new(config: &BrowserConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;
        Self::unchecked(config)
    }

    /// Build without probing for a Playwright install
    pub fn unchecked(config: &BrowserConfig) -> E2eResult<Self> {
        Ok(Self {
            engine: config.engine.parse()?,
            headless: config.headless,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            workdir: tempfile::tempdir()?,
            current_url: None,
            replay: Vec::new(),
            node: PathBuf::from("node"),
            node_args: Vec::new(),
            script_timeout: config.script_timeout(),
        })
    }

    /// Run scripts with another interpreter; `args` go before the script path
    pub fn with_interpreter(mut self, program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.node = program.into();
        self.node_args = args;
        self
    }

    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    fn state_path(&self) -> PathBuf {
        self.workdir.path().join("storage-state.json")
    }

    fn build_script(&self, action: &Action) -> String {
        let state_path = self.state_path();
        let state = js_str(&state_path.to_string_lossy());

        let mut script = format!(
            r#"
const fs = require('fs');
const {{ {engine} }} = require('playwright');

(async () => {{
  const statePath = {state};
  const browser = await {engine}.launch({{ headless: {headless} }});
  const options = {{ viewport: {{ width: {width}, height: {height} }} }};
  if (fs.existsSync(statePath)) options.storageState = statePath;
  const context = await browser.newContext(options);
  const page = await context.newPage();
  let value = null;

  try {{
"#,
            engine = self.engine.as_str(),
            state = state,
            headless = self.headless,
            width = self.viewport_width,
            height = self.viewport_height,
        );

        if let Some(url) = &self.current_url {
            script.push_str(&format!("    await page.goto({});\n", js_str(url)));
        }
        for line in &self.replay {
            script.push_str("    ");
            script.push_str(line);
            script.push('\n');
        }

        script.push_str("    // action\n    ");
        script.push_str(&action.to_js());
        script.push('\n');

        script.push_str(
            r#"
    await context.storageState({ path: statePath });
    console.log(JSON.stringify({ ok: true, url: page.url(), value }));
  } catch (error) {
    console.log(JSON.stringify({ ok: false, url: page.url(), error: error.message }));
    process.exitCode = 1;
  } finally {
    await browser.close();
  }
})();
"#,
        );

        script
    }

    /// Run one script; the child is killed once `budget` runs out
    async fn run_script(&self, script: &str, budget: Duration) -> E2eResult<ScriptOutcome> {
        let script_path = self.workdir.path().join("step.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        let child = TokioCommand::new(&self.node)
            .args(&self.node_args)
            .arg(&script_path)
            .current_dir(self.workdir.path())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(budget, child).await {
            Ok(output) => output?,
            Err(_) => {
                warn!("Browser script exceeded {:?}; killed", budget);
                return Err(E2eError::ScriptTimeout {
                    timeout_ms: budget.as_millis() as u64,
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_outcome(&stdout) {
            Some(outcome) => Ok(outcome),
            None => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(E2eError::Browser(format!(
                    "Script produced no result:\nstdout: {}\nstderr: {}",
                    stdout, stderr
                )))
            }
        }
    }

    async fn perform(&mut self, action: Action) -> E2eResult<Value> {
        let script = self.build_script(&action);
        let budget = self.script_timeout + action.wait_budget();
        let outcome = self.run_script(&script, budget).await?;
        if !outcome.ok {
            let message = outcome.error.unwrap_or_else(|| "unknown error".to_string());
            warn!("Browser action failed: {}", message);
            return Err(E2eError::Browser(message));
        }
        self.record(&action, outcome.url);
        Ok(outcome.value)
    }

    /// Fold a successful action into the replayed session
    fn record(&mut self, action: &Action, landed_on: Option<String>) {
        match action {
            Action::Goto(url) => {
                self.current_url = Some(landed_on.unwrap_or_else(|| url.clone()));
                self.replay.clear();
            }
            _ if landed_on.is_some() && landed_on != self.current_url => {
                // the action navigated; the new page starts clean
                self.current_url = landed_on;
                self.replay.clear();
            }
            _ if action.mutates_page() => self.replay.push(action.to_js()),
            _ => {}
        }
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }
}

#[async_trait]
impl Browser for PlaywrightBrowser {
    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        self.perform(Action::Goto(url.to_string())).await.map(|_| ())
    }

    async fn wait_for_visible(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<bool> {
        let timeout_ms = timeout.as_millis() as u64;
        let outcome = self
            .perform(Action::WaitVisible {
                selector: locator.playwright_selector(),
                timeout_ms,
            })
            .await;
        match outcome {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            Err(E2eError::ScriptTimeout { .. }) => Err(E2eError::UiElementNotVisible {
                locator: locator.to_string(),
                timeout_ms,
            }),
            Err(e) => Err(e),
        }
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.perform(Action::Fill {
            selector: locator.playwright_selector(),
            value: value.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        self.perform(Action::Click(locator.playwright_selector()))
            .await
            .map(|_| ())
    }

    async fn press(&mut self, locator: &Locator, key: &str) -> E2eResult<()> {
        self.perform(Action::Press {
            selector: locator.playwright_selector(),
            key: key.to_string(),
        })
        .await
        .map(|_| ())
    }

    async fn text(&mut self, locator: &Locator) -> E2eResult<String> {
        let value = self.perform(Action::Text(locator.playwright_selector())).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

/// JavaScript string literal; JSON string syntax is valid JS
fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

/// The last JSON line of the script's stdout
fn parse_outcome(stdout: &str) -> Option<ScriptOutcome> {
    stdout
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str(line.trim()).ok())
}
