//! Command line of the live scenario runner

use std::path::PathBuf;

use clap::Parser;

use crate::config::HarnessConfig;
use crate::runner::RunnerConfig;

#[derive(Parser, Debug)]
#[command(name = "library-e2e")]
#[command(about = "Cross-layer E2E scenarios for the library application")]
pub struct RunnerArgs {
    /// Harness configuration (URLs, database, timeouts, credentials)
    #[arg(short, long, default_value = "library-e2e.toml", env = "LIBRARY_E2E_CONFIG")]
    pub config: PathBuf,

    /// Path to scenario specs directory
    #[arg(short, long, default_value = "scenarios")]
    pub specs: PathBuf,

    /// Run only scenarios matching this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Run only a specific scenario by name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Override the API base URL from the config file
    #[arg(long)]
    pub api_url: Option<String>,

    /// Override the UI base URL from the config file
    #[arg(long)]
    pub ui_url: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Output directory for results
    #[arg(short, long, default_value = "test-results")]
    pub output: PathBuf,

    /// Test filters and libtest flags forwarded by `cargo test`; ignored
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, hide = true)]
    pub passthrough: Vec<String>,
}

impl RunnerArgs {
    /// Apply the command line overrides to a loaded config
    pub fn apply(&self, harness: &mut HarnessConfig) {
        if let Some(url) = &self.api_url {
            harness.api_base_url = url.clone();
        }
        if let Some(url) = &self.ui_url {
            harness.ui_base_url = url.clone();
        }
        if self.headed {
            harness.browser.headless = false;
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            specs_dir: self.specs.clone(),
            output_dir: self.output.clone(),
        }
    }
}
