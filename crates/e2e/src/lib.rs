//! Library E2E Harness
//!
//! Verifies a library-management application across its three layers from a
//! single scenario:
//! - Builds and sends REST requests, threading response data into later steps
//! - Drives the web UI through Playwright with a bounded wait before every action
//! - Reads created entities back from the database
//! - Asserts that the API, the UI and the database agree with what was sent
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Scenario Runner (Rust)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioRunner                                             │
//! │    ├── load_all(dir) -> [ScenarioSpec]                      │
//! │    ├── run_scenario(spec) -> ScenarioResult                 │
//! │    └── write_results(suite) -> scenario-results.json        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (one per run, owns ScenarioContext)               │
//! │    ├── TokenProvider ──► HttpTransport (reqwest)            │
//! │    ├── FixtureGenerator                                     │
//! │    ├── UiActions ──► Browser (Playwright)                   │
//! │    ├── DatabaseVerifier ──► RowSource (rusqlite)            │
//! │    └── CrossLayerVerifier: fixture == db == api == ui       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ScenarioSpec (YAML)                                        │
//! │    ├── name, tags                                           │
//! │    └── steps: api_login, random_fixture, send,              │
//! │               expect_*, ui_login, navigate, verify_created  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod cli;
pub mod config;
pub mod context;
pub mod credentials;
pub mod db;
pub mod error;
pub mod fixture;
pub mod mapping;
pub mod request;
pub mod runner;
pub mod spec;
pub mod ui;
pub mod verify;

pub use config::HarnessConfig;
pub use context::ScenarioContext;
pub use error::{E2eError, E2eResult, FailureKind, Layer, Mismatch, Mismatches};
pub use runner::{RunnerConfig, ScenarioBackends, ScenarioRunner};
pub use spec::{ScenarioSpec, Step};
pub use verify::{CrossLayerVerifier, MatchReport};
