//! Per-scenario mutable state
//!
//! A `ScenarioContext` is created when a scenario starts, threaded by `&mut`
//! through every step and dropped when the scenario ends. Nothing in it is
//! shared with other scenarios.

use std::collections::HashMap;

use tracing::debug;

use crate::auth::{TokenProvider, TOKEN_HEADER};
use crate::credentials::Credentials;
use crate::error::{E2eError, E2eResult};
use crate::fixture::Fixture;
use crate::request::{HttpTransport, Method, PendingRequest, ResponseSnapshot};

#[derive(Debug, Default)]
pub struct ScenarioContext {
    pending: PendingRequest,
    response: Option<ResponseSnapshot>,
    tokens: HashMap<Credentials, String>,
    active_token: Option<String>,
    last_path_param: Option<String>,
    fixture: Option<Fixture>,
}

impl ScenarioContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> &PendingRequest {
        &self.pending
    }

    pub fn pending_mut(&mut self) -> &mut PendingRequest {
        &mut self.pending
    }

    /// Set a path param and remember its value for later equality checks
    pub fn set_path_param(&mut self, name: &str, value: &str) {
        self.pending.set_path_param(name, value);
        self.last_path_param = Some(value.to_string());
    }

    pub fn last_path_param(&self) -> E2eResult<&str> {
        self.last_path_param
            .as_deref()
            .ok_or(E2eError::MissingContext("a path param"))
    }

    /// Execute the pending request once and keep the snapshot.
    ///
    /// The pending request is consumed; assertion steps that follow read the
    /// snapshot instead of sending again. The next request starts with the
    /// active session token already in its `x-library-token` header.
    pub async fn send(
        &mut self,
        transport: &dyn HttpTransport,
        method: Method,
        endpoint: &str,
    ) -> E2eResult<&ResponseSnapshot> {
        let request = std::mem::take(&mut self.pending);
        if let Some(token) = &self.active_token {
            self.pending.set_header(TOKEN_HEADER, token);
        }
        let response = transport.execute(method, endpoint, &request).await?;
        debug!("Captured {} response from {}", response.status, response.url);
        let response = self.response.insert(response);
        Ok(&*response)
    }

    pub fn response(&self) -> E2eResult<&ResponseSnapshot> {
        self.response
            .as_ref()
            .ok_or(E2eError::MissingContext("a response"))
    }

    /// Token for a credential pair, authenticating only on first use in
    /// this scenario. The token becomes the active one.
    pub async fn session_token(
        &mut self,
        provider: &TokenProvider,
        credentials: &Credentials,
    ) -> E2eResult<String> {
        let token = match self.tokens.get(credentials) {
            Some(token) => {
                debug!("Reusing session token for {}", credentials.email);
                token.clone()
            }
            None => {
                let token = provider.get_token(credentials).await?;
                self.tokens.insert(credentials.clone(), token.clone());
                token
            }
        };
        self.active_token = Some(token.clone());
        Ok(token)
    }

    pub fn active_token(&self) -> E2eResult<&str> {
        self.active_token
            .as_deref()
            .ok_or(E2eError::MissingContext("a session token"))
    }

    /// Active token if one was obtained; some lookups work without it
    pub fn try_active_token(&self) -> Option<&str> {
        self.active_token.as_deref()
    }

    pub fn set_fixture(&mut self, fixture: Fixture) -> &Fixture {
        self.fixture.insert(fixture)
    }

    pub fn fixture(&self) -> E2eResult<&Fixture> {
        self.fixture
            .as_ref()
            .ok_or(E2eError::MissingContext("a generated fixture"))
    }
}
