//! Exchanging credentials for API session tokens

use std::sync::Arc;

use tracing::{debug, info};

use crate::credentials::{CredentialResolver, Credentials, Role};
use crate::error::{E2eError, E2eResult};
use crate::request::{HttpTransport, Method, PendingRequest, APPLICATION_JSON, FORM_URLENCODED};

pub const LOGIN_ENDPOINT: &str = "/login";
pub const TOKEN_FIELD: &str = "token";
/// Header the library API reads the session token from
pub const TOKEN_HEADER: &str = "x-library-token";

/// Issues one authentication call per request; never caches.
///
/// Reuse within a scenario is the job of `ScenarioContext::session_token`.
#[derive(Clone)]
pub struct TokenProvider {
    transport: Arc<dyn HttpTransport>,
    resolver: CredentialResolver,
}

impl TokenProvider {
    pub fn new(transport: Arc<dyn HttpTransport>, resolver: CredentialResolver) -> Self {
        Self { transport, resolver }
    }

    pub fn resolver(&self) -> &CredentialResolver {
        &self.resolver
    }

    pub async fn get_token(&self, credentials: &Credentials) -> E2eResult<String> {
        let mut request = PendingRequest::default();
        request.set_accept_type(APPLICATION_JSON);
        request.set_content_type(FORM_URLENCODED);
        request.set_form_param("email", &credentials.email);
        request.set_form_param("password", &credentials.password);

        info!("Authenticating {}", credentials.email);
        let response = self.transport.execute(Method::Post, LOGIN_ENDPOINT, &request).await?;

        if response.status != 200 {
            return Err(E2eError::Authentication {
                status: response.status,
                reason: format!("expected status 200 from {}", LOGIN_ENDPOINT),
            });
        }

        match response.get_string(TOKEN_FIELD) {
            Some(token) if !token.is_empty() => {
                debug!("Received token for {}", credentials.email);
                Ok(token)
            }
            _ => Err(E2eError::Authentication {
                status: response.status,
                reason: format!("response has no '{}' field", TOKEN_FIELD),
            }),
        }
    }

    pub async fn get_token_by_role(&self, role: Role) -> E2eResult<String> {
        let credentials = self.resolver.resolve(role)?;
        self.get_token(&credentials).await
    }
}
