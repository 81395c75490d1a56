//! Three-way consistency check for entities created during a scenario
//!
//! The fixture is the source of truth. The created entity is fetched back
//! from the database, the API lookup endpoint and the UI, and every bound
//! field is compared. All mismatches are collected before failing so one
//! report shows every layer that disagrees.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::TOKEN_HEADER;
use crate::context::ScenarioContext;
use crate::credentials::Credentials;
use crate::db::{lookup_query, normalize, DatabaseVerifier};
use crate::error::{E2eError, E2eResult, Layer, Mismatch, Mismatches};
use crate::fixture::{EntityKind, Fixture};
use crate::mapping::{EntityProfile, FieldBinding};
use crate::request::{HttpTransport, Method, PendingRequest, APPLICATION_JSON};
use crate::ui::{Identity, NavPage, UiActions, UiField};

/// What a passing verification compared
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchReport {
    pub entity_id: String,
    pub db_fields: usize,
    pub api_fields: usize,
    pub ui_fields: usize,
}

/// Borrowed view over the components of one running scenario
pub struct CrossLayerVerifier<'a> {
    transport: &'a dyn HttpTransport,
    db: &'a mut DatabaseVerifier,
    ui: &'a mut dyn UiActions,
}

impl<'a> CrossLayerVerifier<'a> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        db: &'a mut DatabaseVerifier,
        ui: &'a mut dyn UiActions,
    ) -> Self {
        Self { transport, db, ui }
    }

    /// Fixture vs DB vs API vs UI for the entity the last response created
    pub async fn verify_created(&mut self, ctx: &ScenarioContext) -> E2eResult<MatchReport> {
        let fixture = ctx.fixture()?;
        let profile = EntityProfile::for_kind(fixture.kind());
        let expected = fixture.expected_values();
        let bindings = profile.bindings_for(&expected)?;

        let id = created_id(ctx, profile)?;
        info!("Verifying {} {} across layers", profile.kind, id);

        let mut mismatches = Mismatches::default();
        let mut report = MatchReport {
            entity_id: id.clone(),
            ..Default::default()
        };

        let (db, compared) = database_diff(&mut *self.db, profile, &id, &expected)?;
        mismatches.extend(db);
        report.db_fields = compared;

        if let Some(endpoint) = profile.api_lookup {
            let (api, compared) = self
                .check_api(endpoint, &id, ctx.try_active_token(), &bindings)
                .await?;
            mismatches.extend(api);
            report.api_fields = compared;
        }

        let (ui, compared) = self.check_ui(fixture, &bindings).await?;
        mismatches.extend(ui);
        report.ui_fields = compared;

        debug!(
            "Compared {} db, {} api, {} ui field(s); {} mismatch(es)",
            report.db_fields,
            report.api_fields,
            report.ui_fields,
            mismatches.len()
        );
        mismatches.into_result()?;
        Ok(report)
    }

    async fn check_api(
        &self,
        endpoint: &str,
        id: &str,
        token: Option<&str>,
        bindings: &[(&'static FieldBinding, &str)],
    ) -> E2eResult<(Mismatches, usize)> {
        let mut request = PendingRequest::default();
        request.set_accept_type(APPLICATION_JSON);
        request.set_path_param("id", id);
        if let Some(token) = token {
            request.set_header(TOKEN_HEADER, token);
        }

        let response = self.transport.execute(Method::Get, endpoint, &request).await?;
        let mut mismatches = Mismatches::default();
        if response.status != 200 {
            mismatches.push(Mismatch::new(
                Layer::Api,
                "status",
                "200",
                Some(response.status.to_string()),
            ));
            return Ok((mismatches, 0));
        }

        let mut compared = 0;
        for (binding, value) in bindings {
            let Some(path) = binding.api else { continue };
            compared += 1;
            let actual = response.get_string(path);
            if actual.as_deref().map(normalize) != Some(normalize(value)) {
                mismatches.push(Mismatch::new(Layer::Api, binding.field, *value, actual));
            }
        }
        Ok((mismatches, compared))
    }

    async fn check_ui(
        &mut self,
        fixture: &Fixture,
        bindings: &[(&'static FieldBinding, &str)],
    ) -> E2eResult<(Mismatches, usize)> {
        match fixture.kind() {
            EntityKind::Book => {
                let name = fixture
                    .text("name")
                    .ok_or(E2eError::MissingContext("a book name to search for"))?;
                self.ui.navigate(NavPage::Books).await?;
                self.ui.search_book(&name).await?;
            }
            EntityKind::User => {
                let credentials = fixture_credentials(fixture)?;
                self.ui.login(&Identity::Credentials(credentials)).await?;
            }
        }

        let mut mismatches = Mismatches::default();
        let mut compared = 0;
        for (binding, value) in bindings {
            let Some(field) = binding.ui else { continue };
            compared += 1;
            let actual = self.ui.read_field(field).await?;
            if normalize(&actual) != normalize(value) {
                mismatches.push(Mismatch::new(Layer::Ui, binding.field, *value, Some(actual)));
            }
        }
        Ok((mismatches, compared))
    }
}

/// Fixture vs DB only
pub fn verify_database(ctx: &ScenarioContext, db: &mut DatabaseVerifier) -> E2eResult<MatchReport> {
    let fixture = ctx.fixture()?;
    let profile = EntityProfile::for_kind(fixture.kind());
    let expected = fixture.expected_values();
    profile.check_covers(expected.keys().map(String::as_str))?;

    let id = created_id(ctx, profile)?;
    let (mismatches, compared) = database_diff(db, profile, &id, &expected)?;
    mismatches.into_result()?;
    Ok(MatchReport {
        entity_id: id,
        db_fields: compared,
        ..Default::default()
    })
}

/// Log in through the UI as the user the fixture describes
pub async fn created_user_can_login(ctx: &ScenarioContext, ui: &mut dyn UiActions) -> E2eResult<()> {
    let credentials = fixture_credentials(ctx.fixture()?)?;
    ui.login(&Identity::Credentials(credentials)).await
}

/// The navbar shows the created user's full name
pub async fn created_user_name_shown(ctx: &ScenarioContext, ui: &mut dyn UiActions) -> E2eResult<()> {
    let expected = ctx
        .fixture()?
        .text("full_name")
        .ok_or(E2eError::MissingContext("a user fixture"))?;
    let actual = ui.read_field(UiField::UserName).await?;
    if normalize(&actual) == normalize(&expected) {
        Ok(())
    } else {
        Err(E2eError::FieldMismatch(Mismatches(vec![Mismatch::new(
            Layer::Ui,
            "full_name",
            expected,
            Some(actual),
        )])))
    }
}

fn database_diff(
    db: &mut DatabaseVerifier,
    profile: &EntityProfile,
    id: &str,
    expected: &BTreeMap<String, String>,
) -> E2eResult<(Mismatches, usize)> {
    db.query(&lookup_query(profile, id))?;
    let row = db.row_at(1)?;
    let mismatches = DatabaseVerifier::diff(row, expected, profile)?;
    let compared = profile
        .bindings_for(expected)?
        .iter()
        .filter(|(b, _)| b.db.is_some())
        .count();
    Ok((mismatches, compared))
}

/// Entity id from the last response, at the first of the profile's id paths
/// that holds a value
fn created_id(ctx: &ScenarioContext, profile: &EntityProfile) -> E2eResult<String> {
    let response = ctx.response()?;
    profile
        .id_paths
        .iter()
        .find_map(|path| response.get_string(path))
        .ok_or_else(|| {
            E2eError::FieldMismatch(Mismatches(vec![Mismatch::new(
                Layer::Api,
                profile.id_paths.join(" | "),
                format!("id of the created {}", profile.kind),
                None,
            )]))
        })
}

fn fixture_credentials(fixture: &Fixture) -> E2eResult<Credentials> {
    match (fixture.text("email"), fixture.text("password")) {
        (Some(email), Some(password)) => Ok(Credentials::new(email, password)),
        _ => Err(E2eError::MissingContext("a user fixture with credentials")),
    }
}
