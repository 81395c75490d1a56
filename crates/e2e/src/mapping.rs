//! Declared field names of each entity across API, database and UI
//!
//! The three layers name the same datum differently, so every comparison
//! goes through these tables. A layer set to `None` is declared as "not
//! exposed there" and is skipped; a fixture field with no binding at all is
//! a configuration error.

use std::collections::BTreeMap;

use crate::error::{E2eError, E2eResult};
use crate::fixture::EntityKind;
use crate::ui::UiField;

/// Where one fixture field lives in each layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldBinding {
    /// Fixture / request field name
    pub field: &'static str,
    /// Path in the API lookup response
    pub api: Option<&'static str>,
    /// Column in the entity's table
    pub db: Option<&'static str>,
    /// Rendered field read back through the UI
    pub ui: Option<UiField>,
}

/// Everything the harness needs to find one entity kind in each layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityProfile {
    pub kind: EntityKind,
    pub table: &'static str,
    pub id_column: &'static str,
    /// Paths the create response may carry the new id at, first present wins
    pub id_paths: &'static [&'static str],
    /// GET endpoint returning one entity, `{id}` substituted
    pub api_lookup: Option<&'static str>,
    pub bindings: &'static [FieldBinding],
}

pub const BOOK_PROFILE: EntityProfile = EntityProfile {
    kind: EntityKind::Book,
    table: "books",
    id_column: "id",
    id_paths: &["book_id", "id"],
    api_lookup: Some("/get_book_by_id/{id}"),
    bindings: &[
        FieldBinding { field: "name", api: Some("name"), db: Some("name"), ui: Some(UiField::BookName) },
        FieldBinding { field: "isbn", api: Some("isbn"), db: Some("isbn"), ui: Some(UiField::BookIsbn) },
        FieldBinding { field: "year", api: Some("year"), db: Some("year"), ui: Some(UiField::BookYear) },
        FieldBinding { field: "author", api: Some("author"), db: Some("author"), ui: Some(UiField::BookAuthor) },
        FieldBinding {
            field: "book_category_id",
            api: Some("book_category_id"),
            db: Some("book_category_id"),
            ui: None,
        },
        FieldBinding { field: "description", api: Some("description"), db: Some("description"), ui: None },
    ],
};

pub const USER_PROFILE: EntityProfile = EntityProfile {
    kind: EntityKind::User,
    table: "users",
    id_column: "id",
    id_paths: &["user_id", "id"],
    api_lookup: Some("/get_user_by_id/{id}"),
    bindings: &[
        FieldBinding {
            field: "full_name",
            api: Some("full_name"),
            db: Some("full_name"),
            ui: Some(UiField::UserName),
        },
        FieldBinding { field: "email", api: Some("email"), db: Some("email"), ui: None },
        // stored hashed
        FieldBinding { field: "password", api: None, db: None, ui: None },
        FieldBinding {
            field: "user_group_id",
            api: Some("user_group_id"),
            db: Some("user_group_id"),
            ui: None,
        },
        FieldBinding { field: "status", api: Some("status"), db: Some("status"), ui: None },
        FieldBinding { field: "start_date", api: Some("start_date"), db: Some("start_date"), ui: None },
        FieldBinding { field: "end_date", api: Some("end_date"), db: Some("end_date"), ui: None },
        FieldBinding { field: "address", api: Some("address"), db: Some("address"), ui: None },
    ],
};

impl EntityProfile {
    pub fn for_kind(kind: EntityKind) -> &'static EntityProfile {
        match kind {
            EntityKind::Book => &BOOK_PROFILE,
            EntityKind::User => &USER_PROFILE,
        }
    }

    pub fn binding(&self, field: &str) -> Option<&'static FieldBinding> {
        self.bindings.iter().find(|b| b.field == field)
    }

    /// Fail on the first expected field that has no declared binding
    pub fn check_covers<'a>(&self, fields: impl IntoIterator<Item = &'a str>) -> E2eResult<()> {
        for field in fields {
            if self.binding(field).is_none() {
                return Err(E2eError::MissingFieldMapping {
                    scope: self.kind.to_string(),
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Bindings for the expected fields, in the order they were given
    pub fn bindings_for<'a>(
        &self,
        expected: &'a BTreeMap<String, String>,
    ) -> E2eResult<Vec<(&'static FieldBinding, &'a str)>> {
        self.check_covers(expected.keys().map(String::as_str))?;
        Ok(expected
            .iter()
            .filter_map(|(field, value)| self.binding(field).map(|b| (b, value.as_str())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use crate::fixture::FixtureGenerator;

    #[test]
    fn test_profiles_cover_every_generated_field() {
        let mut gen = FixtureGenerator::seeded(9);
        for kind in ["book", "user", "fixed-user"] {
            let fixture = gen.generate(kind).unwrap();
            let profile = EntityProfile::for_kind(fixture.kind());
            profile
                .check_covers(fixture.fields().map(|(name, _)| name))
                .unwrap();
        }
    }

    #[test]
    fn test_every_binding_is_generated() {
        let mut gen = FixtureGenerator::seeded(9);
        for kind in ["book", "user"] {
            let fixture = gen.generate(kind).unwrap();
            let profile = EntityProfile::for_kind(fixture.kind());
            for binding in profile.bindings {
                assert!(
                    fixture.get(binding.field).is_some(),
                    "{} binding '{}' is never generated",
                    kind,
                    binding.field
                );
            }
        }
    }

    #[test]
    fn test_unbound_field_is_missing_mapping() {
        let mut expected = BTreeMap::new();
        expected.insert("name".to_string(), "A".to_string());
        expected.insert("page_count".to_string(), "300".to_string());

        let err = BOOK_PROFILE.bindings_for(&expected).unwrap_err();
        assert_eq!(err.kind(), FailureKind::MissingFieldMapping);
        assert!(err.to_string().contains("page_count"));
    }

    #[test]
    fn test_id_paths_prefer_the_entity_specific_name() {
        assert_eq!(BOOK_PROFILE.id_paths, &["book_id", "id"]);
        assert_eq!(USER_PROFILE.id_paths, &["user_id", "id"]);
    }

    #[test]
    fn test_field_names_are_unique_per_profile() {
        for profile in [&BOOK_PROFILE, &USER_PROFILE] {
            let mut seen = std::collections::HashSet::new();
            for binding in profile.bindings {
                assert!(seen.insert(binding.field), "duplicate binding {}", binding.field);
            }
        }
    }
}
