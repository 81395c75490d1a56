//! Random entity fixtures used as request payloads and comparison baselines

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use chrono::{Days, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Prefix carried by every generated string so test data can be filtered
/// and cleaned up later
pub const TEST_DATA_PREFIX: &str = "SN_test";

/// Password used by the fixed-credentials user variant
pub const FIXED_USER_PASSWORD: &str = "libraryUser";

const TITLE_ADJECTIVES: &[&str] = &[
    "Silent", "Crimson", "Hidden", "Last", "Broken", "Golden", "Distant", "Quiet",
    "Wandering", "Forgotten", "Burning", "Endless",
];
const TITLE_NOUNS: &[&str] = &[
    "Garden", "River", "Archive", "Empire", "Harbor", "Lantern", "Orchard", "Meridian",
    "Cathedral", "Compass", "Library", "Winter",
];
const FIRST_NAMES: &[&str] = &[
    "Ada", "Bruno", "Clara", "Dmitri", "Elena", "Farid", "Greta", "Hugo", "Ines", "Jonas",
    "Keiko", "Lars", "Mira", "Nadia", "Omar", "Priya",
];
const LAST_NAMES: &[&str] = &[
    "Abbott", "Brennan", "Castillo", "Dvorak", "Eriksen", "Fontaine", "Gallagher", "Haddad",
    "Ivanova", "Jansen", "Kowalski", "Lindqvist",
];
const STREETS: &[&str] = &[
    "Maple", "Oak", "Cedar", "Elm", "Willow", "Birch", "Chestnut", "Juniper",
];
const CITIES: &[&str] = &[
    "Springfield", "Riverton", "Fairview", "Lakeside", "Ashford", "Brookhaven",
];
const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed",
    "do", "eiusmod", "tempor", "incididunt", "labore", "magna", "aliqua",
];

/// Entity kinds the library application can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Book,
    User,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Book => "book",
            EntityKind::User => "user",
        })
    }
}

/// The two user generators in use by the scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserVariant {
    /// Every field random, including password and membership window
    Random,
    /// Random identity with a known password, librarian group and a fixed
    /// one-year membership window
    FixedCredentials,
}

/// What `generate` was asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureKind {
    Book,
    User(UserVariant),
}

impl FixtureKind {
    pub fn entity(&self) -> EntityKind {
        match self {
            FixtureKind::Book => EntityKind::Book,
            FixtureKind::User(_) => EntityKind::User,
        }
    }
}

impl FromStr for FixtureKind {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "book" => Ok(FixtureKind::Book),
            "user" => Ok(FixtureKind::User(UserVariant::Random)),
            "fixed-user" => Ok(FixtureKind::User(UserVariant::FixedCredentials)),
            _ => Err(E2eError::InvalidFixtureKind(s.to_string())),
        }
    }
}

/// A scalar fixture value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i64),
    Date(NaiveDate),
    Text(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(n) => write!(f, "{}", n),
            Scalar::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(n: i64) -> Self {
        Scalar::Int(n)
    }
}

impl From<NaiveDate> for Scalar {
    fn from(d: NaiveDate) -> Self {
        Scalar::Date(d)
    }
}

/// An entity to be created, keyed by API field name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    kind: EntityKind,
    fields: BTreeMap<String, Scalar>,
}

impl Fixture {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: &str, value: impl Into<Scalar>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: &str, value: impl Into<Scalar>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn get(&self, field: &str) -> Option<&Scalar> {
        self.fields.get(field)
    }

    /// String form of a field, as it is sent and compared
    pub fn text(&self, field: &str) -> Option<String> {
        self.fields.get(field).map(Scalar::to_string)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Field name → string value, the shape every comparison works on
    pub fn expected_values(&self) -> BTreeMap<String, String> {
        self.fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

/// Application-valid ranges for generated values
#[derive(Debug, Clone)]
pub struct FixtureBounds {
    pub year: Range<i64>,
    pub book_category_id: Range<i64>,
    pub user_group_id: Range<i64>,
    pub earliest_start: NaiveDate,
    /// Start dates are drawn from `earliest_start + [0, start_span_days)`
    pub start_span_days: u64,
    pub membership_days: Range<u64>,
}

impl Default for FixtureBounds {
    fn default() -> Self {
        Self {
            year: 2000..2024,
            book_category_id: 1..20,
            user_group_id: 1..3,
            earliest_start: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            start_span_days: 365 * 20,
            membership_days: 30..1826,
        }
    }
}

/// Produces structurally valid random entities
pub struct FixtureGenerator {
    rng: StdRng,
    bounds: FixtureBounds,
}

impl FixtureGenerator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy(), FixtureBounds::default())
    }

    /// Deterministic generator for reproducible runs
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), FixtureBounds::default())
    }

    pub fn with_rng(rng: StdRng, bounds: FixtureBounds) -> Self {
        Self { rng, bounds }
    }

    pub fn bounds(&self) -> &FixtureBounds {
        &self.bounds
    }

    /// Generate a fixture from a kind name (`book`, `user`, `fixed-user`)
    pub fn generate(&mut self, kind: &str) -> E2eResult<Fixture> {
        Ok(self.generate_kind(kind.parse()?))
    }

    pub fn generate_kind(&mut self, kind: FixtureKind) -> Fixture {
        match kind {
            FixtureKind::Book => self.book(),
            FixtureKind::User(variant) => self.user(variant),
        }
    }

    pub fn book(&mut self) -> Fixture {
        let title = format!(
            "{} The {} {} {}",
            TEST_DATA_PREFIX,
            self.pick(TITLE_ADJECTIVES),
            self.pick(TITLE_NOUNS),
            self.tag()
        );
        let author = format!("{} {}", TEST_DATA_PREFIX, self.person_name());

        Fixture::new(EntityKind::Book)
            .with("name", title)
            .with("isbn", self.isbn13())
            .with("year", self.rng.gen_range(self.bounds.year.clone()))
            .with("author", author)
            .with(
                "book_category_id",
                self.rng.gen_range(self.bounds.book_category_id.clone()),
            )
            .with("description", self.sentence(10))
    }

    pub fn user(&mut self, variant: UserVariant) -> Fixture {
        let first = self.pick(FIRST_NAMES);
        let last = self.pick(LAST_NAMES);
        let tag = self.tag();
        let full_name = format!("{} {} {}", TEST_DATA_PREFIX, first, last);
        let address = format!(
            "{} {} {} St, {}",
            TEST_DATA_PREFIX,
            self.rng.gen_range(1..1000),
            self.pick(STREETS),
            self.pick(CITIES)
        );

        let fixture = Fixture::new(EntityKind::User)
            .with("full_name", full_name)
            .with("status", "ACTIVE")
            .with("address", address);

        match variant {
            UserVariant::Random => {
                let (start, end) = self.membership_window();
                fixture
                    .with("email", format!("{}.{}.{}@library.test", first, last, tag).to_lowercase())
                    .with("password", self.password())
                    .with(
                        "user_group_id",
                        self.rng.gen_range(self.bounds.user_group_id.clone()),
                    )
                    .with("start_date", start)
                    .with("end_date", end)
            }
            UserVariant::FixedCredentials => {
                let start = NaiveDate::from_ymd_opt(2023, 3, 11).unwrap_or_default();
                let end = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap_or_default();
                fixture
                    .with("email", format!("{}{}@library", first, tag).to_lowercase())
                    .with("password", FIXED_USER_PASSWORD)
                    // group 2 is the librarian group
                    .with("user_group_id", 2i64)
                    .with("start_date", start)
                    .with("end_date", end)
            }
        }
    }

    fn pick(&mut self, words: &[&'static str]) -> &'static str {
        words.choose(&mut self.rng).copied().unwrap_or_default()
    }

    /// Short random hex tag keeping names distinct across tight loops
    fn tag(&mut self) -> String {
        format!("{:08x}", self.rng.gen::<u32>())
    }

    fn person_name(&mut self) -> String {
        format!("{} {}", self.pick(FIRST_NAMES), self.pick(LAST_NAMES))
    }

    fn sentence(&mut self, words: usize) -> String {
        let mut text = (0..words)
            .map(|_| self.pick(LOREM))
            .collect::<Vec<_>>()
            .join(" ");
        if let Some(first) = text.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        text.push('.');
        text
    }

    fn password(&mut self) -> String {
        const CHARSET: &[u8] = b"abcdefghijkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";
        (0..12)
            .map(|_| CHARSET[self.rng.gen_range(0..CHARSET.len())] as char)
            .collect()
    }

    fn isbn13(&mut self) -> String {
        let mut digits = vec![9u32, 7, 8];
        digits.extend((0..9).map(|_| self.rng.gen_range(0..10u32)));
        digits.push(isbn13_check_digit(&digits));
        digits
            .into_iter()
            .filter_map(|d| char::from_digit(d, 10))
            .collect()
    }

    fn membership_window(&mut self) -> (NaiveDate, NaiveDate) {
        let offset = self.rng.gen_range(0..self.bounds.start_span_days.max(1));
        let length = self.rng.gen_range(self.bounds.membership_days.clone());
        let start = self
            .bounds
            .earliest_start
            .checked_add_days(Days::new(offset))
            .unwrap_or(self.bounds.earliest_start);
        let end = start.checked_add_days(Days::new(length)).unwrap_or(start);
        (start, end)
    }
}

impl Default for FixtureGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Check digit over the first twelve ISBN-13 digits
fn isbn13_check_digit(digits: &[u32]) -> u32 {
    let sum: u32 = digits
        .iter()
        .take(12)
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    (10 - sum % 10) % 10
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;

    const BOOK_FIELDS: [&str; 6] = ["name", "isbn", "year", "author", "book_category_id", "description"];
    const USER_FIELDS: [&str; 8] = [
        "full_name", "email", "password", "user_group_id", "status", "start_date", "end_date", "address",
    ];

    fn int(fixture: &Fixture, field: &str) -> i64 {
        match fixture.get(field) {
            Some(Scalar::Int(n)) => *n,
            other => panic!("{} is not an integer: {:?}", field, other),
        }
    }

    fn date(fixture: &Fixture, field: &str) -> NaiveDate {
        match fixture.get(field) {
            Some(Scalar::Date(d)) => *d,
            other => panic!("{} is not a date: {:?}", field, other),
        }
    }

    #[test]
    fn test_book_values_stay_in_bounds() {
        let mut gen = FixtureGenerator::seeded(7);
        for _ in 0..500 {
            let book = gen.generate("book").unwrap();
            assert_eq!(book.kind(), EntityKind::Book);
            for field in BOOK_FIELDS {
                assert!(book.get(field).is_some(), "missing {}", field);
            }

            let year = int(&book, "year");
            assert!((2000..=2024).contains(&year), "year {} out of range", year);
            let category = int(&book, "book_category_id");
            assert!((1..20).contains(&category));

            let name = book.text("name").unwrap();
            let author = book.text("author").unwrap();
            assert!(name.starts_with(TEST_DATA_PREFIX) && name.len() > TEST_DATA_PREFIX.len());
            assert!(author.starts_with(TEST_DATA_PREFIX) && author.len() > TEST_DATA_PREFIX.len());
        }
    }

    #[test]
    fn test_book_names_do_not_collide_in_tight_loop() {
        let mut gen = FixtureGenerator::new();
        let mut names = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(names.insert(gen.generate("book").unwrap().text("name").unwrap()));
        }

        let first = gen.generate("book").unwrap();
        let second = gen.generate("book").unwrap();
        assert_ne!(first.text("name"), second.text("name"));
    }

    #[test]
    fn test_isbn_has_valid_check_digit() {
        let mut gen = FixtureGenerator::seeded(11);
        for _ in 0..100 {
            let isbn = gen.book().text("isbn").unwrap();
            assert_eq!(isbn.len(), 13);
            assert!(isbn.starts_with("978"));
            let digits: Vec<u32> = isbn.chars().filter_map(|c| c.to_digit(10)).collect();
            assert_eq!(digits.len(), 13);
            assert_eq!(isbn13_check_digit(&digits), digits[12]);
        }
    }

    #[test]
    fn test_known_isbn_check_digit() {
        // 978-0-306-40615-7
        let digits = [9, 7, 8, 0, 3, 0, 6, 4, 0, 6, 1, 5];
        assert_eq!(isbn13_check_digit(&digits), 7);
    }

    #[test]
    fn test_random_user_dates_are_ordered() {
        let mut gen = FixtureGenerator::seeded(3);
        for _ in 0..500 {
            let user = gen.generate("user").unwrap();
            for field in USER_FIELDS {
                assert!(user.get(field).is_some(), "missing {}", field);
            }
            assert!(date(&user, "start_date") <= date(&user, "end_date"));
            assert!((1..3).contains(&int(&user, "user_group_id")));
            assert!(user.text("full_name").unwrap().starts_with(TEST_DATA_PREFIX));

            let start = user.text("start_date").unwrap();
            assert!(NaiveDate::parse_from_str(&start, "%Y-%m-%d").is_ok());
        }
    }

    #[test]
    fn test_fixed_credentials_user() {
        let mut gen = FixtureGenerator::seeded(5);
        let user = gen.generate("fixed-user").unwrap();
        assert_eq!(user.text("password").as_deref(), Some(FIXED_USER_PASSWORD));
        assert_eq!(user.text("user_group_id").as_deref(), Some("2"));
        assert_eq!(user.text("status").as_deref(), Some("ACTIVE"));
        assert_eq!(user.text("start_date").as_deref(), Some("2023-03-11"));
        assert_eq!(user.text("end_date").as_deref(), Some("2024-03-11"));
        assert!(user.text("email").unwrap().ends_with("@library"));

        let other = gen.generate("fixed-user").unwrap();
        assert_ne!(user.text("email"), other.text("email"));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let mut gen = FixtureGenerator::seeded(1);
        for kind in ["unknown-kind", "null", "", "books"] {
            let err = gen.generate(kind).unwrap_err();
            assert_eq!(err.kind(), FailureKind::InvalidFixtureKind);
        }
    }

    #[test]
    fn test_seeded_generators_agree() {
        let a = FixtureGenerator::seeded(42).generate("book").unwrap();
        let b = FixtureGenerator::seeded(42).generate("book").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_scalars_render_as_sent() {
        let fixture = Fixture::new(EntityKind::User)
            .with("user_group_id", 2i64)
            .with("start_date", NaiveDate::from_ymd_opt(2000, 1, 1).unwrap())
            .with("status", "ACTIVE");
        let expected = fixture.expected_values();
        assert_eq!(expected["user_group_id"], "2");
        assert_eq!(expected["start_date"], "2000-01-01");
        assert_eq!(expected["status"], "ACTIVE");
    }
}
