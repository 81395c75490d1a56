//! Shared fixtures for the integration tests: a scripted library web app
//! behind the `Browser` trait, a file-backed SQLite database and backends
//! wired to a mockito API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tempfile::TempDir;

use library_e2e::credentials::CredentialResolver;
use library_e2e::db::{RowSource, SqliteSource};
use library_e2e::fixture::{Fixture, FixtureGenerator};
use library_e2e::request::{HttpTransport, ReqwestTransport};
use library_e2e::ui::{Browser, BooksPage, LibraryUi, Locator, LoginPage, Navbar, UiActions};
use library_e2e::{E2eError, E2eResult, ScenarioBackends};

pub const LIBRARIAN_EMAIL: &str = "librarian7@library";
pub const LIBRARIAN_PASSWORD: &str = "libpass";
pub const LIBRARIAN_NAME: &str = "Test Librarian 7";

const SCHEMA: &str = r#"
CREATE TABLE books (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    isbn TEXT,
    year INTEGER,
    author TEXT,
    book_category_id INTEGER,
    description TEXT
);
CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    full_name TEXT NOT NULL,
    email TEXT NOT NULL,
    password TEXT NOT NULL,
    user_group_id INTEGER,
    status TEXT,
    start_date TEXT,
    end_date TEXT,
    address TEXT
);
"#;

/// A library database in a temp directory
pub struct LibraryDb {
    _dir: TempDir,
    pub path: PathBuf,
}

impl LibraryDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("library.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(SCHEMA).unwrap();
        conn.execute(
            "INSERT INTO users (id, full_name, email, password, user_group_id, status) VALUES (1, ?1, ?2, ?3, 2, 'ACTIVE')",
            params![LIBRARIAN_NAME, LIBRARIAN_EMAIL, LIBRARIAN_PASSWORD],
        )
        .unwrap();
        Self { _dir: dir, path }
    }

    fn conn(&self) -> Connection {
        Connection::open(&self.path).unwrap()
    }

    /// Persist a book fixture the way the application would
    pub fn insert_book(&self, id: i64, book: &Fixture) {
        let v = book.expected_values();
        self.conn()
            .execute(
                "INSERT INTO books (id, name, isbn, year, author, book_category_id, description) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, v["name"], v["isbn"], v["year"], v["author"], v["book_category_id"], v["description"]],
            )
            .unwrap();
    }

    pub fn insert_user(&self, id: i64, user: &Fixture) {
        let v = user.expected_values();
        self.conn()
            .execute(
                "INSERT INTO users (id, full_name, email, password, user_group_id, status, start_date, end_date, address) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    id,
                    v["full_name"],
                    v["email"],
                    v["password"],
                    v["user_group_id"],
                    v["status"],
                    v["start_date"],
                    v["end_date"],
                    v["address"]
                ],
            )
            .unwrap();
    }

    pub fn execute(&self, sql: &str) {
        self.conn().execute_batch(sql).unwrap();
    }

    pub fn source(&self) -> Arc<SqliteSource> {
        Arc::new(SqliteSource::open(&self.path, Duration::from_secs(1)).unwrap())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Screen {
    Blank,
    Login,
    Dashboard,
    Books,
}

/// The library web app, rendered from the database.
///
/// Every screen change takes `render_delay` before its elements show up.
pub struct FakeLibraryBrowser {
    rows: Arc<dyn RowSource>,
    render_delay: Duration,
    screen: Screen,
    shown_at: Instant,
    inputs: HashMap<Locator, String>,
    user: Option<HashMap<String, String>>,
    search: Option<String>,
    pub actions: Vec<String>,
}

impl FakeLibraryBrowser {
    pub fn new(rows: Arc<dyn RowSource>, render_delay: Duration) -> Self {
        Self {
            rows,
            render_delay,
            screen: Screen::Blank,
            shown_at: Instant::now(),
            inputs: HashMap::new(),
            user: None,
            search: None,
            actions: Vec::new(),
        }
    }

    fn show(&mut self, screen: Screen) {
        self.screen = screen;
        self.shown_at = Instant::now();
    }

    fn rendered(&self) -> bool {
        self.shown_at.elapsed() >= self.render_delay
    }

    fn result_row(&self) -> Option<HashMap<String, String>> {
        let search = self.search.as_ref()?;
        let sql = format!(
            "SELECT * FROM books WHERE name = '{}' LIMIT 1",
            search.replace('\'', "''")
        );
        let rows = self.rows.fetch(&sql).ok()?;
        let row = rows.into_iter().next()?;
        Some(row.columns().map(|(k, v)| (k.to_string(), v.to_string())).collect())
    }

    fn is_visible(&self, locator: &Locator) -> bool {
        if !self.rendered() {
            return false;
        }
        let navbar = [Navbar::USER_NAME, Navbar::DASHBOARD, Navbar::USERS, Navbar::BOOKS];
        match self.screen {
            Screen::Blank => false,
            Screen::Login => [LoginPage::EMAIL, LoginPage::PASSWORD, LoginPage::SIGN_IN].contains(locator),
            Screen::Dashboard => navbar.contains(locator),
            Screen::Books => {
                let results = [
                    BooksPage::RESULT_ISBN,
                    BooksPage::RESULT_NAME,
                    BooksPage::RESULT_AUTHOR,
                    BooksPage::RESULT_YEAR,
                ];
                navbar.contains(locator)
                    || *locator == BooksPage::SEARCH_BOX
                    || (results.contains(locator) && self.result_row().is_some())
            }
        }
    }

    fn require_visible(&self, locator: &Locator) -> E2eResult<()> {
        if self.is_visible(locator) {
            Ok(())
        } else {
            Err(E2eError::Browser(format!("element not interactable: {}", locator)))
        }
    }

    fn sign_in(&mut self) {
        let email = self.inputs.get(&LoginPage::EMAIL).cloned().unwrap_or_default();
        let password = self.inputs.get(&LoginPage::PASSWORD).cloned().unwrap_or_default();
        let sql = format!(
            "SELECT * FROM users WHERE email = '{}' AND password = '{}'",
            email.replace('\'', "''"),
            password.replace('\'', "''")
        );
        let user = self
            .rows
            .fetch(&sql)
            .ok()
            .and_then(|rows| rows.into_iter().next())
            .map(|row| row.columns().map(|(k, v)| (k.to_string(), v.to_string())).collect());
        self.inputs.clear();
        match user {
            Some(user) => {
                self.user = Some(user);
                self.show(Screen::Dashboard);
            }
            None => self.show(Screen::Login),
        }
    }
}

#[async_trait]
impl Browser for FakeLibraryBrowser {
    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        self.actions.push(format!("goto {}", url));
        self.user = None;
        self.search = None;
        self.show(Screen::Login);
        Ok(())
    }

    async fn wait_for_visible(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_visible(locator) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.require_visible(locator)?;
        self.actions.push(format!("fill {}", locator));
        self.inputs.insert(*locator, value.to_string());
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        self.require_visible(locator)?;
        self.actions.push(format!("click {}", locator));
        if *locator == LoginPage::SIGN_IN {
            self.sign_in();
        } else if *locator == Navbar::BOOKS {
            self.search = None;
            self.show(Screen::Books);
        } else if *locator == Navbar::DASHBOARD || *locator == Navbar::USERS {
            self.show(Screen::Dashboard);
        }
        Ok(())
    }

    async fn press(&mut self, locator: &Locator, key: &str) -> E2eResult<()> {
        self.require_visible(locator)?;
        self.actions.push(format!("press {} {}", locator, key));
        if *locator == BooksPage::SEARCH_BOX && key == "Enter" {
            self.search = self.inputs.get(locator).cloned();
        }
        Ok(())
    }

    async fn text(&mut self, locator: &Locator) -> E2eResult<String> {
        self.require_visible(locator)?;
        let column = if *locator == Navbar::USER_NAME {
            return Ok(self
                .user
                .as_ref()
                .and_then(|u| u.get("full_name").cloned())
                .unwrap_or_default());
        } else if *locator == BooksPage::RESULT_ISBN {
            "isbn"
        } else if *locator == BooksPage::RESULT_NAME {
            "name"
        } else if *locator == BooksPage::RESULT_AUTHOR {
            "author"
        } else if *locator == BooksPage::RESULT_YEAR {
            "year"
        } else {
            return Ok(String::new());
        };
        Ok(self
            .result_row()
            .and_then(|row| row.get(column).cloned())
            .unwrap_or_default())
    }
}

pub fn properties() -> HashMap<String, String> {
    let mut props = HashMap::new();
    props.insert("librarian_username".to_string(), LIBRARIAN_EMAIL.to_string());
    props.insert("librarian_password".to_string(), LIBRARIAN_PASSWORD.to_string());
    props
}

/// Backends wired to a mockito API, a temp database and the fake browser
pub struct TestBackends {
    pub api_url: String,
    pub db: Arc<SqliteSource>,
    pub seed: u64,
    pub render_delay: Duration,
    pub ui_wait: Duration,
}

impl TestBackends {
    pub fn new(api_url: String, db: &LibraryDb, seed: u64) -> Self {
        Self {
            api_url,
            db: db.source(),
            seed,
            render_delay: Duration::from_millis(20),
            ui_wait: Duration::from_secs(2),
        }
    }

    /// The fixture the scenario's first `random_fixture` step will produce
    pub fn expected_fixture(&self, kind: &str) -> Fixture {
        FixtureGenerator::seeded(self.seed).generate(kind).unwrap()
    }
}

impl ScenarioBackends for TestBackends {
    fn transport(&self) -> Arc<dyn HttpTransport> {
        Arc::new(ReqwestTransport::new(&self.api_url, Duration::from_secs(5)).unwrap())
    }

    fn resolver(&self) -> CredentialResolver {
        CredentialResolver::new(Arc::new(properties()))
    }

    fn rows(&self) -> E2eResult<Arc<dyn RowSource>> {
        Ok(self.db.clone())
    }

    fn ui_session(&self) -> E2eResult<Box<dyn UiActions>> {
        let browser = FakeLibraryBrowser::new(self.db.clone(), self.render_delay);
        Ok(Box::new(LibraryUi::new(
            browser,
            self.resolver(),
            "http://library.test",
            self.ui_wait,
        )))
    }

    fn generator(&self) -> FixtureGenerator {
        FixtureGenerator::seeded(self.seed)
    }
}
