//! Browser-facing half of the harness
//!
//! `Browser` is the raw capability (navigate, wait, fill, click, read);
//! `UiActions` in [`driver`] is the library-specific vocabulary built on it.

pub mod driver;
pub mod pages;
pub mod playwright;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

pub use driver::{Identity, LibraryUi, UiActions};
pub use pages::{BooksPage, LoginPage, NavPage, Navbar};
pub use playwright::PlaywrightBrowser;

/// How an element is found on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(&'static str),
    XPath(&'static str),
    Id(&'static str),
}

impl Locator {
    /// Selector string in Playwright's engine syntax
    pub fn playwright_selector(&self) -> String {
        match self {
            Locator::Css(css) => css.to_string(),
            Locator::XPath(xpath) => format!("xpath={}", xpath),
            Locator::Id(id) => format!("#{}", id),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(css) => write!(f, "css {}", css),
            Locator::XPath(xpath) => write!(f, "xpath {}", xpath),
            Locator::Id(id) => write!(f, "id {}", id),
        }
    }
}

/// Rendered values the harness can read back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiField {
    BookIsbn,
    BookName,
    BookAuthor,
    BookYear,
    UserName,
}

impl UiField {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiField::BookIsbn => "book_isbn",
            UiField::BookName => "book_name",
            UiField::BookAuthor => "book_author",
            UiField::BookYear => "book_year",
            UiField::UserName => "user_name",
        }
    }

    pub fn locator(&self) -> Locator {
        match self {
            UiField::BookIsbn => BooksPage::RESULT_ISBN,
            UiField::BookName => BooksPage::RESULT_NAME,
            UiField::BookAuthor => BooksPage::RESULT_AUTHOR,
            UiField::BookYear => BooksPage::RESULT_YEAR,
            UiField::UserName => Navbar::USER_NAME,
        }
    }
}

impl fmt::Display for UiField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UiField {
    type Err = E2eError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "book_isbn" => Ok(UiField::BookIsbn),
            "book_name" => Ok(UiField::BookName),
            "book_author" => Ok(UiField::BookAuthor),
            "book_year" => Ok(UiField::BookYear),
            "user_name" => Ok(UiField::UserName),
            _ => Err(E2eError::MissingFieldMapping {
                scope: "ui".to_string(),
                field: s.to_string(),
            }),
        }
    }
}

/// Low-level browser capability.
///
/// Methods take `&mut self`: a browser carries one session's page state.
#[async_trait]
pub trait Browser: Send {
    async fn goto(&mut self, url: &str) -> E2eResult<()>;

    /// Whether the element became visible within `timeout`.
    ///
    /// A zero timeout checks once without waiting.
    async fn wait_for_visible(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<bool>;

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn click(&mut self, locator: &Locator) -> E2eResult<()>;

    async fn press(&mut self, locator: &Locator, key: &str) -> E2eResult<()>;

    async fn text(&mut self, locator: &Locator) -> E2eResult<String>;
}
