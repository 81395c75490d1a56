//! Locator tables for the library web app
//!
//! Pages are plain tables of locators. A page that shows the navbar simply
//! uses `Navbar` alongside its own table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};
use crate::ui::Locator;

pub struct LoginPage;

impl LoginPage {
    pub const EMAIL: Locator = Locator::Id("inputEmail");
    pub const PASSWORD: Locator = Locator::Id("inputPassword");
    pub const SIGN_IN: Locator = Locator::XPath(r#"//*[@id="login-form"]/button"#);
}

/// Shown on every page after login
pub struct Navbar;

impl Navbar {
    pub const USER_NAME: Locator = Locator::XPath(r#"//*[@id="navbarDropdown"]/span"#);
    pub const DASHBOARD: Locator = Locator::XPath(r#"//*[@id="menu_item"]/li[1]"#);
    pub const USERS: Locator = Locator::XPath(r#"//*[@id="menu_item"]/li[2]"#);
    pub const BOOKS: Locator = Locator::XPath(r#"//*[@id="menu_item"]/li[3]"#);

    pub fn menu_item(page: NavPage) -> Locator {
        match page {
            NavPage::Dashboard => Self::DASHBOARD,
            NavPage::Users => Self::USERS,
            NavPage::Books => Self::BOOKS,
        }
    }
}

pub struct BooksPage;

impl BooksPage {
    pub const SEARCH_BOX: Locator =
        Locator::XPath("//*[@class = 'form-control input-sm input-small input-inline']");
    pub const RESULT_ISBN: Locator = Locator::XPath(r#"//*[@id="tbl_books"]/tbody/tr/td[2]"#);
    pub const RESULT_NAME: Locator = Locator::XPath(r#"//*[@id="tbl_books"]/tbody/tr/td[3]"#);
    pub const RESULT_AUTHOR: Locator = Locator::XPath(r#"//*[@id="tbl_books"]/tbody/tr/td[4]"#);
    pub const RESULT_YEAR: Locator = Locator::XPath(r#"//*[@id="tbl_books"]/tbody/tr/td[6]"#);
}

/// Navbar destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavPage {
    Dashboard,
    Users,
    Books,
}

impl NavPage {
    pub fn as_str(&self) -> &'static str {
        match self {
            NavPage::Dashboard => "dashboard",
            NavPage::Users => "users",
            NavPage::Books => "books",
        }
    }
}

impl fmt::Display for NavPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NavPage {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dashboard" => Ok(NavPage::Dashboard),
            "users" => Ok(NavPage::Users),
            "books" => Ok(NavPage::Books),
            _ => Err(E2eError::MissingFieldMapping {
                scope: "navigation".to_string(),
                field: s.to_string(),
            }),
        }
    }
}
