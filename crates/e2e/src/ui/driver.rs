//! Library UI actions on top of a `Browser`

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::credentials::{CredentialResolver, Credentials, Role};
use crate::error::{E2eError, E2eResult};
use crate::ui::pages::{BooksPage, LoginPage, NavPage, Navbar};
use crate::ui::{Browser, Locator, UiField};

/// Who logs in through the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Role(Role),
    Credentials(Credentials),
}

impl From<Role> for Identity {
    fn from(role: Role) -> Self {
        Identity::Role(role)
    }
}

impl From<Credentials> for Identity {
    fn from(credentials: Credentials) -> Self {
        Identity::Credentials(credentials)
    }
}

/// What scenarios can do in the library web app
#[async_trait]
pub trait UiActions: Send {
    async fn login(&mut self, identity: &Identity) -> E2eResult<()>;

    async fn navigate(&mut self, page: NavPage) -> E2eResult<()>;

    async fn search_book(&mut self, name: &str) -> E2eResult<()>;

    /// Visible text of a rendered field, trimmed
    async fn read_field(&mut self, field: UiField) -> E2eResult<String>;

    async fn wait_visible(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<()>;
}

/// `UiActions` for the library app, waiting before every interaction
pub struct LibraryUi<B> {
    browser: B,
    resolver: CredentialResolver,
    base_url: String,
    wait: Duration,
}

impl<B: Browser> LibraryUi<B> {
    pub fn new(browser: B, resolver: CredentialResolver, base_url: &str, wait: Duration) -> Self {
        Self {
            browser,
            resolver,
            base_url: base_url.trim_end_matches('/').to_string(),
            wait,
        }
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn into_browser(self) -> B {
        self.browser
    }

    async fn ready(&mut self, locator: &Locator) -> E2eResult<()> {
        let wait = self.wait;
        self.wait_visible(locator, wait).await
    }
}

#[async_trait]
impl<B: Browser> UiActions for LibraryUi<B> {
    async fn login(&mut self, identity: &Identity) -> E2eResult<()> {
        let credentials = match identity {
            Identity::Role(role) => self.resolver.resolve(*role)?,
            Identity::Credentials(credentials) => credentials.clone(),
        };
        info!("UI login as {}", credentials.email);

        self.browser.goto(&self.base_url).await?;
        self.ready(&LoginPage::EMAIL).await?;
        self.browser.fill(&LoginPage::EMAIL, &credentials.email).await?;
        self.ready(&LoginPage::PASSWORD).await?;
        self.browser.fill(&LoginPage::PASSWORD, &credentials.password).await?;
        self.ready(&LoginPage::SIGN_IN).await?;
        self.browser.click(&LoginPage::SIGN_IN).await
    }

    async fn navigate(&mut self, page: NavPage) -> E2eResult<()> {
        debug!("Navigating to {}", page);
        let item = Navbar::menu_item(page);
        self.ready(&item).await?;
        self.browser.click(&item).await
    }

    async fn search_book(&mut self, name: &str) -> E2eResult<()> {
        debug!("Searching books for '{}'", name);
        self.ready(&BooksPage::SEARCH_BOX).await?;
        self.browser.fill(&BooksPage::SEARCH_BOX, name).await?;
        self.browser.press(&BooksPage::SEARCH_BOX, "Enter").await
    }

    async fn read_field(&mut self, field: UiField) -> E2eResult<String> {
        let locator = field.locator();
        self.ready(&locator).await?;
        let text = self.browser.text(&locator).await?;
        debug!("Read {} = '{}'", field, text.trim());
        Ok(text.trim().to_string())
    }

    async fn wait_visible(&mut self, locator: &Locator, timeout: Duration) -> E2eResult<()> {
        if self.browser.wait_for_visible(locator, timeout).await? {
            Ok(())
        } else {
            Err(E2eError::UiElementNotVisible {
                locator: locator.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}
