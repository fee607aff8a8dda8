//! Opening a candidate page and getting it into an extractable state.
//!
//! Navigation, captcha detection, waiting for images to attach and settle,
//! then a best-effort click on a cookie-consent button. Every session the
//! gatekeeper opens is closed again, whichever way the attempt ends.

use crate::browser::{Browser, Clickable, PageSession};
use crate::error::AcquireError;
use gallery_model::{ScrapeConfig, Timeouts};
use regex::{Regex, RegexBuilder};
use std::time::Duration;

const IMAGE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Compiled captcha phrases and consent keywords.
#[derive(Debug, Clone)]
pub struct Phrasebook {
    captcha: Vec<String>,
    consent: Option<Regex>,
}

impl Phrasebook {
    pub fn new(config: &ScrapeConfig) -> Result<Self, regex::Error> {
        let captcha = config
            .captcha_phrases
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.to_lowercase())
            .collect();

        let keywords: Vec<String> = config
            .consent_keywords
            .iter()
            .filter(|k| !k.is_empty())
            .map(|k| regex::escape(k))
            .collect();
        let consent = if keywords.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&format!(r"\b({})\b", keywords.join("|")))
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(Self { captcha, consent })
    }

    /// Whether visible page text looks like a captcha or bot wall.
    pub fn is_captcha(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.captcha.iter().any(|phrase| text.contains(phrase.as_str()))
    }

    /// Whether an element's markup names a consent action as a whole word.
    pub fn is_consent(&self, markup: &str) -> bool {
        self.consent.as_ref().is_some_and(|re| re.is_match(markup))
    }
}

/// A loaded page that passed the gatekeeper.
///
/// Owns its session. Call [`ReadyPage::close`] when done; if the guard is
/// dropped instead (early return, cancellation, panic), the close is
/// spawned onto the runtime.
pub struct ReadyPage {
    session: Option<Box<dyn PageSession>>,
    url: String,
    base_url: String,
}

impl ReadyPage {
    fn new(session: Box<dyn PageSession>, url: &str) -> Self {
        Self {
            session: Some(session),
            url: url.to_string(),
            base_url: url.to_string(),
        }
    }

    pub fn session(&self) -> &dyn PageSession {
        self.session
            .as_deref()
            .expect("ReadyPage: session already closed")
    }

    /// The URL the page was opened with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The document URL after redirects; relative image URLs resolve against it.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn close(mut self) {
        if let Some(session) = self.session.take() {
            match session.close().await {
                Ok(()) => tracing::trace!(url = %self.url, "Closed page session"),
                Err(e) => tracing::debug!(url = %self.url, error = %e, "Failed to close page session"),
            }
        }
    }
}

impl Drop for ReadyPage {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let url = std::mem::take(&mut self.url);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        tracing::debug!(url = %url, error = %e, "Deferred session close failed");
                    }
                });
            }
            Err(_) => tracing::debug!(url = %url, "No runtime to close dropped page session"),
        }
    }
}

/// Opens candidate pages on a shared browser.
#[derive(Debug, Clone)]
pub struct Gatekeeper {
    timeouts: Timeouts,
    phrases: Phrasebook,
}

impl Gatekeeper {
    pub fn new(config: &ScrapeConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            timeouts: config.timeouts.clone(),
            phrases: Phrasebook::new(config)?,
        })
    }

    /// Open `url` in a fresh session and return it ready for extraction.
    ///
    /// `Blocked` and `Timeout` are ordinary outcomes here; the session is
    /// closed before any error is returned.
    pub async fn open(&self, browser: &dyn Browser, url: &str) -> Result<ReadyPage, AcquireError> {
        let session = browser.open_session().await?;
        let mut page = ReadyPage::new(session, url);

        match self.prepare(&mut page).await {
            Ok(()) => Ok(page),
            Err(e) => {
                page.close().await;
                Err(e)
            }
        }
    }

    async fn prepare(&self, page: &mut ReadyPage) -> Result<(), AcquireError> {
        let url = page.url.clone();
        let session = page.session();

        tokio::time::timeout(self.timeouts.page_load(), session.navigate(&url))
            .await
            .map_err(|_| AcquireError::Timeout { step: "page load" })??;

        let text = session.body_text().await?;
        if self.phrases.is_captcha(&text) {
            tracing::info!(url = %url, "Captcha detected");
            return Err(AcquireError::Blocked);
        }

        tokio::time::timeout(self.timeouts.image_wait(), wait_for_image(session))
            .await
            .map_err(|_| AcquireError::Timeout { step: "image wait" })??;
        tokio::time::sleep(self.timeouts.settle()).await;

        dismiss_consent(session, &self.phrases).await;

        let base_url = match session.current_url().await {
            Ok(current) => current,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Falling back to requested url as base");
                url
            }
        };
        page.base_url = base_url;
        Ok(())
    }
}

async fn wait_for_image(session: &dyn PageSession) -> Result<(), AcquireError> {
    loop {
        if session.has_image().await? {
            return Ok(());
        }
        tokio::time::sleep(IMAGE_POLL_INTERVAL).await;
    }
}

/// Click the first visible, enabled clickable whose markup matches a
/// consent keyword. Failures are logged and otherwise ignored.
pub async fn dismiss_consent(session: &dyn PageSession, phrases: &Phrasebook) -> Option<Clickable> {
    let clickables = match session.clickables().await {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!(error = %e, "Could not enumerate clickables");
            return None;
        }
    };

    let target = clickables
        .into_iter()
        .filter(|c| c.visible && !c.disabled)
        .find(|c| phrases.is_consent(&c.outer_html))?;

    match session.click(&target).await {
        Ok(()) => {
            tracing::debug!(index = target.index, "Accepted cookie consent");
            Some(target)
        }
        Err(e) => {
            tracing::debug!(index = target.index, error = %e, "Failed to click consent button");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{quick_config, FakeBrowser, PageScript};

    #[test]
    fn test_captcha_phrases_case_insensitive() {
        let phrases = Phrasebook::new(&ScrapeConfig::default()).unwrap();
        assert!(phrases.is_captcha("Please VERIFY you are human to continue"));
        assert!(phrases.is_captcha("Sicherheitsüberprüfung läuft"));
        assert!(!phrases.is_captcha("The Kiss, oil on canvas, 1908"));
    }

    #[test]
    fn test_consent_keywords_match_whole_words() {
        let phrases = Phrasebook::new(&ScrapeConfig::default()).unwrap();
        assert!(phrases.is_consent(r#"<button class="btn">Accept all</button>"#));
        assert!(phrases.is_consent("<button>Alle AKZEPTIEREN</button>"));
        assert!(phrases.is_consent("<button>Ho capito</button>"));
        assert!(!phrases.is_consent("<button>Acceptance criteria</button>"));
        assert!(!phrases.is_consent("<button>Close</button>"));
    }

    #[test]
    fn test_empty_consent_list_matches_nothing() {
        let config = ScrapeConfig {
            consent_keywords: vec![],
            ..ScrapeConfig::default()
        };
        let phrases = Phrasebook::new(&config).unwrap();
        assert!(!phrases.is_consent("<button>Accept</button>"));
    }

    #[tokio::test]
    async fn test_open_ready_page_clicks_first_visible_consent() {
        let html = r#"<body>
            <div hidden><button>Accept hidden</button></div>
            <button disabled>I agree (disabled)</button>
            <button>Settings</button>
            <button id="ok">Accept all</button>
            <button>Allow everything</button>
            <img src="/a.jpg" width="10" height="10">
        </body>"#;
        let browser = FakeBrowser::new().page("https://museum.test/p", PageScript::html(html));
        let gatekeeper = Gatekeeper::new(&quick_config()).unwrap();

        let page = gatekeeper.open(&browser, "https://museum.test/p").await.unwrap();
        assert_eq!(page.base_url(), "https://museum.test/p");
        page.close().await;

        assert_eq!(browser.clicks(), vec![3]);
        assert_eq!(browser.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_captcha_page_is_blocked_and_closed() {
        let html = r#"<body><h1>Checking your browser before accessing</h1><img src="/x.png"></body>"#;
        let browser = FakeBrowser::new().page("https://blocked.test/", PageScript::html(html));
        let gatekeeper = Gatekeeper::new(&quick_config()).unwrap();

        let result = gatekeeper.open(&browser, "https://blocked.test/").await;
        assert!(matches!(result, Err(AcquireError::Blocked)));
        assert_eq!(browser.open_sessions(), 0);
        assert!(browser.clicks().is_empty());
    }

    #[tokio::test]
    async fn test_navigation_timeout_is_reported_and_closed() {
        let browser = FakeBrowser::new().page("https://slow.test/", PageScript::Hang);
        let gatekeeper = Gatekeeper::new(&quick_config()).unwrap();

        let result = gatekeeper.open(&browser, "https://slow.test/").await;
        assert!(matches!(result, Err(AcquireError::Timeout { step: "page load" })));
        assert_eq!(browser.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_page_without_images_times_out() {
        let browser =
            FakeBrowser::new().page("https://text.test/", PageScript::html("<body>Only text</body>"));
        let gatekeeper = Gatekeeper::new(&quick_config()).unwrap();

        let result = gatekeeper.open(&browser, "https://text.test/").await;
        assert!(matches!(result, Err(AcquireError::Timeout { step: "image wait" })));
        assert_eq!(browser.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_dropped_ready_page_still_closes() {
        let html = r#"<body><img src="/a.jpg" width="5" height="5"></body>"#;
        let browser = FakeBrowser::new().page("https://drop.test/", PageScript::html(html));
        let gatekeeper = Gatekeeper::new(&quick_config()).unwrap();

        let page = gatekeeper.open(&browser, "https://drop.test/").await.unwrap();
        assert_eq!(browser.open_sessions(), 1);
        drop(page);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(browser.open_sessions(), 0);
    }
}
