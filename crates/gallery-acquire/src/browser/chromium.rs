use super::{Browser, Clickable, ImageElement, PageSession, CLICKABLE_SELECTOR};
use crate::error::AcquireError;
use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::page::{EventDomContentEventFired, NavigateParams};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

const IMAGES_SCRIPT: &str = r#"
Array.from(document.querySelectorAll('img')).map((img, index) => {
    const rect = img.getBoundingClientRect();
    const laidOut = rect.width > 0 && rect.height > 0;
    return {
        index,
        attributes: Array.from(img.attributes).map(a => [a.name, a.value]),
        bbox: laidOut ? { x: rect.x, y: rect.y, width: rect.width, height: rect.height } : null,
    };
})
"#;

/// Headless Chrome driven over the DevTools protocol.
///
/// The CDP handler runs on its own task for the browser's lifetime. Each
/// session gets a dedicated browser context, so cookies accepted or
/// captcha state picked up in one painting's page never reach another.
pub struct ChromiumBrowser {
    // Sessions share the browser; only shutdown needs it exclusively.
    browser: Arc<RwLock<chromiumoxide::Browser>>,
    handler: JoinHandle<()>,
}

impl ChromiumBrowser {
    pub async fn launch(headless: bool, user_agent: &str) -> Result<Self, AcquireError> {
        let mut builder = BrowserConfig::builder().arg(format!("--user-agent={user_agent}"));
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(AcquireError::Browser)?;

        let (browser, mut handler) = chromiumoxide::Browser::launch(config)
            .await
            .map_err(AcquireError::browser)?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "CDP handler stopped");
                    break;
                }
            }
        });

        tracing::info!(headless, "Launched Chromium");
        Ok(Self {
            browser: Arc::new(RwLock::new(browser)),
            handler,
        })
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, AcquireError> {
        let browser = self.browser.read().await;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(AcquireError::browser)?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(AcquireError::Browser)?;

        match browser.new_page(target).await {
            Ok(page) => Ok(Box::new(ChromiumSession {
                page,
                context_id,
                browser: Arc::clone(&self.browser),
            })),
            Err(e) => {
                if let Err(dispose) = browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await
                {
                    tracing::debug!(error = %dispose, "Failed to dispose browser context");
                }
                Err(AcquireError::browser(e))
            }
        }
    }

    async fn shutdown(&self) -> Result<(), AcquireError> {
        let mut browser = self.browser.write().await;
        browser.close().await.map_err(AcquireError::browser)?;
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "Chromium did not exit cleanly");
        }
        self.handler.abort();
        tracing::info!("Chromium shut down");
        Ok(())
    }
}

struct ChromiumSession {
    page: Page,
    context_id: BrowserContextId,
    browser: Arc<RwLock<chromiumoxide::Browser>>,
}

impl ChromiumSession {
    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T, AcquireError> {
        self.page
            .evaluate(script)
            .await
            .map_err(AcquireError::browser)?
            .into_value()
            .map_err(AcquireError::browser)
    }
}

#[async_trait]
impl PageSession for ChromiumSession {
    /// Returns at `DOMContentLoaded`; subresources may still be loading.
    async fn navigate(&self, url: &str) -> Result<(), AcquireError> {
        let mut dom_ready = self
            .page
            .event_listener::<EventDomContentEventFired>()
            .await
            .map_err(AcquireError::browser)?;

        let navigation = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(AcquireError::browser)?;
        if let Some(error) = &navigation.result.error_text {
            return Err(AcquireError::NetworkFailure(format!("{url}: {error}")));
        }

        dom_ready
            .next()
            .await
            .map(|_| ())
            .ok_or_else(|| AcquireError::Browser(format!("{url}: page closed before DOM was ready")))
    }

    async fn body_text(&self) -> Result<String, AcquireError> {
        self.eval("document.body ? document.body.innerText : ''").await
    }

    async fn has_image(&self) -> Result<bool, AcquireError> {
        self.eval("document.querySelector('img') !== null").await
    }

    async fn current_url(&self) -> Result<String, AcquireError> {
        self.page
            .url()
            .await
            .map_err(AcquireError::browser)?
            .ok_or_else(|| AcquireError::Browser("page has no url".into()))
    }

    async fn images(&self) -> Result<Vec<ImageElement>, AcquireError> {
        self.eval(IMAGES_SCRIPT).await
    }

    async fn clickables(&self) -> Result<Vec<Clickable>, AcquireError> {
        let script = format!(
            r#"Array.from(document.querySelectorAll("{CLICKABLE_SELECTOR}")).map((el, index) => {{
                const style = window.getComputedStyle(el);
                const visible = style.visibility !== 'hidden'
                    && style.display !== 'none'
                    && el.getClientRects().length > 0;
                return {{
                    index,
                    outer_html: el.outerHTML,
                    visible,
                    disabled: el.disabled === true || el.hasAttribute('disabled'),
                }};
            }})"#
        );
        self.eval(&script).await
    }

    async fn click(&self, target: &Clickable) -> Result<(), AcquireError> {
        let script = format!(
            r#"(() => {{
                const el = document.querySelectorAll("{CLICKABLE_SELECTOR}")[{}];
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            target.index
        );
        let clicked: bool = self.eval(&script).await?;
        if clicked {
            Ok(())
        } else {
            Err(AcquireError::Browser(format!(
                "clickable #{} is no longer attached",
                target.index
            )))
        }
    }

    async fn close(&self) -> Result<(), AcquireError> {
        let closed = self.page.clone().close().await.map_err(AcquireError::browser);
        // The context goes even if the page refused to close.
        self.browser
            .read()
            .await
            .execute(DisposeBrowserContextParams::new(self.context_id.clone()))
            .await
            .map_err(AcquireError::browser)?;
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::silent_server;
    use std::time::Duration;

    // Needs a Chrome/Chromium binary on the host.
    #[tokio::test]
    #[ignore = "launches a local Chrome"]
    async fn test_navigate_does_not_wait_for_hanging_images() {
        let stalled = silent_server().await;
        let html = format!(
            r#"<html><body><h1>Judith</h1><img src="{stalled}judith.jpg"></body></html>"#
        );
        let url = format!("data:text/html,{}", html.replace('#', "%23").replace(' ', "%20"));

        let browser = ChromiumBrowser::launch(true, "test-agent").await.unwrap();
        let session = browser.open_session().await.unwrap();
        let loaded = tokio::time::timeout(Duration::from_secs(5), session.navigate(&url)).await;
        assert!(matches!(loaded, Ok(Ok(()))), "{loaded:?}");
        assert!(session.has_image().await.unwrap());

        session.close().await.unwrap();
        browser.shutdown().await.unwrap();
    }
}
