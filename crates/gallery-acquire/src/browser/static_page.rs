use super::{Browser, BoundingBox, Clickable, ImageElement, PageSession, CLICKABLE_SELECTOR};
use crate::error::AcquireError;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::sync::Mutex;
use std::time::Duration;

/// Engine that fetches raw HTML and never runs scripts.
///
/// Layout is approximated from numeric `width`/`height` attributes, so
/// images without declared dimensions have no box and are never selected.
/// Clicks are accepted and do nothing. Useful where no Chrome is installed
/// and for pages that render server-side.
pub struct StaticBrowser {
    client: reqwest::Client,
}

impl StaticBrowser {
    pub fn new(user_agent: &str, page_load: Duration) -> Result<Self, AcquireError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(page_load)
            .build()
            .map_err(|e| AcquireError::NetworkFailure(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Browser for StaticBrowser {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, AcquireError> {
        // No cookie store on the client, so sessions share nothing.
        Ok(Box::new(StaticSession {
            client: self.client.clone(),
            page: Mutex::new(None),
        }))
    }
}

struct StaticSession {
    client: reqwest::Client,
    page: Mutex<Option<PageSnapshot>>,
}

impl StaticSession {
    fn with_page<T>(&self, f: impl FnOnce(&PageSnapshot) -> T) -> Result<T, AcquireError> {
        let page = self.page.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        page.as_ref()
            .map(f)
            .ok_or_else(|| AcquireError::Browser("no page loaded".into()))
    }
}

#[async_trait]
impl PageSession for StaticSession {
    async fn navigate(&self, url: &str) -> Result<(), AcquireError> {
        let response = self.client.get(url).send().await.map_err(page_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(AcquireError::NetworkFailure(format!("HTTP {status} for {url}")));
        }
        let final_url = response.url().to_string();
        let html = response.text().await.map_err(page_error)?;
        tracing::debug!(url = %final_url, bytes = html.len(), "Fetched static page");

        let snapshot = PageSnapshot::parse(&final_url, &html);
        *self.page.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(snapshot);
        Ok(())
    }

    async fn body_text(&self) -> Result<String, AcquireError> {
        self.with_page(|page| page.body_text.clone())
    }

    async fn has_image(&self) -> Result<bool, AcquireError> {
        self.with_page(|page| !page.images.is_empty())
    }

    async fn current_url(&self) -> Result<String, AcquireError> {
        self.with_page(|page| page.url.clone())
    }

    async fn images(&self) -> Result<Vec<ImageElement>, AcquireError> {
        self.with_page(|page| page.images.clone())
    }

    async fn clickables(&self) -> Result<Vec<Clickable>, AcquireError> {
        self.with_page(|page| page.clickables.clone())
    }

    async fn click(&self, _target: &Clickable) -> Result<(), AcquireError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), AcquireError> {
        self.page.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
        Ok(())
    }
}

fn page_error(err: reqwest::Error) -> AcquireError {
    if err.is_timeout() {
        AcquireError::Timeout { step: "page load" }
    } else {
        AcquireError::NetworkFailure(err.to_string())
    }
}

/// Everything the pipeline reads from a parsed HTML document.
///
/// Built eagerly because `scraper::Html` cannot be held across awaits.
#[derive(Debug, Clone, PartialEq)]
pub struct PageSnapshot {
    pub url: String,
    pub body_text: String,
    pub images: Vec<ImageElement>,
    pub clickables: Vec<Clickable>,
}

impl PageSnapshot {
    pub fn parse(url: &str, html: &str) -> Self {
        let document = Html::parse_document(html);

        let img_sel = Selector::parse("img").expect("valid selector");
        let images = document
            .select(&img_sel)
            .enumerate()
            .map(|(index, img)| ImageElement {
                index,
                attributes: img
                    .value()
                    .attrs()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
                bounding_box: declared_box(img),
            })
            .collect();

        let click_sel = Selector::parse(CLICKABLE_SELECTOR).expect("valid selector");
        let clickables = document
            .select(&click_sel)
            .enumerate()
            .map(|(index, el)| Clickable {
                index,
                outer_html: el.html(),
                visible: !is_hidden(el),
                disabled: el.value().attr("disabled").is_some()
                    || el.value().attr("aria-disabled") == Some("true"),
            })
            .collect();

        Self {
            url: url.to_string(),
            body_text: visible_text(&document),
            images,
            clickables,
        }
    }
}

/// Box from the `width`/`height` attributes; `None` unless both are positive numbers.
fn declared_box(img: ElementRef) -> Option<BoundingBox> {
    let dimension = |name: &str| -> Option<f64> {
        let raw = img.value().attr(name)?.trim();
        let digits = raw.strip_suffix("px").unwrap_or(raw);
        digits.parse::<f64>().ok().filter(|v| *v > 0.0)
    };
    Some(BoundingBox {
        x: 0.0,
        y: 0.0,
        width: dimension("width")?,
        height: dimension("height")?,
    })
}

fn is_hidden(el: ElementRef) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .chain(std::iter::once(el))
        .any(|e| {
            let element = e.value();
            let style = element
                .attr("style")
                .map(|s| s.replace(' ', "").to_lowercase())
                .unwrap_or_default();
            element.attr("hidden").is_some()
                || element.attr("aria-hidden") == Some("true")
                || element.attr("type") == Some("hidden")
                || style.contains("display:none")
                || style.contains("visibility:hidden")
        })
}

/// Body text without script/style contents, whitespace-collapsed.
fn visible_text(document: &Html) -> String {
    let body_sel = Selector::parse("body").expect("valid selector");
    let Some(body) = document.select(&body_sel).next() else {
        return String::new();
    };

    let mut words = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let in_script = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
        });
        if !in_script {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}
