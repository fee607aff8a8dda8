//! Browser engines and the page-session interface the pipeline drives.
//!
//! A [`Browser`] is shared by every dispatch in a batch; each page attempt
//! opens its own [`PageSession`], which must not share cookies or storage
//! with any other session and is discarded after one page.
//!
//! - `chromium` - headless Chrome over CDP, one browser context per session
//! - `static_page` - plain HTTP fetch + HTML parse, no script execution

pub mod chromium;
pub mod static_page;

use crate::error::AcquireError;
use async_trait::async_trait;
use serde::Deserialize;

/// Selector for elements that may act as a consent button.
pub const CLICKABLE_SELECTOR: &str =
    "button, input[type='button'], input[type='submit'], [role='button'], a[role='button']";

#[async_trait]
pub trait Browser: Send + Sync {
    /// Create a fresh, isolated page session.
    async fn open_session(&self) -> Result<Box<dyn PageSession>, AcquireError>;

    /// Release the engine. Sessions must not be opened afterwards.
    async fn shutdown(&self) -> Result<(), AcquireError> {
        Ok(())
    }
}

/// One isolated page. Methods take `&self`; engines keep whatever state
/// they need behind their own synchronization.
#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate and return once the DOM has been parsed. Unbounded; the
    /// caller applies the page-load timeout.
    async fn navigate(&self, url: &str) -> Result<(), AcquireError>;

    /// Visible text of the document body.
    async fn body_text(&self) -> Result<String, AcquireError>;

    /// Whether at least one `<img>` is attached to the DOM.
    async fn has_image(&self) -> Result<bool, AcquireError>;

    /// URL of the loaded document after redirects.
    async fn current_url(&self) -> Result<String, AcquireError>;

    /// Every `<img>` in document order.
    async fn images(&self) -> Result<Vec<ImageElement>, AcquireError>;

    /// Every element matching [`CLICKABLE_SELECTOR`] in document order.
    async fn clickables(&self) -> Result<Vec<Clickable>, AcquireError>;

    async fn click(&self, target: &Clickable) -> Result<(), AcquireError>;

    async fn close(&self) -> Result<(), AcquireError>;
}

/// Rendered box of an element, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Snapshot of one `<img>` element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImageElement {
    /// Position in document order.
    pub index: usize,
    /// Attributes in the element's enumeration order.
    pub attributes: Vec<(String, String)>,
    /// `None` when the element is not laid out.
    #[serde(rename = "bbox")]
    pub bounding_box: Option<BoundingBox>,
}

impl ImageElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Snapshot of one clickable element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Clickable {
    /// Position among the [`CLICKABLE_SELECTOR`] matches.
    pub index: usize,
    pub outer_html: String,
    pub visible: bool,
    pub disabled: bool,
}
