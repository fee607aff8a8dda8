//! Artwork image acquisition: opening candidate pages in a browser,
//! picking the artwork image and saving it to disk.

pub mod batch;
pub mod browser;
pub mod dispatch;
pub mod error;
pub mod gatekeeper;
pub mod normalize;
pub mod output;
pub mod retrieval;
pub mod selector;
pub mod srcset;

#[cfg(test)]
mod testing;

pub use batch::BatchController;
pub use browser::chromium::ChromiumBrowser;
pub use browser::static_page::StaticBrowser;
pub use browser::{Browser, PageSession};
pub use dispatch::Dispatcher;
pub use error::AcquireError;
pub use retrieval::{HttpImageFetcher, ImageFetcher};
