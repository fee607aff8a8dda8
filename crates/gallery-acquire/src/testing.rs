//! Test doubles for the browser and image-fetch seams.

use crate::browser::static_page::PageSnapshot;
use crate::browser::{Browser, Clickable, ImageElement, PageSession};
use crate::error::AcquireError;
use crate::retrieval::{accept_image, resolve_url, DownloadResult, ImageFetcher};
use async_trait::async_trait;
use gallery_model::{ScrapeConfig, Timeouts};
use reqwest::StatusCode;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Config with short timeouts and no settle delay.
pub fn quick_config() -> ScrapeConfig {
    ScrapeConfig {
        timeouts: Timeouts {
            page_load_ms: 200,
            image_wait_ms: 200,
            settle_ms: 0,
            download_ms: 1_000,
        },
        ..ScrapeConfig::default()
    }
}

/// How a scripted page behaves when navigated to.
#[derive(Debug, Clone)]
pub enum PageScript {
    Html(String),
    /// Navigation never completes.
    Hang,
    /// Navigation panics inside the dispatch task.
    Panic,
}

impl PageScript {
    pub fn html(html: &str) -> Self {
        PageScript::Html(html.to_string())
    }
}

#[derive(Default)]
struct BrowserState {
    pages: HashMap<String, PageScript>,
    navigations: Mutex<Vec<String>>,
    events: Mutex<Vec<String>>,
    clicks: Mutex<Vec<usize>>,
    open: AtomicUsize,
    peak_open: AtomicUsize,
}

/// In-memory browser serving scripted pages; records what was visited.
#[derive(Clone, Default)]
pub struct FakeBrowser {
    state: Arc<BrowserState>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, script: PageScript) -> Self {
        Arc::get_mut(&mut self.state)
            .expect("configure FakeBrowser before sharing it")
            .pages
            .insert(url.to_string(), script);
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.navigations.lock().unwrap().clone()
    }

    /// `navigate <url>` and `close <url>` entries in the order they happened.
    pub fn events(&self) -> Vec<String> {
        self.state.events.lock().unwrap().clone()
    }

    pub fn clicks(&self) -> Vec<usize> {
        self.state.clicks.lock().unwrap().clone()
    }

    /// Sessions opened and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.state.open.load(Ordering::SeqCst)
    }

    pub fn peak_open_sessions(&self) -> usize {
        self.state.peak_open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn open_session(&self) -> Result<Box<dyn PageSession>, AcquireError> {
        let open = self.state.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_open.fetch_max(open, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            state: Arc::clone(&self.state),
            page: Mutex::new(None),
            url: Mutex::new(None),
            closed: Mutex::new(false),
        }))
    }
}

struct FakeSession {
    state: Arc<BrowserState>,
    page: Mutex<Option<PageSnapshot>>,
    url: Mutex<Option<String>>,
    closed: Mutex<bool>,
}

impl FakeSession {
    fn with_page<T>(&self, f: impl FnOnce(&PageSnapshot) -> T) -> Result<T, AcquireError> {
        self.page
            .lock()
            .unwrap()
            .as_ref()
            .map(f)
            .ok_or_else(|| AcquireError::Browser("no page loaded".into()))
    }
}

#[async_trait]
impl PageSession for FakeSession {
    async fn navigate(&self, url: &str) -> Result<(), AcquireError> {
        self.state.navigations.lock().unwrap().push(url.to_string());
        self.state.events.lock().unwrap().push(format!("navigate {url}"));
        *self.url.lock().unwrap() = Some(url.to_string());
        match self.state.pages.get(url).cloned() {
            Some(PageScript::Html(html)) => {
                *self.page.lock().unwrap() = Some(PageSnapshot::parse(url, &html));
                Ok(())
            }
            Some(PageScript::Hang) => std::future::pending().await,
            Some(PageScript::Panic) => panic!("scripted navigation panic for {url}"),
            None => Err(AcquireError::NetworkFailure(format!("no route to {url}"))),
        }
    }

    async fn body_text(&self) -> Result<String, AcquireError> {
        self.with_page(|p| p.body_text.clone())
    }

    async fn has_image(&self) -> Result<bool, AcquireError> {
        self.with_page(|p| !p.images.is_empty())
    }

    async fn current_url(&self) -> Result<String, AcquireError> {
        self.with_page(|p| p.url.clone())
    }

    async fn images(&self) -> Result<Vec<ImageElement>, AcquireError> {
        self.with_page(|p| p.images.clone())
    }

    async fn clickables(&self) -> Result<Vec<Clickable>, AcquireError> {
        self.with_page(|p| p.clickables.clone())
    }

    async fn click(&self, target: &Clickable) -> Result<(), AcquireError> {
        self.state.clicks.lock().unwrap().push(target.index);
        Ok(())
    }

    async fn close(&self) -> Result<(), AcquireError> {
        let mut closed = self.closed.lock().unwrap();
        if !*closed {
            *closed = true;
            self.state.open.fetch_sub(1, Ordering::SeqCst);
            if let Some(url) = self.url.lock().unwrap().as_deref() {
                self.state.events.lock().unwrap().push(format!("close {url}"));
            }
        }
        Ok(())
    }
}

/// Image fetcher answering from a URL → content-type table.
#[derive(Clone, Default)]
pub struct FakeFetcher {
    responses: Arc<HashMap<String, &'static str>>,
    attempts: Arc<Mutex<Vec<String>>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `url` as an image of `content_type`.
    pub fn image(mut self, url: &str, content_type: &'static str) -> Self {
        Arc::make_mut(&mut self.responses).insert(url.to_string(), content_type);
        self
    }

    /// Serve `url` as an HTML page.
    pub fn html(self, url: &str) -> Self {
        self.image(url, "text/html; charset=utf-8")
    }

    /// Absolute URLs fetched so far, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str, base_url: &str) -> Result<DownloadResult, AcquireError> {
        let absolute = resolve_url(url, base_url)?.to_string();
        self.attempts.lock().unwrap().push(absolute.clone());

        let content_type = self
            .responses
            .get(&absolute)
            .ok_or_else(|| AcquireError::NetworkFailure(format!("404 for {absolute}")))?;
        let extension = accept_image(StatusCode::OK, content_type)?;
        Ok(DownloadResult {
            bytes: format!("bytes of {absolute}").into_bytes(),
            url: absolute,
            extension,
        })
    }
}

/// Serve a single HTTP response on a local port.
///
/// Returns the server's base URL and a handle yielding the raw request head.
pub async fn serve_once(
    status: &str,
    content_type: &str,
    body: &[u8],
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());

    let mut response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    )
    .into_bytes();
    response.extend_from_slice(body);

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }
        socket.write_all(&response).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&request).into_owned()
    });

    (base, handle)
}

/// Local server that accepts connections and never answers.
///
/// Returns its base URL; the listener task runs until the runtime stops.
pub async fn silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}/", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    base
}

/// Fresh scratch directory, removed when the guard drops.
pub fn scratch_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}
