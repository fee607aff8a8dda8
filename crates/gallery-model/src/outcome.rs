use crate::config::UNKNOWN_LOCATION;
use crate::painting::Painting;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub const NO_URLS_STATUS: &str = "No image was downloaded (no urls were found).";
pub const NO_URLS_IMAGE_URL: &str = "No url to download the image was located.";
pub const EXHAUSTED_STATUS: &str = "No image was downloaded even though some urls were found.";
pub const ABORTED_STATUS: &str = "No image was downloaded (processing was aborted).";

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("painting '{0}' already has a result slot in this batch")]
    DuplicateSlot(String),
}

/// How a painting's dispatch ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Terminal {
    Success,
    /// Candidates existed but none yielded an image.
    Exhausted,
    /// Upstream supplied no usable URL list.
    NoCandidates,
    /// The dispatch task died before recording an outcome.
    Aborted,
}

/// The terminal result for one painting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutcomeRecord {
    pub plaque_text: String,
    /// Path of the saved image; `None` when nothing was saved.
    pub image_path: Option<PathBuf>,
    /// First candidate page URL, or a human-readable status when no image was saved.
    pub source: String,
    pub location: String,
    /// Resolved direct image URL; empty (or a status) when no image was saved.
    pub image_url: String,
    pub terminal: Terminal,
}

impl OutcomeRecord {
    pub fn success(
        plaque_text: &str,
        image_path: PathBuf,
        source: &str,
        location: &str,
        image_url: &str,
    ) -> Self {
        Self {
            plaque_text: plaque_text.to_string(),
            image_path: Some(image_path),
            source: source.to_string(),
            location: location.to_string(),
            image_url: image_url.to_string(),
            terminal: Terminal::Success,
        }
    }

    pub fn no_candidates(plaque_text: &str) -> Self {
        Self {
            plaque_text: plaque_text.to_string(),
            image_path: None,
            source: NO_URLS_STATUS.to_string(),
            location: UNKNOWN_LOCATION.to_string(),
            image_url: NO_URLS_IMAGE_URL.to_string(),
            terminal: Terminal::NoCandidates,
        }
    }

    pub fn exhausted(plaque_text: &str, location: &str) -> Self {
        Self {
            plaque_text: plaque_text.to_string(),
            image_path: None,
            source: EXHAUSTED_STATUS.to_string(),
            location: location.to_string(),
            image_url: String::new(),
            terminal: Terminal::Exhausted,
        }
    }

    pub fn aborted(plaque_text: &str, location: &str) -> Self {
        Self {
            plaque_text: plaque_text.to_string(),
            image_path: None,
            source: ABORTED_STATUS.to_string(),
            location: location.to_string(),
            image_url: String::new(),
            terminal: Terminal::Aborted,
        }
    }
}

#[derive(Debug, Default)]
struct TableInner {
    claimed: HashSet<String>,
    records: BTreeMap<String, OutcomeRecord>,
}

/// Painting name → outcome, shared by every dispatch in a batch.
///
/// Writers never touch the map directly: each painting's single write goes
/// through the [`ResultSlot`] claimed for it, and a slot can be claimed once.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    inner: Arc<Mutex<TableInner>>,
}

impl ResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the one write slot for `painting`.
    pub fn claim(&self, painting: &Painting) -> Result<ResultSlot, ModelError> {
        let mut inner = self.lock();
        if !inner.claimed.insert(painting.name.clone()) {
            return Err(ModelError::DuplicateSlot(painting.name.clone()));
        }
        Ok(ResultSlot {
            name: painting.name.clone(),
            plaque_text: painting.plaque_text.clone(),
            location: UNKNOWN_LOCATION.to_string(),
            table: self.clone(),
            filled: false,
        })
    }

    pub fn get(&self, name: &str) -> Option<OutcomeRecord> {
        self.lock().records.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all records written so far, ordered by painting name.
    pub fn snapshot(&self) -> BTreeMap<String, OutcomeRecord> {
        self.lock().records.clone()
    }

    fn insert(&self, name: String, record: OutcomeRecord) {
        self.lock().records.insert(name, record);
    }

    fn lock(&self) -> MutexGuard<'_, TableInner> {
        // A panicking writer cannot leave the map half-updated; keep going.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Write-once handle for one painting's entry in a [`ResultTable`].
///
/// `fill` consumes the slot. A slot dropped unfilled (its task panicked or
/// was cancelled) records an [`Terminal::Aborted`] outcome instead, so every
/// claimed painting ends the batch with exactly one record.
#[derive(Debug)]
pub struct ResultSlot {
    name: String,
    plaque_text: String,
    location: String,
    table: ResultTable,
    filled: bool,
}

impl ResultSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location to record if the slot is dropped unfilled.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn fill(mut self, record: OutcomeRecord) {
        self.filled = true;
        self.table.insert(std::mem::take(&mut self.name), record);
    }
}

impl Drop for ResultSlot {
    fn drop(&mut self) {
        if !self.filled {
            let record = OutcomeRecord::aborted(&self.plaque_text, &self.location);
            self.table.insert(std::mem::take(&mut self.name), record);
        }
    }
}
