//! Per-painting tiered dispatch.
//!
//! Candidate URLs are tried in three tiers: the trusted encyclopedic
//! source, then known institutions, then everything else. URLs are tried
//! strictly one after another in list order; the first saved image ends
//! the dispatch. A URL that fails in one tier is never tried again.

use crate::browser::Browser;
use crate::error::AcquireError;
use crate::gatekeeper::{Gatekeeper, ReadyPage};
use crate::normalize::normalize_image;
use crate::output::save_image;
use crate::retrieval::ImageFetcher;
use crate::{selector, srcset};
use gallery_model::{OutcomeRecord, Painting, ScrapeConfig};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    PrimarySource,
    KnownSources,
    Remaining,
}

impl Tier {
    pub const ORDER: [Tier; 3] = [Tier::PrimarySource, Tier::KnownSources, Tier::Remaining];
}

/// An image saved from one candidate page.
#[derive(Debug, Clone, PartialEq)]
pub struct SavedImage {
    pub path: PathBuf,
    /// Direct URL the image bytes came from.
    pub image_url: String,
}

/// Runs the tiered search for one painting at a time. Cheap to share
/// across tasks behind an `Arc`.
pub struct Dispatcher {
    browser: Arc<dyn Browser>,
    fetcher: Arc<dyn ImageFetcher>,
    gatekeeper: Gatekeeper,
    config: Arc<ScrapeConfig>,
}

impl Dispatcher {
    pub fn new(
        browser: Arc<dyn Browser>,
        fetcher: Arc<dyn ImageFetcher>,
        config: Arc<ScrapeConfig>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            gatekeeper: Gatekeeper::new(&config)?,
            browser,
            fetcher,
            config,
        })
    }

    /// Location label from the first candidate URL naming a known institution.
    pub fn inferred_location(&self, painting: &Painting) -> String {
        self.config
            .infer_location(painting.usable_urls().unwrap_or_default())
    }

    /// Produce the outcome for `painting`. Never fails: every candidate
    /// error is absorbed and at worst an `exhausted` record comes back.
    pub async fn dispatch(&self, painting: &Painting) -> OutcomeRecord {
        let Some(urls) = painting.usable_urls() else {
            tracing::warn!(painting = %painting.name, error = %AcquireError::NoCandidates, "Skipping painting");
            return OutcomeRecord::no_candidates(&painting.plaque_text);
        };

        let inferred_location = self.config.infer_location(urls);
        let mut invalid: HashSet<&str> = HashSet::new();

        for tier in Tier::ORDER {
            tracing::debug!(painting = %painting.name, tier = ?tier, "Entering tier");

            for url in urls {
                if invalid.contains(url.as_str()) {
                    continue;
                }
                let tier_location = match tier {
                    Tier::PrimarySource if !self.config.is_trusted(url) => continue,
                    Tier::KnownSources => match self.config.institution_for(url) {
                        Some(institution) => Some(institution.name.as_str()),
                        None => continue,
                    },
                    _ => None,
                };

                match self.attempt(painting, url).await {
                    Ok(saved) => {
                        tracing::info!(
                            painting = %painting.name,
                            tier = ?tier,
                            page = %url,
                            image = %saved.image_url,
                            "Found image"
                        );
                        let location = tier_location.unwrap_or(&inferred_location);
                        return OutcomeRecord::success(
                            &painting.plaque_text,
                            saved.path,
                            &urls[0],
                            location,
                            &saved.image_url,
                        );
                    }
                    Err(e) => {
                        tracing::debug!(painting = %painting.name, tier = ?tier, url = %url, error = %e, "Candidate failed");
                        invalid.insert(url.as_str());
                    }
                }
            }
        }

        tracing::warn!(painting = %painting.name, candidates = urls.len(), "Could not find a valid image");
        OutcomeRecord::exhausted(&painting.plaque_text, &inferred_location)
    }

    /// Open one candidate page, extract its main image and save it.
    pub async fn attempt(&self, painting: &Painting, url: &str) -> Result<SavedImage, AcquireError> {
        let page = self.gatekeeper.open(self.browser.as_ref(), url).await?;
        let result = self.extract(&page, &painting.name).await;
        page.close().await;
        result
    }

    async fn extract(&self, page: &ReadyPage, name: &str) -> Result<SavedImage, AcquireError> {
        let images = page.session().images().await?;
        let Some(top) = selector::largest_image(&images) else {
            tracing::warn!(painting = %name, url = %page.url(), "No valid images found on page");
            return Err(AcquireError::NoImageOnPage);
        };

        let download = srcset::resolve(top, page.base_url(), self.fetcher.as_ref())
            .await
            .ok_or(AcquireError::NoImageOnPage)?;

        let (bytes, extension) = normalize_image(download.bytes, download.extension);
        let path = save_image(&self.config.output_dir, name, &bytes, &extension).await?;
        Ok(SavedImage {
            path,
            image_url: download.url,
        })
    }
}
