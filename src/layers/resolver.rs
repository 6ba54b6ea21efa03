use std::sync::Mutex;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::layers::archive::{ArchiveClient, ObjectRef};
use crate::layers::manifest::{extract_best_image, Manifest};
use crate::layers::Artifact;

const ATTRIBUTION: &str = "The National Palace Museum, Taipei, CC BY 4.0 @ www.npm.gov.tw";

/// Why a resolution produced no artifact. The HTTP layer collapses all of
/// these into one generic 500; the distinction only shows up in logs.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("search returned no detail links")]
    NoLinks,
    #[error("manifest fetch failed")]
    ManifestFetch,
    #[error("manifest has no usable image")]
    NoImage,
}

/// Seam between the resolver and the archive, so the pipeline can run
/// against a stub in tests.
#[async_trait]
pub trait Archive: Send + Sync {
    fn total_pages(&self) -> u32;
    async fn fetch_page(&self, page: u32) -> Vec<String>;
    async fn fetch_manifest(&self, object: &ObjectRef) -> Option<Manifest>;
}

#[async_trait]
impl Archive for ArchiveClient {
    fn total_pages(&self) -> u32 {
        ArchiveClient::total_pages(self)
    }

    async fn fetch_page(&self, page: u32) -> Vec<String> {
        ArchiveClient::fetch_page(self, page).await
    }

    async fn fetch_manifest(&self, object: &ObjectRef) -> Option<Manifest> {
        ArchiveClient::fetch_manifest(self, object).await
    }
}

pub struct Resolver<A, R = StdRng> {
    archive: A,
    rng: Mutex<R>,
}

impl<A: Archive> Resolver<A> {
    pub fn new(archive: A) -> Self {
        Resolver::with_rng(archive, StdRng::from_os_rng())
    }
}

impl<A: Archive, R: Rng + Send> Resolver<A, R> {
    /// Injectable RNG so page and link choice are deterministic under test.
    pub fn with_rng(archive: A, rng: R) -> Self {
        Resolver {
            archive,
            rng: Mutex::new(rng),
        }
    }

    // Never held across an await.
    fn draw<T>(&self, f: impl FnOnce(&mut R) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    /// One end-to-end resolution: random search page, random detail link,
    /// manifest fetch, best-image extraction. Each step short-circuits; no
    /// retries.
    pub async fn resolve_random_artifact(&self) -> Result<Artifact, ResolveError> {
        let total_pages = self.archive.total_pages().max(1);
        let page = self.draw(|rng| rng.random_range(1..=total_pages));

        let links = self.archive.fetch_page(page).await;
        if links.is_empty() {
            return Err(ResolveError::NoLinks);
        }

        let index = self.draw(|rng| rng.random_range(0..links.len()));
        let link = &links[index];
        tracing::info!("Chosen link #{} (of {}): {}", index + 1, links.len(), link);

        let object = ObjectRef::from_detail_link(link);
        let manifest = self
            .archive
            .fetch_manifest(&object)
            .await
            .ok_or(ResolveError::ManifestFetch)?;

        let best = extract_best_image(&manifest);
        let image_url = best.image_url.ok_or(ResolveError::NoImage)?;
        tracing::info!("Image URL: {image_url}");

        Ok(Artifact {
            cc_title: format!("{} {ATTRIBUTION}", best.label),
            title: best.label,
            image_url,
            height: best.height,
            width: best.width,
        })
    }
}
