use serde::Serialize;

/// One successfully resolved painting. `image_url` is always non-empty;
/// a manifest without a usable image never produces an Artifact.
#[derive(Debug, Serialize, Clone)]
pub struct Artifact {
    pub cc_title: String,
    pub title: String,
    pub image_url: String,
    pub height: Option<u64>,
    pub width: Option<u64>,
}

pub mod archive;
pub mod manifest;
pub mod resolver;
pub mod server;
