use std::sync::Once;

use anyhow::Result;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use reqwest::Client;

use crate::layers::manifest::Manifest;

pub const ARCHIVE_BASE_URL: &str = "https://digitalarchive.npm.gov.tw";
pub const TOTAL_PAGES: u32 = 1200;
const PAGE_SIZE: u32 = 15;
const DETAIL_MARKER: &str = "/Collection/Detail/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static TLS_WARNING: Once = Once::new();

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub base_url: String,
    pub total_pages: u32,
    /// The archive's certificate chain does not validate, so verification
    /// is skipped for this host by default. Scoped to this client only.
    pub accept_invalid_certs: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig {
            base_url: ARCHIVE_BASE_URL.to_string(),
            total_pages: TOTAL_PAGES,
            accept_invalid_certs: true,
        }
    }
}

/// Identifiers needed to request an object's manifest, parsed from a
/// detail-page href.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub id: String,
    pub department: String,
}

impl ObjectRef {
    /// Query keys `id` and `dep` win; a link without `id` falls back to its
    /// last path segment, and a missing `dep` defaults to "P" (paintings).
    pub fn from_detail_link(link: &str) -> Self {
        let (path, query) = match link.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (link, None),
        };

        let mut id = None;
        let mut department = None;
        if let Some(query) = query {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                match key.as_ref() {
                    "id" => id = Some(value.into_owned()),
                    "dep" => department = Some(value.into_owned()),
                    _ => {}
                }
            }
        }

        ObjectRef {
            id: id.unwrap_or_else(|| {
                path.rsplit('/').next().unwrap_or_default().to_string()
            }),
            department: department.unwrap_or_else(|| "P".to_string()),
        }
    }
}

pub struct ArchiveClient {
    client: Client,
    config: ArchiveConfig,
}

impl ArchiveClient {
    pub fn new(config: ArchiveConfig) -> Result<Self> {
        if config.accept_invalid_certs {
            // Warn once per process, not per request.
            TLS_WARNING.call_once(|| {
                tracing::warn!(
                    "TLS certificate verification disabled for {}",
                    config.base_url
                );
            });
        }
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(ArchiveClient { client, config })
    }

    pub fn total_pages(&self) -> u32 {
        self.config.total_pages
    }

    /// POST one page of the painting search and scrape every detail-page
    /// href from the returned HTML fragment. Any network or parse failure
    /// yields an empty list, never an error.
    pub async fn fetch_page(&self, page: u32) -> Vec<String> {
        let search_url = format!("{}/Collection/Search", self.config.base_url);
        let payload = serde_json::json!({
            "CategoryRegisterType": "'繪畫',",
            "PageInfo": {"PageIndex": page, "PageSize": PAGE_SIZE, "PageMode": "Grid"}
        });

        tracing::info!("Fetching search snippet: page {} / {}", page, self.config.total_pages);
        let response = self
            .client
            .post(&search_url)
            .header("X-Requested-With", "XMLHttpRequest")
            .json(&payload)
            .send()
            .await;

        let html = match response {
            Ok(resp) => {
                if !resp.status().is_success() {
                    tracing::warn!("Search request failed: {}", resp.status());
                    return Vec::new();
                }
                match resp.text().await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to read search response: {e}");
                        return Vec::new();
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Search request failed: {e}");
                return Vec::new();
            }
        };

        extract_detail_links(&html)
    }

    /// GET the manifest JSON for one object. Returns `None` on any network
    /// or decode failure; the caller treats that as "no artifact".
    pub async fn fetch_manifest(&self, object: &ObjectRef) -> Option<Manifest> {
        let url = format!(
            "{}/Integrate/GetJson?cid={}&dept={}",
            self.config.base_url,
            urlencoding::encode(&object.id),
            urlencoding::encode(&object.department)
        );
        tracing::info!("Calling JSON API: {url}");

        match self.client.get(&url).send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    tracing::warn!("Manifest request failed: {}", resp.status());
                    return None;
                }
                match resp.json::<Manifest>().await {
                    Ok(manifest) => Some(manifest),
                    Err(e) => {
                        tracing::warn!("Error decoding manifest: {e}");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Error fetching manifest: {e}");
                None
            }
        }
    }
}

/// Collect hrefs of `<a>` tags pointing at detail pages. The search snippet
/// is HTML, not XML, so the reader runs with end-name checking off and
/// unmatched end tags allowed; a hard parse error keeps whatever was
/// collected before it.
fn extract_detail_links(html: &str) -> Vec<String> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text(true);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;

    let mut links = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.name().as_ref().eq_ignore_ascii_case(b"a") =>
            {
                for attr in e.attributes().flatten() {
                    if !attr.key.as_ref().eq_ignore_ascii_case(b"href") {
                        continue;
                    }
                    // Unescape so &amp;-joined query strings come out intact.
                    let Ok(href) = attr.unescape_value() else {
                        continue;
                    };
                    if href.contains(DETAIL_MARKER) {
                        links.push(href.into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(
                    "HTML parsing stopped at position {}: {e:?}",
                    reader.buffer_position()
                );
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    links
}
