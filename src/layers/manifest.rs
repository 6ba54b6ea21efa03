use serde::{Deserialize, Deserializer};

/// IIIF-like manifest as served by the archive's `/Integrate/GetJson`
/// endpoint. Only the fields the pipeline reads are modeled; everything
/// else in the document is ignored.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Manifest {
    pub label: Option<String>,
    #[serde(default)]
    pub sequences: Vec<Sequence>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Sequence {
    #[serde(default)]
    pub canvases: Vec<Canvas>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Canvas {
    pub label: Option<String>,
    #[serde(default, deserialize_with = "lenient_dimension")]
    pub height: Option<u64>,
    #[serde(default, deserialize_with = "lenient_dimension")]
    pub width: Option<u64>,
    #[serde(default)]
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ImageEntry {
    #[serde(default)]
    pub resource: ImageResource,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ImageResource {
    #[serde(rename = "@id")]
    pub id: Option<String>,
    pub service: Option<ImageService>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ImageService {
    #[serde(rename = "@id")]
    pub id: Option<String>,
}

/// The archive emits canvas dimensions as integers, numeric strings, or the
/// literal string "Unknown". Anything non-numeric decodes to `None`.
fn lenient_dimension<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// What the parser could recover from one manifest. `image_url` of `None`
/// means no downloadable image path was found; callers treat that as a
/// failed resolution regardless of the other fields.
#[derive(Debug, Clone, PartialEq)]
pub struct BestImage {
    pub image_url: Option<String>,
    pub label: String,
    pub height: Option<u64>,
    pub width: Option<u64>,
}

impl BestImage {
    fn empty(label: String) -> Self {
        BestImage {
            image_url: None,
            label,
            height: None,
            width: None,
        }
    }
}

/// Select the largest canvas in the manifest's first sequence and derive its
/// maximal-resolution image URL.
///
/// The scan is a linear fold with strict `>` on area, so ties keep the
/// earliest canvas, and a canvas with unknown or zero dimensions (area 0)
/// never wins. A service descriptor takes priority over the resource's own
/// `@id`: `{service}/full/max/0/default.jpg` asks the IIIF image server for
/// the maximum available resolution.
pub fn extract_best_image(manifest: &Manifest) -> BestImage {
    let label = manifest
        .label
        .clone()
        .unwrap_or_else(|| "Unknown".to_string());

    let canvases = match manifest.sequences.first() {
        Some(sequence) => &sequence.canvases,
        None => return BestImage::empty(label),
    };
    tracing::info!("Found {} canvases", canvases.len());

    let mut best: Option<&Canvas> = None;
    let mut best_area: u64 = 0;
    for canvas in canvases {
        let area = canvas
            .height
            .unwrap_or(0)
            .saturating_mul(canvas.width.unwrap_or(0));
        tracing::debug!(
            "Canvas label={:?} height={:?} width={:?}",
            canvas.label,
            canvas.height,
            canvas.width
        );
        if area > best_area {
            best_area = area;
            best = Some(canvas);
        }
    }

    let Some(canvas) = best else {
        return BestImage::empty(label);
    };

    let image_url = canvas.images.first().and_then(|entry| {
        let resource = &entry.resource;
        match resource.service.as_ref().and_then(|s| s.id.as_deref()) {
            Some(service_id) => Some(format!("{service_id}/full/max/0/default.jpg")),
            None => resource.id.clone(),
        }
    });

    BestImage {
        image_url,
        label,
        height: canvas.height,
        width: canvas.width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manifest(value: serde_json::Value) -> Manifest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn picks_largest_area_canvas() {
        let m = manifest(json!({
            "label": "山水",
            "sequences": [{"canvases": [
                {"height": 10, "width": 10, "images": [{"resource": {"@id": "https://x/small.jpg"}}]},
                {"height": 20, "width": 20, "images": [{"resource": {"@id": "https://x/large.jpg"}}]},
                {"height": 5, "width": 5, "images": [{"resource": {"@id": "https://x/tiny.jpg"}}]}
            ]}]
        }));
        let best = extract_best_image(&m);
        assert_eq!(best.image_url.as_deref(), Some("https://x/large.jpg"));
        assert_eq!(best.label, "山水");
        assert_eq!(best.height, Some(20));
        assert_eq!(best.width, Some(20));
    }

    #[test]
    fn tie_keeps_earliest_canvas() {
        let m = manifest(json!({
            "sequences": [{"canvases": [
                {"height": 10, "width": 10, "images": [{"resource": {"@id": "https://x/first.jpg"}}]},
                {"height": 10, "width": 10, "images": [{"resource": {"@id": "https://x/second.jpg"}}]}
            ]}]
        }));
        let best = extract_best_image(&m);
        assert_eq!(best.image_url.as_deref(), Some("https://x/first.jpg"));
    }

    #[test]
    fn service_id_gets_max_resolution_suffix() {
        let m = manifest(json!({
            "sequences": [{"canvases": [
                {"height": 2, "width": 2, "images": [{"resource": {
                    "@id": "https://x/fallback.jpg",
                    "service": {"@id": "https://x/y"}
                }}]}
            ]}]
        }));
        let best = extract_best_image(&m);
        assert_eq!(
            best.image_url.as_deref(),
            Some("https://x/y/full/max/0/default.jpg")
        );
    }

    #[test]
    fn resource_id_used_when_no_service() {
        let m = manifest(json!({
            "sequences": [{"canvases": [
                {"height": 2, "width": 2, "images": [{"resource": {"@id": "https://x/z.jpg"}}]}
            ]}]
        }));
        let best = extract_best_image(&m);
        assert_eq!(best.image_url.as_deref(), Some("https://x/z.jpg"));
    }

    #[test]
    fn missing_sequences_yields_label_only() {
        let m = manifest(json!({"label": "快雪時晴帖"}));
        let best = extract_best_image(&m);
        assert_eq!(best.image_url, None);
        assert_eq!(best.label, "快雪時晴帖");
        assert_eq!(best.height, None);
        assert_eq!(best.width, None);
    }

    #[test]
    fn label_defaults_to_unknown() {
        let m = manifest(json!({"sequences": []}));
        assert_eq!(extract_best_image(&m).label, "Unknown");
    }

    #[test]
    fn string_dimensions_parse_numerically() {
        let m = manifest(json!({
            "sequences": [{"canvases": [
                {"height": "3", "width": "4", "images": [{"resource": {"@id": "https://x/s.jpg"}}]}
            ]}]
        }));
        let best = extract_best_image(&m);
        assert_eq!(best.height, Some(3));
        assert_eq!(best.width, Some(4));
        assert_eq!(best.image_url.as_deref(), Some("https://x/s.jpg"));
    }

    #[test]
    fn non_numeric_dimensions_count_as_zero_area() {
        let m = manifest(json!({
            "sequences": [{"canvases": [
                {"height": "Unknown", "width": "Unknown", "images": [{"resource": {"@id": "https://x/u.jpg"}}]},
                {"height": 1, "width": 1, "images": [{"resource": {"@id": "https://x/one.jpg"}}]}
            ]}]
        }));
        let best = extract_best_image(&m);
        assert_eq!(best.image_url.as_deref(), Some("https://x/one.jpg"));
    }

    #[test]
    fn all_zero_area_selects_nothing() {
        let m = manifest(json!({
            "label": "blank",
            "sequences": [{"canvases": [
                {"height": "Unknown", "width": 9, "images": [{"resource": {"@id": "https://x/a.jpg"}}]},
                {"height": 0, "width": 9, "images": [{"resource": {"@id": "https://x/b.jpg"}}]}
            ]}]
        }));
        let best = extract_best_image(&m);
        assert_eq!(best.image_url, None);
        assert_eq!(best.label, "blank");
    }

    #[test]
    fn winner_without_images_keeps_dimensions_but_no_url() {
        let m = manifest(json!({
            "sequences": [{"canvases": [
                {"height": 30, "width": 30, "images": []},
                {"height": 2, "width": 2, "images": [{"resource": {"@id": "https://x/small.jpg"}}]}
            ]}]
        }));
        let best = extract_best_image(&m);
        assert_eq!(best.image_url, None);
        assert_eq!(best.height, Some(30));
        assert_eq!(best.width, Some(30));
    }
}
