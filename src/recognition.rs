use crate::config::ModelWeights;
use crate::types::BoundingBox;
use futures::future::{BoxFuture, FutureExt};
use image::{DynamicImage, ImageOutputFormat};
use log::debug;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Reads all text on an image, fragments concatenated in reading order.
pub trait TextRecognizer: Send + Sync {
    fn read<'a>(&'a self, image: &'a DynamicImage) -> BoxFuture<'a, Result<String, failure::Error>>;
}

/// Finds parking slots on an image.
pub trait Detector: Send + Sync {
    fn detect<'a>(
        &'a self,
        image: &'a DynamicImage,
    ) -> BoxFuture<'a, Result<Vec<BoundingBox>, failure::Error>>;
}

pub struct HttpTextRecognizer {
    client: reqwest::Client,
    url: Url,
}

impl HttpTextRecognizer {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        HttpTextRecognizer { client, url }
    }
}

impl TextRecognizer for HttpTextRecognizer {
    fn read<'a>(&'a self, image: &'a DynamicImage) -> BoxFuture<'a, Result<String, failure::Error>> {
        async move {
            let body = encode_png(image)?;
            debug!("Sending {} bytes to OCR service {}", body.len(), self.url);
            let json = self
                .client
                .post(self.url.clone())
                .header(CONTENT_TYPE, "image/png")
                .body(body)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await?;
            parse_ocr_response(&json)
        }
        .boxed()
    }
}

/// Calls the detection service with whatever weights are current at call time.
pub struct HttpDetector {
    client: reqwest::Client,
    url: Url,
    weights: Arc<ModelWeights>,
}

impl HttpDetector {
    pub fn new(client: reqwest::Client, url: Url, weights: Arc<ModelWeights>) -> Self {
        HttpDetector {
            client,
            url,
            weights,
        }
    }
}

impl Detector for HttpDetector {
    fn detect<'a>(
        &'a self,
        image: &'a DynamicImage,
    ) -> BoxFuture<'a, Result<Vec<BoundingBox>, failure::Error>> {
        async move {
            let body = encode_png(image)?;
            let weights = self.weights.current().await;
            debug!(
                "Sending {} bytes to detection service {} with weights {:?}",
                body.len(),
                self.url,
                weights
            );
            let json = self
                .client
                .post(self.url.clone())
                .query(&[("weights", weights.display().to_string())])
                .header(CONTENT_TYPE, "image/png")
                .body(body)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await?;
            parse_detections(&json)
        }
        .boxed()
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, failure::Error> {
    let mut data = vec![];
    image.write_to(&mut data, ImageOutputFormat::Png)?;
    Ok(data)
}

fn parse_ocr_response(json: &Value) -> Result<String, failure::Error> {
    let results = json["results"]
        .as_array()
        .ok_or_else(|| format_err!("Missing results in OCR response"))?;
    let mut text = String::new();
    for fragment in results {
        text.push_str(
            fragment
                .as_str()
                .ok_or_else(|| format_err!("Non-text OCR fragment {}", fragment))?,
        );
    }
    Ok(text)
}

fn parse_detections(json: &Value) -> Result<Vec<BoundingBox>, failure::Error> {
    let boxes = json["boxes"]
        .as_array()
        .ok_or_else(|| format_err!("Missing boxes in detection response"))?;
    boxes
        .iter()
        .map(|b| -> Result<BoundingBox, failure::Error> {
            let coord = |name: &str| {
                b[name]
                    .as_f64()
                    .map(|v| v as f32)
                    .ok_or_else(|| format_err!("Missing {} in box {}", name, b))
            };
            Ok(BoundingBox {
                class: b["class"]
                    .as_u64()
                    .ok_or_else(|| format_err!("Missing class in box {}", b))?,
                x1: coord("x1")?,
                y1: coord("y1")?,
                x2: coord("x2")?,
                y2: coord("y2")?,
                confidence: b["confidence"].as_f64().map(|c| c as f32),
            })
        })
        .collect()
}
