//! Receipt extraction and store suggestions backed by an image-understanding model.
//!
//! The rest of the crate only sees the [`ReceiptExtractor`] and [`StoreAdvisor`]
//! traits, so the aggregation and charting code can be tested without any
//! network access. [`GeminiClient`] is the production implementation: a
//! blocking client for the Generative Language REST API.
//!
//! ### Notes
//! - Calls are single-shot: no retries. A failure surfaces once to the caller.
//! - The model may answer with Markdown code fences around the JSON; those are stripped.
//! - Numbers are sometimes returned as strings (`"2.50"`); both are accepted.
//!
//! Typical usage:
//! ```no_run
//! # use shoptrack::api::{GeminiClient, ReceiptExtractor, ReceiptImage};
//! # use shoptrack::config::Config;
//! let cfg = Config::load(None)?;
//! let client = GeminiClient::new(&cfg.extraction)?;
//! let items = client.extract_items(&ReceiptImage::from_path("receipt.jpg")?)?;
//! # Ok::<(), shoptrack::error::TrackerError>(())
//! ```

use crate::config::ExtractionConfig;
use crate::error::{Result, TrackerError};
use crate::models::{PurchaseRecord, RawScannedItem, ScannedItem};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

pub const MSG_NO_RESPONSE: &str = "No response from AI. Please try again.";
pub const MSG_UNPARSEABLE: &str = "Failed to parse AI response. The receipt might be unclear.";
pub const MSG_BAD_FORMAT: &str = "Invalid response format. Please try again with a clearer image.";
pub const MSG_NO_VALID_ITEMS: &str =
    "No valid items found on the receipt. Please try again with a clearer image.";
pub const MSG_BAD_IMAGE: &str = "Invalid image format. Please try capturing the receipt again.";
pub const MSG_NO_API_KEY: &str = "API key not configured. Please check your settings.";
pub const MSG_QUOTA: &str = "API quota exceeded. Please try again later.";
pub const MSG_ANALYZE_FAILED: &str =
    "Failed to analyze receipt. The image might be unclear or the format is not supported.";

/// Turns a receipt photo into line items.
pub trait ReceiptExtractor {
    fn extract_items(&self, image: &ReceiptImage) -> Result<Vec<ScannedItem>>;
}

/// Suggests where to buy an item, given the user's past purchases of it.
pub trait StoreAdvisor {
    fn suggest_store(&self, item_name: &str, history: &[PurchaseRecord]) -> Result<String>;
}

/// An encoded image plus its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ReceiptImage {
    /// Read an image file; the MIME type comes from the extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let mime_type = match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "heic" => "image/heic",
            "heif" => "image/heif",
            _ => {
                return Err(TrackerError::validation(format!(
                    "unsupported image type for {} (use jpg, png, webp or heic)",
                    path.display()
                )));
            }
        };
        let bytes = std::fs::read(path)?;
        if bytes.is_empty() {
            return Err(TrackerError::Extraction(MSG_BAD_IMAGE.to_string()));
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    /// Parse a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let bad = || TrackerError::Extraction(MSG_BAD_IMAGE.to_string());
        let (header, payload) = url.split_once(',').ok_or_else(bad)?;
        let mime_type = header
            .strip_prefix("data:")
            .and_then(|h| h.strip_suffix(";base64"))
            .filter(|m| !m.is_empty())
            .ok_or_else(bad)?;
        let bytes = STANDARD.decode(payload.trim()).map_err(|_| bad())?;
        if bytes.is_empty() {
            return Err(bad());
        }
        Ok(Self {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z]*\s*(.*?)\s*```\s*$").expect("valid code fence regex")
});

/// Parse the model's JSON answer into validated line items.
///
/// Missing quantities default to 1. Items with an empty name, a non-positive
/// price or a non-positive quantity are dropped.
pub fn parse_receipt_items(text: &str) -> Result<Vec<ScannedItem>> {
    let text = text.trim();
    if text.is_empty() {
        return Err(TrackerError::Extraction(MSG_NO_RESPONSE.to_string()));
    }
    let body = CODE_FENCE
        .captures(text)
        .and_then(|c| c.get(1))
        .map_or(text, |m| m.as_str());

    let v: Value = serde_json::from_str(body).map_err(|e| {
        log::warn!("unparseable extraction response: {e}");
        TrackerError::Extraction(MSG_UNPARSEABLE.to_string())
    })?;
    let raw_items = v
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| TrackerError::Extraction(MSG_BAD_FORMAT.to_string()))?;

    let total = raw_items.len();
    let items: Vec<ScannedItem> = raw_items
        .iter()
        .filter_map(|item| serde_json::from_value::<RawScannedItem>(item.clone()).ok())
        .filter_map(RawScannedItem::into_valid)
        .collect();
    log::debug!("receipt: kept {} of {} extracted line items", items.len(), total);

    if items.is_empty() {
        return Err(TrackerError::Extraction(MSG_NO_VALID_ITEMS.to_string()));
    }
    Ok(items)
}

const RECEIPT_PROMPT: &str = "Analyze the provided receipt image. Extract every distinct line item, including its name, quantity, and total price.
- Ignore any taxes, totals, subtotals, discounts, or non-item lines.
- If quantity is not explicitly mentioned for an item, assume it is 1.
- Ensure the price is a number.
- Return the data as a JSON object.";

fn receipt_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "items": {
                "type": "ARRAY",
                "description": "A list of items found on the receipt.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING", "description": "The name of the purchased item." },
                        "quantity": { "type": "NUMBER", "description": "The quantity of the item purchased." },
                        "price": { "type": "NUMBER", "description": "The total price for this line item." }
                    },
                    "required": ["name", "quantity", "price"]
                }
            }
        },
        "required": ["items"]
    })
}

/// Build the store-suggestion prompt; past purchases are listed cheapest first.
pub fn store_prompt(item_name: &str, history: &[PurchaseRecord]) -> String {
    let history_text = if history.is_empty() {
        "No purchase history available.".to_string()
    } else {
        let mut sorted: Vec<&PurchaseRecord> = history.iter().collect();
        sorted.sort_by(|a, b| a.price.total_cmp(&b.price));
        let lines: Vec<String> = sorted
            .iter()
            .map(|p| {
                format!(
                    "- At {} for ${:.2} on {}",
                    p.store,
                    p.price,
                    p.date.format("%Y-%m-%d")
                )
            })
            .collect();
        format!("The user has bought this item before:\n{}", lines.join("\n"))
    };

    format!(
        "For the shopping item \"{item_name}\", suggest the cheapest store in Singapore to buy it from.
First, consider the user's past purchase history provided below to see which store has been cheapest.
Then, search the web for current prices and promotions in Singaporean stores like FairPrice, Cold Storage, Giant, Sheng Siong, etc.
Based on both the history and the web search, provide a single store suggestion and a brief, one-sentence reason for why it's the cheapest option now.

User's Purchase History for \"{item_name}\":
{history_text}

Your suggestion should be concise. For example: \"FairPrice, as it was the cheapest in your history and current promotions confirm it's a good price.\""
    )
}

// Allow -, _, . unescaped in model ids (e.g. "gemini-2.5-flash")
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// Blocking client for the Generative Language `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    pub base_url: String,
    model: String,
    api_key: String,
    http: HttpClient,
}

impl GeminiClient {
    /// Fails with a configuration error when no API key is set.
    pub fn new(cfg: &ExtractionConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TrackerError::Config(MSG_NO_API_KEY.to_string()))?;
        let mut builder = HttpClient::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs)) // total request timeout
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("shoptrack/", env!("CARGO_PKG_VERSION")));
        if is_loopback(&cfg.base_url) {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key,
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url,
            percent_encoding::utf8_percent_encode(self.model.trim(), SAFE)
        )
    }

    /// POST a request body and return the concatenated text parts of the first candidate.
    fn generate(&self, body: &Value) -> Result<String> {
        let url = self.endpoint();
        log::debug!("POST {url}");
        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().unwrap_or_default();
            log::warn!("generateContent failed with HTTP {status}: {detail}");
            return Err(status_error(status));
        }

        let v: Value = resp.json()?;
        Ok(candidate_text(&v))
    }
}

/// Local endpoints (test servers, self-hosted gateways) are reached directly.
fn is_loopback(base_url: &str) -> bool {
    let rest = base_url
        .split_once("://")
        .map_or(base_url, |(_, rest)| rest);
    rest.starts_with("127.0.0.1") || rest.starts_with("localhost") || rest.starts_with("[::1]")
}

fn status_error(status: StatusCode) -> TrackerError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => TrackerError::Extraction(MSG_QUOTA.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TrackerError::Config(MSG_NO_API_KEY.to_string())
        }
        _ => TrackerError::Extraction(MSG_ANALYZE_FAILED.to_string()),
    }
}

/// Concatenate `candidates[0].content.parts[*].text`.
fn candidate_text(v: &Value) -> String {
    v.pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

impl ReceiptExtractor for GeminiClient {
    fn extract_items(&self, image: &ReceiptImage) -> Result<Vec<ScannedItem>> {
        if image.bytes.is_empty() {
            return Err(TrackerError::Extraction(MSG_BAD_IMAGE.to_string()));
        }
        let body = json!({
            "contents": [{
                "parts": [
                    { "text": RECEIPT_PROMPT },
                    { "inline_data": { "mime_type": image.mime_type, "data": image.to_base64() } }
                ]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": receipt_schema()
            }
        });
        let text = self.generate(&body)?;
        parse_receipt_items(&text)
    }
}

impl StoreAdvisor for GeminiClient {
    fn suggest_store(&self, item_name: &str, history: &[PurchaseRecord]) -> Result<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": store_prompt(item_name, history) }] }],
            "tools": [{ "google_search": {} }]
        });
        Ok(self.generate(&body)?.trim().to_string())
    }
}
