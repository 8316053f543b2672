//! Product extraction from a shop page.
//!
//! Never fails once the URL itself is valid: fetch or parse problems degrade
//! to fixed fallback content so the rest of the pipeline can proceed.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER, USER_AGENT};
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::ExtractionMode;
use crate::constants::{
    FALLBACK_PRODUCT_DESCRIPTION, FALLBACK_PRODUCT_NAME, FALLBACK_PRODUCT_PRICE,
    LLM_HTML_CHAR_LIMIT, LLM_TEXT_PRODUCT_NAME, LLM_TEXT_PRODUCT_PRICE, MAX_DESCRIPTION_CHARS,
    MAX_PRODUCT_IMAGES, MAX_TITLE_CHARS, SCRAPE_TIMEOUT_SECS,
};
use crate::pipeline::PipelineError;
use crate::services::llm::{ChatMessage, ChatModel};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15";

const EXTRACT_SYSTEM_PROMPT: &str = "Extract product info from HTML. Return JSON with: name, price, description. If missing, estimate reasonable values.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductInfo {
    pub name: String,
    pub price: String,
    pub description: String,
    pub images: Vec<String>,
}

impl ProductInfo {
    pub fn fallback() -> Self {
        Self {
            name: FALLBACK_PRODUCT_NAME.to_string(),
            price: FALLBACK_PRODUCT_PRICE.to_string(),
            description: FALLBACK_PRODUCT_DESCRIPTION.to_string(),
            images: Vec::new(),
        }
    }
}

/// Where the product data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    /// Open Graph / meta tags
    Html,
    /// LLM returned structured JSON
    Llm,
    /// LLM answered in prose; its text became the description
    LlmText,
    /// Page could not be fetched or read
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub product: ProductInfo,
    pub source: ExtractionSource,
}

/// What the LLM handed back for an extraction prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmProduct {
    Json {
        name: Option<String>,
        price: Option<String>,
        description: Option<String>,
    },
    Text(String),
}

/// Fields read straight from the markup
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HtmlProduct {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    pub images: Vec<String>,
}

pub fn validate_url(raw: &str) -> Result<Url, PipelineError> {
    let url = Url::parse(raw.trim()).map_err(|_| PipelineError::InvalidUrl(raw.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(PipelineError::InvalidUrl(raw.to_string())),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn attr_values(doc: &Html, css: &str, attr: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(css) else {
        return Vec::new();
    };
    doc.select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .filter_map(non_empty)
        .collect()
}

fn first_attr(doc: &Html, css: &str, attr: &str) -> Option<String> {
    attr_values(doc, css, attr).into_iter().next()
}

fn first_text(doc: &Html, css: &str) -> Option<String> {
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| non_empty(&el.text().collect::<String>()))
}

/// First `$12.99`-style amount in the text
fn find_price(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        if !matches!(c, '$' | '€' | '£') {
            continue;
        }
        let amount: String = chars[i + 1..]
            .iter()
            .take_while(|ch| ch.is_ascii_digit() || **ch == '.' || **ch == ',')
            .collect();
        let amount = amount.trim_end_matches(['.', ',']);
        if amount.starts_with(|ch: char| ch.is_ascii_digit()) {
            return Some(format!("{}{}", c, amount));
        }
    }
    None
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        _ => None,
    }
}

/// Parse Open Graph and meta tags out of a page
pub fn parse_html(html: &str, page_url: &Url) -> HtmlProduct {
    let doc = Html::parse_document(html);

    let title = first_attr(&doc, r#"meta[property="og:title"]"#, "content")
        .or_else(|| first_text(&doc, "title"))
        .map(|t| truncate_chars(&t, MAX_TITLE_CHARS));

    let description = first_attr(&doc, r#"meta[property="og:description"]"#, "content")
        .or_else(|| first_attr(&doc, r#"meta[name="description"]"#, "content"))
        .map(|d| truncate_chars(&d, MAX_DESCRIPTION_CHARS));

    let price = first_attr(&doc, r#"meta[property="product:price:amount"]"#, "content")
        .or_else(|| first_attr(&doc, r#"meta[property="og:price:amount"]"#, "content"))
        .map(|amount| {
            let currency = first_attr(&doc, r#"meta[property="product:price:currency"]"#, "content")
                .or_else(|| first_attr(&doc, r#"meta[property="og:price:currency"]"#, "content"));
            match currency.as_deref().and_then(currency_symbol) {
                Some(symbol) => format!("{}{}", symbol, amount),
                None => amount,
            }
        })
        .or_else(|| {
            let body = Selector::parse("body").ok()?;
            let text: String = doc
                .select(&body)
                .next()?
                .text()
                .collect::<Vec<_>>()
                .join(" ");
            find_price(&text)
        });

    let mut images: Vec<String> = Vec::new();
    let og_images = attr_values(&doc, r#"meta[property="og:image"]"#, "content")
        .into_iter()
        .filter_map(|src| page_url.join(&src).ok().map(String::from));
    let img_tags = attr_values(&doc, "img", "src")
        .into_iter()
        .filter(|src| src.starts_with("http://") || src.starts_with("https://"));
    for src in og_images.chain(img_tags) {
        if images.len() >= MAX_PRODUCT_IMAGES {
            break;
        }
        if !images.contains(&src) {
            images.push(src);
        }
    }

    HtmlProduct {
        title,
        description,
        price,
        images,
    }
}

fn value_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Interpret an extraction reply as JSON, tolerating a fenced code block
pub fn parse_llm_product(reply: &str) -> LlmProduct {
    let trimmed = reply.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    match serde_json::from_str::<Value>(unfenced) {
        Ok(Value::Object(obj)) => LlmProduct::Json {
            name: value_text(obj.get("name")),
            price: value_text(obj.get("price")),
            description: value_text(obj.get("description")),
        },
        _ => LlmProduct::Text(reply.to_string()),
    }
}

pub struct ProductExtractor {
    http: Client,
    chat: Option<Arc<dyn ChatModel>>,
    mode: ExtractionMode,
}

impl ProductExtractor {
    pub fn new(http: Client, chat: Option<Arc<dyn ChatModel>>, mode: ExtractionMode) -> Self {
        Self { http, chat, mode }
    }

    async fn fetch(&self, url: &Url) -> Result<String, String> {
        let resp = self
            .http
            .get(url.as_str())
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .header(REFERER, "https://www.tiktok.com/")
            .timeout(Duration::from_secs(SCRAPE_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("text/html")
            .to_ascii_lowercase();
        if !content_type.contains("html") {
            return Err(format!("non-HTML response ({})", content_type));
        }

        resp.text().await.map_err(|e| e.to_string())
    }

    async fn extract_with_llm(
        &self,
        chat: &dyn ChatModel,
        html: &str,
        images: Vec<String>,
    ) -> Result<Extraction, String> {
        let excerpt = truncate_chars(html, LLM_HTML_CHAR_LIMIT);
        let reply = chat
            .complete(vec![
                ChatMessage::system(EXTRACT_SYSTEM_PROMPT),
                ChatMessage::user(format!(
                    "Extract from HTML (first {} chars):\n\n{}",
                    LLM_HTML_CHAR_LIMIT, excerpt
                )),
            ])
            .await
            .map_err(|e| e.to_string())?;

        Ok(match parse_llm_product(&reply) {
            LlmProduct::Json {
                name,
                price,
                description,
            } => Extraction {
                product: ProductInfo {
                    name: name.unwrap_or_default(),
                    price: price.unwrap_or_default(),
                    description: description.unwrap_or_default(),
                    images,
                },
                source: ExtractionSource::Llm,
            },
            LlmProduct::Text(text) => Extraction {
                product: ProductInfo {
                    name: LLM_TEXT_PRODUCT_NAME.to_string(),
                    price: LLM_TEXT_PRODUCT_PRICE.to_string(),
                    description: non_empty(&text)
                        .unwrap_or_else(|| "Product from TikTok Shop".to_string()),
                    images,
                },
                source: ExtractionSource::LlmText,
            },
        })
    }

    async fn try_extract(&self, url: &Url) -> Result<Extraction, String> {
        let html = self.fetch(url).await?;
        let parsed = parse_html(&html, url);

        let use_llm = match self.mode {
            ExtractionMode::Llm => true,
            ExtractionMode::Html => parsed.title.is_none(),
        };

        if use_llm {
            if let Some(chat) = &self.chat {
                return self.extract_with_llm(chat.as_ref(), &html, parsed.images).await;
            }
        }

        let name = parsed
            .title
            .ok_or_else(|| "no product title in page".to_string())?;
        Ok(Extraction {
            product: ProductInfo {
                name,
                price: parsed.price.unwrap_or_default(),
                description: parsed.description.unwrap_or_default(),
                images: parsed.images,
            },
            source: ExtractionSource::Html,
        })
    }

    /// Best-effort extraction. Only an invalid URL is an error.
    pub async fn extract(&self, raw_url: &str) -> Result<Extraction, PipelineError> {
        let url = validate_url(raw_url)?;

        Ok(match self.try_extract(&url).await {
            Ok(extraction) => {
                tracing::info!(url = %url, source = ?extraction.source, "[extractor] product extracted");
                extraction
            }
            Err(reason) => {
                tracing::warn!(url = %url, reason, "[extractor] scraping failed, using fallback data");
                Extraction {
                    product: ProductInfo::fallback(),
                    source: ExtractionSource::Fallback,
                }
            }
        })
    }
}
