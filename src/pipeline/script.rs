//! Ad script generation and the hook/CTA heuristic used by renderers

use crate::constants::{DEFAULT_CTA, DEFAULT_HOOK};
use crate::models::Video;
use crate::services::llm::{ChatMessage, ChatModel, LlmError};

use super::extractor::ProductInfo;

const SCRIPT_SYSTEM_PROMPT: &str = "You are a UGC (User Generated Content) video script writer for TikTok. Create engaging, authentic scripts that feel like real people reviewing products. Keep it short (30-60 seconds), conversational, and enthusiastic. Include a hook, main points, and call-to-action.";

/// The product fields the LLM prompts are built from
#[derive(Debug, Clone, Copy)]
pub struct ProductBrief<'a> {
    pub name: &'a str,
    pub price: &'a str,
    pub description: &'a str,
}

impl<'a> ProductBrief<'a> {
    pub fn from_video(video: &'a Video) -> Self {
        Self {
            name: video.product_name.as_deref().unwrap_or_default(),
            price: video.product_price.as_deref().unwrap_or_default(),
            description: video.product_description.as_deref().unwrap_or_default(),
        }
    }

    pub fn from_product(product: &'a ProductInfo) -> Self {
        Self {
            name: &product.name,
            price: &product.price,
            description: &product.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedScript {
    pub hook: String,
    pub cta: String,
    pub subtitles: String,
}

/// Single LLM call; the reply is returned as-is.
pub async fn generate_script(
    chat: &dyn ChatModel,
    product: ProductBrief<'_>,
) -> Result<String, LlmError> {
    chat.complete(vec![
        ChatMessage::system(SCRIPT_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Create a UGC-style TikTok video script for this product:\n\nName: {}\nPrice: {}\nDescription: {}\n\nMake it sound natural and exciting!",
            product.name, product.price, product.description
        )),
    ])
    .await
}

/// First non-empty line is the hook, last is the call to action.
pub fn parse_script(script: &str) -> ParsedScript {
    let mut lines = script.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.next();
    let last = lines.last().or(first);

    ParsedScript {
        hook: first.unwrap_or(DEFAULT_HOOK).to_string(),
        cta: last.unwrap_or(DEFAULT_CTA).to_string(),
        subtitles: script.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingChat {
        seen: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl ChatModel for RecordingChat {
        async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, LlmError> {
            self.seen.lock().unwrap().extend(messages);
            Ok("Stop scrolling!\nIt glows.\nGrab yours".to_string())
        }
    }

    #[test]
    fn hook_and_cta_come_from_outer_lines() {
        let parsed = parse_script("\nStop scrolling!\n\nIt glows.\nIt folds.\n  Grab yours now  \n");
        assert_eq!(parsed.hook, "Stop scrolling!");
        assert_eq!(parsed.cta, "Grab yours now");
        assert!(parsed.subtitles.contains("It folds."));
    }

    #[test]
    fn single_line_is_both_hook_and_cta() {
        let parsed = parse_script("Buy it");
        assert_eq!(parsed.hook, "Buy it");
        assert_eq!(parsed.cta, "Buy it");
    }

    #[test]
    fn empty_script_uses_defaults() {
        let parsed = parse_script("  \n\n");
        assert_eq!(parsed.hook, "You need this");
        assert_eq!(parsed.cta, "Shop now");
    }

    #[tokio::test]
    async fn prompt_embeds_product_fields() {
        let chat = RecordingChat {
            seen: Mutex::new(Vec::new()),
        };
        let script = generate_script(
            &chat,
            ProductBrief {
                name: "Glow Lamp",
                price: "$24.50",
                description: "A lamp that glows",
            },
        )
        .await
        .unwrap();

        assert!(script.starts_with("Stop scrolling!"));
        let seen = chat.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].content.contains("Name: Glow Lamp"));
        assert!(seen[1].content.contains("Price: $24.50"));
    }
}
