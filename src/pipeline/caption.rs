//! Caption and hashtag generation for a finished video

use crate::services::llm::{ChatMessage, ChatModel, LlmError};

use super::script::ProductBrief;

const CAPTION_SYSTEM_PROMPT: &str = "You are a TikTok caption and hashtag expert. Create engaging captions with viral hashtags. Keep captions short, punchy, and include relevant emojis. Generate 10-15 hashtags mixing popular and niche tags.";

pub async fn generate_caption(
    chat: &dyn ChatModel,
    product: ProductBrief<'_>,
) -> Result<String, LlmError> {
    chat.complete(vec![
        ChatMessage::system(CAPTION_SYSTEM_PROMPT),
        ChatMessage::user(format!(
            "Create a TikTok caption and hashtags for this product: {}\n\nDescription: {}",
            product.name, product.description
        )),
    ])
    .await
}

/// `#tag` tokens in order of first appearance, duplicates removed
pub fn extract_hashtags(caption: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    let mut rest = caption;

    while let Some(pos) = rest.find('#') {
        let after = &rest[pos + 1..];
        let len: usize = after
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum();

        if len > 0 {
            let tag = format!("#{}", &after[..len]);
            if !tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                tags.push(tag);
            }
        }
        rest = &after[len..];
    }

    tags
}

/// Hashtags as stored on the video row
pub fn hashtag_field(caption: &str) -> Option<String> {
    let tags = extract_hashtags(caption);
    (!tags.is_empty()).then(|| tags.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_tags_in_order() {
        let caption = "Obsessed with this lamp ✨ #fyp #TikTokMadeMeBuyIt #home_decor, #fyp!";
        assert_eq!(
            extract_hashtags(caption),
            vec!["#fyp", "#TikTokMadeMeBuyIt", "#home_decor"]
        );
    }

    #[test]
    fn bare_hash_is_ignored() {
        assert!(extract_hashtags("# not a tag ##").is_empty());
        assert_eq!(hashtag_field("nothing here"), None);
    }

    #[test]
    fn duplicates_differing_in_case_collapse() {
        assert_eq!(hashtag_field("#Glow #glow #lamp").as_deref(), Some("#Glow #lamp"));
    }
}
