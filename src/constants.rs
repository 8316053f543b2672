//! Application constants

/// Session cookie name shared with the mobile client
pub const COOKIE_NAME: &str = "app_session_id";

/// Session lifetime in seconds (one year)
pub const SESSION_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 365;

/// Fixed client-facing message for missing or invalid sessions
pub const UNAUTHED_ERR_MSG: &str = "Please login (10001)";

/// Fixed client-facing message for non-admin callers of privileged procedures
pub const NOT_ADMIN_ERR_MSG: &str = "You do not have required permission (10002)";

/// Timeout for OAuth server calls
pub const OAUTH_TIMEOUT_SECS: u64 = 30;

/// Timeout for product page fetches
pub const SCRAPE_TIMEOUT_SECS: u64 = 5;

/// Characters of raw HTML handed to the LLM for extraction
pub const LLM_HTML_CHAR_LIMIT: usize = 8000;

/// Maximum product title length kept from HTML parsing
pub const MAX_TITLE_CHARS: usize = 200;

/// Maximum product description length kept from HTML parsing
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Maximum number of product images collected from a page
pub const MAX_PRODUCT_IMAGES: usize = 6;

/// Fallback product data used when a page cannot be fetched
pub const FALLBACK_PRODUCT_NAME: &str = "Premium TikTok Shop Product";
pub const FALLBACK_PRODUCT_PRICE: &str = "$29.99";
pub const FALLBACK_PRODUCT_DESCRIPTION: &str = "High-quality product trending on TikTok. Perfect for content creators and influencers. Limited time offer with free shipping.";

/// Used when the LLM answers extraction with prose instead of JSON
pub const LLM_TEXT_PRODUCT_NAME: &str = "TikTok Shop Product";
pub const LLM_TEXT_PRODUCT_PRICE: &str = "$19.99";

/// Stored when an extraction leaves a field blank
pub const DEFAULT_PRODUCT_NAME: &str = "Product";
pub const DEFAULT_PRODUCT_PRICE: &str = "N/A";
pub const DEFAULT_PRODUCT_DESCRIPTION: &str = "Amazing TikTok Shop product";

/// Defaults for the script parser
pub const DEFAULT_HOOK: &str = "You need this";
pub const DEFAULT_CTA: &str = "Shop now";

/// Default queue poll interval (seconds)
pub const DEFAULT_QUEUE_POLL_INTERVAL_SECS: u64 = 30;

/// Default generated video length when a user has no settings row
pub const DEFAULT_VIDEO_LENGTH_SECS: i32 = 8;

/// Owner notification limits
pub const NOTIFICATION_TITLE_MAX_LENGTH: usize = 1200;
pub const NOTIFICATION_CONTENT_MAX_LENGTH: usize = 20_000;

/// Number of entries in the analytics top-performer list
pub const TOP_PERFORMER_COUNT: usize = 5;
