pub mod auth;
pub mod cookies;
pub mod error;
pub mod images;
pub mod llm;
pub mod notification;
pub mod oauth;
pub mod rate_limit;
pub mod render;
pub mod session;
