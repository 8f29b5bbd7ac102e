//! # Delve Tools
//!
//! Concrete leaf clients for the Delve research engine: the web search
//! gateway and the content fetcher. The engine only sees the
//! [`SearchGateway`](delve_core::SearchGateway) and
//! [`ContentFetcher`](delve_core::ContentFetcher) traits.

pub mod web;

pub use web::{GoogleSearchGateway, HttpContentFetcher, extract_text_from_html};
