//! Morning Feed - a news dashboard
//!
//! Pulls RSS/Atom feeds and subreddit listings, normalizes them into one
//! item shape, merges them newest first and serves the result as a small
//! web page with source tabs, paging and a Markdown export.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod routes;
pub mod source;
pub mod view;
