//! socrawler - short video feed harvester.
//!
//! Captures videos from a public feed, either by watching a live browser
//! session's network traffic or by reading the feed endpoint directly, keeps
//! a SQLite record of everything captured, and pushes each video through an
//! object store to an external CMS.

pub mod browser;
pub mod config;
pub mod crawl;
pub mod feed;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod schema;
pub mod services;
