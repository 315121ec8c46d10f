//! Postdesk - Blog post management service
//!
//! This library provides post CRUD with featured image uploads, tag
//! associations, creation notifications and flash messages.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
