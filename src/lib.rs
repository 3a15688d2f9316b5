//! Shelfnet - a library catalog with a small social layer
//!
//! Books, authors and libraries are managed through a JSON API and a set of
//! server-rendered pages. Members can follow each other, publish posts, and
//! comment on and like them.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod theme;
