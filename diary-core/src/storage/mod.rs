//! Storage module
//!
//! Provides app-private file storage for diary photos and their thumbnails.

pub mod image_store;

pub use image_store::ImageStore;
