//! Endpoint modules, one per resource

pub mod assistant;
pub mod health;
pub mod images;
pub mod pages;
pub mod search;
pub mod settings;

use serde::Serialize;

/// Body of successful deletes
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
