pub mod accounts;
pub mod health;
pub mod metrics;
pub mod monitor;
pub mod sizing;
pub mod ws;

use serde::Serialize;

/// Envelope for list/detail endpoints.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}
