//! The `{success, ...}` envelope shared by every resource endpoint and the
//! client that consumes them.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Uniform response envelope.
///
/// The payload is flattened next to `success`, so `ApiResponse<Item<T>>`
/// serializes as `{"success": true, "item": {...}}`. Failures carry only
/// `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// Successful response that carries only a message, e.g. after a delete.
    pub fn acknowledged(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

/// Page window echoed back by paginated list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct Pagination {
    pub page: u64,
    pub per: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Items<T> {
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item<T> {
    pub item: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDoc<T> {
    pub schema: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultObj<T> {
    #[serde(rename = "defaultObj")]
    pub default_obj: T,
}

/// Empty payload for responses that only acknowledge an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {}
