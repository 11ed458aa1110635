//! Swap request model.

use serde::{Deserialize, Serialize};

use super::{new_id, normalize_text, now_rfc3339};
use crate::errors::{AppError, FieldErrors};

/// Lifecycle of a swap request. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SwapStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::Pending => "pending",
            SwapStatus::Approved => "approved",
            SwapStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SwapStatus::Pending),
            "approved" => Some(SwapStatus::Approved),
            "rejected" => Some(SwapStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SwapStatus::Pending)
    }
}

/// A volunteer's request to be replaced in one assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub id: String,
    pub requester_id: String,
    pub schedule_detail_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_id: Option<String>,
    pub status: SwapStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSwapRequest {
    pub requester_id: String,
    pub schedule_detail_id: String,
    #[serde(default)]
    pub replacement_id: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl CreateSwapRequest {
    pub fn into_swap_request(self) -> Result<SwapRequest, AppError> {
        let mut errors = FieldErrors::new();
        errors.require("requesterId", &self.requester_id);
        errors.require("scheduleDetailId", &self.schedule_detail_id);
        let replacement_id = normalize_text(self.replacement_id);
        if replacement_id.as_deref() == Some(self.requester_id.trim()) {
            errors.push(
                "replacementId",
                "replacement must differ from the requester",
            );
        }
        errors.into_result()?;

        Ok(SwapRequest {
            id: new_id(),
            requester_id: self.requester_id.trim().to_string(),
            schedule_detail_id: self.schedule_detail_id.trim().to_string(),
            replacement_id,
            status: SwapStatus::Pending,
            reason: normalize_text(self.reason),
            created_at: now_rfc3339(),
            resolved_by: None,
            resolved_at: None,
        })
    }
}

/// Request body for `PUT /api/swap-requests/{id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveSwapRequest {
    pub status: String,
    #[serde(default)]
    pub resolved_by: Option<String>,
}

/// Query parameters for `GET /api/swap-requests`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapFilter {
    #[serde(default)]
    pub requester_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl SwapFilter {
    pub fn matches(&self, request: &SwapRequest) -> bool {
        self.requester_id
            .as_ref()
            .map_or(true, |r| &request.requester_id == r)
            && self
                .status
                .as_deref()
                .map_or(true, |s| request.status.as_str() == s)
    }
}
