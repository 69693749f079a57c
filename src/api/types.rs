//! API Request/Response Types

use serde::{Deserialize, Serialize};

use crate::core::token_risk::TokenRiskOptions;
use crate::models::errors::AppError;
use crate::models::types::TraceOptions;

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub latency_ms: f64,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T, latency_ms: f64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(error: ApiError, latency_ms: f64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            latency_ms,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// API Error
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: "BAD_REQUEST".to_string(),
            message: message.into(),
            details: None,
        }
    }
}

impl From<&AppError> for ApiError {
    fn from(err: &AppError) -> Self {
        Self {
            code: err.code_str().to_string(),
            message: err.message.clone(),
            details: Some(format!("{:?}", err.category()).to_lowercase()),
        }
    }
}

// ============================================
// Wallet Trace
// ============================================

/// Body of `POST /v1/trace/wallet`: the address plus every trace option
/// at the top level (`{"address": "0x..", "maxHops": 1, "minUsd": 50}`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceWalletRequest {
    pub address: String,
    #[serde(flatten)]
    pub options: TraceOptions,
    /// Overall deadline; the server default applies when absent
    #[serde(default)]
    pub timeout_secs: Option<f64>,
}

// ============================================
// Token Risk
// ============================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRiskRequest {
    /// Symbol, name or token address
    pub query: String,
    #[serde(flatten)]
    pub options: TokenRiskOptions,
}

// ============================================
// Health Check
// ============================================

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Chain ids usable for tracing (explorer credentials present)
    pub chains: Vec<String>,
}
