//! API Request Handlers

use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use super::types::*;
use crate::core::token_risk::{TokenRiskAnalyzer, TokenRiskAssessment};
use crate::core::traversal::WalletTracer;
use crate::models::config::TracerConfig;
use crate::models::errors::{AppError, AppResult, ErrorCategory, ErrorCode};
use crate::models::types::WalletTraceReport;
use crate::providers::dexscreener::DexScreenerClient;
use crate::providers::explorer::{EtherscanClient, ExplorerApi};
use crate::utils::constants::{DEFAULT_API_TRACE_TIMEOUT_SECS, MAX_API_TRACE_TIMEOUT_SECS};

type ErrorReply = (StatusCode, Json<ApiResponse<()>>);

/// Shared application state
pub struct AppState {
    pub tracer: WalletTracer,
    pub analyzer: TokenRiskAnalyzer,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(tracer: WalletTracer, analyzer: TokenRiskAnalyzer) -> Self {
        Self {
            tracer,
            analyzer,
            start_time: Instant::now(),
        }
    }

    /// Production state: one explorer client shared by both engines
    pub fn from_config(config: TracerConfig) -> AppResult<Self> {
        let explorer: Arc<dyn ExplorerApi> = Arc::new(EtherscanClient::from_config(&config)?);
        let dex = Arc::new(DexScreenerClient::new(
            config.dexscreener_base.clone(),
            config.explorer_timeout,
        )?);
        let tracer = WalletTracer::new(config, explorer.clone());
        let analyzer = TokenRiskAnalyzer::new(dex, explorer, tracer.resolver().clone());
        Ok(Self::new(tracer, analyzer))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn error_reply(err: &AppError, start: Instant) -> ErrorReply {
    let status = StatusCode::from_u16(err.code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match err.category() {
        ErrorCategory::Upstream | ErrorCategory::Internal => error!("❌ {}", err),
        _ => warn!("⚠️ {}", err),
    }
    (status, Json(ApiResponse::error(ApiError::from(err), elapsed_ms(start))))
}

fn request_deadline(timeout_secs: Option<f64>) -> AppResult<Duration> {
    match timeout_secs {
        None => Ok(Duration::from_secs(DEFAULT_API_TRACE_TIMEOUT_SECS)),
        Some(secs) if secs.is_finite() && secs > 0.0 => {
            Ok(Duration::from_secs_f64(secs.min(MAX_API_TRACE_TIMEOUT_SECS)))
        }
        Some(secs) => Err(AppError::new(
            ErrorCode::ConfigInvalidValue,
            format!("timeoutSecs must be a positive number, got {}", secs),
        )),
    }
}

// ============================================
// Health Check
// ============================================

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthData>> {
    let start = Instant::now();
    let resolver = state.tracer.resolver();
    let chains = resolver
        .chains()
        .iter()
        .filter(|c| resolver.resolve(None, Some(&c.id)).is_some())
        .map(|c| c.id.clone())
        .collect();

    let data = HealthData {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        chains,
    };

    Json(ApiResponse::success(data, elapsed_ms(start)))
}

// ============================================
// Wallet Trace
// ============================================

/// The trace future is dropped with the request when the client goes away,
/// which aborts in-flight explorer calls.
pub async fn trace_wallet(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TraceWalletRequest>,
) -> Result<Json<ApiResponse<WalletTraceReport>>, ErrorReply> {
    let start = Instant::now();

    let mut options = req.options;
    options.deadline = Some(request_deadline(req.timeout_secs).map_err(|e| error_reply(&e, start))?);

    let report = state
        .tracer
        .trace_wallet(&req.address, &options)
        .await
        .map_err(|e| error_reply(&e, start))?;

    info!(
        "📤 Trace {} on {}: {} {} in {:.0}ms",
        report.address,
        report.chain_label,
        report.report.level.emoji(),
        report.report.score,
        elapsed_ms(start)
    );

    Ok(Json(ApiResponse::success(report, elapsed_ms(start))))
}

// ============================================
// Token Risk
// ============================================

pub async fn risk_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TokenRiskRequest>,
) -> Result<Json<ApiResponse<TokenRiskAssessment>>, ErrorReply> {
    let start = Instant::now();

    if req.query.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(
                ApiError::bad_request("query must not be empty"),
                elapsed_ms(start),
            )),
        ));
    }

    let assessment = state
        .analyzer
        .assess(&req.query, &req.options)
        .await
        .map_err(|e| error_reply(&e, start))?;

    Ok(Json(ApiResponse::success(assessment, elapsed_ms(start))))
}
