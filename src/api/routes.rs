//! API route handlers.
//!
//! All endpoints return JSON. The controller is shared via `Arc<ApiState>`
//! behind a single mutex, so requests are applied one at a time.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::error;

use crate::engine::accountant::{Accountant, ReconciliationReport};
use crate::engine::{LotteryService, LotteryStatus};
use crate::funding::FundingSource;
use crate::ledger::CreditLedger;
use crate::storage::{self, Snapshot};
use crate::types::{AccountId, Credits, LotteryError, NativeAmount, RoundOutcome, Timestamp};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub lottery: Mutex<LotteryService>,
    /// Where to persist after each committed mutation. `None` disables saving.
    pub state_file: Option<String>,
}

impl ApiState {
    pub fn new(lottery: LotteryService, state_file: Option<String>) -> Self {
        Self {
            lottery: Mutex::new(lottery),
            state_file,
        }
    }

    fn persist(&self, lottery: &LotteryService) {
        if let Some(path) = &self.state_file {
            if let Err(e) = storage::save_state(&Snapshot::capture(lottery), Some(path)) {
                error!(error = %e, path = %path, "Failed to save state");
            }
        }
    }
}

pub type AppState = Arc<ApiState>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A `LotteryError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub LotteryError);

impl From<LotteryError> for ApiError {
    fn from(e: LotteryError) -> Self {
        Self(e)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            LotteryError::State(_) => StatusCode::CONFLICT,
            LotteryError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            LotteryError::TooSoon { .. } => {
                StatusCode::from_u16(425).unwrap_or(StatusCode::CONFLICT)
            }
            LotteryError::InsufficientBalance { .. } | LotteryError::InsufficientAllowance { .. } => {
                StatusCode::PAYMENT_REQUIRED
            }
            LotteryError::Unauthorized(_) => StatusCode::FORBIDDEN,
            LotteryError::Overflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CallerRequest {
    pub caller: AccountId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmountRequest {
    pub caller: AccountId,
    pub amount: Credits,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaucetRequest {
    pub account: AccountId,
    pub amount: NativeAmount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    pub caller: AccountId,
    pub payment: NativeAmount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenRequest {
    pub caller: AccountId,
    pub closing_time: Timestamp,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BetRequest {
    pub caller: AccountId,
    /// Absent means a single bet.
    #[serde(default)]
    pub times: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub account: AccountId,
    pub credits: Credits,
    pub allowance: Credits,
    pub prize_balance: Credits,
    pub wallet: NativeAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub minted: Credits,
    pub credits: Credits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReturnResponse {
    pub refund: NativeAmount,
    pub wallet: NativeAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetResponse {
    pub slot_count: usize,
    pub prize_pool: Credits,
    pub owner_pool: Credits,
}

fn account_view(lottery: &LotteryService, account: AccountId) -> AccountResponse {
    AccountResponse {
        credits: lottery.ledger().balance_of(&account),
        allowance: lottery.ledger().allowance(&account, lottery.custody()),
        prize_balance: lottery.prize_balance(&account),
        wallet: lottery.funding().wallet_balance(&account),
        account,
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<LotteryStatus> {
    let lottery = state.lottery.lock().await;
    Json(lottery.status())
}

/// GET /api/accounts/:id
pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<AccountResponse> {
    let lottery = state.lottery.lock().await;
    Json(account_view(&lottery, AccountId::from(id)))
}

/// GET /api/reconcile
pub async fn get_reconcile(State(state): State<AppState>) -> Json<ReconciliationReport> {
    let lottery = state.lottery.lock().await;
    Json(Accountant::reconcile(&lottery))
}

/// POST /api/faucet
pub async fn post_faucet(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> ApiResult<AccountResponse> {
    let mut lottery = state.lottery.lock().await;
    lottery
        .funding_mut()
        .fund(&req.account, req.amount)
        .map_err(LotteryError::from)?;
    state.persist(&lottery);
    Ok(Json(account_view(&lottery, req.account)))
}

/// POST /api/approve
pub async fn post_approve(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<AccountResponse> {
    let mut lottery = state.lottery.lock().await;
    lottery.approve_custody(&req.caller, req.amount)?;
    state.persist(&lottery);
    Ok(Json(account_view(&lottery, req.caller)))
}

/// POST /api/purchase
pub async fn post_purchase(
    State(state): State<AppState>,
    Json(req): Json<PurchaseRequest>,
) -> ApiResult<PurchaseResponse> {
    let mut lottery = state.lottery.lock().await;
    let minted = lottery.purchase_tokens(&req.caller, req.payment)?;
    state.persist(&lottery);
    Ok(Json(PurchaseResponse {
        minted,
        credits: lottery.ledger().balance_of(&req.caller),
    }))
}

/// POST /api/return
pub async fn post_return(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<ReturnResponse> {
    let mut lottery = state.lottery.lock().await;
    let refund = lottery.return_tokens(&req.caller, req.amount)?;
    state.persist(&lottery);
    Ok(Json(ReturnResponse {
        refund,
        wallet: lottery.funding().wallet_balance(&req.caller),
    }))
}

/// POST /api/open
pub async fn post_open(
    State(state): State<AppState>,
    Json(req): Json<OpenRequest>,
) -> ApiResult<LotteryStatus> {
    let mut lottery = state.lottery.lock().await;
    lottery.open_bets(&req.caller, req.closing_time)?;
    state.persist(&lottery);
    Ok(Json(lottery.status()))
}

/// POST /api/bet
pub async fn post_bet(
    State(state): State<AppState>,
    Json(req): Json<BetRequest>,
) -> ApiResult<BetResponse> {
    let mut lottery = state.lottery.lock().await;
    let result = match req.times {
        Some(times) => lottery.bet_many(&req.caller, times),
        None => lottery.bet(&req.caller),
    };
    // A failed batch may still have committed earlier bets.
    if result.is_ok() || req.times.is_some() {
        state.persist(&lottery);
    }
    result?;
    Ok(Json(BetResponse {
        slot_count: lottery.slot_count(),
        prize_pool: lottery.prize_pool(),
        owner_pool: lottery.owner_pool(),
    }))
}

/// POST /api/close
pub async fn post_close(
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> ApiResult<RoundOutcome> {
    let mut lottery = state.lottery.lock().await;
    let outcome = lottery.close_lottery(&req.caller)?;
    state.persist(&lottery);
    Ok(Json(outcome))
}

/// POST /api/withdraw/prize
pub async fn post_prize_withdraw(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<AccountResponse> {
    let mut lottery = state.lottery.lock().await;
    lottery.prize_withdraw(&req.caller, req.amount)?;
    state.persist(&lottery);
    Ok(Json(account_view(&lottery, req.caller)))
}

/// POST /api/withdraw/owner
pub async fn post_owner_withdraw(
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> ApiResult<LotteryStatus> {
    let mut lottery = state.lottery.lock().await;
    lottery.owner_withdraw(&req.caller, req.amount)?;
    state.persist(&lottery);
    Ok(Json(lottery.status()))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
