//! Payment Gateway Wire Types
//!
//! Request/response bodies of the gateway's JSON API. All monetary amounts are
//! decimal strings in the asset's minor unit.

use serde::{Deserialize, Serialize};

/// Default asset symbol used by the gateway
pub const DEFAULT_CURRENCY: &str = "TON";

/// Default deposit history page size
pub const DEFAULT_HISTORY_LIMIT: u32 = 100;

// =============================================================================
// Addresses
// =============================================================================

/// POST /v1/address/new
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddressRequest {
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl NewAddressRequest {
    pub fn new(currency: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            currency: currency.into(),
            user_id,
        }
    }
}

/// Response to POST /v1/address/new (also an item of GET /v1/address/all)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAddressResponse {
    pub address: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

// =============================================================================
// Deposits
// =============================================================================

/// Sort order for history queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// GET /v1/deposit/history query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub user_id: String,
    pub currency: String,
    pub limit: u32,
    pub offset: u32,
    pub sort_order: SortOrder,
}

impl HistoryQuery {
    /// Most recent page first, gateway defaults
    pub fn latest(user_id: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            currency: currency.into(),
            limit: DEFAULT_HISTORY_LIMIT,
            offset: 0,
            sort_order: SortOrder::Desc,
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub(crate) fn to_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("user_id", self.user_id.clone()),
            ("currency", self.currency.clone()),
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
            ("sort_order", self.sort_order.as_str().to_string()),
        ]
    }
}

/// An inbound transaction observed by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeRecord {
    /// Text comment attached to the transfer (empty when stripped)
    #[serde(default)]
    pub comment: String,
    /// Amount in minor units
    pub amount: String,
    pub tx_hash: String,
    pub deposit_address: String,
    #[serde(default)]
    pub source_address: Option<String>,
    /// Unix timestamp
    pub time: i64,
}

/// Response to GET /v1/deposit/history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositHistoryResponse {
    #[serde(default)]
    pub incomes: Vec<IncomeRecord>,
    #[serde(default)]
    pub total_incomes: Option<u64>,
}

/// Response to GET /v1/deposit/income?tx_hash=
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeByTxHash {
    pub currency: String,
    pub amount: String,
    #[serde(default)]
    pub source_address: Option<String>,
    pub deposit_address: String,
    #[serde(default)]
    pub comment: Option<String>,
}

// =============================================================================
// Withdrawals
// =============================================================================

/// POST /v1/withdrawal/send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub destination: String,
    /// Amount in minor units
    pub amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Hex-encoded binary comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_comment: Option<String>,
}

/// Response to POST /v1/withdrawal/send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalResponse {
    pub id: u64,
    #[serde(default)]
    pub memo: Option<String>,
}

/// Processing state of a withdrawal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalState {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl std::fmt::Display for WithdrawalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Processed => write!(f, "processed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Response to GET /v1/withdrawal/status?id=
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalStatusResponse {
    pub status: WithdrawalState,
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub query_id: Option<String>,
}

// =============================================================================
// Balance / system
// =============================================================================

/// Account state reported alongside a balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Uninit,
    Frozen,
    NonExist,
}

/// Response to GET /v1/balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: String,
    pub currency: String,
    #[serde(default)]
    pub total_processing_amount: Option<String>,
    #[serde(default)]
    pub total_pending_amount: Option<String>,
    #[serde(default)]
    pub status: Option<AccountStatus>,
}

/// Response to GET /v1/system/sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub synced: bool,
    pub last_block_utime: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_decodes_with_missing_optionals() {
        let body = r#"{"incomes":[{"amount":"500000000","tx_hash":"abc","deposit_address":"EQ1","time":1700000000}]}"#;
        let history: DepositHistoryResponse = serde_json::from_str(body).unwrap();
        assert_eq!(history.incomes.len(), 1);
        assert_eq!(history.incomes[0].comment, "");
        assert_eq!(history.incomes[0].source_address, None);
        assert_eq!(history.total_incomes, None);
    }

    #[test]
    fn test_new_address_request_omits_missing_user() {
        let body = serde_json::to_string(&NewAddressRequest::new("TON", None)).unwrap();
        assert_eq!(body, r#"{"currency":"TON"}"#);
    }

    #[test]
    fn test_withdrawal_status_decoding() {
        let status: WithdrawalStatusResponse =
            serde_json::from_str(r#"{"status":"processed","tx_hash":"ff"}"#).unwrap();
        assert_eq!(status.status, WithdrawalState::Processed);
        assert_eq!(status.tx_hash.as_deref(), Some("ff"));
    }

    #[test]
    fn test_balance_status_decoding() {
        let balance: BalanceResponse =
            serde_json::from_str(r#"{"balance":"10","currency":"TON","status":"non_exist"}"#)
                .unwrap();
        assert_eq!(balance.status, Some(AccountStatus::NonExist));
    }

    #[test]
    fn test_history_query_params() {
        let params = HistoryQuery::latest("42", "TON").with_limit(20).to_params();
        assert!(params.contains(&("limit", "20".to_string())));
        assert!(params.contains(&("sort_order", "desc".to_string())));
        assert!(params.contains(&("offset", "0".to_string())));
    }
}
