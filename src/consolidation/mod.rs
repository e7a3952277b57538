//! UTXO consolidation: plan a self-send that merges confirmed outputs, then submit it.
//!
//! # Flow
//!
//! ```text
//! prepare_utxo_consolidation()
//!     │  account → spending wallet → Utxos snapshot → flag cap → selection
//!     │  → fresh address → fee rate (CONSOLIDATION_PRIORITY) → drain PSBT
//!     ▼
//! Vec<UtxoConsolidationParams>  ──►  caller obtains hardware co-signature
//!                                          │
//!                                          ▼
//!                          broadcast_consolidation(signed psbt)
//!                                          │
//!                                          ▼
//!                          UtxoConsolidationTransactionDetail
//! ```
//!
//! Nothing here locks the selected outputs between planning and broadcast. If another
//! spend consumes one of them first, the wallet layer rejects the transaction and
//! `BroadcastFailed` is returned.

mod broadcaster;
mod planner;
mod selection;
mod service;

pub use broadcaster::ConsolidationBroadcaster;
pub use planner::UtxoConsolidationPlanner;
pub use selection::{select_for_consolidation, MaxUtxoCap, UtxoSelection};
pub use service::UtxoConsolidationService;

use crate::fee::EstimatedTransactionPriority;
use crate::services::BroadcastDetail;
use crate::wallet::Psbt;
use bitcoin::{Address, Amount};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum UtxoConsolidationType {
    /// Merge every eligible confirmed output into one.
    ConsolidateAll,
}

impl UtxoConsolidationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UtxoConsolidationType::ConsolidateAll => "consolidate_all",
        }
    }
}

/// One consolidation plan, ready for co-signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoConsolidationParams {
    pub consolidation_type: UtxoConsolidationType,
    pub target_address: Address,
    pub eligible_utxo_count: usize,
    pub balance: Amount,
    pub consolidation_cost: Amount,
    pub app_signed_psbt: Psbt,
    pub transaction_priority: EstimatedTransactionPriority,
    /// Informational; unconfirmed outputs are never part of the plan.
    pub wallet_has_unconfirmed_utxos: bool,
    pub wallet_exceeds_max_utxo_count: bool,
    /// Cap as read from the flag after coercion. 0 means uncapped.
    pub max_utxo_count: usize,
}

impl UtxoConsolidationParams {
    /// What the target address receives once the fee is paid.
    pub fn amount_after_fee(&self) -> Option<Amount> {
        self.balance.checked_sub(self.consolidation_cost)
    }

    pub fn to_json(&self) -> Value {
        json!({
            "type": self.consolidation_type.as_str(),
            "target_address": self.target_address.to_string(),
            "eligible_utxo_count": self.eligible_utxo_count,
            "balance_sat": self.balance.to_sat(),
            "consolidation_cost_sat": self.consolidation_cost.to_sat(),
            "amount_after_fee_sat": self.amount_after_fee().map(|a| a.to_sat()),
            "psbt": self.app_signed_psbt.to_base64(),
            "priority": self.transaction_priority.as_str(),
            "wallet_has_unconfirmed_utxos": self.wallet_has_unconfirmed_utxos,
            "wallet_exceeds_max_utxo_count": self.wallet_exceeds_max_utxo_count,
            "max_utxo_count": self.max_utxo_count,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoConsolidationTransactionDetail {
    pub broadcast_detail: BroadcastDetail,
    pub estimated_confirmation_time: DateTime<Utc>,
}

impl UtxoConsolidationTransactionDetail {
    pub fn to_json(&self) -> Value {
        json!({
            "txid": self.broadcast_detail.txid.to_string(),
            "broadcast_time": self.broadcast_detail.broadcast_time.to_rfc3339(),
            "priority": self.broadcast_detail.priority.as_str(),
            "estimated_confirmation_time": self.estimated_confirmation_time.to_rfc3339(),
        })
    }
}
