//! ConsolidationBroadcaster - submits the co-signed consolidation

use super::UtxoConsolidationTransactionDetail;
use crate::error::ConsolidationError;
use crate::fee::CONSOLIDATION_PRIORITY;
use crate::services::{AccountService, WalletService};
use crate::wallet::Psbt;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ConsolidationBroadcaster {
    accounts: Arc<dyn AccountService>,
    wallets: Arc<dyn WalletService>,
}

impl ConsolidationBroadcaster {
    pub fn new(accounts: Arc<dyn AccountService>, wallets: Arc<dyn WalletService>) -> Self {
        Self { accounts, wallets }
    }

    /// Submit at the tier the plan was quoted at. Rejections are returned as-is; retrying is up to the caller.
    pub async fn broadcast(&self, signed_psbt: &Psbt) -> Result<UtxoConsolidationTransactionDetail, ConsolidationError> {
        let account = self.accounts.active_account().await.ok_or(ConsolidationError::NoActiveAccount)?;

        let broadcast_detail = self
            .wallets
            .broadcast(&account, signed_psbt, CONSOLIDATION_PRIORITY)
            .await
            .map_err(|e| {
                warn!(account = %account.account_id, error = %e, "consolidation broadcast rejected");
                ConsolidationError::BroadcastFailed(e)
            })?;

        let estimated_confirmation_time = broadcast_detail.broadcast_time + broadcast_detail.priority.nominal_duration();
        info!(
            account = %account.account_id,
            txid = %broadcast_detail.txid,
            eta = %estimated_confirmation_time,
            "broadcast utxo consolidation"
        );

        Ok(UtxoConsolidationTransactionDetail { broadcast_detail, estimated_confirmation_time })
    }
}
