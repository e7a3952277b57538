//! UtxoConsolidationService - surface handed to the UI layer

use super::{ConsolidationBroadcaster, UtxoConsolidationParams, UtxoConsolidationPlanner, UtxoConsolidationTransactionDetail};
use crate::error::ConsolidationError;
use crate::services::{AccountService, BitcoinAddressService, FeeRateEstimator, NumericFeatureFlag, WalletService};
use crate::wallet::Psbt;
use std::sync::Arc;

pub struct UtxoConsolidationService {
    planner: UtxoConsolidationPlanner,
    broadcaster: ConsolidationBroadcaster,
}

impl UtxoConsolidationService {
    pub fn new(
        accounts: Arc<dyn AccountService>,
        wallets: Arc<dyn WalletService>,
        addresses: Arc<dyn BitcoinAddressService>,
        fees: Arc<dyn FeeRateEstimator>,
        max_count: Arc<dyn NumericFeatureFlag>,
    ) -> Self {
        Self {
            planner: UtxoConsolidationPlanner::new(accounts.clone(), wallets.clone(), addresses, fees, max_count),
            broadcaster: ConsolidationBroadcaster::new(accounts, wallets),
        }
    }

    pub async fn prepare_utxo_consolidation(&self) -> Result<Vec<UtxoConsolidationParams>, ConsolidationError> {
        self.planner.prepare().await
    }

    pub async fn broadcast_consolidation(&self, signed_psbt: &Psbt) -> Result<UtxoConsolidationTransactionDetail, ConsolidationError> {
        self.broadcaster.broadcast(signed_psbt).await
    }
}
