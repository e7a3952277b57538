//! UtxoConsolidationPlanner - builds the consolidation plan from current wallet state

use super::selection::{select_for_consolidation, MaxUtxoCap};
use super::{UtxoConsolidationParams, UtxoConsolidationType};
use crate::error::{ConsolidationError, WalletError};
use crate::fee::{FeePolicy, CONSOLIDATION_PRIORITY};
use crate::services::{AccountService, BitcoinAddressService, FeeRateEstimator, NumericFeatureFlag, WalletService};
use crate::utxo::total_value;
use crate::wallet::PsbtConstructionMethod;
use bitcoin::Amount;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct UtxoConsolidationPlanner {
    accounts: Arc<dyn AccountService>,
    wallets: Arc<dyn WalletService>,
    addresses: Arc<dyn BitcoinAddressService>,
    fees: Arc<dyn FeeRateEstimator>,
    max_count: Arc<dyn NumericFeatureFlag>,
}

impl UtxoConsolidationPlanner {
    pub fn new(
        accounts: Arc<dyn AccountService>,
        wallets: Arc<dyn WalletService>,
        addresses: Arc<dyn BitcoinAddressService>,
        fees: Arc<dyn FeeRateEstimator>,
        max_count: Arc<dyn NumericFeatureFlag>,
    ) -> Self {
        Self { accounts, wallets, addresses, fees, max_count }
    }

    /// Plan a consolidation of the active account's confirmed outputs.
    ///
    /// Reads one snapshot and holds no lock; every collaborator failure is returned
    /// as its own variant without retrying. Calling again yields a fresh plan.
    pub async fn prepare(&self) -> Result<Vec<UtxoConsolidationParams>, ConsolidationError> {
        let account = self.accounts.active_account().await.ok_or(ConsolidationError::NoActiveAccount)?;

        let wallet = self
            .wallets
            .spending_wallet(&account)
            .await
            .map_err(ConsolidationError::WalletUnavailable)?;
        let utxos = wallet
            .transaction_data()
            .await
            .map_err(ConsolidationError::WalletUnavailable)?
            .utxos;

        let confirmed = utxos.confirmed();
        if confirmed.len() <= 1 {
            debug!(account = %account.account_id, confirmed = confirmed.len(), "nothing to consolidate");
            return Err(ConsolidationError::NotEnoughUtxosToConsolidate { count: confirmed.len() });
        }

        let (cap, max_utxo_count) = MaxUtxoCap::from_flag(self.max_count.value());
        let selection = select_for_consolidation(confirmed, cap);
        let balance = total_value(&selection.utxos)
            .ok_or_else(|| ConsolidationError::PsbtConstructionFailed(WalletError::TxBuild("input value overflow".into())))?;
        debug!(
            account = %account.account_id,
            selected = selection.utxos.len(),
            confirmed = confirmed.len(),
            unconfirmed = utxos.unconfirmed().len(),
            ?cap,
            "selected utxos"
        );

        let target_address = self
            .addresses
            .generate_address()
            .await
            .map_err(ConsolidationError::AddressGenerationFailed)?;

        let fee_rate = self
            .fees
            .estimate(account.network(), CONSOLIDATION_PRIORITY)
            .await
            .map_err(ConsolidationError::FeeEstimationFailed)?;

        let eligible_utxo_count = selection.utxos.len();
        let psbt = wallet
            .create_signed_psbt(PsbtConstructionMethod::DrainAllFromUtxos {
                address: target_address.clone(),
                fee_policy: FeePolicy::Rate(fee_rate),
                utxos: selection.utxos,
            })
            .await
            .map_err(ConsolidationError::PsbtConstructionFailed)?;

        if psbt.fee() == Amount::ZERO {
            warn!(account = %account.account_id, "wallet produced a zero-fee consolidation");
            return Err(ConsolidationError::PsbtConstructionFailed(WalletError::ZeroFee));
        }

        info!(
            account = %account.account_id,
            eligible = eligible_utxo_count,
            balance_sat = balance.to_sat(),
            cost_sat = psbt.fee().to_sat(),
            exceeds_max = selection.exceeds_max,
            "prepared utxo consolidation"
        );

        Ok(vec![UtxoConsolidationParams {
            consolidation_type: UtxoConsolidationType::ConsolidateAll,
            target_address,
            eligible_utxo_count,
            balance,
            consolidation_cost: psbt.fee(),
            app_signed_psbt: psbt,
            transaction_priority: CONSOLIDATION_PRIORITY,
            wallet_has_unconfirmed_utxos: utxos.has_unconfirmed(),
            wallet_exceeds_max_utxo_count: selection.exceeds_max,
            max_utxo_count,
        }])
    }
}
