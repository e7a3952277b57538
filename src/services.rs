//! Collaborator contracts consumed by the consolidation flow, plus the stock implementations.

use crate::descriptor::{Network, WalletDescriptor};
use crate::error::WalletResult;
use crate::fee::EstimatedTransactionPriority;
use crate::wallet::{Psbt, SpendingWallet, WalletInstanceCache};
use async_trait::async_trait;
use bitcoin::{Address, FeeRate, Txid};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Funded account whose spending keyset is described by `descriptor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullAccount {
    pub account_id: String,
    pub descriptor: WalletDescriptor,
}

impl FullAccount {
    pub fn new(account_id: impl Into<String>, descriptor: WalletDescriptor) -> Self {
        Self { account_id: account_id.into(), descriptor }
    }

    pub fn network(&self) -> Network { self.descriptor.network() }
}

#[async_trait]
pub trait AccountService: Send + Sync {
    async fn active_account(&self) -> Option<FullAccount>;
}

/// Single-account hosts (CLI, tests) where the active account never changes.
#[derive(Debug, Clone, Default)]
pub struct StaticAccountService {
    account: Option<FullAccount>,
}

impl StaticAccountService {
    pub fn new(account: Option<FullAccount>) -> Self { Self { account } }
}

#[async_trait]
impl AccountService for StaticAccountService {
    async fn active_account(&self) -> Option<FullAccount> { self.account.clone() }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastDetail {
    pub txid: Txid,
    pub broadcast_time: DateTime<Utc>,
    pub priority: EstimatedTransactionPriority,
}

#[async_trait]
pub trait WalletService: Send + Sync {
    async fn spending_wallet(&self, account: &FullAccount) -> WalletResult<Arc<dyn SpendingWallet>>;
    async fn broadcast(&self, account: &FullAccount, psbt: &Psbt, priority: EstimatedTransactionPriority) -> WalletResult<BroadcastDetail>;
}

/// WalletService backed by the single-instance cache.
pub struct CachedWalletService {
    cache: Arc<WalletInstanceCache>,
}

impl CachedWalletService {
    pub fn new(cache: Arc<WalletInstanceCache>) -> Self { Self { cache } }
    pub fn cache(&self) -> &Arc<WalletInstanceCache> { &self.cache }
}

#[async_trait]
impl WalletService for CachedWalletService {
    async fn spending_wallet(&self, account: &FullAccount) -> WalletResult<Arc<dyn SpendingWallet>> {
        self.cache.get_or_create_wallet(&account.descriptor).await
    }

    async fn broadcast(&self, account: &FullAccount, psbt: &Psbt, priority: EstimatedTransactionPriority) -> WalletResult<BroadcastDetail> {
        let wallet = self.spending_wallet(account).await?;
        let txid = wallet.broadcast(psbt).await?;
        let broadcast_time = Utc::now();
        info!(account = %account.account_id, %txid, priority = priority.as_str(), "broadcast transaction");
        Ok(BroadcastDetail { txid, broadcast_time, priority })
    }
}

#[async_trait]
pub trait BitcoinAddressService: Send + Sync {
    async fn generate_address(&self) -> WalletResult<Address>;
}

/// Fresh receiving address from the active account's spending wallet.
pub struct WalletAddressService {
    accounts: Arc<dyn AccountService>,
    wallets: Arc<dyn WalletService>,
}

impl WalletAddressService {
    pub fn new(accounts: Arc<dyn AccountService>, wallets: Arc<dyn WalletService>) -> Self { Self { accounts, wallets } }
}

#[async_trait]
impl BitcoinAddressService for WalletAddressService {
    async fn generate_address(&self) -> WalletResult<Address> {
        let account = self
            .accounts
            .active_account()
            .await
            .ok_or_else(|| crate::error::WalletError::Address("no active account".into()))?;
        self.wallets.spending_wallet(&account).await?.new_address().await
    }
}

#[async_trait]
pub trait FeeRateEstimator: Send + Sync {
    async fn estimate(&self, network: Network, priority: EstimatedTransactionPriority) -> WalletResult<FeeRate>;
}

/// Remotely configured number, read fresh on every use.
pub trait NumericFeatureFlag: Send + Sync {
    fn value(&self) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedFeatureFlag(pub f64);

impl NumericFeatureFlag for FixedFeatureFlag {
    fn value(&self) -> f64 { self.0 }
}
