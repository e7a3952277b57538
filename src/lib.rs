//! Beespend: the spending-wallet subsystem. One live wallet per descriptor pair, and
//! UTXO consolidation planned and broadcast on top of it.
//!
//! # Architecture
//!
//! ```text
//! UtxoConsolidationService (UI-facing)
//!   │
//!   ├── UtxoConsolidationPlanner
//!   │     ├── AccountService        → active FullAccount
//!   │     ├── WalletService         → SpendingWallet (via WalletInstanceCache)
//!   │     ├── NumericFeatureFlag    → max consolidation count
//!   │     ├── BitcoinAddressService → fresh self-send address
//!   │     └── FeeRateEstimator      → rate at CONSOLIDATION_PRIORITY
//!   │
//!   └── ConsolidationBroadcaster
//!         └── WalletService::broadcast → BroadcastDetail + ETA
//! ```
//!
//! # Exposed operations
//!
//! | Operation | Result |
//! |-----------|--------|
//! | `prepare_utxo_consolidation()` | `Vec<UtxoConsolidationParams>` (one plan today) |
//! | `broadcast_consolidation(psbt)` | `UtxoConsolidationTransactionDetail` |
//!
//! # Features
//!
//! - `wallet` - BDK 2.x wallets on flat-file stores, Electrum fees and broadcast, `beespend` CLI
//!
//! # Usage
//!
//! ```ignore
//! use beespend::*;
//! use std::sync::Arc;
//!
//! let cache = Arc::new(WalletInstanceCache::new(Arc::new(my_factory)));
//! let wallets: Arc<dyn WalletService> = Arc::new(CachedWalletService::new(cache));
//! let accounts: Arc<dyn AccountService> = Arc::new(StaticAccountService::new(Some(account)));
//! let addresses = Arc::new(WalletAddressService::new(accounts.clone(), wallets.clone()));
//!
//! let service = UtxoConsolidationService::new(accounts, wallets, addresses, fees, Arc::new(FixedFeatureFlag(150.0)));
//! let plans = service.prepare_utxo_consolidation().await?;
//! ```

pub mod config;
pub mod consolidation;
pub mod descriptor;
pub mod error;
pub mod fee;
pub mod logging;
pub mod services;
pub mod utxo;
pub mod wallet;

pub use config::BeespendConfig;
pub use consolidation::{
    ConsolidationBroadcaster, MaxUtxoCap, UtxoConsolidationParams, UtxoConsolidationPlanner,
    UtxoConsolidationService, UtxoConsolidationTransactionDetail, UtxoConsolidationType,
};
pub use descriptor::{DescriptorKey, Network, WalletDescriptor};
pub use error::{ConsolidationError, WalletError, WalletResult};
pub use fee::{EstimatedTransactionPriority, FeePolicy, CONSOLIDATION_PRIORITY};
pub use services::{
    AccountService, BitcoinAddressService, BroadcastDetail, CachedWalletService, FeeRateEstimator,
    FixedFeatureFlag, FullAccount, NumericFeatureFlag, StaticAccountService, WalletAddressService,
    WalletService,
};
pub use utxo::{TransactionData, Utxo, Utxos};
pub use wallet::{Psbt, PsbtConstructionMethod, SpendingWallet, WalletFactory, WalletInstanceCache};

#[cfg(feature = "wallet")]
pub use wallet::{BdkSpendingWallet, BdkWalletFactory, ElectrumBackend, ElectrumFeeRateEstimator};
