//! Wallet module - spending wallets and their single-instance cache
//!
//! # Architecture
//!
//! ```text
//! WalletService (CachedWalletService)
//!     │
//!     └── WalletInstanceCache ── DescriptorKey → slot (Idle → Creating → Cached)
//!                 │
//!                 ▼
//!           WalletFactory ── constructs at most one SpendingWallet per key
//!                 │
//!                 ▼
//!           BdkSpendingWallet (feature = "wallet")
//!                 │
//!                 ▼
//!           bdk_file_store + Electrum
//! ```
//!
//! The backing store of a wallet is not safe for two in-memory instances: each
//! would compute its own spendable set and could authorize conflicting spends.
//! Everything that needs a wallet goes through the cache.

#[cfg(feature = "wallet")]
mod bdk;
mod cache;

pub use cache::WalletInstanceCache;
#[cfg(feature = "wallet")]
pub use bdk::{BdkSpendingWallet, BdkWalletFactory, ElectrumBackend, ElectrumFeeRateEstimator, STORE_MAGIC};

use crate::descriptor::WalletDescriptor;
use crate::error::{WalletError, WalletResult};
use crate::fee::FeePolicy;
use crate::utxo::{TransactionData, Utxo};
use async_trait::async_trait;
use base64::Engine;
use bitcoin::{Address, Amount, Txid};
use std::sync::Arc;

/// Serialized PSBT (BIP-174 bytes, passed through untouched) plus the fee it pays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Psbt {
    bytes: Vec<u8>,
    fee: Amount,
}

impl Psbt {
    pub fn new(bytes: Vec<u8>, fee: Amount) -> Self { Self { bytes, fee } }

    pub fn from_base64(encoded: &str, fee: Amount) -> WalletResult<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| WalletError::Psbt(format!("base64: {e}")))?;
        Ok(Self { bytes, fee })
    }

    pub fn bytes(&self) -> &[u8] { &self.bytes }
    pub fn fee(&self) -> Amount { self.fee }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Same fee, new bytes. Used when a co-signer returns the signed container.
    pub fn with_bytes(&self, bytes: Vec<u8>) -> Self {
        Self { bytes, fee: self.fee }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PsbtConstructionMethod {
    /// Spend exactly `utxos`, send everything minus fee to `address`, no change output.
    DrainAllFromUtxos { address: Address, fee_policy: FeePolicy, utxos: Vec<Utxo> },
}

/// Live wallet over one descriptor pair. Mutation is serialized by the implementation.
#[async_trait]
pub trait SpendingWallet: Send + Sync {
    fn identifier(&self) -> &str;
    async fn transaction_data(&self) -> WalletResult<TransactionData>;
    /// Reveal a fresh receiving address of this wallet.
    async fn new_address(&self) -> WalletResult<Address>;
    /// Build a PSBT and add this wallet's signatures. Not finalized: other signers still co-sign.
    async fn create_signed_psbt(&self, method: PsbtConstructionMethod) -> WalletResult<Psbt>;
    async fn broadcast(&self, psbt: &Psbt) -> WalletResult<Txid>;
}

/// Constructs wallets for the cache. Called at most once per key while a construction succeeds.
#[async_trait]
pub trait WalletFactory: Send + Sync {
    async fn create(&self, descriptor: &WalletDescriptor) -> WalletResult<Arc<dyn SpendingWallet>>;
}
