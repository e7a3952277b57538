//! Error types for the wallet layer and the consolidation flow.

use thiserror::Error;

pub type WalletResult<T> = Result<T, WalletError>;

/// Failures raised by wallet collaborators (construction, storage, signing, network).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("wallet construction: {0}")]
    Construction(String),
    #[error("wallet storage: {0}")]
    Storage(String),
    #[error("descriptor: {0}")]
    Descriptor(String),
    #[error("address: {0}")]
    Address(String),
    #[error("fee estimation: {0}")]
    FeeEstimation(String),
    #[error("transaction build: {0}")]
    TxBuild(String),
    #[error("signing: {0}")]
    Signing(String),
    #[error("psbt: {0}")]
    Psbt(String),
    #[error("broadcast: {0}")]
    Broadcast(String),
    #[error("no blockchain backend configured")]
    Offline,
    #[error("psbt fee is zero")]
    ZeroFee,
    #[error("lock poisoned: {0}")]
    Lock(&'static str),
    #[error("task: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for WalletError {
    fn from(e: tokio::task::JoinError) -> Self {
        WalletError::Task(e.to_string())
    }
}

/// Failures of `prepare`/`broadcast`. Every variant is surfaced to the caller as-is.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConsolidationError {
    #[error("no active account")]
    NoActiveAccount,
    #[error("not enough confirmed utxos to consolidate: {count}")]
    NotEnoughUtxosToConsolidate { count: usize },
    #[error("spending wallet unavailable")]
    WalletUnavailable(#[source] WalletError),
    #[error("failed to generate consolidation address")]
    AddressGenerationFailed(#[source] WalletError),
    #[error("failed to estimate fee rate")]
    FeeEstimationFailed(#[source] WalletError),
    #[error("failed to construct consolidation psbt")]
    PsbtConstructionFailed(#[source] WalletError),
    #[error("failed to broadcast consolidation")]
    BroadcastFailed(#[source] WalletError),
}

impl ConsolidationError {
    /// Whether re-invoking the same call can reasonably succeed without user action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ConsolidationError::WalletUnavailable(_)
                | ConsolidationError::AddressGenerationFailed(_)
                | ConsolidationError::FeeEstimationFailed(_)
                | ConsolidationError::BroadcastFailed(_)
        )
    }

    /// Underlying wallet-layer cause, if any.
    pub fn wallet_error(&self) -> Option<&WalletError> {
        match self {
            ConsolidationError::WalletUnavailable(e)
            | ConsolidationError::AddressGenerationFailed(e)
            | ConsolidationError::FeeEstimationFailed(e)
            | ConsolidationError::PsbtConstructionFailed(e)
            | ConsolidationError::BroadcastFailed(e) => Some(e),
            ConsolidationError::NoActiveAccount
            | ConsolidationError::NotEnoughUtxosToConsolidate { .. } => None,
        }
    }
}
