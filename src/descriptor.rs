//! Wallet identity: network, descriptor pair, and the digest used to key live instances.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network { #[default] Bitcoin, Testnet, Signet, Regtest }

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self { Network::Bitcoin => "bitcoin", Network::Testnet => "testnet", Network::Signet => "signet", Network::Regtest => "regtest" }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bitcoin" | "mainnet" | "main" => Some(Network::Bitcoin),
            "testnet" | "test" => Some(Network::Testnet),
            "signet" => Some(Network::Signet),
            "regtest" => Some(Network::Regtest),
            _ => None,
        }
    }

    pub fn to_bitcoin(&self) -> bitcoin::Network {
        match self { Network::Bitcoin => bitcoin::Network::Bitcoin, Network::Testnet => bitcoin::Network::Testnet, Network::Signet => bitcoin::Network::Signet, Network::Regtest => bitcoin::Network::Regtest }
    }

    pub fn default_electrum_url(&self) -> &'static str {
        match self {
            Network::Bitcoin => "ssl://electrum.blockstream.info:50002",
            Network::Testnet => "ssl://electrum.blockstream.info:60002",
            Network::Signet => "ssl://mempool.space:60602",
            Network::Regtest => "tcp://127.0.0.1:50001",
        }
    }
}

/// Receiving/change descriptors of one spending wallet. Immutable once built.
#[derive(Clone, PartialEq, Eq)]
pub struct WalletDescriptor {
    identifier: String,
    receiving: String,
    change: String,
    network: Network,
}

impl WalletDescriptor {
    pub fn new(identifier: impl Into<String>, receiving: impl Into<String>, change: impl Into<String>, network: Network) -> Self {
        Self { identifier: identifier.into(), receiving: receiving.into(), change: change.into(), network }
    }

    pub fn identifier(&self) -> &str { &self.identifier }
    pub fn receiving_descriptor(&self) -> &str { &self.receiving }
    pub fn change_descriptor(&self) -> &str { &self.change }
    pub fn network(&self) -> Network { self.network }

    /// Digest of the descriptor pair. Two descriptors share a live wallet iff their keys match.
    pub fn key(&self) -> DescriptorKey {
        DescriptorKey::derive(&self.receiving, &self.change)
    }
}

// Descriptors may carry private key material: only the identifier and digest are printed.
impl fmt::Debug for WalletDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletDescriptor")
            .field("identifier", &self.identifier)
            .field("network", &self.network)
            .field("key", &self.key())
            .finish()
    }
}

/// Double SHA-256 over the length-prefixed descriptor pair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorKey([u8; 32]);

impl DescriptorKey {
    pub fn derive(receiving: &str, change: &str) -> Self {
        let mut hasher = Sha256::new();
        for part in [receiving, change] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        let twice = Sha256::digest(hasher.finalize());
        let mut out = [0u8; 32];
        out.copy_from_slice(&twice);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; 32] { &self.0 }

    pub fn to_hex(&self) -> String { hex::encode(self.0) }
}

impl fmt::Display for DescriptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for DescriptorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DescriptorKey({})", &self.to_hex()[..16])
    }
}
