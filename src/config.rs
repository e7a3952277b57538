//! Configuration - passed from higher layers or loaded from a JSON file

use crate::descriptor::Network;
use crate::error::{WalletError, WalletResult};
use crate::services::FixedFeatureFlag;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_CONSOLIDATION_COUNT: f64 = 150.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeespendConfig {
    pub network: Network,
    pub electrum_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    /// Value of the max-consolidation-count flag. ≤ 0 disables the cap.
    pub max_consolidation_count: f64,
}

impl Default for BeespendConfig {
    fn default() -> Self {
        Self { network: Network::default(), electrum_url: None, data_dir: None, max_consolidation_count: DEFAULT_MAX_CONSOLIDATION_COUNT }
    }
}

impl BeespendConfig {
    pub fn new(network: Network) -> Self { Self { network, ..Default::default() } }
    pub fn mainnet() -> Self { Self::new(Network::Bitcoin) }
    pub fn signet() -> Self { Self::new(Network::Signet) }
    pub fn with_electrum(mut self, url: impl Into<String>) -> Self { self.electrum_url = Some(url.into()); self }
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self { self.data_dir = Some(path.into()); self }
    pub fn with_max_consolidation_count(mut self, count: f64) -> Self { self.max_consolidation_count = count; self }

    pub fn load(path: &Path) -> WalletResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| WalletError::Storage(format!("config read: {e}")))?;
        serde_json::from_str(&raw).map_err(|e| WalletError::Storage(format!("config json: {e}")))
    }

    pub fn electrum_url(&self) -> &str {
        self.electrum_url.as_deref().unwrap_or_else(|| self.network.default_electrum_url())
    }

    /// `data_dir`, else `$BEESPEND_ROOT`, else the platform data dir.
    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        let root = std::env::var("BEESPEND_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")).join("beespend"));
        root.join(self.network.as_str())
    }

    pub fn max_consolidation_flag(&self) -> FixedFeatureFlag {
        FixedFeatureFlag(self.max_consolidation_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::NumericFeatureFlag;

    #[test]
    fn defaults() {
        let config = BeespendConfig::default();
        assert_eq!(config.network, Network::Bitcoin);
        assert_eq!(config.max_consolidation_flag().value(), DEFAULT_MAX_CONSOLIDATION_COUNT);
        assert_eq!(config.electrum_url(), "ssl://electrum.blockstream.info:50002");
    }

    #[test]
    fn builder_overrides() {
        let config = BeespendConfig::signet()
            .with_electrum("tcp://localhost:50001")
            .with_data_dir("/tmp/beespend")
            .with_max_consolidation_count(0.0);
        assert_eq!(config.electrum_url(), "tcp://localhost:50001");
        assert_eq!(config.resolve_data_dir(), PathBuf::from("/tmp/beespend"));
        assert_eq!(config.max_consolidation_count, 0.0);
    }

    #[test]
    fn loads_partial_json() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"network": "signet", "max_consolidation_count": 25}"#).expect("write");
        let config = BeespendConfig::load(&path).expect("load");
        assert_eq!(config.network, Network::Signet);
        assert_eq!(config.max_consolidation_count, 25.0);
        assert_eq!(config.electrum_url, None);
    }

    #[test]
    fn load_reports_bad_json() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").expect("write");
        assert!(matches!(BeespendConfig::load(&path), Err(WalletError::Storage(_))));
    }
}
