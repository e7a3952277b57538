//! BDK - spending wallet over bdk_wallet 2.x with flat-file persistence
//!
//! One store file per descriptor pair, named by its `DescriptorKey`. Opening the same
//! file twice is exactly what the instance cache prevents, so only the factory opens wallets.

use super::{Psbt, PsbtConstructionMethod, SpendingWallet, WalletFactory};
use crate::descriptor::{Network, WalletDescriptor};
use crate::error::{WalletError, WalletResult};
use crate::fee::{EstimatedTransactionPriority, FeePolicy};
use crate::services::FeeRateEstimator;
use crate::utxo::{TransactionData, Utxo, Utxos};
use async_trait::async_trait;
use bdk_electrum::{
    electrum_client::{Client, ElectrumApi},
    BdkElectrumClient,
};
use bdk_wallet::{
    bitcoin::{psbt::Psbt as BitcoinPsbt, Address, FeeRate, OutPoint, Txid},
    chain::ChainPosition,
    file_store::Store as FileStore,
    ChangeSet, KeychainKind, PersistedWallet, SignOptions, Wallet,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Header of every wallet store file written by this crate.
pub const STORE_MAGIC: &[u8] = b"beespend";

type PW = PersistedWallet<FileStore<ChangeSet>>;

/// Electrum connection shared by every wallet and the fee estimator.
#[derive(Clone)]
pub struct ElectrumBackend {
    client: Arc<BdkElectrumClient<Client>>,
}

impl ElectrumBackend {
    pub fn connect(url: &str) -> WalletResult<Self> {
        let client = Client::new(url).map_err(|e| WalletError::Construction(format!("Electrum: {}", e)))?;
        Ok(Self { client: Arc::new(BdkElectrumClient::new(client)) })
    }
}

pub struct BdkSpendingWallet {
    inner: Arc<Inner>,
}

struct Inner {
    identifier: String,
    wallet: Mutex<PW>,
    db: Mutex<FileStore<ChangeSet>>,
    backend: Option<ElectrumBackend>,
}

impl BdkSpendingWallet {
    /// Load the wallet stored at `db_path`, or create it. A store written for other
    /// descriptors or another network is an error; it is never overwritten.
    pub fn open(descriptor: &WalletDescriptor, db_path: &Path, backend: Option<ElectrumBackend>) -> WalletResult<Self> {
        let network = descriptor.network().to_bitcoin();
        let ext = descriptor.receiving_descriptor().to_string();
        let int = descriptor.change_descriptor().to_string();

        let mut db: FileStore<ChangeSet> = FileStore::load_or_create(STORE_MAGIC, db_path)
            .map_err(|e| WalletError::Storage(format!("FileStore: {}", e)))?
            .0;

        let loaded = Wallet::load()
            .descriptor(KeychainKind::External, Some(ext.clone()))
            .descriptor(KeychainKind::Internal, Some(int.clone()))
            .extract_keys()
            .check_network(network)
            .load_wallet(&mut db)
            .map_err(|e| WalletError::Descriptor(format!("Load wallet: {}", e)))?;

        let wallet = match loaded {
            Some(w) => w,
            None => Wallet::create(ext, int)
                .network(network)
                .create_wallet(&mut db)
                .map_err(|e| WalletError::Construction(format!("Create wallet: {}", e)))?,
        };
        debug!(identifier = descriptor.identifier(), path = %db_path.display(), "opened bdk wallet");

        Ok(Self {
            inner: Arc::new(Inner {
                identifier: descriptor.identifier().to_string(),
                wallet: Mutex::new(wallet),
                db: Mutex::new(db),
                backend,
            }),
        })
    }

    /// Full scan against Electrum. Chain scanning itself is bdk_electrum's job.
    pub async fn sync(&self) -> WalletResult<()> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.sync()).await?
    }
}

impl Inner {
    fn persist(&self) -> WalletResult<()> {
        let mut wallet = self.wallet.lock().map_err(|_| WalletError::Lock("wallet"))?;
        let mut db = self.db.lock().map_err(|_| WalletError::Lock("wallet db"))?;
        wallet.persist(&mut *db).map_err(|e| WalletError::Storage(format!("Persist: {}", e)))?;
        Ok(())
    }

    fn backend(&self) -> WalletResult<&ElectrumBackend> {
        self.backend.as_ref().ok_or(WalletError::Offline)
    }

    fn sync(&self) -> WalletResult<()> {
        let client = &self.backend()?.client;
        {
            let mut wallet = self.wallet.lock().map_err(|_| WalletError::Lock("wallet"))?;
            let request = wallet.start_full_scan();
            let update = client.full_scan(request, 10, 10, false)
                .map_err(|e| WalletError::Storage(format!("Sync: {}", e)))?;
            wallet.apply_update(update).map_err(|e| WalletError::Storage(format!("Apply: {}", e)))?;
        }
        self.persist()
    }

    fn transaction_data(&self) -> WalletResult<TransactionData> {
        let wallet = self.wallet.lock().map_err(|_| WalletError::Lock("wallet"))?;
        let (mut confirmed, mut unconfirmed) = (Vec::new(), Vec::new());
        for output in wallet.list_unspent() {
            let is_confirmed = matches!(output.chain_position, ChainPosition::Confirmed { .. });
            let utxo = Utxo::new(output.outpoint, output.txout.value, output.txout.script_pubkey);
            if is_confirmed { confirmed.push(utxo) } else { unconfirmed.push(utxo) }
        }
        Ok(TransactionData { utxos: Utxos::new(confirmed, unconfirmed) })
    }

    fn new_address(&self) -> WalletResult<Address> {
        let address = {
            let mut wallet = self.wallet.lock().map_err(|_| WalletError::Lock("wallet"))?;
            wallet.reveal_next_address(KeychainKind::External).address
        };
        self.persist()?;
        Ok(address)
    }

    fn create_signed_psbt(&self, method: PsbtConstructionMethod) -> WalletResult<Psbt> {
        let PsbtConstructionMethod::DrainAllFromUtxos { address, fee_policy, utxos } = method;
        let FeePolicy::Rate(fee_rate) = fee_policy;
        let outpoints: Vec<OutPoint> = utxos.iter().map(|u| u.outpoint).collect();

        let psbt = {
            let mut wallet = self.wallet.lock().map_err(|_| WalletError::Lock("wallet"))?;
            let mut psbt = {
                let mut builder = wallet.build_tx();
                builder
                    .add_utxos(&outpoints)
                    .map_err(|e| WalletError::TxBuild(format!("Add utxos: {}", e)))?;
                builder
                    .manually_selected_only()
                    .drain_to(address.script_pubkey())
                    .fee_rate(fee_rate);
                builder.finish().map_err(|e| WalletError::TxBuild(format!("Build: {}", e)))?
            };
            // Co-signers still have to add their signatures.
            let options = SignOptions { try_finalize: false, ..Default::default() };
            #[allow(deprecated)]
            wallet.sign(&mut psbt, options)
                .map_err(|e| WalletError::Signing(format!("Sign: {}", e)))?;
            psbt
        };

        let fee = psbt.fee().map_err(|e| WalletError::Psbt(format!("Fee: {}", e)))?;
        self.persist()?;
        Ok(Psbt::new(psbt.serialize(), fee))
    }

    fn broadcast(&self, psbt: &Psbt) -> WalletResult<Txid> {
        let backend = self.backend()?;
        let mut psbt = BitcoinPsbt::deserialize(psbt.bytes())
            .map_err(|e| WalletError::Psbt(format!("Decode: {}", e)))?;

        let tx = {
            let wallet = self.wallet.lock().map_err(|_| WalletError::Lock("wallet"))?;
            let finalized = wallet
                .finalize_psbt(&mut psbt, SignOptions::default())
                .map_err(|e| WalletError::Signing(format!("Finalize: {}", e)))?;
            if !finalized {
                return Err(WalletError::Signing("psbt is missing signatures".into()));
            }
            psbt.extract_tx().map_err(|e| WalletError::Psbt(format!("Extract: {}", e)))?
        };

        let txid = backend
            .client
            .inner
            .transaction_broadcast(&tx)
            .map_err(|e| WalletError::Broadcast(e.to_string()))?;

        {
            let mut wallet = self.wallet.lock().map_err(|_| WalletError::Lock("wallet"))?;
            let seen_at = chrono::Utc::now().timestamp().max(0) as u64;
            wallet.apply_unconfirmed_txs([(tx, seen_at)]);
        }
        self.persist()?;
        info!(identifier = %self.identifier, %txid, "submitted transaction");
        Ok(txid)
    }
}

#[async_trait]
impl SpendingWallet for BdkSpendingWallet {
    fn identifier(&self) -> &str { &self.inner.identifier }

    async fn transaction_data(&self) -> WalletResult<TransactionData> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.transaction_data()).await?
    }

    async fn new_address(&self) -> WalletResult<Address> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.new_address()).await?
    }

    async fn create_signed_psbt(&self, method: PsbtConstructionMethod) -> WalletResult<Psbt> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.create_signed_psbt(method)).await?
    }

    async fn broadcast(&self, psbt: &Psbt) -> WalletResult<Txid> {
        let (inner, psbt) = (self.inner.clone(), psbt.clone());
        tokio::task::spawn_blocking(move || inner.broadcast(&psbt)).await?
    }
}

/// Opens `<data_dir>/<descriptor key>.db` wallets for the instance cache.
pub struct BdkWalletFactory {
    data_dir: PathBuf,
    backend: Option<ElectrumBackend>,
}

impl BdkWalletFactory {
    pub fn new(data_dir: impl Into<PathBuf>, backend: Option<ElectrumBackend>) -> Self {
        Self { data_dir: data_dir.into(), backend }
    }

    pub fn wallet_path(&self, descriptor: &WalletDescriptor) -> PathBuf {
        self.data_dir.join(format!("{}.db", descriptor.key()))
    }

    /// Same as `create`, without erasing the concrete type (the CLI needs `sync`).
    pub async fn open(&self, descriptor: &WalletDescriptor) -> WalletResult<BdkSpendingWallet> {
        let (dir, path) = (self.data_dir.clone(), self.wallet_path(descriptor));
        let (descriptor, backend) = (descriptor.clone(), self.backend.clone());
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&dir).map_err(|e| WalletError::Storage(format!("mkdir: {}", e)))?;
            BdkSpendingWallet::open(&descriptor, &path, backend)
        })
        .await?
    }
}

#[async_trait]
impl WalletFactory for BdkWalletFactory {
    async fn create(&self, descriptor: &WalletDescriptor) -> WalletResult<Arc<dyn SpendingWallet>> {
        Ok(Arc::new(self.open(descriptor).await?))
    }
}

pub struct ElectrumFeeRateEstimator {
    backend: ElectrumBackend,
}

impl ElectrumFeeRateEstimator {
    pub fn new(backend: ElectrumBackend) -> Self { Self { backend } }
}

#[async_trait]
impl FeeRateEstimator for ElectrumFeeRateEstimator {
    async fn estimate(&self, network: Network, priority: EstimatedTransactionPriority) -> WalletResult<FeeRate> {
        let client = self.backend.client.clone();
        let blocks = priority.target_blocks();
        let btc_per_kvb = tokio::task::spawn_blocking(move || client.inner.estimate_fee(blocks))
            .await?
            .map_err(|e| WalletError::FeeEstimation(e.to_string()))?;
        match fee_rate_from_btc_per_kvb(btc_per_kvb) {
            Some(rate) => Ok(rate),
            // regtest servers usually have no fee history
            None if network == Network::Regtest => Ok(FeeRate::BROADCAST_MIN),
            None => Err(WalletError::FeeEstimation(format!("no estimate for {} blocks", blocks))),
        }
    }
}

/// Electrum answers in BTC/kvB; -1 means no estimate. Floored at the relay minimum.
fn fee_rate_from_btc_per_kvb(btc_per_kvb: f64) -> Option<FeeRate> {
    if !btc_per_kvb.is_finite() || btc_per_kvb <= 0.0 {
        return None;
    }
    let sat_per_kvb = (btc_per_kvb * 100_000_000.0).round() as u64;
    let sat_per_kwu = (sat_per_kvb / 4).max(FeeRate::BROADCAST_MIN.to_sat_per_kwu());
    Some(FeeRate::from_sat_per_kwu(sat_per_kwu))
}
