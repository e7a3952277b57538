//! Shared fakes for the consolidation and cache tests.

#![allow(dead_code)]

use async_trait::async_trait;
use beespend::{
    BitcoinAddressService, BroadcastDetail, EstimatedTransactionPriority, FeePolicy, FeeRateEstimator, FullAccount,
    Network, Psbt, PsbtConstructionMethod, SpendingWallet, TransactionData, Utxo, Utxos, WalletDescriptor, WalletError,
    WalletFactory, WalletResult, WalletService,
};
use bitcoin::{Address, Amount, FeeRate, OutPoint, ScriptBuf, Txid};
use chrono::{DateTime, TimeZone, Utc};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// BIP84 test vector address, mainnet
pub const TARGET_ADDRESS: &str = "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu";

pub fn target_address() -> Address {
    Address::from_str(TARGET_ADDRESS)
        .expect("address")
        .require_network(bitcoin::Network::Bitcoin)
        .expect("mainnet")
}

pub fn utxo(n: u32, sats: u64) -> Utxo {
    let txid = Txid::from_str(&format!("{:064x}", n)).expect("txid");
    Utxo::new(OutPoint::new(txid, 0), Amount::from_sat(sats), ScriptBuf::new())
}

pub fn utxos(confirmed: &[(u32, u64)], unconfirmed: &[(u32, u64)]) -> Utxos {
    Utxos::new(
        confirmed.iter().map(|&(n, v)| utxo(n, v)),
        unconfirmed.iter().map(|&(n, v)| utxo(n, v)),
    )
}

pub fn descriptor(tag: &str) -> WalletDescriptor {
    WalletDescriptor::new(
        format!("spending-{tag}"),
        format!("wpkh(recv-{tag}/0/*)"),
        format!("wpkh(change-{tag}/1/*)"),
        Network::Bitcoin,
    )
}

pub fn account() -> FullAccount {
    FullAccount::new("account-1", descriptor("main"))
}

pub fn broadcast_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().expect("time")
}

/// In-memory wallet. Fee is rate × (11 + 68 per input + 31) vbytes unless fixed.
pub struct FakeWallet {
    identifier: String,
    pub utxos: Mutex<Utxos>,
    pub fixed_fee: Mutex<Option<Amount>>,
    pub psbt_error: Mutex<Option<WalletError>>,
    pub data_error: Mutex<Option<WalletError>>,
    pub requests: Mutex<Vec<PsbtConstructionMethod>>,
    pub addresses_revealed: AtomicUsize,
}

impl FakeWallet {
    pub fn new(utxos: Utxos) -> Self {
        Self {
            identifier: "fake".into(),
            utxos: Mutex::new(utxos),
            fixed_fee: Mutex::new(None),
            psbt_error: Mutex::new(None),
            data_error: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            addresses_revealed: AtomicUsize::new(0),
        }
    }

    pub fn last_request(&self) -> Option<PsbtConstructionMethod> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SpendingWallet for FakeWallet {
    fn identifier(&self) -> &str { &self.identifier }

    async fn transaction_data(&self) -> WalletResult<TransactionData> {
        if let Some(e) = self.data_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(TransactionData { utxos: self.utxos.lock().unwrap().clone() })
    }

    async fn new_address(&self) -> WalletResult<Address> {
        self.addresses_revealed.fetch_add(1, Ordering::SeqCst);
        Ok(target_address())
    }

    async fn create_signed_psbt(&self, method: PsbtConstructionMethod) -> WalletResult<Psbt> {
        self.requests.lock().unwrap().push(method.clone());
        if let Some(e) = self.psbt_error.lock().unwrap().clone() {
            return Err(e);
        }
        let PsbtConstructionMethod::DrainAllFromUtxos { fee_policy: FeePolicy::Rate(rate), utxos, .. } = method;
        let vbytes = 11 + 68 * utxos.len() as u64 + 31;
        let fee = self
            .fixed_fee
            .lock()
            .unwrap()
            .unwrap_or_else(|| Amount::from_sat(rate.to_sat_per_vb_ceil() * vbytes));
        Ok(Psbt::new(b"psbt\xff-app-signed".to_vec(), fee))
    }

    async fn broadcast(&self, _psbt: &Psbt) -> WalletResult<Txid> {
        Ok(Txid::from_str(&format!("{:064x}", 0xc0ffee)).expect("txid"))
    }
}

/// WalletService over a single fake wallet, recording broadcasts.
pub struct FakeWalletService {
    pub wallet: Arc<FakeWallet>,
    pub unavailable: Mutex<Option<WalletError>>,
    pub broadcast_error: Mutex<Option<WalletError>>,
    pub broadcasts: Mutex<Vec<(Psbt, EstimatedTransactionPriority)>>,
}

impl FakeWalletService {
    pub fn new(wallet: Arc<FakeWallet>) -> Self {
        Self {
            wallet,
            unavailable: Mutex::new(None),
            broadcast_error: Mutex::new(None),
            broadcasts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl WalletService for FakeWalletService {
    async fn spending_wallet(&self, _account: &FullAccount) -> WalletResult<Arc<dyn SpendingWallet>> {
        if let Some(e) = self.unavailable.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.wallet.clone())
    }

    async fn broadcast(&self, _account: &FullAccount, psbt: &Psbt, priority: EstimatedTransactionPriority) -> WalletResult<BroadcastDetail> {
        if let Some(e) = self.broadcast_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.broadcasts.lock().unwrap().push((psbt.clone(), priority));
        let txid = self.wallet.broadcast(psbt).await?;
        Ok(BroadcastDetail { txid, broadcast_time: broadcast_time(), priority })
    }
}

pub struct FakeAddressService {
    pub wallet: Arc<FakeWallet>,
    pub error: Mutex<Option<WalletError>>,
}

#[async_trait]
impl BitcoinAddressService for FakeAddressService {
    async fn generate_address(&self) -> WalletResult<Address> {
        if let Some(e) = self.error.lock().unwrap().clone() {
            return Err(e);
        }
        self.wallet.new_address().await
    }
}

pub struct FakeFeeEstimator {
    pub rate: FeeRate,
    pub error: Mutex<Option<WalletError>>,
    pub asked: Mutex<Vec<(Network, EstimatedTransactionPriority)>>,
}

impl FakeFeeEstimator {
    pub fn new(sat_per_vb: u64) -> Self {
        Self { rate: FeeRate::from_sat_per_vb_unchecked(sat_per_vb), error: Mutex::new(None), asked: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl FeeRateEstimator for FakeFeeEstimator {
    async fn estimate(&self, network: Network, priority: EstimatedTransactionPriority) -> WalletResult<FeeRate> {
        self.asked.lock().unwrap().push((network, priority));
        if let Some(e) = self.error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self.rate)
    }
}

/// Factory that counts constructions, optionally sleeping and failing the first `fail_first` calls.
pub struct CountingFactory {
    pub constructions: AtomicUsize,
    pub delay: Duration,
    pub fail_first: AtomicUsize,
}

impl CountingFactory {
    pub fn new(delay: Duration) -> Self {
        Self { constructions: AtomicUsize::new(0), delay, fail_first: AtomicUsize::new(0) }
    }

    pub fn failing(delay: Duration, failures: usize) -> Self {
        Self { constructions: AtomicUsize::new(0), delay, fail_first: AtomicUsize::new(failures) }
    }

    pub fn count(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletFactory for CountingFactory {
    async fn create(&self, _descriptor: &WalletDescriptor) -> WalletResult<Arc<dyn SpendingWallet>> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let failed = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(WalletError::Construction("store busy".into()));
        }
        Ok(Arc::new(FakeWallet::new(Utxos::default())))
    }
}

/// Pointer identity of a trait object, ignoring the vtable.
pub fn same_instance(a: &Arc<dyn SpendingWallet>, b: &Arc<dyn SpendingWallet>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
