//! WalletInstanceCache - at most one live wallet per descriptor pair

use super::{SpendingWallet, WalletFactory};
use crate::descriptor::{DescriptorKey, WalletDescriptor};
use crate::error::WalletResult;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

type Slot = Arc<OnceCell<Arc<dyn SpendingWallet>>>;

#[derive(Default)]
struct Slots {
    live: HashMap<DescriptorKey, Slot>,
    /// Evicted instances, tracked until their last holder drops them.
    retired: HashMap<DescriptorKey, Weak<dyn SpendingWallet>>,
}

pub struct WalletInstanceCache {
    factory: Arc<dyn WalletFactory>,
    slots: RwLock<Slots>,
}

impl WalletInstanceCache {
    pub fn new(factory: Arc<dyn WalletFactory>) -> Self {
        Self { factory, slots: RwLock::new(Slots::default()) }
    }

    /// Return the live wallet for `descriptor`, constructing it if needed.
    ///
    /// Concurrent callers with the same key await one shared construction. The map lock
    /// only guards slot lookup/registration, so construction of different keys overlaps.
    /// A failed construction leaves the slot empty and the next caller starts over.
    pub async fn get_or_create_wallet(&self, descriptor: &WalletDescriptor) -> WalletResult<Arc<dyn SpendingWallet>> {
        let key = descriptor.key();
        let slot = self.slot(key);
        if let Some(wallet) = slot.get() {
            return Ok(wallet.clone());
        }

        let wallet = slot
            .get_or_try_init(|| async {
                debug!(key = %key, identifier = descriptor.identifier(), "constructing wallet");
                self.factory.create(descriptor).await
            })
            .await
            .map_err(|e| {
                warn!(key = %key, error = %e, "wallet construction failed");
                e
            })?;
        Ok(wallet.clone())
    }

    fn slot(&self, key: DescriptorKey) -> Slot {
        if let Some(slot) = self.read().live.get(&key) {
            return slot.clone();
        }
        let mut slots = self.write();
        if let Some(slot) = slots.live.get(&key) {
            return slot.clone();
        }
        // An evicted instance somebody still holds is adopted again instead of rebuilt.
        let revived = slots.retired.remove(&key).and_then(|weak| weak.upgrade());
        if revived.is_some() {
            info!(key = %key, "re-adopted evicted wallet still in use");
        } else {
            debug!(key = %key, "registered wallet slot");
        }
        let slot = Arc::new(OnceCell::new_with(revived));
        slots.live.insert(key, slot.clone());
        slot
    }

    /// Cached instance for `descriptor`, without constructing one.
    pub fn get(&self, descriptor: &WalletDescriptor) -> Option<Arc<dyn SpendingWallet>> {
        self.read().live.get(&descriptor.key())?.get().cloned()
    }

    /// Number of fully constructed wallets.
    pub fn cached_count(&self) -> usize {
        self.read().live.values().filter(|s| s.initialized()).count()
    }

    /// Release the cache's reference for `descriptor` (account removed).
    ///
    /// Returns false when nothing is cached or a construction is still in flight. While any
    /// holder keeps the evicted instance alive, the next request gets that same instance back.
    pub fn evict(&self, descriptor: &WalletDescriptor) -> bool {
        let key = descriptor.key();
        let mut slots = self.write();
        let wallet = match slots.live.get(&key).and_then(|slot| slot.get()) {
            Some(wallet) => Arc::downgrade(wallet),
            None => return false,
        };
        slots.live.remove(&key);
        slots.retired.retain(|_, weak| weak.strong_count() > 0);
        slots.retired.insert(key, wallet);
        info!(key = %key, "evicted wallet");
        true
    }

    // Map operations cannot leave `Slots` half-updated, so a poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Network;
    use crate::error::WalletError;
    use crate::utxo::TransactionData;
    use crate::wallet::{Psbt, PsbtConstructionMethod};
    use async_trait::async_trait;
    use bitcoin::{Address, Txid};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Idle;

    #[async_trait]
    impl SpendingWallet for Idle {
        fn identifier(&self) -> &str { "idle" }
        async fn transaction_data(&self) -> WalletResult<TransactionData> { Ok(TransactionData::default()) }
        async fn new_address(&self) -> WalletResult<Address> { Err(WalletError::Offline) }
        async fn create_signed_psbt(&self, _: PsbtConstructionMethod) -> WalletResult<Psbt> { Err(WalletError::Offline) }
        async fn broadcast(&self, _: &Psbt) -> WalletResult<Txid> { Err(WalletError::Offline) }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl WalletFactory for Counting {
        async fn create(&self, _: &WalletDescriptor) -> WalletResult<Arc<dyn SpendingWallet>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(Idle))
        }
    }

    fn descriptor() -> WalletDescriptor {
        WalletDescriptor::new("spending", "wpkh(recv/0/*)", "wpkh(change/1/*)", Network::Regtest)
    }

    #[tokio::test]
    async fn poisoned_lock_does_not_hide_cached_wallet() {
        let factory = Arc::new(Counting::default());
        let cache = Arc::new(WalletInstanceCache::new(factory.clone()));
        let wallet = cache.get_or_create_wallet(&descriptor()).await.expect("wallet");

        let poisoner = cache.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.slots.write().expect("lock");
            panic!("poison the slot map");
        })
        .join();
        assert!(cache.slots.is_poisoned());

        assert_eq!(cache.cached_count(), 1);
        assert!(Arc::ptr_eq(&cache.get(&descriptor()).expect("cached"), &wallet));
        let again = cache.get_or_create_wallet(&descriptor()).await.expect("wallet");
        assert!(Arc::ptr_eq(&again, &wallet));
        assert_eq!(factory.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retired_entries_are_pruned_once_dropped() {
        let cache = WalletInstanceCache::new(Arc::new(Counting::default()));
        let first = WalletDescriptor::new("a", "wpkh(a/0/*)", "wpkh(a/1/*)", Network::Regtest);
        let second = WalletDescriptor::new("b", "wpkh(b/0/*)", "wpkh(b/1/*)", Network::Regtest);

        drop(cache.get_or_create_wallet(&first).await.expect("wallet"));
        assert!(cache.evict(&first));
        drop(cache.get_or_create_wallet(&second).await.expect("wallet"));
        assert!(cache.evict(&second));

        let slots = cache.read();
        assert_eq!(slots.retired.len(), 1);
        assert!(slots.retired.contains_key(&second.key()));
    }
}
