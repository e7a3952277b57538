//! Unspent output snapshot of a spending wallet.

use bitcoin::{Amount, OutPoint, ScriptBuf};
use std::collections::BTreeSet;

/// Ordered by outpoint first, so a set of these iterates in outpoint order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub value: Amount,
    pub script_pubkey: ScriptBuf,
}

impl Utxo {
    pub fn new(outpoint: OutPoint, value: Amount, script_pubkey: ScriptBuf) -> Self {
        Self { outpoint, value, script_pubkey }
    }
}

/// Point-in-time view of a wallet's unspent outputs. Rebuilt on every refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utxos {
    confirmed: BTreeSet<Utxo>,
    unconfirmed: BTreeSet<Utxo>,
}

impl Utxos {
    pub fn new(confirmed: impl IntoIterator<Item = Utxo>, unconfirmed: impl IntoIterator<Item = Utxo>) -> Self {
        Self { confirmed: confirmed.into_iter().collect(), unconfirmed: unconfirmed.into_iter().collect() }
    }

    pub fn confirmed(&self) -> &BTreeSet<Utxo> { &self.confirmed }
    pub fn unconfirmed(&self) -> &BTreeSet<Utxo> { &self.unconfirmed }

    pub fn has_unconfirmed(&self) -> bool { !self.unconfirmed.is_empty() }

    pub fn confirmed_balance(&self) -> Option<Amount> {
        total_value(&self.confirmed)
    }
}

/// Exact satoshi sum; `None` on overflow.
pub fn total_value<'a>(utxos: impl IntoIterator<Item = &'a Utxo>) -> Option<Amount> {
    utxos.into_iter().try_fold(Amount::ZERO, |acc, u| acc.checked_add(u.value))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionData {
    pub utxos: Utxos,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Txid;
    use std::str::FromStr;

    fn utxo(n: u32, sats: u64) -> Utxo {
        let txid = Txid::from_str(&format!("{:064x}", n)).expect("txid");
        Utxo::new(OutPoint::new(txid, 0), Amount::from_sat(sats), ScriptBuf::new())
    }

    #[test]
    fn snapshot_iterates_in_outpoint_order() {
        let utxos = Utxos::new(vec![utxo(3, 1), utxo(1, 5), utxo(2, 2)], vec![]);
        let order: Vec<u64> = utxos.confirmed().iter().map(|u| u.value.to_sat()).collect();
        assert_eq!(order, vec![5, 2, 1]);
    }

    #[test]
    fn duplicate_outputs_collapse() {
        let utxos = Utxos::new(vec![utxo(1, 5), utxo(1, 5)], vec![utxo(9, 1)]);
        assert_eq!(utxos.confirmed().len(), 1);
        assert!(utxos.has_unconfirmed());
    }

    #[test]
    fn confirmed_balance_excludes_unconfirmed() {
        let utxos = Utxos::new(vec![utxo(1, 1), utxo(2, 2)], vec![utxo(3, 100)]);
        assert_eq!(utxos.confirmed_balance(), Some(Amount::from_sat(3)));
    }

    #[test]
    fn total_value_reports_overflow() {
        let big = [utxo(1, u64::MAX), utxo(2, 1)];
        assert_eq!(total_value(&big), None);
        assert_eq!(total_value(&[] as &[Utxo]), Some(Amount::ZERO));
    }
}
