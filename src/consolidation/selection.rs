//! Which confirmed outputs a consolidation spends.

use crate::utxo::Utxo;
use std::collections::BTreeSet;

/// Upper bound on consolidation inputs, read from a remote numeric flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxUtxoCap {
    NoCap,
    Cap(usize),
}

impl MaxUtxoCap {
    /// Flag values are truncated toward zero; NaN and anything ≤ 0 disable the cap.
    /// Returns the cap with the coerced count as it is reported to callers.
    pub fn from_flag(value: f64) -> (Self, usize) {
        // `as` saturates and maps NaN to 0
        let count = (value as i64).max(0) as usize;
        (Self::from_count(count), count)
    }

    pub fn from_count(count: usize) -> Self {
        if count == 0 { MaxUtxoCap::NoCap } else { MaxUtxoCap::Cap(count) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoSelection {
    pub utxos: Vec<Utxo>,
    pub exceeds_max: bool,
}

/// All confirmed outputs when uncapped or under the cap; otherwise the `cap` smallest by value,
/// ties broken by outpoint. Result is in outpoint order either way.
pub fn select_for_consolidation(confirmed: &BTreeSet<Utxo>, cap: MaxUtxoCap) -> UtxoSelection {
    match cap {
        MaxUtxoCap::Cap(max) if confirmed.len() > max => {
            let mut by_value: Vec<&Utxo> = confirmed.iter().collect();
            by_value.sort_by(|a, b| a.value.cmp(&b.value).then_with(|| a.outpoint.cmp(&b.outpoint)));
            let mut utxos: Vec<Utxo> = by_value.into_iter().take(max).cloned().collect();
            utxos.sort_by(|a, b| a.outpoint.cmp(&b.outpoint));
            UtxoSelection { utxos, exceeds_max: true }
        }
        _ => UtxoSelection { utxos: confirmed.iter().cloned().collect(), exceeds_max: false },
    }
}
