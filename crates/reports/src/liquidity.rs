//! Cash / bank / UPI position of the society pool.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use sahakari_core::{Money, PaymentMode};

use crate::record::LedgerRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquiditySnapshot {
    pub as_of: Option<NaiveDate>,
    pub cash: Money,
    pub bank: Money,
    pub upi: Money,
    pub total: Money,
    /// Gross money in, counting the receiving leg of transfers.
    pub inflows: Money,
    /// Gross money out, counting the sending leg of transfers.
    pub outflows: Money,
}

impl LiquiditySnapshot {
    fn empty(as_of: Option<NaiveDate>) -> Self {
        Self {
            as_of,
            cash: Money::ZERO,
            bank: Money::ZERO,
            upi: Money::ZERO,
            total: Money::ZERO,
            inflows: Money::ZERO,
            outflows: Money::ZERO,
        }
    }

    pub fn balance(&self, mode: PaymentMode) -> Money {
        match mode {
            PaymentMode::Cash => self.cash,
            PaymentMode::Bank => self.bank,
            PaymentMode::Upi => self.upi,
        }
    }

    fn balance_mut(&mut self, mode: PaymentMode) -> &mut Money {
        match mode {
            PaymentMode::Cash => &mut self.cash,
            PaymentMode::Bank => &mut self.bank,
            PaymentMode::Upi => &mut self.upi,
        }
    }

    /// Modes whose book balance went below zero. A negative balance usually
    /// means a movement was recorded under the wrong mode.
    pub fn negative_modes(&self) -> Vec<PaymentMode> {
        PaymentMode::ALL
            .into_iter()
            .filter(|m| self.balance(*m).is_negative())
            .collect()
    }
}

/// Folds every record dated on or before `as_of` (all records when `None`).
///
/// Balances are reported as-is, including negatives.
pub fn liquidity_snapshot(records: &[LedgerRecord], as_of: Option<NaiveDate>) -> LiquiditySnapshot {
    let mut snap = LiquiditySnapshot::empty(as_of);

    for record in records {
        if as_of.is_some_and(|cutoff| record.date > cutoff) {
            continue;
        }
        for (mode, delta) in record.flows() {
            *snap.balance_mut(mode) += delta;
            if delta.is_negative() {
                snap.outflows -= delta;
            } else {
                snap.inflows += delta;
            }
        }
    }

    snap.total = snap.cash + snap.bank + snap.upi;
    snap
}
