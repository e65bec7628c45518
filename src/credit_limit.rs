// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Credit limit calculation.
//!
//! Limit fields hold the *remaining* capacity of a pool: charges decrement
//! them, payments and reversals give capacity back. The functions here are
//! pure; they receive the product that owns the pool, which for a
//! shared-limit card is a sibling resolved by the store.
//!
//! | Card configuration | Single-payment charge | Installment charge |
//! |--------------------|-----------------------|--------------------|
//! | split pools | `limit_single_payment` | `limit_installments` |
//! | split pool unset | legacy `limit` | legacy `limit` |
//! | `unified_limit` | both fields together | both fields together |
//! | no limit fields | unchecked | unchecked |
//!
//! Available credit is the remaining value of the selected pool. The card
//! balance is not added on top: every charge already decremented the pool, so
//! adding the debt again would count it twice. Both cards sharing a pool
//! report the same availability.

use crate::LedgerError;
use crate::product::{FinancialProduct, LimitField};
use crate::transaction::Transaction;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Pool named in [`LedgerError::InsufficientLimit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitPool {
    SinglePayment,
    Installments,
    Unified,
    Legacy,
}

impl fmt::Display for LimitPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SinglePayment => "single-payment",
            Self::Installments => "installments",
            Self::Unified => "unified",
            Self::Legacy => "legacy",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargeKind {
    SinglePayment,
    Installments,
}

impl ChargeKind {
    pub fn of(transaction: &Transaction) -> Self {
        if transaction.is_installment() {
            Self::Installments
        } else {
            Self::SinglePayment
        }
    }
}

/// The pool a charge draws on, resolved against its owning product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSelection {
    pub pool: LimitPool,
    pub available: Decimal,
    fields: Vec<LimitField>,
}

impl PoolSelection {
    pub fn fields(&self) -> &[LimitField] {
        &self.fields
    }
}

/// Resolves the pool of `owner` that a charge of `kind` draws on.
///
/// Returns `None` when the owner enforces no limit for this kind of charge.
pub fn select_pool(owner: &FinancialProduct, kind: ChargeKind) -> Option<PoolSelection> {
    if !owner.has_limits() {
        return None;
    }

    if owner.unified_limit {
        let mut fields: Vec<LimitField> = [LimitField::SinglePayment, LimitField::Installments]
            .into_iter()
            .filter(|field| owner.limit_value(*field).is_some())
            .collect();
        if fields.is_empty() {
            fields.push(LimitField::Legacy);
        }
        // Both fields track the same pool; the smaller one is authoritative if
        // they ever drift apart.
        let available = fields.iter().filter_map(|field| owner.limit_value(*field)).min()?;
        return Some(PoolSelection {
            pool: LimitPool::Unified,
            available,
            fields,
        });
    }

    let (field, pool) = match kind {
        ChargeKind::SinglePayment => (LimitField::SinglePayment, LimitPool::SinglePayment),
        ChargeKind::Installments => (LimitField::Installments, LimitPool::Installments),
    };
    match (owner.limit_value(field), owner.limit) {
        (Some(available), _) => Some(PoolSelection {
            pool,
            available,
            fields: vec![field],
        }),
        (None, Some(available)) => Some(PoolSelection {
            pool: LimitPool::Legacy,
            available,
            fields: vec![LimitField::Legacy],
        }),
        (None, None) => None,
    }
}

/// Fails with [`LedgerError::InsufficientLimit`] when `required` exceeds the pool.
pub fn ensure_available(selection: &PoolSelection, required: Decimal) -> Result<(), LedgerError> {
    if selection.available < required {
        return Err(LedgerError::InsufficientLimit {
            available: selection.available,
            required,
            pool: selection.pool,
        });
    }
    Ok(())
}

/// Moves every field backing `selection` by `delta` (negative for a charge).
pub fn apply(owner: &mut FinancialProduct, selection: &PoolSelection, delta: Decimal) -> Result<(), LedgerError> {
    for field in &selection.fields {
        owner.adjust_limit(*field, delta)?;
    }
    Ok(())
}

/// Credit still available for a charge of `kind`; `None` means unlimited.
pub fn available_credit(owner: &FinancialProduct, kind: ChargeKind) -> Option<Decimal> {
    select_pool(owner, kind).map(|selection| selection.available)
}
