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

//! Balance and limit postings shared by the processor and the transfer path.
//!
//! All helpers re-read the products they touch from the unit of work, so a
//! product posted to twice in one operation accumulates both postings.

use crate::LedgerError;
use crate::base::{CategoryId, ProductId, UserId};
use crate::credit_limit::{self, ChargeKind};
use crate::product::{FinancialProduct, ProductKind};
use crate::store::UnitOfWork;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LimitCheck {
    /// Reject a charge that exceeds the available pool.
    Enforce,
    /// Reversals and repayments are applied unconditionally.
    Skip,
}

pub(crate) fn ensure_owner(caller: UserId, product: &FinancialProduct) -> Result<(), LedgerError> {
    if product.owner != caller {
        return Err(LedgerError::Unauthorized(product.id));
    }
    Ok(())
}

pub(crate) fn ensure_category(unit: &mut dyn UnitOfWork, category: Option<CategoryId>) -> Result<(), LedgerError> {
    match category {
        Some(id) if !unit.category_exists(id) => Err(LedgerError::CategoryNotFound(id)),
        _ => Ok(()),
    }
}

/// The product whose balance moves on behalf of `product`: a debit card's
/// linked account, otherwise the product itself.
pub(crate) fn balance_holder(
    unit: &mut dyn UnitOfWork,
    product: &FinancialProduct,
) -> Result<FinancialProduct, LedgerError> {
    if product.kind != ProductKind::DebitCard {
        return unit.product(product.id);
    }

    let linked_id = product.linked_product.ok_or_else(|| {
        LedgerError::invalid_operation(format!("debit card {} has no linked account", product.id))
    })?;
    let linked = unit.product(linked_id).map_err(|err| match err {
        LedgerError::ProductNotFound(_) => LedgerError::invalid_operation(format!(
            "debit card {} links to missing product {linked_id}",
            product.id
        )),
        other => other,
    })?;
    if !linked.kind.is_bank_account() {
        return Err(LedgerError::invalid_operation(format!(
            "debit card {} links to {linked_id}, a {} rather than a bank account",
            product.id, linked.kind
        )));
    }
    Ok(linked)
}

pub(crate) fn move_balance(unit: &mut dyn UnitOfWork, id: ProductId, delta: Decimal) -> Result<(), LedgerError> {
    let mut product = unit.product(id)?;
    product.balance = product.balance.checked_add(delta).ok_or_else(LedgerError::out_of_range)?;
    unit.put_product(product);
    Ok(())
}

/// Debits `amount` from an account that must cover it.
pub(crate) fn withdraw(unit: &mut dyn UnitOfWork, id: ProductId, amount: Decimal) -> Result<(), LedgerError> {
    let mut product = unit.product(id)?;
    if product.balance < amount {
        return Err(LedgerError::InsufficientFunds {
            available: product.balance,
            required: amount,
        });
    }
    product.balance = product.balance.checked_sub(amount).ok_or_else(LedgerError::out_of_range)?;
    unit.put_product(product);
    Ok(())
}

/// The card holding the limit pool `card` draws on.
pub(crate) fn limit_owner(unit: &mut dyn UnitOfWork, card: &FinancialProduct) -> Result<FinancialProduct, LedgerError> {
    if !card.shared_limit {
        return unit.product(card.id);
    }
    unit.shared_limit_owner(card).ok_or_else(|| {
        LedgerError::invalid_operation(format!(
            "card {} shares a limit but no sibling card of its institution owns one",
            card.id
        ))
    })
}

/// Moves the `kind` pool backing `card` by `delta`; negative deltas consume
/// credit. Cards whose pool owner has no limits are left untouched.
pub(crate) fn move_limit(
    unit: &mut dyn UnitOfWork,
    card: &FinancialProduct,
    kind: ChargeKind,
    delta: Decimal,
    check: LimitCheck,
) -> Result<(), LedgerError> {
    let mut owner = limit_owner(unit, card)?;
    let Some(selection) = credit_limit::select_pool(&owner, kind) else {
        return Ok(());
    };
    if check == LimitCheck::Enforce && delta < Decimal::ZERO {
        credit_limit::ensure_available(&selection, -delta)?;
    }
    credit_limit::apply(&mut owner, &selection, delta)?;
    unit.put_product(owner);
    Ok(())
}
