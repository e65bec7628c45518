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

//! Transfers between two products of the same user.
//!
//! A transfer debits `amount` from the source and credits
//! `destination_amount` (or `amount`) to the destination. Paying into a credit
//! card reduces its debt and frees single-payment capacity.

use crate::LedgerError;
use crate::base::{TransactionId, UserId};
use crate::credit_limit::ChargeKind;
use crate::engine::Engine;
use crate::postings::{self, LimitCheck};
use crate::product::{FinancialProduct, ProductKind};
use crate::store::{LedgerStore, UnitOfWork};
use crate::transaction::{CreateTransfer, NewTransaction, Transaction, TransactionKind};

const DEFAULT_DESCRIPTION: &str = "Transfer";

impl<S: LedgerStore> Engine<S> {
    /// Moves money from `request.from` to `request.to` and records it as a
    /// single transfer record carrying both product ids.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Non-positive amount or destination amount.
    /// - [`LedgerError::ProductNotFound`] - Either side is missing.
    /// - [`LedgerError::Unauthorized`] - Caller does not own both sides.
    /// - [`LedgerError::InvalidOperation`] - Same product on both sides (also after
    ///   debit card delegation), or currencies differ and no destination amount
    ///   was supplied.
    /// - [`LedgerError::InsufficientFunds`] - A debit card source's account cannot cover it.
    pub fn create_transfer(&self, caller: UserId, request: &CreateTransfer) -> Result<TransactionId, LedgerError> {
        request.validate()?;

        let id = self.store.with_unit_of_work(|unit| {
            let from = unit.product(request.from)?;
            let to = unit.product(request.to)?;
            postings::ensure_owner(caller, &from)?;
            postings::ensure_owner(caller, &to)?;

            if from.currency != to.currency && request.destination_amount.is_none() {
                return Err(LedgerError::invalid_operation(format!(
                    "transfer from {} to {} needs a destination amount",
                    from.currency, to.currency
                )));
            }

            let source = postings::balance_holder(unit, &from)?;
            let target = postings::balance_holder(unit, &to)?;
            if source.id == target.id {
                return Err(LedgerError::invalid_operation(format!(
                    "products {} and {} move the same account {}",
                    from.id, to.id, source.id
                )));
            }

            let credited = request.destination_amount.unwrap_or(request.amount);
            if from.kind == ProductKind::DebitCard {
                postings::withdraw(unit, source.id, request.amount)?;
            } else {
                postings::move_balance(unit, source.id, -request.amount)?;
            }
            postings::move_balance(unit, target.id, credited)?;
            if to.is_credit_card() {
                postings::move_limit(unit, &to, ChargeKind::SinglePayment, credited, LimitCheck::Skip)?;
            }

            Ok(unit.insert_transaction(NewTransaction {
                kind: TransactionKind::Transfer,
                amount: request.amount,
                destination_amount: request.destination_amount,
                date: request.date,
                description: request
                    .description
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
                from_product: Some(request.from),
                to_product: Some(request.to),
                category: None,
                installment: None,
                installment_group: None,
                no_interest: false,
            }))
        })?;

        tracing::info!(
            %caller,
            transaction = %id,
            from = %request.from,
            to = %request.to,
            amount = %request.amount,
            "transfer created"
        );
        Ok(id)
    }
}

/// Loads both sides of a transfer record, failing unless `caller` owns both.
pub(crate) fn owned_endpoints(
    unit: &mut dyn UnitOfWork,
    caller: UserId,
    record: &Transaction,
) -> Result<(FinancialProduct, FinancialProduct), LedgerError> {
    let (from, to) = endpoints(unit, record)?;
    postings::ensure_owner(caller, &from)?;
    postings::ensure_owner(caller, &to)?;
    Ok((from, to))
}

/// Posts the exact opposite of `record`'s transfer legs.
pub(crate) fn reverse(unit: &mut dyn UnitOfWork, caller: UserId, record: &Transaction) -> Result<(), LedgerError> {
    let (from, to) = owned_endpoints(unit, caller, record)?;

    let credited = record.credited_amount();
    let source = postings::balance_holder(unit, &from)?;
    let target = postings::balance_holder(unit, &to)?;
    postings::move_balance(unit, source.id, record.amount)?;
    postings::move_balance(unit, target.id, -credited)?;
    if to.is_credit_card() {
        postings::move_limit(unit, &to, ChargeKind::SinglePayment, -credited, LimitCheck::Skip)?;
    }
    Ok(())
}

fn endpoints(
    unit: &mut dyn UnitOfWork,
    record: &Transaction,
) -> Result<(FinancialProduct, FinancialProduct), LedgerError> {
    match (record.from_product, record.to_product) {
        (Some(from), Some(to)) => Ok((unit.product(from)?, unit.product(to)?)),
        _ => Err(LedgerError::invalid_operation(format!(
            "transfer {} is missing one of its products",
            record.id
        ))),
    }
}
