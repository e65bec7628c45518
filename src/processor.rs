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

//! Expense and income processing.
//!
//! | Product | Expense | Income |
//! |---------|---------|--------|
//! | Cash, accounts, loan | `balance -= amount` | `balance += amount` |
//! | Debit card | linked account, must cover the amount | linked account |
//! | Credit card | `balance -= total debt`, pool consumed | `balance += amount` |
//!
//! Updates move balances and pools by the difference between the new and old
//! amount; deletes post the exact opposite of the record's creation effect.

use crate::LedgerError;
use crate::base::{InstallmentGroupId, TransactionId, UserId};
use crate::credit_limit::ChargeKind;
use crate::engine::Engine;
use crate::installments::{self, InstallmentPlan, PlannedInstallment};
use crate::postings::{self, LimitCheck};
use crate::product::{FinancialProduct, ProductKind};
use crate::store::{LedgerStore, UnitOfWork};
use crate::transaction::{
    CreateTransaction, EntryKind, InstallmentPosition, NewTransaction, Transaction, TransactionKind,
    UpdateTransaction,
};
use crate::transfer;
use rust_decimal::Decimal;

impl<S: LedgerStore> Engine<S> {
    /// Records an expense or income, splitting credit card purchases into
    /// installments. Returns the ids of the inserted records in installment
    /// order.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] / [`LedgerError::Validation`] - Malformed request.
    /// - [`LedgerError::ProductNotFound`] / [`LedgerError::CategoryNotFound`] - Unknown reference.
    /// - [`LedgerError::Unauthorized`] - Caller does not own the product.
    /// - [`LedgerError::InvalidOperation`] - Installments on a non credit card, or
    ///   a debit card without a usable linked account.
    /// - [`LedgerError::InsufficientFunds`] - Debit card's account cannot cover it.
    /// - [`LedgerError::InsufficientLimit`] - Credit card pool exhausted.
    pub fn create_transaction(
        &self,
        caller: UserId,
        request: &CreateTransaction,
    ) -> Result<Vec<TransactionId>, LedgerError> {
        request.validate()?;
        let plan = installments::plan(
            request.date,
            request.installments,
            request.amount,
            request.installment_amount,
            self.config.money_scale,
        )?;
        let group = plan.is_grouped().then(InstallmentGroupId::new);

        let ids = self.store.with_unit_of_work(|unit| {
            let product = unit.product(request.product)?;
            postings::ensure_owner(caller, &product)?;
            postings::ensure_category(unit, request.category)?;

            if plan.is_grouped() && !product.is_credit_card() {
                return Err(LedgerError::invalid_operation(format!(
                    "installments require a credit card, product {} is a {}",
                    product.id, product.kind
                )));
            }
            if request.no_interest && !product.accepts_no_interest() {
                return Err(LedgerError::validation(format!(
                    "product {} does not offer no-interest financing",
                    product.id
                )));
            }

            match request.kind {
                EntryKind::Expense => charge(unit, &product, &plan)?,
                EntryKind::Income => {
                    let holder = postings::balance_holder(unit, &product)?;
                    postings::move_balance(unit, holder.id, plan.total_debt)?;
                }
            }

            Ok(plan
                .installments
                .iter()
                .map(|installment| unit.insert_transaction(new_record(request, &plan, installment, group)))
                .collect::<Vec<_>>())
        })?;

        tracing::info!(
            %caller,
            product = %request.product,
            kind = ?request.kind,
            amount = %plan.total_debt,
            records = ids.len(),
            "transaction created"
        );
        Ok(ids)
    }

    /// Replaces the editable fields of a record, moving the owning product's
    /// balance (and card pool) by the amount difference. A category change is
    /// copied to every record of the same installment group.
    ///
    /// # Errors
    ///
    /// As [`create_transaction`](Self::create_transaction), plus
    /// [`LedgerError::TransactionNotFound`], and [`LedgerError::InvalidOperation`]
    /// when the amount of a transfer is edited. Editing a transfer requires
    /// owning both of its products.
    pub fn update_transaction(
        &self,
        caller: UserId,
        id: TransactionId,
        patch: &UpdateTransaction,
    ) -> Result<Transaction, LedgerError> {
        if patch.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let updated = self.store.with_unit_of_work(|unit| {
            let current = unit.transaction(id)?;
            let product = source_product(unit, &current)?;
            postings::ensure_owner(caller, &product)?;
            if current.kind == TransactionKind::Transfer {
                transfer::owned_endpoints(unit, caller, &current)?;
            }
            postings::ensure_category(unit, patch.category)?;

            if patch.no_interest && !current.no_interest {
                if current.kind != TransactionKind::Expense || current.is_installment() {
                    return Err(LedgerError::validation(
                        "no-interest financing only applies to single-payment expenses",
                    ));
                }
                if !product.accepts_no_interest() {
                    return Err(LedgerError::validation(format!(
                        "product {} does not offer no-interest financing",
                        product.id
                    )));
                }
            }

            let delta = patch.amount - current.amount;
            if !delta.is_zero() {
                match current.kind {
                    TransactionKind::Expense => reprice_expense(unit, &product, &current, delta)?,
                    TransactionKind::Income => {
                        let holder = postings::balance_holder(unit, &product)?;
                        postings::move_balance(unit, holder.id, delta)?;
                    }
                    TransactionKind::Transfer => {
                        return Err(LedgerError::invalid_operation(
                            "transfer amounts cannot be edited, delete and recreate the transfer",
                        ));
                    }
                }
            }

            let mut updated = current.clone();
            updated.description.clone_from(&patch.description);
            updated.amount = patch.amount;
            updated.date = patch.date;
            updated.category = patch.category;
            updated.no_interest = patch.no_interest;
            unit.put_transaction(updated.clone());

            if let Some(group) = current.installment_group {
                for mut sibling in unit.installment_group(group) {
                    if sibling.id != id && sibling.category != patch.category {
                        sibling.category = patch.category;
                        unit.put_transaction(sibling);
                    }
                }
            }
            Ok(updated)
        })?;

        tracing::info!(%caller, transaction = %id, amount = %updated.amount, "transaction updated");
        Ok(updated)
    }

    /// Reverses the balance and limit effect of a record and removes it.
    /// Other records of its installment group are left as they are.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::TransactionNotFound`] - No such record.
    /// - [`LedgerError::Unauthorized`] - Caller does not own its product(s).
    /// - [`LedgerError::InvalidOperation`] - The products it moved can no longer
    ///   be resolved (e.g. a debit card lost its linked account).
    pub fn delete_transaction(&self, caller: UserId, id: TransactionId) -> Result<Transaction, LedgerError> {
        let removed = self.store.with_unit_of_work(|unit| {
            let record = unit.transaction(id)?;
            let product = source_product(unit, &record)?;
            postings::ensure_owner(caller, &product)?;

            match record.kind {
                TransactionKind::Expense => refund_expense(unit, &product, &record)?,
                TransactionKind::Income => {
                    let holder = postings::balance_holder(unit, &product)?;
                    postings::move_balance(unit, holder.id, -record.amount)?;
                }
                TransactionKind::Transfer => transfer::reverse(unit, caller, &record)?,
            }

            unit.remove_transaction(id);
            Ok(record)
        })?;

        tracing::info!(%caller, transaction = %id, kind = ?removed.kind, "transaction deleted");
        Ok(removed)
    }
}

fn source_product(unit: &mut dyn UnitOfWork, record: &Transaction) -> Result<FinancialProduct, LedgerError> {
    let id = record.source_product().ok_or_else(|| {
        LedgerError::invalid_operation(format!("transaction {} has no product", record.id))
    })?;
    unit.product(id)
}

/// Posts a new expense of `plan.total_debt` against `product`.
fn charge(unit: &mut dyn UnitOfWork, product: &FinancialProduct, plan: &InstallmentPlan) -> Result<(), LedgerError> {
    match product.kind {
        ProductKind::CreditCard => {
            let kind = if plan.is_grouped() {
                ChargeKind::Installments
            } else {
                ChargeKind::SinglePayment
            };
            postings::move_limit(unit, product, kind, -plan.total_debt, LimitCheck::Enforce)?;
            postings::move_balance(unit, product.id, -plan.total_debt)
        }
        ProductKind::DebitCard => {
            let holder = postings::balance_holder(unit, product)?;
            postings::withdraw(unit, holder.id, plan.total_debt)
        }
        _ => postings::move_balance(unit, product.id, -plan.total_debt),
    }
}

/// Moves an existing expense by `delta` (positive when it grew).
fn reprice_expense(
    unit: &mut dyn UnitOfWork,
    product: &FinancialProduct,
    record: &Transaction,
    delta: Decimal,
) -> Result<(), LedgerError> {
    match product.kind {
        ProductKind::CreditCard => {
            postings::move_limit(unit, product, ChargeKind::of(record), -delta, LimitCheck::Enforce)?;
            postings::move_balance(unit, product.id, -delta)
        }
        ProductKind::DebitCard => {
            let holder = postings::balance_holder(unit, product)?;
            if delta > Decimal::ZERO {
                postings::withdraw(unit, holder.id, delta)
            } else {
                postings::move_balance(unit, holder.id, -delta)
            }
        }
        _ => postings::move_balance(unit, product.id, -delta),
    }
}

fn refund_expense(unit: &mut dyn UnitOfWork, product: &FinancialProduct, record: &Transaction) -> Result<(), LedgerError> {
    match product.kind {
        ProductKind::CreditCard => {
            postings::move_limit(unit, product, ChargeKind::of(record), record.amount, LimitCheck::Skip)?;
            postings::move_balance(unit, product.id, record.amount)
        }
        _ => {
            let holder = postings::balance_holder(unit, product)?;
            postings::move_balance(unit, holder.id, record.amount)
        }
    }
}

fn new_record(
    request: &CreateTransaction,
    plan: &InstallmentPlan,
    installment: &PlannedInstallment,
    group: Option<InstallmentGroupId>,
) -> NewTransaction {
    let grouped = plan.is_grouped();
    let description = if grouped {
        format!("{} ({}/{})", request.description, installment.number, plan.count())
    } else {
        request.description.clone()
    };
    NewTransaction {
        kind: request.kind.into(),
        amount: installment.amount,
        destination_amount: None,
        date: installment.date,
        description,
        from_product: (request.kind == EntryKind::Expense).then_some(request.product),
        to_product: (request.kind == EntryKind::Income).then_some(request.product),
        category: request.category,
        installment: grouped.then_some(InstallmentPosition {
            number: installment.number,
            total: plan.count(),
        }),
        installment_group: group,
        no_interest: request.no_interest,
    }
}
