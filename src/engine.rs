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

//! Ledger engine.
//!
//! The [`Engine`] is the only writer of transaction records and of product
//! balances and limits. Mutating operations live next to the component they
//! implement:
//!
//! - expenses, incomes and installment purchases: `create_transaction`,
//!   `update_transaction`, `delete_transaction`
//! - transfers between products: `create_transfer`
//!
//! This module holds the engine itself plus the read-only queries and the
//! hooks used by downstream statement reconciliation.
//!
//! # Thread Safety
//!
//! Each operation is one unit of work of the underlying [`LedgerStore`]. The
//! engine holds no locks of its own and can be shared across threads behind
//! an `Arc`.

use crate::LedgerError;
use crate::base::{ProductId, StatementId, TransactionId, UserId};
use crate::config::EngineConfig;
use crate::credit_limit::{self, ChargeKind};
use crate::memory_store::MemoryStore;
use crate::postings;
use crate::product::FinancialProduct;
use crate::store::LedgerStore;
use crate::transaction::{CreateTransaction, Transaction, TransactionKind};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Ledger engine over a [`LedgerStore`].
///
/// # Invariants
///
/// - A debit card's own balance stays zero; its effects land on the linked account.
/// - Every operation commits all of its record and product changes or none.
/// - Deleting a record reverses exactly the balance and limit effect it had.
/// - Records of an installment group keep their individual amounts; only the
///   category is shared across the group.
pub struct Engine<S = MemoryStore> {
    pub(crate) store: S,
    pub(crate) config: EngineConfig,
}

impl Engine<MemoryStore> {
    /// Creates an engine over an empty in-memory store.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine {
            store: MemoryStore::with_config(&config),
            config,
        }
    }
}

impl Default for Engine<MemoryStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: LedgerStore> Engine<S> {
    pub fn with_store(store: S, config: EngineConfig) -> Self {
        Engine { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// # Errors
    ///
    /// - [`LedgerError::ProductNotFound`] - No such product.
    /// - [`LedgerError::Unauthorized`] - Caller does not own it.
    pub fn get_product(&self, caller: UserId, id: ProductId) -> Result<FinancialProduct, LedgerError> {
        let product = self.store.product(id).ok_or(LedgerError::ProductNotFound(id))?;
        postings::ensure_owner(caller, &product)?;
        Ok(product)
    }

    /// # Errors
    ///
    /// - [`LedgerError::TransactionNotFound`] - No such record.
    /// - [`LedgerError::Unauthorized`] - Caller does not own its product.
    pub fn get_transaction(&self, caller: UserId, id: TransactionId) -> Result<Transaction, LedgerError> {
        let record = self
            .store
            .transaction(id)
            .ok_or(LedgerError::TransactionNotFound(id))?;
        if let Some(product) = record.source_product() {
            self.get_product(caller, product)?;
        }
        Ok(record)
    }

    /// Remaining capacity of the pool a `kind` charge on `card` would draw
    /// from, following shared and unified limits. `None` means unlimited.
    pub fn available_credit(
        &self,
        caller: UserId,
        card: ProductId,
        kind: ChargeKind,
    ) -> Result<Option<Decimal>, LedgerError> {
        self.store.with_unit_of_work(|unit| {
            let product = unit.product(card)?;
            postings::ensure_owner(caller, &product)?;
            if !product.is_credit_card() {
                return Err(LedgerError::invalid_operation(format!(
                    "product {card} is a {}, not a credit card",
                    product.kind
                )));
            }
            let owner = postings::limit_owner(unit, &product)?;
            Ok(credit_limit::available_credit(&owner, kind))
        })
    }

    /// Records where `product` is either side, ordered by date then id.
    pub fn list_by_product(&self, caller: UserId, product: ProductId) -> Result<Vec<Transaction>, LedgerError> {
        self.get_product(caller, product)?;
        let mut records = self.store.transactions_where(&|record| record.touches(product));
        records.sort_by_key(|record| (record.date, record.id));
        Ok(records)
    }

    /// Expenses on `product` dated within `start..=end` that no statement has
    /// claimed yet, ordered by date then id.
    pub fn list_unlinked_expenses_in_range(
        &self,
        caller: UserId,
        product: ProductId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Transaction>, LedgerError> {
        if start > end {
            return Err(LedgerError::validation(format!(
                "range start {start} is after its end {end}"
            )));
        }
        self.get_product(caller, product)?;
        let mut records = self.store.transactions_where(&|record| {
            record.kind == TransactionKind::Expense
                && record.from_product == Some(product)
                && record.statement.is_none()
                && (start..=end).contains(&record.date)
        });
        records.sort_by_key(|record| (record.date, record.id));
        Ok(records)
    }

    /// Marks records as reconciled into `statement`, all or none.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::TransactionNotFound`] / [`LedgerError::Unauthorized`] for any id.
    /// - [`LedgerError::InvalidOperation`] - A record already belongs to another statement.
    pub fn link_statement(
        &self,
        caller: UserId,
        ids: &[TransactionId],
        statement: StatementId,
    ) -> Result<(), LedgerError> {
        self.store.with_unit_of_work(|unit| {
            for id in ids {
                let mut record = unit.transaction(*id)?;
                let product_id = record.source_product().ok_or_else(|| {
                    LedgerError::invalid_operation(format!("transaction {id} has no product"))
                })?;
                postings::ensure_owner(caller, &unit.product(product_id)?)?;
                match record.statement {
                    Some(existing) if existing != statement => {
                        return Err(LedgerError::invalid_operation(format!(
                            "transaction {id} already belongs to statement {existing}"
                        )));
                    }
                    Some(_) => {}
                    None => {
                        record.statement = Some(statement);
                        unit.put_transaction(record);
                    }
                }
            }
            Ok(())
        })?;
        tracing::info!(%caller, %statement, records = ids.len(), "linked transactions to statement");
        Ok(())
    }

    /// Creates every request independently; one failure does not stop or undo
    /// the others.
    pub fn import_transactions(
        &self,
        caller: UserId,
        requests: &[CreateTransaction],
    ) -> Vec<Result<Vec<TransactionId>, LedgerError>> {
        requests
            .iter()
            .enumerate()
            .map(|(row, request)| {
                let result = self.create_transaction(caller, request);
                if let Err(err) = &result {
                    tracing::warn!(row, product = %request.product, error = %err, "import row rejected");
                }
                result
            })
            .collect()
    }
}
