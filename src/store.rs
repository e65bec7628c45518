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

//! Storage seam of the engine.
//!
//! Every mutating ledger operation runs inside
//! [`LedgerStore::with_unit_of_work`]. Reads made through the [`UnitOfWork`]
//! gate the writes staged on it, and the store commits all of them or none.
//! Implementations decide how isolation is achieved; the in-memory
//! [`MemoryStore`](crate::MemoryStore) uses optimistic row versions and may
//! run the operation more than once, so operations must not have side effects
//! outside the unit.

use crate::LedgerError;
use crate::base::{CategoryId, InstallmentGroupId, ProductId, TransactionId};
use crate::product::FinancialProduct;
use crate::transaction::{NewTransaction, Transaction};

/// Reads and staged writes of one atomic operation.
///
/// Reads observe the unit's own staged writes.
pub trait UnitOfWork {
    /// # Errors
    ///
    /// [`LedgerError::ProductNotFound`] if no such product exists.
    fn product(&mut self, id: ProductId) -> Result<FinancialProduct, LedgerError>;

    /// The card owning the limit pool that a shared-limit `card` draws on: a
    /// credit card of the same owner and institution that does not itself
    /// share its limit and has limits configured.
    fn shared_limit_owner(&mut self, card: &FinancialProduct) -> Option<FinancialProduct>;

    fn put_product(&mut self, product: FinancialProduct);

    /// # Errors
    ///
    /// [`LedgerError::TransactionNotFound`] if no such record exists.
    fn transaction(&mut self, id: TransactionId) -> Result<Transaction, LedgerError>;

    /// Every live record of an installment group, ordered by installment number.
    fn installment_group(&mut self, group: InstallmentGroupId) -> Vec<Transaction>;

    fn insert_transaction(&mut self, record: NewTransaction) -> TransactionId;

    fn put_transaction(&mut self, record: Transaction);

    fn remove_transaction(&mut self, id: TransactionId);

    fn category_exists(&mut self, id: CategoryId) -> bool;
}

/// Durable home of products and transaction records.
pub trait LedgerStore: Send + Sync {
    /// Runs `operation` as one atomic unit.
    ///
    /// An error returned by `operation` discards everything it staged.
    fn with_unit_of_work<T, F>(&self, operation: F) -> Result<T, LedgerError>
    where
        F: FnMut(&mut dyn UnitOfWork) -> Result<T, LedgerError>;

    /// Committed state of a product, outside any unit of work.
    fn product(&self, id: ProductId) -> Option<FinancialProduct>;

    /// Committed state of a record, outside any unit of work.
    fn transaction(&self, id: TransactionId) -> Option<Transaction>;

    /// Committed records matching `predicate`, in no particular order.
    fn transactions_where(&self, predicate: &dyn Fn(&Transaction) -> bool) -> Vec<Transaction>;
}
