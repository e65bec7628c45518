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

//! Thread-safe in-memory ledger store with optimistic units of work.
//!
//! Every product and transaction record lives in its own versioned row behind
//! a [`parking_lot::Mutex`], indexed by a [`DashMap`]. A unit of work reads
//! rows without holding their locks, remembering each version it saw, and
//! stages its writes privately. Commit then:
//!
//! 1. locks every row the unit read, products by id first, then records by id;
//! 2. checks that none of them moved since they were read;
//! 3. applies the staged writes and bumps the versions of the written rows.
//!
//! A stale row aborts the commit and the operation runs again from fresh
//! reads. Units touching disjoint products never wait on each other.
//!
//! Row locks are only ever taken after the map reference that produced the
//! row is dropped, so a commit holding row locks can safely insert into the
//! maps.

use crate::LedgerError;
use crate::base::{CategoryId, InstallmentGroupId, ProductId, TransactionId};
use crate::config::EngineConfig;
use crate::product::{FinancialProduct, ProductKind};
use crate::store::{LedgerStore, UnitOfWork};
use crate::transaction::{NewTransaction, Transaction};
use crossbeam::utils::Backoff;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug)]
struct Row<T> {
    version: u64,
    /// `None` once the row has been deleted. Deleted rows leave the map, but
    /// units that already hold the cell still see the bumped version.
    value: Option<T>,
}

impl<T> Row<T> {
    fn new(value: T) -> Self {
        Self {
            version: 0,
            value: Some(value),
        }
    }
}

type Cell<T> = Arc<Mutex<Row<T>>>;

/// In-memory [`LedgerStore`].
#[derive(Debug)]
pub struct MemoryStore {
    products: DashMap<ProductId, Cell<FinancialProduct>>,
    transactions: DashMap<TransactionId, Cell<Transaction>>,
    categories: DashSet<CategoryId>,
    next_transaction_id: AtomicU32,
    max_commit_attempts: u32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            products: DashMap::new(),
            transactions: DashMap::new(),
            categories: DashSet::new(),
            next_transaction_id: AtomicU32::new(1),
            max_commit_attempts: config.max_commit_attempts.max(1),
        }
    }

    /// Registers a product with its opening balance and limits.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Validation`] if a product with the same id exists.
    /// - [`LedgerError::InvalidOperation`] if the product breaks a structural
    ///   invariant (e.g. a debit card with a balance).
    pub fn insert_product(&self, product: FinancialProduct) -> Result<(), LedgerError> {
        product.check_invariants()?;

        // Use entry API for atomic check-and-insert to prevent race conditions
        match self.products.entry(product.id) {
            Entry::Occupied(_) => Err(LedgerError::validation(format!(
                "product {} already exists",
                product.id
            ))),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(Mutex::new(Row::new(product))));
                Ok(())
            }
        }
    }

    pub fn insert_category(&self, id: CategoryId) {
        self.categories.insert(id);
    }

    /// Committed state of every product, ordered by id.
    pub fn products(&self) -> Vec<FinancialProduct> {
        let mut products: Vec<FinancialProduct> = self
            .product_cells()
            .into_iter()
            .filter_map(|(_, cell)| cell.lock().value.clone())
            .collect();
        products.sort_by_key(|product| product.id);
        products
    }

    fn product_cell(&self, id: ProductId) -> Option<Cell<FinancialProduct>> {
        self.products.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    fn product_cells(&self) -> Vec<(ProductId, Cell<FinancialProduct>)> {
        self.products
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }

    fn transaction_cell(&self, id: TransactionId) -> Option<Cell<Transaction>> {
        self.transactions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    fn transaction_cells(&self) -> Vec<(TransactionId, Cell<Transaction>)> {
        self.transactions
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerStore for MemoryStore {
    fn with_unit_of_work<T, F>(&self, mut operation: F) -> Result<T, LedgerError>
    where
        F: FnMut(&mut dyn UnitOfWork) -> Result<T, LedgerError>,
    {
        let backoff = Backoff::new();
        for attempt in 1..=self.max_commit_attempts {
            let mut unit = MemoryUnit::new(self);
            let value = operation(&mut unit)?;
            unit.check_invariants()?;
            match unit.commit() {
                Ok(()) => return Ok(value),
                Err(Stale) => {
                    tracing::debug!(attempt, "unit of work read stale rows, retrying");
                    backoff.snooze();
                }
            }
        }
        tracing::warn!(
            attempts = self.max_commit_attempts,
            "unit of work abandoned after repeated conflicts"
        );
        Err(LedgerError::Conflict {
            attempts: self.max_commit_attempts,
        })
    }

    fn product(&self, id: ProductId) -> Option<FinancialProduct> {
        self.product_cell(id)?.lock().value.clone()
    }

    fn transaction(&self, id: TransactionId) -> Option<Transaction> {
        self.transaction_cell(id)?.lock().value.clone()
    }

    fn transactions_where(&self, predicate: &dyn Fn(&Transaction) -> bool) -> Vec<Transaction> {
        self.transaction_cells()
            .into_iter()
            .filter_map(|(_, cell)| cell.lock().value.clone())
            .filter(|record| predicate(record))
            .collect()
    }
}

/// A row as it was when the unit first read it.
struct Read<T> {
    cell: Cell<T>,
    version: u64,
    value: Option<T>,
}

/// Commit lost against a concurrent writer.
struct Stale;

struct MemoryUnit<'a> {
    store: &'a MemoryStore,
    product_reads: BTreeMap<ProductId, Read<FinancialProduct>>,
    product_writes: BTreeMap<ProductId, FinancialProduct>,
    transaction_reads: BTreeMap<TransactionId, Read<Transaction>>,
    /// `None` stages a deletion.
    transaction_writes: BTreeMap<TransactionId, Option<Transaction>>,
    inserts: BTreeMap<TransactionId, Transaction>,
}

impl<'a> MemoryUnit<'a> {
    fn new(store: &'a MemoryStore) -> Self {
        Self {
            store,
            product_reads: BTreeMap::new(),
            product_writes: BTreeMap::new(),
            transaction_reads: BTreeMap::new(),
            transaction_writes: BTreeMap::new(),
            inserts: BTreeMap::new(),
        }
    }

    fn read_product(&mut self, id: ProductId) -> Option<FinancialProduct> {
        if let Some(product) = self.product_writes.get(&id) {
            return Some(product.clone());
        }
        if let Some(read) = self.product_reads.get(&id) {
            return read.value.clone();
        }
        let cell = self.store.product_cell(id)?;
        let (version, value) = {
            let row = cell.lock();
            (row.version, row.value.clone())
        };
        self.product_reads.insert(
            id,
            Read {
                cell,
                version,
                value: value.clone(),
            },
        );
        value
    }

    /// Current view of a product without recording it as read.
    fn peek_product(&self, id: ProductId, cell: &Cell<FinancialProduct>) -> Option<FinancialProduct> {
        if let Some(product) = self.product_writes.get(&id) {
            return Some(product.clone());
        }
        if let Some(read) = self.product_reads.get(&id) {
            return read.value.clone();
        }
        cell.lock().value.clone()
    }

    fn read_transaction(&mut self, id: TransactionId) -> Option<Transaction> {
        if let Some(record) = self.inserts.get(&id) {
            return Some(record.clone());
        }
        if let Some(staged) = self.transaction_writes.get(&id) {
            return staged.clone();
        }
        if let Some(read) = self.transaction_reads.get(&id) {
            return read.value.clone();
        }
        let cell = self.store.transaction_cell(id)?;
        let (version, value) = {
            let row = cell.lock();
            (row.version, row.value.clone())
        };
        self.transaction_reads.insert(
            id,
            Read {
                cell,
                version,
                value: value.clone(),
            },
        );
        value
    }

    fn check_invariants(&self) -> Result<(), LedgerError> {
        self.product_writes
            .values()
            .try_for_each(FinancialProduct::check_invariants)
    }

    fn commit(self) -> Result<(), Stale> {
        let MemoryUnit {
            store,
            product_reads,
            product_writes,
            transaction_reads,
            transaction_writes,
            inserts,
        } = self;

        // BTreeMap iteration order is the global lock order.
        let mut product_rows: BTreeMap<ProductId, MutexGuard<'_, Row<FinancialProduct>>> =
            BTreeMap::new();
        for (id, read) in &product_reads {
            let row = read.cell.lock();
            if row.version != read.version {
                return Err(Stale);
            }
            product_rows.insert(*id, row);
        }

        let mut transaction_rows: BTreeMap<TransactionId, MutexGuard<'_, Row<Transaction>>> =
            BTreeMap::new();
        for (id, read) in &transaction_reads {
            let row = read.cell.lock();
            if row.version != read.version {
                return Err(Stale);
            }
            transaction_rows.insert(*id, row);
        }

        for (id, product) in product_writes {
            if let Some(row) = product_rows.get_mut(&id) {
                row.value = Some(product);
                row.version += 1;
            }
        }

        let mut deleted = Vec::new();
        for (id, record) in transaction_writes {
            if let Some(row) = transaction_rows.get_mut(&id) {
                if record.is_none() {
                    deleted.push(id);
                }
                row.value = record;
                row.version += 1;
            }
        }

        for (id, record) in inserts {
            store
                .transactions
                .insert(id, Arc::new(Mutex::new(Row::new(record))));
        }

        // Ids are never reused, so a removed entry cannot shadow a newer row.
        drop(transaction_rows);
        drop(product_rows);
        for id in deleted {
            store.transactions.remove(&id);
        }

        Ok(())
    }
}

impl UnitOfWork for MemoryUnit<'_> {
    fn product(&mut self, id: ProductId) -> Result<FinancialProduct, LedgerError> {
        self.read_product(id).ok_or(LedgerError::ProductNotFound(id))
    }

    fn shared_limit_owner(&mut self, card: &FinancialProduct) -> Option<FinancialProduct> {
        let institution = card.institution?;
        let is_owner = |candidate: &FinancialProduct| {
            candidate.id != card.id
                && candidate.kind == ProductKind::CreditCard
                && candidate.owner == card.owner
                && candidate.institution == Some(institution)
                && !candidate.shared_limit
                && candidate.has_limits()
        };

        let mut cells = self.store.product_cells();
        cells.sort_by_key(|(id, _)| *id);
        for (id, cell) in cells {
            let qualifies = self.peek_product(id, &cell).is_some_and(|candidate| is_owner(&candidate));
            if !qualifies {
                continue;
            }
            // Record the chosen owner so a concurrent change to it forces a retry.
            if let Some(owner) = self.read_product(id).filter(|owner| is_owner(owner)) {
                return Some(owner);
            }
        }
        None
    }

    fn put_product(&mut self, product: FinancialProduct) {
        // Writes must be covered by a read so commit locks and validates the row.
        let _ = self.read_product(product.id);
        self.product_writes.insert(product.id, product);
    }

    fn transaction(&mut self, id: TransactionId) -> Result<Transaction, LedgerError> {
        self.read_transaction(id)
            .ok_or(LedgerError::TransactionNotFound(id))
    }

    fn installment_group(&mut self, group: InstallmentGroupId) -> Vec<Transaction> {
        let mut ids: Vec<TransactionId> = self
            .store
            .transaction_cells()
            .into_iter()
            .filter(|(_, cell)| {
                cell.lock()
                    .value
                    .as_ref()
                    .is_some_and(|record| record.installment_group == Some(group))
            })
            .map(|(id, _)| id)
            .collect();
        ids.extend(
            self.inserts
                .values()
                .filter(|record| record.installment_group == Some(group))
                .map(|record| record.id),
        );

        let mut members: Vec<Transaction> = ids
            .into_iter()
            .filter_map(|id| self.read_transaction(id))
            .filter(|record| record.installment_group == Some(group))
            .collect();
        members.sort_by_key(|record| (record.installment.map(|position| position.number), record.id));
        members
    }

    fn insert_transaction(&mut self, record: NewTransaction) -> TransactionId {
        let id = TransactionId(self.store.next_transaction_id.fetch_add(1, Ordering::Relaxed));
        self.inserts.insert(id, record.into_transaction(id));
        id
    }

    fn put_transaction(&mut self, record: Transaction) {
        if let Some(inserted) = self.inserts.get_mut(&record.id) {
            *inserted = record;
            return;
        }
        let _ = self.read_transaction(record.id);
        self.transaction_writes.insert(record.id, Some(record));
    }

    fn remove_transaction(&mut self, id: TransactionId) {
        if self.inserts.remove(&id).is_some() {
            return;
        }
        let _ = self.read_transaction(id);
        self.transaction_writes.insert(id, None);
    }

    fn category_exists(&mut self, id: CategoryId) -> bool {
        self.store.categories.contains(&id)
    }
}
