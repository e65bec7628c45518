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

//! Transaction records and the requests that produce them.
//!
//! An expense debits `from_product`, an income credits `to_product`, a transfer
//! sets both. Records are only ever written by the [`Engine`](crate::Engine).

use crate::LedgerError;
use crate::base::{CategoryId, InstallmentGroupId, ProductId, StatementId, TransactionId};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Expense,
    Income,
    Transfer,
}

/// Position of a record inside its installment group, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPosition {
    pub number: u32,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    /// Credited amount of a cross-currency transfer.
    pub destination_amount: Option<Decimal>,
    pub date: NaiveDate,
    pub description: String,
    pub from_product: Option<ProductId>,
    pub to_product: Option<ProductId>,
    pub category: Option<CategoryId>,
    pub installment: Option<InstallmentPosition>,
    pub installment_group: Option<InstallmentGroupId>,
    /// Single payment financed without interest.
    pub no_interest: bool,
    pub statement: Option<StatementId>,
}

impl Transaction {
    pub fn is_installment(&self) -> bool {
        self.installment.is_some()
    }

    /// The product that owns this record: the debited side, or the credited
    /// side of an income.
    pub fn source_product(&self) -> Option<ProductId> {
        match self.kind {
            TransactionKind::Expense | TransactionKind::Transfer => self.from_product,
            TransactionKind::Income => self.to_product,
        }
    }

    pub fn credited_amount(&self) -> Decimal {
        self.destination_amount.unwrap_or(self.amount)
    }

    pub fn touches(&self, product: ProductId) -> bool {
        self.from_product == Some(product) || self.to_product == Some(product)
    }
}

/// A record about to be inserted; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub destination_amount: Option<Decimal>,
    pub date: NaiveDate,
    pub description: String,
    pub from_product: Option<ProductId>,
    pub to_product: Option<ProductId>,
    pub category: Option<CategoryId>,
    pub installment: Option<InstallmentPosition>,
    pub installment_group: Option<InstallmentGroupId>,
    pub no_interest: bool,
}

impl NewTransaction {
    pub fn into_transaction(self, id: TransactionId) -> Transaction {
        Transaction {
            id,
            kind: self.kind,
            amount: self.amount,
            destination_amount: self.destination_amount,
            date: self.date,
            description: self.description,
            from_product: self.from_product,
            to_product: self.to_product,
            category: self.category,
            installment: self.installment,
            installment_group: self.installment_group,
            no_interest: self.no_interest,
            statement: None,
        }
    }
}

/// Whether a [`CreateTransaction`] spends from or pays into its product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Expense,
    Income,
}

impl From<EntryKind> for TransactionKind {
    fn from(kind: EntryKind) -> Self {
        match kind {
            EntryKind::Expense => TransactionKind::Expense,
            EntryKind::Income => TransactionKind::Income,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransaction {
    pub kind: EntryKind,
    pub product: ProductId,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub description: String,
    pub category: Option<CategoryId>,
    pub installments: u32,
    /// Explicit per-installment value; any excess over `amount / installments`
    /// is financing cost.
    pub installment_amount: Option<Decimal>,
    pub no_interest: bool,
}

impl CreateTransaction {
    pub fn expense(product: ProductId, amount: Decimal, date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Expense,
            product,
            amount,
            date,
            description: description.into(),
            category: None,
            installments: 1,
            installment_amount: None,
            no_interest: false,
        }
    }

    pub fn income(product: ProductId, amount: Decimal, date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Income,
            ..Self::expense(product, amount, date, description)
        }
    }

    pub fn with_installments(mut self, installments: u32, installment_amount: Option<Decimal>) -> Self {
        self.installments = installments;
        self.installment_amount = installment_amount;
        self
    }

    pub fn with_category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_no_interest(mut self) -> Self {
        self.no_interest = true;
        self
    }

    /// Structural checks that need no stored state.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if self.installment_amount.is_some_and(|value| value <= Decimal::ZERO) {
            return Err(LedgerError::InvalidAmount);
        }
        if self.kind == EntryKind::Income && (self.installments > 1 || self.installment_amount.is_some()) {
            return Err(LedgerError::validation("income cannot be split into installments"));
        }
        if self.no_interest && self.installments > 1 {
            return Err(LedgerError::validation(
                "no-interest financing only applies to single payments",
            ));
        }
        if self.no_interest && self.kind == EntryKind::Income {
            return Err(LedgerError::validation("income cannot be financed"));
        }
        Ok(())
    }
}

/// Replacement values for an existing record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTransaction {
    pub description: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub category: Option<CategoryId>,
    pub no_interest: bool,
}

impl UpdateTransaction {
    /// Patch that keeps every field of `transaction` as it is.
    pub fn from_current(transaction: &Transaction) -> Self {
        Self {
            description: transaction.description.clone(),
            amount: transaction.amount,
            date: transaction.date,
            category: transaction.category,
            no_interest: transaction.no_interest,
        }
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_category(mut self, category: Option<CategoryId>) -> Self {
        self.category = category;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTransfer {
    pub from: ProductId,
    pub to: ProductId,
    pub amount: Decimal,
    /// Required when the two products hold different currencies.
    pub destination_amount: Option<Decimal>,
    pub description: Option<String>,
    pub date: NaiveDate,
}

impl CreateTransfer {
    pub fn new(from: ProductId, to: ProductId, amount: Decimal, date: NaiveDate) -> Self {
        Self {
            from,
            to,
            amount,
            destination_amount: None,
            description: None,
            date,
        }
    }

    pub fn with_destination_amount(mut self, destination_amount: Decimal) -> Self {
        self.destination_amount = Some(destination_amount);
        self
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if self.destination_amount.is_some_and(|value| value <= Decimal::ZERO) {
            return Err(LedgerError::InvalidAmount);
        }
        if self.from == self.to {
            return Err(LedgerError::invalid_operation(
                "transfer source and destination are the same product",
            ));
        }
        Ok(())
    }
}
