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

//! # Finance Ledger
//!
//! Ledger engine for a personal-finance tracker. It creates, edits, deletes
//! and transfers transactions while keeping every financial product's balance
//! and credit-limit fields consistent.
//!
//! ## Core Components
//!
//! - [`Engine`]: Transaction processor and transfer coordinator
//! - [`FinancialProduct`]: Cash, accounts, debit and credit cards, loans
//! - [`installments`]: Splits a purchase into dated installments
//! - [`credit_limit`]: Chooses and checks the limit pool a card charge draws on
//! - [`LedgerStore`]: Unit-of-work seam, with the in-memory [`MemoryStore`]
//! - [`LedgerError`]: Error taxonomy shared by every operation
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use finance_ledger::{
//!     CreateTransaction, Engine, FinancialProduct, ProductId, ProductKind, UserId,
//! };
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! let card = FinancialProduct::new(ProductId(1), UserId(7), ProductKind::CreditCard, "ARS")
//!     .with_limits(Some(dec!(1000)), Some(dec!(5000)));
//! engine.store().insert_product(card).unwrap();
//!
//! let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
//! let purchase = CreateTransaction::expense(ProductId(1), dec!(330), date, "Fridge")
//!     .with_installments(3, None);
//! let ids = engine.create_transaction(UserId(7), &purchase).unwrap();
//! assert_eq!(ids.len(), 3);
//!
//! let card = engine.get_product(UserId(7), ProductId(1)).unwrap();
//! assert_eq!(card.balance, dec!(-330));
//! assert_eq!(card.limit_installments, Some(dec!(4670)));
//! ```
//!
//! ## Thread Safety
//!
//! Every operation runs as one unit of work. The in-memory store serializes
//! conflicting units per product with optimistic row versions, so operations
//! on disjoint products proceed in parallel.

mod base;
pub mod config;
pub mod credit_limit;
mod engine;
pub mod error;
pub mod installments;
mod memory_store;
mod postings;
mod processor;
pub mod product;
pub mod store;
pub mod transaction;
mod transfer;

pub use base::{CategoryId, InstallmentGroupId, InstitutionId, ProductId, StatementId, TransactionId, UserId};
pub use config::{ConfigError, EngineConfig};
pub use credit_limit::{ChargeKind, LimitPool};
pub use engine::Engine;
pub use error::{ErrorKind, LedgerError, Outcome};
pub use memory_store::MemoryStore;
pub use product::{CardProvider, FinancialProduct, ProductKind};
pub use store::{LedgerStore, UnitOfWork};
pub use transaction::{
    CreateTransaction, CreateTransfer, EntryKind, InstallmentPosition, Transaction, TransactionKind,
    UpdateTransaction,
};
