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

//! Error types for ledger operations.
//!
//! Every failure is detected before a unit of work commits, so an error always
//! means nothing was written. [`LedgerError::kind`] collapses the variants into
//! the coarse [`ErrorKind`] taxonomy callers branch on, and [`Outcome`] is the
//! serialisable `{ok}` / `{error, message}` result shape.

use crate::base::{CategoryId, ProductId, TransactionId};
use crate::credit_limit::LimitPool;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ledger operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Referenced product does not exist
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    /// Referenced transaction does not exist
    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    /// Referenced category does not exist
    #[error("category {0} not found")]
    CategoryNotFound(CategoryId),

    /// Caller does not own the product
    #[error("caller does not own product {0}")]
    Unauthorized(ProductId),

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Malformed request (installment count, dates, flags)
    #[error("validation failed: {0}")]
    Validation(String),

    /// Account backing a debit card cannot cover the charge
    #[error("insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: Decimal, required: Decimal },

    /// Credit card pool exhausted
    #[error("insufficient {pool} limit: available {available}, required {required}")]
    InsufficientLimit {
        available: Decimal,
        required: Decimal,
        pool: LimitPool,
    },

    /// Operation is structurally impossible for the products involved
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Unit of work kept losing optimistic commits to concurrent writers
    #[error("unit of work conflicted {attempts} times, giving up")]
    Conflict { attempts: u32 },
}

/// Coarse error taxonomy exposed across the engine boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    ValidationError,
    InsufficientFunds,
    InsufficientLimit,
    InvalidOperation,
    Conflict,
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Money arithmetic overflowed the decimal range.
    pub fn out_of_range() -> Self {
        Self::validation("amount out of range")
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProductNotFound(_) | Self::TransactionNotFound(_) | Self::CategoryNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InvalidAmount | Self::Validation(_) => ErrorKind::ValidationError,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InsufficientLimit { .. } => ErrorKind::InsufficientLimit,
            Self::InvalidOperation(_) => ErrorKind::InvalidOperation,
            Self::Conflict { .. } => ErrorKind::Conflict,
        }
    }
}

/// Tagged result of one logical operation.
///
/// ```json
/// {"status": "ok", "value": [1, 2, 3]}
/// {"status": "error", "error": "insufficient_limit", "message": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome<T> {
    Ok { value: T },
    Error { error: ErrorKind, message: String },
}

impl<T> From<Result<T, LedgerError>> for Outcome<T> {
    fn from(result: Result<T, LedgerError>) -> Self {
        match result {
            Ok(value) => Outcome::Ok { value },
            Err(err) => Outcome::Error {
                error: err.kind(),
                message: err.to_string(),
            },
        }
    }
}
