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

//! Core identifier types for products, transactions and their collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Caller identity. Ownership checks compare this against
    /// [`FinancialProduct::owner`](crate::FinancialProduct::owner).
    UserId
);

numeric_id!(
    /// Unique identifier for a financial product (cash, account, card, loan).
    ProductId
);

numeric_id!(
    /// Unique identifier for a transaction record.
    ///
    /// Assigned by the store when a record is inserted. Ids are never reused,
    /// even after the record is deleted.
    TransactionId
);

numeric_id!(
    /// Institution (bank, card issuer) a product belongs to.
    InstitutionId
);

numeric_id!(
    /// Spending category, owned by the external category store.
    CategoryId
);

numeric_id!(
    /// Monthly statement a record was reconciled into.
    StatementId
);

/// Identifier shared by every record of one installment purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct InstallmentGroupId(pub Uuid);

impl InstallmentGroupId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InstallmentGroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstallmentGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
