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

//! Financial products.
//!
//! Sign convention: asset-like products (cash, savings, checking) hold a
//! positive balance; liability-like products (credit cards, loans) store debt
//! as a negative balance. A debit card never holds a balance of its own, every
//! effect lands on its linked account.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use finance_ledger::{FinancialProduct, ProductId, ProductKind, UserId};
//!
//! let card = FinancialProduct::new(ProductId(1), UserId(1), ProductKind::CreditCard, "ARS")
//!     .with_limits(Some(dec!(1000)), Some(dec!(5000)));
//! assert!(card.has_limits());
//! assert_eq!(card.balance, dec!(0));
//! ```

use crate::LedgerError;
use crate::base::{InstitutionId, ProductId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductKind {
    Cash,
    SavingsAccount,
    CheckingAccount,
    DebitCard,
    CreditCard,
    Loan,
}

impl ProductKind {
    /// Whether a debit card may delegate to a product of this kind.
    pub fn is_bank_account(self) -> bool {
        matches!(self, Self::SavingsAccount | Self::CheckingAccount)
    }

    pub fn is_liability(self) -> bool {
        matches!(self, Self::CreditCard | Self::Loan)
    }
}

impl fmt::Display for ProductKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Cash => "cash",
            Self::SavingsAccount => "savings account",
            Self::CheckingAccount => "checking account",
            Self::DebitCard => "debit card",
            Self::CreditCard => "credit card",
            Self::Loan => "loan",
        };
        f.write_str(name)
    }
}

/// Card network. Only some networks finance a single payment without interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardProvider {
    Visa,
    Mastercard,
    AmericanExpress,
    Naranja,
    Other,
}

impl CardProvider {
    /// Whether the no-interest financing flag ("plan Z") is accepted.
    pub fn supports_no_interest(self) -> bool {
        matches!(self, Self::Naranja)
    }
}

/// Which limit field of a product a charge draws on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitField {
    SinglePayment,
    Installments,
    Legacy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialProduct {
    pub id: ProductId,
    pub owner: UserId,
    pub institution: Option<InstitutionId>,
    pub name: String,
    pub kind: ProductKind,
    pub currency: String,
    pub balance: Decimal,
    pub limit_single_payment: Option<Decimal>,
    pub limit_installments: Option<Decimal>,
    /// Pre-split limit, used for either pool when the specific one is unset.
    pub limit: Option<Decimal>,
    /// The limit pool lives on a sibling card of the same institution.
    pub shared_limit: bool,
    /// Single-payment and installment charges draw from one pool.
    pub unified_limit: bool,
    /// Debit card only: the account whose balance it moves.
    pub linked_product: Option<ProductId>,
    pub provider: Option<CardProvider>,
}

impl FinancialProduct {
    pub fn new(id: ProductId, owner: UserId, kind: ProductKind, currency: impl Into<String>) -> Self {
        Self {
            id,
            owner,
            institution: None,
            name: format!("{kind} {id}"),
            kind,
            currency: currency.into(),
            balance: Decimal::ZERO,
            limit_single_payment: None,
            limit_installments: None,
            limit: None,
            shared_limit: false,
            unified_limit: false,
            linked_product: None,
            provider: None,
        }
    }

    pub fn with_balance(mut self, balance: Decimal) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_institution(mut self, institution: InstitutionId) -> Self {
        self.institution = Some(institution);
        self
    }

    pub fn with_limits(mut self, single_payment: Option<Decimal>, installments: Option<Decimal>) -> Self {
        self.limit_single_payment = single_payment;
        self.limit_installments = installments;
        self
    }

    pub fn with_legacy_limit(mut self, limit: Decimal) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_shared_limit(mut self) -> Self {
        self.shared_limit = true;
        self
    }

    pub fn with_unified_limit(mut self) -> Self {
        self.unified_limit = true;
        self
    }

    pub fn with_linked_product(mut self, linked: ProductId) -> Self {
        self.linked_product = Some(linked);
        self
    }

    pub fn with_provider(mut self, provider: CardProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn is_credit_card(&self) -> bool {
        self.kind == ProductKind::CreditCard
    }

    /// A card without any limit field is treated as unlimited.
    pub fn has_limits(&self) -> bool {
        self.limit_single_payment.is_some() || self.limit_installments.is_some() || self.limit.is_some()
    }

    pub fn limit_value(&self, field: LimitField) -> Option<Decimal> {
        match field {
            LimitField::SinglePayment => self.limit_single_payment,
            LimitField::Installments => self.limit_installments,
            LimitField::Legacy => self.limit,
        }
    }

    /// Moves a configured limit field by `delta`. Unset fields stay unset.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Validation`] when the result leaves the decimal range.
    pub fn adjust_limit(&mut self, field: LimitField, delta: Decimal) -> Result<(), LedgerError> {
        let slot = match field {
            LimitField::SinglePayment => &mut self.limit_single_payment,
            LimitField::Installments => &mut self.limit_installments,
            LimitField::Legacy => &mut self.limit,
        };
        if let Some(value) = slot.as_mut() {
            *value = value.checked_add(delta).ok_or_else(LedgerError::out_of_range)?;
        }
        Ok(())
    }

    pub fn accepts_no_interest(&self) -> bool {
        self.is_credit_card() && self.provider.is_some_and(CardProvider::supports_no_interest)
    }

    /// Checks the structural invariants a stored product must satisfy.
    pub fn check_invariants(&self) -> Result<(), LedgerError> {
        match self.kind {
            ProductKind::DebitCard if !self.balance.is_zero() => Err(LedgerError::invalid_operation(
                format!("debit card {} must keep a zero balance, found {}", self.id, self.balance),
            )),
            ProductKind::DebitCard => Ok(()),
            _ if self.linked_product.is_some() => Err(LedgerError::invalid_operation(format!(
                "only debit cards can link to another product, {} is a {}",
                self.id, self.kind
            ))),
            ProductKind::CreditCard => Ok(()),
            _ if self.shared_limit || self.unified_limit => Err(LedgerError::invalid_operation(
                format!("limit sharing only applies to credit cards, {} is a {}", self.id, self.kind),
            )),
            _ => Ok(()),
        }
    }
}
