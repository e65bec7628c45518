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

//! Installment planning.
//!
//! Expands one purchase into dated installments. A single payment is dated on
//! the purchase date; installment `n` of a group falls `n` calendar months
//! after it.
//!
//! Month arithmetic clamps to the end of the month: adding one month to
//! January 31st lands on the last day of February. Every date is computed
//! from the purchase date, so a clamp never shifts later installments.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use finance_ledger::installments;
//! use rust_decimal_macros::dec;
//!
//! let purchase = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
//! let plan = installments::plan(purchase, 3, dec!(100), None, 2).unwrap();
//!
//! assert_eq!(plan.total_debt, dec!(100));
//! assert_eq!(plan.installments[0].amount, dec!(33.33));
//! assert_eq!(plan.installments[2].amount, dec!(33.34));
//! assert_eq!(plan.installments[0].date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
//! ```

use crate::LedgerError;
use chrono::{Months, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};

/// Upper bound on installments per purchase.
pub const MAX_INSTALLMENTS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedInstallment {
    /// 1-based position in the group.
    pub number: u32,
    pub date: NaiveDate,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallmentPlan {
    pub installments: Vec<PlannedInstallment>,
    /// Sum of every installment, financing cost included.
    pub total_debt: Decimal,
}

impl InstallmentPlan {
    pub fn count(&self) -> u32 {
        self.installments.len() as u32
    }

    /// Whether the plan produces an installment group rather than a single payment.
    pub fn is_grouped(&self) -> bool {
        self.installments.len() > 1
    }
}

/// Splits `amount` into `count` installments.
///
/// With an explicit `installment_amount` every installment carries that value
/// and the total debt is `installment_amount * count`. Otherwise the amount is
/// divided, truncated to `scale` decimal places, and the last installment
/// absorbs the remainder so the group sums to `amount` exactly.
///
/// # Errors
///
/// - [`LedgerError::Validation`] - `count` is zero or above [`MAX_INSTALLMENTS`],
///   the amount is too small to give every installment a non-zero share, a
///   date falls outside the calendar range, or the total debt overflows.
/// - [`LedgerError::InvalidAmount`] - `amount` or `installment_amount` is not positive.
pub fn plan(
    base_date: NaiveDate,
    count: u32,
    amount: Decimal,
    installment_amount: Option<Decimal>,
    scale: u32,
) -> Result<InstallmentPlan, LedgerError> {
    if count == 0 {
        return Err(LedgerError::validation("installments must be at least 1"));
    }
    if count > MAX_INSTALLMENTS {
        return Err(LedgerError::validation(format!(
            "at most {MAX_INSTALLMENTS} installments are allowed, got {count}"
        )));
    }
    if amount <= Decimal::ZERO || installment_amount.is_some_and(|value| value <= Decimal::ZERO) {
        return Err(LedgerError::InvalidAmount);
    }

    let amounts = match installment_amount {
        Some(value) => vec![value; count as usize],
        None => split_evenly(amount, count, scale)?,
    };

    let mut installments = Vec::with_capacity(count as usize);
    for (index, amount) in amounts.into_iter().enumerate() {
        let number = index as u32 + 1;
        let date = if count == 1 {
            base_date
        } else {
            add_months(base_date, number)?
        };
        installments.push(PlannedInstallment { number, date, amount });
    }

    let total_debt = installments
        .iter()
        .try_fold(Decimal::ZERO, |total, installment| total.checked_add(installment.amount))
        .ok_or_else(LedgerError::out_of_range)?;
    Ok(InstallmentPlan {
        installments,
        total_debt,
    })
}

fn split_evenly(amount: Decimal, count: u32, scale: u32) -> Result<Vec<Decimal>, LedgerError> {
    if count == 1 {
        return Ok(vec![amount]);
    }
    let share = (amount / Decimal::from(count)).round_dp_with_strategy(scale, RoundingStrategy::ToZero);
    if share.is_zero() {
        return Err(LedgerError::validation(format!(
            "{amount} is too small to split into {count} installments"
        )));
    }
    let last = share
        .checked_mul(Decimal::from(count - 1))
        .and_then(|split| amount.checked_sub(split))
        .ok_or_else(LedgerError::out_of_range)?;
    let mut amounts = vec![share; count as usize - 1];
    amounts.push(last);
    Ok(amounts)
}

/// Adds whole calendar months, clamping to the last day of a shorter month.
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate, LedgerError> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| LedgerError::validation(format!("{date} plus {months} months is out of range")))
}
