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

//! Engine public API integration tests.

use chrono::NaiveDate;
use finance_ledger::{
    CardProvider, CategoryId, ChargeKind, CreateTransaction, CreateTransfer, Engine, ErrorKind,
    FinancialProduct, InstitutionId, LedgerError, LedgerStore, LimitPool, Outcome, ProductId, ProductKind,
    StatementId, TransactionKind, UpdateTransaction, UserId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const USER: UserId = UserId(1);
const OTHER_USER: UserId = UserId(2);

const CASH: ProductId = ProductId(1);
const CHECKING: ProductId = ProductId(2);
const DEBIT: ProductId = ProductId(3);
const CARD: ProductId = ProductId(4);
const SAVINGS_USD: ProductId = ProductId(5);
const NARANJA: ProductId = ProductId(6);
const GROCERIES: CategoryId = CategoryId(1);
const HOME: CategoryId = CategoryId(2);

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn today() -> NaiveDate {
    ymd(2024, 1, 15)
}

/// One user's book: cash, a checking account with a debit card, a Visa
/// credit card with split limits, a USD savings account and a Naranja card.
fn engine() -> Engine {
    let engine = Engine::new();
    let store = engine.store();
    store
        .insert_product(FinancialProduct::new(CASH, USER, ProductKind::Cash, "ARS").with_balance(dec!(300)))
        .unwrap();
    store
        .insert_product(
            FinancialProduct::new(CHECKING, USER, ProductKind::CheckingAccount, "ARS").with_balance(dec!(500)),
        )
        .unwrap();
    store
        .insert_product(FinancialProduct::new(DEBIT, USER, ProductKind::DebitCard, "ARS").with_linked_product(CHECKING))
        .unwrap();
    store
        .insert_product(
            FinancialProduct::new(CARD, USER, ProductKind::CreditCard, "ARS")
                .with_institution(InstitutionId(10))
                .with_limits(Some(dec!(1000)), Some(dec!(5000)))
                .with_provider(CardProvider::Visa),
        )
        .unwrap();
    store
        .insert_product(
            FinancialProduct::new(SAVINGS_USD, USER, ProductKind::SavingsAccount, "USD").with_balance(dec!(20)),
        )
        .unwrap();
    store
        .insert_product(
            FinancialProduct::new(NARANJA, USER, ProductKind::CreditCard, "ARS")
                .with_limits(Some(dec!(2000)), None)
                .with_provider(CardProvider::Naranja),
        )
        .unwrap();
    store.insert_category(GROCERIES);
    store.insert_category(HOME);
    engine
}

fn product(engine: &Engine, id: ProductId) -> FinancialProduct {
    engine.get_product(USER, id).unwrap()
}

fn expense(product: ProductId, amount: Decimal) -> CreateTransaction {
    CreateTransaction::expense(product, amount, today(), "Purchase")
}

// === Credit card limits ===

#[test]
fn single_payment_within_limit_succeeds() {
    let engine = engine();

    let ids = engine.create_transaction(USER, &expense(CARD, dec!(1000))).unwrap();

    assert_eq!(ids.len(), 1);
    let card = product(&engine, CARD);
    assert_eq!(card.balance, dec!(-1000));
    assert_eq!(card.limit_single_payment, Some(dec!(0)));
    assert_eq!(card.limit_installments, Some(dec!(5000)));
}

#[test]
fn single_payment_over_limit_fails_without_side_effects() {
    let engine = engine();

    let result = engine.create_transaction(USER, &expense(CARD, dec!(1000.01)));

    assert_eq!(
        result,
        Err(LedgerError::InsufficientLimit {
            available: dec!(1000),
            required: dec!(1000.01),
            pool: LimitPool::SinglePayment,
        })
    );
    let card = product(&engine, CARD);
    assert_eq!(card.balance, dec!(0));
    assert_eq!(card.limit_single_payment, Some(dec!(1000)));
    assert!(engine.list_by_product(USER, CARD).unwrap().is_empty());
}

#[test]
fn exhausted_pool_rejects_next_charge() {
    let engine = engine();
    engine.create_transaction(USER, &expense(CARD, dec!(600))).unwrap();

    let err = engine.create_transaction(USER, &expense(CARD, dec!(400.01))).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InsufficientLimit);
    assert_eq!(err.to_string(), "insufficient single-payment limit: available 400, required 400.01");
}

// === Debit cards ===

#[test]
fn debit_card_spends_linked_account() {
    let engine = engine();

    engine.create_transaction(USER, &expense(DEBIT, dec!(500))).unwrap();

    assert_eq!(product(&engine, CHECKING).balance, dec!(0));
    assert_eq!(product(&engine, DEBIT).balance, dec!(0));
}

#[test]
fn debit_card_rejects_uncovered_expense() {
    let engine = engine();

    let result = engine.create_transaction(USER, &expense(DEBIT, dec!(500.01)));

    assert_eq!(
        result,
        Err(LedgerError::InsufficientFunds {
            available: dec!(500),
            required: dec!(500.01),
        })
    );
    assert_eq!(product(&engine, CHECKING).balance, dec!(500));
}

#[test]
fn debit_card_without_linked_account_is_invalid() {
    let engine = engine();
    let orphan = ProductId(20);
    engine
        .store()
        .insert_product(FinancialProduct::new(orphan, USER, ProductKind::DebitCard, "ARS"))
        .unwrap();

    let err = engine.create_transaction(USER, &expense(orphan, dec!(1))).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn debit_card_income_lands_on_linked_account() {
    let engine = engine();

    engine
        .create_transaction(USER, &CreateTransaction::income(DEBIT, dec!(50), today(), "Refund"))
        .unwrap();

    assert_eq!(product(&engine, CHECKING).balance, dec!(550));
    assert_eq!(product(&engine, DEBIT).balance, dec!(0));
}

// === Plain accounts ===

#[test]
fn cash_expense_may_overdraw() {
    let engine = engine();

    engine.create_transaction(USER, &expense(CASH, dec!(350))).unwrap();

    assert_eq!(product(&engine, CASH).balance, dec!(-50));
}

#[test]
fn income_increases_balance() {
    let engine = engine();

    let ids = engine
        .create_transaction(USER, &CreateTransaction::income(CASH, dec!(1200), today(), "Salary"))
        .unwrap();

    assert_eq!(product(&engine, CASH).balance, dec!(1500));
    let record = engine.get_transaction(USER, ids[0]).unwrap();
    assert_eq!(record.kind, TransactionKind::Income);
    assert_eq!(record.to_product, Some(CASH));
    assert_eq!(record.from_product, None);
}

// === Installments ===

#[test]
fn three_installments_of_110() {
    let engine = engine();
    let request = CreateTransaction::expense(CARD, dec!(330), today(), "Fridge").with_installments(3, Some(dec!(110)));

    let ids = engine.create_transaction(USER, &request).unwrap();

    assert_eq!(ids.len(), 3);
    let records: Vec<_> = ids.iter().map(|id| engine.get_transaction(USER, *id).unwrap()).collect();
    let group = records[0].installment_group.unwrap();
    for (index, record) in records.iter().enumerate() {
        let number = index as u32 + 1;
        assert_eq!(record.amount, dec!(110));
        assert_eq!(record.date, ymd(2024, 1 + number, 15));
        assert_eq!(record.installment.map(|position| (position.number, position.total)), Some((number, 3)));
        assert_eq!(record.installment_group, Some(group));
        assert_eq!(record.description, format!("Fridge ({number}/3)"));
    }

    let card = product(&engine, CARD);
    assert_eq!(card.balance, dec!(-330));
    assert_eq!(card.limit_installments, Some(dec!(4670)));
    assert_eq!(card.limit_single_payment, Some(dec!(1000)));
}

#[test]
fn uneven_split_sums_to_total() {
    let engine = engine();
    let request = expense(CARD, dec!(100)).with_installments(3, None);

    let ids = engine.create_transaction(USER, &request).unwrap();

    let amounts: Vec<_> = ids
        .iter()
        .map(|id| engine.get_transaction(USER, *id).unwrap().amount)
        .collect();
    assert_eq!(amounts, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
    assert_eq!(product(&engine, CARD).balance, dec!(-100));
}

#[test]
fn installments_over_pool_fail_atomically() {
    let engine = engine();
    let request = expense(CARD, dec!(6000)).with_installments(12, None);

    let err = engine.create_transaction(USER, &request).unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientLimit { pool: LimitPool::Installments, .. }));
    assert!(engine.list_by_product(USER, CARD).unwrap().is_empty());
    assert_eq!(product(&engine, CARD).limit_installments, Some(dec!(5000)));
}

#[test]
fn installments_require_credit_card() {
    let engine = engine();

    let err = engine
        .create_transaction(USER, &expense(CASH, dec!(90)).with_installments(3, None))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(product(&engine, CASH).balance, dec!(300));
}

#[test]
fn zero_installments_is_validation_error() {
    let engine = engine();

    let err = engine
        .create_transaction(USER, &expense(CARD, dec!(90)).with_installments(0, None))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationError);
}

// === Transfers ===

#[test]
fn transfer_moves_balance() {
    let engine = engine();

    let id = engine
        .create_transfer(USER, &CreateTransfer::new(CASH, CHECKING, dec!(100), today()))
        .unwrap();

    assert_eq!(product(&engine, CASH).balance, dec!(200));
    assert_eq!(product(&engine, CHECKING).balance, dec!(600));
    let record = engine.get_transaction(USER, id).unwrap();
    assert_eq!(record.kind, TransactionKind::Transfer);
    assert_eq!((record.from_product, record.to_product), (Some(CASH), Some(CHECKING)));
    assert_eq!(record.description, "Transfer");
}

#[test]
fn cross_currency_transfer_requires_destination_amount() {
    let engine = engine();
    let request = CreateTransfer::new(CHECKING, SAVINGS_USD, dec!(100), today());

    let err = engine.create_transfer(USER, &request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(product(&engine, CHECKING).balance, dec!(500));

    engine
        .create_transfer(USER, &request.with_destination_amount(dec!(0.11)))
        .unwrap();
    assert_eq!(product(&engine, CHECKING).balance, dec!(400));
    assert_eq!(product(&engine, SAVINGS_USD).balance, dec!(20.11));
}

#[test]
fn transfer_to_same_product_is_invalid() {
    let engine = engine();

    let err = engine
        .create_transfer(USER, &CreateTransfer::new(CASH, CASH, dec!(1), today()))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn transfer_between_debit_card_and_its_account_is_invalid() {
    let engine = engine();

    let err = engine
        .create_transfer(USER, &CreateTransfer::new(DEBIT, CHECKING, dec!(1), today()))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn debit_card_transfer_source_must_be_covered() {
    let engine = engine();

    let err = engine
        .create_transfer(USER, &CreateTransfer::new(DEBIT, CASH, dec!(501), today()))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert_eq!(product(&engine, CASH).balance, dec!(300));
}

#[test]
fn paying_credit_card_reduces_debt_and_frees_single_payment_limit() {
    let engine = engine();
    engine.create_transaction(USER, &expense(CARD, dec!(800))).unwrap();
    engine
        .create_transaction(USER, &expense(CARD, dec!(300)).with_installments(3, None))
        .unwrap();

    engine
        .create_transfer(USER, &CreateTransfer::new(CHECKING, CARD, dec!(500), today()))
        .unwrap();

    let card = product(&engine, CARD);
    assert_eq!(card.balance, dec!(-600));
    assert_eq!(card.limit_single_payment, Some(dec!(700)));
    assert_eq!(card.limit_installments, Some(dec!(4700)));
    assert_eq!(product(&engine, CHECKING).balance, dec!(0));
}

#[test]
fn transfer_requires_owning_both_sides() {
    let engine = engine();
    let foreign = ProductId(30);
    engine
        .store()
        .insert_product(FinancialProduct::new(foreign, OTHER_USER, ProductKind::Cash, "ARS"))
        .unwrap();

    let err = engine
        .create_transfer(USER, &CreateTransfer::new(CASH, foreign, dec!(10), today()))
        .unwrap_err();

    assert_eq!(err, LedgerError::Unauthorized(foreign));
    assert_eq!(product(&engine, CASH).balance, dec!(300));
}

// === Delete ===

#[test]
fn delete_restores_every_kind() {
    let engine = engine();
    let before: Vec<_> = engine.store().products();

    let mut ids = Vec::new();
    ids.extend(engine.create_transaction(USER, &expense(CARD, dec!(250))).unwrap());
    ids.extend(
        engine
            .create_transaction(USER, &expense(CARD, dec!(999.99)).with_installments(7, None))
            .unwrap(),
    );
    ids.extend(engine.create_transaction(USER, &expense(DEBIT, dec!(120))).unwrap());
    ids.extend(
        engine
            .create_transaction(USER, &CreateTransaction::income(CASH, dec!(40), today(), "Gift"))
            .unwrap(),
    );
    ids.push(
        engine
            .create_transfer(USER, &CreateTransfer::new(CHECKING, CARD, dec!(100), today()))
            .unwrap(),
    );
    ids.push(
        engine
            .create_transfer(
                USER,
                &CreateTransfer::new(CASH, SAVINGS_USD, dec!(200), today()).with_destination_amount(dec!(0.2)),
            )
            .unwrap(),
    );

    for id in ids.iter().rev() {
        engine.delete_transaction(USER, *id).unwrap();
    }

    assert_eq!(engine.store().products(), before);
    assert!(engine.list_by_product(USER, CARD).unwrap().is_empty());
}

#[test]
fn delete_one_installment_leaves_siblings() {
    let engine = engine();
    let ids = engine
        .create_transaction(USER, &expense(CARD, dec!(300)).with_installments(3, None))
        .unwrap();

    let removed = engine.delete_transaction(USER, ids[1]).unwrap();

    assert_eq!(removed.amount, dec!(100));
    let card = product(&engine, CARD);
    assert_eq!(card.balance, dec!(-200));
    assert_eq!(card.limit_installments, Some(dec!(4800)));
    let remaining = engine.list_by_product(USER, CARD).unwrap();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.iter().all(|record| record.amount == dec!(100)));
    assert_eq!(
        engine.get_transaction(USER, ids[1]),
        Err(LedgerError::TransactionNotFound(ids[1]))
    );
}

#[test]
fn delete_unknown_transaction_is_not_found() {
    let engine = engine();

    let err = engine.delete_transaction(USER, finance_ledger::TransactionId(99)).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// === Update ===

#[test]
fn update_amount_moves_balance_by_delta() {
    let engine = engine();
    let id = engine.create_transaction(USER, &expense(CARD, dec!(400))).unwrap()[0];
    let current = engine.get_transaction(USER, id).unwrap();

    let updated = engine
        .update_transaction(USER, id, &UpdateTransaction::from_current(&current).with_amount(dec!(650)))
        .unwrap();

    assert_eq!(updated.amount, dec!(650));
    let card = product(&engine, CARD);
    assert_eq!(card.balance, dec!(-650));
    assert_eq!(card.limit_single_payment, Some(dec!(350)));

    engine
        .update_transaction(USER, id, &UpdateTransaction::from_current(&updated).with_amount(dec!(100)))
        .unwrap();
    let card = product(&engine, CARD);
    assert_eq!(card.balance, dec!(-100));
    assert_eq!(card.limit_single_payment, Some(dec!(900)));
}

#[test]
fn update_amount_beyond_limit_fails() {
    let engine = engine();
    let id = engine.create_transaction(USER, &expense(CARD, dec!(400))).unwrap()[0];
    let current = engine.get_transaction(USER, id).unwrap();

    let err = engine
        .update_transaction(USER, id, &UpdateTransaction::from_current(&current).with_amount(dec!(1000.01)))
        .unwrap_err();

    assert_eq!(
        err,
        LedgerError::InsufficientLimit {
            available: dec!(600),
            required: dec!(600.01),
            pool: LimitPool::SinglePayment,
        }
    );
    assert_eq!(engine.get_transaction(USER, id).unwrap().amount, dec!(400));
}

#[test]
fn update_debit_card_expense_checks_funds() {
    let engine = engine();
    let id = engine.create_transaction(USER, &expense(DEBIT, dec!(300))).unwrap()[0];
    let current = engine.get_transaction(USER, id).unwrap();

    let err = engine
        .update_transaction(USER, id, &UpdateTransaction::from_current(&current).with_amount(dec!(501)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    engine
        .update_transaction(USER, id, &UpdateTransaction::from_current(&current).with_amount(dec!(500)))
        .unwrap();
    assert_eq!(product(&engine, CHECKING).balance, dec!(0));
}

#[test]
fn update_rejects_non_positive_amount() {
    let engine = engine();
    let id = engine.create_transaction(USER, &expense(CASH, dec!(10))).unwrap()[0];
    let current = engine.get_transaction(USER, id).unwrap();

    let result = engine.update_transaction(USER, id, &UpdateTransaction::from_current(&current).with_amount(dec!(0)));

    assert_eq!(result, Err(LedgerError::InvalidAmount));
}

#[test]
fn category_change_cascades_to_group() {
    let engine = engine();
    let ids = engine
        .create_transaction(USER, &expense(CARD, dec!(100)).with_installments(3, None).with_category(GROCERIES))
        .unwrap();
    let middle = engine.get_transaction(USER, ids[1]).unwrap();

    let mut patch = UpdateTransaction::from_current(&middle).with_category(Some(HOME));
    patch.description = "Fridge (2/3)".to_string();
    engine.update_transaction(USER, ids[1], &patch).unwrap();

    for id in &ids {
        assert_eq!(engine.get_transaction(USER, *id).unwrap().category, Some(HOME));
    }
    let first = engine.get_transaction(USER, ids[0]).unwrap();
    assert_eq!(first.amount, dec!(33.33));
    assert_eq!(first.description, "Purchase (1/3)");
}

#[test]
fn installment_amount_edit_stays_local() {
    let engine = engine();
    let ids = engine
        .create_transaction(USER, &expense(CARD, dec!(300)).with_installments(3, None))
        .unwrap();
    let last = engine.get_transaction(USER, ids[2]).unwrap();

    engine
        .update_transaction(USER, ids[2], &UpdateTransaction::from_current(&last).with_amount(dec!(130)))
        .unwrap();

    let amounts: Vec<_> = ids
        .iter()
        .map(|id| engine.get_transaction(USER, *id).unwrap().amount)
        .collect();
    assert_eq!(amounts, vec![dec!(100), dec!(100), dec!(130)]);
    let card = product(&engine, CARD);
    assert_eq!(card.balance, dec!(-330));
    assert_eq!(card.limit_installments, Some(dec!(4670)));
}

#[test]
fn transfer_amount_cannot_be_edited() {
    let engine = engine();
    let id = engine
        .create_transfer(USER, &CreateTransfer::new(CASH, CHECKING, dec!(100), today()))
        .unwrap();
    let current = engine.get_transaction(USER, id).unwrap();

    let err = engine
        .update_transaction(USER, id, &UpdateTransaction::from_current(&current).with_amount(dec!(150)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    let mut patch = UpdateTransaction::from_current(&current);
    patch.description = "Rent share".to_string();
    let updated = engine.update_transaction(USER, id, &patch).unwrap();
    assert_eq!(updated.description, "Rent share");
    assert_eq!(product(&engine, CHECKING).balance, dec!(600));
}

// === Financing flag ===

#[test]
fn no_interest_flag_requires_supporting_provider() {
    let engine = engine();

    let err = engine
        .create_transaction(USER, &expense(CARD, dec!(100)).with_no_interest())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationError);

    let id = engine
        .create_transaction(USER, &expense(NARANJA, dec!(100)).with_no_interest())
        .unwrap()[0];
    assert!(engine.get_transaction(USER, id).unwrap().no_interest);
}

#[test]
fn no_interest_flag_can_be_set_on_update() {
    let engine = engine();
    let id = engine.create_transaction(USER, &expense(NARANJA, dec!(100))).unwrap()[0];
    let mut patch = UpdateTransaction::from_current(&engine.get_transaction(USER, id).unwrap());
    patch.no_interest = true;

    assert!(engine.update_transaction(USER, id, &patch).unwrap().no_interest);

    let visa = engine.create_transaction(USER, &expense(CARD, dec!(100))).unwrap()[0];
    let mut patch = UpdateTransaction::from_current(&engine.get_transaction(USER, visa).unwrap());
    patch.no_interest = true;
    assert_eq!(
        engine.update_transaction(USER, visa, &patch).unwrap_err().kind(),
        ErrorKind::ValidationError
    );
}

// === Ownership and references ===

#[test]
fn foreign_product_is_unauthorized() {
    let engine = engine();

    let result = engine.create_transaction(OTHER_USER, &expense(CASH, dec!(10)));

    assert_eq!(result, Err(LedgerError::Unauthorized(CASH)));
    assert_eq!(product(&engine, CASH).balance, dec!(300));
}

#[test]
fn foreign_caller_cannot_read_or_delete() {
    let engine = engine();
    let id = engine.create_transaction(USER, &expense(CASH, dec!(10))).unwrap()[0];

    assert_eq!(engine.get_transaction(OTHER_USER, id), Err(LedgerError::Unauthorized(CASH)));
    assert_eq!(engine.delete_transaction(OTHER_USER, id), Err(LedgerError::Unauthorized(CASH)));
    assert_eq!(product(&engine, CASH).balance, dec!(290));
}

#[test]
fn unknown_product_and_category_are_not_found() {
    let engine = engine();

    assert_eq!(
        engine.create_transaction(USER, &expense(ProductId(99), dec!(10))),
        Err(LedgerError::ProductNotFound(ProductId(99)))
    );
    assert_eq!(
        engine.create_transaction(USER, &expense(CASH, dec!(10)).with_category(CategoryId(99))),
        Err(LedgerError::CategoryNotFound(CategoryId(99)))
    );
}

#[test]
fn non_positive_amount_is_rejected() {
    let engine = engine();

    assert_eq!(
        engine.create_transaction(USER, &expense(CASH, dec!(0))),
        Err(LedgerError::InvalidAmount)
    );
    assert_eq!(
        engine.create_transfer(USER, &CreateTransfer::new(CASH, CHECKING, dec!(-5), today())),
        Err(LedgerError::InvalidAmount)
    );
}

#[test]
fn balance_overflow_is_rejected_without_side_effects() {
    let engine = engine();
    let overdrawn = ProductId(20);
    engine
        .store()
        .insert_product(FinancialProduct::new(overdrawn, USER, ProductKind::Cash, "ARS").with_balance(dec!(-1)))
        .unwrap();

    assert_eq!(
        engine.create_transaction(USER, &expense(overdrawn, Decimal::MAX)),
        Err(LedgerError::out_of_range())
    );
    assert_eq!(
        engine.create_transaction(USER, &CreateTransaction::income(CASH, Decimal::MAX, today(), "Jackpot")),
        Err(LedgerError::out_of_range())
    );

    assert_eq!(product(&engine, overdrawn).balance, dec!(-1));
    assert_eq!(product(&engine, CASH).balance, dec!(300));
    assert!(engine.list_by_product(USER, overdrawn).unwrap().is_empty());
}

#[test]
fn installment_total_overflow_is_rejected() {
    let engine = engine();
    let huge = Decimal::MAX / dec!(2) + dec!(1);

    let err = engine
        .create_transaction(USER, &expense(CARD, dec!(10)).with_installments(2, Some(huge)))
        .unwrap_err();

    assert_eq!(err, LedgerError::out_of_range());
    assert_eq!(err.kind(), ErrorKind::ValidationError);
    let card = product(&engine, CARD);
    assert_eq!(card.balance, dec!(0));
    assert_eq!(card.limit_installments, Some(dec!(5000)));
}

#[test]
fn transfer_edit_requires_owning_both_sides() {
    let engine = engine();
    let id = engine
        .create_transfer(USER, &CreateTransfer::new(CASH, CHECKING, dec!(100), today()))
        .unwrap();
    let current = engine.get_transaction(USER, id).unwrap();
    engine
        .store()
        .with_unit_of_work(|unit| {
            let mut checking = unit.product(CHECKING)?;
            checking.owner = OTHER_USER;
            unit.put_product(checking);
            Ok(())
        })
        .unwrap();

    let mut patch = UpdateTransaction::from_current(&current);
    patch.description = "Rent share".to_string();
    assert_eq!(
        engine.update_transaction(USER, id, &patch),
        Err(LedgerError::Unauthorized(CHECKING))
    );
    assert_eq!(
        engine.delete_transaction(USER, id),
        Err(LedgerError::Unauthorized(CHECKING))
    );
    assert_eq!(engine.get_transaction(USER, id).unwrap().description, current.description);
}

// === Queries and statements ===

#[test]
fn list_by_product_orders_by_date_then_id() {
    let engine = engine();
    let late = engine
        .create_transaction(USER, &CreateTransaction::expense(CASH, dec!(1), ymd(2024, 3, 1), "Late"))
        .unwrap()[0];
    let early = engine
        .create_transaction(USER, &CreateTransaction::expense(CASH, dec!(1), ymd(2024, 1, 1), "Early"))
        .unwrap()[0];
    let transfer = engine
        .create_transfer(USER, &CreateTransfer::new(CHECKING, CASH, dec!(5), ymd(2024, 2, 1)))
        .unwrap();

    let ids: Vec<_> = engine
        .list_by_product(USER, CASH)
        .unwrap()
        .into_iter()
        .map(|record| record.id)
        .collect();

    assert_eq!(ids, vec![early, transfer, late]);
}

#[test]
fn unlinked_expenses_and_statement_linking() {
    let engine = engine();
    let ids = engine
        .create_transaction(USER, &expense(CARD, dec!(300)).with_installments(3, None))
        .unwrap();
    engine
        .create_transaction(USER, &CreateTransaction::income(CARD, dec!(5), ymd(2024, 2, 20), "Cashback"))
        .unwrap();

    let february = engine
        .list_unlinked_expenses_in_range(USER, CARD, ymd(2024, 2, 1), ymd(2024, 2, 29))
        .unwrap();
    assert_eq!(february.iter().map(|record| record.id).collect::<Vec<_>>(), vec![ids[0]]);

    engine.link_statement(USER, &[ids[0]], StatementId(1)).unwrap();
    assert!(
        engine
            .list_unlinked_expenses_in_range(USER, CARD, ymd(2024, 2, 1), ymd(2024, 2, 29))
            .unwrap()
            .is_empty()
    );

    let err = engine.link_statement(USER, &[ids[1], ids[0]], StatementId(2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(engine.get_transaction(USER, ids[1]).unwrap().statement, None);

    assert_eq!(
        engine.list_unlinked_expenses_in_range(USER, CARD, ymd(2024, 3, 1), ymd(2024, 2, 1)).unwrap_err().kind(),
        ErrorKind::ValidationError
    );
}

#[test]
fn import_reports_each_row() {
    let engine = engine();
    let requests = vec![
        expense(CASH, dec!(10)),
        expense(DEBIT, dec!(10000)),
        expense(CARD, dec!(30)).with_installments(3, None),
        expense(ProductId(99), dec!(1)),
    ];

    let results = engine.import_transactions(USER, &requests);

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].as_ref().map(Vec::len), Ok(1));
    assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::InsufficientFunds);
    assert_eq!(results[2].as_ref().map(Vec::len), Ok(3));
    assert_eq!(results[3].as_ref().unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(product(&engine, CASH).balance, dec!(290));
    assert_eq!(product(&engine, CARD).balance, dec!(-30));
}

#[test]
fn available_credit_reports_remaining_pool() {
    let engine = engine();
    engine.create_transaction(USER, &expense(CARD, dec!(250))).unwrap();

    assert_eq!(
        engine.available_credit(USER, CARD, ChargeKind::SinglePayment),
        Ok(Some(dec!(750)))
    );
    assert_eq!(
        engine.available_credit(USER, CARD, ChargeKind::Installments),
        Ok(Some(dec!(5000)))
    );
    assert_eq!(
        engine.available_credit(USER, CASH, ChargeKind::SinglePayment).unwrap_err().kind(),
        ErrorKind::InvalidOperation
    );
}

#[test]
fn outcome_carries_kind_and_message() {
    let engine = engine();

    let outcome: Outcome<Vec<_>> = engine.create_transaction(USER, &expense(CARD, dec!(1000.01))).into();

    assert_eq!(
        outcome,
        Outcome::Error {
            error: ErrorKind::InsufficientLimit,
            message: "insufficient single-payment limit: available 1000, required 1000.01".to_string(),
        }
    );
}
