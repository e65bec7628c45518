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

use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use finance_ledger::{
    CardProvider, CategoryId, CreateTransaction, CreateTransfer, Engine, EngineConfig, FinancialProduct,
    InstitutionId, LedgerError, ProductId, ProductKind, UserId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Finance Ledger - Apply expense, income and transfer CSVs to a product book
///
/// Loads products, applies every operation row and writes the resulting
/// balances and limits to stdout.
#[derive(Parser, Debug)]
#[command(name = "finance-ledger")]
#[command(about = "Applies ledger operation CSVs to a set of financial products", long_about = None)]
struct Args {
    /// Path to CSV file with the products to load
    ///
    /// Expected format: id,owner,kind,currency,balance,institution,
    /// limit_single_payment,limit_installments,limit,shared_limit,
    /// unified_limit,linked_product,provider
    #[arg(long, value_name = "FILE", env = "LEDGER_PRODUCTS")]
    products: PathBuf,

    /// Path to CSV file with the known category ids (column: id)
    #[arg(long, value_name = "FILE", env = "LEDGER_CATEGORIES")]
    categories: Option<PathBuf>,

    /// User on whose behalf the operations run
    #[arg(long, value_name = "ID", env = "LEDGER_USER", default_value_t = 1)]
    user: u32,

    /// Path to CSV file with operations
    ///
    /// Expected format: type,product,to,amount,destination_amount,date,
    /// description,category,installments,installment_amount,no_interest
    /// Example: cargo run -- --products products.csv operations.csv > balances.csv
    #[arg(value_name = "FILE")]
    operations: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("finance_ledger=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error reading configuration: {}", e);
            process::exit(1);
        }
    };
    let engine = Engine::with_config(config);

    if let Err(e) = open(&args.products).and_then(|file| load_products(&engine, file)) {
        eprintln!("Error loading products '{}': {}", args.products.display(), e);
        process::exit(1);
    }
    if let Some(path) = &args.categories
        && let Err(e) = open(path).and_then(|file| load_categories(&engine, file))
    {
        eprintln!("Error loading categories '{}': {}", path.display(), e);
        process::exit(1);
    }

    let applied = match open(&args.operations).and_then(|file| process_operations(&engine, UserId(args.user), file)) {
        Ok(applied) => applied,
        Err(e) => {
            eprintln!("Error processing operations '{}': {}", args.operations.display(), e);
            process::exit(1);
        }
    };
    tracing::info!(applied, "operations applied");

    if let Err(e) = write_products(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

fn open(path: &Path) -> Result<BufReader<File>, csv::Error> {
    Ok(BufReader::new(File::open(path)?))
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader)
}

/// Raw product row.
#[derive(Debug, Deserialize)]
struct CsvProduct {
    id: u32,
    owner: u32,
    kind: ProductKind,
    currency: String,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    balance: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    institution: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    limit_single_payment: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    limit_installments: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    limit: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    shared_limit: Option<bool>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    unified_limit: Option<bool>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    linked_product: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    provider: Option<CardProvider>,
}

impl CsvProduct {
    fn into_product(self) -> FinancialProduct {
        let mut product = FinancialProduct::new(ProductId(self.id), UserId(self.owner), self.kind, self.currency)
            .with_balance(self.balance.unwrap_or_default())
            .with_limits(self.limit_single_payment, self.limit_installments);
        product.institution = self.institution.map(InstitutionId);
        product.limit = self.limit;
        product.shared_limit = self.shared_limit.unwrap_or(false);
        product.unified_limit = self.unified_limit.unwrap_or(false);
        product.linked_product = self.linked_product.map(ProductId);
        product.provider = self.provider;
        product
    }
}

/// Loads product rows into the engine's store, skipping malformed or
/// inconsistent ones.
pub fn load_products<R: Read>(engine: &Engine, reader: R) -> Result<usize, csv::Error> {
    let mut loaded = 0;
    for result in csv_reader(reader).deserialize::<CsvProduct>() {
        match result {
            Ok(row) => {
                let id = row.id;
                match engine.store().insert_product(row.into_product()) {
                    Ok(()) => loaded += 1,
                    Err(e) => tracing::warn!(product = id, error = %e, "skipping product"),
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping malformed product row"),
        }
    }
    Ok(loaded)
}

#[derive(Debug, Deserialize)]
struct CsvCategory {
    id: u32,
}

pub fn load_categories<R: Read>(engine: &Engine, reader: R) -> Result<usize, csv::Error> {
    let mut loaded = 0;
    for result in csv_reader(reader).deserialize::<CsvCategory>() {
        match result {
            Ok(row) => {
                engine.store().insert_category(CategoryId(row.id));
                loaded += 1;
            }
            Err(e) => tracing::warn!(error = %e, "skipping malformed category row"),
        }
    }
    Ok(loaded)
}

/// Raw operation row.
///
/// Fields: `type, product, to, amount, destination_amount, date, description,
/// category, installments, installment_amount, no_interest`
#[derive(Debug, Deserialize)]
struct CsvOperation {
    #[serde(rename = "type")]
    op_type: String,
    product: u32,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    to: Option<u32>,
    amount: Decimal,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    destination_amount: Option<Decimal>,
    date: NaiveDate,
    #[serde(default)]
    description: String,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    category: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    installments: Option<u32>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    installment_amount: Option<Decimal>,
    #[serde(deserialize_with = "csv::invalid_option", default)]
    no_interest: Option<bool>,
}

#[derive(Debug)]
enum Operation {
    Entry(CreateTransaction),
    Transfer(CreateTransfer),
}

impl CsvOperation {
    /// Returns `None` for unknown operation types or a transfer without a
    /// destination.
    fn into_operation(self) -> Option<Operation> {
        let product = ProductId(self.product);
        let entry = match self.op_type.to_lowercase().as_str() {
            "expense" => CreateTransaction::expense(product, self.amount, self.date, self.description),
            "income" => CreateTransaction::income(product, self.amount, self.date, self.description),
            "transfer" => {
                let mut transfer = CreateTransfer::new(product, ProductId(self.to?), self.amount, self.date);
                transfer.destination_amount = self.destination_amount;
                transfer.description = Some(self.description).filter(|text| !text.is_empty());
                return Some(Operation::Transfer(transfer));
            }
            _ => return None,
        };

        let mut entry = entry.with_installments(self.installments.unwrap_or(1), self.installment_amount);
        entry.category = self.category.map(CategoryId);
        entry.no_interest = self.no_interest.unwrap_or(false);
        Some(Operation::Entry(entry))
    }
}

/// Applies operation rows in file order.
///
/// Malformed rows and rejected operations are logged and skipped; the count
/// of applied operations is returned.
///
/// # Example
///
/// ```csv
/// type,product,to,amount,destination_amount,date,description,category,installments,installment_amount,no_interest
/// income,1,,1500,,2024-01-01,Salary,,,,
/// expense,2,,330,,2024-01-15,Fridge,,3,,
/// transfer,1,2,200,,2024-02-10,Card payment,,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_operations<R: Read>(engine: &Engine, caller: UserId, reader: R) -> Result<usize, csv::Error> {
    let mut applied = 0;
    for (row, result) in csv_reader(reader).deserialize::<CsvOperation>().enumerate() {
        let operation = match result {
            Ok(record) => record.into_operation(),
            Err(e) => {
                tracing::warn!(row, error = %e, "skipping malformed operation row");
                continue;
            }
        };
        let Some(operation) = operation else {
            tracing::warn!(row, "skipping unknown operation");
            continue;
        };

        let outcome: Result<(), LedgerError> = match &operation {
            Operation::Entry(request) => engine.create_transaction(caller, request).map(|_| ()),
            Operation::Transfer(request) => engine.create_transfer(caller, request).map(|_| ()),
        };
        match outcome {
            Ok(()) => applied += 1,
            Err(e) => tracing::warn!(row, kind = ?e.kind(), error = %e, "operation rejected"),
        }
    }
    Ok(applied)
}

/// Output row: balances and remaining limits rounded to the money scale.
#[derive(Debug, Serialize)]
struct CsvBalance {
    id: ProductId,
    kind: ProductKind,
    currency: String,
    balance: Decimal,
    limit_single_payment: Option<Decimal>,
    limit_installments: Option<Decimal>,
    limit: Option<Decimal>,
}

/// Write product states to a CSV writer, ordered by product id.
///
/// # CSV Format
///
/// Columns: `id, kind, currency, balance, limit_single_payment, limit_installments, limit`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_products<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let scale = engine.config().money_scale;
    let round = |value: Decimal| value.round_dp(scale);
    let mut wtr = Writer::from_writer(writer);

    for product in engine.store().products() {
        wtr.serialize(CsvBalance {
            id: product.id,
            kind: product.kind,
            currency: product.currency,
            balance: round(product.balance),
            limit_single_payment: product.limit_single_payment.map(round),
            limit_installments: product.limit_installments.map(round),
            limit: product.limit.map(round),
        })?;
    }

    wtr.flush()?;
    Ok(())
}
