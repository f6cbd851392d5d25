#![allow(dead_code)]

use corebank::domain::account::Currency;
use rand::Rng;
use rust_decimal::Decimal;
use std::io::Error;
use std::path::Path;

const FIRST_NAMES: [&str; 10] = [
    "John", "Emma", "Noah", "Olivia", "Liam", "Ava", "James", "Sophia", "William", "Isabella",
];

const LAST_NAMES: [&str; 10] = [
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Martinez",
    "Hernandez",
];

pub fn random_owner() -> String {
    let mut rng = rand::thread_rng();
    let first = FIRST_NAMES[rng.gen_range(0..FIRST_NAMES.len())];
    let last = LAST_NAMES[rng.gen_range(0..LAST_NAMES.len())];
    format!("{first} {last}")
}

/// Random balance between 0 and 1000 with two decimal places.
pub fn random_money() -> Decimal {
    let mut rng = rand::thread_rng();
    let cents: i64 = rng.gen_range(0..=100_099);
    Decimal::new(cents, 2)
}

pub fn random_currency() -> Currency {
    let mut rng = rand::thread_rng();
    Currency::ALL[rng.gen_range(0..Currency::ALL.len())]
}

/// Writes an operations CSV: one `open` row per account, then the transfers.
/// Account IDs are assigned 1..=N in row order.
pub fn generate_ops_csv(
    path: &Path,
    accounts: &[(&str, &str, &str)],
    transfers: &[(i64, i64, &str)],
) -> Result<(), Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["type", "owner", "currency", "from", "to", "amount"])?;
    for (owner, currency, balance) in accounts {
        wtr.write_record(["open", owner, currency, "", "", balance])?;
    }
    for (from, to, amount) in transfers {
        wtr.write_record([
            "transfer",
            "",
            "",
            &from.to_string(),
            &to.to_string(),
            amount,
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
