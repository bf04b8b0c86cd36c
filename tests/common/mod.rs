//! Shared fixtures for integration tests

#![allow(dead_code)]

use fraudlab::data::{Dataset, DatasetLoader};
use polars::prelude::*;
use std::path::Path;

const KINDS: [&str; 5] = ["PAYMENT", "TRANSFER", "CASH_OUT", "DEBIT", "CASH_IN"];

/// Synthetic transaction log shaped like the mobile-money fraud data.
///
/// Every tenth row is fraud: the origin account is drained by a TRANSFER or
/// CASH_OUT and the destination balance does not move.
pub fn transactions(n: usize) -> DataFrame {
    let mut step = Vec::with_capacity(n);
    let mut kind = Vec::with_capacity(n);
    let mut amount = Vec::with_capacity(n);
    let mut name_orig = Vec::with_capacity(n);
    let mut old_org = Vec::with_capacity(n);
    let mut new_org = Vec::with_capacity(n);
    let mut name_dest = Vec::with_capacity(n);
    let mut old_dest = Vec::with_capacity(n);
    let mut new_dest = Vec::with_capacity(n);
    let mut is_fraud = Vec::with_capacity(n);
    let mut flagged = Vec::with_capacity(n);

    for i in 0..n {
        let fraud = i % 10 == 3;
        let balance = ((i * 37) % 500) as f64 * 100.0 + 50.0;
        let dest = ((i * 11) % 300) as f64 * 50.0;
        let paid = if fraud {
            balance
        } else {
            (((i * 13) % 90) as f64 * 10.0 + 5.0).min(balance)
        };

        step.push((i % 24 + 1) as i64);
        kind.push(if fraud {
            if i % 20 == 3 { "TRANSFER" } else { "CASH_OUT" }
        } else {
            KINDS[(i * 7) % 5]
        });
        amount.push(paid);
        name_orig.push(format!("C{}", 1000 + i));
        old_org.push(balance);
        new_org.push(balance - paid);
        name_dest.push(format!("M{}", 5000 + i));
        old_dest.push(dest);
        new_dest.push(if fraud { dest } else { dest + paid });
        is_fraud.push(fraud as i64);
        flagged.push(0i64);
    }

    df!(
        "step" => step,
        "type" => kind,
        "amount" => amount,
        "nameOrig" => name_orig,
        "oldbalanceOrg" => old_org,
        "newbalanceOrig" => new_org,
        "nameDest" => name_dest,
        "oldbalanceDest" => old_dest,
        "newbalanceDest" => new_dest,
        "isFraud" => is_fraud,
        "isFlaggedFraud" => flagged
    )
    .unwrap()
}

pub fn transactions_dataset(n: usize) -> Dataset {
    DatasetLoader::fraud().from_dataframe(&transactions(n), true).unwrap()
}

pub fn write_transactions(path: &Path, n: usize) {
    let mut df = transactions(n);
    let mut file = std::fs::File::create(path).unwrap();
    CsvWriter::new(&mut file).include_header(true).finish(&mut df).unwrap();
}
