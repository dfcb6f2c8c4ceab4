//! Test utilities for database operations.
//!
//! Helpers for inspecting what a mock connection was asked to run.

#![allow(clippy::panic)]

use std::sync::Arc;

use sea_orm::{DatabaseConnection, Transaction};

/// Consume a mock connection and return the statements it ran, grouped by
/// transaction.
///
/// A statement run outside a transaction is logged as a transaction of its
/// own. Every other handle to the connection must be dropped first.
#[must_use]
pub fn logged_transactions(db: Arc<DatabaseConnection>) -> Vec<Vec<String>> {
    let Ok(db) = Arc::try_unwrap(db) else {
        panic!("mock connection is still shared");
    };

    db.into_transaction_log().iter().map(statements).collect()
}

/// The statements of one logged transaction, SQL and bound values together,
/// with quoting stripped so `INSERT INTO "post_like"` reads
/// `INSERT INTO post_like`.
#[must_use]
pub fn statements(txn: &Transaction) -> Vec<String> {
    format!("{txn:?}")
        .replace(['\\', '"'], "")
        .split("Statement {")
        .skip(1)
        .map(|s| s.trim().to_string())
        .collect()
}

/// The transactions that ran inside `BEGIN ... COMMIT`, in order.
#[must_use]
pub fn committed(log: &[Vec<String>]) -> Vec<&[String]> {
    log.iter()
        .filter(|stmts| {
            stmts.first().is_some_and(|s| s.contains("BEGIN"))
                && stmts.last().is_some_and(|s| s.contains("COMMIT"))
        })
        .map(Vec::as_slice)
        .collect()
}

/// Assert that `txn` is `BEGIN`, then one statement per entry of `expected`,
/// then `COMMIT`. Each entry lists fragments its statement must contain.
pub fn assert_transaction(txn: &[String], expected: &[&[&str]]) {
    assert_eq!(
        txn.len(),
        expected.len() + 2,
        "unexpected statements: {txn:#?}"
    );
    assert!(txn[0].contains("BEGIN"), "missing BEGIN: {txn:#?}");
    assert!(
        txn[txn.len() - 1].contains("COMMIT"),
        "missing COMMIT: {txn:#?}"
    );

    for (stmt, fragments) in txn[1..txn.len() - 1].iter().zip(expected) {
        for fragment in *fragments {
            assert!(
                stmt.contains(fragment),
                "`{fragment}` not in statement: {stmt}"
            );
        }
    }
}
