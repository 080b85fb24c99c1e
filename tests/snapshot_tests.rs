// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use tallybook::clock::Clock;
use tallybook::error::CoreError;
use tallybook::ledger::{self, NewPosting};
use tallybook::snapshot;

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn setup() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    tallybook::db::init_schema(&mut conn).unwrap();
    conn.execute(
        "INSERT INTO settings(key,value) VALUES('base_currency','USD')",
        [],
    )
    .unwrap();
    for (name, kind, ccy) in [
        ("checking", "asset", "USD"),
        ("eur-savings", "asset", "EUR"),
        ("visa", "liability", "USD"),
        ("salary", "income", "USD"),
        ("eur-salary", "income", "EUR"),
        ("groceries", "expense", "USD"),
    ] {
        conn.execute(
            "INSERT INTO accounts(user_id, name, kind, currency) VALUES (1, ?1, ?2, ?3)",
            params![name, kind, ccy],
        )
        .unwrap();
    }
    conn.execute(
        "INSERT INTO fx_rates(base,quote,rate) VALUES ('USD','EUR',0.90)",
        [],
    )
    .unwrap();
    conn
}

fn account_id(conn: &Connection, name: &str) -> i64 {
    conn.query_row("SELECT id FROM accounts WHERE name=?1", params![name], |r| r.get(0))
        .unwrap()
}

fn leg(account: i64, minor: i64, ccy: &str, is_debit: bool) -> NewPosting {
    NewPosting {
        account_id: account,
        amount_minor: minor,
        currency: ccy.into(),
        is_debit,
    }
}

/// checking +1000.00 USD, eur-savings +90.00 EUR (= 100 USD), visa 200.00 USD
fn seed_ledger(conn: &mut Connection) {
    let checking = account_id(conn, "checking");
    let salary = account_id(conn, "salary");
    let eur_savings = account_id(conn, "eur-savings");
    let eur_salary = account_id(conn, "eur-salary");
    let visa = account_id(conn, "visa");
    let groceries = account_id(conn, "groceries");

    ledger::post_transaction(
        conn,
        1,
        date("2025-03-10"),
        "Paycheck",
        None,
        Some("income"),
        &[leg(checking, 100_000, "USD", true), leg(salary, 100_000, "USD", false)],
    )
    .unwrap();
    ledger::post_transaction(
        conn,
        1,
        date("2025-03-12"),
        "EUR paycheck",
        None,
        Some("income"),
        &[leg(eur_savings, 9_000, "EUR", true), leg(eur_salary, 9_000, "EUR", false)],
    )
    .unwrap();
    ledger::post_transaction(
        conn,
        1,
        date("2025-03-20"),
        "Groceries on card",
        None,
        Some("expense"),
        &[leg(groceries, 20_000, "USD", true), leg(visa, 20_000, "USD", false)],
    )
    .unwrap();
}

#[test]
fn snapshot_totals_convert_and_net_by_nature() {
    let mut conn = setup();
    seed_ledger(&mut conn);

    let clock = Clock::Fixed(date("2025-04-01"));
    let snap = snapshot::ensure_snapshot(&mut conn, 1, "2025-03", &clock).unwrap();

    // 1000 USD + (90 EUR -> 100 USD) assets, 200 USD liabilities
    assert_eq!(snap.assets_minor, 110_000);
    assert_eq!(snap.liabilities_minor, 20_000);
    assert_eq!(snap.net_worth_minor, 90_000);
    assert_eq!(snap.base_currency, "USD");
    assert_eq!(snap.month_end, "2025-03");

    // one child row per active asset/liability account, flows excluded
    let children = snapshot::account_rows(&conn, snap.id).unwrap();
    assert_eq!(children.len(), 3);
    let eur_row = children
        .iter()
        .find(|c| c.currency == "EUR")
        .expect("EUR child row");
    assert_eq!(eur_row.balance_minor, 9_000);
    assert_eq!(eur_row.base_minor, 10_000);
}

#[test]
fn ensure_is_idempotent_until_recompute() {
    let mut conn = setup();
    seed_ledger(&mut conn);
    let clock = Clock::Fixed(date("2025-04-01"));

    let first = snapshot::ensure_snapshot(&mut conn, 1, "2025-03", &clock).unwrap();
    let second = snapshot::ensure_snapshot(&mut conn, 1, "2025-03", &clock).unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.net_worth_minor, second.net_worth_minor);
    assert_eq!(first.created_at, second.created_at);

    // new ledger activity does not leak into the stored snapshot via ensure
    let checking = account_id(&conn, "checking");
    let salary = account_id(&conn, "salary");
    ledger::post_transaction(
        &mut conn,
        1,
        date("2025-03-25"),
        "Bonus",
        None,
        Some("income"),
        &[leg(checking, 50_000, "USD", true), leg(salary, 50_000, "USD", false)],
    )
    .unwrap();
    let third = snapshot::ensure_snapshot(&mut conn, 1, "2025-03", &clock).unwrap();
    assert_eq!(third.net_worth_minor, first.net_worth_minor);

    // recompute is the one sanctioned path to replace it
    let fresh = snapshot::recompute(&mut conn, 1, "2025-03", &clock).unwrap();
    assert_eq!(fresh.net_worth_minor, first.net_worth_minor + 50_000);
    let reread = snapshot::ensure_snapshot(&mut conn, 1, "2025-03", &clock).unwrap();
    assert_eq!(reread.net_worth_minor, fresh.net_worth_minor);
}

#[test]
fn balances_are_taken_as_of_month_end() {
    let mut conn = setup();
    seed_ledger(&mut conn);
    let checking = account_id(&conn, "checking");
    let salary = account_id(&conn, "salary");
    // April activity must not appear in the March snapshot
    ledger::post_transaction(
        &mut conn,
        1,
        date("2025-04-01"),
        "April paycheck",
        None,
        Some("income"),
        &[leg(checking, 70_000, "USD", true), leg(salary, 70_000, "USD", false)],
    )
    .unwrap();

    let clock = Clock::Fixed(date("2025-05-01"));
    let march = snapshot::ensure_snapshot(&mut conn, 1, "2025-03", &clock).unwrap();
    assert_eq!(march.net_worth_minor, 90_000);
    let april = snapshot::ensure_snapshot(&mut conn, 1, "2025-04", &clock).unwrap();
    assert_eq!(april.net_worth_minor, 160_000);
}

#[test]
fn missing_rate_fails_without_partial_rows() {
    let mut conn = setup();
    seed_ledger(&mut conn);
    conn.execute("DELETE FROM fx_rates", []).unwrap();

    let clock = Clock::Fixed(date("2025-04-01"));
    let err = snapshot::ensure_snapshot(&mut conn, 1, "2025-03", &clock);
    match err {
        Err(CoreError::ConversionUnavailable { currency }) => assert_eq!(currency, "EUR"),
        other => panic!("expected ConversionUnavailable, got {:?}", other),
    }

    let parents: i64 = conn
        .query_row("SELECT COUNT(*) FROM net_worth_snapshots", [], |r| r.get(0))
        .unwrap();
    let children: i64 = conn
        .query_row("SELECT COUNT(*) FROM account_snapshots", [], |r| r.get(0))
        .unwrap();
    assert_eq!(parents, 0);
    assert_eq!(children, 0);
}

#[test]
fn failed_recompute_leaves_existing_snapshot_intact() {
    let mut conn = setup();
    seed_ledger(&mut conn);
    let clock = Clock::Fixed(date("2025-04-01"));
    let snap = snapshot::ensure_snapshot(&mut conn, 1, "2025-03", &clock).unwrap();

    conn.execute("DELETE FROM fx_rates", []).unwrap();
    let err = snapshot::recompute(&mut conn, 1, "2025-03", &clock);
    assert!(matches!(err, Err(CoreError::ConversionUnavailable { .. })));

    let kept = snapshot::load_snapshot(&conn, 1, "2025-03").unwrap().unwrap();
    assert_eq!(kept.id, snap.id);
    assert_eq!(kept.net_worth_minor, snap.net_worth_minor);
    assert_eq!(snapshot::account_rows(&conn, kept.id).unwrap().len(), 3);
}

#[test]
fn snapshot_key_is_unique_at_the_storage_layer() {
    let mut conn = setup();
    seed_ledger(&mut conn);
    let clock = Clock::Fixed(date("2025-04-01"));
    snapshot::ensure_snapshot(&mut conn, 1, "2025-03", &clock).unwrap();

    // direct duplicate insert must violate the (user_id, month_end) key
    let dup = conn.execute(
        "INSERT INTO net_worth_snapshots
            (user_id, month_end, assets_minor, liabilities_minor, net_worth_minor,
             base_currency, created_at)
         VALUES (1, '2025-03', 0, 0, 0, 'USD', '2025-04-01T00:00:00+00:00')",
        [],
    );
    assert!(dup.is_err());

    // other users are unaffected by the key
    conn.execute(
        "INSERT INTO net_worth_snapshots
            (user_id, month_end, assets_minor, liabilities_minor, net_worth_minor,
             base_currency, created_at)
         VALUES (2, '2025-03', 0, 0, 0, 'USD', '2025-04-01T00:00:00+00:00')",
        [],
    )
    .unwrap();
}

#[test]
fn invalid_month_key_is_rejected() {
    let mut conn = setup();
    let clock = Clock::Fixed(date("2025-04-01"));
    assert!(matches!(
        snapshot::ensure_snapshot(&mut conn, 1, "2025-13", &clock),
        Err(CoreError::InvalidMonth(_))
    ));
    assert!(matches!(
        snapshot::ensure_snapshot(&mut conn, 1, "garbage", &clock),
        Err(CoreError::InvalidMonth(_))
    ));
}

#[test]
fn export_writes_child_rows_as_csv() {
    let mut conn = setup();
    seed_ledger(&mut conn);
    let clock = Clock::Fixed(date("2025-04-01"));
    snapshot::ensure_snapshot(&mut conn, 1, "2025-03", &clock).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("march.csv");
    let out_str = out.to_str().unwrap().to_string();

    let cli = tallybook::cli::build_cli();
    let matches = cli.get_matches_from([
        "tallybook", "snapshot", "export", "2025-03", "--out", &out_str,
    ]);
    if let Some(("snapshot", sub)) = matches.subcommand() {
        tallybook::commands::snapshot::handle(&mut conn, sub).unwrap();
    } else {
        panic!("no snapshot subcommand");
    }

    let body = std::fs::read_to_string(&out).unwrap();
    assert!(body.starts_with("month,account,currency,balance"));
    assert!(body.contains("checking"));
    assert!(body.contains("eur-savings"));
    assert!(body.contains("90.00")); // EUR balance in major units
}
