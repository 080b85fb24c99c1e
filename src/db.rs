// Copyright (c) 2025 Tallybook.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

static APP: Lazy<(&str, &str, &str)> = Lazy::new(|| ("dev.tallybook", "Tallybook", "tallybook"));

pub fn db_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("tallybook.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let mut conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&mut conn)?;
    Ok(conn)
}

/// Create the schema. The invariants the engine depends on are enforced
/// here, not only in application code: snapshot uniqueness per
/// (user_id, month_end), one reversal per transaction, positive posting
/// magnitudes, and FK integrity so accounts referenced by postings can
/// never be hard-deleted.
pub fn init_schema(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL DEFAULT 1,
        name TEXT NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('asset','liability','income','expense')),
        currency TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1 CHECK(active IN (0,1)),
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(user_id, name)
    );

    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL DEFAULT 1,
        date TEXT NOT NULL,
        description TEXT NOT NULL,
        memo TEXT,
        kind TEXT CHECK(kind IN ('income','expense','transfer','adjustment')),
        reverses_transaction_id INTEGER REFERENCES transactions(id),
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
    -- a transaction can be reversed at most once
    CREATE UNIQUE INDEX IF NOT EXISTS idx_transactions_reverses
        ON transactions(reverses_transaction_id)
        WHERE reverses_transaction_id IS NOT NULL;

    CREATE TABLE IF NOT EXISTS postings(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        transaction_id INTEGER NOT NULL REFERENCES transactions(id) ON DELETE CASCADE,
        account_id INTEGER NOT NULL REFERENCES accounts(id),
        amount_minor INTEGER NOT NULL CHECK(amount_minor > 0),
        currency TEXT NOT NULL,
        is_debit INTEGER NOT NULL CHECK(is_debit IN (0,1))
    );
    CREATE INDEX IF NOT EXISTS idx_postings_account ON postings(account_id);
    CREATE INDEX IF NOT EXISTS idx_postings_transaction ON postings(transaction_id);

    -- single-vintage FX cache relative to the current base currency;
    -- replaced wholesale on refresh (fetched_at lives in settings)
    CREATE TABLE IF NOT EXISTS fx_rates(
        base TEXT NOT NULL,
        quote TEXT NOT NULL,
        rate REAL NOT NULL,
        UNIQUE(base, quote)
    );

    CREATE TABLE IF NOT EXISTS recurring_templates(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL DEFAULT 1,
        description TEXT NOT NULL,
        amount_minor INTEGER NOT NULL CHECK(amount_minor > 0),
        currency TEXT NOT NULL,
        debit_account_id INTEGER NOT NULL REFERENCES accounts(id),
        credit_account_id INTEGER NOT NULL REFERENCES accounts(id),
        rule TEXT NOT NULL CHECK(rule IN ('weekly','biweekly','monthly','yearly')),
        anchor_date TEXT NOT NULL,
        last_materialized TEXT,
        active INTEGER NOT NULL DEFAULT 1 CHECK(active IN (0,1))
    );

    CREATE TABLE IF NOT EXISTS net_worth_snapshots(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        month_end TEXT NOT NULL, -- YYYY-MM
        assets_minor INTEGER NOT NULL,
        liabilities_minor INTEGER NOT NULL,
        net_worth_minor INTEGER NOT NULL,
        base_currency TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE(user_id, month_end)
    );

    CREATE TABLE IF NOT EXISTS account_snapshots(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        snapshot_id INTEGER NOT NULL REFERENCES net_worth_snapshots(id) ON DELETE CASCADE,
        account_id INTEGER NOT NULL REFERENCES accounts(id),
        balance_minor INTEGER NOT NULL,
        currency TEXT NOT NULL,
        base_minor INTEGER NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_account_snapshots_snapshot
        ON account_snapshots(snapshot_id);
    "#,
    )?;
    Ok(())
}
