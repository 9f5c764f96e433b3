//! SQLite access layer.
//!
//! RULE: report modules never open connections themselves — they receive
//! pooled connections and run their statements through `fetch_rows`, which
//! materializes rows as name → value maps so the reducer can stay generic
//! over report shapes.

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, ToSql};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::ReportResult;

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the reporting database at `path`.
    /// URI filenames are accepted, which is how tests share one in-memory
    /// database across pool connections (`file:x?mode=memory&cache=shared`).
    pub fn open(path: &str) -> ReportResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open a private in-memory database (single-connection tests).
    pub fn in_memory() -> ReportResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply the reporting schema.
    pub fn migrate(&self) -> ReportResult<()> {
        self.conn.execute_batch(include_str!("schema.sql"))?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // ── Provisioning helpers ───────────────────────────────────

    pub fn insert_agency(&self, branch_code: &str, name: &str) -> ReportResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO agencies (branch_code, name) VALUES (?1, ?2)",
            params![branch_code, name],
        )?;
        Ok(())
    }

    pub fn insert_client_activity(
        &self,
        branch_code: &str,
        period: &str,
        new_clients: i64,
        fees: f64,
    ) -> ReportResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO client_activity (branch_code, period, new_clients, fees)
             VALUES (?1, ?2, ?3, ?4)",
            params![branch_code, period, new_clients, fees],
        )?;
        Ok(())
    }

    pub fn insert_loan_production(
        &self,
        branch_code: &str,
        granted_on: &str,
        loan_count: i64,
        amount: f64,
    ) -> ReportResult<()> {
        self.conn.execute(
            "INSERT INTO loan_production (branch_code, granted_on, loan_count, amount)
             VALUES (?1, ?2, ?3, ?4)",
            params![branch_code, granted_on, loan_count, amount],
        )?;
        Ok(())
    }

    pub fn insert_loan_account(
        &self,
        account_no: &str,
        branch_code: &str,
        manager_code: Option<&str>,
        officer_name: Option<&str>,
    ) -> ReportResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO loan_book (account_no, branch_code, manager_code, officer_name)
             VALUES (?1, ?2, ?3, ?4)",
            params![account_no, branch_code, manager_code, officer_name],
        )?;
        Ok(())
    }

    pub fn insert_loan_position(
        &self,
        account_no: &str,
        as_of: &str,
        outstanding: f64,
        exigible: f64,
        scheduled_due: f64,
        deposit_state: f64,
    ) -> ReportResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO loan_position
               (account_no, as_of, outstanding, exigible, scheduled_due, deposit_state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![account_no, as_of, outstanding, exigible, scheduled_due, deposit_state],
        )?;
        Ok(())
    }

    pub fn insert_balance_snapshot(
        &self,
        branch_code: &str,
        account_type: &str,
        as_of: &str,
        balance: f64,
    ) -> ReportResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO balance_snapshot (branch_code, account_type, as_of, balance)
             VALUES (?1, ?2, ?3, ?4)",
            params![branch_code, account_type, as_of, balance],
        )?;
        Ok(())
    }

    pub fn insert_transfer_operation(
        &self,
        branch_code: &str,
        service: &str,
        executed_on: &str,
        volume: f64,
        commission: f64,
    ) -> ReportResult<()> {
        self.conn.execute(
            "INSERT INTO transfer_operations (branch_code, service, executed_on, volume, commission)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![branch_code, service, executed_on, volume, commission],
        )?;
        Ok(())
    }

    pub fn insert_card_sales(
        &self,
        branch_code: &str,
        period: &str,
        sold: i64,
        objective: i64,
    ) -> ReportResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO card_sales (branch_code, period, sold, objective)
             VALUES (?1, ?2, ?3, ?4)",
            params![branch_code, period, sold, objective],
        )?;
        Ok(())
    }

    /// Seed a small deterministic fixture set so the runner produces
    /// non-empty reports against a fresh database. Covers every
    /// classification path: all four territories, a point of service,
    /// the head office and one unmapped branch.
    pub fn seed_demo(&self) -> ReportResult<()> {
        let agencies: &[(&str, &str)] = &[
            ("001", "AGENCE DAKAR PLATEAU"),
            ("011", "AGENCE PIKINE"),
            ("021", "AGENCE THIES"),
            ("031", "AGENCE SAINT-LOUIS"),
            ("045", "C-E LIBERTE 6"),
            ("526", "AGENCE GRAND COMPTE"),
            ("099", "AGENCE FLEUVE GAMBIE"),
        ];
        for (code, name) in agencies {
            self.insert_agency(code, name)?;
        }

        // Two reporting periods: June 2025 and May 2025.
        let rows: &[(&str, i64, f64, i64, f64)] = &[
            // branch, new clients M, fees M, new clients M-1, fees M-1
            ("001", 42, 1_850_000.0, 35, 1_600_000.0),
            ("011", 28, 940_000.0, 31, 1_010_000.0),
            ("021", 17, 520_000.0, 12, 470_000.0),
            ("031", 9, 310_000.0, 11, 330_000.0),
            ("045", 6, 120_000.0, 4, 95_000.0),
            ("526", 3, 2_400_000.0, 2, 2_100_000.0),
            ("099", 5, 90_000.0, 7, 110_000.0),
        ];
        for (code, m_clients, m_fees, m1_clients, m1_fees) in rows {
            self.insert_client_activity(code, "2025-06", *m_clients, *m_fees)?;
            self.insert_client_activity(code, "2025-05", *m1_clients, *m1_fees)?;
        }

        for (code, count, amount) in [
            ("001", 12i64, 96_000_000.0),
            ("011", 7, 41_000_000.0),
            ("021", 5, 23_000_000.0),
            ("031", 3, 12_500_000.0),
        ] {
            self.insert_loan_production(code, "2025-06-10", count, amount)?;
            self.insert_loan_production(code, "2025-05-12", count - 1, amount * 0.8)?;
        }

        // Collection fixtures: one loan per branch with snapshots at the
        // prior-month end and each week end.
        let snapshots = ["2025-05-31", "2025-06-07", "2025-06-14", "2025-06-21", "2025-06-30"];
        for (i, (account, branch, manager, officer)) in [
            ("LN001", "001", "G01", "A. NDIAYE"),
            ("LN011", "011", "G02", "M. FALL"),
            ("LN021", "021", "G03", "S. DIOP"),
            ("LN526", "526", "G09", "DIRECTION"),
        ]
        .iter()
        .enumerate()
        {
            self.insert_loan_account(account, branch, Some(manager), Some(officer))?;
            let base = 1_000_000.0 * (i as f64 + 1.0);
            for (j, as_of) in snapshots.iter().enumerate() {
                let j = j as f64;
                self.insert_loan_position(
                    account,
                    as_of,
                    base * 10.0 - base * j,
                    base * 0.3,
                    base * 0.2,
                    base * 0.8 + base * 0.1 * j,
                )?;
            }
        }

        for account_type in [
            "compte-courant",
            "epargne-simple",
            "epargne-pep-simple",
            "epargne-projet",
            "dat",
            "depot-garantie",
        ] {
            for (code, m, m1) in [
                ("001", 520_000_000.0, 495_000_000.0),
                ("011", 180_000_000.0, 176_000_000.0),
                ("021", 95_000_000.0, 99_000_000.0),
            ] {
                self.insert_balance_snapshot(code, account_type, "2025-06-30", m)?;
                self.insert_balance_snapshot(code, account_type, "2025-05-31", m1)?;
            }
        }

        for (code, service, volume, commission) in [
            ("001", "WESTERN UNION", 42_000_000.0, 380_000.0),
            ("001", "RIA", 11_000_000.0, 96_000.0),
            ("011", "WESTERN UNION", 18_500_000.0, 160_000.0),
            ("021", "MONEYGRAM", 7_200_000.0, 64_000.0),
        ] {
            self.insert_transfer_operation(code, service, "2025-06-15", volume, commission)?;
            self.insert_transfer_operation(code, service, "2025-05-15", volume * 0.9, commission * 0.9)?;
        }

        for (code, sold, objective) in [("001", 34i64, 40i64), ("011", 19, 25), ("021", 8, 15)] {
            self.insert_card_sales(code, "2025-06", sold, objective)?;
            self.insert_card_sales(code, "2025-05", sold - 3, objective)?;
        }

        Ok(())
    }
}

// ── Row materialization ────────────────────────────────────────

/// One result row as a column-name → value map.
#[derive(Debug, Clone)]
pub struct Row {
    columns: HashMap<String, Value>,
}

impl Row {
    /// Numeric read with NULL (and non-numeric) mapping to 0.
    pub fn num(&self, name: &str) -> f64 {
        match self.columns.get(name) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.columns.get(name) {
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Build a row directly, for reducer tests and fixtures.
    pub fn from_pairs(pairs: &[(&str, Value)]) -> Self {
        Self {
            columns: pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        }
    }
}

/// Execute `sql` and materialize every row.
/// Blob columns have no reporting meaning and read as null.
pub fn fetch_rows(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> ReportResult<Vec<Row>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut columns = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            let value = match row.get_ref(i)? {
                ValueRef::Null => Value::Null,
                ValueRef::Integer(n) => Value::from(n),
                ValueRef::Real(f) => Value::from(f),
                ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).into_owned()),
                ValueRef::Blob(_) => Value::Null,
            };
            columns.insert(name.clone(), value);
        }
        out.push(Row { columns });
    }
    Ok(out)
}
