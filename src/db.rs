use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::record::PolicyRecord;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS runs (
            id          INTEGER PRIMARY KEY,
            started_at  TEXT NOT NULL DEFAULT (datetime('now')),
            finished_at TEXT,
            links       INTEGER NOT NULL DEFAULT 0,
            fetched     INTEGER NOT NULL DEFAULT 0,
            errors      INTEGER NOT NULL DEFAULT 0,
            saved       INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS policies (
            id           INTEGER PRIMARY KEY,
            run_id       INTEGER NOT NULL REFERENCES runs(id),
            url          TEXT NOT NULL,
            title        TEXT NOT NULL,
            category     TEXT NOT NULL,
            department   TEXT,
            publish_date TEXT,
            content      TEXT NOT NULL,
            crawl_time   TEXT NOT NULL,
            UNIQUE(run_id, url)
        );
        CREATE INDEX IF NOT EXISTS idx_policies_run ON policies(run_id);
        CREATE INDEX IF NOT EXISTS idx_policies_category ON policies(category);

        -- One row per requirement label, empty excerpts included
        CREATE TABLE IF NOT EXISTS policy_requirements (
            policy_id INTEGER NOT NULL REFERENCES policies(id),
            position  INTEGER NOT NULL,
            label     TEXT NOT NULL,
            excerpt   TEXT NOT NULL,
            UNIQUE(policy_id, label)
        );
        CREATE INDEX IF NOT EXISTS idx_requirements_policy ON policy_requirements(policy_id);
        ",
    )?;
    Ok(())
}

// ── Runs ──

pub struct RunCounts {
    pub links: usize,
    pub fetched: usize,
    pub errors: usize,
    pub saved: usize,
}

pub fn insert_run(conn: &Connection) -> Result<i64> {
    conn.execute("INSERT INTO runs DEFAULT VALUES", [])?;
    Ok(conn.last_insert_rowid())
}

pub fn finish_run(conn: &Connection, run_id: i64, counts: &RunCounts) -> Result<()> {
    conn.execute(
        "UPDATE runs SET finished_at = datetime('now'), links = ?2, fetched = ?3, errors = ?4, saved = ?5
         WHERE id = ?1",
        rusqlite::params![run_id, counts.links, counts.fetched, counts.errors, counts.saved],
    )?;
    Ok(())
}

/// Most recent run that completed.
pub fn latest_run_id(conn: &Connection) -> Result<Option<i64>> {
    let id = conn
        .query_row(
            "SELECT id FROM runs WHERE finished_at IS NOT NULL ORDER BY id DESC LIMIT 1",
            [],
            |r| r.get(0),
        )
        .optional()?;
    Ok(id)
}

// ── Policies ──

/// Insert records for `run_id`. A URL already stored for the run is skipped.
pub fn save_policies(conn: &Connection, run_id: i64, records: &[PolicyRecord]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut p_stmt = tx.prepare(
            "INSERT OR IGNORE INTO policies
             (run_id, url, title, category, department, publish_date, content, crawl_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        let mut r_stmt = tx.prepare(
            "INSERT INTO policy_requirements (policy_id, position, label, excerpt)
             VALUES (?1, ?2, ?3, ?4)",
        )?;

        for rec in records {
            let inserted = p_stmt.execute(rusqlite::params![
                run_id,
                rec.url(),
                rec.title(),
                rec.category(),
                rec.department(),
                rec.publish_date(),
                rec.raw_text(),
                rec.crawl_time().to_rfc3339(),
            ])?;
            if inserted == 0 {
                continue;
            }
            let policy_id = tx.last_insert_rowid();
            for (pos, (label, excerpt)) in rec.requirements().iter().enumerate() {
                r_stmt.execute(rusqlite::params![policy_id, pos, label, excerpt])?;
            }
            count += 1;
        }
    }
    tx.commit()?;
    Ok(count)
}

// ── Overview ──

pub struct OverviewRow {
    pub title: String,
    pub category: String,
    pub department: String,
    pub publish_date: String,
    pub url: String,
    /// Requirement labels with a non-empty excerpt.
    pub requirements: usize,
}

/// Policies of the latest completed run, optionally filtered by category.
pub fn fetch_overview(conn: &Connection, category: Option<&str>, limit: usize) -> Result<Vec<OverviewRow>> {
    let Some(run_id) = latest_run_id(conn)? else {
        return Ok(Vec::new());
    };

    let mut conditions = vec!["p.run_id = ?1".to_string()];
    let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(run_id)];

    if let Some(c) = category {
        conditions.push(format!("p.category = ?{}", params.len() + 1));
        params.push(Box::new(c.to_string()));
    }

    let sql = format!(
        "SELECT p.title, p.category, COALESCE(p.department,''), COALESCE(p.publish_date,''), p.url,
                (SELECT COUNT(*) FROM policy_requirements r
                 WHERE r.policy_id = p.id AND r.excerpt != '')
         FROM policies p
         WHERE {}
         ORDER BY p.publish_date DESC, p.id
         LIMIT {}",
        conditions.join(" AND "),
        limit
    );

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), |row| {
            Ok(OverviewRow {
                title: row.get(0)?,
                category: row.get(1)?,
                department: row.get(2)?,
                publish_date: row.get(3)?,
                url: row.get(4)?,
                requirements: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub run_id: i64,
    pub started_at: String,
    pub links: usize,
    pub fetched: usize,
    pub errors: usize,
    pub saved: usize,
    pub categories: Vec<(String, usize)>,
    pub departments: Vec<(String, usize)>,
}

fn distribution(conn: &Connection, sql: &str, run_id: i64) -> Result<Vec<(String, usize)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Counters and distributions for the latest completed run.
pub fn get_stats(conn: &Connection) -> Result<Option<Stats>> {
    let Some(run_id) = latest_run_id(conn)? else {
        return Ok(None);
    };

    let (started_at, links, fetched, errors, saved) = conn.query_row(
        "SELECT started_at, links, fetched, errors, saved FROM runs WHERE id = ?1",
        [run_id],
        |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
    )?;

    let categories = distribution(
        conn,
        "SELECT category, COUNT(*) AS n FROM policies WHERE run_id = ?1
         GROUP BY category ORDER BY n DESC, category",
        run_id,
    )?;
    let departments = distribution(
        conn,
        "SELECT COALESCE(department, '未知'), COUNT(*) AS n FROM policies WHERE run_id = ?1
         GROUP BY 1 ORDER BY n DESC, 1",
        run_id,
    )?;

    Ok(Some(Stats {
        run_id,
        started_at,
        links,
        fetched,
        errors,
        saved,
        categories,
        departments,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::extract::fields::Fields;
    use indexmap::IndexMap;

    fn memory() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn record(url: &str, category: &str, dept: Option<&str>, date: &str) -> PolicyRecord {
        let mut req = IndexMap::new();
        req.insert("企业基本条件".to_string(), "注册地须在徐汇区".to_string());
        req.insert("申报时间".to_string(), String::new());
        PolicyRecord::builder(url, "人才政策", "正文")
            .fields(Fields {
                publish_date: Some(date.into()),
                department: dept.map(String::from),
            })
            .category(category)
            .requirements(req)
            .build()
    }

    fn counts(saved: usize) -> RunCounts {
        RunCounts {
            links: 3,
            fetched: 3,
            errors: 0,
            saved,
        }
    }

    #[test]
    fn no_runs_yet() {
        let conn = memory();
        assert_eq!(latest_run_id(&conn).unwrap(), None);
        assert!(get_stats(&conn).unwrap().is_none());
        assert!(fetch_overview(&conn, None, 10).unwrap().is_empty());
    }

    #[test]
    fn unfinished_run_not_latest() {
        let conn = memory();
        let first = insert_run(&conn).unwrap();
        finish_run(&conn, first, &counts(0)).unwrap();
        insert_run(&conn).unwrap();
        assert_eq!(latest_run_id(&conn).unwrap(), Some(first));
    }

    #[test]
    fn save_and_read_back() {
        let conn = memory();
        let run = insert_run(&conn).unwrap();
        let records = vec![
            record("https://x/1", "住房保障", Some("徐汇区房管局"), "2024-05-20"),
            record("https://x/2", "人才引进", None, "2024-06-01"),
            record("https://x/3", "住房保障", Some("徐汇区房管局"), "2024-01-10"),
            record("https://x/1", "住房保障", Some("徐汇区房管局"), "2024-05-20"),
        ];
        let saved = save_policies(&conn, run, &records).unwrap();
        assert_eq!(saved, 3);
        finish_run(&conn, run, &counts(saved)).unwrap();

        let reqs: usize = conn
            .query_row("SELECT COUNT(*) FROM policy_requirements", [], |r| r.get(0))
            .unwrap();
        assert_eq!(reqs, 6);

        let s = get_stats(&conn).unwrap().unwrap();
        assert_eq!(s.saved, 3);
        assert_eq!(s.categories[0], ("住房保障".to_string(), 2));
        assert!(s.departments.contains(&("未知".to_string(), 1)));

        let rows = fetch_overview(&conn, None, 10).unwrap();
        let urls: Vec<&str> = rows.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["https://x/2", "https://x/1", "https://x/3"]);
        assert_eq!(rows[0].requirements, 1);

        let housing = fetch_overview(&conn, Some("住房保障"), 10).unwrap();
        assert_eq!(housing.len(), 2);
        assert_eq!(fetch_overview(&conn, None, 1).unwrap().len(), 1);
    }

    #[test]
    fn same_url_in_new_run_is_stored_again() {
        let conn = memory();
        for _ in 0..2 {
            let run = insert_run(&conn).unwrap();
            let n = save_policies(&conn, run, &[record("https://x/1", "其他", None, "2024-01-01")]).unwrap();
            assert_eq!(n, 1);
            finish_run(&conn, run, &counts(n)).unwrap();
        }
        let total: usize = conn.query_row("SELECT COUNT(*) FROM policies", [], |r| r.get(0)).unwrap();
        assert_eq!(total, 2);
    }
}
