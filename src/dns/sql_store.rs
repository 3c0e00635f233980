//! PowerDNS generic SQLite backend
//!
//! Reads and writes the `domains` and `records` tables of a PowerDNS
//! installation. The engine is synchronous, so the store owns a
//! single-threaded Tokio runtime and blocks on each query. Staged changes
//! are written inside one SQL transaction on commit.

use std::convert::TryFrom;
use std::time::Duration;

use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio::runtime::Runtime;

use crate::dns::authority::{next_serial, Zone};
use crate::dns::errors::StoreError;
use crate::dns::record::{Criteria, Record, RecordData, RecordKind};
use crate::dns::repository::{RecordRepository, StagedChange, StoreResult, ZoneRepository};

const RECORD_COLUMNS: &str = "id, domain_id, name, type, content, ttl, change_date";

/// Record and zone store backed by a PowerDNS SQLite database
pub struct SqlStore {
    runtime: Runtime,
    pool: SqlitePool,
    staged: Vec<StagedChange>,
}

impl SqlStore {
    /// Connect using an sqlx URL such as `sqlite:///var/lib/powerdns/pdns.sqlite3`
    pub fn connect(url: &str) -> StoreResult<SqlStore> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        // A single long-lived connection keeps `sqlite::memory:` databases alive
        let pool = runtime.block_on(
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect(url),
        )?;

        log::debug!("connected to {}", url);
        Ok(SqlStore {
            runtime,
            pool,
            staged: Vec::new(),
        })
    }

    /// Create the `domains` and `records` tables when they are missing
    pub fn ensure_schema(&self) -> StoreResult<()> {
        self.runtime.block_on(async {
            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS domains (
                    id INTEGER PRIMARY KEY,
                    name VARCHAR(255) NOT NULL,
                    master VARCHAR(128) DEFAULT NULL,
                    last_check INTEGER DEFAULT NULL,
                    type VARCHAR(6) NOT NULL DEFAULT 'MASTER',
                    notified_serial INTEGER DEFAULT NULL,
                    account VARCHAR(40) DEFAULT NULL
                )
                "#,
            )
            .execute(&self.pool)
            .await?;

            sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS name_index ON domains(name)")
                .execute(&self.pool)
                .await?;

            sqlx::query(
                r#"
                CREATE TABLE IF NOT EXISTS records (
                    id INTEGER PRIMARY KEY,
                    domain_id INTEGER DEFAULT NULL,
                    name VARCHAR(255) DEFAULT NULL,
                    type VARCHAR(10) DEFAULT NULL,
                    content VARCHAR(65535) DEFAULT NULL,
                    ttl INTEGER DEFAULT NULL,
                    prio INTEGER DEFAULT NULL,
                    change_date INTEGER DEFAULT NULL
                )
                "#,
            )
            .execute(&self.pool)
            .await?;

            sqlx::query("CREATE INDEX IF NOT EXISTS rec_name_index ON records(name)")
                .execute(&self.pool)
                .await?;
            sqlx::query("CREATE INDEX IF NOT EXISTS domain_id ON records(domain_id)")
                .execute(&self.pool)
                .await?;

            Ok::<(), StoreError>(())
        })
    }

    /// Register a zone immediately; zones are otherwise managed outside the engine
    pub fn create_zone(&self, name: &str) -> StoreResult<Zone> {
        let name = name.trim_end_matches('.');
        let id = self.runtime.block_on(async {
            sqlx::query("INSERT INTO domains (name, type) VALUES (?, 'MASTER')")
                .bind(name)
                .execute(&self.pool)
                .await
                .map(|done| done.last_insert_rowid())
        })?;

        Ok(Zone::new(id, name))
    }

    /// Insert a record immediately, outside any staged change set
    pub fn seed_record(&self, record: &Record) -> StoreResult<Record> {
        let id = self.runtime.block_on(async {
            let mut conn = self.pool.acquire().await?;
            insert_record(&mut *conn, record).await
        })?;

        let mut record = record.clone();
        record.id = Some(id);
        Ok(record)
    }

    fn select_records(&self, kind: RecordKind, criteria: &Criteria, limit: Option<u32>) -> StoreResult<Vec<Record>> {
        let mut sql = format!("SELECT {} FROM records WHERE type = ?", RECORD_COLUMNS);
        if criteria.name.is_some() {
            sql.push_str(" AND name = ?");
        }
        if criteria.content.is_some() {
            sql.push_str(" AND content = ?");
        }
        if criteria.zone_id.is_some() {
            sql.push_str(" AND domain_id = ?");
        }
        sql.push_str(" ORDER BY id");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let rows = self.runtime.block_on(async {
            let mut query = sqlx::query(&sql).bind(kind.as_str());
            if let Some(name) = &criteria.name {
                query = query.bind(name.clone());
            }
            if let Some(content) = &criteria.content {
                query = query.bind(content.clone());
            }
            if let Some(zone_id) = criteria.zone_id {
                query = query.bind(zone_id);
            }
            query.fetch_all(&self.pool).await
        })?;

        rows.iter().map(record_from_row).collect()
    }

    fn today(&self) -> NaiveDate {
        chrono::Utc::now().date_naive()
    }
}

fn record_from_row(row: &SqliteRow) -> StoreResult<Record> {
    let kind: RecordKind = row.try_get::<String, _>("type")?.parse()?;
    let content: String = row.try_get::<Option<String>, _>("content")?.unwrap_or_default();

    Ok(Record {
        id: Some(row.try_get("id")?),
        zone_id: row.try_get::<Option<i64>, _>("domain_id")?.unwrap_or_default(),
        name: row.try_get::<Option<String>, _>("name")?.unwrap_or_default(),
        data: RecordData::parse(kind, &content)?,
        ttl: column_u32("ttl", row.try_get::<Option<i64>, _>("ttl")?.unwrap_or_default())?,
        change_date: row.try_get::<Option<i64>, _>("change_date")?.unwrap_or_default(),
    })
}

/// Integer column that must fit a `u32`
fn column_u32(column: &str, value: i64) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidRecord {
        kind: column.to_string(),
        content: value.to_string(),
    })
}

fn zone_from_row(row: &SqliteRow) -> StoreResult<Zone> {
    Ok(Zone {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        serial: row
            .try_get::<Option<i64>, _>("notified_serial")?
            .map(|serial| column_u32("notified_serial", serial))
            .transpose()?,
    })
}

async fn insert_record(conn: &mut sqlx::SqliteConnection, record: &Record) -> StoreResult<i64> {
    let done = sqlx::query(
        r#"
        INSERT INTO records (domain_id, name, type, content, ttl, prio, change_date)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(record.zone_id)
    .bind(record.name.clone())
    .bind(record.kind().as_str())
    .bind(record.content())
    .bind(i64::from(record.ttl))
    .bind(record.change_date)
    .execute(&mut *conn)
    .await?;

    Ok(done.last_insert_rowid())
}

async fn apply_change(
    conn: &mut sqlx::SqliteConnection,
    change: StagedChange,
    today: NaiveDate,
) -> StoreResult<()> {
    match change {
        StagedChange::Insert(record) => {
            insert_record(conn, &record).await?;
        }
        StagedChange::Delete(record) => {
            let id = record.id.ok_or_else(|| StoreError::Unpersisted(record.name.clone()))?;
            let done = sqlx::query("DELETE FROM records WHERE id = ?")
                .bind(id)
                .execute(&mut *conn)
                .await?;
            if done.rows_affected() == 0 {
                return Err(StoreError::NoSuchRecord(id));
            }
        }
        StagedChange::BumpSerial(zone_id) => {
            let row = sqlx::query("SELECT notified_serial FROM domains WHERE id = ?")
                .bind(zone_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or(StoreError::NoSuchZone(zone_id))?;
            let current = row
                .try_get::<Option<i64>, _>("notified_serial")?
                .map(|serial| column_u32("notified_serial", serial))
                .transpose()?;
            let serial = next_serial(current, today);

            sqlx::query("UPDATE domains SET notified_serial = ? WHERE id = ?")
                .bind(i64::from(serial))
                .bind(zone_id)
                .execute(&mut *conn)
                .await?;
            log::debug!("updated serial for zone {} to {}", zone_id, serial);
        }
    }
    Ok(())
}

impl RecordRepository for SqlStore {
    fn find_one(&self, kind: RecordKind, criteria: &Criteria) -> StoreResult<Option<Record>> {
        Ok(self.select_records(kind, criteria, Some(1))?.into_iter().next())
    }

    fn find_all(&self, kind: RecordKind, criteria: &Criteria) -> StoreResult<Vec<Record>> {
        self.select_records(kind, criteria, None)
    }

    fn insert(&mut self, records: Vec<Record>) -> StoreResult<()> {
        self.staged.extend(records.into_iter().map(StagedChange::Insert));
        Ok(())
    }

    fn delete(&mut self, records: Vec<Record>) -> StoreResult<()> {
        for record in records {
            if record.id.is_none() {
                return Err(StoreError::Unpersisted(record.name));
            }
            self.staged.push(StagedChange::Delete(record));
        }
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        let staged = std::mem::take(&mut self.staged);
        let today = self.today();
        let pool = &self.pool;

        self.runtime.block_on(async move {
            let mut tx = pool.begin().await?;
            for change in staged {
                // Dropping the transaction on error rolls it back
                apply_change(&mut *tx, change, today).await?;
            }
            tx.commit().await?;
            Ok::<(), StoreError>(())
        })
    }

    fn rollback(&mut self) {
        self.staged.clear();
    }
}

impl ZoneRepository for SqlStore {
    fn all_zones(&self) -> StoreResult<Vec<Zone>> {
        let rows = self.runtime.block_on(
            sqlx::query("SELECT id, name, notified_serial FROM domains ORDER BY id").fetch_all(&self.pool),
        )?;
        rows.iter().map(zone_from_row).collect()
    }

    fn zone_by_name(&self, name: &str) -> StoreResult<Option<Zone>> {
        let name = name.trim_end_matches('.').to_string();
        let row = self.runtime.block_on(
            sqlx::query("SELECT id, name, notified_serial FROM domains WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool),
        )?;
        row.as_ref().map(zone_from_row).transpose()
    }

    fn bump_serial(&mut self, zone_id: i64) -> StoreResult<()> {
        self.staged.push(StagedChange::BumpSerial(zone_id));
        Ok(())
    }
}
