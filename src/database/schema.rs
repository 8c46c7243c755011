//! Creates the candidate and application tables and upgrades any earlier
//! generation of their layout in place.
//!
//! Upgrades are an ordered list of [`MigrationStep`]s. Each step checks its own
//! precondition against the live table shape, so a fully migrated database
//! applies nothing and the whole routine is safe to re-run. All steps share a
//! single `BEGIN IMMEDIATE` transaction.

use crate::error::{Error, Result};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;

const CANDIDATES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS candidates (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        area_of_interest TEXT NOT NULL,
        phone TEXT,
        receives_alerts INTEGER NOT NULL DEFAULT 1,
        resume_path TEXT,
        password_hash TEXT NOT NULL,
        is_admin INTEGER NOT NULL DEFAULT 0,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    )
"#;

const APPLICATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS applications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        candidate_email TEXT NOT NULL,
        job_id TEXT NOT NULL,
        job_title TEXT,
        status TEXT NOT NULL DEFAULT 'pending-review'
            CHECK (status IN ('pending-review', 'accepted', 'rejected')),
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY(candidate_email) REFERENCES candidates(email) ON DELETE CASCADE
    )
"#;

const APPLICATION_PAIR_INDEX: &str = "idx_applications_candidate_job";

const CURRENT_STATUSES: &str = "'pending-review', 'accepted', 'rejected'";

/// Current candidate column, the columns it may be copied from (first non-null
/// wins), and the value used when none of them hold one. The Portuguese names
/// are the layout written by the previous generation of the site.
const CANDIDATE_COLUMN_SOURCES: [(&str, &[&str], &str); 11] = [
    ("id", &["id"], "NULL"),
    ("name", &["name", "nome"], "''"),
    ("email", &["email"], "''"),
    (
        "area_of_interest",
        &["area_of_interest", "area_interesse", "area"],
        "''",
    ),
    ("phone", &["phone", "telefone"], "NULL"),
    (
        "receives_alerts",
        &["receives_alerts", "recebe_alertas", "wants_alerts", "deseja_alertas"],
        "1",
    ),
    (
        "resume_path",
        &["resume_path", "curriculo_path", "resume", "curriculo"],
        "NULL",
    ),
    ("password_hash", &["password_hash", "senha_hash"], "''"),
    ("is_admin", &["is_admin"], "0"),
    ("created_at", &["created_at", "criado_em"], "CURRENT_TIMESTAMP"),
    (
        "updated_at",
        &["updated_at", "atualizado_em", "created_at", "criado_em"],
        "CURRENT_TIMESTAMP",
    ),
];

fn is_current_candidate_column(column: &str) -> bool {
    CANDIDATE_COLUMN_SOURCES.iter().any(|(c, _, _)| *c == column)
}

fn is_known_candidate_column(column: &str) -> bool {
    CANDIDATE_COLUMN_SOURCES
        .iter()
        .any(|(_, sources, _)| sources.contains(&column))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `COALESCE` over whichever of `sources` exist in `shape`, ending in `default`.
fn coalesce_present(shape: &TableShape, sources: &[&str], default: &str) -> String {
    let present: Vec<&str> = sources.iter().copied().filter(|s| shape.has(s)).collect();
    if present.is_empty() {
        default.to_string()
    } else {
        format!("COALESCE({}, {})", present.join(", "), default)
    }
}

/// Declared column types of one table, keyed by column name.
#[derive(Debug, Clone, Default)]
pub struct TableShape {
    columns: HashMap<String, String>,
}

impl TableShape {
    pub async fn inspect(conn: &mut SqliteConnection, table: &str) -> Result<Self> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT name, type FROM pragma_table_info(?)")
                .bind(table)
                .fetch_all(&mut *conn)
                .await?;
        Ok(Self {
            columns: rows
                .into_iter()
                .map(|(name, ty)| (name, ty.to_ascii_uppercase()))
                .collect(),
        })
    }

    pub fn has(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    pub fn declared_type(&self, column: &str) -> Option<&str> {
        self.columns.get(column).map(String::as_str)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStep {
    /// `column` absent AND one of `sources` present: add `column` and fill it
    /// from the first non-null source.
    CopyColumn {
        table: &'static str,
        column: &'static str,
        sources: &'static [&'static str],
        definition: &'static str,
        default: &'static str,
    },
    AddAdminFlag,
    RebuildCandidates,
    NormalizeApplicationStatuses,
    UniqueApplicationPair,
}

pub const MIGRATION_STEPS: [MigrationStep; 9] = [
    MigrationStep::CopyColumn {
        table: "candidates",
        column: "area_of_interest",
        sources: &["area_interesse", "area"],
        definition: "TEXT",
        default: "NULL",
    },
    MigrationStep::CopyColumn {
        table: "candidates",
        column: "receives_alerts",
        sources: &["recebe_alertas", "wants_alerts", "deseja_alertas"],
        definition: "INTEGER NOT NULL DEFAULT 1",
        default: "1",
    },
    MigrationStep::CopyColumn {
        table: "candidates",
        column: "resume_path",
        sources: &["curriculo_path", "resume", "curriculo"],
        definition: "TEXT",
        default: "NULL",
    },
    MigrationStep::AddAdminFlag,
    MigrationStep::RebuildCandidates,
    MigrationStep::CopyColumn {
        table: "applications",
        column: "created_at",
        sources: &["criado_em"],
        definition: "DATETIME",
        default: "NULL",
    },
    MigrationStep::CopyColumn {
        table: "applications",
        column: "updated_at",
        sources: &["atualizado_em", "created_at", "criado_em"],
        definition: "DATETIME",
        default: "NULL",
    },
    MigrationStep::NormalizeApplicationStatuses,
    MigrationStep::UniqueApplicationPair,
];

impl MigrationStep {
    pub fn name(&self) -> String {
        match self {
            MigrationStep::CopyColumn { table, column, .. } => {
                format!("add {}.{}", table, column)
            }
            MigrationStep::AddAdminFlag => "add is_admin".to_string(),
            MigrationStep::RebuildCandidates => "rebuild candidates".to_string(),
            MigrationStep::NormalizeApplicationStatuses => {
                "normalize application statuses".to_string()
            }
            MigrationStep::UniqueApplicationPair => "unique application pair".to_string(),
        }
    }

    async fn applies(&self, conn: &mut SqliteConnection) -> Result<bool> {
        match self {
            MigrationStep::CopyColumn {
                table,
                column,
                sources,
                ..
            } => {
                let shape = TableShape::inspect(conn, table).await?;
                Ok(!shape.has(column) && sources.iter().any(|s| shape.has(s)))
            }
            MigrationStep::AddAdminFlag => {
                let shape = TableShape::inspect(conn, "candidates").await?;
                Ok(!shape.has("is_admin"))
            }
            MigrationStep::RebuildCandidates => {
                let shape = TableShape::inspect(conn, "candidates").await?;
                let stale_timestamp = shape
                    .declared_type("created_at")
                    .map_or(true, |ty| ty != "DATETIME");
                let leftover = shape
                    .columns()
                    .any(|c| is_known_candidate_column(c) && !is_current_candidate_column(c));
                Ok(stale_timestamp || leftover || !shape.has("updated_at"))
            }
            MigrationStep::NormalizeApplicationStatuses => {
                let (count,): (i64,) = sqlx::query_as(&format!(
                    "SELECT COUNT(*) FROM applications WHERE status IS NULL OR status NOT IN ({})",
                    CURRENT_STATUSES
                ))
                .fetch_one(&mut *conn)
                .await?;
                Ok(count > 0)
            }
            MigrationStep::UniqueApplicationPair => {
                let (exists,): (i64,) = sqlx::query_as(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = ?",
                )
                .bind(APPLICATION_PAIR_INDEX)
                .fetch_one(&mut *conn)
                .await?;
                if exists > 0 {
                    return Ok(false);
                }
                let (duplicates,): (i64,) = sqlx::query_as(
                    r#"
                    SELECT COUNT(*) FROM (
                        SELECT 1 FROM applications
                        GROUP BY candidate_email, job_id
                        HAVING COUNT(*) > 1
                    )
                    "#,
                )
                .fetch_one(&mut *conn)
                .await?;
                if duplicates > 0 {
                    tracing::warn!(
                        "Skipping unique application index: {} duplicated (candidate, job) pairs",
                        duplicates
                    );
                    return Ok(false);
                }
                Ok(true)
            }
        }
    }

    async fn apply(&self, conn: &mut SqliteConnection) -> Result<()> {
        match self {
            MigrationStep::CopyColumn {
                table,
                column,
                sources,
                definition,
                default,
            } => {
                let shape = TableShape::inspect(conn, table).await?;
                let fill = coalesce_present(&shape, sources, default);
                sqlx::query(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {}",
                    table, column, definition
                ))
                .execute(&mut *conn)
                .await?;
                sqlx::query(&format!("UPDATE {} SET {} = {}", table, column, fill))
                    .execute(&mut *conn)
                    .await?;
            }
            MigrationStep::AddAdminFlag => {
                sqlx::query("ALTER TABLE candidates ADD COLUMN is_admin INTEGER NOT NULL DEFAULT 0")
                    .execute(&mut *conn)
                    .await?;
            }
            MigrationStep::RebuildCandidates => rebuild_candidates(conn).await?,
            MigrationStep::NormalizeApplicationStatuses => {
                sqlx::query(
                    r#"
                    UPDATE applications
                    SET status = CASE status
                        WHEN 'em_analise' THEN 'pending-review'
                        WHEN 'aceito' THEN 'accepted'
                        WHEN 'recusado' THEN 'rejected'
                        ELSE status
                    END
                    WHERE status IN ('em_analise', 'aceito', 'recusado')
                    "#,
                )
                .execute(&mut *conn)
                .await?;

                let unknown = sqlx::query(&format!(
                    "UPDATE applications SET status = 'pending-review' \
                     WHERE status IS NULL OR status NOT IN ({})",
                    CURRENT_STATUSES
                ))
                .execute(&mut *conn)
                .await?
                .rows_affected();
                if unknown > 0 {
                    tracing::warn!(
                        "Reset {} applications with an unrecognized status to pending-review",
                        unknown
                    );
                }
            }
            MigrationStep::UniqueApplicationPair => {
                sqlx::query(&format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS {} ON applications (candidate_email, job_id)",
                    APPLICATION_PAIR_INDEX
                ))
                .execute(&mut *conn)
                .await?;
            }
        }
        Ok(())
    }
}

/// Rename the old table away, create the current shape, copy every row with
/// renamed columns coalesced, then drop the old table.
///
/// Refuses to run, leaving everything untouched, if the old table has a column
/// holding data that no current column takes.
async fn rebuild_candidates(conn: &mut SqliteConnection) -> Result<()> {
    let legacy = TableShape::inspect(conn, "candidates").await?;

    let mut unmapped: Vec<&str> = legacy
        .columns()
        .filter(|c| !is_known_candidate_column(c))
        .collect();
    unmapped.sort_unstable();
    for column in unmapped {
        let ident = quote_ident(column);
        let (filled,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM candidates WHERE {} IS NOT NULL AND {} <> ''",
            ident, ident
        ))
        .fetch_one(&mut *conn)
        .await?;
        if filled > 0 {
            return Err(Error::Storage(format!(
                "cannot rebuild candidates: column {} holds data in {} rows and has no destination",
                column, filled
            )));
        }
        tracing::warn!("Dropping empty legacy candidates column {}", column);
    }

    let targets: Vec<&str> = CANDIDATE_COLUMN_SOURCES.iter().map(|(c, _, _)| *c).collect();
    let selects: Vec<String> = CANDIDATE_COLUMN_SOURCES
        .iter()
        .map(|(_, sources, default)| coalesce_present(&legacy, sources, default))
        .collect();

    // Keep the applications foreign key pointing at the name `candidates`
    // while the old table is renamed away.
    sqlx::query("PRAGMA legacy_alter_table = ON")
        .execute(&mut *conn)
        .await?;
    let copied = copy_into_current_shape(conn, &targets, &selects).await;
    let restored = sqlx::query("PRAGMA legacy_alter_table = OFF")
        .execute(&mut *conn)
        .await;

    copied?;
    restored?;
    Ok(())
}

async fn copy_into_current_shape(
    conn: &mut SqliteConnection,
    targets: &[&str],
    selects: &[String],
) -> Result<()> {
    sqlx::query("DROP TABLE IF EXISTS candidates_legacy")
        .execute(&mut *conn)
        .await?;
    sqlx::query("ALTER TABLE candidates RENAME TO candidates_legacy")
        .execute(&mut *conn)
        .await?;
    sqlx::query(CANDIDATES_TABLE).execute(&mut *conn).await?;
    sqlx::query(&format!(
        "INSERT INTO candidates ({}) SELECT {} FROM candidates_legacy",
        targets.join(", "),
        selects.join(", ")
    ))
    .execute(&mut *conn)
    .await?;
    sqlx::query("DROP TABLE candidates_legacy")
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Names of the steps applied by one [`ensure_schema`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub applied: Vec<String>,
}

impl SchemaReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Create missing tables and apply every pending migration step atomically.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<SchemaReport> {
    let mut conn = pool.acquire().await?;

    // Dropping the renamed table must never cascade into applications.
    sqlx::query("PRAGMA foreign_keys = OFF")
        .execute(&mut *conn)
        .await?;
    let outcome = migrate(&mut conn).await;
    let restored = sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await;

    let report = outcome?;
    restored?;

    for step in &report.applied {
        tracing::info!("Applied schema migration step: {}", step);
    }
    Ok(report)
}

async fn migrate(conn: &mut SqliteConnection) -> Result<SchemaReport> {
    sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

    match apply_pending(conn).await {
        Ok(report) => {
            sqlx::query("COMMIT").execute(&mut *conn).await?;
            Ok(report)
        }
        Err(e) => {
            if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                tracing::error!("Schema rollback failed: {}", rollback);
            }
            Err(e)
        }
    }
}

async fn apply_pending(conn: &mut SqliteConnection) -> Result<SchemaReport> {
    let fresh = !TableShape::inspect(conn, "candidates").await?.has("id");
    sqlx::query(CANDIDATES_TABLE).execute(&mut *conn).await?;
    sqlx::query(APPLICATIONS_TABLE).execute(&mut *conn).await?;
    if fresh {
        tracing::info!("Created candidate and application tables");
    }

    let mut report = SchemaReport::default();
    for step in MIGRATION_STEPS {
        if step.applies(conn).await? {
            step.apply(conn).await?;
            report.applied.push(step.name());
        }
    }
    Ok(report)
}
