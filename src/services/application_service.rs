use crate::database::Database;
use crate::error::{Error, Result};
use crate::models::application::{ApplicationRow, ApplicationStatus, ApplicationView};
use crate::utils::time;
use crate::utils::validation::non_blank;
use sqlx::SqliteConnection;

const APPLICATION_SELECT: &str = r#"
    SELECT a.id, a.candidate_email, a.job_id, a.job_title, a.status, a.created_at, a.updated_at,
           c.name AS candidate_name, c.area_of_interest AS candidate_area
    FROM applications a
    JOIN candidates c ON c.email = a.candidate_email
"#;

#[derive(Clone)]
pub struct ApplicationService {
    db: Database,
}

impl ApplicationService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Records interest in a job. Re-applying keeps the row and resets it to
    /// pending review.
    pub async fn upsert(
        &self,
        candidate_email: &str,
        job_id: &str,
        job_title: Option<&str>,
    ) -> Result<ApplicationView> {
        let (Some(email), Some(job_id)) =
            (non_blank(Some(candidate_email)), non_blank(Some(job_id)))
        else {
            return Err(Error::validation("candidate email and job id are required"));
        };
        let job_title = non_blank(job_title);

        self.db.ensure_schema().await?;
        let mut tx = self.db.begin_write().await?;

        let candidate: Option<i64> = sqlx::query_scalar("SELECT id FROM candidates WHERE email = ?")
            .bind(email)
            .fetch_optional(tx.conn())
            .await?;
        if candidate.is_none() {
            return Err(Error::validation("no candidate is registered with that email"));
        }

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM applications WHERE candidate_email = ? AND job_id = ?",
        )
        .bind(email)
        .bind(job_id)
        .fetch_optional(tx.conn())
        .await?;

        let now = time::now();
        let id = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE applications
                    SET job_title = ?, status = ?, updated_at = ?
                    WHERE id = ?
                    "#,
                )
                .bind(job_title)
                .bind(ApplicationStatus::PendingReview.as_str())
                .bind(now)
                .bind(id)
                .execute(tx.conn())
                .await?;
                id
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO applications (candidate_email, job_id, job_title, status, created_at, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(email)
                .bind(job_id)
                .bind(job_title)
                .bind(ApplicationStatus::PendingReview.as_str())
                .bind(now)
                .bind(now)
                .execute(tx.conn())
                .await?
                .last_insert_rowid()
            }
        };

        let view = fetch_view(tx.conn(), id).await?;
        tx.commit().await?;

        tracing::debug!(application_id = id, job_id, "Application upserted");
        Ok(view)
    }

    /// All applications, most recently created first.
    pub async fn list(&self) -> Result<Vec<ApplicationView>> {
        self.db.ensure_schema().await?;
        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            "{} ORDER BY datetime(a.created_at) DESC, a.id DESC",
            APPLICATION_SELECT
        ))
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|row| ApplicationView::try_from(row).map_err(Error::Storage))
            .collect()
    }

    pub async fn update_status(&self, application_id: i64, status: &str) -> Result<ApplicationView> {
        let status: ApplicationStatus = status.parse().map_err(Error::Validation)?;

        self.db.ensure_schema().await?;
        let mut tx = self.db.begin_write().await?;

        let updated = sqlx::query("UPDATE applications SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(time::now())
            .bind(application_id)
            .execute(tx.conn())
            .await?;
        if updated.rows_affected() == 0 {
            return Err(Error::validation("no application exists with that id"));
        }

        let view = fetch_view(tx.conn(), application_id).await?;
        tx.commit().await?;

        tracing::debug!(application_id, status = %status, "Application status updated");
        Ok(view)
    }

    pub async fn count(&self) -> Result<i64> {
        self.db.ensure_schema().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM applications")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }
}

async fn fetch_view(conn: &mut SqliteConnection, id: i64) -> Result<ApplicationView> {
    let row = sqlx::query_as::<_, ApplicationRow>(&format!("{} WHERE a.id = ?", APPLICATION_SELECT))
        .bind(id)
        .fetch_one(conn)
        .await?;
    ApplicationView::try_from(row).map_err(Error::Storage)
}
