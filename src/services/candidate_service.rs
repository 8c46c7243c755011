use crate::database::Database;
use crate::error::{Error, Result};
use crate::models::candidate::{Candidate, CandidateProfile, CandidateView, ResumeUpload};
use crate::services::credential_service::CredentialService;
use crate::services::resume_service::{ResumeChange, ResumeService};
use crate::utils::time;
use crate::utils::validation::{non_blank, require_fields};
use sqlx::SqliteConnection;

const CANDIDATE_COLUMNS: &str = "id, name, email, phone, area_of_interest, receives_alerts, \
     resume_path, password_hash, is_admin, created_at, updated_at";

const ADMIN_NAME: &str = "Administrador Ideal Empregos";
const ADMIN_AREA: &str = "administracao";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminProvisioning {
    Created,
    Promoted,
}

#[derive(Clone)]
pub struct CandidateService {
    db: Database,
    credentials: CredentialService,
    resumes: ResumeService,
}

impl CandidateService {
    pub fn new(db: Database, credentials: CredentialService, resumes: ResumeService) -> Self {
        Self {
            db,
            credentials,
            resumes,
        }
    }

    /// Creates the candidate on first submission, otherwise updates it in place.
    ///
    /// A blank password keeps the stored hash; a missing resume keeps the
    /// stored file. A replaced resume is removed only after the commit.
    pub async fn upsert(
        &self,
        profile: &CandidateProfile,
        resume: &ResumeUpload,
    ) -> Result<CandidateView> {
        let required = require_fields(&[
            ("name", profile.name.as_deref()),
            ("email", profile.email.as_deref()),
            ("area_of_interest", profile.area_of_interest.as_deref()),
        ])?;
        let (name, email, area) = (required[0], required[1], required[2]);
        let phone = non_blank(profile.phone.as_deref());

        let new_hash = match non_blank(profile.password.as_deref()) {
            Some(password) => Some(self.hash_password(password).await?),
            None => None,
        };

        self.db.ensure_schema().await?;
        let mut tx = self.db.begin_write().await?;
        let existing = fetch_by_email(tx.conn(), email).await?;

        let password_hash = match (new_hash, &existing) {
            (Some(hash), _) => hash,
            (None, Some(row)) => row.password_hash.clone(),
            (None, None) => {
                return Err(Error::validation(
                    "a password is required to create an account",
                ))
            }
        };

        let change = self
            .resumes
            .store(
                resume.filename.as_deref(),
                resume.data.as_deref(),
                existing.as_ref().and_then(|row| row.resume_path.as_deref()),
            )
            .await?;

        let now = time::now();
        let written = if existing.is_some() {
            sqlx::query_as::<_, Candidate>(&format!(
                r#"
                UPDATE candidates
                SET name = ?, phone = ?, area_of_interest = ?, receives_alerts = ?,
                    resume_path = ?, password_hash = ?, updated_at = ?
                WHERE email = ?
                RETURNING {}
                "#,
                CANDIDATE_COLUMNS
            ))
            .bind(name)
            .bind(phone)
            .bind(area)
            .bind(profile.receives_alerts)
            .bind(change.path.as_deref())
            .bind(&password_hash)
            .bind(now)
            .bind(email)
            .fetch_one(tx.conn())
            .await
        } else {
            sqlx::query_as::<_, Candidate>(&format!(
                r#"
                INSERT INTO candidates (
                    name, email, phone, area_of_interest, receives_alerts,
                    resume_path, password_hash, is_admin, created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
                RETURNING {}
                "#,
                CANDIDATE_COLUMNS
            ))
            .bind(name)
            .bind(email)
            .bind(phone)
            .bind(area)
            .bind(profile.receives_alerts)
            .bind(change.path.as_deref())
            .bind(&password_hash)
            .bind(now)
            .bind(now)
            .fetch_one(tx.conn())
            .await
        };

        let committed = match written {
            Ok(row) => tx.commit().await.map(|_| row),
            Err(e) => Err(e.into()),
        };
        let row = match committed {
            Ok(row) => row,
            Err(e) => {
                self.discard_written(&change).await;
                return Err(e);
            }
        };

        if let Some(superseded) = &change.superseded {
            self.resumes.discard(superseded).await;
        }

        tracing::debug!(
            candidate_id = row.id,
            created = existing.is_none(),
            "Candidate upserted"
        );
        Ok(row.into())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<CandidateView>> {
        let Some(email) = non_blank(Some(email)) else {
            return Ok(None);
        };

        self.db.ensure_schema().await?;
        let mut conn = self.db.pool().acquire().await?;
        let row = fetch_by_email(&mut conn, email).await?;
        Ok(row.map(CandidateView::from))
    }

    /// Every failure past input validation reports the same
    /// [`Error::Authentication`] so callers cannot tell which emails exist.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<CandidateView> {
        let (Some(email), Some(password)) = (non_blank(Some(email)), non_blank(Some(password)))
        else {
            return Err(Error::validation("email and password are required"));
        };

        self.db.ensure_schema().await?;
        let mut conn = self.db.pool().acquire().await?;
        let row = fetch_by_email(&mut conn, email)
            .await?
            .ok_or_else(Error::invalid_credentials)?;
        drop(conn);

        if row.password_hash.trim().is_empty() {
            return Err(Error::invalid_credentials());
        }
        if !self.verify_password(password, &row.password_hash).await? {
            return Err(Error::invalid_credentials());
        }

        Ok(row.into())
    }

    pub async fn is_administrator(&self, email: &str) -> Result<bool> {
        let Some(email) = non_blank(Some(email)) else {
            return Ok(false);
        };

        self.db.ensure_schema().await?;
        let flag: Option<bool> = sqlx::query_scalar("SELECT is_admin FROM candidates WHERE email = ?")
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(flag.unwrap_or(false))
    }

    pub async fn count(&self) -> Result<i64> {
        self.db.ensure_schema().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM candidates")
            .fetch_one(self.db.pool())
            .await?;
        Ok(count)
    }

    /// Creates the configured administrator, or promotes the existing account
    /// registered under that email.
    pub async fn provision_administrator(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AdminProvisioning> {
        let email = email.trim();
        self.db.ensure_schema().await?;

        let mut tx = self.db.begin_write().await?;
        let now = time::now();

        if fetch_by_email(tx.conn(), email).await?.is_some() {
            sqlx::query("UPDATE candidates SET is_admin = 1, updated_at = ? WHERE email = ?")
                .bind(now)
                .bind(email)
                .execute(tx.conn())
                .await?;
            tx.commit().await?;
            tracing::info!("Promoted existing account {} to administrator", email);
            return Ok(AdminProvisioning::Promoted);
        }

        let password_hash = self.hash_password(password).await.map_err(|e| match e {
            Error::Validation(msg) => Error::Config(format!("administrator {}", msg)),
            other => other,
        })?;

        sqlx::query(
            r#"
            INSERT INTO candidates (
                name, email, phone, area_of_interest, receives_alerts,
                resume_path, password_hash, is_admin, created_at, updated_at
            )
            VALUES (?, ?, NULL, ?, 0, NULL, ?, 1, ?, ?)
            "#,
        )
        .bind(ADMIN_NAME)
        .bind(email)
        .bind(ADMIN_AREA)
        .bind(&password_hash)
        .bind(now)
        .bind(now)
        .execute(tx.conn())
        .await?;
        tx.commit().await?;

        tracing::info!("Provisioned administrator account {}", email);
        Ok(AdminProvisioning::Created)
    }

    async fn hash_password(&self, password: &str) -> Result<String> {
        let credentials = self.credentials.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || credentials.hash(&password))
            .await
            .map_err(|e| Error::Storage(format!("password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: &str, token: &str) -> Result<bool> {
        let credentials = self.credentials.clone();
        let password = password.to_string();
        let token = token.to_string();
        tokio::task::spawn_blocking(move || credentials.verify(&password, &token))
            .await
            .map_err(|e| Error::Storage(format!("password verification task failed: {}", e)))
    }

    async fn discard_written(&self, change: &ResumeChange) {
        if change.written {
            if let Some(path) = &change.path {
                self.resumes.discard(path).await;
            }
        }
    }
}

async fn fetch_by_email(conn: &mut SqliteConnection, email: &str) -> Result<Option<Candidate>> {
    let row = sqlx::query_as::<_, Candidate>(&format!(
        "SELECT {} FROM candidates WHERE email = ?",
        CANDIDATE_COLUMNS
    ))
    .bind(email)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}
