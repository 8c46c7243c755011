use crate::error::{Error, Result};
use crate::utils::time;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

const UPLOADS_DIR: &str = "uploads";
const FALLBACK_NAME: &str = "resume";

/// Outcome of [`ResumeService::store`]. `superseded` is the reference the
/// caller should discard once the row pointing at `path` is committed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeChange {
    pub path: Option<String>,
    pub superseded: Option<String>,
    pub written: bool,
}

#[derive(Debug, Clone)]
pub struct ResumeService {
    data_dir: PathBuf,
}

impl ResumeService {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join(UPLOADS_DIR)
    }

    /// Writes a new resume, or keeps `previous` when no file was supplied.
    ///
    /// The previous file is not touched here; see [`ResumeService::discard`].
    pub async fn store(
        &self,
        filename: Option<&str>,
        data: Option<&[u8]>,
        previous: Option<&str>,
    ) -> Result<ResumeChange> {
        let filename = filename.filter(|f| !f.is_empty());
        let (Some(filename), Some(data)) = (filename, data.filter(|d| !d.is_empty())) else {
            return Ok(ResumeChange {
                path: previous.map(str::to_string),
                superseded: None,
                written: false,
            });
        };

        let uploads = self.uploads_dir();
        fs::create_dir_all(&uploads).await?;

        let target_name = format!(
            "{}_{}",
            time::upload_stamp(time::now()),
            sanitize_filename(filename)
        );
        let target = uploads.join(&target_name);

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create resume file {:?}: {}", target, e);
                Error::Io(e)
            })?;
        file.write_all(data).await?;
        file.sync_all().await?;

        let reference = format!("{}/{}", UPLOADS_DIR, target_name);
        let superseded = previous
            .filter(|p| !p.is_empty() && *p != reference)
            .map(str::to_string);

        Ok(ResumeChange {
            path: Some(reference),
            superseded,
            written: true,
        })
    }

    /// Best-effort removal of a stored resume. Only files that resolve inside
    /// the uploads root are removed; failures are logged and swallowed.
    pub async fn discard(&self, reference: &str) {
        let Ok(root) = fs::canonicalize(self.uploads_dir()).await else {
            return;
        };
        let Ok(resolved) = fs::canonicalize(self.data_dir.join(reference)).await else {
            return;
        };
        if !resolved.starts_with(&root) || resolved == root {
            tracing::warn!("Refusing to remove resume outside uploads: {}", reference);
            return;
        }
        if let Err(e) = fs::remove_file(&resolved).await {
            tracing::warn!("Failed to remove superseded resume {:?}: {}", resolved, e);
        }
    }

    /// Absolute location of a stored reference, if it stays under the data dir.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let relative = Path::new(reference);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if reference.is_empty() || !contained {
            return None;
        }
        Some(self.data_dir.join(relative))
    }
}

/// Keeps the final path component and maps anything outside
/// `[A-Za-z0-9._-]` to `_`.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned = filename.trim().replace('\0', "");
    let name = cleaned.rsplit(['/', '\\']).next().unwrap_or_default();
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        sanitized
    }
}
