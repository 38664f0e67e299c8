use crate::error::{Result, StoreError};
use buildlens_protocol::{Report, PORT_INFO_FILE_NAME, REPORT_FILE_NAME};
use std::path::{Path, PathBuf};

/// Output directory holding the latest report, the port sidecar and the dashboard.
#[derive(Debug, Clone)]
pub struct ReportStore {
    output_dir: PathBuf,
}

impl ReportStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE_NAME)
    }

    /// Replaces the output directory contents with `report`.
    ///
    /// Stale files from earlier cycles are removed first; only the port sidecar
    /// survives. The report itself is written to a temporary sibling and renamed
    /// into place, so readers see either the previous or the new report in full.
    pub async fn publish(&self, report: &Report) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(StoreError::io(&self.output_dir))?;

        let removed = self.clean().await?;
        if removed > 0 {
            log::debug!(
                "Removed {removed} stale file(s) from {}",
                self.output_dir.display()
            );
        }

        let path = self.report_path();
        let bytes = serde_json::to_vec_pretty(report).map_err(StoreError::json(&path))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(StoreError::io(&tmp))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(StoreError::io(&path))?;

        log::info!(
            "Report written to {} ({} error(s), {} warning(s))",
            path.display(),
            report.error_count(),
            report.warning_count()
        );
        Ok(path)
    }

    /// Deletes every regular file in the output directory except the port
    /// sidecar and the live report, which is replaced by rename instead.
    pub async fn clean(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.output_dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(StoreError::io(&self.output_dir)(err)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(StoreError::io(&self.output_dir))?
        {
            let name = entry.file_name();
            let keep = name == PORT_INFO_FILE_NAME || name == REPORT_FILE_NAME;
            if keep {
                continue;
            }
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(StoreError::io(&path))?;
            if file_type.is_dir() {
                log::debug!("Skipping directory {} during cleanup", path.display());
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(StoreError::io(&path)(err)),
            }
        }
        Ok(removed)
    }

    /// Raw bytes of the current report, `None` before the first publish.
    pub async fn current_bytes(&self) -> Result<Option<Vec<u8>>> {
        let path = self.report_path();
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StoreError::io(&path)(err)),
        }
    }

    pub async fn current(&self) -> Result<Option<Report>> {
        let Some(bytes) = self.current_bytes().await? else {
            return Ok(None);
        };
        let report = serde_json::from_slice(&bytes).map_err(StoreError::json(&self.report_path()))?;
        Ok(Some(report))
    }
}
