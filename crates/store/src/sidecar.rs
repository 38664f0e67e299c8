use crate::error::{Result, StoreError};
use buildlens_protocol::{PortInfo, PORT_INFO_FILE_NAME};
use std::path::{Path, PathBuf};

#[must_use]
pub fn port_info_path(output_dir: &Path) -> PathBuf {
    output_dir.join(PORT_INFO_FILE_NAME)
}

pub async fn write_port_info(output_dir: &Path, port: Option<u16>) -> Result<()> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(StoreError::io(output_dir))?;

    let path = port_info_path(output_dir);
    let bytes =
        serde_json::to_vec_pretty(&PortInfo { port }).map_err(StoreError::json(&path))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(StoreError::io(&tmp))?;
    tokio::fs::rename(&tmp, &path)
        .await
        .map_err(StoreError::io(&path))?;
    Ok(())
}

/// Reads the sidecar. A missing file reads as "no server".
pub async fn read_port_info(output_dir: &Path) -> Result<PortInfo> {
    let path = port_info_path(output_dir);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(PortInfo::default()),
        Err(err) => return Err(StoreError::io(&path)(err)),
    };
    serde_json::from_slice(&bytes).map_err(StoreError::json(&path))
}

/// Creates the sidecar with `{"port": null}` unless one already exists.
pub async fn ensure_port_info(output_dir: &Path) -> Result<()> {
    if tokio::fs::try_exists(port_info_path(output_dir))
        .await
        .unwrap_or(false)
    {
        return Ok(());
    }
    write_port_info(output_dir, None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_sidecar_reads_as_no_port() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(read_port_info(tmp.path()).await.unwrap(), PortInfo::default());
    }

    #[tokio::test]
    async fn ensure_does_not_overwrite_a_recorded_port() {
        let tmp = TempDir::new().unwrap();
        write_port_info(tmp.path(), Some(5003)).await.unwrap();
        ensure_port_info(tmp.path()).await.unwrap();
        assert_eq!(read_port_info(tmp.path()).await.unwrap().port, Some(5003));
    }

    #[tokio::test]
    async fn ensure_writes_null_port_when_absent() {
        let tmp = TempDir::new().unwrap();
        ensure_port_info(tmp.path()).await.unwrap();
        let raw = std::fs::read_to_string(port_info_path(tmp.path())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({ "port": null }));
    }
}
