use crate::error::RequestError;
use std::io;
use std::path::PathBuf;

/// Checks that `file_path` names a readable, non-empty regular file.
pub(crate) async fn validate_capture_file(file_path: &str) -> Result<PathBuf, RequestError> {
    if file_path.trim().is_empty() {
        return Err(RequestError::validation("file_path is required"));
    }
    let path = PathBuf::from(file_path);
    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(RequestError::validation(format!(
                "capture file not found: {}",
                path.display()
            )));
        }
        Err(err) => {
            return Err(RequestError::resource(format!(
                "cannot access {}: {err}",
                path.display()
            )));
        }
    };
    if !metadata.is_file() {
        return Err(RequestError::validation(format!(
            "not a regular file: {}",
            path.display()
        )));
    }
    if metadata.len() == 0 {
        return Err(RequestError::validation(format!(
            "capture file is empty: {}",
            path.display()
        )));
    }
    tokio::fs::File::open(&path).await.map_err(|err| {
        RequestError::resource(format!("cannot read {}: {err}", path.display()))
    })?;
    Ok(path)
}
