use crate::error::RequestError;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Directory that receives captures for which the caller gave no path.
///
/// Names combine a millisecond timestamp with a random v4 uuid, so parallel
/// captures never share a file and no counter needs to be shared.
#[derive(Debug, Clone)]
pub(crate) struct ScratchArea {
    root: PathBuf,
}

impl ScratchArea {
    pub(crate) fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) async fn ensure(&self) -> Result<(), RequestError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|err| {
            RequestError::resource(format!(
                "failed to create scratch directory {}: {err}",
                self.root.display()
            ))
        })
    }

    pub(crate) async fn allocate(&self) -> Result<PathBuf, RequestError> {
        self.ensure().await?;
        Ok(self.root.join(capture_file_name()))
    }
}

fn capture_file_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("capture-{millis}-{}.pcapng", Uuid::new_v4().simple())
}
