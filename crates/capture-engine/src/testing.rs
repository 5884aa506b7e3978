use std::path::{Path, PathBuf};
use uuid::Uuid;

pub(crate) struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub(crate) fn new() -> Self {
        let path = std::env::temp_dir().join(format!("capture-engine-test-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&path).expect("create temp dir");
        Self { path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.path.join(name);
        std::fs::write(&path, contents).expect("write file");
        path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

/// Writes an executable shell script standing in for the toolchain. The
/// script is completed under a temporary name and renamed into place, so no
/// writable handle to the final path ever exists.
#[cfg(unix)]
pub(crate) fn fake_toolchain(dir: &TempDir, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;

    let staged = dir.write("tshark.partial", format!("#!/bin/sh\n{body}\n").as_bytes());
    std::fs::set_permissions(&staged, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    let path = dir.path().join("tshark");
    std::fs::rename(&staged, &path).expect("rename script");
    path.to_string_lossy().into_owned()
}
