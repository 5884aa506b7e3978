use std::path::PathBuf;

/// Expands a leading `~` or `~/` to `$HOME`. Other forms are returned as-is.
pub fn expand_tilde(path: &str) -> PathBuf {
    let home = || std::env::var_os("HOME").map(PathBuf::from);
    let expanded = match path.strip_prefix('~') {
        Some("") => home(),
        Some(rest) => rest
            .strip_prefix('/')
            .and_then(|rest| home().map(|home| home.join(rest))),
        None => None,
    };
    expanded.unwrap_or_else(|| PathBuf::from(path))
}
