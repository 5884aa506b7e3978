use std::time::Duration;
use system_utils::ProcessInvocation;

pub(crate) fn version_invocation(program: &str, timeout: Duration) -> ProcessInvocation {
    ProcessInvocation::new(program, timeout).arg("--version")
}

/// First line of `--version` output, e.g. `TShark (Wireshark) 4.2.2.`
pub(crate) fn version_banner(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_query_uses_single_flag() {
        let invocation = version_invocation("tshark", Duration::from_secs(5));
        assert_eq!(invocation.argv(), &["--version"]);
        assert_eq!(invocation.max_duration(), Duration::from_secs(5));
    }

    #[test]
    fn banner_skips_leading_blank_lines() {
        let stdout = "\n  TShark (Wireshark) 4.2.2.\n\nCopyright 1998-2024\n";
        assert_eq!(version_banner(stdout), Some("TShark (Wireshark) 4.2.2."));
        assert_eq!(version_banner(""), None);
    }
}
