use protocol::InterfaceDescriptor;
use std::time::Duration;
use system_utils::ProcessInvocation;

pub(crate) fn list_invocation(program: &str, timeout: Duration) -> ProcessInvocation {
    ProcessInvocation::new(program, timeout).arg("-D")
}

/// Parses interface listing lines of the form `1. en0 (Wi-Fi)`.
///
/// The index is kept verbatim; some platforms report non-numeric ids.
pub fn parse_interface_list(stdout: &str) -> Vec<InterfaceDescriptor> {
    stdout.lines().filter_map(parse_interface_line).collect()
}

fn parse_interface_line(line: &str) -> Option<InterfaceDescriptor> {
    let (index, name) = line.trim().split_once(' ')?;
    let index = index.trim_end_matches('.');
    let name = name.trim();
    if index.is_empty() || name.is_empty() {
        return None;
    }
    Some(InterfaceDescriptor {
        index: index.to_string(),
        interface: name.to_string(),
    })
}
