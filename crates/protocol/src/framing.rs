/// Upper bound for a single JSON line on the daemon socket.
///
/// Read results can carry large toolchain output, so the limit is well above
/// the default `LinesCodec` behaviour. Client and server must agree on it.
pub const MAX_LINE_LENGTH: usize = 64 * 1024 * 1024;
