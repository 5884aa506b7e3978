pub mod path;
pub mod process;
mod stream;

pub use process::{ProcessInvocation, ProcessResult, ProcessRunner};
