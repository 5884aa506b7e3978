use clap::Parser;
use protocol::DEFAULT_LISTEN_ADDR;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sharkd",
    version,
    about = "Packet capture and analysis daemon driving the tshark toolchain"
)]
pub(crate) struct Args {
    /// TOML engine config; built-in defaults are used when omitted.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    pub(crate) listen_addr: String,
    /// Directory for JSON log files; logs go to stderr only when omitted.
    #[arg(long)]
    pub(crate) log_dir: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    pub(crate) log_to_stderr: bool,
    /// Overrides `toolchain.program` from the config.
    #[arg(long)]
    pub(crate) program: Option<String>,
    /// Overrides `capture.scratch_dir` from the config.
    #[arg(long)]
    pub(crate) scratch_dir: Option<String>,
}
