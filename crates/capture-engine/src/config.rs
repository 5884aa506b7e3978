use anyhow::Context;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use system_utils::path::expand_tilde;

pub const DEFAULT_PROGRAM: &str = "tshark";
pub const DEFAULT_SCRATCH_DIR: &str = "~/.sharkline/captures";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub program: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    #[serde(deserialize_with = "deserialize_duration")]
    pub probe_timeout: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub list_timeout: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub read_timeout: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub analyze_timeout: Duration,
    /// Slack added to the requested capture duration before the runner
    /// forcibly stops the capture process.
    #[serde(deserialize_with = "deserialize_duration")]
    pub capture_overrun: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub terminate_grace: Duration,
    pub max_output_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(5),
            list_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            analyze_timeout: Duration::from_secs(120),
            capture_overrun: Duration::from_secs(5),
            terminate_grace: Duration::from_secs(2),
            max_output_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub scratch_dir: String,
}

impl CaptureConfig {
    pub fn scratch_path(&self) -> PathBuf {
        expand_tilde(&self.scratch_dir)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            scratch_dir: DEFAULT_SCRATCH_DIR.to_string(),
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}
