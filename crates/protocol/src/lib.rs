use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod control;
pub mod framing;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3001";
pub const DEFAULT_CAPTURE_DURATION_SECS: i64 = 10;
pub const DEFAULT_READ_LIMIT: i64 = 100;

/// Closed set of statistics the toolchain can compute over a capture file.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    Conversations,
    Endpoints,
    Protocols,
    Http,
    Dns,
}

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 5] = [
        AnalysisMode::Conversations,
        AnalysisMode::Endpoints,
        AnalysisMode::Protocols,
        AnalysisMode::Http,
        AnalysisMode::Dns,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Conversations => "conversations",
            AnalysisMode::Endpoints => "endpoints",
            AnalysisMode::Protocols => "protocols",
            AnalysisMode::Http => "http",
            AnalysisMode::Dns => "dns",
        }
    }

    /// Argument for the toolchain's `-z` statistics switch.
    pub fn statistic(&self) -> &'static str {
        match self {
            AnalysisMode::Conversations => "conv,ip",
            AnalysisMode::Endpoints => "endpoints,ip",
            AnalysisMode::Protocols => "io,phs",
            AnalysisMode::Http => "http,tree",
            AnalysisMode::Dns => "dns,tree",
        }
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAnalysisMode(pub String);

impl fmt::Display for UnknownAnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let supported: Vec<&str> = AnalysisMode::ALL.iter().map(|mode| mode.as_str()).collect();
        write!(
            f,
            "unsupported analysis type: {} (supported: {})",
            self.0,
            supported.join(", ")
        )
    }
}

impl std::error::Error for UnknownAnalysisMode {}

impl FromStr for AnalysisMode {
    type Err = UnknownAnalysisMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AnalysisMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == value.trim())
            .ok_or_else(|| UnknownAnalysisMode(value.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CaptureRequest {
    pub interface: String,
    #[serde(default = "default_capture_duration")]
    pub duration: i64,
    #[serde(default, alias = "filter_str")]
    pub filter: Option<String>,
    #[serde(default)]
    pub output_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadRequest {
    pub file_path: String,
    #[serde(default, alias = "filter_str")]
    pub filter: Option<String>,
    #[serde(default = "default_read_limit")]
    pub limit: i64,
}

/// `analysis_type` stays a raw string on the wire so an unknown mode is
/// reported as a rejected request rather than a decode failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub file_path: String,
    pub analysis_type: String,
}

fn default_capture_duration() -> i64 {
    DEFAULT_CAPTURE_DURATION_SECS
}

fn default_read_limit() -> i64 {
    DEFAULT_READ_LIMIT
}

/// Uniform result of capture, read and analyze.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperationResponse {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResponse {
    pub fn rejected(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            success: false,
            stdout: String::new(),
            stderr: message.clone(),
            exit_code: None,
            timed_out: false,
            output_file: None,
            error: Some(message),
        }
    }

    pub fn with_output_file(mut self, output_file: impl Into<String>) -> Self {
        self.output_file = Some(output_file.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstallationStatus {
    pub installed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub index: String,
    pub interface: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub toolchain_installed: bool,
    pub interface_count: usize,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prompt {
    pub id: String,
    pub text: String,
}
