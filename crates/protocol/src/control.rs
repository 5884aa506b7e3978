use crate::{
    AnalysisRequest, CaptureRequest, HealthReport, InterfaceDescriptor, OperationResponse,
    Prompt, ReadRequest,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ToolRequest {
    CheckInstallation,
    ListInterfaces,
    CapturePackets(CaptureRequest),
    ReadCapture(ReadRequest),
    Analyze(AnalysisRequest),
    HealthCheck,
    ListPrompts,
    GetPrompt { prompt_id: String },
}

impl ToolRequest {
    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::CheckInstallation => "check_installation",
            ToolRequest::ListInterfaces => "list_interfaces",
            ToolRequest::CapturePackets(_) => "capture_packets",
            ToolRequest::ReadCapture(_) => "read_capture",
            ToolRequest::Analyze(_) => "analyze",
            ToolRequest::HealthCheck => "health_check",
            ToolRequest::ListPrompts => "list_prompts",
            ToolRequest::GetPrompt { .. } => "get_prompt",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolResponse {
    Installation {
        installed: bool,
    },
    Interfaces {
        interfaces: Vec<InterfaceDescriptor>,
    },
    Operation(OperationResponse),
    Health(HealthReport),
    Prompts {
        prompts: Vec<Prompt>,
    },
    Prompt {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prompt: Option<Prompt>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Error {
        message: String,
    },
}
