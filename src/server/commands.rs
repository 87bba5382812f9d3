//! Commands pushed to the forwarding agents over their WebSocket session.
//!
//! Every frame is a JSON object `{"type": <kind>, "data": <payload>, "requestId": <uuid>}`.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PauseServicePayload {
    pub services: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeSpec {
    #[serde(rename = "type")]
    pub kind: String,
}

impl TypeSpec {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardTarget {
    pub name: String,
    pub addr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwarderSpec {
    pub nodes: Vec<ForwardTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObserverPlugin {
    #[serde(rename = "type")]
    pub kind: String,
    pub addr: String,
}

/// Definition of the traffic observer the agent attaches to a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObserverSpec {
    pub name: String,
    pub plugin: ObserverPlugin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceMetadata {
    pub interface: String,
}

/// A full port-forward entry service as upserted by `AddService`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub addr: String,
    pub handler: TypeSpec,
    pub listener: TypeSpec,
    pub forwarder: ForwarderSpec,
    pub observer: String,
    #[serde(rename = "_observers")]
    pub observers: Vec<ObserverSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ServiceMetadata>,
}

/// Observer-only patch for an existing service, sent with `UpdateService`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObserverPatch {
    pub name: String,
    pub observer: String,
    #[serde(rename = "_observers")]
    pub observers: Vec<ObserverSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCommand {
    PauseService(PauseServicePayload),
    AddService(Vec<ServiceDescriptor>),
    UpdateService(Vec<ObserverPatch>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: serde_json::Value,
    pub request_id: String,
}

impl AgentCommand {
    pub fn pause_service(name: String) -> Self {
        AgentCommand::PauseService(PauseServicePayload {
            services: vec![name],
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AgentCommand::PauseService(_) => "PauseService",
            AgentCommand::AddService(_) => "AddService",
            AgentCommand::UpdateService(_) => "UpdateService",
        }
    }

    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            AgentCommand::PauseService(p) => serde_json::to_value(p),
            AgentCommand::AddService(services) => serde_json::to_value(services),
            AgentCommand::UpdateService(patches) => serde_json::to_value(patches),
        }
    }

    pub fn to_envelope(&self) -> Result<CommandEnvelope, serde_json::Error> {
        Ok(CommandEnvelope {
            kind: self.kind(),
            data: self.payload()?,
            request_id: Uuid::new_v4().to_string(),
        })
    }

    /// Encodes the command as a WebSocket text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.to_envelope()?)
    }
}
