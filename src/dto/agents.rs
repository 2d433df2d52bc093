use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AgentAvailability {
    Available,
    Busy,
    Break,
    Offline,
}

impl AgentAvailability {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentAvailability::Available => "available",
            AgentAvailability::Busy => "busy",
            AgentAvailability::Break => "break",
            AgentAvailability::Offline => "offline",
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetAgentStatusRequest {
    pub status: AgentAvailability,
}
