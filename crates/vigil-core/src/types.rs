use serde::{Deserialize, Serialize};

/// Literal sentinel the agent embeds mid-stream when it wants authorization.
/// May straddle chunk boundaries, so detection always scans the accumulated
/// buffer, never a single chunk.
pub const APPROVAL_MARKER: &str = "[AWAITING_APPROVAL]";

/// Connection count above which the system is considered critical.
pub const CRITICAL_CONNECTIONS: u64 = 1000;

/// Server-owned lifecycle of an approval request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    /// Written by the backend after it has run an approved action.
    Executed,
}

/// One action the agent proposed and is waiting on a human for.
/// Observed client-side only through polling; the client never mutates
/// `status` locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalRequest {
    pub id: String,
    /// Kind of action, e.g. "run_terminal_command" or "execute_script".
    pub tool: String,
    pub description: String,
    pub status: ApprovalStatus,
    /// Inspectable payload, present only for tool kinds that support
    /// review-before-run (scripts).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ApprovalRequest {
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }

    /// Whether this request carries a payload the operator can review and
    /// edit before approval.
    pub fn is_reviewable(&self) -> bool {
        self.content.is_some()
    }
}

/// Envelope returned by `GET /approvals`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalsEnvelope {
    pub requests: Vec<ApprovalRequest>,
}

/// Alert severity derived from a status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Nominal,
    Critical,
}

/// Point-in-time metrics from `GET /system-status`. Consumed only to
/// classify severity; extra server fields are carried opaquely.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SystemStatus {
    #[serde(default)]
    pub active_connections: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SystemStatus {
    pub fn severity(&self) -> Severity {
        if self.active_connections > CRITICAL_CONNECTIONS {
            Severity::Critical
        } else {
            Severity::Nominal
        }
    }
}
