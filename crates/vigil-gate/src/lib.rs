//! The approval gate: single authority for whether a blocking confirmation
//! is currently visible, and the dispatcher for operator decisions.
//!
//! Approval is dual-path by backend design. Queue-entry approvals go
//! through the approvals endpoints; confirming the marker-triggered
//! generic modal sends the literal command `APPROVE` back into the
//! conversational stream as a new turn, and the remote agent correlates
//! it with the action it proposed. Do not unify these paths.

use tracing::info;

use vigil_core::{ApprovalRequest, Severity, SystemStatus};

/// Sentinel command for the conversational approval path.
pub const APPROVE_SENTINEL: &str = "APPROVE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    AwaitingConfirmation,
}

/// Outcome of a deep-linked incident review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// The snapshot confirms the incident is live; confirmation is shown.
    ConfirmationRequired,
    /// The incident is already resolved; no confirmation, log a line.
    AlreadyResolved,
}

/// Command data for `POST /approvals/{id}/approve`. `content` becomes the
/// JSON body; `None` means no body at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveCommand {
    pub id: String,
    pub content: Option<String>,
}

/// Command data for `POST /approvals/{id}/deny`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenyCommand {
    pub id: String,
}

/// Gate state machine: `Idle -> AwaitingConfirmation -> Idle`. Re-entry
/// while already awaiting is a no-op; dismissal is not erased by further
/// stream chunks (the stream latches its marker per session).
#[derive(Debug)]
pub struct ApprovalGate {
    state: GateState,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ApprovalGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Idle,
        }
    }

    pub fn is_awaiting(&self) -> bool {
        self.state == GateState::AwaitingConfirmation
    }

    /// Trigger (a): the stream detected the approval marker mid-turn.
    /// Returns true if the confirmation was newly opened.
    pub fn on_marker(&mut self) -> bool {
        self.open()
    }

    /// Trigger (b): a deep link asked for an incident review. The live
    /// snapshot is checked first; a resolved incident shows nothing.
    pub fn review_incident(&mut self, snapshot: &SystemStatus) -> ReviewOutcome {
        match snapshot.severity() {
            Severity::Critical => {
                self.open();
                ReviewOutcome::ConfirmationRequired
            }
            Severity::Nominal => {
                info!(
                    active_connections = snapshot.active_connections,
                    "incident review: already resolved"
                );
                ReviewOutcome::AlreadyResolved
            }
        }
    }

    /// Operator dismissed the confirmation without approving.
    pub fn dismiss(&mut self) {
        self.state = GateState::Idle;
    }

    /// Operator confirmed the generic modal. Closes the gate and returns
    /// the sentinel to send as a new conversational turn.
    pub fn confirm(&mut self) -> &'static str {
        self.state = GateState::Idle;
        APPROVE_SENTINEL
    }

    /// Build the approve command for a queue entry. Requests carrying
    /// inspectable content submit the edited content (falling back to the
    /// original proposal); all others send no body. The gate never removes
    /// the request locally; the next poll is truth.
    pub fn approve(&self, request: &ApprovalRequest, edited: Option<String>) -> ApproveCommand {
        let content = if request.is_reviewable() {
            edited.or_else(|| request.content.clone())
        } else {
            None
        };
        ApproveCommand {
            id: request.id.clone(),
            content,
        }
    }

    pub fn deny(&self, request: &ApprovalRequest) -> DenyCommand {
        DenyCommand {
            id: request.id.clone(),
        }
    }

    fn open(&mut self) -> bool {
        if self.is_awaiting() {
            return false;
        }
        self.state = GateState::AwaitingConfirmation;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::ApprovalStatus;

    fn snapshot(active_connections: u64) -> SystemStatus {
        SystemStatus {
            active_connections,
            extra: Default::default(),
        }
    }

    fn script_request(content: &str) -> ApprovalRequest {
        ApprovalRequest {
            id: "req-1".into(),
            tool: "execute_script".into(),
            description: "proposed fix".into(),
            status: ApprovalStatus::Pending,
            content: Some(content.into()),
        }
    }

    fn command_request() -> ApprovalRequest {
        ApprovalRequest {
            id: "req-2".into(),
            tool: "run_terminal_command".into(),
            description: "restart gateway".into(),
            status: ApprovalStatus::Pending,
            content: None,
        }
    }

    #[test]
    fn marker_opens_once() {
        let mut gate = ApprovalGate::new();
        assert!(gate.on_marker());
        assert!(gate.is_awaiting());
        // Re-entry while awaiting is a no-op.
        assert!(!gate.on_marker());
        assert!(gate.is_awaiting());
    }

    #[test]
    fn dismiss_returns_to_idle() {
        let mut gate = ApprovalGate::new();
        gate.on_marker();
        gate.dismiss();
        assert!(!gate.is_awaiting());
        // A later trigger can open it again.
        assert!(gate.on_marker());
    }

    #[test]
    fn confirm_closes_and_yields_sentinel() {
        let mut gate = ApprovalGate::new();
        gate.on_marker();
        assert_eq!(gate.confirm(), "APPROVE");
        assert!(!gate.is_awaiting());
    }

    #[test]
    fn review_shows_confirmation_when_still_critical() {
        let mut gate = ApprovalGate::new();
        assert_eq!(
            gate.review_incident(&snapshot(1200)),
            ReviewOutcome::ConfirmationRequired
        );
        assert!(gate.is_awaiting());
    }

    #[test]
    fn review_skips_confirmation_when_resolved() {
        let mut gate = ApprovalGate::new();
        assert_eq!(
            gate.review_incident(&snapshot(50)),
            ReviewOutcome::AlreadyResolved
        );
        assert!(!gate.is_awaiting());
    }

    #[test]
    fn script_approval_sends_edited_content() {
        let gate = ApprovalGate::new();
        let req = script_request("print('original')");
        let cmd = gate.approve(&req, Some("print('edited')".into()));
        assert_eq!(cmd.content.as_deref(), Some("print('edited')"));
    }

    #[test]
    fn script_approval_without_edit_sends_proposal() {
        let gate = ApprovalGate::new();
        let req = script_request("print('original')");
        let cmd = gate.approve(&req, None);
        assert_eq!(cmd.content.as_deref(), Some("print('original')"));
    }

    #[test]
    fn non_script_approval_sends_no_body() {
        let gate = ApprovalGate::new();
        let req = command_request();
        // Even a stray edit is ignored for non-reviewable requests.
        let cmd = gate.approve(&req, Some("ignored".into()));
        assert_eq!(cmd.content, None);
        assert_eq!(cmd.id, "req-2");
    }
}
