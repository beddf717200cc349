use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use vigil_approvals::ApprovalQueue;
use vigil_core::{ApprovalRequest, SystemStatus};
use vigil_gate::{ApprovalGate, ApproveCommand, DenyCommand};
use vigil_stream::Transcript;
use vigil_voice::{NotificationDispatcher, Speaker};

/// Side effect a key press asks the event loop to perform. Everything that
/// needs no I/O is applied to the state directly in `handle_key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    /// Start a new agent turn with this command text.
    Submit(String),
    Approve(ApproveCommand),
    Deny(DenyCommand),
}

/// In-progress edit of a reviewable script before approval.
pub struct ScriptReview {
    pub request_id: String,
    pub tool: String,
    pub buffer: String,
}

/// Console state. Owns the four state machines; the event loop feeds it
/// poll results, stream events, and key presses.
pub struct App<S: Speaker> {
    pub transcript: Transcript,
    pub queue: ApprovalQueue,
    pub gate: ApprovalGate,
    pub dispatcher: NotificationDispatcher<S>,

    pub metrics: Option<SystemStatus>,
    pub files: Vec<String>,

    pub input: String,
    pub selected: usize,
    pub review: Option<ScriptReview>,
    pub authenticated: bool,
    pub poll_error: Option<String>,
    pub should_quit: bool,
}

impl<S: Speaker> App<S> {
    pub fn new(speaker: S, muted: bool, authenticated: bool) -> Self {
        let mut dispatcher = NotificationDispatcher::new(speaker);
        dispatcher.set_muted(muted);
        Self {
            transcript: Transcript::new(),
            queue: ApprovalQueue::new(),
            gate: ApprovalGate::new(),
            dispatcher,
            metrics: None,
            files: Vec::new(),
            input: String::new(),
            selected: 0,
            review: None,
            authenticated,
            poll_error: None,
            should_quit: false,
        }
    }

    pub fn push_info(&mut self, line: impl Into<String>) {
        self.transcript.push_info(line);
    }

    /// Ingest one successful approvals poll: replace the pending set, note
    /// a growth in the transcript (the visual channel), and hand the new
    /// count to the voice dispatcher.
    pub fn ingest_poll(&mut self, requests: Vec<ApprovalRequest>) {
        let outcome = self.queue.apply_poll(requests);
        if outcome.increased {
            self.push_info("New approval request pending.");
        }
        self.dispatcher.on_poll(self.queue.len());
        self.clamp_selection();
    }

    /// Keep the selection inside the pending set after a poll shrank it.
    pub fn clamp_selection(&mut self) {
        if self.selected >= self.queue.len() {
            self.selected = self.queue.len().saturating_sub(1);
        }
    }

    /// The server rejected our token mid-session. Polling stops; streaming
    /// stays available (the backend exempts it from auth).
    pub fn on_auth_lost(&mut self) {
        self.authenticated = false;
        self.push_info("Session expired. Run `vigil login` and restart the console.");
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<UiAction> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return None;
        }
        if self.review.is_some() {
            return self.handle_review_key(key);
        }
        if self.gate.is_awaiting() {
            return self.handle_modal_key(key);
        }
        self.handle_main_key(key)
    }

    /// Keys while the blocking HIGH RISK confirmation is up. Everything
    /// else is swallowed.
    fn handle_modal_key(&mut self, key: KeyEvent) -> Option<UiAction> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                Some(UiAction::Submit(self.gate.confirm().to_string()))
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.gate.dismiss();
                None
            }
            _ => None,
        }
    }

    /// Keys while the script review overlay is open.
    fn handle_review_key(&mut self, key: KeyEvent) -> Option<UiAction> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('r') {
            let review = self.review.take()?;
            let request = self.queue.find(&review.request_id)?;
            return Some(UiAction::Approve(
                self.gate.approve(request, Some(review.buffer)),
            ));
        }
        let review = self.review.as_mut()?;
        match key.code {
            KeyCode::Esc => self.review = None,
            KeyCode::Enter => review.buffer.push('\n'),
            KeyCode::Backspace => {
                review.buffer.pop();
            }
            KeyCode::Char(c) => review.buffer.push(c),
            _ => {}
        }
        None
    }

    fn handle_main_key(&mut self, key: KeyEvent) -> Option<UiAction> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('s') => {
                    let muted = !self.dispatcher.muted();
                    self.dispatcher.set_muted(muted);
                }
                KeyCode::Char('a') => return self.approve_selected(),
                KeyCode::Char('d') => return self.deny_selected(),
                _ => {}
            }
            return None;
        }
        match key.code {
            KeyCode::Enter => {
                let command = std::mem::take(&mut self.input);
                let command = command.trim().to_string();
                if !command.is_empty() {
                    return Some(UiAction::Submit(command));
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Up => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down => {
                if self.selected + 1 < self.queue.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Char(c) => self.input.push(c),
            _ => {}
        }
        None
    }

    /// Approve the selected request. Reviewable requests open the editor
    /// overlay instead of approving immediately.
    fn approve_selected(&mut self) -> Option<UiAction> {
        let request = self.queue.get(self.selected)?;
        if request.is_reviewable() {
            self.review = Some(ScriptReview {
                request_id: request.id.clone(),
                tool: request.tool.clone(),
                buffer: request.content.clone().unwrap_or_default(),
            });
            return None;
        }
        Some(UiAction::Approve(self.gate.approve(request, None)))
    }

    fn deny_selected(&mut self) -> Option<UiAction> {
        let request = self.queue.get(self.selected)?;
        Some(UiAction::Deny(self.gate.deny(request)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::ApprovalStatus;
    use vigil_voice::CollectSpeaker;

    fn app() -> App<CollectSpeaker> {
        App::new(CollectSpeaker::new(), false, true)
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::empty())
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn request(id: &str, content: Option<&str>) -> ApprovalRequest {
        ApprovalRequest {
            id: id.into(),
            tool: if content.is_some() {
                "execute_script".into()
            } else {
                "run_terminal_command".into()
            },
            description: format!("action {id}"),
            status: ApprovalStatus::Pending,
            content: content.map(str::to_string),
        }
    }

    fn type_text(app: &mut App<CollectSpeaker>, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn typing_builds_input_and_enter_submits() {
        let mut app = app();
        type_text(&mut app, "restart gateway");
        assert_eq!(app.input, "restart gateway");
        let action = app.handle_key(key(KeyCode::Enter));
        assert_eq!(action, Some(UiAction::Submit("restart gateway".into())));
        assert!(app.input.is_empty());
    }

    #[test]
    fn blank_input_does_not_submit() {
        let mut app = app();
        type_text(&mut app, "   ");
        assert_eq!(app.handle_key(key(KeyCode::Enter)), None);
    }

    #[test]
    fn modal_confirm_submits_sentinel() {
        let mut app = app();
        app.gate.on_marker();
        let action = app.handle_key(key(KeyCode::Char('y')));
        assert_eq!(action, Some(UiAction::Submit("APPROVE".into())));
        assert!(!app.gate.is_awaiting());
    }

    #[test]
    fn modal_dismiss_closes_without_submit() {
        let mut app = app();
        app.gate.on_marker();
        assert_eq!(app.handle_key(key(KeyCode::Char('n'))), None);
        assert!(!app.gate.is_awaiting());
    }

    #[test]
    fn modal_swallows_ordinary_typing() {
        let mut app = app();
        app.gate.on_marker();
        app.handle_key(key(KeyCode::Char('x')));
        assert!(app.input.is_empty());
    }

    #[test]
    fn approve_plain_request_sends_no_content() {
        let mut app = app();
        app.queue.apply_poll(vec![request("r1", None)]);
        let action = app.handle_key(ctrl('a'));
        match action {
            Some(UiAction::Approve(cmd)) => {
                assert_eq!(cmd.id, "r1");
                assert_eq!(cmd.content, None);
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn approve_script_opens_review_overlay() {
        let mut app = app();
        app.queue.apply_poll(vec![request("r1", Some("print('fix')"))]);
        assert_eq!(app.handle_key(ctrl('a')), None);
        let review = app.review.as_ref().unwrap();
        assert_eq!(review.request_id, "r1");
        assert_eq!(review.buffer, "print('fix')");
    }

    #[test]
    fn review_edit_then_approve_sends_edited_content() {
        let mut app = app();
        app.queue.apply_poll(vec![request("r1", Some("echo "))]);
        app.handle_key(ctrl('a'));
        type_text(&mut app, "ok");
        let action = app.handle_key(ctrl('r'));
        match action {
            Some(UiAction::Approve(cmd)) => {
                assert_eq!(cmd.content.as_deref(), Some("echo ok"));
            }
            other => panic!("unexpected action: {other:?}"),
        }
        assert!(app.review.is_none());
    }

    #[test]
    fn review_escape_discards_edit() {
        let mut app = app();
        app.queue.apply_poll(vec![request("r1", Some("original"))]);
        app.handle_key(ctrl('a'));
        type_text(&mut app, "junk");
        app.handle_key(key(KeyCode::Esc));
        assert!(app.review.is_none());
        // The pending request itself is untouched.
        assert_eq!(
            app.queue.find("r1").unwrap().content.as_deref(),
            Some("original")
        );
    }

    #[test]
    fn deny_selected_request() {
        let mut app = app();
        app.queue.apply_poll(vec![request("r1", None), request("r2", None)]);
        app.handle_key(key(KeyCode::Down));
        let action = app.handle_key(ctrl('d'));
        assert_eq!(
            action,
            Some(UiAction::Deny(DenyCommand { id: "r2".into() }))
        );
    }

    #[test]
    fn selection_clamps_after_queue_shrinks() {
        let mut app = app();
        app.queue.apply_poll(vec![request("r1", None), request("r2", None)]);
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected, 1);
        app.queue.apply_poll(vec![request("r1", None)]);
        app.clamp_selection();
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn mute_toggle_via_ctrl_s() {
        let mut app = app();
        assert!(!app.dispatcher.muted());
        app.handle_key(ctrl('s'));
        assert!(app.dispatcher.muted());
        app.handle_key(ctrl('s'));
        assert!(!app.dispatcher.muted());
    }

    #[test]
    fn ctrl_c_quits_everywhere() {
        let mut app = app();
        app.gate.on_marker();
        app.handle_key(ctrl('c'));
        assert!(app.should_quit);
    }

    #[test]
    fn poll_growth_alerts_on_both_channels() {
        let collect = CollectSpeaker::new();
        let mut app = App::new(collect.clone(), false, true);
        app.ingest_poll(vec![request("r1", None)]);
        // Transcript line and spoken alert for the increase.
        assert!(app
            .transcript
            .entries()
            .iter()
            .any(|e| e.text().contains("New approval request")));
        assert_eq!(collect.spoken(), [vigil_voice::ALERT_PHRASE]);
        // Same-size and shrinking polls add nothing.
        app.ingest_poll(vec![request("r1", None)]);
        app.ingest_poll(vec![]);
        assert_eq!(app.transcript.entries().len(), 1);
        assert_eq!(collect.spoken().len(), 1);
    }

    #[test]
    fn poll_shrink_clamps_selection() {
        let mut app = app();
        app.ingest_poll(vec![request("r1", None), request("r2", None)]);
        app.handle_key(key(KeyCode::Down));
        assert_eq!(app.selected, 1);
        app.ingest_poll(vec![request("r1", None)]);
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn auth_loss_logs_and_flags() {
        let mut app = app();
        app.on_auth_lost();
        assert!(!app.authenticated);
        assert!(!app.transcript.entries().is_empty());
    }
}
