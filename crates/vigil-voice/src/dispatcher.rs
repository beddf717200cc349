use std::time::{Duration, Instant};

use tracing::debug;

use vigil_core::APPROVAL_MARKER;

use crate::speaker::Speaker;

/// Fixed phrase for the approval-delta signal. Repeats on every distinct
/// increase, so it deliberately bypasses the last-spoken dedupe.
pub const ALERT_PHRASE: &str = "Attention commander. A critical action requires your approval.";

/// Debounce window after the last chunk before a message counts as settled.
/// Speaking earlier produces an audibly truncated utterance.
pub const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// A settled-message utterance waiting for its debounce deadline.
#[derive(Debug)]
struct PendingSpeech {
    text: String,
    due: Instant,
}

/// Converts two independently-timed signals (pending-count increases and
/// settling agent messages) into at most one utterance per logical event.
/// Owns the mute flag, the delta baseline, and the last spoken text; reads
/// everything else.
pub struct NotificationDispatcher<S: Speaker> {
    speaker: S,
    muted: bool,
    /// Pending count observed at the last poll; baseline for delta
    /// detection. Updated even while muted so unmuting never produces a
    /// missed or duplicated trigger.
    baseline: usize,
    /// Last settled text actually spoken, to avoid re-speaking identical
    /// content.
    last_spoken: Option<String>,
    pending: Option<PendingSpeech>,
}

impl<S: Speaker> NotificationDispatcher<S> {
    pub fn new(speaker: S) -> Self {
        Self {
            speaker,
            muted: false,
            baseline: 0,
            last_spoken: None,
            pending: None,
        }
    }

    /// Approval-delta signal: speak the alert phrase iff the count strictly
    /// increased since the previous poll.
    pub fn on_poll(&mut self, pending_count: usize) {
        let increased = pending_count > self.baseline;
        self.baseline = pending_count;
        if !increased {
            return;
        }
        debug!(pending_count, "pending set grew; voice alert");
        if !self.muted {
            self.speak_now(ALERT_PHRASE.to_string());
        }
    }

    /// Settled-message signal: (re)start the debounce timer with the full
    /// accumulated text. Text containing the approval marker is never read
    /// aloud; the modal path handles it.
    pub fn on_chunk(&mut self, accumulated: &str, now: Instant) {
        if accumulated.contains(APPROVAL_MARKER) {
            self.pending = None;
            return;
        }
        self.pending = Some(PendingSpeech {
            text: accumulated.to_string(),
            due: now + SETTLE_DELAY,
        });
    }

    /// Deadline the runtime should wake at, if a settled message is queued.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Fire the settled-message speech if its deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        if !matches!(&self.pending, Some(p) if p.due <= now) {
            return;
        }
        let Some(pending) = self.pending.take() else {
            return;
        };
        if self.muted {
            return;
        }
        if self.last_spoken.as_deref() == Some(pending.text.as_str()) {
            return;
        }
        self.last_spoken = Some(pending.text.clone());
        self.speak_now(pending.text);
    }

    /// Mute cancels in-flight speech immediately and suppresses future
    /// utterances; delta tracking continues unaffected.
    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if muted {
            self.pending = None;
            self.speaker.cancel();
        }
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Cancel in-flight speech and any scheduled settled message without
    /// muting. Called when a new turn supersedes the session the text came
    /// from, and on shutdown.
    pub fn interrupt(&mut self) {
        self.pending = None;
        self.speaker.cancel();
    }

    fn speak_now(&mut self, text: String) {
        // New speech always preempts; the speaking resource is exclusive.
        self.speaker.cancel();
        self.speaker.speak(&text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speaker::CollectSpeaker;

    fn dispatcher() -> (NotificationDispatcher<CollectSpeaker>, CollectSpeaker) {
        let collect = CollectSpeaker::new();
        (NotificationDispatcher::new(collect.clone()), collect)
    }

    #[test]
    fn alert_fires_once_per_increase() {
        let (mut d, spoken) = dispatcher();
        // Sizes [0,1,1,0,2]: triggers at 0→1 and 0→2 only.
        for count in [0usize, 1, 1, 0, 2] {
            d.on_poll(count);
        }
        assert_eq!(spoken.spoken(), [ALERT_PHRASE, ALERT_PHRASE]);
    }

    #[test]
    fn mute_suppresses_speech_but_tracks_baseline() {
        let (mut d, spoken) = dispatcher();
        d.set_muted(true);
        d.on_poll(1); // increase while muted: recorded, not spoken
        assert!(spoken.spoken().is_empty());

        d.set_muted(false);
        d.on_poll(1); // unchanged since baseline: no late trigger
        assert!(spoken.spoken().is_empty());

        d.on_poll(2); // genuine new increase speaks
        assert_eq!(spoken.spoken(), [ALERT_PHRASE]);
    }

    #[test]
    fn mute_cancels_in_flight_speech() {
        let (mut d, spoken) = dispatcher();
        d.on_poll(1);
        let cancels_before = spoken.cancel_count();
        d.set_muted(true);
        assert!(spoken.cancel_count() > cancels_before);
    }

    #[test]
    fn debounce_restarts_on_every_chunk() {
        let (mut d, spoken) = dispatcher();
        let t0 = Instant::now();
        // Chunks at t=0, 0.3, 0.6 → speech only at t=1.6 with full text.
        d.on_chunk("All systems", t0);
        d.on_chunk("All systems are", t0 + Duration::from_millis(300));
        d.on_chunk("All systems are nominal.", t0 + Duration::from_millis(600));

        d.tick(t0 + Duration::from_millis(1000));
        assert!(spoken.spoken().is_empty(), "spoke before settle");
        d.tick(t0 + Duration::from_millis(1300));
        assert!(spoken.spoken().is_empty(), "spoke before settle");
        d.tick(t0 + Duration::from_millis(1600));
        assert_eq!(spoken.spoken(), ["All systems are nominal."]);
    }

    #[test]
    fn marker_text_is_never_read_aloud() {
        let (mut d, spoken) = dispatcher();
        let t0 = Instant::now();
        d.on_chunk("Requesting [AWAITING_APPROVAL] now", t0);
        assert_eq!(d.next_deadline(), None);
        d.tick(t0 + Duration::from_secs(5));
        assert!(spoken.spoken().is_empty());
    }

    #[test]
    fn marker_arriving_late_cancels_scheduled_speech() {
        let (mut d, spoken) = dispatcher();
        let t0 = Instant::now();
        d.on_chunk("I will need permission [AWAIT", t0);
        d.on_chunk(
            "I will need permission [AWAITING_APPROVAL]",
            t0 + Duration::from_millis(200),
        );
        d.tick(t0 + Duration::from_secs(5));
        assert!(spoken.spoken().is_empty());
    }

    #[test]
    fn interrupt_drops_scheduled_settled_speech() {
        let (mut d, spoken) = dispatcher();
        let t0 = Instant::now();
        // A new turn supersedes the session mid-stream; its partial text
        // must never be spoken at the old deadline.
        d.on_chunk("Checking the payment gat", t0);
        d.interrupt();
        assert_eq!(d.next_deadline(), None);
        d.tick(t0 + Duration::from_secs(2));
        assert!(spoken.spoken().is_empty());
    }

    #[test]
    fn identical_settled_text_not_respoken() {
        let (mut d, spoken) = dispatcher();
        let t0 = Instant::now();
        d.on_chunk("done.", t0);
        d.tick(t0 + Duration::from_secs(2));
        d.on_chunk("done.", t0 + Duration::from_secs(3));
        d.tick(t0 + Duration::from_secs(5));
        assert_eq!(spoken.spoken(), ["done."]);
    }

    #[test]
    fn alert_phrase_repeats_despite_dedupe() {
        let (mut d, spoken) = dispatcher();
        d.on_poll(1);
        d.on_poll(0);
        d.on_poll(1);
        assert_eq!(spoken.spoken().len(), 2);
    }

    #[test]
    fn settled_speech_skipped_while_muted() {
        let (mut d, spoken) = dispatcher();
        let t0 = Instant::now();
        d.on_chunk("quiet please", t0);
        d.set_muted(true);
        d.tick(t0 + Duration::from_secs(2));
        assert!(spoken.spoken().is_empty());
    }

    #[test]
    fn new_speech_preempts_previous() {
        let (mut d, spoken) = dispatcher();
        d.on_poll(1);
        d.on_poll(2);
        // Each utterance cancels the previous before starting.
        assert!(spoken.cancel_count() >= 2);
        assert_eq!(spoken.spoken().len(), 2);
    }

    #[test]
    fn deadline_tracks_latest_chunk() {
        let (mut d, _) = dispatcher();
        let t0 = Instant::now();
        d.on_chunk("a", t0);
        let first = d.next_deadline().unwrap();
        d.on_chunk("ab", t0 + Duration::from_millis(500));
        let second = d.next_deadline().unwrap();
        assert!(second > first);
    }
}
