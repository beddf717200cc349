use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

/// Speech output capability. The single "currently speaking" resource is
/// exclusive: `speak` preempts any in-flight utterance; there is no queue.
/// Implementations are best-effort and must never block or error the rest
/// of the system.
pub trait Speaker {
    fn speak(&mut self, text: &str);
    fn cancel(&mut self);

    /// Speech recognition capability stub. Platforms without it return
    /// None; the console treats that as "no voice input".
    fn listen(&mut self) -> Option<String> {
        None
    }
}

/// Voices the original console prefers, in priority order.
const PREFERRED_VOICES: &[&str] = &["Google US English", "Daniel"];

/// Pick a voice from the platform list: first preferred match, else the
/// first voice at all, else None (speech is skipped without error).
pub fn select_voice(voices: &[String]) -> Option<String> {
    for preferred in PREFERRED_VOICES {
        if let Some(v) = voices.iter().find(|v| v.contains(preferred)) {
            return Some(v.clone());
        }
    }
    voices.first().cloned()
}

// ── Null fallback ──

/// Degraded mode for environments without any speech engine.
#[derive(Debug, Default)]
pub struct NullSpeaker;

impl Speaker for NullSpeaker {
    fn speak(&mut self, _text: &str) {}
    fn cancel(&mut self) {}
}

// ── Platform speaker ──

/// Speaks through a platform text-to-speech binary (`say` on macOS,
/// `espeak-ng`/`espeak` elsewhere). Detection and voice listing are
/// best-effort; anything missing degrades to the null behavior.
#[derive(Debug)]
pub enum SystemSpeaker {
    Process(ProcessSpeaker),
    Null(NullSpeaker),
}

impl SystemSpeaker {
    pub fn detect() -> Self {
        match ProcessSpeaker::detect() {
            Some(p) => SystemSpeaker::Process(p),
            None => {
                debug!("no speech binary found; speech disabled");
                SystemSpeaker::Null(NullSpeaker)
            }
        }
    }
}

impl Speaker for SystemSpeaker {
    fn speak(&mut self, text: &str) {
        match self {
            SystemSpeaker::Process(p) => p.speak(text),
            SystemSpeaker::Null(n) => n.speak(text),
        }
    }

    fn cancel(&mut self) {
        match self {
            SystemSpeaker::Process(p) => p.cancel(),
            SystemSpeaker::Null(n) => n.cancel(),
        }
    }
}

#[derive(Debug)]
pub struct ProcessSpeaker {
    program: &'static str,
    voice: Option<String>,
    child: Option<Child>,
}

const SPEECH_PROGRAMS: &[&str] = &["say", "espeak-ng", "espeak"];

impl ProcessSpeaker {
    /// Probe for a usable speech binary and pick a voice from its list.
    pub fn detect() -> Option<Self> {
        for program in SPEECH_PROGRAMS {
            if probe(program) {
                let voices = list_voices(program);
                let voice = select_voice(&voices);
                debug!(program, ?voice, "speech engine detected");
                return Some(Self {
                    program,
                    voice,
                    child: None,
                });
            }
        }
        None
    }

    fn spawn(&self, text: &str) -> std::io::Result<Child> {
        let mut cmd = Command::new(self.program);
        if let Some(voice) = &self.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
    }
}

impl Speaker for ProcessSpeaker {
    fn speak(&mut self, text: &str) {
        self.cancel();
        match self.spawn(text) {
            Ok(child) => self.child = Some(child),
            Err(e) => warn!(program = self.program, "speech spawn failed: {e}"),
        }
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for ProcessSpeaker {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn probe(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// Ask the platform for its voice list. Empty on any failure.
fn list_voices(program: &str) -> Vec<String> {
    let arg = if program == "say" { "-v?" } else { "--voices" };
    let output = match Command::new(program).arg(arg).output() {
        Ok(o) => o,
        Err(_) => return Vec::new(),
    };
    let text = String::from_utf8_lossy(&output.stdout);
    parse_voice_list(&text)
}

/// Each line of a voice listing starts with the voice name; `espeak-ng`
/// prefixes a header row and index columns, which parse to non-voices and
/// are harmless (selection falls back to the first entry).
fn parse_voice_list(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| {
            let name = line.split_whitespace().next()?;
            Some(name.to_string())
        })
        .collect()
}

// ── Test speaker ──

/// Records utterances and cancellations for assertions. Clone handles share
/// the same log, so tests can keep one while the dispatcher owns another.
#[derive(Debug, Clone, Default)]
pub struct CollectSpeaker {
    spoken: Arc<Mutex<Vec<String>>>,
    cancels: Arc<Mutex<usize>>,
}

impl CollectSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> usize {
        *self.cancels.lock().unwrap()
    }
}

impl Speaker for CollectSpeaker {
    fn speak(&mut self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }

    fn cancel(&mut self) {
        *self.cancels.lock().unwrap() += 1;
    }
}
