//! Voice command state machine
//!
//! Interprets a continuous transcript stream into wake/question/stop events
//! and manages the recognizer/synthesizer lifecycle around them. The machine
//! itself is pure: it consumes typed [`VoiceEvent`]s and returns the
//! [`VoiceAction`]s the driver must perform, so it is testable without a real
//! audio device.
//!
//! Recognition and synthesis are mutually exclusive. Speaking suspends
//! recognition; when an utterance finishes, recognition is re-armed after a
//! short settle delay so the device does not capture its own playback. The
//! recognizer is not re-entrant while stopping, so restarts after terminal
//! recognition events are scheduled with a short backoff instead of
//! immediately.

use std::time::Duration;

/// Voice assistant status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceMode {
    /// Recognition not running
    #[default]
    Idle,
    /// Recognition running, waiting for the wake phrase
    Listening,
    /// Wake phrase heard, the next transcript is a question
    Active,
    /// Synthesis playing, recognition suspended
    Speaking,
    /// Feature toggled off
    Disabled,
}

impl std::fmt::Display for VoiceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceMode::Idle => write!(f, "Idle"),
            VoiceMode::Listening => write!(f, "Listening"),
            VoiceMode::Active => write!(f, "Active"),
            VoiceMode::Speaking => write!(f, "Speaking"),
            VoiceMode::Disabled => write!(f, "Disabled"),
        }
    }
}

/// Terminal recognizer error categories
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    Network,
    NoSpeech,
    Aborted,
    Other(String),
}

impl RecognitionErrorKind {
    /// Transient errors are retried via the restart policy
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RecognitionErrorKind::Network
                | RecognitionErrorKind::NoSpeech
                | RecognitionErrorKind::Aborted
        )
    }
}

/// Events driving the machine: recognition results and lifecycle, synthesis
/// lifecycle, timers, and the user-facing enable toggle
#[derive(Clone, Debug)]
pub enum VoiceEvent {
    /// The recognizer began listening
    RecognitionStarted,
    /// A transcript arrived from the recognizer
    Transcript(String),
    /// The recognizer stopped normally
    RecognitionEnded,
    /// The recognizer stopped with an error
    RecognitionFailed(RecognitionErrorKind),
    /// Synthesis playback started
    SynthesisStarted,
    /// Synthesis playback finished
    SynthesisEnded,
    /// The post-question grace delay elapsed
    RevertElapsed,
    /// User toggled the feature on or off
    SetEnabled(bool),
}

/// Actions the driver must perform in response to an event
#[derive(Clone, Debug, PartialEq)]
pub enum VoiceAction {
    /// Start recognition after the given delay (zero = immediately)
    StartRecognition { after: Duration },
    /// Stop recognition now
    StopRecognition,
    /// Speak the given acknowledgment
    Speak(String),
    /// Cancel any in-progress speech output
    CancelSpeech,
    /// Fire a `RevertElapsed` event after the given delay
    ScheduleRevert { after: Duration },
    /// Publish a wake signal
    EmitWake,
    /// Publish a question signal with the transcript
    EmitQuestion(String),
}

/// Tunables for the voice command machine
#[derive(Clone, Debug)]
pub struct VoiceConfig {
    /// Trigger word that arms the assistant
    pub wake_phrase: String,
    /// Keyword that cancels in-progress speech output
    pub stop_keyword: String,
    /// Spoken acknowledgment when the wake phrase is heard
    pub wake_ack: String,
    /// Spoken acknowledgment when a question is accepted
    pub question_ack: String,
    /// Spoken notice when the feature is toggled off
    pub disabled_notice: String,
    /// Spoken notice when the feature is toggled back on
    pub enabled_notice: String,
    /// How long the machine stays armed after one question
    pub revert_delay: Duration,
    /// Restart backoff after a normal recognizer end
    pub restart_backoff: Duration,
    /// Restart backoff after a transient recognizer error
    pub error_backoff: Duration,
    /// Delay between synthesis end and recognition restart
    pub settle_delay: Duration,
    /// Consecutive transient-error restarts before giving up
    pub max_restart_attempts: u32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            wake_phrase: "jarvis".to_string(),
            stop_keyword: "stop".to_string(),
            wake_ack: "Yes, I'm listening.".to_string(),
            question_ack: "Got it.".to_string(),
            disabled_notice: "Assistant deactivated.".to_string(),
            enabled_notice: "Assistant back online.".to_string(),
            revert_delay: Duration::from_millis(1500),
            restart_backoff: Duration::from_millis(700),
            error_backoff: Duration::from_millis(800),
            settle_delay: Duration::from_millis(400),
            max_restart_attempts: 5,
        }
    }
}

/// Pure transition core of the voice assistant
#[derive(Clone, Debug)]
pub struct VoiceMachine {
    config: VoiceConfig,
    mode: VoiceMode,
    /// Wake phrase heard, next transcript is treated as a question
    armed: bool,
    speaking: bool,
    enabled: bool,
    recognizing: bool,
    restart_attempts: u32,
    last_transcript: String,
}

impl VoiceMachine {
    pub fn new(config: VoiceConfig) -> Self {
        Self {
            config,
            mode: VoiceMode::Idle,
            armed: false,
            speaking: false,
            enabled: true,
            recognizing: false,
            restart_attempts: 0,
            last_transcript: String::new(),
        }
    }

    pub fn config(&self) -> &VoiceConfig {
        &self.config
    }

    pub fn mode(&self) -> VoiceMode {
        self.mode
    }

    pub fn last_transcript(&self) -> &str {
        &self.last_transcript
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Whether a deferred recognition start is still valid when its timer
    /// fires. Output playing or the feature being disabled vetoes it.
    pub fn can_start_recognition(&self) -> bool {
        self.enabled && !self.speaking && !self.recognizing
    }

    /// Apply one event and return the actions the driver must perform
    pub fn handle(&mut self, event: VoiceEvent) -> Vec<VoiceAction> {
        match event {
            VoiceEvent::RecognitionStarted => self.on_recognition_started(),
            VoiceEvent::Transcript(text) => self.on_transcript(&text),
            VoiceEvent::RecognitionEnded => self.on_recognition_ended(),
            VoiceEvent::RecognitionFailed(kind) => self.on_recognition_failed(kind),
            VoiceEvent::SynthesisStarted => self.on_synthesis_started(),
            VoiceEvent::SynthesisEnded => self.on_synthesis_ended(),
            VoiceEvent::RevertElapsed => self.on_revert_elapsed(),
            VoiceEvent::SetEnabled(enabled) => self.on_set_enabled(enabled),
        }
    }

    fn on_recognition_started(&mut self) -> Vec<VoiceAction> {
        self.recognizing = true;
        self.restart_attempts = 0;
        if self.enabled && !self.speaking {
            self.mode = if self.armed {
                VoiceMode::Active
            } else {
                VoiceMode::Listening
            };
        }
        Vec::new()
    }

    fn on_transcript(&mut self, text: &str) -> Vec<VoiceAction> {
        let text = text.to_lowercase().trim().to_string();
        if text.is_empty() || !self.enabled {
            return Vec::new();
        }
        self.last_transcript = text.clone();

        // Stop keyword wins at any time and is always consumed
        if text.contains(&self.config.stop_keyword) {
            if self.speaking {
                self.speaking = false;
                self.mode = VoiceMode::Idle;
                return vec![
                    VoiceAction::CancelSpeech,
                    VoiceAction::StartRecognition {
                        after: Duration::ZERO,
                    },
                ];
            }
            return Vec::new();
        }

        if !self.armed && text.contains(&self.config.wake_phrase) {
            self.armed = true;
            self.mode = VoiceMode::Active;
            return vec![
                VoiceAction::EmitWake,
                VoiceAction::Speak(self.config.wake_ack.clone()),
            ];
        }

        if self.armed && !text.contains(&self.config.wake_phrase) {
            return vec![
                VoiceAction::EmitQuestion(text),
                VoiceAction::Speak(self.config.question_ack.clone()),
                VoiceAction::ScheduleRevert {
                    after: self.config.revert_delay,
                },
            ];
        }

        Vec::new()
    }

    fn on_recognition_ended(&mut self) -> Vec<VoiceAction> {
        self.recognizing = false;
        if self.speaking || !self.enabled {
            return Vec::new();
        }
        self.mode = VoiceMode::Idle;
        vec![VoiceAction::StartRecognition {
            after: self.config.restart_backoff,
        }]
    }

    fn on_recognition_failed(&mut self, kind: RecognitionErrorKind) -> Vec<VoiceAction> {
        self.recognizing = false;
        if !self.enabled {
            return Vec::new();
        }
        if kind.is_transient() && self.restart_attempts < self.config.max_restart_attempts {
            self.restart_attempts += 1;
            return vec![VoiceAction::StartRecognition {
                after: self.config.error_backoff,
            }];
        }
        // Non-transient, or retries exhausted: fall back to idle
        self.mode = VoiceMode::Idle;
        Vec::new()
    }

    fn on_synthesis_started(&mut self) -> Vec<VoiceAction> {
        self.speaking = true;
        self.recognizing = false;
        if self.enabled {
            self.mode = VoiceMode::Speaking;
        }
        vec![VoiceAction::StopRecognition]
    }

    fn on_synthesis_ended(&mut self) -> Vec<VoiceAction> {
        self.speaking = false;
        if !self.enabled {
            self.mode = VoiceMode::Disabled;
            return Vec::new();
        }
        self.mode = VoiceMode::Idle;
        vec![VoiceAction::StartRecognition {
            after: self.config.settle_delay,
        }]
    }

    fn on_revert_elapsed(&mut self) -> Vec<VoiceAction> {
        self.armed = false;
        if self.mode == VoiceMode::Active {
            self.mode = if self.recognizing {
                VoiceMode::Listening
            } else {
                VoiceMode::Idle
            };
        }
        Vec::new()
    }

    fn on_set_enabled(&mut self, enabled: bool) -> Vec<VoiceAction> {
        if enabled == self.enabled {
            return Vec::new();
        }
        self.enabled = enabled;
        self.armed = false;
        if enabled {
            self.mode = VoiceMode::Idle;
            vec![
                VoiceAction::Speak(self.config.enabled_notice.clone()),
                VoiceAction::StartRecognition {
                    after: self.config.error_backoff,
                },
            ]
        } else {
            self.mode = VoiceMode::Disabled;
            self.recognizing = false;
            vec![
                VoiceAction::StopRecognition,
                VoiceAction::Speak(self.config.disabled_notice.clone()),
            ]
        }
    }
}

impl Default for VoiceMachine {
    fn default() -> Self {
        Self::new(VoiceConfig::default())
    }
}
