//! Voice assistant driver
//!
//! Owns the speech platform (recognizer + synthesizer) as an explicit
//! resource with `start`/`stop` lifecycle, runs the pure [`VoiceMachine`]
//! over platform events, and publishes wake/question signals to a channel
//! the orchestrator subscribes to.
//!
//! Timed actions (restart backoff, settle delay, auto-revert) go onto a
//! deadline queue drained cooperatively by [`VoiceAssistant::tick`]; there
//! are no timer threads.

use super::machine::{VoiceAction, VoiceConfig, VoiceEvent, VoiceMachine, VoiceMode};
use crate::{CodevoiceError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Signals published to the orchestrator's command channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoiceSignal {
    /// The wake phrase was heard
    Wake,
    /// A spoken question was captured
    Question(String),
}

/// Platform speech capability consumed by the assistant.
///
/// Implementations wrap a real recognizer/synthesizer pair. Calls are
/// fire-and-forget; the platform reports lifecycle outcomes back by feeding
/// `RecognitionEnded` / `RecognitionFailed` / `SynthesisEnded` events into
/// [`VoiceAssistant::dispatch`]. `RecognitionStarted` and `SynthesisStarted`
/// are dispatched by the assistant itself when the corresponding call
/// succeeds.
pub trait SpeechPlatform: Send {
    /// Whether the platform has both recognition and synthesis support
    fn supports_speech(&self) -> bool;

    /// Begin continuous recognition
    fn start_recognition(&mut self) -> Result<()>;

    /// Stop recognition
    fn stop_recognition(&mut self);

    /// Queue an utterance for playback
    fn speak(&mut self, text: &str) -> Result<()>;

    /// Cancel any in-progress playback immediately
    fn cancel_speech(&mut self);
}

/// A timed action awaiting its deadline
#[derive(Debug)]
enum Deferred {
    StartRecognition,
    Revert,
}

/// Driver wiring the state machine to a speech platform and a signal channel
pub struct VoiceAssistant {
    machine: VoiceMachine,
    platform: Box<dyn SpeechPlatform>,
    signal_tx: Sender<VoiceSignal>,
    deferred: Vec<(Instant, Deferred)>,
}

impl VoiceAssistant {
    /// Create an assistant over the given platform.
    ///
    /// Missing speech support is a fatal feature-disable: the error is
    /// reported once and construction fails, it is never retried.
    pub fn new(
        platform: Box<dyn SpeechPlatform>,
        config: VoiceConfig,
    ) -> Result<(Self, Receiver<VoiceSignal>)> {
        if !platform.supports_speech() {
            error!("Speech recognition/synthesis not supported; voice assistant disabled");
            return Err(CodevoiceError::UnsupportedPlatform(
                "speech recognition not available".to_string(),
            ));
        }

        let (signal_tx, signal_rx) = bounded(64);
        let assistant = Self {
            machine: VoiceMachine::new(config),
            platform,
            signal_tx,
            deferred: Vec::new(),
        };
        Ok((assistant, signal_rx))
    }

    /// Begin listening
    pub fn start(&mut self) {
        self.try_start_recognition();
    }

    /// Stop listening and cancel any playback
    pub fn stop(&mut self) {
        self.deferred.clear();
        self.platform.stop_recognition();
        self.platform.cancel_speech();
    }

    /// Current machine state
    pub fn mode(&self) -> VoiceMode {
        self.machine.mode()
    }

    pub fn machine(&self) -> &VoiceMachine {
        &self.machine
    }

    /// Toggle the feature on or off
    pub fn set_enabled(&mut self, enabled: bool) {
        self.dispatch(VoiceEvent::SetEnabled(enabled));
    }

    /// Feed one platform event through the machine
    pub fn dispatch(&mut self, event: VoiceEvent) {
        let actions = self.machine.handle(event);
        self.apply(actions);
    }

    /// Deadline of the earliest pending timed action, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.deferred.iter().map(|(at, _)| *at).min()
    }

    /// Run all timed actions whose deadline has passed
    pub fn tick(&mut self, now: Instant) {
        let mut due = Vec::new();
        let mut pending = Vec::new();
        for (at, action) in self.deferred.drain(..) {
            if at <= now {
                due.push(action);
            } else {
                pending.push((at, action));
            }
        }
        self.deferred = pending;

        for action in due {
            match action {
                Deferred::StartRecognition => self.try_start_recognition(),
                Deferred::Revert => self.dispatch(VoiceEvent::RevertElapsed),
            }
        }
    }

    fn apply(&mut self, actions: Vec<VoiceAction>) {
        for action in actions {
            match action {
                VoiceAction::StartRecognition { after } => {
                    if after.is_zero() {
                        self.try_start_recognition();
                    } else {
                        self.deferred
                            .push((Instant::now() + after, Deferred::StartRecognition));
                    }
                }
                VoiceAction::StopRecognition => self.platform.stop_recognition(),
                VoiceAction::Speak(text) => self.try_speak(&text),
                VoiceAction::CancelSpeech => self.platform.cancel_speech(),
                VoiceAction::ScheduleRevert { after } => {
                    self.deferred.push((Instant::now() + after, Deferred::Revert));
                }
                VoiceAction::EmitWake => {
                    // A gone consumer makes this a no-op by design
                    let _ = self.signal_tx.try_send(VoiceSignal::Wake);
                }
                VoiceAction::EmitQuestion(text) => {
                    let _ = self.signal_tx.try_send(VoiceSignal::Question(text));
                }
            }
        }
    }

    fn try_start_recognition(&mut self) {
        // Re-validate at fire time: speech may have started in the meantime
        if !self.machine.can_start_recognition() {
            debug!("Skipping recognition start, machine busy or disabled");
            return;
        }
        match self.platform.start_recognition() {
            Ok(()) => self.dispatch(VoiceEvent::RecognitionStarted),
            Err(e) => warn!("Recognition start failed: {}", e),
        }
    }

    fn try_speak(&mut self, text: &str) {
        match self.platform.speak(text) {
            Ok(()) => self.dispatch(VoiceEvent::SynthesisStarted),
            Err(e) => warn!("Speech synthesis failed, continuing without audio: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::machine::RecognitionErrorKind;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        StartRecognition,
        StopRecognition,
        Speak(String),
        CancelSpeech,
    }

    #[derive(Clone)]
    struct FakePlatform {
        supported: bool,
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl FakePlatform {
        fn new() -> Self {
            Self {
                supported: true,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn unsupported() -> Self {
            Self {
                supported: false,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }
    }

    impl SpeechPlatform for FakePlatform {
        fn supports_speech(&self) -> bool {
            self.supported
        }

        fn start_recognition(&mut self) -> Result<()> {
            self.calls.lock().push(Call::StartRecognition);
            Ok(())
        }

        fn stop_recognition(&mut self) {
            self.calls.lock().push(Call::StopRecognition);
        }

        fn speak(&mut self, text: &str) -> Result<()> {
            self.calls.lock().push(Call::Speak(text.to_string()));
            Ok(())
        }

        fn cancel_speech(&mut self) {
            self.calls.lock().push(Call::CancelSpeech);
        }
    }

    fn assistant() -> (VoiceAssistant, Receiver<VoiceSignal>, FakePlatform) {
        let platform = FakePlatform::new();
        let (assistant, rx) =
            VoiceAssistant::new(Box::new(platform.clone()), VoiceConfig::default()).unwrap();
        (assistant, rx, platform)
    }

    #[test]
    fn test_missing_platform_support_is_fatal() {
        let result = VoiceAssistant::new(
            Box::new(FakePlatform::unsupported()),
            VoiceConfig::default(),
        );

        assert!(matches!(
            result.err(),
            Some(CodevoiceError::UnsupportedPlatform(_))
        ));
    }

    #[test]
    fn test_start_begins_listening() {
        let (mut assistant, _rx, platform) = assistant();

        assistant.start();

        assert_eq!(platform.calls(), vec![Call::StartRecognition]);
        assert_eq!(assistant.mode(), VoiceMode::Listening);
    }

    #[test]
    fn test_wake_publishes_signal_and_speaks_ack() {
        let (mut assistant, rx, platform) = assistant();
        assistant.start();

        assistant.dispatch(VoiceEvent::Transcript("hey jarvis".to_string()));

        assert_eq!(rx.try_recv().unwrap(), VoiceSignal::Wake);
        assert!(platform
            .calls()
            .contains(&Call::Speak("Yes, I'm listening.".to_string())));
        // Speaking the ack suspends recognition
        assert!(platform.calls().contains(&Call::StopRecognition));
        assert_eq!(assistant.mode(), VoiceMode::Speaking);
    }

    #[test]
    fn test_question_flow_publishes_question_then_reverts() {
        let (mut assistant, rx, _platform) = assistant();
        assistant.start();

        assistant.dispatch(VoiceEvent::Transcript("jarvis".to_string()));
        assert_eq!(rx.try_recv().unwrap(), VoiceSignal::Wake);
        assistant.dispatch(VoiceEvent::SynthesisEnded);

        assistant.dispatch(VoiceEvent::Transcript("explain this function".to_string()));
        assert_eq!(
            rx.try_recv().unwrap(),
            VoiceSignal::Question("explain this function".to_string())
        );

        // Revert timer fires after the grace delay
        assert!(assistant.next_deadline().is_some());
        assistant.tick(Instant::now() + Duration::from_secs(2));
        assert!(!assistant.machine().is_armed());
    }

    #[test]
    fn test_settle_restart_is_deferred_then_fires() {
        let (mut assistant, _rx, platform) = assistant();
        assistant.start();
        assistant.dispatch(VoiceEvent::SynthesisStarted);
        assistant.dispatch(VoiceEvent::RecognitionEnded);

        let starts_before = platform
            .calls()
            .iter()
            .filter(|c| **c == Call::StartRecognition)
            .count();

        assistant.dispatch(VoiceEvent::SynthesisEnded);
        // Not restarted yet: the settle delay has not elapsed
        assert_eq!(
            platform
                .calls()
                .iter()
                .filter(|c| **c == Call::StartRecognition)
                .count(),
            starts_before
        );

        assistant.tick(Instant::now() + Duration::from_secs(1));
        assert_eq!(
            platform
                .calls()
                .iter()
                .filter(|c| **c == Call::StartRecognition)
                .count(),
            starts_before + 1
        );
    }

    #[test]
    fn test_stop_keyword_cancels_playback_immediately() {
        let (mut assistant, _rx, platform) = assistant();
        assistant.start();
        assistant.dispatch(VoiceEvent::SynthesisStarted);

        assistant.dispatch(VoiceEvent::Transcript("stop".to_string()));

        assert!(platform.calls().contains(&Call::CancelSpeech));
    }

    #[test]
    fn test_deferred_start_vetoed_while_speaking() {
        let (mut assistant, _rx, platform) = assistant();
        assistant.start();
        // Transient failure schedules a restart
        assistant.dispatch(VoiceEvent::RecognitionFailed(RecognitionErrorKind::Network));
        // Synthesis begins before the backoff elapses
        assistant.dispatch(VoiceEvent::SynthesisStarted);

        let starts_before = platform
            .calls()
            .iter()
            .filter(|c| **c == Call::StartRecognition)
            .count();
        assistant.tick(Instant::now() + Duration::from_secs(1));

        assert_eq!(
            platform
                .calls()
                .iter()
                .filter(|c| **c == Call::StartRecognition)
                .count(),
            starts_before
        );
    }

    #[test]
    fn test_disable_then_enable_round_trip() {
        let (mut assistant, _rx, platform) = assistant();
        assistant.start();

        assistant.set_enabled(false);
        assert_eq!(assistant.mode(), VoiceMode::Disabled);
        assert!(platform.calls().contains(&Call::StopRecognition));

        assistant.set_enabled(true);
        // Restart is deferred behind the backoff; synthesis of the notice is
        // in progress, so the machine vetoes early starts until it ends
        assistant.dispatch(VoiceEvent::SynthesisEnded);
        assistant.tick(Instant::now() + Duration::from_secs(1));
        assert_eq!(assistant.mode(), VoiceMode::Listening);
    }
}

