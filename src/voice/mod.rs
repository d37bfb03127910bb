pub mod assistant;
pub mod machine;

pub use assistant::{SpeechPlatform, VoiceAssistant, VoiceSignal};
pub use machine::{
    RecognitionErrorKind, VoiceAction, VoiceConfig, VoiceEvent, VoiceMachine, VoiceMode,
};
