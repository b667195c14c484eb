//! Mixer behavior settings

use serde::{Deserialize, Serialize};

use crate::audio_file::ParseOptions;

/// Default number of emitter slots
pub const DEFAULT_MAX_EMITTERS: usize = 64;

/// Default capacity of the finished-emitter notification queue
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 256;

/// How the clip guard's gain correction is undone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClipPolicy {
    /// An emitter that clipped once stays ducked for its lifetime
    #[default]
    Duck,
    /// Restore full level whenever the emitter is fired again
    DuckUntilFire,
}

/// Which emitters the clip guard watches
///
/// Emitters outside the scope are not ducked; their overshoot is clamped
/// when the mix is packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClipScope {
    #[default]
    FloatOnly,
    AllEmitters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Size of the emitter arena, fixed at construction
    pub max_emitters: usize,
    /// Volume given to new emitters
    pub default_volume: f32,
    pub clip_policy: ClipPolicy,
    pub clip_scope: ClipScope,
    /// Kill emitters that played to the end when events are polled
    pub auto_release_finished: bool,
    pub event_queue_capacity: usize,
    /// Options used by [`Mixer::load`](crate::engine::Mixer::load)
    pub parse: ParseOptions,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            max_emitters: DEFAULT_MAX_EMITTERS,
            default_volume: 1.0,
            clip_policy: ClipPolicy::default(),
            clip_scope: ClipScope::default(),
            auto_release_finished: false,
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
            parse: ParseOptions::default(),
        }
    }
}
