//! Lock-free multi-emitter mixer
//!
//! The mixer is split in two halves created together by [`mixer_pair`]:
//!
//! ```text
//! ┌──────────────────┐   atomic stores    ┌─────────────────────┐
//! │      Mixer       │───────────────────►│    EmitterSlots     │
//! │  (control path)  │                    │   (atomic arena)    │
//! └──────────────────┘                    └──────────┬──────────┘
//!         ▲                                          │ acquire loads
//!         │ MixerEvent (rtrb SPSC)                   ▼
//!         │                               ┌─────────────────────┐
//!         └───────────────────────────────│      MixEngine      │
//!                                         │  (audio callback)   │
//!                                         └─────────────────────┘
//! ```
//!
//! Assets are `basedrop::Shared`, so the callback can drop the last
//! reference to a killed emitter's samples without freeing memory on the
//! audio thread (see [`gc`]).

mod controller;
mod emitter;
mod error;
pub mod gc;
mod mixer;
pub mod resample;

pub use controller::{mixer_pair, Mixer};
pub use emitter::{EmitterHandle, EmitterSlot, EmitterSlots};
pub use error::{MixerError, MixerResult};
pub use mixer::{channel_gain, write_sample, MixEngine, MixerEvent};
pub use resample::{converted_sample, RateConversion, RateStrategy};
