#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core shim control logic (hardware-agnostic).
//!
//! All hardware interaction goes through `shim_traits::Dac` and
//! `shim_traits::Clock`; the trigger line feeds `TriggerEdge::on_edge`.
//!
//! ## Architecture
//!
//! - **Routing**: DAC channel to setpoint column (`routing`)
//! - **Quantization**: Amps to 16-bit DAC codes (`quantize`)
//! - **Preemphasis**: cross-channel IIR filter with rotating histories (`preemphasis`)
//! - **Trigger**: torn-free slice counter and timestamp (`trigger`)
//! - **Sequencing**: per-slice guard/apply windows and dynamic mode (`sequencer`)
//!
//! Setpoints are `f32` Amps throughout; conversion to integer codes happens
//! only at the DAC write.

pub mod builder;
pub mod config;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod matrix;
pub mod mocks;
pub mod output;
pub mod preemphasis;
pub mod quantize;
pub mod routing;
pub mod sequencer;
pub mod status;
pub mod table;
pub mod trigger;

pub use builder::{DynSequencer, SequencerParts, ShimSequencerBuilder, build_sequencer};
pub use config::{DynamicWaveform, SafetyCfg, TimingCfg};
pub use error::{BuildError, Result, ShimError};
pub use matrix::{Cube, Matrix};
pub use output::DacOutput;
pub use preemphasis::{FilterCoefficients, PreemphasisEngine};
pub use quantize::{DacCode, quantize};
pub use routing::{
    ChannelRouter, DEFAULT_ORDER, GRADIENT_CHANNELS, MAX_CHANNELS, channel_count,
    filter_channel_count,
};
pub use sequencer::ShimSequencer;
pub use status::{RunReport, SliceState};
pub use table::ShimTable;
pub use trigger::{TriggerClock, TriggerEdge, TriggerSnapshot};
