//! AXTerm Link Protocol Module
//!
//! - `transmission`: lifecycle of a queued outbound unit
//! - `sequencer`: total ordering of received items

pub mod sequencer;
pub mod transmission;

// Re-export transmission types
pub use transmission::{
    can_transition, TransitionRecord, TransmissionMode, TransmissionState, TransmissionUnit,
};

// Re-export sequencer types
pub use sequencer::{arrival_order, insert, insertion_index, precedes, ArrivalSequencer, Sequenced};
