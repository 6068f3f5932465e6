//! Consolidation
//!
//! The periodic "sleep" operator: decay the working trace, transfer mass
//! into the core trace, replay a sample, re-derive layers, decay Hebbian
//! links, and downscale globally. A pure batch operator, not a background
//! task; callers schedule it explicitly.

mod cycle;

pub use cycle::{
    classify_layer, core_decay_factor, replay_partition, transfer_delta, working_decay_factor,
    ReplayPlan,
};
