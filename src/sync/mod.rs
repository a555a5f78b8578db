//! Resource state tracking and the transitions it produces.

pub mod tracker;
pub mod transition;
