#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]

pub mod clocks;

pub use clocks::{
    CausalOrd, CausalOrdering, ClockProvider, TimestampStrategy, VectorClock,
};
