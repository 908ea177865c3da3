//! Runtime module. Command-line lifecycle: boot, run, stop.

pub mod boot;
pub mod run;
pub mod stop;
