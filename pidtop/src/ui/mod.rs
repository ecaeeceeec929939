//! UI module root: exposes drawing functions for individual panels.

pub mod cpu;
pub mod header;
pub mod heap;
pub mod threads;
pub mod util;
