//! # Debugger synchronization primitives
//!
//! Two primitives cover everything the debugger needs across CPUs:
//!
//! * [`SessionLock`] is the re-entrancy guard. Exactly one CPU at a time owns
//!   the data behind it. Acquisition never waits: a CPU that loses the race
//!   keeps running the monitored code and retries on its next trap.
//! * [`CpuRendezvous`] parks the other CPUs for the duration of a session and
//!   lets them go when the session CPU releases them.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod rendezvous;
mod session_lock;

pub use rendezvous::CpuRendezvous;
pub use session_lock::{SessionGuard, SessionLock};
