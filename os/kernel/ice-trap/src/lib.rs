//! # Interrupt dispatcher
//!
//! Every vector the debugger intercepts lands in [`Dispatcher::dispatch`].
//! What happens next depends on who was running when the trap hit:
//!
//! * **The debugger itself** (a session is active): a handful of vectors are
//!   serviced locally (timer, keyboard, mouse, serial, and faults raised by
//!   guarded memory probes). Everything else is forwarded to the host's own
//!   handler.
//! * **The monitored kernel**: unless the vector is a plain timer tick, the
//!   dispatcher performs the session-entry sequence. It takes the session
//!   guard, pins interrupt routing to this CPU, swaps the host's vector table
//!   for a private shadow copy, parks the other CPUs and hands control to a
//!   [`SessionHandler`]. When the handler returns, everything is put back in
//!   reverse order.
//!
//! Hardware access goes through the [`Platform`] trait so that the whole
//! protocol runs on the host in tests.
//!
//! ## Acronyms
//! - **IDT** – *Interrupt Descriptor Table*
//! - **EOI** – *End Of Interrupt*, the interrupt controller acknowledge
//! - **IPI** – *Inter-Processor Interrupt*

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod counters;
mod dispatch;
mod error;
mod gate;
mod panic;
mod platform;
mod probe;
mod vectors;

pub use counters::{CounterSnapshot, InterruptCounters, LocalTimers, Timer};
pub use dispatch::{Chain, DispatchConfig, Dispatcher, SessionEntry, SessionHandler};
pub use error::HookError;
pub use gate::{Gate, GateAttr, GateBuilder, GateType};
pub use panic::{emergency_panic, write_panic_report};
pub use platform::Platform;
pub use probe::{PROBE_FAULT_GP, PROBE_FAULT_PAGE, ProbeFault, ProbeRegion};
pub use vectors::{
    GateTable, HookSet, HookedGates, LiveTable, SnapshotCorrupted, VectorTable, vector,
};
