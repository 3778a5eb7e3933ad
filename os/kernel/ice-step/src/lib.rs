//! # Step and trace engine
//!
//! Decides how the debuggee resumes after a `TRACE` or `STEP` command: arm
//! the CPU single-step flag, plant a one-shot breakpoint, or both with a
//! request to be consulted again once the CPU stops.
//!
//! The engine never touches memory or registers. It reads instruction
//! classifications from an [`InstructionDecoder`], asks [`SymbolNames`]
//! whether a call target is worth following, and returns a [`StepPlan`].
//! The [`BreakpointRegistry`] realizes planted breakpoints as `int3` bytes
//! through [`CodeMemory`].

#![cfg_attr(not(any(test, doctest)), no_std)]

mod breakpoint;
mod engine;
mod error;
mod instruction;

pub use breakpoint::{BreakpointDescriptor, BreakpointRegistry, CodeMemory, Hit, MAX_STICKY};
pub use engine::{Action, Continuation, StepEngine, StepMode, StepPlan, SymbolNames};
pub use error::BreakpointError;
pub use instruction::{FlowKind, Instruction, InstructionDecoder};
