//! # Typed 32-bit protected-mode registers
//!
//! The debugger works on a flat 32-bit CPU model. This crate holds the
//! register snapshot taken on every trap plus the handful of typed registers
//! the trap and step code manipulate directly.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod descriptor;
mod eflags;
mod frame;

pub use descriptor::TableDescriptor;
pub use eflags::Eflags;
pub use frame::{FarAddress, TrapFrame};

#[cfg(all(feature = "asm", target_arch = "x86"))]
pub use descriptor::asm;
