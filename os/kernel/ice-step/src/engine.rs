use crate::instruction::{FlowKind, InstructionDecoder};
use ice_registers::FarAddress;
use ice_symbols::SymbolStore;
use log::trace;

/// `TRACE` follows calls into symbolized functions, `STEP` never does.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StepMode {
    Trace,
    StepOver,
}

/// How the CPU is released.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Set the trap flag for exactly one instruction.
    SingleStep,
    /// Plant a one-shot breakpoint and run.
    Breakpoint(FarAddress),
}

/// What happens when the CPU stops again.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// Enter the session.
    Stop,
    /// Consult the engine again from the new instruction pointer.
    Rescan,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StepPlan {
    pub action: Action,
    pub then: Continuation,
}

impl StepPlan {
    #[must_use]
    pub const fn stop(action: Action) -> Self {
        Self {
            action,
            then: Continuation::Stop,
        }
    }

    #[must_use]
    pub const fn rescan(action: Action) -> Self {
        Self {
            action,
            then: Continuation::Rescan,
        }
    }

    #[must_use]
    pub const fn is_delayed(&self) -> bool {
        matches!(self.then, Continuation::Rescan)
    }
}

/// Whether a call target is code the operator has symbols for.
pub trait SymbolNames {
    fn is_function(&self, address: u32) -> bool;
}

impl SymbolNames for SymbolStore {
    fn is_function(&self, address: u32) -> bool {
        self.address_to_function_name(address).is_some()
    }
}

pub struct StepEngine<'a> {
    decoder: &'a dyn InstructionDecoder,
    symbols: &'a dyn SymbolNames,
}

impl<'a> StepEngine<'a> {
    pub const fn new(decoder: &'a dyn InstructionDecoder, symbols: &'a dyn SymbolNames) -> Self {
        Self { decoder, symbols }
    }

    /// Scan `[start, end)` of segment `cs` for the first instruction that
    /// decides how to resume from `ip`.
    ///
    /// With `until_return` a return anywhere in the block is the target:
    /// execution runs up to it, executes it and stops in the caller.
    #[must_use]
    pub fn scan_block(
        &self,
        cs: u16,
        start: u32,
        end: u32,
        ip: u32,
        mode: StepMode,
        until_return: bool,
    ) -> StepPlan {
        let at = |offset| FarAddress::new(cs, offset);
        let mut addr = start;

        while addr < end {
            let insn = self.decoder.decode(at(addr));
            let next = insn.next(addr);
            trace!("scan {:08X} {:?} len {}", addr, insn.kind, insn.len());

            match insn.kind {
                FlowKind::Return if until_return => {
                    return if addr == ip {
                        StepPlan::stop(Action::SingleStep)
                    } else {
                        StepPlan::rescan(Action::Breakpoint(at(addr)))
                    };
                }
                FlowKind::Jump if mode == StepMode::Trace && insn.target.is_some() => {
                    let target = insn.target.unwrap_or(next);
                    return StepPlan::stop(Action::Breakpoint(at(target)));
                }
                FlowKind::Jump | FlowKind::ConditionalJump | FlowKind::Return => {
                    return Self::delayed(at(addr), ip);
                }
                FlowKind::Call => match mode {
                    StepMode::Trace => {
                        if let Some(target) = insn.target
                            && self.symbols.is_function(target)
                        {
                            return StepPlan::stop(Action::Breakpoint(at(target)));
                        }
                    }
                    StepMode::StepOver => return StepPlan::rescan(Action::Breakpoint(at(next))),
                },
                FlowKind::Interrupt if mode == StepMode::StepOver => {
                    return StepPlan::rescan(Action::Breakpoint(at(next)));
                }
                FlowKind::Interrupt | FlowKind::Other => {}
            }
            addr = next;
        }

        // `addr` is the first instruction boundary at or past `end`.
        if addr == ip {
            StepPlan::stop(Action::SingleStep)
        } else {
            StepPlan::stop(Action::Breakpoint(at(addr)))
        }
    }

    /// Plan for code without source information.
    #[must_use]
    pub fn machine_step(&self, ip: FarAddress, mode: StepMode, until_return: bool) -> StepPlan {
        let insn = self.decoder.decode(ip);
        let after = FarAddress::new(ip.selector, insn.next(ip.offset));
        let skips = mode == StepMode::StepOver || until_return;

        match insn.kind {
            FlowKind::Return if until_return => StepPlan::stop(Action::SingleStep),
            FlowKind::Call | FlowKind::Interrupt if skips => {
                if until_return {
                    StepPlan::rescan(Action::Breakpoint(after))
                } else {
                    StepPlan::stop(Action::Breakpoint(after))
                }
            }
            _ if until_return => StepPlan::rescan(Action::SingleStep),
            _ => StepPlan::stop(Action::SingleStep),
        }
    }

    /// The outcome depends on runtime state: get there, execute one
    /// instruction and look again.
    fn delayed(addr: FarAddress, ip: u32) -> StepPlan {
        if addr.offset == ip {
            StepPlan::rescan(Action::SingleStep)
        } else {
            StepPlan::rescan(Action::Breakpoint(addr))
        }
    }
}
