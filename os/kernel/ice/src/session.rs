use crate::commands::{CommandLoop, Commands};
use crate::context::SourceContext;
use crate::debugger::Debugger;
use crate::state::DebuggerState;
use core::mem;
use ice_console::ice_trace;
use ice_registers::{FarAddress, TrapFrame};
use ice_step::{CodeMemory, InstructionDecoder, StepMode};
use ice_trap::{SessionEntry, SessionHandler, vector};
use log::{debug, info, warn};

/// What a trap turns into once the breakpoints have been accounted for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Entry {
    /// Go straight back to the debuggee.
    Resume,
    /// Consult the step engine again.
    Rescan,
    /// Stop. `stepped` is set when a step or a one-shot brought us here.
    Break { stepped: bool },
}

/// One trap's worth of debugger: runs the entry action, the command loop if
/// needed, and prepares the resume.
pub struct Session<'a> {
    debugger: &'a mut Debugger,
    decoder: &'a dyn InstructionDecoder,
    code: &'a mut dyn CodeMemory,
    commands: &'a mut dyn CommandLoop,
}

impl<'a> Session<'a> {
    pub(crate) fn new(
        debugger: &'a mut Debugger,
        decoder: &'a dyn InstructionDecoder,
        code: &'a mut dyn CodeMemory,
        commands: &'a mut dyn CommandLoop,
    ) -> Self {
        Self {
            debugger,
            decoder,
            code,
            commands,
        }
    }

    fn classify(
        &mut self,
        vector: u8,
        frame: &mut TrapFrame,
        state: DebuggerState,
        stepped: bool,
    ) -> Entry {
        let rpl = frame.code_address().rpl();
        match vector {
            vector::BREAKPOINT => {
                let at = FarAddress::new(frame.code_address().selector, frame.eip.wrapping_sub(1));
                if let Some(hit) = self.debugger.breakpoints_mut().on_trap(at) {
                    // Re-execute the original instruction.
                    frame.eip = at.offset;
                    if !hit.sticky && state == DebuggerState::DelayedTrace {
                        Entry::Rescan
                    } else {
                        Entry::Break {
                            stepped: !hit.sticky,
                        }
                    }
                } else if self.debugger.context().int3_here.allows(rpl) {
                    info!("embedded int3 at {at}");
                    Entry::Break { stepped: false }
                } else {
                    debug!("ignoring embedded int3 at {at}");
                    self.debugger.context_mut().state = state;
                    Entry::Resume
                }
            }
            vector::DEBUG if stepped => match state {
                DebuggerState::DelayedArm => {
                    let ctx = self.debugger.context_mut();
                    ctx.state = mem::take(&mut ctx.deferred);
                    Entry::Resume
                }
                DebuggerState::DelayedTrace => Entry::Rescan,
                DebuggerState::Break => Entry::Break { stepped: true },
            },
            vector::DEBUG => {
                if self.debugger.context().int1_here.allows(rpl) {
                    info!("embedded int1 at {}", frame.code_address());
                    Entry::Break { stepped: false }
                } else {
                    self.debugger.context_mut().state = state;
                    Entry::Resume
                }
            }
            _ => Entry::Break { stepped: false },
        }
    }

    fn on_break(&mut self, frame: &mut TrapFrame, stepped: bool) {
        let ctx = self.debugger.context_mut();
        if stepped && ctx.trace_count > 1 {
            ctx.trace_count -= 1;
            self.debugger
                .begin_step(frame, self.decoder, StepMode::Trace, false);
            return;
        }
        self.debugger.context_mut().clear_step();

        let mut commands = Commands::new(&mut *self.debugger, frame, self.decoder, &mut *self.code);
        self.commands.run(&mut commands);
        if !commands.resumed() {
            debug!("command loop ended without a resume command");
        }
    }

    /// Arm breakpoints, or single-step off one first when resuming on top of it.
    fn resume(&mut self, frame: &mut TrapFrame) {
        let at = frame.code_address();
        if self.debugger.breakpoints().sticky().any(|a| a == at) {
            let ctx = self.debugger.context_mut();
            if !ctx.single_step {
                frame.set_single_step(true);
                ctx.single_step = true;
                ctx.deferred = mem::replace(&mut ctx.state, DebuggerState::DelayedArm);
            }
            debug!("stepping off breakpoint at {at}");
            return;
        }
        if let Err(e) = self.debugger.breakpoints_mut().arm_all(&mut *self.code) {
            warn!("could not arm breakpoints: {e}");
        }
    }
}

impl SessionHandler for Session<'_> {
    fn run_session(&mut self, entry: &mut SessionEntry<'_>) {
        if let Err(e) = self.debugger.breakpoints_mut().disarm_all(&mut *self.code) {
            warn!("could not restore code bytes: {e}");
        }

        let frame = &mut *entry.frame;
        let stepped = self.debugger.context_mut().enter(entry.vector, entry.cpu, frame);
        if stepped {
            frame.set_single_step(false);
        }
        let state = self.debugger.context_mut().take_state();
        ice_trace!("ice: vector {:#04x} state {:?}\n", entry.vector, state);

        let action = self.classify(entry.vector, frame, state, stepped);
        let source = SourceContext::at(self.debugger.symbols(), frame.eip);
        self.debugger.context_mut().source = source;

        match action {
            Entry::Resume => {}
            Entry::Rescan => {
                if !self.debugger.continue_step(frame, self.decoder) {
                    self.on_break(frame, true);
                }
            }
            Entry::Break { stepped } => self.on_break(frame, stepped),
        }
        self.resume(frame);
    }
}
