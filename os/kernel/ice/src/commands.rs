//! Debuggee-control commands for the external command line.

use crate::config::EmbeddedTrapPolicy;
use crate::debugger::Debugger;
use crate::error::IceError;
use core::fmt::{self, Write};
use ice_registers::{FarAddress, TrapFrame};
use ice_step::{CodeMemory, InstructionDecoder, StepMode};
use ice_symbols::LoadError;
use log::info;

const INT3: u8 = 0xCC;
const INT_N: u8 = 0xCD;
const NOP: u8 = 0x90;

/// The operator's read-eval loop.
pub trait CommandLoop {
    /// Read and run commands until one of them resumes the debuggee.
    fn run(&mut self, commands: &mut Commands<'_>);
}

pub struct Commands<'a> {
    debugger: &'a mut Debugger,
    frame: &'a mut TrapFrame,
    decoder: &'a dyn InstructionDecoder,
    code: &'a mut dyn CodeMemory,
    resumed: bool,
}

impl<'a> Commands<'a> {
    pub fn new(
        debugger: &'a mut Debugger,
        frame: &'a mut TrapFrame,
        decoder: &'a dyn InstructionDecoder,
        code: &'a mut dyn CodeMemory,
    ) -> Self {
        Self {
            debugger,
            frame,
            decoder,
            code,
            resumed: false,
        }
    }

    #[must_use]
    pub const fn frame(&self) -> &TrapFrame {
        &*self.frame
    }

    /// Registers the debuggee resumes with.
    pub const fn frame_mut(&mut self) -> &mut TrapFrame {
        &mut *self.frame
    }

    #[must_use]
    pub const fn debugger(&self) -> &Debugger {
        &*self.debugger
    }

    pub const fn debugger_mut(&mut self) -> &mut Debugger {
        &mut *self.debugger
    }

    /// A command has released the debuggee; the loop should return.
    #[must_use]
    pub const fn resumed(&self) -> bool {
        self.resumed
    }

    /// `G [=start] [break]`
    pub fn go(&mut self, start: Option<u32>, brk: Option<u32>) {
        self.debugger.context_mut().clear_step();
        if let Some(eip) = start {
            self.frame.eip = eip;
        }
        if let Some(offset) = brk {
            let at = FarAddress::new(self.frame.code_address().selector, offset);
            self.debugger.breakpoints_mut().set_one_shot(at);
        }
        self.resumed = true;
    }

    /// `T [count]`. A missing or zero count traces once.
    pub fn trace(&mut self, count: Option<u32>) {
        let count = count.unwrap_or(1).max(1);
        self.debugger.context_mut().trace_count = count;
        self.debugger
            .begin_step(self.frame, self.decoder, StepMode::Trace, false);
        self.resumed = true;
    }

    /// `P [RET]`
    pub fn step(&mut self, until_return: bool) {
        self.debugger.context_mut().trace_count = 0;
        self.debugger
            .begin_step(self.frame, self.decoder, StepMode::StepOver, until_return);
        self.resumed = true;
    }

    /// `TABLE`, `TABLE name`, `TABLE R name|prefix*|*`
    ///
    /// # Errors
    /// [`IceError::SyntaxError`] for malformed arguments, [`IceError::NotFound`]
    /// when nothing matches.
    pub fn table(&mut self, arg: Option<&str>, out: &mut dyn Write) -> Result<(), IceError> {
        let mut words = arg.unwrap_or_default().split_whitespace();
        match (words.next(), words.next(), words.next()) {
            (None, ..) => self.list_tables(out).map_err(|_| IceError::TransportFault),
            (Some(r), Some(pattern), None) if r.eq_ignore_ascii_case("r") => {
                let removed = self.debugger.symbols_mut().remove_matching(pattern);
                if removed == 0 {
                    return Err(IceError::NotFound);
                }
                info!("removed {removed} symbol table(s) matching {pattern}");
                Ok(())
            }
            (Some(name), None, _) if !name.eq_ignore_ascii_case("r") => {
                match self.debugger.symbols_mut().select(name) {
                    Ok(_) => Ok(()),
                    Err(LoadError::NotFound) => Err(IceError::NotFound),
                    Err(e) => Err(e.into()),
                }
            }
            _ => Err(IceError::SyntaxError),
        }
    }

    fn list_tables(&self, out: &mut dyn Write) -> fmt::Result {
        let symbols = self.debugger.symbols();
        for t in symbols.summaries() {
            let mark = if t.is_current { '*' } else { ' ' };
            writeln!(out, "{mark}{:<32} {:>8}", t.name, t.size)?;
        }
        writeln!(out, "{} bytes available", symbols.pool().available())
    }

    /// Overwrite the embedded `int3` or `int 1`/`int 3` just before EIP with NOPs.
    ///
    /// # Errors
    /// [`IceError::NotFound`] when the preceding bytes are not a breakpoint
    /// instruction, or the memory error.
    pub fn zap(&mut self) -> Result<(), IceError> {
        let ip = self.frame.code_address();
        let before = |n: u32| FarAddress::new(ip.selector, ip.offset.wrapping_sub(n));

        let last = self.code.read_byte(before(1))?;
        if last == INT3 {
            self.code.write_byte(before(1), NOP)?;
        } else if matches!(last, 0x01 | 0x03) && self.code.read_byte(before(2))? == INT_N {
            self.code.write_byte(before(2), NOP)?;
            self.code.write_byte(before(1), NOP)?;
        } else {
            return Err(IceError::NotFound);
        }
        info!("zapped embedded breakpoint before {ip}");
        Ok(())
    }

    /// `I1HERE [on|off|kernel]`
    ///
    /// # Errors
    /// [`IceError::SyntaxError`] for an unknown argument.
    pub fn i1here(&mut self, arg: Option<&str>, out: &mut dyn Write) -> Result<(), IceError> {
        let policy = &mut self.debugger.context_mut().int1_here;
        embedded_policy("I1Here", policy, arg, out)
    }

    /// `I3HERE [on|off|kernel]`
    ///
    /// # Errors
    /// [`IceError::SyntaxError`] for an unknown argument.
    pub fn i3here(&mut self, arg: Option<&str>, out: &mut dyn Write) -> Result<(), IceError> {
        let policy = &mut self.debugger.context_mut().int3_here;
        embedded_policy("I3Here", policy, arg, out)
    }
}

fn embedded_policy(
    label: &str,
    policy: &mut EmbeddedTrapPolicy,
    arg: Option<&str>,
    out: &mut dyn Write,
) -> Result<(), IceError> {
    match arg.map(str::trim).filter(|a| !a.is_empty()) {
        None => writeln!(out, "{label} is {policy}").map_err(|_| IceError::TransportFault),
        Some(a) => {
            *policy = EmbeddedTrapPolicy::parse(a).ok_or(IceError::SyntaxError)?;
            Ok(())
        }
    }
}
