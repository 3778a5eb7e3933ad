//! Terminal failure path. Writes straight to the platform console; the
//! logging stack is not trusted at this point.

use crate::counters::{CounterSnapshot, InterruptCounters};
use crate::platform::Platform;
use core::fmt::{self, Write};
use ice_registers::TrapFrame;

struct ConsoleWriter<'a, P: Platform>(&'a P);

impl<P: Platform> Write for ConsoleWriter<'_, P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_console(s);
        Ok(())
    }
}

/// Interrupt number, registers and both counter tables.
///
/// # Errors
/// Whatever `out` reports.
pub fn write_panic_report(
    out: &mut dyn Write,
    context: Option<(u8, &TrapFrame)>,
    counters: &CounterSnapshot,
) -> fmt::Result {
    writeln!(out, "ICE-PANIC")?;
    if let Some((vector, frame)) = context {
        writeln!(out, "Int: {vector:#04x}")?;
        write!(out, "{frame}")?;
    }
    for (label, table) in [("ice", &counters.in_session), ("pass", &counters.passed)] {
        writeln!(out, "{label}:")?;
        for (row, chunk) in table.chunks(8).enumerate() {
            write!(out, "{:02X}:", row * 8)?;
            for n in chunk {
                write!(out, " {n:08X}")?;
            }
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Report and halt with interrupts disabled. Never returns.
pub fn emergency_panic<P: Platform>(
    platform: &P,
    context: Option<(u8, &TrapFrame)>,
    counters: &InterruptCounters,
) -> ! {
    platform.disable_interrupts();
    let _ = write_panic_report(&mut ConsoleWriter(platform), context, &counters.snapshot());
    platform.halt()
}
