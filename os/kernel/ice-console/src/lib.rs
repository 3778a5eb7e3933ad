//! # Debugger console output
//!
//! Diagnostic output for the debugger core that works from trap context:
//! no allocation, no locks, byte-at-a-time writes.
//!
//! * [`ConsoleLogger`] is the `log::Log` backend. Records are formatted as
//!   `"[LEVEL] target: message\n"` straight into a [`ConsoleSink`].
//! * [`ice_trace!`] bypasses `log` and writes to the emulator debug port
//!   (I/O port `0x402`). It compiles to nothing without the `enabled` feature.
//! * [`SinkWriter`] adapts any sink to `core::fmt::Write`, which is what the
//!   emergency panic report is written through.
//!
//! ```rust,ignore
//! use ice_console::{ConsoleLogger, DebugPortSink};
//! use log::LevelFilter;
//!
//! static LOGGER: ConsoleLogger = ConsoleLogger::new(LevelFilter::Debug, &DebugPortSink);
//! ice_console::init(&LOGGER).ok();
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod logger;
mod sink;

pub use logger::{ConsoleLogger, init};
pub use sink::{ConsoleSink, DebugPortSink, SinkWriter};

#[cfg(feature = "enabled")]
#[doc(hidden)]
pub mod port {
    use core::fmt;

    /// Emulator debug console port.
    pub const DEBUG_PORT: u16 = 0x402;

    #[allow(clippy::inline_always)]
    #[inline(always)]
    pub fn putc(c: u8) {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        unsafe {
            core::arch::asm!(
                "out dx, al",
                in("dx") DEBUG_PORT,
                in("al") c,
                options(nomem, nostack, preserves_flags)
            );
        }
        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
        let _ = c;
    }

    struct PortWriter;

    impl fmt::Write for PortWriter {
        #[inline]
        fn write_str(&mut self, s: &str) -> fmt::Result {
            s.bytes().for_each(putc);
            Ok(())
        }
    }

    #[doc(hidden)]
    #[inline]
    pub fn write(args: fmt::Arguments) {
        // Best effort; nothing to report a failure to.
        let _ = fmt::write(&mut PortWriter, args);
    }
}

#[cfg(not(feature = "enabled"))]
#[doc(hidden)]
pub mod port {
    use core::fmt;

    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub const fn putc(_: u8) {}

    #[doc(hidden)]
    #[inline(always)]
    #[allow(clippy::inline_always)]
    pub fn write(_: fmt::Arguments) {}
}

/// Formats straight to the debug port, bypassing `log`.
#[macro_export]
macro_rules! ice_trace {
    ($($arg:tt)*) => {{
        $crate::port::write(core::format_args!($($arg)*));
    }};
}
