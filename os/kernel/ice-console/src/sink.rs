use core::fmt;

/// Byte destination for console output.
///
/// Implementations must tolerate being called from trap context with
/// interrupts disabled.
pub trait ConsoleSink: Sync {
    fn write_bytes(&self, bytes: &[u8]);
}

/// The emulator debug port; a no-op on hardware without one.
pub struct DebugPortSink;

impl ConsoleSink for DebugPortSink {
    fn write_bytes(&self, bytes: &[u8]) {
        bytes.iter().copied().for_each(crate::port::putc);
    }
}

/// `fmt::Write` over a sink.
pub struct SinkWriter<'a>(pub &'a dyn ConsoleSink);

impl fmt::Write for SinkWriter<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_bytes(s.as_bytes());
        Ok(())
    }
}
