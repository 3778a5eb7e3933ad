//! Requests from the loader process: setup, teardown, symbol tables and history.

use crate::debugger::Debugger;
use crate::error::IceError;
use ice_symbols::{ImageResolver, MemoryProbe, TableId};
use ice_trap::{Dispatcher, Platform};
use log::{info, warn};

/// Host kernel addresses the loader resolved from its symbol map.
pub const SYSTEM_MAP_ENTRIES: usize = 8;

/// One-time setup handed over by the loader.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InitPacket {
    /// Host keyboard handler the debugger chains to.
    pub keyboard_hook: u32,
    /// Opaque to the core; consumed by the platform layer.
    pub system_map: [u32; SYSTEM_MAP_ENTRIES],
}

/// Where session output goes besides the text console.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputDevice {
    Framebuffer {
        base: u32,
        width: u16,
        height: u16,
        stride: u32,
    },
    Serial {
        port: u8,
        baud: u32,
    },
}

/// The kernel history buffer, read line by line.
pub trait HistorySource {
    /// Move the read cursor back at most `max_lines` lines from the end.
    fn rewind(&mut self, max_lines: usize);

    /// Next line, or `None` past the end.
    fn next_line(&mut self) -> Option<&str>;
}

pub struct Transport<'a, P: Platform> {
    debugger: &'a mut Debugger,
    dispatcher: &'a Dispatcher<P>,
}

impl<'a, P: Platform> Transport<'a, P> {
    pub const fn new(debugger: &'a mut Debugger, dispatcher: &'a Dispatcher<P>) -> Self {
        Self {
            debugger,
            dispatcher,
        }
    }

    /// Accept the setup packet and hook the permanent vectors.
    ///
    /// # Errors
    /// [`IceError::AlreadyInitialized`] on a second call; hook failures.
    pub fn initialize(&mut self, packet: InitPacket) -> Result<(), IceError> {
        if self.debugger.init.is_some() {
            return Err(IceError::AlreadyInitialized);
        }
        self.dispatcher.install_permanent_hooks()?;
        self.debugger.init = Some(packet);
        info!("initialized, keyboard hook at {:08X}", packet.keyboard_hook);
        Ok(())
    }

    /// # Errors
    /// [`IceError::NotInitialized`] before [`initialize`](Self::initialize).
    pub fn initialize_alternate_output(&mut self, device: OutputDevice) -> Result<(), IceError> {
        if self.debugger.init.is_none() {
            return Err(IceError::NotInitialized);
        }
        self.debugger.output = Some(device);
        info!("alternate output {device:?}");
        Ok(())
    }

    /// A loader process opened the device.
    pub const fn acquire(&mut self) {
        self.debugger.holds += 1;
    }

    pub const fn release(&mut self) {
        self.debugger.holds = self.debugger.holds.saturating_sub(1);
    }

    #[must_use]
    pub const fn holds(&self) -> u32 {
        self.debugger.holds
    }

    /// Detach from the host before unloading.
    ///
    /// # Errors
    /// [`IceError::InUse`] while holds remain; hook failures.
    pub fn exit(&mut self) -> Result<(), IceError> {
        let holds = self.debugger.holds;
        if holds > 0 {
            return Err(IceError::InUse { holds });
        }
        if self.debugger.init.is_some() {
            self.dispatcher.remove_permanent_hooks()?;
            self.debugger.init = None;
            self.debugger.output = None;
        }
        info!("detached");
        Ok(())
    }

    /// [`exit`](Self::exit) after dropping every hold.
    ///
    /// # Errors
    /// Hook failures.
    pub fn force_exit(&mut self) -> Result<(), IceError> {
        if self.debugger.holds > 0 {
            warn!("dropping {} holds", self.debugger.holds);
            self.debugger.holds = 0;
        }
        self.exit()
    }

    /// # Errors
    /// See [`ice_symbols::LoadError`].
    pub fn add_symbol_table(
        &mut self,
        raw: &[u8],
        host: &dyn ImageResolver,
        probe: &dyn MemoryProbe,
    ) -> Result<TableId, IceError> {
        Ok(self.debugger.symbols_mut().add(raw, host, probe)?)
    }

    /// # Errors
    /// [`IceError::NotFound`] if no table has that name.
    pub fn remove_symbol_table(&mut self, name: &str) -> Result<(), IceError> {
        if self.debugger.symbols_mut().remove(name) {
            Ok(())
        } else {
            Err(IceError::NotFound)
        }
    }

    pub fn reset_history(&self, history: &mut dyn HistorySource) {
        history.rewind(self.debugger.config().history_lines);
    }

    /// Copy the next history line into `buf` as a NUL-terminated string,
    /// truncating to fit. Returns the bytes written without the NUL.
    ///
    /// # Errors
    /// [`IceError::HistoryExhausted`] past the last line,
    /// [`IceError::TransportFault`] for an empty buffer.
    pub fn read_history_line(
        &self,
        history: &mut dyn HistorySource,
        buf: &mut [u8],
    ) -> Result<usize, IceError> {
        let Some(room) = buf.len().checked_sub(1) else {
            return Err(IceError::TransportFault);
        };
        let line = history.next_line().ok_or(IceError::HistoryExhausted)?;
        let n = line.len().min(room);
        buf[..n].copy_from_slice(&line.as_bytes()[..n]);
        buf[n] = 0;
        Ok(n)
    }
}
