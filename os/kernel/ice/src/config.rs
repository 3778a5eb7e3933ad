use core::fmt;
use ice_trap::{DispatchConfig, ProbeRegion};
use log::LevelFilter;

/// What to do with an `int1`/`int3` the debugger did not plant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum EmbeddedTrapPolicy {
    /// Resume as if nothing happened.
    Off,
    /// Always break.
    On,
    /// Break only when the trap came from ring 0.
    KernelOnly,
}

impl EmbeddedTrapPolicy {
    /// Whether a trap from code running at `rpl` enters a session.
    #[must_use]
    pub const fn allows(self, rpl: u8) -> bool {
        match self {
            Self::Off => false,
            Self::On => true,
            Self::KernelOnly => rpl == 0,
        }
    }

    /// `on`, `off` or `kernel`, case-insensitive.
    #[must_use]
    pub fn parse(arg: &str) -> Option<Self> {
        [Self::On, Self::Off, Self::KernelOnly]
            .into_iter()
            .find(|p| arg.eq_ignore_ascii_case(p.keyword()))
    }

    const fn keyword(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::KernelOnly => "kernel",
        }
    }
}

impl fmt::Display for EmbeddedTrapPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Debugger settings, fixed at load time.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IceConfig {
    /// Budget for all symbol tables together.
    pub symbol_pool_bytes: usize,
    /// Global whose load address anchors relocation.
    pub entry_symbol: &'static str,
    pub log_level: LevelFilter,
    pub int1_here: EmbeddedTrapPolicy,
    pub int3_here: EmbeddedTrapPolicy,
    /// Timer ticks between serial polls while a session runs.
    pub serial_poll_ticks: u32,
    /// Timer ticks per cursor blink phase.
    pub cursor_blink_ticks: u32,
    /// How many history lines a transport read starts back from.
    pub history_lines: usize,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl IceConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            symbol_pool_bytes: 64 * 1024,
            entry_symbol: "init_module",
            log_level: LevelFilter::Info,
            int1_here: EmbeddedTrapPolicy::Off,
            int3_here: EmbeddedTrapPolicy::On,
            serial_poll_ticks: 2,
            cursor_blink_ticks: 50,
            history_lines: 2048,
        }
    }

    #[must_use]
    pub const fn with_symbol_pool_bytes(mut self, bytes: usize) -> Self {
        self.symbol_pool_bytes = bytes;
        self
    }

    #[must_use]
    pub const fn with_entry_symbol(mut self, name: &'static str) -> Self {
        self.entry_symbol = name;
        self
    }

    #[must_use]
    pub const fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }

    #[must_use]
    pub const fn with_int1_here(mut self, policy: EmbeddedTrapPolicy) -> Self {
        self.int1_here = policy;
        self
    }

    #[must_use]
    pub const fn with_int3_here(mut self, policy: EmbeddedTrapPolicy) -> Self {
        self.int3_here = policy;
        self
    }

    #[must_use]
    pub const fn with_timers(mut self, serial_poll_ticks: u32, cursor_blink_ticks: u32) -> Self {
        self.serial_poll_ticks = serial_poll_ticks;
        self.cursor_blink_ticks = cursor_blink_ticks;
        self
    }

    #[must_use]
    pub const fn with_history_lines(mut self, lines: usize) -> Self {
        self.history_lines = lines;
        self
    }

    /// Dispatcher settings for a probe region the platform reports.
    #[must_use]
    pub const fn dispatch(&self, probe: ProbeRegion) -> DispatchConfig {
        DispatchConfig {
            probe,
            serial_poll_ticks: self.serial_poll_ticks,
            cursor_blink_ticks: self.cursor_blink_ticks,
        }
    }
}
