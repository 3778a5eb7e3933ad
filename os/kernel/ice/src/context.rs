use crate::config::{EmbeddedTrapPolicy, IceConfig};
use crate::state::DebuggerState;
use core::mem;
use core::ops::Range;
use ice_registers::TrapFrame;
use ice_step::StepMode;
use ice_symbols::{SourceLine, SymbolStore, TableId};

/// Source position of the interrupted code, when symbols cover it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContext {
    pub table: TableId,
    pub function: Range<u32>,
    /// Code range of the current source line.
    pub line: Range<u32>,
    pub position: Option<SourceLine>,
}

impl SourceContext {
    /// Look up the function scope and line map covering `address`.
    #[must_use]
    pub fn at(symbols: &SymbolStore, address: u32) -> Option<Self> {
        let ctx = symbols.function_context(address)?;
        let table = symbols.id_of(ctx.table.name())?;
        let position = symbols.address_to_source_line(address);
        let line_start = position.map_or(ctx.lines.start, |p| p.address);
        Some(Self {
            table,
            function: ctx.scope.start..ctx.scope.end,
            line: line_start..ctx.next_line_address(address),
            position,
        })
    }
}

/// A `TRACE` or `STEP` in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRequest {
    pub mode: StepMode,
    pub until_return: bool,
    /// Where execution may go without ending the step. `None` in machine mode.
    pub bounds: Option<Range<u32>>,
}

/// Live state of the monitored execution.
#[derive(Debug, Clone)]
pub struct DebuggeeContext {
    /// Registers as they were when the session was entered.
    pub frame: TrapFrame,
    pub vector: u8,
    pub cpu: u32,
    pub source: Option<SourceContext>,
    /// Entry action of the next session.
    pub state: DebuggerState,
    /// Entry action restored after a [`DebuggerState::DelayedArm`].
    pub deferred: DebuggerState,
    pub step: Option<StepRequest>,
    /// Traces still to run before the command loop is entered.
    pub trace_count: u32,
    /// The trap flag was set by us for the last resume.
    pub single_step: bool,
    pub int1_here: EmbeddedTrapPolicy,
    pub int3_here: EmbeddedTrapPolicy,
    /// Sessions entered so far.
    pub entries: u64,
}

impl DebuggeeContext {
    #[must_use]
    pub fn new(config: &IceConfig) -> Self {
        Self {
            frame: TrapFrame::default(),
            vector: 0,
            cpu: 0,
            source: None,
            state: DebuggerState::Break,
            deferred: DebuggerState::Break,
            step: None,
            trace_count: 0,
            single_step: false,
            int1_here: config.int1_here,
            int3_here: config.int3_here,
            entries: 0,
        }
    }

    /// Snapshot a trap. Returns whether the trap flag had been set by us.
    pub fn enter(&mut self, vector: u8, cpu: u32, frame: &TrapFrame) -> bool {
        self.frame = *frame;
        self.vector = vector;
        self.cpu = cpu;
        self.entries += 1;
        mem::take(&mut self.single_step)
    }

    /// Entry action for this session, resetting it to `Break`.
    pub fn take_state(&mut self) -> DebuggerState {
        mem::take(&mut self.state)
    }

    /// Forget any stepping in progress.
    pub fn clear_step(&mut self) {
        self.step = None;
        self.trace_count = 0;
        self.state = DebuggerState::Break;
        self.deferred = DebuggerState::Break;
    }
}
