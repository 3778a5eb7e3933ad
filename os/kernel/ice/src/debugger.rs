use crate::commands::CommandLoop;
use crate::config::IceConfig;
use crate::context::{DebuggeeContext, SourceContext, StepRequest};
use crate::session::Session;
use crate::state::DebuggerState;
use crate::transport::{InitPacket, OutputDevice};
use ice_registers::TrapFrame;
use ice_step::{
    Action, BreakpointRegistry, CodeMemory, InstructionDecoder, StepEngine, StepMode, StepPlan,
};
use ice_symbols::SymbolStore;
use log::trace;

/// Everything the debugger owns between sessions.
pub struct Debugger {
    config: IceConfig,
    symbols: SymbolStore,
    breakpoints: BreakpointRegistry,
    context: DebuggeeContext,
    pub(crate) init: Option<InitPacket>,
    pub(crate) output: Option<OutputDevice>,
    pub(crate) holds: u32,
}

impl Debugger {
    #[must_use]
    pub fn new(config: IceConfig) -> Self {
        Self {
            symbols: SymbolStore::new(config.symbol_pool_bytes, config.entry_symbol),
            breakpoints: BreakpointRegistry::new(),
            context: DebuggeeContext::new(&config),
            config,
            init: None,
            output: None,
            holds: 0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &IceConfig {
        &self.config
    }

    #[must_use]
    pub const fn symbols(&self) -> &SymbolStore {
        &self.symbols
    }

    pub const fn symbols_mut(&mut self) -> &mut SymbolStore {
        &mut self.symbols
    }

    #[must_use]
    pub const fn breakpoints(&self) -> &BreakpointRegistry {
        &self.breakpoints
    }

    pub const fn breakpoints_mut(&mut self) -> &mut BreakpointRegistry {
        &mut self.breakpoints
    }

    #[must_use]
    pub const fn context(&self) -> &DebuggeeContext {
        &self.context
    }

    pub const fn context_mut(&mut self) -> &mut DebuggeeContext {
        &mut self.context
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.init.is_some()
    }

    #[must_use]
    pub const fn alternate_output(&self) -> Option<OutputDevice> {
        self.output
    }

    /// Session handler for one trap, wired to its collaborators.
    pub fn session<'a>(
        &'a mut self,
        decoder: &'a dyn InstructionDecoder,
        code: &'a mut dyn CodeMemory,
        commands: &'a mut dyn CommandLoop,
    ) -> Session<'a> {
        Session::new(self, decoder, code, commands)
    }

    /// Start a trace or step from `frame` and set up the resume.
    ///
    /// With symbols for the current address the step is bounded by the
    /// source line, or by the function when running until return. Without
    /// them it works instruction by instruction.
    pub fn begin_step(
        &mut self,
        frame: &mut TrapFrame,
        decoder: &dyn InstructionDecoder,
        mode: StepMode,
        until_return: bool,
    ) {
        let source = SourceContext::at(&self.symbols, frame.eip);
        let bounds = source.as_ref().map(|s| {
            if until_return {
                s.function.clone()
            } else {
                s.line.clone()
            }
        });
        let request = StepRequest {
            mode,
            until_return,
            bounds,
        };
        let plan = self.plan(&request, frame, decoder);
        self.context.source = source;
        self.context.step = Some(request);
        self.apply(plan, frame);
    }

    /// Run the engine again for the step in progress.
    ///
    /// Returns `false` when the step is over: none is active or execution
    /// left its line or function.
    pub fn continue_step(&mut self, frame: &mut TrapFrame, decoder: &dyn InstructionDecoder) -> bool {
        let Some(request) = &self.context.step else {
            return false;
        };
        if let Some(bounds) = &request.bounds
            && !bounds.contains(&frame.eip)
        {
            trace!("left {:08X}..{:08X} at {:08X}", bounds.start, bounds.end, frame.eip);
            return false;
        }
        let plan = self.plan(request, frame, decoder);
        self.apply(plan, frame);
        true
    }

    fn plan(
        &self,
        request: &StepRequest,
        frame: &TrapFrame,
        decoder: &dyn InstructionDecoder,
    ) -> StepPlan {
        let engine = StepEngine::new(decoder, &self.symbols);
        let ip = frame.code_address();
        match &request.bounds {
            Some(bounds) => engine.scan_block(
                ip.selector,
                ip.offset,
                bounds.end,
                ip.offset,
                request.mode,
                request.until_return,
            ),
            None => engine.machine_step(ip, request.mode, request.until_return),
        }
    }

    fn apply(&mut self, plan: StepPlan, frame: &mut TrapFrame) {
        trace!("step plan {plan:?}");
        match plan.action {
            Action::SingleStep => {
                frame.set_single_step(true);
                self.context.single_step = true;
            }
            Action::Breakpoint(at) => {
                self.breakpoints.set_one_shot(at);
            }
        }
        self.context.state = if plan.is_delayed() {
            DebuggerState::DelayedTrace
        } else {
            DebuggerState::Break
        };
    }
}
