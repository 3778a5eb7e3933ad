#![allow(dead_code)]

use ice::{CommandLoop, Commands, Debugger, IceConfig};
use ice_registers::{FarAddress, TableDescriptor, TrapFrame};
use ice_step::{BreakpointError, CodeMemory, FlowKind, Instruction, InstructionDecoder};
use ice_symbols::NoHost;
use ice_trap::{SessionEntry, SessionHandler, VectorTable};
use std::collections::{HashMap, VecDeque};
use symtab_abi::writer::{GlobalDef, LineDef, ScopeDef, TableBuilder};

pub const CS: u16 = 0x10;
pub const USER_CS: u16 = 0x23;

#[derive(Default)]
pub struct Decoder(pub HashMap<u32, Instruction>);

impl Decoder {
    pub fn with(mut self, at: u32, len: u32, kind: FlowKind, target: Option<u32>) -> Self {
        self.0.insert(at, Instruction::new(len, kind, target));
        self
    }
}

impl InstructionDecoder for Decoder {
    fn decode(&self, at: FarAddress) -> Instruction {
        self.0.get(&at.offset).copied().unwrap_or(Instruction::other(1))
    }
}

/// Code bytes, all NOPs from 0x1000 to 0x6000 unless set otherwise.
pub struct Memory(pub HashMap<u32, u8>);

impl Default for Memory {
    fn default() -> Self {
        Self((0x1000..0x6000).map(|a| (a, 0x90)).collect())
    }
}

impl Memory {
    pub fn byte(&self, at: u32) -> u8 {
        self.0[&at]
    }
}

impl CodeMemory for Memory {
    fn read_byte(&self, at: FarAddress) -> Result<u8, BreakpointError> {
        self.0
            .get(&at.offset)
            .copied()
            .ok_or(BreakpointError::Unreachable(at))
    }

    fn write_byte(&mut self, at: FarAddress, value: u8) -> Result<(), BreakpointError> {
        match self.0.get_mut(&at.offset) {
            Some(b) => {
                *b = value;
                Ok(())
            }
            None => Err(BreakpointError::Unreachable(at)),
        }
    }
}

type Step = Box<dyn FnMut(&mut Commands<'_>)>;

/// Runs one scripted closure per session; an empty script resumes with `go`.
#[derive(Default)]
pub struct Script {
    steps: VecDeque<Step>,
    pub runs: usize,
}

impl Script {
    pub fn then(mut self, step: impl FnMut(&mut Commands<'_>) + 'static) -> Self {
        self.steps.push_back(Box::new(step));
        self
    }
}

impl CommandLoop for Script {
    fn run(&mut self, commands: &mut Commands<'_>) {
        self.runs += 1;
        match self.steps.pop_front() {
            Some(mut step) => step(commands),
            None => commands.go(None, None),
        }
    }
}

pub fn frame(cs: u16, eip: u32) -> TrapFrame {
    TrapFrame {
        cs: u32::from(cs),
        eip,
        eflags: 0x202,
        ..TrapFrame::default()
    }
}

/// Run one session for a trap on `vector` with `frame`.
pub fn trap(
    debugger: &mut Debugger,
    vector: u8,
    frame: &mut TrapFrame,
    decoder: &Decoder,
    memory: &mut Memory,
    script: &mut Script,
) {
    let host = VectorTable::new();
    let mut entry = SessionEntry {
        vector,
        cpu: 0,
        frame,
        idt: TableDescriptor::default(),
        gdt: TableDescriptor::default(),
        host_table: &host,
    };
    debugger
        .session(decoder, memory, script)
        .run_session(&mut entry);
}

/// `main` 0x1000..0x1040 with lines at +0x00, +0x08, +0x20, and `helper`
/// 0x1040..0x1060.
pub fn program(name: &str) -> Vec<u8> {
    let mut b = TableBuilder::new(name);
    b.globals(&[
        GlobalDef {
            name: "main",
            def: "F1",
            start: 0x1000,
            end: 0x1040,
            file_id: 1,
            data: false,
        },
        GlobalDef {
            name: "helper",
            def: "F1",
            start: 0x1040,
            end: 0x1060,
            file_id: 1,
            data: false,
        },
    ])
    .function_lines(
        0x1000,
        0x1040,
        &[
            LineDef {
                offset: 0x00,
                line: 10,
                file_id: 1,
            },
            LineDef {
                offset: 0x08,
                line: 11,
                file_id: 1,
            },
            LineDef {
                offset: 0x20,
                line: 13,
                file_id: 1,
            },
        ],
    )
    .function_scope(&ScopeDef {
        name: "main",
        file_id: 1,
        start: 0x1000,
        end: 0x1040,
        tokens: &[],
    })
    .function_scope(&ScopeDef {
        name: "helper",
        file_id: 1,
        start: 0x1040,
        end: 0x1060,
        tokens: &[],
    });
    b.finish()
}

pub fn debugger_with_program() -> Debugger {
    let mut d = Debugger::new(IceConfig::new());
    d.symbols_mut()
        .add(&program("mod_a"), &NoHost, &NoHost)
        .unwrap();
    d
}
