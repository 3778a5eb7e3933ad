use ice_registers::FarAddress;

/// Control-flow behavior of one instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FlowKind {
    Jump,
    ConditionalJump,
    Call,
    /// `ret`, `retf` and `iret`.
    Return,
    /// `int n`, `into` and `int3`.
    Interrupt,
    Other,
}

/// Decoder output for one instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Instruction {
    len: u32,
    pub kind: FlowKind,
    /// Branch target when it is known statically.
    pub target: Option<u32>,
}

impl Instruction {
    /// A length of zero is taken as one so a scan always advances.
    #[must_use]
    pub const fn new(len: u32, kind: FlowKind, target: Option<u32>) -> Self {
        Self {
            len: if len == 0 { 1 } else { len },
            kind,
            target,
        }
    }

    #[must_use]
    pub const fn other(len: u32) -> Self {
        Self::new(len, FlowKind::Other, None)
    }

    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    /// Address of the instruction that follows one decoded at `at`.
    #[must_use]
    pub const fn next(&self, at: u32) -> u32 {
        at.wrapping_add(self.len)
    }
}

/// Disassembler front end.
pub trait InstructionDecoder {
    fn decode(&self, at: FarAddress) -> Instruction;
}
