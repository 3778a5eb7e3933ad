#![allow(dead_code)]

use ice_symbols::{ImageResolver, LoadedImage, MemoryProbe};
use std::collections::HashMap;
use symtab_abi::TokenKind;
use symtab_abi::writer::{
    GlobalDef, LineDef, ScopeDef, SourceDef, StaticDef, TableBuilder, TokenDef, TypeDef,
    TypedefDef,
};

#[derive(Default)]
pub struct Host {
    pub images: HashMap<String, u32>,
    pub memory: HashMap<u32, u32>,
}

impl Host {
    pub fn with_image(name: &str, entry: u32) -> Self {
        let mut h = Self::default();
        h.images.insert(name.to_owned(), entry);
        h
    }
}

impl ImageResolver for Host {
    fn find_image(&self, name: &str) -> Option<LoadedImage> {
        self.images.get(name).map(|&entry| LoadedImage { entry })
    }
}

impl MemoryProbe for Host {
    fn read_u32(&self, address: u32) -> Option<u32> {
        self.memory.get(&address).copied()
    }
}

/// `mod_a` with one code-flagged global at 0x1000..0x1010.
pub fn minimal(name: &str) -> Vec<u8> {
    let mut b = TableBuilder::new(name);
    b.globals(&[GlobalDef {
        name: "init_module",
        def: "F1",
        start: 0x1000,
        end: 0x1010,
        file_id: 1,
        data: false,
    }]);
    b.finish()
}

/// A table touching every section kind.
///
/// Code: `init_module` 0x1000..0x1040 with three lines, `helper` 0x1040..0x1060.
/// Data: `counter` global at 0x2000, static `state` at 0x2010.
pub fn full(name: &str, reloc: bool) -> Vec<u8> {
    let mut b = TableBuilder::new(name);
    b.source(&SourceDef {
        file_id: 1,
        path: "/src/mod_a",
        name: "mod_a.c",
        line_offsets: &[0, 14, 40, 41],
    })
    .globals(&[
        GlobalDef {
            name: "init_module",
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
        GlobalDef {
            name: "counter",
            def: "G1",
            start: 0x2000,
            end: 0x2004,
            file_id: 1,
            data: true,
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
        name: "init_module",
        file_id: 1,
        start: 0x1000,
        end: 0x1040,
        tokens: &[
            TokenDef {
                kind: TokenKind::Param,
                param: 8,
                name: "argc",
            },
            TokenDef {
                kind: TokenKind::ScopeOpen,
                param: 0,
                name: "",
            },
            TokenDef {
                kind: TokenKind::StackLocal,
                param: 0xFFFF_FFFC,
                name: "i",
            },
            TokenDef {
                kind: TokenKind::ScopeClose,
                param: 0x3C,
                name: "",
            },
        ],
    })
    .statics(
        1,
        &[StaticDef {
            name: "state",
            def: "S1",
            address: 0x2010,
        }],
    )
    .typedefs(
        1,
        &[
            TypedefDef {
                major: 0,
                minor: 1,
                name: "int",
                def: TypeDef::Builtin(symtab_abi::BuiltinType::Int),
            },
            TypedefDef {
                major: 0,
                minor: 2,
                name: "point",
                def: TypeDef::Text("s8x:1,0,32;y:1,32,32;;"),
            },
        ],
    )
    .ignore(&[0xAA; 7]);
    if reloc {
        // data symbol `counter` (0x2000) is referenced by the operand at init+0x10
        b.reloc([(0x1000, 0), (0x2000, 0x10), (0, 0), (0, 0)]);
    }
    b.finish()
}
