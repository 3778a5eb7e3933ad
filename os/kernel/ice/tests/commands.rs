mod common;

use common::{CS, Decoder, Memory, debugger_with_program, frame};
use ice::{Commands, EmbeddedTrapPolicy, IceError};
use ice_symbols::NoHost;

fn with_commands<R>(
    mem: &mut Memory,
    eip: u32,
    f: impl FnOnce(&mut Commands<'_>) -> R,
) -> (R, ice::Debugger) {
    let mut d = debugger_with_program();
    d.symbols_mut()
        .add(&common::program("mod_b"), &NoHost, &NoHost)
        .unwrap();
    d.symbols_mut()
        .add(&common::program("other"), &NoHost, &NoHost)
        .unwrap();
    let decoder = Decoder::default();
    let mut fr = frame(CS, eip);
    let r = {
        let mut c = Commands::new(&mut d, &mut fr, &decoder, mem);
        f(&mut c)
    };
    (r, d)
}

#[test]
fn table_lists_with_current_marked() {
    let mut out = String::new();
    let (r, d) = with_commands(&mut Memory::default(), 0x5000, |c| c.table(None, &mut out));
    r.unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("*other"));
    assert!(lines[1].starts_with(" mod_b"));
    assert!(lines[2].starts_with(" mod_a"));
    assert_eq!(
        lines[3],
        format!("{} bytes available", d.symbols().pool().available())
    );
}

#[test]
fn table_selects_by_name() {
    let (r, d) = with_commands(&mut Memory::default(), 0x5000, |c| c.table(Some("mod_a"), &mut String::new()));
    r.unwrap();
    assert_eq!(d.symbols().current().map(|t| t.name()), Some("mod_a"));

    let (r, _) = with_commands(&mut Memory::default(), 0x5000, |c| c.table(Some("nope"), &mut String::new()));
    assert_eq!(r, Err(IceError::NotFound));
}

#[test]
fn table_removes_by_pattern() {
    let (r, d) = with_commands(&mut Memory::default(), 0x5000, |c| c.table(Some("r mod_*"), &mut String::new()));
    r.unwrap();
    assert_eq!(d.symbols().len(), 1);

    let (r, d) = with_commands(&mut Memory::default(), 0x5000, |c| c.table(Some("R *"), &mut String::new()));
    r.unwrap();
    assert!(d.symbols().is_empty());
    assert_eq!(d.symbols().pool().used(), 0);
}

#[test]
fn table_rejects_malformed_arguments() {
    for arg in ["R", "r a b", "a b"] {
        let (r, d) = with_commands(&mut Memory::default(), 0x5000, |c| c.table(Some(arg), &mut String::new()));
        assert_eq!(r, Err(IceError::SyntaxError), "{arg}");
        assert_eq!(d.symbols().len(), 3);
    }
}

#[test]
fn zap_replaces_int3() {
    let mut mem = Memory::default();
    mem.0.insert(0x5000, 0xCC);
    let (r, _) = with_commands(&mut mem, 0x5001, |c| c.zap());
    r.unwrap();
    assert_eq!(mem.byte(0x5000), 0x90);
}

#[test]
fn zap_replaces_int_n() {
    let mut mem = Memory::default();
    mem.0.insert(0x5000, 0xCD);
    mem.0.insert(0x5001, 0x03);
    let (r, _) = with_commands(&mut mem, 0x5002, |c| c.zap());
    r.unwrap();
    assert_eq!((mem.byte(0x5000), mem.byte(0x5001)), (0x90, 0x90));
}

#[test]
fn zap_leaves_other_code_alone() {
    let mut mem = Memory::default();
    mem.0.insert(0x5000, 0xCD);
    mem.0.insert(0x5001, 0x80);
    let (r, _) = with_commands(&mut mem, 0x5002, |c| c.zap());
    assert_eq!(r, Err(IceError::NotFound));
    assert_eq!(mem.byte(0x5001), 0x80);
}

#[test]
fn embedded_trap_policies() {
    let mut out = String::new();
    let (r, d) = with_commands(&mut Memory::default(), 0x5000, |c| {
        c.i3here(None, &mut out)?;
        c.i1here(Some("kernel"), &mut out)?;
        c.i3here(Some("OFF"), &mut out)?;
        c.i1here(Some("sometimes"), &mut out)
    });
    assert_eq!(r, Err(IceError::SyntaxError));
    assert_eq!(out, "I3Here is on\n");
    assert_eq!(d.context().int1_here, EmbeddedTrapPolicy::KernelOnly);
    assert_eq!(d.context().int3_here, EmbeddedTrapPolicy::Off);
}

#[test]
fn resume_commands_mark_resumed() {
    let (resumed, _) = with_commands(&mut Memory::default(), 0x5000, |c| {
        assert!(!c.resumed());
        c.go(None, None);
        c.resumed()
    });
    assert!(resumed);
}
