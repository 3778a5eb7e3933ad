mod common;

use common::{CS, Decoder, Memory, Script, USER_CS, debugger_with_program, frame, trap};
use ice::{Debugger, DebuggerState, EmbeddedTrapPolicy, IceConfig};
use ice_registers::FarAddress;
use ice_step::FlowKind;
use ice_trap::vector;

#[test]
fn embedded_int3_breaks_when_enabled() {
    let mut d = Debugger::new(IceConfig::new());
    let mut script = Script::default();
    let mut f = frame(CS, 0x5001);
    trap(&mut d, vector::BREAKPOINT, &mut f, &Decoder::default(), &mut Memory::default(), &mut script);
    assert_eq!(script.runs, 1);
    assert_eq!(f.eip, 0x5001, "embedded int3 is not rewound");
    assert_eq!(d.context().vector, vector::BREAKPOINT);
}

#[test]
fn embedded_traps_follow_policy() {
    let config = IceConfig::new()
        .with_int3_here(EmbeddedTrapPolicy::KernelOnly)
        .with_int1_here(EmbeddedTrapPolicy::Off);
    let mut d = Debugger::new(config);
    let mut script = Script::default();
    let decoder = Decoder::default();
    let mut mem = Memory::default();

    trap(&mut d, vector::BREAKPOINT, &mut frame(USER_CS, 0x5001), &decoder, &mut mem, &mut script);
    trap(&mut d, vector::DEBUG, &mut frame(CS, 0x5001), &decoder, &mut mem, &mut script);
    assert_eq!(script.runs, 0);

    trap(&mut d, vector::BREAKPOINT, &mut frame(CS, 0x5001), &decoder, &mut mem, &mut script);
    assert_eq!(script.runs, 1);
}

#[test]
fn other_vectors_always_break() {
    let mut d = Debugger::new(IceConfig::new());
    let mut script = Script::default();
    trap(&mut d, vector::TIMER, &mut frame(CS, 0x5000), &Decoder::default(), &mut Memory::default(), &mut script);
    assert_eq!(script.runs, 1);
    assert_eq!(d.context().entries, 1);
}

#[test]
fn go_with_breakpoint_plants_and_consumes_one_shot() {
    let mut d = Debugger::new(IceConfig::new());
    let decoder = Decoder::default();
    let mut mem = Memory::default();
    mem.0.insert(0x5010, 0x55);
    let mut script = Script::default().then(|c| c.go(None, Some(0x5010)));

    trap(&mut d, vector::TIMER, &mut frame(CS, 0x5000), &decoder, &mut mem, &mut script);
    assert_eq!(mem.byte(0x5010), 0xCC);

    let mut f = frame(CS, 0x5011);
    trap(&mut d, vector::BREAKPOINT, &mut f, &decoder, &mut mem, &mut script);
    assert_eq!(script.runs, 2);
    assert_eq!(f.eip, 0x5010);
    assert_eq!(mem.byte(0x5010), 0x55);
    assert_eq!(d.breakpoints().one_shot(), None);
}

#[test]
fn go_relocates_eip() {
    let mut d = Debugger::new(IceConfig::new());
    let mut script = Script::default().then(|c| c.go(Some(0x5400), None));
    let mut f = frame(CS, 0x5000);
    trap(&mut d, vector::TIMER, &mut f, &Decoder::default(), &mut Memory::default(), &mut script);
    assert_eq!(f.eip, 0x5400);
}

#[test]
fn step_over_call_finishes_the_line() {
    let mut d = debugger_with_program();
    let decoder = Decoder::default().with(0x1008, 5, FlowKind::Call, Some(0x1040));
    let mut mem = Memory::default();
    let mut script = Script::default().then(|c| c.step(false));

    // Stopped at the start of line 11 (0x1008..0x1020).
    trap(&mut d, vector::TIMER, &mut frame(CS, 0x1008), &decoder, &mut mem, &mut script);
    assert_eq!(mem.byte(0x100D), 0xCC, "breakpoint after the call");
    assert_eq!(d.context().state, DebuggerState::DelayedTrace);

    // Call returned: the engine plans the rest of the line without stopping.
    let mut f = frame(CS, 0x100E);
    trap(&mut d, vector::BREAKPOINT, &mut f, &decoder, &mut mem, &mut script);
    assert_eq!(script.runs, 1);
    assert_eq!(f.eip, 0x100D);
    assert_eq!(mem.byte(0x100D), 0x90);
    assert_eq!(mem.byte(0x1020), 0xCC, "breakpoint at the next line");

    // Next line reached: back to the operator.
    trap(&mut d, vector::BREAKPOINT, &mut frame(CS, 0x1021), &decoder, &mut mem, &mut script);
    assert_eq!(script.runs, 2);
    assert_eq!(mem.byte(0x1020), 0x90);
    assert_eq!(
        d.context().source.as_ref().and_then(|s| s.position).map(|p| p.line),
        Some(13)
    );
}

#[test]
fn trace_enters_symbolized_call() {
    let mut d = debugger_with_program();
    let decoder = Decoder::default().with(0x1008, 5, FlowKind::Call, Some(0x1040));
    let mut mem = Memory::default();
    let mut script = Script::default().then(|c| c.trace(None));

    trap(&mut d, vector::TIMER, &mut frame(CS, 0x1008), &decoder, &mut mem, &mut script);
    assert_eq!(d.breakpoints().one_shot(), Some(FarAddress::new(CS, 0x1040)));
    assert_eq!(d.context().state, DebuggerState::Break);
}

#[test]
fn conditional_jump_leaving_the_line_stops() {
    let mut d = debugger_with_program();
    let decoder = Decoder::default().with(0x1008, 2, FlowKind::ConditionalJump, Some(0x1030));
    let mut mem = Memory::default();
    let mut script = Script::default().then(|c| c.step(false));

    let mut f = frame(CS, 0x1008);
    trap(&mut d, vector::TIMER, &mut f, &decoder, &mut mem, &mut script);
    assert!(f.flags().tf_trap());
    assert_eq!(d.context().state, DebuggerState::DelayedTrace);

    // Branch taken to line 13.
    let mut f = frame(CS, 0x1030);
    f.set_single_step(true);
    trap(&mut d, vector::DEBUG, &mut f, &decoder, &mut mem, &mut script);
    assert_eq!(script.runs, 2);
    assert!(!f.flags().tf_trap());
}

#[test]
fn trace_count_repeats_without_command_loop() {
    let mut d = Debugger::new(IceConfig::new());
    let decoder = Decoder::default();
    let mut mem = Memory::default();
    let mut script = Script::default().then(|c| c.trace(Some(3)));

    let mut f = frame(CS, 0x5000);
    trap(&mut d, vector::TIMER, &mut f, &decoder, &mut mem, &mut script);
    assert!(f.flags().tf_trap());

    for eip in [0x5001, 0x5002] {
        let mut f = frame(CS, eip);
        f.set_single_step(true);
        trap(&mut d, vector::DEBUG, &mut f, &decoder, &mut mem, &mut script);
        assert_eq!(script.runs, 1, "still tracing at {eip:#x}");
        assert!(f.flags().tf_trap());
    }

    let mut f = frame(CS, 0x5003);
    f.set_single_step(true);
    trap(&mut d, vector::DEBUG, &mut f, &decoder, &mut mem, &mut script);
    assert_eq!(script.runs, 2);
    assert_eq!(d.context().trace_count, 0);
}

#[test]
fn resuming_on_sticky_breakpoint_steps_off_first() {
    let mut d = Debugger::new(IceConfig::new());
    let decoder = Decoder::default();
    let mut mem = Memory::default();
    mem.0.insert(0x5000, 0x8B);
    d.breakpoints_mut().set_sticky(FarAddress::new(CS, 0x5000)).unwrap();
    let mut script = Script::default();

    // Hit the sticky breakpoint, then `go`.
    let mut f = frame(CS, 0x5001);
    trap(&mut d, vector::BREAKPOINT, &mut f, &decoder, &mut mem, &mut script);
    assert_eq!(f.eip, 0x5000);
    assert!(f.flags().tf_trap());
    assert_eq!(mem.byte(0x5000), 0x8B, "not armed under EIP");
    assert_eq!(d.context().state, DebuggerState::DelayedArm);

    // One instruction later the breakpoint goes back in, no command loop.
    let mut f = frame(CS, 0x5002);
    f.set_single_step(true);
    trap(&mut d, vector::DEBUG, &mut f, &decoder, &mut mem, &mut script);
    assert_eq!(script.runs, 1);
    assert!(!f.flags().tf_trap());
    assert_eq!(mem.byte(0x5000), 0xCC);
    assert_eq!(d.context().state, DebuggerState::Break);
}

#[test]
fn step_until_return_in_machine_mode() {
    let mut d = Debugger::new(IceConfig::new());
    let decoder = Decoder::default().with(0x5002, 1, FlowKind::Return, None);
    let mut mem = Memory::default();
    let mut script = Script::default().then(|c| c.step(true));

    trap(&mut d, vector::TIMER, &mut frame(CS, 0x5000), &decoder, &mut mem, &mut script);
    for eip in [0x5001, 0x5002] {
        let mut f = frame(CS, eip);
        f.set_single_step(true);
        trap(&mut d, vector::DEBUG, &mut f, &decoder, &mut mem, &mut script);
        assert_eq!(script.runs, 1);
        assert!(f.flags().tf_trap());
    }
    // Back in the caller.
    let mut f = frame(CS, 0x5300);
    f.set_single_step(true);
    trap(&mut d, vector::DEBUG, &mut f, &decoder, &mut mem, &mut script);
    assert_eq!(script.runs, 2);
}
