use ice_registers::{TableDescriptor, TrapFrame};
use ice_trap::{
    Chain, DispatchConfig, Dispatcher, Gate, HookError, PROBE_FAULT_PAGE, Platform, ProbeRegion,
    SessionEntry, SessionHandler, Timer, vector, write_panic_report,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

const HOST_IDT: TableDescriptor = TableDescriptor::new(0x0010_0000, 256 * 8 - 1);
const ABSENT: u8 = 0x05;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Event {
    Clamp,
    Unclamp,
    Ack(u8),
    Enable,
    Disable,
    StoreIdt,
    LoadIdt(u32),
    Signal,
    Keyboard,
    Serial(u8),
    WriteGate(u8),
}

struct MockPlatform {
    events: Mutex<Vec<Event>>,
    gates: Mutex<HashMap<u8, Gate>>,
    loaded: Mutex<TableDescriptor>,
    console: Mutex<String>,
    /// Vectors the interrupt controllers deliver through another entry.
    redirects: HashMap<u8, u8>,
}

fn host_handler(v: u8) -> u32 {
    0x8000_0000 | u32::from(v)
}

impl MockPlatform {
    fn new() -> Self {
        let gates = (0u8..=0x30)
            .filter(|&v| v != ABSENT)
            .map(|v| {
                let mut g = Gate::MISSING;
                g.set_handler(host_handler(v)).selector(0x10).present(true);
                (v, g)
            })
            .collect();
        Self {
            events: Mutex::new(Vec::new()),
            gates: Mutex::new(gates),
            loaded: Mutex::new(HOST_IDT),
            console: Mutex::new(String::new()),
            redirects: HashMap::new(),
        }
    }

    fn redirect(mut self, vector: u8, entry: u8) -> Self {
        self.redirects.insert(vector, entry);
        self
    }

    fn push(&self, e: Event) {
        self.events.lock().unwrap().push(e);
    }

    fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn live_gate(&self, v: u8) -> Gate {
        self.gates.lock().unwrap().get(&v).copied().unwrap_or(Gate::MISSING)
    }
}

impl Platform for MockPlatform {
    fn cpu_id(&self) -> u32 {
        0
    }
    fn clamp_interrupts(&self, _cpu: u32) {
        self.push(Event::Clamp);
    }
    fn unclamp_interrupts(&self) {
        self.push(Event::Unclamp);
    }
    fn acknowledge(&self, vector: u8) {
        self.push(Event::Ack(vector));
    }
    fn enable_interrupts(&self) {
        self.push(Event::Enable);
    }
    fn disable_interrupts(&self) {
        self.push(Event::Disable);
    }
    fn store_idt(&self) -> TableDescriptor {
        self.push(Event::StoreIdt);
        *self.loaded.lock().unwrap()
    }
    fn store_gdt(&self) -> TableDescriptor {
        TableDescriptor::new(0x0020_0000, 0xFF)
    }
    fn load_idt(&self, idt: TableDescriptor) {
        self.push(Event::LoadIdt(idt.base));
        *self.loaded.lock().unwrap() = idt;
    }
    fn read_gate(&self, idt: TableDescriptor, vector: u8) -> Gate {
        assert_eq!(idt, HOST_IDT);
        self.live_gate(vector)
    }
    fn write_gate(&self, idt: TableDescriptor, vector: u8, gate: Gate) {
        assert_eq!(idt, HOST_IDT);
        self.push(Event::WriteGate(vector));
        self.gates.lock().unwrap().insert(vector, gate);
    }
    fn signal_other_cpus(&self) {
        self.push(Event::Signal);
    }
    fn stub_address(&self, vector: u8) -> u32 {
        0xC000_0000 | u32::from(vector)
    }
    fn kernel_cs(&self) -> u16 {
        0x10
    }
    fn original_vector(&self, vector: u8) -> u8 {
        if let Some(&entry) = self.redirects.get(&vector) {
            entry
        } else if (0x60..0x70).contains(&vector) {
            vector - 0x40
        } else {
            vector
        }
    }
    fn service_keyboard(&self) {
        self.push(Event::Keyboard);
    }
    fn service_serial(&self, port: u8) {
        self.push(Event::Serial(port));
    }
    fn write_console(&self, text: &str) {
        self.console.lock().unwrap().push_str(text);
    }
    fn halt(&self) -> ! {
        panic!("halted");
    }
}

const PROBE: ProbeRegion = ProbeRegion::new(0x5000, 0x5100, 0x5200);

fn dispatcher() -> Dispatcher<MockPlatform> {
    dispatcher_on(MockPlatform::new())
}

fn dispatcher_on(platform: MockPlatform) -> Dispatcher<MockPlatform> {
    Dispatcher::new(
        platform,
        DispatchConfig {
            probe: PROBE,
            serial_poll_ticks: 3,
            cursor_blink_ticks: 10,
        },
    )
}

struct Session<F>(F);

impl<F: FnMut(&mut SessionEntry<'_>)> SessionHandler for Session<F> {
    fn run_session(&mut self, entry: &mut SessionEntry<'_>) {
        (self.0)(entry);
    }
}

fn kernel_frame() -> TrapFrame {
    TrapFrame {
        cs: 0x10,
        eip: 0xC010_0000,
        ..TrapFrame::default()
    }
}

/// `needle` appears in `haystack` in order, not necessarily adjacent.
fn is_subsequence(needle: &[Event], haystack: &[Event]) -> bool {
    let mut it = haystack.iter();
    needle.iter().all(|n| it.any(|h| h == n))
}

#[test]
fn session_entry_runs_in_order() {
    let d = dispatcher();
    d.install_permanent_hooks().unwrap();
    assert_eq!(d.platform().live_gate(vector::TIMER).offset(), 0xC000_0020);

    let mut seen = None;
    let mut handler = Session(|entry: &mut SessionEntry<'_>| {
        seen = Some((
            entry.vector,
            entry.idt,
            entry.host_table[vector::TIMER].offset(),
            entry.host_table[ABSENT].is_present(),
        ));
    });
    let mut frame = kernel_frame();
    let chain = d.dispatch(vector::BREAKPOINT, &mut frame, &mut handler);

    assert_eq!(chain, Chain::Resume);
    let (v, idt, timer, absent) = seen.unwrap();
    assert_eq!(v, vector::BREAKPOINT);
    assert_eq!(idt, HOST_IDT);
    assert_eq!(timer, host_handler(vector::TIMER), "host table shows unhooked gates");
    assert!(!absent);

    let events = d.platform().events();
    let shadow = events
        .iter()
        .find_map(|e| match e {
            Event::LoadIdt(base) if *base != HOST_IDT.base => Some(*base),
            _ => None,
        })
        .unwrap();
    assert!(is_subsequence(
        &[
            Event::Clamp,
            Event::Ack(vector::BREAKPOINT),
            Event::StoreIdt,
            Event::LoadIdt(shadow),
            Event::Enable,
            Event::Signal,
            Event::Disable,
            Event::LoadIdt(HOST_IDT.base),
            Event::Unclamp,
        ],
        &events
    ));

    // Hooks are back in the host table and the guard is free.
    assert_eq!(d.platform().live_gate(vector::TIMER).offset(), 0xC000_0020);
    assert!(!d.is_session_active());
    assert!(!d.rendezvous().is_holding());
}

#[test]
fn shadow_table_is_loaded_during_session() {
    let d = dispatcher();
    let mut loaded = TableDescriptor::default();
    let mut handler = Session(|_: &mut SessionEntry<'_>| {
        loaded = *d.platform().loaded.lock().unwrap();
    });
    d.dispatch(vector::DEBUG, &mut kernel_frame(), &mut handler);
    assert_ne!(loaded, HOST_IDT);
    assert_eq!(loaded.limit, 256 * 8 - 1);
    assert_eq!(*d.platform().loaded.lock().unwrap(), HOST_IDT);
}

#[test]
fn plain_timer_tick_is_forwarded() {
    let d = dispatcher();
    d.install_permanent_hooks().unwrap();
    let mut calls = 0;
    let mut handler = Session(|_: &mut SessionEntry<'_>| calls += 1);

    let chain = d.dispatch(vector::TIMER, &mut kernel_frame(), &mut handler);
    assert_eq!(chain, Chain::Forward(host_handler(vector::TIMER)));
    assert_eq!(calls, 0);
    assert_eq!(d.counters().snapshot().passed[usize::from(vector::TIMER)], 1);
    assert!(!d.platform().events().contains(&Event::Ack(vector::TIMER)));
}

#[test]
fn requested_break_enters_on_next_tick() {
    let d = dispatcher();
    d.install_permanent_hooks().unwrap();
    let mut calls = 0;
    let mut handler = Session(|entry: &mut SessionEntry<'_>| {
        assert_eq!(entry.vector, vector::TIMER);
        calls += 1;
    });

    d.request_break();
    assert_eq!(
        d.dispatch(vector::TIMER, &mut kernel_frame(), &mut handler),
        Chain::Resume
    );
    assert_eq!(
        d.dispatch(vector::TIMER, &mut kernel_frame(), &mut handler),
        Chain::Forward(host_handler(vector::TIMER))
    );
    assert_eq!(calls, 1);
}

#[test]
fn in_session_devices_are_serviced_locally() {
    let d = dispatcher();
    let mut results = Vec::new();
    let mut handler = Session(|_: &mut SessionEntry<'_>| {
        let mut f = kernel_frame();
        for v in [
            vector::TIMER,
            vector::KEYBOARD,
            vector::MOUSE,
            vector::COM1,
            vector::COM2,
            0x2A,
        ] {
            results.push((v, d.dispatch(v, &mut f, &mut Session(|_: &mut SessionEntry<'_>| {
                panic!("nested session")
            }))));
        }
    });
    d.dispatch(vector::BREAKPOINT, &mut kernel_frame(), &mut handler);

    assert_eq!(
        results,
        vec![
            (vector::TIMER, Chain::Resume),
            (vector::KEYBOARD, Chain::Resume),
            (vector::MOUSE, Chain::Resume),
            (vector::COM1, Chain::Resume),
            (vector::COM2, Chain::Resume),
            (0x2A, Chain::Forward(host_handler(0x2A))),
        ]
    );
    let events = d.platform().events();
    assert!(is_subsequence(
        &[
            Event::Ack(vector::TIMER),
            Event::Keyboard,
            Event::Ack(vector::KEYBOARD),
            Event::Keyboard,
            Event::Serial(0),
            Event::Serial(1),
        ],
        &events
    ));
    assert!(!events.contains(&Event::Ack(0x2A)));
    assert_eq!(d.timers().remaining(Timer::SerialPoll), 2);

    let snap = d.counters().snapshot();
    assert_eq!(snap.in_session[usize::from(vector::TIMER)], 1);
    assert_eq!(snap.in_session[0x2A], 1);
    assert_eq!(snap.passed[usize::from(vector::BREAKPOINT)], 1);
}

#[test]
fn probe_faults_are_contained() {
    let d = dispatcher();
    let mut inside = TrapFrame {
        eip: 0x5080,
        eax: 0x1234,
        ..kernel_frame()
    };
    let mut outside = TrapFrame {
        eip: 0x5100,
        ..kernel_frame()
    };
    let mut chains = Vec::new();
    let mut handler = Session(|_: &mut SessionEntry<'_>| {
        let mut nested = Session(|_: &mut SessionEntry<'_>| {});
        chains.push(d.dispatch(vector::PAGE_FAULT, &mut inside, &mut nested));
        chains.push(d.dispatch(vector::PAGE_FAULT, &mut outside, &mut nested));
    });
    d.dispatch(vector::BREAKPOINT, &mut kernel_frame(), &mut handler);

    assert_eq!(
        chains,
        vec![
            Chain::Resume,
            Chain::Forward(host_handler(vector::PAGE_FAULT))
        ]
    );
    assert_eq!(inside.eax, PROBE_FAULT_PAGE);
    assert_eq!(inside.eip, PROBE.epilogue);
    assert_eq!(outside.eip, 0x5100);
}

#[test]
fn missing_host_gate_is_acknowledged_locally() {
    let d = dispatcher();
    let mut chain = None;
    let mut handler = Session(|_: &mut SessionEntry<'_>| {
        let mut nested = Session(|_: &mut SessionEntry<'_>| {});
        chain = Some(d.dispatch(ABSENT, &mut kernel_frame(), &mut nested));
    });
    d.dispatch(vector::BREAKPOINT, &mut kernel_frame(), &mut handler);
    assert_eq!(chain, Some(Chain::Resume));
    assert!(d.platform().events().contains(&Event::Ack(ABSENT)));
}

#[test]
fn remapped_irq_chains_to_host_vector() {
    let d = dispatcher();
    d.install_permanent_hooks().unwrap();
    assert_eq!(d.chain_target(0x60), Some(host_handler(vector::TIMER)));
    assert_eq!(d.chain_target(vector::TIMER), Some(host_handler(vector::TIMER)));
}

#[test]
fn redirected_timer_is_hooked_and_chained_at_its_entry() {
    const ENTRY: u8 = 0x2F;
    let d = dispatcher_on(MockPlatform::new().redirect(vector::TIMER, ENTRY));
    d.install_permanent_hooks().unwrap();
    assert_eq!(d.platform().live_gate(ENTRY).offset(), 0xC000_0020);
    assert_eq!(d.platform().live_gate(vector::TIMER).offset(), host_handler(vector::TIMER));
    assert_eq!(d.chain_target(vector::TIMER), Some(host_handler(ENTRY)));

    // Before any session the host's tick still reaches its handler.
    let mut idle = Session(|_: &mut SessionEntry<'_>| panic!("no session expected"));
    let chain = d.dispatch(vector::TIMER, &mut kernel_frame(), &mut idle);
    assert_eq!(chain, Chain::Forward(host_handler(ENTRY)));

    d.request_break();
    let mut host_gate = None;
    let mut handler = Session(|entry: &mut SessionEntry<'_>| {
        host_gate = Some(entry.host_table[ENTRY].offset());
    });
    assert_eq!(d.dispatch(vector::TIMER, &mut kernel_frame(), &mut handler), Chain::Resume);
    assert_eq!(host_gate, Some(host_handler(ENTRY)));
    assert_eq!(d.platform().live_gate(ENTRY).offset(), 0xC000_0020);

    d.remove_permanent_hooks().unwrap();
    assert_eq!(d.platform().live_gate(ENTRY).offset(), host_handler(ENTRY));
}

#[test]
fn hooks_are_written_with_interrupts_disabled() {
    let d = dispatcher();
    d.install_permanent_hooks().unwrap();
    let events = d.platform().events();
    let disable = events.iter().position(|e| *e == Event::Disable).unwrap();
    let enable = events.iter().position(|e| *e == Event::Enable).unwrap();
    let writes: Vec<usize> = events
        .iter()
        .enumerate()
        .filter(|(_, e)| matches!(e, Event::WriteGate(_)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(writes.len(), 4);
    assert!(writes.iter().all(|&i| disable < i && i < enable));
}

#[test]
fn countdowns_saturate_and_reload_when_taken() {
    let d = dispatcher();
    let mut handler = Session(|_: &mut SessionEntry<'_>| {
        let mut f = kernel_frame();
        let mut nested = Session(|_: &mut SessionEntry<'_>| panic!("nested session"));
        for _ in 0..5 {
            d.dispatch(vector::TIMER, &mut f, &mut nested);
        }
    });
    d.dispatch(vector::BREAKPOINT, &mut kernel_frame(), &mut handler);

    let timers = d.timers();
    assert_eq!(timers.remaining(Timer::SerialPoll), 0);
    assert_eq!(timers.remaining(Timer::CursorBlink), 5);
    assert!(!timers.take_expired(Timer::CursorBlink));

    assert!(timers.take_expired(Timer::SerialPoll));
    assert!(!timers.take_expired(Timer::SerialPoll));
    assert_eq!(timers.remaining(Timer::SerialPoll), 3);
}

#[test]
fn hook_lifecycle_errors() {
    let d = dispatcher();
    assert_eq!(d.remove_permanent_hooks(), Err(HookError::NotInstalled));
    d.install_permanent_hooks().unwrap();
    assert!(d.hooks_installed());
    assert_eq!(d.install_permanent_hooks(), Err(HookError::AlreadyInstalled));

    let mut inner = None;
    let mut handler = Session(|_: &mut SessionEntry<'_>| {
        inner = Some(d.remove_permanent_hooks());
    });
    d.dispatch(vector::BREAKPOINT, &mut kernel_frame(), &mut handler);
    assert_eq!(inner, Some(Err(HookError::Busy)));

    d.remove_permanent_hooks().unwrap();
    assert!(!d.hooks_installed());
    for v in [vector::DEBUG, vector::BREAKPOINT, vector::DOUBLE_FAULT, vector::TIMER] {
        assert_eq!(d.platform().live_gate(v).offset(), host_handler(v));
    }
}

#[test]
fn only_one_context_enters_at_a_time() {
    let d = Arc::new(dispatcher());
    let barrier = Arc::new(Barrier::new(2));
    let inside = Arc::new(AtomicUsize::new(0));
    let sessions = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let d = Arc::clone(&d);
            let barrier = Arc::clone(&barrier);
            let inside = Arc::clone(&inside);
            let sessions = Arc::clone(&sessions);
            thread::spawn(move || {
                let mut handler = Session(|_: &mut SessionEntry<'_>| {
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    sessions.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    inside.fetch_sub(1, Ordering::SeqCst);
                });
                barrier.wait();
                d.dispatch(vector::BREAKPOINT, &mut kernel_frame(), &mut handler)
            })
        })
        .collect();

    let chains: Vec<Chain> = workers.into_iter().map(|w| w.join().unwrap()).collect();
    let entered = sessions.load(Ordering::SeqCst);
    assert!((1..=2).contains(&entered));
    let forwarded = chains
        .iter()
        .filter(|c| **c == Chain::Forward(host_handler(vector::BREAKPOINT)))
        .count();
    assert_eq!(entered + forwarded, 2);
}

#[test]
fn panic_report_lists_frame_and_counters() {
    let d = dispatcher();
    d.dispatch(vector::TIMER, &mut kernel_frame(), &mut Session(|_: &mut SessionEntry<'_>| {}));
    let mut out = String::new();
    let frame = TrapFrame {
        eax: 0xDEAD_BEEF,
        ..kernel_frame()
    };
    write_panic_report(&mut out, Some((vector::DOUBLE_FAULT, &frame)), &d.counters().snapshot())
        .unwrap();
    assert!(out.starts_with("ICE-PANIC\nInt: 0x08\n"));
    assert!(out.contains("EAX=DEADBEEF"));
    assert!(out.contains("20: 00000001 00000000"));
}

#[test]
#[should_panic(expected = "halted")]
fn emergency_panic_halts() {
    let d = dispatcher();
    ice_trap::emergency_panic(d.platform(), None, d.counters());
}
