use crate::counters::{InterruptCounters, LocalTimers};
use crate::error::HookError;
use crate::panic::emergency_panic;
use crate::platform::Platform;
use crate::probe::ProbeRegion;
use crate::vectors::{HookSet, HookedGates, LiveTable, VECTORS, VectorTable, vector};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use ice_registers::{TableDescriptor, TrapFrame};
use ice_sync::{CpuRendezvous, SessionLock};
use log::{error, info, trace, warn};

/// What the trap stub does after [`Dispatcher::dispatch`] returns.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Chain {
    /// Return from the trap with the (possibly modified) frame.
    Resume,
    /// Jump to the host's handler at this address with the frame intact.
    Forward(u32),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    pub probe: ProbeRegion,
    pub serial_poll_ticks: u32,
    pub cursor_blink_ticks: u32,
}

/// Everything a session gets to look at and modify.
pub struct SessionEntry<'a> {
    pub vector: u8,
    pub cpu: u32,
    /// Registers of the interrupted code; changes take effect on resume.
    pub frame: &'a mut TrapFrame,
    /// The host's IDT, with the debugger's hooks removed.
    pub idt: TableDescriptor,
    pub gdt: TableDescriptor,
    /// Copy of the host's gates taken at entry.
    pub host_table: &'a VectorTable,
}

/// Runs a debug session. Returns when the operator resumes execution.
pub trait SessionHandler {
    fn run_session(&mut self, entry: &mut SessionEntry<'_>);
}

/// State owned by whoever holds the session guard.
struct SessionTables {
    shadow: VectorTable,
    host: VectorTable,
    permanent: Option<HookedGates>,
}

pub struct Dispatcher<P: Platform> {
    platform: P,
    tables: SessionLock<SessionTables>,
    rendezvous: CpuRendezvous,
    pending_break: AtomicBool,
    hooked: AtomicBool,
    /// Host handler per IDT entry, `0` when the host gate is not present.
    /// Indexed by delivery entry, see [`Platform::original_vector`].
    chain_targets: [AtomicU32; VECTORS],
    counters: InterruptCounters,
    timers: LocalTimers,
    probe: ProbeRegion,
    session_cpu: AtomicU32,
}

impl<P: Platform> Dispatcher<P> {
    pub const fn new(platform: P, config: DispatchConfig) -> Self {
        Self {
            platform,
            tables: SessionLock::new(SessionTables {
                shadow: VectorTable::new(),
                host: VectorTable::new(),
                permanent: None,
            }),
            rendezvous: CpuRendezvous::new(),
            pending_break: AtomicBool::new(false),
            hooked: AtomicBool::new(false),
            chain_targets: [const { AtomicU32::new(0) }; VECTORS],
            counters: InterruptCounters::new(),
            timers: LocalTimers::new(config.serial_poll_ticks, config.cursor_blink_ticks),
            probe: config.probe,
            session_cpu: AtomicU32::new(0),
        }
    }

    pub const fn platform(&self) -> &P {
        &self.platform
    }

    pub const fn counters(&self) -> &InterruptCounters {
        &self.counters
    }

    pub const fn timers(&self) -> &LocalTimers {
        &self.timers
    }

    pub fn is_session_active(&self) -> bool {
        self.tables.is_active()
    }

    pub fn hooks_installed(&self) -> bool {
        self.hooked.load(Ordering::Acquire)
    }

    /// CPU that entered the current (or last) session.
    pub fn session_cpu(&self) -> u32 {
        self.session_cpu.load(Ordering::Acquire)
    }

    /// Ask for a session on the next timer tick (keyboard hot key).
    pub fn request_break(&self) {
        self.pending_break.store(true, Ordering::Release);
    }

    /// Called by the other CPUs from their IPI handler; returns when the session ends.
    pub fn park_this_cpu(&self) {
        self.rendezvous.park();
    }

    pub const fn rendezvous(&self) -> &CpuRendezvous {
        &self.rendezvous
    }

    /// Hook the permanent vectors in the host's live IDT.
    ///
    /// # Errors
    /// [`HookError::Busy`] inside a session, [`HookError::AlreadyInstalled`]
    /// if called twice.
    pub fn install_permanent_hooks(&self) -> Result<(), HookError> {
        let mut tables = self.tables.try_enter().ok_or(HookError::Busy)?;
        if tables.permanent.is_some() {
            return Err(HookError::AlreadyInstalled);
        }
        let idt = self.platform.store_idt();
        self.platform.disable_interrupts();
        tables.permanent = Some(self.hook_live(idt));
        self.platform.enable_interrupts();
        self.hooked.store(true, Ordering::Release);
        info!("permanent hooks installed");
        Ok(())
    }

    /// Put the host's original gates back.
    ///
    /// # Errors
    /// [`HookError::Busy`] inside a session, [`HookError::NotInstalled`]
    /// without a prior install.
    pub fn remove_permanent_hooks(&self) -> Result<(), HookError> {
        let mut tables = self.tables.try_enter().ok_or(HookError::Busy)?;
        let hooks = tables.permanent.take().ok_or(HookError::NotInstalled)?;
        let idt = self.platform.store_idt();
        self.platform.disable_interrupts();
        if let Err(e) = hooks.restore(&mut LiveTable::new(&self.platform, idt)) {
            error!("saved gates corrupted: {e:?}");
            emergency_panic(&self.platform, None, &self.counters);
        }
        self.platform.enable_interrupts();
        self.hooked.store(false, Ordering::Release);
        info!("permanent hooks removed");
        Ok(())
    }

    /// Entry point for every hooked vector.
    pub fn dispatch(
        &self,
        vector: u8,
        frame: &mut TrapFrame,
        handler: &mut dyn SessionHandler,
    ) -> Chain {
        if self.tables.is_active() {
            return self.dispatch_in_session(vector, frame);
        }
        self.counters.count_passed(vector);

        if vector == vector::TIMER && !self.pending_break.swap(false, Ordering::AcqRel) {
            return self.forward(vector);
        }

        let Some(mut tables) = self.tables.try_enter() else {
            // Lost the race to another CPU; retry on the next trap.
            if vector == vector::TIMER {
                self.pending_break.store(true, Ordering::Release);
            }
            return self.forward(vector);
        };
        self.run_session(vector, frame, &mut tables, handler);
        drop(tables);

        self.rendezvous.release();
        self.platform.unclamp_interrupts();
        Chain::Resume
    }

    fn dispatch_in_session(&self, vector: u8, frame: &mut TrapFrame) -> Chain {
        self.counters.count_in_session(vector);
        match vector {
            vector::TIMER => self.timers.tick(),
            vector::KEYBOARD | vector::MOUSE => self.platform.service_keyboard(),
            vector::COM2 => self.platform.service_serial(1),
            vector::COM1 => self.platform.service_serial(0),
            vector::PAGE_FAULT | vector::GENERAL_PROTECTION => {
                let Some(fault) = self.probe.contain(vector, frame) else {
                    return self.forward(vector);
                };
                trace!("probe fault contained: {fault}");
            }
            _ => return self.forward(vector),
        }
        self.platform.acknowledge(vector);
        Chain::Resume
    }

    /// Switch to the shadow table, run the handler and switch back. The
    /// caller drops the guard and lets the other CPUs go.
    fn run_session(
        &self,
        vector: u8,
        frame: &mut TrapFrame,
        tables: &mut SessionTables,
        handler: &mut dyn SessionHandler,
    ) {
        let cpu = self.platform.cpu_id();
        self.session_cpu.store(cpu, Ordering::Release);
        self.platform.clamp_interrupts(cpu);
        self.platform.acknowledge(vector);

        let idt = self.platform.store_idt();
        let gdt = self.platform.store_gdt();

        let rehook = match tables.permanent.take() {
            Some(hooks) => {
                if let Err(e) = hooks.restore(&mut LiveTable::new(&self.platform, idt)) {
                    error!("saved gates corrupted: {e:?}");
                    emergency_panic(&self.platform, Some((vector, &*frame)), &self.counters);
                }
                true
            }
            None => false,
        };

        let SessionTables { shadow, host, .. } = &mut *tables;
        host.copy_from(&LiveTable::new(&self.platform, idt), idt);
        self.record_chain_targets(host);
        shadow.clone_from(host);
        shadow.hook(
            HookSet::SHADOW,
            |v| self.platform.original_vector(v),
            |v| HookSet::hook_gate(&self.platform, v),
        );
        self.platform.load_idt(shadow.descriptor());

        self.platform.enable_interrupts();
        self.rendezvous.request_park();
        self.platform.signal_other_cpus();
        info!("session entered on cpu {cpu} by vector {vector:#04x}");

        let mut entry = SessionEntry {
            vector,
            cpu,
            frame,
            idt,
            gdt,
            host_table: host,
        };
        handler.run_session(&mut entry);

        self.platform.disable_interrupts();
        self.platform.load_idt(idt);
        if rehook {
            tables.permanent = Some(self.hook_live(idt));
        }
        info!("session left on cpu {cpu}");
    }

    fn hook_live(&self, idt: TableDescriptor) -> HookedGates {
        let hooks = HookedGates::install(
            &mut LiveTable::new(&self.platform, idt),
            HookSet::PERMANENT,
            |v| self.platform.original_vector(v),
            |v| HookSet::hook_gate(&self.platform, v),
        );
        for &(at, gate) in hooks.saved() {
            let target = if gate.is_present() { gate.offset() } else { 0 };
            self.chain_targets[usize::from(at)].store(target, Ordering::Release);
        }
        hooks
    }

    fn record_chain_targets(&self, host: &VectorTable) {
        for (i, slot) in self.chain_targets.iter().enumerate() {
            let Ok(v) = u8::try_from(i) else { break };
            let gate = host[v];
            let target = if gate.is_present() { gate.offset() } else { 0 };
            slot.store(target, Ordering::Release);
        }
    }

    /// Host handler for `vector`, read from the entry it is delivered through.
    pub fn chain_target(&self, vector: u8) -> Option<u32> {
        let host = self.platform.original_vector(vector);
        match self.chain_targets[usize::from(host)].load(Ordering::Acquire) {
            0 => None,
            addr => Some(addr),
        }
    }

    fn forward(&self, vector: u8) -> Chain {
        if let Some(addr) = self.chain_target(vector) {
            Chain::Forward(addr)
        } else {
            warn!("vector {vector:#04x} has no host handler, handled locally");
            self.platform.acknowledge(vector);
            Chain::Resume
        }
    }
}
