use crate::gate::Gate;
use ice_registers::TableDescriptor;

/// Everything the dispatcher needs from the CPU, the interrupt controllers
/// and the host kernel.
///
/// Methods are called from trap context and must not block or allocate.
pub trait Platform: Sync {
    /// Identifier of the executing CPU.
    fn cpu_id(&self) -> u32;

    /// Route all external interrupts to `cpu` until [`unclamp_interrupts`](Self::unclamp_interrupts).
    fn clamp_interrupts(&self, cpu: u32);
    fn unclamp_interrupts(&self);

    /// Send EOI for `vector` if it came from an interrupt controller.
    fn acknowledge(&self, vector: u8);

    fn enable_interrupts(&self);
    fn disable_interrupts(&self);

    fn store_idt(&self) -> TableDescriptor;
    fn store_gdt(&self) -> TableDescriptor;
    fn load_idt(&self, idt: TableDescriptor);

    fn read_gate(&self, idt: TableDescriptor, vector: u8) -> Gate;
    fn write_gate(&self, idt: TableDescriptor, vector: u8, gate: Gate);

    /// Interrupt every other CPU so it parks on the session rendezvous.
    fn signal_other_cpus(&self);

    /// Entry stub that saves a trap frame and calls the dispatcher for `vector`.
    fn stub_address(&self, vector: u8) -> u32;
    fn kernel_cs(&self) -> u16;

    /// IDT entry `vector` is delivered through when the interrupt
    /// controllers are remapped. Hooks are written there and chaining reads
    /// the host gate found there.
    fn original_vector(&self, vector: u8) -> u8 {
        vector
    }

    fn service_keyboard(&self);
    fn service_serial(&self, port: u8);

    /// Emergency output that works with interrupts disabled.
    fn write_console(&self, text: &str);

    /// Stop this CPU for good.
    fn halt(&self) -> !;
}
