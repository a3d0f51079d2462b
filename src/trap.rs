//! System Call Trap Entry
//!
//! User code enters the kernel with a software interrupt on
//! [`SYSCALL_VECTOR`]. The low-level entry stub saves the user registers
//! into a [`TrapFrame`] and calls the registered [`TrapHandler`]; the
//! returned [`Disposition`] tells the stub how to leave the kernel.
//!
//! # Security Considerations
//! - The only user state read here is the stack pointer; everything behind
//!   it goes through the validator
//! - A trap from a thread with no process record is refused, never guessed

use log::{error, info};
use spin::Once;

use crate::config::{SYSCALL_DPL, SYSCALL_VECTOR};
use crate::kernel::Kernel;
use crate::mm::VirtAddr;
use crate::syscall::{self, Outcome};

/// User register state saved by the entry stub
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapFrame {
    /// Vector the trap arrived on
    pub vec_no: u32,
    /// Result register, written back to user code
    pub eax: u32,
    /// User instruction pointer to resume at
    pub eip: u32,
    /// User stack pointer at the time of the trap
    pub esp: u32,
}

impl TrapFrame {
    /// Build a frame for a syscall trap with the given stack pointer.
    pub const fn syscall(esp: u32) -> Self {
        Self {
            vec_no: SYSCALL_VECTOR as u32,
            eax: 0,
            eip: 0,
            esp,
        }
    }

    pub fn user_sp(&self) -> VirtAddr {
        VirtAddr::from(self.esp)
    }

    /// Result register as the signed value user code sees.
    pub fn result(&self) -> i32 {
        self.eax as i32
    }

    fn set_result(&mut self, value: i32) {
        self.eax = value as u32;
    }
}

/// How the entry stub leaves the kernel after a trap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Return to user mode with the frame as updated.
    Resume,
    /// The process is gone; schedule something else and never resume it.
    Terminated(i32),
    /// The machine has been told to power off.
    PoweredOff,
}

impl Kernel {
    /// Handle one syscall trap from the currently running process.
    pub fn handle_trap(&self, frame: &mut TrapFrame) -> Disposition {
        let pid = self.scheduler().current();
        let Some(process) = self.processes().get(pid) else {
            error!("[TRAP] syscall from pid {} with no process record", pid);
            return Disposition::Terminated(crate::config::EXIT_FAILURE);
        };

        match syscall::dispatch(self, &process, frame.user_sp()) {
            Outcome::Return(value) => {
                frame.set_result(value);
                Disposition::Resume
            }
            Outcome::Exit(status) => {
                drop(process);
                self.exit_process(pid, status);
                Disposition::Terminated(status)
            }
            Outcome::Halt => {
                info!("[TRAP] halt requested by pid {}", pid);
                self.scheduler().power_off();
                Disposition::PoweredOff
            }
        }
    }
}

/// Function installed on the syscall vector.
pub type TrapHandler = fn(&mut TrapFrame) -> Disposition;

/// The interrupt controller's registration interface.
pub trait InterruptRegistry {
    /// Install `handler` on `vector`, callable from privilege level `dpl`.
    fn register(&mut self, vector: u8, dpl: u8, handler: TrapHandler, name: &'static str);
}

static KERNEL: Once<Kernel> = Once::new();

/// Install `kernel` as the global instance and hook up the syscall vector.
///
/// Only the first call installs a kernel; later calls keep the existing
/// instance and just re-register the handler.
pub fn syscall_init(kernel: Kernel, registry: &mut dyn InterruptRegistry) -> &'static Kernel {
    let kernel = KERNEL.call_once(|| kernel);
    registry.register(SYSCALL_VECTOR, SYSCALL_DPL, syscall_trap, "syscall");
    info!("[TRAP] syscall handler on vector {:#x}", SYSCALL_VECTOR);
    kernel
}

/// The global kernel, once [`syscall_init`] has run.
pub fn kernel() -> Option<&'static Kernel> {
    KERNEL.get()
}

fn syscall_trap(frame: &mut TrapFrame) -> Disposition {
    match KERNEL.get() {
        Some(kernel) => kernel.handle_trap(frame),
        None => {
            error!("[TRAP] syscall before syscall_init");
            Disposition::Terminated(crate::config::EXIT_FAILURE)
        }
    }
}
