//! System Call Handler
//!
//! Dispatches system calls and implements individual syscall handlers.
//!
//! # Security Considerations
//! - The selector and every declared argument word are validated before
//!   a handler runs
//! - Unknown selectors are logged and fail with -1
//! - A bad user pointer anywhere terminates the caller with -1
//! - User memory is validated before the file lock is taken, so a fault
//!   never leaves the lock held

use log::{debug, trace, warn};

use crate::config::{CONSOLE_CHUNK, EXIT_FAILURE, IO_CHUNK};
use crate::fs::Fd;
use crate::kernel::Kernel;
use crate::mm::VirtAddr;
use crate::process::{Pid, Process};

use super::args::{self, Args};
use super::bounce::KernelBuffer;
use super::error::{SyscallError, SyscallResult};
use super::number::Syscall;

/// What the trap glue must do once a call has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Store the value in the result slot and resume the caller.
    Return(i32),
    /// Terminate the caller with this status.
    Exit(i32),
    /// Power the machine off.
    Halt,
}

/// Dispatch a system call
///
/// # Arguments
/// * `kernel` - Kernel context
/// * `process` - The calling process
/// * `esp` - User stack pointer at the time of the trap
pub fn dispatch(kernel: &Kernel, process: &Process, esp: VirtAddr) -> Outcome {
    let space = process.space();

    let selector = match args::read_selector(space, esp) {
        Ok(selector) => selector,
        Err(e) => return failed(process, None, e),
    };

    let call = match Syscall::try_from(selector) {
        Ok(call) => call,
        Err(_) => {
            warn!("[SYSCALL] pid {}: unknown syscall {}", process.pid(), selector);
            return Outcome::Return(-1);
        }
    };

    let args = match Args::decode(space, esp, call) {
        Ok(args) => args,
        Err(e) => return failed(process, Some(call), e),
    };

    trace!("[SYSCALL] pid {}: {}", process.pid(), call.name());

    let handler = Handler { kernel, process };
    let result = match call {
        Syscall::Halt => return Outcome::Halt,
        Syscall::Exit => return Outcome::Exit(args.int(0)),
        Syscall::Exec => handler.exec(&args),
        Syscall::Wait => handler.wait(&args),
        Syscall::Create => handler.create(&args),
        Syscall::Remove => handler.remove(&args),
        Syscall::Open => handler.open(&args),
        Syscall::Filesize => handler.filesize(&args),
        Syscall::Read => handler.read(&args),
        Syscall::Write => handler.write(&args),
        Syscall::Seek => handler.seek(&args),
        Syscall::Tell => handler.tell(&args),
        Syscall::Close => handler.close(&args),
    };

    match result {
        Ok(value) => Outcome::Return(value),
        Err(e) => failed(process, Some(call), e),
    }
}

fn failed(process: &Process, call: Option<Syscall>, error: SyscallError) -> Outcome {
    let name = call.map_or("?", Syscall::name);
    if error.is_fatal() {
        warn!("[SYSCALL] pid {}: {}: {}, terminating", process.pid(), name, error);
        return Outcome::Exit(EXIT_FAILURE);
    }
    debug!("[SYSCALL] pid {}: {}: {}", process.pid(), name, error);
    Outcome::Return(call.map_or(-1, Syscall::failure_value))
}

/// Byte count as a syscall return value.
fn count(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Per-call view of the kernel on behalf of one process.
struct Handler<'k> {
    kernel: &'k Kernel,
    process: &'k Process,
}

impl Handler<'_> {
    fn exec(&self, args: &Args<'_>) -> SyscallResult {
        let cmdline = args.string(0)?;
        if cmdline.split_whitespace().next().is_none() {
            return Err(SyscallError::InvalidArgument);
        }

        // alloc_pid keeps pids within i32
        let pid = self
            .kernel
            .spawn(Some(self.process), &cmdline)
            .ok_or(SyscallError::LoadFailed)?;
        i32::try_from(pid.raw()).map_err(|_| SyscallError::LoadFailed)
    }

    fn wait(&self, args: &Args<'_>) -> SyscallResult {
        let child = Pid::from_user(args.int(0)).ok_or(SyscallError::NoSuchChild)?;
        self.kernel
            .wait(self.process, child)
            .ok_or(SyscallError::NoSuchChild)
    }

    fn create(&self, args: &Args<'_>) -> SyscallResult {
        let name = args.string(0)?;
        let initial_size = args.uint(1);
        let mut fs = self.kernel.file_lock().lock();
        Ok(fs.create(&name, initial_size) as i32)
    }

    fn remove(&self, args: &Args<'_>) -> SyscallResult {
        let name = args.string(0)?;
        let mut fs = self.kernel.file_lock().lock();
        Ok(fs.remove(&name) as i32)
    }

    fn open(&self, args: &Args<'_>) -> SyscallResult {
        let name = args.string(0)?;
        let mut fs = self.kernel.file_lock().lock();
        let file = fs.open(&name).ok_or(SyscallError::NotFound)?;
        let mut files = self.process.files.lock();
        match files.allocate(file) {
            Ok(fd) => {
                debug!("[FD] pid {}: open {:?} as {}", self.process.pid(), name, fd);
                Ok(fd.raw())
            }
            Err(file) => {
                fs.close(file);
                Err(SyscallError::TooManyFiles)
            }
        }
    }

    fn filesize(&self, args: &Args<'_>) -> SyscallResult {
        let fd = Fd::new(args.int(0));
        let mut fs = self.kernel.file_lock().lock();
        let files = self.process.files.lock();
        let file = files.resolve(fd).ok_or(SyscallError::BadDescriptor)?;
        Ok(i32::try_from(fs.length(file)).unwrap_or(i32::MAX))
    }

    fn read(&self, args: &Args<'_>) -> SyscallResult {
        let fd = Fd::new(args.int(0));
        let mut dst = args.buffer_mut(1)?;
        let total = dst.len();

        if fd == Fd::STDIN {
            let console = self.kernel.console();
            let mut staged = KernelBuffer::zeroed(total.min(CONSOLE_CHUNK));
            let mut done = 0;
            while done < total {
                let n = staged.len().min(total - done);
                for byte in staged[..n].iter_mut() {
                    *byte = console.read_byte();
                }
                dst.write_at(done, &staged[..n])?;
                done += n;
            }
            return Ok(count(done));
        }

        let mut staged = KernelBuffer::zeroed(total.min(IO_CHUNK));
        let mut fs = self.kernel.file_lock().lock();
        let files = self.process.files.lock();
        let file = files.resolve(fd).ok_or(SyscallError::BadDescriptor)?;

        let mut done = 0;
        while done < total {
            let want = staged.len().min(total - done);
            let got = match fs.read(file, &mut staged[..want]) {
                Some(got) => got.min(want),
                None if done > 0 => break,
                None => return Err(SyscallError::InvalidArgument),
            };
            dst.write_at(done, &staged[..got])?;
            done += got;
            if got < want {
                break;
            }
        }
        Ok(count(done))
    }

    fn write(&self, args: &Args<'_>) -> SyscallResult {
        let fd = Fd::new(args.int(0));
        let src = args.buffer(1)?;
        let total = src.len();

        if fd == Fd::STDIN {
            return Err(SyscallError::BadDescriptor);
        }

        if fd == Fd::STDOUT {
            let console = self.kernel.console();
            let mut staged = KernelBuffer::zeroed(total.min(CONSOLE_CHUNK));
            let mut done = 0;
            while done < total {
                let n = staged.len().min(total - done);
                src.read_at(done, &mut staged[..n])?;
                console.write(&staged[..n]);
                done += n;
            }
            return Ok(count(done));
        }

        let mut staged = KernelBuffer::zeroed(total.min(IO_CHUNK));
        let mut fs = self.kernel.file_lock().lock();
        let files = self.process.files.lock();
        let file = files.resolve(fd).ok_or(SyscallError::BadDescriptor)?;

        let mut done = 0;
        while done < total {
            let want = staged.len().min(total - done);
            src.read_at(done, &mut staged[..want])?;
            let put = match fs.write(file, &staged[..want]) {
                Some(put) => put.min(want),
                None if done > 0 => break,
                None => return Err(SyscallError::InvalidArgument),
            };
            done += put;
            if put < want {
                break;
            }
        }
        Ok(count(done))
    }

    fn seek(&self, args: &Args<'_>) -> SyscallResult {
        let fd = Fd::new(args.int(0));
        let position = args.uint(1);
        let mut fs = self.kernel.file_lock().lock();
        let files = self.process.files.lock();
        if let Some(file) = files.resolve(fd) {
            fs.seek(file, position);
        }
        Ok(0)
    }

    fn tell(&self, args: &Args<'_>) -> SyscallResult {
        let fd = Fd::new(args.int(0));
        let mut fs = self.kernel.file_lock().lock();
        let files = self.process.files.lock();
        let file = files.resolve(fd).ok_or(SyscallError::BadDescriptor)?;
        Ok(i32::try_from(fs.tell(file)).unwrap_or(i32::MAX))
    }

    fn close(&self, args: &Args<'_>) -> SyscallResult {
        let fd = Fd::new(args.int(0));
        let mut fs = self.kernel.file_lock().lock();
        if self.process.files.lock().release(fd, &mut **fs) {
            debug!("[FD] pid {}: closed {}", self.process.pid(), fd);
        }
        Ok(0)
    }
}
