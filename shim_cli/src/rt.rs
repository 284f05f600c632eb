//! Real-time setup for the trigger poll loop (Linux: mlockall, SCHED_FIFO, CPU affinity).

use crate::cli::{RtArgs, RtLock};

/// Apply the requested real-time settings once per process. Every step is
/// best effort; failures are logged and the run continues.
pub fn setup_rt_once(args: &RtArgs) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !args.rt {
        return;
    }
    let lock = args.rt_lock.unwrap_or_else(RtLock::os_default);
    RT_ONCE.get_or_init(|| {
        match imp::lock_memory(lock) {
            Ok(()) => tracing::info!(?lock, "rt: memory lock applied"),
            Err(e) => tracing::warn!(error = %e, "rt: mlockall failed"),
        }
        match imp::fifo_priority(args.rt_prio) {
            Ok(prio) => tracing::info!(prio, "rt: SCHED_FIFO applied"),
            Err(e) => tracing::warn!(error = %e, "rt: SCHED_FIFO not applied"),
        }
        let cpu = args.rt_cpu.unwrap_or(0);
        match imp::pin_cpu(cpu) {
            Ok(()) => tracing::info!(cpu, "rt: pinned to cpu"),
            Err(e) => tracing::warn!(error = %e, "rt: affinity not applied"),
        }
    });
}

#[cfg(target_os = "linux")]
mod imp {
    use super::RtLock;

    /// Capacity of cpu_set_t in CPU indices (bits).
    const MAX_CPUSET_BITS: usize = std::mem::size_of::<libc::cpu_set_t>() * 8;

    fn memlock_limit_hint() -> Option<String> {
        let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
        // SAFETY: getrlimit writes a full rlimit on success.
        let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
        if rc != 0 {
            return None;
        }
        // SAFETY: rc == 0
        let cur = unsafe { rlim.assume_init() }.rlim_cur;
        Some(if cur == libc::RLIM_INFINITY {
            "memlock limit: unlimited".to_string()
        } else {
            format!("memlock limit: {} KiB", cur / 1024)
        })
    }

    fn mlockall(flags: libc::c_int) -> std::io::Result<()> {
        // SAFETY: plain syscall, no pointers.
        if unsafe { libc::mlockall(flags) } != 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    pub fn lock_memory(lock: RtLock) -> eyre::Result<()> {
        let res = match lock {
            RtLock::None => return Ok(()),
            RtLock::Current => mlockall(libc::MCL_CURRENT),
            // fall back to resident pages when future pages cannot be locked
            RtLock::All => mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE)
                .or_else(|_| mlockall(libc::MCL_CURRENT)),
        };
        res.map_err(|err| {
            let mut msg = format!("mlockall({lock:?}) failed: {err}");
            if matches!(err.raw_os_error(), Some(libc::EPERM | libc::ENOMEM)) {
                if let Some(h) = memlock_limit_hint() {
                    msg.push_str(&format!("; {h}"));
                }
                msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
            }
            eyre::eyre!(msg)
        })
    }

    pub fn fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
        // SAFETY: plain syscalls, no pointers.
        let (min, max) = unsafe {
            (
                libc::sched_get_priority_min(libc::SCHED_FIFO),
                libc::sched_get_priority_max(libc::SCHED_FIFO),
            )
        };
        let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
        let value = prio.unwrap_or(max).clamp(min, max);
        let param = libc::sched_param {
            sched_priority: value,
        };
        // SAFETY: param outlives the call.
        if unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) } != 0 {
            let err = std::io::Error::last_os_error();
            // SAFETY: no preconditions.
            let euid = unsafe { libc::geteuid() };
            eyre::bail!(
                "sched_setscheduler(SCHED_FIFO, {value}) failed: {err}; euid {euid}, \
                 hint: run as root or 'setcap cap_sys_nice=ep' on the shim binary"
            );
        }
        Ok(value)
    }

    pub fn pin_cpu(cpu: usize) -> eyre::Result<()> {
        if cpu >= MAX_CPUSET_BITS {
            eyre::bail!("requested CPU {cpu} exceeds cpu_set_t capacity {MAX_CPUSET_BITS}");
        }
        // SAFETY: cpu_set_t is plain data; the CPU_* helpers stay within its bits.
        unsafe {
            let mut allowed: libc::cpu_set_t = std::mem::zeroed();
            if libc::sched_getaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mut allowed)
                != 0
            {
                return Err(eyre::eyre!(std::io::Error::last_os_error()));
            }
            if !libc::CPU_ISSET(cpu, &allowed) {
                eyre::bail!("CPU {cpu} not permitted by current affinity mask");
            }
            let mut desired: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut desired);
            libc::CPU_SET(cpu, &mut desired);
            if libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &desired) != 0 {
                return Err(eyre::eyre!(std::io::Error::last_os_error()));
            }
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use super::RtLock;

    pub fn lock_memory(lock: RtLock) -> eyre::Result<()> {
        match lock {
            RtLock::None => Ok(()),
            _ => eyre::bail!("memory locking is only implemented on Linux"),
        }
    }

    pub fn fifo_priority(_prio: Option<i32>) -> eyre::Result<i32> {
        eyre::bail!("SCHED_FIFO is only available on Linux")
    }

    pub fn pin_cpu(_cpu: usize) -> eyre::Result<()> {
        eyre::bail!("CPU affinity is only available on Linux")
    }
}
