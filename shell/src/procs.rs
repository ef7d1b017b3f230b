use crate::error;

/// One process visible to the invoking user.
#[derive(Clone, Debug)]
pub struct ProcessInfo {
    pub pid: u32,
    pub command: String,
}

/// A snapshot source for the processes consulted by `%` expansion after
/// the job table has been exhausted.
pub trait ProcessSource: Send + Sync {
    fn list(&self) -> Result<Vec<ProcessInfo>, error::Error>;
}

/// A source that reports no processes, for embedders that do not offer
/// process completion.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProcessSource;

impl ProcessSource for NullProcessSource {
    fn list(&self) -> Result<Vec<ProcessInfo>, error::Error> {
        Ok(vec![])
    }
}

/// Process listing backed by the `/proc` pseudo-filesystem: numeric
/// entries owned by the invoking user, command taken from `cmdline`.
#[cfg(all(unix, not(target_os = "macos")))]
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcfsProcessSource;

#[cfg(all(unix, not(target_os = "macos")))]
impl ProcessSource for ProcfsProcessSource {
    fn list(&self) -> Result<Vec<ProcessInfo>, error::Error> {
        use std::os::unix::fs::MetadataExt;

        let Ok(entries) = std::fs::read_dir("/proc") else {
            tracing::debug!("/proc is not available; no process completions");
            return Ok(vec![]);
        };

        let uid = nix::unistd::getuid();
        let mut processes = vec![];

        for entry in entries {
            let Ok(entry) = entry else { continue };
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Ok(pid) = name.parse::<u32>() else { continue };

            let Ok(metadata) = entry.metadata() else { continue };
            if metadata.uid() != uid.as_raw() {
                continue;
            }

            let Ok(cmdline) = std::fs::read(entry.path().join("cmdline")) else {
                continue;
            };
            let first = cmdline.split(|b| *b == 0).next().unwrap_or_default();
            if first.is_empty() {
                continue;
            }

            processes.push(ProcessInfo {
                pid,
                command: String::from_utf8_lossy(first).into_owned(),
            });
        }

        Ok(processes)
    }
}

/// Process listing for BSD-family kernels, via `sysctl`. The process table
/// comes from `KERN_PROC_ALL`; command lines come from `KERN_PROCARGS2`,
/// which fails for processes we may not inspect, filtering them naturally.
#[cfg(target_os = "macos")]
#[derive(Clone, Copy, Debug, Default)]
pub struct SysctlProcessSource;

#[cfg(target_os = "macos")]
impl SysctlProcessSource {
    fn all_pids() -> Vec<nix::libc::pid_t> {
        use nix::libc;

        let mut name = [libc::CTL_KERN, libc::KERN_PROC, libc::KERN_PROC_ALL, 0];
        let mut pids = vec![];

        unsafe {
            loop {
                let mut length: libc::size_t = 0;
                if libc::sysctl(
                    name.as_mut_ptr(),
                    3,
                    std::ptr::null_mut(),
                    &mut length,
                    std::ptr::null_mut(),
                    0,
                ) != 0
                {
                    return pids;
                }

                let capacity =
                    length as usize / std::mem::size_of::<libc::kinfo_proc>() + 16;
                let mut buffer: Vec<libc::kinfo_proc> = Vec::with_capacity(capacity);
                length = capacity * std::mem::size_of::<libc::kinfo_proc>();

                if libc::sysctl(
                    name.as_mut_ptr(),
                    3,
                    buffer.as_mut_ptr().cast(),
                    &mut length,
                    std::ptr::null_mut(),
                    0,
                ) == 0
                {
                    let count = length as usize / std::mem::size_of::<libc::kinfo_proc>();
                    buffer.set_len(count);
                    pids.extend(buffer.iter().map(|info| info.kp_proc.p_pid));
                    return pids;
                }

                // The table grew between the two calls; size up and retry.
                if std::io::Error::last_os_error().raw_os_error() != Some(libc::ENOMEM) {
                    return pids;
                }
            }
        }
    }

    fn command_for_pid(pid: nix::libc::pid_t) -> Option<String> {
        use nix::libc;

        unsafe {
            let mut argmax: libc::c_int = 0;
            let mut size = std::mem::size_of::<libc::c_int>() as libc::size_t;
            let mut name = [libc::CTL_KERN, libc::KERN_ARGMAX];
            if libc::sysctl(
                name.as_mut_ptr(),
                2,
                (&mut argmax as *mut libc::c_int).cast(),
                &mut size,
                std::ptr::null_mut(),
                0,
            ) != 0
            {
                return None;
            }

            let mut buffer = vec![0u8; argmax as usize];
            let mut size = buffer.len() as libc::size_t;
            let mut name = [libc::CTL_KERN, libc::KERN_PROCARGS2, pid, 0];
            if libc::sysctl(
                name.as_mut_ptr(),
                3,
                buffer.as_mut_ptr().cast(),
                &mut size,
                std::ptr::null_mut(),
                0,
            ) != 0
            {
                return None;
            }

            // The buffer starts with argc, then the executable path.
            let argc_size = std::mem::size_of::<libc::c_int>();
            let bytes = buffer.get(argc_size..size as usize)?;
            let first = bytes.split(|b| *b == 0).next().unwrap_or_default();
            if first.is_empty() {
                return None;
            }

            Some(String::from_utf8_lossy(first).into_owned())
        }
    }
}

#[cfg(target_os = "macos")]
impl ProcessSource for SysctlProcessSource {
    fn list(&self) -> Result<Vec<ProcessInfo>, error::Error> {
        let mut processes = vec![];

        for pid in Self::all_pids() {
            if pid <= 0 {
                continue;
            }
            if let Some(command) = Self::command_for_pid(pid) {
                processes.push(ProcessInfo {
                    pid: pid as u32,
                    command,
                });
            }
        }

        Ok(processes)
    }
}

/// The process source appropriate for the build target.
pub fn system_process_source() -> Box<dyn ProcessSource> {
    #[cfg(all(unix, not(target_os = "macos")))]
    return Box::new(ProcfsProcessSource);

    #[cfg(target_os = "macos")]
    return Box::new(SysctlProcessSource);

    #[cfg(not(unix))]
    Box::new(NullProcessSource)
}
