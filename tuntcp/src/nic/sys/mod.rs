#![allow(unsafe_code)]
// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
//
// Applies to files in this folder unless otherwise noted. These are:
// * `linux.rs`
// * `mod.rs`
// * `tun_interface.rs`
use core::mem;
use std::{fmt, io, ptr};
use std::os::unix::io::RawFd;

use libc;
use crate::time::{Duration, Instant};

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "linux")]
mod tun_interface;

/// Module importing all types that should be exported.
///
/// Allows keeping all the `cfg` bits inside this module by enabling a controlled glob import from
/// the super module.
pub mod exports {
    #[cfg(target_os = "linux")]
    pub use super::tun_interface::{TunInterface, TunQueue};
    pub use super::{now, wait_any, Errno};
}

/// Wait until one of the descriptors becomes readable, but no longer than given timeout.
///
/// Returns the descriptors that are readable, which is empty when the timeout expired first. A
/// timeout of `None` waits indefinitely.
pub fn wait_any(fds: &[RawFd], duration: Option<Duration>) -> Result<Vec<RawFd>, Errno> {
    let mut readfds;

    unsafe {
        let mut readfds_init = mem::MaybeUninit::<libc::fd_set>::uninit();
        libc::FD_ZERO(readfds_init.as_mut_ptr());
        for &fd in fds {
            libc::FD_SET(fd, readfds_init.as_mut_ptr());
        }
        readfds = readfds_init.assume_init();
    }

    let mut timeout = libc::timeval { tv_sec: 0, tv_usec: 0 };
    let timeout = duration.map(|duration| {
        timeout.tv_sec = duration.as_secs() as libc::time_t;
        timeout.tv_usec = duration.subsec_micros() as libc::suseconds_t;
        &mut timeout
    });

    let timeout_ptr = timeout
        .map(|reference| reference as *mut _)
        .unwrap_or_else(ptr::null_mut);

    let nfds = fds.iter().copied().max().map_or(0, |fd| fd + 1);
    let res = unsafe {
        libc::select(
            nfds,
            &mut readfds,
            ptr::null_mut(),
            ptr::null_mut(),
            timeout_ptr)
    };

    FdResult(res).errno()?;

    let ready = fds.iter()
        .copied()
        .filter(|&fd| unsafe { libc::FD_ISSET(fd, &readfds) })
        .collect();
    Ok(ready)
}

/// An errno value.
///
/// This is used as the error representation of raw libc calls. It converts into a
/// `std::io::Error` for more extensive error information.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct Errno(pub libc::c_int);

#[derive(Clone, Copy)]
struct FdResult(pub libc::c_int);

#[derive(Clone, Copy)]
struct IoLenResult(pub libc::ssize_t);

#[derive(Clone, Copy)]
struct ClockResult(pub libc::c_int);

type IoctlResult = FdResult;
#[allow(non_snake_case)] // Emulate type alias also importing constructor.
fn IoctlResult(val: libc::c_int) -> IoctlResult { FdResult(val) }

/// Base for an if ioctl request.
///
/// Contains the name of the interface.
#[repr(C)]
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug)]
struct ifreq {
    ifr_name: [libc::c_char; libc::IF_NAMESIZE],
}

/// Trait for interpreting integer return values.
///
/// Failure signals may vary between:
/// * `-1`
/// * arbitrary negative values
/// * non-zero
trait LibcResult: Copy {
    fn is_fail(self) -> bool;

    fn errno(self) -> Result<(), Errno> {
        if self.is_fail() {
            Err(Errno::new())
        } else {
            Ok(())
        }
    }
}

impl Errno {
    /// The errno of the last failed libc call on this thread.
    pub fn new() -> Errno {
        Errno(io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }

    /// Check if the error only signals that the call would have blocked.
    pub fn is_would_block(&self) -> bool {
        self.0 == libc::EWOULDBLOCK || self.0 == libc::EAGAIN
    }

    /// Check if the call was interrupted by a signal before anything happened.
    pub fn is_interrupted(&self) -> bool {
        self.0 == libc::EINTR
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", io::Error::from_raw_os_error(self.0))
    }
}

impl std::error::Error for Errno {}

impl LibcResult for FdResult {
    fn is_fail(self) -> bool {
        self.0 == -1
    }
}

impl LibcResult for IoLenResult {
    fn is_fail(self) -> bool {
        self.0 == -1
    }
}

impl LibcResult for ClockResult {
    fn is_fail(self) -> bool {
        self.0 == -1
    }
}

impl From<Errno> for io::Error {
    fn from(err: Errno) -> io::Error {
        io::Error::from_raw_os_error(err.0 as i32)
    }
}

impl ifreq {
    fn new(name: &str) -> Self {
        let mut ifr_name = [0; libc::IF_NAMESIZE];

        // Keep the terminating zero.
        for (i, byte) in name.as_bytes().iter().take(libc::IF_NAMESIZE - 1).enumerate() {
            ifr_name[i] = *byte as libc::c_char
        }

        ifreq {
            ifr_name,
        }
    }

    /// The interface name, as possibly completed by the kernel.
    fn name(&self) -> String {
        self.ifr_name.iter()
            .take_while(|&&c| c != 0)
            .map(|&c| c as u8 as char)
            .collect()
    }
}

/// Read the monotonic clock.
pub fn now() -> Result<Instant, Errno> {
   let ts = unsafe {
       let mut ts = mem::MaybeUninit::<libc::timespec>::uninit();
       let res = libc::clock_gettime(libc::CLOCK_MONOTONIC, ts.as_mut_ptr());

       ClockResult(res).errno()?;

       ts.assume_init()
   };

   Ok(Instant::from_millis(ts.tv_sec as i64 * 1000 + ts.tv_nsec as i64 / 1_000_000))
}
