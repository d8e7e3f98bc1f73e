// Copyright (C) 2016 whitequark@whitequark.org
// Copyright (C) 2019 Andreas Molzer <andreas.molzer@tum.de>
//
// in large parts from `smoltcp` originally distributed under 0-clause BSD
use core::mem;

use super::{ifreq, Errno, LibcResult, IoctlResult};
use crate::wire::Ipv4Address;
use libc;

/// The size of the kernel's `struct ifreq`, name included.
const IFREQ_SIZE: usize = 40;
const IFREQ_DATA: usize = IFREQ_SIZE - libc::IF_NAMESIZE;

/// Adds a method to attach to a tun.
///
/// This is an extension trait implemented for `ifreq` in Linux.
pub(crate) trait TunSetIf {
    /// Attach to an existing interface or create a new one.
    ///
    /// The kernel may complete a name template, the resulting name is written back.
    fn tun_set_if(&mut self, fd: libc::c_int, flags: libc::c_short) -> Result<(), Errno>;

    /// Convenience method over `set_if` for one queue of a multi-queue tun without packet info.
    fn tun_set_multi_queue(&mut self, fd: libc::c_int) -> Result<(), Errno>;
}

/// Adds methods to configure the network layer of an interface.
///
/// These requests go to an `AF_INET` control socket, not to the tun descriptor.
pub(crate) trait NetdeviceConfig {
    fn set_addr(&mut self, sock: libc::c_int, addr: Ipv4Address) -> Result<(), Errno>;
    fn set_netmask(&mut self, sock: libc::c_int, mask: Ipv4Address) -> Result<(), Errno>;
    fn set_mtu(&mut self, sock: libc::c_int, mtu: libc::c_int) -> Result<(), Errno>;
    fn get_flags(&mut self, sock: libc::c_int) -> Result<libc::c_short, Errno>;
    fn set_flags(&mut self, sock: libc::c_int, flags: libc::c_short) -> Result<(), Errno>;
}

impl ifreq {
    pub(crate) const SIOCGIFFLAGS:   libc::Ioctl = 0x8913;
    pub(crate) const SIOCSIFFLAGS:   libc::Ioctl = 0x8914;
    pub(crate) const SIOCSIFADDR:    libc::Ioctl = 0x8916;
    pub(crate) const SIOCSIFNETMASK: libc::Ioctl = 0x891c;
    pub(crate) const SIOCSIFMTU:     libc::Ioctl = 0x8922;

    pub(crate) const TUNSETIFF:       libc::Ioctl = 0x400454CA;
    pub(crate) const IFF_TUN:         libc::c_short = 0x0001;
    pub(crate) const IFF_NO_PI:       libc::c_short = 0x1000;
    pub(crate) const IFF_MULTI_QUEUE: libc::c_short = 0x0100;

    pub(crate) const IFF_UP:      libc::c_short = 0x0001;
    pub(crate) const IFF_RUNNING: libc::c_short = 0x0040;
}

#[repr(C)]
struct ShortRequest {
    interface: ifreq,
    value: libc::c_short,
    _pad: [u8; IFREQ_DATA - 2],
}

#[repr(C)]
struct IntRequest {
    interface: ifreq,
    value: libc::c_int,
    _pad: [u8; IFREQ_DATA - 4],
}

#[repr(C)]
struct AddrRequest {
    interface: ifreq,
    addr: libc::sockaddr_in,
    _pad: [u8; IFREQ_DATA - 16],
}

impl ShortRequest {
    fn new(interface: ifreq, value: libc::c_short) -> Self {
        ShortRequest { interface, value, _pad: [0; IFREQ_DATA - 2] }
    }
}

impl AddrRequest {
    fn new(interface: ifreq, addr: Ipv4Address) -> Self {
        // SAFETY: sockaddr_in is plain old data, all zeroes is a valid value.
        let mut sockaddr: libc::sockaddr_in = unsafe { mem::zeroed() };
        sockaddr.sin_family = libc::AF_INET as libc::sa_family_t;
        sockaddr.sin_addr.s_addr = u32::from_ne_bytes(addr.0);
        AddrRequest { interface, addr: sockaddr, _pad: [0; IFREQ_DATA - 16] }
    }
}

fn ioctl<T>(fd: libc::c_int, request: libc::Ioctl, arg: &mut T) -> Result<(), Errno> {
    let res = unsafe {
        libc::ioctl(fd, request, arg as *mut T)
    };
    IoctlResult(res).errno()
}

impl TunSetIf for ifreq {
    fn tun_set_if(&mut self, fd: libc::c_int, flags: libc::c_short) -> Result<(), Errno> {
        let mut request = ShortRequest::new(*self, flags);
        ioctl(fd, Self::TUNSETIFF, &mut request)?;
        *self = request.interface;
        Ok(())
    }

    fn tun_set_multi_queue(&mut self, fd: libc::c_int) -> Result<(), Errno> {
        self.tun_set_if(fd, Self::IFF_TUN | Self::IFF_NO_PI | Self::IFF_MULTI_QUEUE)
    }
}

impl NetdeviceConfig for ifreq {
    fn set_addr(&mut self, sock: libc::c_int, addr: Ipv4Address) -> Result<(), Errno> {
        let mut request = AddrRequest::new(*self, addr);
        ioctl(sock, Self::SIOCSIFADDR, &mut request)
    }

    fn set_netmask(&mut self, sock: libc::c_int, mask: Ipv4Address) -> Result<(), Errno> {
        let mut request = AddrRequest::new(*self, mask);
        ioctl(sock, Self::SIOCSIFNETMASK, &mut request)
    }

    fn set_mtu(&mut self, sock: libc::c_int, mtu: libc::c_int) -> Result<(), Errno> {
        let mut request = IntRequest { interface: *self, value: mtu, _pad: [0; IFREQ_DATA - 4] };
        ioctl(sock, Self::SIOCSIFMTU, &mut request)
    }

    fn get_flags(&mut self, sock: libc::c_int) -> Result<libc::c_short, Errno> {
        let mut request = ShortRequest::new(*self, 0);
        ioctl(sock, Self::SIOCGIFFLAGS, &mut request)?;
        Ok(request.value)
    }

    fn set_flags(&mut self, sock: libc::c_int, flags: libc::c_short) -> Result<(), Errno> {
        let mut request = ShortRequest::new(*self, flags);
        ioctl(sock, Self::SIOCSIFFLAGS, &mut request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_match_kernel_ifreq() {
        assert_eq!(mem::size_of::<ShortRequest>(), IFREQ_SIZE);
        assert_eq!(mem::size_of::<AddrRequest>(), IFREQ_SIZE);
        assert!(mem::size_of::<IntRequest>() >= IFREQ_SIZE);
    }
}
