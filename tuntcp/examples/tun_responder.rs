//! Answers pings and accepts TCP connections on a tun interface.
//!
//! # Usage
//!
//! The example creates a multi-queue tun device, assigns it an address and then plays the host
//! on the far side of that link. Every TCP port accepts connections, established connections are
//! greeted with one line of text.
//!
//! 1. Start the example, which requires `CAP_NET_ADMIN` for creating the device:
//!
//!   > $ sudo cargo run --example tun_responder -- --name tun0 --host 10.0.0.1
//! 2. Ping the other end of the link from the host:
//!
//!   > $ ping -OI tun0 10.0.0.2
//! 3. Connect to any port, close with `^D` or wait for the server to close after its timeout:
//!
//!   > $ nc 10.0.0.2 80
//!
//! Set `RUST_LOG=tuntcp=trace` to follow every segment.
use std::error::Error;

use structopt::StructOpt;

use tuntcp::layer::tcp::{self, Handler, Io, Session};
use tuntcp::nic::sys::TunInterface;
use tuntcp::server::Server;
use tuntcp::wire::Ipv4Address;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let Config {
        name,
        host,
        netmask,
        mtu,
        quiet,
    } = Config::from_args();

    let mut interface = TunInterface::new(&name, 2)?;
    interface.configure(host, netmask, mtu)?;
    interface.up()?;
    log::info!("serving on {} as {}", interface.name(), host);

    let mut queues = interface.into_queues().into_iter();
    let (rx, tx) = match (queues.next(), queues.next()) {
        (Some(rx), Some(tx)) => (rx, tx),
        _ => return Err("the interface did not provide two queues".into()),
    };

    let config = tcp::Config {
        mtu,
        ..tcp::Config::default()
    };
    let greeter = Greeter { quiet };
    Server::with_handler([rx, tx], config, greeter).run()?;
    Ok(())
}

/// Writes a line to every new connection.
struct Greeter {
    quiet: bool,
}

impl Handler for Greeter {
    fn on_connect(&mut self, session: &mut Session, io: &mut Io) {
        log::info!("connection from {}", session.key());
        if !self.quiet {
            session.send(b"hello from tuntcp\n", io);
        }
    }
}

#[derive(StructOpt)]
struct Config {
    /// Name of the tun device to create or attach to.
    #[structopt(long = "name", default_value = "tun0")]
    name: String,

    /// Address assigned to the interface on the host side.
    #[structopt(long = "host", default_value = "10.0.0.1")]
    host: Ipv4Address,

    #[structopt(long = "netmask", default_value = "255.255.255.0")]
    netmask: Ipv4Address,

    #[structopt(long = "mtu", default_value = "1500")]
    mtu: usize,

    /// Accept connections without greeting them.
    #[structopt(long = "quiet")]
    quiet: bool,
}
