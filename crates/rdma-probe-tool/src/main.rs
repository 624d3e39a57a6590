#![deny(clippy::all)]

mod devices;
mod ports;

use std::env;

use clap::StructOpt;

#[derive(clap::Parser)]
enum Opt {
    /// List the RDMA adapters visible on this host
    Devices,
    /// Show per-port attributes of one adapter
    Ports(ports::Args),
}

fn main() -> anyhow::Result<()> {
    if env::var("RUST_BACKTRACE").is_err() {
        env::set_var("RUST_BACKTRACE", "1");
    }
    tracing_subscriber::fmt::init();

    let opt = Opt::parse();
    match opt {
        Opt::Devices => devices::run()?,
        Opt::Ports(args) => ports::run(args)?,
    }

    Ok(())
}
