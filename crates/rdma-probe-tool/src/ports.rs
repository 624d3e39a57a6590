use rdma_probe::device::DeviceList;
use rdma_probe::verbs::Ibverbs;

use anyhow::Context as _;
use tabled::Table;
use tabled::Tabled;

#[derive(clap::Args)]
pub struct Args {
    /// Kernel device name, e.g. mlx5_0
    name: String,

    /// Show only active ports
    #[clap(long)]
    active: bool,
}

#[derive(Tabled)]
struct PortInfo {
    port: u8,
    state: String,
    link_layer: String,
    lid: u16,
    active_mtu: usize,
}

pub fn run(args: Args) -> anyhow::Result<()> {
    let devices = DeviceList::available(Ibverbs)?;
    let dev = devices
        .lookup_by_name(&args.name)
        .with_context(|| format!("no device named {}", args.name))?;

    let ctx = dev.open()?;
    let ports = ctx.query_ports()?;

    let iter = ports
        .iter()
        .zip(1u8..)
        .filter(|(attr, _)| !args.active || attr.state == rdma_probe::device::PortState::Active)
        .map(|(attr, port_num)| PortInfo {
            port: port_num,
            state: format!("{:?}", attr.state),
            link_layer: format!("{:?}", attr.link_layer),
            lid: attr.lid,
            active_mtu: attr.active_mtu.size(),
        });

    let table = Table::new(iter);
    print!("{table}");

    Ok(())
}
