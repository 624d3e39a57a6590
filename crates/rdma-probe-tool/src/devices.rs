use rdma_probe::device::list_devices;
use rdma_probe::verbs::Ibverbs;

use tabled::Table;
use tabled::Tabled;

#[derive(Tabled)]
struct DeviceInfo {
    name: String,
    guid: String,
    stable_index: String,
    node_type: String,
}

pub fn run() -> anyhow::Result<()> {
    let descriptors = list_devices(&Ibverbs)?;

    if descriptors.is_empty() {
        println!("No available rdma devices");
        return Ok(());
    }

    let iter = descriptors.iter().map(|desc| DeviceInfo {
        name: desc.name().to_owned(),
        guid: format!("{:x}", desc.guid()),
        stable_index: match desc.stable_index() {
            Some(idx) => idx.to_string(),
            None => "unsupported".to_owned(),
        },
        node_type: format!("{:?}", desc.node_type()),
    });

    let table = Table::new(iter);
    print!("{table}");

    Ok(())
}
