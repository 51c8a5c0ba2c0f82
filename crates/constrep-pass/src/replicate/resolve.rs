//! Consumer device resolution.

use constrep_core::{DeviceName, Node};

use crate::error::PassError;

/// Returns the CPU device on the host of `consumer`'s assigned device,
/// rendered as a full device name.
///
/// This rendered name is the key consumers are grouped by, so two consumers
/// on different accelerators of the same task share one replica.
pub fn resolve_consumer_cpu_device(consumer: &Node) -> Result<String, PassError> {
    let device = consumer
        .assigned_device()
        .ok_or_else(|| PassError::NoAssignedDevice {
            node: consumer.name.clone(),
        })?;
    let parsed = device.parse::<DeviceName>().map_err(|source| PassError::MalformedDeviceName {
        node: consumer.name.clone(),
        device: device.to_string(),
        source,
    })?;
    Ok(parsed.to_cpu_device().to_string())
}
