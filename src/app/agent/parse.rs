use std::collections::HashMap;

use crate::app::error::AppError;
use crate::app::models::DeviceSnapshot;

/// Parses the agent's "Key: Value" info dump into a map. Lines without a
/// separator are ignored.
pub fn parse_info_map(output: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(": ") else {
            continue;
        };
        let key = key.trim();
        if !key.is_empty() {
            map.insert(key.to_string(), value.trim().to_string());
        }
    }
    map
}

/// Builds a device snapshot from the info map. Product type and serial number
/// are required by downstream stages; their absence is fatal to the caller.
pub fn build_device_snapshot(
    map: &HashMap<String, String>,
    trace_id: &str,
) -> Result<DeviceSnapshot, AppError> {
    let product_type = map
        .get("ProductType")
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| {
            AppError::device_not_found("Device info is missing ProductType", trace_id)
        })?;
    let serial_number = map
        .get("SerialNumber")
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| {
            AppError::device_not_found("Device info is missing SerialNumber", trace_id)
        })?;

    Ok(DeviceSnapshot {
        product_type,
        serial_number,
        unique_device_id: map.get("UniqueDeviceID").cloned(),
        product_version: map.get("ProductVersion").cloned(),
        device_name: map.get("DeviceName").cloned(),
        activation_state: map.get("ActivationState").cloned(),
    })
}
