//! Camera identification from BLE manufacturer data
//!
//! Manufacturer data starts with the two-byte manufacturer id, followed by
//! a two-byte model identifier.

use djilive_types::DeviceModel;

use crate::constants::{gatt::MANUFACTURER_ID, models};

/// Check whether the manufacturer data belongs to a DJI device
pub fn is_dji_device(manufacturer_data: &[u8]) -> bool {
    manufacturer_data.starts_with(&MANUFACTURER_ID)
}

/// Identify the camera model
///
/// Returns `None` when the data is too short to carry a model identifier,
/// and [`DeviceModel::Unknown`] for identifiers this crate does not know.
///
/// # Examples
///
/// ```
/// use djilive_core::model::model_from_manufacturer_data;
/// use djilive_types::DeviceModel;
///
/// let model = model_from_manufacturer_data(&[0xAA, 0x08, 0x14, 0x00]);
/// assert_eq!(model, Some(DeviceModel::OsmoAction4));
/// ```
pub fn model_from_manufacturer_data(manufacturer_data: &[u8]) -> Option<DeviceModel> {
    let model_id = manufacturer_data.get(2..4)?;

    let model = if model_id == models::OSMO_ACTION_3 {
        DeviceModel::OsmoAction3
    } else if model_id == models::OSMO_ACTION_4 {
        DeviceModel::OsmoAction4
    } else if model_id == models::OSMO_POCKET_3 {
        DeviceModel::OsmoPocket3
    } else {
        DeviceModel::Unknown
    };

    Some(model)
}
