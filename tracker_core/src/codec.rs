//! Cloud codec boundary.
//!
//! The data module hands a [`CloudMessage`] to a [`CloudCodec`] and ships
//! whatever bytes come back. The wire format is the codec's business;
//! [`JsonCodec`] is the serde_json implementation used by the image.

use serde::Serialize;
use thiserror::Error;

use tracker_common::device::DeviceConfig;
use tracker_common::event::{
    Acceleration, Battery, ButtonPress, CellularInfo, Environmental, GnssFix, ModemDynamic,
    ModemStatic,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The message has nothing to encode.
    #[error("no data to encode")]
    NoData,

    #[error("encoding failed: {0}")]
    Encode(String),
}

/// Newest sample of each kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modem_static: Option<ModemStatic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modem_dynamic: Option<ModemDynamic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery: Option<Battery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environmental: Option<Environmental>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gnss: Option<GnssFix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbor_cells: Option<CellularInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement: Option<Acceleration>,
}

impl DataRecord {
    pub fn is_empty(&self) -> bool {
        self.modem_static.is_none()
            && self.modem_dynamic.is_none()
            && self.battery.is_none()
            && self.environmental.is_none()
            && self.gnss.is_none()
            && self.neighbor_cells.is_none()
            && self.movement.is_none()
    }
}

/// Older samples still waiting to be published.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchRecord {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modem_dynamic: Vec<ModemDynamic>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub battery: Vec<Battery>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub environmental: Vec<Environmental>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub gnss: Vec<GnssFix>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub neighbor_cells: Vec<CellularInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub movement: Vec<Acceleration>,
}

impl BatchRecord {
    pub fn is_empty(&self) -> bool {
        self.modem_dynamic.is_empty()
            && self.battery.is_empty()
            && self.environmental.is_empty()
            && self.gnss.is_empty()
            && self.neighbor_cells.is_empty()
            && self.movement.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "lowercase")]
pub enum CloudMessage {
    Data(DataRecord),
    Batch(BatchRecord),
    Ui(Vec<ButtonPress>),
    Config(DeviceConfig),
}

impl CloudMessage {
    pub fn is_empty(&self) -> bool {
        match self {
            CloudMessage::Data(record) => record.is_empty(),
            CloudMessage::Batch(batch) => batch.is_empty(),
            CloudMessage::Ui(presses) => presses.is_empty(),
            CloudMessage::Config(_) => false,
        }
    }
}

pub trait CloudCodec: Send + 'static {
    fn encode(&mut self, message: &CloudMessage) -> Result<Vec<u8>, CodecError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl CloudCodec for JsonCodec {
    fn encode(&mut self, message: &CloudMessage) -> Result<Vec<u8>, CodecError> {
        if message.is_empty() {
            return Err(CodecError::NoData);
        }
        serde_json::to_vec(message).map_err(|e| CodecError::Encode(e.to_string()))
    }
}
