// ── BlueZ object-manager reader ──
//
// Reads `org.bluez` managed objects through `busctl --json` and exposes the
// media transports with their negotiated A2DP configuration bytes.

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::runner::{CommandRunner, run_checked};

pub const BUSCTL: &str = "busctl";
pub const BLUEZ_SERVICE: &str = "org.bluez";
pub const DEVICE_INTERFACE: &str = "org.bluez.Device1";
pub const MEDIA_TRANSPORT_INTERFACE: &str = "org.bluez.MediaTransport1";

/// Object path of a device below an adapter, e.g.
/// `/org/bluez/hci0/dev_AC_80_0A_12_34_56`.
pub fn device_path(adapter: &str, address: &str) -> String {
    format!(
        "/org/bluez/{adapter}/dev_{}",
        address.trim().to_ascii_uppercase().replace(':', "_")
    )
}

/// One `org.bluez.MediaTransport1` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportInfo {
    pub path: String,
    /// Owning device object path.
    pub device: Option<String>,
    /// A2DP codec id (`0x00` SBC, `0x02` AAC, `0xff` vendor).
    pub codec: Option<u8>,
    /// Negotiated codec configuration; absent while negotiation is pending.
    pub configuration: Option<Vec<u8>>,
    /// `idle`, `pending` or `active`.
    pub state: Option<String>,
}

impl TransportInfo {
    fn belongs_to(&self, device_path: &str) -> bool {
        match self.device.as_deref() {
            Some(device) => device == device_path,
            None => self
                .path
                .strip_prefix(device_path)
                .is_some_and(|rest| rest.starts_with('/')),
        }
    }

    fn state_rank(&self) -> u8 {
        match self.state.as_deref() {
            Some("active") => 0,
            Some("pending") => 1,
            _ => 2,
        }
    }
}

/// Parsed result of `GetManagedObjects`, reduced to what we read.
#[derive(Debug, Clone, Default)]
pub struct ManagedObjects {
    devices: BTreeSet<String>,
    transports: Vec<TransportInfo>,
}

impl ManagedObjects {
    /// Parse `busctl --json=short call ... GetManagedObjects` output.
    ///
    /// The reply is `{"type":"a{oa{sa{sv}}}","data":[{path:{iface:{prop:{"type","data"}}}}]}`.
    pub fn parse(json: &str) -> Result<Self, Error> {
        let root: Value = serde_json::from_str(json).map_err(|e| deserialization(&e, json))?;
        let objects = root
            .get("data")
            .and_then(Value::as_array)
            .and_then(|d| d.first())
            .and_then(Value::as_object)
            .ok_or_else(|| Error::Deserialization {
                message: "GetManagedObjects reply has no object dictionary".into(),
                body: json.chars().take(512).collect(),
            })?;

        let mut parsed = Self::default();
        for (path, interfaces) in objects {
            if interfaces.get(DEVICE_INTERFACE).is_some() {
                parsed.devices.insert(path.clone());
            }
            if let Some(transport) = interfaces.get(MEDIA_TRANSPORT_INTERFACE) {
                parsed.transports.push(TransportInfo {
                    path: path.clone(),
                    device: variant(transport, "Device")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                    codec: variant(transport, "Codec")
                        .and_then(Value::as_u64)
                        .and_then(|c| u8::try_from(c).ok()),
                    configuration: variant(transport, "Configuration").and_then(byte_array),
                    state: variant(transport, "State")
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                });
            }
        }
        Ok(parsed)
    }

    /// Whether BlueZ still knows the device object.
    pub fn has_device(&self, device_path: &str) -> bool {
        self.devices.contains(device_path)
    }

    /// The device's preferred transport: active first, then pending, then any.
    pub fn transport_for(&self, device_path: &str) -> Option<&TransportInfo> {
        self.transports
            .iter()
            .filter(|t| t.belongs_to(device_path))
            .min_by_key(|t| (t.configuration.is_none(), t.state_rank()))
    }
}

/// Client for the BlueZ system-bus service.
#[derive(Debug, Clone)]
pub struct BluezClient<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> BluezClient<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            program: BUSCTL.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub async fn managed_objects(&self) -> Result<ManagedObjects, Error> {
        let stdout = run_checked(
            &self.runner,
            &self.program,
            &[
                "--system",
                "--json=short",
                "call",
                BLUEZ_SERVICE,
                "/",
                "org.freedesktop.DBus.ObjectManager",
                "GetManagedObjects",
            ],
        )
        .await?;
        let objects = ManagedObjects::parse(&stdout)?;
        debug!(
            devices = objects.devices.len(),
            transports = objects.transports.len(),
            "read bluez managed objects"
        );
        Ok(objects)
    }
}

fn variant<'a>(interface: &'a Value, property: &str) -> Option<&'a Value> {
    interface.get(property)?.get("data")
}

fn byte_array(value: &Value) -> Option<Vec<u8>> {
    value
        .as_array()?
        .iter()
        .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
        .collect()
}

fn deserialization(err: &serde_json::Error, body: &str) -> Error {
    Error::Deserialization {
        message: err.to_string(),
        body: body.chars().take(512).collect(),
    }
}
