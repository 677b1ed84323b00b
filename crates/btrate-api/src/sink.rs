// ── Audio-server sink entries ──
//
// Format-neutral record produced by both the `pactl` and `pw-dump`
// parsers. Keeps the raw property bag; interpretation happens in core.

use std::collections::BTreeMap;

use serde::Serialize;

/// One sink node as reported by the audio server.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SinkEntry {
    /// Server-assigned index (`Sink #N` / PipeWire object id).
    pub index: Option<u32>,
    /// Node name, e.g. `bluez_output.AC_80_0A_12_34_56.1`.
    pub name: String,
    pub description: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    /// Every `key = value` property, verbatim.
    pub properties: BTreeMap<String, String>,
}

impl SinkEntry {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// A sink is Bluetooth-backed when its device API is BlueZ, its bus is
    /// bluetooth, or (older servers) its node name carries the `bluez` prefix.
    pub fn is_bluetooth(&self) -> bool {
        self.property("device.api")
            .is_some_and(|api| api.contains("bluez"))
            || self.property("device.bus") == Some("bluetooth")
            || self.name.contains("bluez")
    }

    pub fn bluez_address(&self) -> Option<&str> {
        self.property("api.bluez5.address")
    }

    pub fn bluez_codec(&self) -> Option<&str> {
        self.property("api.bluez5.codec")
    }

    pub fn bluez_profile(&self) -> Option<&str> {
        self.property("api.bluez5.profile")
            .or_else(|| self.property("device.profile.name"))
            .or_else(|| self.property("device.profile"))
    }
}

/// Strip one layer of matching double quotes.
pub(crate) fn unquote(raw: &str) -> &str {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
}
