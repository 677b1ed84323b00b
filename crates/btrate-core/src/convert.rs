// ── Listing-to-domain conversion ──
//
// Normalizes `btrate_api::SinkEntry` (from either listing source) into
// `DeviceRecord`. Format quirks of the sources stop here.

use indexmap::IndexMap;

use btrate_api::SinkEntry;
use btrate_api::bluez::device_path;

use crate::model::{Codec, DeviceId, DeviceRecord, TransportRef};

/// Bluetooth records from a sink listing, in listing order.
///
/// Non-Bluetooth sinks are dropped. A device exposing several sinks
/// (e.g. two A2DP nodes) is reported once, by its first sink.
pub fn records_from_sinks(sinks: &[SinkEntry], adapter: &str) -> Vec<DeviceRecord> {
    let mut records: IndexMap<DeviceId, DeviceRecord> = IndexMap::new();
    for record in sinks.iter().filter_map(|s| sink_to_record(s, adapter)) {
        records.entry(record.device_id.clone()).or_insert(record);
    }
    records.into_values().collect()
}

/// Normalize one sink; `None` for sinks that are not Bluetooth-backed.
pub fn sink_to_record(sink: &SinkEntry, adapter: &str) -> Option<DeviceRecord> {
    if !sink.is_bluetooth() {
        return None;
    }

    let address = sink
        .bluez_address()
        .and_then(normalize_address)
        .or_else(|| address_from_node_name(&sink.name));

    let codec_raw = sink.bluez_codec().map(str::to_owned);
    let profile = sink.bluez_profile().map(str::to_owned);
    let codec = codec_raw
        .as_deref()
        .map(Codec::from_bluez_name)
        .or_else(|| profile.as_deref().and_then(Codec::from_profile))
        .unwrap_or_else(|| Codec::Other("unknown".into()));

    let display_name = sink
        .description
        .clone()
        .or_else(|| sink.property("device.description").map(str::to_owned))
        .or_else(|| sink.property("device.alias").map(str::to_owned))
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| sink.name.clone());

    let transport_ref = address.as_deref().map(|addr| TransportRef {
        device_path: device_path(adapter, addr),
        codec_hint: codec.clone(),
    });

    Some(DeviceRecord {
        device_id: DeviceId::new(address.unwrap_or_else(|| sink.name.clone())),
        display_name,
        transport_ref,
        codec,
        codec_raw,
        profile,
        sample_rate: sink.sample_rate,
        channels: sink.channels,
        node_name: sink.name.clone(),
    })
}

/// `ac:80:0a:12:34:56` / `AC_80_0A_12_34_56` -> `AC:80:0A:12:34:56`.
pub fn normalize_address(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw.trim().split([':', '_']).collect();
    let valid = parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.bytes().all(|b| b.is_ascii_hexdigit()));
    valid.then(|| parts.join(":").to_ascii_uppercase())
}

/// Recover the address from node names like `bluez_output.AC_80_0A_12_34_56.1`
/// or `bluez_sink.AC_80_0A_12_34_56.a2dp_sink`.
fn address_from_node_name(name: &str) -> Option<String> {
    name.split('.').skip(1).find_map(normalize_address)
}
