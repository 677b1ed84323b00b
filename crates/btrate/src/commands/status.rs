//! Single-shot status and the snapshot table shared with `watch`.

use std::sync::Arc;

use tabled::Tabled;

use btrate_core::{ConfigStatus, DeviceSnapshot};

use crate::cli::{GlobalOpts, OutputFormat, StatusArgs};
use crate::config::Config;
use crate::error::CliError;
use crate::output::{self, Tone, or_dash, paint};

use super::Ctx;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SnapshotRow {
    #[tabled(rename = "Device")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Codec")]
    codec: String,
    #[tabled(rename = "Mode")]
    mode: String,
    #[tabled(rename = "Rate")]
    rate: String,
    #[tabled(rename = "Bitpool")]
    bitpool: String,
    #[tabled(rename = "Bitrate")]
    bitrate: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl SnapshotRow {
    fn new(s: &DeviceSnapshot, color: bool) -> Self {
        let mode = s.params.map_or_else(
            || "-".into(),
            |p| {
                if p.is_dual_channel_xq {
                    format!("{} (XQ)", p.channel_mode.label())
                } else {
                    p.channel_mode.label().to_owned()
                }
            },
        );
        Self {
            id: s.device_id().to_string(),
            name: s.record.display_name.clone(),
            codec: s.record.codec.to_string(),
            mode,
            rate: rate_label(s),
            bitpool: or_dash(s.params.map(|p| p.bitpool)),
            bitrate: or_dash(s.bitrate),
            status: status_cell(&s.status, color),
        }
    }
}

fn status_cell(status: &ConfigStatus, color: bool) -> String {
    match status {
        ConfigStatus::Decoded => paint("decoded", Tone::Good, color),
        ConfigStatus::NotApplicable => paint("nominal", Tone::Dim, color),
        ConfigStatus::Unknown(_) => paint("unknown", Tone::Warn, color),
    }
}

/// Negotiated SBC rate when decoded, else the server's stream rate.
pub fn rate_label(s: &DeviceSnapshot) -> String {
    let hz = s
        .params
        .map(|p| p.sample_rate_hz.hz())
        .or(s.record.sample_rate);
    or_dash(hz.map(khz))
}

pub fn khz(hz: u32) -> String {
    format!("{:.1} kHz", f64::from(hz) / 1000.0)
}

fn plain_line(s: &Arc<DeviceSnapshot>) -> String {
    format!(
        "{}\t{}\t{}",
        s.device_id(),
        s.record.codec,
        s.bitrate.map_or_else(
            || "-".into(),
            |b| {
                if b.is_estimated() {
                    format!("~{:.0}", b.kbps)
                } else {
                    format!("{:.1}", b.kbps)
                }
            }
        )
    )
}

fn detail(s: &Arc<DeviceSnapshot>) -> String {
    let mut lines = vec![
        format!("Device:     {}", s.device_id()),
        format!("Name:       {}", s.record.display_name),
        format!("Node:       {}", s.record.node_name),
        format!("Codec:      {}", s.record.codec),
        format!("Profile:    {}", s.record.profile.as_deref().unwrap_or("-")),
        format!("Rate:       {}", rate_label(s)),
    ];
    if let Some(p) = s.params {
        lines.push(format!("Mode:       {}", p.channel_mode.label()));
        lines.push(format!("Blocks:     {}", p.block_length.count()));
        lines.push(format!("Subbands:   {}", p.subbands.count()));
        lines.push(format!("Allocation: {}", p.allocation_method));
        lines.push(format!("Bitpool:    {}..{}", p.min_bitpool, p.bitpool));
        lines.push(format!(
            "SBC-XQ:     {}",
            if p.is_dual_channel_xq { "likely (dual channel, high bitpool)" } else { "no" }
        ));
    }
    if let Some(ref raw) = s.raw {
        lines.push(format!("Raw:        {}", raw.hex()));
    }
    lines.push(format!("Bitrate:    {}", or_dash(s.bitrate)));
    if let Some(per_channel) = s.bitrate.and_then(|b| b.per_channel_kbps) {
        lines.push(format!("Per chan.:  {per_channel:.1} kbps"));
    }
    if let Some(issue) = s.status.issue() {
        lines.push(format!("Issue:      {issue}"));
    }
    lines.push(format!(
        "Seen:       {}",
        s.last_seen_at.with_timezone(&chrono::Local).format("%H:%M:%S")
    ));
    lines.join("\n")
}

/// Render a snapshot list in the chosen format.
pub fn render_snapshots(snapshots: &[Arc<DeviceSnapshot>], ctx: Ctx) -> String {
    output::render_list(
        ctx.format,
        snapshots,
        |s| SnapshotRow::new(s, ctx.color),
        plain_line,
    )
}

fn matches_device(s: &DeviceSnapshot, wanted: &str) -> bool {
    s.device_id().as_str().eq_ignore_ascii_case(wanted)
        || s.record.node_name == wanted
        || s.record.display_name == wanted
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    args: &StatusArgs,
    cfg: &Config,
    global: &GlobalOpts,
    ctx: Ctx,
) -> Result<(), CliError> {
    let monitor = super::build_monitor(global, cfg, None, None)?;
    let snapshots = monitor.sample().await?;

    if let Some(ref wanted) = args.device {
        let snapshot = snapshots
            .iter()
            .find(|s| matches_device(s, wanted))
            .ok_or_else(|| CliError::DeviceNotFound {
                identifier: wanted.clone(),
            })?;
        let out = output::render_single(ctx.format, snapshot, detail, plain_line);
        output::print_output(&out, ctx.quiet);
        return Ok(());
    }

    if snapshots.is_empty() && matches!(ctx.format, OutputFormat::Table | OutputFormat::Plain) {
        output::print_output("No Bluetooth audio devices found", ctx.quiet);
        return Ok(());
    }

    output::print_output(&render_snapshots(&snapshots, ctx), ctx.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use btrate_core::{Codec, DeviceId, DeviceRecord, RawTransportConfig, codec};

    use super::*;

    fn snapshot(bytes: [u8; 4]) -> Arc<DeviceSnapshot> {
        let raw = RawTransportConfig::new(Codec::SbcXq, bytes);
        let params = codec::decode(&raw).unwrap();
        Arc::new(DeviceSnapshot {
            record: DeviceRecord {
                device_id: DeviceId::from("AC:80:0A:12:34:56"),
                display_name: "WH-1000XM4".into(),
                transport_ref: None,
                codec: Codec::SbcXq,
                codec_raw: Some("sbc_xq".into()),
                profile: Some("a2dp-sink".into()),
                sample_rate: Some(48_000),
                channels: Some(2),
                node_name: "bluez_output.AC_80_0A_12_34_56.1".into(),
            },
            params: Some(params),
            bitrate: Some(codec::estimate(&params)),
            status: ConfigStatus::Decoded,
            raw: Some(raw),
            last_seen_at: chrono::Utc::now(),
        })
    }

    #[test]
    fn row_prefers_negotiated_rate_and_flags_xq() {
        let row = SnapshotRow::new(&snapshot([0x24, 0x15, 2, 47]), false);
        assert_eq!(row.rate, "44.1 kHz");
        assert_eq!(row.mode, "Dual Channel (XQ)");
        assert_eq!(row.bitpool, "47");
        assert_eq!(row.status, "decoded");
    }

    #[test]
    fn plain_output_is_tab_separated() {
        let line = plain_line(&snapshot([0x21, 0x15, 2, 53]));
        assert_eq!(line, "AC:80:0A:12:34:56\tSBC-XQ\t328.0");
    }

    #[test]
    fn unknown_xq_configuration_shows_assumed_rate() {
        let mut s = (*snapshot([0x24, 0x15, 2, 47])).clone();
        s.params = None;
        s.raw = None;
        s.bitrate = Codec::SbcXq.assumed_sbc_estimate();
        s.status = ConfigStatus::Unknown(btrate_core::ConfigIssue::Fetch(
            btrate_core::FetchError::NoConfigurationExposed {
                reason: "negotiating".into(),
            },
        ));
        let s = Arc::new(s);

        let row = SnapshotRow::new(&s, false);
        assert_eq!(row.bitrate, "~552 kbps (est.)");
        assert_eq!(row.bitpool, "-");
        assert_eq!(plain_line(&s), "AC:80:0A:12:34:56\tSBC-XQ\t~552");
    }

    #[test]
    fn devices_match_by_address_or_node() {
        let s = snapshot([0x21, 0x15, 2, 53]);
        assert!(matches_device(&s, "ac:80:0a:12:34:56"));
        assert!(matches_device(&s, "bluez_output.AC_80_0A_12_34_56.1"));
        assert!(!matches_device(&s, "00:11:22:33:44:55"));
    }
}
