// ── pw-dump adapter ──
//
// PipeWire's JSON object dump. Used when the pulse compatibility server
// is absent or reports nothing.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::Error;
use crate::runner::{CommandRunner, run_checked};
use crate::sink::SinkEntry;

pub const PW_DUMP: &str = "pw-dump";

const NODE_TYPE: &str = "PipeWire:Interface:Node";

#[derive(Debug, Deserialize)]
struct PwObject {
    id: u32,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    info: Option<PwInfo>,
}

#[derive(Debug, Deserialize)]
struct PwInfo {
    #[serde(default)]
    props: serde_json::Map<String, Value>,
}

/// Client for `pw-dump`.
#[derive(Debug, Clone)]
pub struct PwDumpClient<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> PwDumpClient<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            program: PW_DUMP.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// List every audio sink node in the PipeWire graph.
    pub async fn list_sinks(&self) -> Result<Vec<SinkEntry>, Error> {
        let stdout = run_checked(&self.runner, &self.program, &[]).await?;
        let sinks = parse_dump(&stdout)?;
        debug!(count = sinks.len(), "parsed pw-dump sink nodes");
        Ok(sinks)
    }
}

/// Parse a `pw-dump` document into sink entries.
///
/// Only `Node` objects are considered; a node carrying a `media.class`
/// must be an `Audio/Sink` to be kept.
pub fn parse_dump(json: &str) -> Result<Vec<SinkEntry>, Error> {
    let objects: Vec<PwObject> =
        serde_json::from_str(json).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: json.chars().take(512).collect(),
        })?;

    Ok(objects
        .into_iter()
        .filter(|o| o.kind == NODE_TYPE)
        .filter_map(|o| {
            let props = o.info?.props;
            let is_sink = props
                .get("media.class")
                .and_then(Value::as_str)
                .is_none_or(|class| class.starts_with("Audio/Sink"));
            is_sink.then(|| node_to_sink(o.id, &props))
        })
        .filter(|s| !s.name.is_empty())
        .collect())
}

fn node_to_sink(id: u32, props: &serde_json::Map<String, Value>) -> SinkEntry {
    let properties = props
        .iter()
        .filter_map(|(k, v)| value_to_string(v).map(|s| (k.clone(), s)))
        .collect::<std::collections::BTreeMap<_, _>>();

    SinkEntry {
        index: Some(id),
        name: properties.get("node.name").cloned().unwrap_or_default(),
        description: properties.get("node.description").cloned(),
        sample_rate: properties.get("audio.rate").and_then(|r| r.parse().ok()),
        channels: properties.get("audio.channels").and_then(|c| c.parse().ok()),
        properties,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
