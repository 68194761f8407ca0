//! NDJSON message protocol between the control process and a worker.
//!
//! Each message is one JSON object per line on the worker's stdio. The
//! worker announces `ready`, the control process answers with `run`, and
//! the worker eventually emits exactly one `result`.

use gate_core::{WorkerInput, WorkerOutcome};
use serde::{Deserialize, Serialize};

/// Messages sent by the worker to the control process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Ready,
    Result { outcome: WorkerOutcome },
}

/// Messages sent by the control process to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Run { input: WorkerInput },
}

pub fn encode_line<T: Serialize>(message: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_worker_message(line: &str) -> Result<WorkerMessage, serde_json::Error> {
    serde_json::from_str(line.trim())
}

pub fn decode_control_message(line: &str) -> Result<ControlMessage, serde_json::Error> {
    serde_json::from_str(line.trim())
}
