//! One-row-per-capture aggregate, computed only from documented table columns.
use serde::Serialize;
use std::collections::HashMap;

use super::flows::DirectionPolicy;
use super::table::{Column, FeatureTable, Value};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CaptureSummary {
    pub packets: usize,
    pub flows: usize,
    pub total_bytes: f64,
    pub avg_packet_size: Option<f64>,
    pub inter_packet_time_mean: Option<f64>,
    pub max_flow_size: Option<f64>,
    pub max_flow_volume: Option<f64>,
    pub total_retransmissions: Option<f64>,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
    pub duration: Option<f64>,
}

/// `(ip, port)` of one side of a flow, as rendered in the table.
type Endpoint = (String, String);
type FlowKey = (Endpoint, Endpoint, String);

/// Summarises `table`. Meant for the table as extracted: after cleaning,
/// imputed flow columns would inflate the flow count. `policy` must be the one
/// the table was extracted with.
pub fn summarize(table: &FeatureTable, policy: DirectionPolicy) -> CaptureSummary {
    let sizes = numbers(table, Column::PacketSize);
    let timestamps = numbers(table, Column::Timestamp);
    let volumes = numbers(table, Column::FlowVolume);

    let first_timestamp = timestamps.iter().copied().reduce(f64::min);
    let last_timestamp = timestamps.iter().copied().reduce(f64::max);

    CaptureSummary {
        packets: table.len(),
        // A flow contributes exactly one row with volume 1, its first packet.
        flows: volumes.iter().filter(|v| **v == 1.0).count(),
        total_bytes: sizes.iter().sum(),
        avg_packet_size: mean(&sizes),
        inter_packet_time_mean: mean(&numbers(table, Column::InterPacketTime)),
        max_flow_size: numbers(table, Column::FlowSize).into_iter().reduce(f64::max),
        max_flow_volume: volumes.into_iter().reduce(f64::max),
        total_retransmissions: total_retransmissions(table, policy),
        first_timestamp,
        last_timestamp,
        duration: first_timestamp.zip(last_timestamp).map(|(first, last)| last - first),
    }
}

/// Sum over flows of each flow's final retransmission count. The column is a
/// running counter, so it is read once per flow rather than summed over rows.
fn total_retransmissions(table: &FeatureTable, policy: DirectionPolicy) -> Option<f64> {
    let mut per_flow: HashMap<FlowKey, f64> = HashMap::new();

    for row in 0..table.len() {
        let count = table.get(row, Column::FlowRetransmissions).and_then(Value::as_f64);
        if let Some((count, key)) = count.zip(flow_key(table, row, policy)) {
            let latest = per_flow.entry(key).or_insert(count);
            *latest = latest.max(count);
        }
    }

    if per_flow.is_empty() {
        return None;
    }
    Some(per_flow.values().sum())
}

fn flow_key(table: &FeatureTable, row: usize, policy: DirectionPolicy) -> Option<FlowKey> {
    let cell = |column: Column| table.get(row, column).map(Value::to_string);

    let src = (cell(Column::IpSrc)?, cell(Column::SrcPort)?);
    let dst = (cell(Column::IpDst)?, cell(Column::DstPort)?);
    let transport = cell(Column::Transport)?;

    Some(match policy {
        DirectionPolicy::Bidirectional if dst < src => (dst, src, transport),
        _ => (src, dst, transport),
    })
}

fn numbers(table: &FeatureTable, column: Column) -> Vec<f64> {
    table
        .column(column)
        .into_iter()
        .filter_map(|v| v.and_then(Value::as_f64))
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
