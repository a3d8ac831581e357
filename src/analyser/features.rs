//! Per-packet derived features: flow totals, flow-scoped inter-packet time and
//! payload entropy.
use super::containers::{FeatureRow, PacketRecord};
use super::flows::{DirectionPolicy, FlowIdentity, FlowStateTable};

#[derive(Clone, Debug)]
pub struct FeatureDeriver {
    policy: DirectionPolicy,
    entropy: bool,
    label: Option<String>,
}

impl FeatureDeriver {
    pub fn new(policy: DirectionPolicy, entropy: bool, label: Option<String>) -> Self {
        Self {
            policy,
            entropy,
            label,
        }
    }

    /// Derives the row for `record`, advancing its flow in `flows`. Packets
    /// without a complete flow identity leave `flows` untouched and get no flow
    /// columns.
    pub fn derive(&self, record: PacketRecord, flows: &mut FlowStateTable) -> FeatureRow {
        let payload_entropy = if self.entropy {
            record.payload.as_deref().and_then(shannon_entropy)
        } else {
            None
        };

        let mut row = FeatureRow {
            record,
            payload_entropy,
            flow_size: None,
            flow_volume: None,
            inter_packet_time: None,
            flow_retransmissions: None,
            label: self.label.clone(),
        };

        let identity = match FlowIdentity::from_record(&row.record, self.policy) {
            Some(identity) => identity,
            None => {
                log::debug!("Packet at {} has no flow identity", row.record.timestamp);
                return row;
            }
        };

        let retransmission = row.record.tcp.as_ref().map_or(false, |tcp| tcp.retransmission);
        let state = flows.upsert(identity);
        row.inter_packet_time =
            state.advance(row.record.timestamp, row.record.packet_size, retransmission);
        row.flow_size = Some(state.cumulative_size);
        row.flow_volume = Some(state.packet_count);
        row.flow_retransmissions = Some(state.retransmissions);

        row
    }
}

/// Shannon entropy in bits of the byte-value distribution, in [0, 8]. `None`
/// for an empty payload.
pub fn shannon_entropy(bytes: &[u8]) -> Option<f64> {
    if bytes.is_empty() {
        return None;
    }

    let mut counts = [0usize; 256];
    for byte in bytes {
        counts[usize::from(*byte)] += 1;
    }

    let total = bytes.len() as f64;
    let entropy = counts
        .iter()
        .filter(|count| **count > 0)
        .map(|count| {
            let p = *count as f64 / total;
            -p * p.log2()
        })
        .sum::<f64>();

    // A single repeated byte sums to -0.0.
    Some(entropy.max(0.0))
}
