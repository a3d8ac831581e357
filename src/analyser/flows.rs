use std::collections::HashMap;

use super::containers::{PacketRecord, Transport};

/// How the two endpoints of a packet are turned into a flow identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DirectionPolicy {
    /// Request and response are tracked as two separate flows.
    #[default]
    Directional,
    /// Both directions of a conversation collapse into one flow.
    Bidirectional,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlowIdentity {
    pub ip_src: String,
    pub ip_dst: String,
    pub transport: Transport,
    pub src_port: u16,
    pub dst_port: u16,
}

impl FlowIdentity {
    /// Identity of the flow `record` belongs to, or `None` if any of the five
    /// components is missing.
    pub fn from_record(record: &PacketRecord, policy: DirectionPolicy) -> Option<Self> {
        let identity = Self {
            ip_src: record.ip_src.clone()?,
            ip_dst: record.ip_dst.clone()?,
            transport: record.transport?,
            src_port: record.src_port?,
            dst_port: record.dst_port?,
        };

        Some(match policy {
            DirectionPolicy::Directional => identity,
            DirectionPolicy::Bidirectional => identity.canonical(),
        })
    }

    /// Orders the endpoints so that both directions compare equal.
    fn canonical(self) -> Self {
        if (&self.ip_src, self.src_port) <= (&self.ip_dst, self.dst_port) {
            return self;
        }

        Self {
            ip_src: self.ip_dst,
            ip_dst: self.ip_src,
            transport: self.transport,
            src_port: self.dst_port,
            dst_port: self.src_port,
        }
    }
}

/// Running totals of one flow.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlowState {
    pub cumulative_size: u64,
    pub packet_count: u64,
    pub retransmissions: u64,
    pub last_timestamp: Option<f64>,
}

impl FlowState {
    /// Folds one packet into the flow and returns the elapsed time since the
    /// flow's previous packet. Negative gaps from out-of-order captures are
    /// returned as they are.
    pub fn advance(&mut self, timestamp: f64, packet_size: u32, retransmission: bool) -> Option<f64> {
        let inter_packet_time = self.last_timestamp.map(|last| timestamp - last);

        self.cumulative_size += u64::from(packet_size);
        self.packet_count += 1;
        if retransmission {
            self.retransmissions += 1;
        }
        self.last_timestamp = Some(timestamp);

        inter_packet_time
    }
}

/// Flow states of one capture pass. Never shared between passes.
#[derive(Debug, Default)]
pub struct FlowStateTable {
    flows: HashMap<FlowIdentity, FlowState>,
}

impl FlowStateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live state for `identity`, zero-initialised on first sighting. The values
    /// read through the reference are the ones before the current packet.
    pub fn upsert(&mut self, identity: FlowIdentity) -> &mut FlowState {
        self.flows.entry(identity).or_default()
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
