use std::fmt;

use super::table::{Column, Value};

/// One protocol layer as handed over by the capture source: the layer name and
/// its flattened `field name -> shown value` pairs, in dissection order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawLayer {
    pub name: String,
    pub fields: Vec<(String, String)>,
}

impl RawLayer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: &str) -> Self {
        self.fields.push((name.to_string(), value.to_string()));
        self
    }

    /// First value recorded for `name`. Repeated fields (several TLS records in
    /// one frame, for instance) resolve to the first occurrence.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(key, _)| key == name)
    }
}

/// A raw captured packet, detached from the capture mechanism that produced it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CapturedPacket {
    pub timestamp_micros: Option<i64>,
    pub layers: Vec<RawLayer>,
}

impl CapturedPacket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: RawLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layer(&self, name: &str) -> Option<&RawLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Transport {
    Tcp,
    Udp,
    Unknown,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Transport::Tcp => write!(f, "TCP"),
            Transport::Udp => write!(f, "UDP"),
            Transport::Unknown => write!(f, "Unknown"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TcpFields {
    pub seq: Option<u32>,
    pub ack: Option<u32>,
    pub window: Option<u32>,
    pub flags: Option<u16>,
    pub retransmission: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TlsFields {
    pub version: Option<String>,
    pub handshake_type: Option<u8>,
    pub cipher_suite: Option<String>,
}

/// Parsed view of a single packet. `tcp` and `tls` are `None` when the layer is
/// missing altogether, which is distinct from a present layer whose fields
/// could not be read.
#[derive(Clone, Debug, PartialEq)]
pub struct PacketRecord {
    pub timestamp: f64,
    pub packet_size: u32,
    pub protocol: String,
    pub ip_src: Option<String>,
    pub ip_dst: Option<String>,
    pub transport: Option<Transport>,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub tcp: Option<TcpFields>,
    pub tls: Option<TlsFields>,
    pub payload: Option<Vec<u8>>,
}

/// Packet record plus the flow features derived for it.
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureRow {
    pub record: PacketRecord,
    pub payload_entropy: Option<f64>,
    pub flow_size: Option<u64>,
    pub flow_volume: Option<u64>,
    pub inter_packet_time: Option<f64>,
    pub flow_retransmissions: Option<u64>,
    /// Application label attached to every row of the capture, if any.
    pub label: Option<String>,
}

impl FeatureRow {
    /// Sparse representation of the row: every column this row declares, with
    /// its value or `None`. TCP columns are only declared when the packet had a
    /// TCP layer, likewise the TLS handshake columns.
    pub fn cells(&self) -> Vec<(Column, Option<Value>)> {
        let r = &self.record;
        let mut cells = vec![
            (Column::Timestamp, Some(Value::Float(r.timestamp))),
            (Column::PacketSize, Some(Value::Int(i64::from(r.packet_size)))),
            (Column::Protocol, Some(Value::Text(r.protocol.clone()))),
            (Column::IpSrc, r.ip_src.clone().map(Value::Text)),
            (Column::IpDst, r.ip_dst.clone().map(Value::Text)),
            (Column::Transport, r.transport.map(|t| Value::Text(t.to_string()))),
            (Column::SrcPort, r.src_port.map(|p| Value::Int(i64::from(p)))),
            (Column::DstPort, r.dst_port.map(|p| Value::Int(i64::from(p)))),
        ];

        if let Some(tcp) = &r.tcp {
            cells.push((Column::TcpSeq, tcp.seq.map(|v| Value::Int(i64::from(v)))));
            cells.push((Column::TcpAck, tcp.ack.map(|v| Value::Int(i64::from(v)))));
            cells.push((Column::TcpWindow, tcp.window.map(|v| Value::Int(i64::from(v)))));
            cells.push((Column::TcpFlags, tcp.flags.map(|v| Value::Int(i64::from(v)))));
        }

        cells.push((
            Column::TlsVersion,
            r.tls.as_ref().and_then(|tls| tls.version.clone()).map(Value::Text),
        ));
        if let Some(tls) = &r.tls {
            cells.push((
                Column::TlsHandshakeType,
                tls.handshake_type.map(|v| Value::Int(i64::from(v))),
            ));
            cells.push((Column::TlsCipherSuite, tls.cipher_suite.clone().map(Value::Text)));
        }

        cells.push((Column::PayloadEntropy, self.payload_entropy.map(Value::Float)));
        cells.push((Column::FlowSize, self.flow_size.map(count_value)));
        cells.push((Column::FlowVolume, self.flow_volume.map(count_value)));
        cells.push((Column::InterPacketTime, self.inter_packet_time.map(Value::Float)));
        cells.push((Column::FlowRetransmissions, self.flow_retransmissions.map(count_value)));
        if let Some(label) = &self.label {
            cells.push((Column::Label, Some(Value::Text(label.clone()))));
        }

        cells
    }
}

fn count_value(count: u64) -> Value {
    // Flow counters never get near i64::MAX within one capture.
    Value::Int(i64::try_from(count).unwrap_or(i64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bare_record() -> PacketRecord {
        PacketRecord {
            timestamp: 1.5,
            packet_size: 60,
            protocol: "UDP".to_string(),
            ip_src: None,
            ip_dst: None,
            transport: Some(Transport::Udp),
            src_port: Some(53),
            dst_port: Some(40000),
            tcp: None,
            tls: None,
            payload: None,
        }
    }

    #[test]
    fn raw_layer_field_returns_first_occurrence() {
        let layer = RawLayer::new("tls")
            .with_field("tls.record.version", "0x0301")
            .with_field("tls.record.version", "0x0303");

        assert_eq!(layer.field("tls.record.version"), Some("0x0301"));
        assert_eq!(layer.field("tls.handshake.type"), None);
    }

    #[test]
    fn cells_skip_tcp_columns_without_tcp_layer() {
        let row = FeatureRow {
            record: bare_record(),
            payload_entropy: None,
            flow_size: None,
            flow_volume: None,
            inter_packet_time: None,
            flow_retransmissions: None,
            label: None,
        };

        let columns: Vec<Column> = row.cells().into_iter().map(|(c, _)| c).collect();
        assert!(!columns.contains(&Column::TcpSeq));
        assert!(!columns.contains(&Column::TcpFlags));
        assert!(!columns.contains(&Column::TlsCipherSuite));
        assert!(columns.contains(&Column::TlsVersion));
        assert!(columns.contains(&Column::FlowSize));
        assert!(!columns.contains(&Column::Label));
    }

    #[test]
    fn cells_end_with_label_when_set() {
        let row = FeatureRow {
            record: bare_record(),
            payload_entropy: None,
            flow_size: Some(60),
            flow_volume: Some(1),
            inter_packet_time: None,
            flow_retransmissions: Some(0),
            label: Some("youtube".to_string()),
        };

        assert_eq!(
            row.cells().last(),
            Some(&(Column::Label, Some(Value::Text("youtube".to_string()))))
        );
    }

    #[test]
    fn cells_keep_zero_sequence_number() {
        let mut record = bare_record();
        record.tcp = Some(TcpFields {
            seq: Some(0),
            ..TcpFields::default()
        });
        let row = FeatureRow {
            record,
            payload_entropy: None,
            flow_size: None,
            flow_volume: None,
            inter_packet_time: None,
            flow_retransmissions: None,
            label: None,
        };

        let seq = row
            .cells()
            .into_iter()
            .find(|(c, _)| *c == Column::TcpSeq)
            .and_then(|(_, v)| v);
        assert_eq!(seq, Some(Value::Int(0)));
    }
}
