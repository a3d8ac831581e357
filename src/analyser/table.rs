//! Tabular output of an extraction pass: a fixed set of known columns, sparse
//! rows buffered by the [FrameAssembler], and the finalized [FeatureTable].
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;

use super::containers::FeatureRow;

/// Every column the extractor can produce, in canonical output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Timestamp,
    PacketSize,
    Protocol,
    IpSrc,
    IpDst,
    Transport,
    SrcPort,
    DstPort,
    TcpSeq,
    TcpAck,
    TcpWindow,
    TcpFlags,
    TlsVersion,
    TlsHandshakeType,
    TlsCipherSuite,
    PayloadEntropy,
    FlowSize,
    FlowVolume,
    InterPacketTime,
    FlowRetransmissions,
    Label,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Timestamp => "timestamp",
            Column::PacketSize => "packet_size",
            Column::Protocol => "protocol",
            Column::IpSrc => "ip_src",
            Column::IpDst => "ip_dst",
            Column::Transport => "transport",
            Column::SrcPort => "src_port",
            Column::DstPort => "dst_port",
            Column::TcpSeq => "tcp_seq",
            Column::TcpAck => "tcp_ack",
            Column::TcpWindow => "tcp_window",
            Column::TcpFlags => "tcp_flags",
            Column::TlsVersion => "tls_version",
            Column::TlsHandshakeType => "tls_handshake_type",
            Column::TlsCipherSuite => "tls_cipher_suite",
            Column::PayloadEntropy => "payload_entropy",
            Column::FlowSize => "flow_size",
            Column::FlowVolume => "flow_volume",
            Column::InterPacketTime => "inter_packet_time",
            Column::FlowRetransmissions => "flow_retransmissions",
            Column::Label => "label",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A present cell value. Absence is `None` at the cell level, never a variant here.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Numeric reading of the value. Text is parsed; anything non-finite or
    /// unparsable yields `None`.
    pub fn as_f64(&self) -> Option<f64> {
        let number = match self {
            Value::Int(v) => *v as f64,
            Value::Float(v) => *v,
            Value::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        number.is_finite().then_some(number)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// Ordered rows (capture order) over the union of observed columns.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Option<Value>>>,
}

impl FeatureTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a table from explicit columns and rows. Rows shorter than the
    /// column list are padded with absent cells, longer ones are truncated.
    pub fn from_rows(columns: Vec<Column>, rows: Vec<Vec<Option<Value>>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();

        Self { columns, rows }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Option<Value>>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: Column) -> Option<usize> {
        self.columns.iter().position(|c| *c == column)
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.column_index(column).is_some()
    }

    /// Cell at (`row`, `column`). `None` both for absent cells and for columns
    /// the table does not carry.
    pub fn get(&self, row: usize, column: Column) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index)?.as_ref()
    }

    /// All cells of one column, top to bottom. Empty if the column is missing.
    pub fn column(&self, column: Column) -> Vec<Option<&Value>> {
        match self.column_index(column) {
            Some(index) => self.rows.iter().map(|row| row[index].as_ref()).collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Vec<Option<Value>>> {
        &mut self.rows
    }
}

struct RowView<'a> {
    columns: &'a [Column],
    cells: &'a [Option<Value>],
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, cell) in self.columns.iter().zip(self.cells) {
            map.serialize_entry(column.name(), cell)?;
        }
        map.end()
    }
}

/// Serialized as a list of records in column order, absent cells as `null`.
impl Serialize for FeatureTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for cells in &self.rows {
            seq.serialize_element(&RowView {
                columns: &self.columns,
                cells,
            })?;
        }
        seq.end()
    }
}

/// Buffers sparse rows in insertion order. The column set is only fixed when
/// the assembler is finalized.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    rows: Vec<Vec<(Column, Option<Value>)>>,
    seen: BTreeSet<Column>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, row: &FeatureRow) {
        let cells = row.cells();
        self.seen.extend(cells.iter().map(|(column, _)| *column));
        self.rows.push(cells);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn finalize(self) -> FeatureTable {
        let columns: Vec<Column> = self.seen.into_iter().collect();
        let rows = self
            .rows
            .into_iter()
            .map(|cells| {
                let mut row: Vec<Option<Value>> = vec![None; columns.len()];
                for (column, value) in cells {
                    if let Some(index) = columns.iter().position(|c| *c == column) {
                        row[index] = value;
                    }
                }
                row
            })
            .collect();

        FeatureTable::from_rows(columns, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyser::containers::{PacketRecord, TcpFields, Transport};
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn row(size: u32, tcp: Option<TcpFields>) -> FeatureRow {
        FeatureRow {
            record: PacketRecord {
                timestamp: 0.5,
                packet_size: size,
                protocol: "TCP".to_string(),
                ip_src: Some("10.0.0.1".to_string()),
                ip_dst: Some("10.0.0.2".to_string()),
                transport: Some(Transport::Tcp),
                src_port: Some(1234),
                dst_port: Some(443),
                tcp,
                tls: None,
                payload: None,
            },
            payload_entropy: None,
            flow_size: Some(u64::from(size)),
            flow_volume: Some(1),
            inter_packet_time: None,
            flow_retransmissions: Some(0),
            label: None,
        }
    }

    #[test]
    fn finalize_pads_rows_missing_a_column() {
        let mut assembler = FrameAssembler::new();
        assembler.append(&row(100, None));
        assembler.append(&row(
            200,
            Some(TcpFields {
                window: Some(512),
                ..TcpFields::default()
            }),
        ));

        let table = assembler.finalize();

        assert!(table.has_column(Column::TcpWindow));
        assert_eq!(table.get(0, Column::TcpWindow), None);
        assert_eq!(table.get(1, Column::TcpWindow), Some(&Value::Int(512)));
        assert_eq!(table.get(1, Column::PacketSize), Some(&Value::Int(200)));
    }

    #[test]
    fn finalize_keeps_insertion_order_and_canonical_columns() {
        let mut assembler = FrameAssembler::new();
        for size in [300, 100, 200] {
            assembler.append(&row(size, None));
        }
        let table = assembler.finalize();

        let sizes: Vec<Option<&Value>> = table.column(Column::PacketSize);
        assert_eq!(
            sizes,
            vec![Some(&Value::Int(300)), Some(&Value::Int(100)), Some(&Value::Int(200))]
        );
        assert_eq!(table.columns()[0], Column::Timestamp);
        assert_eq!(table.columns()[1], Column::PacketSize);
        assert!(!table.has_column(Column::Label));
    }

    #[test]
    fn label_column_comes_last() {
        let mut labelled = row(100, None);
        labelled.label = Some("zoom".to_string());

        let mut assembler = FrameAssembler::new();
        assembler.append(&labelled);
        let table = assembler.finalize();

        assert_eq!(table.columns().last(), Some(&Column::Label));
        assert_eq!(table.get(0, Column::Label), Some(&Value::Text("zoom".to_string())));
    }

    #[test]
    fn empty_assembler_yields_empty_table() {
        let table = FrameAssembler::new().finalize();
        assert!(table.is_empty());
        assert!(table.columns().is_empty());
    }

    #[test]
    fn serializes_absent_as_null() {
        let table = FeatureTable::from_rows(
            vec![Column::Timestamp, Column::TcpSeq, Column::Protocol],
            vec![vec![Some(Value::Float(1.25)), None, Some(Value::Text("UDP".to_string()))]],
        );

        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"[{"timestamp":1.25,"tcp_seq":null,"protocol":"UDP"}]"#);
    }

    #[test_case(Value::Int(7), Some(7.0))]
    #[test_case(Value::Float(0.25), Some(0.25))]
    #[test_case(Value::Text(" 42 ".to_string()), Some(42.0))]
    #[test_case(Value::Text("abc".to_string()), None)]
    #[test_case(Value::Text("inf".to_string()), None)]
    #[test_case(Value::Float(f64::NAN), None)]
    fn value_numeric_reading(value: Value, expected: Option<f64>) {
        assert_eq!(value.as_f64(), expected);
    }
}
