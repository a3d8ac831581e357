//! Post-pass normalisation of a [FeatureTable].
use super::table::{Column, FeatureTable, Value};

/// Placeholder written into categorical columns with no value.
pub const UNKNOWN: &str = "Unknown";

/// Which columns get which treatment during [clean].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleaningPlan {
    pub numeric: Vec<Column>,
    pub categorical: Vec<Column>,
    pub critical: Vec<Column>,
}

impl Default for CleaningPlan {
    fn default() -> Self {
        Self {
            numeric: vec![
                Column::PacketSize,
                Column::TcpSeq,
                Column::TcpAck,
                Column::TcpWindow,
                Column::TcpFlags,
                Column::InterPacketTime,
                Column::FlowSize,
                Column::FlowVolume,
                Column::PayloadEntropy,
                Column::FlowRetransmissions,
            ],
            categorical: vec![
                Column::Protocol,
                Column::IpSrc,
                Column::IpDst,
                Column::Transport,
                Column::TlsVersion,
                Column::TlsCipherSuite,
                Column::TlsHandshakeType,
                Column::Label,
            ],
            critical: vec![Column::Timestamp, Column::PacketSize],
        }
    }
}

impl CleaningPlan {
    pub fn apply(&self, table: FeatureTable) -> FeatureTable {
        clean(table, &self.numeric, &self.categorical, &self.critical)
    }
}

/// Cleans `table`:
///
/// * numeric columns are coerced to floats (unreadable values become absent),
///   then absent cells are filled with the column median;
/// * categorical columns are rendered as text, absent cells become [UNKNOWN];
/// * rows with an absent critical column are dropped.
///
/// Numeric and categorical columns the table does not carry are skipped, never
/// created. A critical column the table does not carry is absent in every row,
/// so every row is dropped. Cleaning its own output again changes nothing.
pub fn clean(
    mut table: FeatureTable,
    numeric: &[Column],
    categorical: &[Column],
    critical: &[Column],
) -> FeatureTable {
    for column in numeric {
        match table.column_index(*column) {
            Some(index) => impute_numeric(&mut table, index, *column),
            None => log::debug!("Numeric column {column} not in table, skipping"),
        }
    }

    for column in categorical {
        if let Some(index) = table.column_index(*column) {
            fill_categorical(&mut table, index);
        }
    }

    if let Some(missing) = critical.iter().find(|column| !table.has_column(**column)) {
        if !table.is_empty() {
            log::warn!("Critical column {missing} not in table, dropping all {} rows", table.len());
            table.rows_mut().clear();
        }
        return table;
    }

    let critical: Vec<usize> = critical
        .iter()
        .filter_map(|column| table.column_index(*column))
        .collect();
    let before = table.len();
    table
        .rows_mut()
        .retain(|row| critical.iter().all(|index| row[*index].is_some()));
    if table.len() < before {
        log::info!("Dropped {} rows missing a critical column", before - table.len());
    }

    table
}

fn impute_numeric(table: &mut FeatureTable, index: usize, column: Column) {
    let rows = table.rows_mut();

    let mut failed = 0;
    for row in rows.iter_mut() {
        if let Some(value) = row[index].take() {
            match value.as_f64() {
                Some(number) => row[index] = Some(Value::Float(number)),
                None => failed += 1,
            }
        }
    }
    if failed > 0 {
        log::warn!("{failed} values in {column} are not numeric and were cleared");
    }

    let mut present: Vec<f64> = rows
        .iter()
        .filter_map(|row| row[index].as_ref().and_then(Value::as_f64))
        .collect();
    let fill = match median(&mut present) {
        Some(fill) => fill,
        None => {
            log::warn!("Column {column} has no numeric values, leaving it absent");
            return;
        }
    };

    for row in rows.iter_mut() {
        if row[index].is_none() {
            row[index] = Some(Value::Float(fill));
        }
    }
}

fn fill_categorical(table: &mut FeatureTable, index: usize) {
    for row in table.rows_mut().iter_mut() {
        row[index] = Some(match row[index].take() {
            Some(Value::Text(text)) => Value::Text(text),
            Some(other) => Value::Text(other.to_string()),
            None => Value::Text(UNKNOWN.to_string()),
        });
    }
}

/// Median of `values`, averaging the two middle values for an even count.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn int(v: i64) -> Option<Value> {
        Some(Value::Int(v))
    }

    fn float(v: f64) -> Option<Value> {
        Some(Value::Float(v))
    }

    fn text(v: &str) -> Option<Value> {
        Some(Value::Text(v.to_string()))
    }

    fn sample() -> FeatureTable {
        FeatureTable::from_rows(
            vec![
                Column::Timestamp,
                Column::PacketSize,
                Column::Protocol,
                Column::TcpSeq,
                Column::TcpAck,
                Column::InterPacketTime,
                Column::TlsHandshakeType,
            ],
            vec![
                vec![float(1.1), int(150), text("TCP"), int(1000), None, float(0.01), int(1)],
                vec![float(2.2), None, None, int(2000), int(5000), None, None],
                vec![float(3.3), int(500), text("TLS"), None, int(6000), float(0.05), None],
                vec![None, None, text("UDP"), int(4000), None, None, None],
                vec![float(5.5), int(300), text("TCP"), None, int(8000), float(0.02), int(2)],
            ],
        )
    }

    #[test]
    fn fills_tcp_window_with_median() {
        let table = FeatureTable::from_rows(
            vec![Column::Timestamp, Column::PacketSize, Column::TcpWindow],
            vec![
                vec![float(0.0), int(60), int(100)],
                vec![float(0.1), int(60), None],
                vec![float(0.2), int(60), int(300)],
            ],
        );

        let cleaned = CleaningPlan::default().apply(table);

        assert_eq!(
            cleaned.column(Column::TcpWindow),
            vec![
                Some(&Value::Float(100.0)),
                Some(&Value::Float(200.0)),
                Some(&Value::Float(300.0))
            ]
        );
    }

    #[test]
    fn drops_row_without_timestamp() {
        let table = FeatureTable::from_rows(
            vec![Column::Timestamp, Column::PacketSize, Column::Protocol, Column::TcpSeq],
            vec![
                vec![float(0.0), int(60), text("TCP"), int(1)],
                vec![None, int(70), text("TCP"), int(2)],
            ],
        );

        let cleaned = CleaningPlan::default().apply(table);

        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned.get(0, Column::TcpSeq), Some(&Value::Float(1.0)));
    }

    #[test]
    fn leaves_no_absent_cells_in_listed_columns() {
        let cleaned = CleaningPlan::default().apply(sample());

        assert_eq!(cleaned.len(), 4);
        for row in cleaned.rows() {
            assert!(row.iter().all(Option::is_some), "absent cell in {row:?}");
        }
        assert_eq!(cleaned.get(1, Column::Protocol), Some(&Value::Text(UNKNOWN.to_string())));
        assert_eq!(cleaned.get(0, Column::TlsHandshakeType), Some(&Value::Text("1".to_string())));
    }

    #[test]
    fn critical_numeric_column_is_imputed_before_the_drop() {
        let cleaned = CleaningPlan::default().apply(sample());

        // packet_size median over [150, 500, 300]
        assert_eq!(cleaned.get(1, Column::PacketSize), Some(&Value::Float(300.0)));
    }

    #[test]
    fn cleaning_is_idempotent() {
        let plan = CleaningPlan::default();
        let once = plan.apply(sample());
        let twice = plan.apply(once.clone());

        assert_eq!(once, twice);
    }

    #[test]
    fn unreadable_numeric_text_is_cleared_then_imputed() {
        let table = FeatureTable::from_rows(
            vec![Column::Timestamp, Column::TcpAck],
            vec![
                vec![float(0.0), text("oops")],
                vec![float(0.1), text("10")],
                vec![float(0.2), int(30)],
            ],
        );

        let cleaned = clean(table, &[Column::TcpAck], &[], &[Column::Timestamp]);

        assert_eq!(
            cleaned.column(Column::TcpAck),
            vec![
                Some(&Value::Float(20.0)),
                Some(&Value::Float(10.0)),
                Some(&Value::Float(30.0))
            ]
        );
    }

    #[test]
    fn all_absent_numeric_column_stays_absent() {
        let table = FeatureTable::from_rows(
            vec![Column::Timestamp, Column::InterPacketTime],
            vec![vec![float(0.0), None], vec![float(1.0), None]],
        );

        let cleaned = clean(table.clone(), &[Column::InterPacketTime], &[], &[]);

        assert_eq!(cleaned, table);
        assert_eq!(clean(cleaned.clone(), &[Column::InterPacketTime], &[], &[]), cleaned);
    }

    #[test]
    fn missing_columns_are_not_fabricated() {
        let table = FeatureTable::from_rows(
            vec![Column::Timestamp, Column::PacketSize],
            vec![vec![float(0.0), int(60)]],
        );

        let cleaned = CleaningPlan::default().apply(table);

        assert_eq!(cleaned.columns(), &[Column::Timestamp, Column::PacketSize]);
        assert_eq!(cleaned.len(), 1);
    }

    #[test]
    fn missing_critical_column_drops_every_row() {
        let table = FeatureTable::from_rows(
            vec![Column::Timestamp, Column::Protocol],
            vec![vec![float(0.0), text("TCP")], vec![float(0.1), None]],
        );

        let cleaned = CleaningPlan::default().apply(table);

        assert_eq!(cleaned.columns(), &[Column::Timestamp, Column::Protocol]);
        assert!(cleaned.is_empty());
        assert_eq!(CleaningPlan::default().apply(cleaned.clone()), cleaned);
    }

    #[test]
    fn label_is_kept_as_text() {
        let table = FeatureTable::from_rows(
            vec![Column::Timestamp, Column::PacketSize, Column::Label],
            vec![vec![float(0.0), int(60), text("zoom")]],
        );

        let cleaned = CleaningPlan::default().apply(table);

        assert_eq!(cleaned.get(0, Column::Label), Some(&Value::Text("zoom".to_string())));
    }

    #[test]
    fn empty_table_stays_empty() {
        let cleaned = CleaningPlan::default().apply(FeatureTable::empty());
        assert!(cleaned.is_empty());
    }

    #[test_case(vec![], None)]
    #[test_case(vec![3.0], Some(3.0))]
    #[test_case(vec![300.0, 100.0], Some(200.0))]
    #[test_case(vec![5.0, -1.0, 2.0], Some(2.0))]
    fn median_values(values: Vec<f64>, expected: Option<f64>) {
        let mut values = values;
        assert_eq!(median(&mut values), expected);
    }
}
