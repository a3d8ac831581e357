use super::containers::CapturedPacket;
use super::errors::CaptureError;
use super::features::FeatureDeriver;
use super::flows::{DirectionPolicy, FlowStateTable};
use super::parser::parse_packet;
use super::table::{FeatureTable, FrameAssembler};
use super::utils;

/// Knobs of one extraction pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractionConfig {
    pub direction: DirectionPolicy,
    pub entropy: bool,
    pub display_filter: Option<String>,
    /// Application label written into the `label` column of every row.
    pub label: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            direction: DirectionPolicy::Directional,
            entropy: true,
            display_filter: None,
            label: None,
        }
    }
}

/// State of a single pass over one capture. Owns its flow table, so two passes
/// never see each other's flows.
pub struct ExtractionPass {
    deriver: FeatureDeriver,
    flows: FlowStateTable,
    assembler: FrameAssembler,
    dropped: usize,
}

impl ExtractionPass {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            deriver: FeatureDeriver::new(config.direction, config.entropy, config.label.clone()),
            flows: FlowStateTable::new(),
            assembler: FrameAssembler::new(),
            dropped: 0,
        }
    }

    /// Parses, derives and buffers one packet. Malformed packets are counted and
    /// skipped.
    pub fn process(&mut self, packet: &CapturedPacket) {
        match parse_packet(packet) {
            Ok(record) => {
                let row = self.deriver.derive(record, &mut self.flows);
                self.assembler.append(&row);
            }
            Err(e) => {
                log::debug!("Skipping packet: {e}");
                self.dropped += 1;
            }
        }
    }

    pub fn rows(&self) -> usize {
        self.assembler.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assembler.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    pub fn has_no_flows(&self) -> bool {
        self.flows.is_empty()
    }

    /// Ends the pass. Valid at any point, yielding whatever was processed so far.
    pub fn finish(self) -> FeatureTable {
        self.assembler.finalize()
    }
}

/// Runs one pass over `source`. A source error at any point discards the pass
/// and returns the empty table.
pub fn analyse<I>(source: I, config: &ExtractionConfig) -> FeatureTable
where
    I: IntoIterator<Item = Result<CapturedPacket, CaptureError>>,
{
    log::info!("Starting analysis.");
    let mut pass = ExtractionPass::new(config);

    for packet in source {
        match packet {
            Ok(packet) => pass.process(&packet),
            Err(e) => {
                log::error!("Capture failed after {} packets: {e}", pass.rows() + pass.dropped());
                return FeatureTable::empty();
            }
        }
    }

    log::info!(
        "Extracted {} rows over {} flows, skipped {} malformed packets",
        pass.rows(),
        pass.flow_count(),
        pass.dropped()
    );
    if pass.is_empty() {
        log::warn!("No valid packets found in capture.");
    } else if pass.has_no_flows() {
        log::warn!("No packet carried a complete flow identity.");
    }

    pass.finish()
}

/// Loads `filepath` through tshark and runs one pass over it.
pub fn analyse_file(filepath: &str, config: &ExtractionConfig) -> FeatureTable {
    match utils::load_file(filepath, config.display_filter.as_deref()) {
        Ok(capture) => analyse(capture, config),
        Err(e) => {
            log::error!("Error reading file {filepath}: {e}");
            FeatureTable::empty()
        }
    }
}
