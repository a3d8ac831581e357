//! Contains the tshark-backed capture source and helpers that detach rtshark
//! packets from the capture process.
use rtshark::{Packet, RTShark};
use std::path::Path;

use super::containers::{CapturedPacket, RawLayer};
use super::errors::CaptureError;

/// Packets of one capture file, read lazily from a tshark child process.
///
/// Reading blocks while tshark dissects the next packet. The child is killed
/// when the capture is dropped, so a caller can stop consuming at any point.
pub struct TsharkCapture {
    rtshark: RTShark,
    failed: bool,
}

impl Iterator for TsharkCapture {
    type Item = Result<CapturedPacket, CaptureError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        match self.rtshark.read() {
            Ok(Some(packet)) => Some(Ok(to_captured_packet(&packet))),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(CaptureError::Read(e.to_string())))
            }
        }
    }
}

impl Drop for TsharkCapture {
    fn drop(&mut self) {
        self.rtshark.kill();
    }
}

/// Loads PCAP/PCAPNG file via rtshark.
///
/// `display_filter` is handed to tshark as is, e.g. `tcp || udp`.
pub fn load_file(filepath: &str, display_filter: Option<&str>) -> Result<TsharkCapture, CaptureError> {
    log::info!("Loading capture file.");

    if !Path::new(filepath).is_file() {
        return Err(CaptureError::MissingFile(filepath.to_string()));
    }

    let builder = rtshark::RTSharkBuilder::builder().input_path(filepath);
    let builder = match display_filter {
        Some(filter) => {
            log::info!("Applying display filter {filter}");
            builder.display_filter(filter)
        }
        None => builder,
    };

    let rtshark = builder.spawn()?;
    log::info!("Reading from {}", filepath);

    Ok(TsharkCapture {
        rtshark,
        failed: false,
    })
}

/// Copies every layer and field of an rtshark [Packet] into a [CapturedPacket].
pub fn to_captured_packet(packet: &Packet) -> CapturedPacket {
    let mut captured = CapturedPacket::new();
    captured.timestamp_micros = packet.timestamp_micros();

    packet.iter().fold(captured, |captured, layer| {
        let raw = layer
            .iter()
            .fold(RawLayer::new(layer.name()), |raw, metadata| {
                raw.with_field(metadata.name(), metadata.value())
            });
        captured.with_layer(raw)
    })
}
