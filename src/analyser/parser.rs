//! Turns one [CapturedPacket] into a [PacketRecord].
//!
//! Only the frame size and capture timestamp are mandatory. Every other layer is
//! looked up independently, and a field that cannot be read simply comes out as
//! `None` without touching its siblings.
use chrono::DateTime;

use super::containers::{CapturedPacket, PacketRecord, RawLayer, TcpFields, TlsFields, Transport};
use super::errors::ParseError;

/// Layers tshark adds that are not protocols of their own.
const PSEUDO_LAYERS: [&str; 3] = ["fake-field-wrapper", "geninfo", "frame"];

/// Transport layers in lookup order, with the transport each one maps onto.
const TRANSPORT_LAYERS: [(&str, Transport); 4] = [
    ("tcp", Transport::Tcp),
    ("udp", Transport::Udp),
    ("sctp", Transport::Unknown),
    ("dccp", Transport::Unknown),
];

const RETRANSMISSION_FIELDS: [&str; 3] = [
    "tcp.analysis.retransmission",
    "tcp.analysis.fast_retransmission",
    "tcp.analysis.spurious_retransmission",
];

/// Fields holding the raw application payload, most specific first.
const PAYLOAD_FIELDS: [(&str, &str); 3] = [
    ("tcp", "tcp.payload"),
    ("udp", "udp.payload"),
    ("data", "data.data"),
];

pub fn parse_packet(packet: &CapturedPacket) -> Result<PacketRecord, ParseError> {
    let frame = packet.layer("frame");
    let packet_size = packet_size(frame)?;
    let timestamp = timestamp(frame, packet.timestamp_micros)?;

    let (ip_src, ip_dst) = ip_addresses(packet);
    let transport_layer = transport_layer(packet);
    let (src_port, dst_port) = match transport_layer {
        Some((_, layer)) => ports(layer),
        None => (None, None),
    };

    Ok(PacketRecord {
        timestamp,
        packet_size,
        protocol: highest_layer(packet),
        ip_src,
        ip_dst,
        transport: transport_layer.map(|(transport, _)| transport),
        src_port,
        dst_port,
        tcp: packet.layer("tcp").map(tcp_fields),
        tls: packet
            .layer("tls")
            .or_else(|| packet.layer("ssl"))
            .map(tls_fields),
        payload: payload(packet),
    })
}

fn packet_size(frame: Option<&RawLayer>) -> Result<u32, ParseError> {
    let raw = frame
        .and_then(|f| f.field("frame.len").or_else(|| f.field("frame.cap_len")))
        .ok_or(ParseError::MissingField("packet_size"))?;

    parse_decimal::<u32>(raw).ok_or_else(|| ParseError::NotNumeric {
        field: "packet_size",
        value: raw.to_string(),
    })
}

/// Capture timestamp in seconds. tshark renders `frame.time_epoch` either as a
/// decimal or, on newer releases, as an RFC 3339 string.
fn timestamp(frame: Option<&RawLayer>, micros: Option<i64>) -> Result<f64, ParseError> {
    let from_micros = micros.map(|us| us as f64 / 1_000_000.0);

    let raw = match frame.and_then(|f| f.field("frame.time_epoch")) {
        Some(raw) => raw.trim(),
        None => return from_micros.ok_or(ParseError::MissingField("timestamp")),
    };

    if let Ok(seconds) = raw.parse::<f64>() {
        if seconds.is_finite() {
            return Ok(seconds);
        }
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Ok(datetime.timestamp() as f64
            + f64::from(datetime.timestamp_subsec_nanos()) / 1_000_000_000.0);
    }

    from_micros.ok_or_else(|| ParseError::NotNumeric {
        field: "timestamp",
        value: raw.to_string(),
    })
}

/// Upper-cased name of the last real protocol layer, e.g. `TLS` or `DNS`.
fn highest_layer(packet: &CapturedPacket) -> String {
    packet
        .layers
        .iter()
        .rev()
        .map(|layer| layer.name.as_str())
        .find(|name| !name.is_empty() && !name.starts_with("_ws.") && !PSEUDO_LAYERS.contains(name))
        .map(|name| name.to_uppercase())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn ip_addresses(packet: &CapturedPacket) -> (Option<String>, Option<String>) {
    for (layer_name, prefix) in [("ip", "ip"), ("ipv6", "ipv6")] {
        if let Some(layer) = packet.layer(layer_name) {
            let src = layer.field(&format!("{prefix}.src")).map(str::to_string);
            let dst = layer.field(&format!("{prefix}.dst")).map(str::to_string);
            return (src, dst);
        }
    }

    (None, None)
}

fn transport_layer(packet: &CapturedPacket) -> Option<(Transport, &RawLayer)> {
    TRANSPORT_LAYERS
        .iter()
        .find_map(|(name, transport)| packet.layer(name).map(|layer| (*transport, layer)))
}

fn ports(layer: &RawLayer) -> (Option<u16>, Option<u16>) {
    let port = |suffix: &str| {
        layer
            .field(&format!("{}.{suffix}", layer.name))
            .and_then(parse_decimal::<u16>)
    };

    (port("srcport"), port("dstport"))
}

fn tcp_fields(layer: &RawLayer) -> TcpFields {
    TcpFields {
        seq: layer.field("tcp.seq").and_then(parse_decimal),
        ack: layer.field("tcp.ack").and_then(parse_decimal),
        window: layer
            .field("tcp.window_size")
            .or_else(|| layer.field("tcp.window_size_value"))
            .and_then(parse_decimal),
        flags: layer.field("tcp.flags").and_then(parse_hex_u16),
        retransmission: RETRANSMISSION_FIELDS.iter().any(|f| layer.has_field(f)),
    }
}

/// TLS fields, read from either the `tls` or the legacy `ssl` dissector.
fn tls_fields(layer: &RawLayer) -> TlsFields {
    let prefix = layer.name.as_str();
    let text = |suffix: &str| {
        layer
            .field(&format!("{prefix}.{suffix}"))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    TlsFields {
        version: text("record.version"),
        handshake_type: layer
            .field(&format!("{prefix}.handshake.type"))
            .and_then(parse_decimal),
        cipher_suite: text("handshake.ciphersuite"),
    }
}

fn payload(packet: &CapturedPacket) -> Option<Vec<u8>> {
    PAYLOAD_FIELDS.iter().find_map(|(layer, field)| {
        packet
            .layer(layer)
            .and_then(|l| l.field(field))
            .and_then(decode_hex_bytes)
    })
}

/// Parses a value only if it is made of ASCII digits alone. Signs, blanks,
/// decimals and overflow all resolve to `None`.
pub fn parse_decimal<T: std::str::FromStr>(raw: &str) -> Option<T> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    raw.parse::<T>().ok()
}

/// Parses a hexadecimal bitmask such as `0x0018`, with or without the prefix.
pub fn parse_hex_u16(raw: &str) -> Option<u16> {
    let raw = raw.trim();
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    u16::from_str_radix(digits, 16).ok()
}

/// Decodes tshark byte fields, which come either as `16:03:01` or `160301`.
pub fn decode_hex_bytes(raw: &str) -> Option<Vec<u8>> {
    let compact: String = raw.chars().filter(|c| *c != ':' && !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    match hex::decode(&compact) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::debug!("Ignoring undecodable payload field: {e}");
            None
        }
    }
}
