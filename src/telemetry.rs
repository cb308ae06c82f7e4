//! Status-port telemetry: decode broadcast state lines into unit state.
//!
//! Each drone broadcasts one ascii line per interval, `;`-separated
//! `key:value` fields in a fixed order. Only the mission-pad pose and the
//! height are retained; everything else is skipped by position.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::errors::{Error, Result};
use crate::unit::TelloUnit;

/// Ordinal of the `h` (height, cm) field in the state line.
const HEIGHT_FIELD: usize = 14;

/// Minimum number of fields in a well-formed state line.
const MIN_FIELDS: usize = HEIGHT_FIELD + 1;

/// Pad pose decoded from one state line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PadSighting {
    pub id: u8,
    /// Offset from the pad center, millimeters.
    pub offset: (i32, i32),
    /// Yaw relative to the pad orientation, degrees.
    pub yaw: i32,
}

/// One decoded state datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryFrame {
    /// `None` when no pad is visible (`mid` ≤ 0).
    pub pad: Option<PadSighting>,
    pub height_mm: i32,
}

/// Inbound-only listener on the status port.
pub struct TelemetryChannel {
    socket: UdpSocket,
    units: HashMap<IpAddr, Arc<TelloUnit>>,
}

impl TelemetryChannel {
    /// Bind the status socket and index the units by address.
    pub async fn bind(port: u16, units: &[Arc<TelloUnit>]) -> Result<Self> {
        let socket =
            UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)).await?;
        let units = units
            .iter()
            .map(|unit| (unit.addr(), Arc::clone(unit)))
            .collect();
        Ok(Self { socket, units })
    }

    /// Receive and decode state lines until the socket fails. Malformed
    /// lines and unknown senders are dropped per-datagram.
    pub(crate) async fn run(self) -> Error {
        let mut buf = [0u8; 1024];
        loop {
            let (len, from) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => return e.into(),
            };
            let Some(unit) = self.units.get(&from.ip()) else {
                trace!(source = %from, "ignoring state line from unknown address");
                continue;
            };
            let line = String::from_utf8_lossy(&buf[..len]);
            match decode_state_line(&line) {
                Some(frame) => {
                    trace!(unit = %from.ip(), ?frame, "telemetry update");
                    unit.apply_telemetry(&frame);
                }
                None => {
                    debug!(unit = %from.ip(), line = %line.trim(), "dropping malformed state line")
                }
            }
        }
    }
}

/// Decode one state line. `None` means the line is malformed (wrong field
/// count, unexpected key at a position, non-numeric value) and must be
/// dropped without touching unit state.
pub(crate) fn decode_state_line(line: &str) -> Option<TelemetryFrame> {
    let fields: Vec<&str> = line.trim().split(';').filter(|f| !f.is_empty()).collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    let pad_id: i32 = field_value(fields[0], "mid")?.parse().ok()?;
    let height_cm: i32 = field_value(fields[HEIGHT_FIELD], "h")?.parse().ok()?;

    let pad = if pad_id > 0 {
        let id = u8::try_from(pad_id).ok()?;
        let x: i32 = field_value(fields[1], "x")?.parse().ok()?;
        let y: i32 = field_value(fields[2], "y")?.parse().ok()?;
        let _z: i32 = field_value(fields[3], "z")?.parse().ok()?;
        let mpry = field_value(fields[4], "mpry")?;
        let yaw: i32 = mpry.split(',').nth(2)?.trim().parse().ok()?;
        Some(PadSighting {
            id,
            offset: (x, y),
            yaw,
        })
    } else {
        None
    };

    Some(TelemetryFrame {
        pad,
        height_mm: height_cm * 10,
    })
}

fn field_value<'a>(field: &'a str, key: &str) -> Option<&'a str> {
    let (k, v) = field.split_once(':')?;
    (k == key).then_some(v)
}
