//! Control-port channel: one shared UDP socket, per-unit request/ack
//! slots.
//!
//! Every unit gets at most one outstanding acknowledgment slot and at
//! most one outstanding range-poll slot, both keyed by the unit's IP.
//! A single reader task demultiplexes inbound datagrams back onto those
//! slots; anything unmatched is dropped with a log line.

use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::command::Command;
use crate::errors::{Error, Result};

/// Classification of an acknowledgment payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// Plain `ok`, possibly with trailing text.
    Ok,
    /// The payload carried `error`; the unit is in trouble.
    Error(String),
    /// Anything else - label, LED and sensor commands ack with their own
    /// text.
    Data(String),
}

impl Ack {
    pub(crate) fn classify(payload: &str) -> Ack {
        let trimmed = payload.trim();
        if trimmed.contains("error") {
            Ack::Error(trimmed.to_string())
        } else if trimmed.contains("ok") {
            Ack::Ok
        } else {
            Ack::Data(trimmed.to_string())
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Ack::Error(_))
    }
}

/// Outcome of a single command/ack exchange.
#[derive(Debug)]
pub enum AckOutcome {
    /// The drone acknowledged the command.
    Acked(Ack),
    /// The slot was detached before an ack arrived - the proximity guard
    /// took the unit over, or the session is shutting down.
    Detached,
}

/// The shared control socket and its pending-exchange tables.
#[derive(Debug)]
pub struct ControlChannel {
    socket: UdpSocket,
    control_port: u16,
    ack_slots: Mutex<HashMap<IpAddr, oneshot::Sender<Ack>>>,
    range_slots: Mutex<HashMap<IpAddr, oneshot::Sender<String>>>,
}

impl ControlChannel {
    /// Bind the control socket on all interfaces at `local_port`.
    pub async fn bind(local_port: u16, control_port: u16) -> Result<Self> {
        let socket =
            UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), local_port))
                .await?;
        Ok(Self {
            socket,
            control_port,
            ack_slots: Mutex::new(HashMap::new()),
            range_slots: Mutex::new(HashMap::new()),
        })
    }

    /// Send `command` to the unit at `addr` and wait for its ack.
    ///
    /// Binds a fresh ack slot for the unit; the slot must be free.
    ///
    /// # Errors
    /// `Error::AckSlotBusy` if an exchange is already in flight for this
    /// unit, `Error::Socket` on transport failure.
    pub async fn exchange(&self, addr: IpAddr, command: &Command) -> Result<AckOutcome> {
        let (tx, rx) = oneshot::channel();
        {
            let mut slots = self.ack_slots.lock().unwrap();
            if slots.contains_key(&addr) {
                return Err(Error::AckSlotBusy(addr));
            }
            slots.insert(addr, tx);
        }

        let payload = command.to_string();
        trace!(unit = %addr, command = %payload, "sending control command");
        if let Err(e) = self
            .socket
            .send_to(payload.as_bytes(), SocketAddr::new(addr, self.control_port))
            .await
        {
            self.ack_slots.lock().unwrap().remove(&addr);
            return Err(e.into());
        }

        match rx.await {
            Ok(ack) => Ok(AckOutcome::Acked(ack)),
            Err(_) => Ok(AckOutcome::Detached),
        }
    }

    /// Drop the pending ack slot for `addr`, if any. The exchange waiting
    /// on it observes [`AckOutcome::Detached`]. Returns whether a slot
    /// existed.
    pub fn detach(&self, addr: IpAddr) -> bool {
        self.ack_slots.lock().unwrap().remove(&addr).is_some()
    }

    /// Poll the front range sensor of the unit at `addr`.
    ///
    /// Uses the dedicated range slot, so it can run while a normal
    /// exchange is in flight. `None` means no usable reply arrived within
    /// `reply_timeout` (or a poll was already outstanding).
    pub async fn range_query(
        &self,
        addr: IpAddr,
        reply_timeout: Duration,
    ) -> Result<Option<u32>> {
        let (tx, rx) = oneshot::channel();
        {
            let mut slots = self.range_slots.lock().unwrap();
            if slots.contains_key(&addr) {
                warn!(unit = %addr, "range poll already outstanding");
                return Ok(None);
            }
            slots.insert(addr, tx);
        }

        let payload = Command::RangeQuery.to_string();
        if let Err(e) = self
            .socket
            .send_to(payload.as_bytes(), SocketAddr::new(addr, self.control_port))
            .await
        {
            self.range_slots.lock().unwrap().remove(&addr);
            return Err(e.into());
        }

        match tokio::time::timeout(reply_timeout, rx).await {
            Ok(Ok(reply)) => Ok(parse_range(&reply)),
            Ok(Err(_)) => Ok(None),
            Err(_) => {
                self.range_slots.lock().unwrap().remove(&addr);
                Ok(None)
            }
        }
    }

    /// Receive datagrams and resolve slots until the socket fails.
    /// Returns the fatal error; the session turns it into the failure
    /// completion.
    pub(crate) async fn run_reader(self: Arc<Self>, known: HashSet<IpAddr>) -> Error {
        let mut buf = [0u8; 1024];
        loop {
            let (len, from) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => return e.into(),
            };
            let unit = from.ip();
            if !known.contains(&unit) {
                debug!(source = %from, "ignoring datagram from unknown address");
                continue;
            }
            let payload = String::from_utf8_lossy(&buf[..len]).trim().to_string();

            // Range replies have their own slot; a `tof` payload never
            // resolves a command ack.
            if payload.starts_with("tof") {
                match self.range_slots.lock().unwrap().remove(&unit) {
                    Some(tx) => {
                        let _ = tx.send(payload);
                    }
                    None => {
                        debug!(unit = %unit, payload = %payload, "dropping late range reply")
                    }
                }
                continue;
            }

            match self.ack_slots.lock().unwrap().remove(&unit) {
                Some(tx) => {
                    let _ = tx.send(Ack::classify(&payload));
                }
                None => {
                    warn!(unit = %unit, payload = %payload, "dropping unmatched ack datagram")
                }
            }
        }
    }
}

fn parse_range(reply: &str) -> Option<u32> {
    reply
        .split_whitespace()
        .nth(1)?
        .trim_end_matches("mm")
        .parse()
        .ok()
}
