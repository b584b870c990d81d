//! OSC (Open Sound Control) output.
//!
//! Patterns build [`rosc`] messages and bundles through their OSC mappings;
//! an [`OscSink`] is whatever carries them away. [`UdpOscSender`] sends them
//! over UDP and [`OscRecorder`] keeps them in memory.

use parking_lot::Mutex;
use rosc::{encoder, OscBundle, OscMessage, OscPacket, OscTime, OscType};
use std::net::{ToSocketAddrs, UdpSocket};

use crate::error::{LoomError, Result};

/// Timetag meaning "immediately".
pub const IMMEDIATELY: OscTime = OscTime {
    seconds: 0,
    fractional: 1,
};

/// Destination for OSC packets.
pub trait OscSink: Send + Sync {
    fn send(&self, packet: &OscPacket) -> Result<()>;
}

/// A message with a single argument.
pub fn message(address: &str, arg: OscType) -> OscMessage {
    OscMessage {
        addr: address.to_string(),
        args: vec![arg],
    }
}

/// A bundle of messages timetagged for immediate delivery.
pub fn bundle(messages: Vec<OscMessage>) -> OscBundle {
    OscBundle {
        timetag: IMMEDIATELY,
        content: messages.into_iter().map(OscPacket::Message).collect(),
    }
}

/// Sends packets to one UDP address.
pub struct UdpOscSender {
    socket: UdpSocket,
    target: String,
}

impl UdpOscSender {
    /// Bind an ephemeral local port and target `target` (`host:port`).
    pub fn new(target: &str) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        if target.to_socket_addrs()?.next().is_none() {
            return Err(LoomError::Osc(format!("{} does not resolve", target)));
        }
        Ok(UdpOscSender {
            socket,
            target: target.to_string(),
        })
    }

    /// Target a port on the loopback interface.
    pub fn localhost(port: u16) -> Result<Self> {
        Self::new(&format!("127.0.0.1:{}", port))
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl OscSink for UdpOscSender {
    fn send(&self, packet: &OscPacket) -> Result<()> {
        let buf = encoder::encode(packet)?;
        self.socket.send_to(&buf, &self.target)?;
        Ok(())
    }
}

/// Keeps every packet it is sent.
#[derive(Debug, Default)]
pub struct OscRecorder {
    packets: Mutex<Vec<OscPacket>>,
}

impl OscRecorder {
    pub fn new() -> Self {
        OscRecorder::default()
    }

    pub fn packets(&self) -> Vec<OscPacket> {
        self.packets.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.packets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.lock().is_empty()
    }

    pub fn clear(&self) {
        self.packets.lock().clear();
    }
}

impl OscSink for OscRecorder {
    fn send(&self, packet: &OscPacket) -> Result<()> {
        self.packets.lock().push(packet.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_bundle_is_immediate() {
        let b = bundle(vec![message("/a", OscType::Int(1)), message("/b", OscType::Int(2))]);
        assert_eq!(b.timetag, IMMEDIATELY);
        assert_eq!(b.content.len(), 2);
    }

    #[test]
    fn test_recorder_keeps_packets() {
        let recorder = OscRecorder::new();
        let packet = OscPacket::Message(message("/x", OscType::Float(0.5)));
        recorder.send(&packet).unwrap();
        assert_eq!(recorder.packets(), vec![packet]);
        recorder.clear();
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_udp_roundtrip() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let port = receiver.local_addr().unwrap().port();

        let sender = UdpOscSender::localhost(port).unwrap();
        let sent = OscPacket::Message(message("/loom/value", OscType::Int(42)));
        sender.send(&sent).unwrap();

        let mut buf = [0u8; rosc::decoder::MTU];
        let (size, _) = receiver.recv_from(&mut buf).unwrap();
        let (_, received) = rosc::decoder::decode_udp(&buf[..size]).unwrap();
        assert_eq!(received, sent);
    }
}
