use std::io::Write;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use replink_transport::ByteLink;
use tracing::{debug, trace};

use crate::error::Result;
use crate::framer::{Framer, PACKET_TIMEOUT};
use crate::packet::{encode_packet, Packet};

/// Filler byte pumped onto the bus during a reset to desynchronize any
/// partial frame stuck on the remote side. Deliberately not the start byte.
pub const RESET_FILLER: u8 = 0x20;

/// Number of filler bytes written per reset.
pub const RESET_FILLER_LEN: usize = 64;

/// Settle time after pumping filler bytes, before draining the backlog.
pub const RESET_SETTLE: Duration = Duration::from_millis(100);

/// A byte link with a framer attached: the packet-level view of one
/// transport session.
///
/// Owns the link exclusively for the lifetime of the session; dropping the
/// port releases the underlying channel.
#[derive(Debug)]
pub struct PacketPort<L> {
    link: L,
    framer: Framer,
    timeout: Duration,
    scratch: BytesMut,
}

impl<L: ByteLink> PacketPort<L> {
    /// Wrap a link with the protocol's 100ms packet timeout.
    pub fn new(link: L) -> Self {
        Self::with_timeout(link, PACKET_TIMEOUT)
    }

    /// Wrap a link with an explicit packet timeout.
    pub fn with_timeout(link: L, timeout: Duration) -> Self {
        Self {
            link,
            framer: Framer::with_timeout(timeout),
            timeout,
            scratch: BytesMut::new(),
        }
    }

    /// Encode and transmit one packet.
    ///
    /// The frame is written in a single `write_all` and flushed, so sends
    /// never interleave from the caller's perspective.
    pub fn send(&mut self, packet: &Packet) -> Result<()> {
        self.scratch.clear();
        encode_packet(packet, &mut self.scratch);
        self.link.write_all(&self.scratch)?;
        self.link.flush()?;
        trace!(len = packet.len(), "sent frame");
        Ok(())
    }

    /// Process bytes currently waiting on the link.
    ///
    /// Does not arm a response deadline; an already-armed deadline is still
    /// honored. Used when no reply is strictly expected yet.
    pub fn poll(&mut self) -> Result<Option<Packet>> {
        self.pump()
    }

    /// Process waiting bytes with a response deadline armed.
    ///
    /// Call this when a reply is expected: repeated calls are guaranteed to
    /// resolve within the packet timeout, worst case with a `NoResponse`
    /// packet.
    pub fn readback(&mut self) -> Result<Option<Packet>> {
        self.framer.arm_deadline(Instant::now());
        self.pump()
    }

    fn pump(&mut self) -> Result<Option<Packet>> {
        while self.link.available()? > 0 {
            let byte = self.link.read_byte()?;
            if let Some(packet) = self.framer.push(byte) {
                return Ok(Some(packet));
            }
        }
        Ok(self.framer.check_timeout(Instant::now()))
    }

    /// Drive the bus back to a clean state.
    ///
    /// Discards unread input, writes a run of filler bytes so the remote
    /// side abandons any partial frame, waits for the link to settle, then
    /// drains whatever backlog arrived in the meantime. The framer comes out
    /// idle with no deadline pending.
    pub fn reset(&mut self) -> Result<()> {
        debug!("resetting bus");
        self.framer = Framer::with_timeout(self.timeout);
        self.link.discard_input()?;
        self.link.write_all(&[RESET_FILLER; RESET_FILLER_LEN])?;
        self.link.flush()?;

        std::thread::sleep(RESET_SETTLE);

        while self.link.available()? > 0 {
            let _ = self.pump()?;
        }
        // The backlog may end mid-frame; drop that state too.
        self.framer = Framer::with_timeout(self.timeout);
        Ok(())
    }

    /// Whether the framer is between frames.
    pub fn is_idle(&self) -> bool {
        self.framer.is_idle()
    }

    /// Borrow the underlying link.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Consume the port and return the link.
    pub fn into_inner(self) -> L {
        self.link
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{Read, Write};

    use replink_transport::{ByteLink, Result as TransportResult};

    use super::*;
    use crate::packet::{ResultCode, START_BYTE};

    /// In-memory link: scripted receive bytes, captured transmit bytes.
    #[derive(Debug, Default)]
    struct MemoryLink {
        rx: VecDeque<u8>,
        tx: Vec<u8>,
    }

    impl MemoryLink {
        fn with_rx(bytes: &[u8]) -> Self {
            Self {
                rx: bytes.iter().copied().collect(),
                tx: Vec::new(),
            }
        }
    }

    impl Read for MemoryLink {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut n = 0;
            while n < buf.len() {
                match self.rx.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }
    }

    impl Write for MemoryLink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl ByteLink for MemoryLink {
        fn available(&mut self) -> TransportResult<usize> {
            Ok(self.rx.len())
        }

        fn discard_input(&mut self) -> TransportResult<()> {
            self.rx.clear();
            Ok(())
        }
    }

    fn wire_for(content: &[u8]) -> Vec<u8> {
        let mut packet = Packet::new();
        for &b in content {
            packet.push_u8(b).unwrap();
        }
        let mut wire = BytesMut::new();
        encode_packet(&packet, &mut wire);
        wire.to_vec()
    }

    #[test]
    fn send_writes_one_contiguous_frame() {
        let mut port = PacketPort::new(MemoryLink::default());
        let mut packet = Packet::new();
        packet.push_u8(0x00).unwrap();
        packet.push_u8(0x50).unwrap();
        port.send(&packet).unwrap();

        let tx = &port.link_mut().tx;
        assert_eq!(tx[0], START_BYTE);
        assert_eq!(tx[1], 2);
        assert_eq!(&tx[2..4], &[0x00, 0x50]);
        assert_eq!(tx[4], packet.crc());
        assert_eq!(tx.len(), 5);
    }

    #[test]
    fn poll_returns_scripted_packet() {
        let link = MemoryLink::with_rx(&wire_for(&[0x42]));
        let mut port = PacketPort::new(link);

        let packet = port.poll().unwrap().unwrap();
        assert_eq!(packet.result, ResultCode::Ok);
        assert_eq!(packet.content(), &[0x42]);

        // Nothing further waiting and no deadline armed.
        assert!(port.poll().unwrap().is_none());
    }

    #[test]
    fn poll_without_deadline_never_times_out() {
        let mut port = PacketPort::new(MemoryLink::default());
        assert!(port.poll().unwrap().is_none());
        assert!(port.poll().unwrap().is_none());
    }

    #[test]
    fn readback_times_out_with_no_response() {
        let mut port = PacketPort::with_timeout(MemoryLink::default(), Duration::from_millis(5));
        assert!(port.readback().unwrap().is_none());

        std::thread::sleep(Duration::from_millis(15));
        let packet = port.readback().unwrap().unwrap();
        assert_eq!(packet.result, ResultCode::NoResponse);
    }

    #[test]
    fn end_to_end_status_exchange() {
        // Host sends content [0x5B]; device replies with content
        // [0x01, 0x00, 0x64] whose trailing byte is the tag.
        let reply = wire_for(&[0x01, 0x00, 0x64]);
        let mut port = PacketPort::new(MemoryLink::with_rx(&reply));

        let mut request = Packet::new();
        request.push_u8(0x5B).unwrap();
        port.send(&request).unwrap();
        assert_eq!(
            port.link_mut().tx,
            vec![0xD5, 0x01, 0x5B, request.crc()]
        );

        let packet = port.readback().unwrap().unwrap();
        assert_eq!(packet.result, ResultCode::Ok);
        assert_eq!(packet.content(), &[0x01, 0x00]);
        assert_eq!(packet.tag, Some(0x64));
        assert_eq!(packet.u16_at(0), 1);
    }

    #[test]
    fn reset_pumps_filler_and_drains_backlog() {
        let mut garbage = vec![0x13, 0x37];
        garbage.extend(wire_for(&[0x01, 0x02, 0x03]));
        garbage.extend([START_BYTE, 200]); // stray partial frame
        let mut port = PacketPort::new(MemoryLink::with_rx(&garbage));

        port.reset().unwrap();

        assert_eq!(port.link_mut().tx, vec![RESET_FILLER; RESET_FILLER_LEN]);
        assert_eq!(port.link_mut().rx.len(), 0);
        // The stray partial frame must not leave the framer mid-decode.
        assert!(port.is_idle());
        assert!(port.poll().unwrap().is_none());
    }

    #[test]
    fn reset_is_idempotent() {
        let mut port = PacketPort::new(MemoryLink::default());

        port.reset().unwrap();
        assert!(port.is_idle());
        assert!(port.poll().unwrap().is_none());

        port.reset().unwrap();
        assert!(port.is_idle());
        assert!(port.poll().unwrap().is_none());

        assert_eq!(port.link_mut().tx.len(), 2 * RESET_FILLER_LEN);
    }

    #[test]
    fn reset_clears_armed_deadline() {
        let mut port = PacketPort::with_timeout(MemoryLink::default(), Duration::from_millis(5));
        assert!(port.readback().unwrap().is_none());

        port.reset().unwrap();
        std::thread::sleep(Duration::from_millis(15));
        // A reset framer has no pending deadline, so poll stays quiet.
        assert!(port.poll().unwrap().is_none());
    }
}
