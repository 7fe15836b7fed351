use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::core::{Error, FrameError, DEVICE_FLAG, MAX_FRAME_LEN, MIN_FRAME_LEN, START_END};
use crate::util::Hex;
use super::checksum::crc8;

/// Checksum function applied over the length byte through the last payload byte
pub type ChecksumFn = fn(&[u8]) -> u8;

/// Bytes of a frame not covered by the length byte (both sentinels)
const SENTINELS: usize = 2;

/// One delimited, checksummed protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Bus channel of the sender (incoming) or of the addressee (outgoing)
    pub channel: u8,
    /// Device flag byte
    pub flag: u8,
    /// Raw message type byte
    pub message_type: u8,
    /// Payload following the type byte
    pub payload: Bytes,
    /// Checksum byte as carried on the wire
    pub checksum: u8,
}

impl Frame {
    /// Creates a frame and computes its checksum with the default algorithm
    pub fn new(channel: u8, flag: u8, message_type: u8, payload: impl Into<Bytes>) -> Self {
        Self::with_checksum(channel, flag, message_type, payload, crc8)
    }

    /// Creates a frame whose checksum comes from `checksum`
    pub fn with_checksum(
        channel: u8,
        flag: u8,
        message_type: u8,
        payload: impl Into<Bytes>,
        checksum: ChecksumFn,
    ) -> Self {
        let mut frame = Frame {
            channel,
            flag,
            message_type,
            payload: payload.into(),
            checksum: 0,
        };
        frame.checksum = checksum(&frame.header_and_payload());
        frame
    }

    /// Creates an outgoing frame carrying our device flag
    pub fn outgoing(channel: u8, message_type: u8, payload: impl Into<Bytes>) -> Self {
        Self::new(channel, DEVICE_FLAG, message_type, payload)
    }

    /// Value of the length byte: itself through the checksum
    pub fn len_byte(&self) -> usize {
        self.payload.len() + MIN_FRAME_LEN as usize
    }

    /// Total size on the wire including both sentinels
    pub fn wire_len(&self) -> usize {
        self.len_byte() + SENTINELS
    }

    fn header_and_payload(&self) -> Vec<u8> {
        let mut region = Vec::with_capacity(self.len_byte() - 1);
        region.push(self.len_byte() as u8);
        region.extend_from_slice(&[self.channel, self.flag, self.message_type]);
        region.extend_from_slice(&self.payload);
        region
    }

    /// Serializes the frame into `dst`
    pub fn write_to(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_len());
        dst.put_u8(START_END);
        dst.put_u8(self.len_byte() as u8);
        dst.put_u8(self.channel);
        dst.put_u8(self.flag);
        dst.put_u8(self.message_type);
        dst.put_slice(&self.payload);
        dst.put_u8(self.checksum);
        dst.put_u8(START_END);
    }

    /// Serializes the frame into a fresh buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.write_to(&mut buf);
        buf.freeze()
    }
}

/// Builds the wire form of a frame, rejecting payloads that overflow the length byte
pub fn encode(channel: u8, flag: u8, message_type: u8, payload: &[u8]) -> Result<Bytes, FrameError> {
    check_len(payload.len() + MIN_FRAME_LEN as usize)?;
    Ok(Frame::new(channel, flag, message_type, Bytes::copy_from_slice(payload)).to_bytes())
}

fn check_len(len: usize) -> Result<(), FrameError> {
    if len > MAX_FRAME_LEN as usize || len == START_END as usize {
        return Err(FrameError::BadLength(len.min(u8::MAX as usize) as u8));
    }
    Ok(())
}

/// Parses the frame at the start of `raw` using the default checksum
pub fn decode(raw: &[u8]) -> Result<Frame, FrameError> {
    decode_with(raw, crc8)
}

/// Parses the frame at the start of `raw`; trailing bytes are ignored
pub fn decode_with(raw: &[u8], checksum: ChecksumFn) -> Result<Frame, FrameError> {
    if raw.len() < 2 {
        return Err(FrameError::Incomplete {
            needed: 2,
            actual: raw.len(),
        });
    }
    if raw[0] != START_END {
        return Err(FrameError::BadSentinel {
            position: 0,
            found: raw[0],
        });
    }

    // A sentinel in the length slot is the end of the previous frame.
    let len = raw[1];
    if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&len) || len == START_END {
        return Err(FrameError::BadLength(len));
    }

    let total = len as usize + SENTINELS;
    if raw.len() < total {
        return Err(FrameError::Incomplete {
            needed: total,
            actual: raw.len(),
        });
    }
    if raw[total - 1] != START_END {
        return Err(FrameError::BadSentinel {
            position: total - 1,
            found: raw[total - 1],
        });
    }

    let found = raw[total - 2];
    let expected = checksum(&raw[1..total - 2]);
    if expected != found {
        return Err(FrameError::ChecksumMismatch { expected, found });
    }

    Ok(Frame {
        channel: raw[2],
        flag: raw[3],
        message_type: raw[4],
        payload: Bytes::copy_from_slice(&raw[5..total - 2]),
        checksum: found,
    })
}

/// Streaming codec splitting the gateway byte stream into frames
///
/// Framing violations never surface as errors: the offending leading byte is
/// dropped and scanning resumes, so one corrupt frame costs at most itself.
#[derive(Clone)]
pub struct FrameCodec {
    checksum: ChecksumFn,
    discarded: u64,
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::new()
    }
}

impl FrameCodec {
    /// Creates a codec using the default checksum
    pub fn new() -> Self {
        Self::with_checksum(crc8)
    }

    /// Creates a codec using a dialect supplied checksum
    pub fn with_checksum(checksum: ChecksumFn) -> Self {
        FrameCodec {
            checksum,
            discarded: 0,
        }
    }

    /// Bytes dropped while resynchronising since the codec was created
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn skip(&mut self, src: &mut BytesMut, n: usize) {
        self.discarded += n as u64;
        src.advance(n);
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match src.iter().position(|&b| b == START_END) {
                Some(0) => {}
                Some(n) => {
                    trace!(dropped = n, "skipping to next start sentinel");
                    self.skip(src, n);
                }
                None => {
                    let n = src.len();
                    self.skip(src, n);
                    return Ok(None);
                }
            }

            match decode_with(src, self.checksum) {
                Ok(frame) => {
                    src.advance(frame.wire_len());
                    return Ok(Some(frame));
                }
                Err(FrameError::Incomplete { needed, actual }) => {
                    src.reserve(needed - actual);
                    return Ok(None);
                }
                Err(err) => {
                    debug!(error = %err, head = %Hex(&src[..src.len().min(8)]), "resynchronising");
                    self.skip(src, 1);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => {
                if !src.is_empty() {
                    debug!(bytes = src.len(), "discarding partial frame at end of stream");
                    let n = src.len();
                    self.skip(src, n);
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        check_len(item.len_byte())?;
        item.write_to(dst);
        Ok(())
    }
}

/// Pre-encoded frames from the transmit queue are written verbatim
impl Encoder<Bytes> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_encode_button_press() {
        let bytes = encode(0x10, DEVICE_FLAG, 0x17, &[0x01]).unwrap();
        assert_eq!(&bytes[..], &hex("7e0610bf17017c7e")[..]);

        let frame = Frame::outgoing(0xFE, 0x01, vec![0x02, 0xF1, 0x73]);
        assert_eq!(&frame.to_bytes()[..], &hex("7e08febf0102f173b97e")[..]);
        assert_eq!(frame.wire_len(), 10);
    }

    #[test]
    fn test_decode_captured_frames() {
        let frame = decode(&hex("7E0B0ABF2E0A0001500000BF7E")).unwrap();
        assert_eq!(frame.channel, 0x0A);
        assert_eq!(frame.flag, 0xBF);
        assert_eq!(frame.message_type, 0x2E);
        assert_eq!(&frame.payload[..], &[0x0A, 0x00, 0x01, 0x50, 0x00, 0x00]);

        let status = decode(&hex(
            "7E25FFAF161012270B16420026FA260A140181000042011C00098000000A000000FF0000002F7E",
        ))
        .unwrap();
        assert_eq!(status.message_type, 0x16);
        assert_eq!(status.payload.len(), 32);
        assert_eq!(status.checksum, 0x2F);
    }

    #[test]
    fn test_round_trip() {
        for len in [0usize, 1, 7, 33, 123] {
            let payload: Vec<u8> = (0..len).map(|i| (i * 37 % 256) as u8).collect();
            let bytes = encode(0x0A, DEVICE_FLAG, 0x21, &payload).unwrap();
            let frame = decode(&bytes).unwrap();
            assert_eq!(&frame.payload[..], &payload[..]);
            assert_eq!(frame.to_bytes(), bytes);
        }
        assert_eq!(
            encode(0x0A, DEVICE_FLAG, 0x21, &[0; 124]),
            Err(FrameError::BadLength(129))
        );
    }

    #[test]
    fn test_single_bit_flip_detected() {
        let bytes = encode(0x10, DEVICE_FLAG, 0x16, &[0x12, 0x34, 0x56]).unwrap();
        // flip bits in the channel, flag, type and payload region
        for index in 2..bytes.len() - 2 {
            for bit in 0..8 {
                let mut corrupt = bytes.to_vec();
                corrupt[index] ^= 1 << bit;
                assert!(
                    matches!(decode(&corrupt), Err(FrameError::ChecksumMismatch { .. })),
                    "byte {} bit {}",
                    index,
                    bit
                );
            }
        }
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            decode(&hex("0006")),
            Err(FrameError::BadSentinel { position: 0, found: 0x00 })
        );
        assert_eq!(decode(&hex("7E04")), Err(FrameError::BadLength(4)));
        assert_eq!(decode(&hex("7E81")), Err(FrameError::BadLength(0x81)));
        assert_eq!(decode(&hex("7E7E0510")), Err(FrameError::BadLength(0x7E)));
        assert_eq!(
            decode(&hex("7E0610BF17")),
            Err(FrameError::Incomplete { needed: 8, actual: 5 })
        );
        assert_eq!(
            decode(&hex("7e0610bf17017c00")),
            Err(FrameError::BadSentinel { position: 7, found: 0x00 })
        );
    }

    #[test]
    fn test_codec_resynchronises() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        // garbage, a corrupt frame, then two good frames
        buf.extend_from_slice(&[0x00, 0x13, 0x37]);
        buf.extend_from_slice(&hex("7e0610bf17017d7e"));
        buf.extend_from_slice(&hex("7e0510bf065c7e"));
        buf.extend_from_slice(&hex("7e0507bf03f37e"));

        let first = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.channel, 0x10);
        assert_eq!(first.message_type, 0x06);

        let second = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.channel, 0x07);
        assert_eq!(second.message_type, 0x03);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
        assert_eq!(codec.discarded(), 3 + 8);
    }

    #[test]
    fn test_codec_waits_for_partial_frame() {
        let mut codec = FrameCodec::new();
        let full = hex("7e0610bf17017c7e");
        let mut buf = BytesMut::from(&full[..5]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 5);

        buf.extend_from_slice(&full[5..]);
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame.payload[..], &[0x01]);
        assert_eq!(codec.discarded(), 0);
    }

    #[test]
    fn test_codec_eof_discards_leftovers() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&hex("7e0610bf")[..]);
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encoder_impls() {
        let mut codec = FrameCodec::new();
        let mut dst = BytesMut::new();
        codec.encode(Frame::outgoing(0x07, 0x03, Bytes::new()), &mut dst).unwrap();
        codec.encode(Bytes::from(hex("7e0507bf06e87e")), &mut dst).unwrap();
        assert_eq!(&dst[..], &hex("7e0507bf03f37e7e0507bf06e87e")[..]);
    }
}
