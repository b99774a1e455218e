/*!
Frame codec for the exercise multicast link.

Every datagram on the group is a single frame:

```text
byte 0-1: sync = 0xAA 0x55
byte 2:   protocol id
byte 3:   package type
byte 4-7: payload length, u32 little-endian
byte 8..: payload (exactly `payload length` bytes)
```

Encoding is infallible. Decoding rejects the whole datagram on any header
violation; nothing is partially processed.
*/

use crate::error::FrameError;
use crate::protocol::{HEADER_LEN, SYNC_BYTES};
use bytes::{BufMut, Bytes, BytesMut};

/// A validated frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub protocol_id: u8,
    pub package_type: u8,
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame
    pub fn new(protocol_id: u8, package_type: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            protocol_id,
            package_type,
            payload: payload.into(),
        }
    }

    /// Payload length as carried in the header
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Encode this frame back to wire bytes
    pub fn encode(&self) -> Bytes {
        encode_frame(self.protocol_id, self.package_type, &self.payload)
    }
}

/// Encode a frame: sync bytes, protocol id, package type, LE length, payload
pub fn encode_frame(protocol_id: u8, package_type: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_slice(&SYNC_BYTES);
    buf.put_u8(protocol_id);
    buf.put_u8(package_type);
    buf.put_u32_le(payload.len() as u32);
    buf.put_slice(payload);
    buf.freeze()
}

/// Decode and validate a frame
pub fn decode_frame(data: &[u8]) -> Result<Frame, FrameError> {
    if data.len() < HEADER_LEN {
        return Err(FrameError::TooShort { len: data.len() });
    }

    if data[..2] != SYNC_BYTES {
        return Err(FrameError::BadSync {
            found: [data[0], data[1]],
        });
    }

    let declared = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let body = &data[HEADER_LEN..];
    if declared as usize != body.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: body.len(),
        });
    }

    Ok(Frame {
        protocol_id: data[2],
        package_type: data[3],
        payload: Bytes::copy_from_slice(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let encoded = encode_frame(0x01, 0x2A, &[0xDE, 0xAD]);
        assert_eq!(
            encoded.as_ref(),
            &[0xAA, 0x55, 0x01, 0x2A, 0x02, 0x00, 0x00, 0x00, 0xDE, 0xAD]
        );
    }

    #[test]
    fn test_frame_roundtrip() {
        let payloads: [&[u8]; 3] = [&[], &[0x00], &[0x42; 300]];
        for payload in payloads {
            let encoded = encode_frame(0x01, 0x29, payload);
            assert_eq!(encoded.len(), HEADER_LEN + payload.len());

            let frame = decode_frame(&encoded).unwrap();
            assert_eq!(frame, Frame::new(0x01, 0x29, payload.to_vec()));
            assert_eq!(frame.encode(), encoded);
        }
    }

    #[test]
    fn test_platforms_header_example() {
        let data = [
            0xAA, 0x55, 0x01, 0x29, 0x05, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05,
        ];

        let frame = decode_frame(&data).unwrap();
        assert_eq!(frame.protocol_id, 1);
        assert_eq!(frame.package_type, 0x29);
        assert_eq!(frame.payload.as_ref(), &[0x01, 0x02, 0x03, 0x04, 0x05]);

        let mut corrupted = data;
        corrupted[0] = 0xAB;
        assert_eq!(
            decode_frame(&corrupted),
            Err(FrameError::BadSync { found: [0xAB, 0x55] })
        );
    }

    #[test]
    fn test_header_boundaries() {
        let seven = [0xAA, 0x55, 0x01, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(decode_frame(&seven), Err(FrameError::TooShort { len: 7 }));

        let empty = [0xAA, 0x55, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00];
        let frame = decode_frame(&empty).unwrap();
        assert!(frame.payload.is_empty());
        assert_eq!(frame.package_type, 0x00);
    }

    #[test]
    fn test_length_mismatch() {
        let mut data = encode_frame(0x01, 0x03, &[1, 2, 3, 4]).to_vec();
        data.pop();
        assert_eq!(
            decode_frame(&data),
            Err(FrameError::LengthMismatch { declared: 4, actual: 3 })
        );

        let mut data = encode_frame(0x01, 0x03, &[1, 2, 3, 4]).to_vec();
        data.push(0xFF);
        assert_eq!(
            decode_frame(&data),
            Err(FrameError::LengthMismatch { declared: 4, actual: 5 })
        );
    }
}
