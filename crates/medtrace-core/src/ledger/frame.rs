// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ledger file framing.
//!
//! File layout:
//!
//! ``MAGIC(4) || VERSION(2) || INSTANCE_ID(32) || FRAME*``
//!
//! Frame layout:
//!
//! ``LENGTH(4) || PAYLOAD || CHECKSUM(32)``
//!
//! * integers are big-endian
//! * PAYLOAD is a CBOR `LedgerEntry`
//! * CHECKSUM = blake3-256 over LENGTH || PAYLOAD

use blake3::Hasher;
use thiserror::Error;

use crate::ident::LedgerInstanceId;

/// File magic "MTLG".
pub const MAGIC: [u8; 4] = *b"MTLG";
/// Format version (big-endian u16).
pub const VERSION: u16 = 0x0001;
/// Bytes before the first frame.
pub const HEADER_LEN: usize = 4 + 2 + 32;
/// Length prefix plus checksum.
pub const FRAME_OVERHEAD: usize = 4 + 32;
/// Largest accepted payload.
pub const MAX_PAYLOAD: usize = 1 << 20;

/// Why a header or frame failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer bytes remain than the structure needs.
    #[error("truncated: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        available: usize,
    },
    /// The file does not start with [`MAGIC`].
    #[error("bad magic")]
    BadMagic,
    /// The header names a version this build cannot read.
    #[error("unsupported version {0}")]
    UnsupportedVersion(u16),
    /// A length prefix exceeds [`MAX_PAYLOAD`].
    #[error("frame of {0} bytes exceeds limit")]
    TooLarge(usize),
    /// The frame checksum does not match its contents.
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

pub fn encode_header(instance: &LedgerInstanceId) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&MAGIC);
    header[4..6].copy_from_slice(&VERSION.to_be_bytes());
    header[6..38].copy_from_slice(instance.as_bytes());
    header
}

pub fn decode_header(bytes: &[u8]) -> Result<LedgerInstanceId, FrameError> {
    if bytes.len() < HEADER_LEN {
        return Err(FrameError::Truncated {
            needed: HEADER_LEN,
            available: bytes.len(),
        });
    }
    if bytes[0..4] != MAGIC {
        return Err(FrameError::BadMagic);
    }
    let version = u16::from_be_bytes([bytes[4], bytes[5]]);
    if version != VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }
    let mut instance = [0u8; 32];
    instance.copy_from_slice(&bytes[6..38]);
    Ok(LedgerInstanceId(instance))
}

fn checksum(len: &[u8; 4], payload: &[u8]) -> [u8; 32] {
    let mut hasher = Hasher::new();
    hasher.update(len);
    hasher.update(payload);
    *hasher.finalize().as_bytes()
}

pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(FrameError::TooLarge(payload.len()));
    }
    #[allow(clippy::cast_possible_truncation)]
    let len = (payload.len() as u32).to_be_bytes();
    let mut out = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
    out.extend_from_slice(&len);
    out.extend_from_slice(payload);
    out.extend_from_slice(&checksum(&len, payload));
    Ok(out)
}

/// Decode the frame at the start of `bytes`, returning its payload and the
/// number of bytes it occupied.
pub fn decode_frame(bytes: &[u8]) -> Result<(&[u8], usize), FrameError> {
    if bytes.len() < 4 {
        return Err(FrameError::Truncated {
            needed: 4,
            available: bytes.len(),
        });
    }
    let len = [bytes[0], bytes[1], bytes[2], bytes[3]];
    let payload_len = u32::from_be_bytes(len) as usize;
    if payload_len > MAX_PAYLOAD {
        return Err(FrameError::TooLarge(payload_len));
    }
    let total = FRAME_OVERHEAD + payload_len;
    if bytes.len() < total {
        return Err(FrameError::Truncated {
            needed: total,
            available: bytes.len(),
        });
    }
    let payload = &bytes[4..4 + payload_len];
    if bytes[4 + payload_len..total] != checksum(&len, payload) {
        return Err(FrameError::ChecksumMismatch);
    }
    Ok((payload, total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn frame_decodes_to_its_payload() {
        let frame = encode_frame(b"entry bytes").unwrap();
        assert_eq!(frame.len(), FRAME_OVERHEAD + 11);
        let (payload, used) = decode_frame(&frame).unwrap();
        assert_eq!(payload, b"entry bytes");
        assert_eq!(used, frame.len());
    }

    #[test]
    fn flipped_payload_bit_fails_checksum() {
        let mut frame = encode_frame(b"entry bytes").unwrap();
        frame[6] ^= 0x01;
        assert_eq!(decode_frame(&frame), Err(FrameError::ChecksumMismatch));
    }

    #[test]
    fn short_input_is_truncated_not_misread() {
        let frame = encode_frame(b"entry bytes").unwrap();
        assert!(matches!(
            decode_frame(&frame[..frame.len() - 1]),
            Err(FrameError::Truncated { .. })
        ));
        assert!(matches!(
            decode_frame(&frame[..2]),
            Err(FrameError::Truncated { needed: 4, .. })
        ));
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut frame = vec![0xFF, 0xFF, 0xFF, 0xFF];
        frame.extend_from_slice(&[0; 64]);
        assert!(matches!(decode_frame(&frame), Err(FrameError::TooLarge(_))));
    }

    #[test]
    fn header_checks_magic_and_version() {
        let instance = LedgerInstanceId([7; 32]);
        let header = encode_header(&instance);
        assert_eq!(decode_header(&header).unwrap(), instance);

        let mut bad_magic = header;
        bad_magic[0] = b'X';
        assert_eq!(decode_header(&bad_magic), Err(FrameError::BadMagic));

        let mut bad_version = header;
        bad_version[5] = 9;
        assert_eq!(
            decode_header(&bad_version),
            Err(FrameError::UnsupportedVersion(9))
        );
    }
}
