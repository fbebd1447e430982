//! NASDAQ TotalView-ITCH 5.0 framing and message decoding.
//!
//! The wire stream is a concatenation of frames: a 16-bit big-endian length
//! followed by that many payload bytes, the first of which is the message
//! type code. Only the order-mutating subset (add, add with MPID, execute,
//! execute with price, cancel, delete, replace) is decoded in full; the
//! stock directory yields its locate and symbol, and every other recognized
//! type is length-validated and discarded. Decoded fields are native-endian;
//! consumers never see the wire layout.

pub mod reader;

pub use reader::FeedReader;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read feed file: {0}")]
    Io(#[from] std::io::Error),
    /// An unrecognized type byte means the stream is corrupt or not ITCH;
    /// everything downstream of it would be garbage.
    #[error("unknown message type {code:#04x} at offset {offset}")]
    UnknownMessage { code: u8, offset: u64 },
}

/// One decoded ITCH message.
///
/// Variants that do not affect the book carry no fields; they exist so the
/// parser can vouch for the type byte and the frame length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    SystemEvent,
    StockDirectory { locate: u16, symbol: [u8; 8] },
    TradingAction,
    RegShoRestriction,
    MpidPosition,
    MwcbDecline,
    MwcbStatus,
    IpoQuote,
    LuldCollar,
    AddOrder { locate: u16, oid: u64, is_buy: bool, qty: u32, price: u32 },
    ExecuteOrder { oid: u64, qty: u32 },
    ReduceOrder { oid: u64, qty: u32 },
    DeleteOrder { oid: u64 },
    ReplaceOrder { oid: u64, new_oid: u64, qty: u32, price: u32 },
    Trade,
    CrossTrade,
    BrokenTrade,
    Imbalance,
    RetailImprovement,
}

/// Wire length of each recognized message type, type byte included.
fn wire_len(code: u8) -> Option<usize> {
    Some(match code {
        b'S' => 12,
        b'R' => 39,
        b'H' => 25,
        b'Y' => 20,
        b'L' => 26,
        b'V' => 35,
        b'W' => 12,
        b'K' => 28,
        b'J' => 35,
        b'A' => 36,
        b'F' => 40,
        b'E' => 31,
        b'C' => 36,
        b'X' => 23,
        b'D' => 19,
        b'U' => 35,
        b'P' => 44,
        b'Q' => 40,
        b'B' => 19,
        b'I' => 50,
        b'N' => 20,
        _ => return None,
    })
}

#[inline]
fn be_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

#[inline]
fn be_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_be_bytes(bytes[at..at + 4].try_into().expect("4 bytes"))
}

#[inline]
fn be_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from_be_bytes(bytes[at..at + 8].try_into().expect("8 bytes"))
}

impl Message {
    /// Decodes one frame payload. `offset` is the payload's position in the
    /// file, used only for diagnostics.
    ///
    /// The frame length matching the per-type wire length is a trusted-feed
    /// invariant, checked in debug builds only.
    pub fn parse(payload: &[u8], offset: u64) -> Result<Message, FeedError> {
        let code = payload[0];
        match wire_len(code) {
            Some(len) => debug_assert_eq!(payload.len(), len, "bad frame length for {:?}", code as char),
            None => return Err(FeedError::UnknownMessage { code, offset }),
        }

        // Common field offsets (after the type byte): stock locate at 1,
        // tracking number at 3, timestamp at 5, order reference at 11.
        Ok(match code {
            b'S' => Message::SystemEvent,
            b'R' => Message::StockDirectory {
                locate: be_u16(payload, 1),
                symbol: payload[11..19].try_into().expect("8 bytes"),
            },
            b'H' => Message::TradingAction,
            b'Y' => Message::RegShoRestriction,
            b'L' => Message::MpidPosition,
            b'V' => Message::MwcbDecline,
            b'W' => Message::MwcbStatus,
            b'K' => Message::IpoQuote,
            b'J' => Message::LuldCollar,
            // 'F' is an add with market-participant attribution; the book
            // does not care who placed the order.
            b'A' | b'F' => Message::AddOrder {
                locate: be_u16(payload, 1),
                oid: be_u64(payload, 11),
                is_buy: payload[19] == b'B',
                qty: be_u32(payload, 20),
                price: be_u32(payload, 32),
            },
            // 'C' additionally reports the (possibly improved) execution
            // price, which does not move the resting level.
            b'E' | b'C' => Message::ExecuteOrder {
                oid: be_u64(payload, 11),
                qty: be_u32(payload, 19),
            },
            b'X' => Message::ReduceOrder {
                oid: be_u64(payload, 11),
                qty: be_u32(payload, 19),
            },
            b'D' => Message::DeleteOrder { oid: be_u64(payload, 11) },
            b'U' => Message::ReplaceOrder {
                oid: be_u64(payload, 11),
                new_oid: be_u64(payload, 19),
                qty: be_u32(payload, 27),
                price: be_u32(payload, 31),
            },
            b'P' => Message::Trade,
            b'Q' => Message::CrossTrade,
            b'B' => Message::BrokenTrade,
            b'I' => Message::Imbalance,
            b'N' => Message::RetailImprovement,
            _ => unreachable!("wire_len vetted the code"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a payload of `len` bytes: type code, then the given
    /// `(offset, bytes)` patches over zero fill.
    fn payload(code: u8, len: usize, patches: &[(usize, &[u8])]) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        buf[0] = code;
        for &(at, bytes) in patches {
            buf[at..at + bytes.len()].copy_from_slice(bytes);
        }
        buf
    }

    #[test]
    fn parses_add_order() {
        let buf = payload(
            b'A',
            36,
            &[
                (1, &5u16.to_be_bytes()),
                (11, &123_456u64.to_be_bytes()),
                (19, b"B"),
                (20, &100u32.to_be_bytes()),
                (24, b"AAPL    "),
                (32, &1_850_000u32.to_be_bytes()),
            ],
        );
        assert_eq!(
            Message::parse(&buf, 0).unwrap(),
            Message::AddOrder { locate: 5, oid: 123_456, is_buy: true, qty: 100, price: 1_850_000 }
        );

        // Sell side: anything but 'B'.
        let mut sell = buf;
        sell[19] = b'S';
        assert!(matches!(
            Message::parse(&sell, 0).unwrap(),
            Message::AddOrder { is_buy: false, .. }
        ));
    }

    #[test]
    fn add_with_mpid_decodes_as_add() {
        let buf = payload(
            b'F',
            40,
            &[
                (1, &7u16.to_be_bytes()),
                (11, &42u64.to_be_bytes()),
                (19, b"B"),
                (20, &250u32.to_be_bytes()),
                (32, &995_500u32.to_be_bytes()),
                (36, b"MPID"),
            ],
        );
        assert_eq!(
            Message::parse(&buf, 0).unwrap(),
            Message::AddOrder { locate: 7, oid: 42, is_buy: true, qty: 250, price: 995_500 }
        );
    }

    #[test]
    fn parses_lifecycle_messages() {
        let exec = payload(b'E', 31, &[(11, &9u64.to_be_bytes()), (19, &30u32.to_be_bytes())]);
        assert_eq!(
            Message::parse(&exec, 0).unwrap(),
            Message::ExecuteOrder { oid: 9, qty: 30 }
        );

        let exec_px = payload(b'C', 36, &[(11, &9u64.to_be_bytes()), (19, &30u32.to_be_bytes())]);
        assert_eq!(
            Message::parse(&exec_px, 0).unwrap(),
            Message::ExecuteOrder { oid: 9, qty: 30 }
        );

        let cancel = payload(b'X', 23, &[(11, &9u64.to_be_bytes()), (19, &10u32.to_be_bytes())]);
        assert_eq!(
            Message::parse(&cancel, 0).unwrap(),
            Message::ReduceOrder { oid: 9, qty: 10 }
        );

        let delete = payload(b'D', 19, &[(11, &9u64.to_be_bytes())]);
        assert_eq!(Message::parse(&delete, 0).unwrap(), Message::DeleteOrder { oid: 9 });

        let replace = payload(
            b'U',
            35,
            &[
                (11, &9u64.to_be_bytes()),
                (19, &10u64.to_be_bytes()),
                (27, &75u32.to_be_bytes()),
                (31, &1_000_100u32.to_be_bytes()),
            ],
        );
        assert_eq!(
            Message::parse(&replace, 0).unwrap(),
            Message::ReplaceOrder { oid: 9, new_oid: 10, qty: 75, price: 1_000_100 }
        );
    }

    #[test]
    fn directory_yields_locate_and_symbol() {
        let buf = payload(b'R', 39, &[(1, &77u16.to_be_bytes()), (11, b"MSFT    ")]);
        assert_eq!(
            Message::parse(&buf, 0).unwrap(),
            Message::StockDirectory { locate: 77, symbol: *b"MSFT    " }
        );
    }

    #[test]
    fn unknown_type_is_fatal() {
        let buf = payload(b'z', 12, &[]);
        match Message::parse(&buf, 1234) {
            Err(FeedError::UnknownMessage { code, offset }) => {
                assert_eq!(code, b'z');
                assert_eq!(offset, 1234);
            }
            other => panic!("expected UnknownMessage, got {other:?}"),
        }
    }
}
