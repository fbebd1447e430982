//! The timing harness: stream a capture through one engine as fast as
//! possible and report nanoseconds per message.
//!
//! The clock starts at the first add-order message, so the directory and
//! system-event preamble is treated as warm-up; every message from that
//! point on counts as a packet.

use std::path::Path;
use std::time::Instant;

use itch::{FeedError, FeedReader, Message};
use orderbook::{Book, BookId, Engine, EngineConfig, OrderId, Side, SignedPrice};
use tracing::debug;

pub struct Summary {
    pub packets: u64,
    pub nanos: u128,
}

impl Summary {
    pub fn nanos_per_packet(&self) -> f64 {
        if self.packets == 0 {
            return 0.0;
        }
        self.nanos as f64 / self.packets as f64
    }
}

fn side_of(is_buy: bool) -> Side {
    if is_buy { Side::Bid } else { Side::Ask }
}

fn oid(wire: u64) -> OrderId {
    // Session order references stay inside 31 bits, which is what makes the
    // dense order pool viable.
    debug_assert!(wire < 1 << 31, "order id {wire} exceeds 31 bits");
    OrderId(wire as u32)
}

pub fn run<B: Book>(path: &Path, config: EngineConfig) -> Result<Summary, FeedError> {
    #[cfg(feature = "cross-check")]
    let mut engine = Engine::<B>::with_cross_check(config);
    #[cfg(not(feature = "cross-check"))]
    let mut engine = Engine::<B>::new(config);

    let mut reader = FeedReader::open(path)?;
    let mut packets = 0u64;
    let mut started: Option<Instant> = None;

    loop {
        let frame_offset = reader.offset();
        let Some(frame) = reader.next_frame() else {
            break;
        };
        match Message::parse(frame, frame_offset + 2)? {
            Message::AddOrder { locate, oid: wire_oid, is_buy, qty, price } => {
                if started.is_none() {
                    started = Some(Instant::now());
                }
                engine.add_order(
                    oid(wire_oid),
                    BookId(locate),
                    SignedPrice::new(price, side_of(is_buy)),
                    qty,
                );
            }
            Message::ExecuteOrder { oid: wire_oid, qty } => engine.execute_order(oid(wire_oid), qty),
            Message::ReduceOrder { oid: wire_oid, qty } => engine.cancel_order(oid(wire_oid), qty),
            Message::DeleteOrder { oid: wire_oid } => engine.delete_order(oid(wire_oid)),
            Message::ReplaceOrder { oid: wire_oid, new_oid, qty, price } => {
                engine.replace_order(oid(wire_oid), oid(new_oid), qty, price)
            }
            Message::StockDirectory { locate, symbol } => {
                debug!(locate, symbol = %String::from_utf8_lossy(&symbol).trim_end(), "directory");
            }
            // Everything else is parsed for well-formedness and discarded.
            _ => {}
        }
        if started.is_some() {
            packets += 1;
        }
    }

    let nanos = started.map(|start| start.elapsed().as_nanos()).unwrap_or(0);
    Ok(Summary { packets, nanos })
}
