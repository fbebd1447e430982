//! Limit order book engine for order-by-order market data replay.
//!
//! Core features:
//! - Dense-array order pool: metadata lookup is one load, no hashing
//! - Pooled or inline price levels in sorted per-side arrays, tuned for the
//!   top of book (expected scan depth 1-5 levels)
//! - Four interchangeable layouts behind one [`Book`] trait: scalar,
//!   SoA with indirection, price-only SoA, and an AVX2 vectorized SoA
//! - Sign-encoded prices: one `i32` carries side and magnitude, one signed
//!   compare drives both sides' sort order (see [`types::SignedPrice`])
//!
//! Single-threaded by design: the feed is consumed in strict file order and
//! every mutation completes before the next message is parsed. There is no
//! matching; the feed reports the results of external matching, so books
//! track aggregate resting quantity per price only.

pub mod engine;
pub mod pool;
pub mod scalar;
pub mod soa;
pub mod soa_price;
pub mod types;

#[cfg(target_arch = "x86_64")]
pub mod avx2;

pub use engine::{Book, Engine, EngineConfig};
pub use pool::{Level, LevelPool, OidMap};
pub use scalar::ScalarBook;
pub use soa::SoaBook;
pub use soa_price::SoaPriceBook;
pub use types::{BookId, LevelId, OrderId, Side, SignedPrice};

#[cfg(target_arch = "x86_64")]
pub use avx2::Avx2Book;
