//! AVX2 book: inline levels in 32-byte-aligned blocks of eight lanes.
//!
//! Same data shape as the price-only SoA book, but each side's price and
//! quantity arrays are stored as aligned 8-lane blocks manipulated with
//! 256-bit operations, and the tail of the price array is padded with
//! [`PRICE_SENTINEL`]. The sentinel compares greater than any real price, so
//! every search terminates on a compare mask instead of a bounds test, and a
//! top-of-book mutation amortizes to roughly one vector load, one compare,
//! and one masked store.
//!
//! Lane order follows the side's sort order: ascending signed price, best at
//! the highest live lane, sentinels after. An insert shifts the suffix of
//! the side up one lane with a carry chained block to block; a removal
//! shifts it back down and re-pads the vacated lane with the sentinel.
//!
//! Everything here assumes AVX2 is present; callers gate construction on
//! `is_x86_feature_detected!("avx2")`.

use std::arch::x86_64::*;

use crate::engine::Book;
use crate::types::{InlineOrder, Side, SignedPrice};

/// Terminates sorted-array scans: compares greater than any real price
/// (magnitudes are capped one bit below it).
pub const PRICE_SENTINEL: i32 = 1 << 30;

const LANES: usize = 8;

/// One 256-bit row of eight 32-bit lanes, aligned for `_mm256_load_si256`.
#[derive(Clone, Copy)]
#[repr(C, align(32))]
struct Block([i32; LANES]);

/// One side's price and quantity lanes plus the live-lane count.
struct AlignedSide {
    prices: Vec<Block>,
    qtys: Vec<Block>,
    /// Number of live levels; lanes at and past this index hold the
    /// sentinel (prices) and zero (quantities).
    len: usize,
}

impl AlignedSide {
    fn new() -> Self {
        AlignedSide { prices: Vec::new(), qtys: Vec::new(), len: 0 }
    }

    /// Blocks containing at least one live lane.
    #[inline]
    fn data_blocks(&self) -> usize {
        self.len.div_ceil(LANES)
    }

    /// Grows the arrays so that an insert always finds a sentinel lane
    /// before running off the end: after the insert there must still be a
    /// sentinel beyond the last live lane.
    fn ensure_insert_capacity(&mut self) {
        let needed = (self.len + LANES + 1) / LANES;
        while self.prices.len() < needed {
            self.prices.push(Block([PRICE_SENTINEL; LANES]));
            self.qtys.push(Block([0; LANES]));
        }
    }

    #[inline]
    fn price_at(&self, pos: usize) -> i32 {
        self.prices[pos / LANES].0[pos % LANES]
    }

    #[inline]
    fn qty_at(&self, pos: usize) -> u32 {
        self.qtys[pos / LANES].0[pos % LANES] as u32
    }

    #[inline]
    fn set_price(&mut self, pos: usize, price: i32) {
        self.prices[pos / LANES].0[pos % LANES] = price;
    }

    #[inline]
    fn set_qty(&mut self, pos: usize, qty: u32) {
        self.qtys[pos / LANES].0[pos % LANES] = qty as i32;
    }
}

#[inline]
unsafe fn load(blocks: &[Block], idx: usize) -> __m256i {
    debug_assert!(idx < blocks.len());
    _mm256_load_si256(blocks.as_ptr().add(idx).cast())
}

#[inline]
unsafe fn store(blocks: &mut [Block], idx: usize, value: __m256i) {
    debug_assert!(idx < blocks.len());
    _mm256_store_si256(blocks.as_mut_ptr().add(idx).cast(), value)
}

/// One bit per lane, lane 0 in bit 0.
#[inline]
unsafe fn lane_mask(value: __m256i) -> u32 {
    _mm256_movemask_ps(_mm256_castsi256_ps(value)) as u32
}

/// Shift every lane one position up (toward higher indices), zero into lane 0.
#[target_feature(enable = "avx2")]
unsafe fn shift_lanes_up(value: __m256i) -> __m256i {
    let shifted = _mm256_permutevar8x32_epi32(value, _mm256_setr_epi32(0, 0, 1, 2, 3, 4, 5, 6));
    _mm256_blend_epi32::<0x01>(shifted, _mm256_setzero_si256())
}

/// Shift every lane one position down (toward lane 0), zero into lane 7.
#[target_feature(enable = "avx2")]
unsafe fn shift_lanes_down(value: __m256i) -> __m256i {
    let shifted = _mm256_permutevar8x32_epi32(value, _mm256_setr_epi32(1, 2, 3, 4, 5, 6, 7, 7));
    _mm256_blend_epi32::<0x80>(shifted, _mm256_setzero_si256())
}

/// Lane 7 broadcast to all lanes; the insert carry between blocks.
#[target_feature(enable = "avx2")]
unsafe fn broadcast_lane7(value: __m256i) -> __m256i {
    _mm256_permutevar8x32_epi32(value, _mm256_set1_epi32(7))
}

/// Lane 0 broadcast to all lanes; the removal carry between blocks.
#[target_feature(enable = "avx2")]
unsafe fn broadcast_lane0(value: __m256i) -> __m256i {
    _mm256_broadcastd_epi32(_mm256_castsi256_si128(value))
}

/// Find the block holding `price`, or on a miss the block holding its
/// insertion point. Starts at the caller's last-block hint and falls back to
/// a scan from block 0; the sentinel guarantees a `>` hit before the scan
/// runs off the end.
#[target_feature(enable = "avx2")]
unsafe fn search(side: &AlignedSide, price: i32, hint: usize) -> (bool, usize) {
    let query = _mm256_set1_epi32(price);
    if hint < side.data_blocks() {
        let block = load(&side.prices, hint);
        if lane_mask(_mm256_cmpeq_epi32(block, query)) != 0 {
            return (true, hint);
        }
    }
    let mut idx = 0;
    loop {
        debug_assert!(idx < side.prices.len());
        let block = load(&side.prices, idx);
        if lane_mask(_mm256_cmpeq_epi32(block, query)) != 0 {
            return (true, idx);
        }
        if lane_mask(_mm256_cmpgt_epi32(block, query)) != 0 {
            return (false, idx);
        }
        idx += 1;
    }
}

/// Find-or-insert for one add. Returns the block touched, for the hint.
#[target_feature(enable = "avx2")]
unsafe fn add_level(side: &mut AlignedSide, price: i32, qty: u32, hint: usize) -> usize {
    side.ensure_insert_capacity();
    let (found, blk) = search(side, price, hint);
    let query = _mm256_set1_epi32(price);

    if found {
        // Add qty in the matching lane only: mask-AND the broadcast qty,
        // then one vector add and store.
        let eq = _mm256_cmpeq_epi32(load(&side.prices, blk), query);
        let qtys = load(&side.qtys, blk);
        let qtys = _mm256_add_epi32(qtys, _mm256_and_si256(eq, _mm256_set1_epi32(qty as i32)));
        store(&mut side.qtys, blk, qtys);
        return blk;
    }

    // Miss: single-lane insert. Within the found block, lanes greater than
    // the query move up one lane; the XOR of the greater-mask with its own
    // up-shift is nonzero exactly at the transition lane, which takes the
    // new price and qty. The displaced lane 7 carries into the next block's
    // lane 0, and so on until the last block holding data.
    let prices = load(&side.prices, blk);
    let qtys = load(&side.qtys, blk);
    let gt = _mm256_cmpgt_epi32(prices, query);
    let insert_here = _mm256_xor_si256(gt, shift_lanes_up(gt));

    let mut out_p = _mm256_blendv_epi8(prices, shift_lanes_up(prices), gt);
    out_p = _mm256_blendv_epi8(out_p, query, insert_here);
    let mut out_q = _mm256_blendv_epi8(qtys, shift_lanes_up(qtys), gt);
    out_q = _mm256_blendv_epi8(out_q, _mm256_set1_epi32(qty as i32), insert_here);

    let mut carry_p = broadcast_lane7(prices);
    let mut carry_q = broadcast_lane7(qtys);
    store(&mut side.prices, blk, out_p);
    store(&mut side.qtys, blk, out_q);

    let last = side.len / LANES;
    for b in (blk + 1)..=last {
        let next_p = load(&side.prices, b);
        let next_q = load(&side.qtys, b);
        store(&mut side.prices, b, _mm256_blend_epi32::<0x01>(shift_lanes_up(next_p), carry_p));
        store(&mut side.qtys, b, _mm256_blend_epi32::<0x01>(shift_lanes_up(next_q), carry_q));
        carry_p = broadcast_lane7(next_p);
        carry_q = broadcast_lane7(next_q);
    }
    side.len += 1;
    blk
}

/// Linear block scan for the level holding `price`; returns the block index
/// and its equality mask. The level is known to exist.
#[target_feature(enable = "avx2")]
unsafe fn find_level(side: &AlignedSide, price: i32) -> (usize, __m256i) {
    let query = _mm256_set1_epi32(price);
    let mut idx = 0;
    loop {
        debug_assert!(idx < side.data_blocks(), "level {price} not resting on this side");
        let eq = _mm256_cmpeq_epi32(load(&side.prices, idx), query);
        if lane_mask(eq) != 0 {
            return (idx, eq);
        }
        idx += 1;
    }
}

/// Subtract `qty` at `price`, in the matching lane only.
#[target_feature(enable = "avx2")]
unsafe fn reduce_level(side: &mut AlignedSide, price: i32, qty: u32) {
    let (blk, eq) = find_level(side, price);
    let qtys = load(&side.qtys, blk);
    let qtys = _mm256_sub_epi32(qtys, _mm256_and_si256(eq, _mm256_set1_epi32(qty as i32)));
    store(&mut side.qtys, blk, qtys);
}

/// Subtract an order's remaining `qty` at `price`; if that empties the
/// level, close the hole by shifting the rest of the side down one lane and
/// re-pad the vacated lane with the sentinel.
#[target_feature(enable = "avx2")]
unsafe fn remove_level(side: &mut AlignedSide, price: i32, qty: u32) {
    let (blk, eq) = find_level(side, price);
    let lane = lane_mask(eq).trailing_zeros() as usize;
    let pos = blk * LANES + lane;
    debug_assert!(side.qty_at(pos) >= qty);

    let qtys = load(&side.qtys, blk);
    let qtys = _mm256_sub_epi32(qtys, _mm256_and_si256(eq, _mm256_set1_epi32(qty as i32)));
    store(&mut side.qtys, blk, qtys);
    if side.qty_at(pos) != 0 {
        return;
    }

    // The >= mask covers the emptied lane and every lane above it; those
    // take their upper neighbor's value. The chain pulls each following
    // block's lane 0 into the previous block's lane 7 and shifts the block
    // down, through the last block holding data.
    let query = _mm256_set1_epi32(price);
    let prices = load(&side.prices, blk);
    let qtys = load(&side.qtys, blk);
    let ge = _mm256_or_si256(eq, _mm256_cmpgt_epi32(prices, query));
    let mut out_p = _mm256_blendv_epi8(prices, shift_lanes_down(prices), ge);
    let mut out_q = _mm256_blendv_epi8(qtys, shift_lanes_down(qtys), ge);

    let last = (side.len - 1) / LANES;
    for b in (blk + 1)..=last {
        let next_p = load(&side.prices, b);
        let next_q = load(&side.qtys, b);
        store(&mut side.prices, b - 1, _mm256_blend_epi32::<0x80>(out_p, broadcast_lane0(next_p)));
        store(&mut side.qtys, b - 1, _mm256_blend_epi32::<0x80>(out_q, broadcast_lane0(next_q)));
        out_p = shift_lanes_down(next_p);
        out_q = shift_lanes_down(next_q);
    }
    store(&mut side.prices, last, out_p);
    store(&mut side.qtys, last, out_q);

    // Two lanes of the last block need re-padding: the vacated global slot,
    // and lane 7, where the down-shift fed in a literal zero (zero would
    // otherwise read back as a valid bid price). Both sit past the new end.
    side.set_price(side.len - 1, PRICE_SENTINEL);
    side.set_qty(side.len - 1, 0);
    side.set_price(last * LANES + LANES - 1, PRICE_SENTINEL);
    side.set_qty(last * LANES + LANES - 1, 0);
    side.len -= 1;
}

pub struct Avx2Book {
    bid: AlignedSide,
    ask: AlignedSide,
    /// Block index of the last search hit; checked first on the next add.
    last_block: usize,
}

impl Default for Avx2Book {
    fn default() -> Self {
        Avx2Book { bid: AlignedSide::new(), ask: AlignedSide::new(), last_block: 0 }
    }
}

impl Avx2Book {
    fn side(&self, side: Side) -> &AlignedSide {
        match side {
            Side::Bid => &self.bid,
            Side::Ask => &self.ask,
        }
    }
}

impl Book for Avx2Book {
    type Order = InlineOrder;
    type Shared = ();

    fn add(&mut self, _: &mut (), order: &mut InlineOrder, price: SignedPrice, qty: u32) {
        debug_assert_eq!(order.price, price);
        let side = if price.is_bid() { &mut self.bid } else { &mut self.ask };
        // Safety: engine construction is gated on AVX2 detection.
        self.last_block = unsafe { add_level(side, price.0, qty, self.last_block) };
    }

    fn reduce(&mut self, _: &mut (), order: &mut InlineOrder, qty: u32) {
        debug_assert!(qty <= order.qty);
        let side = if order.price.is_bid() { &mut self.bid } else { &mut self.ask };
        unsafe { reduce_level(side, order.price.0, qty) };
        order.qty -= qty;
    }

    fn remove(&mut self, _: &mut (), order: &InlineOrder) {
        let side = if order.price.is_bid() { &mut self.bid } else { &mut self.ask };
        unsafe { remove_level(side, order.price.0, order.qty) };
    }

    fn order_is_bid(&self, _: &(), order: &InlineOrder) -> bool {
        order.price.is_bid()
    }

    fn order_level_qty(&self, _: &(), order: &InlineOrder) -> u32 {
        let side = self.side(order.price.side());
        (0..side.len)
            .find(|&pos| side.price_at(pos) == order.price.0)
            .map(|pos| side.qty_at(pos))
            .unwrap_or(0)
    }

    fn best(&self, _: &(), side: Side) -> Option<(SignedPrice, u32)> {
        let side = self.side(side);
        if side.len == 0 {
            return None;
        }
        Some((SignedPrice(side.price_at(side.len - 1)), side.qty_at(side.len - 1)))
    }

    fn depth(&self, _: &(), side: Side, k: usize) -> Vec<(SignedPrice, u32)> {
        let side = self.side(side);
        (0..side.len)
            .rev()
            .take(k)
            .map(|pos| (SignedPrice(side.price_at(pos)), side.qty_at(pos)))
            .collect()
    }
}
