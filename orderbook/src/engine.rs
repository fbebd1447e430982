//! Engine façade: order lookup, per-symbol dispatch, and the observers.
//!
//! The engine owns all process-wide state (the book array, the order map,
//! and the level pool where a variant uses one) and exposes the five feed
//! operations. Replace is encoded as delete + add: ITCH retires the old
//! order id and transmits only the magnitude of the new price, with the side
//! inherited from the replaced order.

use tracing::trace;

use crate::pool::{LevelPool, OidMap};
use crate::types::{BookId, OrderId, OrderRec, Side, SignedPrice};

/// Pre-reservation knobs. The defaults reproduce the constants the backtest
/// was tuned with: 2^14 books, 2^20 pooled levels, and an order-map capacity
/// of twice the largest order id observed in a full NASDAQ session.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    /// Number of books addressable by stock locate.
    pub max_books: usize,
    /// Slot reservation for the shared level pool (pooled variants only).
    pub level_pool_capacity: usize,
    /// Slot reservation for the order map.
    pub order_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_books: 1 << 14,
            level_pool_capacity: 1 << 20,
            order_capacity: 2 * 184_118_975,
        }
    }
}

/// State shared across every book of an engine: the level pool for the
/// pooled variants, nothing for the inline ones.
pub trait SharedState {
    fn with_config(config: &EngineConfig) -> Self;
}

impl SharedState for () {
    fn with_config(_config: &EngineConfig) -> Self {}
}

impl SharedState for LevelPool {
    fn with_config(config: &EngineConfig) -> Self {
        LevelPool::with_capacity(config.level_pool_capacity)
    }
}

/// One per-symbol limit order book.
///
/// The four implementations share this contract and produce identical
/// results; they differ only in data layout and in how the sorted per-side
/// price arrays are searched and edited. Mutations never match orders: the
/// feed reports the results of external matching, so the book only tracks
/// aggregate resting quantity per price.
pub trait Book: Default {
    /// Per-order metadata shape for this variant.
    type Order: OrderRec;
    /// Engine-owned state shared across all books of this variant.
    type Shared: SharedState;

    /// Add `qty` at `price`, creating the level at its sorted position if it
    /// does not exist. Fills in the order's level reference where the
    /// variant keeps one.
    fn add(&mut self, shared: &mut Self::Shared, order: &mut Self::Order, price: SignedPrice, qty: u32);

    /// Subtract `qty` from the order and its level. The feed guarantees
    /// `qty <= order.qty`.
    fn reduce(&mut self, shared: &mut Self::Shared, order: &mut Self::Order, qty: u32);

    /// Remove the order's remaining quantity; if the level's aggregate hits
    /// zero, drop the level from its side.
    fn remove(&mut self, shared: &mut Self::Shared, order: &Self::Order);

    /// Side of the order's resting level, recovered without a price search.
    fn order_is_bid(&self, shared: &Self::Shared, order: &Self::Order) -> bool;

    /// Aggregate quantity at the order's level.
    fn order_level_qty(&self, shared: &Self::Shared, order: &Self::Order) -> u32;

    /// Best price and aggregate quantity on `side`. O(1).
    fn best(&self, shared: &Self::Shared, side: Side) -> Option<(SignedPrice, u32)>;

    /// Top `k` levels of `side`, best price first. O(k).
    fn depth(&self, shared: &Self::Shared, side: Side, k: usize) -> Vec<(SignedPrice, u32)>;

    /// Full `(price, qty)` snapshot of `side`, best price first.
    fn side_levels(&self, shared: &Self::Shared, side: Side) -> Vec<(SignedPrice, u32)> {
        self.depth(shared, side, usize::MAX)
    }
}

/// The engine: books, order map, shared pool, and observers.
pub struct Engine<B: Book> {
    books: Vec<B>,
    orders: OidMap<B::Order>,
    shared: B::Shared,
    #[cfg(feature = "cross-check")]
    reference: Option<Box<Engine<crate::scalar::ScalarBook>>>,
}

impl<B: Book> Engine<B> {
    pub fn new(config: EngineConfig) -> Self {
        let mut books = Vec::new();
        books.resize_with(config.max_books, B::default);
        Engine {
            books,
            orders: OidMap::with_capacity(config.order_capacity),
            shared: B::Shared::with_config(&config),
            #[cfg(feature = "cross-check")]
            reference: None,
        }
    }

    /// Runs a reference scalar engine in lockstep and asserts, after every
    /// mutation, that the touched book's per-side `(price, qty)` sequences
    /// agree. Development only; panics on divergence.
    #[cfg(feature = "cross-check")]
    pub fn with_cross_check(config: EngineConfig) -> Self {
        let mut engine = Engine::new(config);
        engine.reference = Some(Box::new(Engine::new(config)));
        engine
    }

    pub fn add_order(&mut self, oid: OrderId, book: BookId, price: SignedPrice, qty: u32) {
        debug_assert!(qty > 0);
        self.orders.reserve(oid);
        let order = self.orders.get_mut(oid);
        *order = B::Order::new(book, price, qty);
        let b = &mut self.books[book.index()];
        b.add(&mut self.shared, order, price, qty);
        trace!(
            oid = oid.0,
            book = book.0,
            price = price.0,
            qty,
            level_qty = b.order_level_qty(&self.shared, order),
            "add"
        );
        self.mirror(book, |r| r.add_order(oid, book, price, qty));
    }

    pub fn delete_order(&mut self, oid: OrderId) {
        trace!(oid = oid.0, "delete");
        let order = self.orders.get(oid);
        let book = order.book();
        self.books[book.index()].remove(&mut self.shared, order);
        self.mirror(book, |r| r.delete_order(oid));
    }

    /// Partial cancel: reduce the order in place by `qty`.
    pub fn cancel_order(&mut self, oid: OrderId, qty: u32) {
        trace!(oid = oid.0, qty, "reduce");
        let order = self.orders.get_mut(oid);
        let book = order.book();
        self.books[book.index()].reduce(&mut self.shared, order, qty);
        self.mirror(book, |r| r.cancel_order(oid, qty));
    }

    /// Execution against a resting order: a full fill deletes it, a partial
    /// fill reduces it.
    pub fn execute_order(&mut self, oid: OrderId, qty: u32) {
        trace!(oid = oid.0, qty, "execute");
        let order = self.orders.get_mut(oid);
        let book = order.book();
        let b = &mut self.books[book.index()];
        if qty == order.qty() {
            b.remove(&mut self.shared, order);
        } else {
            b.reduce(&mut self.shared, order, qty);
        }
        self.mirror(book, |r| r.execute_order(oid, qty));
    }

    /// Delete `old` and add `new` at `new_price_magnitude` on the same side.
    ///
    /// The side is read from the old order before the delete and the new
    /// price is signed exactly once, here.
    pub fn replace_order(
        &mut self,
        old: OrderId,
        new: OrderId,
        new_qty: u32,
        new_price_magnitude: u32,
    ) {
        trace!(
            old = old.0,
            new = new.0,
            qty = new_qty,
            price = new_price_magnitude,
            "replace"
        );
        let order = self.orders.get(old);
        let book = order.book();
        let side = if self.books[book.index()].order_is_bid(&self.shared, order) {
            Side::Bid
        } else {
            Side::Ask
        };
        self.delete_order(old);
        self.add_order(new, book, SignedPrice::new(new_price_magnitude, side), new_qty);
    }

    /// Best price and aggregate quantity on one side of one book.
    pub fn best(&self, book: BookId, side: Side) -> Option<(SignedPrice, u32)> {
        self.books[book.index()].best(&self.shared, side)
    }

    /// Top `k` levels of one side, best first.
    pub fn depth(&self, book: BookId, side: Side, k: usize) -> Vec<(SignedPrice, u32)> {
        self.books[book.index()].depth(&self.shared, side, k)
    }

    /// Full snapshot of one side, best first.
    pub fn levels(&self, book: BookId, side: Side) -> Vec<(SignedPrice, u32)> {
        self.books[book.index()].side_levels(&self.shared, side)
    }

    /// Remaining quantity of a live order.
    pub fn order_qty(&self, oid: OrderId) -> u32 {
        self.orders.get(oid).qty()
    }

    /// Direct access to the shared state (the level pool for pooled
    /// variants), for inspection in tests and tools.
    pub fn shared(&self) -> &B::Shared {
        &self.shared
    }

    #[cfg(test)]
    pub(crate) fn book_for_test(&self, book: BookId) -> &B {
        &self.books[book.index()]
    }

    #[cfg(feature = "cross-check")]
    fn mirror(&mut self, book: BookId, op: impl FnOnce(&mut Engine<crate::scalar::ScalarBook>)) {
        let Some(mut reference) = self.reference.take() else {
            return;
        };
        op(&mut reference);
        for side in [Side::Bid, Side::Ask] {
            let ours = self.levels(book, side);
            let theirs = reference.levels(book, side);
            if ours != theirs {
                eprintln!("cross-check failed on book {} {:?}", book.0, side);
                eprintln!("reference: {theirs:?}");
                eprintln!("this book: {ours:?}");
                panic!("cross-check divergence");
            }
        }
        self.reference = Some(reference);
    }

    #[cfg(not(feature = "cross-check"))]
    #[inline(always)]
    fn mirror(&mut self, _book: BookId, _op: impl FnOnce(&mut Engine<crate::scalar::ScalarBook>)) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarBook;

    fn small() -> EngineConfig {
        EngineConfig {
            max_books: 4,
            level_pool_capacity: 16,
            order_capacity: 64,
        }
    }

    #[test]
    fn execute_routes_full_fill_to_delete() {
        let mut engine = Engine::<ScalarBook>::new(small());
        let book = BookId(0);
        engine.add_order(OrderId(1), book, SignedPrice(10_000), 100);
        engine.add_order(OrderId(2), book, SignedPrice(10_000), 50);

        // Partial fill keeps the level, reduced.
        engine.execute_order(OrderId(1), 40);
        assert_eq!(engine.levels(book, Side::Bid), vec![(SignedPrice(10_000), 110)]);
        assert_eq!(engine.order_qty(OrderId(1)), 60);

        // Full fills drain and then drop the level.
        engine.execute_order(OrderId(1), 60);
        engine.execute_order(OrderId(2), 50);
        assert!(engine.levels(book, Side::Bid).is_empty());
    }

    #[test]
    fn replace_preserves_side_and_resigns_once() {
        let mut engine = Engine::<ScalarBook>::new(small());
        let book = BookId(1);
        engine.add_order(OrderId(10), book, SignedPrice(-10_500), 400);
        engine.replace_order(OrderId(10), OrderId(11), 300, 10_400);

        assert_eq!(engine.levels(book, Side::Ask), vec![(SignedPrice(-10_400), 300)]);
        assert!(engine.levels(book, Side::Bid).is_empty());
        assert_eq!(engine.order_qty(OrderId(11)), 300);
    }

    #[test]
    fn books_are_independent() {
        let mut engine = Engine::<ScalarBook>::new(small());
        engine.add_order(OrderId(1), BookId(0), SignedPrice(10_000), 100);
        engine.add_order(OrderId(2), BookId(2), SignedPrice(10_000), 200);

        assert_eq!(engine.best(BookId(0), Side::Bid), Some((SignedPrice(10_000), 100)));
        assert_eq!(engine.best(BookId(2), Side::Bid), Some((SignedPrice(10_000), 200)));
        assert_eq!(engine.best(BookId(1), Side::Bid), None);
    }

    #[cfg(feature = "cross-check")]
    #[test]
    fn cross_check_accepts_matching_mutations() {
        let mut engine = Engine::<crate::soa::SoaBook>::with_cross_check(small());
        let book = BookId(0);
        engine.add_order(OrderId(1), book, SignedPrice(10_000), 100);
        engine.add_order(OrderId(2), book, SignedPrice(-10_100), 50);
        engine.cancel_order(OrderId(1), 30);
        engine.delete_order(OrderId(2));
        engine.delete_order(OrderId(1));
    }
}
