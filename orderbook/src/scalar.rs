//! Scalar reference book: interleaved `(price, level)` pairs per side.
//!
//! This is the baseline the other variants are measured (and cross-checked)
//! against. Each side is a single vector of price/level-index pairs in
//! ascending signed-price order, so the best price sits at the tail. Level
//! storage lives in the engine's shared pool; the vector only holds
//! indirection handles.

use crate::engine::Book;
use crate::pool::LevelPool;
use crate::types::{LevelId, PooledOrder, Side, SignedPrice};

/// One sorted-array entry: a price and the pool index of its level.
#[derive(Clone, Copy, Debug)]
pub struct PriceLevelRef {
    pub price: SignedPrice,
    pub level: LevelId,
}

#[derive(Default)]
pub struct ScalarBook {
    bids: Vec<PriceLevelRef>,
    asks: Vec<PriceLevelRef>,
}

impl ScalarBook {
    fn side(&self, side: Side) -> &Vec<PriceLevelRef> {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut Vec<PriceLevelRef> {
        match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        }
    }
}

impl Book for ScalarBook {
    type Order = PooledOrder;
    type Shared = LevelPool;

    fn add(&mut self, pool: &mut LevelPool, order: &mut PooledOrder, price: SignedPrice, qty: u32) {
        let levels = self.side_mut(price.side());

        // Search downward from the tail; activity concentrates at the top of
        // book, so the expected scan depth is 1-5 entries.
        let mut idx = levels.len();
        let mut found = false;
        while idx > 0 {
            let cur = levels[idx - 1];
            if cur.price == price {
                order.level = cur.level;
                found = true;
                break;
            }
            if price > cur.price {
                // Walked past the slot: price belongs right after this entry.
                break;
            }
            idx -= 1;
        }
        if !found {
            order.level = pool.alloc();
            let level = pool.get_mut(order.level);
            level.price = price;
            level.qty = 0;
            levels.insert(idx, PriceLevelRef { price, level: order.level });
        }
        pool.get_mut(order.level).qty += qty;
    }

    fn reduce(&mut self, pool: &mut LevelPool, order: &mut PooledOrder, qty: u32) {
        debug_assert!(qty <= order.qty);
        pool.get_mut(order.level).qty -= qty;
        order.qty -= qty;
    }

    fn remove(&mut self, pool: &mut LevelPool, order: &PooledOrder) {
        let level = pool.get_mut(order.level);
        debug_assert!(level.qty >= order.qty);
        level.qty -= order.qty;
        if level.qty == 0 {
            let price = level.price;
            let levels = self.side_mut(price.side());
            let mut idx = levels.len();
            while idx > 0 {
                idx -= 1;
                if levels[idx].price == price {
                    levels.remove(idx);
                    break;
                }
            }
            pool.free(order.level);
        }
    }

    fn order_is_bid(&self, pool: &LevelPool, order: &PooledOrder) -> bool {
        pool.get(order.level).price.is_bid()
    }

    fn order_level_qty(&self, pool: &LevelPool, order: &PooledOrder) -> u32 {
        pool.get(order.level).qty
    }

    fn best(&self, pool: &LevelPool, side: Side) -> Option<(SignedPrice, u32)> {
        self.side(side)
            .last()
            .map(|entry| (entry.price, pool.get(entry.level).qty))
    }

    fn depth(&self, pool: &LevelPool, side: Side, k: usize) -> Vec<(SignedPrice, u32)> {
        self.side(side)
            .iter()
            .rev()
            .take(k)
            .map(|entry| (entry.price, pool.get(entry.level).qty))
            .collect()
    }
}
