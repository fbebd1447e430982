//! Price-only SoA book: levels held inline as parallel `(price, qty)` vectors.
//!
//! No level pool and no indirection: the order record carries its signed
//! price, and reduce/remove find the level by scanning the side for that
//! price. This trades a pointer chase per mutation for a short scan that
//! stays inside two dense arrays.

use crate::engine::Book;
use crate::types::{InlineOrder, Side, SignedPrice};

#[derive(Default)]
pub struct SoaPriceBook {
    bid_prices: Vec<SignedPrice>,
    ask_prices: Vec<SignedPrice>,
    bid_qtys: Vec<u32>,
    ask_qtys: Vec<u32>,
}

impl SoaPriceBook {
    fn side(&self, side: Side) -> (&[SignedPrice], &[u32]) {
        match side {
            Side::Bid => (&self.bid_prices, &self.bid_qtys),
            Side::Ask => (&self.ask_prices, &self.ask_qtys),
        }
    }

    fn side_mut(&mut self, side: Side) -> (&mut Vec<SignedPrice>, &mut Vec<u32>) {
        match side {
            Side::Bid => (&mut self.bid_prices, &mut self.bid_qtys),
            Side::Ask => (&mut self.ask_prices, &mut self.ask_qtys),
        }
    }
}

impl Book for SoaPriceBook {
    type Order = InlineOrder;
    type Shared = ();

    fn add(&mut self, _: &mut (), order: &mut InlineOrder, price: SignedPrice, qty: u32) {
        debug_assert_eq!(order.price, price);
        let (prices, qtys) = self.side_mut(price.side());

        let mut idx = prices.len();
        while idx > 0 {
            let cur = prices[idx - 1];
            if cur == price {
                qtys[idx - 1] += qty;
                return;
            }
            if price > cur {
                break;
            }
            idx -= 1;
        }
        prices.insert(idx, price);
        qtys.insert(idx, qty);
    }

    fn reduce(&mut self, _: &mut (), order: &mut InlineOrder, qty: u32) {
        debug_assert!(qty <= order.qty);
        let (prices, qtys) = self.side_mut(order.price.side());
        let idx = prices
            .iter()
            .rposition(|&p| p == order.price)
            .expect("reduce targets a resting level");
        qtys[idx] -= qty;
        order.qty -= qty;
    }

    fn remove(&mut self, _: &mut (), order: &InlineOrder) {
        let (prices, qtys) = self.side_mut(order.price.side());
        let idx = prices
            .iter()
            .rposition(|&p| p == order.price)
            .expect("remove targets a resting level");
        debug_assert!(qtys[idx] >= order.qty);
        qtys[idx] -= order.qty;
        if qtys[idx] == 0 {
            prices.remove(idx);
            qtys.remove(idx);
        }
    }

    fn order_is_bid(&self, _: &(), order: &InlineOrder) -> bool {
        order.price.is_bid()
    }

    fn order_level_qty(&self, _: &(), order: &InlineOrder) -> u32 {
        let (prices, qtys) = self.side(order.price.side());
        prices
            .iter()
            .rposition(|&p| p == order.price)
            .map(|idx| qtys[idx])
            .unwrap_or(0)
    }

    fn best(&self, _: &(), side: Side) -> Option<(SignedPrice, u32)> {
        let (prices, qtys) = self.side(side);
        match (prices.last(), qtys.last()) {
            (Some(&price), Some(&qty)) => Some((price, qty)),
            _ => None,
        }
    }

    fn depth(&self, _: &(), side: Side, k: usize) -> Vec<(SignedPrice, u32)> {
        let (prices, qtys) = self.side(side);
        prices.iter().zip(qtys).rev().take(k).map(|(&p, &q)| (p, q)).collect()
    }
}
