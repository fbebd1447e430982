//! End-to-end book scenarios, run against every variant.
//!
//! Snapshots from `Engine::levels` are best-first, so expected sequences
//! read top-of-book outward (strictly descending signed price).

use orderbook::{
    Book, BookId, Engine, EngineConfig, LevelPool, OrderId, ScalarBook, Side, SignedPrice,
    SoaBook, SoaPriceBook,
};

fn config() -> EngineConfig {
    EngineConfig {
        max_books: 4,
        level_pool_capacity: 32,
        order_capacity: 128,
    }
}

fn px(p: i32) -> SignedPrice {
    SignedPrice(p)
}

/// Instantiates `check` for every variant buildable on this machine.
macro_rules! all_variants {
    ($check:ident) => {
        $check::<ScalarBook>();
        $check::<SoaBook>();
        $check::<SoaPriceBook>();
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") {
                $check::<orderbook::Avx2Book>();
            }
        }
    };
}

#[test]
fn top_of_book_growth_and_full_execute() {
    fn check<B: Book>() {
        let mut engine = Engine::<B>::new(config());
        let book = BookId(0);

        engine.add_order(OrderId(1), book, px(10_000), 100);
        assert_eq!(engine.levels(book, Side::Bid), vec![(px(10_000), 100)]);

        engine.add_order(OrderId(2), book, px(10_100), 200);
        assert_eq!(
            engine.levels(book, Side::Bid),
            vec![(px(10_100), 200), (px(10_000), 100)]
        );

        engine.add_order(OrderId(3), book, px(10_050), 150);
        assert_eq!(
            engine.levels(book, Side::Bid),
            vec![(px(10_100), 200), (px(10_050), 150), (px(10_000), 100)]
        );

        engine.execute_order(OrderId(2), 200);
        assert_eq!(
            engine.levels(book, Side::Bid),
            vec![(px(10_050), 150), (px(10_000), 100)]
        );
        assert_eq!(engine.best(book, Side::Bid), Some((px(10_050), 150)));
        assert!(engine.levels(book, Side::Ask).is_empty());
    }
    all_variants!(check);
}

#[test]
fn partial_reduce_preserves_the_level() {
    fn check<B: Book>() {
        let mut engine = Engine::<B>::new(config());
        let book = BookId(0);
        engine.add_order(OrderId(1), book, px(10_000), 500);
        engine.cancel_order(OrderId(1), 200);

        assert_eq!(engine.levels(book, Side::Bid), vec![(px(10_000), 300)]);
        assert_eq!(engine.order_qty(OrderId(1)), 300);
    }
    all_variants!(check);
}

#[test]
fn deletes_empty_the_book() {
    fn check<B: Book>() {
        let mut engine = Engine::<B>::new(config());
        let book = BookId(0);
        engine.add_order(OrderId(1), book, px(10_000), 100);
        engine.add_order(OrderId(2), book, px(10_100), 200);
        engine.add_order(OrderId(3), book, px(10_050), 150);
        engine.execute_order(OrderId(2), 200);
        engine.delete_order(OrderId(3));
        engine.delete_order(OrderId(1));

        assert!(engine.levels(book, Side::Bid).is_empty());
        assert!(engine.levels(book, Side::Ask).is_empty());
        assert_eq!(engine.best(book, Side::Bid), None);
    }
    all_variants!(check);
}

/// Pooled variants return every emptied level's index to the free list.
#[test]
fn pooled_levels_return_to_the_free_list() {
    fn check<B: Book<Shared = LevelPool>>() {
        let mut engine = Engine::<B>::new(config());
        let book = BookId(0);
        engine.add_order(OrderId(1), book, px(10_000), 100);
        engine.add_order(OrderId(2), book, px(10_100), 200);
        engine.add_order(OrderId(3), book, px(10_050), 150);
        engine.execute_order(OrderId(2), 200);
        engine.delete_order(OrderId(3));
        engine.delete_order(OrderId(1));

        assert_eq!(engine.shared().allocated(), 3);
        assert_eq!(engine.shared().free_list().len(), 3);
    }
    check::<ScalarBook>();
    check::<SoaBook>();
}

#[test]
fn replace_changes_price_and_preserves_side() {
    fn check<B: Book>() {
        let mut engine = Engine::<B>::new(config());
        let book = BookId(0);
        engine.add_order(OrderId(10), book, px(-10_500), 400);
        engine.replace_order(OrderId(10), OrderId(11), 300, 10_400);

        assert_eq!(engine.levels(book, Side::Ask), vec![(px(-10_400), 300)]);
        assert!(engine.levels(book, Side::Bid).is_empty());
        assert_eq!(engine.order_qty(OrderId(11)), 300);
    }
    all_variants!(check);
}

#[test]
fn add_then_delete_restores_the_book() {
    fn check<B: Book>() {
        let mut engine = Engine::<B>::new(config());
        let book = BookId(0);
        engine.add_order(OrderId(1), book, px(10_000), 100);
        engine.add_order(OrderId(2), book, px(-10_200), 80);
        let bid_before = engine.levels(book, Side::Bid);
        let ask_before = engine.levels(book, Side::Ask);

        // At an existing price and at a fresh price, on both sides.
        for (oid, price) in [(3, 10_000), (4, 10_050), (5, -10_200), (6, -10_150)] {
            engine.add_order(OrderId(oid), book, px(price), 33);
            engine.delete_order(OrderId(oid));
            assert_eq!(engine.levels(book, Side::Bid), bid_before);
            assert_eq!(engine.levels(book, Side::Ask), ask_before);
        }
    }
    all_variants!(check);
}

#[test]
fn full_execute_equals_delete() {
    fn check<B: Book>() {
        let mut executed = Engine::<B>::new(config());
        let mut deleted = Engine::<B>::new(config());
        for engine in [&mut executed, &mut deleted] {
            engine.add_order(OrderId(1), BookId(0), px(10_000), 100);
            engine.add_order(OrderId(2), BookId(0), px(10_050), 60);
            engine.add_order(OrderId(3), BookId(0), px(-10_100), 40);
        }
        executed.execute_order(OrderId(2), 60);
        deleted.delete_order(OrderId(2));

        for side in [Side::Bid, Side::Ask] {
            assert_eq!(executed.levels(BookId(0), side), deleted.levels(BookId(0), side));
        }
    }
    all_variants!(check);
}

#[test]
fn replace_equals_delete_then_add() {
    fn check<B: Book>() {
        let mut replaced = Engine::<B>::new(config());
        let mut manual = Engine::<B>::new(config());
        for engine in [&mut replaced, &mut manual] {
            engine.add_order(OrderId(1), BookId(0), px(-10_500), 400);
            engine.add_order(OrderId(2), BookId(0), px(-10_450), 90);
        }
        replaced.replace_order(OrderId(1), OrderId(3), 300, 10_400);
        manual.delete_order(OrderId(1));
        manual.add_order(OrderId(3), BookId(0), px(-10_400), 300);

        for side in [Side::Bid, Side::Ask] {
            assert_eq!(replaced.levels(BookId(0), side), manual.levels(BookId(0), side));
        }
    }
    all_variants!(check);
}

#[test]
fn boundary_inserts_land_at_the_extremes() {
    fn check<B: Book>() {
        let mut engine = Engine::<B>::new(config());
        let book = BookId(0);
        engine.add_order(OrderId(1), book, px(10_000), 10);
        engine.add_order(OrderId(2), book, px(10_050), 20);
        // Strictly greater than every bid: becomes the new best.
        engine.add_order(OrderId(3), book, px(10_100), 30);
        // Strictly less than every bid: becomes the new worst.
        engine.add_order(OrderId(4), book, px(9_900), 40);

        let levels = engine.levels(book, Side::Bid);
        assert_eq!(levels.first(), Some(&(px(10_100), 30)));
        assert_eq!(levels.last(), Some(&(px(9_900), 40)));
        // Strictly descending signed price throughout.
        for pair in levels.windows(2) {
            assert!(pair[0].0 > pair[1].0);
        }
        // Depth is the best-first prefix of the full snapshot.
        assert_eq!(engine.depth(book, Side::Bid, 2), levels[..2].to_vec());
    }
    all_variants!(check);
}
