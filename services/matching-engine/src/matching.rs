//! Price-time priority match loop
//!
//! Matches run book-vs-book: while the top bid price is at or above
//! the top ask price, the front entries of both best levels trade at
//! the maker's price. The maker is the entry that arrived first
//! (smaller `seq`).
//!
//! Each proposed match is settled through [`SettlementPort`] before
//! the book is touched. A settlement failure aborts the pass with the
//! book exactly as it was before the failed match; fills already
//! settled in the same pass stand.

use tracing::error;
use types::errors::SettlementError;
use types::ids::{MarketId, OrderId, OwnerId};
use types::numeric::{Price, Quantity};
use types::order::Side;

use crate::book::OrderBook;

/// One proposed fill between a resting maker and a taker
#[derive(Debug, Clone, PartialEq)]
pub struct MatchProposal {
    pub symbol: MarketId,
    pub price: Price,
    pub quantity: Quantity,
    pub maker_id: OwnerId,
    pub taker_id: OwnerId,
    pub maker_order_id: OrderId,
    pub taker_order_id: OrderId,
}

/// Moves funds for a proposed match before the book commits it
///
/// Implementations must be atomic: either all fund movements of the
/// proposal apply, or none do.
pub trait SettlementPort {
    fn settle(&self, proposal: &MatchProposal) -> Result<(), SettlementError>;
}

/// Result of one match pass over a symbol
#[derive(Debug)]
pub struct MatchOutcome {
    /// Fills settled and committed to the book, in execution order
    pub executed: Vec<MatchProposal>,
    /// Set when the pass stopped on a settlement failure
    pub aborted: Option<SettlementError>,
}

impl MatchOutcome {
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }
}

/// Run the match loop for one symbol until the book no longer crosses
pub fn match_symbol(book: &mut OrderBook, port: &dyn SettlementPort) -> MatchOutcome {
    let mut executed = Vec::new();

    loop {
        let (Some(bid_price), Some(ask_price)) = (book.best_bid(), book.best_ask()) else {
            break;
        };
        if bid_price < ask_price {
            break;
        }

        let bid = *book
            .bids
            .best_level()
            .and_then(|(_, level)| level.peek_front())
            .expect("non-empty best bid level");
        let ask = *book
            .asks
            .best_level()
            .and_then(|(_, level)| level.peek_front())
            .expect("non-empty best ask level");

        // The earlier arrival is the maker and sets the price.
        let (price, maker, taker) = if bid.seq < ask.seq {
            (bid_price, bid, ask)
        } else {
            (ask_price, ask, bid)
        };
        let quantity = bid.remaining.min(ask.remaining);

        let proposal = MatchProposal {
            symbol: book.symbol().clone(),
            price,
            quantity,
            maker_id: maker.owner_id,
            taker_id: taker.owner_id,
            maker_order_id: maker.order_id,
            taker_order_id: taker.order_id,
        };

        if let Err(err) = port.settle(&proposal) {
            error!(
                symbol = %proposal.symbol,
                maker_order = %proposal.maker_order_id,
                taker_order = %proposal.taker_order_id,
                %err,
                "settlement failed, match pass aborted"
            );
            return MatchOutcome {
                executed,
                aborted: Some(err),
            };
        }

        book.fill_best(Side::Buy, bid_price, bid.order_id, quantity);
        book.fill_best(Side::Sell, ask_price, ask.order_id, quantity);
        executed.push(proposal);
    }

    MatchOutcome {
        executed,
        aborted: None,
    }
}

/// Sweep the opposite side for a market order
///
/// The taker never rests in the book; each fill executes at the
/// resting entry's price. The sweep ends when `quantity` is filled,
/// the opposite side empties, or settlement fails.
pub fn match_market(
    book: &mut OrderBook,
    side: Side,
    taker_order_id: OrderId,
    taker_id: OwnerId,
    quantity: Quantity,
    port: &dyn SettlementPort,
) -> MatchOutcome {
    let mut executed = Vec::new();
    let mut remaining = quantity;

    while !remaining.is_zero() {
        let resting = match side {
            Side::Buy => book
                .asks
                .best_level()
                .and_then(|(price, level)| level.peek_front().map(|e| (price, *e))),
            Side::Sell => book
                .bids
                .best_level()
                .and_then(|(price, level)| level.peek_front().map(|e| (price, *e))),
        };
        let Some((price, maker)) = resting else {
            break;
        };

        let fill = remaining.min(maker.remaining);
        let proposal = MatchProposal {
            symbol: book.symbol().clone(),
            price,
            quantity: fill,
            maker_id: maker.owner_id,
            taker_id,
            maker_order_id: maker.order_id,
            taker_order_id,
        };

        if let Err(err) = port.settle(&proposal) {
            error!(
                symbol = %proposal.symbol,
                maker_order = %proposal.maker_order_id,
                taker_order = %proposal.taker_order_id,
                %err,
                "settlement failed, market sweep aborted"
            );
            return MatchOutcome {
                executed,
                aborted: Some(err),
            };
        }

        let maker_side = match side {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        };
        book.fill_best(maker_side, price, maker.order_id, fill);
        remaining = remaining.saturating_sub(fill);
        executed.push(proposal);
    }

    MatchOutcome {
        executed,
        aborted: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use types::errors::WalletError;

    struct AcceptAll;

    impl SettlementPort for AcceptAll {
        fn settle(&self, _proposal: &MatchProposal) -> Result<(), SettlementError> {
            Ok(())
        }
    }

    /// Fails every settlement after the first `allow` calls
    struct FailAfter {
        allow: Cell<usize>,
    }

    impl SettlementPort for FailAfter {
        fn settle(&self, _proposal: &MatchProposal) -> Result<(), SettlementError> {
            let left = self.allow.get();
            if left == 0 {
                return Err(SettlementError::Funds(WalletError::InsufficientFunds {
                    asset: "USDT".to_string(),
                    required: "1".to_string(),
                    available: "0".to_string(),
                }));
            }
            self.allow.set(left - 1);
            Ok(())
        }
    }

    fn book() -> OrderBook {
        OrderBook::new(MarketId::new("BTC/USDT"))
    }

    fn qty(s: &str) -> Quantity {
        Quantity::from_str(s).unwrap()
    }

    #[test]
    fn test_no_cross_no_trades() {
        let mut book = book();
        book.insert(Side::Buy, Price::from_u64(49_000), OrderId::new(), OwnerId::new(), qty("1.0"));
        book.insert(Side::Sell, Price::from_u64(50_000), OrderId::new(), OwnerId::new(), qty("1.0"));

        let outcome = match_symbol(&mut book, &AcceptAll);
        assert!(outcome.executed.is_empty());
        assert!(!outcome.is_aborted());
    }

    #[test]
    fn test_full_match_at_maker_price() {
        let mut book = book();
        let maker = OwnerId::new();
        let taker = OwnerId::new();
        let maker_order = OrderId::new();
        let taker_order = OrderId::new();

        // Resting ask at 50000; later bid at 51000 crosses.
        book.insert(Side::Sell, Price::from_u64(50_000), maker_order, maker, qty("1.0"));
        book.insert(Side::Buy, Price::from_u64(51_000), taker_order, taker, qty("1.0"));

        let outcome = match_symbol(&mut book, &AcceptAll);
        assert_eq!(outcome.executed.len(), 1);
        let fill = &outcome.executed[0];
        assert_eq!(fill.price, Price::from_u64(50_000));
        assert_eq!(fill.maker_order_id, maker_order);
        assert_eq!(fill.taker_order_id, taker_order);
        assert_eq!(fill.quantity, qty("1.0"));
        assert!(book.is_empty());
    }

    #[test]
    fn test_partial_fill_leaves_remainder() {
        let mut book = book();
        let small_ask = OrderId::new();
        let big_bid = OrderId::new();

        book.insert(Side::Sell, Price::from_u64(50_000), small_ask, OwnerId::new(), qty("0.5"));
        book.insert(Side::Buy, Price::from_u64(50_000), big_bid, OwnerId::new(), qty("1.0"));

        let outcome = match_symbol(&mut book, &AcceptAll);
        assert_eq!(outcome.executed.len(), 1);
        assert_eq!(outcome.executed[0].quantity, qty("0.5"));

        // The larger bid rests with its remainder.
        assert!(book.contains(&big_bid));
        assert!(!book.contains(&small_ask));
        assert_eq!(book.best_bid(), Some(Price::from_u64(50_000)));
        assert_eq!(book.best_ask(), None);
    }

    #[test]
    fn test_fifo_within_level() {
        let mut book = book();
        let first_ask = OrderId::new();
        let second_ask = OrderId::new();

        book.insert(Side::Sell, Price::from_u64(50_000), first_ask, OwnerId::new(), qty("1.0"));
        book.insert(Side::Sell, Price::from_u64(50_000), second_ask, OwnerId::new(), qty("1.0"));
        book.insert(Side::Buy, Price::from_u64(50_000), OrderId::new(), OwnerId::new(), qty("1.0"));

        let outcome = match_symbol(&mut book, &AcceptAll);
        assert_eq!(outcome.executed.len(), 1);
        assert_eq!(outcome.executed[0].maker_order_id, first_ask);
        assert!(book.contains(&second_ask));
    }

    #[test]
    fn test_sweep_walks_price_levels() {
        let mut book = book();
        let cheap = OrderId::new();
        let dear = OrderId::new();
        let taker = OrderId::new();

        book.insert(Side::Sell, Price::from_u64(50_000), cheap, OwnerId::new(), qty("1.0"));
        book.insert(Side::Sell, Price::from_u64(51_000), dear, OwnerId::new(), qty("1.0"));
        // A bid for 1.5 clears the cheap level and half the dear one.
        book.insert(Side::Buy, Price::from_u64(51_000), taker, OwnerId::new(), qty("1.5"));

        let outcome = match_symbol(&mut book, &AcceptAll);
        assert_eq!(outcome.executed.len(), 2);
        assert_eq!(outcome.executed[0].price, Price::from_u64(50_000));
        assert_eq!(outcome.executed[0].quantity, qty("1.0"));
        assert_eq!(outcome.executed[1].price, Price::from_u64(51_000));
        assert_eq!(outcome.executed[1].quantity, qty("0.5"));
        assert!(!book.contains(&taker));
        assert!(book.contains(&dear));
    }

    #[test]
    fn test_abort_preserves_book() {
        let mut book = book();
        let ask1 = OrderId::new();
        let ask2 = OrderId::new();
        let bid = OrderId::new();

        book.insert(Side::Sell, Price::from_u64(50_000), ask1, OwnerId::new(), qty("1.0"));
        book.insert(Side::Sell, Price::from_u64(50_500), ask2, OwnerId::new(), qty("1.0"));
        book.insert(Side::Buy, Price::from_u64(51_000), bid, OwnerId::new(), qty("2.0"));

        // First fill settles, second fails.
        let port = FailAfter { allow: Cell::new(1) };
        let outcome = match_symbol(&mut book, &port);

        assert!(outcome.is_aborted());
        assert_eq!(outcome.executed.len(), 1);
        assert_eq!(outcome.executed[0].maker_order_id, ask1);

        // The failed match left both entries in place with their
        // pre-match remainders.
        assert!(book.contains(&ask2));
        assert!(book.contains(&bid));
        assert_eq!(book.best_ask(), Some(Price::from_u64(50_500)));
        let depth = book.depth(1);
        assert_eq!(depth.bids[0].1, qty("1.0"));
        assert_eq!(depth.asks[0].1, qty("1.0"));
    }

    #[test]
    fn test_market_sweep_never_rests() {
        let mut book = book();
        let ask = OrderId::new();
        let taker_order = OrderId::new();

        book.insert(Side::Sell, Price::from_u64(50_000), ask, OwnerId::new(), qty("1.0"));

        // Market buy for 3.0 against 1.0 of liquidity.
        let outcome = match_market(
            &mut book,
            Side::Buy,
            taker_order,
            OwnerId::new(),
            qty("3.0"),
            &AcceptAll,
        );

        assert_eq!(outcome.executed.len(), 1);
        assert_eq!(outcome.executed[0].quantity, qty("1.0"));
        assert_eq!(outcome.executed[0].price, Price::from_u64(50_000));
        // Liquidity exhausted; nothing rests for the unfilled remainder.
        assert!(book.is_empty());
        assert!(!book.contains(&taker_order));
    }

    #[test]
    fn test_market_sweep_abort_stops_cleanly() {
        let mut book = book();
        let ask = OrderId::new();

        book.insert(Side::Sell, Price::from_u64(50_000), ask, OwnerId::new(), qty("1.0"));

        let port = FailAfter { allow: Cell::new(0) };
        let outcome = match_market(
            &mut book,
            Side::Buy,
            OrderId::new(),
            OwnerId::new(),
            qty("1.0"),
            &port,
        );

        assert!(outcome.is_aborted());
        assert!(outcome.executed.is_empty());
        assert!(book.contains(&ask));
    }
}
