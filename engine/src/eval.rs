//! Seven-card hand evaluator.
//!
//! `evaluate7` ranks any seven distinct cards (two hole + five board) to a
//! single `HandScore`. Lower scores are stronger, so the winner of a
//! showdown is simply `min_by_key(evaluate7)`. The score packs the hand
//! category into the high bits and the tie-break ranks into the low bits,
//! each rank inverted (`14 - rank`) so that "higher card wins" becomes
//! "lower packed value wins" uniformly across the whole score.
//!
//! Implementation picks the best 5-of-7 by direct enumeration of the 21
//! five-card combinations; `itertools::Itertools::combinations` keeps
//! that search terse.

use std::cmp::Ordering;

use itertools::Itertools;

use crate::card::{Card, Rank};

/// Hand categories, worst to best. The discriminant doubles as the score's
/// high-bit field (after inversion — see `HandScore`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPair,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
}

/// A packed, totally-ordered score for a five-card (or best-of-seven) hand.
/// `score(a) < score(b)` iff hand `a` beats hand `b`; equal scores tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandScore(u32);

impl HandScore {
    fn pack(category: HandCategory, kickers: &[Rank]) -> Self {
        // Worst category (HighCard = 0) must sort *last*, so invert it into
        // the high bits: category_field = 8 - category.
        let category_field = (HandCategory::StraightFlush as u32) - (category as u32);
        let mut kicker_field: u32 = 0;
        for &rank in kickers.iter().take(5) {
            let inverted = 14 - rank.value() as u32; // 0..=12, fits 4 bits
            kicker_field = (kicker_field << 4) | inverted;
        }
        // Pad any missing kicker slots so hands with fewer kickers (quads,
        // trips) still occupy a fixed-width field.
        for _ in kickers.len()..5 {
            kicker_field <<= 4;
        }
        HandScore((category_field << 20) | kicker_field)
    }

    pub fn category(&self) -> HandCategory {
        let field = self.0 >> 20;
        match (HandCategory::StraightFlush as u32) - field {
            0 => HandCategory::HighCard,
            1 => HandCategory::OnePair,
            2 => HandCategory::TwoPair,
            3 => HandCategory::ThreeOfAKind,
            4 => HandCategory::Straight,
            5 => HandCategory::Flush,
            6 => HandCategory::FullHouse,
            7 => HandCategory::FourOfAKind,
            _ => HandCategory::StraightFlush,
        }
    }
}

/// Ranks the best five-card hand obtainable from `cards` (2..=7 distinct
/// cards). Panics if fewer than 5 cards are supplied — callers always pass
/// 2 hole cards plus however many board cards are out (never fewer than 5
/// at showdown).
pub fn evaluate(cards: &[Card]) -> HandScore {
    assert!(cards.len() >= 5, "evaluator needs at least 5 cards");
    if cards.len() == 5 {
        return evaluate_five(cards);
    }
    cards
        .iter()
        .copied()
        .combinations(5)
        .map(|five| evaluate_five(&five))
        .min()
        .expect("at least one 5-card combination exists")
}

/// Convenience wrapper matching the protocol shape: two hole cards plus the
/// current board (0..=5 cards during betting rounds is invalid for
/// evaluation — only called at showdown with a full 5-card board).
pub fn evaluate_hole_and_board(hole: (Card, Card), board: &[Card]) -> HandScore {
    let mut all = Vec::with_capacity(2 + board.len());
    all.push(hole.0);
    all.push(hole.1);
    all.extend_from_slice(board);
    evaluate(&all)
}

fn evaluate_five(cards: &[Card]) -> HandScore {
    debug_assert_eq!(cards.len(), 5);

    let mut by_rank: Vec<(Rank, u8)> = Vec::new();
    for &card in cards {
        match by_rank.iter_mut().find(|(r, _)| *r == card.rank) {
            Some((_, count)) => *count += 1,
            None => by_rank.push((card.rank, 1)),
        }
    }
    // Sort by count desc, then rank desc, so groups of equal size are
    // tie-broken by rank (needed for two-pair / two-trips full houses).
    by_rank.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));

    let is_flush = cards.iter().all(|c| c.suit == cards[0].suit);
    let straight_high = straight_high_rank(cards);

    if is_flush {
        if let Some(high) = straight_high {
            return HandScore::pack(HandCategory::StraightFlush, &[high]);
        }
    }

    match (by_rank[0].1, by_rank.get(1).map(|(_, c)| *c)) {
        (4, _) => {
            let quad = by_rank[0].0;
            let kicker = by_rank[1].0;
            return HandScore::pack(HandCategory::FourOfAKind, &[quad, kicker]);
        }
        (3, Some(c)) if c >= 2 => {
            let trips = by_rank[0].0;
            let pair = by_rank[1].0;
            return HandScore::pack(HandCategory::FullHouse, &[trips, pair]);
        }
        _ => {}
    }

    if is_flush {
        let kickers = descending_ranks(cards);
        return HandScore::pack(HandCategory::Flush, &kickers);
    }

    if let Some(high) = straight_high {
        return HandScore::pack(HandCategory::Straight, &[high]);
    }

    if by_rank[0].1 == 3 {
        let trips = by_rank[0].0;
        let mut kickers: Vec<Rank> = by_rank[1..].iter().map(|(r, _)| *r).collect();
        kickers.sort_by(|a, b| b.cmp(a));
        kickers.truncate(2);
        return HandScore::pack(HandCategory::ThreeOfAKind, &[trips, kickers[0], kickers[1]]);
    }

    let pairs: Vec<Rank> = by_rank.iter().filter(|(_, c)| *c == 2).map(|(r, _)| *r).collect();
    if pairs.len() == 2 {
        let high_pair = pairs[0];
        let low_pair = pairs[1];
        let kicker = by_rank
            .iter()
            .find(|(r, c)| *c == 1 && *r != high_pair && *r != low_pair)
            .map(|(r, _)| *r)
            .expect("two pair hand always has a fifth kicker");
        return HandScore::pack(HandCategory::TwoPair, &[high_pair, low_pair, kicker]);
    }
    if pairs.len() == 1 {
        let pair = pairs[0];
        let mut kickers: Vec<Rank> = by_rank
            .iter()
            .filter(|(r, _)| *r != pair)
            .map(|(r, _)| *r)
            .collect();
        kickers.sort_by(|a, b| b.cmp(a));
        kickers.truncate(3);
        return HandScore::pack(
            HandCategory::OnePair,
            &[pair, kickers[0], kickers[1], kickers[2]],
        );
    }

    let kickers = descending_ranks(cards);
    HandScore::pack(HandCategory::HighCard, &kickers)
}

fn descending_ranks(cards: &[Card]) -> Vec<Rank> {
    let mut ranks: Vec<Rank> = cards.iter().map(|c| c.rank).collect();
    ranks.sort_by(|a, b| b.cmp(a));
    ranks
}

/// Returns the straight's high rank if `cards` form a straight, handling the
/// A-2-3-4-5 wheel (which ranks as 5-high, below 6-high) as a special case.
fn straight_high_rank(cards: &[Card]) -> Option<Rank> {
    let mut values: Vec<u8> = cards.iter().map(|c| c.rank.value()).collect();
    values.sort_unstable();
    values.dedup();
    if values.len() < 5 {
        return None;
    }

    // Wheel: A,2,3,4,5 present (Ace counts as 1 here).
    if values == [2, 3, 4, 5, 14] {
        return Some(Rank::Five);
    }

    for window in values.windows(5) {
        if window[4] - window[0] == 4 {
            return Rank::from_value(window[4]);
        }
    }
    None
}

/// Total order helper kept for callers that want an explicit `Ordering`
/// rather than comparing `HandScore` directly (the engine's pot awarder
/// uses this when breaking ties across eligible seats).
pub fn compare(a: &HandScore, b: &HandScore) -> Ordering {
    a.cmp(b)
}
