//! Pot and side-pot construction.
//!
//! Pure function over per-seat contributions; no knowledge of betting
//! rounds or the deck.

use std::collections::BTreeMap;

use crate::eval::HandScore;

/// One seat's contribution to the hand, as tracked by the hand state
/// machine when it closes out.
#[derive(Debug, Clone, Copy)]
pub struct Contribution {
    pub seat: usize,
    pub invested: u64,
    pub folded: bool,
}

/// An ordered slice of the pot. `eligible` lists the seats that reached
/// this layer's contribution level without folding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotLayer {
    pub amount: u64,
    pub eligible: Vec<usize>,
    /// True when this layer has exactly one eligible seat and was never
    /// contested — an uncalled-bet refund rather than a showdown award.
    pub uncalled_refund: bool,
}

/// Builds the ordered pot layers from raw per-seat contributions.
///
/// Algorithm:
/// 1. Collect distinct non-zero investment levels, ascending.
/// 2. Layer `i` = `(L_i - L_{i-1}) * count(invested >= L_i)`, eligible to
///    non-folded seats with `invested >= L_i`.
/// 3. A layer with exactly one eligible seat is an uncalled-bet refund.
pub fn build_layers(contributions: &[Contribution]) -> Vec<PotLayer> {
    let mut levels: Vec<u64> = contributions
        .iter()
        .map(|c| c.invested)
        .filter(|&amount| amount > 0)
        .collect();
    levels.sort_unstable();
    levels.dedup();

    let mut layers = Vec::new();
    let mut previous = 0u64;
    for &level in &levels {
        let at_or_above: Vec<&Contribution> = contributions
            .iter()
            .filter(|c| c.invested >= level)
            .collect();
        let amount = (level - previous) * at_or_above.len() as u64;
        let eligible: Vec<usize> = at_or_above
            .iter()
            .filter(|c| !c.folded)
            .map(|c| c.seat)
            .collect();
        // A genuine uncalled-bet refund means nobody else's money ever
        // reached this level, not merely that everyone else who reached it
        // has since folded (that's a contested pot won by fold-out).
        let uncalled_refund = at_or_above.len() == 1;
        layers.push(PotLayer {
            amount,
            eligible,
            uncalled_refund,
        });
        previous = level;
    }
    layers
}

/// Awards every layer to its eligible winners (the best `HandScore` among
/// eligible, non-folded seats), splitting ties evenly and handing any odd
/// chips out clockwise starting from the seat left of the button.
///
/// `scores` need only contain entries for seats that reached showdown (or
/// the lone survivor of an uncalled-bet refund layer); a layer whose sole
/// eligible seat has no score (folded-through-to-win case, handled by the
/// caller before building layers) is awarded to that seat outright.
pub fn award(
    layers: &[PotLayer],
    scores: &BTreeMap<usize, HandScore>,
    button: usize,
    num_seats: usize,
) -> BTreeMap<usize, u64> {
    let mut winnings: BTreeMap<usize, u64> = BTreeMap::new();

    for layer in layers {
        if layer.amount == 0 || layer.eligible.is_empty() {
            continue;
        }
        if layer.uncalled_refund {
            *winnings.entry(layer.eligible[0]).or_insert(0) += layer.amount;
            continue;
        }

        let mut best: Option<HandScore> = None;
        let mut winners: Vec<usize> = Vec::new();
        for &seat in &layer.eligible {
            let Some(&score) = scores.get(&seat) else {
                continue;
            };
            match best {
                None => {
                    best = Some(score);
                    winners = vec![seat];
                }
                Some(current) if score < current => {
                    best = Some(score);
                    winners = vec![seat];
                }
                Some(current) if score == current => {
                    winners.push(seat);
                }
                _ => {}
            }
        }
        if winners.is_empty() {
            continue;
        }

        let share = layer.amount / winners.len() as u64;
        let remainder = layer.amount - share * winners.len() as u64;
        for &seat in &winners {
            *winnings.entry(seat).or_insert(0) += share;
        }
        distribute_odd_chips(&mut winnings, &winners, remainder, button, num_seats);
    }

    winnings
}

/// Hands out `remainder` single chips, one per winner, walking clockwise
/// from the seat immediately left of the button and skipping non-winners.
fn distribute_odd_chips(
    winnings: &mut BTreeMap<usize, u64>,
    winners: &[usize],
    remainder: u64,
    button: usize,
    num_seats: usize,
) {
    if remainder == 0 || num_seats == 0 {
        return;
    }
    let mut remaining = remainder;
    let mut seat = (button + 1) % num_seats;
    let mut scanned = 0;
    while remaining > 0 && scanned < num_seats {
        if winners.contains(&seat) {
            *winnings.entry(seat).or_insert(0) += 1;
            remaining -= 1;
        }
        seat = (seat + 1) % num_seats;
        scanned += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Card;
    use crate::eval::evaluate;

    fn score(cards: &[&str]) -> HandScore {
        let cards: Vec<Card> = cards.iter().map(|s| s.parse().unwrap()).collect();
        evaluate(&cards)
    }

    #[test]
    fn single_layer_when_no_all_in() {
        let contributions = vec![
            Contribution { seat: 0, invested: 100, folded: false },
            Contribution { seat: 1, invested: 100, folded: false },
            Contribution { seat: 2, invested: 100, folded: true },
        ];
        let layers = build_layers(&contributions);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].amount, 300);
        assert_eq!(layers[0].eligible, vec![0, 1]);
    }

    #[test]
    fn side_pot_builds_two_layers_from_staggered_all_ins() {
        // Stacks (300, 600, 600); A all-in 300, B and C call 300, then B
        // shoves the rest and C calls. Final invested: A=300, B=600, C=600.
        let contributions = vec![
            Contribution { seat: 0, invested: 300, folded: false },
            Contribution { seat: 1, invested: 600, folded: false },
            Contribution { seat: 2, invested: 600, folded: false },
        ];
        let layers = build_layers(&contributions);
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].amount, 900);
        assert_eq!(layers[0].eligible, vec![0, 1, 2]);
        assert_eq!(layers[1].amount, 600);
        assert_eq!(layers[1].eligible, vec![1, 2]);
    }

    #[test]
    fn award_splits_side_pot_correctly() {
        let contributions = vec![
            Contribution { seat: 0, invested: 300, folded: false },
            Contribution { seat: 1, invested: 600, folded: false },
            Contribution { seat: 2, invested: 600, folded: false },
        ];
        let layers = build_layers(&contributions);

        let mut scores = BTreeMap::new();
        // A wins the main pot; B beats C in the side pot.
        scores.insert(0, score(&["As", "Ac", "Ad", "2c", "3d", "4h", "9s"]));
        scores.insert(1, score(&["Ks", "Kc", "Kd", "2c", "3d", "4h", "9s"]));
        scores.insert(2, score(&["Qs", "Qc", "2d", "2h", "3d", "4h", "9s"]));

        let winnings = award(&layers, &scores, 2, 3);
        assert_eq!(winnings.get(&0).copied().unwrap_or(0), 900);
        assert_eq!(winnings.get(&1).copied().unwrap_or(0), 600);
        assert_eq!(winnings.get(&2), None);
    }

    #[test]
    fn uncalled_bet_is_refunded_not_awarded() {
        let contributions = vec![
            Contribution { seat: 0, invested: 50, folded: false },
            Contribution { seat: 1, invested: 20, folded: true },
        ];
        let layers = build_layers(&contributions);
        // Level 20: both seats' money reached it (seat1's before folding),
        // so it's a contested pot won by fold-out, not an uncalled refund,
        // even though only seat0 remains eligible to claim it.
        let lower = &layers[0];
        assert!(!lower.uncalled_refund);
        assert_eq!(lower.eligible, vec![0]);
        // Level 50: only seat0's money ever reached it, so it's a genuine
        // uncalled-bet refund.
        let last = layers.last().unwrap();
        assert!(last.uncalled_refund);
        assert_eq!(last.eligible, vec![0]);
    }

    #[test]
    fn layer_sum_equals_total_invested() {
        let contributions = vec![
            Contribution { seat: 0, invested: 37, folded: false },
            Contribution { seat: 1, invested: 120, folded: false },
            Contribution { seat: 2, invested: 120, folded: true },
            Contribution { seat: 3, invested: 5, folded: false },
        ];
        let layers = build_layers(&contributions);
        let total: u64 = contributions.iter().map(|c| c.invested).sum();
        let layered: u64 = layers.iter().map(|l| l.amount).sum();
        assert_eq!(total, layered);
    }

    #[test]
    fn odd_chip_goes_clockwise_from_left_of_button() {
        let mut winnings = BTreeMap::new();
        // Button is seat 0, so distribution starts at seat 1.
        distribute_odd_chips(&mut winnings, &[1, 3], 1, 0, 4);
        assert_eq!(winnings.get(&1), Some(&1));
        assert_eq!(winnings.get(&3), None);
    }
}
