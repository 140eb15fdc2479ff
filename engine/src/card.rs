use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CardParseError;

/// One of the four suits. Ordering carries no game meaning; it exists only
/// so `Card` can derive `Ord` for deterministic sorting in tests and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'c' => Some(Suit::Clubs),
            'd' => Some(Suit::Diamonds),
            'h' => Some(Suit::Hearts),
            's' => Some(Suit::Spades),
            _ => None,
        }
    }

    fn to_char(self) -> char {
        match self {
            Suit::Clubs => 'c',
            Suit::Diamonds => 'd',
            Suit::Hearts => 'h',
            Suit::Spades => 's',
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Card rank. Numeric value is `2..=14`; Ace is high (14) except where the
/// evaluator special-cases the wheel straight (A-2-3-4-5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Two = 2,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_value(value: u8) -> Option<Self> {
        Some(match value {
            2 => Rank::Two,
            3 => Rank::Three,
            4 => Rank::Four,
            5 => Rank::Five,
            6 => Rank::Six,
            7 => Rank::Seven,
            8 => Rank::Eight,
            9 => Rank::Nine,
            10 => Rank::Ten,
            11 => Rank::Jack,
            12 => Rank::Queen,
            13 => Rank::King,
            14 => Rank::Ace,
            _ => return None,
        })
    }

    fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            '2' => Some(Rank::Two),
            '3' => Some(Rank::Three),
            '4' => Some(Rank::Four),
            '5' => Some(Rank::Five),
            '6' => Some(Rank::Six),
            '7' => Some(Rank::Seven),
            '8' => Some(Rank::Eight),
            '9' => Some(Rank::Nine),
            'T' => Some(Rank::Ten),
            'J' => Some(Rank::Jack),
            'Q' => Some(Rank::Queen),
            'K' => Some(Rank::King),
            'A' => Some(Rank::Ace),
            _ => None,
        }
    }

    fn to_char(self) -> char {
        match self {
            Rank::Two => '2',
            Rank::Three => '3',
            Rank::Four => '4',
            Rank::Five => '5',
            Rank::Six => '6',
            Rank::Seven => '7',
            Rank::Eight => '8',
            Rank::Nine => '9',
            Rank::Ten => 'T',
            Rank::Jack => 'J',
            Rank::Queen => 'Q',
            Rank::King => 'K',
            Rank::Ace => 'A',
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// A single playing card. Canonical text form is two characters, rank then
/// suit (`"As"`, `"Td"`, `"2c"`).
///
/// Serializes and deserializes as that canonical string rather than as a
/// `{rank, suit}` object: the wire protocol carries hole/board cards as
/// plain two-character tokens, and hand-history records use the same
/// notation, so one textual form serves both boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Serialize for Card {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Card {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

impl std::str::FromStr for Card {
    type Err = CardParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes: Vec<char> = s.chars().collect();
        if bytes.len() != 2 {
            return Err(CardParseError::WrongLength(s.to_string()));
        }
        let rank = Rank::from_char(bytes[0]).ok_or_else(|| CardParseError::BadRank(s.to_string()))?;
        let suit = Suit::from_char(bytes[1]).ok_or_else(|| CardParseError::BadSuit(s.to_string()))?;
        Ok(Card::new(rank, suit))
    }
}

/// A permutation of the 52-card deck. Cards are dealt from the back with
/// `deal`, a cheap `Vec::pop`.
///
/// The deck never reshuffles mid-hand and is always built from a
/// caller-supplied RNG — the table owns the only RNG in the system. No
/// other source of randomness is allowed in the core.
#[derive(Debug, Clone)]
pub struct Deck(Vec<Card>);

impl Deck {
    /// A full 52-card deck in a fixed, unshuffled order.
    pub fn ordered() -> Self {
        let mut cards = Vec::with_capacity(52);
        for &suit in &Suit::ALL {
            for &rank in &Rank::ALL {
                cards.push(Card::new(rank, suit));
            }
        }
        Self(cards)
    }

    /// A full 52-card deck shuffled with the given RNG.
    pub fn shuffled(rng: &mut impl Rng) -> Self {
        let mut deck = Self::ordered();
        deck.0.shuffle(rng);
        deck
    }

    pub fn deal(&mut self) -> Option<Card> {
        self.0.pop()
    }

    pub fn deal_n(&mut self, n: usize) -> Vec<Card> {
        (0..n).filter_map(|_| self.deal()).collect()
    }

    pub fn remaining(&self) -> usize {
        self.0.len()
    }

    /// Builds a deck from an explicit card order, dealt back-to-front (the
    /// last element of `cards` is dealt first). Exists for tests that need
    /// to pin an exact deal instead of shuffling.
    #[cfg(test)]
    pub fn from_cards(mut cards: Vec<Card>) -> Self {
        cards.reverse();
        Self(cards)
    }
}
