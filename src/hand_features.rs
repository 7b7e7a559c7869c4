//! Hand-strength features for Big Two dealt hands
//!
//! This module computes combinatorial features (flushes, straights, pairs
//! and friends) for a single dealt hand, using the Big Two face ordering
//! where 3 is the weakest face and 2 the strongest.

use anyhow::{bail, Result};

/// Number of distinct face labels in the deck.
pub const FACE_COUNT: usize = 13;

/// Strength of a face label under Big Two ordering (1 = weakest).
///
/// Faces rank `3 4 5 6 7 8 9 T J Q K A 2`, so `3` maps to 1 and `2` maps
/// to 13. Returns `None` for anything outside the 13 known labels.
pub fn face_strength(face: char) -> Option<u8> {
    match face {
        '3' => Some(1),
        '4' => Some(2),
        '5' => Some(3),
        '6' => Some(4),
        '7' => Some(5),
        '8' => Some(6),
        '9' => Some(7),
        'T' => Some(8),
        'J' => Some(9),
        'Q' => Some(10),
        'K' => Some(11),
        'A' => Some(12),
        '2' => Some(13),
        _ => None,
    }
}

/// Suit index for grouping, in C, D, H, S order.
fn suit_index(suit: char) -> Option<usize> {
    match suit {
        'C' => Some(0),
        'D' => Some(1),
        'H' => Some(2),
        'S' => Some(3),
        _ => None,
    }
}

/// Combinatorial features of one dealt hand.
///
/// All counters are zero for an empty hand. `straight_count` is capped at
/// one: the hand either contains a five-card run or it does not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandFeatures {
    /// Suits holding five or more cards.
    pub flush_count: u32,
    /// Faces occurring exactly twice, counted once per pair.
    pub pair_count: u32,
    /// Faces occurring exactly three times.
    pub three_kind_count: u32,
    /// Faces occurring exactly four times.
    pub four_kind_count: u32,
    /// 1 if any five consecutive strengths appear across the hand.
    pub straight_count: u32,
    /// Suits whose own cards contain five consecutive strengths.
    pub straight_flush_count: u32,
    /// Cards whose face occurs exactly once in the hand.
    pub leftover_card_count: u32,
}

/// Parse a two-character card code into (strength, suit index).
///
/// The face is everything before the final character, which must be one of
/// the 13 known labels; the final character is the suit (C/D/H/S).
fn parse_card(card: &str) -> Result<(u8, usize)> {
    let code: Vec<char> = card.trim().chars().collect();
    if code.len() < 2 {
        bail!("card code '{}' is too short", card);
    }
    if code.len() > 2 {
        bail!("card code '{}' has an unknown face", card);
    }
    let strength = match face_strength(code[0]) {
        Some(s) => s,
        None => bail!("card code '{}' has an unknown face", card),
    };
    let suit = match suit_index(code[1]) {
        Some(s) => s,
        None => bail!("card code '{}' has an unknown suit", card),
    };
    Ok((strength, suit))
}

/// True if the sorted, deduplicated strengths contain a five-card run.
fn has_straight(strengths: &[u8]) -> bool {
    let mut sorted = strengths.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.windows(5).any(|w| w[4] == w[0] + 4)
}

/// Compute the features of one dealt hand.
///
/// An empty hand yields all-zero features. Any card code with an unknown
/// face or suit fails the whole hand; callers that want a degraded record
/// instead of an error substitute `HandFeatures::default()`.
pub fn compute_hand_features(hand: &[String]) -> Result<HandFeatures> {
    if hand.is_empty() {
        return Ok(HandFeatures::default());
    }

    let mut strengths: Vec<u8> = Vec::with_capacity(hand.len());
    let mut suits: [Vec<u8>; 4] = [Vec::new(), Vec::new(), Vec::new(), Vec::new()];
    for card in hand {
        let (strength, suit) = parse_card(card)?;
        strengths.push(strength);
        suits[suit].push(strength);
    }

    let flush_count = suits.iter().filter(|cards| cards.len() >= 5).count() as u32;
    let straight_count = u32::from(has_straight(&strengths));
    let straight_flush_count = suits
        .iter()
        .filter(|cards| cards.len() >= 5 && has_straight(cards))
        .count() as u32;

    // Occurrence count per strength; a face in a triple never also counts
    // toward pairs because the filters below require an exact count.
    let mut occurrences = [0u32; FACE_COUNT + 1];
    for &s in &strengths {
        occurrences[s as usize] += 1;
    }
    let count_with = |n: u32| {
        strengths
            .iter()
            .filter(|&&s| occurrences[s as usize] == n)
            .count() as u32
    };
    let pair_count = count_with(2) / 2;
    let three_kind_count = count_with(3) / 3;
    let four_kind_count = count_with(4) / 4;
    let leftover_card_count = count_with(1);

    Ok(HandFeatures {
        flush_count,
        pair_count,
        three_kind_count,
        four_kind_count,
        straight_count,
        straight_flush_count,
        leftover_card_count,
    })
}
