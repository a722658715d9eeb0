//! Derived Fairness Primitives
//!
//! Higher-level draws built on [`generate_number`] with sequential
//! nonces: batched rolls, deck shuffles, weighted selection, coin flips
//! and coordinates. Each returns the seed commitment alongside the
//! outcome so the audit trail survives into whatever record the caller
//! keeps.

use serde::{Deserialize, Serialize};

use crate::core::hash::ChecksumHex;
use crate::fairness::rng::{generate_number, hash_seed, FairnessError};

/// A batch of sequential draws sharing one base nonce.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultiRoll {
    /// Results in draw order; draw `i` used nonce `nonce + i`.
    pub results: Vec<i64>,
    /// Commitment to the server seed.
    pub server_seed_hash: ChecksumHex,
    /// Client seed.
    pub client_seed: String,
    /// Base nonce of the batch.
    pub nonce: u64,
    /// Inclusive lower bound.
    pub min: i64,
    /// Inclusive upper bound.
    pub max: i64,
}

/// Generate `count` numbers with sequential nonces.
pub fn generate_multiple(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    count: u64,
    min: i64,
    max: i64,
) -> Result<MultiRoll, FairnessError> {
    let mut results = Vec::with_capacity(count as usize);
    for i in 0..count {
        results.push(generate_number(server_seed, client_seed, nonce + i, min, max)?.result);
    }

    Ok(MultiRoll {
        results,
        server_seed_hash: hash_seed(server_seed),
        client_seed: client_seed.to_string(),
        nonce,
        min,
        max,
    })
}

/// A provably shuffled deck.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShuffledDeck {
    /// Permutation of `0..deck_size`.
    pub deck: Vec<u32>,
    /// Commitment to the server seed.
    pub server_seed_hash: ChecksumHex,
    /// Client seed.
    pub client_seed: String,
    /// Base nonce; swap position `i` used nonce `nonce + i`.
    pub nonce: u64,
    /// Number of cards.
    pub deck_size: u32,
}

/// Fisher-Yates shuffle of `0..deck_size` using one draw per swap
/// position, walked from the top of the deck down.
pub fn shuffle_deck(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    deck_size: u32,
) -> Result<ShuffledDeck, FairnessError> {
    let mut deck: Vec<u32> = (0..deck_size).collect();

    for i in (1..deck_size as usize).rev() {
        let j = generate_number(server_seed, client_seed, nonce + i as u64, 0, i as i64)?
            .result as usize;
        deck.swap(i, j);
    }

    Ok(ShuffledDeck {
        deck,
        server_seed_hash: hash_seed(server_seed),
        client_seed: client_seed.to_string(),
        nonce,
        deck_size,
    })
}

/// An item eligible for weighted selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedItem {
    /// Caller-meaningful identifier (loot id, drop table entry, ...).
    pub id: String,
    /// Relative weight. Zero-weight items can never be picked.
    pub weight: u64,
}

/// Outcome of a weighted selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedPick {
    /// Selected item.
    pub item: WeightedItem,
    /// Raw roll in `[0, total_weight - 1]`.
    pub roll: i64,
    /// Sum of all weights.
    pub total_weight: u64,
    /// Commitment to the server seed.
    pub server_seed_hash: ChecksumHex,
    /// Client seed.
    pub client_seed: String,
    /// Nonce of the underlying draw.
    pub nonce: u64,
}

/// Weighted random selection by cumulative-weight scan over one draw.
pub fn weighted_random(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    items: &[WeightedItem],
) -> Result<WeightedPick, FairnessError> {
    let total_weight: u64 = items.iter().map(|i| i.weight).sum();
    if total_weight == 0 {
        return Err(FairnessError::EmptyWeights);
    }

    let roll = generate_number(server_seed, client_seed, nonce, 0, total_weight as i64 - 1)?;

    let mut cumulative = 0u64;
    for item in items {
        cumulative += item.weight;
        if (roll.result as u64) < cumulative {
            return Ok(WeightedPick {
                item: item.clone(),
                roll: roll.result,
                total_weight,
                server_seed_hash: roll.server_seed_hash,
                client_seed: roll.client_seed,
                nonce,
            });
        }
    }

    // Unreachable: the roll is strictly below the final cumulative weight.
    Err(FairnessError::EmptyWeights)
}

/// Which face a coin landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoinSide {
    /// Roll produced 1.
    Heads,
    /// Roll produced 0.
    Tails,
}

/// Outcome of a coin flip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoinFlip {
    /// True on heads.
    pub heads: bool,
    /// Face, for display layers.
    pub side: CoinSide,
    /// Commitment to the server seed.
    pub server_seed_hash: ChecksumHex,
    /// Client seed.
    pub client_seed: String,
    /// Nonce of the underlying draw.
    pub nonce: u64,
}

/// Provably fair coin flip (a single draw in `[0, 1]`).
pub fn coin_flip(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
) -> Result<CoinFlip, FairnessError> {
    let roll = generate_number(server_seed, client_seed, nonce, 0, 1)?;
    let heads = roll.result == 1;

    Ok(CoinFlip {
        heads,
        side: if heads { CoinSide::Heads } else { CoinSide::Tails },
        server_seed_hash: roll.server_seed_hash,
        client_seed: roll.client_seed,
        nonce,
    })
}

/// Bounds for coordinate generation. The z range is optional for 2D
/// games; when absent, z is fixed at 0 and no nonce is spent on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinateBounds {
    /// Inclusive x range.
    pub x: (i64, i64),
    /// Inclusive y range.
    pub y: (i64, i64),
    /// Inclusive z range, if the game has a third axis.
    pub z: Option<(i64, i64)>,
}

/// A provably fair position.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// X drawn at `nonce`.
    pub x: i64,
    /// Y drawn at `nonce + 1`.
    pub y: i64,
    /// Z drawn at `nonce + 2`, or 0 without a z range.
    pub z: i64,
    /// Commitment to the server seed.
    pub server_seed_hash: ChecksumHex,
    /// Client seed.
    pub client_seed: String,
    /// Base nonce.
    pub nonce: u64,
    /// Bounds the draw was constrained to.
    pub bounds: CoordinateBounds,
}

/// Generate coordinates within bounds, one axis per sequential nonce.
pub fn generate_coordinates(
    server_seed: &str,
    client_seed: &str,
    nonce: u64,
    bounds: CoordinateBounds,
) -> Result<Coordinates, FairnessError> {
    let x = generate_number(server_seed, client_seed, nonce, bounds.x.0, bounds.x.1)?.result;
    let y = generate_number(server_seed, client_seed, nonce + 1, bounds.y.0, bounds.y.1)?.result;
    let z = match bounds.z {
        Some((min_z, max_z)) => {
            generate_number(server_seed, client_seed, nonce + 2, min_z, max_z)?.result
        }
        None => 0,
    };

    Ok(Coordinates {
        x,
        y,
        z,
        server_seed_hash: hash_seed(server_seed),
        client_seed: client_seed.to_string(),
        nonce,
        bounds,
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SERVER_SEED: &str =
        "a3f1c2d4e5b6978812345678deadbeefa3f1c2d4e5b6978812345678deadbeef";
    const CLIENT_SEED: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_generate_multiple_known_values() {
        let batch =
            generate_multiple(SERVER_SEED, CLIENT_SEED, 10, 5, 1, 6).unwrap();
        assert_eq!(batch.results, vec![5, 4, 1, 4, 2]);
        assert_eq!(batch.nonce, 10);
    }

    #[test]
    fn test_generate_multiple_matches_sequential_singles() {
        let batch = generate_multiple(SERVER_SEED, CLIENT_SEED, 50, 8, 0, 99).unwrap();
        for (i, result) in batch.results.iter().enumerate() {
            let single =
                generate_number(SERVER_SEED, CLIENT_SEED, 50 + i as u64, 0, 99).unwrap();
            assert_eq!(*result, single.result);
        }
    }

    #[test]
    fn test_shuffle_known_permutation() {
        let shuffled = shuffle_deck(SERVER_SEED, CLIENT_SEED, 100, 8).unwrap();
        assert_eq!(shuffled.deck, vec![3, 4, 6, 5, 7, 2, 1, 0]);
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let shuffled = shuffle_deck(SERVER_SEED, CLIENT_SEED, 0, 52).unwrap();
        assert_eq!(shuffled.deck.len(), 52);

        let mut sorted = shuffled.deck.clone();
        sorted.sort_unstable();
        let expected: Vec<u32> = (0..52).collect();
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_shuffle_determinism() {
        let a = shuffle_deck(SERVER_SEED, CLIENT_SEED, 7, 52).unwrap();
        let b = shuffle_deck(SERVER_SEED, CLIENT_SEED, 7, 52).unwrap();
        assert_eq!(a.deck, b.deck);

        let c = shuffle_deck(SERVER_SEED, CLIENT_SEED, 8, 52).unwrap();
        assert_ne!(a.deck, c.deck);
    }

    #[test]
    fn test_weighted_random_known_pick() {
        let items = vec![
            WeightedItem { id: "common".into(), weight: 70 },
            WeightedItem { id: "rare".into(), weight: 25 },
            WeightedItem { id: "epic".into(), weight: 5 },
        ];

        // Roll at nonce 42 over total weight 100 lands at 57: common.
        let pick = weighted_random(SERVER_SEED, CLIENT_SEED, 42, &items).unwrap();
        assert_eq!(pick.roll, 57);
        assert_eq!(pick.item.id, "common");
        assert_eq!(pick.total_weight, 100);
    }

    #[test]
    fn test_weighted_random_rejects_zero_total() {
        let items = vec![WeightedItem { id: "dud".into(), weight: 0 }];
        assert_eq!(
            weighted_random(SERVER_SEED, CLIENT_SEED, 0, &items),
            Err(FairnessError::EmptyWeights)
        );
        assert_eq!(
            weighted_random(SERVER_SEED, CLIENT_SEED, 0, &[]),
            Err(FairnessError::EmptyWeights)
        );
    }

    #[test]
    fn test_coin_flip_known_value() {
        let flip = coin_flip(SERVER_SEED, CLIENT_SEED, 3).unwrap();
        assert!(!flip.heads);
        assert_eq!(flip.side, CoinSide::Tails);
    }

    #[test]
    fn test_coordinates_known_values() {
        let bounds = CoordinateBounds {
            x: (-100, 100),
            y: (0, 50),
            z: Some((0, 10)),
        };
        let coords =
            generate_coordinates(SERVER_SEED, CLIENT_SEED, 200, bounds).unwrap();
        assert_eq!((coords.x, coords.y, coords.z), (-8, 40, 5));
    }

    #[test]
    fn test_coordinates_without_z() {
        let bounds = CoordinateBounds {
            x: (0, 10),
            y: (0, 10),
            z: None,
        };
        let coords = generate_coordinates(SERVER_SEED, CLIENT_SEED, 0, bounds).unwrap();
        assert_eq!(coords.z, 0);
    }

    proptest! {
        #[test]
        fn prop_shuffle_always_permutation(nonce in 0u64..10_000, deck_size in 1u32..64) {
            let shuffled = shuffle_deck(SERVER_SEED, CLIENT_SEED, nonce, deck_size).unwrap();
            let mut sorted = shuffled.deck.clone();
            sorted.sort_unstable();
            let expected: Vec<u32> = (0..deck_size).collect();
            prop_assert_eq!(sorted, expected);
        }

        #[test]
        fn prop_weighted_pick_has_positive_weight(nonce in 0u64..10_000) {
            let items = vec![
                WeightedItem { id: "a".into(), weight: 1 },
                WeightedItem { id: "b".into(), weight: 0 },
                WeightedItem { id: "c".into(), weight: 3 },
            ];
            let pick = weighted_random(SERVER_SEED, CLIENT_SEED, nonce, &items).unwrap();
            prop_assert!(pick.item.weight > 0);
        }
    }
}
