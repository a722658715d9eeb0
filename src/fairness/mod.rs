//! Commit-Reveal Fairness RNG
//!
//! Stateless, provably fair randomness. The server commits to a hashed
//! secret seed before play, clients contribute their own seed, and every
//! draw is an HMAC over both plus a monotonic nonce - so once the server
//! seed is revealed, any party can recompute every outcome.
//!
//! All functions here are pure over their explicit arguments; the only
//! state is the per-session seed pair and nonce counter in [`RngSession`].

pub mod derived;
pub mod rng;

pub use derived::{
    coin_flip, generate_coordinates, generate_multiple, shuffle_deck, weighted_random,
    CoinFlip, CoinSide, CoordinateBounds, Coordinates, MultiRoll, ShuffledDeck, WeightedItem,
    WeightedPick,
};
pub use rng::{
    create_verification_package, generate_client_seed, generate_number, generate_server_seed,
    hash_seed, verify, FairnessError, RngSession, Roll, RollClaim, VerificationPackage,
};
