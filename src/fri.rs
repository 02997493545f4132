//! FRI low-degree-test verification
//!
//! The prover commits to the evaluations of a polynomial over a coset of a
//! power-of-two subgroup, then repeatedly **folds** it in half:
//!
//! ```text
//! f'(x²) = (f(x) + f(−x))/2 + α·(f(x) − f(−x))/(2x)
//! ```
//!
//! absorbing each layer's Merkle root and deriving the fold challenge `α`
//! from the transcript. After the last fold the remaining polynomial is sent
//! in the clear and checked directly. Query positions are re-derived from
//! the transcript — never transmitted — and each query walks every layer,
//! checking Merkle inclusion of the value/pair openings and the fold
//! consistency between consecutive layers.
//!
//! Layer `i` lives on the coset `offset^(2^i)·⟨g^(2^i)⟩` of size `N/2^i`;
//! the index of `−x` is always `index XOR half`, and the index in the next
//! layer is `index AND (half − 1)`.

#![allow(missing_docs)]

use ark_ff::{FftField, Field, Zero};
use serde::{Deserialize, Serialize};

use crate::merkle::{self, Digest32, MerkleError, MerkleHash};
use crate::transcript::{FsLabel, Transcript};
use crate::{curve::fr_to_be_bytes, F};

/// FRI parameters pinned by the verifying key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FriParams {
    /// log₂ of the evaluation-domain size.
    pub log_n: u32,
    /// Blowup factor (domain size / trace length), power of two.
    pub expansion: u32,
    /// Number of query positions.
    pub num_queries: u32,
    /// Hash function for all commitment trees of this proof.
    pub hash: MerkleHash,
    /// Maximum coefficient count of the final layer (power of two).
    pub final_degree_bound: u32,
}

impl FriParams {
    /// Evaluation-domain size `N`.
    pub fn domain_size(&self) -> u64 {
        1u64 << self.log_n
    }

    /// Number of fold layers carried by a proof.
    pub fn num_layers(&self) -> u32 {
        let final_domain = (self.final_degree_bound as u64) * (self.expansion as u64);
        self.log_n - final_domain.trailing_zeros()
    }

    /// Structural admission of the parameter set itself.
    pub fn validate(&self) -> Result<(), FriError> {
        if self.log_n == 0 || self.log_n > <F as FftField>::TWO_ADICITY {
            return Err(FriError::Params("log_n outside the field's two-adic range"));
        }
        if self.expansion < 2 || !self.expansion.is_power_of_two() {
            return Err(FriError::Params("expansion must be a power of two ≥ 2"));
        }
        if self.num_queries == 0 {
            return Err(FriError::Params("num_queries must be positive"));
        }
        if self.final_degree_bound == 0 || !self.final_degree_bound.is_power_of_two() {
            return Err(FriError::Params("final_degree_bound must be a power of two ≥ 1"));
        }
        let final_domain = (self.final_degree_bound as u64) * (self.expansion as u64);
        if !final_domain.is_power_of_two() || final_domain >= self.domain_size() {
            return Err(FriError::Params("final layer does not fit under the domain"));
        }
        Ok(())
    }
}

/// One layer of one query: the opened value, its pair, and both paths.
#[derive(Debug, Clone)]
pub struct FriQueryStep {
    pub value: F,
    pub pair_value: F,
    pub path: Vec<Digest32>,
    pub pair_path: Vec<Digest32>,
}

/// All layers of one query, outermost first.
#[derive(Debug, Clone)]
pub struct FriQuery {
    pub steps: Vec<FriQueryStep>,
}

/// A complete FRI proof.
#[derive(Debug, Clone)]
pub struct FriProof {
    /// Merkle roots of layers `0..num_layers`.
    pub layer_roots: Vec<Digest32>,
    /// Final-layer polynomial coefficients, low→high.
    pub final_poly: Vec<F>,
    /// One entry per derived query position, in derivation order.
    pub queries: Vec<FriQuery>,
}

/// FRI verification failures.
#[derive(Debug, thiserror::Error)]
pub enum FriError {
    /// Parameter set rejected before any cryptographic work.
    #[error("invalid FRI parameters: {0}")]
    Params(&'static str),
    /// Proof does not have the shape the parameters demand.
    #[error("malformed FRI proof: {0}")]
    Shape(&'static str),
    /// Final polynomial exceeds the pinned degree bound.
    #[error("final polynomial exceeds the degree bound")]
    DegreeBound,
    /// A Merkle inclusion check failed.
    #[error(transparent)]
    Merkle(#[from] MerkleError),
    /// Folding between two layers is inconsistent.
    #[error("fold mismatch at query {query}, layer {layer}")]
    Fold { query: usize, layer: usize },
    /// Final-layer evaluation disagrees with the folded value.
    #[error("final-layer mismatch at query {query}")]
    Final { query: usize },
}

/// Fold challenges and query positions replayed from the transcript.
#[derive(Debug, Clone)]
pub struct FriChallenges {
    pub fold: Vec<F>,
    pub positions: Vec<u64>,
}

/// Absorb the proof commitments in protocol order and derive challenges.
///
/// The transcript must already carry everything the protocol binds before
/// FRI starts (circuit id, public inputs, outer commitments).
pub fn replay(
    params: &FriParams,
    transcript: &mut Transcript,
    proof: &FriProof,
) -> Result<FriChallenges, FriError> {
    params.validate()?;
    let layers = params.num_layers() as usize;
    if proof.layer_roots.len() != layers {
        return Err(FriError::Shape("layer root count"));
    }
    if proof.final_poly.len() > params.final_degree_bound as usize {
        return Err(FriError::DegreeBound);
    }
    if proof.queries.len() != params.num_queries as usize {
        return Err(FriError::Shape("query count"));
    }

    let mut fold = Vec::with_capacity(layers);
    for root in &proof.layer_roots {
        transcript.absorb_bytes(FsLabel::FriLayerCommit, root);
        fold.push(transcript.challenge_fr(FsLabel::FriFold));
    }
    let mut final_bytes = Vec::with_capacity(32 * proof.final_poly.len());
    for c in &proof.final_poly {
        final_bytes.extend_from_slice(&fr_to_be_bytes(c));
    }
    transcript.absorb_bytes(FsLabel::FriFinal, &final_bytes);
    let positions = transcript.challenge_indices(
        FsLabel::QueryPositions,
        params.num_queries as usize,
        params.domain_size(),
    );
    Ok(FriChallenges { fold, positions })
}

/// Verify every query against the committed layers and the final polynomial.
pub fn verify_queries(
    params: &FriParams,
    offset: F,
    proof: &FriProof,
    challenges: &FriChallenges,
) -> Result<(), FriError> {
    let layers = params.num_layers() as usize;
    let n0 = params.domain_size();
    let g = F::get_root_of_unity(n0).ok_or(FriError::Params("domain has no root of unity"))?;
    let two_inv = F::from(2u64)
        .inverse()
        .ok_or(FriError::Params("characteristic two field"))?;

    for (qi, (query, &start)) in proof.queries.iter().zip(&challenges.positions).enumerate() {
        if query.steps.len() != layers {
            return Err(FriError::Shape("query layer count"));
        }
        let mut pos = start;
        let mut carried: Option<F> = None;
        for (li, step) in query.steps.iter().enumerate() {
            let n_i = n0 >> li;
            let half = n_i >> 1;
            let depth = (params.log_n as usize) - li;
            if step.path.len() != depth || step.pair_path.len() != depth {
                return Err(FriError::Shape("path depth"));
            }

            merkle::verify_path(params.hash, &proof.layer_roots[li], &[step.value], pos, &step.path)?;
            merkle::verify_path(
                params.hash,
                &proof.layer_roots[li],
                &[step.pair_value],
                pos ^ half,
                &step.pair_path,
            )?;

            // The opened value must agree with the fold of the previous layer.
            if let Some(expected) = carried {
                if step.value != expected {
                    return Err(FriError::Fold { query: qi, layer: li });
                }
            }

            // x is the domain point at `pos` in layer li.
            let layer_offset = offset.pow([1u64 << li]);
            let g_i = g.pow([1u64 << li]);
            let x = layer_offset * g_i.pow([pos]);
            let x_inv = x.inverse().ok_or(FriError::Params("zero domain point"))?;
            let even = (step.value + step.pair_value) * two_inv;
            let odd = (step.value - step.pair_value) * two_inv * x_inv;
            let folded = even + challenges.fold[li] * odd;

            pos &= half - 1;
            if li + 1 == layers {
                // Terminal low-degree check: the fold lands on the final
                // polynomial evaluated at x².
                let x_next = x.square();
                let eval = proof
                    .final_poly
                    .iter()
                    .rev()
                    .fold(F::zero(), |acc, c| acc * x_next + c);
                if eval != folded {
                    return Err(FriError::Final { query: qi });
                }
            } else {
                carried = Some(folded);
            }
        }
    }
    Ok(())
}
