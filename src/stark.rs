//! STARK verification: Merkle-committed trace, AIR constraints, FRI finish
//!
//! The proof commits to the low-degree extension of the execution trace and
//! to a **constraint composition** vector; the composition commitment doubles
//! as FRI layer 0. At every transcript-derived query position the verifier:
//!
//! 1. checks Merkle inclusion of the trace row and of the *next* trace row
//!    (one trace step later, `index + expansion` in LDE index space),
//! 2. recomputes the composition value from the opened rows, the AIR, and
//!    the transcript-derived mixing challenges:
//!    `Σ αⱼ·Cⱼ(row,next)·(x − g_T^{T−1})/Z_T(x) + Σ β_b·(row[r] − v)/(x − g_T^s)`
//!    (the transition part carries the standard last-row exemption),
//! 3. compares it against the FRI layer-0 opening at that position.
//!
//! FRI then attests that the committed composition is low-degree, which is
//! exactly what fails when any constraint is violated on the trace. The
//! LDE lives on the coset `offset·⟨g⟩`, so no denominator above can vanish.
//! FRI certifies degree < N/expansion = T; with the exemption factor, AIRs
//! whose transition constraints are linear in the register references stay
//! under that bound.

use ark_ff::{FftField, Field, Zero};

use crate::air::Air;
use crate::fri::{self, FriError, FriParams, FriProof};
use crate::merkle::{self, Digest32, MerkleError};
use crate::transcript::{FsLabel, Transcript};
use crate::F;

/// Floor on the query count when policy does not configure one.
pub const DEFAULT_MIN_QUERIES: u32 = 16;

/// STARK verifying key: the AIR plus the pinned FRI parameter set.
#[derive(Debug, Clone)]
pub struct StarkVk {
    /// Constraint system.
    pub air: Air,
    /// FRI parameters (domain size, expansion, queries, hash).
    pub fri: FriParams,
    /// LDE coset offset.
    pub offset: F,
}

/// Opened trace rows for one query position.
#[derive(Debug, Clone)]
pub struct TraceOpening {
    /// Register row at the queried LDE index.
    pub row: Vec<F>,
    /// Register row one trace step later.
    pub next_row: Vec<F>,
    /// Inclusion path of `row`.
    pub path: Vec<Digest32>,
    /// Inclusion path of `next_row`.
    pub next_path: Vec<Digest32>,
}

/// A complete STARK proof.
#[derive(Debug, Clone)]
pub struct StarkProof {
    /// Merkle root of the trace LDE.
    pub trace_root: Digest32,
    /// One opening per derived query position, in derivation order.
    pub trace_openings: Vec<TraceOpening>,
    /// FRI proof; `layer_roots[0]` is the composition commitment.
    pub fri: FriProof,
}

/// STARK verification failures.
#[derive(Debug, thiserror::Error)]
pub enum StarkError {
    /// VK parameters are mutually inconsistent.
    #[error("invalid STARK parameters: {0}")]
    Params(&'static str),
    /// Query count below the configured soundness floor.
    #[error("{got} FRI queries below the configured minimum {min}")]
    QueryFloor {
        /// Configured minimum.
        min: u32,
        /// Pinned query count.
        got: u32,
    },
    /// Proof shape does not match the parameters.
    #[error("malformed STARK proof: {0}")]
    Shape(&'static str),
    /// A trace inclusion path failed.
    #[error(transparent)]
    Merkle(#[from] MerkleError),
    /// The FRI phase failed.
    #[error(transparent)]
    Fri(#[from] FriError),
    /// Committed composition value disagrees with the AIR at a query.
    #[error("constraint composition mismatch at query {query}")]
    Composition {
        /// Offending query index.
        query: usize,
    },
}

/// Verify a STARK proof against its VK and public inputs.
///
/// `min_queries` comes from policy; [`DEFAULT_MIN_QUERIES`] when unset.
pub fn verify(
    vk: &StarkVk,
    proof: &StarkProof,
    public_inputs: &[F],
    circuit_id: &str,
    min_queries: u32,
) -> Result<(), StarkError> {
    vk.fri.validate()?;
    if vk.fri.num_queries < min_queries {
        return Err(StarkError::QueryFloor { min: min_queries, got: vk.fri.num_queries });
    }
    let n = vk.fri.domain_size();
    let t_len = vk.air.trace_length;
    if t_len.saturating_mul(vk.fri.expansion as u64) != n {
        return Err(StarkError::Params("trace_length · expansion must equal the domain size"));
    }
    if proof.trace_openings.len() != vk.fri.num_queries as usize {
        return Err(StarkError::Shape("trace opening count"));
    }

    // Transcript: circuit label, public inputs, trace commitment, then the
    // constraint-mixing challenges, then the FRI schedule.
    let mut transcript = Transcript::new("STARK/FRI/v1", circuit_id);
    for x in public_inputs {
        transcript.absorb_scalar(FsLabel::PublicInput, x);
    }
    transcript.absorb_bytes(FsLabel::TraceCommit, &proof.trace_root);
    let alphas = transcript.challenge_many(FsLabel::ConstraintMix, vk.air.num_transition());
    let betas = transcript.challenge_many(FsLabel::ConstraintMix, vk.air.boundary().len());
    let challenges = fri::replay(&vk.fri, &mut transcript, &proof.fri)?;

    let g = F::get_root_of_unity(n).ok_or(StarkError::Params("domain has no root of unity"))?;
    let g_trace = g.pow([vk.fri.expansion as u64]);
    let last_row_point = g_trace.pow([t_len - 1]);
    let depth = vk.fri.log_n as usize;

    for (qi, (opening, &pos)) in proof.trace_openings.iter().zip(&challenges.positions).enumerate()
    {
        if opening.row.len() != vk.air.registers || opening.next_row.len() != vk.air.registers {
            return Err(StarkError::Shape("trace row arity"));
        }
        if opening.path.len() != depth || opening.next_path.len() != depth {
            return Err(StarkError::Shape("trace path depth"));
        }
        let next_pos = (pos + vk.fri.expansion as u64) & (n - 1);
        merkle::verify_path(vk.fri.hash, &proof.trace_root, &opening.row, pos, &opening.path)?;
        merkle::verify_path(
            vk.fri.hash,
            &proof.trace_root,
            &opening.next_row,
            next_pos,
            &opening.next_path,
        )?;

        // x is the LDE point at `pos`; the coset offset keeps every
        // denominator below nonzero.
        let x = vk.offset * g.pow([pos]);
        let z_trace = x.pow([t_len]) - F::from(1u64);
        let z_inv = z_trace
            .inverse()
            .ok_or(StarkError::Params("query point on the trace domain"))?;

        let mut transition = F::zero();
        for (j, alpha) in alphas.iter().enumerate() {
            transition += *alpha * vk.air.eval_transition(j, &opening.row, &opening.next_row);
        }
        let mut expected = transition * (x - last_row_point) * z_inv;
        for ((reg, step, value), beta) in vk.air.boundary().iter().zip(&betas) {
            let denom_inv = (x - g_trace.pow([*step]))
                .inverse()
                .ok_or(StarkError::Params("query point on the trace domain"))?;
            expected += *beta * (opening.row[*reg] - value) * denom_inv;
        }

        let committed = proof.fri.queries[qi]
            .steps
            .first()
            .ok_or(StarkError::Shape("empty FRI query"))?
            .value;
        if committed != expected {
            return Err(StarkError::Composition { query: qi });
        }
    }

    fri::verify_queries(&vk.fri, vk.offset, &proof.fri, &challenges)?;
    Ok(())
}
