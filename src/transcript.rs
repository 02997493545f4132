//! Fiat–Shamir transcript with domain separation
//!
//! A **deterministic, label-stable** Fiat–Shamir transform over SHA3-256 with
//! explicit domain-separation tags and length-delimited absorbs.
//!
//! ### Design
//! - **Stable labels.** Every absorb is prefixed by a fixed preamble and a
//!   round label drawn from [`FsLabel`], so the prover-side toolchain and
//!   this verifier replay the exact same byte schedule.
//! - **Length-delimited items.** All absorbs carry an explicit byte-length
//!   prefix to rule out concatenation ambiguity.
//! - **Clone-before-challenge.** Challenge derivation clones the running
//!   hash state; deriving a challenge never mutates the absorb schedule,
//!   only the local derivation counter advances.
//! - **Circuit binding.** The transcript preamble binds the protocol family
//!   *and* the circuit identifier, so transcripts of different circuits can
//!   never collide even under identical absorb schedules.
//!
//! Challenges are reduced into Fr from 64 uniformly-derived bytes, which
//! keeps the reduction bias negligible. Query-index derivation masks into a
//! power-of-two domain, which is exact (no rejection loop needed).

use ark_ff::PrimeField;
use ark_serialize::CanonicalSerialize;
use sha3::{Digest, Sha3_256};

use crate::F;

/// Canonical round labels, shared by every protocol family in the crate.
///
/// The stringified labels are part of the transcript's **stable** domain
/// separation. Adding variants is backward-compatible; renaming existing
/// ones is not.
#[derive(Clone, Copy, Debug)]
pub enum FsLabel {
    /// Binds the verifying-key hash into the preamble.
    VkBind,
    /// One public input element.
    PublicInput,
    /// Wire commitments (PLONK A/B/C).
    WireCommit,
    /// Permutation accumulator commitment (PLONK Z).
    PermZCommit,
    /// Quotient commitments (PLONK T1/T2/T3).
    QuotientCommit,
    /// Published evaluations batch.
    EvalBatch,
    /// Opening-proof commitments (PLONK Wξ/Wξω).
    OpeningCommit,
    /// Trace commitment root (STARK).
    TraceCommit,
    /// Constraint-composition mixing challenges (STARK).
    ConstraintMix,
    /// FRI layer commitment root.
    FriLayerCommit,
    /// FRI fold challenge.
    FriFold,
    /// FRI final-layer polynomial.
    FriFinal,
    /// FRI query positions.
    QueryPositions,
    /// Permutation challenge β.
    Beta,
    /// Permutation challenge γ.
    Gamma,
    /// Constraint-combination challenge α.
    Alpha,
    /// Evaluation point ζ.
    Zeta,
    /// Opening-batch challenge v.
    AggV,
    /// Multi-point batch challenge u.
    AggU,
}

impl FsLabel {
    /// Stable wire spelling of the label.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            FsLabel::VkBind => "vk_bind",
            FsLabel::PublicInput => "public_input",
            FsLabel::WireCommit => "wire_commit",
            FsLabel::PermZCommit => "perm_z_commit",
            FsLabel::QuotientCommit => "quotient_commit",
            FsLabel::EvalBatch => "eval_batch",
            FsLabel::OpeningCommit => "opening_commit",
            FsLabel::TraceCommit => "trace_commit",
            FsLabel::ConstraintMix => "constraint_mix",
            FsLabel::FriLayerCommit => "fri_layer_commit",
            FsLabel::FriFold => "fri_fold",
            FsLabel::FriFinal => "fri_final",
            FsLabel::QueryPositions => "query_positions",
            FsLabel::Beta => "beta",
            FsLabel::Gamma => "gamma",
            FsLabel::Alpha => "alpha",
            FsLabel::Zeta => "zeta",
            FsLabel::AggV => "agg_v",
            FsLabel::AggU => "agg_u",
        }
    }
}

/// Fiat–Shamir transcript with domain separation (SHA3-256 based).
pub struct Transcript {
    /// Protocol-family label (e.g. `"PLONK/KZG/v1"`).
    family: &'static str,
    /// Running hash state.
    hasher: Sha3_256,
    /// Monotone counter for challenge derivations.
    ctr: u64,
}

impl Transcript {
    /// Create a transcript bound to a protocol `family` and a `circuit_id`.
    pub fn new(family: &'static str, circuit_id: &str) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(b"proofgate.transcript.v1");
        hasher.update(family.as_bytes());
        hasher.update(b":circuit:");
        hasher.update(&(circuit_id.len() as u64).to_be_bytes());
        hasher.update(circuit_id.as_bytes());
        Self { family, hasher, ctr: 0 }
    }

    // ---------------------------- Absorb ----------------------------

    /// Absorb an arbitrary byte slice (length-delimited).
    pub fn absorb_bytes(&mut self, label: FsLabel, bytes: &[u8]) {
        self.hasher.update(b"item:");
        self.hasher.update(label.as_str().as_bytes());
        self.hasher.update(b":len:");
        self.hasher.update(&(bytes.len() as u64).to_be_bytes());
        self.hasher.update(b":data:");
        self.hasher.update(bytes);
    }

    /// Absorb a scalar using its compressed canonical serialization.
    #[inline]
    pub fn absorb_scalar(&mut self, label: FsLabel, x: &F) {
        let mut bytes = Vec::new();
        x.serialize_compressed(&mut bytes).expect("serialize field");
        self.absorb_bytes(label, &bytes);
    }

    /// Absorb a G1 point using **compressed** canonical encoding.
    ///
    /// The compressed form carries the infinity flag, so the identity has
    /// its own unambiguous encoding.
    pub fn absorb_g1(&mut self, label: FsLabel, p: &crate::G1) {
        let mut bytes = Vec::with_capacity(32);
        p.serialize_compressed(&mut bytes).expect("serialize G1");
        self.absorb_bytes(label, &bytes);
    }

    /// Absorb a big-endian counter (sizes, indices).
    #[inline]
    pub fn absorb_u64(&mut self, label: FsLabel, v: u64) {
        self.absorb_bytes(label, &v.to_be_bytes());
    }

    // ---------------------------- Challenge ----------------------------

    /// Derive a single field challenge.
    pub fn challenge_fr(&mut self, label: FsLabel) -> F {
        let wide = self.challenge_wide(label.as_str());
        F::from_be_bytes_mod_order(&wide)
    }

    /// Derive `k` field challenges under one label.
    pub fn challenge_many(&mut self, label: FsLabel, k: usize) -> Vec<F> {
        (0..k).map(|_| self.challenge_fr(label)).collect()
    }

    /// Derive `count` query indices in `[0, domain_size)`.
    ///
    /// `domain_size` must be a power of two; masking is then an exact
    /// uniform reduction.
    pub fn challenge_indices(&mut self, label: FsLabel, count: usize, domain_size: u64) -> Vec<u64> {
        debug_assert!(domain_size.is_power_of_two());
        let mask = domain_size - 1;
        (0..count)
            .map(|_| {
                let wide = self.challenge_wide(label.as_str());
                let mut eight = [0u8; 8];
                eight.copy_from_slice(&wide[..8]);
                u64::from_be_bytes(eight) & mask
            })
            .collect()
    }

    /// Derive 64 bytes from a clone of the running state.
    ///
    /// Cloning keeps challenge derivation a pure function of the absorb
    /// schedule and the `(label, ctr)` tuple.
    fn challenge_wide(&mut self, label: &'static str) -> [u8; 64] {
        let mut out = [0u8; 64];
        for (block, chunk) in out.chunks_mut(32).enumerate() {
            let mut h = self.hasher.clone();
            h.update(b"challenge:");
            h.update(self.family.as_bytes());
            h.update(b":label:");
            h.update(label.as_bytes());
            h.update(b":ctr:");
            h.update(&self.ctr.to_be_bytes());
            h.update(&[block as u8]);
            chunk.copy_from_slice(&h.finalize());
        }
        self.ctr = self.ctr.wrapping_add(1);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::AffineRepr;

    #[test]
    fn same_schedule_same_challenge() {
        let mut t1 = Transcript::new("TEST/v1", "c@1");
        let mut t2 = Transcript::new("TEST/v1", "c@1");
        t1.absorb_bytes(FsLabel::VkBind, b"hdr");
        t2.absorb_bytes(FsLabel::VkBind, b"hdr");
        assert_eq!(t1.challenge_fr(FsLabel::Alpha), t2.challenge_fr(FsLabel::Alpha));
    }

    #[test]
    fn label_separates_absorbs() {
        let mut t1 = Transcript::new("TEST/v1", "c@1");
        let mut t2 = Transcript::new("TEST/v1", "c@1");
        t1.absorb_bytes(FsLabel::VkBind, b"hdr");
        t2.absorb_bytes(FsLabel::WireCommit, b"hdr");
        assert_ne!(t1.challenge_fr(FsLabel::Alpha), t2.challenge_fr(FsLabel::Alpha));
    }

    #[test]
    fn circuit_id_separates_transcripts() {
        let mut t1 = Transcript::new("TEST/v1", "counter_groth16_bn254@1");
        let mut t2 = Transcript::new("TEST/v1", "counter_groth16_bn254@2");
        assert_ne!(t1.challenge_fr(FsLabel::Beta), t2.challenge_fr(FsLabel::Beta));
    }

    #[test]
    fn challenges_advance_the_counter() {
        let mut t = Transcript::new("TEST/v1", "c@1");
        let a = t.challenge_fr(FsLabel::Beta);
        let b = t.challenge_fr(FsLabel::Beta);
        assert_ne!(a, b);
    }

    #[test]
    fn challenge_does_not_consume_absorb_state() {
        let mut t1 = Transcript::new("TEST/v1", "c@1");
        let mut t2 = Transcript::new("TEST/v1", "c@1");
        // Deriving an extra challenge advances the counter but must not
        // change what a later absorb+challenge pair sees in the hash state.
        let _ = t1.challenge_fr(FsLabel::Beta);
        let _ = t2.challenge_fr(FsLabel::Beta);
        t1.absorb_bytes(FsLabel::EvalBatch, b"e");
        t2.absorb_bytes(FsLabel::EvalBatch, b"e");
        assert_eq!(t1.challenge_fr(FsLabel::Gamma), t2.challenge_fr(FsLabel::Gamma));
    }

    #[test]
    fn indices_land_in_domain() {
        let mut t = Transcript::new("TEST/v1", "c@1");
        let idx = t.challenge_indices(FsLabel::QueryPositions, 64, 1 << 16);
        assert_eq!(idx.len(), 64);
        assert!(idx.iter().all(|&i| i < (1 << 16)));
    }

    #[test]
    fn identity_point_absorb_is_distinct() {
        // Compressed encodings keep the identity distinguishable from any
        // finite point.
        let mut t1 = Transcript::new("TEST/v1", "c@1");
        let mut t2 = Transcript::new("TEST/v1", "c@1");
        t1.absorb_g1(FsLabel::WireCommit, &crate::G1::zero());
        t2.absorb_g1(FsLabel::WireCommit, &crate::G1::generator());
        assert_ne!(t1.challenge_fr(FsLabel::Beta), t2.challenge_fr(FsLabel::Beta));
    }
}
