//! PLONK verification with KZG openings over BN254
//!
//! Follows the batched-opening verifier of the PLONK paper as toolchains
//! ship it: parse nine G1 commitments and six evaluations, replay the
//! Fiat–Shamir schedule, rebuild the linearization commitment `[D]₁`, fold
//! everything into the two aggregates `F` and `E`, and finish with a single
//! two-pairing check against the pinned `[s]₂`.
//!
//! ### Challenge schedule (pinned)
//!
//! ```text
//! bind vk_hash, public inputs
//! absorb A, B, C        → β, γ
//! absorb Z              → α
//! absorb T1, T2, T3     → ζ
//! absorb all six evals  → v
//! absorb Wξ, Wξω        → u
//! ```
//!
//! The ordering is load-bearing: a transcript that derives γ before β, or u
//! before the opening commitments, accepts a different proof population.
//! `challenge_schedule_is_ordered` pins it at the vector level.

use ark_bn254::G1Projective;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::{Field, One, Zero};

use crate::hashing::HashId;
use crate::kzg::{check_pairing_pair, KzgError, KzgVk};
use crate::transcript::{FsLabel, Transcript};
use crate::{F, G1, G2};

/// Number of KZG openings a batched PLONK proof carries (Wξ and Wξω).
pub const KZG_OPENINGS: u64 = 2;

/// PLONK verifying key, point-admitted by the adapter.
#[derive(Debug, Clone)]
pub struct PlonkVk {
    /// Domain size (number of gates), a power of two.
    pub n: u64,
    /// Number of public inputs.
    pub num_public_inputs: usize,
    /// Domain generator ω of order `n`.
    pub omega: F,
    /// Coset shifts of the copy-constraint argument.
    pub k1: F,
    /// Second coset shift.
    pub k2: F,
    /// Selector commitments.
    pub qm: G1,
    /// Left selector.
    pub ql: G1,
    /// Right selector.
    pub qr: G1,
    /// Output selector.
    pub qo: G1,
    /// Constant selector.
    pub qc: G1,
    /// Permutation commitments.
    pub s1: G1,
    /// Second permutation commitment.
    pub s2: G1,
    /// Third permutation commitment.
    pub s3: G1,
    /// SRS element `[s]₂`.
    pub x2: G2,
}

/// PLONK proof, point-admitted by the adapter.
#[derive(Debug, Clone)]
pub struct PlonkProof {
    /// Wire commitments.
    pub a: G1,
    /// Right wire commitment.
    pub b: G1,
    /// Output wire commitment.
    pub c: G1,
    /// Permutation accumulator commitment.
    pub z: G1,
    /// Quotient commitment parts.
    pub t1: G1,
    /// Middle quotient part.
    pub t2: G1,
    /// High quotient part.
    pub t3: G1,
    /// Opening witness at ζ.
    pub wxi: G1,
    /// Opening witness at ζω.
    pub wxiw: G1,
    /// Evaluation `a(ζ)`.
    pub eval_a: F,
    /// Evaluation `b(ζ)`.
    pub eval_b: F,
    /// Evaluation `c(ζ)`.
    pub eval_c: F,
    /// Evaluation `Sσ1(ζ)`.
    pub eval_s1: F,
    /// Evaluation `Sσ2(ζ)`.
    pub eval_s2: F,
    /// Evaluation `z(ζω)`.
    pub eval_zw: F,
}

/// PLONK verification failures.
#[derive(Debug, thiserror::Error)]
pub enum PlonkError {
    /// Public-input count differs from the VK.
    #[error("expected {expected} public inputs, got {got}")]
    InputCount {
        /// VK-pinned count.
        expected: usize,
        /// Supplied count.
        got: usize,
    },
    /// ζ landed on the evaluation domain (vanishing denominator).
    #[error("evaluation challenge degenerated onto the domain")]
    DegenerateChallenge,
    /// SRS element failed admission.
    #[error(transparent)]
    Kzg(#[from] KzgError),
    /// Terminal pairing check failed.
    #[error("plonk pairing equation failed")]
    Equation,
}

/// The full Fiat–Shamir challenge set in derivation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Challenges {
    pub beta: F,
    pub gamma: F,
    pub alpha: F,
    pub zeta: F,
    pub v: F,
    pub u: F,
}

/// Replay the pinned schedule over the public envelope data.
pub(crate) fn derive_challenges(
    circuit_id: &str,
    vk_hash: &HashId,
    proof: &PlonkProof,
    public_inputs: &[F],
) -> Challenges {
    let mut t = Transcript::new("PLONK/KZG/v1", circuit_id);
    t.absorb_bytes(FsLabel::VkBind, vk_hash.to_string().as_bytes());
    for x in public_inputs {
        t.absorb_scalar(FsLabel::PublicInput, x);
    }
    t.absorb_g1(FsLabel::WireCommit, &proof.a);
    t.absorb_g1(FsLabel::WireCommit, &proof.b);
    t.absorb_g1(FsLabel::WireCommit, &proof.c);
    let beta = t.challenge_fr(FsLabel::Beta);
    let gamma = t.challenge_fr(FsLabel::Gamma);
    t.absorb_g1(FsLabel::PermZCommit, &proof.z);
    let alpha = t.challenge_fr(FsLabel::Alpha);
    t.absorb_g1(FsLabel::QuotientCommit, &proof.t1);
    t.absorb_g1(FsLabel::QuotientCommit, &proof.t2);
    t.absorb_g1(FsLabel::QuotientCommit, &proof.t3);
    let zeta = t.challenge_fr(FsLabel::Zeta);
    for e in [
        proof.eval_a,
        proof.eval_b,
        proof.eval_c,
        proof.eval_s1,
        proof.eval_s2,
        proof.eval_zw,
    ] {
        t.absorb_scalar(FsLabel::EvalBatch, &e);
    }
    let v = t.challenge_fr(FsLabel::AggV);
    t.absorb_g1(FsLabel::OpeningCommit, &proof.wxi);
    t.absorb_g1(FsLabel::OpeningCommit, &proof.wxiw);
    let u = t.challenge_fr(FsLabel::AggU);
    Challenges { beta, gamma, alpha, zeta, v, u }
}

/// Verify a PLONK proof against its VK and public inputs.
pub fn verify(
    vk: &PlonkVk,
    proof: &PlonkProof,
    public_inputs: &[F],
    circuit_id: &str,
    vk_hash: &HashId,
) -> Result<(), PlonkError> {
    if public_inputs.len() != vk.num_public_inputs {
        return Err(PlonkError::InputCount {
            expected: vk.num_public_inputs,
            got: public_inputs.len(),
        });
    }
    let kzg_vk = KzgVk::new(vk.x2)?;
    let ch = derive_challenges(circuit_id, vk_hash, proof, public_inputs);
    let Challenges { beta, gamma, alpha, zeta, v, u } = ch;

    // Vanishing polynomial and Lagrange evaluations at ζ.
    let zeta_n = zeta.pow([vk.n]);
    let zh = zeta_n - F::one();
    let n_f = F::from(vk.n);
    let mut lagrange = Vec::with_capacity(public_inputs.len().max(1));
    let mut omega_i = F::one();
    for _ in 0..public_inputs.len().max(1) {
        let denom = n_f * (zeta - omega_i);
        let inv = denom.inverse().ok_or(PlonkError::DegenerateChallenge)?;
        lagrange.push(omega_i * zh * inv);
        omega_i *= vk.omega;
    }
    let l1 = lagrange[0];

    // PI(ζ) = −Σ wᵢ·Lᵢ(ζ)
    let mut pi = F::zero();
    for (w, l) in public_inputs.iter().zip(&lagrange) {
        pi -= *w * l;
    }

    // Constant part of the linearization.
    let alpha_sq = alpha.square();
    let r0 = pi
        - l1 * alpha_sq
        - alpha
            * (proof.eval_a + beta * proof.eval_s1 + gamma)
            * (proof.eval_b + beta * proof.eval_s2 + gamma)
            * (proof.eval_c + gamma)
            * proof.eval_zw;

    // Linearization commitment [D]₁.
    let mut d: G1Projective = vk.qm * (proof.eval_a * proof.eval_b);
    d += vk.ql * proof.eval_a;
    d += vk.qr * proof.eval_b;
    d += vk.qo * proof.eval_c;
    d += vk.qc.into_group();
    let z_coef = (proof.eval_a + beta * zeta + gamma)
        * (proof.eval_b + beta * vk.k1 * zeta + gamma)
        * (proof.eval_c + beta * vk.k2 * zeta + gamma)
        * alpha
        + l1 * alpha_sq
        + u;
    d += proof.z * z_coef;
    let s3_coef = (proof.eval_a + beta * proof.eval_s1 + gamma)
        * (proof.eval_b + beta * proof.eval_s2 + gamma)
        * alpha
        * beta
        * proof.eval_zw;
    d -= vk.s3 * s3_coef;
    d -= (proof.t1.into_group() + proof.t2 * zeta_n + proof.t3 * zeta_n.square()) * zh;

    // Aggregates F and E.
    let mut f = d;
    let mut v_pow = v;
    for comm in [proof.a, proof.b, proof.c, vk.s1, vk.s2] {
        f += comm * v_pow;
        v_pow *= v;
    }
    let mut e_scalar = -r0 + u * proof.eval_zw;
    let mut v_pow = v;
    for eval in [proof.eval_a, proof.eval_b, proof.eval_c, proof.eval_s1, proof.eval_s2] {
        e_scalar += eval * v_pow;
        v_pow *= v;
    }
    let e = G1::generator() * e_scalar;

    // e(Wξ + u·Wξω, [s]₂) = e(ζ·Wξ + uζω·Wξω + F − E, [1]₂)
    let lhs = (proof.wxi.into_group() + proof.wxiw * u).into_affine();
    let rhs = (proof.wxi * zeta + proof.wxiw * (u * zeta * vk.omega) + f - e).into_affine();
    if check_pairing_pair(&kzg_vk, lhs, rhs) {
        Ok(())
    } else {
        Err(PlonkError::Equation)
    }
}
