//! Groth16 verification over BN254
//!
//! Given VK elements `(α∈G1, β∈G2, γ∈G2, δ∈G2, IC)`, proof `(A, B, C)` and
//! public inputs `x₁..xₙ`, accept iff
//!
//! ```text
//! e(A, B) = e(α, β) · e(vk_x, γ) · e(C, δ),   vk_x = ic₀ + Σ xᵢ·icᵢ
//! ```
//!
//! The IC length pins the public-input count. Identity points are rejected
//! in `A`, `B`, `C` and in the four named VK elements (the stricter of the
//! two rules audited implementations disagree on); IC entries may be the
//! identity because they only feed the multi-scalar multiplication.

use ark_bn254::G1Projective;
use ark_ec::CurveGroup;

use crate::curve::{g1_msm, pairing_product_is_one};
use crate::{F, G1, G2};

/// Groth16 verifying key, already point-admitted by the adapter.
#[derive(Debug, Clone)]
pub struct Groth16Vk {
    /// `α ∈ G1`.
    pub alpha_g1: G1,
    /// `β ∈ G2`.
    pub beta_g2: G2,
    /// `γ ∈ G2`.
    pub gamma_g2: G2,
    /// `δ ∈ G2`.
    pub delta_g2: G2,
    /// `IC = [ic₀, …, icₙ]`; length is public-input count plus one.
    pub ic: Vec<G1>,
}

/// Groth16 proof, already point-admitted by the adapter.
#[derive(Debug, Clone)]
pub struct Groth16Proof {
    /// `A ∈ G1`.
    pub a: G1,
    /// `B ∈ G2`.
    pub b: G2,
    /// `C ∈ G1`.
    pub c: G1,
}

/// Groth16 verification failures.
#[derive(Debug, thiserror::Error)]
pub enum Groth16Error {
    /// The VK carried no IC elements at all.
    #[error("verifying key has an empty IC vector")]
    EmptyIc,
    /// Public-input count differs from what the IC pins.
    #[error("expected {expected} public inputs, got {got}")]
    InputCount {
        /// `IC.len() − 1`.
        expected: usize,
        /// Supplied count.
        got: usize,
    },
    /// Points admitted but the pairing equation is false.
    #[error("groth16 pairing equation failed")]
    Equation,
}

/// Run the verification equation.
pub fn verify(
    vk: &Groth16Vk,
    proof: &Groth16Proof,
    public_inputs: &[F],
) -> Result<(), Groth16Error> {
    if vk.ic.is_empty() {
        return Err(Groth16Error::EmptyIc);
    }
    let expected = vk.ic.len() - 1;
    if public_inputs.len() != expected {
        return Err(Groth16Error::InputCount { expected, got: public_inputs.len() });
    }

    let mut vk_x: G1Projective = vk.ic[0].into();
    vk_x += g1_msm(&vk.ic[1..], public_inputs);
    let vk_x = vk_x.into_affine();

    // e(−A, B) · e(α, β) · e(vk_x, γ) · e(C, δ) = 1
    let ok = pairing_product_is_one(&[
        (-proof.a, proof.b),
        (vk.alpha_g1, vk.beta_g2),
        (vk_x, vk.gamma_g2),
        (proof.c, vk.delta_g2),
    ]);
    if ok {
        Ok(())
    } else {
        Err(Groth16Error::Equation)
    }
}
