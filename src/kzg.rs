//! KZG opening checks on BN254
//!
//! Verifies that a polynomial committed as `C ∈ G1` evaluates to `y` at `x`,
//! given the opening witness `π ∈ G1` and the SRS element `[s]₂ ∈ G2` pinned
//! by the verifying key.
//!
//! The single-opening equation `e(C − [y]₁, [1]₂) = e(π, [s − x]₂)` is
//! checked in the equivalent two-pairing form
//! `e(π, [s]₂) = e(C − [y]₁ + x·π, [1]₂)`, which avoids a G2 scalar
//! multiplication per opening. The degree bound is enforced by the SRS the
//! VK pins, never by the proof.

use ark_bn254::{Bn254, G1Projective};
use ark_ec::pairing::Pairing;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::One;

use crate::curve::{validate_g1, validate_g2, CurveError, IdentityPolicy};
use crate::{F, G1, G2};

/// The two G2 elements a KZG verifier needs.
#[derive(Debug, Clone, Copy)]
pub struct KzgVk {
    /// Generator `[1]₂`.
    pub g2_gen: G2,
    /// SRS element `[s]₂`.
    pub g2_s: G2,
}

impl KzgVk {
    /// Build a VK from the pinned `[s]₂`, using the curve's fixed generator.
    pub fn new(g2_s: G2) -> Result<Self, KzgError> {
        let vk = Self { g2_gen: G2::generator(), g2_s };
        validate_g2(&vk.g2_s, IdentityPolicy::Forbid, "kzg [s]_2")?;
        Ok(vk)
    }
}

/// KZG verification failures.
#[derive(Debug, thiserror::Error)]
pub enum KzgError {
    /// A point failed curve/subgroup/identity admission.
    #[error(transparent)]
    Curve(#[from] CurveError),
    /// All points admitted but the pairing equation is false.
    #[error("kzg opening equation failed")]
    Equation,
}

/// Check `e(lhs, [s]₂) = e(rhs, [1]₂)`.
///
/// This is the terminal pairing form shared by the single opening check and
/// PLONK's batched `F`/`E` check.
pub fn check_pairing_pair(vk: &KzgVk, lhs: G1, rhs: G1) -> bool {
    let a_all: Vec<<Bn254 as Pairing>::G1Prepared> = vec![lhs.into(), (-rhs).into()];
    let b_all: Vec<<Bn254 as Pairing>::G2Prepared> = vec![vk.g2_s.into(), vk.g2_gen.into()];
    let mlo = Bn254::multi_miller_loop(a_all, b_all);
    match Bn254::final_exponentiation(mlo) {
        Some(fe) => fe.0.is_one(),
        None => false,
    }
}

/// Verify a single opening: `C` evaluates to `y` at `x`, witnessed by `proof`.
///
/// `C` and `proof` may be the identity (commitments to the zero polynomial
/// and openings of constant polynomials are legitimate); both are re-checked
/// for curve and subgroup membership before any pairing runs.
pub fn verify_opening(vk: &KzgVk, commitment: G1, x: F, y: F, proof: G1) -> Result<(), KzgError> {
    validate_g1(&commitment, IdentityPolicy::Allow, "kzg commitment")?;
    validate_g1(&proof, IdentityPolicy::Allow, "kzg opening witness")?;

    // rhs = C − y·[1]₁ + x·π
    let rhs: G1Projective = commitment.into_group() - G1::generator() * y + proof * x;
    if check_pairing_pair(vk, proof, rhs.into_affine()) {
        Ok(())
    } else {
        Err(KzgError::Equation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ff::{Field, One, UniformRand, Zero};
    use rand::{rngs::StdRng, SeedableRng};

    /// Test-only trapdoor SRS: with `s` known, committing to a polynomial is
    /// evaluating it at `s`, and opening witnesses come from the quotient
    /// value `(p(s) − p(x)) / (s − x)`.
    struct DevSrs {
        s: F,
        vk: KzgVk,
    }

    impl DevSrs {
        fn new(seed: u64) -> Self {
            let mut rng = StdRng::seed_from_u64(seed);
            let s = F::rand(&mut rng);
            let vk = KzgVk::new((G2::generator() * s).into_affine()).unwrap();
            Self { s, vk }
        }

        fn commit_eval(&self, value_at_s: F) -> G1 {
            (G1::generator() * value_at_s).into_affine()
        }
    }

    /// Evaluate a coefficient polynomial (low→high) via Horner.
    fn eval_poly(coeffs: &[F], x: F) -> F {
        coeffs.iter().rev().fold(F::zero(), |acc, c| acc * x + c)
    }

    #[test]
    fn honest_opening_verifies() {
        let srs = DevSrs::new(7);
        let poly = [F::from(3u64), F::from(1u64), F::from(4u64), F::from(1u64)];
        let x = F::from(5u64);
        let y = eval_poly(&poly, x);
        let c = srs.commit_eval(eval_poly(&poly, srs.s));
        let witness_value = (eval_poly(&poly, srs.s) - y)
            * (srs.s - x).inverse().expect("s != x with overwhelming probability");
        let proof = srs.commit_eval(witness_value);
        assert!(verify_opening(&srs.vk, c, x, y, proof).is_ok());
    }

    #[test]
    fn wrong_value_fails() {
        let srs = DevSrs::new(7);
        let poly = [F::from(3u64), F::from(1u64), F::from(4u64)];
        let x = F::from(5u64);
        let y = eval_poly(&poly, x) + F::one();
        let c = srs.commit_eval(eval_poly(&poly, srs.s));
        let witness_value =
            (eval_poly(&poly, srs.s) - eval_poly(&poly, x)) * (srs.s - x).inverse().unwrap();
        let proof = srs.commit_eval(witness_value);
        assert!(matches!(
            verify_opening(&srs.vk, c, x, y, proof),
            Err(KzgError::Equation)
        ));
    }

    #[test]
    fn zero_polynomial_commitment_opens_to_zero() {
        let srs = DevSrs::new(9);
        // C = identity, y = 0, witness = identity.
        let c = G1::zero();
        let proof = G1::zero();
        assert!(verify_opening(&srs.vk, c, F::from(123u64), F::zero(), proof).is_ok());
    }

    #[test]
    fn degenerate_srs_is_rejected() {
        assert!(matches!(
            KzgVk::new(G2::zero()),
            Err(KzgError::Curve(CurveError::IdentityPoint { .. }))
        ));
    }
}
