//! BN254 admission layer: canonical scalars, validated points, pairings
//!
//! Everything entering the verifiers passes through here first. The checks
//! are layered the same way on both groups:
//!
//! 1. **Format** — fixed-width big-endian bytes for Fr, shortest-form decimal
//!    strings for Fq coordinates; anything else is rejected before parsing.
//! 2. **Range** — values at or above the field prime are non-canonical and
//!    rejected (no silent reduction).
//! 3. **Curve** — the affine coordinates must satisfy the curve equation.
//! 4. **Subgroup** — the point must lie in the prime-order subgroup used by
//!    the pairing (trivial for G1 on BN254, real work for G2).
//!
//! Identity handling is the caller's decision via [`IdentityPolicy`]; the
//! per-kind verifiers pick the rule their scheme requires.

use ark_bn254::{Bn254, G1Projective};
use ark_ec::pairing::Pairing;
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, Field, One, PrimeField, Zero};

use crate::{Fq, Fq2, F, G1, G2};

/// Whether the identity element is admissible for a given slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityPolicy {
    /// Reject the point at infinity.
    Forbid,
    /// Accept the point at infinity (e.g. commitments to zero polynomials).
    Allow,
}

/// Admission failures for scalars and points.
#[derive(Debug, thiserror::Error)]
pub enum CurveError {
    /// Scalar byte string was not exactly the canonical width.
    #[error("scalar must be exactly 32 bytes, got {got}")]
    ScalarLength {
        /// Observed length.
        got: usize,
    },
    /// Value was at or above the field prime.
    #[error("{what} is out of range for the field")]
    OutOfRange {
        /// Which value failed.
        what: &'static str,
    },
    /// Decimal coordinate string was empty, non-digit, or had leading zeros.
    #[error("{what} is not a shortest-form decimal field element")]
    BadDecimal {
        /// Which value failed.
        what: &'static str,
    },
    /// Affine coordinates not on the curve.
    #[error("{what} is not on the curve")]
    NotOnCurve {
        /// Which point failed.
        what: &'static str,
    },
    /// Point on the curve but outside the prime-order subgroup.
    #[error("{what} is not in the prime-order subgroup")]
    NotInSubgroup {
        /// Which point failed.
        what: &'static str,
    },
    /// Identity element in a slot where the scheme forbids it.
    #[error("{what} must not be the point at infinity")]
    IdentityPoint {
        /// Which point failed.
        what: &'static str,
    },
}

// ============================================================================
// Scalars
// ============================================================================

/// Parse an Fr element from a 32-byte big-endian string; reject ≥ r.
pub fn fr_from_be_bytes(bytes: &[u8]) -> Result<F, CurveError> {
    if bytes.len() != 32 {
        return Err(CurveError::ScalarLength { got: bytes.len() });
    }
    let modulus = <F as PrimeField>::MODULUS.to_bytes_be();
    if bytes >= modulus.as_slice() {
        return Err(CurveError::OutOfRange { what: "scalar" });
    }
    Ok(F::from_be_bytes_mod_order(bytes))
}

/// Render an Fr element as 32 big-endian bytes.
pub fn fr_to_be_bytes(x: &F) -> [u8; 32] {
    let v = x.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    out[32 - v.len()..].copy_from_slice(&v);
    out
}

/// Parse an Fr element from a shortest-form decimal string; reject ≥ r.
pub fn fr_from_decimal(s: &str) -> Result<F, CurveError> {
    let bytes = decimal_to_be_bytes(s, "scalar")?;
    fr_from_be_bytes(&bytes)
}

/// Parse an Fq element from a shortest-form decimal string; reject ≥ p.
pub fn fq_from_decimal(s: &str) -> Result<Fq, CurveError> {
    let bytes = decimal_to_be_bytes(s, "coordinate")?;
    let modulus = <Fq as PrimeField>::MODULUS.to_bytes_be();
    if bytes.as_slice() >= modulus.as_slice() {
        return Err(CurveError::OutOfRange { what: "coordinate" });
    }
    Ok(Fq::from_be_bytes_mod_order(&bytes))
}

/// Convert an ASCII decimal string into 32 big-endian bytes.
///
/// Shortest form only: no sign, no leading zeros, at least one digit, and the
/// value must fit in 256 bits.
fn decimal_to_be_bytes(s: &str, what: &'static str) -> Result<[u8; 32], CurveError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CurveError::BadDecimal { what });
    }
    if s.len() > 1 && s.starts_with('0') {
        return Err(CurveError::BadDecimal { what });
    }
    let mut acc = [0u8; 32];
    for digit in s.bytes() {
        let mut carry = u16::from(digit - b'0');
        for byte in acc.iter_mut().rev() {
            let v = u16::from(*byte) * 10 + carry;
            *byte = (v & 0xff) as u8;
            carry = v >> 8;
        }
        if carry != 0 {
            return Err(CurveError::OutOfRange { what });
        }
    }
    Ok(acc)
}

// ============================================================================
// Points
// ============================================================================

/// Build a validated G1 point from affine coordinates.
pub fn g1_from_xy(x: Fq, y: Fq, what: &'static str) -> Result<G1, CurveError> {
    let p = G1::new_unchecked(x, y);
    if !p.is_on_curve() {
        return Err(CurveError::NotOnCurve { what });
    }
    if !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CurveError::NotInSubgroup { what });
    }
    Ok(p)
}

/// Build a validated G2 point from affine Fq2 coordinates.
pub fn g2_from_xy(x: Fq2, y: Fq2, what: &'static str) -> Result<G2, CurveError> {
    let p = G2::new_unchecked(x, y);
    if !p.is_on_curve() {
        return Err(CurveError::NotOnCurve { what });
    }
    if !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CurveError::NotInSubgroup { what });
    }
    Ok(p)
}

/// Re-check an already-constructed G1 point (defensive, used before pairing).
pub fn validate_g1(p: &G1, identity: IdentityPolicy, what: &'static str) -> Result<(), CurveError> {
    if p.is_zero() {
        return match identity {
            IdentityPolicy::Allow => Ok(()),
            IdentityPolicy::Forbid => Err(CurveError::IdentityPoint { what }),
        };
    }
    if !p.is_on_curve() {
        return Err(CurveError::NotOnCurve { what });
    }
    if !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CurveError::NotInSubgroup { what });
    }
    Ok(())
}

/// Re-check an already-constructed G2 point.
pub fn validate_g2(p: &G2, identity: IdentityPolicy, what: &'static str) -> Result<(), CurveError> {
    if p.is_zero() {
        return match identity {
            IdentityPolicy::Allow => Ok(()),
            IdentityPolicy::Forbid => Err(CurveError::IdentityPoint { what }),
        };
    }
    if !p.is_on_curve() {
        return Err(CurveError::NotOnCurve { what });
    }
    if !p.is_in_correct_subgroup_assuming_on_curve() {
        return Err(CurveError::NotInSubgroup { what });
    }
    Ok(())
}

/// Multi-scalar multiplication over G1: `Σ scalars[i] · bases[i]`.
pub fn g1_msm(bases: &[G1], scalars: &[F]) -> G1Projective {
    let mut acc = G1Projective::zero();
    for (base, scalar) in bases.iter().zip(scalars.iter()) {
        acc += *base * *scalar;
    }
    acc
}

/// Evaluate `Π e(aᵢ, bᵢ)` and report whether the product is the identity.
pub fn pairing_product_is_one(pairs: &[(G1, G2)]) -> bool {
    let a_all: Vec<<Bn254 as Pairing>::G1Prepared> =
        pairs.iter().map(|(a, _)| (*a).into()).collect();
    let b_all: Vec<<Bn254 as Pairing>::G2Prepared> =
        pairs.iter().map(|(_, b)| (*b).into()).collect();
    let mlo = Bn254::multi_miller_loop(a_all, b_all);
    match Bn254::final_exponentiation(mlo) {
        Some(fe) => fe.0.is_one(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_ec::CurveGroup;

    #[test]
    fn scalar_rejects_wrong_length_and_range() {
        assert!(matches!(
            fr_from_be_bytes(&[0u8; 31]),
            Err(CurveError::ScalarLength { got: 31 })
        ));
        // The modulus itself is out of range.
        let modulus = <F as PrimeField>::MODULUS.to_bytes_be();
        assert!(fr_from_be_bytes(&modulus).is_err());
        // modulus − 1 is fine.
        let mut below = modulus.clone();
        *below.last_mut().unwrap() -= 1;
        assert!(fr_from_be_bytes(&below).is_ok());
    }

    #[test]
    fn scalar_round_trips_via_be_bytes() {
        let x = F::from(0x1234_5678_9abc_def0u64);
        assert_eq!(fr_from_be_bytes(&fr_to_be_bytes(&x)).unwrap(), x);
    }

    #[test]
    fn decimal_parsing_is_shortest_form_only() {
        assert!(fq_from_decimal("0").is_ok());
        assert!(fq_from_decimal("1").is_ok());
        assert!(fq_from_decimal("01").is_err());
        assert!(fq_from_decimal("").is_err());
        assert!(fq_from_decimal("12x").is_err());
        assert_eq!(fr_from_decimal("42").unwrap(), F::from(42u64));
    }

    #[test]
    fn generator_coordinates_admit() {
        let g = G1::generator();
        let p = g1_from_xy(g.x, g.y, "g").unwrap();
        assert_eq!(p, g);
        let h = G2::generator();
        let q = g2_from_xy(h.x, h.y, "h").unwrap();
        assert_eq!(q, h);
    }

    #[test]
    fn off_curve_coordinates_rejected() {
        let g = G1::generator();
        assert!(matches!(
            g1_from_xy(g.x, g.y + Fq::one(), "bad"),
            Err(CurveError::NotOnCurve { .. })
        ));
    }

    #[test]
    fn identity_policy_is_enforced() {
        let id = G1::zero();
        assert!(validate_g1(&id, IdentityPolicy::Allow, "c").is_ok());
        assert!(matches!(
            validate_g1(&id, IdentityPolicy::Forbid, "a"),
            Err(CurveError::IdentityPoint { .. })
        ));
    }

    #[test]
    fn pairing_product_detects_inverse_pairs() {
        // e(G1, G2) · e(−G1, G2) = 1
        let g1 = G1::generator();
        let g2 = G2::generator();
        assert!(pairing_product_is_one(&[(g1, g2), (-g1, g2)]));
        assert!(!pairing_product_is_one(&[(g1, g2), (g1, g2)]));
    }

    #[test]
    fn msm_matches_naive_sum() {
        let g = G1::generator();
        let bases = [g, (g * F::from(2u64)).into_affine()];
        let scalars = [F::from(3u64), F::from(4u64)];
        let expected = g * F::from(11u64);
        assert_eq!(g1_msm(&bases, &scalars), expected);
    }
}
