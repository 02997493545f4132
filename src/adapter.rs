//! Toolchain-shape adapters
//!
//! The envelope's `proof` and `vk` are free-form JSON in the shape the
//! source toolchain emitted (snarkjs for Groth16, the snarkjs PLONK dialect
//! for PLONK, this crate's fri-descriptor for STARK). The adapters here
//! normalize those shapes into the typed inputs the verifiers take, doing
//! all point/scalar admission on the way in:
//!
//! - shape problems (missing keys, wrong arity, foreign protocol tags) are
//!   `ADAPTER_ERROR`;
//! - value problems (off-curve points, out-of-range scalars) are
//!   `BAD_ARGUMENTS`.
//!
//! Curve points use the snarkjs JSON convention: G1 as `[x, y]` or
//! `[x, y, "1"]` in decimal, G2 as pairs of Fq2 limbs `[[x0, x1], …]`, and
//! the projective `"0"` tail spelling the identity.

#![allow(missing_docs)]

use ark_ec::AffineRepr;
use ark_ff::FftField;
use serde_json::{Map, Value};

use crate::air::{Air, AirError, AirSpec};
use crate::curve::{
    fq_from_decimal, fr_from_be_bytes, fr_from_decimal, g1_from_xy, g2_from_xy, CurveError,
    IdentityPolicy,
};
use crate::error::ErrorCode;
use crate::fri::{FriParams, FriProof, FriQuery, FriQueryStep};
use crate::groth16::{Groth16Proof, Groth16Vk};
use crate::merkle::Digest32;
use crate::plonk::{PlonkProof, PlonkVk};
use crate::stark::{StarkProof, StarkVk, TraceOpening};
use crate::{F, Fq2, G1, G2};

/// Adapter failures.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The shape could not be normalized.
    #[error("cannot normalize {0}")]
    Shape(String),
    /// A point or scalar failed admission.
    #[error(transparent)]
    Curve(#[from] CurveError),
    /// The AIR descriptor failed validation.
    #[error(transparent)]
    Air(#[from] AirError),
}

impl AdapterError {
    /// Taxonomy code for the dispatch boundary.
    pub fn code(&self) -> ErrorCode {
        match self {
            AdapterError::Shape(_) => ErrorCode::AdapterError,
            AdapterError::Curve(_) | AdapterError::Air(_) => ErrorCode::BadArguments,
        }
    }

    fn shape(what: impl Into<String>) -> Self {
        AdapterError::Shape(what.into())
    }
}

// ============================================================================
// JSON plumbing
// ============================================================================

fn as_obj<'v>(v: &'v Value, what: &str) -> Result<&'v Map<String, Value>, AdapterError> {
    v.as_object().ok_or_else(|| AdapterError::shape(format!("{what}: expected an object")))
}

fn field<'v>(m: &'v Map<String, Value>, key: &str, what: &str) -> Result<&'v Value, AdapterError> {
    m.get(key).ok_or_else(|| AdapterError::shape(format!("{what}: missing {key}")))
}

fn as_str<'v>(v: &'v Value, what: &str) -> Result<&'v str, AdapterError> {
    v.as_str().ok_or_else(|| AdapterError::shape(format!("{what}: expected a string")))
}

fn as_arr<'v>(v: &'v Value, what: &str) -> Result<&'v [Value], AdapterError> {
    v.as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| AdapterError::shape(format!("{what}: expected an array")))
}

fn check_tag(m: &Map<String, Value>, key: &str, accepted: &[&str], what: &str) -> Result<(), AdapterError> {
    if let Some(tag) = m.get(key) {
        let tag = as_str(tag, what)?;
        if !accepted.contains(&tag) {
            return Err(AdapterError::shape(format!("{what}: foreign {key} tag {tag:?}")));
        }
    }
    Ok(())
}

fn fr_hex(v: &Value, what: &str) -> Result<F, AdapterError> {
    let s = as_str(v, what)?;
    if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return Err(AdapterError::shape(format!("{what}: expected 64 lowercase hex digits")));
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(s, &mut bytes)
        .map_err(|_| AdapterError::shape(format!("{what}: bad hex")))?;
    Ok(fr_from_be_bytes(&bytes)?)
}

fn digest_hex(v: &Value, what: &str) -> Result<Digest32, AdapterError> {
    let s = as_str(v, what)?;
    if s.len() != 64 {
        return Err(AdapterError::shape(format!("{what}: expected 64 hex digits")));
    }
    let mut out = [0u8; 32];
    hex::decode_to_slice(s, &mut out)
        .map_err(|_| AdapterError::shape(format!("{what}: bad hex")))?;
    Ok(out)
}

fn digest_list(v: &Value, what: &str) -> Result<Vec<Digest32>, AdapterError> {
    as_arr(v, what)?.iter().map(|d| digest_hex(d, what)).collect()
}

fn fr_list(v: &Value, what: &str) -> Result<Vec<F>, AdapterError> {
    as_arr(v, what)?.iter().map(|e| fr_hex(e, what)).collect()
}

// ============================================================================
// Curve points in snarkjs JSON form
// ============================================================================

fn g1_point(v: &Value, what: &str, identity: IdentityPolicy) -> Result<G1, AdapterError> {
    let arr = as_arr(v, what)?;
    if arr.len() != 2 && arr.len() != 3 {
        return Err(AdapterError::shape(format!("{what}: G1 point needs 2 or 3 coordinates")));
    }
    let x = as_str(&arr[0], what)?;
    let y = as_str(&arr[1], what)?;
    if arr.len() == 3 {
        let z = as_str(&arr[2], what)?;
        match z {
            "1" => {}
            "0" => {
                if x != "0" || y != "0" {
                    return Err(AdapterError::shape(format!("{what}: malformed identity")));
                }
                return match identity {
                    IdentityPolicy::Allow => Ok(G1::zero()),
                    IdentityPolicy::Forbid => {
                        Err(CurveError::IdentityPoint { what: "G1 point" }.into())
                    }
                };
            }
            _ => {
                return Err(AdapterError::shape(format!(
                    "{what}: projective tail must be \"0\" or \"1\""
                )))
            }
        }
    }
    Ok(g1_from_xy(fq_from_decimal(x)?, fq_from_decimal(y)?, "G1 point")?)
}

fn fq2_limbs(v: &Value, what: &str) -> Result<Fq2, AdapterError> {
    let arr = as_arr(v, what)?;
    if arr.len() != 2 {
        return Err(AdapterError::shape(format!("{what}: Fq2 needs two limbs")));
    }
    let c0 = fq_from_decimal(as_str(&arr[0], what)?)?;
    let c1 = fq_from_decimal(as_str(&arr[1], what)?)?;
    Ok(Fq2::new(c0, c1))
}

fn g2_point(v: &Value, what: &str, identity: IdentityPolicy) -> Result<G2, AdapterError> {
    let arr = as_arr(v, what)?;
    if arr.len() != 2 && arr.len() != 3 {
        return Err(AdapterError::shape(format!("{what}: G2 point needs 2 or 3 coordinates")));
    }
    if arr.len() == 3 {
        let z = as_arr(&arr[2], what)?;
        let z0 = z.first().and_then(Value::as_str);
        match z0 {
            Some("1") => {}
            Some("0") => {
                return match identity {
                    IdentityPolicy::Allow => Ok(G2::zero()),
                    IdentityPolicy::Forbid => {
                        Err(CurveError::IdentityPoint { what: "G2 point" }.into())
                    }
                };
            }
            _ => return Err(AdapterError::shape(format!("{what}: malformed projective tail"))),
        }
    }
    let x = fq2_limbs(&arr[0], what)?;
    let y = fq2_limbs(&arr[1], what)?;
    Ok(g2_from_xy(x, y, "G2 point")?)
}

// ============================================================================
// Groth16 (snarkjs)
// ============================================================================

/// Normalize a snarkjs Groth16 verifying key.
pub fn groth16_vk(vk: &Value) -> Result<Groth16Vk, AdapterError> {
    let what = "groth16 vk";
    let m = as_obj(vk, what)?;
    check_tag(m, "protocol", &["groth16"], what)?;
    check_tag(m, "curve", &["bn128", "bn254"], what)?;

    let ic_raw = as_arr(field(m, "IC", what)?, what)?;
    if ic_raw.is_empty() {
        return Err(AdapterError::shape(format!("{what}: IC must not be empty")));
    }
    let ic = ic_raw
        .iter()
        .map(|p| g1_point(p, what, IdentityPolicy::Allow))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(n_public) = m.get("nPublic") {
        let n = n_public
            .as_u64()
            .ok_or_else(|| AdapterError::shape(format!("{what}: nPublic must be an integer")))?;
        if n as usize != ic.len() - 1 {
            return Err(AdapterError::shape(format!("{what}: nPublic disagrees with IC length")));
        }
    }

    Ok(Groth16Vk {
        alpha_g1: g1_point(field(m, "vk_alpha_1", what)?, what, IdentityPolicy::Forbid)?,
        beta_g2: g2_point(field(m, "vk_beta_2", what)?, what, IdentityPolicy::Forbid)?,
        gamma_g2: g2_point(field(m, "vk_gamma_2", what)?, what, IdentityPolicy::Forbid)?,
        delta_g2: g2_point(field(m, "vk_delta_2", what)?, what, IdentityPolicy::Forbid)?,
        ic,
    })
}

/// Normalize a snarkjs Groth16 proof.
pub fn groth16_proof(proof: &Value) -> Result<Groth16Proof, AdapterError> {
    let what = "groth16 proof";
    let m = as_obj(proof, what)?;
    check_tag(m, "protocol", &["groth16"], what)?;
    check_tag(m, "curve", &["bn128", "bn254"], what)?;
    Ok(Groth16Proof {
        a: g1_point(field(m, "pi_a", what)?, what, IdentityPolicy::Forbid)?,
        b: g2_point(field(m, "pi_b", what)?, what, IdentityPolicy::Forbid)?,
        c: g1_point(field(m, "pi_c", what)?, what, IdentityPolicy::Forbid)?,
    })
}

// ============================================================================
// PLONK (snarkjs dialect)
// ============================================================================

/// Normalize a snarkjs-dialect PLONK verifying key.
pub fn plonk_vk(vk: &Value) -> Result<PlonkVk, AdapterError> {
    let what = "plonk vk";
    let m = as_obj(vk, what)?;
    check_tag(m, "protocol", &["plonk"], what)?;
    check_tag(m, "curve", &["bn128", "bn254"], what)?;

    let power = field(m, "power", what)?
        .as_u64()
        .ok_or_else(|| AdapterError::shape(format!("{what}: power must be an integer")))?;
    if power == 0 || power > <F as FftField>::TWO_ADICITY as u64 {
        return Err(AdapterError::shape(format!("{what}: power out of range")));
    }
    let n = 1u64 << power;
    let num_public_inputs = field(m, "nPublic", what)?
        .as_u64()
        .ok_or_else(|| AdapterError::shape(format!("{what}: nPublic must be an integer")))?
        as usize;

    let omega = fr_from_decimal(as_str(field(m, "w", what)?, what)?)?;
    let k1 = fr_from_decimal(as_str(field(m, "k1", what)?, what)?)?;
    let k2 = fr_from_decimal(as_str(field(m, "k2", what)?, what)?)?;
    // ω must generate exactly the size-n subgroup.
    use ark_ff::{Field, One, Zero};
    if omega.pow([n]) != F::one() || (n >= 2 && omega.pow([n / 2]) == F::one()) {
        return Err(AdapterError::shape(format!("{what}: w is not a primitive {n}-th root")));
    }
    if k1.is_zero() || k2.is_zero() || k1 == k2 {
        return Err(AdapterError::shape(format!("{what}: degenerate coset shifts")));
    }

    Ok(PlonkVk {
        n,
        num_public_inputs,
        omega,
        k1,
        k2,
        qm: g1_point(field(m, "Qm", what)?, what, IdentityPolicy::Allow)?,
        ql: g1_point(field(m, "Ql", what)?, what, IdentityPolicy::Allow)?,
        qr: g1_point(field(m, "Qr", what)?, what, IdentityPolicy::Allow)?,
        qo: g1_point(field(m, "Qo", what)?, what, IdentityPolicy::Allow)?,
        qc: g1_point(field(m, "Qc", what)?, what, IdentityPolicy::Allow)?,
        s1: g1_point(field(m, "S1", what)?, what, IdentityPolicy::Allow)?,
        s2: g1_point(field(m, "S2", what)?, what, IdentityPolicy::Allow)?,
        s3: g1_point(field(m, "S3", what)?, what, IdentityPolicy::Allow)?,
        x2: g2_point(field(m, "X_2", what)?, what, IdentityPolicy::Forbid)?,
    })
}

/// Normalize a snarkjs-dialect PLONK proof.
pub fn plonk_proof(proof: &Value) -> Result<PlonkProof, AdapterError> {
    let what = "plonk proof";
    let m = as_obj(proof, what)?;
    check_tag(m, "protocol", &["plonk"], what)?;
    check_tag(m, "curve", &["bn128", "bn254"], what)?;
    let point =
        |key: &str| -> Result<G1, AdapterError> { g1_point(field(m, key, what)?, what, IdentityPolicy::Allow) };
    let scalar = |key: &str| -> Result<F, AdapterError> {
        Ok(fr_from_decimal(as_str(field(m, key, what)?, what)?)?)
    };
    Ok(PlonkProof {
        a: point("A")?,
        b: point("B")?,
        c: point("C")?,
        z: point("Z")?,
        t1: point("T1")?,
        t2: point("T2")?,
        t3: point("T3")?,
        wxi: point("Wxi")?,
        wxiw: point("Wxiw")?,
        eval_a: scalar("eval_a")?,
        eval_b: scalar("eval_b")?,
        eval_c: scalar("eval_c")?,
        eval_s1: scalar("eval_s1")?,
        eval_s2: scalar("eval_s2")?,
        eval_zw: scalar("eval_zw")?,
    })
}

// ============================================================================
// STARK (fri-descriptor)
// ============================================================================

/// Split an embedded STARK VK into the registry projection layout.
///
/// Embedded descriptors carry the FRI parameter block inline under `"fri"`;
/// registry records keep it in `fri_params`. Splitting before hashing makes
/// both spellings produce the same `vk_hash`.
pub fn split_embedded_stark_vk(vk: &Value) -> Result<(Value, Option<Value>), AdapterError> {
    let m = as_obj(vk, "stark vk")?;
    match m.get("fri") {
        Some(fri) => {
            let mut rest = m.clone();
            rest.remove("fri");
            Ok((Value::Object(rest), Some(fri.clone())))
        }
        None => Ok((vk.clone(), None)),
    }
}

/// Normalize a fri-descriptor VK from its projection parts.
pub fn stark_vk(vk: &Value, fri_params: Option<&Value>) -> Result<StarkVk, AdapterError> {
    let what = "stark vk";
    let m = as_obj(vk, what)?;
    let air_spec: AirSpec = serde_json::from_value(field(m, "air", what)?.clone())
        .map_err(|e| AdapterError::shape(format!("{what}: air: {e}")))?;
    let air = Air::from_spec(&air_spec)?;

    let fri_value = match (fri_params, m.get("fri")) {
        (Some(v), _) => v,
        (None, Some(v)) => v,
        (None, None) => return Err(AdapterError::shape(format!("{what}: missing fri parameters"))),
    };
    let fri: FriParams = serde_json::from_value(fri_value.clone())
        .map_err(|e| AdapterError::shape(format!("{what}: fri: {e}")))?;

    let offset = match m.get("offset") {
        Some(v) => fr_hex(v, "stark vk offset")?,
        None => <F as FftField>::GENERATOR,
    };
    Ok(StarkVk { air, fri, offset })
}

/// Normalize a STARK proof body.
pub fn stark_proof(proof: &Value) -> Result<StarkProof, AdapterError> {
    let what = "stark proof";
    let m = as_obj(proof, what)?;
    let trace_root = digest_hex(field(m, "trace_root", what)?, what)?;

    let trace_openings = as_arr(field(m, "trace_openings", what)?, what)?
        .iter()
        .map(|o| {
            let om = as_obj(o, "trace opening")?;
            Ok(TraceOpening {
                row: fr_list(field(om, "row", "trace opening")?, "trace row")?,
                next_row: fr_list(field(om, "next_row", "trace opening")?, "trace row")?,
                path: digest_list(field(om, "path", "trace opening")?, "trace path")?,
                next_path: digest_list(field(om, "next_path", "trace opening")?, "trace path")?,
            })
        })
        .collect::<Result<Vec<_>, AdapterError>>()?;

    let fm = as_obj(field(m, "fri", what)?, "fri proof")?;
    let layer_roots = digest_list(field(fm, "layer_roots", "fri proof")?, "fri root")?;
    let final_poly = fr_list(field(fm, "final_poly", "fri proof")?, "fri final")?;
    let queries = as_arr(field(fm, "queries", "fri proof")?, "fri proof")?
        .iter()
        .map(|q| {
            let qm = as_obj(q, "fri query")?;
            let steps = as_arr(field(qm, "steps", "fri query")?, "fri query")?
                .iter()
                .map(|s| {
                    let sm = as_obj(s, "fri step")?;
                    Ok(FriQueryStep {
                        value: fr_hex(field(sm, "value", "fri step")?, "fri value")?,
                        pair_value: fr_hex(field(sm, "pair_value", "fri step")?, "fri value")?,
                        path: digest_list(field(sm, "path", "fri step")?, "fri path")?,
                        pair_path: digest_list(field(sm, "pair_path", "fri step")?, "fri path")?,
                    })
                })
                .collect::<Result<Vec<_>, AdapterError>>()?;
            Ok(FriQuery { steps })
        })
        .collect::<Result<Vec<_>, AdapterError>>()?;

    Ok(StarkProof {
        trace_root,
        trace_openings,
        fri: FriProof { layer_roots, final_poly, queries },
    })
}

// ============================================================================
// Test-side serializers (building canonical envelopes from typed values)
// ============================================================================
