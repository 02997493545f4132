//! Admission policy and deterministic metering
//!
//! Policy is a typed, process-wide configuration loaded at startup and
//! swapped atomically thereafter: an allowlist of circuit identifiers,
//! per-kind size ceilings, and a per-kind gas schedule. Metering is a pure
//! linear function of canonically-measured sizes — never of wall-clock,
//! backend, or platform — so two runs of the same envelope always charge
//! the same `units`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::envelope::ProofKind;

/// Wildcard allowlist entry accepting every circuit (development only).
pub const ALLOWLIST_WILDCARD: &str = "*";

/// Per-kind size ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Limits {
    /// Ceiling on canonical proof bytes.
    pub max_proof_bytes: u64,
    /// Ceiling on canonical VK bytes.
    pub max_vk_bytes: u64,
    /// Ceiling on the public-input count.
    pub max_public_inputs: u64,
    /// Ceiling on KZG openings (PLONK only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_kzg_openings: Option<u64>,
    /// Floor on FRI query count (STARK only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_fri_queries: Option<u32>,
}

/// Per-kind gas schedule; every term is a nonnegative coefficient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Gas {
    /// Constant term.
    pub base: u64,
    /// Coefficient per public input.
    pub per_public_input: u64,
    /// Coefficient per canonical proof byte.
    pub per_proof_byte: u64,
    /// Coefficient per canonical VK byte.
    pub per_vk_byte: u64,
    /// Coefficient per KZG opening (PLONK only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_opening: Option<u64>,
}

/// Canonically-measured sizes of one envelope, the metering input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeProfile {
    /// Canonical bytes of the proof body.
    pub proof_bytes: u64,
    /// Canonical bytes of the embedded VK (zero when only `vk_ref` is used).
    pub vk_bytes: u64,
    /// Number of public inputs.
    pub num_public_inputs: u64,
    /// KZG openings the kind carries (2 for PLONK, 0 otherwise).
    pub kzg_openings: u64,
}

/// Process-wide policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    /// Allowed circuit identifiers, or the `"*"` wildcard.
    pub allowlist: BTreeSet<String>,
    /// Per-kind size ceilings.
    pub limits: BTreeMap<ProofKind, Limits>,
    /// Per-kind gas schedules.
    pub gas: BTreeMap<ProofKind, Gas>,
}

/// Policy rejections and configuration faults.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// Circuit not present in the allowlist.
    #[error("circuit {circuit_id} is not allowlisted")]
    NotAllowed {
        /// The rejected identifier.
        circuit_id: String,
    },
    /// A configured ceiling was crossed.
    #[error("{what} {got} exceeds the configured ceiling {max}")]
    Limit {
        /// Which dimension was crossed.
        what: &'static str,
        /// Configured ceiling.
        max: u64,
        /// Measured value.
        got: u64,
    },
    /// The policy carries no table for the envelope's kind.
    #[error("policy has no {table} entry for kind {kind}")]
    MissingTable {
        /// Envelope kind.
        kind: ProofKind,
        /// Which table (`limits` or `gas`).
        table: &'static str,
    },
}

impl Policy {
    /// Parse a policy file (the persisted canonical-JSON map).
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Allowlist check. Wildcard admits everything.
    pub fn check_allowlist(&self, circuit_id: &str) -> Result<(), PolicyError> {
        if self.allowlist.contains(ALLOWLIST_WILDCARD) || self.allowlist.contains(circuit_id) {
            Ok(())
        } else {
            Err(PolicyError::NotAllowed { circuit_id: circuit_id.to_owned() })
        }
    }

    /// Size-limit check against the kind's configured ceilings.
    pub fn check_limits(&self, kind: ProofKind, sizes: &SizeProfile) -> Result<(), PolicyError> {
        let limits = self
            .limits
            .get(&kind)
            .ok_or(PolicyError::MissingTable { kind, table: "limits" })?;
        if sizes.proof_bytes > limits.max_proof_bytes {
            return Err(PolicyError::Limit {
                what: "proof bytes",
                max: limits.max_proof_bytes,
                got: sizes.proof_bytes,
            });
        }
        if sizes.vk_bytes > limits.max_vk_bytes {
            return Err(PolicyError::Limit {
                what: "vk bytes",
                max: limits.max_vk_bytes,
                got: sizes.vk_bytes,
            });
        }
        if sizes.num_public_inputs > limits.max_public_inputs {
            return Err(PolicyError::Limit {
                what: "public inputs",
                max: limits.max_public_inputs,
                got: sizes.num_public_inputs,
            });
        }
        if let Some(max) = limits.max_kzg_openings {
            if sizes.kzg_openings > max {
                return Err(PolicyError::Limit {
                    what: "kzg openings",
                    max,
                    got: sizes.kzg_openings,
                });
            }
        }
        Ok(())
    }

    /// Deterministic unit cost. Saturates instead of wrapping; limits run
    /// first, so saturation is unreachable for admitted envelopes.
    pub fn compute_units(&self, kind: ProofKind, sizes: &SizeProfile) -> Result<u64, PolicyError> {
        let gas = self
            .gas
            .get(&kind)
            .ok_or(PolicyError::MissingTable { kind, table: "gas" })?;
        let mut units = gas.base;
        units = units.saturating_add(gas.per_public_input.saturating_mul(sizes.num_public_inputs));
        units = units.saturating_add(gas.per_proof_byte.saturating_mul(sizes.proof_bytes));
        units = units.saturating_add(gas.per_vk_byte.saturating_mul(sizes.vk_bytes));
        if let Some(per_opening) = gas.per_opening {
            units = units.saturating_add(per_opening.saturating_mul(sizes.kzg_openings));
        }
        Ok(units)
    }

    /// Configured FRI query floor for the kind, if any.
    pub fn min_fri_queries(&self, kind: ProofKind) -> Option<u32> {
        self.limits.get(&kind).and_then(|l| l.min_fri_queries)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A permissive policy covering all three kinds, used across the crate's
    /// dispatcher tests.
    pub(crate) fn test_policy(allow: &[&str]) -> Policy {
        let limits = Limits {
            max_proof_bytes: 1 << 20,
            max_vk_bytes: 1 << 20,
            max_public_inputs: 64,
            max_kzg_openings: Some(4),
            min_fri_queries: Some(4),
        };
        let gas = Gas {
            base: 1000,
            per_public_input: 50,
            per_proof_byte: 2,
            per_vk_byte: 1,
            per_opening: Some(300),
        };
        Policy {
            allowlist: allow.iter().map(|s| s.to_string()).collect(),
            limits: [
                (ProofKind::Groth16Bn254, limits.clone()),
                (ProofKind::PlonkKzgBn254, limits.clone()),
                (ProofKind::StarkFriMerkle, limits),
            ]
            .into_iter()
            .collect(),
            gas: [
                (ProofKind::Groth16Bn254, gas.clone()),
                (ProofKind::PlonkKzgBn254, gas.clone()),
                (ProofKind::StarkFriMerkle, gas),
            ]
            .into_iter()
            .collect(),
        }
    }

    #[test]
    fn allowlist_exact_and_wildcard() {
        let p = test_policy(&["counter_groth16_bn254@1"]);
        p.check_allowlist("counter_groth16_bn254@1").unwrap();
        assert!(matches!(
            p.check_allowlist("experimental_x@1"),
            Err(PolicyError::NotAllowed { .. })
        ));
        let dev = test_policy(&["*"]);
        dev.check_allowlist("anything_at_all@7").unwrap();
    }

    #[test]
    fn limits_catch_each_dimension() {
        let p = test_policy(&["*"]);
        let ok = SizeProfile { proof_bytes: 10, vk_bytes: 10, num_public_inputs: 2, kzg_openings: 2 };
        p.check_limits(ProofKind::Groth16Bn254, &ok).unwrap();

        let big_proof = SizeProfile { proof_bytes: (1 << 20) + 1, ..ok };
        assert!(matches!(
            p.check_limits(ProofKind::Groth16Bn254, &big_proof),
            Err(PolicyError::Limit { what: "proof bytes", .. })
        ));
        let many_inputs = SizeProfile { num_public_inputs: 65, ..ok };
        assert!(matches!(
            p.check_limits(ProofKind::Groth16Bn254, &many_inputs),
            Err(PolicyError::Limit { what: "public inputs", .. })
        ));
        let many_openings = SizeProfile { kzg_openings: 5, ..ok };
        assert!(matches!(
            p.check_limits(ProofKind::PlonkKzgBn254, &many_openings),
            Err(PolicyError::Limit { what: "kzg openings", .. })
        ));
    }

    #[test]
    fn units_are_linear_in_every_term() {
        let p = test_policy(&["*"]);
        let base = SizeProfile { proof_bytes: 100, vk_bytes: 40, num_public_inputs: 2, kzg_openings: 2 };
        let units = p.compute_units(ProofKind::PlonkKzgBn254, &base).unwrap();
        assert_eq!(units, 1000 + 50 * 2 + 2 * 100 + 40 + 300 * 2);

        // +1 proof byte moves the cost by exactly per_proof_byte.
        let plus = SizeProfile { proof_bytes: 101, ..base };
        assert_eq!(p.compute_units(ProofKind::PlonkKzgBn254, &plus).unwrap(), units + 2);
    }

    #[test]
    fn missing_tables_are_operational_faults() {
        let mut p = test_policy(&["*"]);
        p.gas.remove(&ProofKind::StarkFriMerkle);
        assert!(matches!(
            p.compute_units(ProofKind::StarkFriMerkle, &SizeProfile::default()),
            Err(PolicyError::MissingTable { table: "gas", .. })
        ));
    }

    #[test]
    fn policy_round_trips_through_json() {
        let p = test_policy(&["counter_groth16_bn254@1"]);
        let bytes = serde_json::to_vec(&p).unwrap();
        let back = Policy::from_json_bytes(&bytes).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn saturating_cost_never_wraps() {
        let mut p = test_policy(&["*"]);
        p.gas.get_mut(&ProofKind::Groth16Bn254).unwrap().per_proof_byte = u64::MAX;
        let sizes = SizeProfile { proof_bytes: u64::MAX, ..Default::default() };
        assert_eq!(p.compute_units(ProofKind::Groth16Bn254, &sizes).unwrap(), u64::MAX);
    }
}
