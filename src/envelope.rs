//! Proof envelope: the uniform submission object
//!
//! An envelope binds a proof family tag (`kind`), the free-form proof body,
//! the ordered public inputs, and exactly one way to reach a verifying key:
//! embedded (`vk`) or registered (`vk_ref`). The `kind` tag is the **only**
//! key that selects a verifier implementation; the tag universe is a closed
//! enum because it is consensus-critical.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::curve::{fr_from_be_bytes, CurveError};
use crate::F;

/// Proof family tags. Adding a kind means adding a variant and a verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProofKind {
    /// Groth16 over BN254.
    #[serde(rename = "groth16_bn254")]
    Groth16Bn254,
    /// PLONK with KZG commitments over BN254.
    #[serde(rename = "plonk_kzg_bn254")]
    PlonkKzgBn254,
    /// STARK with FRI low-degree testing and Merkle commitments.
    #[serde(rename = "stark_fri_merkle")]
    StarkFriMerkle,
}

impl ProofKind {
    /// Stable wire spelling of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofKind::Groth16Bn254 => "groth16_bn254",
            ProofKind::PlonkKzgBn254 => "plonk_kzg_bn254",
            ProofKind::StarkFriMerkle => "stark_fri_merkle",
        }
    }

    /// The toolchain normalization each kind accepts.
    pub fn expected_vk_format(&self) -> VkFormat {
        match self {
            ProofKind::Groth16Bn254 => VkFormat::Snarkjs,
            ProofKind::PlonkKzgBn254 => VkFormat::Plonkjs,
            ProofKind::StarkFriMerkle => VkFormat::FriDescriptor,
        }
    }
}

impl std::fmt::Display for ProofKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source-toolchain normalization tag for the VK shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VkFormat {
    /// snarkjs Groth16 JSON shapes.
    #[serde(rename = "snarkjs")]
    Snarkjs,
    /// snarkjs/plonkjs PLONK JSON shapes.
    #[serde(rename = "plonkjs")]
    Plonkjs,
    /// This crate's STARK descriptor (AIR + FRI parameters).
    #[serde(rename = "fri-descriptor")]
    FriDescriptor,
}

impl VkFormat {
    /// Stable wire spelling of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            VkFormat::Snarkjs => "snarkjs",
            VkFormat::Plonkjs => "plonkjs",
            VkFormat::FriDescriptor => "fri-descriptor",
        }
    }
}

/// Free-form envelope metadata; only `circuit_id` is interpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvelopeMeta {
    /// Authoritative policy identifier; falls back to `vk_ref` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub circuit_id: Option<String>,
}

/// The submission unit accepted by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// Proof family tag.
    pub kind: ProofKind,
    /// Free-form proof body for the kind.
    pub proof: Value,
    /// Ordered field elements, each 64 lowercase hex digits (32 bytes BE).
    #[serde(default)]
    pub public_inputs: Vec<String>,
    /// Embedded verifying key (exclusive with `vk_ref` unless hash-pinned).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vk: Option<Value>,
    /// Toolchain normalization tag; must be consistent with `kind`.
    pub vk_format: VkFormat,
    /// Registry reference of the form `<slug>_<kind>@<version>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vk_ref: Option<String>,
    /// Metadata; `meta.circuit_id` feeds policy.
    #[serde(default)]
    pub meta: EnvelopeMeta,
}

/// Envelope validation failures (all map to `BAD_ARGUMENTS`).
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Neither `vk` nor `vk_ref` present.
    #[error("envelope must carry vk or vk_ref")]
    MissingVk,
    /// `vk_format` does not match what the kind requires.
    #[error("vk_format {got} is not valid for kind {kind}")]
    FormatMismatch {
        /// Envelope kind.
        kind: ProofKind,
        /// Offending format tag.
        got: &'static str,
    },
    /// `vk_ref` or `meta.circuit_id` failed the circuit-id grammar.
    #[error("{what} is not a valid circuit id")]
    BadCircuitId {
        /// Which field failed.
        what: &'static str,
    },
    /// No circuit identifier derivable from the envelope.
    #[error("envelope has neither meta.circuit_id nor vk_ref")]
    MissingCircuitId,
    /// A public input was not 64 lowercase hex digits.
    #[error("public input {index} is not 64 lowercase hex digits")]
    BadInputHex {
        /// Position of the offending input.
        index: usize,
    },
    /// A public input decoded outside the scalar field.
    #[error("public input {index} rejected: {source}")]
    BadInputValue {
        /// Position of the offending input.
        index: usize,
        /// Underlying admission failure.
        source: CurveError,
    },
}

/// Grammar for circuit identifiers: `/^[a-z0-9_]+@[0-9]+$/`.
///
/// The wildcard `"*"` is valid only inside an allowlist, never here.
pub fn is_valid_circuit_id(s: &str) -> bool {
    let Some((slug, version)) = s.split_once('@') else {
        return false;
    };
    !slug.is_empty()
        && slug.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        && !version.is_empty()
        && version.bytes().all(|b| b.is_ascii_digit())
}

impl Envelope {
    /// Structural validation: VK presence, format/kind consistency, id
    /// grammar. Field-element admission happens in
    /// [`Envelope::decode_public_inputs`].
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        if self.vk.is_none() && self.vk_ref.is_none() {
            return Err(EnvelopeError::MissingVk);
        }
        if self.vk_format != self.kind.expected_vk_format() {
            return Err(EnvelopeError::FormatMismatch {
                kind: self.kind,
                got: self.vk_format.as_str(),
            });
        }
        if let Some(r) = &self.vk_ref {
            if !is_valid_circuit_id(r) {
                return Err(EnvelopeError::BadCircuitId { what: "vk_ref" });
            }
        }
        if let Some(id) = &self.meta.circuit_id {
            if !is_valid_circuit_id(id) {
                return Err(EnvelopeError::BadCircuitId { what: "meta.circuit_id" });
            }
        }
        if self.meta.circuit_id.is_none() && self.vk_ref.is_none() {
            return Err(EnvelopeError::MissingCircuitId);
        }
        Ok(())
    }

    /// The identifier policy operates on: `meta.circuit_id`, else `vk_ref`.
    pub fn circuit_id(&self) -> Option<&str> {
        self.meta
            .circuit_id
            .as_deref()
            .or(self.vk_ref.as_deref())
    }

    /// Decode and admit all public inputs (strict hex, reduced range).
    pub fn decode_public_inputs(&self) -> Result<Vec<F>, EnvelopeError> {
        self.public_inputs
            .iter()
            .enumerate()
            .map(|(index, s)| {
                if s.len() != 64
                    || !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
                {
                    return Err(EnvelopeError::BadInputHex { index });
                }
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(s, &mut bytes)
                    .map_err(|_| EnvelopeError::BadInputHex { index })?;
                fr_from_be_bytes(&bytes)
                    .map_err(|source| EnvelopeError::BadInputValue { index, source })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn groth16_env() -> Envelope {
        serde_json::from_value(json!({
            "kind": "groth16_bn254",
            "proof": {"pi_a": ["1", "2"]},
            "public_inputs": [format!("{:064x}", 0x42)],
            "vk_ref": "counter_groth16_bn254@1",
            "vk_format": "snarkjs"
        }))
        .unwrap()
    }

    #[test]
    fn valid_envelope_passes() {
        let env = groth16_env();
        env.validate().unwrap();
        assert_eq!(env.circuit_id(), Some("counter_groth16_bn254@1"));
        assert_eq!(env.decode_public_inputs().unwrap(), vec![F::from(0x42u64)]);
    }

    #[test]
    fn kind_format_consistency_enforced() {
        let mut env = groth16_env();
        env.vk_format = VkFormat::Plonkjs;
        assert!(matches!(env.validate(), Err(EnvelopeError::FormatMismatch { .. })));
    }

    #[test]
    fn missing_vk_and_ref_rejected() {
        let mut env = groth16_env();
        env.vk_ref = None;
        assert!(matches!(env.validate(), Err(EnvelopeError::MissingVk)));
    }

    #[test]
    fn circuit_id_grammar() {
        assert!(is_valid_circuit_id("counter_groth16_bn254@1"));
        assert!(is_valid_circuit_id("a@0"));
        assert!(!is_valid_circuit_id("*"));
        assert!(!is_valid_circuit_id("UPPER@1"));
        assert!(!is_valid_circuit_id("noversion"));
        assert!(!is_valid_circuit_id("x@"));
        assert!(!is_valid_circuit_id("@2"));
        assert!(!is_valid_circuit_id("x@1y"));
    }

    #[test]
    fn meta_circuit_id_takes_precedence() {
        let mut env = groth16_env();
        env.meta.circuit_id = Some("other_groth16_bn254@2".into());
        assert_eq!(env.circuit_id(), Some("other_groth16_bn254@2"));
    }

    #[test]
    fn public_input_admission_is_strict() {
        let mut env = groth16_env();
        env.public_inputs = vec!["42".into()];
        assert!(matches!(
            env.decode_public_inputs(),
            Err(EnvelopeError::BadInputHex { index: 0 })
        ));
        // Uppercase hex is non-canonical.
        env.public_inputs = vec![format!("{:064X}", 0x42)];
        assert!(env.decode_public_inputs().is_err());
        // Value at the modulus is out of range.
        env.public_inputs =
            vec!["30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000001".into()];
        assert!(matches!(
            env.decode_public_inputs(),
            Err(EnvelopeError::BadInputValue { index: 0, .. })
        ));
    }

    #[test]
    fn unknown_fields_rejected() {
        let r: Result<Envelope, _> = serde_json::from_value(json!({
            "kind": "groth16_bn254",
            "proof": {},
            "vk_ref": "a@1",
            "vk_format": "snarkjs",
            "extra": true
        }));
        assert!(r.is_err());
    }
}
