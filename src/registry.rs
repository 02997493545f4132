//! Pinned verifying-key registry
//!
//! Records are keyed by `circuit_id` and immutable under it: changing a VK
//! means publishing a new version (`…@2`). Integrity is layered the way the
//! loader validates everything else in this crate:
//!
//! 1. **Content hash** — `vk_hash` is SHA3-256 over the canonical JSON of
//!    the hashed projection `{kind, vk_format, vk, fri_params}`; identical
//!    VK content yields the identical hash on every platform.
//! 2. **Signature (optional)** — ed25519 over
//!    `circuit_id ‖ 0x00 ‖ kind ‖ 0x00 ‖ vk_format ‖ 0x00 ‖ vk_hash_string`,
//!    binding the content hash rather than the raw VK bytes, so equivalent
//!    canonicalization is not a forgery vector.
//!
//! A snapshot is validated record-by-record at load time; `resolve` never
//! hands out a record whose recomputed hash disagrees with the stored one.

use std::collections::BTreeMap;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::canonical::CanonError;
use crate::envelope::{is_valid_circuit_id, ProofKind, VkFormat};
use crate::hashing::{HashId, HashIdError};

/// Optional signature block on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordSig {
    /// Algorithm identifier; only `"ed25519"` is recognized.
    pub alg: String,
    /// Identifies the trusted signer key.
    pub key_id: String,
    /// Signature bytes, lowercase hex.
    pub signature: String,
}

/// One registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VkRecord {
    /// Unique, immutable identifier.
    pub circuit_id: String,
    /// Proof family of the pinned key.
    pub kind: ProofKind,
    /// Toolchain normalization of the VK shape.
    pub vk_format: VkFormat,
    /// Structured VK content.
    pub vk: Value,
    /// STARK auxiliary parameters (FRI descriptor).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fri_params: Option<Value>,
    /// `sha3-256:<hex>` over the canonical hashed projection.
    pub vk_hash: String,
    /// Operational metadata, not covered by `vk_hash`.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub meta: Value,
    /// Optional signature binding `(circuit_id, kind, vk_format, vk_hash)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<RecordSig>,
}

/// Registry failures; every one maps to `REGISTRY_ERROR` at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No record under the requested id.
    #[error("no registry record for {circuit_id}")]
    Unresolved {
        /// Requested identifier.
        circuit_id: String,
    },
    /// Recomputed hash differs from the stored `vk_hash`.
    #[error("vk_hash mismatch for {circuit_id}")]
    HashMismatch {
        /// Offending record.
        circuit_id: String,
    },
    /// Stored `vk_hash` string is not a valid hash identifier.
    #[error("bad vk_hash on {circuit_id}: {source}")]
    BadHashId {
        /// Offending record.
        circuit_id: String,
        /// Parse failure.
        source: HashIdError,
    },
    /// VK content could not be canonicalized.
    #[error("record {circuit_id} is not canonicalizable: {source}")]
    Canon {
        /// Offending record.
        circuit_id: String,
        /// Underlying encoding failure.
        source: CanonError,
    },
    /// Record id failed the circuit-id grammar, or keys were duplicated.
    #[error("malformed registry file: {0}")]
    Malformed(String),
    /// Signature present but unverifiable.
    #[error("signature rejected for {circuit_id}: {reason}")]
    Signature {
        /// Offending record.
        circuit_id: String,
        /// What failed.
        reason: &'static str,
    },
}

/// Trusted signer keys, loaded alongside the policy.
#[derive(Debug, Clone, Default)]
pub struct TrustedSigners {
    keys: BTreeMap<String, VerifyingKey>,
}

impl TrustedSigners {
    /// Parse a `{key_id: <64-hex public key>}` JSON map.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, RegistryError> {
        let raw: BTreeMap<String, String> = serde_json::from_slice(bytes)
            .map_err(|e| RegistryError::Malformed(e.to_string()))?;
        let mut keys = BTreeMap::new();
        for (key_id, hex_key) in raw {
            let mut buf = [0u8; 32];
            hex::decode_to_slice(&hex_key, &mut buf)
                .map_err(|e| RegistryError::Malformed(format!("signer {key_id}: {e}")))?;
            let vk = VerifyingKey::from_bytes(&buf)
                .map_err(|e| RegistryError::Malformed(format!("signer {key_id}: {e}")))?;
            keys.insert(key_id, vk);
        }
        Ok(Self { keys })
    }

    /// Insert a key directly (tests, embedders).
    pub fn insert(&mut self, key_id: impl Into<String>, key: VerifyingKey) {
        self.keys.insert(key_id.into(), key);
    }

    fn get(&self, key_id: &str) -> Option<&VerifyingKey> {
        self.keys.get(key_id)
    }
}

/// Build the hashed projection `{kind, vk_format, vk, fri_params}`.
///
/// `fri_params` is omitted (not null) when absent, so Groth16/PLONK records
/// hash identically whether or not the field is spelled out. The same
/// projection is used for registry records and for embedded envelope VKs,
/// which is what makes the two spellings hash-comparable.
pub fn projection_value(
    kind: ProofKind,
    vk_format: VkFormat,
    vk: &Value,
    fri_params: Option<&Value>,
) -> Value {
    let mut map = Map::new();
    if let Some(fri) = fri_params {
        map.insert("fri_params".into(), fri.clone());
    }
    map.insert("kind".into(), Value::String(kind.as_str().into()));
    map.insert("vk".into(), vk.clone());
    map.insert("vk_format".into(), Value::String(vk_format.as_str().into()));
    Value::Object(map)
}

impl VkRecord {
    /// The hashed projection of this record.
    pub fn hashed_projection(&self) -> Value {
        projection_value(self.kind, self.vk_format, &self.vk, self.fri_params.as_ref())
    }

    /// Recompute the content hash over canonical bytes.
    pub fn compute_vk_hash(&self) -> Result<HashId, RegistryError> {
        HashId::of_value(&self.hashed_projection()).map_err(|source| RegistryError::Canon {
            circuit_id: self.circuit_id.clone(),
            source,
        })
    }

    /// The byte string a record signature covers.
    pub fn signature_preimage(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(128);
        msg.extend_from_slice(self.circuit_id.as_bytes());
        msg.push(0);
        msg.extend_from_slice(self.kind.as_str().as_bytes());
        msg.push(0);
        msg.extend_from_slice(self.vk_format.as_str().as_bytes());
        msg.push(0);
        msg.extend_from_slice(self.vk_hash.as_bytes());
        msg
    }

    /// Full integrity check: hash recompute, then signature when present
    /// and signer keys are configured.
    pub fn verify_record(&self, signers: Option<&TrustedSigners>) -> Result<(), RegistryError> {
        let stored = HashId::parse(&self.vk_hash).map_err(|source| RegistryError::BadHashId {
            circuit_id: self.circuit_id.clone(),
            source,
        })?;
        if self.compute_vk_hash()? != stored {
            return Err(RegistryError::HashMismatch { circuit_id: self.circuit_id.clone() });
        }
        if let (Some(sig), Some(signers)) = (&self.sig, signers) {
            if sig.alg != "ed25519" {
                return Err(RegistryError::Signature {
                    circuit_id: self.circuit_id.clone(),
                    reason: "unsupported algorithm",
                });
            }
            let key = signers.get(&sig.key_id).ok_or(RegistryError::Signature {
                circuit_id: self.circuit_id.clone(),
                reason: "unknown signer",
            })?;
            let mut buf = [0u8; 64];
            hex::decode_to_slice(&sig.signature, &mut buf).map_err(|_| {
                RegistryError::Signature {
                    circuit_id: self.circuit_id.clone(),
                    reason: "malformed signature hex",
                }
            })?;
            key.verify(&self.signature_preimage(), &Signature::from_bytes(&buf))
                .map_err(|_| RegistryError::Signature {
                    circuit_id: self.circuit_id.clone(),
                    reason: "verification failed",
                })?;
        }
        Ok(())
    }
}

/// An immutable registry snapshot: `circuit_id → VkRecord`.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    records: BTreeMap<String, VkRecord>,
}

impl RegistrySnapshot {
    /// Build a snapshot from validated records.
    ///
    /// Every record is hash-checked (and signature-checked when signers are
    /// configured) before it becomes resolvable; a single bad record poisons
    /// the whole load, which beats serving half a registry.
    pub fn from_records(
        records: impl IntoIterator<Item = VkRecord>,
        signers: Option<&TrustedSigners>,
    ) -> Result<Self, RegistryError> {
        let mut map = BTreeMap::new();
        for record in records {
            if !is_valid_circuit_id(&record.circuit_id) {
                return Err(RegistryError::Malformed(format!(
                    "invalid circuit id {:?}",
                    record.circuit_id
                )));
            }
            record.verify_record(signers)?;
            if map.insert(record.circuit_id.clone(), record).is_some() {
                return Err(RegistryError::Malformed("duplicate circuit id".into()));
            }
        }
        Ok(Self { records: map })
    }

    /// Parse the persisted canonical-JSON map `{circuit_id: VkRecord}`.
    pub fn from_json_bytes(
        bytes: &[u8],
        signers: Option<&TrustedSigners>,
    ) -> Result<Self, RegistryError> {
        let raw: BTreeMap<String, VkRecord> = serde_json::from_slice(bytes)
            .map_err(|e| RegistryError::Malformed(e.to_string()))?;
        for (key, record) in &raw {
            if key != &record.circuit_id {
                return Err(RegistryError::Malformed(format!(
                    "map key {key:?} disagrees with record id {:?}",
                    record.circuit_id
                )));
            }
        }
        Self::from_records(raw.into_values(), signers)
    }

    /// Look up a record; the snapshot only ever holds validated records.
    pub fn resolve(&self, circuit_id: &str) -> Result<&VkRecord, RegistryError> {
        self.records
            .get(circuit_id)
            .ok_or_else(|| RegistryError::Unresolved { circuit_id: circuit_id.to_owned() })
    }

    /// Whether a record exists without validating anything further.
    pub fn contains(&self, circuit_id: &str) -> bool {
        self.records.contains_key(circuit_id)
    }

    /// Number of records in the snapshot.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use serde_json::json;

    pub(crate) fn record_for(circuit_id: &str, kind: ProofKind, vk: Value) -> VkRecord {
        let vk_format = kind.expected_vk_format();
        let mut record = VkRecord {
            circuit_id: circuit_id.into(),
            kind,
            vk_format,
            vk,
            fri_params: None,
            vk_hash: String::new(),
            meta: Value::Null,
            sig: None,
        };
        record.vk_hash = record.compute_vk_hash().unwrap().to_string();
        record
    }

    fn sample() -> VkRecord {
        record_for(
            "counter_groth16_bn254@1",
            ProofKind::Groth16Bn254,
            json!({"alpha": "1", "ic": ["2", "3"]}),
        )
    }

    #[test]
    fn recomputed_hash_matches_stored() {
        let r = sample();
        assert_eq!(r.compute_vk_hash().unwrap().to_string(), r.vk_hash);
        r.verify_record(None).unwrap();
    }

    #[test]
    fn different_vk_content_different_hash() {
        let a = sample();
        let b = record_for(
            "counter_groth16_bn254@2",
            ProofKind::Groth16Bn254,
            json!({"alpha": "1", "ic": ["2", "4"]}),
        );
        assert_ne!(a.vk_hash, b.vk_hash);
    }

    #[test]
    fn meta_is_not_covered_by_the_hash() {
        let mut r = sample();
        let before = r.vk_hash.clone();
        r.meta = json!({"note": "rotated 2026-07-01"});
        assert_eq!(r.compute_vk_hash().unwrap().to_string(), before);
    }

    #[test]
    fn tampered_vk_fails_load() {
        let mut r = sample();
        r.vk = json!({"alpha": "1", "ic": ["2", "666"]});
        assert!(matches!(
            RegistrySnapshot::from_records([r], None),
            Err(RegistryError::HashMismatch { .. })
        ));
    }

    #[test]
    fn resolve_unknown_is_an_error() {
        let snap = RegistrySnapshot::from_records([sample()], None).unwrap();
        assert!(snap.resolve("counter_groth16_bn254@1").is_ok());
        assert!(matches!(
            snap.resolve("experimental_x@1"),
            Err(RegistryError::Unresolved { .. })
        ));
    }

    #[test]
    fn signature_binds_the_projection() {
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let mut signers = TrustedSigners::default();
        signers.insert("ops-2026", signing.verifying_key());

        let mut r = sample();
        let sig = signing.sign(&r.signature_preimage());
        r.sig = Some(RecordSig {
            alg: "ed25519".into(),
            key_id: "ops-2026".into(),
            signature: hex::encode(sig.to_bytes()),
        });
        r.verify_record(Some(&signers)).unwrap();

        // A different circuit id under the same signature must fail.
        let mut forged = r.clone();
        forged.circuit_id = "counter_groth16_bn254@9".into();
        assert!(matches!(
            forged.verify_record(Some(&signers)),
            Err(RegistryError::Signature { reason: "verification failed", .. })
        ));

        // Unknown signer id fails closed.
        let mut unknown = r.clone();
        unknown.sig.as_mut().unwrap().key_id = "nobody".into();
        assert!(matches!(
            unknown.verify_record(Some(&signers)),
            Err(RegistryError::Signature { reason: "unknown signer", .. })
        ));

        // Without configured signers the signature is not evaluated.
        r.verify_record(None).unwrap();
    }

    #[test]
    fn registry_file_round_trip() {
        let r = sample();
        let mut file_map = Map::new();
        file_map.insert(r.circuit_id.clone(), serde_json::to_value(&r).unwrap());
        let file = Value::Object(file_map).to_string();
        let snap = RegistrySnapshot::from_json_bytes(file.as_bytes(), None).unwrap();
        assert_eq!(snap.len(), 1);
        assert!(snap.contains("counter_groth16_bn254@1"));
    }

    #[test]
    fn mismatched_map_key_rejected() {
        let r = sample();
        let file = json!({ "other_groth16_bn254@1": r }).to_string();
        assert!(matches!(
            RegistrySnapshot::from_json_bytes(file.as_bytes(), None),
            Err(RegistryError::Malformed(_))
        ));
    }
}
