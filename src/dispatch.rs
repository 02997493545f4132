//! Dispatcher: the single verification entry-point
//!
//! One operation, `verify(payload) → Report`, walking the fixed admission
//! pipeline:
//!
//! ```text
//! Parsed → Limited → Allowed → Metered → [meter-only done]
//!                                     → VkResolved → Dispatched → Done
//! ```
//!
//! Any stage may fail; the failure is normalized into the closed taxonomy
//! and returned inside the [`Report`] — the dispatcher never panics and
//! never unwinds into the caller. `units` always reflects what the meter
//! actually computed: zero when a stage before metering rejected the
//! envelope, the full deterministic cost otherwise (including on
//! `VERIFY_FAILED`).
//!
//! Metering note: `vk_bytes` counts the canonical bytes of an **embedded**
//! VK only. A `vk_ref` envelope meters `vk_bytes = 0` — pinned registry
//! content is infrastructure the submitter does not pay for per call — and
//! this also keeps the meter-only path free of registry access, so policy
//! rejections never touch the registry at all.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter;
use crate::canonical;
use crate::envelope::{Envelope, ProofKind};
use crate::error::{ErrorCode, Failure};
use crate::fri::FriError;
use crate::groth16;
use crate::hashing::HashId;
use crate::plonk;
use crate::policy::{Policy, PolicyError, SizeProfile};
use crate::registry::{projection_value, RegistrySnapshot, TrustedSigners};
use crate::snapshot::SharedSnapshot;
use crate::stark::{self, StarkError};

/// The submission accepted by [`verify_payload`].
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Payload {
    /// The proof envelope.
    pub envelope: Envelope,
    /// When set, stop after metering; no cryptographic work runs.
    #[serde(default)]
    pub meter_only: bool,
    /// Inline policy override (test harnesses only).
    #[serde(default)]
    pub policy: Option<Policy>,
}

/// Canonically-measured sizes echoed for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Canonical bytes of the proof body.
    pub proof_bytes: u64,
    /// Canonical bytes of the embedded VK (zero for `vk_ref` envelopes).
    pub vk_bytes: u64,
    /// Number of public inputs.
    pub num_public_inputs: u64,
}

/// The stable result object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Verdict.
    pub ok: bool,
    /// Metering result; zero when metering did not run.
    pub units: u64,
    /// Envelope kind, when it parsed far enough to know.
    pub kind: Option<ProofKind>,
    /// Effective circuit identifier, when derivable.
    pub circuit_id: Option<String>,
    /// Normalized failure; absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Failure>,
    /// Canonical size measurements.
    pub meta: ReportMeta,
}

struct Ctx {
    kind: Option<ProofKind>,
    circuit_id: Option<String>,
    units: u64,
    meta: ReportMeta,
}

impl Ctx {
    fn fail(self, failure: Failure) -> Report {
        debug!(code = failure.code.as_str(), "verification rejected");
        Report {
            ok: false,
            units: self.units,
            kind: self.kind,
            circuit_id: self.circuit_id,
            error: Some(failure),
            meta: self.meta,
        }
    }

    fn done(self) -> Report {
        Report {
            ok: true,
            units: self.units,
            kind: self.kind,
            circuit_id: self.circuit_id,
            error: None,
            meta: self.meta,
        }
    }
}

// ============================================================================
// Error normalization
// ============================================================================

fn from_policy(err: PolicyError) -> Failure {
    let code = match &err {
        PolicyError::NotAllowed { .. } => ErrorCode::NotAllowed,
        PolicyError::Limit { .. } => ErrorCode::LimitExceeded,
        PolicyError::MissingTable { .. } => ErrorCode::ImportFailure,
    };
    Failure::new(code, err.to_string())
}

fn from_stark(err: StarkError) -> Failure {
    let code = match &err {
        StarkError::Params(_) | StarkError::Shape(_) => ErrorCode::BadArguments,
        StarkError::QueryFloor { .. } => ErrorCode::LimitExceeded,
        StarkError::Fri(FriError::Params(_)) | StarkError::Fri(FriError::Shape(_)) => {
            ErrorCode::BadArguments
        }
        StarkError::Merkle(_)
        | StarkError::Fri(_)
        | StarkError::Composition { .. } => ErrorCode::VerifyFailed,
    };
    Failure::new(code, err.to_string())
}

fn from_plonk(err: plonk::PlonkError) -> Failure {
    let code = match &err {
        plonk::PlonkError::InputCount { .. } => ErrorCode::BadArguments,
        plonk::PlonkError::Kzg(crate::kzg::KzgError::Curve(_)) => ErrorCode::BadArguments,
        plonk::PlonkError::DegenerateChallenge
        | plonk::PlonkError::Kzg(crate::kzg::KzgError::Equation)
        | plonk::PlonkError::Equation => ErrorCode::VerifyFailed,
    };
    Failure::new(code, err.to_string())
}

fn from_groth16(err: groth16::Groth16Error) -> Failure {
    let code = match &err {
        groth16::Groth16Error::EmptyIc | groth16::Groth16Error::InputCount { .. } => {
            ErrorCode::BadArguments
        }
        groth16::Groth16Error::Equation => ErrorCode::VerifyFailed,
    };
    Failure::new(code, err.to_string())
}

// ============================================================================
// Entry points
// ============================================================================

/// Verify one payload against immutable snapshots of registry and policy.
///
/// Pure over its inputs: for fixed payload and snapshots, two invocations
/// return identical reports.
pub fn verify_payload(
    payload: &Payload,
    registry: &RegistrySnapshot,
    policy: &Policy,
    signers: Option<&TrustedSigners>,
) -> Report {
    let policy = payload.policy.as_ref().unwrap_or(policy);
    let env = &payload.envelope;
    let mut ctx = Ctx {
        kind: Some(env.kind),
        circuit_id: env.circuit_id().map(str::to_owned),
        units: 0,
        meta: ReportMeta::default(),
    };

    // Parsed: structural validation and field-element admission.
    if let Err(e) = env.validate() {
        return ctx.fail(Failure::bad_arguments(e.to_string()));
    }
    let public_inputs = match env.decode_public_inputs() {
        Ok(inputs) => inputs,
        Err(e) => return ctx.fail(Failure::bad_arguments(e.to_string())),
    };

    // Canonical size measurement.
    let proof_bytes = match canonical::encoded_len(&env.proof) {
        Ok(n) => n,
        Err(e) => return ctx.fail(Failure::bad_arguments(format!("proof: {e}"))),
    };
    let vk_bytes = match &env.vk {
        Some(vk) => match canonical::encoded_len(vk) {
            Ok(n) => n,
            Err(e) => return ctx.fail(Failure::bad_arguments(format!("vk: {e}"))),
        },
        None => 0,
    };
    let sizes = SizeProfile {
        proof_bytes,
        vk_bytes,
        num_public_inputs: public_inputs.len() as u64,
        kzg_openings: match env.kind {
            ProofKind::PlonkKzgBn254 => plonk::KZG_OPENINGS,
            _ => 0,
        },
    };
    ctx.meta = ReportMeta {
        proof_bytes,
        vk_bytes,
        num_public_inputs: public_inputs.len() as u64,
    };

    // Limited.
    if let Err(e) = policy.check_limits(env.kind, &sizes) {
        return ctx.fail(from_policy(e));
    }

    // Allowed.
    let circuit_id = match env.circuit_id() {
        Some(id) => id.to_owned(),
        None => return ctx.fail(Failure::bad_arguments("no circuit identifier")),
    };
    if let Err(e) = policy.check_allowlist(&circuit_id) {
        return ctx.fail(from_policy(e));
    }

    // Metered.
    ctx.units = match policy.compute_units(env.kind, &sizes) {
        Ok(units) => units,
        Err(e) => return ctx.fail(from_policy(e)),
    };
    if payload.meter_only {
        debug!(kind = env.kind.as_str(), units = ctx.units, "meter-only request");
        return ctx.done();
    }

    // VkResolved.
    let (vk_value, fri_value, vk_hash) =
        match resolve_vk(env, &circuit_id, registry, signers) {
            Ok(resolved) => resolved,
            Err(f) => return ctx.fail(f),
        };

    // Dispatched.
    let outcome: Result<(), Failure> = match env.kind {
        ProofKind::Groth16Bn254 => adapter::groth16_vk(&vk_value)
            .and_then(|vk| Ok((vk, adapter::groth16_proof(&env.proof)?)))
            .map_err(|e| Failure::new(e.code(), e.to_string()))
            .and_then(|(vk, proof)| {
                groth16::verify(&vk, &proof, &public_inputs).map_err(from_groth16)
            }),
        ProofKind::PlonkKzgBn254 => adapter::plonk_vk(&vk_value)
            .and_then(|vk| Ok((vk, adapter::plonk_proof(&env.proof)?)))
            .map_err(|e| Failure::new(e.code(), e.to_string()))
            .and_then(|(vk, proof)| {
                plonk::verify(&vk, &proof, &public_inputs, &circuit_id, &vk_hash)
                    .map_err(from_plonk)
            }),
        ProofKind::StarkFriMerkle => adapter::stark_vk(&vk_value, fri_value.as_ref())
            .and_then(|vk| Ok((vk, adapter::stark_proof(&env.proof)?)))
            .map_err(|e| Failure::new(e.code(), e.to_string()))
            .and_then(|(vk, proof)| {
                let min_queries = policy
                    .min_fri_queries(env.kind)
                    .unwrap_or(stark::DEFAULT_MIN_QUERIES);
                stark::verify(&vk, &proof, &public_inputs, &circuit_id, min_queries)
                    .map_err(from_stark)
            }),
    };

    match outcome {
        Ok(()) => {
            debug!(kind = env.kind.as_str(), units = ctx.units, "proof accepted");
            ctx.done()
        }
        Err(f) => ctx.fail(f),
    }
}

/// Resolve the VK content to verify against, plus its content hash.
fn resolve_vk(
    env: &Envelope,
    circuit_id: &str,
    registry: &RegistrySnapshot,
    signers: Option<&TrustedSigners>,
) -> Result<(Value, Option<Value>, HashId), Failure> {
    // Embedded VK in projection layout (STARK descriptors split their FRI
    // block so both spellings hash identically).
    let embedded = match &env.vk {
        Some(vk) => {
            let parts = match env.kind {
                ProofKind::StarkFriMerkle => adapter::split_embedded_stark_vk(vk)
                    .map_err(|e| Failure::new(e.code(), e.to_string()))?,
                _ => (vk.clone(), None),
            };
            let projection =
                projection_value(env.kind, env.vk_format, &parts.0, parts.1.as_ref());
            let hash = HashId::of_value(&projection)
                .map_err(|e| Failure::bad_arguments(format!("vk: {e}")))?;
            Some((parts.0, parts.1, hash))
        }
        None => None,
    };

    if let Some(vk_ref) = &env.vk_ref {
        let record = registry
            .resolve(vk_ref)
            .map_err(|e| Failure::registry_error(e.to_string()))?;
        record
            .verify_record(signers)
            .map_err(|e| Failure::registry_error(e.to_string()))?;
        if record.kind != env.kind || record.vk_format != env.vk_format {
            return Err(Failure::bad_arguments(
                "envelope kind/vk_format disagree with the registry record",
            ));
        }
        let record_hash = HashId::parse(&record.vk_hash)
            .map_err(|e| Failure::registry_error(format!("{vk_ref}: {e}")))?;
        if let Some((_, _, embedded_hash)) = &embedded {
            if *embedded_hash != record_hash {
                warn!(circuit = vk_ref.as_str(), "embedded vk_hash disagrees with registry");
                return Err(Failure::registry_error(format!(
                    "embedded VK hash disagrees with registry entry {vk_ref}"
                )));
            }
        }
        return Ok((record.vk.clone(), record.fri_params.clone(), record_hash));
    }

    // Embedded only (validate() guarantees one of the two is present).
    let (vk_value, fri_value, hash) =
        embedded.ok_or_else(|| Failure::bad_arguments("envelope must carry vk or vk_ref"))?;
    if registry.contains(circuit_id) {
        let record = registry
            .resolve(circuit_id)
            .map_err(|e| Failure::registry_error(e.to_string()))?;
        let record_hash = HashId::parse(&record.vk_hash)
            .map_err(|e| Failure::registry_error(format!("{circuit_id}: {e}")))?;
        if hash != record_hash {
            warn!(circuit = circuit_id, "embedded vk_hash disagrees with registry");
            return Err(Failure::registry_error(format!(
                "embedded VK hash disagrees with registry entry {circuit_id}"
            )));
        }
    }
    Ok((vk_value, fri_value, hash))
}

/// Strict-canonical JSON front door: parse, then [`verify_payload`].
pub fn verify_json(
    bytes: &[u8],
    registry: &RegistrySnapshot,
    policy: &Policy,
    signers: Option<&TrustedSigners>,
) -> Report {
    let empty = Ctx { kind: None, circuit_id: None, units: 0, meta: ReportMeta::default() };
    let value = match canonical::decode_strict(bytes) {
        Ok(v) => v,
        Err(e) => return empty.fail(Failure::bad_arguments(e.to_string())),
    };
    let payload: Payload = match serde_json::from_value(value) {
        Ok(p) => p,
        Err(e) => return empty.fail(Failure::bad_arguments(e.to_string())),
    };
    verify_payload(&payload, registry, policy, signers)
}

/// Snapshot holder exposing the entry-point with hot-reload support.
///
/// Readers capture both snapshots at call entry; [`Gateway::swap_policy`]
/// and [`Gateway::swap_registry`] replace them atomically for subsequent
/// calls without disturbing in-flight ones.
pub struct Gateway {
    registry: SharedSnapshot<RegistrySnapshot>,
    policy: SharedSnapshot<Policy>,
    signers: Option<TrustedSigners>,
}

impl Gateway {
    /// Build a gateway over initial snapshots.
    pub fn new(registry: RegistrySnapshot, policy: Policy) -> Self {
        Self {
            registry: SharedSnapshot::new(registry),
            policy: SharedSnapshot::new(policy),
            signers: None,
        }
    }

    /// Enable registry signature verification with a trusted key set.
    pub fn with_signers(mut self, signers: TrustedSigners) -> Self {
        self.signers = Some(signers);
        self
    }

    /// Verify a payload against the current snapshots.
    pub fn verify(&self, payload: &Payload) -> Report {
        let registry = self.registry.load();
        let policy = self.policy.load();
        verify_payload(payload, &registry, &policy, self.signers.as_ref())
    }

    /// Verify a strict-canonical JSON payload.
    pub fn verify_json(&self, bytes: &[u8]) -> Report {
        let registry = self.registry.load();
        let policy = self.policy.load();
        verify_json(bytes, &registry, &policy, self.signers.as_ref())
    }

    /// Metering-only convenience: identical to a `meter_only` payload.
    pub fn meter(&self, payload: &Payload) -> Report {
        let metered = Payload {
            envelope: payload.envelope.clone(),
            meter_only: true,
            policy: payload.policy.clone(),
        };
        self.verify(&metered)
    }

    /// Atomically replace the registry snapshot.
    pub fn swap_registry(&self, registry: RegistrySnapshot) {
        self.registry.store(registry);
    }

    /// Atomically replace the policy snapshot.
    pub fn swap_policy(&self, policy: Policy) {
        self.policy.store(policy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::encode;
    use crate::curve::fr_to_be_bytes;
    use crate::envelope::{EnvelopeMeta, VkFormat};
    use crate::policy::tests::test_policy;
    use crate::F;
    use ark_ec::CurveGroup;
    use serde_json::{json, Value};

    fn hex_input(x: &F) -> String {
        hex::encode(fr_to_be_bytes(x))
    }

    fn groth16_setup() -> (RegistrySnapshot, Policy, Payload, Vec<F>) {
        let inputs = vec![F::from(0x42u64), F::from(0x0fu64)];
        let (vk, proof) = crate::groth16::tests::fixture(11, &inputs);
        let record = crate::registry::tests::record_for(
            "counter_groth16_bn254@1",
            ProofKind::Groth16Bn254,
            encode::groth16_vk_value(&vk),
        );
        let registry = RegistrySnapshot::from_records([record], None).unwrap();
        let policy = test_policy(&["counter_groth16_bn254@1"]);
        let payload = Payload {
            envelope: Envelope {
                kind: ProofKind::Groth16Bn254,
                proof: encode::groth16_proof_value(&proof),
                public_inputs: inputs.iter().map(hex_input).collect(),
                vk: None,
                vk_format: VkFormat::Snarkjs,
                vk_ref: Some("counter_groth16_bn254@1".into()),
                meta: EnvelopeMeta::default(),
            },
            meter_only: false,
            policy: None,
        };
        (registry, policy, payload, inputs)
    }

    #[test]
    fn groth16_happy_path_via_vk_ref() {
        let (registry, policy, payload, _) = groth16_setup();
        let report = verify_payload(&payload, &registry, &policy, None);
        assert!(report.ok, "expected success, got {:?}", report.error);
        assert_eq!(report.kind, Some(ProofKind::Groth16Bn254));
        assert_eq!(report.circuit_id.as_deref(), Some("counter_groth16_bn254@1"));
        assert!(report.error.is_none());
        assert_eq!(report.meta.num_public_inputs, 2);
        // vk_ref envelopes meter no VK bytes.
        assert_eq!(report.meta.vk_bytes, 0);
        // units = base + 2·per_pi + proof_bytes·per_proof_byte + 0·per_vk_byte
        assert_eq!(report.units, 1000 + 2 * 50 + 2 * report.meta.proof_bytes);
    }

    #[test]
    fn tampered_groth16_is_verify_failed_with_full_units() {
        let (registry, policy, mut payload, inputs) = groth16_setup();
        let (_, proof) = crate::groth16::tests::fixture(11, &inputs);
        let tampered = crate::groth16::Groth16Proof {
            a: (proof.a * F::from(2u64)).into_affine(),
            ..proof
        };
        payload.envelope.proof = encode::groth16_proof_value(&tampered);
        let report = verify_payload(&payload, &registry, &policy, None);
        assert!(!report.ok);
        assert_eq!(report.error.as_ref().unwrap().code, ErrorCode::VerifyFailed);
        // Metering ran to completion before the verifier rejected.
        assert_eq!(report.units, 1000 + 2 * 50 + 2 * report.meta.proof_bytes);
    }

    #[test]
    fn plonk_embedded_vk_pinned_by_registry() {
        let fx = crate::plonk::tests::fixture(29);
        let circuit = "identity_plonk_kzg_bn254@1";
        let vk_value = encode::plonk_vk_value(&fx.vk);

        let record = crate::registry::tests::record_for(
            circuit,
            ProofKind::PlonkKzgBn254,
            vk_value.clone(),
        );
        // The dispatcher binds the projection hash into the transcript, so
        // the proof must be built against it.
        let vk_hash = HashId::parse(&record.vk_hash).unwrap();
        let proof = crate::plonk::tests::prove_with_hash(&fx, circuit, &vk_hash);
        let registry = RegistrySnapshot::from_records([record], None).unwrap();
        let policy = test_policy(&[circuit]);
        let payload = Payload {
            envelope: Envelope {
                kind: ProofKind::PlonkKzgBn254,
                proof: encode::plonk_proof_value(&proof),
                public_inputs: vec![],
                vk: Some(vk_value),
                vk_format: VkFormat::Plonkjs,
                vk_ref: None,
                meta: EnvelopeMeta { circuit_id: Some(circuit.into()) },
            },
            meter_only: false,
            policy: None,
        };
        let report = verify_payload(&payload, &registry, &policy, None);
        assert!(report.ok, "expected success, got {:?}", report.error);
        // Embedded VK bytes are metered, and so are the two KZG openings.
        assert!(report.meta.vk_bytes > 0);
        assert_eq!(
            report.units,
            1000 + 2 * report.meta.proof_bytes + report.meta.vk_bytes + 300 * 2
        );
    }

    #[test]
    fn plonk_embedded_vk_hash_mismatch_is_registry_error() {
        let fx = crate::plonk::tests::fixture(29);
        let circuit = "identity_plonk_kzg_bn254@1";
        let proof = crate::plonk::tests::prove(&fx, circuit);
        // Register a *different* VK under the same id.
        let other = crate::plonk::tests::fixture(31);
        let record = crate::registry::tests::record_for(
            circuit,
            ProofKind::PlonkKzgBn254,
            encode::plonk_vk_value(&other.vk),
        );
        let registry = RegistrySnapshot::from_records([record], None).unwrap();
        let policy = test_policy(&[circuit]);
        let payload = Payload {
            envelope: Envelope {
                kind: ProofKind::PlonkKzgBn254,
                proof: encode::plonk_proof_value(&proof),
                public_inputs: vec![],
                vk: Some(encode::plonk_vk_value(&fx.vk)),
                vk_format: VkFormat::Plonkjs,
                vk_ref: None,
                meta: EnvelopeMeta { circuit_id: Some(circuit.into()) },
            },
            meter_only: false,
            policy: None,
        };
        let report = verify_payload(&payload, &registry, &policy, None);
        assert!(!report.ok);
        assert_eq!(report.error.unwrap().code, ErrorCode::RegistryError);
    }

    #[test]
    fn stark_happy_path_embedded_descriptor() {
        let vk = crate::stark::tests::test_vk();
        let circuit = "doubling_stark_fri_merkle@1";
        let inputs = [F::from(42u64)];
        let proof = crate::stark::tests::prove(&vk, &inputs, circuit);
        let descriptor = json!({
            "air": crate::stark::tests::doubling_air_spec(),
            "fri": serde_json::to_value(vk.fri).unwrap(),
        });
        let registry = RegistrySnapshot::default();
        let policy = test_policy(&[circuit]);
        let payload = Payload {
            envelope: Envelope {
                kind: ProofKind::StarkFriMerkle,
                proof: encode::stark_proof_value(&proof),
                public_inputs: inputs.iter().map(hex_input).collect(),
                vk: Some(descriptor),
                vk_format: VkFormat::FriDescriptor,
                vk_ref: None,
                meta: EnvelopeMeta { circuit_id: Some(circuit.into()) },
            },
            meter_only: false,
            policy: None,
        };
        let report = verify_payload(&payload, &registry, &policy, None);
        assert!(report.ok, "expected success, got {:?}", report.error);
    }

    #[test]
    fn disallowed_circuit_short_circuits_before_registry() {
        let (_, policy, mut payload, _) = groth16_setup();
        // Unknown circuit plus an *empty* registry: if VK resolution ran
        // first, this would surface REGISTRY_ERROR instead.
        payload.envelope.vk_ref = Some("experimental_x@1".into());
        let report = verify_payload(&payload, &RegistrySnapshot::default(), &policy, None);
        assert!(!report.ok);
        assert_eq!(report.units, 0);
        assert_eq!(report.error.unwrap().code, ErrorCode::NotAllowed);
    }

    #[test]
    fn oversized_proof_short_circuits_before_crypto() {
        let (registry, mut policy, payload, _) = groth16_setup();
        policy.limits.get_mut(&ProofKind::Groth16Bn254).unwrap().max_proof_bytes = 8;
        let report = verify_payload(&payload, &registry, &policy, None);
        assert!(!report.ok);
        assert_eq!(report.units, 0);
        assert_eq!(report.error.unwrap().code, ErrorCode::LimitExceeded);
        assert!(report.meta.proof_bytes > 8);
    }

    #[test]
    fn meter_only_matches_full_path_units() {
        let (registry, policy, mut payload, _) = groth16_setup();
        let full = verify_payload(&payload, &registry, &policy, None);
        payload.meter_only = true;
        let metered = verify_payload(&payload, &registry, &policy, None);
        assert!(metered.ok);
        assert_eq!(metered.units, full.units);
        // Meter-only never resolves the VK, so an empty registry changes
        // nothing.
        let metered_no_reg =
            verify_payload(&payload, &RegistrySnapshot::default(), &policy, None);
        assert_eq!(metered_no_reg.units, full.units);
        assert!(metered_no_reg.ok);
    }

    #[test]
    fn dispatcher_is_idempotent() {
        let (registry, policy, payload, _) = groth16_setup();
        let a = verify_payload(&payload, &registry, &policy, None);
        let b = verify_payload(&payload, &registry, &policy, None);
        assert_eq!(a, b);
    }

    #[test]
    fn unresolved_vk_ref_is_registry_error() {
        let (_, policy, payload, _) = groth16_setup();
        let report = verify_payload(&payload, &RegistrySnapshot::default(), &policy, None);
        assert!(!report.ok);
        assert_eq!(report.error.unwrap().code, ErrorCode::RegistryError);
        // Metering already ran.
        assert!(report.units > 0);
    }

    #[test]
    fn kind_mismatch_with_record_is_bad_arguments() {
        let (registry, mut policy, mut payload, _) = groth16_setup();
        payload.envelope.kind = ProofKind::PlonkKzgBn254;
        payload.envelope.vk_format = VkFormat::Plonkjs;
        policy.allowlist.insert("counter_groth16_bn254@1".into());
        let report = verify_payload(&payload, &registry, &policy, None);
        assert!(!report.ok);
        assert_eq!(report.error.unwrap().code, ErrorCode::BadArguments);
    }

    #[test]
    fn missing_gas_table_is_import_failure() {
        let (registry, mut policy, payload, _) = groth16_setup();
        policy.gas.remove(&ProofKind::Groth16Bn254);
        let report = verify_payload(&payload, &registry, &policy, None);
        assert!(!report.ok);
        assert_eq!(report.error.unwrap().code, ErrorCode::ImportFailure);
    }

    #[test]
    fn strict_json_front_door() {
        let (registry, policy, _, _) = groth16_setup();
        // Whitespace is not canonical.
        let report = verify_json(b"{\"envelope\": {}}", &registry, &policy, None);
        assert!(!report.ok);
        assert_eq!(report.error.unwrap().code, ErrorCode::BadArguments);
        // Unknown payload fields are rejected after canonical decoding.
        let report = verify_json(br#"{"bogus":1}"#, &registry, &policy, None);
        assert_eq!(report.error.unwrap().code, ErrorCode::BadArguments);
    }

    #[test]
    fn payload_policy_override_wins() {
        let (registry, policy, mut payload, _) = groth16_setup();
        let mut tight = policy.clone();
        tight.limits.get_mut(&ProofKind::Groth16Bn254).unwrap().max_proof_bytes = 1;
        payload.policy = Some(tight);
        let report = verify_payload(&payload, &registry, &policy, None);
        assert_eq!(report.error.unwrap().code, ErrorCode::LimitExceeded);
    }

    #[test]
    fn gateway_swaps_snapshots_atomically() {
        let (registry, policy, payload, _) = groth16_setup();
        let gateway = Gateway::new(RegistrySnapshot::default(), policy.clone());
        assert_eq!(
            gateway.verify(&payload).error.unwrap().code,
            ErrorCode::RegistryError
        );
        gateway.swap_registry(registry);
        assert!(gateway.verify(&payload).ok);

        let mut closed = policy;
        closed.allowlist.clear();
        gateway.swap_policy(closed);
        assert_eq!(
            gateway.verify(&payload).error.unwrap().code,
            ErrorCode::NotAllowed
        );
    }

    #[test]
    fn gateway_meter_never_runs_crypto() {
        let (_, policy, payload, _) = groth16_setup();
        let gateway = Gateway::new(RegistrySnapshot::default(), policy);
        let report = gateway.meter(&payload);
        assert!(report.ok);
        assert!(report.units > 0);
    }

    #[test]
    fn report_serializes_stable_shape() {
        let (registry, policy, payload, _) = groth16_setup();
        let report = verify_payload(&payload, &registry, &policy, None);
        let v: Value = serde_json::to_value(&report).unwrap();
        assert_eq!(v["ok"], json!(true));
        assert_eq!(v["kind"], json!("groth16_bn254"));
        assert_eq!(v["circuit_id"], json!("counter_groth16_bn254@1"));
        assert!(v.get("error").is_none());
        assert!(v["meta"]["proof_bytes"].as_u64().unwrap() > 0);
    }
}
