//! Crate root: public surface, core aliases, and gateway-wide invariants
//!
//! This crate is the **verification gateway** that sits between application
//! callers (contract hosts, RPC endpoints, explorers) and the cryptographic
//! verifier backends. Callers hand it a type-tagged *proof envelope*; the
//! gateway admits it through policy, meters it deterministically, resolves a
//! pinned verifying key, dispatches to the matching verifier, and returns a
//! stable [`Report`].
//!
//! ## Invariants
//!
//! - **Field & Curve.** The scalar field is `ark_bn254::Fr` (`F` in this
//!   crate); commitments and proof points live on BN254 (`G1`, `G2`). All
//!   arithmetic comes from Arkworks; we **forbid unsafe** throughout.
//!
//! - **Canonical bytes everywhere.** Every digest and every size that feeds
//!   metering is computed over the canonical JSON encoding produced by
//!   [`canonical`]: bytewise-sorted keys, compact separators, no floats.
//!   Two structurally-equal values hash identically on every platform.
//!
//! - **Fiat–Shamir (FS).** SHA3-256 with explicit domain-separation labels,
//!   length-delimited absorbs, and counter-separated challenge derivation.
//!   The verifier reconstructs every transcript from public envelope data
//!   alone; see [`transcript`].
//!
//! - **Snapshot discipline.** The registry and the policy are immutable
//!   snapshots behind an atomically-swappable cell ([`snapshot`]). A call
//!   captures both at entry and never observes a torn update.
//!
//! - **No panics across the boundary.** Every lower-level failure is mapped
//!   into the closed [`ErrorCode`] taxonomy and returned inside the
//!   [`Report`]; the dispatcher never unwinds into the caller.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// Canonical JSON encoding, strict decoding, and size measurement.
pub mod canonical;
/// SHA3-256 digests and `sha3-256:<hex>` hash identifiers.
pub mod hashing;
/// Poseidon permutation over Fr with pinned parameters.
pub mod poseidon;
/// Scalar/point admission (length, range, curve, subgroup) and pairings.
pub mod curve;
/// Fiat–Shamir transcript (domain-separated, length-delimited).
pub mod transcript;
/// KZG opening checks on BN254 (single and paired form).
pub mod kzg;
/// Merkle inclusion paths (SHA3-256 or Poseidon nodes).
pub mod merkle;
/// FRI low-degree-test verification.
pub mod fri;
/// AIR descriptor: transition constraints and boundary assertions.
pub mod air;
/// Proof envelope model, kind/format tags, circuit-id grammar.
pub mod envelope;
/// Toolchain-shape adapters (snarkjs / plonkjs / fri-descriptor).
pub mod adapter;
/// Groth16 verification (BN254).
pub mod groth16;
/// PLONK + KZG verification (BN254).
pub mod plonk;
/// STARK / FRI + Merkle verification.
pub mod stark;
/// Admission policy and deterministic metering.
pub mod policy;
/// Pinned verifying-key registry.
pub mod registry;
/// Atomically swappable shared snapshots.
pub mod snapshot;
/// Closed error taxonomy returned to callers.
pub mod error;
/// Entry-point: envelope → policy → metering → verifier → [`Report`].
pub mod dispatch;

// ============================================================================
// Canonical aliases and root-level re-exports
// ============================================================================

/// Scalar field used across the crate (BN254).
pub type F = ark_bn254::Fr;

/// Base field of BN254.
pub type Fq = ark_bn254::Fq;

/// Quadratic extension of the base field (G2 coordinates).
pub type Fq2 = ark_bn254::Fq2;

/// G1 affine group element.
pub type G1 = ark_bn254::G1Affine;

/// G2 affine group element.
pub type G2 = ark_bn254::G2Affine;

pub use crate::dispatch::{Gateway, Payload, Report, ReportMeta};
pub use crate::envelope::{Envelope, ProofKind, VkFormat};
pub use crate::error::{ErrorCode, Failure};
pub use crate::policy::Policy;
pub use crate::registry::{RegistrySnapshot, TrustedSigners, VkRecord};
