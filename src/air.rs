//! AIR descriptor: transition constraints and boundary assertions
//!
//! A STARK circuit's algebraic intermediate representation travels inside
//! the verifying key (the `fri_params` projection), so it participates in
//! `vk_hash` and cannot drift independently of the pinned key.
//!
//! The wire shape is deliberately small: a transition constraint is a sum of
//! terms, each term a coefficient times a product of register references on
//! the current or next row. Boundary assertions pin a register to a value at
//! an absolute step. Everything the verifier needs to evaluate constraints
//! at a queried position is derivable from this descriptor plus the two
//! opened trace rows.

use serde::{Deserialize, Serialize};

use crate::curve::{fr_from_be_bytes, CurveError};
use crate::F;

/// Which trace row a variable reference reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOffset {
    /// The queried row.
    Cur,
    /// The next row (one trace step later).
    Next,
}

/// A register reference inside a constraint term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VarRef {
    /// Register column index.
    pub reg: u16,
    /// Row the reference reads.
    pub row: RowOffset,
}

/// One term of a transition constraint: `coeff · Π vars`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Term {
    /// Coefficient as 32-byte big-endian lowercase hex.
    pub coeff: String,
    /// Register references multiplied together (may be empty for a
    /// constant term).
    pub vars: Vec<VarRef>,
}

/// A transition constraint: the sum of its terms must vanish on every
/// consecutive row pair of an honest trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Constraint {
    /// Terms of the constraint polynomial.
    pub terms: Vec<Term>,
}

/// Pins a register to a value at an absolute trace step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoundaryAssertion {
    /// Register column index.
    pub reg: u16,
    /// Absolute step in `[0, trace_length)`.
    pub step: u64,
    /// Asserted value as 32-byte big-endian lowercase hex.
    pub value: String,
}

/// Wire shape of an AIR descriptor, exactly as hashed into `vk_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AirSpec {
    /// Number of register columns.
    pub registers: u16,
    /// Trace length `T` (power of two).
    pub trace_length: u64,
    /// Transition constraints.
    pub transition: Vec<Constraint>,
    /// Boundary assertions.
    pub boundary: Vec<BoundaryAssertion>,
}

/// Descriptor validation failures.
#[derive(Debug, thiserror::Error)]
pub enum AirError {
    /// Trace length must be a power of two and at least 2.
    #[error("trace_length must be a power of two ≥ 2, got {got}")]
    TraceLength {
        /// Declared length.
        got: u64,
    },
    /// A register index pointed past the declared register count.
    #[error("register index {reg} out of range (registers = {registers})")]
    RegisterRange {
        /// Offending index.
        reg: u16,
        /// Declared register count.
        registers: u16,
    },
    /// A boundary step pointed past the trace.
    #[error("boundary step {step} out of range (trace_length = {trace_length})")]
    StepRange {
        /// Offending step.
        step: u64,
        /// Declared trace length.
        trace_length: u64,
    },
    /// A coefficient or asserted value failed hex/field admission.
    #[error("bad field element in descriptor: {0}")]
    BadElement(#[from] CurveError),
    /// A coefficient or asserted value was not 64 lowercase hex digits.
    #[error("field elements must be 64 lowercase hex digits")]
    BadHex,
}

/// Parsed, evaluation-ready form of [`AirSpec`].
#[derive(Debug, Clone)]
pub struct Air {
    /// Number of register columns.
    pub registers: usize,
    /// Trace length `T`.
    pub trace_length: u64,
    transition: Vec<Vec<(F, Vec<(usize, RowOffset)>)>>,
    boundary: Vec<(usize, u64, F)>,
}

/// Decode a 64-digit lowercase hex string into Fr.
pub(crate) fn fr_from_hex(s: &str) -> Result<F, AirError> {
    if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return Err(AirError::BadHex);
    }
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(s, &mut bytes).map_err(|_| AirError::BadHex)?;
    Ok(fr_from_be_bytes(&bytes)?)
}

impl Air {
    /// Validate and parse a wire descriptor.
    pub fn from_spec(spec: &AirSpec) -> Result<Self, AirError> {
        if spec.trace_length < 2 || !spec.trace_length.is_power_of_two() {
            return Err(AirError::TraceLength { got: spec.trace_length });
        }
        let check_reg = |reg: u16| -> Result<usize, AirError> {
            if reg >= spec.registers {
                Err(AirError::RegisterRange { reg, registers: spec.registers })
            } else {
                Ok(reg as usize)
            }
        };
        let mut transition = Vec::with_capacity(spec.transition.len());
        for c in &spec.transition {
            let mut terms = Vec::with_capacity(c.terms.len());
            for t in &c.terms {
                let coeff = fr_from_hex(&t.coeff)?;
                let mut vars = Vec::with_capacity(t.vars.len());
                for v in &t.vars {
                    vars.push((check_reg(v.reg)?, v.row));
                }
                terms.push((coeff, vars));
            }
            transition.push(terms);
        }
        let mut boundary = Vec::with_capacity(spec.boundary.len());
        for b in &spec.boundary {
            if b.step >= spec.trace_length {
                return Err(AirError::StepRange { step: b.step, trace_length: spec.trace_length });
            }
            boundary.push((check_reg(b.reg)?, b.step, fr_from_hex(&b.value)?));
        }
        Ok(Self {
            registers: spec.registers as usize,
            trace_length: spec.trace_length,
            transition,
            boundary,
        })
    }

    /// Number of transition constraints.
    pub fn num_transition(&self) -> usize {
        self.transition.len()
    }

    /// Boundary assertions as `(register, step, value)` triples.
    pub fn boundary(&self) -> &[(usize, u64, F)] {
        &self.boundary
    }

    /// Highest multiplicative degree across all transition constraints.
    pub fn max_degree(&self) -> usize {
        self.transition
            .iter()
            .flat_map(|c| c.iter().map(|(_, vars)| vars.len()))
            .max()
            .unwrap_or(0)
            .max(1)
    }

    /// Evaluate transition constraint `idx` on an opened row pair.
    ///
    /// `cur` and `next` must each hold `registers` elements; callers check
    /// the arity when admitting trace openings.
    pub fn eval_transition(&self, idx: usize, cur: &[F], next: &[F]) -> F {
        use ark_ff::Zero;
        let mut acc = F::zero();
        for (coeff, vars) in &self.transition[idx] {
            let mut term = *coeff;
            for (reg, row) in vars {
                term *= match row {
                    RowOffset::Cur => cur[*reg],
                    RowOffset::Next => next[*reg],
                };
            }
            acc += term;
        }
        acc
    }
}
