//! Types shared between the proof generator and downstream verifiers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Predicate class a proof attests to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofKind {
    Range,
    Equality,
    Membership,
}

/// A single attestation over one committed attribute.
///
/// Immutable once created. Only the commitment and proof digests travel
/// downstream; the blinding factor stays with the generating call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proof {
    #[serde(rename = "type")]
    pub kind: ProofKind,
    /// Canonical predicate string, e.g. `age >= 18 AND age <= 50`.
    pub criteria: String,
    /// Hex-encoded commitment digest.
    pub commitment: String,
    /// Hex-encoded proof digest.
    pub proof: String,
    pub timestamp: DateTime<Utc>,
}

/// One contributor's measurements.
///
/// Attributes absent from the profile yield no proofs; absence must not be
/// read as "value is outside all ranges".
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AttributeProfile {
    /// Age in years.
    pub age: Option<u32>,
    /// Estrogen (pg/mL).
    pub estrogen: Option<f64>,
    /// Progesterone (ng/mL).
    pub progesterone: Option<f64>,
    /// Testosterone (ng/dL).
    pub testosterone: Option<f64>,
    pub uses_contraceptives: Option<bool>,
    pub has_pcos: Option<bool>,
}
