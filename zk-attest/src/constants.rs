//! Attribute schema bounds shared by the proof generator and its callers.

/// Broad attestable age range. Proofs are only attempted for ages inside it.
pub const AGE_RANGE: (f64, f64) = (18.0, 50.0);

/// Overlapping age bands.
///
/// A contributor whose age falls in more than one band gets one proof per
/// band; researchers query whichever band matches their cohort.
pub const AGE_BANDS: [(f64, f64); 3] = [
    (20.0, 30.0),
    (25.0, 35.0),
    (30.0, 40.0),
];

/// Normal estrogen range (pg/mL).
pub const ESTROGEN_RANGE: (f64, f64) = (15.0, 350.0);

/// Elevated-estrogen band (pg/mL), attempted when the measurement exceeds
/// its lower bound.
pub const ESTROGEN_ELEVATED_RANGE: (f64, f64) = (100.0, 500.0);

/// Normal progesterone range (ng/mL).
pub const PROGESTERONE_RANGE: (f64, f64) = (0.1, 25.0);

/// Normal testosterone range (ng/dL).
pub const TESTOSTERONE_RANGE: (f64, f64) = (15.0, 70.0);

/// Byte length of commitment blinding factors.
pub const BLINDING_LEN: usize = 32;

/// Byte length of proof challenges.
pub const CHALLENGE_LEN: usize = 16;
