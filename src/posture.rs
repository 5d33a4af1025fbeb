//! Posture alphabet and static lookup tables
//!
//! The classifier emits single-letter codes `A` through `T`. Each known code
//! maps to exactly one quality level; anything else (including the
//! `Unavailable` placeholder) has no quality and is reported as `Unknown`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Placeholder code assigned to rows whose features could not be classified
pub const UNAVAILABLE_CODE: &str = "Unavailable";

/// Raw classifier output.
///
/// Kept as an opaque string so that codes outside the known alphabet survive
/// the pipeline unchanged and can be reported as their own bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostureCode(String);

impl PostureCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Placeholder for rows that were kept without a prediction
    pub fn unavailable() -> Self {
        Self(UNAVAILABLE_CODE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The known posture this code denotes, if it is in the alphabet
    pub fn posture(&self) -> Option<Posture> {
        Posture::from_code(&self.0)
    }

    pub fn quality(&self) -> QualityLevel {
        self.posture()
            .map(Posture::quality)
            .unwrap_or(QualityLevel::Unknown)
    }
}

impl fmt::Display for PostureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostureCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<Posture> for PostureCode {
    fn from(posture: Posture) -> Self {
        Self::new(posture.code())
    }
}

/// The fixed 20-symbol posture alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Posture {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
}

impl Posture {
    pub const ALL: [Posture; 20] = [
        Posture::A,
        Posture::B,
        Posture::C,
        Posture::D,
        Posture::E,
        Posture::F,
        Posture::G,
        Posture::H,
        Posture::I,
        Posture::J,
        Posture::K,
        Posture::L,
        Posture::M,
        Posture::N,
        Posture::O,
        Posture::P,
        Posture::Q,
        Posture::R,
        Posture::S,
        Posture::T,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Posture::A => "A",
            Posture::B => "B",
            Posture::C => "C",
            Posture::D => "D",
            Posture::E => "E",
            Posture::F => "F",
            Posture::G => "G",
            Posture::H => "H",
            Posture::I => "I",
            Posture::J => "J",
            Posture::K => "K",
            Posture::L => "L",
            Posture::M => "M",
            Posture::N => "N",
            Posture::O => "O",
            Posture::P => "P",
            Posture::Q => "Q",
            Posture::R => "R",
            Posture::S => "S",
            Posture::T => "T",
        }
    }

    /// Exact, case-sensitive lookup
    pub fn from_code(code: &str) -> Option<Posture> {
        Posture::ALL.into_iter().find(|p| p.code() == code)
    }

    /// Static quality table: one good posture, five average, the rest bad
    pub fn quality(self) -> QualityLevel {
        match self {
            Posture::A => QualityLevel::Good,
            Posture::C | Posture::D | Posture::E | Posture::F | Posture::G => {
                QualityLevel::Average
            }
            Posture::B
            | Posture::H
            | Posture::I
            | Posture::J
            | Posture::K
            | Posture::L
            | Posture::M
            | Posture::N
            | Posture::O
            | Posture::P
            | Posture::Q
            | Posture::R
            | Posture::S
            | Posture::T => QualityLevel::Bad,
        }
    }
}

/// Coarse posture quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Good,
    Average,
    Bad,
    Unknown,
}

impl QualityLevel {
    /// Ordinal encoding used by the quality timeline (Bad=0, Average=1, Good=2)
    pub fn score(self) -> Option<u8> {
        match self {
            QualityLevel::Good => Some(2),
            QualityLevel::Average => Some(1),
            QualityLevel::Bad => Some(0),
            QualityLevel::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QualityLevel::Good => "good",
            QualityLevel::Average => "average",
            QualityLevel::Bad => "bad",
            QualityLevel::Unknown => "unknown",
        }
    }
}

/// Optional human-readable names for posture codes.
///
/// Built once (usually from the `[names]` config table) and shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostureNames(BTreeMap<String, String>);

impl PostureNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.0.insert(code.into(), name.into());
        self
    }

    pub fn name_of(&self, code: &PostureCode) -> Option<&str> {
        self.0.get(code.as_str()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, String>> for PostureNames {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_good_posture() {
        let good: Vec<_> = Posture::ALL
            .iter()
            .filter(|p| p.quality() == QualityLevel::Good)
            .collect();
        assert_eq!(good, vec![&Posture::A]);
    }

    #[test]
    fn test_average_subset() {
        let average: Vec<&str> = Posture::ALL
            .iter()
            .filter(|p| p.quality() == QualityLevel::Average)
            .map(|p| p.code())
            .collect();
        assert_eq!(average, vec!["C", "D", "E", "F", "G"]);

        let bad = Posture::ALL
            .iter()
            .filter(|p| p.quality() == QualityLevel::Bad)
            .count();
        assert_eq!(bad, 14);
    }

    #[test]
    fn test_code_round_trip_over_alphabet() {
        for posture in Posture::ALL {
            assert_eq!(Posture::from_code(posture.code()), Some(posture));
        }
    }

    #[test]
    fn test_unknown_codes_have_unknown_quality() {
        assert_eq!(PostureCode::new("Z").quality(), QualityLevel::Unknown);
        assert_eq!(PostureCode::new("a").quality(), QualityLevel::Unknown);
        assert_eq!(PostureCode::new("").quality(), QualityLevel::Unknown);
        assert_eq!(PostureCode::unavailable().quality(), QualityLevel::Unknown);
    }

    #[test]
    fn test_quality_scores() {
        assert_eq!(QualityLevel::Good.score(), Some(2));
        assert_eq!(QualityLevel::Average.score(), Some(1));
        assert_eq!(QualityLevel::Bad.score(), Some(0));
        assert_eq!(QualityLevel::Unknown.score(), None);
    }

    #[test]
    fn test_names_lookup() {
        let names = PostureNames::new().with_name("A", "Upright");
        assert_eq!(names.name_of(&PostureCode::new("A")), Some("Upright"));
        assert_eq!(names.name_of(&PostureCode::new("B")), None);
    }
}
