//! KOI Column Vocabulary

use serde::{Deserialize, Serialize};

/// Fields a single-record request must always carry
pub const REQUIRED_FIELDS: [&str; 4] = ["koi_duration", "koi_depth", "koi_steff", "koi_slogg"];

/// Identifier and label-leaking columns removed before engineering
pub const DROPPED_COLUMNS: [&str; 8] = [
    "kepid",
    "kepoi_name",
    "kepler_name",
    "koi_pdisposition",
    "koi_score",
    "koi_teq_err1",
    "koi_teq_err2",
    "koi_tce_plnt_num",
];

/// Ground-truth disposition column
pub const LABEL_COLUMN: &str = "koi_disposition";

/// Categorical TCE delivery name column
pub const DELIVNAME_COLUMN: &str = "koi_tce_delivname";

/// Delivery categories recognised at training time, in dummy-column order
pub const DELIVNAME_CATEGORIES: [&str; 2] = ["q1_q16_tce", "q1_q17_dr24_tce"];

/// Transit depth (ppm)
pub const KOI_DEPTH: &str = "koi_depth";
/// Transit duration (hours)
pub const KOI_DURATION: &str = "koi_duration";
/// Insolation flux (Earth flux)
pub const KOI_INSOL: &str = "koi_insol";
/// Planet radius (Earth radii)
pub const KOI_PRAD: &str = "koi_prad";
/// Stellar effective temperature (K)
pub const KOI_STEFF: &str = "koi_steff";
/// Stellar radius (Solar radii)
pub const KOI_SRAD: &str = "koi_srad";

pub const DEPTH_DURATION_RATIO: &str = "depth_duration_ratio";
pub const INSOL_PRAD_RATIO: &str = "insol_prad_ratio";
pub const STELLAR_LUMINOSITY_PROXY: &str = "stellar_luminosity_proxy";

/// Name of the dummy column for a delivery category
pub fn delivname_dummy(category: &str) -> String {
    format!("{}_{}", DELIVNAME_COLUMN, category)
}

/// Whether a column is removed before it reaches the feature engineer
pub fn is_excluded(column: &str) -> bool {
    column == LABEL_COLUMN || DROPPED_COLUMNS.contains(&column)
}

/// Exoplanet disposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    /// Still a candidate planet
    Candidate,
    /// Confirmed exoplanet
    Confirmed,
}

impl Disposition {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Candidate => "CANDIDATE",
            Disposition::Confirmed => "CONFIRMED",
        }
    }

    /// Position in a (CANDIDATE, CONFIRMED) probability pair
    pub fn index(&self) -> usize {
        match self {
            Disposition::Candidate => 0,
            Disposition::Confirmed => 1,
        }
    }

    /// Parse a catalog disposition; other dispositions (e.g. FALSE POSITIVE) yield `None`
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "CANDIDATE" => Some(Disposition::Candidate),
            "CONFIRMED" => Some(Disposition::Confirmed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
