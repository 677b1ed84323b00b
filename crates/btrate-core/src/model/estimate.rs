use std::fmt;

use serde::{Deserialize, Serialize};

/// Which arithmetic produced a bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BitrateFormula {
    Mono,
    /// Two independently allocated channels, summed.
    DualChannel,
    Stereo,
    /// Stereo plus one join bit per subband.
    JointStereo,
    /// Published operating point for a codec that is not decoded.
    Nominal,
    /// Typical SBC operating point, used while the negotiated
    /// configuration is unknown.
    Assumed,
}

/// Effective bitrate of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BitrateEstimate {
    pub kbps: f64,
    pub formula: BitrateFormula,
    /// Dual channel only: the bitrate of one of the two channels.
    pub per_channel_kbps: Option<f64>,
}

impl BitrateEstimate {
    pub fn is_nominal(&self) -> bool {
        self.formula == BitrateFormula::Nominal
    }

    /// Not derived from decoded parameters.
    pub fn is_estimated(&self) -> bool {
        matches!(self.formula, BitrateFormula::Nominal | BitrateFormula::Assumed)
    }
}

impl fmt::Display for BitrateEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.formula {
            BitrateFormula::Nominal => write!(f, "~{:.0} kbps", self.kbps),
            BitrateFormula::Assumed => write!(f, "~{:.0} kbps (est.)", self.kbps),
            _ => write!(f, "{:.1} kbps", self.kbps),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(kbps: f64, formula: BitrateFormula) -> BitrateEstimate {
        BitrateEstimate {
            kbps,
            formula,
            per_channel_kbps: None,
        }
    }

    #[test]
    fn display_marks_estimates() {
        assert_eq!(estimate(328.0, BitrateFormula::JointStereo).to_string(), "328.0 kbps");
        assert_eq!(estimate(256.0, BitrateFormula::Nominal).to_string(), "~256 kbps");
        assert_eq!(estimate(552.0, BitrateFormula::Assumed).to_string(), "~552 kbps (est.)");
    }

    #[test]
    fn assumed_is_estimated_but_not_nominal() {
        let assumed = estimate(328.0, BitrateFormula::Assumed);
        assert!(assumed.is_estimated());
        assert!(!assumed.is_nominal());
        assert!(!estimate(328.0, BitrateFormula::JointStereo).is_estimated());
    }
}
