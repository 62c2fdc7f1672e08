//! Simplification configuration and dataset descriptor.
//!
//! The caller constructs these values (loading them from files or CLI is
//! its business) and hands them to the driver, which validates once at
//! entry. Section names follow the assembler convention: `tc` for tip
//! clipping, `br` for bulge removal, `ec` plus strategy-specific blocks
//! for erroneous-connection removal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {section}.{option}: {reason}")]
    OutOfDomain {
        section: &'static str,
        option: &'static str,
        reason: String,
    },
}

fn out_of_domain(
    section: &'static str,
    option: &'static str,
    reason: impl Into<String>,
) -> ConfigError {
    ConfigError::OutOfDomain {
        section,
        option,
        reason: reason.into(),
    }
}

/// Properties of the read dataset the graph was built from. The driver
/// writes the measured average coverage back after simplification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub read_length: usize,
    pub insert_size: f64,
    pub single_cell: bool,
    pub avg_coverage: Option<f64>,
}

impl Default for DatasetInfo {
    fn default() -> Self {
        Self {
            read_length: 100,
            insert_size: 250.0,
            single_cell: false,
            avg_coverage: None,
        }
    }
}

/// Which detector runs in the final erroneous-connection phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimplificationMode {
    Cheating,
    Topology,
    Chimeric,
    MaxFlow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TipClipperConfig {
    pub max_tip_length_coefficient: f64,
    pub max_coverage: f64,
    pub max_relative_coverage: f64,
    pub advanced_checks: bool,
    pub max_iterations: usize,
    pub max_levenshtein: usize,
    pub max_ec_length: usize,
}

impl Default for TipClipperConfig {
    fn default() -> Self {
        Self {
            max_tip_length_coefficient: 2.5,
            max_coverage: 3.0,
            max_relative_coverage: 2.0,
            advanced_checks: false,
            max_iterations: 10,
            max_levenshtein: 2,
            max_ec_length: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulgeRemoverConfig {
    pub max_bulge_length_coefficient: f64,
    pub max_coverage: f64,
    pub max_relative_coverage: f64,
    pub max_delta: f64,
    pub max_relative_delta: f64,
}

impl Default for BulgeRemoverConfig {
    fn default() -> Self {
        Self {
            max_bulge_length_coefficient: 4.0,
            max_coverage: 1000.0,
            max_relative_coverage: 1.1,
            max_delta: 3.0,
            max_relative_delta: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErroneousConnectionConfig {
    pub max_coverage: f64,
    /// When set, the threshold is estimated from the coverage histogram
    /// instead of taken from `max_coverage`.
    pub estimate_max_coverage: bool,
    pub coverage_percentile: f64,
    pub max_ec_length_coefficient: usize,
}

impl Default for ErroneousConnectionConfig {
    fn default() -> Self {
        Self {
            max_coverage: 10.0,
            estimate_max_coverage: false,
            coverage_percentile: 0.25,
            max_ec_length_coefficient: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheatingEcConfig {
    pub max_ec_length_coefficient: usize,
    pub coverage_gap: f64,
    pub sufficient_neighbour_length: usize,
}

impl Default for CheatingEcConfig {
    fn default() -> Self {
        Self {
            max_ec_length_coefficient: 30,
            coverage_gap: 5.0,
            sufficient_neighbour_length: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyEcConfig {
    pub max_ec_length_coefficient: usize,
    pub uniqueness_length: usize,
    pub plausibility_length: usize,
}

impl Default for TopologyEcConfig {
    fn default() -> Self {
        Self {
            max_ec_length_coefficient: 30,
            uniqueness_length: 1500,
            plausibility_length: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityEcConfig {
    pub max_ec_length_coefficient: usize,
    pub uniqueness_length: usize,
    pub unreliable_coverage: f64,
}

impl Default for ReliabilityEcConfig {
    fn default() -> Self {
        Self {
            max_ec_length_coefficient: 30,
            uniqueness_length: 1500,
            unreliable_coverage: 2.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxFlowEcConfig {
    pub max_ec_length_coefficient: usize,
    pub uniqueness_length: usize,
    pub plausibility_length: usize,
}

impl Default for MaxFlowEcConfig {
    fn default() -> Self {
        Self {
            max_ec_length_coefficient: 30,
            uniqueness_length: 1500,
            plausibility_length: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairInfoEcConfig {
    pub max_ec_length_coefficient: usize,
    pub min_neighbour_length: usize,
}

impl Default for PairInfoEcConfig {
    fn default() -> Self {
        Self {
            max_ec_length_coefficient: 30,
            min_neighbour_length: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplificationConfig {
    pub tc: TipClipperConfig,
    pub br: BulgeRemoverConfig,
    pub ec: ErroneousConnectionConfig,
    pub cec: CheatingEcConfig,
    pub tec: TopologyEcConfig,
    pub trec: ReliabilityEcConfig,
    pub mfec: MaxFlowEcConfig,
    pub piec: PairInfoEcConfig,
    pub simpl_mode: SimplificationMode,
    /// Chain the reliability detector after topology mode.
    pub additional_ec_removing: bool,
    /// Enable the remover's disconnect-safety check.
    pub removal_checks_enabled: bool,
    pub isolated_min_len: usize,
    pub cycle_iter_count: usize,
}

impl Default for SimplificationConfig {
    fn default() -> Self {
        Self {
            tc: TipClipperConfig::default(),
            br: BulgeRemoverConfig::default(),
            ec: ErroneousConnectionConfig::default(),
            cec: CheatingEcConfig::default(),
            tec: TopologyEcConfig::default(),
            trec: ReliabilityEcConfig::default(),
            mfec: MaxFlowEcConfig::default(),
            piec: PairInfoEcConfig::default(),
            simpl_mode: SimplificationMode::Topology,
            additional_ec_removing: false,
            removal_checks_enabled: false,
            isolated_min_len: 50,
            cycle_iter_count: 10,
        }
    }
}

impl SimplificationConfig {
    /// Reject out-of-domain values before any pass runs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_iter_count == 0 {
            return Err(out_of_domain("simp", "cycle_iter_count", "must be positive"));
        }
        if self.tc.max_tip_length_coefficient < 0.0 {
            return Err(out_of_domain(
                "simp.tc",
                "max_tip_length_coefficient",
                "must be non-negative",
            ));
        }
        if self.tc.max_coverage < 0.0 {
            return Err(out_of_domain("simp.tc", "max_coverage", "must be non-negative"));
        }
        if self.tc.max_relative_coverage < 0.0 {
            return Err(out_of_domain(
                "simp.tc",
                "max_relative_coverage",
                "must be non-negative",
            ));
        }
        if self.br.max_bulge_length_coefficient < 0.0 {
            return Err(out_of_domain(
                "simp.br",
                "max_bulge_length_coefficient",
                "must be non-negative",
            ));
        }
        if self.br.max_relative_coverage <= 0.0 {
            return Err(out_of_domain(
                "simp.br",
                "max_relative_coverage",
                "must be positive",
            ));
        }
        if self.br.max_delta < 0.0 || self.br.max_relative_delta < 0.0 {
            return Err(out_of_domain("simp.br", "max_delta", "deltas must be non-negative"));
        }
        if self.ec.max_coverage < 0.0 {
            return Err(out_of_domain("simp.ec", "max_coverage", "must be non-negative"));
        }
        if !(0.0..1.0).contains(&self.ec.coverage_percentile) {
            return Err(out_of_domain(
                "simp.ec",
                "coverage_percentile",
                "must lie in [0, 1)",
            ));
        }
        if self.cec.coverage_gap < 1.0 {
            return Err(out_of_domain("simp.cec", "coverage_gap", "must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimplificationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_cycle_count() {
        let mut cfg = SimplificationConfig::default();
        cfg.cycle_iter_count = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_negative_coefficient() {
        let mut cfg = SimplificationConfig::default();
        cfg.tc.max_tip_length_coefficient = -1.0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("simp.tc.max_tip_length_coefficient"));
    }

    #[test]
    fn test_mode_names_follow_config_convention() {
        let json = serde_json::to_string(&SimplificationMode::MaxFlow).unwrap();
        assert_eq!(json, "\"max_flow\"");
        let back: SimplificationMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SimplificationMode::MaxFlow);
    }
}
