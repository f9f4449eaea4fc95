//! Space configuration

use crate::error::{Result, SpaceError};
use rapier3d::parry::math::Real;
use serde::{Deserialize, Serialize};

/// Tuning values shared by every query and motion test in a space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpaceConfig {
    /// Penetration depth tolerated before stuck recovery pushes a body out
    pub max_allowed_penetration: Real,

    /// Fraction of the excess penetration removed per recovery iteration
    pub depenetration_speed: Real,

    /// Upper bound on stuck-recovery iterations
    pub recovery_iterations: u32,

    /// Number of time-of-impact bisection steps
    pub toi_bisection_steps: u32,

    /// Contacts with a shorter separation are ignored by rest-info reduction
    pub min_contact_depth: Real,

    /// Contacts gathered per recovery pass
    pub max_recovery_contacts: usize,

    /// Capacity of each broadphase candidate buffer
    pub intersection_query_max: usize,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            max_allowed_penetration: 0.01,
            depenetration_speed: 0.4,
            recovery_iterations: 4,
            toi_bisection_steps: 8,
            min_contact_depth: 0.00001,
            max_recovery_contacts: 32,
            intersection_query_max: 2048,
        }
    }
}

impl SpaceConfig {
    /// Create a configuration that spends more iterations per motion test
    pub fn precise() -> Self {
        Self {
            recovery_iterations: 8,
            toi_bisection_steps: 16,
            ..Default::default()
        }
    }

    /// Create a configuration for cheap motion tests (lower quality)
    pub fn fast() -> Self {
        Self {
            recovery_iterations: 2,
            toi_bisection_steps: 5,
            max_recovery_contacts: 8,
            intersection_query_max: 256,
            ..Default::default()
        }
    }

    /// Set the tolerated penetration depth
    pub fn with_max_allowed_penetration(mut self, depth: Real) -> Self {
        self.max_allowed_penetration = depth;
        self
    }

    /// Set the depenetration speed
    pub fn with_depenetration_speed(mut self, speed: Real) -> Self {
        self.depenetration_speed = speed;
        self
    }

    /// Set the recovery iteration bound
    pub fn with_recovery_iterations(mut self, iterations: u32) -> Self {
        self.recovery_iterations = iterations;
        self
    }

    /// Set the bisection step count
    pub fn with_toi_bisection_steps(mut self, steps: u32) -> Self {
        self.toi_bisection_steps = steps;
        self
    }

    /// Set the candidate buffer capacity
    pub fn with_intersection_query_max(mut self, max: usize) -> Self {
        self.intersection_query_max = max;
        self
    }

    /// Check that every value is usable
    pub fn validate(&self) -> Result<()> {
        if !(self.max_allowed_penetration >= 0.0) {
            return Err(SpaceError::InvalidConfig(format!(
                "max_allowed_penetration must be non-negative, got {}",
                self.max_allowed_penetration
            )));
        }
        if !(self.depenetration_speed > 0.0 && self.depenetration_speed <= 1.0) {
            return Err(SpaceError::InvalidConfig(format!(
                "depenetration_speed must be in (0, 1], got {}",
                self.depenetration_speed
            )));
        }
        if !(self.min_contact_depth >= 0.0) {
            return Err(SpaceError::InvalidConfig(format!(
                "min_contact_depth must be non-negative, got {}",
                self.min_contact_depth
            )));
        }
        if self.max_recovery_contacts == 0 {
            return Err(SpaceError::InvalidConfig(
                "max_recovery_contacts must be at least 1".to_string(),
            ));
        }
        if self.intersection_query_max == 0 {
            return Err(SpaceError::InvalidConfig(
                "intersection_query_max must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Parse and validate a configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SpaceError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| SpaceError::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constants() {
        let config = SpaceConfig::default();
        assert_eq!(config.recovery_iterations, 4);
        assert_eq!(config.toi_bisection_steps, 8);
        assert_eq!(config.max_allowed_penetration, 0.01);
        assert_eq!(config.depenetration_speed, 0.4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_partial_override() {
        let config = SpaceConfig::from_json(r#"{ "toi_bisection_steps": 12 }"#).unwrap();
        assert_eq!(config.toi_bisection_steps, 12);
        assert_eq!(config.recovery_iterations, 4);

        let back = SpaceConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = SpaceConfig::default().with_depenetration_speed(0.0);
        assert!(matches!(config.validate(), Err(SpaceError::InvalidConfig(_))));

        let config = SpaceConfig::default().with_intersection_query_max(0);
        assert!(config.validate().is_err());

        assert!(matches!(
            SpaceConfig::from_json("{ not json"),
            Err(SpaceError::ConfigParse(_))
        ));
    }
}
