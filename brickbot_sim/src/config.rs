// brickbot_sim/src/config.rs

//! Scenario loading: a TOML file layered under `BRICKBOT_` environment
//! overrides, e.g. `BRICKBOT_PHYSICS__TIMESTEP=0.004`.

use std::path::Path;

use brickbot_core::config::SimulationConfig;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use tracing::info;

use crate::error::{HostError, HostResult};

pub const ENV_PREFIX: &str = "BRICKBOT_";

/// The provider stack for a scenario. Sections missing from every layer fall
/// back to the stock defaults.
pub fn scenario_figment(path: Option<&Path>) -> Figment {
    let figment = match path {
        Some(path) => Figment::new().merge(Toml::file(path)),
        None => Figment::new(),
    };
    figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
}

pub fn load_scenario(path: Option<&Path>) -> HostResult<SimulationConfig> {
    if let Some(path) = path {
        if !path.is_file() {
            return Err(HostError::ScenarioNotFound(path.to_path_buf()));
        }
        info!("Loading scenario from: {}", path.display());
    } else {
        info!("No scenario given, using the stock configuration");
    }
    Ok(scenario_figment(path).extract()?)
}

/// Parses a scenario from a TOML string, without environment overrides.
pub fn parse_scenario(toml: &str) -> HostResult<SimulationConfig> {
    Ok(Figment::new().merge(Toml::string(toml)).extract()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use brickbot_core::types::Rgb;

    const SHIPPED_SCENARIO: &str = include_str!("../scenarios/default.toml");

    #[test]
    fn empty_scenario_is_the_stock_configuration() {
        let config = parse_scenario("").unwrap();
        let stock = SimulationConfig::default();
        assert_abs_diff_eq!(config.physics.timestep, stock.physics.timestep);
        assert_abs_diff_eq!(config.robot.chassis.mass, stock.robot.chassis.mass);
        assert!(config.environment.obstacles.is_empty());
    }

    #[test]
    fn partial_sections_keep_the_remaining_defaults() {
        let config = parse_scenario(
            r#"
            [physics]
            gravity = [0.0, -1.62, 0.0]

            [robot.ultrasonic_sensor]
            max_range = 1.0
            "#,
        )
        .unwrap();
        assert_abs_diff_eq!(config.physics.gravity.y, -1.62);
        assert_abs_diff_eq!(config.physics.timestep, 1.0 / 120.0);
        assert_abs_diff_eq!(config.robot.ultrasonic_sensor.max_range, 1.0);
        assert_abs_diff_eq!(config.robot.chassis.width, 0.145);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_scenario("[physics]\ngravty = [0.0, 0.0, 0.0]\n").unwrap_err();
        assert!(matches!(err, HostError::Config(_)));
    }

    #[test]
    fn missing_file_is_reported_before_parsing() {
        let err = load_scenario(Some(Path::new("does/not/exist.toml"))).unwrap_err();
        assert!(matches!(err, HostError::ScenarioNotFound(_)));
    }

    #[test]
    fn shipped_scenario_parses() {
        let config = parse_scenario(SHIPPED_SCENARIO).unwrap();
        assert_eq!(config.environment.obstacles.len(), 2);
        assert_eq!(config.environment.papers.len(), 2);
        assert_eq!(config.environment.papers[0].color, Rgb::BLACK);

        // The file is plain TOML, not something only figment understands.
        let direct: SimulationConfig = toml::from_str(SHIPPED_SCENARIO).unwrap();
        assert_eq!(direct.environment.obstacles.len(), 2);
    }
}
