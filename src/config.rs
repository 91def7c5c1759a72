use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tracing::{info, warn};

use crate::planner::{PackingConfig, PackingStrategy};

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub optimizer: OptimizerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            optimizer: OptimizerConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "CARGO_FITTER_API_HOST";
    const PORT_VAR: &'static str = "CARGO_FITTER_API_PORT";

    fn from_env() -> Self {
        Self::from_values(
            env_string(Self::HOST_VAR).as_deref(),
            env_string(Self::PORT_VAR).as_deref(),
        )
    }

    fn from_values(host: Option<&str>, port: Option<&str>) -> Self {
        let default_ip = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        let (bind_ip, display_host) = match host {
            Some(raw) => match raw.parse::<IpAddr>() {
                Ok(ip) => (ip, raw.to_string()),
                Err(err) => {
                    warn!(
                        "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                        Self::HOST_VAR,
                        raw,
                        err,
                        Self::DEFAULT_HOST
                    );
                    (default_ip, Self::DEFAULT_HOST.to_string())
                }
            },
            None => (default_ip, Self::DEFAULT_HOST.to_string()),
        };

        let port = match port {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(
                        "⚠️ {} must not be 0. Using {}.",
                        Self::PORT_VAR,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Default packing parameters for requests that do not override them.
///
/// Unlike a bare [`PackingConfig`], the service always bounds the search:
/// without `CARGO_FITTER_SEARCH_BUDGET` every item gets
/// [`OptimizerConfig::DEFAULT_SEARCH_BUDGET`] candidates.
#[derive(Clone, Debug)]
pub struct OptimizerConfig {
    packing: PackingConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::new(PackingConfig::default())
    }
}

impl OptimizerConfig {
    const GRID_STEP_VAR: &'static str = "CARGO_FITTER_GRID_STEP";
    const GENERAL_EPSILON_VAR: &'static str = "CARGO_FITTER_GENERAL_EPSILON";
    const SEARCH_BUDGET_VAR: &'static str = "CARGO_FITTER_SEARCH_BUDGET";
    const STRATEGY_VAR: &'static str = "CARGO_FITTER_STRATEGY";
    const HEAVY_THRESHOLD_VAR: &'static str = "CARGO_FITTER_HEAVY_THRESHOLD";

    /// Candidates evaluated per item when no budget is configured.
    pub const DEFAULT_SEARCH_BUDGET: u64 = 2_000_000;

    /// Wraps `packing`, filling in the default search budget if it has none.
    pub fn new(mut packing: PackingConfig) -> Self {
        packing.search_budget = packing.search_budget.or(Some(Self::DEFAULT_SEARCH_BUDGET));
        Self { packing }
    }

    fn from_env() -> Self {
        let grid_step = interpret_f64(
            Self::GRID_STEP_VAR,
            env_string(Self::GRID_STEP_VAR).as_deref(),
            PackingConfig::DEFAULT_GRID_STEP,
            |value| value > 0.0,
            "must be greater than 0",
        );

        let general_epsilon = interpret_f64(
            Self::GENERAL_EPSILON_VAR,
            env_string(Self::GENERAL_EPSILON_VAR).as_deref(),
            PackingConfig::DEFAULT_GENERAL_EPSILON,
            |value| value > 0.0,
            "must be greater than 0",
        );

        let search_budget = interpret_budget(
            Self::SEARCH_BUDGET_VAR,
            env_string(Self::SEARCH_BUDGET_VAR).as_deref(),
        );

        let strategy = interpret_strategy(
            Self::STRATEGY_VAR,
            env_string(Self::STRATEGY_VAR).as_deref(),
        );

        let heavy_weight_threshold = interpret_threshold(
            Self::HEAVY_THRESHOLD_VAR,
            env_string(Self::HEAVY_THRESHOLD_VAR).as_deref(),
        );

        let packing = PackingConfig::builder()
            .grid_step(grid_step)
            .general_epsilon(general_epsilon)
            .search_budget(search_budget)
            .strategy(strategy)
            .heavy_weight_threshold(heavy_weight_threshold)
            .build();

        let config = Self::new(packing);
        info!(
            grid_step = config.packing.grid_step,
            search_budget = ?config.packing.search_budget,
            strategy = %config.packing.strategy,
            "⚙️ Packing defaults loaded"
        );
        config
    }

    /// Returns the configured PackingConfig.
    pub fn packing_config(&self) -> PackingConfig {
        self.packing
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("⚠️ Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn interpret_f64(
    var_name: &str,
    raw: Option<&str>,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
) -> f64 {
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && validator(value) => {
            let tolerance = default.abs().max(1.0) * 1e-9;
            if (value - default).abs() > tolerance {
                info!("⚙️ {} = {} (default {}).", var_name, value, default);
            }
            value
        }
        Ok(_) => {
            warn!(
                "⚠️ {} contains invalid value '{}': {}. Using {}.",
                var_name, raw, invalid_hint, default
            );
            default
        }
        Err(err) => {
            warn!(
                "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                var_name, raw, err, default
            );
            default
        }
    }
}

fn interpret_budget(var_name: &str, raw: Option<&str>) -> Option<u64> {
    let raw = raw?;
    match raw.parse::<u64>() {
        Ok(value) if value > 0 => Some(value),
        Ok(_) => {
            warn!(
                "⚠️ {} must be positive. Using {}.",
                var_name,
                OptimizerConfig::DEFAULT_SEARCH_BUDGET
            );
            None
        }
        Err(err) => {
            warn!(
                "⚠️ Could not parse {} ('{}'): {}. Using {}.",
                var_name,
                raw,
                err,
                OptimizerConfig::DEFAULT_SEARCH_BUDGET
            );
            None
        }
    }
}

fn interpret_threshold(var_name: &str, raw: Option<&str>) -> Option<f64> {
    let raw = raw?;
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Some(value),
        _ => {
            warn!(
                "⚠️ {} contains invalid value '{}': must be a non-negative number. Using the median item weight.",
                var_name, raw
            );
            None
        }
    }
}

fn interpret_strategy(var_name: &str, raw: Option<&str>) -> PackingStrategy {
    let Some(raw) = raw else {
        return PackingStrategy::default();
    };
    raw.parse().unwrap_or_else(|err| {
        warn!(
            "⚠️ {} ('{}'): {}. Using {}.",
            var_name,
            raw,
            err,
            PackingStrategy::default()
        );
        PackingStrategy::default()
    })
}
