use chrono::NaiveDate;
use serde::Deserialize;
use std::env;
use trackline_core::{RouteConfig, TrainNumber};
use trackline_inventory::InventorySettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub inventory: InventorySettings,
    pub calendar: CalendarConfig,
    pub routes: RoutesConfig,
    pub sales: SalesConfig,
    #[serde(default)]
    pub redis: Option<RedisConfig>,
    #[serde(default)]
    pub bench: BenchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Identity of this instance inside reservation ids. Must be unique across the fleet.
    pub id: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalendarConfig {
    /// Day zero for the integer travel dates.
    pub epoch: NaiveDate,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutesConfig {
    pub default: Option<RouteConfig>,
    #[serde(default)]
    pub overrides: Vec<RouteOverride>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouteOverride {
    pub train: TrainNumber,
    pub seat_count: u32,
    pub stop_count: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SalesConfig {
    pub first_train: TrainNumber,
    pub train_count: u32,
    /// Travel dates open for sale, counting today.
    #[serde(default = "default_days_ahead")]
    pub days_ahead: u32,
}

fn default_days_ahead() -> u32 { 1 }

impl SalesConfig {
    pub fn trains(&self) -> impl Iterator<Item = TrainNumber> {
        self.first_train..self.first_train.saturating_add(self.train_count)
    }

    /// The train in the middle of the configured range.
    pub fn middle_train(&self) -> TrainNumber {
        self.first_train.saturating_add(self.train_count / 2)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BenchConfig {
    pub search_iterations: u64,
    pub order_workers: usize,
    pub orders_per_worker: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            search_iterations: 1_000_000,
            order_workers: 8,
            orders_per_worker: 100,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `TRACKLINE_SERVER__ID=7`
            .add_source(config::Environment::with_prefix("TRACKLINE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
