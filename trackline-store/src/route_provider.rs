use crate::app_config::RoutesConfig;
use async_trait::async_trait;
use std::collections::HashMap;
use trackline_core::{RouteConfig, RouteConfigProvider, StoreError, StoreResult, TrainNumber};

/// Route shapes taken from configuration: per-train overrides over an optional default.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredRouteProvider {
    default: Option<RouteConfig>,
    overrides: HashMap<TrainNumber, RouteConfig>,
}

impl ConfiguredRouteProvider {
    pub fn new(default: Option<RouteConfig>) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_route(mut self, train: TrainNumber, route: RouteConfig) -> Self {
        self.overrides.insert(train, route);
        self
    }
}

impl From<&RoutesConfig> for ConfiguredRouteProvider {
    fn from(config: &RoutesConfig) -> Self {
        config
            .overrides
            .iter()
            .fold(Self::new(config.default), |provider, o| {
                provider.with_route(o.train, RouteConfig::new(o.seat_count, o.stop_count))
            })
    }
}

#[async_trait]
impl RouteConfigProvider for ConfiguredRouteProvider {
    async fn route_config(&self, train: TrainNumber) -> StoreResult<RouteConfig> {
        self.overrides
            .get(&train)
            .copied()
            .or(self.default)
            .ok_or(StoreError::UnknownRoute(train))
    }
}
