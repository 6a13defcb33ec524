pub mod app_config;
pub mod memory;
pub mod redis_repo;
pub mod route_provider;

pub use app_config::Config;
pub use memory::InMemoryReservationStore;
pub use redis_repo::RedisReservationStore;
pub use route_provider::ConfiguredRouteProvider;
