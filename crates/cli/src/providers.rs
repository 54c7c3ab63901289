//! Provider registration for the networked backends.
//!
//! Each constructor reads its settings from the backend's `options` table:
//!
//! | provider   | keys                                                                |
//! |------------|---------------------------------------------------------------------|
//! | `redis`    | `url` (required), `prefix`, `pool_size`, `lease_ttl_ms`             |
//! | `postgres` | `url` (required), `pool_size`, `schema`, `table_prefix`, `ssl_mode`, `ssl_root_cert`, `lease_ttl_ms` |

use std::sync::Arc;
use std::time::Duration;

use lockgate_coordinator::LockProvider;
use lockgate_coordinator::ProviderFactory;
use lockgate_coordinator::factory::ConstructorError;
use lockgate_lock_postgres::{PostgresConfig, PostgresLockProvider};
use lockgate_lock_redis::{RedisConfig, RedisLockProvider};

/// Factory with `memory`, `redis` and `postgres` registered.
pub fn factory() -> ProviderFactory {
    let mut factory = ProviderFactory::with_defaults();
    register_redis(&mut factory);
    register_postgres(&mut factory);
    factory
}

pub fn register_redis(factory: &mut ProviderFactory) {
    factory.register("redis", |options| {
        let mut config = RedisConfig::new(required_str(options, "url")?);
        if let Some(prefix) = opt_str(options, "prefix")? {
            config.prefix = prefix;
        }
        if let Some(size) = opt_u64(options, "pool_size")? {
            config.pool_size = usize::try_from(size)?;
        }
        if let Some(ms) = opt_u64(options, "lease_ttl_ms")? {
            config.lease_ttl = Duration::from_millis(ms);
        }
        Ok(Arc::new(RedisLockProvider::new(&config)?) as Arc<dyn LockProvider>)
    });
}

/// The pool connects lazily, so an unreachable database trips the breaker
/// at runtime instead of failing startup.
pub fn register_postgres(factory: &mut ProviderFactory) {
    factory.register("postgres", |options| {
        let mut config = PostgresConfig::new(required_str(options, "url")?);
        if let Some(size) = opt_u64(options, "pool_size")? {
            config.pool_size = u32::try_from(size)?;
        }
        if let Some(schema) = opt_str(options, "schema")? {
            config.schema = schema;
        }
        if let Some(prefix) = opt_str(options, "table_prefix")? {
            config.table_prefix = prefix;
        }
        config.ssl_mode = opt_str(options, "ssl_mode")?;
        config.ssl_root_cert = opt_str(options, "ssl_root_cert")?;
        if let Some(ms) = opt_u64(options, "lease_ttl_ms")? {
            config.lease_ttl = Duration::from_millis(ms);
        }
        Ok(Arc::new(PostgresLockProvider::connect_lazy(config)?) as Arc<dyn LockProvider>)
    });
}

fn opt_str(options: &toml::Table, key: &str) -> Result<Option<String>, ConstructorError> {
    match options.get(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!("{key} must be a string, got {}", other.type_str()).into()),
    }
}

fn required_str(options: &toml::Table, key: &str) -> Result<String, ConstructorError> {
    opt_str(options, key)?.ok_or_else(|| format!("missing required option '{key}'").into())
}

fn opt_u64(options: &toml::Table, key: &str) -> Result<Option<u64>, ConstructorError> {
    match options.get(key) {
        None => Ok(None),
        Some(toml::Value::Integer(n)) => u64::try_from(*n)
            .map(Some)
            .map_err(|_| format!("{key} must not be negative").into()),
        Some(other) => Err(format!("{key} must be an integer, got {}", other.type_str()).into()),
    }
}
