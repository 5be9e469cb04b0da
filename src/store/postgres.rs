use async_trait::async_trait;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::config::DbConfig;
use crate::{AppError, AppResult, utils};

use super::MappingStore;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

pub mod schema {
    diesel::table! {
        bridge_mappings (mapping_key) {
            mapping_key -> Text,
            mapping_value -> Bytea,
            created_at -> Int8,
        }
    }
}

use schema::bridge_mappings;

#[derive(Insertable, Queryable, Debug)]
#[diesel(table_name = bridge_mappings)]
struct DbMapping {
    mapping_key: String,
    mapping_value: Vec<u8>,
    created_at: i64,
}

/// Durable [`MappingStore`] over a single key/value table.
pub struct PostgresStore {
    pool: Pool<ConnectionManager<PgConnection>>,
}

impl PostgresStore {
    pub fn new(config: &DbConfig) -> AppResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.url);
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .build(manager)
            .map_err(|e| AppError::internal(format!("building db pool failed: {e}")))?;
        Ok(Self { pool })
    }

    pub fn migrate(&self) -> AppResult<()> {
        let mut conn = self.connect()?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| AppError::internal(format!("running migrations failed: {e}")))?;
        Ok(())
    }

    fn connect(&self) -> AppResult<PooledConnection<ConnectionManager<PgConnection>>> {
        Ok(self.pool.get().map_err(AppError::Pool)?)
    }
}

#[async_trait]
impl MappingStore for PostgresStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let value = bridge_mappings::table
            .find(key)
            .select(bridge_mappings::mapping_value)
            .first::<Vec<u8>>(&mut *self.connect()?)
            .optional()?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> AppResult<()> {
        let row = DbMapping {
            mapping_key: key.to_owned(),
            mapping_value: value.to_vec(),
            created_at: utils::unix_millis(),
        };
        diesel::insert_into(bridge_mappings::table)
            .values(&row)
            .on_conflict(bridge_mappings::mapping_key)
            .do_update()
            .set(bridge_mappings::mapping_value.eq(&row.mapping_value))
            .execute(&mut *self.connect()?)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        diesel::delete(bridge_mappings::table.find(key)).execute(&mut *self.connect()?)?;
        Ok(())
    }

    async fn list_keys(&self, offset: i64, limit: i64) -> AppResult<Vec<String>> {
        let keys = bridge_mappings::table
            .select(bridge_mappings::mapping_key)
            .order(bridge_mappings::mapping_key.asc())
            .offset(offset.max(0))
            .limit(limit.max(0))
            .load::<String>(&mut *self.connect()?)?;
        Ok(keys)
    }
}
