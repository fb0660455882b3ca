use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::Result;

pub struct Db {
	pub pool: PgPool,
}
impl Db {
	/// Builds the pool without dialing. An unreachable database surfaces on the first query so
	/// catalog stages can report it as a degraded source.
	pub fn connect(cfg: &grounding_config::Postgres) -> Result<Self> {
		let pool = PgPoolOptions::new()
			.max_connections(cfg.pool_max_conns)
			.acquire_timeout(Duration::from_millis(cfg.acquire_timeout_ms))
			.connect_lazy(&cfg.dsn)?;

		Ok(Self { pool })
	}
}
