//! 数据库连接管理
//!
//! - connect_pool：建立 Postgres 连接池
//! - run_migrations：执行内置表结构脚本

use crate::error::StorageError;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

const SCHEMA_SQL: &str = include_str!("../migrations/0001_lis_schema.sql");

/// 建立 Postgres 连接池（最大连接数 8）
pub async fn connect_pool(database_url: &str) -> Result<PgPool, StorageError> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// 执行建表脚本（幂等，全部使用 `if not exists`）
pub async fn run_migrations(pool: &PgPool) -> Result<(), StorageError> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}
