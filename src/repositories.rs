use sqlx::PgPool;

pub mod conversations;
pub mod ledger;

const SCHEMA: &str = include_str!("../sql/schema.sql");

/// Creates the tables when they are missing. Existing data is never touched.
pub async fn init_schema(conn: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(conn).await?;
    log::info!("Database schema ready.");

    Ok(())
}
