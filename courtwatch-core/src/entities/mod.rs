pub mod notification_history;
pub mod scrape_logs;
pub mod users;
pub mod venues;

use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

/// Round-trip to the database; used by the health check.
#[derive(Debug, Clone, Copy)]
pub struct PingDatabase;

impl Processor<PingDatabase> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:PingDatabase")]
    async fn process(&self, _: PingDatabase) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
