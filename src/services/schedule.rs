use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{fetch_collection, ApiError, ApiRequest, Transport};
use crate::cache::{keys, CachePolicy, CacheShim};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub home_team: String,
    pub away_team: String,
    pub kickoff: String,
    #[serde(default)]
    pub venue: Option<String>,
}

/// League fixtures, cached per league for a fixed time-to-live.
pub struct SportsSchedule {
    transport: Arc<dyn Transport>,
    cache: CacheShim,
    ttl: time::Duration,
}

impl SportsSchedule {
    pub fn new(transport: Arc<dyn Transport>, cache: CacheShim, ttl: time::Duration) -> Self {
        Self {
            transport,
            cache,
            ttl,
        }
    }

    pub async fn fixtures(&self, league: &str) -> Result<Vec<Fixture>, ApiError> {
        let league = league.trim();
        self.cache
            .get_or_fetch(&keys::schedule(league), CachePolicy::Ttl(self.ttl), || async move {
                let request = ApiRequest::get("sports/schedule").param("league", league);
                let rows = fetch_collection(self.transport.as_ref(), request).await?;
                tracing::debug!(%league, fixtures = rows.len(), "schedule fetched");
                Ok(serde_json::from_value(Value::Array(rows))?)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::ScriptedTransport;
    use crate::storage::{KeyValueStore, MemoryStore};
    use serde_json::json;
    use time::OffsetDateTime;

    fn fixture_row(home: &str) -> Value {
        json!({ "homeTeam": home, "awayTeam": "Hà Nội FC", "kickoff": "2026-10-20T18:00:00+07:00" })
    }

    #[tokio::test]
    async fn schedule_is_refetched_after_ttl() {
        let store = MemoryStore::new();
        let transport = Arc::new(ScriptedTransport::new());
        let schedule = SportsSchedule::new(
            transport.clone(),
            CacheShim::new(Arc::new(store.clone())),
            time::Duration::hours(1),
        );
        transport
            .respond("sports/schedule", json!({ "statusCode": 200, "data": [fixture_row("Viettel")] }))
            .respond("sports/schedule", json!({ "statusCode": 200, "data": [fixture_row("SLNA")] }));

        let first = schedule.fixtures("v-league").await.unwrap();
        assert_eq!(first[0].home_team, "Viettel");
        assert_eq!(schedule.fixtures("v-league").await.unwrap(), first);
        assert_eq!(transport.calls_to("sports/schedule"), 1);
        assert_eq!(
            transport.requests()[0].query_value("league"),
            Some("v-league")
        );

        let entry = store.get("schedule:v-league").unwrap().unwrap();
        let stale = OffsetDateTime::now_utc().unix_timestamp() - 3_601;
        store.put_at(&entry.key, &entry.value, stale).unwrap();

        let refreshed = schedule.fixtures("v-league").await.unwrap();
        assert_eq!(refreshed[0].home_team, "SLNA");
        assert_eq!(transport.calls_to("sports/schedule"), 2);
    }
}
