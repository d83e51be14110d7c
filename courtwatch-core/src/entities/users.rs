use crate::framework::DatabaseProcessor;
use crate::matching::UserPreferences;
use kanau::processor::Processor;
use sqlx::types::Json;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub preferences: Json<serde_json::Value>,
    pub max_alerts_per_hour: Option<i32>,
}

/// A user the coordinator can alert, with decoded preferences.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub name: Option<String>,
    /// Where alerts are delivered.
    pub address: String,
    pub preferences: UserPreferences,
    pub max_alerts_per_hour: Option<u32>,
}

impl TryFrom<UserRow> for UserProfile {
    type Error = serde_json::Error;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let preferences = serde_json::from_value(row.preferences.0)?;
        Ok(Self {
            user_id: row.id,
            name: row.name,
            address: row.email,
            preferences,
            max_alerts_per_hour: row
                .max_alerts_per_hour
                .and_then(|cap| u32::try_from(cap).ok())
                .filter(|cap| *cap > 0),
        })
    }
}

#[derive(Debug, Clone, Copy)]
/// Users with notifications switched on.
pub struct ListNotifiableUsers;

impl Processor<ListNotifiableUsers> for DatabaseProcessor {
    type Output = Vec<UserRow>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListNotifiableUsers")]
    async fn process(&self, _: ListNotifiableUsers) -> Result<Vec<UserRow>, sqlx::Error> {
        sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, name, preferences, max_alerts_per_hour
            FROM users
            WHERE notifications_enabled AND email <> ''
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(preferences: serde_json::Value, cap: Option<i32>) -> UserRow {
        UserRow {
            id: Uuid::nil(),
            email: "player@example.com".to_string(),
            name: Some("Player".to_string()),
            preferences: Json(preferences),
            max_alerts_per_hour: cap,
        }
    }

    #[test]
    fn test_profile_from_row() {
        let profile = UserProfile::try_from(row(
            serde_json::json!({"preferredVenues": ["Victoria Park"]}),
            Some(0),
        ))
        .unwrap();
        assert_eq!(profile.address, "player@example.com");
        assert_eq!(profile.preferences.preferred_venues, vec!["Victoria Park"]);
        assert_eq!(profile.max_alerts_per_hour, None);
    }

    #[test]
    fn test_malformed_preferences_are_an_error() {
        let result = UserProfile::try_from(row(
            serde_json::json!({"weekdayTimes": "evenings"}),
            None,
        ));
        assert!(result.is_err());
    }
}
