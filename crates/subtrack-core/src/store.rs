//! Supabase persistence client
//!
//! The managed relational store is accessed exclusively through its REST
//! facade (PostgREST). The service-role key bypasses row-level security, so
//! ownership checks happen in the handlers, not here.

use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::config::SupabaseConfig;
use crate::error::{Error, Result};
use crate::models::{NewAnalyticsEvent, NewSubscription, SubscriptionRecord, User};

/// Client for the Supabase REST facade
#[derive(Clone)]
pub struct SupabaseStore {
    http_client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseStore {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            http_client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_role_key: config.service_role_key.clone(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }

    async fn expect_rows<T: DeserializeOwned>(response: Response) -> Result<Vec<T>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Store(format!("{}: {}", status, body)));
        }
        Ok(response.json().await?)
    }

    async fn expect_success(response: Response) -> Result<()> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Store(format!("{}: {}", status, body)));
        }
        Ok(())
    }

    // ========== Users ==========

    /// Look up a user by email
    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let filter = format!("eq.{}", email);
        let response = self
            .authorize(self.http_client.get(self.table_url("users")))
            .query(&[("select", "*"), ("email", filter.as_str()), ("limit", "1")])
            .send()
            .await?;
        Ok(Self::expect_rows::<User>(response).await?.into_iter().next())
    }

    /// Create a user with a pre-hashed password
    pub async fn create_user(&self, email: &str, hashed_password: &str) -> Result<User> {
        let response = self
            .authorize(self.http_client.post(self.table_url("users")))
            .header("Prefer", "return=representation")
            .json(&serde_json::json!({
                "email": email,
                "hashed_password": hashed_password,
            }))
            .send()
            .await?;
        Self::expect_rows::<User>(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Store("user insert returned no row".into()))
    }

    /// Update a user's last-login timestamp
    pub async fn touch_last_login(&self, user_id: i64) -> Result<()> {
        let filter = format!("eq.{}", user_id);
        let response = self
            .authorize(self.http_client.patch(self.table_url("users")))
            .query(&[("id", filter.as_str())])
            .json(&serde_json::json!({
                "last_login": Utc::now().to_rfc3339(),
            }))
            .send()
            .await?;
        Self::expect_success(response).await
    }

    // ========== Subscriptions ==========

    /// Insert a subscription and return the stored row
    pub async fn insert_subscription(&self, new: &NewSubscription) -> Result<SubscriptionRecord> {
        let response = self
            .authorize(self.http_client.post(self.table_url("subscriptions")))
            .header("Prefer", "return=representation")
            .json(new)
            .send()
            .await?;
        Self::expect_rows::<SubscriptionRecord>(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Store("subscription insert returned no row".into()))
    }

    /// List a user's active subscriptions, newest first
    pub async fn subscriptions_by_owner(&self, owner_id: i64) -> Result<Vec<SubscriptionRecord>> {
        let filter = format!("eq.{}", owner_id);
        let response = self
            .authorize(self.http_client.get(self.table_url("subscriptions")))
            .query(&[
                ("select", "*"),
                ("owner_id", filter.as_str()),
                ("is_active", "eq.true"),
                ("order", "created_at.desc"),
            ])
            .send()
            .await?;
        Self::expect_rows(response).await
    }

    /// Soft-delete a subscription by flagging it inactive
    pub async fn deactivate_subscription(&self, subscription_id: i64) -> Result<()> {
        let filter = format!("eq.{}", subscription_id);
        let response = self
            .authorize(self.http_client.patch(self.table_url("subscriptions")))
            .query(&[("id", filter.as_str())])
            .json(&serde_json::json!({ "is_active": false }))
            .send()
            .await?;
        Self::expect_success(response).await
    }

    // ========== Analytics ==========

    /// Record a usage analytics event.
    ///
    /// Callers treat failures as non-fatal and only log them.
    pub async fn record_event(&self, event: &NewAnalyticsEvent) -> Result<()> {
        let response = self
            .authorize(self.http_client.post(self.table_url("analytics_events")))
            .json(event)
            .send()
            .await?;
        Self::expect_success(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, SubscriptionSource};
    use crate::test_utils::MockSupabaseServer;

    fn store_for(server: &MockSupabaseServer) -> SupabaseStore {
        SupabaseStore::new(&SupabaseConfig {
            url: server.url(),
            service_role_key: "test-key".to_string(),
        })
    }

    fn new_subscription(owner_id: i64) -> NewSubscription {
        NewSubscription {
            title: "Netflix".to_string(),
            amount: 99.0,
            renewal_date: "2024-03-16".to_string(),
            category: "Streaming & Entertainment".to_string(),
            currency: "DKK".to_string(),
            frequency: Frequency::Monthly,
            source: SubscriptionSource::ApiFeed,
            owner_id,
            transaction_date: Some("2024-02-15".to_string()),
            confidence_score: Some(95.0),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_user_lifecycle() {
        let server = MockSupabaseServer::start().await;
        let store = store_for(&server);

        assert!(store.user_by_email("a@b.dk").await.unwrap().is_none());

        let user = store.create_user("a@b.dk", "hash").await.unwrap();
        assert_eq!(user.email, "a@b.dk");

        let found = store.user_by_email("a@b.dk").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        store.touch_last_login(user.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_subscription_lifecycle() {
        let server = MockSupabaseServer::start().await;
        let store = store_for(&server);

        let record = store.insert_subscription(&new_subscription(1)).await.unwrap();
        assert_eq!(record.title, "Netflix");
        assert_eq!(record.owner_id, 1);
        assert!(record.is_active);

        let listed = store.subscriptions_by_owner(1).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(store.subscriptions_by_owner(2).await.unwrap().is_empty());

        store.deactivate_subscription(record.id).await.unwrap();
        assert!(store.subscriptions_by_owner(1).await.unwrap().is_empty());
    }
}
