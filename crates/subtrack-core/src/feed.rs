//! Open-banking transaction feed client
//!
//! Thin client over the feed provider's REST API: authorization-code
//! exchange, account listing, and per-account transaction listing. Only the
//! fields the pipeline consumes are modeled; everything else the provider
//! sends is ignored.

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::FeedCredentials;
use crate::error::{Error, Result};
use crate::models::RawTransaction;

/// Transactions fetched per account per request
const TRANSACTION_PAGE_LIMIT: u32 = 100;

/// Client for the open-banking feed API
#[derive(Clone)]
pub struct FeedClient {
    http_client: Client,
    base_url: String,
}

/// An account as listed by the feed
#[derive(Debug, Clone, Deserialize)]
pub struct FeedAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    #[serde(default)]
    accounts: Vec<FeedAccount>,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    #[serde(default)]
    transactions: Vec<RawTransaction>,
}

impl FeedClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Exchange an authorization code for an access token
    pub async fn exchange_code(&self, credentials: &FeedCredentials, code: &str) -> Result<String> {
        let params = [
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", credentials.redirect_uri.as_str()),
        ];

        let response = self
            .http_client
            .post(format!("{}/api/v1/oauth/token", self.base_url))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Feed(format!("token exchange failed {}: {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    /// List the accounts visible to a bearer credential
    pub async fn list_accounts(&self, access_token: &str) -> Result<Vec<FeedAccount>> {
        let response = self
            .http_client
            .get(format!("{}/data/v2/accounts", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Feed(format!("account fetch failed {}: {}", status, body)));
        }

        let accounts: AccountsResponse = response.json().await?;
        Ok(accounts.accounts)
    }

    /// List transactions for a single account
    pub async fn list_transactions(
        &self,
        access_token: &str,
        account_id: &str,
    ) -> Result<Vec<RawTransaction>> {
        let limit = TRANSACTION_PAGE_LIMIT.to_string();
        let response = self
            .http_client
            .get(format!("{}/data/v2/transactions", self.base_url))
            .bearer_auth(access_token)
            .query(&[("accountId", account_id), ("limit", limit.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Feed(format!(
                "transaction fetch failed {}: {}",
                status, body
            )));
        }

        let transactions: TransactionsResponse = response.json().await?;
        Ok(transactions.transactions)
    }

    /// Fetch transactions across all accounts visible to the credential
    pub async fn fetch_all_transactions(&self, access_token: &str) -> Result<Vec<RawTransaction>> {
        let accounts = self.list_accounts(access_token).await?;
        debug!(accounts = accounts.len(), "Fetched feed accounts");

        let mut all = Vec::new();
        for account in &accounts {
            let transactions = self.list_transactions(access_token, &account.id).await?;
            debug!(
                account = account.name.as_deref().unwrap_or("unknown"),
                count = transactions.len(),
                "Fetched feed transactions"
            );
            all.extend(transactions);
        }
        Ok(all)
    }
}
