use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::payload::WalkPayload;

/// A dog as returned by `GET /api/dogs`. Only the fields the tracker needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Dog {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub breed: Option<String>,
}

/// Aggregate stats from `GET /api/walks/{dog_id}/stats`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalkStats {
    pub dog_id: i64,
    pub total_walks: i64,
    pub total_distance_km: f64,
    pub total_duration_minutes: i64,
    pub avg_distance_km: f64,
}

/// A stored walk from `GET /api/walks/{dog_id}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalkRecord {
    pub id: i64,
    pub dog_id: i64,
    pub start_time: String,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub calories: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub route_json: Option<String>,
}

/// Thin typed client for the walk backend. One attempt per call, no retry:
/// a failed submission is surfaced and the caller decides what to do with
/// the retained session.
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    pub async fn list_dogs(&self) -> Result<Vec<Dog>> {
        let response = self.with_auth(self.client.get(self.url("/dogs"))).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Submit a finished walk. Called exactly once per explicit user action.
    pub async fn create_walk(&self, payload: &WalkPayload) -> Result<WalkRecord> {
        let response = self
            .with_auth(self.client.post(self.url("/walks")))
            .json(payload)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn walk_stats(&self, dog_id: i64) -> Result<WalkStats> {
        let response = self
            .with_auth(self.client.get(self.url(&format!("/walks/{}/stats", dog_id))))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn recent_walks(&self, dog_id: i64, limit: u32) -> Result<Vec<WalkRecord>> {
        let response = self
            .with_auth(
                self.client
                    .get(self.url(&format!("/walks/{}", dog_id)))
                    .query(&[("limit", limit)]),
            )
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Map non-2xx responses to a typed error carrying the body.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(TrackerError::Api {
        status: status.as_u16(),
        message,
    })
}
