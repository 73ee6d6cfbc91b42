// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::config::Settings;
use crate::ApiError;
use tracing::info;

/// Fetch all playbooks from the external content store. Returns an empty
/// list when the store is unconfigured.
pub async fn fetch_playbooks(
    settings: &Settings,
    http: &reqwest::Client,
) -> Result<Vec<serde_json::Value>, ApiError> {
    let (base_url, api_key) = match (&settings.supabase_url, &settings.supabase_api_key) {
        (Some(url), Some(key)) => (url, key),
        _ => return Ok(Vec::new()),
    };

    let url = format!("{base_url}/v_playbooks");
    info!("Fetching playbooks from content store");

    let response = http
        .get(&url)
        .query(&[("select", "*")])
        .header("apikey", api_key)
        .header("Authorization", format!("Bearer {api_key}"))
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("Playbook store request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Upstream(format!(
            "Playbook store returned {status}: {body}"
        )));
    }

    response
        .json::<Vec<serde_json::Value>>()
        .await
        .map_err(|e| ApiError::Upstream(format!("Invalid playbook store response: {e}")))
}

/// Fetch a single playbook by slug. None when the slug is unknown or the
/// store is unconfigured; the handler turns that into a 404.
pub async fn fetch_playbook_by_slug(
    settings: &Settings,
    http: &reqwest::Client,
    slug: &str,
) -> Result<Option<serde_json::Value>, ApiError> {
    let (base_url, api_key) = match (&settings.supabase_url, &settings.supabase_api_key) {
        (Some(url), Some(key)) => (url, key),
        _ => return Ok(None),
    };

    let url = format!("{base_url}/v_playbooks");
    let slug_filter = format!("eq.{slug}");
    let response = http
        .get(&url)
        .query(&[("select", "*"), ("slug", slug_filter.as_str())])
        .header("apikey", api_key)
        .header("Authorization", format!("Bearer {api_key}"))
        .send()
        .await
        .map_err(|e| ApiError::Upstream(format!("Playbook store request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Upstream(format!(
            "Playbook store returned {status}: {body}"
        )));
    }

    let mut rows = response
        .json::<Vec<serde_json::Value>>()
        .await
        .map_err(|e| ApiError::Upstream(format!("Invalid playbook store response: {e}")))?;

    if rows.is_empty() {
        Ok(None)
    } else {
        Ok(Some(rows.remove(0)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_store_yields_empty_list() {
        let settings = Settings::default();
        let http = reqwest::Client::new();
        let playbooks = fetch_playbooks(&settings, &http).await.unwrap();
        assert!(playbooks.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_store_yields_no_playbook() {
        let settings = Settings::default();
        let http = reqwest::Client::new();
        let playbook = fetch_playbook_by_slug(&settings, &http, "getting-started")
            .await
            .unwrap();
        assert!(playbook.is_none());
    }

    #[tokio::test]
    async fn test_partially_configured_store_counts_as_unconfigured() {
        let settings = Settings {
            supabase_url: Some("https://example.supabase.co/rest/v1".to_string()),
            ..Settings::default()
        };
        let http = reqwest::Client::new();
        assert!(fetch_playbooks(&settings, &http).await.unwrap().is_empty());
    }
}
