use anyhow::Result;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::error::SupabaseError;

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Ok(value) = HeaderValue::from_str(&self.anon_key) {
            headers.insert("apikey", value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        headers
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token);
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await.map_err(SupabaseError::from)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.map_err(SupabaseError::from)?;
            error!("API error ({}): {}", status, error_text);

            return Err(SupabaseError::from_response(status.as_u16(), error_text).into());
        }

        let data = response.json::<T>().await.map_err(SupabaseError::from)?;
        Ok(data)
    }

    /// Invokes an edge function under `/functions/v1/{name}`.
    pub async fn invoke_function<T>(&self, name: &str, auth_token: Option<&str>,
                                    body: Value) -> Result<T>
    where T: DeserializeOwned {
        let path = format!("/functions/v1/{}", name);
        self.request(Method::POST, &path, auth_token, Some(body)).await
    }
}

/// `Prefer: return=representation` so inserts and updates echo the affected rows.
pub fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_config::BookingSettings;
    use serde_json::json;
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use wiremock::matchers::{header, method, path};

    fn config_for(server: &MockServer) -> AppConfig {
        AppConfig {
            supabase_url: server.uri(),
            supabase_anon_key: "test-anon-key".to_string(),
            supabase_service_role_key: None,
            api_port: 3000,
            booking: BookingSettings::default(),
        }
    }

    #[tokio::test]
    async fn test_request_sends_apikey_and_parses_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/services"))
            .and(header("apikey", "test-anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 1 }])))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server));
        let rows: Vec<Value> = client
            .request(Method::GET, "/rest/v1/services", None, None)
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_status_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "code": "23505" })))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server));
        let err = client
            .request::<Vec<Value>>(Method::POST, "/rest/v1/appointments", None, Some(json!({})))
            .await
            .unwrap_err();

        assert_matches!(crate::error::classify(&err), Some(SupabaseError::Conflict(_)));
    }
}
