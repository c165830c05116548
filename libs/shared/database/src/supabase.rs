use anyhow::{anyhow, Context, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

/// Thin client over the Supabase REST, storage and auth endpoints.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    bucket: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            bucket: config.storage_bucket.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key).context("Invalid anon key header")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("Invalid bearer token header")?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        Self::parse_response(response).await
    }

    async fn parse_response<T>(response: reqwest::Response) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            error!("API error ({}): {}", status, text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", text),
                404 => anyhow!("Resource not found: {}", text),
                409 => anyhow!("Conflict: {}", text),
                _ => anyhow!("API error ({}): {}", status, text),
            });
        }

        // PostgREST answers 204 with no body for deletes and minimal inserts
        let payload = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(payload).context("Failed to parse API response")
    }

    fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    /// Inserts a row and returns the stored record.
    pub async fn insert_returning<T>(&self, table: &str, row: Value, auth_token: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}", table);
        let mut rows: Vec<Value> = self
            .request_with_headers(
                Method::POST,
                &path,
                Some(auth_token),
                Some(row),
                Some(Self::representation_headers()),
            )
            .await?;

        if rows.is_empty() {
            return Err(anyhow!("Insert into {} returned no rows", table));
        }

        Ok(serde_json::from_value(rows.swap_remove(0))?)
    }

    /// Patches rows matching `filter` (PostgREST query string) and returns the
    /// first updated record.
    pub async fn patch_returning<T>(
        &self,
        table: &str,
        filter: &str,
        changes: Value,
        auth_token: &str,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}?{}", table, filter);
        let mut rows: Vec<Value> = self
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(changes),
                Some(Self::representation_headers()),
            )
            .await?;

        if rows.is_empty() {
            return Err(anyhow!("Resource not found: no {} row matched {}", table, filter));
        }

        Ok(serde_json::from_value(rows.swap_remove(0))?)
    }

    /// Counts rows matching `filter` using the `Content-Range` header.
    pub async fn count(&self, table: &str, filter: &str, auth_token: &str) -> Result<u64> {
        let separator = if filter.is_empty() { "" } else { "&" };
        let url = format!("{}/rest/v1/{}?select=id{}{}", self.base_url, table, separator, filter);

        let mut headers = self.get_headers(Some(auth_token))?;
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));
        headers.insert("Range", HeaderValue::from_static("0-0"));

        let response = self.client.get(&url).headers(headers).send().await?;
        let status = response.status();

        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(|range| range.rsplit('/').next())
            .and_then(|total| total.parse::<u64>().ok());

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("Count on {} failed ({}): {}", table, status, text);
            return Err(anyhow!("API error ({}): {}", status, text));
        }

        total.ok_or_else(|| anyhow!("Missing Content-Range header when counting {}", table))
    }

    // ------------------------------------------------------------------
    // Auth
    // ------------------------------------------------------------------

    pub async fn sign_up(&self, email: &str, password: &str, data: Value) -> Result<Value> {
        self.request(
            Method::POST,
            "/auth/v1/signup",
            None,
            Some(json!({
                "email": email,
                "password": password,
                "data": data
            })),
        )
        .await
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Value> {
        self.request(
            Method::POST,
            "/auth/v1/token?grant_type=password",
            None,
            Some(json!({
                "email": email,
                "password": password
            })),
        )
        .await
    }

    pub async fn sign_out(&self, auth_token: &str) -> Result<()> {
        let _: Value = self
            .request(Method::POST, "/auth/v1/logout", Some(auth_token), None)
            .await?;
        Ok(())
    }

    pub async fn get_user_profile(&self, auth_token: &str) -> Result<Value> {
        self.request(Method::GET, "/auth/v1/user", Some(auth_token), None).await
    }

    // ------------------------------------------------------------------
    // Storage
    // ------------------------------------------------------------------

    pub async fn upload_object(
        &self,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        auth_token: &str,
    ) -> Result<Value> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, object_path);
        debug!("Uploading {} bytes to {}", bytes.len(), url);

        let mut headers = self.get_headers(Some(auth_token))?;
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(content_type).context("Invalid content type")?,
        );
        headers.insert("x-upsert", HeaderValue::from_static("false"));

        let response = self.client.post(&url).headers(headers).body(bytes).send().await?;
        Self::parse_response(response).await
    }

    pub async fn delete_object(&self, object_path: &str, auth_token: &str) -> Result<()> {
        let path = format!("/storage/v1/object/{}/{}", self.bucket, object_path);
        let _: Value = self.request(Method::DELETE, &path, Some(auth_token), None).await?;
        Ok(())
    }

    pub fn public_url(&self, object_path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, object_path
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(url: &str) -> AppConfig {
        AppConfig {
            supabase_url: format!("{}/", url),
            supabase_anon_key: "anon".to_string(),
            supabase_jwt_secret: "secret".to_string(),
            storage_bucket: "files".to_string(),
            openai_api_key: String::new(),
            openai_base_url: String::new(),
            openai_chat_model: String::new(),
            openai_vision_model: String::new(),
            openai_realtime_model: String::new(),
            openai_realtime_voice: String::new(),
            summary_timeout_secs: 1,
            email_api_url: String::new(),
            email_api_key: String::new(),
            email_from: String::new(),
            twilio_account_sid: String::new(),
            twilio_auth_token: String::new(),
            twilio_from_number: String::new(),
            twilio_api_base_url: String::new(),
            notification_timeout_secs: 2,
            video_app_id: String::new(),
            video_server_secret: String::new(),
            video_token_ttl_secs: 60,
            admin_passkey: String::new(),
            server_port: 0,
        }
    }

    #[tokio::test]
    async fn empty_body_deserializes_as_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/appointments"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server.uri()));
        let result: Value = client
            .request(Method::DELETE, "/rest/v1/appointments?id=eq.1", Some("t"), None)
            .await
            .unwrap();

        assert!(result.is_null());
    }

    #[tokio::test]
    async fn conflict_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/patients"))
            .and(header("Prefer", "return=representation"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server.uri()));
        let err = client
            .insert_returning::<Value>("patients", json!({ "id": "1" }), "t")
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Conflict"));
    }

    #[tokio::test]
    async fn count_reads_content_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Range", "0-0/42")
                    .set_body_json(json!([{ "id": "a" }])),
            )
            .mount(&server)
            .await;

        let client = SupabaseClient::new(&config_for(&server.uri()));
        let total = client.count("appointments", "status=eq.pending", "t").await.unwrap();

        assert_eq!(total, 42);
    }

    #[test]
    fn public_url_uses_bucket() {
        let client = SupabaseClient::new(&config_for("http://db.local"));
        assert_eq!(
            client.public_url("prescriptions/p1/a.png"),
            "http://db.local/storage/v1/object/public/files/prescriptions/p1/a.png"
        );
    }
}
