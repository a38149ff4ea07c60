use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use tracing::debug;
use uuid::Uuid;

use super::{StoreError, UserStore};
use crate::auth::repo_types::{NewUser, User};

const USER_COLUMNS: &str = "id,email,hashed_password,full_name";

/// Talks to the hosted database through its REST table API
/// (`{base}/rest/v1/users`).
#[derive(Clone)]
pub struct RestUserStore {
    client: Client,
    table_url: String,
}

impl RestUserStore {
    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let mut headers = header::HeaderMap::new();
        let key = header::HeaderValue::from_str(api_key).context("database key is not a valid header value")?;
        let bearer = header::HeaderValue::from_str(&format!("Bearer {api_key}"))
            .context("database key is not a valid header value")?;
        headers.insert("apikey", key);
        headers.insert(header::AUTHORIZATION, bearer);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .context("build http client")?;

        Ok(Self {
            client,
            table_url: format!("{}/rest/v1/users", base_url.trim_end_matches('/')),
        })
    }

    async fn select_one(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let filter = format!("eq.{value}");
        let res = self
            .client
            .get(&self.table_url)
            .query(&[("select", USER_COLUMNS), (column, filter.as_str())])
            .send()
            .await
            .context("query users table")?;

        let rows: Vec<User> = ensure_success(res).await?.json().await.context("decode users rows")?;
        debug!(column, matches = rows.len(), "users lookup");
        Ok(rows.into_iter().next())
    }
}

async fn ensure_success(res: Response) -> Result<Response, StoreError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    if status == StatusCode::CONFLICT || body.contains("23505") {
        return Err(StoreError::DuplicateEmail);
    }
    Err(StoreError::Backend(anyhow!("users table returned {status}: {body}")))
}

#[async_trait]
impl UserStore for RestUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.select_one("email", email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        self.select_one("id", &id.to_string()).await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let res = self
            .client
            .post(&self.table_url)
            .query(&[("select", USER_COLUMNS)])
            .header("Prefer", "return=representation")
            .json(&user)
            .send()
            .await
            .context("insert into users table")?;

        let rows: Vec<User> = ensure_success(res).await?.json().await.context("decode inserted row")?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend(anyhow!("insert returned no rows")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn row(id: Uuid, email: &str) -> serde_json::Value {
        json!({
            "id": id,
            "email": email,
            "hashed_password": "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA",
            "full_name": "Ada",
            "created_at": "2024-06-01T10:00:00Z"
        })
    }

    #[tokio::test]
    async fn find_by_email_sends_key_and_filter() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .and(query_param("email", "eq.ada@example.com"))
            .and(header("apikey", "anon-key"))
            .and(header("authorization", "Bearer anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(id, "ada@example.com")])))
            .mount(&server)
            .await;

        let store = RestUserStore::new(&format!("{}/", server.uri()), "anon-key").unwrap();
        let user = store.find_by_email("ada@example.com").await.unwrap().expect("user row");
        assert_eq!(user.id, id);
        assert_eq!(user.full_name, "Ada");
    }

    #[tokio::test]
    async fn find_returns_none_on_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let store = RestUserStore::new(&server.uri(), "k").unwrap();
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_asks_for_representation() {
        let server = MockServer::start().await;
        let id = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/rest/v1/users"))
            .and(header("prefer", "return=representation"))
            .and(body_partial_json(json!({ "email": "ada@example.com", "full_name": "Ada" })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!([row(id, "ada@example.com")])))
            .mount(&server)
            .await;

        let store = RestUserStore::new(&server.uri(), "k").unwrap();
        let user = store
            .insert(NewUser {
                email: "ada@example.com".into(),
                hashed_password: "hash".into(),
                full_name: "Ada".into(),
            })
            .await
            .unwrap();
        assert_eq!(user.id, id);
    }

    #[tokio::test]
    async fn unique_violation_maps_to_duplicate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/users"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"users_email_key\""
            })))
            .mount(&server)
            .await;

        let store = RestUserStore::new(&server.uri(), "k").unwrap();
        let err = store
            .insert(NewUser {
                email: "ada@example.com".into(),
                hashed_password: "hash".into(),
                full_name: "Ada".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn server_errors_are_backend_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let store = RestUserStore::new(&server.uri(), "k").unwrap();
        let err = store.find_by_email("x@y.z").await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
        assert!(err.to_string().contains("503"));
    }
}
