//! Hosted store client.
//!
//! Talks to a PostgREST-style API (`/rest/v1/<table>`), authenticated with a
//! project api key plus a bearer token. Row-level access rules live on the
//! server; this client only passes the user id along.

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use url::Url;

use crate::catalog::{CatalogProvider, LectureRef, Subject};
use crate::error::{RemoteError, Result};
use crate::recorder::{NewSession, SessionRecorder};
use crate::storage::RemoteConfig;

const SESSIONS_TABLE: &str = "study_sessions";
const SUBJECTS_TABLE: &str = "categories";
const LECTURES_TABLE: &str = "lectures";

pub struct RemoteStore {
    base: Url,
    api_key: String,
    bearer: String,
    http_client: Client,
}

impl RemoteStore {
    /// Build a client from config.
    ///
    /// # Errors
    /// [`RemoteError::NotConfigured`] without a URL or api key,
    /// [`RemoteError::InvalidUrl`] for a malformed URL.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let api_key = config.resolved_api_key();
        if config.url.trim().is_empty() || api_key.is_empty() {
            return Err(RemoteError::NotConfigured);
        }
        let mut base = Url::parse(config.url.trim())?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http_client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            base,
            bearer: config
                .access_token
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| api_key.clone()),
            api_key,
            http_client,
        })
    }

    fn table_url(&self, table: &str) -> Result<Url, RemoteError> {
        Ok(self.base.join(&format!("rest/v1/{table}"))?)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer)
    }

    async fn check(resp: Response) -> Result<Response, RemoteError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        })
    }

    pub async fn insert_session(&self, session: &NewSession) -> Result<(), RemoteError> {
        let url = self.table_url(SESSIONS_TABLE)?;
        let resp = self
            .request(Method::POST, url)
            .header("Prefer", "return=minimal")
            .json(session)
            .send()
            .await?;
        Self::check(resp).await?;
        tracing::debug!(user_id = %session.user_id, "session stored remotely");
        Ok(())
    }

    pub async fn fetch_subjects(&self, user_id: &str) -> Result<Vec<Subject>, RemoteError> {
        let mut url = self.table_url(SUBJECTS_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "name,color")
            .append_pair("user_id", &format!("eq.{user_id}"))
            .append_pair("order", "name.asc");
        let resp = self.request(Method::GET, url).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    pub async fn fetch_lectures(
        &self,
        user_id: &str,
        subject: &str,
    ) -> Result<Vec<LectureRef>, RemoteError> {
        let mut url = self.table_url(LECTURES_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "id,title")
            .append_pair("user_id", &format!("eq.{user_id}"))
            .append_pair("category", &format!("eq.{subject}"))
            .append_pair("order", "title.asc");
        let resp = self.request(Method::GET, url).send().await?;
        Ok(Self::check(resp).await?.json().await?)
    }
}

impl SessionRecorder for RemoteStore {
    async fn submit(&self, session: &NewSession) -> Result<()> {
        Ok(self.insert_session(session).await?)
    }
}

impl CatalogProvider for RemoteStore {
    async fn list_subjects(&self, user_id: &str) -> Result<Vec<Subject>> {
        Ok(self.fetch_subjects(user_id).await?)
    }

    async fn list_lectures_for_subject(
        &self,
        user_id: &str,
        subject: &str,
    ) -> Result<Vec<LectureRef>> {
        Ok(self.fetch_lectures(user_id, subject).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{RecordDefaults, SessionTag};
    use crate::timer::datetime_from_ms;
    use mockito::Matcher;
    use serde_json::json;

    fn config(url: &str) -> RemoteConfig {
        RemoteConfig {
            enabled: true,
            url: url.to_string(),
            api_key: "anon-key".into(),
            access_token: Some("user-jwt".into()),
        }
    }

    #[test]
    fn requires_url_and_key() {
        let mut cfg = config("");
        assert!(matches!(RemoteStore::new(&cfg), Err(RemoteError::NotConfigured)));
        cfg.url = "not a url".into();
        assert!(matches!(RemoteStore::new(&cfg), Err(RemoteError::InvalidUrl(_))));
    }

    #[test]
    fn table_urls_keep_base_path() {
        let store = RemoteStore::new(&config("https://example.test/project")).unwrap();
        assert_eq!(
            store.table_url("lectures").unwrap().as_str(),
            "https://example.test/project/rest/v1/lectures"
        );
    }

    #[tokio::test]
    async fn submit_posts_record() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/study_sessions")
            .match_header("apikey", "anon-key")
            .match_header("authorization", "Bearer user-jwt")
            .match_header("prefer", "return=minimal")
            .match_body(Matcher::Json(json!({
                "user_id": "u1",
                "name": "Study Session",
                "duration_minutes": 25,
                "completed_at": "2023-11-14T22:13:20Z",
                "category": "General",
                "lecture_id": null
            })))
            .with_status(201)
            .create_async()
            .await;

        let store = RemoteStore::new(&config(&server.url())).unwrap();
        let session = NewSession::from_tag(
            "u1",
            &SessionTag::default(),
            &RecordDefaults::default(),
            25,
            datetime_from_ms(1_700_000_000_000),
        );
        store.submit(&session).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn submit_surfaces_status_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/rest/v1/study_sessions")
            .with_status(401)
            .with_body("JWT expired")
            .create_async()
            .await;

        let store = RemoteStore::new(&config(&server.url())).unwrap();
        let session = NewSession::from_tag(
            "u1",
            &SessionTag::default(),
            &RecordDefaults::default(),
            5,
            datetime_from_ms(0),
        );
        let err = store.insert_session(&session).await.unwrap_err();
        match err {
            RemoteError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "JWT expired");
            }
            other => panic!("Expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn lists_subjects_for_user() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/rest/v1/categories".into()))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("select".into(), "name,color".into()),
                Matcher::UrlEncoded("user_id".into(), "eq.u1".into()),
                Matcher::UrlEncoded("order".into(), "name.asc".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r##"[{"name":"Math","color":"#ff0000"}]"##)
            .create_async()
            .await;

        let store = RemoteStore::new(&config(&server.url())).unwrap();
        let subjects = store.list_subjects("u1").await.unwrap();
        assert_eq!(
            subjects,
            vec![Subject {
                name: "Math".into(),
                color: "#ff0000".into()
            }]
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn lists_lectures_for_subject() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", Matcher::Regex(r"^/rest/v1/lectures".into()))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("user_id".into(), "eq.u1".into()),
                Matcher::UrlEncoded("category".into(), "eq.Linear Algebra".into()),
            ]))
            .with_status(200)
            .with_body(r#"[{"id":"a1","title":"Eigenvalues"}]"#)
            .create_async()
            .await;

        let store = RemoteStore::new(&config(&server.url())).unwrap();
        let lectures = store
            .list_lectures_for_subject("u1", "Linear Algebra")
            .await
            .unwrap();
        assert_eq!(lectures[0].title, "Eigenvalues");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn catalog_errors_become_core_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", Matcher::Regex(r"^/rest/v1/categories".into()))
            .with_status(500)
            .create_async()
            .await;

        let store = RemoteStore::new(&config(&server.url())).unwrap();
        let err = store.list_subjects("u1").await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::CoreError::Remote(RemoteError::Status { status: 500, .. })
        ));
    }
}
