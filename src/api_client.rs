use crate::{
    credentials::{require_key, CredentialStore},
    diagnosis::diagnose_unauthorized,
    error::Result,
    models::{ApiResponse, CommentSort, NewPost, NewSubmolt, ProfileUpdate, SearchType, Sort},
};
use reqwest::{
    blocking::{Client, Response},
    header,
};
use serde::Serialize;
use serde_json::{json, Value};
use url::form_urlencoded;

pub use reqwest::Method;

const USER_AGENT: &str = concat!("moltbook-cli/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Uses `api_key` when given and non-blank, otherwise the key resolved
    /// from the environment or `store`. The base URL is read once, here.
    pub fn new(api_key: Option<&str>, store: &dyn CredentialStore) -> Result<Self> {
        let api_key = match api_key.filter(|key| !key.trim().is_empty()) {
            Some(key) => key.to_string(),
            None => require_key(store)?,
        };
        Self::with_base_url(Some(&api_key), &store.load().api_base)
    }

    pub fn with_base_url(api_key: Option<&str>, base_url: &str) -> Result<Self> {
        Ok(Self {
            client: ApiClient::build_client(api_key)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Client without an Authorization header, for registration.
    pub fn anonymous(base_url: &str) -> Result<Self> {
        Self::with_base_url(None, base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ApiResponse {
        let url = format!("{}{}", self.base_url, path);
        log::debug!("{} {}", method, url);

        let mut builder = self.client.request(method, &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        match builder.send() {
            Ok(response) => self.envelope(path, response),
            Err(err) => {
                log::warn!("Request to {} failed: {}", url, err);
                ApiResponse::transport_failure(err.to_string())
            }
        }
    }

    fn envelope(&self, path: &str, response: Response) -> ApiResponse {
        let status = response.status();
        let data = response
            .text()
            .ok()
            .and_then(|text| serde_json::from_str::<Value>(&text).ok())
            .unwrap_or_else(|| json!({}));
        log::debug!("{} -> {}", path, status);

        if status.is_success() {
            return ApiResponse::ok(data, status.as_u16());
        }

        let server_error = data.get("error").and_then(Value::as_str);
        let message = if status == reqwest::StatusCode::UNAUTHORIZED {
            diagnose_unauthorized(path, &self.base_url, server_error).to_string()
        } else {
            match (server_error, data.get("hint").and_then(Value::as_str)) {
                (Some(error), Some(hint)) => format!("{} ({})", error, hint),
                (Some(error), None) => error.to_string(),
                _ => format!("HTTP {}", status),
            }
        };

        ApiResponse::failure(message, status.as_u16())
    }

    fn get(&self, path: &str) -> ApiResponse {
        self.request::<Value>(Method::GET, path, None)
    }

    fn delete(&self, path: &str) -> ApiResponse {
        self.request::<Value>(Method::DELETE, path, None)
    }

    fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResponse {
        self.request(Method::POST, path, Some(body))
    }

    fn post_empty(&self, path: &str) -> ApiResponse {
        self.request::<Value>(Method::POST, path, None)
    }

    pub fn register(&self, name: &str, description: &str) -> ApiResponse {
        self.post(
            "/agents/register",
            &json!({ "name": name, "description": description }),
        )
    }

    pub fn status(&self) -> ApiResponse {
        self.get("/agents/status")
    }

    pub fn me(&self) -> ApiResponse {
        self.get("/agents/me")
    }

    pub fn update_profile(&self, update: &ProfileUpdate) -> ApiResponse {
        self.request(Method::PATCH, "/agents/me", Some(update))
    }

    pub fn get_agent(&self, name: &str) -> ApiResponse {
        self.get(&format!("/agents/{}", segment(name)))
    }

    pub fn get_agent_profile(&self, name: &str) -> ApiResponse {
        self.get(&with_query("/agents/profile", &[("name", Some(name.to_string()))]))
    }

    pub fn follow(&self, name: &str) -> ApiResponse {
        self.post_empty(&format!("/agents/{}/follow", segment(name)))
    }

    pub fn unfollow(&self, name: &str) -> ApiResponse {
        self.delete(&format!("/agents/{}/follow", segment(name)))
    }

    pub fn create_post(&self, post: &NewPost) -> ApiResponse {
        self.post("/posts", post)
    }

    pub fn get_posts(
        &self,
        submolt: Option<&str>,
        sort: Option<Sort>,
        limit: Option<u32>,
    ) -> ApiResponse {
        self.get(&posts_path(submolt, sort, limit))
    }

    pub fn get_post(&self, id: &str) -> ApiResponse {
        self.get(&format!("/posts/{}", segment(id)))
    }

    pub fn delete_post(&self, id: &str) -> ApiResponse {
        self.delete(&format!("/posts/{}", segment(id)))
    }

    pub fn create_comment(
        &self,
        post_id: &str,
        content: &str,
        parent_id: Option<&str>,
    ) -> ApiResponse {
        let mut body = json!({ "content": content });
        if let Some(parent_id) = parent_id {
            body["parent_id"] = json!(parent_id);
        }
        self.post(&format!("/posts/{}/comments", segment(post_id)), &body)
    }

    pub fn get_comments(&self, post_id: &str, sort: Option<CommentSort>) -> ApiResponse {
        self.get(&with_query(
            &format!("/posts/{}/comments", segment(post_id)),
            &[("sort", sort.map(|sort| sort.as_str().to_string()))],
        ))
    }

    pub fn upvote(&self, post_id: &str) -> ApiResponse {
        self.post_empty(&format!("/posts/{}/upvote", segment(post_id)))
    }

    pub fn remove_upvote(&self, post_id: &str) -> ApiResponse {
        self.delete(&format!("/posts/{}/upvote", segment(post_id)))
    }

    pub fn downvote(&self, post_id: &str) -> ApiResponse {
        self.post_empty(&format!("/posts/{}/downvote", segment(post_id)))
    }

    pub fn upvote_comment(&self, comment_id: &str) -> ApiResponse {
        self.post_empty(&format!("/comments/{}/upvote", segment(comment_id)))
    }

    pub fn get_feed(&self, sort: Option<Sort>, limit: Option<u32>) -> ApiResponse {
        self.get(&with_query(
            "/feed",
            &[
                ("sort", sort.map(|sort| sort.as_str().to_string())),
                ("limit", limit.map(|limit| limit.to_string())),
            ],
        ))
    }

    pub fn search(
        &self,
        query: &str,
        kind: Option<SearchType>,
        limit: Option<u32>,
    ) -> ApiResponse {
        self.get(&search_path(query, kind, limit))
    }

    pub fn list_submolts(&self) -> ApiResponse {
        self.get("/submolts")
    }

    pub fn create_submolt(&self, submolt: &NewSubmolt) -> ApiResponse {
        self.post("/submolts", submolt)
    }

    pub fn get_submolt(&self, name: &str) -> ApiResponse {
        self.get(&format!("/submolts/{}", segment(name)))
    }

    pub fn subscribe(&self, name: &str) -> ApiResponse {
        self.post_empty(&format!("/submolts/{}/subscribe", segment(name)))
    }

    pub fn unsubscribe(&self, name: &str) -> ApiResponse {
        self.delete(&format!("/submolts/{}/subscribe", segment(name)))
    }

    pub fn dm_check(&self) -> ApiResponse {
        self.get("/agents/dm/check")
    }

    pub fn dm_conversations(&self) -> ApiResponse {
        self.get("/agents/dm/conversations")
    }

    pub fn dm_conversation(&self, conversation_id: &str) -> ApiResponse {
        self.get(&format!(
            "/agents/dm/conversations/{}",
            segment(conversation_id)
        ))
    }

    pub fn dm_send(&self, to: &str, message: &str) -> ApiResponse {
        self.post("/agents/dm/send", &json!({ "to": to, "message": message }))
    }

    fn build_client(api_key: Option<&str>) -> Result<Client> {
        let mut headers = header::HeaderMap::new();
        if let Some(api_key) = api_key {
            let mut auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))?;
            auth_value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, auth_value);
        }
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        Ok(Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .build()?)
    }
}

/// Appends the present parameters as a form-encoded query string.
fn with_query(path: &str, params: &[(&str, Option<String>)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in params {
        if let Some(value) = value {
            serializer.append_pair(key, value);
            any = true;
        }
    }

    if any {
        format!("{}?{}", path, serializer.finish())
    } else {
        path.to_string()
    }
}

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn posts_path(submolt: Option<&str>, sort: Option<Sort>, limit: Option<u32>) -> String {
    with_query(
        "/posts",
        &[
            ("submolt", submolt.map(str::to_string)),
            ("sort", sort.map(|sort| sort.as_str().to_string())),
            ("limit", limit.map(|limit| limit.to_string())),
        ],
    )
}

fn search_path(query: &str, kind: Option<SearchType>, limit: Option<u32>) -> String {
    with_query(
        "/search",
        &[
            ("q", Some(query.to_string())),
            ("type", kind.map(|kind| kind.as_str().to_string())),
            ("limit", limit.map(|limit| limit.to_string())),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        credentials::{Credentials, MemoryStore, API_KEY_ENV},
        error::Error,
    };

    #[test]
    fn posts_query_skips_absent_submolt() {
        assert_eq!(
            posts_path(None, Some(Sort::New), Some(5)),
            "/posts?sort=new&limit=5"
        );
        assert_eq!(
            posts_path(Some("general"), None, None),
            "/posts?submolt=general"
        );
        assert_eq!(posts_path(None, None, None), "/posts");
    }

    #[test]
    fn search_query_is_form_encoded() {
        assert_eq!(
            search_path("agent memory", Some(SearchType::Posts), Some(10)),
            "/search?q=agent+memory&type=posts&limit=10"
        );
        assert_eq!(search_path("a&b=c", None, None), "/search?q=a%26b%3Dc");
    }

    #[test]
    fn path_segments_are_escaped() {
        assert_eq!(segment("abc123"), "abc123");
        assert_eq!(segment("../agents/me"), "..%2Fagents%2Fme");
        assert_eq!(segment("my agent"), "my%20agent");
        assert_eq!(segment("a+b"), "a%2Bb");
    }

    #[test]
    fn missing_key_is_an_error_not_an_exit() {
        std::env::remove_var(API_KEY_ENV);

        let result = ApiClient::new(None, &MemoryStore::default());
        assert!(matches!(result, Err(Error::MissingApiKey)));

        let blank = ApiClient::new(Some("  "), &MemoryStore::default());
        assert!(matches!(blank, Err(Error::MissingApiKey)));
    }

    #[test]
    fn base_url_comes_from_the_store() {
        let store = MemoryStore::new(Credentials {
            api_key: Some("stored".into()),
            api_base: "http://localhost:3000/api/v1/".into(),
            ..Default::default()
        });

        let client = ApiClient::new(Some("explicit"), &store).unwrap();
        assert_eq!(client.base_url(), "http://localhost:3000/api/v1");
    }
}
