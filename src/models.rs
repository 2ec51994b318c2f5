use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Outcome of one API call. `status == 0` means no response was received.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ApiResponse<T = Value> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: u16,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, status: u16) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status,
        }
    }

    pub fn failure(error: impl Into<String>, status: u16) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            status,
        }
    }

    pub fn transport_failure(error: impl Into<String>) -> Self {
        Self::failure(error, 0)
    }

    pub fn is_transport_error(&self) -> bool {
        !self.success && self.status == 0
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            status: self.status,
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(self
                .error
                .unwrap_or_else(|| format!("request failed with HTTP {}", self.status))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Sort {
    Hot,
    New,
    Top,
    Rising,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CommentSort {
    Top,
    New,
    Controversial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SearchType {
    Posts,
    Comments,
    All,
}

impl Sort {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sort::Hot => "hot",
            Sort::New => "new",
            Sort::Top => "top",
            Sort::Rising => "rising",
        }
    }
}

impl CommentSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentSort::Top => "top",
            CommentSort::New => "new",
            CommentSort::Controversial => "controversial",
        }
    }
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Posts => "posts",
            SearchType::Comments => "comments",
            SearchType::All => "all",
        }
    }
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct NewPost {
    pub submolt: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct NewSubmolt {
    pub name: String,
    pub display_name: String,
    pub description: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AuthorRef {
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SubmoltRef {
    pub name: Option<String>,
}

/// The API returns either an embedded object or a plain name.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum NameRef {
    Name(String),
    Object(SubmoltRef),
}

impl NameRef {
    pub fn name(&self) -> Option<&str> {
        match self {
            NameRef::Name(name) => Some(name),
            NameRef::Object(object) => object.name.as_deref(),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Post {
    pub id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub upvotes: Option<i64>,
    pub downvotes: Option<i64>,
    pub comment_count: Option<i64>,
    pub created_at: Option<String>,
    pub author: Option<AuthorRef>,
    pub submolt: Option<NameRef>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Comment {
    pub id: Option<String>,
    pub content: Option<String>,
    pub upvotes: Option<i64>,
    pub parent_id: Option<String>,
    pub created_at: Option<String>,
    pub author: Option<AuthorRef>,
    pub replies: Vec<Comment>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Agent {
    pub id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub karma: Option<i64>,
    pub follower_count: Option<i64>,
    pub following_count: Option<i64>,
    pub is_claimed: Option<bool>,
    pub created_at: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Submolt {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub subscriber_count: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DmConversation {
    pub id: Option<String>,
    pub with_agent: Option<AuthorRef>,
    pub last_message: Option<String>,
    pub unread_count: Option<i64>,
    pub updated_at: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DmMessage {
    pub id: Option<String>,
    pub sender: Option<AuthorRef>,
    pub content: Option<String>,
    pub message: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DmActivity {
    pub has_activity: Option<bool>,
    pub summary: Option<String>,
    pub unread_count: Option<i64>,
    pub pending_requests: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct SearchResult {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub post_id: Option<String>,
    pub author: Option<AuthorRef>,
    pub upvotes: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Registration {
    pub api_key: Option<String>,
    pub claim_url: Option<String>,
    pub verification_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ClaimStatus {
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Decodes a record, falling back to its default when the shape is off.
pub fn decode<T: DeserializeOwned + Default>(value: &Value) -> T {
    serde_json::from_value(value.clone()).unwrap_or_else(|err| {
        log::debug!("Could not decode response record: {}", err);
        T::default()
    })
}

/// Pulls `key` out of a response body and decodes it leniently. Falls back to
/// the whole body when the key is absent.
pub fn extract<T: DeserializeOwned + Default>(data: &Value, key: &str) -> T {
    decode(data.get(key).unwrap_or(data))
}

/// Truncates to `max` characters, appending `...` when anything was cut.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn author_name(author: &Option<AuthorRef>) -> &str {
    author
        .as_ref()
        .and_then(|author| author.name.as_deref())
        .unwrap_or("unknown")
}

impl Post {
    pub fn score(&self) -> i64 {
        self.upvotes.unwrap_or(0) - self.downvotes.unwrap_or(0)
    }

    pub fn submolt_name(&self) -> &str {
        self.submolt
            .as_ref()
            .and_then(NameRef::name)
            .unwrap_or("-")
    }

    pub fn summary_line(&self) -> String {
        format!(
            "[{:>4}] {}  (m/{}, by {}, {} comments)  {}",
            self.score(),
            truncate(or_dash(&self.title), 70),
            self.submolt_name(),
            author_name(&self.author),
            self.comment_count.unwrap_or(0),
            or_dash(&self.id)
        )
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", or_dash(&self.title))?;
        writeln!(
            f,
            "m/{} | by {} | score {} | {} comments | {}",
            self.submolt_name(),
            author_name(&self.author),
            self.score(),
            self.comment_count.unwrap_or(0),
            or_dash(&self.created_at)
        )?;
        writeln!(f, "id: {}", or_dash(&self.id))?;
        if let Some(url) = &self.url {
            writeln!(f, "link: {}", url)?;
        }
        if let Some(content) = &self.content {
            writeln!(f)?;
            write!(f, "{}", content)?;
        }
        Ok(())
    }
}

impl Comment {
    pub fn write_tree(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        out.push_str(&format!(
            "{}[{}] {}: {}  ({})\n",
            indent,
            self.upvotes.unwrap_or(0),
            author_name(&self.author),
            truncate(or_dash(&self.content).trim(), 200),
            or_dash(&self.id)
        ));
        for reply in &self.replies {
            reply.write_tree(out, depth + 1);
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", or_dash(&self.name))?;
        if let Some(description) = &self.description {
            writeln!(f, "{}", description)?;
        }
        writeln!(f, "karma: {}", self.karma.unwrap_or(0))?;
        writeln!(
            f,
            "followers: {} | following: {}",
            self.follower_count.unwrap_or(0),
            self.following_count.unwrap_or(0)
        )?;
        if let Some(claimed) = self.is_claimed {
            writeln!(f, "claimed: {}", if claimed { "yes" } else { "no" })?;
        }
        write!(f, "id: {}", or_dash(&self.id))
    }
}

impl fmt::Display for Submolt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m/{:<20} {:>6} subscribers  {}",
            or_dash(&self.name),
            self.subscriber_count.unwrap_or(0),
            truncate(
                self.description
                    .as_deref()
                    .or(self.display_name.as_deref())
                    .unwrap_or(""),
                60
            )
        )
    }
}

impl fmt::Display for DmConversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} unread: {:<3} {}  ({})",
            author_name(&self.with_agent),
            self.unread_count.unwrap_or(0),
            truncate(or_dash(&self.last_message), 50),
            or_dash(&self.id)
        )
    }
}

impl fmt::Display for DmMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.content.as_ref().or(self.message.as_ref());
        write!(
            f,
            "{} {}: {}",
            or_dash(&self.created_at),
            author_name(&self.sender),
            body.map(String::as_str).unwrap_or("")
        )
    }
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.title.as_ref().or(self.content.as_ref());
        write!(
            f,
            "[{}] {}  (by {}, {} upvotes)  {}",
            self.kind.as_deref().unwrap_or("result"),
            truncate(text.map(String::as_str).unwrap_or("-"), 70),
            author_name(&self.author),
            self.upvotes.unwrap_or(0),
            self.post_id.as_ref().or(self.id.as_ref()).map(String::as_str).unwrap_or("-")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("a fairly long title", 10), "a fairl...");
        assert_eq!(truncate("ünïcödé ünïcödé", 8), "ünïcö...");
    }

    #[test]
    fn into_result_surfaces_the_error_message() {
        let failed: ApiResponse = ApiResponse::failure("boom", 500);
        assert_eq!(failed.into_result(), Err("boom".to_string()));

        let ok = ApiResponse::ok(json!({"a": 1}), 200);
        assert_eq!(ok.into_result(), Ok(json!({"a": 1})));
    }

    #[test]
    fn transport_failures_have_status_zero() {
        let response: ApiResponse = ApiResponse::transport_failure("connection refused");
        assert!(response.is_transport_error());
        assert!(!response.success);
        assert!(!ApiResponse::<Value>::failure("nope", 404).is_transport_error());
    }

    #[test]
    fn extract_reads_nested_records_leniently() {
        let body = json!({
            "success": true,
            "post": {
                "id": "p1",
                "title": "Hello",
                "upvotes": 5,
                "downvotes": 2,
                "submolt": {"name": "general"},
                "author": {"name": "clawd"},
                "unexpected": [1, 2, 3]
            }
        });

        let post: Post = extract(&body, "post");
        assert_eq!(post.id.as_deref(), Some("p1"));
        assert_eq!(post.score(), 3);
        assert_eq!(post.submolt_name(), "general");

        let plain: Post = extract(&json!({"submolt": "todayilearned"}), "post");
        assert_eq!(plain.submolt_name(), "todayilearned");

        let broken: Vec<Post> = extract(&json!({"posts": "not a list"}), "posts");
        assert!(broken.is_empty());
    }

    #[test]
    fn comment_tree_indents_replies() {
        let comment: Comment = serde_json::from_value(json!({
            "id": "c1",
            "content": "top",
            "author": {"name": "a"},
            "replies": [{"id": "c2", "content": "reply", "author": {"name": "b"}}]
        }))
        .unwrap();

        let mut out = String::new();
        comment.write_tree(&mut out, 0);
        assert_eq!(out, "[0] a: top  (c1)\n  [0] b: reply  (c2)\n");
    }

    #[test]
    fn new_post_omits_absent_fields() {
        let post = NewPost {
            submolt: "general".into(),
            title: "Hi".into(),
            content: Some("body".into()),
            url: None,
        };
        assert_eq!(
            serde_json::to_value(&post).unwrap(),
            json!({"submolt": "general", "title": "Hi", "content": "body"})
        );
    }
}
