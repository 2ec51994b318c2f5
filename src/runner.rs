use crate::{
    api_client::ApiClient,
    args::{Args, Command, DmCommand, ProfileCommand, SubmoltCommand},
    credentials::{CredentialStore, CredentialsUpdate},
    models::{
        decode, extract, Agent, ApiResponse, ClaimStatus, Comment, DmActivity, DmConversation,
        DmMessage, NewPost, NewSubmolt, Post, ProfileUpdate, Registration, SearchResult, Submolt,
    },
};
use anyhow::{anyhow, Context, Result};
use serde_json::Value;

/// Executes one parsed command and returns the text to print.
pub fn run(args: Args, store: &dyn CredentialStore) -> Result<String> {
    Runner::new(store, args.api_key, args.json).execute(args.command)
}

pub struct Runner<'a> {
    store: &'a dyn CredentialStore,
    api_key: Option<String>,
    json: bool,
}

impl<'a> Runner<'a> {
    pub fn new(store: &'a dyn CredentialStore, api_key: Option<String>, json: bool) -> Self {
        Self {
            store,
            api_key,
            json,
        }
    }

    /// `auth` and `register` never call this; every other command does and
    /// fails with `MissingApiKey` when no key resolves.
    fn client(&self) -> Result<ApiClient> {
        Ok(ApiClient::new(self.api_key.as_deref(), self.store)?)
    }

    fn auth(&self, api_key: &str) -> Result<String> {
        self.store.save(&CredentialsUpdate {
            api_key: Some(api_key.to_string()),
            ..Default::default()
        })?;

        let client = ApiClient::new(Some(api_key), self.store)?;
        let data = client.me().into_result().map_err(|err| {
            log::warn!("Could not verify the new API key: {}", err);
            anyhow!("API key saved, but verification failed: {}", err)
        })?;

        let agent: Agent = extract(&data, "agent");
        self.store.save(&CredentialsUpdate {
            agent_id: agent.id.clone(),
            username: agent.name.clone(),
            ..Default::default()
        })?;
        Ok(format!(
            "API key saved. Authenticated as {}.",
            agent.name.as_deref().unwrap_or("unknown agent")
        ))
    }

    fn register(&self, name: &str, description: &str) -> Result<String> {
        let client = ApiClient::anonymous(&self.store.load().api_base)?;
        let data = client
            .register(name, description)
            .into_result()
            .map_err(|err| anyhow!(err))
            .context("Registration failed")?;

        let registration: Registration = extract(&data, "agent");
        let api_key = registration
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("registration response did not include an API key"))?;
        self.store.save(&CredentialsUpdate {
            api_key: Some(api_key),
            username: Some(name.to_string()),
            ..Default::default()
        })?;

        Ok(render_registration(name, &registration))
    }

    pub fn execute(&self, command: Command) -> Result<String> {
        match command {
            Command::Auth { api_key } => self.auth(&api_key),
            Command::Register { name, description } => self.register(&name, &description),
            Command::Status => self.render(self.client()?.status(), |data| {
                let status: ClaimStatus = decode(data);
                format!("Status: {}", status.status.as_deref().unwrap_or("unknown"))
            }),
            Command::Me => self.render(self.client()?.me(), render_agent),
            Command::Profile {
                command: ProfileCommand::Update { description },
            } => {
                let update = ProfileUpdate {
                    description,
                    metadata: None,
                };
                self.render(self.client()?.update_profile(&update), |data| {
                    format!("Profile updated.\n{}", render_agent(data))
                })
            }
            Command::Agent { name, by_path } => {
                let client = self.client()?;
                let response = if by_path {
                    client.get_agent(&name)
                } else {
                    client.get_agent_profile(&name)
                };
                self.render(response, render_agent)
            }
            Command::Post {
                submolt,
                title,
                content,
                url,
            } => {
                let post = NewPost {
                    submolt,
                    title,
                    content,
                    url,
                };
                self.render(self.client()?.create_post(&post), |data| {
                    let post: Post = extract(data, "post");
                    format!("Posted: {}", post.id.as_deref().unwrap_or("-"))
                })
            }
            Command::Posts {
                submolt,
                sort,
                limit,
            } => self.render(
                self.client()?.get_posts(submolt.as_deref(), sort, limit),
                render_posts,
            ),
            Command::Show { id, comments } => {
                let client = self.client()?;
                let post = self.render(client.get_post(&id), |data| {
                    extract::<Post>(data, "post").to_string()
                })?;
                if !comments {
                    return Ok(post);
                }
                let thread = self.render(client.get_comments(&id, None), render_comments)?;
                Ok(format!("{}\n\n{}", post, thread))
            }
            Command::Delete { id } => self.render(self.client()?.delete_post(&id), |data| {
                message_or(data, &format!("Deleted post {}.", id))
            }),
            Command::Feed { sort, limit } => {
                self.render(self.client()?.get_feed(sort, limit), render_posts)
            }
            Command::Search { query, kind, limit } => {
                self.render(self.client()?.search(&query, kind, limit), render_search)
            }
            Command::Comment {
                post_id,
                content,
                parent,
            } => self.render(
                self.client()?
                    .create_comment(&post_id, &content, parent.as_deref()),
                |data| {
                    let comment: Comment = extract(data, "comment");
                    format!("Commented: {}", comment.id.as_deref().unwrap_or("-"))
                },
            ),
            Command::Comments { post_id, sort } => {
                self.render(self.client()?.get_comments(&post_id, sort), render_comments)
            }
            Command::Upvote { post_id } => self.render(self.client()?.upvote(&post_id), |data| {
                message_or(data, "Upvoted.")
            }),
            Command::Downvote { post_id } => {
                self.render(self.client()?.downvote(&post_id), |data| {
                    message_or(data, "Downvoted.")
                })
            }
            Command::Unvote { post_id } => {
                self.render(self.client()?.remove_upvote(&post_id), |data| {
                    message_or(data, "Upvote removed.")
                })
            }
            Command::UpvoteComment { comment_id } => {
                self.render(self.client()?.upvote_comment(&comment_id), |data| {
                    message_or(data, "Upvoted comment.")
                })
            }
            Command::Follow { name } => self.render(self.client()?.follow(&name), |data| {
                message_or(data, &format!("Following {}.", name))
            }),
            Command::Unfollow { name } => self.render(self.client()?.unfollow(&name), |data| {
                message_or(data, &format!("Unfollowed {}.", name))
            }),
            Command::Subscribe { submolt } => {
                self.render(self.client()?.subscribe(&submolt), |data| {
                    message_or(data, &format!("Subscribed to m/{}.", submolt))
                })
            }
            Command::Unsubscribe { submolt } => {
                self.render(self.client()?.unsubscribe(&submolt), |data| {
                    message_or(data, &format!("Unsubscribed from m/{}.", submolt))
                })
            }
            Command::Submolts => self.render(self.client()?.list_submolts(), render_submolts),
            Command::Submolt {
                command:
                    SubmoltCommand::Create {
                        name,
                        display_name,
                        description,
                    },
            } => {
                let submolt = NewSubmolt {
                    name,
                    display_name,
                    description,
                };
                self.render(self.client()?.create_submolt(&submolt), |data| {
                    format!("Created {}", extract::<Submolt>(data, "submolt"))
                })
            }
            Command::Submolt {
                command: SubmoltCommand::Show { name },
            } => self.render(self.client()?.get_submolt(&name), |data| {
                extract::<Submolt>(data, "submolt").to_string()
            }),
            Command::Dm {
                command: DmCommand::Check,
            } => self.render(self.client()?.dm_check(), render_dm_activity),
            Command::Dm {
                command: DmCommand::List,
            } => self.render(self.client()?.dm_conversations(), render_conversations),
            Command::Dm {
                command: DmCommand::Show { conversation_id },
            } => self.render(
                self.client()?.dm_conversation(&conversation_id),
                render_messages,
            ),
            Command::Dm {
                command: DmCommand::Send { to, message },
            } => self.render(self.client()?.dm_send(&to, &message), |data| {
                message_or(data, &format!("Message sent to {}.", to))
            }),
        }
    }

    fn render(
        &self,
        response: ApiResponse,
        to_text: impl FnOnce(&Value) -> String,
    ) -> Result<String> {
        let data = response.into_result().map_err(|err| anyhow!(err))?;
        if self.json {
            return Ok(serde_json::to_string_pretty(&data)?);
        }
        Ok(to_text(&data))
    }
}

fn message_or(data: &Value, default: &str) -> String {
    data.get("message")
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn render_agent(data: &Value) -> String {
    extract::<Agent>(data, "agent").to_string()
}

fn render_posts(data: &Value) -> String {
    let posts: Vec<Post> = extract(data, "posts");
    if posts.is_empty() {
        return "No posts.".to_string();
    }
    posts
        .iter()
        .map(Post::summary_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_comments(data: &Value) -> String {
    let comments: Vec<Comment> = extract(data, "comments");
    if comments.is_empty() {
        return "No comments.".to_string();
    }
    let mut out = String::new();
    comments
        .iter()
        .for_each(|comment| comment.write_tree(&mut out, 0));
    out.trim_end().to_string()
}

fn render_search(data: &Value) -> String {
    let results: Vec<SearchResult> = extract(data, "results");
    if results.is_empty() {
        return "No results.".to_string();
    }
    results
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_submolts(data: &Value) -> String {
    let submolts: Vec<Submolt> = extract(data, "submolts");
    if submolts.is_empty() {
        return "No submolts.".to_string();
    }
    submolts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_dm_activity(data: &Value) -> String {
    let activity: DmActivity = decode(data);
    if !activity.has_activity.unwrap_or(false) {
        return "No new DM activity.".to_string();
    }
    format!(
        "{} unread, {} pending requests. {}",
        activity.unread_count.unwrap_or(0),
        activity.pending_requests.unwrap_or(0),
        activity.summary.as_deref().unwrap_or("")
    )
    .trim_end()
    .to_string()
}

fn render_conversations(data: &Value) -> String {
    let conversations: Vec<DmConversation> = extract(data, "conversations");
    if conversations.is_empty() {
        return "No conversations.".to_string();
    }
    conversations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_messages(data: &Value) -> String {
    let messages: Vec<DmMessage> = extract(data, "messages");
    if messages.is_empty() {
        return "No messages.".to_string();
    }
    messages
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_registration(name: &str, registration: &Registration) -> String {
    let mut lines = vec![format!("Registered {}. API key saved.", name)];
    if let Some(claim_url) = &registration.claim_url {
        lines.push(format!("Claim URL: {}", claim_url));
    }
    if let Some(code) = &registration.verification_code {
        lines.push(format!("Verification code: {}", code));
    }
    lines.join("\n")
}
