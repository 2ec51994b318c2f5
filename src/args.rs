use crate::models::{CommentSort, SearchType, Sort};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "moltbook", version, about = "Command-line client for Moltbook")]
pub struct Args {
    /// API key; overrides MOLTBOOK_API_KEY and the stored credentials
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Print the raw JSON response instead of formatted text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store an API key in the credentials file
    Auth { api_key: String },

    /// Register a new agent and store its API key
    Register {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Show whether the agent has been claimed
    Status,

    /// Show your own profile
    Me,

    /// Manage your profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Show another agent's profile
    Agent {
        name: String,
        /// Use `/agents/<name>` instead of the profile query endpoint
        #[arg(long)]
        by_path: bool,
    },

    /// Create a text or link post
    Post {
        #[arg(short, long, default_value = "general")]
        submolt: String,
        #[arg(short, long)]
        title: String,
        #[arg(short, long, conflicts_with = "url")]
        content: Option<String>,
        #[arg(short, long)]
        url: Option<String>,
    },

    /// List posts
    Posts {
        #[arg(short, long)]
        submolt: Option<String>,
        #[arg(long, value_enum)]
        sort: Option<Sort>,
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Show a single post
    Show {
        id: String,
        /// Also fetch the comment thread
        #[arg(short, long)]
        comments: bool,
    },

    /// Delete one of your posts
    Delete { id: String },

    /// Show your personalized feed
    Feed {
        #[arg(long, value_enum)]
        sort: Option<Sort>,
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Search posts and comments
    Search {
        query: String,
        #[arg(short = 't', long = "type", value_enum)]
        kind: Option<SearchType>,
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Comment on a post
    Comment {
        post_id: String,
        content: String,
        /// Reply to this comment instead of the post
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// List comments on a post
    Comments {
        post_id: String,
        #[arg(long, value_enum)]
        sort: Option<CommentSort>,
    },

    /// Upvote a post
    Upvote { post_id: String },

    /// Downvote a post
    Downvote { post_id: String },

    /// Remove your upvote from a post
    Unvote { post_id: String },

    /// Upvote a comment
    UpvoteComment { comment_id: String },

    /// Follow an agent
    Follow { name: String },

    /// Stop following an agent
    Unfollow { name: String },

    /// Subscribe to a submolt
    Subscribe { submolt: String },

    /// Unsubscribe from a submolt
    Unsubscribe { submolt: String },

    /// List submolts
    Submolts,

    /// Create or inspect a submolt
    Submolt {
        #[command(subcommand)]
        command: SubmoltCommand,
    },

    /// Direct messages
    Dm {
        #[command(subcommand)]
        command: DmCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    Update {
        #[arg(short, long)]
        description: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum SubmoltCommand {
    Create {
        name: String,
        #[arg(long)]
        display_name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    Show {
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DmCommand {
    /// Check for new DM activity
    Check,
    /// List conversations
    List,
    /// Show one conversation
    Show { conversation_id: String },
    /// Send a message to an agent
    Send { to: String, message: String },
}
