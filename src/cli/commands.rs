use std::fmt::Write as _;
use std::io::{self, Read};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, Date, OffsetDateTime};

use crate::api::{ListShape, Transport};
use crate::cache::{keys, CacheShim};
use crate::config::AppConfig;
use crate::controller::{FetchOutcome, RawListController};
use crate::pagination::{ControlState, PageControl};
use crate::query::{parse_assignment, FilterValue};
use crate::services::{Comment, CommentService, SportsSchedule, UserDirectory};
use crate::session::Session;

/// Everything a command needs, built once per invocation.
pub struct CommandContext {
    pub config: Arc<AppConfig>,
    pub cache: CacheShim,
    pub session: Session,
    pub transport: Arc<dyn Transport>,
}

impl CommandContext {
    pub fn new(config: Arc<AppConfig>, cache: CacheShim, transport: Arc<dyn Transport>) -> Self {
        let session = Session::new(cache.clone());
        Self {
            config,
            cache,
            session,
            transport,
        }
    }

    fn comments(&self) -> CommentService {
        CommentService::new(self.transport.clone(), self.cache.clone(), self.session.clone())
    }

    fn users(&self) -> UserDirectory {
        UserDirectory::new(self.transport.clone(), self.cache.clone())
    }
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Resource name (see `newsdesk resources`)
    pub resource: String,
    /// Page to show, clamped to the available pages
    #[arg(long, default_value_t = 1)]
    pub page: u32,
    /// Filter as name=value; repeatable
    #[arg(long = "filter", value_name = "NAME=VALUE")]
    pub filters: Vec<String>,
    /// Tab of a multi-tab dashboard
    #[arg(long)]
    pub tab: Option<String>,
    /// Start of the date range (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,
    /// End of the date range (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CommentCommand {
    /// Show the comments of an article, or the replies to one comment
    List {
        article: String,
        #[arg(long, value_name = "COMMENT_ID")]
        replies: Option<String>,
        /// Ignore the cached list
        #[arg(long)]
        refresh: bool,
    },
    /// Post a comment. The body is read from stdin when --body is omitted.
    Add {
        article: String,
        #[arg(long)]
        body: Option<String>,
        #[arg(long, value_name = "COMMENT_ID")]
        reply_to: Option<String>,
    },
    /// Replace the text of a comment
    Edit {
        article: String,
        comment: String,
        #[arg(long)]
        body: Option<String>,
    },
    /// Delete one comment
    Delete { article: String, comment: String },
    /// Delete every comment on an article
    Clear {
        article: String,
        /// Must repeat the article id
        #[arg(long)]
        confirm: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CommentArgs {
    #[command(subcommand)]
    pub command: CommentCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Resolve a user id to a display name
    Name { id: String },
}

#[derive(Args, Debug, Clone)]
pub struct UserArgs {
    #[command(subcommand)]
    pub command: UserCommand,
}

#[derive(Args, Debug, Clone)]
pub struct ScheduleArgs {
    pub league: String,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CacheCommand {
    /// List cached keys and when they were written
    List {
        #[arg(long, default_value = "")]
        prefix: String,
    },
    /// Drop cached entries. Without --prefix the session is kept.
    Clear {
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AuthCommand {
    /// Store a bearer token. Read from stdin when omitted.
    SetToken { token: Option<String> },
    /// Show whether a token is stored and whom it belongs to
    Status,
    /// Forget the token and profile
    Logout,
}

#[derive(Args, Debug, Clone)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

pub async fn list_resource(ctx: &CommandContext, args: ListArgs) -> Result<String> {
    let registry = ctx.config.registry();
    let Some(endpoint) = registry.get(&args.resource) else {
        let known = registry.all().map(|(name, _)| name).collect::<Vec<_>>();
        bail!(
            "unknown resource '{}' (known: {})",
            args.resource,
            known.join(", ")
        );
    };

    let mut controller = RawListController::new(
        args.resource.as_str(),
        endpoint.clone(),
        ctx.config.page_size,
        ctx.config.status.dismiss_after(),
    );
    if let Some(tab) = args.tab.as_deref() {
        controller.switch_tab(tab);
    }
    for raw in &args.filters {
        let (name, value) = parse_assignment(raw).map_err(|err| anyhow!(err.user_message()))?;
        controller.set_filter(name, value);
    }
    if args.from.is_some() || args.to.is_some() {
        let from = args.from.as_deref().map(parse_date).transpose()?;
        let to = args.to.as_deref().map(parse_date).transpose()?;
        controller
            .set_date_range(from, to)
            .map_err(|err| anyhow!(err.user_message()))?;
    }
    controller.set_page(args.page);

    let token = ctx.session.token();
    match controller.load(ctx.transport.as_ref(), token.as_deref()).await {
        FetchOutcome::Failed(err) if err.is_auth() => bail!(
            "{} Store a token with `newsdesk auth set-token`.",
            err.user_message()
        ),
        FetchOutcome::Failed(err) => bail!(err.user_message()),
        outcome => tracing::debug!(resource = %args.resource, ?outcome, "list loaded"),
    }
    controller.status_mut().tick(Instant::now());
    Ok(format_page(&controller))
}

pub fn list_resources(config: &AppConfig) -> String {
    let mut out = String::new();
    for (name, spec) in config.registry().all() {
        let _ = writeln!(
            &mut out,
            "{name:<16} {:<28} {}{}",
            spec.path,
            if spec.shape == ListShape::Flat { "flat" } else { "paged" },
            if spec.requires_auth { "  [AUTH]" } else { "" }
        );
    }
    out
}

pub async fn handle_comment_command(ctx: &CommandContext, args: CommentArgs) -> Result<String> {
    let comments = ctx.comments();
    match args.command {
        CommentCommand::List {
            article,
            replies,
            refresh,
        } => {
            let list = match (replies, refresh) {
                (Some(parent), _) => comments.replies(&parent).await,
                (None, true) => comments.refresh(&article).await,
                (None, false) => comments.list(&article).await,
            }
            .map_err(|err| anyhow!(err.user_message()))?;
            Ok(format_comments(ctx, &list).await)
        }
        CommentCommand::Add {
            article,
            body,
            reply_to,
        } => {
            let body = body_or_stdin(body)?;
            let created = comments
                .add(&article, &body, reply_to.as_deref())
                .await
                .map_err(|err| anyhow!(err.user_message()))?;
            Ok(format!("Added comment #{} to article {article}\n", created.id))
        }
        CommentCommand::Edit {
            article,
            comment,
            body,
        } => {
            let body = body_or_stdin(body)?;
            comments
                .edit(&article, &comment, &body)
                .await
                .map_err(|err| anyhow!(err.user_message()))?;
            Ok(format!("Updated comment #{comment}\n"))
        }
        CommentCommand::Delete { article, comment } => {
            comments
                .delete(&article, &comment)
                .await
                .map_err(|err| anyhow!(err.user_message()))?;
            Ok(format!("Deleted comment #{comment}\n"))
        }
        CommentCommand::Clear { article, confirm } => {
            comments
                .delete_all(&article, &confirm)
                .await
                .map_err(|err| anyhow!(err.user_message()))?;
            Ok(format!("Deleted all comments on article {article}\n"))
        }
    }
}

pub async fn handle_user_command(ctx: &CommandContext, args: UserArgs) -> Result<String> {
    match args.command {
        UserCommand::Name { id } => {
            let name = ctx
                .users()
                .display_name(&id)
                .await
                .map_err(|err| anyhow!(err.user_message()))?;
            Ok(format!("{name}\n"))
        }
    }
}

pub async fn show_schedule(ctx: &CommandContext, args: ScheduleArgs) -> Result<String> {
    let schedule = SportsSchedule::new(
        ctx.transport.clone(),
        ctx.cache.clone(),
        ctx.config.cache.schedule_ttl(),
    );
    let fixtures = schedule
        .fixtures(&args.league)
        .await
        .map_err(|err| anyhow!(err.user_message()))?;
    if fixtures.is_empty() {
        return Ok(format!("No fixtures scheduled for {}.\n", args.league));
    }
    let mut out = String::new();
    for fixture in fixtures {
        let _ = write!(
            &mut out,
            "{}  {} - {}",
            fixture.kickoff, fixture.home_team, fixture.away_team
        );
        if let Some(venue) = fixture.venue {
            let _ = write!(&mut out, "  @ {venue}");
        }
        out.push('\n');
    }
    Ok(out)
}

pub fn handle_cache_command(ctx: &CommandContext, args: CacheArgs) -> Result<String> {
    let store = ctx.cache.store();
    match args.command {
        CacheCommand::List { prefix } => {
            let keys = store.keys(&prefix).context("listing cache keys")?;
            if keys.is_empty() {
                return Ok("Cache is empty.\n".to_string());
            }
            let mut out = String::new();
            for key in keys {
                let Some(entry) = store.get(&key).context("reading cache entry")? else {
                    continue;
                };
                let _ = writeln!(
                    &mut out,
                    "{key:<32} {}  {} bytes",
                    format_timestamp(entry.written_at),
                    entry.value.len()
                );
            }
            Ok(out)
        }
        CacheCommand::Clear { prefix: Some(prefix) } => {
            let removed = ctx
                .cache
                .invalidate_prefix(&prefix)
                .with_context(|| format!("clearing cache prefix '{prefix}'"))?;
            Ok(format!("Removed {removed} entr{}\n", plural_y(removed)))
        }
        CacheCommand::Clear { prefix: None } => {
            let mut removed = 0;
            for key in store.keys("").context("listing cache keys")? {
                if key.starts_with(keys::SESSION_PREFIX) {
                    continue;
                }
                if ctx.cache.invalidate(&key)? {
                    removed += 1;
                }
            }
            Ok(format!("Removed {removed} entr{}\n", plural_y(removed)))
        }
    }
}

pub async fn handle_auth_command(ctx: &CommandContext, args: AuthArgs) -> Result<String> {
    match args.command {
        AuthCommand::SetToken { token } => {
            let token = body_or_stdin(token)?;
            ctx.session.store_token(&token).context("storing token")?;
            Ok("Token stored.\n".to_string())
        }
        AuthCommand::Status => {
            if ctx.session.token().is_none() {
                return Ok("Not signed in.\n".to_string());
            }
            match ctx.session.refresh_profile(ctx.transport.as_ref()).await {
                Ok(profile) => Ok(format!(
                    "Signed in as {} ({})\n",
                    profile.full_name,
                    profile.role.as_deref().unwrap_or("member")
                )),
                Err(err) => {
                    tracing::warn!(error = %err, "profile refresh failed");
                    let cached = ctx
                        .session
                        .profile()
                        .map(|profile| format!(" (last seen as {})", profile.full_name))
                        .unwrap_or_default();
                    Ok(format!("Token stored but not accepted: {}{cached}\n", err.user_message()))
                }
            }
        }
        AuthCommand::Logout => {
            let removed = ctx.session.sign_out().context("clearing session")?;
            Ok(if removed == 0 {
                "Not signed in.\n".to_string()
            } else {
                "Signed out.\n".to_string()
            })
        }
    }
}

fn format_page(controller: &RawListController) -> String {
    let mut out = String::new();
    for row in controller.items() {
        let _ = writeln!(&mut out, "#{}  {}", row_id(row), row_label(row));
    }
    if let Some(result) = controller.result() {
        let _ = writeln!(
            &mut out,
            "Page {}/{} · {} item{}",
            controller.query().page(),
            result.total_pages.max(1),
            result.total_count,
            if result.total_count == 1 { "" } else { "s" }
        );
    }
    let controls = format_controls(&controller.controls());
    if !controls.is_empty() {
        let _ = writeln!(&mut out, "{controls}");
    }
    if let Some(message) = controller.status().visible() {
        let _ = writeln!(&mut out, "[{}] {}", message.kind, message.text);
    }
    out
}

fn format_controls(controls: &[ControlState]) -> String {
    controls
        .iter()
        .filter(|state| state.enabled || state.current)
        .map(|state| match state.control {
            PageControl::Prev => "<".to_string(),
            PageControl::Next => ">".to_string(),
            PageControl::Page(page) if state.current => format!("[{page}]"),
            PageControl::Page(page) => page.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

async fn format_comments(ctx: &CommandContext, comments: &[Comment]) -> String {
    if comments.is_empty() {
        return "No comments yet.\n".to_string();
    }
    let users = ctx.users();
    let mut out = String::new();
    for comment in comments {
        let author = match &comment.user_id {
            Some(id) => users.display_name(id).await.unwrap_or_else(|err| {
                tracing::debug!(user_id = %id, error = %err, "author lookup failed");
                id.clone()
            }),
            None => "anonymous".to_string(),
        };
        let _ = writeln!(&mut out, "#{}  {author}", comment.id);
        let _ = writeln!(&mut out, "    {}", comment.content.replace('\n', " "));
    }
    out
}

fn row_id(row: &Value) -> String {
    match row.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => "-".to_string(),
    }
}

fn row_label(row: &Value) -> String {
    ["title", "name", "fullName", "username", "content"]
        .iter()
        .find_map(|field| row.get(*field).and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| row.to_string())
}

fn parse_date(raw: &str) -> Result<Date> {
    match FilterValue::parse(raw).map_err(|err| anyhow!(err.user_message()))? {
        FilterValue::Date(date) => Ok(date),
        _ => bail!("'{raw}' is not a date (expected YYYY-MM-DD)"),
    }
}

fn body_or_stdin(inline: Option<String>) -> Result<String> {
    if let Some(body) = inline {
        return Ok(body);
    }
    read_stdin()?.ok_or_else(|| anyhow!("no text given; pass it inline or pipe it on stdin"))
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

fn plural_y(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}

fn format_timestamp(epoch: i64) -> String {
    OffsetDateTime::from_unix_timestamp(epoch)
        .map(|dt| dt.format(&Rfc3339).unwrap_or_else(|_| epoch.to_string()))
        .unwrap_or_else(|_| epoch.to_string())
}
