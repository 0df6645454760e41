//! Replay a scripted chat against an in-memory engine.
//!
//! A script names the group, its admins and members, opening balances, and a
//! list of steps. Each step is an action by a user, a clock advance, or a
//! scheduler sweep. Actions may refer to the most recently opened two-player
//! session as `"$session"` and to the most recent truth-or-dare as `"$tod"`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use parlor_core::{Chat, GroupId, SessionId, UserId};
use parlor_engine::{
    Action, Engine, EngineBuilder, GroupSettings, ManualClock, RecordingMessenger, Reply,
    Resolution, Scheduler, Sent, Session,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

/// Flags for `parlor replay`.
pub struct ReplayOptions {
    /// RNG seed; overrides the config file's seed.
    pub seed: Option<u64>,
    /// Engine config file.
    pub config: Option<PathBuf>,
    /// Group settings file.
    pub settings: Option<PathBuf>,
    /// Stop at the first rejected action.
    pub strict: bool,
}

const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Script {
    group: GroupId,
    #[serde(default)]
    start: Option<DateTime<Utc>>,
    #[serde(default)]
    admins: Vec<UserId>,
    #[serde(default)]
    names: BTreeMap<UserId, String>,
    #[serde(default)]
    balances: BTreeMap<UserId, i64>,
    #[serde(default)]
    settings: Option<GroupSettings>,
    steps: Vec<ScriptStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", tag = "step")]
enum ScriptStep {
    Act { user: UserId, action: Value },
    Advance { secs: u32 },
    Sweep,
}

/// The last sessions opened, for `$session` / `$tod` placeholders.
#[derive(Default)]
struct Cursor {
    session: Option<SessionId>,
    tod: Option<SessionId>,
}

impl Cursor {
    fn resolve(&self, mut action: Value) -> Result<Action, String> {
        if let Some(field) = action.get_mut("session") {
            let id = match field.as_str() {
                Some("$session") => Some(self.session.ok_or("no session has been opened yet")?),
                Some("$tod") => Some(self.tod.ok_or("no truth or dare has been opened yet")?),
                _ => None,
            };
            if let Some(id) = id {
                *field = serde_json::to_value(id).map_err(|e| e.to_string())?;
            }
        }
        serde_json::from_value(action).map_err(|e| format!("invalid action: {e}"))
    }

    fn observe(&mut self, reply: &Reply) {
        match reply {
            Reply::Opened { session } => self.session = Some(*session),
            Reply::Tod {
                session,
                open: true,
            } => self.tod = Some(*session),
            _ => {}
        }
    }
}

/// Run the script at `path` and print the transcript.
pub fn run(path: &Path, options: &ReplayOptions) -> Result<(), String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let script: Script =
        serde_json::from_str(&text).map_err(|e| format!("{}: {e}", path.display()))?;

    let mut config = super::load_config(options.config.as_deref())?;
    let seed = options.seed.or(config.seed).unwrap_or(DEFAULT_SEED);
    config = config.with_seed(seed);
    let mut settings = super::load_settings(options.settings.as_deref())?;
    if let Some(group) = script.settings.clone() {
        settings = settings.with_group(script.group, group);
    }

    let mut messenger = RecordingMessenger::new().with_admins(script.group, script.admins.clone());
    for (user, name) in &script.names {
        messenger = messenger.with_name(*user, name.clone());
    }
    let messenger = Arc::new(messenger);
    let clock = Arc::new(ManualClock::new(script.start.unwrap_or_default()));
    let engine = EngineBuilder::new(messenger.clone())
        .with_config(config)
        .with_settings(settings)
        .with_clock(clock.clone())
        .build()
        .map_err(|e| e.to_string())?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("cannot start runtime: {e}"))?;
    info!(script = %path.display(), seed, steps = script.steps.len(), "starting replay");
    runtime.block_on(Replay {
        script,
        engine,
        messenger,
        clock,
        strict: options.strict,
    }
    .run(seed))
}

struct Replay {
    script: Script,
    engine: Engine,
    messenger: Arc<RecordingMessenger>,
    clock: Arc<ManualClock>,
    strict: bool,
}

impl Replay {
    async fn run(self, seed: u64) -> Result<(), String> {
        let group = self.script.group;
        for (user, amount) in &self.script.balances {
            self.engine
                .apply_delta(group, *user, *amount)
                .await
                .map_err(|e| e.to_string())?;
        }
        self.messenger.clear().await;

        println!(
            "  {} group {group} {}",
            "Replay".bold(),
            format!("({} steps, seed={seed})", self.script.steps.len()).dimmed()
        );
        println!();

        let scheduler = Scheduler::new(self.engine.clone());
        let mut cursor = Cursor::default();
        let mut seen = 0;
        let mut rejected = 0;

        for (n, step) in self.script.steps.iter().enumerate() {
            let label = format!("#{:<3}", n + 1).dimmed();
            match step {
                ScriptStep::Act { user, action } => {
                    let kind = action
                        .get("action")
                        .and_then(Value::as_str)
                        .unwrap_or("?")
                        .to_string();
                    let action = cursor.resolve(action.clone())?;
                    println!("  {label} {} {}", self.name(*user).bold(), kind.cyan());
                    match self.engine.handle(*user, group, action).await {
                        Ok(reply) => {
                            cursor.observe(&reply);
                            println!("       {} {}", "→".green(), self.describe(&reply));
                        }
                        Err(e) => {
                            rejected += 1;
                            println!("       {} {e}", "✗".red());
                            if self.strict {
                                return Err(format!("step {} rejected: {e}", n + 1));
                            }
                        }
                    }
                }
                ScriptStep::Advance { secs } => {
                    self.clock.advance(TimeDelta::seconds(i64::from(*secs)));
                    println!("  {label} {}", format!("clock +{secs}s").yellow());
                }
                ScriptStep::Sweep => {
                    let report = scheduler.sweep().await;
                    println!(
                        "  {label} {} {}",
                        "sweep".yellow(),
                        format!(
                            "(expired {}, warned {}, timed out {}, skipped {})",
                            report.expired, report.warned, report.timed_out, report.skipped
                        )
                        .dimmed()
                    );
                }
            }

            let sent = self.messenger.sent().await;
            for call in &sent[seen..] {
                println!("{}", self.render(call));
            }
            seen = sent.len();
        }

        println!();
        self.print_sessions().await;
        self.print_balances().await;
        println!(
            "  {} actions rejected",
            if rejected == 0 {
                "0".green()
            } else {
                rejected.to_string().red()
            }
        );
        Ok(())
    }

    fn name(&self, user: UserId) -> String {
        self.script
            .names
            .get(&user)
            .cloned()
            .unwrap_or_else(|| format!("user {user}"))
    }

    fn describe(&self, reply: &Reply) -> String {
        match reply {
            Reply::Opened { session } => format!("opened session {session}"),
            Reply::Updated { session, status } => format!("session {session} is {status}"),
            Reply::Tod { session, open } => {
                let state = if *open { "open" } else { "closed" };
                format!("truth or dare {session} {state}")
            }
            Reply::ProofAccepted { reward } => format!("proof accepted, +{reward} points"),
            Reply::Balance { user, balance } => format!("{} has {balance} points", self.name(*user)),
            Reply::Leaderboard { rows } => rows
                .iter()
                .enumerate()
                .map(|(i, (user, balance))| format!("{}. {} ({balance})", i + 1, self.name(*user)))
                .collect::<Vec<_>>()
                .join(", "),
            Reply::Spun { outcome, remaining } => {
                format!("{outcome} ({remaining} spins left today)")
            }
            Reply::Purged { count } => format!("purged {count} completed sessions"),
            Reply::Audit { entries } => format!("{} media stakes on record", entries.len()),
            Reply::Ignored => "ignored".to_string(),
        }
    }

    fn chat(&self, chat: Chat) -> String {
        match chat {
            Chat::Group(_) => "[group]".to_string(),
            Chat::Private(user) => format!("[to {}]", self.name(user)),
        }
    }

    fn render(&self, call: &Sent) -> String {
        let line = match call {
            Sent::Message {
                message,
                text,
                buttons,
            } => {
                let mut out = format!("{} {}", self.chat(message.chat).blue(), indent(text));
                if !buttons.is_empty() {
                    let labels: Vec<String> = buttons.iter().map(|b| format!("[{b}]")).collect();
                    out.push_str(&format!("\n{}", labels.join(" ").dimmed()));
                }
                out
            }
            Sent::Edit { message, text } => {
                format!("{} {}", format!("[edit {}]", message.message_id).blue(), indent(text))
            }
            Sent::Delete { message } => format!("[delete {}]", message.message_id)
                .dimmed()
                .to_string(),
            Sent::Media {
                message,
                kind,
                reference,
                caption,
            } => format!(
                "{} <{kind} {reference}> {caption}",
                self.chat(message.chat).blue()
            ),
            Sent::Restrict { user, until, .. } => format!(
                "{} {} until {}",
                "[mute]".red(),
                self.name(*user),
                until.format("%Y-%m-%d %H:%M UTC")
            ),
        };
        format!("       {line}")
    }

    async fn print_sessions(&self) {
        let sessions = self.engine.sessions().await;
        if sessions.is_empty() {
            return;
        }
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Session", "Players", "Game", "Status", "Outcome"]);
        for session in &sessions {
            table.add_row(vec![
                session.id.to_string(),
                format!(
                    "{} vs {}",
                    self.name(session.challenger),
                    self.name(session.opponent)
                ),
                session
                    .game
                    .map_or_else(|| "—".to_string(), |g| g.to_string()),
                session.status.to_string(),
                self.outcome(session),
            ]);
        }
        println!("{table}");
        println!();
    }

    fn outcome(&self, session: &Session) -> String {
        match &session.resolution {
            None => "—".to_string(),
            Some(Resolution::Won { winner, .. }) => format!("{} won", self.name(*winner)),
            Some(Resolution::Draw) => "draw".to_string(),
            Some(Resolution::Refused { by }) => format!("refused by {}", self.name(*by)),
            Some(Resolution::Cancelled { reason, forfeit }) => {
                let tail = if *forfeit { ", stakes forfeited" } else { "" };
                format!("cancelled: {reason}{tail}")
            }
        }
    }

    async fn print_balances(&self) {
        let balances = self.engine.balances(self.script.group).await;
        if balances.is_empty() {
            println!("  No balances.");
            return;
        }
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["User", "Name", "Balance"]);
        for (user, balance) in &balances {
            table.add_row(vec![user.to_string(), self.name(*user), balance.to_string()]);
        }
        println!("{table}");
        println!();
    }
}

/// Indent continuation lines to line up under the chat label.
fn indent(text: &str) -> String {
    text.replace('\n', "\n         ")
}
