use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::Editor;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

use flowdeck_application::{ConversationService, FlowController, NotificationLevel};
use flowdeck_core::app_state::StateRepository;
use flowdeck_core::conversation::ConversationRepository;
use flowdeck_core::flow::InteractionMode;
use flowdeck_core::FlowdeckConfig;
use flowdeck_gateway::HttpFlowGateway;
use flowdeck_infrastructure::{JsonConversationRepository, JsonStateRepository};

const COMMANDS: &[&str] = &[
    "/start", "/status", "/approve", "/improve", "/resume", "/cancel", "/mode", "/chat",
    "/sessions", "/new", "/switch", "/delete", "/help", "/quit",
];

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

fn load_config() -> FlowdeckConfig {
    let mut config = dirs::home_dir()
        .map(|home| home.join(".flowdeck").join("config.toml"))
        .filter(|path| path.exists())
        .and_then(|path| std::fs::read_to_string(path).ok())
        .and_then(|content| FlowdeckConfig::from_toml_str(&content).ok())
        .unwrap_or_default();

    if let Ok(base_url) = std::env::var("FLOWDECK_BASE_URL") {
        config.base_url = base_url;
    }
    config
}

fn print_help() {
    println!("{}", "Flow supervision:".bold());
    println!("  /start <prompt>   start a new flow");
    println!("  /status           show lifecycle, phase and blackboard summary");
    println!("  /approve          approve the open review checkpoint");
    println!("  /improve <text>   send improvement notes for the review checkpoint");
    println!("  /resume <text>    resume a free-form checkpoint");
    println!("  /cancel           request cancellation of the running flow");
    println!("  /mode <automated|assisted>  switch interaction mode");
    println!("{}", "Conversations:".bold());
    println!("  /chat <text>      ask a question in the current session");
    println!("  /sessions         list sessions");
    println!("  /new              create a session");
    println!("  /switch <id>      switch to a session");
    println!("  /delete <id>      delete a session");
    println!("  /quit             exit");
}

fn print_status(controller: &Arc<FlowController<HttpFlowGateway>>) {
    let snapshot = controller.snapshot();
    println!(
        "{} {}  {} {}",
        "lifecycle:".bold(),
        snapshot.lifecycle,
        "mode:".bold(),
        snapshot.interaction_mode
    );
    let board = &snapshot.blackboard;
    println!(
        "{} {} (iteration {})",
        "phase:".bold(),
        board.phase,
        board.iterations
    );
    if !snapshot.status_message.is_empty() {
        println!("{} {}", "status:".bold(), snapshot.status_message);
    }
    if let Some(checkpoint) = &snapshot.checkpoint {
        println!(
            "{} {} ({:?})",
            "waiting on:".bold().yellow(),
            checkpoint.step_name,
            checkpoint.kind
        );
    }
    println!(
        "{} {} records, {} manifests, {} images, {} issues",
        "blackboard:".bold(),
        board.records.len(),
        board.manifests.len(),
        board.images.len(),
        board.issues.len()
    );
    for issue in board.issues_by_severity() {
        println!("  [{:?}] {}", issue.severity, issue.issue);
    }
}

async fn handle_command(
    line: &str,
    controller: &Arc<FlowController<HttpFlowGateway>>,
    conversations: &Arc<ConversationService<HttpFlowGateway>>,
) -> bool {
    let (command, rest) = match line.split_once(' ') {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    let outcome = match command {
        "/quit" | "/exit" => return false,
        "/help" => {
            print_help();
            Ok(())
        }
        "/start" => controller.start(rest).await,
        "/status" => {
            print_status(controller);
            Ok(())
        }
        "/approve" => controller.approve().await,
        "/improve" => controller.improve(rest).await,
        "/resume" => controller.resume(rest).await,
        "/cancel" => controller.cancel().await.map(|message| {
            println!("{}", message.dimmed());
        }),
        "/mode" => match rest {
            "automated" => controller.set_interaction_mode(InteractionMode::Automated).await,
            "assisted" => controller.set_interaction_mode(InteractionMode::Assisted).await,
            _ => {
                println!("{}", "usage: /mode <automated|assisted>".yellow());
                Ok(())
            }
        },
        "/chat" => match conversations.send_message(rest).await {
            Ok(answer) => {
                println!("{}", answer.content.green());
                Ok(())
            }
            Err(e) => Err(e),
        },
        "/sessions" => {
            let current = conversations.current_id().await;
            for session in conversations.sessions().await {
                let marker = if current.as_deref() == Some(session.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{} {}  {}", marker, session.id, session.title);
            }
            Ok(())
        }
        "/new" => {
            let session = conversations.create_session().await;
            println!("{} {}", "created".dimmed(), session.id);
            Ok(())
        }
        "/switch" => conversations.switch_to(rest).await,
        "/delete" => conversations.delete(rest).await,
        _ => {
            println!("{}", "unknown command, try /help".yellow());
            Ok(())
        }
    };

    if let Err(e) = outcome {
        eprintln!("{}", e.to_string().red());
    }
    true
}

/// REPL driving the flow controller and the conversation service.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config();
    let gateway = Arc::new(HttpFlowGateway::from_config(&config));
    let state_repository: Arc<dyn StateRepository> = Arc::new(JsonStateRepository::default_location()?);
    let conversation_repository: Arc<dyn ConversationRepository> =
        Arc::new(JsonConversationRepository::default_location()?);

    let controller = Arc::new(FlowController::new(
        gateway.clone(),
        state_repository,
        config.clone(),
    ));
    controller.restore_interaction_mode().await;
    let conversations = Arc::new(ConversationService::new(gateway, conversation_repository));
    conversations.load().await;

    // Surface controller notifications while the prompt is open.
    let mut notifications = controller.notifications();
    tokio::spawn(async move {
        loop {
            match notifications.recv().await {
                Ok(notification) => match notification.level {
                    NotificationLevel::Info => println!("{}", notification.message.dimmed()),
                    NotificationLevel::Warning => println!("{}", notification.message.yellow()),
                    NotificationLevel::Error => println!("{}", notification.message.red()),
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    println!(
        "{} supervising {}",
        "flowdeck".bold().bright_cyan(),
        config.base_url
    );
    println!("{}", "type /help for commands".dimmed());

    let mut editor: Editor<CliHelper, DefaultHistory> = Editor::new()?;
    editor.set_helper(Some(CliHelper::new()));

    loop {
        match editor.readline("flowdeck> ") {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                if !handle_command(&line, &controller, &conversations).await {
                    break;
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted)
            | Err(rustyline::error::ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}", format!("readline error: {e}").red());
                break;
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}
