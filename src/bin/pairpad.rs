use anyhow::{Context, Result};
use pairpad::api::{ApiClient, BalanceProbe, NoBalance};
use pairpad::config::Config;
use pairpad::console::{ConsoleManager, TurnUpdate};
use pairpad::preview::{DataUrlHandles, Generations, PreviewFrame, PreviewScheduler};
use pairpad::state::{
    Framework, JsonFileStore, Session, SessionRepository, ToolCall, ToolOp, ToolStatus,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const HELP: &str = "\
commands:
  /new [react|angular] [--scaffold]   start a project
  /list                               list projects
  /open <n>                           switch to project n
  /delete <n>                         delete project n
  /rename <title>                     retitle the open project
  /files                              list files of the open project
  /show <path>                        print a file
  /help                               this text
  /quit                               exit
anything else is sent to the model; Ctrl-C stops a running reply or exits";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    New {
        framework: Option<Framework>,
        scaffold: bool,
    },
    List,
    Open(usize),
    Delete(usize),
    Rename(String),
    Files,
    Show(String),
    Help,
    Quit,
    Send(String),
    Invalid(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Send(line.to_string()));
    };

    let (name, args) = rest
        .split_once(char::is_whitespace)
        .map(|(name, args)| (name, args.trim()))
        .unwrap_or((rest, ""));
    let index = |args: &str| args.parse::<usize>().ok().filter(|n| *n > 0);

    let command = match name {
        "new" => {
            let mut framework = None;
            let mut scaffold = false;
            for arg in args.split_whitespace() {
                if arg == "--scaffold" {
                    scaffold = true;
                } else if let Some(parsed) = Framework::parse(arg) {
                    framework = Some(parsed);
                } else {
                    return Some(Command::Invalid(format!("unknown option '{arg}'")));
                }
            }
            Command::New {
                framework,
                scaffold,
            }
        }
        "list" => Command::List,
        "open" => match index(args) {
            Some(n) => Command::Open(n),
            None => Command::Invalid("usage: /open <n>".to_string()),
        },
        "delete" => match index(args) {
            Some(n) => Command::Delete(n),
            None => Command::Invalid("usage: /delete <n>".to_string()),
        },
        "rename" if !args.is_empty() => Command::Rename(args.to_string()),
        "rename" => Command::Invalid("usage: /rename <title>".to_string()),
        "files" => Command::Files,
        "show" if !args.is_empty() => Command::Show(args.to_string()),
        "show" => Command::Invalid("usage: /show <path>".to_string()),
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => Command::Invalid(format!("unknown command '/{other}'")),
    };
    Some(command)
}

fn init_tracing() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_env("PAIRPAD_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match std::env::var("PAIRPAD_LOG_PATH") {
        Ok(path) if !path.trim().is_empty() => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open log file {path}"))?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
        }
        _ => builder.with_writer(std::io::stderr).try_init(),
    };
    result.map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))
}

async fn write_frames(mut frames: watch::Receiver<Option<PreviewFrame>>, dir: PathBuf) {
    while frames.changed().await.is_ok() {
        let frame = frames.borrow_and_update().clone();
        let Some(frame) = frame else {
            continue;
        };
        if let Err(error) = write_frame(&dir, &frame).await {
            tracing::warn!(error = %format!("{error:#}"), "failed to write preview");
        }
    }
}

async fn write_frame(dir: &Path, frame: &PreviewFrame) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join("index.html");
    tokio::fs::write(&path, &frame.document)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(generation = frame.generation, path = %path.display(), "preview written");
    Ok(())
}

fn describe_call(call: &ToolCall) -> String {
    let target = match &call.op {
        ToolOp::CreateFile { path } | ToolOp::UpdateFile { path } | ToolOp::DeleteFile { path } => {
            path.clone()
        }
        ToolOp::RenameFile { old_path, new_path } | ToolOp::RenameFolder { old_path, new_path } => {
            format!("{old_path} -> {new_path}")
        }
        ToolOp::RenameChat { title } => format!("\"{title}\""),
    };
    let status = match call.status {
        ToolStatus::Pending => "pending",
        ToolStatus::Success => "ok",
        ToolStatus::Error => "error",
    };
    match &call.result {
        Some(note) => format!("  [{status}] {} {target} ({note})", call.op.name()),
        None => format!("  [{status}] {} {target}", call.op.name()),
    }
}

fn print_session_list(repository: &SessionRepository, open: Option<Uuid>) {
    let sessions = repository.list();
    if sessions.is_empty() {
        println!("no projects yet; /new starts one");
        return;
    }
    for (index, session) in sessions.iter().enumerate() {
        let marker = if Some(session.id) == open { "*" } else { " " };
        println!(
            "{marker}{:>3}. {} [{}] {} files, {} tokens, ${:.4}",
            index + 1,
            session.title,
            session.framework.label(),
            session.files.iter().filter(|f| f.is_file()).count(),
            session.total_tokens,
            session.total_cost
        );
    }
}

fn nth_session(repository: &SessionRepository, n: usize) -> Option<Uuid> {
    repository.list().get(n - 1).map(|session| session.id)
}

/// Token of the turn in flight, shared with the Ctrl-C listener.
#[derive(Clone, Default)]
struct TurnSlot {
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl TurnSlot {
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut active) = self.active.lock() {
            *active = Some(token.clone());
        }
        token
    }

    fn end(&self) {
        if let Ok(mut active) = self.active.lock() {
            *active = None;
        }
    }

    /// Cancels the running turn. Returns `false` when no turn is running.
    fn interrupt(&self) -> bool {
        let active = self.active.lock().ok().and_then(|active| active.clone());
        match active {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// Installed once per process. Interrupts with no turn running are sent to
/// the prompt loop, which exits.
fn spawn_interrupt_listener(slot: TurnSlot) -> mpsc::UnboundedReceiver<()> {
    let (quit_tx, quit_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !slot.interrupt() && quit_tx.send(()).is_err() {
                break;
            }
        }
    });
    quit_rx
}

struct Console {
    manager: ConsoleManager,
    preview: PreviewScheduler,
    default_framework: Framework,
    open: Option<Uuid>,
    turn: TurnSlot,
}

impl Console {
    fn open_session(&self) -> Option<&Session> {
        self.open.and_then(|id| self.manager.repository().get(id))
    }

    fn switch_to(&mut self, id: Uuid) {
        self.open = Some(id);
        if let Some(session) = self.manager.repository().get(id) {
            println!("opened \"{}\" ({})", session.title, session.framework.label());
            self.preview.schedule(session.files.clone());
        }
    }

    /// Returns `false` when the console should exit.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::New {
                framework,
                scaffold,
            } => {
                let framework = framework.unwrap_or(self.default_framework);
                let id = self.manager.repository_mut().create(framework, scaffold);
                self.switch_to(id);
            }
            Command::List => print_session_list(self.manager.repository(), self.open),
            Command::Open(n) => match nth_session(self.manager.repository(), n) {
                Some(id) => self.switch_to(id),
                None => println!("no project {n}"),
            },
            Command::Delete(n) => match nth_session(self.manager.repository(), n) {
                Some(id) => {
                    self.manager.repository_mut().delete(id);
                    if self.open == Some(id) {
                        self.open = None;
                    }
                    println!("deleted project {n}");
                }
                None => println!("no project {n}"),
            },
            Command::Rename(title) => match self.open {
                Some(id) if self.manager.repository_mut().rename(id, &title) => {
                    println!("renamed to \"{}\"", title.trim());
                }
                _ => println!("open a project first"),
            },
            Command::Files => match self.open_session() {
                Some(session) if session.files.is_empty() => println!("(no files)"),
                Some(session) => {
                    for file in &session.files {
                        let suffix = if file.is_file() { "" } else { "/" };
                        println!("  {}{suffix}", file.path);
                    }
                }
                None => println!("open a project first"),
            },
            Command::Show(path) => match self.open_session().and_then(|s| s.file(&path)) {
                Some(file) => println!("{}", file.content),
                None => println!("no file {path}"),
            },
            Command::Help => println!("{HELP}"),
            Command::Quit => return false,
            Command::Invalid(message) => println!("{message}"),
            Command::Send(text) => self.send(text).await,
        }
        true
    }

    async fn send(&mut self, text: String) {
        let id = match self.open {
            Some(id) => id,
            None => {
                let id = self
                    .manager
                    .repository_mut()
                    .create(self.default_framework, false);
                self.switch_to(id);
                id
            }
        };

        let cancel = self.turn.begin();

        let (update_tx, mut update_rx) = mpsc::unbounded_channel();
        let manager = &mut self.manager;
        let preview = &self.preview;
        let turn = async move {
            let update_tx = update_tx;
            manager.run_turn(id, &text, &cancel, Some(&update_tx)).await
        };
        let render = async {
            let mut stdout = std::io::stdout();
            while let Some(update) = update_rx.recv().await {
                match update {
                    TurnUpdate::Text(delta) => {
                        let _ = write!(stdout, "{delta}");
                        let _ = stdout.flush();
                    }
                    TurnUpdate::TextReset(text) => {
                        let _ = write!(stdout, "\n{text}");
                        let _ = stdout.flush();
                    }
                    TurnUpdate::ToolCalls(_) => {}
                    TurnUpdate::Files(files) => preview.schedule(files),
                    TurnUpdate::Title(title) => tracing::debug!(%title, "project retitled"),
                    TurnUpdate::Usage { tokens, cost } => {
                        let tokens = tokens.map(|t| t.total_tokens.to_string());
                        let cost = cost.map(|c| format!("${c:.4}"));
                        if tokens.is_some() || cost.is_some() {
                            println!(
                                "\n  ({} tokens, {})",
                                tokens.as_deref().unwrap_or("?"),
                                cost.as_deref().unwrap_or("cost unavailable")
                            );
                        }
                    }
                }
            }
        };
        let (result, ()) = tokio::join!(turn, render);
        self.turn.end();
        println!();

        match result {
            Ok(outcome) if outcome.cancelled => println!("(stopped)"),
            Ok(outcome) => {
                let calls = self
                    .open_session()
                    .and_then(|session| session.messages.iter().find(|m| m.id == outcome.message_id))
                    .map(|message| message.tool_calls.clone())
                    .unwrap_or_default();
                for call in &calls {
                    println!("{}", describe_call(call));
                }
            }
            Err(error) => println!("error: {error}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let config = Config::load()?;
    config.validate()?;

    let repository = SessionRepository::open(Box::new(JsonFileStore::new(&config.store_path)))?;
    let client = ApiClient::new(&config)?;
    let balance: Arc<dyn BalanceProbe> = if client.has_credential() {
        Arc::new(client.clone())
    } else {
        Arc::new(NoBalance)
    };

    let preview = PreviewScheduler::spawn(
        Generations::new(DataUrlHandles::new()),
        config.preview_debounce,
    );
    let writer = tokio::spawn(write_frames(preview.subscribe(), config.preview_dir.clone()));

    let open = repository.list().first().map(|session| session.id);
    let mut console = Console {
        manager: ConsoleManager::new(client, balance, repository),
        preview,
        default_framework: config.framework,
        open: None,
        turn: TurnSlot::default(),
    };
    let mut interrupts = spawn_interrupt_listener(console.turn.clone());

    println!("pairpad ({}), model {}", config.framework.label(), config.model);
    println!("preview: {}", config.preview_dir.join("index.html").display());
    println!("{HELP}");
    if let Some(id) = open {
        console.switch_to(id);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = interrupts.recv() => {
                println!();
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        let Some(command) = parse_command(&line) else {
            continue;
        };
        if !console.handle(command).await {
            break;
        }
    }

    let Console { preview, .. } = console;
    preview.shutdown().await;
    writer.abort();
    Ok(())
}
