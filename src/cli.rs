use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::config::Config;
use crate::interpreter::risk::classify;
use crate::interpreter::{CommandOutcome, DebugCommand, ExecutionState};
use crate::program::validator::validate_program;
use crate::program::Program;
use crate::sessions::{BreakpointAction, SessionManager};
use crate::types::{Analysis, ExecutionStatus, RiskLevel, SessionOptions, DEFAULT_TIMEOUT_MS};

#[derive(Parser)]
#[command(name = "runbook")]
#[command(about = "Runbook - step through operational programs like a debugger", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a program to completion (or the first breakpoint or error)
    Run {
        /// Program JSON file
        program: PathBuf,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Step through a program interactively
    Debug {
        /// Program JSON file
        program: PathBuf,

        #[command(flatten)]
        session: SessionArgs,
    },

    /// Check a program for structural problems
    Validate {
        /// Program JSON file
        program: PathBuf,
    },

    /// Print the risk level of a shell command
    Classify {
        /// Command text
        command: String,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Analysis JSON file (intent, risk summary)
    #[arg(long)]
    pub analysis: Option<PathBuf>,

    /// low refuses high-risk commands
    #[arg(long, default_value = "medium")]
    pub risk_level: RiskLevel,

    /// Per-command timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Cap on the output of a single command, in bytes
    #[arg(long)]
    pub memory_limit: Option<usize>,

    /// Step ids to break after (repeatable)
    #[arg(long = "break", value_name = "STEP_ID")]
    pub breakpoints: Vec<String>,

    /// Do not log resolved commands
    #[arg(long)]
    pub quiet: bool,
}

impl SessionArgs {
    fn options(&self) -> SessionOptions {
        let defaults = SessionOptions::default();
        SessionOptions {
            debug_mode: !self.quiet,
            timeout_ms: self.timeout_ms,
            memory_limit_bytes: self.memory_limit.unwrap_or(defaults.memory_limit_bytes),
            auto_continue: false,
            risk_level: self.risk_level,
        }
    }
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    run(cli, config).await
}

/// Load configuration the way every subcommand sees it
pub fn load_config(cli: &Cli) -> Result<Config> {
    Config::builder().config_path(cli.config.clone()).build()
}

/// Execute a parsed command line against an already loaded configuration
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Run { program, session } => {
            let manager = SessionManager::new(&config);
            let session_id = open_session(&manager, &program, &session).await?;

            let outcome = manager
                .execute_step(&session_id, DebugCommand::Continue)
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome.state)?);

            if outcome.state.status == ExecutionStatus::Error {
                std::process::exit(1);
            }
        }

        Commands::Debug { program, session } => {
            let manager = SessionManager::new(&config);
            let session_id = open_session(&manager, &program, &session).await?;
            debug_repl(&manager, &session_id).await?;
            manager.stop(&session_id).await;
        }

        Commands::Validate { program } => {
            let program = read_program(&program)?;
            let diagnostics = validate_program(&program);

            if diagnostics.is_empty() {
                println!("✓ {} is valid", program.name);
                return Ok(());
            }

            for diagnostic in &diagnostics {
                println!("{}", diagnostic);
            }

            let errors = diagnostics.iter().filter(|d| d.is_error()).count();
            println!(
                "\n{} error(s), {} warning(s)",
                errors,
                diagnostics.len() - errors
            );
            if errors > 0 {
                std::process::exit(1);
            }
        }

        Commands::Classify { command } => {
            println!("{}", classify(&command));
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn read_program(path: &Path) -> Result<Program> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read program {}", path.display()))?;
    Ok(Program::from_json(&text)?)
}

fn read_analysis(path: &Path) -> Result<Analysis> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read analysis {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Malformed analysis {}", path.display()))
}

async fn open_session(
    manager: &SessionManager,
    program_path: &Path,
    args: &SessionArgs,
) -> Result<String> {
    let program = read_program(program_path)?;
    let analysis = args.analysis.as_deref().map(read_analysis).transpose()?;

    let started = manager.start(program, analysis, args.options()).await?;
    for step_id in &args.breakpoints {
        manager
            .manage_breakpoint(&started.session_id, step_id, BreakpointAction::Set)
            .await?;
    }

    Ok(started.session_id)
}

/// One line of debugger input
#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Debug(DebugCommand),
    Break(String),
    Clear(String),
    Risk(RiskLevel),
    State,
    Help,
    Quit,
}

const REPL_HELP: &str = "\
commands:
  step | s          execute the current step
  into | i          same as step
  out | o           run until the current procedure is left
  continue | c      run until completion, an error or a breakpoint
  pause             pause a running session
  reset             start over
  break <step>      break after <step>
  clear <step>      remove a breakpoint
  eval <expr>       $var, !command or a template
  inspect <var>     show a variable with its type and source
  risk <level>      change the risk level (low, medium, high)
  state             print the full execution state
  quit | q          leave the debugger";

pub fn parse_repl_line(line: &str) -> Result<Option<ReplCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let argument = |what: &str| -> Result<String> {
        if rest.is_empty() {
            bail!("'{}' needs {}", word, what);
        }
        Ok(rest.to_string())
    };

    let command = match word {
        "step" | "s" | "next" | "n" => ReplCommand::Debug(DebugCommand::StepOver),
        "into" | "i" => ReplCommand::Debug(DebugCommand::StepInto),
        "out" | "o" => ReplCommand::Debug(DebugCommand::StepOut),
        "continue" | "c" => ReplCommand::Debug(DebugCommand::Continue),
        "pause" => ReplCommand::Debug(DebugCommand::Pause),
        "reset" => ReplCommand::Debug(DebugCommand::Reset),
        "eval" | "e" | "p" => ReplCommand::Debug(DebugCommand::Evaluate {
            expression: argument("an expression")?,
        }),
        "inspect" => ReplCommand::Debug(DebugCommand::Inspect {
            variable: argument("a variable name")?,
        }),
        "break" | "b" => ReplCommand::Break(argument("a step id")?),
        "clear" => ReplCommand::Clear(argument("a step id")?),
        "risk" => ReplCommand::Risk(argument("a risk level")?.parse()?),
        "state" => ReplCommand::State,
        "help" | "h" | "?" => ReplCommand::Help,
        "quit" | "q" | "exit" => ReplCommand::Quit,
        other => bail!("Unknown command: {} (try 'help')", other),
    };

    Ok(Some(command))
}

async fn debug_repl(manager: &SessionManager, session_id: &str) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("{}", describe_position(&manager.get_state(session_id).await?));

    loop {
        stdout.write_all(b"(runbook) ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match parse_repl_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        if command == ReplCommand::Quit {
            break;
        }
        if let Err(e) = apply_repl_command(manager, session_id, command).await {
            eprintln!("{}", e);
        }
    }

    Ok(())
}

async fn apply_repl_command(
    manager: &SessionManager,
    session_id: &str,
    command: ReplCommand,
) -> Result<()> {
    match command {
        ReplCommand::Quit => {}
        ReplCommand::Help => println!("{}", REPL_HELP),
        ReplCommand::State => {
            let state = manager.get_state(session_id).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        ReplCommand::Break(step_id) => {
            let breakpoints = manager
                .manage_breakpoint(session_id, &step_id, BreakpointAction::Set)
                .await?;
            print_breakpoints(&breakpoints);
        }
        ReplCommand::Clear(step_id) => {
            let breakpoints = manager
                .manage_breakpoint(session_id, &step_id, BreakpointAction::Remove)
                .await?;
            print_breakpoints(&breakpoints);
        }
        ReplCommand::Risk(level) => {
            let state = manager.set_risk_level(session_id, level).await?;
            println!("risk level: {}", level);
            println!("{}", describe_position(&state));
        }
        ReplCommand::Debug(command) => {
            let outcome = manager.execute_step(session_id, command).await?;
            print_outcome(&outcome)?;
        }
    }
    Ok(())
}

fn print_breakpoints(breakpoints: &BTreeSet<String>) {
    let list: Vec<&str> = breakpoints.iter().map(String::as_str).collect();
    println!("breakpoints: [{}]", list.join(", "));
}

fn print_outcome(outcome: &CommandOutcome) -> Result<()> {
    if let Some(result) = &outcome.step_result {
        let mark = if result.success { "✓" } else { "✗" };
        println!("{} {} [{}]", mark, result.step_id, result.step_type);
        if !result.output.is_null() {
            println!("  {}", serde_json::to_string(&result.output)?);
        }
        if let Some(error) = &result.error {
            println!("  error: {}", error);
        }
    }
    if let Some(evaluation) = &outcome.evaluation {
        println!("{}", serde_json::to_string_pretty(evaluation)?);
    }
    if let Some(inspection) = &outcome.inspection {
        println!("{}", serde_json::to_string_pretty(inspection)?);
    }
    if outcome.steps_run > 1 {
        println!("({} steps)", outcome.steps_run);
    }
    println!("{}", describe_position(&outcome.state));
    Ok(())
}

fn describe_position(state: &ExecutionState) -> String {
    let status = state.status;
    match (&state.current_step, &state.error_state) {
        (_, Some(error)) if state.status == ExecutionStatus::Error => {
            format!("[{}] at {}: {}", status, error.step_id, error.error)
        }
        (Some(cursor), _) => format!(
            "[{}] next: {}/{} (#{})",
            status, cursor.procedure_id, cursor.step_id, cursor.instruction_pointer
        ),
        (None, _) => format!("[{}] {} step(s) executed", status, state.steps_executed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stepping_commands() {
        assert_eq!(
            parse_repl_line("  s ").unwrap(),
            Some(ReplCommand::Debug(DebugCommand::StepOver))
        );
        assert_eq!(
            parse_repl_line("continue").unwrap(),
            Some(ReplCommand::Debug(DebugCommand::Continue))
        );
        assert_eq!(parse_repl_line("").unwrap(), None);
    }

    #[test]
    fn test_parse_commands_with_arguments() {
        assert_eq!(
            parse_repl_line("eval !echo $host now").unwrap(),
            Some(ReplCommand::Debug(DebugCommand::Evaluate {
                expression: "!echo $host now".to_string()
            }))
        );
        assert_eq!(
            parse_repl_line("break s2").unwrap(),
            Some(ReplCommand::Break("s2".to_string()))
        );
        assert_eq!(
            parse_repl_line("risk LOW").unwrap(),
            Some(ReplCommand::Risk(RiskLevel::Low))
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_repl_line("inspect").is_err());
        assert!(parse_repl_line("risk extreme").is_err());
        assert!(parse_repl_line("frobnicate").is_err());
    }

    #[test]
    fn test_cli_parses_session_flags() {
        let cli = Cli::parse_from([
            "runbook",
            "run",
            "deploy.json",
            "--risk-level",
            "low",
            "--break",
            "s1",
            "--break",
            "s3",
        ]);
        match cli.command {
            Commands::Run { program, session } => {
                assert_eq!(program, PathBuf::from("deploy.json"));
                assert_eq!(session.risk_level, RiskLevel::Low);
                assert_eq!(session.breakpoints, vec!["s1", "s3"]);
                assert_eq!(session.options().timeout_ms, DEFAULT_TIMEOUT_MS);
            }
            _ => panic!("expected run"),
        }
    }
}
