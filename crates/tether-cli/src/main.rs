// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod controller;
mod input;
mod render;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tether_branch::git::CommandGitClient;
use tether_branch::{BranchExecutor, Stasher};
use tether_common_config::{
	load_config_with_cli, BranchConfig, CliOverrides, LogFormat, LogLevel, ReloadConfig, SessionConfig,
	TetherConfig,
};
use tether_common_protocol::{ClientMessage, Frame, ServerEvent};
use tether_transport::{
	Attachment, PostReady, ReloadChannel, RetryPolicy, SessionAddress, SessionOptions, WsConnector,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::controller::{SessionController, Update};
use crate::input::{parse_input, Input, HELP};
use crate::render::{format_branches, Renderer};

/// Tether - drive a remote coding agent over a resilient session
#[derive(Parser, Debug)]
#[command(name = "tether", version, about, long_about = None)]
struct Args {
	/// Path to custom configuration file
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Log level (overrides config)
	#[arg(short, long)]
	log_level: Option<String>,

	/// Output logs as JSON (overrides config)
	#[arg(long)]
	json_logs: bool,

	/// Session address, including its secret
	#[arg(long, env = "TETHER_SESSION_URL", hide_env_values = true)]
	url: Option<String>,

	/// Bundler live-reload address
	#[arg(long, env = "TETHER_RELOAD_URL")]
	reload_url: Option<String>,

	/// Repository for branch and stash commands
	#[arg(short, long, env = "TETHER_REPO")]
	repo: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Open an interactive session
	Connect {
		/// File to attach to the first prompt (repeatable)
		#[arg(short, long)]
		attach: Vec<PathBuf>,
	},
	/// Branch operations on the local repository
	Branch {
		#[command(subcommand)]
		command: BranchCommand,
	},
	/// Restore stashes left by branch operations
	Stash {
		#[command(subcommand)]
		command: StashCommand,
	},
	/// Print the resolved configuration
	Config,
}

#[derive(Subcommand, Debug)]
enum BranchCommand {
	/// List local and remote branches, most recent first
	List,
	/// Switch branches, carrying uncommitted changes along
	Switch { name: String },
	/// Create a branch and switch to it
	Create {
		name: String,
		/// Start point (defaults to HEAD)
		#[arg(long)]
		base: Option<String>,
	},
	/// Throw away uncommitted changes and untracked files
	Discard,
	/// Answer branch requests read as JSON lines on stdin
	Serve,
}

#[derive(Subcommand, Debug)]
enum StashCommand {
	/// Stash uncommitted changes under a tag
	Push { tag: String },
	/// Restore the stash with this tag
	Pop { tag: String },
	/// Restore the most recent tether stash
	PopLatest,
}

impl From<&Args> for CliOverrides {
	fn from(args: &Args) -> Self {
		Self {
			session_url: args.url.clone(),
			reload_url: args.reload_url.clone(),
			repo: args.repo.clone(),
			log_level: args.log_level.clone(),
			log_format: if args.json_logs {
				Some("json".to_string())
			} else {
				None
			},
			config_file: args.config.clone(),
		}
	}
}

fn log_level_to_tracing(level: LogLevel) -> tracing::Level {
	match level {
		LogLevel::Trace => tracing::Level::TRACE,
		LogLevel::Debug => tracing::Level::DEBUG,
		LogLevel::Info => tracing::Level::INFO,
		LogLevel::Warn => tracing::Level::WARN,
		LogLevel::Error => tracing::Level::ERROR,
	}
}

// Logs go to stderr; stdout belongs to the conversation.
fn init_tracing(logging: &tether_common_config::LoggingConfig) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(format!("tether={}", log_level_to_tracing(logging.level))));

	match logging.format {
		LogFormat::Json => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().json().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Compact => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().compact().with_writer(std::io::stderr))
				.init();
		}
		LogFormat::Pretty => {
			tracing_subscriber::registry()
				.with(filter)
				.with(fmt::layer().with_writer(std::io::stderr))
				.init();
		}
	}
}

fn session_options(session: &SessionConfig) -> Result<SessionOptions> {
	let list_branches = Frame::encode(&ClientMessage::ListBranches).context("failed to encode branch request")?;
	Ok(SessionOptions::default()
		.with_policy(RetryPolicy::Fixed {
			interval: session.retry_interval,
			max_attempts: session.max_attempts,
		})
		.with_post_ready(PostReady {
			settle: session.settle,
			frames: vec![list_branches],
		}))
}

fn reload_channel(reload: &ReloadConfig) -> ReloadChannel {
	ReloadChannel::new(Arc::new(WsConnector::default())).with_policy(RetryPolicy::Exponential {
		base: reload.base_delay,
		factor: reload.backoff_factor,
		ceiling: reload.max_delay,
		jitter: reload.jitter,
		max_attempts: reload.max_attempts,
	})
}

fn executor(branch: &BranchConfig) -> Result<BranchExecutor> {
	let repo = match &branch.repo {
		Some(repo) => repo.clone(),
		None => std::env::current_dir().context("failed to resolve working directory")?,
	};
	Ok(BranchExecutor::new(Arc::new(CommandGitClient::new()), repo).with_stash_prefix(&branch.stash_prefix))
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	let cli_overrides = CliOverrides::from(&args);
	let config = load_config_with_cli(cli_overrides).context("failed to load configuration")?;

	init_tracing(&config.logging);

	match args.command {
		Command::Connect { attach } => run_connect(&config, attach).await,
		Command::Branch { command } => run_branch(&config, command).await,
		Command::Stash { command } => run_stash(&config, command).await,
		Command::Config => {
			println!("{}", serde_json::to_string_pretty(&config)?);
			Ok(())
		}
	}
}

async fn run_branch(config: &TetherConfig, command: BranchCommand) -> Result<()> {
	let executor = executor(&config.branch)?;
	match command {
		BranchCommand::List => {
			print!("{}", format_branches(&executor.list().await?));
		}
		BranchCommand::Switch { name } => match executor.switch(&name).await {
			Ok(()) => println!("switched to {name}"),
			Err(e) if e.is_stash_retained() => {
				println!("switched to {name}");
				eprintln!("warning: {e}");
			}
			Err(e) => return Err(e).with_context(|| format!("failed to switch to {name}")),
		},
		BranchCommand::Create { name, base } => match executor.create(&name, base.as_deref()).await {
			Ok(()) => println!("created {name}"),
			Err(e) if e.is_stash_retained() => {
				println!("created {name}");
				eprintln!("warning: {e}");
			}
			Err(e) => return Err(e).with_context(|| format!("failed to create {name}")),
		},
		BranchCommand::Discard => {
			executor.discard().await.context("failed to discard changes")?;
			println!("changes discarded");
		}
		BranchCommand::Serve => serve_branches(&executor).await?,
	}
	Ok(())
}

/// Reads one request frame per line and writes one response frame per line.
async fn serve_branches(executor: &BranchExecutor) -> Result<()> {
	info!(repo = %executor.repo().display(), "serving branch requests on stdio");
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut stdout = tokio::io::stdout();
	while let Some(line) = lines.next_line().await? {
		if line.trim().is_empty() {
			continue;
		}
		let message = match Frame::parse(&line).and_then(|frame| frame.decode::<ClientMessage>()) {
			Ok(message) => message,
			Err(e) => {
				warn!(error = %e, "ignoring malformed request");
				continue;
			}
		};
		if let Some(event) = executor.handle(&message).await {
			let frame = Frame::encode::<ServerEvent>(&event)?;
			stdout.write_all(frame.to_text().as_bytes()).await?;
			stdout.write_all(b"\n").await?;
			stdout.flush().await?;
		}
	}
	Ok(())
}

async fn run_stash(config: &TetherConfig, command: StashCommand) -> Result<()> {
	let executor = executor(&config.branch)?;
	let repo = executor.repo();
	let stasher: &Stasher = executor.stasher();
	match command {
		StashCommand::Push { tag } => match stasher.stash(repo, &tag).await? {
			Some(handle) => println!("stashed as {}", handle.label()),
			None => println!("nothing to stash"),
		},
		StashCommand::Pop { tag } => {
			if stasher.pop_stash(repo, &tag).await? {
				println!("restored {}", stasher.handle(&tag).label());
			} else {
				println!("no stash tagged {tag}");
			}
		}
		StashCommand::PopLatest => {
			if stasher.pop_latest(repo).await? {
				println!("restored latest stash");
			} else {
				println!("no tether stash found");
			}
		}
	}
	Ok(())
}

async fn run_connect(config: &TetherConfig, attach: Vec<PathBuf>) -> Result<()> {
	let url = config
		.session
		.url
		.as_deref()
		.context("no session address: pass --url, set TETHER_SESSION_URL or add [session] url to the config")?;
	let address = SessionAddress::parse(url).context("invalid session address")?;

	let mut controller = SessionController::connect(address, session_options(&config.session)?);
	if let Some(reload_url) = &config.reload.url {
		let reload_address = SessionAddress::parse(reload_url).context("invalid reload address")?;
		controller
			.attach_reload(&reload_channel(&config.reload), reload_address, &config.reload.entry_points)
			.await;
	}
	for path in &attach {
		controller.attach(Attachment::from_path(path).await?);
	}

	let mut renderer = Renderer::new();
	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	eprintln!("connecting... type /help for commands");

	loop {
		tokio::select! {
			line = lines.next_line() => {
				let Some(line) = line? else { break };
				match parse_input(&line) {
					Ok(Some(Input::Quit)) => break,
					Ok(Some(input)) => handle_input(&mut controller, input).await,
					Ok(None) => {}
					Err(message) => eprintln!("{message}"),
				}
				emit(renderer.render(controller.assembler()))?;
			}
			update = controller.next() => {
				let Some(update) = update else { break };
				show_update(&controller, &mut renderer, update)?;
			}
		}
	}

	controller.disconnect();
	Ok(())
}

async fn handle_input(controller: &mut SessionController, input: Input) {
	let result = match input {
		Input::Prompt(content) => match controller.prompt(&content).await {
			Ok(receipt) => {
				for failure in receipt.failures {
					eprintln!("! could not attach {}: {}", failure.file_name, failure.error);
				}
				Ok(())
			}
			Err(e) => Err(e),
		},
		Input::Stop => controller.stop().await,
		Input::NewSession => controller.new_session().await,
		Input::Discard => controller.discard_changes().await,
		Input::Branches => {
			controller.browse_branches().await;
			print!("{}", format_branches(controller.branches().branches()));
			Ok(())
		}
		Input::Switch(name) => controller.switch_branch(&name).await.map(|sent| {
			if !sent {
				eprintln!("already on {name}, or a switch is in progress");
			}
		}),
		Input::Create { name, base } => controller.create_branch(&name, base.as_deref()).await.map(|_| ()),
		Input::Attach(path) => {
			match Attachment::from_path(&path).await {
				Ok(attachment) => {
					controller.attach(attachment);
					eprintln!("{} attachment(s) queued", controller.pending_attachments());
				}
				Err(e) => eprintln!("! {e}"),
			}
			Ok(())
		}
		Input::Retry => {
			controller.retry();
			Ok(())
		}
		Input::Help => {
			eprintln!("{HELP}");
			Ok(())
		}
		Input::Quit => Ok(()),
	};
	if let Err(e) = result {
		eprintln!("! {e}");
	}
}

fn show_update(controller: &SessionController, renderer: &mut Renderer, update: Update) -> Result<()> {
	match update {
		Update::Display => emit(renderer.render(controller.assembler()))?,
		Update::Redraw => {
			renderer.reset();
			eprintln!("--");
			emit(renderer.render(controller.assembler()))?;
		}
		Update::Status(status) => eprintln!("[{status:?}]"),
		Update::Branches => {
			let branches = controller.branches();
			if let Some(error) = branches.error() {
				eprintln!("! {error}");
			}
			if let Some(notice) = branches.notice() {
				eprintln!("{notice}");
			}
			print!("{}", format_branches(branches.branches()));
		}
		Update::Notice(notice) => eprintln!("{notice}"),
		Update::Reconnecting { attempt, delay } => {
			eprintln!("reconnecting (attempt {attempt}) in {:.1}s", delay.as_secs_f64());
		}
		Update::Exhausted { attempts } => {
			eprintln!("gave up after {attempts} attempts; type /retry to try again");
		}
	}
	Ok(())
}

fn emit(text: String) -> Result<()> {
	if !text.is_empty() {
		let mut stdout = std::io::stdout().lock();
		stdout.write_all(text.as_bytes())?;
		stdout.flush()?;
	}
	Ok(())
}
