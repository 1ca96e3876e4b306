//! A simple program demonstrates how to use `research-chat` as a library.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use research_chat::SessionBuilder;
use research_chat::activity::{self, STARTING};
use research_chat::core::{
    Credential, CredentialPool, Effort, FinalAnswer, ResearchConfigBuilder,
};
use research_chat_gemini_model::{GeminiConfigBuilder, GeminiProvider};
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";
const API_KEY_PREFIX: &str = "GEMINI_API_KEY_";
const API_KEY_COUNT: usize = 3;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let credentials =
        match Credential::load_numbered(API_KEY_PREFIX, API_KEY_COUNT) {
            Ok(credentials) => credentials,
            Err(err) => {
                eprintln!("{}", err.reason());
                return;
            }
        };
    let base_url = env::var("GEMINI_BASE_URL").ok();
    let effort = match env::var("RESEARCH_EFFORT") {
        Ok(effort) => match effort.parse::<Effort>() {
            Ok(effort) => effort,
            Err(err) => {
                eprintln!("{}", err.reason());
                return;
            }
        },
        Err(_) => Effort::Low,
    };

    let mut config = ResearchConfigBuilder::default().with_effort(effort);
    if let Ok(model) = env::var("RESEARCH_MODEL") {
        config = config.with_model(model);
    }

    let pool = CredentialPool::new(&credentials, |credential| {
        let mut builder = GeminiConfigBuilder::with_api_key(credential.secret());
        if let Some(base_url) = &base_url {
            builder = builder.with_base_url(base_url);
        }
        GeminiProvider::new(builder.build())
    });
    info!("loaded {} credentials", pool.len());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let mut session = SessionBuilder::with_pool(Arc::new(pool))
        .with_config(config.build())
        .with_effort(effort)
        .on_progress(move |event| {
            event_tx.send(event).ok();
        })
        .build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    loop {
        print!("> ");
        std::io::stdout().flush().unwrap();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix('/') {
            run_command(&mut session, command);
            continue;
        }

        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(progress_style.clone());
        progress_bar.set_message(STARTING);

        let mut ask = pin!(session.ask(line));
        let result = loop {
            select! {
                result = &mut ask => break result,
                Some(event) = event_rx.recv() => {
                    progress_bar.set_message(activity::describe(&event));
                }
                _ = sleep(Duration::from_millis(100)) => {
                    progress_bar.inc(1);
                }
            }
        };

        // Events of the finished session are stale now.
        while event_rx.try_recv().is_ok() {}
        progress_bar.finish_and_clear();

        match result {
            Ok(answer) => print_answer(&answer),
            Err(err) => {
                println!("{}❌ Error: {}", BAR_CHAR.bright_red(), err);
                println!();
            }
        }
    }
}

fn run_command(session: &mut research_chat::Session, command: &str) {
    let bar = BAR_CHAR.bright_yellow();
    match command.split_once(' ') {
        None if command == "clear" => {
            session.clear();
            println!("{bar}Conversation cleared.");
        }
        Some(("effort", level)) => match level.parse::<Effort>() {
            Ok(effort) => {
                session.set_effort(effort);
                println!("{bar}Effort set to {effort}.");
            }
            Err(err) => println!("{bar}{}", err.reason()),
        },
        _ => println!("{bar}Commands: /clear, /effort low|medium|high"),
    }
    println!();
}

fn print_answer(answer: &FinalAnswer) {
    let bar = BAR_CHAR.bright_cyan();
    for line in answer.text.lines() {
        println!("{bar}{}", line.bright_white());
    }
    if !answer.cited_sources.is_empty() {
        println!("{bar}");
        println!("{bar}{}", "Sources:".bold());
        for source in &answer.cited_sources {
            println!("{bar}- {}: {}", source.label, source.value.dimmed());
        }
    }
    println!();
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
