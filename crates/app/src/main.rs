//! Nova terminal front end.
//!
//! A single-threaded loop that reads user lines, submits them to the
//! orchestrator, and renders completion events from the mpsc channel.
//! Exchanges, engine startup, and personality evolution all run on
//! background tasks; this loop never blocks on network or process I/O.

use anyhow::Result;
use engine::{EngineConfig, EngineSupervisor};
use host::{ChatEvent, History, Orchestrator};
use parking_lot::Mutex;
use shared::{ChatRequest, Config, DataPaths};
use std::io::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

fn render(event: ChatEvent) {
    match event {
        ChatEvent::Reply(text) => println!("Nova: {text}\n"),
        ChatEvent::Failed(Some(detail)) => println!("[Provider Error] {detail}\n"),
        ChatEvent::Failed(None) => println!("[No response - check provider connection]\n"),
        ChatEvent::CommandOutput(outcome) => {
            println!("Running: {}", outcome.command);
            if !outcome.output.is_empty() {
                println!("{}", outcome.output.trim_end());
            }
            if outcome.timed_out {
                println!("(terminated on timeout)");
            }
            println!();
        }
        ChatEvent::EngineReady(true) => println!("[engine online]\n"),
        ChatEvent::EngineReady(false) => println!("[engine unavailable - chat needs a running backend]\n"),
        ChatEvent::ConnectionTest(ok) => {
            println!("Connection test: {}\n", if ok { "PASS" } else { "FAIL" })
        }
    }
    prompt();
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let paths = DataPaths::default_dir();
    let config = Arc::new(Mutex::new(Config::load(&paths.config_file())));
    let history = Arc::new(History::new(paths.history_file()));
    history.load();

    let orchestrator = Orchestrator::new(config.clone(), history.clone(), paths.clone());
    let (tx, mut rx) = mpsc::unbounded_channel();

    {
        let cfg = config.lock();
        info!(
            provider = %cfg.provider, host = %cfg.host, port = cfg.port,
            model = %cfg.model, history_chars = history.len(), "session started"
        );
        println!(
            "Nova — {} ({}:{}, model {})",
            cfg.provider, cfg.host, cfg.port, cfg.model
        );
    }
    println!("Commands: /attach <file>  /test  /clear  /quit\n");

    // Engine startup (probe + launch + warm-up) runs off the main loop;
    // readiness arrives as an event like any other completion. The startup
    // task owns the supervisor for the whole warm-up and only deposits it
    // in the shared slot when done, so shutdown never waits behind it.
    let supervisor: Arc<tokio::sync::Mutex<Option<EngineSupervisor>>> =
        Arc::new(tokio::sync::Mutex::new(None));
    {
        let engine_cfg = EngineConfig::from_config(&config.lock());
        let slot = supervisor.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let mut sup = EngineSupervisor::new();
            sup.start(&engine_cfg).await;
            let ready = sup.is_ready();
            *slot.lock().await = Some(sup);
            let _ = tx.send(ChatEvent::EngineReady(ready));
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut attachment: Option<String> = None;
    prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    prompt();
                    continue;
                }
                match line {
                    "/quit" | "/exit" => break,
                    "/clear" => {
                        history.clear();
                        history.save();
                        println!("Conversation cleared.\n");
                        prompt();
                    }
                    "/test" => {
                        println!("Testing connection...");
                        host::orchestrator::spawn_connection_test(
                            config.lock().clone(),
                            tx.clone(),
                        );
                    }
                    _ if line.starts_with("/attach ") => {
                        let path = line["/attach ".len()..].trim();
                        match std::fs::read_to_string(path) {
                            Ok(text) => {
                                println!("Attached {} ({} chars)\n", path, text.len());
                                attachment = Some(text);
                            }
                            Err(e) => println!("Could not read {path}: {e}\n"),
                        }
                        prompt();
                    }
                    _ => {
                        let mut request = ChatRequest::new(line);
                        request.attachment = attachment.take();
                        if !orchestrator.submit(request, tx.clone()) {
                            println!("Nova is still thinking.\n");
                            prompt();
                        }
                    }
                }
            }
            event = rx.recv() => {
                // The loop holds a sender, so the channel never closes.
                if let Some(event) = event {
                    render(event);
                }
            }
        }
    }

    // A supervisor still warming up keeps its child on the startup task;
    // runtime shutdown drops the task and kills the self-spawned engine.
    if let Some(mut sup) = supervisor.lock().await.take() {
        sup.stop().await;
    }
    history.save();
    config.lock().save(&paths.config_file());
    Ok(())
}
