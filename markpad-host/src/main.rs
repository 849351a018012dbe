use std::rc::Rc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use markpad_core::settings::{JsonSettings, SettingsStore};
use markpad_editor::bridge::MessageBridge;
use markpad_host::cli::HeadlessOptions;
use markpad_host::coordinator::TabCoordinator;
use markpad_host::stdio::{outbox, write_lines, HeadlessUi, StdioSurface, StdoutCaret};

fn main() {
    env_logger::init();

    let options = HeadlessOptions::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("markpad: failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let local = tokio::task::LocalSet::new();
    if let Err(e) = local.block_on(&runtime, run(options)) {
        log::error!("markpad exited with an error: {}", e);
        std::process::exit(1);
    }
}

async fn run(options: HeadlessOptions) -> std::io::Result<()> {
    let (out, outgoing) = outbox();
    let writer = tokio::task::spawn_local(async move {
        let mut stdout = tokio::io::stdout();
        write_lines(outgoing, &mut stdout).await
    });

    let settings: Rc<dyn SettingsStore> = Rc::new(JsonSettings::open_default());
    let surface = Rc::new(StdioSurface::new(out.clone()));
    let bridge = Rc::new(MessageBridge::new(surface.clone()));
    let ui = Rc::new(HeadlessUi::new(out.clone(), options));
    let coordinator = Rc::new(
        TabCoordinator::new(bridge, settings, ui).with_caret_editor(Rc::new(StdoutCaret::new(out))),
    );
    log::info!("markpad ready, waiting for surface events on stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || surface.complete(line) {
            continue;
        }
        coordinator.dispatch(line);
    }

    log::info!("stdin closed, shutting down");
    surface.disconnect();
    drop(coordinator);
    drop(surface);
    match writer.await {
        Ok(result) => result,
        Err(e) => Err(std::io::Error::other(e)),
    }
}
