use anyhow::Result;
use tracing::{error, info};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use plant_pal::{logging, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let log_path = logging::default_log_path();
    if let Err(e) = logging::init(&log_path) {
        eprintln!("Logging disabled: {:#}", e);
    }

    // Read once; a missing key is reported in the chat, not here
    let config = Config::load()?;
    info!(model = config.model(), log = %log_path.display(), "starting Plant Pal");

    let mut app = App::new(&config);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    if let Err(e) = &result {
        error!(error = %e, "exited with error");
    }
    info!("Plant Pal closed");
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = tui::EventHandler::new();

    while !app.should_quit {
        app.sync_scroll();
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => app.shutdown(),
        }
    }

    Ok(())
}
