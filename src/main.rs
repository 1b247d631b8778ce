// Lullaby - terminal music player with a sleep timer
use anyhow::Context;
use clap::Parser;
use lullaby::{
    audio::Player,
    controller::Controller,
    events::EventBus,
    notification::{
        media_controls::SystemMediaControls, ActionRouter, LogNotifier, NotificationAction,
        NotifierSet,
    },
    playlist::Playlist,
    service::{
        sleep_timer::MAX_MINUTES, PlaybackOptions, PlaybackService, SleepTimerOptions,
        SleepTimerService,
    },
    settings::AppSettings,
};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lullaby")]
#[command(about = "Play a folder of music, with a sleep timer", long_about = None)]
struct Cli {
    /// Music directory to build the playlist from
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Directory holding settings.json
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Start the sleep timer with this many minutes
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(0..=MAX_MINUTES))]
    sleep: Option<u64>,

    /// Stop after each track instead of moving to the next one
    #[arg(long)]
    no_auto_next: bool,

    /// Initial volume, 0-100
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    volume: Option<u8>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr, stdout belongs to the controller
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lullaby=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let data_dir = cli.data_dir.clone().unwrap_or_else(AppSettings::default_dir);
    let mut settings = AppSettings::load(&data_dir).context("Failed to load settings")?;
    if cli.no_auto_next {
        settings.playback.auto_next = false;
    }
    if let Some(volume) = cli.volume {
        settings.playback.volume = f32::from(volume) / 100.0;
    }

    let playlist = match cli.dir.as_ref().or(settings.library.music_dir.as_ref()) {
        Some(dir) => Playlist::from_directory(dir)
            .with_context(|| format!("Failed to build playlist from {}", dir.display()))?,
        None => {
            tracing::info!("no music directory configured, using the sample playlist");
            Playlist::sample(&data_dir)
        }
    };
    tracing::info!(tracks = playlist.len(), "playlist ready");

    let player = Player::new().context("Failed to initialize audio output")?;
    let events = EventBus::new();

    // Media buttons arrive on an OS thread; forward them to a task
    let (action_tx, mut action_rx) = mpsc::unbounded_channel::<NotificationAction>();
    let mut playback_notifier = NotifierSet::new().with(LogNotifier::new());
    match SystemMediaControls::new() {
        Ok(controls) => {
            controls.set_action_handler(move |action| {
                let _ = action_tx.send(action);
            })?;
            playback_notifier = playback_notifier.with(controls);
        }
        Err(e) => tracing::warn!(error = %e, "system media controls unavailable"),
    }

    let (playback, playback_task) = PlaybackService::new(
        Box::new(player),
        Box::new(playback_notifier),
        playlist.clone(),
        events.clone(),
        PlaybackOptions::from(&settings),
    )
    .spawn();

    let (timer, timer_task) = SleepTimerService::new(
        Box::new(LogNotifier::new()),
        events.clone(),
        playback.clone(),
        SleepTimerOptions::from(&settings),
    )
    .spawn();

    let router = ActionRouter::new(playback.clone(), timer.clone());
    tokio::spawn(async move {
        while let Some(action) = action_rx.recv().await {
            if let Err(e) = router.dispatch(action) {
                tracing::warn!(error = %e, "dropping notification action");
            }
        }
    });

    if let Some(minutes) = cli.sleep {
        timer.start(minutes)?;
    }

    let controller = Controller::new(
        playback.clone(),
        timer.clone(),
        &events,
        &playlist,
        &settings,
    );
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let outcome = controller.run(stdin).await;

    // Timer first so it cannot stop playback mid-teardown
    let _ = timer.shutdown();
    let _ = timer_task.await;
    let _ = playback.shutdown();
    let _ = playback_task.await;

    outcome.context("Controller failed")?;
    Ok(())
}
