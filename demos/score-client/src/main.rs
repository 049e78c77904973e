//! Runs one play session end to end against a scoring backend.
//!
//! Validates the session, streams one scripted score per game variant half
//! a second apart, submits a final score and follows the redirect.
//!
//! ```text
//! RUST_LOG=debug score-client --session-id 3f2b9c1e --variant aim-gridshot
//! ```

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use scorelink::prelude::*;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

const SEND_INTERVAL: Duration = Duration::from_millis(500);
const CONNECT_WAIT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "score-client")]
#[command(about = "Validate a play session, stream test scores and submit a result")]
struct Cli {
    /// Play-session id (the page's `play_session_uuid`)
    #[arg(long, env = "SCORELINK_SESSION_ID")]
    session_id: String,

    /// Game variant being played
    #[arg(long, env = "SCORELINK_VARIANT", default_value = "aim-gridshot")]
    variant: String,

    /// Input mode
    #[arg(long, env = "SCORELINK_INPUT", default_value = "mouse")]
    input: String,

    /// Backend base URL
    #[arg(long, env = "SCORELINK_BASE_URL", default_value = "https://test.bardtest.gg")]
    base_url: String,

    /// Streaming endpoint
    #[arg(long, env = "SCORELINK_WS_URL", default_value = "wss://test.bardtest.gg/websocket")]
    ws_url: String,

    /// Game id sent with validation
    #[arg(long, env = "SCORELINK_GAME_ID", default_value = "unity-demo")]
    game_id: String,

    /// Seconds between an abnormal close and the next reconnect
    #[arg(long, env = "SCORELINK_RECONNECT_DELAY", default_value_t = 5)]
    reconnect_delay: u64,

    /// Reconnect attempts before giving up
    #[arg(long, env = "SCORELINK_MAX_RECONNECT_ATTEMPTS", default_value_t = 3)]
    max_reconnect_attempts: u32,

    /// Driver loop rate
    #[arg(long, env = "SCORELINK_TICK_RATE", default_value_t = 30)]
    tick_rate_hz: u32,

    /// Score submitted at the end of the run
    #[arg(long, default_value_t = 100.0)]
    final_score: f64,

    /// Send the user to the failure page if the stream cannot be recovered
    #[arg(long, env = "SCORELINK_REDIRECT_ON_EXHAUSTION")]
    redirect_on_exhaustion: bool,
}

/// One message per game variant, with the metric fields each one uses.
fn test_script(default_game: &str) -> Vec<ScoreMessage> {
    vec![
        ScoreMessage::new(default_game).with_metric(ScoreMetric::score(100.0)),
        ScoreMessage::new("platformer")
            .with_metric(ScoreMetric::new().with("victim", 1).with("streak", 3)),
        ScoreMessage::new("aim-gridshot").with_metric(
            ScoreMetric::new()
                .with("type", "hit")
                .with("precision", 0.85)
                .with("age", 0)
                .with("nth", 0),
        ),
        ScoreMessage::new("aim-gridshot").with_metric(
            ScoreMetric::new()
                .with("type", "miss")
                .with("precision", 0.0)
                .with("age", 0)
                .with("nth", 1),
        ),
        ScoreMessage::new("multitasking").with_metric(
            ScoreMetric::score(100.0)
                .with("obstacleBlock", false)
                .with("barsActive", 2)
                .with("targetClicks", vec!["mid", "inner", "outer"]),
        ),
        ScoreMessage::new("observe").with_metric(
            ScoreMetric::score(100.0)
                .with("question", "What color was the square?")
                .with("answer", "blue"),
        ),
        ScoreMessage::new("holdthewall")
            .with_time_elapsed(30.0)
            .with_metric(ScoreMetric::score(100.0)),
        ScoreMessage::new("buttonsmash").with_metric(ScoreMetric::score(100.0)),
        ScoreMessage::new("stayontarget")
            .with_time_elapsed(45.0)
            .with_metric(ScoreMetric::score(100.0)),
    ]
}

fn log_event(event: &CoordinatorEvent) {
    match event {
        CoordinatorEvent::Score(resp) => {
            tracing::info!(message_id = %resp.message_id, value = resp.value, "score received");
        }
        CoordinatorEvent::MalformedFrame(text) => {
            tracing::warn!(frame = %text, "unrecognised frame");
        }
        CoordinatorEvent::TransportError(e) => tracing::warn!(error = %e, "stream error"),
        CoordinatorEvent::ReconnectExhausted { last_error } => {
            tracing::error!(last_error = ?last_error, "stream lost");
        }
        other => tracing::debug!(event = ?other, "session event"),
    }
}

type Coordinator = SessionCoordinator<WebSocketConnector, LogNavigator>;

/// Pumps until the stream opens, giving up after `CONNECT_WAIT`.
async fn wait_for_stream(coordinator: &mut Coordinator, driver: &mut TickDriver) -> bool {
    let deadline = Instant::now() + CONNECT_WAIT;
    while Instant::now() < deadline {
        for event in coordinator.pump().await {
            log_event(&event);
        }
        if coordinator.phase() == Phase::Streaming {
            return true;
        }
        if !coordinator.phase().is_streaming() {
            return false;
        }
        driver.wait_for_tick().await;
    }
    false
}

/// Sends the script, pumping for `SEND_INTERVAL` after each message.
async fn stream_script(coordinator: &mut Coordinator, driver: &mut TickDriver, game: &str) {
    for message in test_script(game) {
        match coordinator.send_score(message) {
            Ok(id) => tracing::info!(message_id = ?id, "test score sent"),
            Err(e) => tracing::warn!(error = %e, "test score not sent"),
        }

        let next = Instant::now() + SEND_INTERVAL;
        while Instant::now() < next {
            driver.wait_for_tick().await;
            for event in coordinator.pump().await {
                log_event(&event);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), ScorelinkError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::builder()
        .base_url(cli.base_url)
        .ws_url(cli.ws_url)
        .game_id(cli.game_id.clone())
        .reconnect_delay(Duration::from_secs(cli.reconnect_delay))
        .max_reconnect_attempts(cli.max_reconnect_attempts)
        .tick_rate_hz(cli.tick_rate_hz)
        .redirect_on_exhaustion(cli.redirect_on_exhaustion)
        .build();

    let mut driver = TickDriver::new(config.tick_rate_hz);
    let mut coordinator =
        SessionCoordinator::new(config, Arc::new(WebSocketConnector), LogNavigator)?;

    let params = SessionParams {
        session_id: cli.session_id,
        variant: cli.variant,
        input: cli.input,
        ..Default::default()
    };
    let phase = coordinator.start(params).await?;
    if phase != Phase::Ready {
        for event in coordinator.pump().await {
            log_event(&event);
        }
        tracing::warn!(%phase, "session did not start");
        return Ok(());
    }

    if !wait_for_stream(&mut coordinator, &mut driver).await {
        tracing::error!(phase = %coordinator.phase(), "stream never opened");
        coordinator.shutdown().await;
        return Ok(());
    }

    stream_script(&mut coordinator, &mut driver, &cli.game_id).await;

    if let Err(e) = coordinator.submit_result(&cli.game_id, cli.final_score).await {
        tracing::error!(error = %e, "could not submit results");
        coordinator.shutdown().await;
        return Err(e);
    }

    let phase = coordinator.run(&mut driver, log_event).await;
    tracing::info!(%phase, "session finished");
    coordinator.shutdown().await;
    Ok(())
}
