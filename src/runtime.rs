// Wakeup loop at LOOP_HZ plus housekeeping at HK_HZ
//
// Commands arrive on a zenoh subscriber and are drained before every tick, so
// handlers and ticks run back to back in this one task and never overlap.

use std::path::Path;
use std::time::Duration;

use embedded_hal::i2c::I2c;
use tokio::time::interval;
use tracing::info;

use crate::config::{HK_HZ, LOOP_HZ, TOPIC_CMD, TOPIC_HK, TOPIC_STATE};
use crate::control::MotorApp;
use crate::messages::Command;
use crate::table::{ParamTable, table_path};

/// Decode and apply one raw command payload
pub fn handle_payload<I: I2c>(app: &mut MotorApp<I>, payload: &[u8]) {
    match Command::decode(payload) {
        Ok(cmd) => {
            info!("Received command: {:?}", cmd);
            app.dispatch(cmd);
        }
        Err(e) => app.reject(&e),
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let table = ParamTable::load_or_default(Path::new(&table_path()));
    let mut app = MotorApp::with_i2c(table);

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD).await?;
    let pub_hk = session.declare_publisher(TOPIC_HK).await?;
    let pub_state = session.declare_publisher(TOPIC_STATE).await?;

    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));
    let mut hk_tick = interval(Duration::from_millis(1000 / HK_HZ));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Romi motor runtime {} started: {}Hz wakeup, {}Hz housekeeping",
        env!("CARGO_PKG_VERSION"),
        LOOP_HZ,
        HK_HZ
    );
    info!("Subscribed to: {}", TOPIC_CMD);
    info!("Publishing to: {}, {}", TOPIC_HK, TOPIC_STATE);

    loop {
        tokio::select! {
            _ = tick.tick() => {
                // 1. Drain all pending commands (non-blocking), in arrival order
                while let Ok(Some(sample)) = subscriber.try_recv() {
                    let payload = sample.payload().to_bytes();
                    handle_payload(&mut app, &payload);
                }

                // 2. Service the hardware; nothing to publish until the bus is open
                if let Some(state) = app.wakeup() {
                    let state_json = serde_json::to_string(&state)?;
                    pub_state.put(state_json).await?;
                }
            }
            _ = hk_tick.tick() => {
                let hk_json = serde_json::to_string(&app.housekeeping())?;
                pub_hk.put(hk_json).await?;
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    // Dropping the app commands zero power if the bus was open
    drop(app);
    Ok(())
}
