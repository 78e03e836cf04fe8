// Keyboard teleop: W/S drive, A/D turn, R/F step size, E enable, X disable, Q quit
//
// Each key press nudges the odometer targets with a relative set_target command;
// the runtime's rate limit spreads the move over several ticks.
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use romi_motor_runtime::config::TOPIC_CMD;
use romi_motor_runtime::messages::Command;
use std::time::Duration;
use tracing::info;

const STEPS: [i16; 3] = [100, 400, 1440]; // encoder counts per key press
const TARGET_DELTAS: [i16; 3] = [10, 25, 60]; // counts per tick

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD).await?;

    info!("Controls: W/S=drive, A/D=turn, R/F=step size, E=enable, X=disable, Q=quit");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    // Leave the wheels unpowered on exit
    send(&publisher, Command::Disable).await?;
    result
}

async fn send(
    publisher: &zenoh::pubsub::Publisher<'_>,
    cmd: Command,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    publisher.put(serde_json::to_string(&cmd)?).await?;
    Ok(())
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;
    send(publisher, target_delta(speed_idx)).await?;
    print_speed(speed_idx);

    loop {
        if !event::poll(Duration::from_millis(20))? {
            continue;
        }
        let Event::Key(KeyEvent { code, kind, .. }) = event::read()? else {
            continue;
        };
        if kind != KeyEventKind::Press && kind != KeyEventKind::Repeat {
            continue;
        }

        let step = STEPS[speed_idx];
        let cmd = match code {
            KeyCode::Char('w') => Command::SetTargetRelative {
                left: step,
                right: step,
            },
            KeyCode::Char('s') => Command::SetTargetRelative {
                left: -step,
                right: -step,
            },
            KeyCode::Char('a') => Command::SetTargetRelative {
                left: -step,
                right: step,
            },
            KeyCode::Char('d') => Command::SetTargetRelative {
                left: step,
                right: -step,
            },
            KeyCode::Char('e') => Command::Enable,
            KeyCode::Char('x') => Command::Disable,
            KeyCode::Char('r') => {
                speed_idx = (speed_idx + 1).min(STEPS.len() - 1);
                print_speed(speed_idx);
                target_delta(speed_idx)
            }
            KeyCode::Char('f') => {
                speed_idx = speed_idx.saturating_sub(1);
                print_speed(speed_idx);
                target_delta(speed_idx)
            }
            KeyCode::Char('q') | KeyCode::Esc => break,
            _ => continue,
        };

        send(publisher, cmd).await?;
    }

    Ok(())
}

fn target_delta(idx: usize) -> Command {
    Command::SetTargetDelta {
        left: TARGET_DELTAS[idx],
        right: TARGET_DELTAS[idx],
    }
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
