// One-shot command publisher for the Romi motor runtime
//
// Usage:
//   cargo run --example romi_cmd -- enable
//   cargo run --example romi_cmd -- target-delta 10 10
//   cargo run --example romi_cmd -- target 500 500
//   cargo run --example romi_cmd -- disable
use clap::{Parser, Subcommand};
use romi_motor_runtime::config::TOPIC_CMD;
use romi_motor_runtime::messages::Command;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "romi_cmd", about = "Send a command to the Romi motor runtime")]
struct Args {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Bump the command counter
    Noop,
    /// Zero the command, error and I2C error counters
    ResetCounters,
    /// Log the parameter table and its checksum
    Process,
    /// Enable closed-loop motor control
    Enable,
    /// Command zero power on every tick
    Disable,
    /// Add to the odometer targets
    Target {
        #[arg(allow_hyphen_values = true)]
        left: i16,
        #[arg(allow_hyphen_values = true)]
        right: i16,
    },
    /// Replace the odometer targets
    TargetAbsolute {
        #[arg(allow_hyphen_values = true)]
        left: i16,
        #[arg(allow_hyphen_values = true)]
        right: i16,
    },
    /// Replace the per-tick step limits
    TargetDelta {
        #[arg(allow_hyphen_values = true)]
        left: i16,
        #[arg(allow_hyphen_values = true)]
        right: i16,
    },
}

impl From<Cmd> for Command {
    fn from(cmd: Cmd) -> Self {
        match cmd {
            Cmd::Noop => Command::Noop,
            Cmd::ResetCounters => Command::ResetCounters,
            Cmd::Process => Command::Process,
            Cmd::Enable => Command::Enable,
            Cmd::Disable => Command::Disable,
            Cmd::Target { left, right } => Command::SetTargetRelative { left, right },
            Cmd::TargetAbsolute { left, right } => Command::SetTargetAbsolute { left, right },
            Cmd::TargetDelta { left, right } => Command::SetTargetDelta { left, right },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let command = Command::from(args.command);
    let payload = serde_json::to_string(&command)?;

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD).await?;

    publisher.put(payload.clone()).await?;
    info!("Sent {} on {}", payload, TOPIC_CMD);

    session.close().await?;
    Ok(())
}
