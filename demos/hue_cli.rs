//! CLI application for a Hue bridge.
//!
//! Credentials are saved by `login` and reused by every other command.
//!
//! Run with: cargo run --example hue_cli -- --help

use std::time::Duration;

use clap::{Parser, Subcommand};
use hue_lights_rs::{
    Brightness, BridgeClient, Hsb, Hue, LightRegistry, Saturation, Session, SessionConfig,
    StatePayload, VariableGroup, Xy, convert, transition_label,
};

#[derive(Parser)]
#[command(name = "hue-cli")]
#[command(about = "Control Hue lights from the command line", long_about = None)]
struct Cli {
    /// Fade time in multiples of 100ms
    #[arg(short, long, global = true)]
    transition: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save bridge credentials and check them
    Login {
        /// IP address of the bridge
        ip: String,
        /// Whitelisted username
        username: String,
    },

    /// Forget the saved credentials
    Logout,

    /// List lights with their colors
    Lights,

    /// Keep listing lights until interrupted
    Watch {
        /// Poll period in milliseconds (default: the saved preference)
        #[arg(short, long)]
        interval: Option<u32>,
    },

    /// Show the bridge configuration
    Config,

    /// Turn a light on
    On { id: String },

    /// Turn a light off
    Off { id: String },

    /// Set the hue, saturation and brightness of a light
    Hsb {
        id: String,
        hue: u16,
        /// Saturation (0-254)
        #[arg(value_parser = clap::value_parser!(u8).range(0..=254))]
        saturation: u8,
        /// Brightness (1-254)
        #[arg(value_parser = clap::value_parser!(u8).range(1..=254))]
        brightness: u8,
    },

    /// Set the xy color of a light
    Xy { id: String, x: f64, y: f64 },

    /// Print the hex color of a hue, HSB or xy value without contacting the bridge
    Convert {
        /// Hue (0-65535)
        #[arg(long, required_unless_present = "xy")]
        hue: Option<u16>,
        /// Saturation (0-254), used with --brightness
        #[arg(long, requires = "brightness")]
        saturation: Option<u8>,
        /// Brightness (1-254), used with --saturation
        #[arg(long, requires = "saturation")]
        brightness: Option<u8>,
        /// CIE xy color as "x,y"
        #[arg(long, conflicts_with = "hue")]
        xy: Option<Xy>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let session = Session::initialize(SessionConfig::from_env());
    if !session.supports_storage() {
        eprintln!(
            "Warning: storage unavailable ({}); credentials will not be saved",
            session.probe_status()
        );
    }

    let result = run(&cli, &session).await;
    session.shutdown();
    result
}

async fn run(cli: &Cli, session: &Session) -> Result<(), Box<dyn std::error::Error>> {
    let client = BridgeClient::connect(session.bridge())?;

    match &cli.command {
        Commands::Login { ip, username } => {
            println!("Connecting to bridge at {}...", ip);
            let caps = client.login(ip, username).await?;
            let available = caps.lights.map(|l| l.available).unwrap_or_default();
            println!("Connected. The bridge has room for {} more light(s).", available);
        }

        Commands::Logout => {
            session.bridge().remove_all()?;
            println!("Credentials removed.");
        }

        Commands::Convert {
            hue,
            saturation,
            brightness,
            xy,
        } => {
            let hex = match (xy, hue, saturation, brightness) {
                (Some(xy), _, _, _) => convert::xy_to_hex(*xy, 1.0),
                (None, Some(hue), Some(s), Some(b)) => convert::hsb_to_hex(*hue, *s, *b),
                (None, Some(hue), _, _) => convert::hue_to_hex(*hue),
                (None, None, _, _) => return Err("Nothing to convert".into()),
            };
            println!("{}", hex);
        }

        _ => {
            if !client.has_credentials() {
                return Err("No bridge credentials saved. Run `login <ip> <username>` first".into());
            }

            match &cli.command {
                Commands::Lights => {
                    let mut registry = LightRegistry::new();
                    client.refresh(&mut registry).await?;
                    print_lights(&registry);
                }

                Commands::Watch { interval } => {
                    let period = match interval {
                        Some(ms) => {
                            session.preferences().refresh_interval_ms().set(*ms)?;
                            *ms
                        }
                        None => session
                            .preferences()
                            .refresh_interval_ms()
                            .get()
                            .unwrap_or(1000),
                    };
                    session.preferences().auto_refresh().set(true)?;

                    let mut registry = LightRegistry::new();
                    let period = Duration::from_millis(u64::from(period.max(100)));
                    let mut ticker = tokio::time::interval(period);
                    loop {
                        ticker.tick().await;
                        match client.refresh(&mut registry).await {
                            Ok(0) => {}
                            Ok(changed) => {
                                println!("-- {} light(s) changed --", changed);
                                print_lights(&registry);
                            }
                            Err(e) => eprintln!("Refresh failed: {}", e),
                        }
                    }
                }

                Commands::Config => {
                    let config = client.get_config().await?;
                    println!("Bridge:      {}", config.name);
                    println!("Bridge id:   {}", config.bridgeid.unwrap_or_default());
                    println!("API version: {}", config.apiversion.unwrap_or_default());
                    println!("Software:    {}", config.swversion.unwrap_or_default());
                    println!("Apps:        {}", config.whitelist.len());
                }

                Commands::On { id } | Commands::Off { id } => {
                    let mut payload = StatePayload::new();
                    payload.on(matches!(cli.command, Commands::On { .. }));
                    apply(&client, cli, id, payload).await?;
                }

                Commands::Hsb {
                    id,
                    hue,
                    saturation,
                    brightness,
                } => {
                    let hsb = Hsb::new(
                        Hue(*hue),
                        Saturation::clamped(*saturation),
                        Brightness::clamped(*brightness),
                    );
                    println!("Setting light {} to {}", id, hsb.to_hex());
                    let mut payload = StatePayload::from(&hsb);
                    payload.on(true);
                    apply(&client, cli, id, payload).await?;
                }

                Commands::Xy { id, x, y } => {
                    let xy = Xy::new(*x, *y);
                    println!("Setting light {} to {}", id, xy.to_hex(1.0));
                    let mut payload = StatePayload::from(&xy);
                    payload.on(true);
                    apply(&client, cli, id, payload).await?;
                }

                Commands::Login { .. } | Commands::Logout | Commands::Convert { .. } => {
                    unreachable!()
                }
            }
        }
    }

    Ok(())
}

async fn apply<T: hue_lights_rs::BridgeTransport>(
    client: &BridgeClient<T>,
    cli: &Cli,
    id: &str,
    mut payload: StatePayload,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(tenths) = cli.transition {
        payload.transition(tenths);
        println!("Transition: {}", transition_label(tenths));
    }

    for response in client.set_light_state(id, &payload).await? {
        if let Some(error) = response.error {
            eprintln!("  {}: {}", error.address, error.description);
        }
    }
    println!("Done.");
    Ok(())
}

fn print_lights(registry: &LightRegistry) {
    for (id, light) in registry.lights() {
        let power = match light.state.on {
            Some(true) => "ON",
            Some(false) => "OFF",
            None => "-",
        };
        let swatch = registry.swatch(&id);
        println!(
            "  {:>3}  {:24} {:4} hue {}  xy {}",
            id,
            light.name,
            power,
            swatch.map_or("#000000", |s| s.hue_hex()),
            swatch.map_or("#000000", |s| s.xy_hex()),
        );
    }
}
