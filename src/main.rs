use std::path::PathBuf;

use clap::Parser;
use libdiceroll::{Bounds, FrameOutcome, RollSession, SimulationConfig, StartOutcome};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// CLI for the cube dice simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Dice to roll per batch roll (format: 3 or 3D6, at most 10)
    #[arg(short, long, default_value = "1", value_parser = parse_dice_count)]
    dice: usize,

    /// Play rounds of one, two, three... dice until a total divisible by 7
    #[arg(long)]
    play: bool,

    /// Maximum rounds in play mode
    #[arg(long, default_value_t = 10)]
    rounds: usize,

    /// Number of rolls for batch mode
    #[arg(long, default_value_t = 1)]
    batch: usize,

    /// Seed for reproducible rolls
    #[arg(long)]
    seed: Option<u64>,

    /// Simulation frames per second
    #[arg(long, default_value_t = 60.0, value_parser = parse_fps)]
    fps: f32,

    /// Half width of the floor (x)
    #[arg(long, default_value_t = 4.0)]
    half_width: f32,

    /// Half depth of the floor (z)
    #[arg(long, default_value_t = 4.0)]
    half_depth: f32,

    /// JSON file with tuning parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format: text, json, csv
    #[arg(short, long, default_value = "text", value_parser = ["text", "json", "csv"])]
    output: String,

    /// Verbose output (debug logging on stderr unless RUST_LOG is set)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Serialize)]
struct RollRecord {
    roll: usize,
    faces: Vec<u8>,
    total: u32,
    frames: u32,
}

#[derive(Debug, Clone, Serialize)]
struct GameRecord {
    rolls: Vec<RollRecord>,
    score: u32,
    busted: bool,
}

/// Parse a dice count like 3 or 3D6.
fn parse_dice_count(s: &str) -> Result<usize, String> {
    let s = s.trim().to_uppercase();
    let count_str = match s.split_once('D') {
        Some((count, sides)) => {
            if sides != "6" {
                return Err(format!("Invalid dice notation: {}. Only six-sided dice are simulated", s));
            }
            count
        }
        None => s.as_str(),
    };

    let count: usize = match count_str.parse() {
        Ok(c) => c,
        Err(_) => return Err(format!("Invalid dice count: {}", s)),
    };

    if count == 0 || count > 10 {
        return Err(format!("Invalid dice count: {}. Must be between 1 and 10", count));
    }

    Ok(count)
}

fn parse_fps(s: &str) -> Result<f32, String> {
    let fps: f32 = s.parse().map_err(|_| format!("Invalid frame rate: {}", s))?;
    if !fps.is_finite() || fps < 1.0 {
        return Err(format!("Invalid frame rate: {}. Must be at least 1", s));
    }
    Ok(fps)
}

fn load_config(args: &Args) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
    match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Ok(SimulationConfig::from_json_str(&json)?)
        }
        None => Ok(SimulationConfig::default()),
    }
}

fn new_session(args: &Args, config: SimulationConfig) -> Result<RollSession<StdRng>, Box<dyn std::error::Error>> {
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Ok(RollSession::with_rng(config, rng)?)
}

/// Step an already started roll frame by frame until every die has settled.
fn finish_roll(
    session: &mut RollSession<StdRng>,
    roll: usize,
    dt: f32,
) -> Result<RollRecord, Box<dyn std::error::Error>> {
    let mut frames = 0u32;
    let mut shown = 0;
    loop {
        frames += 1;
        match session.tick(dt) {
            FrameOutcome::Advanced { settled, dice } => {
                if settled != shown {
                    debug!(roll, frame = frames, settled, dice, live = ?session.live_results(), "partial result");
                    shown = settled;
                }
            }
            FrameOutcome::Completed(result) => {
                return Ok(RollRecord {
                    roll,
                    faces: result.face_values().to_vec(),
                    total: result.total(),
                    frames,
                });
            }
            FrameOutcome::Stopped => return Err("roll stopped before every die settled".into()),
        }
    }
}

fn run_batch(args: &Args) -> Result<Vec<RollRecord>, Box<dyn std::error::Error>> {
    let bounds = Bounds::centered(args.half_width, args.half_depth)?;
    let mut session = new_session(args, load_config(args)?)?;
    let dt = 1.0 / args.fps;
    info!(dice = args.dice, batch = args.batch, ?bounds, fps = args.fps, "rolling batch");

    let mut records = Vec::with_capacity(args.batch);
    for roll in 1..=args.batch {
        if let StartOutcome::AlreadyRolling = session.start(args.dice, bounds)? {
            return Err("previous roll still in flight".into());
        }
        records.push(finish_roll(&mut session, roll, dt)?);
    }
    Ok(records)
}

/// Consecutive rounds; a total divisible by 7 loses the game.
fn run_game(args: &Args) -> Result<GameRecord, Box<dyn std::error::Error>> {
    let bounds = Bounds::centered(args.half_width, args.half_depth)?;
    let mut session = new_session(args, load_config(args)?)?;
    let dt = 1.0 / args.fps;
    info!(rounds = args.rounds, ?bounds, fps = args.fps, "playing");

    let mut game = GameRecord {
        rolls: Vec::new(),
        score: 0,
        busted: false,
    };
    for _ in 0..args.rounds {
        session.start_next_round(&bounds)?;
        let round = session.round();
        let record = finish_roll(&mut session, round, dt)?;
        let bust = is_bust(record.total);
        info!(round, total = record.total, bust, "round finished");
        if !bust {
            game.score += record.total;
        }
        game.rolls.push(record);
        if bust {
            game.busted = true;
            break;
        }
    }
    Ok(game)
}

fn is_bust(total: u32) -> bool {
    total % 7 == 0
}

fn format_output(results: &[RollRecord], output_format: &str) -> Result<String, Box<dyn std::error::Error>> {
    match output_format {
        "text" => {
            let mut output = String::new();
            for result in results {
                if results.len() > 1 {
                    output.push_str(&format!("Roll {}: ", result.roll));
                }

                let values: Vec<String> = result.faces.iter().map(|v| v.to_string()).collect();
                output.push_str(&format!("{}\n", values.join(", ")));

                if results.len() > 1 {
                    output.push_str(&format!("  Total: {}\n", result.total));
                } else {
                    output.push_str(&format!("Total: {}\n", result.total));
                }
            }
            Ok(output)
        }
        "json" => {
            if results.len() == 1 {
                Ok(serde_json::to_string_pretty(&results[0])?)
            } else {
                Ok(serde_json::to_string_pretty(results)?)
            }
        }
        "csv" => {
            let mut output = String::from("Roll,Die,Value\n");
            for result in results {
                for (die, value) in result.faces.iter().enumerate() {
                    output.push_str(&format!("{},{},{}\n", result.roll, die + 1, value));
                }
            }
            Ok(output)
        }
        _ => Err("Invalid output format".into()),
    }
}

fn format_game(game: &GameRecord, output_format: &str) -> Result<String, Box<dyn std::error::Error>> {
    match output_format {
        "json" => Ok(serde_json::to_string_pretty(game)?),
        "text" => {
            let mut output = format_output(&game.rolls, "text")?;
            if game.busted {
                output.push_str("Busted! Total divisible by 7\n");
            }
            output.push_str(&format!("Score: {}\n", game.score));
            Ok(output)
        }
        other => format_output(&game.rolls, other),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let output = if args.play {
        run_game(&args).and_then(|game| format_game(&game, &args.output))
    } else {
        run_batch(&args).and_then(|results| format_output(&results, &args.output))
    };

    match output {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error during simulation: {}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}
