//! cafe-runner: headless simulation runner for the cat café.
//!
//! Usage:
//!   cafe-runner --seed 12345 --ticks 20000 --db run.db
//!   cafe-runner --seed 12345 --ipc-mode

use anyhow::Result;
use cafe_core::{
    command::PlayerCommand,
    engine::SimEngine,
    snapshot::CafeView,
    store::SimStore,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Tick {
        count: u64,
    },
    Frame,
    Command {
        command: PlayerCommand,
    },
    Quit,
}

#[derive(serde::Serialize)]
struct IpcReply<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    command_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    state: &'a CafeView,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let ticks = parse_arg(&args, "--ticks", 20_000u64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    if !ipc_mode {
        println!("Cat Café: cafe-runner");
        println!("  seed:      {seed}");
        println!("  ticks:     {ticks}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let store = if db == ":memory:" {
        SimStore::in_memory()?
    } else {
        SimStore::open(db)?
    };
    store.migrate()?;

    let run_id = format!("run-{seed}-{}", chrono::Utc::now().format("%Y%m%d%H%M%S"));
    store.insert_run(&run_id, seed, env!("CARGO_PKG_VERSION"))?;

    let mut engine = SimEngine::build(run_id.clone(), seed, store, data_dir)?;

    if ipc_mode {
        run_ipc_loop(&mut engine)?;
    } else {
        engine.run_ticks(ticks)?;
        print_summary(&engine, &run_id, ticks)?;
    }

    Ok(())
}

fn run_ipc_loop(engine: &mut SimEngine) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let mut command_id = None;
        let mut error = None;
        match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Tick { count } => engine.run_ticks(count)?,
            IpcCommand::Frame => engine.run_frame()?,
            IpcCommand::GetState => {}
            IpcCommand::Command { command } => match engine.submit(command) {
                Ok(id) => command_id = Some(id),
                Err(e) => {
                    log::warn!("command rejected: {e}");
                    error = Some(e.to_string());
                }
            },
        }

        let state = engine.view();
        let reply = IpcReply { command_id, error, state: &state };
        writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn print_summary(engine: &SimEngine, run_id: &str, ticks: u64) -> Result<()> {
    let view = engine.view();
    let spawned = engine.store_event_count("customer_spawned")?;
    let paid = engine.store_event_count("customer_paid")?;
    let interactions = engine.store_event_count("item_interacted")?;
    let left = engine.store_event_count("customer_left")?;
    let waste = engine.store_event_count("waste_spawned")?;
    let snapshots = engine.store().snapshot_count(run_id)?;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {run_id}");
    println!("  ticks run:      {ticks}");
    println!("  final tick:     {}", view.tick);
    println!("  sim time:       {:.1}s", view.elapsed_ms as f64 / 1000.0);
    if let Some(customers) = engine.customer_subsystem() {
        println!("  arrivals:       {} ({} departed)", customers.spawned_total(), customers.departed_total());
    }
    println!("  customers in:   {spawned}");
    println!("  payments:       {paid}");
    println!("  interactions:   {interactions}");
    println!("  customers out:  {left}");
    println!("  still inside:   {}", view.customers.len());
    println!("  waste dropped:  {waste} ({} on floor)", view.waste.len());
    println!("  snapshots:      {snapshots}");

    println!();
    println!("=== ECONOMY ===");
    println!("  money:          {}", view.money);
    println!("  reputation:     {:.1}", view.reputation);
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
