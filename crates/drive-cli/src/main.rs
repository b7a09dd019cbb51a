use std::collections::BTreeMap;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Utc;
use contracts::EngineConfig;
use drive_api::{
    read_config_file, read_signals_file, serve, write_config_file, EngineApi, EngineError,
};
use tracing_subscriber::{fmt, EnvFilter};

fn print_usage() {
    println!("drive-cli <command>");
    println!("commands:");
    println!("  init");
    println!("    creates the state database, writing the default config file if missing");
    println!("  tick");
    println!("    advances every drive to now and reports what fired");
    println!("  satisfy <drive> <delta>");
    println!("  status");
    println!("  drives");
    println!("  triggers [n]");
    println!("  context [n]");
    println!("  serve [addr]");
    println!("    default addr: 127.0.0.1:8080");
    println!("environment:");
    println!("  DRIVES_SQLITE_PATH   state database (default drive_state.sqlite)");
    println!("  DRIVES_CONFIG_PATH   engine config json, re-read before every tick");
    println!("  DRIVES_SIGNALS_PATH  boolean signal map consulted on tick");
}

fn default_sqlite_path() -> String {
    env::var("DRIVES_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "drive_state.sqlite".to_string())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn parse_count(value: Option<&String>, default: usize) -> Result<usize, String> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| format!("invalid count: {raw}")),
    }
}

fn open_engine() -> Result<EngineApi, String> {
    let db_path = default_sqlite_path();
    match env_path("DRIVES_CONFIG_PATH") {
        Some(config_path) => EngineApi::open_with_config_file(&db_path, &config_path),
        None => EngineApi::open(&db_path, EngineConfig::default()),
    }
    .map_err(|err| format!("cannot open engine: {err}"))
}

fn load_signals() -> Result<BTreeMap<String, bool>, String> {
    match env_path("DRIVES_SIGNALS_PATH") {
        Some(path) => read_signals_file(&path).map_err(|err| format!("cannot read signals: {err}")),
        None => Ok(BTreeMap::new()),
    }
}

fn run_init() -> Result<(), String> {
    if let Some(config_path) = env_path("DRIVES_CONFIG_PATH") {
        match read_config_file(&config_path) {
            Ok(_) => {}
            Err(EngineError::ConfigIo { .. }) if !config_path.exists() => {
                write_config_file(&config_path, &EngineConfig::default())
                    .map_err(|err| format!("cannot write default config: {err}"))?;
                println!("wrote default config to {}", config_path.display());
            }
            Err(err) => return Err(format!("cannot read config: {err}")),
        }
    }

    let mut api = open_engine()?;
    let report = api
        .initialize_state(Utc::now())
        .map_err(|err| format!("cannot initialize state: {err}"))?;

    if report.bootstrapped {
        println!(
            "bootstrapped {} drives into {}",
            api.config().drives.len(),
            default_sqlite_path()
        );
    } else {
        println!("state already present in {}", default_sqlite_path());
    }
    if !report.recreated_drives.is_empty() && !report.bootstrapped {
        println!("re-created missing drives: {}", report.recreated_drives.join(", "));
    }
    if !report.is_clean() {
        println!(
            "recovered: repaired={} dropped_rows={} dropped_events={}",
            report.repaired_drives.len(),
            report.dropped_rows.len(),
            report.dropped_events
        );
    }
    Ok(())
}

fn run_tick() -> Result<(), String> {
    let mut api = open_engine()?;
    let signals = load_signals()?;
    let report = api
        .tick(&signals, Utc::now())
        .map_err(|err| format!("tick failed: {err}"))?;

    println!("ticked {} drives", report.drives_ticked);
    for anomaly in &report.anomalies {
        println!("anomaly {}: {}", anomaly.drive_name, anomaly.detail);
    }
    if report.fired.is_empty() {
        println!("nothing fired");
    }
    for event in &report.fired {
        println!(
            "fired {} band={} pressure={:.2}/{:.2} at {}",
            event.drive_name,
            event.band,
            event.pressure,
            event.threshold,
            event.fired_at.to_rfc3339()
        );
    }
    Ok(())
}

fn run_satisfy(args: &[String]) -> Result<(), String> {
    let name = args
        .get(2)
        .cloned()
        .ok_or_else(|| "missing drive name".to_string())?;
    let raw_delta = args.get(3).ok_or_else(|| "missing delta".to_string())?;
    let delta = raw_delta
        .parse::<f64>()
        .map_err(|_| format!("invalid delta: {raw_delta}"))?;

    let mut api = open_engine()?;
    let view = api
        .satisfy(&name, delta, Utc::now())
        .map_err(|err| format!("satisfy failed: {err}"))?;

    println!(
        "{} pressure={:.2}/{:.2} band={}",
        view.name, view.pressure, view.threshold, view.band
    );
    Ok(())
}

fn run_status() -> Result<(), String> {
    let api = open_engine()?;
    let status = api
        .status()
        .map_err(|err| format!("status failed: {err}"))?;
    println!("{status}");
    if let Some(top) = status.most_pressing {
        println!(
            "most pressing: {} at {:.2}/{:.2} ({})",
            top.name, top.pressure, top.threshold, top.band
        );
    }
    Ok(())
}

fn run_drives() -> Result<(), String> {
    let api = open_engine()?;
    let views = api
        .drives()
        .map_err(|err| format!("drives failed: {err}"))?;
    for view in views {
        println!(
            "{:<14} {:>7.2}/{:<7.2} {:>5.2} {}",
            view.name, view.pressure, view.threshold, view.ratio, view.band
        );
    }
    Ok(())
}

fn run_triggers(args: &[String]) -> Result<(), String> {
    let count = parse_count(args.get(2), 20)?;
    let api = open_engine()?;
    let (total, events) = api
        .triggers(count)
        .map_err(|err| format!("triggers failed: {err}"))?;

    println!("{} logged, showing {}", total, events.len());
    for event in events {
        println!(
            "{} {} band={} pressure={:.2}/{:.2} ({})",
            event.fired_at.to_rfc3339(),
            event.drive_name,
            event.band,
            event.pressure,
            event.threshold,
            event.event_id
        );
    }
    Ok(())
}

fn run_context(args: &[String]) -> Result<(), String> {
    let count = parse_count(args.get(2), 10)?;
    let api = open_engine()?;
    let document = api
        .context(count, Utc::now())
        .map_err(|err| format!("context failed: {err}"))?;
    print!("{document}");
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).compact().init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    let outcome = match command {
        Some("init") => run_init(),
        Some("tick") => run_tick(),
        Some("satisfy") => run_satisfy(&args),
        Some("status") => run_status(),
        Some("drives") => run_drives(),
        Some("triggers") => run_triggers(&args),
        Some("context") => run_context(&args),
        Some("serve") => match parse_socket_addr(args.get(2)) {
            Ok(addr) => match open_engine() {
                Ok(api) => {
                    println!("serving api on http://{addr}");
                    if let Err(err) = serve(addr, api).await {
                        eprintln!("server error: {err}");
                        std::process::exit(1);
                    }
                    Ok(())
                }
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        },
        _ => {
            print_usage();
            return;
        }
    };

    if let Err(err) = outcome {
        eprintln!("error: {err}");
        print_usage();
        std::process::exit(2);
    }
}
