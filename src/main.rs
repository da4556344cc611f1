use alrua::application::commands::{
    adjust_calendar_impl, dashboard_impl, list_calculation_methods_impl, list_schools_impl,
    next_event_impl, refresh_impl, set_location_mode_impl, set_theme_impl, start_impl,
    switch_to_city_impl, switch_to_gps_impl, toggle_theme_impl,
};
use alrua::application::ticker::spawn_ticker;
use alrua::{AppState, DashboardResponse, NextEventResponse, ResolutionResponse};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ALRUA_LOG";
const HOME_ENV: &str = "ALRUA_HOME";
const DEFAULT_WORKSPACE_DIR: &str = ".alrua";

#[derive(Parser)]
#[command(name = "alrua", version, about = "Prayer times and next-event tracking")]
struct Cli {
    /// Workspace holding config/ and state/ (defaults to $ALRUA_HOME or ./.alrua)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve once for the saved location and print the dashboard
    Show,
    /// Resolve, then print the clock and next event on every tick until Ctrl-C
    Watch,
    /// Switch to the device position
    Gps {
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Switch to a named city
    City {
        city: String,
        country: String,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Select the location mode and resolve it
    Mode { mode: ModeArg },
    /// Resolve the current mode again
    Refresh,
    /// List calculation methods and schools
    Methods,
    /// Set or toggle the theme
    Theme { theme: ThemeArg },
    /// Shift the lunar date by a number of days
    Adjust {
        #[arg(allow_hyphen_values = true)]
        delta: i32,
    },
}

#[derive(Args)]
struct SettingsArgs {
    /// Calculation method id (see `alrua methods`)
    #[arg(long)]
    method: Option<i64>,
    /// Jurisprudence school: 0 standard, 1 hanafi
    #[arg(long)]
    school: Option<i64>,
    /// Lunar date adjustment in days
    #[arg(long, allow_hyphen_values = true)]
    adjustment: Option<i32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Gps,
    City,
}

#[derive(Clone, Copy, ValueEnum)]
enum ThemeArg {
    Light,
    Dark,
    Toggle,
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn workspace_root(explicit: Option<PathBuf>) -> Result<PathBuf, String> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    std::env::current_dir()
        .map(|dir| dir.join(DEFAULT_WORKSPACE_DIR))
        .map_err(|error| error.to_string())
}

async fn run(cli: Cli) -> Result<(), String> {
    let root = workspace_root(cli.workspace)?;
    let state = Arc::new(AppState::new(root).map_err(|error| error.to_string())?);
    let json = cli.json;

    match cli.command {
        Commands::Show => {
            let response = start_impl(&state)
                .await
                .map_err(|error| state.command_error("start", &error))?;
            report_failure(&response);
            print_dashboard(&state, json)
        }
        Commands::Watch => watch(state, json).await,
        Commands::Gps { settings } => {
            let response =
                switch_to_gps_impl(&state, settings.method, settings.school, settings.adjustment)
                    .await
                    .map_err(|error| state.command_error("switch_to_gps", &error))?;
            report_failure(&response);
            print_dashboard(&state, json)
        }
        Commands::City {
            city,
            country,
            settings,
        } => {
            let response = switch_to_city_impl(
                &state,
                city,
                country,
                settings.method,
                settings.school,
                settings.adjustment,
            )
            .await
            .map_err(|error| state.command_error("switch_to_city", &error))?;
            report_failure(&response);
            print_dashboard(&state, json)
        }
        Commands::Mode { mode } => {
            let mode = match mode {
                ModeArg::Gps => "gps",
                ModeArg::City => "city",
            };
            let response = set_location_mode_impl(&state, mode.to_string())
                .await
                .map_err(|error| state.command_error("set_location_mode", &error))?;
            report_failure(&response);
            print_dashboard(&state, json)
        }
        Commands::Refresh => {
            let response = refresh_impl(&state)
                .await
                .map_err(|error| state.command_error("refresh", &error))?;
            report_failure(&response);
            print_dashboard(&state, json)
        }
        Commands::Methods => {
            let methods = list_calculation_methods_impl(&state)
                .map_err(|error| state.command_error("list_calculation_methods", &error))?;
            let schools = list_schools_impl(&state)
                .map_err(|error| state.command_error("list_schools", &error))?;
            if json {
                return print_json(&serde_json::json!({ "methods": methods, "schools": schools }));
            }
            println!("Calculation methods:");
            for method in methods {
                let marker = if method.selected { "*" } else { " " };
                println!(" {marker} {:>3}  {}", method.id, method.name);
            }
            println!("Schools:");
            for school in schools {
                let marker = if school.selected { "*" } else { " " };
                println!(" {marker} {:>3}  {}", school.id, school.name);
            }
            Ok(())
        }
        Commands::Theme { theme } => {
            let theme = match theme {
                ThemeArg::Toggle => toggle_theme_impl(&state),
                ThemeArg::Light => set_theme_impl(&state, "light".to_string()),
                ThemeArg::Dark => set_theme_impl(&state, "dark".to_string()),
            }
            .map_err(|error| state.command_error("theme", &error))?;
            print_value(json, "theme", &theme)
        }
        Commands::Adjust { delta } => {
            let days = adjust_calendar_impl(&state, delta)
                .map_err(|error| state.command_error("adjust_calendar", &error))?;
            print_value(json, "calendarAdjustment", &days)
        }
    }
}

async fn watch(state: Arc<AppState>, json: bool) -> Result<(), String> {
    let response = start_impl(&state)
        .await
        .map_err(|error| state.command_error("start", &error))?;
    report_failure(&response);
    print_dashboard(&state, json)?;

    let ticking = Arc::clone(&state);
    let mut last_line = String::new();
    let ticker = spawn_ticker(state.tick_interval(), move |_| {
        let next = match next_event_impl(&ticking) {
            Ok(next) => next,
            Err(error) => {
                ticking.command_error("next_event", &error);
                return;
            }
        };
        let line = if json {
            serde_json::to_string(&next).unwrap_or_default()
        } else {
            next_event_line(&next)
        };
        if line != last_line {
            println!("{line}");
            last_line = line;
        }
    });

    let signal = tokio::signal::ctrl_c().await;
    let ticks = ticker.shutdown().await;
    state.log_info("watch", &format!("stopped after {ticks} ticks"));
    signal.map_err(|error| error.to_string())
}

fn report_failure(response: &ResolutionResponse) {
    if let Some(error) = &response.error {
        eprintln!("warning: {error}");
    }
}

fn print_dashboard(state: &AppState, json: bool) -> Result<(), String> {
    let dashboard = dashboard_impl(state).map_err(|error| state.command_error("dashboard", &error))?;
    if json {
        return print_json(&dashboard);
    }
    print!("{}", render_dashboard(&dashboard));
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let rendered = serde_json::to_string_pretty(value).map_err(|error| error.to_string())?;
    println!("{rendered}");
    Ok(())
}

fn print_value<T: Serialize + std::fmt::Display>(json: bool, key: &str, value: &T) -> Result<(), String> {
    if json {
        return print_json(&serde_json::json!({ key: value }));
    }
    println!("{value}");
    Ok(())
}

fn next_event_line(next: &NextEventResponse) -> String {
    match &next.name {
        Some(name) if next.wraps_to_tomorrow => {
            format!("{}  next: {name} at {} (tomorrow)", next.clock, next.display_time)
        }
        Some(name) => format!("{}  next: {name} at {}", next.clock, next.display_time),
        None => format!("{}  next: {}", next.clock, next.display_time),
    }
}

fn render_dashboard(dashboard: &DashboardResponse) -> String {
    let mut out = String::new();
    let zone = if dashboard.time_zone.is_empty() {
        String::new()
    } else {
        format!(" ({})", dashboard.time_zone)
    };
    out.push_str(&format!("{}{zone}  [{}]\n", dashboard.location_name, dashboard.mode));
    if let Some(date) = &dashboard.calendar_date {
        out.push_str(&format!("{date}\n"));
    }
    out.push_str(&format!(
        "{} / {}\n",
        dashboard.calculation_method.name, dashboard.school.name
    ));

    for row in &dashboard.timings {
        let marker = if row.is_next { ">" } else { " " };
        out.push_str(&format!("{marker} {:<8} {:>8}\n", row.name, row.display_time));
    }
    out.push_str(&format!("{}\n", next_event_line(&dashboard.next_event)));
    if let Some(error) = &dashboard.error {
        out.push_str(&format!("error: {error}\n"));
    }
    out.push_str(&format!(
        "\n{}\n{} ({})\n",
        dashboard.verse.arabic, dashboard.verse.translation, dashboard.verse.reference
    ));
    out
}
