use clap::{Parser, Subcommand};
use dialoguer::{Input, Password, theme::ColorfulTheme};
use env_logger::Env;
use lostfilm_monitor::{
    AppConfig, Credentials, DirectorySink, JsonStore, LostFilmClient, Monitor, MonitorError,
    ProgressStore, Quality, RunEvent, SeasonNumber, SessionOrigin, SessionState, SessionStore,
    login,
};
use std::path::PathBuf;
use std::process;

#[derive(Debug, Parser)]
#[command(
    name = "lostfilm-monitor",
    about = "Follow shows on lostfilm.tv and download new episodes.",
    version
)]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Site mirror to talk to, overrides the config file
    #[arg(long, value_name = "DOMAIN", global = true)]
    domain: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start tracking a show by its lostfilm URL
    Add {
        #[arg(value_name = "URL")]
        url: String,
        /// Quality to download: SD, 720p or 1080p
        #[arg(short, long)]
        quality: Option<Quality>,
    },
    /// Stop tracking a show
    Remove {
        #[arg(value_name = "ID")]
        id: u64,
    },
    /// List tracked shows
    List,
    /// Check every tracked show and download new episodes
    Check {
        /// Directory for downloaded files, overrides the config file
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Log in and store the session
    Login,
    /// Set the last handled episode of a show
    SetProgress {
        #[arg(value_name = "ID")]
        id: u64,
        #[arg(value_name = "SEASON")]
        season: u32,
        #[arg(value_name = "EPISODE")]
        episode: u32,
    },
}

/// Handles run events and prints formatted output to stdout
fn handle_run_event(event: RunEvent) {
    match event {
        RunEvent::SessionReady { origin } => match origin {
            SessionOrigin::Restored => println!("Using stored session."),
            SessionOrigin::LoggedIn => println!("Logged in."),
        },
        RunEvent::RunStarted { show_count } => {
            println!("\n=== Checking {} show(s) ===", show_count);
        }
        RunEvent::ShowStarted {
            index,
            total,
            display_name,
        } => {
            println!("[{}/{}] {}", index + 1, total, display_name);
        }
        RunEvent::StatusChanged { old, new, .. } => {
            println!("  Status changed: {} -> {}", old, new);
        }
        RunEvent::Info { message, .. } => {
            println!("  {}", message);
        }
        RunEvent::Failed { message, .. } => {
            println!("  Failed: {}", message);
        }
        RunEvent::Downloaded {
            episode,
            destination,
            size,
            ..
        } => {
            println!(
                "  Downloaded season {}, episode {} ({}) to {}",
                episode.season,
                episode.number,
                humansize::format_size(size, humansize::DECIMAL),
                destination
            );
        }
        RunEvent::RunFinished { summary } => {
            println!(
                "\nCheck complete! {} episode(s) downloaded, {} failure(s).",
                summary.downloaded, summary.failed
            );
        }
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, MonitorError> {
    let path = match &cli.config {
        Some(path) => path.clone(),
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::load_or_default(&path)?;
    Ok(match &cli.domain {
        Some(domain) => config.with_domain(domain.clone()),
        None => config,
    })
}

/// Stored session with the configured settings applied, without logging in.
fn current_session(store: &JsonStore, config: &AppConfig) -> Result<SessionState, MonitorError> {
    let settings = config.session_settings();
    Ok(store
        .load_session()?
        .map(|stored| stored.with_overrides(&settings))
        .unwrap_or(settings))
}

fn prompt_credentials(config: &AppConfig) -> Result<Credentials, dialoguer::Error> {
    let theme = ColorfulTheme::default();
    let username = match config.account.username.clone() {
        Some(username) if !username.is_empty() => username,
        _ => Input::with_theme(&theme)
            .with_prompt("Email")
            .interact_text()?,
    };
    let password = Password::with_theme(&theme)
        .with_prompt("Password")
        .interact()?;
    Ok(Credentials { username, password })
}

fn run(cli: Cli) -> Result<(), MonitorError> {
    let config = load_config(&cli)?;
    let store = JsonStore::open()?;
    log::debug!("Using data directory {}", store.data_dir().display());

    match cli.command {
        Command::Add { url, quality } => {
            let client = LostFilmClient::new()?;
            let session = current_session(&store, &config)?;
            let sink = DirectorySink::new(&config.output_dir, config.filename_format.clone());
            let monitor = Monitor::new(&client, &store, &sink);

            let new_show = monitor.prepare_show(
                &session,
                &url,
                quality.unwrap_or(config.default_quality),
            )?;
            let tracked = store.add_show(new_show)?;
            println!(
                "Tracking #{}: {} in {}",
                tracked.id,
                tracked.display_name,
                tracked.progress.quality.label()
            );
        }
        Command::Remove { id } => {
            if store.remove_show(id)? {
                println!("Removed #{}", id);
            } else {
                println!("No tracked show #{}", id);
            }
        }
        Command::List => {
            let shows = store.list_shows()?;
            if shows.is_empty() {
                println!("No tracked shows.");
            }
            for show in shows {
                println!(
                    "#{:<4} {} [{}] {} {}",
                    show.id,
                    show.display_name,
                    show.progress.quality.label(),
                    show.progress.info().unwrap_or_else(|| "-".to_string()),
                    show.status
                );
            }
        }
        Command::Check { output_dir } => {
            let config = match output_dir {
                Some(dir) => config.with_output_dir(dir),
                None => config,
            };
            let client = LostFilmClient::new()?;
            let sink = DirectorySink::new(&config.output_dir, config.filename_format.clone());
            let monitor = Monitor::new(&client, &store, &sink);

            monitor.execute_with_login(
                &store,
                &config.session_settings(),
                config.credentials().as_ref(),
                handle_run_event,
            )?;
        }
        Command::Login => {
            let credentials = match config.credentials() {
                Some(credentials) => credentials,
                None => prompt_credentials(&config).unwrap_or_else(|e| {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }),
            };
            let client = LostFilmClient::new()?;
            let session = login(&client, &store, &credentials, config.session_settings())?;
            println!("Logged in to {}", session.domain);
        }
        Command::SetProgress {
            id,
            season,
            episode,
        } => {
            store.put_progress(
                id,
                SeasonNumber::Regular(season),
                episode,
                chrono::Utc::now(),
            )?;
            println!("Progress of #{} set to S{:02}E{:02}", id, season, episode);
        }
    }

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("\nError: {}", e);
        process::exit(1);
    }
}
