use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use poscontrol_core::models::EntityId;
use poscontrol_core::{ApiEnvelope, ApiGateway};
use serde::Serialize;

pub const USAGE: &str = "\
Usage: poscontrol <command>

Commands:
  login [username] [--remember]   Sign in and store the session
  logout                          Clear the stored session
  whoami                          Show the stored session user
  users                           List users
  stations                        List stations
  station <id>                    Show one station
  stores                          List stores
  history                         Show login history
  health                          Probe the backend

Environment:
  POSCONTROL_API_BASE_URL, POSCONTROL_TIMEOUT_SECS,
  POSCONTROL_QUARANTINED_USER_IDS, POSCONTROL_STORAGE, POSCONTROL_LOG_DIR";

#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Login { username: Option<String>, remember: bool },
    Logout,
    WhoAmI,
    Users,
    Stations,
    Station(EntityId),
    Stores,
    History,
    Health,
}

impl Command {
    pub fn parse(args: &[String]) -> Result<Self> {
        let Some(name) = args.first() else {
            return Ok(Command::Help);
        };
        let rest = &args[1..];

        let command = match name.as_str() {
            "help" | "--help" | "-h" => Command::Help,
            "login" => {
                let remember = rest.iter().any(|a| a == "--remember");
                let username = rest.iter().find(|a| !a.starts_with("--")).cloned();
                Command::Login { username, remember }
            }
            "logout" => Command::Logout,
            "whoami" => Command::WhoAmI,
            "users" => Command::Users,
            "stations" => Command::Stations,
            "station" => {
                let id = rest.first().context("station requires an id")?;
                Command::Station(EntityId::new(id.as_str()))
            }
            "stores" => Command::Stores,
            "history" => Command::History,
            "health" => Command::Health,
            other => bail!("Unknown command: {}\n\n{}", other, USAGE),
        };
        Ok(command)
    }

    fn needs_session(&self) -> bool {
        matches!(
            self,
            Command::Users | Command::Stations | Command::Station(_) | Command::Stores | Command::History
        )
    }
}

pub async fn run(command: Command, gateway: &ApiGateway) -> Result<()> {
    let session = gateway.session();
    if command.needs_session() && !session.ensure_valid() {
        bail!("Not logged in or session expired. Run `poscontrol login` first.");
    }

    match command {
        Command::Help => println!("{}", USAGE),
        Command::Login { username, remember } => login(gateway, username, remember).await?,
        Command::Logout => {
            session.logout()?;
            eprintln!("Logged out");
        }
        Command::WhoAmI => match session.current_user() {
            Some(user) => {
                print_json(&user)?;
                if session.is_token_expired() {
                    eprintln!("Warning: token has expired");
                }
            }
            None => bail!("Not logged in"),
        },
        Command::Users => print_envelope(gateway.get_all_users().await)?,
        Command::Stations => print_envelope(gateway.get_stations().await)?,
        Command::Station(id) => print_envelope(gateway.get_station(&id).await)?,
        Command::Stores => print_envelope(gateway.get_stores().await)?,
        Command::History => print_envelope(gateway.get_login_history().await)?,
        Command::Health => print_envelope(gateway.health().await)?,
    }
    Ok(())
}

async fn login(gateway: &ApiGateway, username: Option<String>, remember: bool) -> Result<()> {
    let session = gateway.session();

    let username = match username.or_else(|| session.remembered_username()) {
        Some(username) => username,
        None => {
            eprint!("Username: ");
            io::stderr().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line.trim().to_string()
        }
    };
    if username.is_empty() {
        bail!("Username is required");
    }

    let password = rpassword::prompt_password(format!("Password for {}: ", username))
        .context("Failed to read password")?;

    let user = gateway
        .login(&username, &password)
        .await
        .into_result()
        .map_err(|e| anyhow::anyhow!("Login failed: {}", e))?;

    if remember {
        session.remember_username(&username)?;
    }

    eprintln!("Logged in as {} ({})", user.display_name(), user.role);
    Ok(())
}

fn print_envelope<T: Serialize>(envelope: ApiEnvelope<T>) -> Result<()> {
    match envelope.into_result() {
        Ok(data) => print_json(&data),
        Err(e) => bail!(e),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
