mod cli;
mod commands;
mod config;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::*;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lectio=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let format = cli.format;

    // Configure and level never touch the database
    match cli.command {
        Commands::Configure { database, show } => {
            return commands::configure::handle(database, show);
        }
        Commands::Level { xp } => return commands::balance::level(xp, format),
        _ => {}
    }

    let config = Config::load()?;
    let db = config.database_path(cli.db);
    tracing::debug!(db = %db.display(), "opening database");
    let engine = commands::open_engine(&db, config.engine)?;
    let now = Utc::now();

    match cli.command {
        Commands::Configure { .. } | Commands::Level { .. } => {}

        Commands::Init => commands::catalog::init(&db)?,

        Commands::Import { file } => commands::catalog::import(&engine, &file, format)?,

        Commands::Chest { command } => match command {
            ChestCommand::Open {
                user,
                content,
                key,
                seed,
            } => {
                commands::chest::open(&engine, &user, &content, key.as_deref(), seed, now, format)?;
            }
        },

        Commands::Wheel { command } => match command {
            WheelCommand::Spin { user, paid, seed } => {
                commands::wheel::spin(&engine, &user, paid, seed, now, format)?;
            }
            WheelCommand::Simulate {
                trials,
                streak,
                date,
                seed,
            } => {
                commands::wheel::simulate(&engine, trials, streak, date, seed, format)?;
            }
        },

        Commands::Streak { command } => match command {
            StreakCommand::Show { user } => {
                commands::streak::show(&engine, &user, format)?;
            }
            StreakCommand::Recover { user } => {
                commands::streak::recover(&engine, &user, now, format)?;
            }
        },

        Commands::Progress { command } => {
            commands::progress::handle(&engine, command, now, format)?;
        }

        Commands::Balance { user } => {
            commands::balance::balance(&engine, &user, format)?;
        }
    }

    Ok(())
}
