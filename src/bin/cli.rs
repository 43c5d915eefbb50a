use anyhow::Context;
use clap::{Parser, Subcommand};
use mailgate::{
    clock::SystemClock,
    config::AppConfig,
    db,
    repositories::{SqliteUserRepository, UserRepository},
    services::{TokenCleanupService, UserService},
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mailgate-cli")]
#[command(about = "Maintenance commands for the mailgate signup service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verification token maintenance
    Tokens {
        #[command(subcommand)]
        command: TokenCommands,
    },
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Clear every verification token whose expiry has passed
    Cleanup,
}

#[derive(Subcommand)]
enum UserCommands {
    /// List all users
    List {
        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailgate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = AppConfig::from_env().context("Invalid configuration")?;
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    let user_repository: Arc<dyn UserRepository> = Arc::new(SqliteUserRepository::new(pool));

    match cli.command {
        Commands::Tokens {
            command: TokenCommands::Cleanup,
        } => {
            let cleanup = TokenCleanupService::new(user_repository, Arc::new(SystemClock));
            match cleanup.cleanup_expired_tokens().await {
                Ok(count) => {
                    println!("Successfully cleaned up {} expired tokens", count);
                    Ok(ExitCode::SUCCESS)
                }
                Err(_) => {
                    eprintln!("Error cleaning up tokens");
                    Ok(ExitCode::FAILURE)
                }
            }
        }

        Commands::User {
            command: UserCommands::List { limit, offset },
        } => {
            let user_service = UserService::new(user_repository);
            let users = user_service
                .list_users(Some(limit), Some(offset))
                .await
                .context("Failed to list users")?;

            if users.is_empty() {
                println!("No users found.");
                return Ok(ExitCode::SUCCESS);
            }

            println!(
                "{:<5} {:<20} {:<40} {:<7} {:<9} {:<20}",
                "ID", "Username", "Email", "Active", "Verified", "Created"
            );
            println!("{}", "-".repeat(106));
            for user in users {
                let verified = if user.email_verified {
                    "Yes"
                } else if user.has_pending_token {
                    "Pending"
                } else {
                    "No"
                };
                println!(
                    "{:<5} {:<20} {:<40} {:<7} {:<9} {:<20}",
                    user.id,
                    user.username,
                    user.email,
                    if user.is_active { "Yes" } else { "No" },
                    verified,
                    user.created_at.as_deref().unwrap_or("N/A")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
