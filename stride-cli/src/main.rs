use clap::{Parser, Subcommand};
use stride_core::storage::{DataType, StorageManager};
use stride_core::Config;
use tracing::error;

/// Storage maintenance for stride data (local directory + S3 bucket).
#[derive(Parser)]
#[command(name = "stride")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show backend availability and bucket usage.
    Info,
    /// Merged usage for one user.
    Usage {
        user: String,
    },
    /// Merged listing for a namespace.
    List {
        /// One of: routes, fitness, models, training_data.
        data_type: String,
        /// Restrict to one user's namespace (default: the shared one).
        #[arg(long)]
        user: Option<String>,
    },
    /// Move local objects into the bucket.
    Migrate {
        /// Restrict to one user (default: everything).
        #[arg(long)]
        user: Option<String>,
    },
}

fn configure_logging() {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_target(false)
        .with_file(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() {
    configure_logging();
    let args = Args::parse();

    let config = Config::load();
    let manager = StorageManager::initialize(&config)
        .await
        .unwrap_or_else(|e| {
            error!("failed to initialize storage: {e}");
            std::process::exit(1);
        });

    let exit_code = match args.command {
        Command::Info => {
            let info = manager.info().await;
            print_json(&info)
        }
        Command::Usage { user } => {
            let usage = manager.usage(&user).await;
            print_json(&usage)
        }
        Command::List { data_type, user } => match DataType::from_tag(&data_type) {
            Some(data_type) => {
                let entries = manager.list(user.as_deref(), data_type).await;
                print_json(&entries)
            }
            None => {
                error!("unknown data type '{data_type}' (expected routes, fitness, models, or training_data)");
                2
            }
        },
        Command::Migrate { user } => {
            let report = manager.migrate_local_to_remote(user.as_deref()).await;
            let print_code = print_json(&report);
            if report.success {
                print_code
            } else {
                1
            }
        }
    };

    manager.shutdown();
    std::process::exit(exit_code);
}

fn print_json<T: serde::Serialize>(value: &T) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => {
            println!("{rendered}");
            0
        }
        Err(e) => {
            error!("failed to render output: {e}");
            1
        }
    }
}
