//! SmartCost CLI
//!
//! Command-line interface for the SmartCost cost collection service.

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use smartcost::alerting::AlertRepository;
use smartcost::api::HttpServer;
use smartcost::collector::Collector;
use smartcost::dashboard::DashboardService;
use smartcost::db::{CostRepository, Database};
use smartcost::models::BudgetAlertInput;
use smartcost::Config;

/// SmartCost - Cloud cost tracking and budget alerts
#[derive(Parser)]
#[command(name = "smartcost")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server and the scheduled collector
    Serve {
        /// HTTP API port
        #[arg(long, default_value = "8080", env = "SMARTCOST_HTTP_PORT")]
        http_port: u16,

        /// Disable the scheduled collector (serve the API only)
        #[arg(long)]
        no_collector: bool,
    },

    /// Run one collection cycle and exit
    Collect {
        /// Subscription to collect (defaults to SMARTCOST_SUBSCRIPTION_ID)
        #[arg(long)]
        subscription: Option<String>,
    },

    /// Manage budget alerts
    Alerts {
        #[command(subcommand)]
        command: AlertsCommands,
    },

    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand)]
enum AlertsCommands {
    /// List budget alerts for a subscription
    List {
        /// Subscription ID
        subscription: String,
    },

    /// Create a new budget alert
    Create {
        /// Subscription ID the alert watches
        #[arg(long)]
        subscription: String,

        /// Alert name
        #[arg(long)]
        name: String,

        /// Monthly budget amount
        #[arg(long)]
        amount: f64,

        /// Threshold as a percentage of the budget
        #[arg(long, default_value = "80")]
        threshold: f64,

        /// Email address to notify
        #[arg(long)]
        email: String,
    },

    /// Delete a budget alert
    Delete {
        /// Alert ID to delete
        alert_id: Uuid,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env();

    let log_level = if cli.verbose {
        "debug".to_string()
    } else {
        config.logging.level.clone()
    };
    let subscriber = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
    );
    if config.logging.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let result = match cli.command {
        Commands::Serve {
            http_port,
            no_collector,
        } => run_serve(config, http_port, no_collector).await,
        Commands::Collect { subscription } => run_collect(config, subscription).await,
        Commands::Alerts { command } => run_alerts(config, command).await,
        Commands::Db { command } => run_db(config, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run_serve(mut config: Config, http_port: u16, no_collector: bool) -> anyhow::Result<()> {
    config.server.http_port = http_port;

    let db = Arc::new(Database::new(&config).await?);
    db.migrate().await?;

    let collector = Arc::new(Collector::new(config.clone(), &db)?);
    let alert_repo = AlertRepository::new(&db.postgres);
    let dashboard = DashboardService::new(CostRepository::new(&db.postgres));

    if no_collector {
        info!("scheduled collector disabled");
    } else {
        let scheduled = Arc::clone(&collector);
        tokio::spawn(async move {
            if let Err(e) = scheduled.start().await {
                tracing::error!(error = %e, "scheduled collector stopped");
            }
        });
    }

    let addr = format!("{}:{}", config.server.host, config.server.http_port);
    HttpServer::new(collector, alert_repo, dashboard, db)
        .serve(&addr)
        .await?;

    Ok(())
}

async fn run_collect(config: Config, subscription: Option<String>) -> anyhow::Result<()> {
    config.validate_for_collection()?;
    let subscription_id = subscription
        .or_else(|| config.billing.default_subscription_id.clone())
        .ok_or_else(|| anyhow::anyhow!("no subscription ID given"))?;

    let db = Database::new(&config).await?;
    db.migrate().await?;

    let collector = Collector::new(config, &db)?;
    let report = collector.run_once(&subscription_id).await?;

    println!("Collection run for {}", report.subscription_id);
    println!("  records saved:          {}", report.records_saved);
    println!("  alerts triggered:       {}", report.alerts_triggered);
    println!("  notifications failed:   {}", report.notifications_failed);

    Ok(())
}

async fn run_alerts(config: Config, command: AlertsCommands) -> anyhow::Result<()> {
    let db = Database::new(&config).await?;
    db.migrate().await?;
    let repo = AlertRepository::new(&db.postgres);

    match command {
        AlertsCommands::List { subscription } => {
            let alerts = repo.list_for_subscription(&subscription).await?;
            if alerts.is_empty() {
                println!("No alerts for {subscription}");
                return Ok(());
            }
            for alert in alerts {
                println!(
                    "{}  {}  budget {:.2}  threshold {:.0}%  spend {:.2}  {}",
                    alert.id,
                    alert.name,
                    alert.amount,
                    alert.threshold_percent,
                    alert.current_spend,
                    if alert.is_active { "active" } else { "inactive" },
                );
            }
        }
        AlertsCommands::Create {
            subscription,
            name,
            amount,
            threshold,
            email,
        } => {
            let alert = repo
                .create(BudgetAlertInput {
                    subscription_id: subscription,
                    name,
                    amount,
                    threshold_percent: Some(threshold),
                    notify_email: email,
                    is_active: None,
                })
                .await?;
            println!("Created alert {} ({})", alert.id, alert.name);
        }
        AlertsCommands::Delete { alert_id } => {
            if repo.delete(alert_id).await? {
                println!("Deleted alert {alert_id}");
            } else {
                println!("No alert with ID {alert_id}");
            }
        }
    }

    Ok(())
}

async fn run_db(config: Config, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Migrate => {
            let db = Database::new(&config).await?;
            db.migrate().await?;
            println!("Migrations applied");
        }
    }
    Ok(())
}
