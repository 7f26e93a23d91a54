use std::sync::Arc;

use anyhow::bail;
use chrono::{Datelike, Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use habit_sync::api::{handlers, GatewayError};
use habit_sync::models::{HabitDraft, HabitMutation, TrendPeriod};
use habit_sync::sync::HabitCompletionView;
use habit_sync::{config::Config, storage::Database, AppState};

#[derive(Debug, Parser)]
#[command(name = "habit-sync", version, about = "Habit tracker client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and persist the issued session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and log in
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
    },
    /// Forget the persisted session
    Logout,
    /// Show today's completions, or another day's with --date
    Today {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show a week of completions and its analytics
    Week {
        /// First day of the week, defaults to this week's Monday
        #[arg(long)]
        start: Option<NaiveDate>,
    },
    /// Show monthly analytics, defaults to the current month
    Month {
        #[arg(long, requires = "month")]
        year: Option<i32>,
        #[arg(long, requires = "year")]
        month: Option<u32>,
    },
    /// Mark a habit completed (true) or not (false)
    Toggle {
        habit_id: String,
        #[arg(action = clap::ArgAction::Set)]
        completed: bool,
        /// Day to record, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List the habit catalog
    Habits,
    /// Add a habit to the catalog
    AddHabit {
        name: String,
        #[arg(long, default_value = "general")]
        category: String,
        #[arg(long)]
        physical: bool,
        #[arg(long, default_value_t = 7)]
        target_per_week: u8,
        #[arg(long, default_value_t = 5)]
        weight: u8,
    },
    /// Remove a habit from the catalog
    RemoveHabit { habit_id: String },
    /// Show today's statistics and recent trends
    Stats {
        #[arg(long)]
        monthly: bool,
        #[arg(long, default_value_t = 4)]
        lookback: u32,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let config = Config::load()?;
    let db = Database::open(&config.storage.data_dir)?;
    info!(data_dir = %config.storage.data_dir, base_url = %config.api.base_url, "Opened token store");

    let app = AppState::new(config, Arc::new(db))?;

    match run(&app, cli.command).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if let Some(gateway_error) = e.downcast_ref::<GatewayError>() {
                if app.end_if_expired(gateway_error).await {
                    eprintln!("Session expired, please log in again");
                    std::process::exit(2);
                }
            }
            Err(e)
        }
    }
}

async fn run(app: &AppState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            app.login(&email, &password).await?;
            println!("Logged in as {email}");
            return Ok(());
        }
        Command::Register {
            email,
            password,
            name,
        } => {
            app.register(&email, &password, &name).await?;
            println!("Registered and logged in as {email}");
            return Ok(());
        }
        Command::Logout => {
            app.logout().await;
            println!("Logged out");
            return Ok(());
        }
        _ => {}
    }

    if !app.session.is_authenticated().await {
        bail!("Not logged in, run `habit-sync login` first");
    }

    match command {
        Command::Today { date: None } => {
            let view = app.engine.load_today().await?;
            print_view(&view);
        }
        Command::Today { date: Some(date) } => {
            let view = handlers::date_entries(&app.gateway, date).await?;
            print_view(&view);
        }
        Command::Week { start } => {
            let start = start.unwrap_or_else(|| {
                let today = Local::now().date_naive();
                today - Duration::days(i64::from(today.weekday().num_days_from_monday()))
            });
            for view in handlers::week_entries(&app.gateway, start).await? {
                print_view(&view);
            }
            let analytics = handlers::week_analytics(&app.gateway, Some(start)).await?;
            println!("{}", serde_json::to_string_pretty(&analytics)?);
        }
        Command::Month { year, month } => {
            let analytics = handlers::month_analytics(&app.gateway, year.zip(month)).await?;
            println!("{}", serde_json::to_string_pretty(&analytics)?);
        }
        Command::Toggle {
            habit_id,
            completed,
            date,
        } => {
            let view = app.engine.load_today().await?;
            if view.entry(&habit_id).is_none() {
                bail!("No active habit with id {habit_id}");
            }
            if completed && !view.can_complete(&habit_id) {
                println!("Note: another physical habit is already done today");
            }

            app.engine
                .toggle(&habit_id, date.unwrap_or(view.date), completed)
                .await?;

            if let Some(view) = app.engine.view().await {
                print_view(&view);
            }
        }
        Command::Habits => {
            for habit in app.engine.load_habits().await? {
                let kind = if habit.is_physical { "physical" } else { "" };
                println!(
                    "{:<24} {:<28} {:<14} {}/week {}",
                    habit.id, habit.name, habit.category, habit.target_per_week, kind
                );
            }
        }
        Command::AddHabit {
            name,
            category,
            physical,
            target_per_week,
            weight,
        } => {
            let draft = HabitDraft {
                category,
                is_physical: physical,
                target_per_week,
                weight,
                ..HabitDraft::new(name)
            };
            app.engine.mutate(HabitMutation::Create(draft)).await?;
            println!("Added; {} habits", app.engine.habits().await.len());
        }
        Command::RemoveHabit { habit_id } => {
            app.engine
                .mutate(HabitMutation::Delete { id: habit_id })
                .await?;
            println!("Removed; {} habits", app.engine.habits().await.len());
        }
        Command::Stats { monthly, lookback } => {
            let period = if monthly {
                TrendPeriod::Monthly
            } else {
                TrendPeriod::Weekly
            };
            let today = handlers::today_stats(&app.gateway).await?;
            let trends = handlers::trends(&app.gateway, period, lookback).await?;
            println!("{}", serde_json::to_string_pretty(&today)?);
            println!("{}", serde_json::to_string_pretty(&trends)?);
        }
        Command::Login { .. } | Command::Register { .. } | Command::Logout => {}
    }

    Ok(())
}

fn print_view(view: &HabitCompletionView) {
    println!(
        "{}: {}/{} done ({:.1}%)",
        view.date, view.completion_count, view.total_habits, view.completion_rate
    );
    for entry in &view.entries {
        let mark = if entry.completed { "x" } else { " " };
        println!("  [{mark}] {:<24} {}", entry.habit_id, entry.name);
    }
}
