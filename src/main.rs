use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use chrono::{Datelike, NaiveDate, NaiveTime};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use social_scheduler::bulk::{BulkAction, BulkExecutor, StaggerOptions};
use social_scheduler::calendar::{self, MonthRef};
use social_scheduler::config::{self, Config, MAX_PAGE_SIZE};
use social_scheduler::dashboard::{
    Dashboard, LiveRefresh, PostActionOutcome, SortDirection, SortField,
};
use social_scheduler::error::describe;
use social_scheduler::events::{NoopEvents, ViewEvents};
use social_scheduler::model::{NewPost, Post, PostStatus};
use social_scheduler::schedule::{self, ScheduleForm};
use social_scheduler::store::{HttpPostStore, PostStore};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List one page of posts with the actions available for each
    Posts {
        #[arg(long, value_parser = parse_status)]
        status: Option<PostStatus>,
        /// Zero-based page index
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, value_enum, default_value_t = SortArg::Created)]
        sort: SortArg,
        /// Sort ascending instead of descending
        #[arg(long)]
        asc: bool,
    },
    /// Print the month grid, and optionally one day's posts
    Calendar {
        /// Month as YYYY-MM; defaults to the current month
        #[arg(long, value_parser = parse_month)]
        month: Option<MonthRef>,
        /// Day of month to list
        #[arg(long)]
        day: Option<u32>,
    },
    /// Create a draft post
    Create {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_delimiter = ',')]
        hashtags: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        images: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        platforms: Vec<String>,
        #[arg(long)]
        product_id: Option<String>,
        /// 0 to 10; larger values are clamped
        #[arg(long, default_value_t = 0)]
        priority: u8,
    },
    /// Schedule a single post
    Schedule {
        post_id: String,
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        #[arg(long, value_parser = parse_time)]
        time: Option<NaiveTime>,
        #[arg(long, value_delimiter = ',')]
        platforms: Option<Vec<String>>,
    },
    /// Apply one action to several posts
    Bulk {
        #[arg(value_enum)]
        action: BulkArg,
        /// Comma-separated post ids, in the order they should be processed
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        platforms: Option<Vec<String>>,
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        #[arg(long, value_parser = parse_time)]
        time: Option<NaiveTime>,
        /// Minutes between consecutive posts; omit to schedule all at once
        #[arg(long, num_args = 0..=1, default_missing_value = "0")]
        stagger: Option<u32>,
    },
    /// Retry a failed post
    Retry { post_id: String },
    /// Cancel a scheduled post
    Cancel { post_id: String },
    /// Keep refreshing the queue summary until interrupted
    Watch,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Created,
    Scheduled,
    Status,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BulkArg {
    Publish,
    Schedule,
    Delete,
    Duplicate,
}

struct LogEvents;

impl ViewEvents for LogEvents {
    fn on_post_scheduled(&self, post: &Post) {
        info!(post_id = %post.id, title = %post.title, "post scheduled");
    }

    fn on_refresh(&self) {
        info!("post list refreshed");
    }
}

fn parse_status(s: &str) -> Result<PostStatus, String> {
    PostStatus::parse_status(s).ok_or_else(|| format!("unknown status '{}'", s))
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| e.to_string())
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M").map_err(|e| e.to_string())
}

fn parse_month(s: &str) -> Result<MonthRef, String> {
    let (y, m) = s
        .split_once('-')
        .ok_or_else(|| "expected YYYY-MM".to_string())?;
    let year = y.parse::<i32>().map_err(|e| e.to_string())?;
    let month = m.parse::<u32>().map_err(|e| e.to_string())?;
    MonthRef::new(year, month).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;

    let store: Arc<dyn PostStore> = Arc::new(HttpPostStore::from_config(&cfg)?);
    let events: Arc<dyn ViewEvents> = Arc::new(LogEvents);

    match args.command {
        Command::Posts {
            status,
            page,
            sort,
            asc,
        } => {
            let mut dash = Dashboard::new(store, events, cfg.dashboard.clone());
            dash.filter_by_status(status).await;
            if page > 0 {
                dash.go_to_page(page).await;
            }
            let field = match sort {
                SortArg::Created => SortField::CreatedAt,
                SortArg::Scheduled => SortField::ScheduledAt,
                SortArg::Status => SortField::Status,
            };
            if dash.sort().field != field {
                dash.sort_by(field);
            }
            let wanted = if asc { SortDirection::Asc } else { SortDirection::Desc };
            if dash.sort().direction != wanted {
                dash.sort_by(field);
            }
            print_dashboard(&dash)?;
        }
        Command::Calendar { month, day } => {
            let month = month.unwrap_or_else(MonthRef::current);
            let posts = load_posts(&cfg, store).await?;
            let grid = calendar::build_month(month, &posts);
            println!("{}", grid.month().title());
            println!(" Su  Mo  Tu  We  Th  Fr  Sa");
            for week in grid.weeks() {
                let line: Vec<String> = week
                    .iter()
                    .map(|d| {
                        let mark = if d.is_today {
                            '*'
                        } else if d.is_empty() {
                            ' '
                        } else {
                            '+'
                        };
                        if d.is_current_month {
                            format!("{:>3}{}", d.date.day(), mark)
                        } else {
                            "    ".to_string()
                        }
                    })
                    .collect();
                println!("{}", line.join(""));
            }
            if let Some(day) = day {
                let cell = grid
                    .day_of_month(day)
                    .ok_or_else(|| anyhow!("{} has no day {}", grid.month().title(), day))?;
                println!();
                println!("{}", cell.date.format("%A, %B %-d"));
                for line in grid.agenda(cell.date).lines() {
                    println!("  {}", line);
                }
            }
        }
        Command::Create {
            title,
            description,
            hashtags,
            images,
            platforms,
            product_id,
            priority,
        } => {
            let post = NewPost {
                description,
                hashtags,
                images,
                target_platforms: platforms,
                product_id,
                ..NewPost::draft(title)
            }
            .with_priority(priority);
            let created = store
                .create_post(&post)
                .await
                .map_err(|err| anyhow!(describe(&err)))?;
            events.on_refresh();
            println!("Created draft {} ({})", created.id, created.title);
        }
        Command::Schedule {
            post_id,
            date,
            time,
            platforms,
        } => {
            let posts = load_posts(&cfg, store.clone()).await?;
            let post = posts
                .iter()
                .find(|p| p.id == post_id)
                .ok_or_else(|| anyhow!("post {} is not in the current list", post_id))?;
            let form = ScheduleForm {
                date,
                time,
                platforms,
            };
            match schedule::schedule_post(store.as_ref(), events.as_ref(), post, &form).await {
                Ok(result) => println!("Scheduled {} ({:?})", post.title, result.status),
                Err(err) => return Err(anyhow!(describe(&err))),
            }
        }
        Command::Bulk {
            action,
            ids,
            platforms,
            date,
            time,
            stagger,
        } => {
            let action = match action {
                BulkArg::Publish => BulkAction::Publish { platforms },
                BulkArg::Schedule => BulkAction::Schedule {
                    form: ScheduleForm {
                        date,
                        time,
                        platforms,
                    },
                    stagger: match stagger {
                        None => StaggerOptions::off(),
                        Some(0) => StaggerOptions::every(cfg.scheduling.default_stagger_minutes),
                        Some(m) => StaggerOptions::every(m.min(cfg.scheduling.max_stagger_minutes)),
                    },
                },
                BulkArg::Delete => BulkAction::Delete,
                BulkArg::Duplicate => BulkAction::Duplicate,
            };
            let executor = BulkExecutor::new(store.clone());
            let mut dash = Dashboard::new(store, events, page_all(&cfg));
            dash.load().await;
            for id in &ids {
                dash.select(id);
            }
            match dash.run_bulk(&executor, &action).await {
                Some(report) => {
                    println!("{}", report.summary());
                    for item in report.failures() {
                        println!("  {}: {}", item.post_id, item.error().unwrap_or_default());
                    }
                }
                None => return Err(anyhow!(dash.error().unwrap_or_default().to_string())),
            }
        }
        Command::Retry { post_id } => {
            let mut dash = Dashboard::new(store, events, page_all(&cfg));
            dash.load().await;
            report_action("Retry", &post_id, dash.retry(&post_id).await)?;
        }
        Command::Cancel { post_id } => {
            let mut dash = Dashboard::new(store, events, page_all(&cfg));
            dash.load().await;
            report_action("Cancel", &post_id, dash.cancel(&post_id).await)?;
        }
        Command::Watch => {
            let dash = Arc::new(Mutex::new(Dashboard::new(
                store,
                events,
                cfg.dashboard.clone(),
            )));
            dash.lock().await.load().await;
            let every = dash.lock().await.refresh_interval();
            let live = LiveRefresh::spawn(&dash, every);
            let mut ticker = tokio::time::interval(every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => print_summary(&*dash.lock().await),
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            live.stop();
        }
    }
    Ok(())
}

fn page_all(cfg: &Config) -> config::DashboardSettings {
    config::DashboardSettings {
        page_size: MAX_PAGE_SIZE,
        ..cfg.dashboard.clone()
    }
}

async fn load_posts(cfg: &Config, store: Arc<dyn PostStore>) -> Result<Vec<Post>> {
    let mut dash = Dashboard::new(store, Arc::new(NoopEvents), page_all(cfg));
    dash.load().await;
    if let Some(err) = dash.error() {
        return Err(anyhow!(err.to_string()));
    }
    Ok(dash.posts().to_vec())
}

fn report_action(label: &str, post_id: &str, outcome: PostActionOutcome) -> Result<()> {
    match outcome {
        PostActionOutcome::Completed => {
            println!("{} requested for {}", label, post_id);
            Ok(())
        }
        PostActionOutcome::NotOffered => Err(anyhow!("{} is not available for {}", label, post_id)),
        PostActionOutcome::Failed(msg) => Err(anyhow!(msg)),
    }
}

fn print_dashboard(dash: &Dashboard) -> Result<()> {
    if let Some(err) = dash.error() {
        return Err(anyhow!(err.to_string()));
    }
    println!(
        "page {}/{} ({} posts)",
        dash.query().page() + 1,
        dash.page_count().max(1),
        dash.total()
    );
    for post in dash.rows() {
        let when = post
            .scheduled_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into());
        let actions: Vec<String> = post
            .status
            .available_actions()
            .iter()
            .map(|a| format!("{:?}", a).to_lowercase())
            .collect();
        println!(
            "{:<24} {:<11} {:<16} {:<32} {}",
            post.id,
            post.status.as_str(),
            when,
            post.title,
            actions.join(",")
        );
    }
    print_summary(dash);
    Ok(())
}

fn print_summary(dash: &Dashboard) {
    let stats = dash.stats();
    let statuses: Vec<String> = stats
        .by_status
        .iter()
        .map(|(s, n)| format!("{}={}", s, n))
        .collect();
    println!("status: {}", statuses.join(" "));
    for (platform, t) in &stats.by_platform {
        println!(
            "  {:<12} published={} failed={} pending={}",
            platform, t.published, t.failed, t.pending
        );
    }
    if let Some(err) = dash.error() {
        println!("error: {}", err);
    }
}
