use aide_agent::Runtime;
use aide_core::{Config, Paths};
use aide_scheduler::{TaskStatus, TaskStore};
use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone, Utc};

const LOCAL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub async fn list(pending_only: bool) -> anyhow::Result<()> {
    let paths = Paths::new();
    let tasks = TaskStore::new(paths.tasks_file()).load().await?;

    if tasks.is_empty() {
        println!("No scheduled tasks.");
        return Ok(());
    }

    println!("{:<15} {:<20} {:<10} Description", "ID", "Fire At", "Status");
    println!("{}", "-".repeat(80));

    for task in tasks.iter().filter(|t| !pending_only || t.is_pending()) {
        let icon = match task.status {
            TaskStatus::Pending => "⏳",
            TaskStatus::Completed => "✅",
            TaskStatus::Error => "❌",
        };
        println!(
            "{:<15} {:<20} {} {:<8} {}",
            task.id,
            task.fire_at.with_timezone(&Local).format(LOCAL_FORMAT).to_string(),
            icon,
            task.status,
            truncate(&task.description, 40)
        );
        if let Some(err) = &task.error {
            println!("{:<15} ↳ {}", "", truncate(err, 60));
        }
    }

    Ok(())
}

pub async fn add(description: &str, at: Option<String>, delay: Option<String>) -> anyhow::Result<()> {
    let paths = Paths::new();
    paths.ensure_dirs()?;
    let config = Config::load_or_default(&paths)?;

    let fire_at = resolve_fire_at(at.as_deref(), delay.as_deref(), Utc::now())?;
    let runtime = Runtime::new(&config, &paths);
    let id = runtime.scheduler().schedule(description, fire_at).await?;

    println!(
        "✓ Scheduled task {} for {}",
        id,
        fire_at.with_timezone(&Local).format(LOCAL_FORMAT)
    );
    if fire_at <= Utc::now() {
        println!("  Already due: it runs on the daemon's next sweep.");
    }
    Ok(())
}

fn resolve_fire_at(at: Option<&str>, delay: Option<&str>, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    match (at, delay) {
        (Some(at), _) => parse_local(at),
        (None, Some(delay)) => now
            .checked_add_signed(parse_delay(delay)?)
            .ok_or_else(|| anyhow::anyhow!("--in '{}' lands past the representable date range", delay)),
        (None, None) => anyhow::bail!("Must specify --at or --in"),
    }
}

fn parse_local(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), LOCAL_FORMAT)
        .map_err(|e| anyhow::anyhow!("Invalid --at '{}': {} (expected YYYY-MM-DD HH:MM:SS)", s, e))?;
    let local = Local
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| anyhow::anyhow!("'{}' is ambiguous or skipped in the local timezone", s))?;
    Ok(local.with_timezone(&Utc))
}

/// "90s", "10m", "2h", "1d". A bare number is seconds.
fn parse_delay(s: &str) -> anyhow::Result<Duration> {
    let s = s.trim();
    let (digits, unit) = match s.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((i, _)) => s.split_at(i),
        None => (s, "s"),
    };
    let value: i64 = digits
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid --in '{}'", s))?;
    let delay = match unit {
        "s" => Duration::try_seconds(value),
        "m" => Duration::try_minutes(value),
        "h" => Duration::try_hours(value),
        "d" => Duration::try_days(value),
        _ => anyhow::bail!("Unknown unit in --in '{}' (use s, m, h or d)", s),
    };
    delay.ok_or_else(|| anyhow::anyhow!("--in '{}' is out of range", s))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
