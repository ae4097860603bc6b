// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only reporting commands: today, month, breakdown, trend, session,
//! status, check, suggest and models.

use chrono::{Duration, NaiveDate};
use clap::Args;
use halo_core::HaloError;
use halo_cost::{
    CategoryCost, EnforcementDecision, PeriodStatus, UsageMeter, default_session_window,
};
use serde::Serialize;

use crate::output::{Level, Output, bar, usd};

/// Exit code of `halo check` when new work should be refused.
pub const EXIT_BLOCKED: i32 = 2;

#[derive(Args, Debug)]
pub struct BreakdownArgs {
    /// Start of the window (YYYY-MM-DD). Defaults to the first of this month.
    #[arg(long)]
    pub since: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub struct TrendArgs {
    /// Number of days, ending today (1 to 3660).
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=3660))]
    pub days: u32,
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Window length in minutes. Defaults to one hour.
    #[arg(long)]
    pub minutes: Option<i64>,
}

/// Run the `halo today` command.
pub fn run_today(meter: &UsageMeter, out: &Output) -> Result<(), HaloError> {
    let today = meter.today_summary();
    if out.is_json() {
        return out.print_json(&today);
    }

    out.heading(&format!("today ({})", today.date));
    out.field("Cost", usd(today.total_cost));
    out.field("Operations", today.operation_count);
    out.field(
        "Tokens",
        format!(
            "{} ({} in / {} out / {} cached)",
            today.tokens.total, today.tokens.input, today.tokens.output, today.tokens.cached
        ),
    );
    if !today.by_operation.is_empty() {
        out.blank();
        for (kind, cost) in &today.by_operation {
            out.field(&kind.to_string(), usd(*cost));
        }
    }
    if !today.by_model.is_empty() {
        out.blank();
        for (model, cost) in &today.by_model {
            println!("    {model:<32}{}", usd(*cost));
        }
    }
    let busiest = today
        .by_hour
        .iter()
        .enumerate()
        .filter(|(_, cost)| **cost > 0.0)
        .max_by(|a, b| a.1.total_cmp(b.1));
    if let Some((hour, cost)) = busiest {
        out.blank();
        out.field("Busiest hour", format!("{hour:02}:00 ({})", usd(*cost)));
    }
    out.blank();
    Ok(())
}

/// Run the `halo month` command.
pub fn run_month(meter: &UsageMeter, out: &Output) -> Result<(), HaloError> {
    let cost = meter.month_to_date_cost();
    if out.is_json() {
        #[derive(Serialize)]
        struct Month {
            month_to_date: f64,
        }
        return out.print_json(&Month {
            month_to_date: cost,
        });
    }
    out.heading("month to date");
    out.field("Cost", usd(cost));
    out.blank();
    Ok(())
}

/// Run the `halo breakdown` command.
pub fn run_breakdown(
    meter: &UsageMeter,
    args: BreakdownArgs,
    out: &Output,
) -> Result<(), HaloError> {
    let breakdown = match args.since {
        Some(date) => meter.breakdown(meter.calendar().start_of_day(date)),
        None => meter.month_breakdown(),
    };
    if out.is_json() {
        return out.print_json(&breakdown);
    }

    out.heading(&format!("breakdown since {}", breakdown.window_start));
    out.field("Total", usd(breakdown.total));
    print_categories(out, "By operation", &breakdown.by_operation);
    print_categories(out, "By model", &breakdown.by_model);
    out.blank();
    out.field("Cache saved", format!("~{}", usd(breakdown.savings.from_caching)));
    out.field("Could save", format!("~{}", usd(breakdown.savings.potential)));
    out.blank();
    Ok(())
}

fn print_categories(out: &Output, title: &str, categories: &[CategoryCost]) {
    out.blank();
    println!("    {title}");
    for category in categories {
        println!(
            "      {:<32}{:>10}  {} {:>5.1}%",
            category.category,
            usd(category.cost),
            bar(category.percentage, 20),
            category.percentage
        );
    }
}

/// Run the `halo trend` command.
pub fn run_trend(meter: &UsageMeter, args: TrendArgs, out: &Output) -> Result<(), HaloError> {
    let trend = meter.trend(args.days);
    if out.is_json() {
        return out.print_json(&trend);
    }

    let peak = trend.iter().map(|p| p.cost).fold(0.0, f64::max);
    out.heading(&format!("last {} days", args.days));
    for point in &trend {
        let share = if peak > 0.0 { point.cost / peak * 100.0 } else { 0.0 };
        println!(
            "    {}  {:>10}  {:>4} ops  {}",
            point.date,
            usd(point.cost),
            point.operations,
            bar(share, 24)
        );
    }
    out.blank();
    Ok(())
}

/// Run the `halo session` command.
pub fn run_session(meter: &UsageMeter, args: SessionArgs, out: &Output) -> Result<(), HaloError> {
    let window = match args.minutes {
        Some(minutes) if minutes > 0 => Duration::try_minutes(minutes).ok_or_else(|| {
            HaloError::invalid("minutes", format!("window of {minutes} minutes is too long"))
        })?,
        Some(minutes) => {
            return Err(HaloError::invalid(
                "minutes",
                format!("window must be positive, got {minutes}"),
            ));
        }
        None => default_session_window(),
    };
    let cost = meter.session_cost(window);
    if out.is_json() {
        #[derive(Serialize)]
        struct Session {
            window_minutes: i64,
            cost: f64,
        }
        return out.print_json(&Session {
            window_minutes: window.num_minutes(),
            cost,
        });
    }
    out.heading(&format!("last {} minutes", window.num_minutes()));
    out.field("Cost", usd(cost));
    out.blank();
    Ok(())
}

#[derive(Serialize)]
struct StatusReport {
    status: halo_cost::BudgetStatus,
    decision: EnforcementDecision,
}

/// Run the `halo status` command.
pub fn run_status(meter: &UsageMeter, out: &Output) -> Result<(), HaloError> {
    let report = StatusReport {
        status: meter.status(),
        decision: meter.evaluate(),
    };
    if out.is_json() {
        return out.print_json(&report);
    }

    out.heading("budget status");
    print_period(out, "Daily", &report.status.daily);
    print_period(out, "Monthly", &report.status.monthly);
    out.blank();
    print_decision(out, &report.decision);
    out.blank();
    Ok(())
}

fn print_period(out: &Output, label: &str, period: &PeriodStatus) {
    match period.limit {
        Some(limit) => {
            let level = if period.used >= limit {
                Level::Fail
            } else if period.warning {
                Level::Warn
            } else {
                Level::Ok
            };
            out.field(
                label,
                format!(
                    "{} {} of {} {} {:.0}%",
                    out.marker(level),
                    usd(period.used),
                    usd(limit),
                    bar(period.percentage, 20),
                    period.percentage
                ),
            );
        }
        None => out.field(label, format!("{} (no limit)", usd(period.used))),
    }
}

fn print_decision(out: &Output, decision: &EnforcementDecision) {
    match decision {
        EnforcementDecision::Ok => {
            out.field("Decision", format!("{} within budget", out.marker(Level::Ok)));
        }
        EnforcementDecision::Warning { message, .. } => {
            out.field("Decision", format!("{} {message}", out.marker(Level::Warn)));
        }
        EnforcementDecision::Blocked { message, .. } => {
            out.field("Decision", format!("{} {message}", out.marker(Level::Fail)));
        }
    }
}

/// Run the `halo check` command. Returns the exit code.
pub fn run_check(meter: &UsageMeter, out: &Output) -> Result<i32, HaloError> {
    let decision = meter.evaluate();
    let code = if decision.is_blocked() { EXIT_BLOCKED } else { 0 };
    if out.is_json() {
        out.print_json(&decision)?;
    } else {
        print_decision(out, &decision);
    }
    Ok(code)
}

/// Run the `halo suggest` command.
pub fn run_suggest(meter: &UsageMeter, out: &Output) -> Result<(), HaloError> {
    let suggestions = meter.suggestions();
    if out.is_json() {
        return out.print_json(&suggestions);
    }

    out.heading("suggestions");
    if suggestions.is_empty() {
        println!("    Nothing to suggest.");
    }
    for suggestion in &suggestions {
        println!(
            "    [{}] {} (saves ~{})",
            suggestion.kind,
            suggestion.description,
            usd(suggestion.estimated_savings)
        );
    }
    out.blank();
    Ok(())
}

#[derive(Serialize)]
struct ModelEntry<'a> {
    model: &'a str,
    default: bool,
    #[serde(flatten)]
    rate: halo_cost::ModelRate,
}

/// Run the `halo models` command.
pub fn run_models(meter: &UsageMeter, out: &Output) -> Result<(), HaloError> {
    let pricing = meter.pricing();
    let entries: Vec<ModelEntry<'_>> = pricing
        .models()
        .into_iter()
        .map(|(model, rate)| ModelEntry {
            model,
            default: model == pricing.default_model(),
            rate,
        })
        .collect();
    if out.is_json() {
        return out.print_json(&entries);
    }

    out.heading("pricing (USD per million tokens)");
    println!(
        "    {:<32}{:>9}{:>9}{:>9}  tier",
        "model", "input", "output", "cached"
    );
    for entry in &entries {
        println!(
            "    {:<32}{:>9.3}{:>9.3}{:>9.3}  {}{}",
            entry.model,
            entry.rate.input_per_mtok,
            entry.rate.output_per_mtok,
            entry.rate.cached_per_mtok,
            entry.rate.tier,
            if entry.default { " (default)" } else { "" }
        );
    }
    out.blank();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use halo_config::HaloConfig;
    use halo_storage::MemoryStore;
    use std::sync::Arc;

    async fn meter() -> UsageMeter {
        let (meter, _) = UsageMeter::open(Arc::new(MemoryStore::new()), &HaloConfig::default())
            .await
            .unwrap();
        meter
    }

    #[tokio::test]
    async fn check_passes_on_empty_ledger() {
        let meter = meter().await;
        let out = Output::new(true, true);
        assert_eq!(run_check(&meter, &out).unwrap(), 0);
    }

    #[tokio::test]
    async fn session_window_must_be_positive() {
        let meter = meter().await;
        let out = Output::new(true, true);
        let err = run_session(&meter, SessionArgs { minutes: Some(0) }, &out).unwrap_err();
        assert!(matches!(err, HaloError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn oversized_session_window_is_rejected() {
        let meter = meter().await;
        let out = Output::new(true, true);
        let err = run_session(
            &meter,
            SessionArgs {
                minutes: Some(i64::MAX),
            },
            &out,
        )
        .unwrap_err();
        assert!(matches!(err, HaloError::InvalidInput { .. }));
        // Long but representable windows still report.
        run_session(
            &meter,
            SessionArgs {
                minutes: Some(60_000_000_000),
            },
            &out,
        )
        .unwrap();
    }

    #[test]
    fn trend_days_are_bounded() {
        use clap::Parser;

        #[derive(Parser)]
        struct Wrapper {
            #[command(flatten)]
            trend: TrendArgs,
        }

        assert_eq!(Wrapper::try_parse_from(["trend"]).unwrap().trend.days, 7);
        assert!(Wrapper::try_parse_from(["trend", "--days", "3660"]).is_ok());
        assert!(Wrapper::try_parse_from(["trend", "--days", "0"]).is_err());
        assert!(Wrapper::try_parse_from(["trend", "--days", "4000000000"]).is_err());
    }

    #[tokio::test]
    async fn reports_render_on_empty_ledger() {
        let meter = meter().await;
        for json in [true, false] {
            let out = Output::new(json, true);
            run_today(&meter, &out).unwrap();
            run_month(&meter, &out).unwrap();
            run_breakdown(&meter, BreakdownArgs { since: None }, &out).unwrap();
            run_trend(&meter, TrendArgs { days: 3 }, &out).unwrap();
            run_status(&meter, &out).unwrap();
            run_suggest(&meter, &out).unwrap();
            run_models(&meter, &out).unwrap();
        }
    }
}
