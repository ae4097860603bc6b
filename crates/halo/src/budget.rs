// SPDX-FileCopyrightText: 2026 Halo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `halo budget` command implementation.

use clap::{Args, Subcommand};
use halo_core::HaloError;
use halo_cost::{Budget, BudgetUpdate, UsageMeter};

use crate::output::{Output, usd};

#[derive(Subcommand, Debug)]
pub enum BudgetCommand {
    /// Show the budget in force.
    Show,
    /// Change some budget fields; the rest stay as they are.
    Set(SetArgs),
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Daily limit in USD.
    #[arg(long, conflicts_with = "no_daily")]
    pub daily: Option<f64>,

    /// Remove the daily limit.
    #[arg(long)]
    pub no_daily: bool,

    /// Monthly limit in USD.
    #[arg(long, conflicts_with = "no_monthly")]
    pub monthly: Option<f64>,

    /// Remove the monthly limit.
    #[arg(long)]
    pub no_monthly: bool,

    /// Warning threshold as a fraction of each limit (0 to 1).
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Advise refusing new work once a limit is reached.
    #[arg(long)]
    pub hard_stop: Option<bool>,

    /// Record that optimization suggestions may be applied automatically.
    #[arg(long)]
    pub auto_optimize: Option<bool>,
}

impl SetArgs {
    fn to_update(&self) -> BudgetUpdate {
        let limit = |value: Option<f64>, clear: bool| {
            if clear { Some(None) } else { value.map(Some) }
        };
        BudgetUpdate {
            daily_limit: limit(self.daily, self.no_daily),
            monthly_limit: limit(self.monthly, self.no_monthly),
            warning_threshold: self.threshold,
            hard_stop: self.hard_stop,
            auto_optimize: self.auto_optimize,
        }
    }
}

/// Run the `halo budget` command.
pub async fn run_budget(
    meter: &UsageMeter,
    command: BudgetCommand,
    out: &Output,
) -> Result<(), HaloError> {
    let budget = match command {
        BudgetCommand::Show => meter.get_budget(),
        BudgetCommand::Set(args) => {
            let update = args.to_update();
            if update.is_empty() {
                return Err(HaloError::invalid(
                    "budget",
                    "nothing to change; pass at least one option",
                ));
            }
            meter.set_budget(&update).await?
        }
    };

    if out.is_json() {
        return out.print_json(&budget);
    }
    print_budget(out, &budget);
    Ok(())
}

fn print_budget(out: &Output, budget: &Budget) {
    let limit = |value: Option<f64>| value.map(usd).unwrap_or_else(|| "none".to_string());
    out.heading("budget");
    out.field("Daily", limit(budget.daily_limit));
    out.field("Monthly", limit(budget.monthly_limit));
    out.field(
        "Warn at",
        format!("{:.0}%", budget.warning_threshold * 100.0),
    );
    out.field("Hard stop", budget.hard_stop);
    out.field("Auto-optimize", budget.auto_optimize);
    out.blank();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(subcommand)]
        command: BudgetCommand,
    }

    fn parse(args: &[&str]) -> Result<BudgetCommand, clap::Error> {
        let mut argv = vec!["budget"];
        argv.extend_from_slice(args);
        Wrapper::try_parse_from(argv).map(|w| w.command)
    }

    #[test]
    fn set_builds_a_partial_update() {
        let BudgetCommand::Set(args) = parse(&["set", "--daily", "5", "--no-monthly"]).unwrap()
        else {
            panic!("expected set");
        };
        let update = args.to_update();
        assert_eq!(update.daily_limit, Some(Some(5.0)));
        assert_eq!(update.monthly_limit, Some(None));
        assert_eq!(update.warning_threshold, None);
        assert_eq!(update.hard_stop, None);
    }

    #[test]
    fn hard_stop_takes_an_explicit_value() {
        let BudgetCommand::Set(args) = parse(&["set", "--hard-stop", "false"]).unwrap() else {
            panic!("expected set");
        };
        assert_eq!(args.to_update().hard_stop, Some(false));
    }

    #[test]
    fn setting_and_clearing_the_same_limit_conflicts() {
        assert!(parse(&["set", "--daily", "5", "--no-daily"]).is_err());
    }
}
