//! Monthly cloud spend guard
//!
//! Every cloud cleanup request is authorized against a running monthly spend
//! total with two thresholds: past the soft threshold requests degrade to the
//! economical tier, and past the hard cap (or when even the economical tier
//! would cross it) cloud cleanup is disabled entirely. Spend persists to disk
//! and resets when the calendar month rolls over.

use chrono::{DateTime, Datelike, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, warn};

use crate::transcript::CloudTier;

/// Per-1K-token USD pricing for each model tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
    pub premium_per_1k_tokens_usd: f64,
    pub economical_per_1k_tokens_usd: f64,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            premium_per_1k_tokens_usd: 0.005,
            economical_per_1k_tokens_usd: 0.0012,
        }
    }
}

/// Overall availability of cloud cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloudMode {
    Enabled,
    Degraded,
    Disabled,
}

/// Outcome of one authorization request
#[derive(Debug, Clone, PartialEq)]
pub struct CloudDecision {
    pub mode: CloudMode,
    pub tier: CloudTier,
    pub estimated_cost_usd: f64,
    pub reason: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedBudget {
    monthly_spend_usd: f64,
    last_reset_date: DateTime<Utc>,
}

pub struct BudgetGuard {
    pricing: Pricing,
    soft_degrade_threshold_usd: f64,
    hard_stop_threshold_usd: f64,
    storage_path: Option<PathBuf>,
    running_monthly_spend_usd: Mutex<f64>,
}

impl BudgetGuard {
    pub const DEFAULT_SOFT_THRESHOLD_USD: f64 = 6.5;
    pub const DEFAULT_HARD_THRESHOLD_USD: f64 = 8.0;

    pub fn new(
        pricing: Pricing,
        soft_degrade_threshold_usd: f64,
        hard_stop_threshold_usd: f64,
        starting_spend_usd: f64,
        storage_path: Option<PathBuf>,
    ) -> Self {
        let spend = match storage_path.as_deref().and_then(load_budget) {
            Some(loaded) if is_current_month(loaded.last_reset_date) => loaded.monthly_spend_usd,
            Some(_) => 0.0,
            None => starting_spend_usd,
        };

        Self {
            pricing,
            soft_degrade_threshold_usd,
            hard_stop_threshold_usd,
            storage_path,
            running_monthly_spend_usd: Mutex::new(spend),
        }
    }

    /// Decides whether a request of `estimated_tokens` may use the cloud, and
    /// at which tier.
    pub fn authorize(&self, estimated_tokens: u64) -> CloudDecision {
        let spend = *self.lock();

        if spend >= self.hard_stop_threshold_usd {
            return CloudDecision {
                mode: CloudMode::Disabled,
                tier: CloudTier::None,
                estimated_cost_usd: 0.0,
                reason: Some("Monthly cloud budget cap reached".to_string()),
            };
        }

        let premium_cost = estimate_cost(estimated_tokens, self.pricing.premium_per_1k_tokens_usd);
        let economical_cost =
            estimate_cost(estimated_tokens, self.pricing.economical_per_1k_tokens_usd);
        let projected_premium = spend + premium_cost;
        let projected_economical = spend + economical_cost;

        if projected_economical >= self.hard_stop_threshold_usd {
            return CloudDecision {
                mode: CloudMode::Disabled,
                tier: CloudTier::None,
                estimated_cost_usd: 0.0,
                reason: Some("Skipping cloud cleanup to avoid exceeding hard cap".to_string()),
            };
        }

        if spend >= self.soft_degrade_threshold_usd
            || projected_premium >= self.soft_degrade_threshold_usd
        {
            return CloudDecision {
                mode: CloudMode::Degraded,
                tier: CloudTier::Economical,
                estimated_cost_usd: economical_cost,
                reason: None,
            };
        }

        CloudDecision {
            mode: CloudMode::Enabled,
            tier: CloudTier::Premium,
            estimated_cost_usd: premium_cost,
            reason: None,
        }
    }

    /// Adds actual spend after a successful cloud call. Zero or negative
    /// amounts are ignored.
    pub fn record(&self, cost_usd: f64) {
        if cost_usd <= 0.0 {
            return;
        }
        {
            let mut spend = self.lock();
            *spend += cost_usd;
        }
        self.persist();
    }

    pub fn monthly_spend(&self) -> f64 {
        *self.lock()
    }

    pub fn effective_mode(&self) -> CloudMode {
        let spend = *self.lock();
        if spend >= self.hard_stop_threshold_usd {
            CloudMode::Disabled
        } else if spend >= self.soft_degrade_threshold_usd {
            CloudMode::Degraded
        } else {
            CloudMode::Enabled
        }
    }

    pub fn reset_month(&self) {
        *self.lock() = 0.0;
        self.persist();
    }

    fn persist(&self) {
        let Some(path) = self.storage_path.as_deref() else {
            return;
        };
        let budget = PersistedBudget {
            monthly_spend_usd: *self.lock(),
            last_reset_date: Utc::now(),
        };
        if let Err(e) = write_budget(path, &budget) {
            error!("budget persistence failed for {}: {e}", path.display());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, f64> {
        self.running_monthly_spend_usd
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for BudgetGuard {
    fn default() -> Self {
        Self::new(
            Pricing::default(),
            Self::DEFAULT_SOFT_THRESHOLD_USD,
            Self::DEFAULT_HARD_THRESHOLD_USD,
            0.0,
            None,
        )
    }
}

fn estimate_cost(tokens: u64, per_1k_usd: f64) -> f64 {
    (tokens as f64 / 1000.0) * per_1k_usd
}

fn is_current_month(date: DateTime<Utc>) -> bool {
    let then = date.with_timezone(&Local);
    let now = Local::now();
    then.year() == now.year() && then.month() == now.month()
}

fn load_budget(path: &Path) -> Option<PersistedBudget> {
    if !path.exists() {
        return None;
    }
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("budget load failed for {}: {e}", path.display());
            return None;
        }
    };
    match serde_json::from_slice(&data) {
        Ok(budget) => Some(budget),
        Err(e) => {
            warn!("budget decode failed for {}: {e}", path.display());
            None
        }
    }
}

fn write_budget(path: &Path, budget: &PersistedBudget) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let data = serde_json::to_vec_pretty(budget)?;
    // Write through a sibling temp file so a crash cannot truncate the real one.
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard_with_spend(spend: f64) -> BudgetGuard {
        BudgetGuard::new(
            Pricing::default(),
            BudgetGuard::DEFAULT_SOFT_THRESHOLD_USD,
            BudgetGuard::DEFAULT_HARD_THRESHOLD_USD,
            spend,
            None,
        )
    }

    #[test]
    fn test_low_spend_authorizes_premium() {
        let decision = guard_with_spend(1.0).authorize(1000);
        assert_eq!(decision.mode, CloudMode::Enabled);
        assert_eq!(decision.tier, CloudTier::Premium);
        assert!((decision.estimated_cost_usd - 0.005).abs() < 1e-9);
        assert!(decision.reason.is_none());
    }

    #[test]
    fn test_near_soft_threshold_degrades() {
        // 1000 premium tokens cost $0.005; 6.497 + 0.005 >= 6.5.
        let decision = guard_with_spend(6.497).authorize(1000);
        assert_eq!(decision.mode, CloudMode::Degraded);
        assert_eq!(decision.tier, CloudTier::Economical);
        assert!((decision.estimated_cost_usd - 0.0012).abs() < 1e-9);
    }

    #[test]
    fn test_past_soft_threshold_degrades() {
        let decision = guard_with_spend(7.0).authorize(100);
        assert_eq!(decision.mode, CloudMode::Degraded);
        assert_eq!(decision.tier, CloudTier::Economical);
    }

    #[test]
    fn test_hard_cap_disables_with_zero_cost() {
        let decision = guard_with_spend(8.0).authorize(1000);
        assert_eq!(decision.mode, CloudMode::Disabled);
        assert_eq!(decision.tier, CloudTier::None);
        assert_eq!(decision.estimated_cost_usd, 0.0);
        assert_eq!(
            decision.reason.as_deref(),
            Some("Monthly cloud budget cap reached")
        );
    }

    #[test]
    fn test_projected_economical_crossing_hard_cap_disables() {
        // 7.999 + economical cost of a large request crosses 8.0.
        let decision = guard_with_spend(7.9995).authorize(1_000_000);
        assert_eq!(decision.mode, CloudMode::Disabled);
        assert_eq!(
            decision.reason.as_deref(),
            Some("Skipping cloud cleanup to avoid exceeding hard cap")
        );
    }

    #[test]
    fn test_record_accumulates_and_ignores_non_positive() {
        let guard = guard_with_spend(0.0);
        guard.record(0.25);
        guard.record(0.0);
        guard.record(-1.0);
        assert!((guard.monthly_spend() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_effective_mode_bands() {
        assert_eq!(guard_with_spend(0.0).effective_mode(), CloudMode::Enabled);
        assert_eq!(guard_with_spend(6.5).effective_mode(), CloudMode::Degraded);
        assert_eq!(guard_with_spend(8.0).effective_mode(), CloudMode::Disabled);
    }

    #[test]
    fn test_reset_month() {
        let guard = guard_with_spend(7.5);
        guard.reset_month();
        assert_eq!(guard.monthly_spend(), 0.0);
        assert_eq!(guard.effective_mode(), CloudMode::Enabled);
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("budget.json");

        let guard = BudgetGuard::new(Pricing::default(), 6.5, 8.0, 0.0, Some(path.clone()));
        guard.record(2.5);

        let reloaded = BudgetGuard::new(Pricing::default(), 6.5, 8.0, 0.0, Some(path));
        assert!((reloaded.monthly_spend() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_stale_month_resets_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("budget.json");
        let stale = PersistedBudget {
            monthly_spend_usd: 5.0,
            last_reset_date: Utc::now() - chrono::Duration::days(62),
        };
        write_budget(&path, &stale).expect("write stale budget");

        let guard = BudgetGuard::new(Pricing::default(), 6.5, 8.0, 0.0, Some(path));
        assert_eq!(guard.monthly_spend(), 0.0);
    }

    #[test]
    fn test_corrupt_budget_file_tolerated() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("budget.json");
        std::fs::write(&path, b"{not json").expect("write corrupt file");

        let guard = BudgetGuard::new(Pricing::default(), 6.5, 8.0, 1.25, Some(path));
        // Corrupt file behaves like no file: the starting spend applies.
        assert!((guard.monthly_spend() - 1.25).abs() < 1e-9);
    }
}
