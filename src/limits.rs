//! Per-stage rate limiting
//!
//! Quota is counted per (session, stage) against the ledger. Daily and
//! whole-session caps were retired; their fields survive as unlimited
//! sentinels (999) so older clients keep rendering usage meters.
//!
//! Check and record are separate ledger operations, so two concurrent
//! requests can both pass a check at limit-1 and land one interaction over
//! the cap. A stage quota overrun by one is accepted rather than serializing
//! requests through a transaction.

use crate::config::QuotaConfig;
use crate::db;
use crate::types::UsageStatus;
use anyhow::Result;
use rusqlite::Connection;

const UNLIMITED: u32 = 999;

/// Usage snapshot for a session, gated on `stage` when one is given.
/// `user_id` rides along for log context; quota itself is session-scoped.
pub fn check_rate_limits(
    conn: &Connection,
    quota: &QuotaConfig,
    _user_id: &str,
    session_id: &str,
    stage: Option<&str>,
) -> Result<UsageStatus> {
    let by_stage = db::stage_counts(conn, session_id)?;
    let session_usage = by_stage.values().sum();

    let stage_usage = stage
        .and_then(|s| by_stage.get(s))
        .copied()
        .unwrap_or(0);

    Ok(UsageStatus {
        stage_allowed: stage_usage < quota.stage_limit,
        stage_usage,
        stage_limit: quota.stage_limit,
        session_usage,
        stage_usage_by_stage: by_stage,
        daily_allowed: true,
        session_allowed: true,
        daily_usage: 0,
        daily_limit: UNLIMITED,
        session_limit: UNLIMITED,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_db_in_memory, insert_interaction};
    use crate::types::{InteractionRecord, TokenUsage};

    fn log_n(conn: &Connection, session: &str, stage: &str, n: u32) {
        for _ in 0..n {
            let record =
                InteractionRecord::new("u1", session, stage, TokenUsage::default(), 0.0);
            insert_interaction(conn, &record).unwrap();
        }
    }

    #[test]
    fn fresh_session_is_allowed() {
        let conn = init_db_in_memory().unwrap();
        let status =
            check_rate_limits(&conn, &QuotaConfig::default(), "u1", "s1", Some("root_cause"))
                .unwrap();
        assert!(status.stage_allowed);
        assert_eq!(status.stage_usage, 0);
        assert_eq!(status.stage_limit, 5);
        assert_eq!(status.session_usage, 0);
    }

    #[test]
    fn stage_blocks_at_its_limit_only() {
        let conn = init_db_in_memory().unwrap();
        log_n(&conn, "s1", "root_cause", 5);
        log_n(&conn, "s1", "perpetuation", 2);

        let blocked =
            check_rate_limits(&conn, &QuotaConfig::default(), "u1", "s1", Some("root_cause"))
                .unwrap();
        assert!(!blocked.stage_allowed);
        assert_eq!(blocked.stage_usage, 5);
        assert_eq!(blocked.session_usage, 7);

        let open =
            check_rate_limits(&conn, &QuotaConfig::default(), "u1", "s1", Some("perpetuation"))
                .unwrap();
        assert!(open.stage_allowed);
        assert_eq!(open.stage_usage, 2);
    }

    #[test]
    fn sessions_do_not_share_quota() {
        let conn = init_db_in_memory().unwrap();
        log_n(&conn, "s1", "root_cause", 5);
        let status =
            check_rate_limits(&conn, &QuotaConfig::default(), "u1", "s2", Some("root_cause"))
                .unwrap();
        assert!(status.stage_allowed);
        assert_eq!(status.stage_usage, 0);
    }

    #[test]
    fn no_stage_means_snapshot_only() {
        let conn = init_db_in_memory().unwrap();
        log_n(&conn, "s1", "root_cause", 5);
        let status = check_rate_limits(&conn, &QuotaConfig::default(), "u1", "s1", None).unwrap();
        assert!(status.stage_allowed);
        assert_eq!(status.stage_usage, 0);
        assert_eq!(status.session_usage, 5);
        assert_eq!(status.stage_usage_by_stage.get("root_cause"), Some(&5));
    }

    #[test]
    fn retired_caps_report_unlimited_sentinels() {
        let conn = init_db_in_memory().unwrap();
        let status = check_rate_limits(&conn, &QuotaConfig::default(), "u1", "s1", None).unwrap();
        assert!(status.daily_allowed);
        assert!(status.session_allowed);
        assert_eq!(status.daily_limit, 999);
        assert_eq!(status.session_limit, 999);
    }
}
