//! Quota and expiry predicates. Pure functions of the stored row and the current time.

use crate::db::entities::{user, user_tunnel};
use crate::db::enums::EntityStatus;

/// Bytes per GiB; quotas are configured in GiB.
pub const GIB: i64 = 1 << 30;

/// Why an account or a user-tunnel association has to be suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    OverQuota,
    Expired,
    Disabled,
}

/// True when `used_bytes` strictly exceeds a non-zero quota. A quota of 0 is unlimited.
pub fn over_limit(quota_gib: i64, used_bytes: i64) -> bool {
    quota_gib > 0 && i128::from(used_bytes) > i128::from(quota_gib) * i128::from(GIB)
}

/// True when an expiry timestamp (epoch millis) is set and has passed.
pub fn expired(exp_time: Option<i64>, now_ms: i64) -> bool {
    matches!(exp_time, Some(ts) if ts > 0 && ts <= now_ms)
}

fn suspend_reason(
    quota_gib: i64,
    in_flow: i64,
    out_flow: i64,
    exp_time: Option<i64>,
    active: bool,
    now_ms: i64,
) -> Option<SuspendReason> {
    if over_limit(quota_gib, in_flow.saturating_add(out_flow)) {
        Some(SuspendReason::OverQuota)
    } else if expired(exp_time, now_ms) {
        Some(SuspendReason::Expired)
    } else if !active {
        Some(SuspendReason::Disabled)
    } else {
        None
    }
}

pub fn user_suspend_reason(user: &user::Model, now_ms: i64) -> Option<SuspendReason> {
    let active = user.status.is_none_or(|s| s == EntityStatus::Active);
    suspend_reason(user.flow, user.in_flow, user.out_flow, user.exp_time, active, now_ms)
}

pub fn user_tunnel_suspend_reason(
    user_tunnel: &user_tunnel::Model,
    now_ms: i64,
) -> Option<SuspendReason> {
    suspend_reason(
        user_tunnel.flow,
        user_tunnel.in_flow,
        user_tunnel.out_flow,
        user_tunnel.exp_time,
        user_tunnel.status == EntityStatus::Active,
        now_ms,
    )
}

pub fn must_suspend_user(user: &user::Model, now_ms: i64) -> bool {
    user_suspend_reason(user, now_ms).is_some()
}

pub fn must_suspend_user_tunnel(user_tunnel: &user_tunnel::Model, now_ms: i64) -> bool {
    user_tunnel_suspend_reason(user_tunnel, now_ms).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    fn user(flow: i64, in_flow: i64, out_flow: i64) -> user::Model {
        user::Model {
            id: 1,
            username: "alice".to_string(),
            flow,
            in_flow,
            out_flow,
            exp_time: None,
            status: Some(EntityStatus::Active),
            created_time: 0,
            updated_time: None,
        }
    }

    fn user_tunnel(flow: i64, used: i64) -> user_tunnel::Model {
        user_tunnel::Model {
            id: 1,
            user_id: 1,
            tunnel_id: 1,
            flow,
            in_flow: used,
            out_flow: 0,
            exp_time: None,
            status: EntityStatus::Active,
        }
    }

    #[test]
    fn test_zero_quota_is_unlimited() {
        assert!(!over_limit(0, 0));
        assert!(!over_limit(0, i64::MAX));
        assert!(!over_limit(-3, i64::MAX));
    }

    #[test]
    fn test_over_limit_is_strict() {
        assert!(!over_limit(10, 10 * GIB));
        assert!(over_limit(10, 10 * GIB + 1));
        assert!(!over_limit(i64::MAX, i64::MAX));
    }

    #[test]
    fn test_expired() {
        assert!(!expired(None, NOW));
        assert!(!expired(Some(0), NOW));
        assert!(!expired(Some(-5), NOW));
        assert!(!expired(Some(NOW + 1), NOW));
        assert!(expired(Some(NOW), NOW));
        assert!(expired(Some(NOW - 1), NOW));
    }

    #[test]
    fn test_user_at_exact_quota_is_not_suspended() {
        let u = user(10, 4 * GIB, 6 * GIB);
        assert!(!must_suspend_user(&u, NOW));
        let u = user(10, 4 * GIB, 6 * GIB + 1);
        assert_eq!(user_suspend_reason(&u, NOW), Some(SuspendReason::OverQuota));
    }

    #[test]
    fn test_user_status_and_expiry() {
        let mut u = user(0, 0, 0);
        u.status = None;
        assert!(!must_suspend_user(&u, NOW));
        u.status = Some(EntityStatus::Paused);
        assert_eq!(user_suspend_reason(&u, NOW), Some(SuspendReason::Disabled));
        u.status = Some(EntityStatus::Active);
        u.exp_time = Some(NOW - 1000);
        assert_eq!(user_suspend_reason(&u, NOW), Some(SuspendReason::Expired));
    }

    #[test]
    fn test_user_tunnel_predicates() {
        assert!(!must_suspend_user_tunnel(&user_tunnel(1, GIB), NOW));
        assert!(must_suspend_user_tunnel(&user_tunnel(1, GIB + 1), NOW));
        let mut ut = user_tunnel(0, i64::MAX);
        assert!(!must_suspend_user_tunnel(&ut, NOW));
        ut.status = EntityStatus::Paused;
        assert_eq!(
            user_tunnel_suspend_reason(&ut, NOW),
            Some(SuspendReason::Disabled)
        );
    }
}
