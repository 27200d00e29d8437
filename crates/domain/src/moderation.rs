//! 禁言时长与禁言状态

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::errors::DomainError;
use crate::value_objects::Timestamp;

/// 自定义禁言的上限：十年
pub const MAX_CUSTOM_MINUTES: i64 = 10 * 365 * 24 * 60;

/// 禁言时长请求，提交后立即解析为到期时间，不单独持久化。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuteDuration {
    /// 永久禁言
    Forever,
    TenMinutes,
    OneHour,
    /// 自定义分钟数，范围 1..=MAX_CUSTOM_MINUTES
    Custom(i64),
}

impl MuteDuration {
    /// 根据请求标签与可选的自定义分钟数构造时长。
    pub fn from_request(label: &str, custom_minutes: Option<i64>) -> Result<Self, DomainError> {
        match label.trim() {
            "forever" | "permanent" => Ok(Self::Forever),
            "10m" => Ok(Self::TenMinutes),
            "1h" => Ok(Self::OneHour),
            "custom" => {
                let minutes = custom_minutes.ok_or_else(|| {
                    DomainError::invalid_argument("custom_minutes", "required for custom duration")
                })?;
                if minutes < 1 {
                    return Err(DomainError::invalid_argument(
                        "custom_minutes",
                        "must be at least 1",
                    ));
                }
                if minutes > MAX_CUSTOM_MINUTES {
                    return Err(DomainError::invalid_argument(
                        "custom_minutes",
                        "too large",
                    ));
                }
                Ok(Self::Custom(minutes))
            }
            other => Err(DomainError::invalid_argument(
                "duration",
                format!("unsupported duration `{other}`"),
            )),
        }
    }

    /// 解析为绝对到期时间，永久禁言返回 `None`。
    pub fn resolve(&self, now: Timestamp) -> Option<Timestamp> {
        match self {
            Self::Forever => None,
            Self::TenMinutes => Some(now + Duration::minutes(10)),
            Self::OneHour => Some(now + Duration::hours(1)),
            Self::Custom(minutes) => {
                let minutes = (*minutes).clamp(1, MAX_CUSTOM_MINUTES);
                Some(now.saturating_add(Duration::minutes(minutes)))
            }
        }
    }

    /// 广播 `user_muted` 时使用的标签。
    pub fn label(&self) -> &'static str {
        match self {
            Self::Forever => "forever",
            Self::TenMinutes => "10m",
            Self::OneHour => "1h",
            Self::Custom(_) => "custom",
        }
    }
}

impl fmt::Display for MuteDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MuteDuration {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_request(value, None)
    }
}

/// 一次“观察并校正”后的禁言状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MuteStatus {
    NotMuted,
    /// 仍在禁言中，`until` 为空表示永久
    Active { until: Option<Timestamp> },
    /// 本次观察发现禁言已过期并完成清除
    Expired,
}

impl MuteStatus {
    /// 根据存储的标志与到期时间判定，过期判断采用严格的 `now > until`。
    pub fn evaluate(is_muted: bool, until: Option<Timestamp>, now: Timestamp) -> Self {
        if !is_muted {
            return Self::NotMuted;
        }
        match until {
            Some(until) if now > until => Self::Expired,
            until => Self::Active { until },
        }
    }

    pub fn is_muted(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn resolves_fixed_windows() {
        let now = datetime!(2024-05-01 12:00 UTC);
        assert_eq!(MuteDuration::Forever.resolve(now), None);
        assert_eq!(
            MuteDuration::TenMinutes.resolve(now),
            Some(datetime!(2024-05-01 12:10 UTC))
        );
        assert_eq!(
            MuteDuration::OneHour.resolve(now),
            Some(datetime!(2024-05-01 13:00 UTC))
        );
        assert_eq!(
            MuteDuration::Custom(90).resolve(now),
            Some(datetime!(2024-05-01 13:30 UTC))
        );
    }

    #[test]
    fn custom_requires_positive_minutes() {
        assert!(MuteDuration::from_request("custom", Some(0)).is_err());
        assert!(MuteDuration::from_request("custom", Some(-5)).is_err());
        assert!(MuteDuration::from_request("custom", None).is_err());
        assert_eq!(
            MuteDuration::from_request("custom", Some(3)).unwrap(),
            MuteDuration::Custom(3)
        );
    }

    #[test]
    fn custom_rejects_oversized_windows() {
        for minutes in [MAX_CUSTOM_MINUTES + 1, 10_000_000_000, i64::MAX] {
            let err = MuteDuration::from_request("custom", Some(minutes)).unwrap_err();
            assert!(matches!(
                err,
                DomainError::InvalidArgument { ref field, .. } if field == "custom_minutes"
            ));
        }
        let longest = MuteDuration::from_request("custom", Some(MAX_CUSTOM_MINUTES)).unwrap();
        let now = datetime!(2024-05-01 12:00 UTC);
        assert_eq!(
            longest.resolve(now),
            Some(now + Duration::minutes(MAX_CUSTOM_MINUTES))
        );

        // 直接构造的超大值也不会溢出
        assert!(MuteDuration::Custom(i64::MAX).resolve(now).is_some());
    }

    #[test]
    fn permanent_is_alias_of_forever() {
        let duration: MuteDuration = "permanent".parse().unwrap();
        assert_eq!(duration, MuteDuration::Forever);
        assert_eq!(duration.label(), "forever");
        assert!("2d".parse::<MuteDuration>().is_err());
    }

    #[test]
    fn evaluate_uses_strict_expiry() {
        let until = datetime!(2024-05-01 12:10 UTC);
        assert_eq!(
            MuteStatus::evaluate(true, Some(until), until),
            MuteStatus::Active { until: Some(until) }
        );
        assert_eq!(
            MuteStatus::evaluate(true, Some(until), datetime!(2024-05-01 12:10:01 UTC)),
            MuteStatus::Expired
        );
        assert_eq!(
            MuteStatus::evaluate(true, None, until),
            MuteStatus::Active { until: None }
        );
        assert_eq!(MuteStatus::evaluate(false, Some(until), until), MuteStatus::NotMuted);
    }
}
