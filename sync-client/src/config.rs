//! Sync client configuration

use std::time::Duration;

/// Poll interval bounds; configured values are clamped into this range
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Floor for the first push resubscribe delay
const MIN_RESUBSCRIBE_DELAY: Duration = Duration::from_millis(100);

/// Per-viewer sync configuration
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | SYNC_POLL_INTERVAL_MS | 5000 | 轮询间隔(毫秒) |
/// | SYNC_COUNTDOWN_MS | 120000 | 上餐后倒计时(毫秒), 0 表示禁用 |
/// | SYNC_REDIRECT_PATH | / | 倒计时结束后跳转路径 |
/// | SYNC_NOTIFICATION_MS | 3000 | 通知显示时长(毫秒) |
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Poll channel interval
    pub poll_interval: Duration,
    /// Countdown started when an order is served (`None` = no redirect)
    pub countdown: Option<Duration>,
    /// Redirect target once the countdown expires
    pub redirect_path: String,
    /// Display duration handed to the notifier
    pub notification_duration: Duration,
    /// Emit notifications for payment status changes
    pub notify_payment: bool,
    /// Re-establish the push subscription after it fails
    pub resubscribe: bool,
    /// First resubscribe delay
    pub resubscribe_delay: Duration,
    /// Resubscribe delay cap (exponential backoff)
    pub max_resubscribe_delay: Duration,
    /// Broadcast capacity for [`crate::SyncEvent`] subscribers
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            countdown: Some(Duration::from_secs(120)),
            redirect_path: "/".to_string(),
            notification_duration: Duration::from_secs(3),
            notify_payment: true,
            resubscribe: true,
            resubscribe_delay: Duration::from_secs(2),
            max_resubscribe_delay: Duration::from_secs(30),
            event_capacity: 256,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 后厨看板: 3 秒轮询, 不跳转
    pub fn kitchen() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            countdown: None,
            notify_payment: false,
            ..Self::default()
        }
    }

    /// 顾客追踪页: 5 秒轮询, 上餐后 120 秒跳转
    pub fn customer_tracking() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            countdown: Some(Duration::from_secs(120)),
            notification_duration: Duration::from_secs(5),
            ..Self::default()
        }
    }

    /// 经理订单列表: 10 秒轮询, 不跳转
    pub fn manager() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            countdown: None,
            ..Self::default()
        }
    }

    /// Load defaults, then apply `SYNC_*` environment overrides
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_millis("SYNC_POLL_INTERVAL_MS") {
            config = config.with_poll_interval(ms);
        }
        if let Some(ms) = env_millis("SYNC_COUNTDOWN_MS") {
            config.countdown = (!ms.is_zero()).then_some(ms);
        }
        if let Ok(path) = std::env::var("SYNC_REDIRECT_PATH") {
            config.redirect_path = path;
        }
        if let Some(ms) = env_millis("SYNC_NOTIFICATION_MS") {
            config.notification_duration = ms;
        }
        config
    }

    /// Set the poll interval (clamped to 1s..=60s)
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        let clamped = interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL);
        if clamped != interval {
            tracing::warn!(
                requested_ms = interval.as_millis() as u64,
                applied_ms = clamped.as_millis() as u64,
                "Poll interval out of range, clamped"
            );
        }
        self.poll_interval = clamped;
        self
    }

    /// Set the served countdown
    pub fn with_countdown(mut self, duration: Duration) -> Self {
        self.countdown = Some(duration);
        self
    }

    /// Disable the served countdown
    pub fn without_countdown(mut self) -> Self {
        self.countdown = None;
        self
    }

    pub fn with_redirect_path(mut self, path: impl Into<String>) -> Self {
        self.redirect_path = path.into();
        self
    }

    pub fn with_notification_duration(mut self, duration: Duration) -> Self {
        self.notification_duration = duration;
        self
    }

    pub fn with_notify_payment(mut self, enabled: bool) -> Self {
        self.notify_payment = enabled;
        self
    }

    /// 设置推送断开后是否自动重新订阅
    pub fn with_resubscribe(mut self, enabled: bool) -> Self {
        self.resubscribe = enabled;
        self
    }

    /// Set the push resubscribe backoff (first delay floored at 100ms, cap >= first delay)
    pub fn with_resubscribe_delay(mut self, initial: Duration, max: Duration) -> Self {
        let (applied, cap) = backoff_bounds(initial, max);
        if applied != initial || cap != max {
            tracing::warn!(
                requested_ms = initial.as_millis() as u64,
                applied_ms = applied.as_millis() as u64,
                cap_ms = cap.as_millis() as u64,
                "Resubscribe delay out of range, clamped"
            );
        }
        self.resubscribe_delay = applied;
        self.max_resubscribe_delay = cap;
        self
    }

    /// Poll interval as used at runtime (fields are public, so re-clamped here)
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.clamp(MIN_POLL_INTERVAL, MAX_POLL_INTERVAL)
    }

    /// `(first delay, cap)` of the resubscribe backoff as used at runtime
    pub fn effective_resubscribe_delay(&self) -> (Duration, Duration) {
        backoff_bounds(self.resubscribe_delay, self.max_resubscribe_delay)
    }

    /// Notification duration in milliseconds
    pub fn notification_ms(&self) -> u64 {
        self.notification_duration.as_millis() as u64
    }
}

fn backoff_bounds(initial: Duration, max: Duration) -> (Duration, Duration) {
    let initial = initial.max(MIN_RESUBSCRIBE_DELAY);
    (initial, max.max(initial))
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}
