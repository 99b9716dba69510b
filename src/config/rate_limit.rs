use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub per_second: u64,
    pub burst_size: u32,
}

impl RateLimitRule {
    const fn new(per_second: u64, burst_size: u32) -> Self {
        Self {
            per_second,
            burst_size,
        }
    }

    /// Parse a "per:burst" pair, e.g. "10:20".
    fn parse(raw: &str) -> Option<Self> {
        let (per, burst) = raw.split_once(':')?;
        let per_second: u64 = per.trim().parse().ok().filter(|v| *v > 0)?;
        let burst_size: u32 = burst.trim().parse().ok().filter(|v| *v > 0)?;
        Some(Self::new(per_second, burst_size))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub auth: RateLimitRule,
    pub public_read: RateLimitRule,
    pub protected: RateLimitRule,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auth: RateLimitRule::new(5, 10),
            public_read: RateLimitRule::new(30, 60),
            protected: RateLimitRule::new(10, 20),
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(raw) = env::var("RATE_LIMIT_ENABLED") {
            cfg.enabled = matches!(
                raw.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        for (var, slot) in [
            ("RATE_LIMIT_AUTH", &mut cfg.auth),
            ("RATE_LIMIT_PUBLIC", &mut cfg.public_read),
            ("RATE_LIMIT_PROTECTED", &mut cfg.protected),
        ] {
            if let Ok(raw) = env::var(var) {
                match RateLimitRule::parse(&raw) {
                    Some(rule) => *slot = rule,
                    None => tracing::warn!("Invalid {} '{}', expected per:burst", var, raw),
                }
            }
        }

        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_rule() {
        assert_eq!(
            RateLimitRule::parse("12:24"),
            Some(RateLimitRule::new(12, 24))
        );
    }

    #[test]
    fn parse_rejects_zero() {
        assert_eq!(RateLimitRule::parse("0:10"), None);
        assert_eq!(RateLimitRule::parse("10:0"), None);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(RateLimitRule::parse("abc"), None);
        assert_eq!(RateLimitRule::parse("1:b"), None);
    }
}
