use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: Option<String>,
    pub api_port: u16,
    pub booking: BookingSettings,
}

/// Tunables for availability lookahead, the read cache and the retrying fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingSettings {
    pub lookahead_days: u32,
    pub cache_ttl_seconds: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub max_concurrent_requests: usize,
    pub confirmation_reset_seconds: u64,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            lookahead_days: 14,
            cache_ttl_seconds: 300,
            retry_attempts: 3,
            retry_base_delay_ms: 250,
            max_concurrent_requests: 4,
            confirmation_reset_seconds: 3,
        }
    }
}

impl BookingSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            lookahead_days: parse_env("BOOKING_LOOKAHEAD_DAYS", defaults.lookahead_days),
            cache_ttl_seconds: parse_env("BOOKING_CACHE_TTL_SECONDS", defaults.cache_ttl_seconds),
            retry_attempts: parse_env("BOOKING_RETRY_ATTEMPTS", defaults.retry_attempts),
            retry_base_delay_ms: parse_env("BOOKING_RETRY_BASE_DELAY_MS", defaults.retry_base_delay_ms),
            max_concurrent_requests: parse_env(
                "BOOKING_MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            ),
            confirmation_reset_seconds: parse_env(
                "BOOKING_CONFIRMATION_RESET_SECONDS",
                defaults.confirmation_reset_seconds,
            ),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn confirmation_reset_delay(&self) -> Duration {
        Duration::from_secs(self.confirmation_reset_seconds)
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_service_role_key: env::var("SUPABASE_SERVICE_ROLE_KEY").ok(),
            api_port: parse_env("API_PORT", 3000),
            booking: BookingSettings::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
    }
}

fn parse_env<T: FromStr + Copy + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
