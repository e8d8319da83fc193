use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_SLOT_INTERVAL_MINUTES: u32 = 30;
pub const DEFAULT_BOOKING_HORIZON_DAYS: u32 = 90;
pub const DEFAULT_NOTIFICATION_BUFFER: usize = 256;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(StorageBackend::Supabase),
            "memory" | "in_memory" | "inmemory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub slot_interval_minutes: u32,
    pub booking_horizon_days: u32,
    pub notification_buffer: usize,
    pub storage_backend: StorageBackend,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            slot_interval_minutes: DEFAULT_SLOT_INTERVAL_MINUTES,
            booking_horizon_days: DEFAULT_BOOKING_HORIZON_DAYS,
            notification_buffer: DEFAULT_NOTIFICATION_BUFFER,
            storage_backend: StorageBackend::Supabase,
            port: DEFAULT_PORT,
        }
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
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            slot_interval_minutes: parse_or_default("SLOT_INTERVAL_MINUTES", DEFAULT_SLOT_INTERVAL_MINUTES),
            booking_horizon_days: parse_or_default("BOOKING_HORIZON_DAYS", DEFAULT_BOOKING_HORIZON_DAYS),
            notification_buffer: parse_or_default("NOTIFICATION_BUFFER", DEFAULT_NOTIFICATION_BUFFER),
            storage_backend: parse_or_default("STORAGE_BACKEND", StorageBackend::Supabase),
            port: parse_or_default("PORT", DEFAULT_PORT),
        };

        if config.slot_interval_minutes == 0 {
            warn!("SLOT_INTERVAL_MINUTES must be positive, using default");
            return Self {
                slot_interval_minutes: DEFAULT_SLOT_INTERVAL_MINUTES,
                ..config
            };
        }

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {:?}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
