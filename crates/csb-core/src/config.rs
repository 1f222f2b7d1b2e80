use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::{errors::Error, Result};

const DEFAULT_RESERVATION_API_URL: &str = "http://arsestennis.ir/reservations/api/";
const DEFAULT_CLUB_WEBSITE_URL: &str = "http://arsestennis.ir";

/// Typed configuration, read from the environment (and `.env`, if present).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub bot_owner_ids: Vec<i64>,

    // Reservation feed
    pub reservation_api_url: String,
    pub reservation_timeout: Duration,

    // State store
    pub state_file: PathBuf,
    pub store_timeout: Duration,

    // Sweep
    pub sweep_interval: Duration,
    pub sweep_initial_delay: Duration,
    pub sweep_deadline: Duration,

    // Manual refresh / group replies
    pub refresh_cooldown: Duration,
    pub group_message_ttl: Duration,

    // Group welcome
    pub club_website_url: String,
    pub club_contact_phone: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(env_str)
    }

    /// Build from an arbitrary key lookup. Unparseable numbers fall back to
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let str_or = |key: &str, default: &str| {
            lookup(key)
                .and_then(non_empty)
                .unwrap_or_else(|| default.to_string())
        };
        let secs = |key: &str, default: u64| {
            Duration::from_secs(
                lookup(key)
                    .and_then(|s| s.trim().parse::<u64>().ok())
                    .unwrap_or(default),
            )
        };

        // Required env vars
        let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let bot_owner_ids = parse_csv_i64(lookup("BOT_OWNER_IDS"));

        let reservation_api_url = str_or("RESERVATION_API_URL", DEFAULT_RESERVATION_API_URL);
        let reservation_timeout = secs("RESERVATION_TIMEOUT_SECS", 15);

        let state_file = PathBuf::from(str_or(
            "STATE_FILE",
            "/tmp/court-schedule-bot-state.json",
        ));
        let store_timeout = Duration::from_millis(
            lookup("STORE_TIMEOUT_MS")
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(5_000),
        );

        // A zero interval would make tokio's interval panic.
        let sweep_interval = secs("SWEEP_INTERVAL_SECS", 300).max(Duration::from_secs(1));
        let sweep_initial_delay = secs("SWEEP_INITIAL_DELAY_SECS", 10);
        let sweep_deadline = secs("SWEEP_DEADLINE_SECS", 120);

        let refresh_cooldown = secs("REFRESH_COOLDOWN_SECS", 60);
        let group_message_ttl = secs("GROUP_MESSAGE_TTL_SECS", 30);

        let club_website_url = str_or("CLUB_WEBSITE_URL", DEFAULT_CLUB_WEBSITE_URL);
        let club_contact_phone = lookup("CLUB_CONTACT_PHONE").and_then(non_empty);

        Ok(Self {
            telegram_bot_token,
            bot_owner_ids,
            reservation_api_url,
            reservation_timeout,
            state_file,
            store_timeout,
            sweep_interval,
            sweep_initial_delay,
            sweep_deadline,
            refresh_cooldown,
            group_message_ttl,
            club_website_url,
            club_contact_phone,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }
        out.push((key.to_string(), val));
    }
    out
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
