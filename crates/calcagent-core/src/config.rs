use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::{
    errors::Error,
    model::types::{permissive_safety_settings, SafetySetting},
    utils::mask_secret,
    Result,
};

pub const API_KEY_VARS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Typed configuration, loaded once by the entry point.
///
/// Every value except the API key has a default. Invalid values are returned
/// as `Error::Config`; loading never terminates the process itself.
#[derive(Clone)]
pub struct Config {
    // Model API
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub request_timeout: Duration,
    pub safety_settings: Vec<SafetySetting>,

    // Sampling
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,

    // Pacing / retries
    pub calls_per_minute: u32,
    pub max_retries: u32,
    pub retry_backoff_base: f64,

    // Modules
    pub default_currency: String,
    pub plot_cache_dir: PathBuf,
    pub plot_cache_capacity: usize,

    pub log_level: String,

    /// The `.env` file that was read, if any.
    pub dotenv_path: Option<PathBuf>,
}

impl Config {
    /// Load from the environment (and `.env`), requiring an API key.
    pub fn load() -> Result<Self> {
        let cfg = Self::load_lenient()?;
        if cfg.api_key.trim().is_empty() {
            return Err(Error::Config(format!(
                "{} environment variable is required",
                API_KEY_VARS[0]
            )));
        }
        Ok(cfg)
    }

    /// Same as `load`, but tolerates a missing API key (diagnostics only).
    pub fn load_lenient() -> Result<Self> {
        let dotenv_path = find_dotenv(&env::current_dir()?);
        if let Some(path) = &dotenv_path {
            load_dotenv(path);
        }

        let api_key = api_key_from_env().unwrap_or_default();

        let model = env_str("GEMINI_MODEL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_base = env_str("GEMINI_API_BASE")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let request_timeout =
            Duration::from_secs(env_parse::<u64>("REQUEST_TIMEOUT_SECS")?.unwrap_or(60));

        let temperature = env_parse::<f32>("TEMPERATURE")?.unwrap_or(0.1);
        let top_p = env_parse::<f32>("TOP_P")?.unwrap_or(0.95);
        let max_output_tokens = env_parse::<u32>("MAX_OUTPUT_TOKENS")?.unwrap_or(2048);

        let calls_per_minute = env_parse::<u32>("RATE_LIMIT_CALLS_PER_MINUTE")?.unwrap_or(60);
        let max_retries = env_parse::<u32>("MAX_RETRIES")?.unwrap_or(3);
        let retry_backoff_base = env_parse::<f64>("RETRY_BACKOFF_BASE")?.unwrap_or(2.0);

        let default_currency = env_str("DEFAULT_CURRENCY")
            .and_then(non_empty)
            .map(|c| c.trim().to_uppercase())
            .unwrap_or_else(|| "TRY".to_string());
        let plot_cache_dir =
            env_path("PLOT_CACHE_DIR").unwrap_or_else(|| PathBuf::from("cache/plots"));
        let plot_cache_capacity = env_parse::<usize>("PLOT_CACHE_CAPACITY")?.unwrap_or(128);

        let log_level = env_str("LOG_LEVEL")
            .and_then(non_empty)
            .map(|l| l.trim().to_lowercase())
            .unwrap_or_else(|| "info".to_string());

        let cfg = Self {
            api_key,
            model,
            api_base,
            request_timeout,
            safety_settings: permissive_safety_settings(),
            temperature,
            top_p,
            max_output_tokens,
            calls_per_minute,
            max_retries,
            retry_backoff_base,
            default_currency,
            plot_cache_dir,
            plot_cache_capacity,
            log_level,
            dotenv_path,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.calls_per_minute == 0 {
            return Err(Error::Config(
                "RATE_LIMIT_CALLS_PER_MINUTE must be at least 1".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(Error::Config("MAX_RETRIES must be at least 1".to_string()));
        }
        if !(self.retry_backoff_base.is_finite() && self.retry_backoff_base >= 1.0) {
            return Err(Error::Config(
                "RETRY_BACKOFF_BASE must be a number >= 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::Config(
                "TEMPERATURE must be between 0 and 2".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.top_p) {
            return Err(Error::Config("TOP_P must be between 0 and 1".to_string()));
        }
        if self.plot_cache_capacity == 0 {
            return Err(Error::Config(
                "PLOT_CACHE_CAPACITY must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &mask_secret(&self.api_key))
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("request_timeout", &self.request_timeout)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_output_tokens", &self.max_output_tokens)
            .field("calls_per_minute", &self.calls_per_minute)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base", &self.retry_backoff_base)
            .field("default_currency", &self.default_currency)
            .field("plot_cache_dir", &self.plot_cache_dir)
            .field("plot_cache_capacity", &self.plot_cache_capacity)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

/// First non-empty API key variable, untrimmed (diagnostics report stray whitespace).
pub fn api_key_from_env() -> Option<String> {
    API_KEY_VARS
        .iter()
        .filter_map(|k| env_str(k))
        .find(|v| !v.trim().is_empty())
}

/// Look for `.env` in `start` and then each of its ancestors.
pub fn find_dotenv(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(".env"))
        .find(|candidate| candidate.is_file())
}

/// Export `KEY=value` lines into the process environment.
///
/// Existing variables are never overridden.
pub fn load_dotenv(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue;
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
        let line = line.strip_prefix("export ").unwrap_or(line);

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

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    let Some(raw) = env_str(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} has an invalid value: {raw:?}")))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            api_key: "AIzaSyEXAMPLEKEY0000".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_secs(60),
            safety_settings: permissive_safety_settings(),
            temperature: 0.1,
            top_p: 0.95,
            max_output_tokens: 2048,
            calls_per_minute: 60,
            max_retries: 3,
            retry_backoff_base: 2.0,
            default_currency: "TRY".to_string(),
            plot_cache_dir: PathBuf::from("cache/plots"),
            plot_cache_capacity: 128,
            log_level: "info".to_string(),
            dotenv_path: None,
        }
    }

    #[test]
    fn defaults_validate() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_zero_rate_and_retries() {
        let mut c = sample();
        c.calls_per_minute = 0;
        assert!(matches!(c.validate(), Err(Error::Config(_))));

        let mut c = sample();
        c.max_retries = 0;
        assert!(matches!(c.validate(), Err(Error::Config(_))));

        let mut c = sample();
        c.retry_backoff_base = 0.5;
        assert!(matches!(c.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn debug_masks_api_key() {
        let dbg = format!("{:?}", sample());
        assert!(!dbg.contains("AIzaSyEXAMPLEKEY0000"));
        assert!(dbg.contains("AIza****0000"));
    }

    #[test]
    fn dotenv_lines_are_parsed() {
        let parsed = parse_dotenv(
            "# comment\nGOOGLE_API_KEY=\"abc\"\nexport MAX_RETRIES = 5\n\nBROKEN\nTOP_P='0.9'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("GOOGLE_API_KEY".to_string(), "abc".to_string()),
                ("MAX_RETRIES".to_string(), "5".to_string()),
                ("TOP_P".to_string(), "0.9".to_string()),
            ]
        );
    }

    #[test]
    fn find_dotenv_walks_ancestors() {
        let root = PathBuf::from(format!("/tmp/calcagent-dotenv-{}", std::process::id()));
        let nested = root.join("a/b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.join(".env"), "X=1\n").unwrap();

        assert_eq!(find_dotenv(&nested), Some(root.join(".env")));

        let _ = fs::remove_dir_all(&root);
    }
}
