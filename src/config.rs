use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;
use crate::retry::RetryConfig;

/// Database file name inside the data directory.
pub const DB_FILE_NAME: &str = "swipeclean.db";

/// Resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub media_store: Option<PathBuf>,
    pub retry: RetryConfig,
}

pub(crate) fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(args: &GlobalArgs) -> anyhow::Result<Self> {
        let db_path = match &args.db {
            Some(db) => expand_tilde(db),
            None => expand_tilde(&args.data_directory).join(DB_FILE_NAME),
        };
        if db_path.as_os_str().is_empty() {
            anyhow::bail!("Database path must not be empty");
        }

        let media_store = args.media_store.as_deref().map(expand_tilde);

        Ok(Self {
            db_path,
            media_store,
            retry: RetryConfig {
                max_retries: args.max_retries,
                ..RetryConfig::default()
            },
        })
    }

    /// The media store path, or an error explaining how to set it.
    pub fn require_media_store(&self) -> anyhow::Result<&Path> {
        self.media_store.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "No media store configured. Pass --media-store <PATH> or set SWIPECLEAN_MEDIA_STORE"
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(argv: &[&str]) -> GlobalArgs {
        use clap::Parser;
        let mut full = vec!["swipeclean"];
        full.extend_from_slice(argv);
        full.push("status");
        crate::cli::Cli::try_parse_from(full).unwrap().global
    }

    #[test]
    fn test_expand_tilde_with_home() {
        let result = expand_tilde("~/Pictures");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(result, home.join("Pictures"));
            assert_eq!(expand_tilde("~"), home);
        }
    }

    #[test]
    fn test_expand_tilde_no_prefix() {
        assert_eq!(
            expand_tilde("/absolute/path"),
            PathBuf::from("/absolute/path")
        );
        assert_eq!(
            expand_tilde("relative/path"),
            PathBuf::from("relative/path")
        );
    }

    #[test]
    fn test_default_db_path_in_data_directory() {
        let cfg = Config::from_cli(&args(&["--data-directory", "/var/lib/swipeclean"])).unwrap();
        assert_eq!(
            cfg.db_path,
            PathBuf::from("/var/lib/swipeclean").join(DB_FILE_NAME)
        );
    }

    #[test]
    fn test_explicit_db_overrides_directory() {
        let cfg = Config::from_cli(&args(&[
            "--db",
            "/tmp/decisions.db",
            "--data-directory",
            "/ignored",
        ]))
        .unwrap();
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/decisions.db"));
    }

    #[test]
    fn test_retry_passthrough() {
        let cfg = Config::from_cli(&args(&["--max-retries", "7"])).unwrap();
        assert_eq!(cfg.retry.max_retries, 7);
        assert_eq!(cfg.retry.base_delay_ms, RetryConfig::default().base_delay_ms);
    }

    #[test]
    fn test_media_store_required_when_missing() {
        let mut global = args(&[]);
        global.media_store = None;
        let cfg = Config::from_cli(&global).unwrap();
        assert!(cfg.require_media_store().is_err());

        global.media_store = Some("/data/media.db".into());
        let cfg = Config::from_cli(&global).unwrap();
        assert_eq!(
            cfg.require_media_store().unwrap(),
            Path::new("/data/media.db")
        );
    }

    #[test]
    fn test_empty_db_path_rejected() {
        let mut global = args(&[]);
        global.db = Some(String::new());
        assert!(Config::from_cli(&global).is_err());
    }
}
