/// Runtime configuration from `VALVULAS_*` environment variables
///
/// | Variable                       | Default                              |
/// |--------------------------------|--------------------------------------|
/// | `VALVULAS_DATA_DIR`            | `<data dir>/valvulas`                |
/// | `VALVULAS_EXPORT_DIR`          | `<downloads>/valvulas`               |
/// | `VALVULAS_PHOTO_MAX_SIDE`      | `1280`                               |
/// | `VALVULAS_PROBE_INTERVAL_SECS` | `30`                                 |
/// | `VALVULAS_MAIL_ENDPOINT`       | EmailJS send endpoint                |
/// | `VALVULAS_MAIL_SERVICE_ID`     | none, mail disabled unless all set   |
/// | `VALVULAS_MAIL_TEMPLATE_ID`    |                                      |
/// | `VALVULAS_MAIL_PUBLIC_KEY`     |                                      |
/// | `VALVULAS_MAIL_TO`             |                                      |
/// | `VALVULAS_LOG_JSON`            | `false`                              |

use std::path::PathBuf;
use std::time::Duration;

use crate::photo::DEFAULT_MAX_SIDE;

pub const DEFAULT_MAIL_ENDPOINT: &str = "https://api.emailjs.com/api/v1.0/email/send";
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;
const APP_DIR: &str = "valvulas";
const DB_FILE: &str = "valvulas.db";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub endpoint: String,
    pub service_id: String,
    pub template_id: String,
    pub public_key: String,
    /// Recipient of every sheet
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub export_dir: PathBuf,
    pub photo_max_side: u32,
    pub probe_interval: Duration,
    pub mail: Option<MailConfig>,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let data_dir = var("VALVULAS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let export_dir = var("VALVULAS_EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_export_dir);

        let photo_max_side = var("VALVULAS_PHOTO_MAX_SIDE")
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_SIDE);
        let probe_interval = Duration::from_secs(
            var("VALVULAS_PROBE_INTERVAL_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_PROBE_INTERVAL_SECS),
        );

        let mail = match (
            var("VALVULAS_MAIL_SERVICE_ID"),
            var("VALVULAS_MAIL_TEMPLATE_ID"),
            var("VALVULAS_MAIL_PUBLIC_KEY"),
            var("VALVULAS_MAIL_TO"),
        ) {
            (Some(service_id), Some(template_id), Some(public_key), Some(to)) => Some(MailConfig {
                endpoint: var("VALVULAS_MAIL_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_MAIL_ENDPOINT.to_string()),
                service_id,
                template_id,
                public_key,
                to,
            }),
            _ => None,
        };

        let log_json = var("VALVULAS_LOG_JSON")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        Self {
            data_dir,
            export_dir,
            photo_max_side,
            probe_interval,
            mail,
            log_json,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE)
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(raw, "1" | "true" | "TRUE" | "yes" | "YES")
}

/// Linux: ~/.local/share/valvulas, macOS: ~/Library/Application Support/valvulas,
/// Windows: %APPDATA%\valvulas
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn default_export_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.photo_max_side, 1280);
        assert_eq!(config.probe_interval, Duration::from_secs(30));
        assert!(config.mail.is_none());
        assert!(!config.log_json);
        assert!(config.db_path().ends_with("valvulas/valvulas.db"));
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("VALVULAS_DATA_DIR", "/tmp/hojas"),
            ("VALVULAS_EXPORT_DIR", "/tmp/salida"),
            ("VALVULAS_PHOTO_MAX_SIDE", "800"),
            ("VALVULAS_PROBE_INTERVAL_SECS", "5"),
            ("VALVULAS_LOG_JSON", "yes"),
        ]);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/hojas/valvulas.db"));
        assert_eq!(config.export_dir, PathBuf::from("/tmp/salida"));
        assert_eq!(config.photo_max_side, 800);
        assert_eq!(config.probe_interval, Duration::from_secs(5));
        assert!(config.log_json);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config(&[
            ("VALVULAS_PHOTO_MAX_SIDE", "grande"),
            ("VALVULAS_PROBE_INTERVAL_SECS", "0"),
        ]);
        assert_eq!(config.photo_max_side, 1280);
        assert_eq!(config.probe_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_mail_needs_every_setting() {
        let partial = config(&[
            ("VALVULAS_MAIL_SERVICE_ID", "svc"),
            ("VALVULAS_MAIL_TEMPLATE_ID", "tpl"),
        ]);
        assert!(partial.mail.is_none());

        let full = config(&[
            ("VALVULAS_MAIL_SERVICE_ID", "svc"),
            ("VALVULAS_MAIL_TEMPLATE_ID", "tpl"),
            ("VALVULAS_MAIL_PUBLIC_KEY", "key"),
            ("VALVULAS_MAIL_TO", "taller@example.com"),
        ]);
        let mail = full.mail.unwrap();
        assert_eq!(mail.endpoint, DEFAULT_MAIL_ENDPOINT);
        assert_eq!(mail.to, "taller@example.com");
    }
}
