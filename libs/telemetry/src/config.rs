use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub service_name: String,
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
}

impl LogConfig {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            format: LogFormat::Text,
            default_filter: "info".into(),
        }
    }

    pub fn from_env(service_name: &str) -> Self {
        Self::from_lookup(service_name, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(service_name: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::new(service_name);
        if let Some(format) = lookup("LOG_FORMAT") {
            cfg.format = parse_format(&format);
        }
        if let Some(filter) = lookup("LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            cfg.default_filter = filter;
        }
        cfg
    }
}

fn parse_format(value: &str) -> LogFormat {
    match value.trim().to_lowercase().as_str() {
        "json" | "structured" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}
