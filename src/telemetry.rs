//! Logging setup for the generation service.
//!
//! `LOG_LEVEL` takes `EnvFilter` directives. The targets worth tuning are
//! `generation` (one line per fetch with its outcome: cache_hit, generated,
//! backfilled or fallback), `cache` (store reads, writes and swallowed
//! failures) and `lingoquest` (startup and per-endpoint summaries).
//! `LOG_FORMAT=json` switches to one JSON object per event.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,lingoquest=debug,generation=debug,cache=debug,tower_http=info,axum=info";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_tracing() {
    let level = std::env::var("LOG_LEVEL").ok();
    let format = LogFormat::from_env_value(std::env::var("LOG_FORMAT").ok().as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_from(level.as_deref()))
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // The two builders have different types, so each branch initializes its own.
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_format_is_opt_in() {
        assert_eq!(LogFormat::from_env_value(Some("JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::from_env_value(Some("pretty")), LogFormat::Pretty);
        assert_eq!(LogFormat::from_env_value(None), LogFormat::Pretty);
    }

    #[test]
    fn blank_directives_use_default_filter() {
        assert_eq!(filter_from(None).to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
        assert_eq!(filter_from(Some("  ")).to_string(), EnvFilter::new(DEFAULT_FILTER).to_string());
        assert_eq!(filter_from(Some("warn,cache=trace")).to_string(), EnvFilter::new("warn,cache=trace").to_string());
    }
}
