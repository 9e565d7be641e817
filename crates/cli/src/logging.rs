use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_ENV: &str = "PDF_SHELF_LOG";

/// Level used when `PDF_SHELF_LOG` is unset: `--verbose` wins over the
/// config file, which wins over `warn`.
pub fn default_directive(verbose: bool, configured: Option<&str>) -> String {
    if verbose {
        return "info".to_owned();
    }

    configured.map(str::trim).filter(|level| !level.is_empty()).unwrap_or("warn").to_owned()
}

/// Installs a stderr subscriber. Only the first call in a process has an
/// effect.
pub fn init(verbose: bool, configured: Option<&str>) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_directive(verbose, configured)))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let _ = tracing_subscriber::registry().with(filter).with(stderr_layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_overrides_config_level() {
        assert_eq!(default_directive(true, Some("debug")), "info");
        assert_eq!(default_directive(false, Some("debug")), "debug");
        assert_eq!(default_directive(false, Some("  ")), "warn");
        assert_eq!(default_directive(false, None), "warn");
    }
}
