use tracing_subscriber::{EnvFilter, fmt};

use crate::app::AppError;

/// Used when `RUST_LOG` is unset or unparseable.
const DEFAULT_DIRECTIVES: &str = "info,actix_server=warn";

pub fn init() -> Result<(), AppError> {
    fmt()
        .with_env_filter(env_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_target(true)
        .try_init()
        .map_err(AppError::logging_init)
}

fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVES))
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::filter::LevelFilter;

    use super::env_filter;

    #[test]
    fn falls_back_to_info_when_unset() {
        assert_eq!(env_filter(None).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn falls_back_to_info_on_invalid_directives() {
        assert_eq!(
            env_filter(Some("session_analytics=loud")).max_level_hint(),
            Some(LevelFilter::INFO)
        );
    }

    #[test]
    fn keeps_explicit_directives() {
        assert_eq!(
            env_filter(Some("session_analytics=debug")).max_level_hint(),
            Some(LevelFilter::DEBUG)
        );
    }
}
