use serde_derive::Deserialize;

/// Optional TOML configuration file. Every field is optional so that a
/// partially-specified file layers on top of the built-in defaults, and so
/// CLI flags (handled in `main`) can override whatever the file says.
#[derive(Deserialize, Default, Debug)]
pub struct Config {
    /// UDP port to listen on. Defaults to 16384.
    pub port: Option<u16>,
    /// Seconds of inactivity before a session is reaped. Defaults to 600.
    pub idle_timeout_secs: Option<u64>,
    /// How often the reaper sweeps the session table. Defaults to
    /// idle_timeout_secs / 10, clamped to at least 1 second.
    pub reaper_interval_secs: Option<u64>,
    /// Override for the per-session handle table capacity. Defaults to 16;
    /// present mainly so tests can shrink it to exercise out-of-resources
    /// behavior without opening sixteen files.
    pub max_handles_per_session: Option<usize>,
}

pub const DEFAULT_PORT: u16 = 16384;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_parses_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.port, None);
        assert_eq!(config.idle_timeout_secs, None);
    }

    #[test]
    fn parses_given_fields() {
        let config: Config = toml::from_str("port = 9999\nidle_timeout_secs = 30\n").unwrap();
        assert_eq!(config.port, Some(9999));
        assert_eq!(config.idle_timeout_secs, Some(30));
    }
}
