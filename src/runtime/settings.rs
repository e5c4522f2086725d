use crate::config;

/// Load settings, falling back to defaults when the file is unreadable or invalid.
///
/// Runs before logging is installed, so diagnostics go straight to stderr.
pub fn load_settings() -> config::Settings {
    match config::Settings::load() {
        Ok(s) => {
            if let Err(msg) = s.validate() {
                eprintln!("mediashelf: invalid config, using defaults: {msg}");
                config::Settings::default()
            } else {
                s
            }
        }
        Err(e) => {
            eprintln!("mediashelf: failed to load config, using defaults: {e}");
            config::Settings::default()
        }
    }
}
