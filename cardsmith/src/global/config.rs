const DOCUMENTATION: &str = r#"# Cardsmith settings. You may edit this file, but be aware that formatting and comments will not
# be preserved, and all keys are case sensitive.

# autosave_debounce_ms: quiet period after the last change before the session is autosaved.
# product_name: prefix of exported file names.
# data_dir: where the autosave store lives. Defaults to the platform data directory.
# log_level: one of "off", "error", "warn", "info", "debug", "trace".

"#;

#[must_use]
pub fn preferences_dir() -> Option<std::path::PathBuf> {
    let mut base_dir = dirs::preference_dir()?;
    base_dir.push(env!("CARGO_PKG_NAME"));
    Some(base_dir)
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub autosave_debounce_ms: u64,
    pub product_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<std::path::PathBuf>,
    pub log_level: String,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: 500,
            product_name: env!("CARGO_PKG_NAME").to_owned(),
            data_dir: None,
            log_level: "info".to_owned(),
        }
    }
}
impl Config {
    const FILENAME: &'static str = "cardsmith.toml";
    /// Shared global config, loaded from user preferences.
    /// (Or defaulted, if unavailable for some reason)
    #[must_use]
    pub fn get() -> &'static Self {
        static GLOBAL_CONFIG: std::sync::OnceLock<Config> = std::sync::OnceLock::new();

        GLOBAL_CONFIG.get_or_init(|| match preferences_dir() {
            None => {
                log::warn!("No preferences dir, using default config.");
                Self::default()
            }
            Some(mut dir) => {
                dir.push(Self::FILENAME);
                Self::load_or_default(&dir)
            }
        })
    }
    #[must_use]
    fn load_or_default(path: &std::path::Path) -> Self {
        if !path.exists() {
            let config = Self::default();
            if let Err(e) = config.save() {
                log::warn!("Failed to write default config:\n{e:?}");
            }
            return config;
        }
        let config: anyhow::Result<Self> = try_block::try_block! {
            let string = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&string)?;
            Ok(config)
        };
        config.unwrap_or_else(|e| {
            log::warn!("Failed to read {path:?}, using defaults:\n{e:?}");
            Self::default()
        })
    }
    pub fn save(&self) -> anyhow::Result<()> {
        let mut preferences =
            preferences_dir().ok_or_else(|| anyhow::anyhow!("No preferences dir found"))?;
        // Explicity do *not* create recursively. If not found, the user probably has a good reason.
        let _ = std::fs::DirBuilder::new().create(&preferences);

        preferences.push(Self::FILENAME);
        let mut string = toml::ser::to_string_pretty(self)?;
        string = DOCUMENTATION.to_owned() + &string;
        std::fs::write(preferences, string)?;
        Ok(())
    }
    #[must_use]
    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.autosave_debounce_ms)
    }
    /// Unknown level names fall back to `Info`.
    #[must_use]
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
    #[must_use]
    pub fn data_dir(&self) -> Option<std::path::PathBuf> {
        self.data_dir.clone().or_else(|| {
            cardsmith_core::persist::autosave::default_data_dir(&self.product_name)
        })
    }
}

#[cfg(test)]
mod test {
    use super::Config;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str("autosave_debounce_ms = 1200").unwrap();
        assert_eq!(config.debounce(), std::time::Duration::from_millis(1200));
        assert_eq!(config.product_name, "cardsmith");
        assert_eq!(config.level_filter(), log::LevelFilter::Info);
    }
    #[test]
    fn default_survives_writing() {
        let config = Config {
            log_level: "debug".to_owned(),
            data_dir: Some("/tmp/cards".into()),
            ..Config::default()
        };
        let string = toml::ser::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&string).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.level_filter(), log::LevelFilter::Debug);
    }
}
