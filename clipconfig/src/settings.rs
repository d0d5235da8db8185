//! Player settings handed over as a query string
//!
//! The player is configured through URL parameters such as
//! `?channelName=foo,bar&days=30&views=100&shuffle=weighted`. This module turns
//! that flat key/value set into a typed [`PlayerSettings`] record, and back into
//! a shareable URL.

use crate::Config;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Errors raised while reading player settings
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    /// `channelName` missing or empty
    #[error("Missing required parameter: channelName")]
    MissingChannel,

    /// A parameter could not be interpreted
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    /// Defaults could not be read from the configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SettingsError {
    fn invalid(key: &str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.into(),
        }
    }
}

/// Shuffle mode as named in the configuration and in URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShuffleMode {
    Uniform,
    Stratified,
    Weighted,
    #[default]
    Smart,
}

impl ShuffleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShuffleMode::Uniform => "uniform",
            ShuffleMode::Stratified => "stratified",
            ShuffleMode::Weighted => "weighted",
            ShuffleMode::Smart => "smart",
        }
    }
}

impl fmt::Display for ShuffleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShuffleMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uniform" | "random" => Ok(ShuffleMode::Uniform),
            "stratified" => Ok(ShuffleMode::Stratified),
            "weighted" => Ok(ShuffleMode::Weighted),
            "smart" => Ok(ShuffleMode::Smart),
            _ => Err(SettingsError::invalid("shuffle", s)),
        }
    }
}

/// A query parameter after type coercion
#[derive(Debug, Clone, PartialEq)]
enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParamValue {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return ParamValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return ParamValue::Bool(false);
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => ParamValue::Number(n),
            _ => ParamValue::Text(trimmed.to_string()),
        }
    }
}

/// Typed player configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    /// Channel logins, lower-cased, in the order given
    pub channels: Vec<String>,
    /// Only clips created within this many days are played (0 disables the filter)
    pub days: u64,
    /// Minimum view count
    pub views: u64,
    pub shuffle: ShuffleMode,
    /// Playback volume in `[0, 1]`
    pub volume: f64,
    pub show_logo: bool,
    pub show_info: bool,
    pub show_timer: bool,
}

impl PlayerSettings {
    /// Settings for the given channels with built-in defaults
    pub fn new<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            channels: split_channels(channels),
            days: crate::DEFAULT_PLAYER_DAYS,
            views: crate::DEFAULT_PLAYER_VIEWS,
            shuffle: crate::DEFAULT_PLAYER_SHUFFLE,
            volume: crate::DEFAULT_PLAYER_VOLUME,
            show_logo: true,
            show_info: true,
            show_timer: true,
        }
    }

    /// Parse a query string using the built-in defaults
    ///
    /// A leading `?` is accepted.
    pub fn from_query(query: &str) -> Result<Self, SettingsError> {
        Self::parse_with_defaults(query, Self::new(Vec::<String>::new()))
    }

    /// Parse a query string, taking defaults from the configuration
    pub fn from_query_with_config(query: &str, config: &Config) -> Result<Self, SettingsError> {
        let to_err = |e: anyhow::Error| SettingsError::Config(e.to_string());
        let mut defaults = Self::new(Vec::<String>::new());
        defaults.days = config.get_player_days().map_err(to_err)?;
        defaults.views = config.get_player_views().map_err(to_err)?;
        defaults.volume = config.get_player_volume().map_err(to_err)?;
        defaults.shuffle = config.get_player_shuffle().map_err(to_err)?;
        Self::parse_with_defaults(query, defaults)
    }

    fn parse_with_defaults(query: &str, mut settings: Self) -> Result<Self, SettingsError> {
        let query = query.trim().trim_start_matches('?');

        for (key, raw) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = ParamValue::parse(&raw);
            match &*key {
                "channelName" => settings.channels = split_channels(raw.split(',')),
                "days" => settings.days = as_count("days", &value, &raw)?,
                "views" => settings.views = as_count("views", &value, &raw)?,
                "volume" => match value {
                    ParamValue::Number(n) => settings.volume = n.clamp(0.0, 1.0),
                    _ => return Err(SettingsError::invalid("volume", raw.to_string())),
                },
                "shuffle" => settings.shuffle = raw.parse()?,
                "showLogo" => settings.show_logo = as_flag("showLogo", &value, &raw)?,
                "showInfo" => settings.show_info = as_flag("showInfo", &value, &raw)?,
                "showTimer" => settings.show_timer = as_flag("showTimer", &value, &raw)?,
                other => tracing::debug!(parameter = other, "Ignoring unknown parameter"),
            }
        }

        if settings.channels.is_empty() {
            return Err(SettingsError::MissingChannel);
        }
        Ok(settings)
    }

    /// Serialize back into a query string
    ///
    /// `channelName` is always present; other parameters are only emitted when
    /// they differ from the built-in defaults.
    pub fn to_query_string(&self) -> String {
        let defaults = Self::new(Vec::<String>::new());
        let mut out = url::form_urlencoded::Serializer::new(String::new());
        out.append_pair("channelName", &self.channels.join(","));
        if self.days != defaults.days {
            out.append_pair("days", &self.days.to_string());
        }
        if self.views != defaults.views {
            out.append_pair("views", &self.views.to_string());
        }
        if self.shuffle != defaults.shuffle {
            out.append_pair("shuffle", self.shuffle.as_str());
        }
        if (self.volume - defaults.volume).abs() > f64::EPSILON {
            out.append_pair("volume", &self.volume.to_string());
        }
        for (key, value, default) in [
            ("showLogo", self.show_logo, defaults.show_logo),
            ("showInfo", self.show_info, defaults.show_info),
            ("showTimer", self.show_timer, defaults.show_timer),
        ] {
            if value != default {
                out.append_pair(key, if value { "true" } else { "false" });
            }
        }
        out.finish()
    }

    /// Build a shareable player URL on top of `base`
    pub fn player_url(&self, base: &str) -> Result<String, url::ParseError> {
        let mut url = Url::parse(base)?;
        url.set_query(Some(&self.to_query_string()));
        Ok(url.to_string())
    }
}

fn split_channels<I, S>(channels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for channel in channels {
        let channel = channel.as_ref().trim().to_lowercase();
        if !channel.is_empty() && !out.contains(&channel) {
            out.push(channel);
        }
    }
    out
}

fn as_count(key: &str, value: &ParamValue, raw: &str) -> Result<u64, SettingsError> {
    match value {
        ParamValue::Number(n) if *n >= 0.0 => Ok(n.floor() as u64),
        _ => Err(SettingsError::invalid(key, raw)),
    }
}

fn as_flag(key: &str, value: &ParamValue, raw: &str) -> Result<bool, SettingsError> {
    match value {
        ParamValue::Bool(b) => Ok(*b),
        _ => Err(SettingsError::invalid(key, raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let settings = PlayerSettings::from_query("channelName=Foo").unwrap();
        assert_eq!(settings.channels, vec!["foo"]);
        assert_eq!(settings.days, 900);
        assert_eq!(settings.views, 0);
        assert_eq!(settings.shuffle, ShuffleMode::Smart);
        assert_eq!(settings.volume, 0.5);
        assert!(settings.show_logo && settings.show_info && settings.show_timer);
    }

    #[test]
    fn test_multi_channel_parsing() {
        let settings =
            PlayerSettings::from_query("?channelName=alpha,%20Beta,,alpha&days=30&views=10")
                .unwrap();
        assert_eq!(settings.channels, vec!["alpha", "beta"]);
        assert_eq!(settings.days, 30);
        assert_eq!(settings.views, 10);
    }

    #[test]
    fn test_missing_channel() {
        assert_eq!(
            PlayerSettings::from_query("days=7"),
            Err(SettingsError::MissingChannel)
        );
        assert_eq!(
            PlayerSettings::from_query("channelName=%20,"),
            Err(SettingsError::MissingChannel)
        );
    }

    #[test]
    fn test_shuffle_aliases() {
        assert_eq!("random".parse::<ShuffleMode>(), Ok(ShuffleMode::Uniform));
        assert_eq!("Weighted".parse::<ShuffleMode>(), Ok(ShuffleMode::Weighted));
        assert!("chaotic".parse::<ShuffleMode>().is_err());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            PlayerSettings::from_query("channelName=a&days=lots"),
            Err(SettingsError::InvalidValue { ref key, .. }) if key == "days"
        ));
        assert!(matches!(
            PlayerSettings::from_query("channelName=a&showInfo=maybe"),
            Err(SettingsError::InvalidValue { ref key, .. }) if key == "showInfo"
        ));
    }

    #[test]
    fn test_volume_is_clamped() {
        let settings = PlayerSettings::from_query("channelName=a&volume=3").unwrap();
        assert_eq!(settings.volume, 1.0);
    }

    #[test]
    fn test_query_string_only_emits_changes() {
        let mut settings = PlayerSettings::new(["alpha", "beta"]);
        assert_eq!(settings.to_query_string(), "channelName=alpha%2Cbeta");

        settings.days = 7;
        settings.shuffle = ShuffleMode::Stratified;
        settings.show_timer = false;
        let query = settings.to_query_string();
        assert_eq!(
            query,
            "channelName=alpha%2Cbeta&days=7&shuffle=stratified&showTimer=false"
        );
        assert_eq!(PlayerSettings::from_query(&query).unwrap(), settings);
    }

    #[test]
    fn test_player_url() {
        let settings = PlayerSettings::new(["alpha"]);
        assert_eq!(
            settings.player_url("https://player.example/").unwrap(),
            "https://player.example/?channelName=alpha"
        );
    }
}
