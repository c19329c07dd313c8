use std::{
    fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use shared::domain::{Theme, UnknownVariant};
use url::Url;

use crate::{error::SettingsError, locale::Locale};

pub const DEFAULT_SETTINGS_FILE: &str = "storyteller.toml";
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";
const PREFERENCES_DIR: &str = "storyteller";
const PREFERENCES_FILE: &str = "preferences.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStyle {
    /// `/generate`, `/story/{id}`, `/next`
    Legacy,
    /// `/api/generate`, `/api/story/{id}`, `/api/next`
    #[default]
    Api,
}

impl FromStr for RouteStyle {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(RouteStyle::Legacy),
            "api" => Ok(RouteStyle::Api),
            other => Err(UnknownVariant {
                kind: "route style",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationFlow {
    #[default]
    Direct,
    /// Draft an outline first; the edited outline rides along with generation.
    OutlineFirst,
}

impl FromStr for GenerationFlow {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "direct" => Ok(GenerationFlow::Direct),
            "outline_first" | "outline" => Ok(GenerationFlow::OutlineFirst),
            other => Err(UnknownVariant {
                kind: "generation flow",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Validated base url without a trailing slash.
    pub server_url: String,
    pub route_style: RouteStyle,
    pub flow: GenerationFlow,
    pub locale: Locale,
    pub preferences_path: Option<PathBuf>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            route_style: RouteStyle::default(),
            flow: GenerationFlow::default(),
            locale: Locale::default(),
            preferences_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SettingsFile {
    server_url: Option<String>,
    route_style: Option<RouteStyle>,
    flow: Option<GenerationFlow>,
    locale: Option<Locale>,
    preferences_path: Option<PathBuf>,
}

impl ClientSettings {
    /// Defaults, then the settings file (when present), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut settings = Self::default();
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_FILE));
        settings.apply_file(path)?;
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), SettingsError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let file: SettingsFile = toml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(v) = file.server_url {
            self.server_url = parse_server_url(&v)?;
        }
        if let Some(v) = file.route_style {
            self.route_style = v;
        }
        if let Some(v) = file.flow {
            self.flow = v;
        }
        if let Some(v) = file.locale {
            self.locale = v;
        }
        if let Some(v) = file.preferences_path {
            self.preferences_path = Some(v);
        }
        Ok(())
    }

    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), SettingsError> {
        let first = |keys: &[&str]| keys.iter().find_map(|key| lookup(key));

        if let Some(v) = first(&["APP__SERVER_URL", "STORYTELLER_SERVER_URL"]) {
            self.server_url = parse_server_url(&v)?;
        }
        if let Some(v) = first(&["APP__ROUTE_STYLE"]) {
            self.route_style = parse_value("APP__ROUTE_STYLE", &v)?;
        }
        if let Some(v) = first(&["APP__FLOW"]) {
            self.flow = parse_value("APP__FLOW", &v)?;
        }
        if let Some(v) = first(&["APP__LOCALE"]) {
            self.locale = parse_value("APP__LOCALE", &v)?;
        }
        if let Some(v) = first(&["APP__PREFERENCES_PATH"]) {
            self.preferences_path = Some(PathBuf::from(v));
        }
        Ok(())
    }

    pub fn resolved_preferences_path(&self) -> Option<PathBuf> {
        self.preferences_path.clone().or_else(default_preferences_path)
    }
}

pub fn parse_server_url(raw: &str) -> Result<String, SettingsError> {
    let url = Url::parse(raw.trim()).map_err(|source| SettingsError::ServerUrl {
        value: raw.to_string(),
        source,
    })?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

fn parse_value<T: FromStr>(key: &'static str, raw: &str) -> Result<T, SettingsError> {
    raw.parse().map_err(|_| SettingsError::InvalidValue {
        key,
        value: raw.to_string(),
    })
}

pub fn default_preferences_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(PREFERENCES_DIR).join(PREFERENCES_FILE))
}

/// Client-local state kept across runs. Independent of any story session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Theme,
}

impl Preferences {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match fs::read_to_string(path) {
            Ok(raw) => toml::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let encoded = toml::to_string(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, encoded).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
