//! Loader for portal configuration with YAML + environment overlays.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. built-in defaults (every section is optional),
//! 2. YAML files / inline snippets, in the order they were attached,
//! 3. `ESCOLA_`-prefixed environment variables, `__` between nested keys
//!    (`ESCOLA_CONTENT__TIMEOUT_SECS=30`).
//!
//! String values may reference other environment variables as `${VAR}`;
//! these are expanded recursively after merging.
use config::{Config, ConfigError, Environment, File, FileFormat};
use escola_common::Locale;
use escola_common::observability::LogFormat;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use url::Url;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
pub const ENV_PREFIX: &str = "ESCOLA";
pub const DEFAULT_FILE_NAME: &str = "escola.yaml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    #[serde(deserialize_with = "optional_scalar_string")]
    pub version: Option<String>,
    pub locale: Locale,
    pub content: ContentSettings,
    pub support: SupportSettings,
    pub logging: LoggingSettings,
    /// Catalog override; empty means [`default_catalog`].
    pub materials: Vec<Subject>,
}

/// Knobs for fetching third-party material pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Automatic retries per fetch. Material views retry manually, so 0.
    pub retries: usize,
    #[serde(deserialize_with = "scalar_string")]
    pub user_agent: String,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            connect_timeout_secs: 5,
            retries: 0,
            user_agent: format!("escola-portal/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportSettings {
    /// Number quoted by the support bot and the quick-buy button.
    #[serde(deserialize_with = "scalar_string")]
    pub whatsapp_number: String,
    /// Number receiving checkout orders.
    #[serde(deserialize_with = "scalar_string")]
    pub orders_whatsapp_number: String,
    #[serde(deserialize_with = "scalar_string")]
    pub ussd_code: String,
    #[serde(deserialize_with = "scalar_string")]
    pub email: String,
    /// Replaces the built-in FAQ table when non-empty.
    pub faq: Vec<FaqEntrySpec>,
}

impl Default for SupportSettings {
    fn default() -> Self {
        Self {
            whatsapp_number: "+258 87 100 9140".into(),
            orders_whatsapp_number: "+258 85 398 4699".into(),
            ussd_code: "*898#".into(),
            email: "escoladigital.mz@support.com".into(),
            faq: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntrySpec {
    pub keyword: String,
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: Option<PathBuf>,
    pub stderr: bool,
    pub format: LogFormat,
    #[serde(deserialize_with = "scalar_string")]
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            stderr: false,
            format: LogFormat::Text,
            filter: "info".into(),
        }
    }
}

/// A free subject in the materials catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub topics: Vec<String>,
    /// Source page opened by the material viewer.
    #[serde(default)]
    pub url: Option<Url>,
}

impl PortalConfig {
    /// Configured catalog, or the built-in one when none is configured.
    pub fn catalog(&self) -> Vec<Subject> {
        if self.materials.is_empty() {
            default_catalog()
        } else {
            self.materials.clone()
        }
    }

    /// Case-insensitive lookup by subject name.
    ///
    /// ```
    /// use escola_config::PortalConfig;
    ///
    /// let cfg = PortalConfig::default();
    /// let s = cfg.find_subject("  física ").expect("built-in subject");
    /// assert_eq!(s.name, "Física");
    /// ```
    pub fn find_subject(&self, name: &str) -> Option<Subject> {
        let wanted = name.trim().to_lowercase();
        self.catalog()
            .into_iter()
            .find(|s| s.name.to_lowercase() == wanted)
    }
}

pub fn default_catalog() -> Vec<Subject> {
    fn subject(name: &str, icon: &str, description: &str, topics: [&str; 4]) -> Subject {
        Subject {
            name: name.into(),
            icon: icon.into(),
            description: description.into(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            url: None,
        }
    }
    vec![
        subject(
            "Matemática",
            "📐",
            "Álgebra, geometria, trigonometria e cálculo",
            ["Equações", "Funções", "Geometria", "Estatística"],
        ),
        subject(
            "Física",
            "⚛️",
            "Mecânica, termodinâmica e eletromagnetismo",
            ["Cinemática", "Dinâmica", "Energia", "Ótica"],
        ),
        subject(
            "Química",
            "🧪",
            "Química orgânica, inorgânica e físico-química",
            ["Átomos", "Ligações", "Reações", "Soluções"],
        ),
        subject(
            "Biologia",
            "🧬",
            "Célula, genética, ecologia e evolução",
            ["Células", "DNA", "Evolução", "Ecossistemas"],
        ),
        subject(
            "Português",
            "📝",
            "Gramática, literatura e interpretação de textos",
            ["Gramática", "Literatura", "Redação", "Interpretação"],
        ),
        subject(
            "História",
            "🏛️",
            "História de Moçambique e história mundial",
            ["Colonização", "Independência", "Guerras", "Civilizações"],
        ),
    ]
}

// Env overrides are type-parsed, so `ESCOLA_VERSION=1` or an all-digit phone
// number arrives as an integer (and `true` as a bool).
fn scalar_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(de)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, got {other}"
        ))),
    }
}

fn optional_scalar_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(de)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, got {other}"
        ))),
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) if s.contains('$') => {
            let mut cur = std::mem::take(s);
            for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                let expanded = shellexpand::env(&cur)
                    .map(|cow| cow.into_owned())
                    .unwrap_or_else(|_| cur.clone());
                if expanded == cur {
                    break;
                }
                cur = expanded;
            }
            *s = cur;
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// `<config_dir>/escola/escola.yaml`, when the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("escola").join(DEFAULT_FILE_NAME))
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct PortalConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    with_env: bool,
}

impl Default for PortalConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalConfigLoader {
    /// Start from defaults with `ESCOLA_` environment overrides enabled.
    ///
    /// ```
    /// use escola_config::PortalConfigLoader;
    ///
    /// let cfg = PortalConfigLoader::new()
    ///     .with_yaml_str("version: '1'\nlocale: en")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(cfg.version.as_deref(), Some("1"));
    /// assert_eq!(cfg.content.retries, 0);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            with_env: true,
        }
    }

    /// Skip environment overrides (tests, reproducible dumps).
    pub fn without_env(mut self) -> Self {
        self.with_env = false;
        self
    }

    /// Attach a required file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is silently skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Attach the usual lookup chain: `./escola.yaml`, then the user config dir.
    /// The working-directory file wins over the user-level one.
    pub fn with_default_locations(mut self) -> Self {
        if let Some(user) = user_config_path() {
            self = self.with_optional_file(user);
        }
        self.with_optional_file(DEFAULT_FILE_NAME)
    }

    /// Merge an inline YAML snippet.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders and deserialize.
    ///
    /// ```
    /// use escola_config::PortalConfigLoader;
    ///
    /// unsafe { std::env::set_var("SUPPORT_MAILBOX", "ajuda@escola.example"); }
    ///
    /// let cfg = PortalConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// support:
    ///   email: "${SUPPORT_MAILBOX}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(cfg.support.email, "ajuda@escola.example");
    /// assert_eq!(cfg.support.ussd_code, "*898#");
    ///
    /// unsafe { std::env::remove_var("SUPPORT_MAILBOX"); }
    /// ```
    pub fn load(self) -> Result<PortalConfig, ConfigError> {
        let mut builder = self.builder;
        if self.with_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }
        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: PortalConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        tracing::debug!(
            version = ?typed.version,
            locale = ?typed.locale,
            subjects = typed.materials.len(),
            "config.loaded"
        );
        Ok(typed)
    }
}

/// Render the effective configuration as YAML (for `escola config`).
pub fn to_yaml(cfg: &PortalConfig) -> Result<String, ConfigError> {
    serde_yaml::to_string(cfg).map_err(|e| ConfigError::Message(e.to_string()))
}
