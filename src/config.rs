use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::llm::responder::Persona;
use crate::pipeline::ReplyRouting;

pub const DEFAULT_QUERY: &str = "is:unread -in:archive";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";

/// Who receives generated replies.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyTo {
    #[default]
    Operator,
    Sender,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Google credential JSON: service account key or OAuth client.
    pub credentials_file: Option<String>,
    /// Mailbox the service acts as.
    pub mailbox: Option<String>,
    pub query: Option<String>,
    #[serde(default)]
    pub reply_to: ReplyTo,
    pub operator_address: Option<String>,
    /// SQLite file remembering answered messages across runs.
    pub ledger_path: Option<String>,
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub persona: Persona,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub credentials_file: PathBuf,
    pub mailbox: String,
    pub query: String,
    pub routing: ReplyRouting,
    pub ledger_path: Option<PathBuf>,
    pub redirect_uri: String,
    pub openai: OpenAiSettings,
    pub persona: Persona,
}

#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub organization: Option<String>,
    pub project: Option<String>,
    pub model: String,
    pub base_url: String,
}

pub fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow!("no config dir available"))?
        .join("mail_responder"))
}

pub fn config_path() -> Result<PathBuf> {
    if let Ok(p) = std::env::var("MAIL_RESPONDER_CONFIG") {
        return Ok(PathBuf::from(p));
    }
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

/// Load a `.env` file into the process environment. A missing file is not an
/// error; anything else (unreadable, malformed) is handed back for logging.
pub fn load_env_file(path: Option<&Path>) -> Option<dotenvy::Error> {
    let loaded = match path {
        Some(p) => dotenvy::from_path(p),
        None => dotenvy::dotenv().map(|_| ()),
    };
    match loaded {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

/// Load the config file (writing a template if missing) and apply environment overrides.
pub fn load_config() -> Result<Config> {
    let path = config_path()?;
    if !path.exists() {
        let sample = Config {
            credentials_file: Some("/path/to/credentials.json".to_string()),
            mailbox: Some("support@example.com".to_string()),
            query: Some(DEFAULT_QUERY.to_string()),
            reply_to: ReplyTo::Operator,
            operator_address: Some("operator@example.com".to_string()),
            ledger_path: None,
            redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
            openai: OpenAiConfig {
                model: Some(DEFAULT_MODEL.to_string()),
                ..Default::default()
            },
            persona: Persona::default(),
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(&path, tom)?;
        return Err(anyhow!(
            "Created template config at {}; edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)?;
    let mut cfg: Config = toml::from_str(&s)?;
    cfg.apply_env(|k| std::env::var(k).ok());
    Ok(cfg)
}

impl Config {
    /// Environment variables win over file values.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(v) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = Some(v);
            }
        };
        set(&mut self.credentials_file, "MAIL_RESPONDER_CREDENTIALS");
        set(&mut self.mailbox, "MAIL_RESPONDER_MAILBOX");
        set(&mut self.operator_address, "MAIL_RESPONDER_OPERATOR");
        set(&mut self.openai.api_key, "OPENAI_API_KEY");
        set(&mut self.openai.organization, "OPENAI_ORGANIZATION");
        set(&mut self.openai.project, "OPENAI_PROJECT");
        set(&mut self.openai.model, "OPENAI_MODEL");
    }

    pub fn resolve(&self) -> Result<Settings> {
        let mailbox = required(&self.mailbox, "mailbox")?;
        let credentials_file = PathBuf::from(required(&self.credentials_file, "credentials_file")?);
        let api_key = required(&self.openai.api_key, "openai.api_key (or OPENAI_API_KEY)")?;

        let routing = match self.reply_to {
            ReplyTo::Sender => ReplyRouting::Sender,
            ReplyTo::Operator => ReplyRouting::Operator(required(
                &self.operator_address,
                "operator_address (required when reply_to = \"operator\")",
            )?),
        };

        Ok(Settings {
            credentials_file,
            mailbox,
            query: self
                .query
                .clone()
                .unwrap_or_else(|| DEFAULT_QUERY.to_string()),
            routing,
            ledger_path: self.ledger_path.as_ref().map(PathBuf::from),
            redirect_uri: self
                .redirect_uri
                .clone()
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            openai: OpenAiSettings {
                api_key,
                organization: self.openai.organization.clone(),
                project: self.openai.project.clone(),
                model: self
                    .openai
                    .model
                    .clone()
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                base_url: self
                    .openai
                    .base_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            },
            persona: self.persona.clone(),
        })
    }
}

fn required(value: &Option<String>, key: &str) -> Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{key} not set in config"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = r#"
        credentials_file = "/etc/mail_responder/sa.json"
        mailbox = "hello@shop.example"
        operator_address = "ops@shop.example"

        [openai]
        api_key = "from-file"
    "#;

    #[test]
    fn missing_env_file_is_silent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env_file(Some(&dir.path().join(".env"))).is_none());
    }

    #[test]
    fn malformed_env_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "MAIL_RESPONDER_TEST_BROKEN=\"never closed\n").unwrap();
        assert!(load_env_file(Some(&path)).is_some());
    }

    #[test]
    fn resolves_defaults() {
        let cfg: Config = toml::from_str(FILE).unwrap();
        let s = cfg.resolve().unwrap();
        assert_eq!(s.mailbox, "hello@shop.example");
        assert_eq!(s.query, DEFAULT_QUERY);
        assert_eq!(s.openai.model, DEFAULT_MODEL);
        assert_eq!(s.openai.base_url, DEFAULT_OPENAI_URL);
        assert_eq!(
            s.routing,
            ReplyRouting::Operator("ops@shop.example".to_string())
        );
        assert!(s.ledger_path.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let mut cfg: Config = toml::from_str(FILE).unwrap();
        cfg.apply_env(|k| match k {
            "OPENAI_API_KEY" => Some("from-env".to_string()),
            "OPENAI_PROJECT" => Some("proj_1".to_string()),
            "MAIL_RESPONDER_MAILBOX" => Some("  ".to_string()),
            _ => None,
        });
        let s = cfg.resolve().unwrap();
        assert_eq!(s.openai.api_key, "from-env");
        assert_eq!(s.openai.project.as_deref(), Some("proj_1"));
        assert_eq!(s.mailbox, "hello@shop.example");
    }

    #[test]
    fn sender_routing_needs_no_operator() {
        let mut cfg: Config = toml::from_str(FILE).unwrap();
        cfg.reply_to = ReplyTo::Sender;
        cfg.operator_address = None;
        assert_eq!(cfg.resolve().unwrap().routing, ReplyRouting::Sender);
    }

    #[test]
    fn missing_required_values_fail() {
        let mut cfg: Config = toml::from_str(FILE).unwrap();
        cfg.operator_address = None;
        let err = cfg.resolve().unwrap_err().to_string();
        assert!(err.contains("operator_address"));

        let mut cfg: Config = toml::from_str(FILE).unwrap();
        cfg.openai.api_key = None;
        assert!(cfg.resolve().is_err());
    }

    #[test]
    fn persona_fields_override_defaults() {
        let cfg: Config = toml::from_str("[persona]\nbrand = \"Acme\"").unwrap();
        assert_eq!(cfg.persona.brand, "Acme");
        assert_eq!(cfg.persona.signer, Persona::default().signer);
    }

    #[test]
    fn reply_to_parses_lowercase() {
        let cfg: Config = toml::from_str("reply_to = \"sender\"").unwrap();
        assert_eq!(cfg.reply_to, ReplyTo::Sender);
    }
}
