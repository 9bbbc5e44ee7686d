use anyhow::{Context, Result, anyhow, bail};
use dotenvy::dotenv;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use url::Url;

use twup::{DEFAULT_CHUNK_SIZE_BYTES, DEFAULT_UPLOAD_URL};

pub const KEYRING_SERVICE: &str = "twup-bearer-token";
pub const KEYRING_USER: &str = "Twitter";
const ENV_PREFIX: &str = "TWUP_";

#[derive(Debug, Deserialize, Serialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigEnv {
    upload_url: Option<Url>,
    chunk_size: Option<u64>,
    token: Option<String>,
}

pub struct Config {
    pub upload_url: Url,
    pub chunk_size: u64,
    pub token: String,
}

fn merge_config(
    base: ConfigFile,
    override_config: ConfigEnv,
    keyring_token: impl FnOnce() -> Result<String>,
) -> Result<Config> {
    let upload_url = match override_config.upload_url.or(base.upload_url) {
        Some(url) => url,
        None => Url::parse(DEFAULT_UPLOAD_URL)?,
    };

    let chunk_size = override_config
        .chunk_size
        .or(base.chunk_size)
        .unwrap_or(DEFAULT_CHUNK_SIZE_BYTES);
    if chunk_size == 0 {
        bail!("chunk_size must be greater than zero");
    }

    let token = match override_config.token {
        Some(token) => token,
        None => keyring_token()?,
    };

    Ok(Config {
        upload_url,
        chunk_size,
        token,
    })
}

fn config_file_path() -> Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("com", "twup", "twup")
        .ok_or(anyhow!("Unable to determine home directory"))?;
    Ok(project_dirs.config_dir().join("config.toml"))
}

fn read_config_file() -> Result<ConfigFile> {
    let config_file = config_file_path()?;
    match fs::read_to_string(&config_file) {
        Ok(config) => toml::from_str(&config)
            .with_context(|| format!("Failed to parse {}", config_file.display())),
        Err(_) => Ok(ConfigFile::default()),
    }
}

fn read_keyring_token() -> Result<String> {
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
    let token = entry
        .get_secret()
        .context("Bearer token not specified via TWUP_TOKEN nor present in OS keyring")?;
    Ok(String::from_utf8(token)?)
}

fn read_env_config<I>(vars: I) -> Result<ConfigEnv>
where
    I: IntoIterator<Item = (String, String)>,
{
    envy::prefixed(ENV_PREFIX)
        .from_iter(vars)
        .context("Invalid TWUP_* environment variable")
}

pub fn read_config() -> Result<Config> {
    let _ = dotenv();
    let env_config = read_env_config(std::env::vars())?;

    merge_config(read_config_file()?, env_config, read_keyring_token)
}

pub fn write_config(config: ConfigFile) -> Result<()> {
    let config_file = config_file_path()?;
    if let Some(parent) = config_file.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&config_file, toml::to_string_pretty(&config)?)
        .with_context(|| format!("Failed to write {}", config_file.display()))?;
    Ok(())
}

pub fn set_token_keyring(token: String) -> Result<()> {
    let entry = Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
    entry.set_secret(token.as_bytes())?;
    println!("Bearer token set for use with twup");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_keyring() -> Result<String> {
        Err(anyhow!("keyring unavailable"))
    }

    #[test]
    fn test_defaults() {
        let env = ConfigEnv {
            token: Some("t0ken".to_string()),
            ..Default::default()
        };

        let config = merge_config(ConfigFile::default(), env, no_keyring).unwrap();
        assert_eq!(config.upload_url.as_str(), DEFAULT_UPLOAD_URL);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE_BYTES);
        assert_eq!(config.token, "t0ken");
    }

    #[test]
    fn test_env_overrides_file() {
        let file = ConfigFile {
            upload_url: Some(Url::parse("https://file.example/upload.json").unwrap()),
            chunk_size: Some(4096),
        };
        let env = ConfigEnv {
            upload_url: Some(Url::parse("https://env.example/upload.json").unwrap()),
            chunk_size: None,
            token: None,
        };

        let config = merge_config(file, env, || Ok("from-keyring".to_string())).unwrap();
        assert_eq!(config.upload_url.host_str(), Some("env.example"));
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.token, "from-keyring");
    }

    #[test]
    fn test_missing_token() {
        let result = merge_config(ConfigFile::default(), ConfigEnv::default(), no_keyring);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_chunk_size() {
        let file = ConfigFile {
            chunk_size: Some(0),
            ..Default::default()
        };
        let env = ConfigEnv {
            token: Some("t".to_string()),
            ..Default::default()
        };
        assert!(merge_config(file, env, no_keyring).is_err());
    }

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_config_parses_prefixed_vars() {
        let env = read_env_config(vars(&[
            ("TWUP_TOKEN", "secret"),
            ("TWUP_CHUNK_SIZE", "2048"),
            ("TWUP_UPLOAD_URL", "https://env.example/upload.json"),
            ("HOME", "/root"),
        ]))
        .unwrap();

        assert_eq!(env.token.as_deref(), Some("secret"));
        assert_eq!(env.chunk_size, Some(2048));
        assert_eq!(env.upload_url.unwrap().host_str(), Some("env.example"));
    }

    #[test]
    fn test_env_config_absent_vars_are_none() {
        let env = read_env_config(vars(&[("HOME", "/root")])).unwrap();
        assert!(env.token.is_none());
        assert!(env.chunk_size.is_none());
        assert!(env.upload_url.is_none());
    }

    #[test]
    fn test_env_config_malformed_chunk_size_is_an_error() {
        let result = read_env_config(vars(&[
            ("TWUP_TOKEN", "secret"),
            ("TWUP_CHUNK_SIZE", "1MiB"),
        ]));

        let err = result.err().unwrap();
        assert!(err.to_string().contains("TWUP_"));
    }

    #[test]
    fn test_config_file_rejects_unknown_keys() {
        let parsed: Result<ConfigFile, _> = toml::from_str("chunk_size = 10\nmax_retries = 3\n");
        assert!(parsed.is_err());

        let parsed: ConfigFile = toml::from_str("chunk_size = 10\n").unwrap();
        assert_eq!(parsed.chunk_size, Some(10));
    }

    #[test]
    fn test_config_file_round_trip() {
        let config = ConfigFile {
            upload_url: Some(Url::parse(DEFAULT_UPLOAD_URL).unwrap()),
            chunk_size: Some(2 * 1024 * 1024),
        };
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(toml::from_str::<ConfigFile>(&text).unwrap(), config);
    }
}
