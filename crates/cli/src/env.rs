use crate::error::CliError;
use std::collections::HashMap;

const SERVER_ENV_PREFIX: &str = "TRASPASO_SERVER_";

/// Resolves server keys to connection urls from `--server key=url`
/// arguments, falling back to `TRASPASO_SERVER_<KEY>` env variables.
pub struct EnvManager {
    overrides: HashMap<String, String>,
}

impl EnvManager {
    pub fn from_args(servers: &[String]) -> Result<Self, CliError> {
        let mut overrides = HashMap::new();
        for entry in servers {
            let Some((key, url)) = entry.split_once('=') else {
                return Err(CliError::Usage(format!(
                    "--server expects KEY=URL, got '{entry}'"
                )));
            };
            overrides.insert(key.trim().to_ascii_uppercase(), url.trim().to_string());
        }
        Ok(EnvManager { overrides })
    }

    pub fn resolve(&self, server_key: &str) -> Result<String, CliError> {
        let key = server_key.trim().to_ascii_uppercase();
        if let Some(url) = self.overrides.get(&key) {
            return Ok(url.clone());
        }
        let env_name = format!("{SERVER_ENV_PREFIX}{}", key.replace('-', "_"));
        std::env::var(&env_name).map_err(|_| {
            CliError::Usage(format!(
                "no connection url for server '{server_key}' (pass --server {key}=URL or set {env_name})"
            ))
        })
    }
}
