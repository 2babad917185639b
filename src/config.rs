//! Configuração do RUMO carregada a partir de `rumo.toml`.
//!
//! A struct [`RumoConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `RUMO_API_KEY` tem precedência sobre o arquivo.

use std::path::Path;

use serde::Deserialize;

use crate::dispatch::RetryPolicy;
use crate::error::RumoError;

/// Configuração de nível superior carregada de `rumo.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct RumoConfig {
    /// URL base do serviço de computação externo.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Chave de API anexada às invocações.
    #[serde(default)]
    pub api_key: String,

    /// Total de tentativas por tarefa de invocação (1 desabilita retry).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Atraso base em milissegundos para backoff exponencial.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Timeout por tentativa, em milissegundos.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

// Valor padrão para o endpoint: gateway local.
fn default_endpoint() -> String {
    "http://localhost:8080".to_string()
}

// Valor padrão para tentativas: 3.
fn default_max_attempts() -> u32 {
    3
}

// Valor padrão para o atraso base: 1000ms.
fn default_base_delay_ms() -> u64 {
    1000
}

// Valor padrão para o timeout por tentativa: 30s.
fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for RumoConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RumoConfig {
    /// Carrega a configuração de `rumo.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self, RumoError> {
        Self::load_from(Path::new("rumo.toml"))
    }

    /// Carrega a configuração do caminho dado, com defaults e precedência
    /// da variável de ambiente para a chave de API.
    pub fn load_from(path: &Path) -> Result<Self, RumoError> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<RumoConfig>(&contents)?
        } else {
            Self::default()
        };

        // Variável de ambiente tem precedência sobre o arquivo para a chave.
        if let Ok(key) = std::env::var("RUMO_API_KEY")
            && !key.is_empty()
        {
            config.api_key = key;
        }

        Ok(config)
    }

    /// Política de retentativa derivada da configuração.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay_ms: self.base_delay_ms,
            timeout_ms: self.timeout_ms,
        }
    }
}
