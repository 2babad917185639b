//! Tipos de erro para o cliente do serviço de computação externo.
//!
//! Define [`ComputeError`] com variantes para rate limiting, erros do
//! serviço e erros de rede, e a classificação transitório/permanente
//! usada pela lógica de retentativa. Usa `thiserror` para derivar
//! `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Erros que podem ocorrer ao invocar o serviço de computação.
///
/// A distinção central é [`is_transient`](ComputeError::is_transient):
/// falhas transitórias (timeout, rate limit, 5xx, rede) são retentadas
/// pela tarefa de invocação; falhas permanentes (requisição inválida,
/// resposta não parseável) falham imediatamente.
#[derive(Debug, Error)]
pub enum ComputeError {
    /// O serviço retornou HTTP 429 (rate limit).
    /// O campo `retry_after_ms` indica quantos milissegundos esperar.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Erro do lado do serviço (5xx) — tipicamente recuperável.
    #[error("service error (status {status}): {message}")]
    Service { status: u16, message: String },

    /// O serviço rejeitou a requisição (4xx) — não retentável.
    #[error("invalid request (status {status}): {message}")]
    InvalidRequest { status: u16, message: String },

    /// A tentativa excedeu o timeout configurado.
    #[error("request timed out")]
    Timeout,

    /// Falha de rede subjacente (DNS, conexão recusada).
    /// Encapsula o erro original do `reqwest` via `#[from]`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// O corpo da resposta não pôde ser interpretado.
    #[error("failed to parse service response: {0}")]
    Parse(String),
}

impl ComputeError {
    /// Whether a failed attempt with this error may be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            ComputeError::RateLimited { .. }
            | ComputeError::Service { .. }
            | ComputeError::Timeout
            | ComputeError::Network(_) => true,
            ComputeError::InvalidRequest { .. } | ComputeError::Parse(_) => false,
        }
    }
}
