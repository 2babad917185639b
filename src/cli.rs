//! Interface de linha de comando do RUMO baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (dispatch, routes,
//! demo) e flags globais (--endpoint, --max-attempts, --verbose).

use clap::{Parser, Subcommand};

/// RUMO — motor de despacho de jobs de geração por modelo.
#[derive(Debug, Parser)]
#[command(name = "rumo", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// URL base do serviço de computação (sobrepõe rumo.toml).
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Total de tentativas por tarefa de invocação.
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Despacha um job para o pipeline do seu modelo.
    Dispatch {
        /// Identificador do modelo (ex.: "anthropic.claude-3-sonnet").
        model: String,

        /// Prompt de texto usado como payload do job.
        #[arg(long)]
        prompt: Option<String>,

        /// Caminho para um arquivo JSON contendo o payload do job.
        #[arg(long)]
        file: Option<String>,

        /// Identificador de correlação do job (opaco, repassado).
        #[arg(long)]
        job_id: Option<String>,

        /// Identificador de correlação do item (opaco, repassado).
        #[arg(long)]
        item_id: Option<String>,
    },

    /// Lista a tabela de roteamento na ordem de registro.
    Routes,

    /// Executa a demonstração embutida da máquina de estados, sem rede.
    Demo,
}
