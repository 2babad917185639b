//! Interface de terminal do RUMO — spinners e saída colorida.
//!
//! Usa as crates `indicatif` para spinners de progresso e `console` para
//! estilização com cores. O [`DispatchProgress`] acompanha visualmente
//! o despacho de um job no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::dispatch::{AuditRecord, DispatchState, FailureKind, JobStatus, Outcome};

/// Indicador visual de progresso para o despacho de um job no terminal.
///
/// Exibe um spinner animado durante o roteamento/execução e mensagens
/// coloridas para sucesso (verde) e falha (vermelho).
pub struct DispatchProgress {
    // Barra de progresso/spinner do indicatif.
    pb: ProgressBar,
    // Estilo verde para mensagens de sucesso.
    green: Style,
    // Estilo vermelho para mensagens de falha.
    red: Style,
    // Estilo amarelo para estados intermediários.
    yellow: Style,
}

impl DispatchProgress {
    /// Inicia o spinner com o modelo do job e retorna a instância.
    pub fn start(model_id: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("ROUTING: {model_id}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza a mensagem do spinner para refletir o estado atual.
    #[allow(dead_code)]
    pub fn update_state(&self, state: &DispatchState) {
        self.pb.set_message(format!("{state}"));
    }

    /// Finaliza o spinner e exibe o resultado terminal do job.
    ///
    /// Sucesso é mostrado em verde com checkmark; falha em vermelho com X.
    /// Modelos não reconhecidos ganham uma dica amarela.
    pub fn complete(&self, outcome: &Outcome) {
        self.pb.finish_and_clear();
        match outcome {
            Outcome::Success(_) => {
                println!("  {} Job dispatched successfully", self.green.apply_to("✓"));
            }
            Outcome::Failure(kind @ FailureKind::UnrecognizedModel(_)) => {
                println!("  {} Job failed: {kind}", self.red.apply_to("✗"));
                println!(
                    "  {} no routing predicate matched; see `rumo routes`",
                    self.yellow.apply_to("•")
                );
            }
            Outcome::Failure(kind) => {
                println!("  {} Job failed: {kind}", self.red.apply_to("✗"));
            }
        }
    }

    /// Imprime o registro de auditoria formatado em JSON com estilo colorido.
    pub fn print_audit(&self, record: &AuditRecord) {
        let status_style = match record.status {
            JobStatus::Completed => &self.green,
            JobStatus::Failed => &self.red,
            _ => &self.yellow,
        };
        println!();
        println!("{}", status_style.apply_to("─── Audit Record ───"));
        println!(
            "{}",
            serde_json::to_string_pretty(record).unwrap_or_default()
        );
    }
}
