//! # Generics and traits for language servers
//!
//! These traits aid in the handling of requests and notifications that are
//! typically sent by a language client.  The `Analysis` trait is implemented
//! by the HLASM analyzer and consumed by the server executable.

use std::io::Write;
use std::str::FromStr;
use lsp_types as lsp;

use crate::STDRESULT;

/// This trait object serves the language server, whether the analysis runs on
/// the main loop or in a worker.  The implementation defines all mechanisms
/// for updating document, symbol, and diagnostic information.
pub trait Analysis {
    /// Gather workspace level configuration that may affect analysis of any
    /// document, such as processor group definitions.
    fn init_workspace(&mut self,_source_dirs: Vec<lsp::Url>,_volatile_docs: Vec<super::Document>) -> STDRESULT {
        Ok(())
    }
    /// Analyze an open code document to produce diagnostic and symbol information.
    fn analyze(&mut self,doc: &super::Document) -> STDRESULT;
    /// Parse the JSON to update the configuration.
    /// Unknown keys or unexpected values can be handled as the analyzer chooses.
    fn update_config(&mut self,json_str: &str) -> STDRESULT;
    /// Get a clone of the publishable diagnostics for the given file.
    /// The available files are the open code that was analyzed, or any
    /// macro or copy member it visited.  Suppression is already applied.
    fn get_diags(&self,uri: &lsp::Url) -> Vec<lsp::Diagnostic>;
    /// Get the inactive-code annotations for the given file.
    fn get_fades(&self,uri: &lsp::Url) -> Vec<lsp::Range>;
    /// Every file touched during the last analysis, including the open code.
    fn visited_files(&self) -> Vec<lsp::Url>;
    fn err_warn_info_counts(&self) -> [usize;3];
}

pub fn basic_diag(range: lsp::Range,mess: &str,severity: lsp::DiagnosticSeverity) -> lsp::Diagnostic {
    lsp::Diagnostic {
        range,
        severity: Some(severity),
        code: None,
        code_description: None,
        source: None,
        message: mess.to_string(),
        related_information: None,
        tags: None,
        data: None
    }
}

/// Diagnostic with a code such as `E031`, severity is derived from the
/// leading letter unless the code is `MNOTE` or `SUP`.
pub fn coded_diag(range: lsp::Range, code: &str, mess: &str) -> lsp::Diagnostic {
    let severity = match code.chars().next() {
        Some('E') | Some('S') => lsp::DiagnosticSeverity::ERROR,
        Some('W') => lsp::DiagnosticSeverity::WARNING,
        Some('A') => lsp::DiagnosticSeverity::ERROR,
        _ => lsp::DiagnosticSeverity::INFORMATION
    };
    let mut ans = basic_diag(range,mess,severity);
    ans.code = Some(lsp::NumberOrString::String(code.to_string()));
    ans.source = Some("hlasmkit".to_string());
    ans
}

fn setup_env_logger(filt: log::LevelFilter, path: &str) {
    if filt==log::LevelFilter::Off {
        return;
    }
    let logging_file = Box::new(std::fs::File::create(path).expect("failed to create log file"));
    env_logger::Builder::new().format(|buf,record| {
        writeln!(buf,"{}:{} [{}] - {}",record.file().unwrap_or("unknown"),
            record.line().unwrap_or(0),
            record.level(),
            record.args()
        )
    })
    .filter(Some("hlasmkit::lang"),filt)
    .target(env_logger::Target::Pipe(logging_file))
    .init();
}

/// Parse the language server's command line arguments.
/// Sets up logging based on the arguments, panics if log level or log file are invalid.
pub fn parse_args() -> (Vec<bool>,Vec<String>) {
    let mut log_level = log::LevelFilter::Off;
    let mut log_file = "hlasmkit_log.txt".to_string();

    let mut args = std::env::args().into_iter();
    args.next();
    while let Some(val) = args.next() {
        if &val == "--log-level" {
            if let Some(val) = args.next() {
                log_level = log::LevelFilter::from_str(&val).expect("invalid logging filter");
            }
        } else if &val == "--log-file" {
            if let Some(val) = args.next() {
                log_file = val;
            }
        }
    }
    setup_env_logger(log_level, &log_file);
    (vec![],vec![])
}

/// internal fault report suitable for a `telemetry/event` notification
pub fn telemetry_error(kind: &str, message: &str) -> serde_json::Value {
    serde_json::json!({
        "method_name": format!("server_error/{}",kind),
        "properties": { "message": message },
        "measurements": {}
    })
}
