//! Handle notifications from the client.
//!
//! Document synchronization triggers analysis, watched file changes
//! invalidate the caches and re-analyze every open document.

use lsp_types as lsp;
use lsp::notification::Notification;
use hlasmkit::lang::server::Analysis;
use hlasmkit::lang::Document;
use hlasmkit::lang::normalize_client_uri;
use super::{Tools,analyze_and_publish,push_diagnostics,logger};

pub fn handle_notification(connection: &lsp_server::Connection, note: lsp_server::Notification, tools: &mut Tools) {
    match note.method.as_str() {
        lsp::notification::DidOpenTextDocument::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::DidOpenTextDocumentParams>(note.params) {
                let uri = normalize_client_uri(params.text_document.uri);
                let mut doc = Document::new(uri.clone(),params.text_document.text);
                doc.version = Some(params.text_document.version);
                tools.docs.insert(uri.to_string(),doc);
                analyze_and_publish(connection,tools,&uri.to_string());
            }
        },
        lsp::notification::DidChangeTextDocument::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::DidChangeTextDocumentParams>(note.params) {
                let uri = normalize_client_uri(params.text_document.uri);
                // full sync, the last change carries the whole text
                if let Some(change) = params.content_changes.into_iter().last() {
                    let mut doc = Document::new(uri.clone(),change.text);
                    doc.version = Some(params.text_document.version);
                    tools.docs.insert(uri.to_string(),doc);
                }
                tools.analyzer.invalidate_file(&uri.to_string());
                analyze_and_publish(connection,tools,&uri.to_string());
            }
        },
        lsp::notification::DidSaveTextDocument::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::DidSaveTextDocumentParams>(note.params) {
                let uri = normalize_client_uri(params.text_document.uri);
                if let Some(text) = params.text {
                    let doc = Document::new(uri.clone(),text);
                    tools.docs.insert(uri.to_string(),doc);
                }
                analyze_and_publish(connection,tools,&uri.to_string());
            }
        },
        lsp::notification::DidCloseTextDocument::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::DidCloseTextDocumentParams>(note.params) {
                let uri = normalize_client_uri(params.text_document.uri);
                tools.docs.remove(&uri.to_string());
                // an empty array clears previously published diagnostics
                push_diagnostics(connection,uri.clone(),None,Vec::new());
                tools.published.remove(&uri.to_string());
            }
        },
        lsp::notification::DidChangeConfiguration::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::DidChangeConfigurationParams>(note.params) {
                if let Err(e) = tools.analyzer.update_config(&params.settings.to_string()) {
                    logger(connection,&format!("configuration did not parse: {}",e));
                }
                let open: Vec<String> = tools.docs.keys().cloned().collect();
                for uri in open {
                    analyze_and_publish(connection,tools,&uri);
                }
            }
        },
        lsp::notification::DidChangeWatchedFiles::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::DidChangeWatchedFilesParams>(note.params) {
                let mut config_changed = false;
                for change in params.changes {
                    let uri = normalize_client_uri(change.uri);
                    let s = uri.to_string();
                    if s.ends_with("proc_grps.json") || s.ends_with("pgm_conf.json") || s.ends_with(".bridge.json") {
                        config_changed = true;
                    }
                    tools.analyzer.invalidate_file(&s);
                }
                if config_changed {
                    tools.analyzer.reload_config();
                }
                let open: Vec<String> = tools.docs.keys().cloned().collect();
                for uri in open {
                    analyze_and_publish(connection,tools,&uri);
                }
            }
        },
        lsp::notification::Initialized::METHOD => {},
        lsp::notification::Exit::METHOD => {},
        lsp::notification::Cancel::METHOD => {},
        _ => {
            logger(connection,&format!("unhandled notification {}",note.method));
        }
    }
}
