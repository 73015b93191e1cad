
//! This is the HLASM language server.
//! Cargo will compile this to a standalone executable.
//!
//! The hlasmkit library crate provides the analysis.
//! The server activity is all in this file and its submodules.

use lsp_types as lsp;
use lsp::{notification::Notification, request::Request};
use lsp_server;
use serde_json;
use std::collections::{HashMap,HashSet};
use std::error::Error;
use hlasmkit::lang::server::Analysis;
use hlasmkit::lang::hlasm::analyzer::Analyzer;

mod notification;
mod request;
mod response;

// JSON-RPC error codes; are they defined somewhere else?
// -32768 through -32000 are reserved
mod rpc_error {
    pub const METHOD_NOT_FOUND: i32 = -32601;
}

/// Send log messages to the client.
fn logger(connection: &lsp_server::Connection, message: &str) {
    let note = lsp_server::Notification::new(
        lsp::notification::LogMessage::METHOD.to_string(),
        lsp::LogMessageParams {
            typ: lsp::MessageType::LOG,
            message: message.to_string()
        }
    );
    match connection.sender.send(lsp_server::Message::Notification(note)) {
        Err(_) => {}, // nowhere to send log, what can we do about it?
        Ok(()) => {}
    }
}

/// request the root configuration item
fn request_configuration(connection: &lsp_server::Connection) -> Result<(),Box<dyn Error>> {
    let req = lsp_server::Request::new(
        lsp_server::RequestId::from("hlasm-pull-config".to_string()),
        lsp::request::WorkspaceConfiguration::METHOD.to_string(),
        lsp::ConfigurationParams { items: vec![
            lsp::ConfigurationItem {
                scope_uri: None,
                section: Some("hlasm".to_string())
            }
        ]}
    );
    match connection.sender.send(req.into()) {
        Ok(()) => Ok(()),
        Err(e) => Err(Box::new(e))
    }
}

/// Diagnostics are never requested by the client.
/// This server pushes them up after an analysis pass, which in turn is
/// triggered by document changes.
pub fn push_diagnostics(connection: &lsp_server::Connection, uri: lsp::Url, version: Option<i32>, diagnostics: Vec<lsp::Diagnostic>) {
    let note = lsp_server::Notification::new(
        "textDocument/publishDiagnostics".to_string(),
        lsp::PublishDiagnosticsParams {
            uri,
            diagnostics,
            version
        }
    );
    match connection.sender.send(lsp_server::Message::Notification(note)) {
        Err(_) => logger(connection,"could not push diagnostics"),
        Ok(()) => {}
    }
}

/// Fade annotations travel in a custom notification, the client dims the
/// reported ranges.
pub fn push_fades(connection: &lsp_server::Connection, uri: &lsp::Url, ranges: Vec<lsp::Range>) {
    let note = lsp_server::Notification::new(
        "hlasm/fadedRanges".to_string(),
        serde_json::json!({
            "uri": uri.to_string(),
            "ranges": ranges
        })
    );
    match connection.sender.send(lsp_server::Message::Notification(note)) {
        Err(_) => logger(connection,"could not push fade ranges"),
        Ok(()) => {}
    }
}

/// internal faults are reported to telemetry, the pass is abandoned but the
/// server keeps running
pub fn push_telemetry_error(connection: &lsp_server::Connection, kind: &str, message: &str) {
    let note = lsp_server::Notification::new(
        "telemetry/event".to_string(),
        hlasmkit::lang::server::telemetry_error(kind,message)
    );
    match connection.sender.send(lsp_server::Message::Notification(note)) {
        Err(_) => logger(connection,"could not push telemetry"),
        Ok(()) => {}
    }
}

pub struct Tools {
    pub analyzer: Analyzer,
    /// open documents by uri string
    pub docs: HashMap<String,hlasmkit::lang::Document>,
    /// files that currently have published diagnostics, so stale sets clear
    pub published: HashSet<String>
}

impl Tools {
    pub fn new() -> Self {
        Self {
            analyzer: Analyzer::new(),
            docs: HashMap::new(),
            published: HashSet::new()
        }
    }
}

/// analyze a document and publish diagnostics and fades for every file the
/// pass visited, clearing files that no longer report anything
pub fn analyze_and_publish(connection: &lsp_server::Connection, tools: &mut Tools, uri_string: &str) {
    let Some(doc) = tools.docs.get(uri_string).cloned() else {
        return;
    };
    if let Err(e) = tools.analyzer.analyze(&doc) {
        push_telemetry_error(connection,"analysis",&e.to_string());
        return;
    }
    let mut still_published = HashSet::new();
    for uri in tools.analyzer.visited_files() {
        let diagnostics = tools.analyzer.get_diags(&uri);
        let version = tools.docs.get(&uri.to_string()).and_then(|d| d.version);
        push_diagnostics(connection,uri.clone(),version,diagnostics);
        push_fades(connection,&uri,tools.analyzer.get_fades(&uri));
        still_published.insert(uri.to_string());
    }
    for old in tools.published.iter() {
        if !still_published.contains(old) {
            if let Ok(uri) = lsp::Url::parse(old) {
                push_diagnostics(connection,uri,None,Vec::new());
            }
        }
    }
    tools.published = still_published;
}

fn main() -> Result<(), Box<dyn Error + Sync + Send>> {
    hlasmkit::lang::server::parse_args();

    let mut tools = Tools::new();
    let (connection, io_threads) = lsp_server::Connection::stdio();

    logger(&connection,"start initializing connection");
    let (id,params) = connection.initialize_start()?;
    let params: lsp::InitializeParams = serde_json::from_value(params)?;

    let result = lsp::InitializeResult {
        capabilities: lsp::ServerCapabilities {
            text_document_sync: Some(lsp::TextDocumentSyncCapability::Options(
                lsp::TextDocumentSyncOptions {
                    open_close: Some(true),
                    change: Some(lsp::TextDocumentSyncKind::FULL),
                    will_save: None,
                    will_save_wait_until: None,
                    save: Some(lsp::TextDocumentSyncSaveOptions::SaveOptions(
                        lsp::SaveOptions {
                            include_text: Some(true)
                        }
                    ))
                }
            )),
            ..lsp::ServerCapabilities::default()
        },
        server_info: Some(lsp::ServerInfo {
            name: "hlasmkit".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string())
        })
    };
    connection.initialize_finish(id, serde_json::to_value(result)?)?;
    logger(&connection,"connection initialized");

    // starting configuration
    match request_configuration(&connection) {
        Ok(()) => {},
        Err(_) => logger(&connection,"could not request starting configuration")
    }

    // initial workspace scan picks up the configuration documents
    if let Some(folders) = params.workspace_folders {
        let source_dirs = folders.iter().map(|f| f.uri.clone()).collect::<Vec<lsp::Url>>();
        match tools.analyzer.init_workspace(source_dirs, Vec::new()) {
            Ok(()) => {},
            Err(e) => logger(&connection,&format!("initial workspace scan failed: {}",e))
        }
    }

    // main loop
    loop {
        if let Ok(msg) = connection.receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            match msg {
                lsp_server::Message::Notification(note) => {
                    notification::handle_notification(&connection,note,&mut tools);
                }
                lsp_server::Message::Request(req) => {
                    if request::handle_request(&connection, req, &mut tools) {
                        break;
                    }
                },
                lsp_server::Message::Response(resp) => {
                    response::handle_response(&connection, resp, &mut tools);
                }
            }
        }
    }

    io_threads.join()?;
    Ok(())
}
