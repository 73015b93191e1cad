//! Handle responses from the client.
//!
//! The only response we expect carries the configuration we requested at
//! startup or after a configuration change.

use hlasmkit::lang::server::Analysis;
use super::{Tools,analyze_and_publish,logger};

pub fn handle_response(connection: &lsp_server::Connection, resp: lsp_server::Response, tools: &mut Tools) {
    if let Some(result) = resp.result {
        if let Some(ary) = result.as_array() {
            // this loop always exits in the first iteration, we requested 1 item
            for item in ary {
                match tools.analyzer.update_config(&item.to_string()) {
                    Ok(()) => {
                        let open: Vec<String> = tools.docs.keys().cloned().collect();
                        for uri in open {
                            analyze_and_publish(connection,tools,&uri);
                        }
                    },
                    Err(e) => logger(connection,&format!("configuration did not parse: {}",e))
                }
                return;
            }
        }
    }
    logger(connection,"unexpected response");
}
