//! Handle requests from the client.
//!
//! The core's request surface is small: the lifecycle handshake is honored
//! and anything else is rejected as an unknown method.

use super::{Tools,rpc_error,logger};

/// Returns true when the connection should shut down.
pub fn handle_request(connection: &lsp_server::Connection, req: lsp_server::Request, _tools: &mut Tools) -> bool {
    match connection.handle_shutdown(&req) {
        Ok(true) => return true,
        Ok(false) => {},
        Err(e) => {
            logger(connection,&format!("shutdown handshake failed: {}",e));
            return true;
        }
    }
    let resp = lsp_server::Response::new_err(
        req.id,
        rpc_error::METHOD_NOT_FOUND,
        format!("unknown method {}",req.method)
    );
    match connection.sender.send(lsp_server::Message::Response(resp)) {
        Ok(()) => {},
        Err(_) => logger(connection,"could not reject request")
    }
    false
}
