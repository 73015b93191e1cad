//! Statement providers.
//!
//! A provider produces the next logical statement.  In priority order: the
//! replay of an active macro body, the body of an active copy member, and
//! the top of the source stack (an AINSERT buffer or the open code itself).
//! The highest priority non-exhausted provider wins each step; a provider
//! that reaches end of stream pops its frame, and when the bottom of the
//! source stack is exhausted the pass terminates.
//!
//! Macro bodies and copy members are stored as raw lines and re-parsed on
//! replay, which is also what realizes their model statements.

use super::context::HlasmContext;
use super::parser::{self,LogicalLine};
use super::statement::Statement;

/// which provider produced a statement
#[derive(Clone,Copy,PartialEq,Eq,Debug)]
pub enum Provenance {
    MacroBody,
    CopyMember,
    Ainsert,
    OpenCode
}

/// Produce the next statement, or None when the pass is over.
pub fn next_statement(ctx: &mut HlasmContext) -> Option<(Statement,Provenance)> {
    loop {
        // an active macro invocation replays its stored body
        if let Some(inv) = ctx.current_scope().invocation.clone() {
            let def = match ctx.macros.get(&inv.id) {
                Some(def) => def.clone(),
                None => {
                    log::error!("macro body vanished during replay");
                    ctx.leave_macro();
                    continue;
                }
            };
            if inv.pos < def.body.len() {
                let stored = &def.body[inv.pos];
                if let Some(scope_inv) = ctx.current_scope_mut().invocation.as_mut() {
                    scope_inv.pos += 1;
                }
                let line = LogicalLine {
                    text: stored.text.clone(),
                    row: stored.row,
                    row_count: 1,
                    comment: stored.text.starts_with('*') || stored.text.starts_with(".*")
                };
                return Some((parser::parse_statement(&line,&stored.file),Provenance::MacroBody));
            }
            // a body always ends with MEND, falling off is a recovery path
            ctx.leave_macro();
            continue;
        }
        // an active copy member on the current source
        let copy_frame = ctx.source_stack.last().and_then(|src| src.copy_stack.last().cloned());
        if let Some(frame) = copy_frame {
            let member = match ctx.copy_members.get(&frame.member) {
                Some(m) => m.clone(),
                None => {
                    ctx.leave_copy();
                    continue;
                }
            };
            if frame.pos < member.lines.len() {
                let line = member.lines[frame.pos].clone();
                if let Some(src) = ctx.source_stack.last_mut() {
                    if let Some(f) = src.copy_stack.last_mut() {
                        f.pos += 1;
                    }
                }
                return Some((parser::parse_statement(&line,&member.file),Provenance::CopyMember));
            }
            ctx.leave_copy();
            continue;
        }
        // the top of the source stack
        let (file,ainsert,line) = match ctx.source_stack.last_mut() {
            Some(src) => {
                if src.pos < src.lines.len() {
                    let line = src.lines[src.pos].clone();
                    src.pos += 1;
                    (src.file.clone(),src.ainsert,Some(line))
                } else {
                    (src.file.clone(),src.ainsert,None)
                }
            },
            None => return None
        };
        match line {
            Some(line) => {
                let provenance = match ainsert {
                    true => Provenance::Ainsert,
                    false => Provenance::OpenCode
                };
                return Some((parser::parse_statement(&line,&file),provenance));
            },
            None => {
                if ctx.source_stack.len() > 1 {
                    ctx.source_stack.pop();
                    continue;
                }
                return None;
            }
        }
    }
}

/// AREAD: consume the next raw open code line, bypassing the parser.
/// Reads from the bottom of the source stack, which is the open code file.
pub fn read_raw_line(ctx: &mut HlasmContext) -> Option<String> {
    let src = ctx.source_stack.first_mut()?;
    if src.pos < src.lines.len() {
        let text = src.lines[src.pos].text.clone();
        src.pos += 1;
        return Some(text);
    }
    None
}
