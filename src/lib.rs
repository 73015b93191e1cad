//! # `hlasmkit` main library
//! 
//! This library analyzes High Level Assembler (HLASM) source, with emphasis on the
//! services a language client needs: diagnostics, symbol information, and
//! inactive-code (fade) annotations.  The language server compiles to a separate
//! executable, its entry point is in `src/bin/server-hlasm`.
//! 
//! ## Architecture
//! 
//! Analysis is organized around a single pass over the open code, during which
//! macro invocations and COPY members are followed into library files:
//! 
//! * `lang::hlasm::context` holds the program state: symbol tables, macro and copy
//!   storage, the opcode table with its OPSYN overlay, and the nested scope, source,
//!   and copy stacks
//! * `lang::hlasm::providers` produce statements from the open code, active macros,
//!   copy members, and AINSERT buffers, highest priority source first
//! * `lang::hlasm::processors` decide what happens to each statement: ordinary
//!   processing, macro definition collection, lookahead, or copy processing
//! * `lang::hlasm::instructions` dispatch resolved operation codes to the four
//!   instruction families (conditional assembly, assembler, machine, macro call)
//! * `lang::hlasm::context::ordinary` lays out sections and location counters and
//!   resolves symbol dependencies incrementally
//! * `lang::hlasm::workspace` maps programs to processor groups and resolves
//!   external macro and copy libraries
//! 
//! ## Workspace Configuration
//! 
//! Two JSON documents govern analysis, following the conventions of the original
//! HLASM tooling: `.hlasmplugin/proc_grps.json` enumerates processor groups and
//! their libraries, and `.hlasmplugin/pgm_conf.json` maps programs to groups.
//! A `.bridge.json` file may override the mapping per directory.

pub mod lang;

type DYNERR = Box<dyn std::error::Error>;
type STDRESULT = Result<(),Box<dyn std::error::Error>>;
