//! # HLASM analysis
//!
//! This module is used by both the CLI and the language server.
//! The statement parser is hand written, HLASM's fixed line format does not
//! reward a generated grammar, and the conditional assembly language requires
//! re-parsing of statement fields after substitution in any case.
//!
//! The analyzer makes a single coordinated pass over a program.  Statements are
//! drawn from a prioritized set of providers (active macro, copy member, AINSERT
//! buffer, open code), handed to the active statement processor (ordinary, macro
//! definition, lookahead, copy), and dispatched by operation code to one of the
//! four instruction families.  Ordinary assembly layout is resolved by an
//! incremental dependency solver, so forward references settle as soon as their
//! dependencies are defined.
//!
//! We test against the behavior of the original HLASM tooling where the
//! language reference is ambiguous.  Notable conventions:
//!
//! * symbol names are case insensitive and are interned upper case
//! * user-input failures are diagnostics, never errors; handlers record and continue
//! * a pass is deterministic, analyzing unchanged source twice gives identical output

pub mod ids;
pub mod opcodes;
pub mod statement;
pub mod parser;
pub mod variables;
pub mod expressions;
pub mod data_def;
pub mod context;
pub mod providers;
pub mod processors;
pub mod instructions;
pub mod macro_cache;
pub mod diagnostics;
pub mod workspace;
pub mod analyzer;

#[cfg(test)]
mod tests;

/// default limit on conditional assembly branches per scope, see ACTR
pub const DEFAULT_ACTR: i64 = 1000;
/// default limit on macro invocations, see MHELP
pub const DEFAULT_SYSNDX_LIMIT: usize = 1_000_000;
/// K' of a SETC value can never exceed this
pub const MAX_SETC_LENGTH: usize = 4064;
