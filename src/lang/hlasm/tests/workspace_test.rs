//! Workspace plumbing: resource locations, configuration substitution,
//! diagnostic suppression, and the core value types.

use super::{analyze,opencode_diags,codes};
use super::super::workspace::resource::ResourceLocation;
use super::super::workspace::config;
use super::super::variables::MacroParamData;
use super::super::ids::{Id,IdPool};
use super::super::diagnostics::SUPPRESSED;

mod resource_location {
    use super::ResourceLocation;

    #[test]
    fn normalization_is_idempotent() {
        let cases = [
            "file:///home/user/./src/../lib/member.hlasm",
            "file:///C:/Dir/Sub/../file.asm",
            "hlasm://library/MEMBER",
            "file:///plain/path/"
        ];
        for case in cases {
            let once = ResourceLocation::new(case);
            let twice = once.lexically_normal();
            assert_eq!(once,twice,"normalizing {} twice changed it",case);
        }
    }

    #[test]
    fn dot_segments_are_removed() {
        let loc = ResourceLocation::new("file:///home/user/./src/../lib/member.hlasm");
        assert_eq!(loc.as_str(),"file:///home/user/lib/member.hlasm");
    }

    #[test]
    fn drive_letter_folds_to_lower_case() {
        let loc = ResourceLocation::new("file:///C:/Dir/file.asm");
        assert_eq!(loc.as_str(),"file:///c:/Dir/file.asm");
    }

    #[test]
    fn join_after_relative_to_round_trips() {
        let base = ResourceLocation::new("file:///work/project/");
        let target = ResourceLocation::new("file:///work/project/libs/MAC1.hlasm");
        let rel = base.relative_to(&target).expect("target is under base");
        assert_eq!(base.join(&rel),target);
    }

    #[test]
    fn join_with_parent_reference() {
        let base = ResourceLocation::new("file:///work/project/src/");
        assert_eq!(base.join("../libs/M.hlasm").as_str(),"file:///work/project/libs/M.hlasm");
    }
}

mod configuration {
    use super::config;

    #[test]
    fn proc_grps_parses_both_lib_forms() {
        let text = r#"{ "pgroups": [ { "name": "GROUP1",
            "libs": [ "libs", { "path": "more/libs", "optional": true,
                                "macro_extensions": [".mac"] } ],
            "asm_options": { "SYSPARM": "DEBUG", "GOFF": true } } ] }"#;
        let mut unresolved = Vec::new();
        let parsed = config::parse_proc_grps(text,&serde_json::Value::Null,&mut unresolved).expect("parse");
        assert_eq!(parsed.pgroups.len(),1);
        let group = &parsed.pgroups[0];
        assert_eq!(group.libs.len(),2);
        assert_eq!(group.libs[0].path(),"libs");
        assert!(group.libs[1].optional());
        assert_eq!(group.asm_options.sysparm.as_deref(),Some("DEBUG"));
        assert!(unresolved.is_empty());
    }

    #[test]
    fn config_substitution_resolves() {
        let settings = serde_json::json!({ "lib": { "root": "/opt/libs" } });
        let mut unresolved = Vec::new();
        let out = config::substitute_config("path is ${config:lib.root} here",&settings,&mut unresolved);
        assert_eq!(out,"path is /opt/libs here");
        assert!(unresolved.is_empty());
    }

    #[test]
    fn unresolved_placeholder_is_reported() {
        let mut unresolved = Vec::new();
        let out = config::substitute_config("${config:missing.key}",&serde_json::Value::Null,&mut unresolved);
        assert_eq!(out,"${config:missing.key}");
        assert_eq!(unresolved,vec!["missing.key".to_string()]);
    }

    #[test]
    fn pgm_conf_with_suppress_limit() {
        let text = r#"{ "pgms": [ { "program": "pgms/*", "pgroup": "GROUP1" } ],
                       "diagnosticsSuppressLimit": 5 }"#;
        let mut unresolved = Vec::new();
        let parsed = config::parse_pgm_conf(text,&serde_json::Value::Null,&mut unresolved).expect("parse");
        assert_eq!(parsed.diagnostics_suppress_limit,Some(5));
        assert_eq!(parsed.pgms[0].pgroup,"GROUP1");
    }

    #[test]
    fn b4g_bridge_parses() {
        let text = r#"{ "elements": { "PGM1": { "processorGroup": "GROUP1" } },
                       "defaultProcessorGroup": "GROUP2", "fileExtension": "hlasm" }"#;
        let parsed = config::parse_b4g(text).expect("parse");
        assert_eq!(parsed.elements.get("PGM1").map(|e| e.processor_group.as_str()),Some("GROUP1"));
        assert_eq!(parsed.default_processor_group.as_deref(),Some("GROUP2"));
    }
}

mod param_data {
    use super::MacroParamData;

    #[test]
    fn text_form_round_trips() {
        let cases = [
            MacroParamData::Leaf("VALUE".to_string()),
            MacroParamData::List(vec![
                MacroParamData::Leaf("A".to_string()),
                MacroParamData::Leaf("B".to_string())
            ]),
            MacroParamData::List(vec![
                MacroParamData::Leaf("A".to_string()),
                MacroParamData::List(vec![
                    MacroParamData::Leaf("B".to_string()),
                    MacroParamData::Leaf("C".to_string())
                ]),
                MacroParamData::Leaf(String::new())
            ])
        ];
        for case in cases {
            assert_eq!(MacroParamData::parse(&case.to_text()),case);
        }
    }

    #[test]
    fn unbalanced_text_stays_a_leaf() {
        assert_eq!(MacroParamData::parse("(A,B"),MacroParamData::Leaf("(A,B".to_string()));
        assert_eq!(MacroParamData::parse("(A)(B)"),MacroParamData::Leaf("(A)(B)".to_string()));
    }

    #[test]
    fn subscripts_and_counts() {
        let data = MacroParamData::parse("(X,(Y,Z))");
        assert_eq!(data.count(),2);
        assert_eq!(data.index(&[2,1]).to_text(),"Y");
        assert_eq!(data.index(&[2]).count(),2);
        assert_eq!(data.index(&[9]).to_text(),"");
    }
}

mod identifiers {
    use super::{Id,IdPool};

    #[test]
    fn inline_and_interned_agree() {
        let mut pool = IdPool::new();
        // at, below, and above the inline buffer boundary
        for name in ["","SHORT","EXACTLY15CHARS0","EXACTLY16CHARS00","A_MUCH_LONGER_SYMBOL_NAME"] {
            let interned = pool.intern(name);
            match Id::inline(name) {
                Some(inline) => assert_eq!(inline,interned),
                None => assert!(name.len() > 15)
            }
            assert_eq!(pool.string(&interned),name.to_ascii_uppercase());
            // a second intern answers the same id
            assert_eq!(pool.intern(name),interned);
        }
    }

    #[test]
    fn case_folds_on_intern() {
        let mut pool = IdPool::new();
        assert_eq!(pool.intern("abc"),pool.intern("ABC"));
    }

    #[test]
    fn compressed_form_covers_dispatchable_names() {
        assert!(Id::inline("AINSERT").and_then(|id| id.compressed()).is_some());
        assert!(Id::inline("TOOLONGXX").and_then(|id| id.compressed()).is_none());
        assert_ne!(Id::inline("LR").and_then(|id| id.compressed()),
                   Id::inline("L").and_then(|id| id.compressed()));
    }
}

#[test]
fn suppression_collapses_to_one_entry() {
    // eleven bad statements against the default limit of ten
    let mut src = String::new();
    for _ in 0..11 {
        src += "         LR    1,\n";
    }
    src += "         END";
    let analyzer = analyze(&src,&[]);
    let diags = opencode_diags(&analyzer);
    assert_eq!(codes(&diags),vec![SUPPRESSED]);
}

#[test]
fn repeated_analysis_is_identical() {
    let src = "\
A        EQU   1
         LR    1,
B        DC    F'2'
         UNDEF
         END";
    let first = analyze(src,&[]);
    let second = analyze(src,&[]);
    let d1 = opencode_diags(&first);
    let d2 = opencode_diags(&second);
    assert_eq!(d1.len(),d2.len());
    for (a,b) in d1.iter().zip(d2.iter()) {
        assert_eq!(a.message,b.message);
        assert_eq!(a.range,b.range);
        assert_eq!(codes(&[a.clone()]),codes(&[b.clone()]));
    }
}
