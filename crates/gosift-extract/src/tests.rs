use crate::driver::{self, ExtractResult, MemoryLoader, ProjectExtractor};
use crate::{DriverError, ExtractError, Extractor};
use gosift_ast::Decl;
use gosift_contracts::{contract_to_string, ContractTable};
use gosift_symbols::{AllocTable, GlobalTable, Stack};
use gosift_types::DataType;

const PKG: &str = "demo";

fn extract(source: &str) -> ExtractResult {
    driver::extract_source(PKG, &[("main.go", source)]).expect("extraction failed")
}

fn extract_err(source: &str) -> DriverError {
    driver::extract_source(PKG, &[("main.go", source)]).expect_err("extraction should fail")
}

fn contracts(source: &str) -> Vec<String> {
    let result = extract(source);
    result
        .package(PKG)
        .expect("package result")
        .contracts
        .iter()
        .map(contract_to_string)
        .collect()
}

fn assert_has<F: Fn(&str) -> bool>(contracts: &[String], what: &str, pred: F) {
    assert!(
        contracts.iter().any(|c| pred(c)),
        "no contract matching {}; got:\n{}",
        what,
        contracts.join("\n")
    );
}

// ── Value specs ───────────────────────────────────────────────────

#[test]
fn var_decl_with_explicit_type() {
    let source = "package demo\nvar a, b int = 1, 2\n";
    let result = extract(source);
    let table = result.global.lookup(PKG).unwrap();
    assert_eq!(
        table.lookup_variable("a").unwrap().def,
        Some(DataType::builtin("int"))
    );
    assert_eq!(
        table.lookup_variable("b").unwrap().def,
        Some(DataType::builtin("int"))
    );

    let cs = contracts(source);
    let compat: Vec<&String> = cs
        .iter()
        .filter(|c| c.starts_with("IsCompatibleWith"))
        .collect();
    assert_eq!(compat.len(), 2, "contracts:\n{}", cs.join("\n"));
    assert!(compat[0].contains("X=constant untyped int"));
    assert!(compat[0].contains("Y=variable demo.a@main.go:"));
    assert!(compat[0].ends_with("E=int"));
    assert!(compat[1].contains("Y=variable demo.b@main.go:"));
}

#[test]
fn iota_constant_group_propagates_type() {
    let source = "package demo\nconst (\n\tA = iota\n\tB\n\tC\n)\n";
    let result = extract(source);
    let table = result.global.lookup(PKG).unwrap();
    for name in ["A", "B", "C"] {
        assert_eq!(
            table.lookup_variable(name).unwrap().def,
            Some(DataType::untyped("int")),
            "constant {}",
            name
        );
    }
    let cs = contracts(source);
    assert_eq!(cs.len(), 1, "contracts:\n{}", cs.join("\n"));
    assert!(cs[0].starts_with("PropagatesTo"));
    assert!(cs[0].contains("Y=variable demo.A@"));
}

#[test]
fn iota_with_explicit_type_continues() {
    let source = "package demo\ntype Color int\nconst (\n\tRed Color = iota\n\tGreen\n\tBlue\n)\n";
    let result = extract(source);
    let table = result.global.lookup(PKG).unwrap();
    for name in ["Red", "Green", "Blue"] {
        assert_eq!(
            table.lookup_variable(name).unwrap().def,
            Some(DataType::identifier("Color", "demo")),
            "constant {}",
            name
        );
    }
}

#[test]
fn value_spec_without_type_or_value_is_an_error() {
    let err = extract_err("package demo\nfunc f() {\n\tconst A\n\t_ = A\n}\n");
    assert!(
        matches!(
            err,
            DriverError::Extract(ExtractError::MissingConstType { index: 1 })
        ),
        "got {:?}",
        err
    );
}

#[test]
fn blank_names_are_never_stored() {
    let source = "package demo\nvar _, A = 1, 2\n";
    let result = extract(source);
    let table = result.global.lookup(PKG).unwrap();
    assert!(table.lookup("_").is_none());
    assert_eq!(
        table.lookup_variable("A").unwrap().def,
        Some(DataType::untyped("int"))
    );
}

#[test]
fn tuple_value_spec_from_call() {
    let source = "package demo\n\
                  func pair() (int, string) { return 1, \"a\" }\n\
                  var a, b = pair()\n";
    let result = extract(source);
    let table = result.global.lookup(PKG).unwrap();
    assert_eq!(
        table.lookup_variable("a").unwrap().def,
        Some(DataType::builtin("int"))
    );
    assert_eq!(
        table.lookup_variable("b").unwrap().def,
        Some(DataType::builtin("string"))
    );
    let cs = contracts(source);
    assert_has(&cs, "propagation from return position 0", |c| {
        c.starts_with("PropagatesTo: X=return(variable demo.pair@") && c.contains("Y=variable demo.a@")
    });
}

// ── Declarations and types ────────────────────────────────────────

#[test]
fn recursive_type_is_completed_in_place() {
    let source = "package demo\ntype L struct {\n\tnext *L\n}\n";
    let result = extract(source);
    let table = result.global.lookup(PKG).unwrap();
    let sym = table.lookup_data_type("L").unwrap();
    let Some(DataType::Struct { fields }) = &sym.def else {
        panic!("L not completed: {:?}", sym.def);
    };
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].name, "next");
    assert_eq!(
        fields[0].def,
        DataType::pointer(DataType::identifier("L", "demo"))
    );
    assert_eq!(table.data_types().count(), 1);
}

#[test]
fn local_type_spec_inside_function() {
    let source = "package demo\nfunc f() {\n\ttype pair struct {\n\t\ta, b int\n\t}\n\tvar p pair\n\t_ = p\n}\n";
    extract(source);
}

// ── Assignment ────────────────────────────────────────────────────

#[test]
fn define_vs_assign_contracts() {
    let source = "package demo\nfunc f() {\n\tx := 1\n\tx = 2\n\ty, x := 2, 3\n\t_ = y\n}\n";
    let cs = contracts(source);
    let defines: Vec<&String> = cs
        .iter()
        .filter(|c| c.starts_with("PropagatesTo") && c.contains("Y=variable x@"))
        .collect();
    assert_eq!(defines.len(), 1, "contracts:\n{}", cs.join("\n"));
    let assigns: Vec<&String> = cs
        .iter()
        .filter(|c| c.starts_with("IsCompatibleWith") && c.contains("Y=variable x@"))
        .collect();
    assert_eq!(assigns.len(), 2, "contracts:\n{}", cs.join("\n"));
    assert_has(&cs, "definition of y", |c| {
        c.starts_with("PropagatesTo") && c.contains("Y=variable y@")
    });
}

#[test]
fn assign_to_unknown_name_is_unresolved() {
    let err = extract_err("package demo\nfunc f() {\n\tmissing = 1\n}\n");
    assert!(
        matches!(err, DriverError::Stalled { .. }),
        "got {:?}",
        err
    );
}

#[test]
fn map_index_with_ok_slot() {
    let source = "package demo\nfunc f() {\n\tm := map[string]int{}\n\tv, ok := m[\"x\"]\n\t_ = v\n\t_ = ok\n}\n";
    let cs = contracts(source);
    assert_eq!(
        cs.iter().filter(|c| c.starts_with("IsIndexable")).count(),
        1,
        "contracts:\n{}",
        cs.join("\n")
    );
    assert_has(&cs, "map key use", |c| {
        c.starts_with("IsCompatibleWith: X=constant untyped string, Y=mapkey(variable m@")
    });
    assert_has(&cs, "value slot propagation", |c| {
        c.starts_with("PropagatesTo: X=virtual #") && c.contains("Y=variable v@") && c.ends_with("E=int")
    });
    assert_has(&cs, "ok slot propagation", |c| {
        c.starts_with("PropagatesTo: X=constant bool, Y=variable ok@") && c.ends_with("E=bool")
    });
}

#[test]
fn type_assertion_with_ok_slot() {
    let source = "package demo\ntype Foo struct{}\nfunc f(iface interface{}) {\n\tx, ok := iface.(Foo)\n\t_ = x\n\t_ = ok\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "assertion compatibility", |c| {
        c.starts_with("IsCompatibleWith: X=variable iface@")
            && c.contains("Y=constant demo.Foo")
            && c.ends_with("E=demo.Foo")
    });
    assert_has(&cs, "x binding", |c| {
        c.starts_with("PropagatesTo: X=constant demo.Foo, Y=variable x@")
    });
    assert_has(&cs, "ok binding", |c| {
        c.starts_with("PropagatesTo: X=constant bool, Y=variable ok@")
    });
}

#[test]
fn call_result_arity_is_checked() {
    let source = "package demo\n\
                  func pair() (int, string) { return 1, \"a\" }\n\
                  func f() {\n\ta, b, c := pair()\n\t_, _, _ = a, b, c\n}\n";
    let err = driver::extract_source(PKG, &[("main.go", source)]).expect_err("should fail");
    assert!(
        matches!(
            err,
            DriverError::Extract(ExtractError::ArityMismatch { lhs: 3, rhs: 2 })
        ),
        "got {:?}",
        err
    );
}

#[test]
fn foreign_call_gets_synthesised_error_slot() {
    let source = "package demo\nimport \"C\"\nfunc f() {\n\tn, err := C.random()\n\t_ = n\n\t_ = err\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "cgo error slot", |c| {
        c.starts_with("PropagatesTo: X=cgo, Y=variable err@") && c.ends_with("E=error")
    });
}

#[test]
fn assignment_through_selector_and_deref() {
    let source = "package demo\ntype Box struct {\n\tn int\n}\nfunc f(b *Box, p *int) {\n\tb.n = 1\n\t*p = 2\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "field access", |c| {
        c.starts_with("HasField: X=variable b@") && c.contains("Field=n")
    });
    assert_has(&cs, "field assignment", |c| {
        c.starts_with("IsCompatibleWith: X=constant untyped int, Y=field(variable b@")
    });
    assert_has(&cs, "deref", |c| c.starts_with("IsDereferenceable: X=variable p@"));
    assert_has(&cs, "deref assignment", |c| {
        c.starts_with("IsCompatibleWith: X=constant untyped int, Y=virtual #")
    });
}

// ── Control flow ──────────────────────────────────────────────────

#[test]
fn switch_cases_compare_against_tag() {
    let source = "package demo\nfunc f(x int) {\n\tswitch x {\n\tcase 1, 2:\n\tdefault:\n\t}\n}\n";
    let cs = contracts(source);
    let compat: Vec<&String> = cs
        .iter()
        .filter(|c| c.starts_with("IsCompatibleWith") && c.contains("Y=variable x@"))
        .collect();
    assert_eq!(compat.len(), 2, "contracts:\n{}", cs.join("\n"));
    assert!(compat.iter().all(|c| c.contains("Weak=false")));
}

#[test]
fn tagless_switch_compares_against_bool() {
    let source = "package demo\nfunc f(x int) {\n\tswitch {\n\tcase x == 1:\n\t}\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "comparison against true", |c| {
        c.starts_with("IsCompatibleWith") && c.contains("Y=constant bool")
    });
}

#[test]
fn type_switch_emits_weak_compatibilities() {
    let source = "package demo\nfunc f(v interface{}) {\n\tswitch t := v.(type) {\n\tcase int:\n\t\t_ = t\n\tcase string, bool:\n\t\t_ = t\n\tdefault:\n\t\t_ = t\n\t}\n}\n";
    let cs = contracts(source);
    let weak: Vec<&String> = cs
        .iter()
        .filter(|c| c.starts_with("IsCompatibleWith") && c.contains("Weak=true") && c.contains("Y=variable v@"))
        .collect();
    assert_eq!(weak.len(), 3, "contracts:\n{}", cs.join("\n"));
    // single-type clause binds the concrete type, the others the empty
    // interface
    assert_has(&cs, "concrete binding", |c| {
        c.starts_with("PropagatesTo: X=constant int, Y=variable t@")
    });
    assert_eq!(
        cs.iter()
            .filter(|c| c.starts_with("PropagatesTo: X=constant interface{}, Y=variable t@"))
            .count(),
        2,
        "contracts:\n{}",
        cs.join("\n")
    );
}

#[test]
fn annotated_type_switch_guard_is_rejected() {
    // built by hand: the parser only classifies `.(type)` guards, the
    // walker still validates the shape
    let source = "package demo\nfunc f(v interface{}) {\n\tswitch t := v.(type) {\n\tcase int:\n\t\t_ = t\n\t}\n}\n";
    let (file, errors) = gosift_syntax::parse(source);
    assert!(errors.is_empty());
    // mutate the guard assertion to carry an annotation
    let mut file = file;
    let int_ty = file.type_exprs.alloc(gosift_ast::TypeExpr {
        kind: gosift_ast::TypeExprKind::Ident("int".into()),
        span: gosift_ast::Span::new(0, 0),
    });
    let mut patched = None;
    for (id, expr) in file.exprs.iter() {
        if matches!(
            &expr.kind,
            gosift_ast::ExprKind::TypeAssert { type_expr: None, .. }
        ) {
            patched = Some(id);
        }
    }
    let patched = patched.expect("guard assertion");
    if let gosift_ast::ExprKind::TypeAssert { type_expr, .. } = &mut file.exprs[patched].kind {
        *type_expr = Some(int_ty);
    }

    let global = GlobalTable::new();
    let mut stack = Stack::new();
    stack.push();
    let mut contracts = ContractTable::new();
    let mut allocated = AllocTable::new();
    let mut extractor = Extractor::new(
        &file,
        "main.go",
        "demo",
        &mut stack,
        &mut contracts,
        &mut allocated,
        &global,
    );
    let Some(Decl::Func(decl)) = file.decls.first() else {
        panic!("expected function");
    };
    let err = extractor.parse_func_body(decl).expect_err("must reject");
    assert!(
        matches!(err, ExtractError::MalformedConstruct(_)),
        "got {:?}",
        err
    );
    assert_eq!(stack.size(), 1, "scopes must be released on failure");
}

#[test]
fn select_receive_binds_in_clause_scope() {
    let source = "package demo\nfunc f(ch chan int) {\n\tselect {\n\tcase v := <-ch:\n\t\t_ = v\n\t}\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "receive with the element hint", |c| {
        c.starts_with("IsReceiveableFrom: X=variable ch@")
            && c.contains("Y=virtual #")
            && c.ends_with("E=int")
    });
    assert_has(&cs, "binding from the received value", |c| {
        c.starts_with("PropagatesTo: X=virtual #") && c.contains("Y=variable v@")
    });
}

#[test]
fn select_receive_from_send_only_channel_is_rejected() {
    let err = extract_err(
        "package demo\nfunc f(ch chan<- int) {\n\tselect {\n\tcase v := <-ch:\n\t\t_ = v\n\t}\n}\n",
    );
    assert!(
        matches!(
            err,
            DriverError::Extract(ExtractError::MalformedConstruct(_))
        ),
        "got {:?}",
        err
    );
}

#[test]
fn select_receive_with_ok_and_send_clause() {
    let source = "package demo\nfunc f(ch chan int, out chan<- string) {\n\tselect {\n\tcase v, ok := <-ch:\n\t\t_ = v\n\t\t_ = ok\n\tcase out <- \"done\":\n\tdefault:\n\t}\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "ok binding", |c| {
        c.starts_with("PropagatesTo: X=constant bool, Y=variable ok@")
    });
    assert_has(&cs, "send clause", |c| {
        c.starts_with("IsSendableTo: X=constant untyped string, Y=variable out@")
    });
}

#[test]
fn select_receive_requires_arrow() {
    let err = extract_err(
        "package demo\nfunc f(ch chan int) {\n\tselect {\n\tcase v := ch:\n\t\t_ = v\n\t}\n}\n",
    );
    assert!(
        matches!(
            err,
            DriverError::Extract(ExtractError::MalformedConstruct(_))
        ),
        "got {:?}",
        err
    );
}

#[test]
fn send_incdec_go_defer() {
    let source = "package demo\nfunc hello() {}\nfunc f(ch chan int, v int) {\n\tch <- v\n\tv++\n\tgo hello()\n\tdefer hello()\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "send", |c| {
        c.starts_with("IsSendableTo: X=variable v@") && c.contains("Y=variable ch@")
    });
    assert_has(&cs, "incdec", |c| c.starts_with("IsIncDecable: X=variable v@"));
    assert_eq!(
        cs.iter()
            .filter(|c| c.starts_with("IsInvocable: F=variable demo.hello@"))
            .count(),
        2
    );
}

#[test]
fn for_loop_contracts() {
    let source = "package demo\nfunc f() {\n\tfor i := 0; i < 10; i++ {\n\t}\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "loop variable definition", |c| {
        c.starts_with("PropagatesTo") && c.contains("Y=variable i@")
    });
    assert_has(&cs, "condition", |c| c.starts_with("BinaryOp") && c.contains("op=<"));
    assert_has(&cs, "post statement", |c| c.starts_with("IsIncDecable: X=variable i@"));
}

// ── Range ─────────────────────────────────────────────────────────

#[test]
fn range_over_slice_of_strings() {
    let source = "package demo\nfunc f(s []string) {\n\tfor k, v := range s {\n\t\t_ = k\n\t\t_ = v\n\t}\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "rangeable", |c| c.starts_with("IsRangeable: X=variable s@"));
    assert_has(&cs, "key binding", |c| {
        c.starts_with("PropagatesTo: X=rangekey(variable s@")
            && c.contains("Y=variable k@")
            && c.ends_with("E=int")
    });
    assert_has(&cs, "value binding", |c| {
        c.starts_with("PropagatesTo: X=rangevalue(variable s@")
            && c.contains("Y=variable v@")
            && c.ends_with("E=string")
    });
}

#[test]
fn range_over_named_string_type_yields_runes() {
    let source = "package demo\ntype Name string\nfunc f(s Name) {\n\tfor i, r := range s {\n\t\t_ = i\n\t\t_ = r\n\t}\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "rune value", |c| {
        c.starts_with("PropagatesTo: X=rangevalue(") && c.contains("Y=variable r@") && c.ends_with("E=rune")
    });
    assert_has(&cs, "int key", |c| {
        c.starts_with("PropagatesTo: X=rangekey(") && c.contains("Y=variable i@") && c.ends_with("E=int")
    });
}

#[test]
fn range_over_map_and_channel() {
    let source = "package demo\nfunc f(m map[string]bool, ch chan int) {\n\tfor k, v := range m {\n\t\t_ = k\n\t\t_ = v\n\t}\n\tfor e := range ch {\n\t\t_ = e\n\t}\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "map key", |c| {
        c.starts_with("PropagatesTo: X=rangekey(variable m@") && c.ends_with("E=string")
    });
    assert_has(&cs, "map value", |c| {
        c.starts_with("PropagatesTo: X=rangevalue(variable m@") && c.ends_with("E=bool")
    });
    assert_has(&cs, "channel element", |c| {
        c.starts_with("PropagatesTo: X=rangekey(variable ch@") && c.ends_with("E=int")
    });
}

#[test]
fn range_assign_arm_uses_existing_bindings() {
    let source = "package demo\nfunc f(s []int) {\n\tvar k, v int\n\tfor (k), v = range s {\n\t}\n\t_, _ = k, v\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "key compatibility", |c| {
        c.starts_with("IsCompatibleWith: X=rangekey(variable s@") && c.contains("Y=variable k@")
    });
    assert_has(&cs, "value compatibility", |c| {
        c.starts_with("IsCompatibleWith: X=rangevalue(variable s@") && c.contains("Y=variable v@")
    });
}

#[test]
fn range_over_non_rangeable_is_an_error() {
    let err = extract_err("package demo\nfunc f(n int) {\n\tfor i := range n {\n\t\t_ = i\n\t}\n}\n");
    assert!(
        matches!(err, DriverError::Extract(ExtractError::ShapeMismatch(_))),
        "got {:?}",
        err
    );
}

// ── Functions ─────────────────────────────────────────────────────

#[test]
fn method_receiver_is_bound_and_recorded() {
    let source = "package demo\ntype Server struct {\n\tn int\n}\nfunc (s *Server) Count() int {\n\treturn s.n\n}\n";
    let result = extract(source);
    let table = result.global.lookup(PKG).unwrap();
    let sym = table.lookup_function("Count").unwrap();
    let Some(DataType::Method { receiver, .. }) = &sym.def else {
        panic!("Count is not a method: {:?}", sym.def);
    };
    assert_eq!(
        **receiver,
        DataType::pointer(DataType::identifier("Server", "demo"))
    );
    let allocated = &result.package(PKG).unwrap().allocated;
    assert!(
        allocated
            .symbols()
            .iter()
            .any(|s| s.name == "Server" && s.package == "demo"),
        "allocations: {:?}",
        allocated.symbols()
    );

    let cs = contracts(source);
    assert_has(&cs, "receiver binding", |c| {
        c.starts_with("PropagatesTo: X=constant *demo.Server, Y=variable s@")
    });
}

#[test]
fn return_positions_are_typed() {
    let source = "package demo\nfunc f() int {\n\tg := func(x int) int {\n\t\treturn x\n\t}\n\treturn g(1)\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "inner return", |c| {
        c.starts_with("IsCompatibleWith: X=variable x@") && c.contains("Y=return(virtual #")
    });
    assert_has(&cs, "outer return", |c| {
        c.contains("Y=return(variable demo.f@") && c.ends_with("E=int")
    });
    assert_has(&cs, "invocation", |c| {
        c.starts_with("IsInvocable: F=variable g@") && c.ends_with("argCount=1")
    });
}

#[test]
fn too_many_return_values_is_an_error() {
    let err = extract_err("package demo\nfunc f() int {\n\treturn 1, 2\n}\n");
    assert!(
        matches!(
            err,
            DriverError::Extract(ExtractError::ArityMismatch { lhs: 1, rhs: 2 })
        ),
        "got {:?}",
        err
    );
}

#[test]
fn call_arguments_constrain_parameter_slots() {
    let source = "package demo\nfunc add(a, b int) int {\n\treturn a + b\n}\nfunc f() {\n\t_ = add(1, 2)\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "first argument", |c| {
        c.starts_with("IsCompatibleWith: X=constant untyped int, Y=argument(variable demo.add@")
            && c.contains(", 0)")
    });
    assert_has(&cs, "invocation arity", |c| {
        c.starts_with("IsInvocable: F=variable demo.add@") && c.ends_with("argCount=2")
    });
}

#[test]
fn conversion_is_a_weak_compatibility() {
    let source = "package demo\nfunc f(n int) {\n\ts := float64(n)\n\t_ = s\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "conversion", |c| {
        c.starts_with("IsCompatibleWith: X=variable n@")
            && c.contains("Y=constant float64")
            && c.contains("Weak=true")
    });
}

#[test]
fn builtin_make_len_append() {
    let source = "package demo\nfunc f() {\n\txs := make([]int, 0, 4)\n\txs = append(xs, 1)\n\tn := len(xs)\n\t_ = n\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "make definition", |c| {
        c.starts_with("PropagatesTo: X=constant []int, Y=variable xs@")
    });
    assert_has(&cs, "append element", |c| {
        c.starts_with("IsCompatibleWith: X=constant untyped int, Y=constant int")
    });
    assert_has(&cs, "len result", |c| {
        c.starts_with("PropagatesTo: X=constant int, Y=virtual #")
    });
}

#[test]
fn reference_and_receive_operators() {
    let source = "package demo\nfunc f(ch chan int, n int) {\n\tp := &n\n\t_ = p\n\tv := <-ch\n\t_ = v\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "referenceable", |c| c.starts_with("IsReferenceable: X=variable n@"));
    assert_has(&cs, "reference", |c| c.starts_with("ReferenceOf: X=variable n@"));
    assert_has(&cs, "receive", |c| {
        c.starts_with("IsReceiveableFrom: X=variable ch@") && c.ends_with("E=int")
    });
}

// ── Scope discipline ──────────────────────────────────────────────

#[test]
fn stack_is_restored_after_body_success_and_failure() {
    let source =
        "package demo\nfunc ok(x int) int {\n\ty := x\n\treturn y\n}\nfunc bad() {\n\tz = 1\n}\n";
    let (file, errors) = gosift_syntax::parse(source);
    assert!(errors.is_empty(), "{:?}", errors);

    let global = GlobalTable::new();
    let mut stack = Stack::new();
    stack.push();
    let mut contracts = ContractTable::new();
    let mut allocated = AllocTable::new();

    let funcs: Vec<_> = file
        .decls
        .iter()
        .filter_map(|d| match d {
            Decl::Func(f) => Some(f),
            _ => None,
        })
        .collect();

    let mut extractor = Extractor::new(
        &file,
        "main.go",
        "demo",
        &mut stack,
        &mut contracts,
        &mut allocated,
        &global,
    );
    extractor.parse_func_body(funcs[0]).expect("ok body");
    let err = extractor.parse_func_body(funcs[1]).expect_err("bad body");
    assert!(err.is_unresolved());

    assert_eq!(stack.size(), 1);
    assert!(stack.table(0).unwrap().lookup_variable("y").is_none());
    assert!(stack.table(0).unwrap().lookup_variable("x").is_none());
}

// ── Driver ────────────────────────────────────────────────────────

#[test]
fn forward_reference_within_a_package_is_postponed() {
    let source = "package demo\nfunc f() int {\n\treturn g()\n}\nfunc g() int {\n\treturn 1\n}\n";
    let cs = contracts(source);
    assert_has(&cs, "call of the later function", |c| {
        c.starts_with("IsInvocable: F=variable demo.g@")
    });
    // signatures are staged ahead of bodies, so the call resolves on
    // the first walk and no duplicates accumulate
    let invocations = cs
        .iter()
        .filter(|c| c.starts_with("IsInvocable: F=variable demo.g@"))
        .count();
    assert_eq!(invocations, 1, "contracts:\n{}", cs.join("\n"));
}

#[test]
fn forward_reference_across_files() {
    let result = driver::extract_source(
        PKG,
        &[
            (
                "a.go",
                "package demo\nfunc f() Conn {\n\tvar c Conn\n\treturn c\n}\n",
            ),
            ("b.go", "package demo\ntype Conn struct{}\n"),
        ],
    )
    .expect("extraction failed");
    let table = result.global.lookup(PKG).unwrap();
    assert!(table.lookup_function("f").is_some());
    assert!(table.lookup_data_type("Conn").is_some());
}

#[test]
fn cross_package_symbols_resolve_through_the_global_table() {
    let mut loader = MemoryLoader::new();
    loader.add_package(
        "example.com/util",
        &[(
            "util.go",
            "package util\ntype Conn struct{}\nfunc Dial() Conn {\n\tvar c Conn\n\treturn c\n}\n",
        )],
    );
    loader.add_package(
        PKG,
        &[(
            "main.go",
            "package demo\nimport \"example.com/util\"\nfunc f() {\n\tc := util.Dial()\n\t_ = c\n}\nvar conn util.Conn\n",
        )],
    );
    let result = ProjectExtractor::new(loader).extract(PKG).expect("extract");

    // dependency order: util first
    assert_eq!(result.packages[0].path, "example.com/util");
    assert_eq!(result.packages[1].path, PKG);

    let table = result.global.lookup(PKG).unwrap();
    assert_eq!(
        table.lookup_variable("conn").unwrap().def,
        Some(DataType::identifier("Conn", "example.com/util"))
    );
    // the foreign type use is recorded for the driver
    let allocated = &result.package(PKG).unwrap().allocated;
    assert!(
        allocated
            .symbols()
            .iter()
            .any(|s| s.package == "example.com/util" && s.name == "Conn"),
        "allocations: {:?}",
        allocated.symbols()
    );
}

#[test]
fn parameter_name_does_not_shadow_qualifier_in_signature() {
    let mut loader = MemoryLoader::new();
    loader.add_package(
        "example.com/util",
        &[("util.go", "package util\ntype Conn struct{}\n")],
    );
    loader.add_package(
        PKG,
        &[(
            "main.go",
            "package demo\nimport \"example.com/util\"\nfunc f(util string, c util.Conn) {\n\t_ = util\n\t_ = c\n}\n",
        )],
    );
    ProjectExtractor::new(loader).extract(PKG).expect("extract");
}

#[test]
fn import_cycles_are_rejected() {
    let mut loader = MemoryLoader::new();
    loader.add_package(
        "example.com/a",
        &[("a.go", "package a\nimport \"example.com/b\"\nvar X b.T\n")],
    );
    loader.add_package(
        "example.com/b",
        &[("b.go", "package b\nimport \"example.com/a\"\nvar Y a.T\n")],
    );
    let err = ProjectExtractor::new(loader)
        .extract("example.com/a")
        .expect_err("cycle");
    assert!(matches!(err, DriverError::ImportCycle(_)), "got {:?}", err);
}

#[test]
fn unresolvable_symbol_stalls_the_package() {
    let err = extract_err("package demo\nvar x = missing()\n");
    let DriverError::Stalled { package, .. } = err else {
        panic!("expected stall");
    };
    assert_eq!(package, PKG);
}

// ── Determinism ───────────────────────────────────────────────────

#[test]
fn extraction_is_deterministic() {
    let source = "package demo\ntype Pair struct {\n\ta, b int\n}\nfunc f(ps []Pair) int {\n\ttotal := 0\n\tfor _, p := range ps {\n\t\ttotal += p.a\n\t}\n\treturn total\n}\n";
    let first = extract(source);
    let second = extract(source);
    let render = |r: &ExtractResult| {
        r.package(PKG)
            .unwrap()
            .contracts
            .iter()
            .map(contract_to_string)
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_eq!(render(&first), render(&second));
    assert_eq!(
        serde_json::to_string(first.global.lookup(PKG).unwrap()).unwrap(),
        serde_json::to_string(second.global.lookup(PKG).unwrap()).unwrap()
    );
}
