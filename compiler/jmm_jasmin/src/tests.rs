use jmm_ir::{
    BinaryOp, Call, CallTarget, CompileError, Cond, Instr, InvokeKind, IrClass, IrField, IrMethod,
    IrParam, IrType, Label, Modifiers, Operand, Rhs, VarInfo,
};
use pretty_assertions::assert_eq;
use rustc_hash::FxHashMap;
use smallvec::smallvec;

use super::generate;

// ── Builders ────────────────────────────────────────────────────────

fn class(methods: Vec<IrMethod>) -> IrClass {
    IrClass {
        name: "Main".into(),
        superclass: None,
        imports: vec!["io".into()],
        fields: Vec::new(),
        methods,
    }
}

/// Instance method with `this` in slot 0 followed by `vars` in order.
fn method(
    name: &str,
    ret: IrType,
    params: &[(&str, IrType)],
    vars: &[(&str, IrType)],
    instrs: Vec<Instr>,
) -> IrMethod {
    let mut var_table = FxHashMap::default();
    var_table.insert(
        "this".to_owned(),
        VarInfo {
            slot: 0,
            ty: IrType::Class("Main".into()),
        },
    );
    for (slot, (name, ty)) in params.iter().chain(vars).enumerate() {
        var_table.insert(
            (*name).to_owned(),
            VarInfo {
                slot: u16::try_from(slot + 1).unwrap(),
                ty: ty.clone(),
            },
        );
    }
    IrMethod {
        name: name.into(),
        modifiers: Modifiers::PUBLIC,
        params: params
            .iter()
            .map(|(name, ty)| IrParam {
                name: (*name).to_owned(),
                ty: ty.clone(),
            })
            .collect(),
        return_type: ret,
        instrs,
        var_table,
        is_constructor: false,
    }
}

fn int(name: &str) -> Operand {
    Operand::var(name, IrType::Int32)
}

fn assign(dest: &str, ty: IrType, value: Rhs) -> Instr {
    Instr::Assign {
        dest: dest.into(),
        ty,
        value,
    }
}

fn ret_int(name: &str) -> Instr {
    Instr::Return {
        ty: IrType::Int32,
        value: Some(int(name)),
    }
}

fn static_call(method: &str, args: Vec<Operand>, ret: IrType) -> Call {
    Call {
        kind: InvokeKind::Static,
        target: CallTarget::Class("io".into()),
        method: method.into(),
        args: args.into_iter().collect(),
        ret,
    }
}

/// Body lines of the single method named `name`, without directives.
fn body_of(text: &str, name: &str) -> Vec<String> {
    let header = format!(" {name}(");
    let mut lines = text
        .lines()
        .skip_while(|l| !(l.starts_with(".method") && l.contains(&header)));
    lines.next();
    lines
        .take_while(|l| *l != ".end method")
        .filter(|l| !l.trim_start().starts_with(".limit"))
        .map(|l| l.trim().to_owned())
        .collect()
}

fn limit(text: &str, name: &str, which: &str) -> u16 {
    let header = format!(" {name}(");
    let prefix = format!(".limit {which} ");
    text.lines()
        .skip_while(|l| !(l.starts_with(".method") && l.contains(&header)))
        .find_map(|l| l.trim().strip_prefix(prefix.as_str()).map(str::to_owned))
        .unwrap()
        .parse()
        .unwrap()
}

fn add_method() -> IrMethod {
    method(
        "add",
        IrType::Int32,
        &[("a", IrType::Int32), ("b", IrType::Int32)],
        &[("tmp0", IrType::Int32)],
        vec![
            assign(
                "tmp0",
                IrType::Int32,
                Rhs::Binary {
                    op: BinaryOp::Add,
                    lhs: int("a"),
                    rhs: int("b"),
                },
            ),
            ret_int("tmp0"),
        ],
    )
}

// ── Class layout ────────────────────────────────────────────────────

#[test]
fn add_class_text() {
    let text = generate(&class(vec![add_method()])).unwrap();
    assert_eq!(
        text,
        "\
.class public Main
.super java/lang/Object

.method public add(II)I
    .limit stack 2
    .limit locals 4
    iload_1
    iload_2
    iadd
    istore_3
    iload_3
    ireturn
.end method

.method public <init>()V
    .limit stack 1
    .limit locals 1
    aload_0
    invokespecial java/lang/Object/<init>()V
    return
.end method
"
    );
}

#[test]
fn fields_and_superclass_header() {
    let mut c = class(Vec::new());
    c.superclass = Some("Base".into());
    c.imports.push("pkg.Base".into());
    c.fields.push(IrField {
        name: "count".into(),
        ty: IrType::Int32,
        modifiers: Modifiers::PUBLIC,
    });
    c.fields.push(IrField {
        name: "data".into(),
        ty: IrType::int_array(),
        modifiers: Modifiers::PUBLIC,
    });
    let text = generate(&c).unwrap();
    assert!(text.starts_with(
        ".class public Main\n.super pkg/Base\n\n.field public count I\n.field public data [I\n"
    ));
    assert_eq!(
        body_of(&text, "<init>"),
        ["aload_0", "invokespecial pkg/Base/<init>()V", "return"]
    );
}

#[test]
fn declared_constructor_is_not_duplicated() {
    let init = Call::init(Operand::This {
        class: "Main".into(),
    });
    let mut ctor = method("<init>", IrType::Void, &[], &[], vec![Instr::Call(init)]);
    ctor.is_constructor = true;
    let text = generate(&class(vec![ctor])).unwrap();
    assert_eq!(text.matches(".method public <init>()V").count(), 1);
}

#[test]
fn static_main_gets_trailing_return() {
    let mut main = method("main", IrType::Void, &[], &[], Vec::new());
    main.modifiers = Modifiers::PUBLIC | Modifiers::STATIC;
    main.params.push(IrParam {
        name: "args".into(),
        ty: IrType::Array(Box::new(IrType::Class("String".into()))),
    });
    main.var_table.clear();
    main.var_table.insert(
        "args".into(),
        VarInfo {
            slot: 0,
            ty: IrType::Array(Box::new(IrType::Class("String".into()))),
        },
    );
    let text = generate(&class(vec![main])).unwrap();
    assert!(text.contains(".method public static main([Ljava/lang/String;)V\n"));
    assert_eq!(body_of(&text, "main"), ["return"]);
    assert_eq!(limit(&text, "main", "locals"), 1);
    assert_eq!(limit(&text, "main", "stack"), 0);
}

// ── Constants and locals ────────────────────────────────────────────

#[test]
fn integer_constants_pick_shortest_form() {
    let values = [-1, 0, 5, 6, -128, 127, 128, -129, 32767, -32768, 32768, -40000];
    let instrs = values
        .iter()
        .map(|v| assign("x", IrType::Int32, Rhs::Operand(Operand::Int(*v))))
        .collect();
    let m = method("f", IrType::Void, &[], &[("x", IrType::Int32)], instrs);
    let text = generate(&class(vec![m])).unwrap();
    let pushes: Vec<String> = body_of(&text, "f")
        .into_iter()
        .filter(|l| l != "istore_1" && l != "return")
        .collect();
    assert_eq!(
        pushes,
        [
            "iconst_m1",
            "iconst_0",
            "iconst_5",
            "bipush 6",
            "bipush -128",
            "bipush 127",
            "sipush 128",
            "sipush -129",
            "sipush 32767",
            "sipush -32768",
            "ldc 32768",
            "ldc -40000",
        ]
    );
}

#[test]
fn high_slots_use_long_form_and_references_use_a_prefix() {
    let m = method(
        "f",
        IrType::Void,
        &[],
        &[
            ("a", IrType::Int32),
            ("b", IrType::Int32),
            ("c", IrType::Int32),
            ("arr", IrType::int_array()),
            ("flag", IrType::Bool),
        ],
        vec![
            assign("arr", IrType::int_array(), Rhs::Operand(Operand::var("arr", IrType::int_array()))),
            assign("flag", IrType::Bool, Rhs::Operand(Operand::Bool(true))),
        ],
    );
    let text = generate(&class(vec![m])).unwrap();
    assert_eq!(
        body_of(&text, "f"),
        ["aload 4", "astore 4", "iconst_1", "istore 5", "return"]
    );
    assert_eq!(limit(&text, "f", "locals"), 6);
}

#[test]
fn unknown_local_is_reported() {
    let m = method("f", IrType::Int32, &[], &[], vec![ret_int("ghost")]);
    assert!(matches!(
        generate(&class(vec![m])),
        Err(CompileError::UnknownVariable { name, .. }) if name == "ghost"
    ));
}

// ── Operators ───────────────────────────────────────────────────────

#[test]
fn not_is_xor_with_one() {
    let m = method(
        "f",
        IrType::Bool,
        &[("p", IrType::Bool)],
        &[("tmp0", IrType::Bool)],
        vec![
            assign("tmp0", IrType::Bool, Rhs::Not(Operand::var("p", IrType::Bool))),
            Instr::Return {
                ty: IrType::Bool,
                value: Some(Operand::var("tmp0", IrType::Bool)),
            },
        ],
    );
    let text = generate(&class(vec![m])).unwrap();
    assert_eq!(
        body_of(&text, "f"),
        ["iload_1", "iconst_1", "ixor", "istore_2", "iload_2", "ireturn"]
    );
}

#[test]
fn relational_value_outside_branch_is_unsupported() {
    let m = method(
        "f",
        IrType::Bool,
        &[],
        &[("tmp0", IrType::Bool)],
        vec![assign(
            "tmp0",
            IrType::Bool,
            Rhs::Binary {
                op: BinaryOp::Lt,
                lhs: Operand::Int(1),
                rhs: Operand::Int(2),
            },
        )],
    );
    assert!(matches!(
        generate(&class(vec![m])),
        Err(CompileError::UnsupportedConstruct { .. })
    ));
}

#[test]
fn branches_and_labels() {
    let m = method(
        "f",
        IrType::Void,
        &[("i", IrType::Int32), ("ok", IrType::Bool)],
        &[],
        vec![
            Instr::Label(Label("whileCond0".into())),
            Instr::Branch {
                cond: Cond::Compare {
                    op: BinaryOp::Lt,
                    lhs: int("i"),
                    rhs: Operand::Int(10),
                },
                target: Label("whileLoop0".into()),
            },
            Instr::Goto(Label("whileEnd0".into())),
            Instr::Label(Label("whileLoop0".into())),
            Instr::Branch {
                cond: Cond::Bool(Operand::var("ok", IrType::Bool)),
                target: Label("whileCond0".into()),
            },
            Instr::Label(Label("whileEnd0".into())),
        ],
    );
    let text = generate(&class(vec![m])).unwrap();
    assert_eq!(
        body_of(&text, "f"),
        [
            "whileCond0:",
            "iload_1",
            "bipush 10",
            "if_icmplt whileLoop0",
            "goto whileEnd0",
            "whileLoop0:",
            "iload_2",
            "ifne whileCond0",
            "whileEnd0:",
            "return",
        ]
    );
    assert_eq!(limit(&text, "f", "stack"), 2);
}

#[test]
fn comparison_mnemonics() {
    let cases = [
        (BinaryOp::Lt, "if_icmplt"),
        (BinaryOp::LtEq, "if_icmple"),
        (BinaryOp::Gt, "if_icmpgt"),
        (BinaryOp::GtEq, "if_icmpge"),
        (BinaryOp::Eq, "if_icmpeq"),
        (BinaryOp::NotEq, "if_icmpne"),
    ];
    for (op, expected) in cases {
        let m = method(
            "f",
            IrType::Void,
            &[],
            &[],
            vec![
                Instr::Branch {
                    cond: Cond::Compare {
                        op,
                        lhs: Operand::Int(0),
                        rhs: Operand::Int(1),
                    },
                    target: Label("L".into()),
                },
                Instr::Label(Label("L".into())),
            ],
        );
        let text = generate(&class(vec![m])).unwrap();
        assert_eq!(body_of(&text, "f")[2], format!("{expected} L"));
    }
}

#[test]
fn reference_equality_uses_acmp() {
    let m = method(
        "f",
        IrType::Void,
        &[("a", IrType::int_array()), ("b", IrType::int_array())],
        &[],
        vec![
            Instr::Branch {
                cond: Cond::Compare {
                    op: BinaryOp::Eq,
                    lhs: Operand::var("a", IrType::int_array()),
                    rhs: Operand::var("b", IrType::int_array()),
                },
                target: Label("L".into()),
            },
            Instr::Label(Label("L".into())),
        ],
    );
    let text = generate(&class(vec![m])).unwrap();
    assert_eq!(body_of(&text, "f")[2], "if_acmpeq L");
}

#[test]
fn unreferenced_label_after_returning_arms_is_dropped() {
    let ret = |v| Instr::Return {
        ty: IrType::Int32,
        value: Some(Operand::Int(v)),
    };
    let m = method(
        "pick",
        IrType::Int32,
        &[("b", IrType::Bool)],
        &[],
        vec![
            Instr::Branch {
                cond: Cond::Bool(Operand::var("b", IrType::Bool)),
                target: Label("if0".into()),
            },
            ret(2),
            Instr::Label(Label("if0".into())),
            ret(1),
            Instr::Label(Label("endif0".into())),
        ],
    );
    let text = generate(&class(vec![m])).unwrap();
    assert_eq!(
        body_of(&text, "pick"),
        ["iload_1", "ifne if0", "iconst_2", "ireturn", "if0:", "iconst_1", "ireturn"]
    );
}

#[test]
fn falling_off_a_non_void_method_is_rejected() {
    let m = method(
        "f",
        IrType::Int32,
        &[("b", IrType::Bool)],
        &[],
        vec![
            Instr::Branch {
                cond: Cond::Bool(Operand::var("b", IrType::Bool)),
                target: Label("L".into()),
            },
            Instr::Return {
                ty: IrType::Int32,
                value: Some(Operand::Int(0)),
            },
            Instr::Label(Label("L".into())),
        ],
    );
    let err = generate(&class(vec![m])).unwrap_err();
    assert!(
        matches!(&err, CompileError::UnsupportedConstruct { construct, .. } if construct.contains("`f`")),
        "{err:?}"
    );
}

#[test]
fn jump_to_undefined_label_is_rejected() {
    let m = method(
        "f",
        IrType::Void,
        &[],
        &[],
        vec![Instr::Goto(Label("nowhere".into()))],
    );
    let err = generate(&class(vec![m])).unwrap_err();
    assert!(
        matches!(&err, CompileError::UnsupportedConstruct { construct, .. } if construct.contains("nowhere")),
        "{err:?}"
    );
}

// ── Calls ───────────────────────────────────────────────────────────

#[test]
fn discarded_call_result_is_popped() {
    let m = method(
        "f",
        IrType::Void,
        &[],
        &[],
        vec![
            Instr::Call(static_call("read", Vec::new(), IrType::Int32)),
            Instr::Call(static_call("println", vec![Operand::Int(1)], IrType::Void)),
        ],
    );
    let text = generate(&class(vec![m])).unwrap();
    assert_eq!(
        body_of(&text, "f"),
        [
            "invokestatic io/read()I",
            "pop",
            "iconst_1",
            "invokestatic io/println(I)V",
            "return",
        ]
    );
    assert_eq!(limit(&text, "f", "stack"), 1);
}

#[test]
fn unread_call_temp_is_popped_instead_of_stored() {
    let m = method(
        "f",
        IrType::Void,
        &[],
        &[("tmp0", IrType::Int32)],
        vec![assign("tmp0", IrType::Int32, Rhs::Call(static_call("read", Vec::new(), IrType::Int32)))],
    );
    let text = generate(&class(vec![m])).unwrap();
    assert_eq!(body_of(&text, "f"), ["invokestatic io/read()I", "pop", "return"]);
}

#[test]
fn read_call_temp_is_stored() {
    let m = method(
        "f",
        IrType::Int32,
        &[],
        &[("tmp0", IrType::Int32)],
        vec![
            assign("tmp0", IrType::Int32, Rhs::Call(static_call("read", Vec::new(), IrType::Int32))),
            ret_int("tmp0"),
        ],
    );
    let text = generate(&class(vec![m])).unwrap();
    assert_eq!(
        body_of(&text, "f"),
        ["invokestatic io/read()I", "istore_1", "iload_1", "ireturn"]
    );
}

#[test]
fn virtual_call_on_own_class_uses_declared_signature() {
    let caller = method(
        "f",
        IrType::Int32,
        &[],
        &[("tmp0", IrType::Int32)],
        vec![
            assign(
                "tmp0",
                IrType::Int32,
                Rhs::Call(Call {
                    kind: InvokeKind::Virtual,
                    target: CallTarget::Instance(Operand::This {
                        class: "Main".into(),
                    }),
                    method: "add".into(),
                    args: smallvec![Operand::Int(2), Operand::Int(5)],
                    ret: IrType::Int32,
                }),
            ),
            ret_int("tmp0"),
        ],
    );
    let text = generate(&class(vec![add_method(), caller])).unwrap();
    assert_eq!(
        body_of(&text, "f"),
        [
            "aload_0",
            "iconst_2",
            "iconst_5",
            "invokevirtual Main/add(II)I",
            "istore_1",
            "iload_1",
            "ireturn",
        ]
    );
    assert_eq!(limit(&text, "f", "stack"), 3);
}

#[test]
fn interface_call_appends_argument_count() {
    let mut c = class(Vec::new());
    c.imports.push("java.util.List".into());
    let list = IrType::Class("List".into());
    let m = method(
        "f",
        IrType::Void,
        &[("xs", list.clone())],
        &[],
        vec![Instr::Call(Call {
            kind: InvokeKind::Interface,
            target: CallTarget::Instance(Operand::var("xs", list)),
            method: "add".into(),
            args: smallvec![Operand::Int(3)],
            ret: IrType::Bool,
        })],
    );
    c.methods.push(m);
    let text = generate(&c).unwrap();
    assert_eq!(
        body_of(&text, "f"),
        [
            "aload_1",
            "iconst_3",
            "invokeinterface java/util/List/add(I)Z 2",
            "pop",
            "return",
        ]
    );
}

#[test]
fn call_on_non_object_is_malformed() {
    let m = method(
        "f",
        IrType::Void,
        &[("n", IrType::Int32)],
        &[],
        vec![Instr::Call(Call {
            kind: InvokeKind::Virtual,
            target: CallTarget::Instance(int("n")),
            method: "foo".into(),
            args: smallvec![],
            ret: IrType::Void,
        })],
    );
    assert!(matches!(
        generate(&class(vec![m])),
        Err(CompileError::MalformedInvocation { .. })
    ));
}

#[test]
fn unimported_class_is_unresolved() {
    let m = method(
        "f",
        IrType::Void,
        &[],
        &[],
        vec![Instr::Call(Call {
            kind: InvokeKind::Static,
            target: CallTarget::Class("Nowhere".into()),
            method: "go".into(),
            args: smallvec![],
            ret: IrType::Void,
        })],
    );
    assert!(matches!(
        generate(&class(vec![m])),
        Err(CompileError::UnresolvedType { .. })
    ));
}

// ── Objects and arrays ──────────────────────────────────────────────

#[test]
fn new_object_is_initialized_before_store() {
    let obj = IrType::Class("Main".into());
    let m = method(
        "f",
        IrType::Void,
        &[],
        &[("tmp0", obj.clone())],
        vec![
            assign("tmp0", obj.clone(), Rhs::New("Main".into())),
            Instr::Call(Call::init(Operand::var("tmp0", obj))),
        ],
    );
    let text = generate(&class(vec![m])).unwrap();
    assert_eq!(
        body_of(&text, "f"),
        [
            "new Main",
            "dup",
            "invokespecial Main/<init>()V",
            "astore_1",
            "return",
        ]
    );
    assert_eq!(limit(&text, "f", "stack"), 2);
}

#[test]
fn field_access_uses_owner_and_descriptor() {
    let mut c = class(Vec::new());
    c.fields.push(IrField {
        name: "count".into(),
        ty: IrType::Int32,
        modifiers: Modifiers::PUBLIC,
    });
    let this = Operand::This {
        class: "Main".into(),
    };
    c.methods.push(method(
        "f",
        IrType::Void,
        &[],
        &[("tmp0", IrType::Int32)],
        vec![
            assign(
                "tmp0",
                IrType::Int32,
                Rhs::GetField {
                    object: this.clone(),
                    field: "count".into(),
                    ty: IrType::Int32,
                },
            ),
            Instr::PutField {
                object: this,
                field: "count".into(),
                value: int("tmp0"),
            },
        ],
    ));
    let text = generate(&c).unwrap();
    assert_eq!(
        body_of(&text, "f"),
        [
            "aload_0",
            "getfield Main/count I",
            "istore_1",
            "aload_0",
            "iload_1",
            "putfield Main/count I",
            "return",
        ]
    );
}

#[test]
fn int_and_boolean_arrays() {
    let bools = IrType::Array(Box::new(IrType::Bool));
    let m = method(
        "f",
        IrType::Int32,
        &[],
        &[
            ("a", IrType::int_array()),
            ("b", bools.clone()),
            ("tmp0", IrType::Int32),
        ],
        vec![
            assign(
                "a",
                IrType::int_array(),
                Rhs::NewArray {
                    elem: IrType::Int32,
                    size: Operand::Int(3),
                },
            ),
            assign(
                "b",
                bools.clone(),
                Rhs::NewArray {
                    elem: IrType::Bool,
                    size: Operand::Int(1),
                },
            ),
            Instr::ArrayStore {
                array: Operand::var("a", IrType::int_array()),
                index: Operand::Int(0),
                value: Operand::Int(9),
            },
            Instr::ArrayStore {
                array: Operand::var("b", bools),
                index: Operand::Int(0),
                value: Operand::Bool(true),
            },
            assign(
                "tmp0",
                IrType::Int32,
                Rhs::ArrayLoad {
                    array: Operand::var("a", IrType::int_array()),
                    index: Operand::Int(0),
                },
            ),
            assign("tmp0", IrType::Int32, Rhs::ArrayLength(Operand::var("a", IrType::int_array()))),
            ret_int("tmp0"),
        ],
    );
    let text = generate(&class(vec![m])).unwrap();
    assert_eq!(
        body_of(&text, "f"),
        [
            "iconst_3",
            "newarray int",
            "astore_1",
            "iconst_1",
            "newarray boolean",
            "astore_2",
            "aload_1",
            "iconst_0",
            "bipush 9",
            "iastore",
            "aload_2",
            "iconst_0",
            "iconst_1",
            "bastore",
            "aload_1",
            "iconst_0",
            "iaload",
            "istore_3",
            "aload_1",
            "arraylength",
            "istore_3",
            "iload_3",
            "ireturn",
        ]
    );
    assert_eq!(limit(&text, "f", "stack"), 3);
}
