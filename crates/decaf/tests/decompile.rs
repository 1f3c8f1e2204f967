//! End-to-end decompilation tests: instruction streams in, source out.
//!
//! Each test hand-assembles the bytecode shape javac would emit for a
//! small method and checks the reconstructed control flow and types.

use decaf::{
    ArithOp, Config, ConstPool, Constant, CpIndex, ExceptionEntry, IfCond, Instruction, LocalVariableEntry,
    MethodInput, NumKind, Opcode, ValueKind, decompile_method,
};
use pretty_assertions::assert_eq;

fn insn(pos: u32, op: Opcode) -> Instruction {
    Instruction::new(pos, op)
}

fn static_method(name: &str, descriptor: &str, instructions: Vec<Instruction>, const_pool: ConstPool) -> MethodInput {
    MethodInput {
        class_name: "com/example/Main".to_owned(),
        name: name.to_owned(),
        descriptor: descriptor.to_owned(),
        is_static: true,
        instructions,
        exception_table: Vec::new(),
        local_variable_table: None,
        const_pool,
    }
}

fn util_pool() -> ConstPool {
    ConstPool {
        entries: vec![
            Constant::Method {
                class: "com/example/Util".to_owned(),
                name: "work".to_owned(),
                descriptor: "()V".to_owned(),
            },
            Constant::Method {
                class: "com/example/Util".to_owned(),
                name: "other".to_owned(),
                descriptor: "()V".to_owned(),
            },
        ],
    }
}

fn source(input: &MethodInput) -> String {
    let output = decompile_method(input, &Config::default()).unwrap();
    output.source
}

#[test]
fn test_int_addition_widened_to_long() {
    let method = static_method(
        "f",
        "(II)V",
        vec![
            insn(0, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(1, Opcode::Load { kind: ValueKind::Int, slot: 1 }),
            insn(2, Opcode::Arith { kind: ValueKind::Int, op: ArithOp::Add }),
            insn(3, Opcode::Convert { from: ValueKind::Int, to: NumKind::Long }),
            insn(4, Opcode::Store { kind: ValueKind::Long, slot: 2 }),
            insn(5, Opcode::Return(None)),
        ],
        ConstPool::default(),
    );
    assert_eq!(
        source(&method),
        "static void f(int n, int n2) {\n    long l = (long)(n + n2);\n    return;\n}\n"
    );
}

#[test]
fn test_boolean_store_is_not_a_ternary() {
    // iconst_1; ifeq L; iconst_0; goto E; L: iconst_1; E: istore flag
    let mut method = static_method(
        "run",
        "()V",
        vec![
            insn(0, Opcode::IConst(1)),
            insn(1, Opcode::If { cond: IfCond::Eq, offset: 6 }),
            insn(4, Opcode::IConst(0)),
            insn(5, Opcode::Goto { offset: 3 }),
            insn(7, Opcode::IConst(1)),
            insn(8, Opcode::Store { kind: ValueKind::Int, slot: 0 }),
            insn(9, Opcode::Return(None)),
        ],
        ConstPool::default(),
    );
    method.local_variable_table = Some(vec![LocalVariableEntry {
        slot: 0,
        start_pc: 0,
        end_pc: 10,
        name: "flag".to_owned(),
        descriptor: "Z".to_owned(),
    }]);
    let src = source(&method);
    assert!(!src.contains('?'), "expected no ternary in:\n{src}");
    assert_eq!(src, "static void run() {\n    boolean flag = !true;\n    return;\n}\n");
}

#[test]
fn test_ternary_from_branching_expression() {
    // return a < b ? b : a
    let method = static_method(
        "max",
        "(II)I",
        vec![
            insn(0, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(1, Opcode::Load { kind: ValueKind::Int, slot: 1 }),
            insn(2, Opcode::IfICmp { cond: IfCond::Ge, offset: 6 }),
            insn(5, Opcode::Load { kind: ValueKind::Int, slot: 1 }),
            insn(6, Opcode::Goto { offset: 4 }),
            insn(8, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(10, Opcode::Return(Some(ValueKind::Int))),
        ],
        ConstPool::default(),
    );
    assert_eq!(
        source(&method),
        "static int max(int n, int n2) {\n    return n < n2 ? n2 : n;\n}\n"
    );
}

#[test]
fn test_and_chain_fuses_into_one_if() {
    // if (a && b && c) work();
    let method = static_method(
        "f",
        "(ZZZ)V",
        vec![
            insn(0, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(1, Opcode::If { cond: IfCond::Eq, offset: 14 }),
            insn(4, Opcode::Load { kind: ValueKind::Int, slot: 1 }),
            insn(5, Opcode::If { cond: IfCond::Eq, offset: 10 }),
            insn(8, Opcode::Load { kind: ValueKind::Int, slot: 2 }),
            insn(9, Opcode::If { cond: IfCond::Eq, offset: 6 }),
            insn(12, Opcode::InvokeStatic(CpIndex(0))),
            insn(15, Opcode::Return(None)),
        ],
        util_pool(),
    );
    let src = source(&method);
    assert_eq!(src.matches("if(").count(), 1, "expected a single fused if in:\n{src}");
    assert_eq!(
        src,
        "static void f(boolean bool, boolean bool2, boolean bool3) {\n    if(bool && bool2 && bool3) {\n        com.example.Util.work();\n    }\n    return;\n}\n"
    );
}

#[test]
fn test_or_fusion() {
    // if (a == 0 || b == 0) work();
    let method = static_method(
        "f",
        "(II)V",
        vec![
            insn(0, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(1, Opcode::If { cond: IfCond::Eq, offset: 7 }),
            insn(4, Opcode::Load { kind: ValueKind::Int, slot: 1 }),
            insn(5, Opcode::If { cond: IfCond::Ne, offset: 6 }),
            insn(8, Opcode::InvokeStatic(CpIndex(0))),
            insn(11, Opcode::Return(None)),
        ],
        util_pool(),
    );
    let src = source(&method);
    assert!(src.contains("if(n == 0 || n2 == 0) {"), "missing fused or in:\n{src}");
}

#[test]
fn test_if_with_else() {
    let method = static_method(
        "f",
        "(I)V",
        vec![
            insn(0, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(1, Opcode::If { cond: IfCond::Le, offset: 9 }),
            insn(4, Opcode::InvokeStatic(CpIndex(0))),
            insn(7, Opcode::Goto { offset: 6 }),
            insn(10, Opcode::InvokeStatic(CpIndex(1))),
            insn(13, Opcode::Return(None)),
        ],
        util_pool(),
    );
    assert_eq!(
        source(&method),
        "static void f(int n) {\n    if(n > 0) {\n        com.example.Util.work();\n    } else {\n        com.example.Util.other();\n    }\n    return;\n}\n"
    );
}

#[test]
fn test_else_if_chain_flattens() {
    let method = static_method(
        "f",
        "(I)V",
        vec![
            insn(0, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(1, Opcode::If { cond: IfCond::Le, offset: 9 }),
            insn(4, Opcode::InvokeStatic(CpIndex(0))),
            insn(7, Opcode::Goto { offset: 10 }),
            insn(10, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(11, Opcode::If { cond: IfCond::Ge, offset: 6 }),
            insn(14, Opcode::InvokeStatic(CpIndex(1))),
            insn(17, Opcode::Return(None)),
        ],
        util_pool(),
    );
    let src = source(&method);
    assert!(src.contains("} else if(n < 0) {"), "expected flattened else-if in:\n{src}");
}

#[test]
fn test_backward_goto_without_condition_is_while_true() {
    let method = static_method(
        "spin",
        "()V",
        vec![
            insn(0, Opcode::InvokeStatic(CpIndex(0))),
            insn(3, Opcode::Goto { offset: -3 }),
        ],
        util_pool(),
    );
    assert_eq!(
        source(&method),
        "static void spin() {\n    while(true) {\n        com.example.Util.work();\n    }\n}\n"
    );
}

#[test]
fn test_goto_onto_itself_is_empty_infinite_loop() {
    let method = static_method(
        "spin",
        "()V",
        vec![insn(0, Opcode::Goto { offset: 0 }), insn(3, Opcode::Return(None))],
        ConstPool::default(),
    );
    assert_eq!(source(&method), "static void spin() {\n    while(true) {}\n    return;\n}\n");
}

#[test]
fn test_loop_with_exit_branch_becomes_conditioned_while() {
    // L: iload a; iload b; if_icmplt EXIT; goto L; EXIT: return
    let method = static_method(
        "f",
        "(II)V",
        vec![
            insn(0, Opcode::Nop),
            insn(1, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(2, Opcode::Load { kind: ValueKind::Int, slot: 1 }),
            insn(3, Opcode::IfICmp { cond: IfCond::Lt, offset: 6 }),
            insn(6, Opcode::Goto { offset: -5 }),
            insn(9, Opcode::Return(None)),
        ],
        ConstPool::default(),
    );
    let src = source(&method);
    assert!(src.contains("while(n >= n2) {}"), "expected negated exit condition in:\n{src}");
    assert!(!src.contains("while(true)"), "loop should have been rewritten in:\n{src}");
}

#[test]
fn test_switch_with_breaks() {
    // switch(x) { case 1: y = 1; break; case 2: y = 2; break; default: y = 0; }
    let method = static_method(
        "f",
        "(I)I",
        vec![
            insn(0, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(
                1,
                Opcode::TableSwitch {
                    default_offset: 25,
                    low: 1,
                    offsets: vec![15, 20],
                },
            ),
            insn(16, Opcode::IConst(1)),
            insn(17, Opcode::Store { kind: ValueKind::Int, slot: 1 }),
            insn(18, Opcode::Goto { offset: 10 }),
            insn(21, Opcode::IConst(2)),
            insn(22, Opcode::Store { kind: ValueKind::Int, slot: 1 }),
            insn(23, Opcode::Goto { offset: 5 }),
            insn(26, Opcode::IConst(0)),
            insn(27, Opcode::Store { kind: ValueKind::Int, slot: 1 }),
            insn(28, Opcode::Load { kind: ValueKind::Int, slot: 1 }),
            insn(29, Opcode::Return(Some(ValueKind::Int))),
        ],
        ConstPool::default(),
    );
    let src = source(&method);
    assert!(src.contains("switch(n) {"), "missing switch in:\n{src}");
    let case1 = src.find("case 1:").expect("case 1 label");
    let case2 = src.find("case 2:").expect("case 2 label");
    let default = src.find("default:").expect("default label");
    assert!(case1 < case2 && case2 < default, "labels out of order in:\n{src}");
    assert_eq!(src.matches("break;").count(), 2, "expected two breaks in:\n{src}");
    assert!(src.contains("int n2 = 1;"), "first store should declare in:\n{src}");
    assert!(src.contains("n2 = 0;"), "default body missing in:\n{src}");
    assert!(src.contains("return n2;"), "join load missing in:\n{src}");
}

#[test]
fn test_switch_default_at_end_has_no_default_label() {
    // switch(x) { case 1: return 1; case 2: return 2; } return 0;
    let method = static_method(
        "f",
        "(I)I",
        vec![
            insn(0, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(
                1,
                Opcode::TableSwitch {
                    default_offset: 17,
                    low: 1,
                    offsets: vec![13, 15],
                },
            ),
            insn(14, Opcode::IConst(1)),
            insn(15, Opcode::Return(Some(ValueKind::Int))),
            insn(16, Opcode::IConst(2)),
            insn(17, Opcode::Return(Some(ValueKind::Int))),
            insn(18, Opcode::IConst(0)),
            insn(19, Opcode::Return(Some(ValueKind::Int))),
        ],
        ConstPool::default(),
    );
    let src = source(&method);
    assert!(src.contains("case 1:") && src.contains("case 2:"), "missing case labels in:\n{src}");
    assert!(!src.contains("default:"), "degenerate default should drop its label in:\n{src}");
    assert!(src.contains("return 1;") && src.contains("return 0;"), "case bodies missing in:\n{src}");
}

#[test]
fn test_multi_catch_coalesces_handlers() {
    let mut method = static_method(
        "f",
        "()V",
        vec![
            insn(0, Opcode::InvokeStatic(CpIndex(0))),
            insn(3, Opcode::Goto { offset: 5 }),
            insn(6, Opcode::Store { kind: ValueKind::Reference, slot: 0 }),
            insn(7, Opcode::Return(None)),
            insn(8, Opcode::Return(None)),
        ],
        util_pool(),
    );
    method.exception_table = vec![
        ExceptionEntry {
            start_pos: 0,
            end_pos: 3,
            handler_pos: 6,
            catch_type: Some("java/lang/IllegalStateException".to_owned()),
        },
        ExceptionEntry {
            start_pos: 0,
            end_pos: 3,
            handler_pos: 6,
            catch_type: Some("java/lang/IllegalArgumentException".to_owned()),
        },
    ];
    let src = source(&method);
    assert!(src.contains("try {"), "missing try in:\n{src}");
    assert!(
        src.contains("} catch(IllegalStateException | IllegalArgumentException throwable) {"),
        "expected one multi-catch in:\n{src}"
    );
    assert_eq!(src.matches("catch(").count(), 1, "handlers should coalesce in:\n{src}");
}

#[test]
fn test_string_builder_chain_stays_verbose() {
    let pool = ConstPool {
        entries: vec![
            Constant::Class("java/lang/StringBuilder".to_owned()),
            Constant::Method {
                class: "java/lang/StringBuilder".to_owned(),
                name: "<init>".to_owned(),
                descriptor: "()V".to_owned(),
            },
            Constant::Str("x".to_owned()),
            Constant::Method {
                class: "java/lang/StringBuilder".to_owned(),
                name: "append".to_owned(),
                descriptor: "(Ljava/lang/String;)Ljava/lang/StringBuilder;".to_owned(),
            },
            Constant::Method {
                class: "java/lang/StringBuilder".to_owned(),
                name: "toString".to_owned(),
                descriptor: "()Ljava/lang/String;".to_owned(),
            },
        ],
    };
    let method = static_method(
        "text",
        "()Ljava/lang/String;",
        vec![
            insn(0, Opcode::New(CpIndex(0))),
            insn(3, Opcode::Dup),
            insn(4, Opcode::InvokeSpecial(CpIndex(1))),
            insn(7, Opcode::Ldc(CpIndex(2))),
            insn(9, Opcode::InvokeVirtual(CpIndex(3))),
            insn(12, Opcode::InvokeVirtual(CpIndex(4))),
            insn(15, Opcode::Return(Some(ValueKind::Reference))),
        ],
        pool,
    );
    assert_eq!(
        source(&method),
        "static String text() {\n    return new StringBuilder().append(\"x\").toString();\n}\n"
    );
}

#[test]
fn test_null_comparison() {
    let method = static_method(
        "f",
        "(Ljava/lang/String;)V",
        vec![
            insn(0, Opcode::Load { kind: ValueKind::Reference, slot: 0 }),
            insn(1, Opcode::IfNonNull { offset: 6 }),
            insn(4, Opcode::InvokeStatic(CpIndex(0))),
            insn(7, Opcode::Return(None)),
        ],
        util_pool(),
    );
    let src = source(&method);
    assert!(src.contains("if(string == null) {"), "missing null compare in:\n{src}");
}

#[test]
fn test_instance_field_access() {
    let pool = ConstPool {
        entries: vec![Constant::Field {
            class: "com/example/Point".to_owned(),
            name: "x".to_owned(),
            descriptor: "I".to_owned(),
        }],
    };
    let method = MethodInput {
        class_name: "com/example/Point".to_owned(),
        name: "diff".to_owned(),
        descriptor: "(Lcom/example/Point;)I".to_owned(),
        is_static: false,
        instructions: vec![
            insn(0, Opcode::Load { kind: ValueKind::Reference, slot: 0 }),
            insn(1, Opcode::GetField(CpIndex(0))),
            insn(4, Opcode::Load { kind: ValueKind::Reference, slot: 1 }),
            insn(5, Opcode::GetField(CpIndex(0))),
            insn(8, Opcode::Arith { kind: ValueKind::Int, op: ArithOp::Sub }),
            insn(9, Opcode::Return(Some(ValueKind::Int))),
        ],
        exception_table: Vec::new(),
        local_variable_table: None,
        const_pool: pool,
    };
    assert_eq!(
        source(&method),
        "int diff(com.example.Point point) {\n    return this.x - point.x;\n}\n"
    );
}

#[test]
fn test_warnings_do_not_abort() {
    // pop from an empty stack: recoverable, substitutes a placeholder
    let method = static_method(
        "f",
        "()V",
        vec![insn(0, Opcode::Pop), insn(1, Opcode::Return(None))],
        ConstPool::default(),
    );
    let output = decompile_method(&method, &Config::default()).unwrap();
    assert!(!output.diagnostics.is_empty(), "expected an empty-stack warning");
    assert!(output.source.contains("return;"));
}

#[test]
fn test_break_out_of_outer_loop_gets_label() {
    let method = static_method(
        "f",
        "()V",
        vec![
            insn(0, Opcode::Nop),
            insn(1, Opcode::Nop),
            insn(2, Opcode::Goto { offset: 9 }),
            insn(5, Opcode::Goto { offset: -4 }),
            insn(8, Opcode::Goto { offset: -8 }),
            insn(11, Opcode::Return(None)),
        ],
        ConstPool::default(),
    );
    let src = source(&method);
    assert!(src.contains("Label1: while(true) {"), "outer loop should carry the label in:\n{src}");
    assert!(src.contains("break Label1;"), "break should name the outer loop in:\n{src}");
}

#[test]
fn test_throw_new_exception() {
    let pool = ConstPool {
        entries: vec![
            Constant::Class("java/lang/IllegalStateException".to_owned()),
            Constant::Str("boom".to_owned()),
            Constant::Method {
                class: "java/lang/IllegalStateException".to_owned(),
                name: "<init>".to_owned(),
                descriptor: "(Ljava/lang/String;)V".to_owned(),
            },
        ],
    };
    let method = static_method(
        "f",
        "()V",
        vec![
            insn(0, Opcode::New(CpIndex(0))),
            insn(3, Opcode::Dup),
            insn(4, Opcode::Ldc(CpIndex(1))),
            insn(6, Opcode::InvokeSpecial(CpIndex(2))),
            insn(9, Opcode::AThrow),
        ],
        pool,
    );
    assert_eq!(
        source(&method),
        "static void f() {\n    throw new IllegalStateException(\"boom\");\n}\n"
    );
}

#[test]
fn test_array_allocation_and_access() {
    let method = static_method(
        "f",
        "(I)I",
        vec![
            insn(0, Opcode::IConst(3)),
            insn(1, Opcode::NewArray { element: decaf::ArrayKind::Int }),
            insn(3, Opcode::Store { kind: ValueKind::Reference, slot: 1 }),
            insn(4, Opcode::Load { kind: ValueKind::Reference, slot: 1 }),
            insn(5, Opcode::IConst(0)),
            insn(6, Opcode::Load { kind: ValueKind::Int, slot: 0 }),
            insn(7, Opcode::ArrayStore(decaf::ArrayKind::Int)),
            insn(8, Opcode::Load { kind: ValueKind::Reference, slot: 1 }),
            insn(9, Opcode::IConst(0)),
            insn(10, Opcode::ArrayLoad(decaf::ArrayKind::Int)),
            insn(11, Opcode::Return(Some(ValueKind::Int))),
        ],
        ConstPool::default(),
    );
    assert_eq!(
        source(&method),
        "static int f(int n) {\n    int[] intArray = new int[3];\n    intArray[0] = n;\n    return intArray[0];\n}\n"
    );
}
