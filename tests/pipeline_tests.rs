//! End-to-end tests: trees built with the AST builder, compiled through
//! the whole pipeline.

use octet::compiler::scope::Declaration;
use octet::compiler::types;
use octet::prelude::*;

fn compile(ast: &mut Ast) -> CompilationResult {
    Compiler::compile(ast, &CompilerOptions::default()).expect("internal compiler error")
}

/// Opcodes of the `main.start` body.
fn start_body(program: &Program) -> Vec<Opcode> {
    program
        .opcodes()
        .skip_while(|&op| op != Opcode::StartProcdef)
        .skip(1)
        .take_while(|&op| op != Opcode::EndProcdef)
        .collect()
}

#[test]
fn adding_zero_emits_nothing() {
    let mut b = AstBuilder::new("zero.oct");
    let x = b.var(DataType::UByte, "x", None);
    let target = b.target_var("x");
    let zero = b.int(0);
    let aug = b.aug_assign(target, BinaryOp::Add, zero);
    let start = b.subroutine("start", vec![], vec![], vec![aug]);
    let main = b.block("main", vec![x, start]);
    let mut ast = b.module("zero", vec![main]);

    let result = compile(&mut ast);
    assert!(result.is_success());
    let body = start_body(result.program.as_ref().unwrap());
    assert!(
        body.iter().all(|&op| op == Opcode::Line),
        "unexpected instructions: {body:?}"
    );
}

#[test]
fn constant_product_folds_to_narrowest_literal() {
    let mut b = AstBuilder::new("fold.oct");
    let y = b.var(DataType::UByte, "y", None);
    let target = b.target_var("y");
    let five = b.int(5);
    let two = b.int(2);
    let product = b.binary(five, BinaryOp::Mul, two);
    let assign = b.assign(target, product);
    let start = b.subroutine("start", vec![], vec![], vec![assign]);
    let main = b.block("main", vec![y, start]);
    let mut ast = b.module("fold", vec![main]);

    let result = compile(&mut ast);
    assert!(result.is_success());
    let literal = ast
        .expr(product)
        .as_literal()
        .expect("product was not folded");
    assert_eq!(literal.datatype(), DataType::UByte);
    assert_eq!(literal.as_integer(), Some(10));

    let program = result.program.unwrap();
    let pushes: Vec<_> = program
        .instructions()
        .filter_map(|i| i.as_operation())
        .filter(|op| op.opcode == Opcode::PushByte)
        .map(|op| op.arg)
        .collect();
    assert_eq!(pushes, vec![Some(Value::UByte(10))]);
}

#[test]
fn constant_if_keeps_only_the_taken_branch() {
    let mut b = AstBuilder::new("if.oct");
    let a = b.subroutine("a", vec![], vec![], vec![]);
    let other = b.subroutine("b", vec![], vec![], vec![]);
    let condition = b.boolean(true);
    let call_a = b.call_stmt("a", vec![]);
    let call_b = b.call_stmt("b", vec![]);
    let stmt = b.if_else(condition, vec![call_a], vec![call_b]);
    let start = b.subroutine("start", vec![], vec![], vec![stmt]);
    let main = b.block("main", vec![a, other, start]);
    let mut ast = b.module("if", vec![main]);

    let result = compile(&mut ast);
    assert!(result.is_success());
    let calls: Vec<_> = result
        .program
        .unwrap()
        .instructions()
        .filter_map(|i| i.as_operation())
        .filter(|op| op.opcode == Opcode::Call)
        .filter_map(|op| op.call_label.clone())
        .collect();
    assert_eq!(calls, vec!["main.a".to_string()]);
    assert!(!ast.statements_under(start).contains(&call_b));
}

#[test]
fn single_value_range_runs_the_body_once() {
    let mut b = AstBuilder::new("once.oct");
    let i = b.var(DataType::UByte, "i", None);
    let body = b.asm(" nop");
    let for_stmt = b.for_range("i", 1, 1, vec![body]);
    let start = b.subroutine("start", vec![], vec![], vec![for_stmt]);
    let main = b.block("main", vec![i, start]);
    let mut ast = b.module("once", vec![main]);

    let result = compile(&mut ast);
    assert!(result.is_success());
    let body = start_body(result.program.as_ref().unwrap());
    let inlined = body.iter().filter(|&&op| op == Opcode::InlineAssembly);
    assert_eq!(inlined.count(), 1);
    for control in [Opcode::CmpUb, Opcode::Bnz, Opcode::Jump, Opcode::IncVarUb] {
        assert!(!body.contains(&control), "{control:?} in {body:?}");
    }
}

#[test]
fn nearest_declaration_shadows_outer_one() {
    let mut b = AstBuilder::new("shadow.oct");
    let outer = b.var(DataType::UByte, "count", None);
    let inner = b.var(DataType::UByte, "count", None);
    let qualified = b.ident("main.count");
    let target = b.target_var("count");
    let to_inner = b.assign(target, qualified);
    let plain = b.ident("count");
    let target = b.target_var("main.count");
    let to_outer = b.assign(target, plain);
    let start = b.subroutine("start", vec![], vec![], vec![inner, to_inner, to_outer]);
    let main = b.block("main", vec![outer, start]);
    let mut ast = b.module("shadow", vec![main]);

    let result = compile(&mut ast);
    assert!(result.is_success(), "{:?}", result.diagnostics);
    let resolved = |id| match types::resolve_identifier(&ast, id).unwrap() {
        Declaration::Stmt(stmt) => stmt,
        Declaration::Builtin(_) => panic!("resolved to a builtin"),
    };
    assert_eq!(resolved(plain), inner);
    assert_eq!(resolved(qualified), outer);
    assert_eq!(ast.scoped_name(inner).unwrap(), "main.start.count");

    let program = result.program.unwrap();
    assert!(program.variable("main.count").is_some());
    assert!(program.variable("main.start.count").is_some());
}

#[test]
fn undefined_call_is_reported_once() {
    let mut b = AstBuilder::new("undefined.oct");
    b.at_line(7);
    let call = b.call_stmt("foo", vec![]);
    b.at_line(1);
    let start = b.subroutine("start", vec![], vec![], vec![call]);
    let main = b.block("main", vec![start]);
    let mut ast = b.module("undefined", vec![main]);

    let result = compile(&mut ast);
    assert!(!result.is_success());
    assert!(result.program.is_none());
    let errors: Vec<_> = result.diagnostics.errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "undefined function or subroutine: foo");
    assert_eq!(errors[0].position.line, 7);
}

#[test]
fn resolution_is_deterministic() {
    let build = || {
        let mut b = AstBuilder::new("twice.oct");
        let x = b.var(DataType::UByte, "x", None);
        let x_again = b.var(DataType::UByte, "x", None);
        let missing = b.ident("missing");
        let target = b.target_var("x");
        let assign = b.assign(target, missing);
        let start = b.subroutine("start", vec![], vec![], vec![assign]);
        let main = b.block("main", vec![x, x_again, start]);
        b.module("twice", vec![main])
    };
    let mut first = build();
    let mut second = build();
    let first = resolution_summary(&mut first);
    let second = resolution_summary(&mut second);
    assert_eq!(first, second);
    assert!(!first.1.is_empty());
}

/// Symbol names and error messages of one resolution run.
fn resolution_summary(ast: &mut Ast) -> (Vec<String>, Vec<String>) {
    let options = CompilerOptions::default();
    let output = octet::compiler::ResolutionPass::new(&options.entry_point)
        .run(ast)
        .unwrap();
    let symbols = output
        .symbols
        .sorted()
        .into_iter()
        .map(|(name, _)| name.to_string())
        .collect();
    let errors = output
        .diagnostics
        .errors()
        .map(|d| d.message.clone())
        .collect();
    (symbols, errors)
}

#[test]
fn common_type_is_symmetric_and_widening() {
    use octet::core::{NUMERIC_TYPES, common_datatype};

    for a in NUMERIC_TYPES {
        for b in NUMERIC_TYPES {
            let ab = common_datatype(a, b).unwrap().datatype;
            assert_eq!(ab, common_datatype(b, a).unwrap().datatype, "{a} {b}");
            for input in [a, b] {
                assert!(ab.width() >= input.width(), "{input} narrowed to {ab}");
                let mixed_sign = input.is_signed() != ab.is_signed();
                match (input.integer_range(), ab.integer_range()) {
                    // same width, mixed signedness: the signed type wins
                    (Some(_), Some(_)) if mixed_sign && input.width() == ab.width() => {}
                    (Some((lo, hi)), Some((common_lo, common_hi))) => {
                        assert!(common_lo <= lo && hi <= common_hi, "{a} {b} -> {ab}");
                    }
                    (_, None) => assert_eq!(ab, DataType::Float),
                    (None, Some(_)) => panic!("{input} narrowed to {ab}"),
                }
            }
        }
    }
}

#[test]
fn second_optimization_changes_nothing() {
    let mut b = AstBuilder::new("fixed.oct");
    let x = b.var(DataType::UByte, "x", None);
    let target = b.target_var("x");
    let left = b.ident("x");
    let one = b.int(1);
    let zero = b.int(0);
    let times = b.binary(left, BinaryOp::Mul, one);
    let sum = b.binary(times, BinaryOp::Add, zero);
    let assign = b.assign(target, sum);
    let work = b.asm(" nop");
    let condition = b.boolean(false);
    let dead = b.while_loop(condition, vec![work]);
    let start = b.subroutine("start", vec![], vec![], vec![assign, dead]);
    let main = b.block("main", vec![x, start]);
    let mut ast = b.module("fixed", vec![main]);

    let options = CompilerOptions::default();
    let result = Compiler::compile(&mut ast, &options).unwrap();
    assert!(result.is_success());
    assert!(result.optimizer_passes > 0);
    let again = octet::compiler::Optimizer::new(&options)
        .run(&mut ast)
        .unwrap();
    assert_eq!(again.passes, 0);
}
