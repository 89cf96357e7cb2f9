//! Rewrites that run before the symbol table is built.

use octet_core::{DataType, Diagnostics, HeapId, Position, Register, Result};

use crate::ast::{
    AssignTarget, Assignment, Ast, Expr, ExprId, Literal, LiteralValue, NodeRef, Parent,
    ScopeId, Stmt, StmtId, Transform, VarDecl, VarDeclKind,
};
use crate::scope;
use crate::types;

/// Name of the element counter declared in loops over strings and arrays.
pub const LOOP_INDEX_VARIABLE: &str = "_octet_loop_index";

const X_REGISTER_WARNING: &str =
    "writing to the X register is dangerous, because it's used as an internal pointer";

pub struct Desugar<'d> {
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Desugar<'d> {
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self { diagnostics }
    }

    /// `x op= v` becomes `x = x op v` for a single non-memory target.
    fn expand_augmented(&mut self, ast: &mut Ast, id: StmtId) -> bool {
        let Stmt::Assignment(assign) = ast.stmt(id) else {
            return false;
        };
        let (Some(op), [target]) = (assign.aug_op, assign.targets.as_slice()) else {
            return false;
        };
        let target = target.clone();
        let value = assign.value;
        let position = ast.stmt_position(id).clone();
        let current = match &target {
            AssignTarget::Memory(_) => return false,
            AssignTarget::Register(register) => {
                ast.add_expr(Expr::Register(*register), position.clone())
            }
            AssignTarget::Identifier(e) | AssignTarget::ArrayIndexed(e) => ast.clone_expr(*e),
        };
        let combined = ast.add_expr(
            Expr::Binary {
                left: current,
                op,
                right: value,
            },
            position,
        );
        ast.replace_stmt(
            id,
            Stmt::Assignment(Assignment {
                targets: vec![target],
                aug_op: None,
                value: combined,
            }),
        );
        true
    }

    fn warn_register_x(&mut self, ast: &Ast, id: StmtId) {
        let writes_x = match ast.stmt(id) {
            Stmt::Assignment(assign) => assign
                .targets
                .iter()
                .any(|t| matches!(t, AssignTarget::Register(Register::X))),
            Stmt::PostIncrDecr { target, .. } => {
                matches!(target, AssignTarget::Register(Register::X))
            }
            Stmt::For(fl) => fl.loop_register == Some(Register::X),
            _ => false,
        };
        if writes_x {
            self.diagnostics
                .warning(X_REGISTER_WARNING, ast.stmt_position(id).clone());
        }
    }

    /// Parameters of an ordinary subroutine become local variables at the
    /// front of its body, unless something of that name is already there.
    fn declare_parameters(&mut self, ast: &mut Ast, id: StmtId) -> Result<bool> {
        let Stmt::Subroutine(sub) = ast.stmt(id) else {
            return Ok(false);
        };
        if sub.is_asm() {
            return Ok(false);
        }
        let defined: Vec<String> = scope::scope_members(ast, ScopeId::Stmt(id))
            .into_iter()
            .filter(|s| matches!(ast.stmt(*s), Stmt::VarDecl(_) | Stmt::Label(_)))
            .filter_map(|s| ast.stmt(s).declared_name().map(str::to_string))
            .collect();
        let missing: Vec<(String, DataType)> = sub
            .parameters
            .iter()
            .filter(|p| !defined.contains(&p.name))
            .map(|p| (p.name.clone(), p.datatype))
            .collect();
        if missing.is_empty() {
            return Ok(false);
        }

        let position = ast.stmt_position(id).clone();
        let decls: Vec<StmtId> = missing
            .into_iter()
            .map(|(name, datatype)| {
                let decl = Stmt::VarDecl(generated_var(datatype, name));
                ast.add_stmt(decl, position.clone())
            })
            .collect();
        ast.insert_statements(ScopeId::Stmt(id), 0, &decls)?;
        Ok(true)
    }

    /// Declares a loop's own variable, and the element counter of a loop
    /// over a string or array, inside the loop body.
    fn declare_loop_variables(&mut self, ast: &mut Ast, id: StmtId) -> Result<bool> {
        let Stmt::For(fl) = ast.stmt(id) else {
            return Ok(false);
        };
        let position = ast.stmt_position(id).clone();
        let body = ScopeId::Stmt(fl.body);
        let mut wanted = Vec::new();
        if fl.loop_register.is_some() {
            if fl.decl_type.is_some() {
                self.diagnostics.error(
                    "register loop variables cannot be explicitly declared with a datatype",
                    position.clone(),
                );
            }
        } else if let (Some(datatype), Some(loop_var)) = (fl.decl_type, fl.loop_var) {
            if let Some(ident) = ast.expr(loop_var).as_identifier() {
                wanted.push((ident.last().to_string(), datatype));
            }
        }
        if !matches!(ast.expr(fl.iterable), Expr::Range { .. }) {
            wanted.push((LOOP_INDEX_VARIABLE.to_string(), DataType::UByte));
        }

        let mut decls = Vec::new();
        for (name, datatype) in wanted {
            if scope::member(ast, body, &name).is_none() {
                let decl = Stmt::VarDecl(generated_var(datatype, name));
                decls.push(ast.add_stmt(decl, position.clone()));
            }
        }
        if decls.is_empty() {
            return Ok(false);
        }
        ast.insert_statements(body, 0, &decls)?;
        Ok(true)
    }

    /// Literal return values take the subroutine's declared return types.
    fn convert_return_values(&mut self, ast: &mut Ast, id: StmtId) -> Result<bool> {
        let Stmt::Return { values } = ast.stmt(id) else {
            return Ok(false);
        };
        if values.is_empty() {
            return Ok(false);
        }
        let values = values.clone();
        let Some(sub) = ast.defining_subroutine(NodeRef::Stmt(id))? else {
            return Ok(false);
        };
        let Some(sub) = ast.stmt(sub).as_subroutine() else {
            return Ok(false);
        };
        if sub.return_types.len() != values.len() {
            return Ok(false);
        }
        let converted: Vec<(ExprId, Literal)> = values
            .iter()
            .zip(sub.return_types.iter())
            .filter_map(|(&value, &datatype)| {
                let lit = ast.expr(value).as_literal()?;
                let adjusted = lit.into_datatype(datatype)?;
                (adjusted != *lit).then_some((value, adjusted))
            })
            .collect();
        let changed = !converted.is_empty();
        for (value, lit) in converted {
            ast.replace_expr(value, Expr::Literal(lit));
        }
        Ok(changed)
    }

    /// `lsb(x)` is `x as ubyte`.
    fn rewrite_lsb(&mut self, ast: &mut Ast, id: ExprId) -> bool {
        let Expr::FunctionCall(call) = ast.expr(id) else {
            return false;
        };
        let is_lsb = ast
            .expr(call.target)
            .as_identifier()
            .is_some_and(|ident| !ident.is_qualified() && ident.last() == "lsb");
        let [argument] = call.args.as_slice() else {
            return false;
        };
        if !is_lsb {
            return false;
        }
        let expression = *argument;
        ast.replace_expr(
            id,
            Expr::TypeCast {
                expression,
                datatype: DataType::UByte,
            },
        );
        true
    }

    /// Moves string literals and constant array literals into the heap.
    fn intern(&mut self, ast: &mut Ast, id: ExprId) -> Result<bool> {
        let Some(lit) = ast.expr(id).as_literal() else {
            return Ok(false);
        };
        let declared = declared_datatype(ast, id);
        let position = ast.expr_position(id).clone();
        let stored = match lit.value() {
            LiteralValue::Str(text) => {
                let datatype = declared.filter(|d| d.is_string()).unwrap_or(lit.datatype());
                let text = text.clone();
                self.store(ast.heap.add_string(datatype, &text), &position)
                    .map(|heap_id| (datatype, heap_id))
            }
            LiteralValue::Array(elements) => {
                let datatype = declared.filter(|d| d.is_array()).unwrap_or(lit.datatype());
                let elements = elements.clone();
                self.intern_array(ast, datatype, &elements, &position)?
                    .map(|heap_id| (datatype, heap_id))
            }
            _ => None,
        };
        let Some((datatype, heap_id)) = stored else {
            return Ok(false);
        };
        match Literal::heap(datatype, heap_id) {
            Some(lit) => {
                ast.replace_expr(id, Expr::Literal(lit));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn intern_array(
        &mut self,
        ast: &mut Ast,
        datatype: DataType,
        elements: &[ExprId],
        position: &Position,
    ) -> Result<Option<HeapId>> {
        let mut values = Vec::with_capacity(elements.len());
        for &element in elements {
            let value = types::const_value(ast, element)?;
            match value.and_then(|lit| lit.as_f64()) {
                Some(v) => values.push(v),
                None => return Ok(None),
            }
        }
        if datatype == DataType::ArrayF {
            return Ok(Some(ast.heap.add_float_array(values)));
        }
        let element_type = datatype.element_type().unwrap_or(DataType::UByte);
        let mut integers = Vec::with_capacity(values.len());
        for value in values {
            if value.fract() != 0.0 || !element_type.holds(value as i64) {
                self.diagnostics.error(
                    format!("array element {value} out of range for {element_type}"),
                    position.clone(),
                );
                return Ok(None);
            }
            integers.push(value as i32);
        }
        Ok(self.store(ast.heap.add_int_array(datatype, integers), position))
    }

    fn store(&mut self, stored: Result<HeapId>, position: &Position) -> Option<HeapId> {
        match stored {
            Ok(id) => Some(id),
            Err(error) => {
                self.diagnostics.error(error.to_string(), position.clone());
                None
            }
        }
    }
}

impl Transform for Desugar<'_> {
    fn transform_stmt(&mut self, ast: &mut Ast, id: StmtId) -> Result<bool> {
        self.warn_register_x(ast, id);
        let mut changed = self.expand_augmented(ast, id);
        changed |= self.declare_parameters(ast, id)?;
        changed |= self.declare_loop_variables(ast, id)?;
        changed |= self.convert_return_values(ast, id)?;
        Ok(changed)
    }

    fn transform_expr(&mut self, ast: &mut Ast, id: ExprId) -> Result<bool> {
        let changed = self.rewrite_lsb(ast, id);
        Ok(changed | self.intern(ast, id)?)
    }
}

fn generated_var(datatype: DataType, name: String) -> VarDecl {
    VarDecl {
        kind: VarDeclKind::Var,
        datatype,
        array_size: None,
        name,
        value: None,
        auto_generated: true,
    }
}

/// The datatype of the declaration whose initial value is `id`.
fn declared_datatype(ast: &Ast, id: ExprId) -> Option<DataType> {
    match ast.parent(NodeRef::Expr(id)) {
        Parent::Stmt(owner) => ast
            .stmt(owner)
            .as_var_decl()
            .filter(|decl| decl.value == Some(id))
            .map(|decl| decl.datatype),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{AstBuilder, BinaryOp, walk_tree};
    use octet_core::HeapValue;

    fn desugar(ast: &mut Ast) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        ast.relink();
        walk_tree(&mut Desugar::new(&mut diagnostics), ast).unwrap();
        ast.relink();
        diagnostics
    }

    #[test]
    fn augmented_assignment_is_expanded() {
        let mut b = AstBuilder::new("desugar.oct");
        let x = b.var(DataType::UByte, "x", None);
        let three = b.int(3);
        let target = b.target_var("x");
        let aug = b.aug_assign(target, BinaryOp::Add, three);
        let main = b.block("main", vec![x, aug]);
        let mut ast = b.module("prog", vec![main]);
        desugar(&mut ast);

        let Stmt::Assignment(assign) = ast.stmt(aug) else {
            panic!("expected assignment");
        };
        assert_eq!(assign.aug_op, None);
        let Expr::Binary { left, op, right } = ast.expr(assign.value) else {
            panic!("expected binary value");
        };
        assert_eq!(*op, BinaryOp::Add);
        assert_eq!(*right, three);
        let name = ast.expr(*left).as_identifier().map(|i| i.joined());
        assert_eq!(name, Some("x".into()));
    }

    #[test]
    fn memory_targets_keep_their_operator() {
        let mut b = AstBuilder::new("desugar.oct");
        let address = b.int(0xd020);
        let target = b.target_memory(address);
        let one = b.int(1);
        let aug = b.aug_assign(target, BinaryOp::BitOr, one);
        let main = b.block("main", vec![aug]);
        let mut ast = b.module("prog", vec![main]);
        desugar(&mut ast);
        assert!(matches!(ast.stmt(aug), Stmt::Assignment(a) if a.aug_op == Some(BinaryOp::BitOr)));
    }

    #[test]
    fn lsb_becomes_a_cast() {
        let mut b = AstBuilder::new("desugar.oct");
        let w = b.var(DataType::UWord, "w", None);
        let arg = b.ident("w");
        let call = b.call("lsb", vec![arg]);
        let target = b.target_register(Register::A);
        let assign = b.assign(target, call);
        let main = b.block("main", vec![w, assign]);
        let mut ast = b.module("prog", vec![main]);
        desugar(&mut ast);
        assert_eq!(
            ast.expr(call),
            &Expr::TypeCast {
                expression: arg,
                datatype: DataType::UByte
            }
        );
    }

    #[test]
    fn parameters_are_declared_once() {
        let mut b = AstBuilder::new("desugar.oct");
        let params = vec![("x", DataType::UByte), ("y", DataType::UWord)];
        let sub = b.subroutine("plot", params, vec![], vec![]);
        let main = b.block("main", vec![sub]);
        let mut ast = b.module("prog", vec![main]);
        desugar(&mut ast);
        desugar(&mut ast);
        let names: Vec<&str> = ast
            .scope_statements(ScopeId::Stmt(sub))
            .iter()
            .filter_map(|s| ast.stmt(*s).declared_name())
            .collect();
        assert_eq!(names, vec!["x", "y"]);
    }

    #[test]
    fn register_parameters_are_not_declared() {
        use crate::ast::{RegisterOrFlag, RegisterSet};
        let mut b = AstBuilder::new("desugar.oct");
        let a = RegisterOrFlag::Register(Register::A);
        let sub = b.asm_subroutine(
            "chrout",
            Some(0xffd2),
            vec![("char", DataType::UByte, a)],
            vec![],
            RegisterSet::empty(),
            vec![],
        );
        let main = b.block("main", vec![sub]);
        let mut ast = b.module("prog", vec![main]);
        desugar(&mut ast);
        assert!(ast.scope_statements(ScopeId::Stmt(sub)).is_empty());
    }

    #[test]
    fn loops_over_arrays_get_a_counter() {
        let mut b = AstBuilder::new("desugar.oct");
        let one = b.int(1);
        let two = b.int(2);
        let values = b.array(DataType::UByte, vec![one, two]);
        let arr = b.var(DataType::ArrayUb, "values", Some(values));
        let iterable = b.ident("values");
        let nop = b.nop();
        let fl = b.for_loop(Some(DataType::UByte), "v", iterable, vec![nop]);
        let main = b.block("main", vec![arr, fl]);
        let mut ast = b.module("prog", vec![main]);
        desugar(&mut ast);

        let Stmt::For(fl) = ast.stmt(fl) else {
            panic!("expected for loop");
        };
        let declared: Vec<&str> = ast
            .scope_statements(ScopeId::Stmt(fl.body))
            .iter()
            .filter_map(|s| ast.stmt(*s).as_var_decl().map(|d| d.name.as_str()))
            .collect();
        assert_eq!(declared, vec!["v", LOOP_INDEX_VARIABLE]);
        let literal = ast.expr(values).as_literal();
        let heap_id = literal.and_then(Literal::heap_id).unwrap();
        assert_eq!(
            ast.heap.get(heap_id).unwrap(),
            &HeapValue::IntArray {
                datatype: DataType::ArrayUb,
                values: vec![1, 2]
            }
        );
    }

    #[test]
    fn register_x_writes_are_flagged() {
        let mut b = AstBuilder::new("desugar.oct");
        let target = b.target_register(Register::X);
        let zero = b.int(0);
        let assign = b.assign(target, zero);
        let main = b.block("main", vec![assign]);
        let mut ast = b.module("prog", vec![main]);
        let diagnostics = desugar(&mut ast);
        assert_eq!(diagnostics.warning_count(), 1);
    }

    #[test]
    fn strings_are_interned_with_their_declared_kind() {
        let mut b = AstBuilder::new("desugar.oct");
        let text = b.string("hi");
        let decl = b.var(DataType::StrP, "greeting", Some(text));
        let again = b.string("hi");
        let other = b.var(DataType::Str, "plain", Some(again));
        let main = b.block("main", vec![decl, other]);
        let mut ast = b.module("prog", vec![main]);
        desugar(&mut ast);
        let first = ast.expr(text).as_literal().unwrap();
        let second = ast.expr(again).as_literal().unwrap();
        assert_eq!(first.datatype(), DataType::StrP);
        assert_ne!(first.heap_id(), second.heap_id());
    }

    #[test]
    fn literal_returns_take_the_declared_type() {
        let mut b = AstBuilder::new("desugar.oct");
        let five = b.int(5);
        let ret = b.ret(vec![five]);
        let sub = b.subroutine("five", vec![], vec![DataType::UWord], vec![ret]);
        let main = b.block("main", vec![sub]);
        let mut ast = b.module("prog", vec![main]);
        desugar(&mut ast);
        let five = ast.expr(five).as_literal();
        assert_eq!(five.map(Literal::datatype), Some(DataType::UWord));
    }
}
