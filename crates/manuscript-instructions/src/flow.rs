//! Control flow: branching, loops, early return, and the conditional
//! expression.
//!
//! Compilation prunes statically decided branches. A condition that folds to
//! `false` drops its block entirely; one that folds to `true` swallows the
//! rest of the chain.

use serde_json::{Value as Json, json};
use tracing::warn;

use manuscript_core::{
    ExecContext, Expression, Flow, FoldContext, ManualError, Node, Result, RuntimeVariable,
    Statement, StaticVariable, TypeLookup, Value, VarType, block_children, block_to_json,
    execute_scoped_block, invalidate_block_mutations, write_conditional_block, write_scoped_block,
};

use crate::literal::NumberExpr;
use crate::math::{BinaryExpr, CompareExpr};
use crate::registries::Registries;
use crate::variables::{VarExpr, field};

// ============================================================================
// if
// ============================================================================

pub struct IfBranch {
    pub condition: Box<dyn Expression>,
    pub block: Vec<Box<dyn Statement>>,
}

impl IfBranch {
    pub fn new(condition: Box<dyn Expression>, block: Vec<Box<dyn Statement>>) -> Self {
        Self { condition, block }
    }
}

/// An if / else-if chain with an optional trailing else block.
pub struct IfStmt {
    pub branches: Vec<IfBranch>,
    pub else_block: Option<Vec<Box<dyn Statement>>>,
}

impl IfStmt {
    pub fn new(branches: Vec<IfBranch>, else_block: Option<Vec<Box<dyn Statement>>>) -> Self {
        Self {
            branches,
            else_block,
        }
    }

    /// Plain `if (condition) { block }` with no else.
    pub fn simple(condition: Box<dyn Expression>, block: Vec<Box<dyn Statement>>) -> Self {
        Self::new(vec![IfBranch::new(condition, block)], None)
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Statement>> {
        let raw = field(data, "ifs")?
            .as_array()
            .ok_or_else(|| ManualError::invalid_payload("field 'ifs' must be an array"))?;
        let mut branches = Vec::with_capacity(raw.len());
        for entry in raw {
            branches.push(IfBranch::new(
                regs.decode_expression(field(entry, "condition")?)?,
                regs.decode_block(field(entry, "block")?)?,
            ));
        }
        let else_block = match data.get("elseInstructions") {
            Some(Json::Null) | None => None,
            Some(raw) => Some(regs.decode_block(raw)?),
        };
        Ok(Box::new(IfStmt::new(branches, else_block)))
    }
}

impl Node for IfStmt {
    fn tag(&self) -> &'static str {
        "if"
    }

    fn to_data(&self) -> Json {
        let ifs: Vec<Json> = self
            .branches
            .iter()
            .map(|branch| {
                json!({
                    "condition": branch.condition.to_json(),
                    "block": block_to_json(&branch.block),
                })
            })
            .collect();
        match &self.else_block {
            Some(block) => json!({ "ifs": ifs, "elseInstructions": block_to_json(block) }),
            None => json!({ "ifs": ifs }),
        }
    }

    fn children(&self) -> Vec<&dyn Node> {
        let mut out: Vec<&dyn Node> = Vec::new();
        for branch in &self.branches {
            out.push(branch.condition.as_ref());
            out.extend(block_children(&branch.block));
        }
        if let Some(block) = &self.else_block {
            out.extend(block_children(block));
        }
        out
    }
}

impl Statement for IfStmt {
    fn execute(&self, ctx: &mut ExecContext) -> Result<Flow> {
        for branch in &self.branches {
            if branch.condition.execute(ctx)?.as_bool()? {
                return execute_scoped_block(ctx, &branch.block);
            }
        }
        match &self.else_block {
            Some(block) => execute_scoped_block(ctx, block),
            None => Ok(Flow::Continue),
        }
    }

    fn write_cpp(&self, ctx: &mut FoldContext) -> Result<Vec<String>> {
        // Branches whose outcome cannot be decided here, paired with the
        // rendered condition text.
        let mut open: Vec<(String, &[Box<dyn Statement>])> = Vec::new();
        let mut taken: Option<&[Box<dyn Statement>]> = self.else_block.as_deref();

        for branch in &self.branches {
            match branch.condition.constant_value(ctx)? {
                Some(value) if !value.as_bool()? => continue,
                Some(_) => {
                    // Statically true: everything after it is unreachable.
                    if open.is_empty() {
                        return write_scoped_block(ctx, &branch.block);
                    }
                    taken = Some(&branch.block);
                    break;
                }
                None => open.push((branch.condition.write_cpp(ctx)?, &branch.block)),
            }
        }

        if open.is_empty() {
            return match taken {
                Some(block) => write_scoped_block(ctx, block),
                None => Ok(Vec::new()),
            };
        }

        let mut lines = Vec::new();
        for (index, (condition, block)) in open.iter().enumerate() {
            if index == 0 {
                lines.push(format!("if({condition}) {{"));
            } else {
                lines.push(format!("}} else if({condition}) {{"));
            }
            lines.extend(write_conditional_block(ctx, block)?);
        }
        if let Some(block) = taken {
            lines.push("} else {".to_string());
            lines.extend(write_conditional_block(ctx, block)?);
        }
        lines.push("}".to_string());
        Ok(lines)
    }
}

// ============================================================================
// for
// ============================================================================

/// A counted loop over a named iterator variable.
///
/// The iterator lives in a scope wrapping the whole loop; the body gets a
/// fresh scope per iteration.
pub struct ForStmt {
    pub iterator: String,
    pub init: Box<dyn Expression>,
    pub condition: Box<dyn Expression>,
    pub step: Box<dyn Expression>,
    pub block: Vec<Box<dyn Statement>>,
}

impl ForStmt {
    pub fn new(
        iterator: impl Into<String>,
        init: Box<dyn Expression>,
        condition: Box<dyn Expression>,
        step: Box<dyn Expression>,
        block: Vec<Box<dyn Statement>>,
    ) -> Self {
        Self {
            iterator: iterator.into(),
            init,
            condition,
            step,
            block,
        }
    }

    /// Counted loop stepping a literal amount while `condition` holds.
    pub fn simple_conditioned(
        start: i32,
        condition: Box<dyn Expression>,
        step_by: i32,
        block: Vec<Box<dyn Statement>>,
        iterator: impl Into<String>,
    ) -> Self {
        let iterator = iterator.into();
        let step = BinaryExpr::add(
            Box::new(VarExpr::new(iterator.clone())),
            Box::new(NumberExpr::int(step_by)),
        );
        Self::new(
            iterator,
            Box::new(NumberExpr::int(start)),
            condition,
            Box::new(step),
            block,
        )
    }

    /// `for (i = start; i < up_to; i = i + 1)`.
    pub fn simple_up(
        start: i32,
        up_to: i32,
        block: Vec<Box<dyn Statement>>,
        iterator: impl Into<String>,
    ) -> Self {
        let iterator = iterator.into();
        let condition = CompareExpr::less(
            Box::new(VarExpr::new(iterator.clone())),
            Box::new(NumberExpr::int(up_to)),
        );
        Self::simple_conditioned(start, Box::new(condition), 1, block, iterator)
    }

    /// Run `block` `count` times over the iterator `i`.
    pub fn count(count: i32, block: Vec<Box<dyn Statement>>) -> Self {
        Self::simple_up(0, count, block, "i")
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Statement>> {
        let iterator = field(data, "iteratorName")?
            .as_str()
            .ok_or_else(|| ManualError::invalid_payload("field 'iteratorName' must be a string"))?;
        Ok(Box::new(ForStmt::new(
            iterator,
            regs.decode_expression(field(data, "init")?)?,
            regs.decode_expression(field(data, "condition")?)?,
            regs.decode_expression(field(data, "modifier")?)?,
            regs.decode_block(field(data, "block")?)?,
        )))
    }
}

impl Node for ForStmt {
    fn tag(&self) -> &'static str {
        "for"
    }

    fn to_data(&self) -> Json {
        json!({
            "iteratorName": self.iterator,
            "init": self.init.to_json(),
            "condition": self.condition.to_json(),
            "modifier": self.step.to_json(),
            "block": block_to_json(&self.block),
        })
    }

    fn children(&self) -> Vec<&dyn Node> {
        let mut out: Vec<&dyn Node> = vec![
            self.init.as_ref(),
            self.condition.as_ref(),
            self.step.as_ref(),
        ];
        out.extend(block_children(&self.block));
        out
    }
}

impl Statement for ForStmt {
    fn execute(&self, ctx: &mut ExecContext) -> Result<Flow> {
        let iterator_type = self.init.output_type(ctx)?;
        let initial = self.init.execute(ctx)?;
        ctx.scoped(|ctx| {
            ctx.declare(
                self.iterator.clone(),
                RuntimeVariable::new(iterator_type.clone(), initial),
            );
            loop {
                if !self.condition.execute(ctx)?.as_bool()? {
                    return Ok(Flow::Continue);
                }
                if let Flow::Return(value) = execute_scoped_block(ctx, &self.block)? {
                    return Ok(Flow::Return(value));
                }
                let step_type = self.step.output_type(ctx)?;
                let next = self.step.execute(ctx)?;
                ctx.get_mut(&self.iterator)?.set(&step_type, next)?;
            }
        })
    }

    fn write_cpp(&self, ctx: &mut FoldContext) -> Result<Vec<String>> {
        let iterator_type = self.init.output_type(ctx)?;
        let seed = self.init.constant_value(ctx)?;
        ctx.scoped(|ctx| {
            ctx.declare(
                self.iterator.clone(),
                StaticVariable::new(iterator_type.clone(), seed),
            );
            // A condition that is provably false on the seeded iterator
            // means the loop body never runs.
            if let Some(value) = self.condition.constant_value(ctx)?
                && !value.as_bool()?
            {
                return Ok(Vec::new());
            }
            let init = self.init.write_cpp(ctx)?;
            // Inside the emitted loop the iterator value is unknowable, and
            // anything the body writes to is no better.
            ctx.get_mut(&self.iterator)?.set_unknown();
            invalidate_block_mutations(ctx, &self.block);
            let condition = self.condition.write_cpp(ctx)?;
            let step = self.step.write_cpp(ctx)?;
            let mut lines = vec![format!(
                "for({ty} {it} = {init}; {condition}; {it} = {step}) {{",
                ty = iterator_type.cpp(),
                it = self.iterator,
            )];
            lines.extend(write_conditional_block(ctx, &self.block)?);
            lines.push("}".to_string());
            Ok(lines)
        })
    }
}

// ============================================================================
// while
// ============================================================================

pub struct WhileStmt {
    pub condition: Box<dyn Expression>,
    pub block: Vec<Box<dyn Statement>>,
}

impl WhileStmt {
    pub fn new(condition: Box<dyn Expression>, block: Vec<Box<dyn Statement>>) -> Self {
        Self { condition, block }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Statement>> {
        Ok(Box::new(WhileStmt::new(
            regs.decode_expression(field(data, "condition")?)?,
            regs.decode_block(field(data, "block")?)?,
        )))
    }
}

impl Node for WhileStmt {
    fn tag(&self) -> &'static str {
        "while"
    }

    fn to_data(&self) -> Json {
        json!({
            "condition": self.condition.to_json(),
            "block": block_to_json(&self.block),
        })
    }

    fn children(&self) -> Vec<&dyn Node> {
        let mut out: Vec<&dyn Node> = vec![self.condition.as_ref()];
        out.extend(block_children(&self.block));
        out
    }
}

impl Statement for WhileStmt {
    fn execute(&self, ctx: &mut ExecContext) -> Result<Flow> {
        while self.condition.execute(ctx)?.as_bool()? {
            if let Flow::Return(value) = execute_scoped_block(ctx, &self.block)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Continue)
    }

    fn write_cpp(&self, ctx: &mut FoldContext) -> Result<Vec<String>> {
        // Provably false at entry means the body never runs at all.
        if let Some(value) = self.condition.constant_value(ctx)?
            && !value.as_bool()?
        {
            return Ok(Vec::new());
        }
        // Later iterations see whatever the body wrote, so the condition
        // must be rendered against post-invalidation state.
        invalidate_block_mutations(ctx, &self.block);
        if let Some(value) = self.condition.constant_value(ctx)?
            && value.as_bool()?
        {
            warn!("while condition is statically true, emitting an unbounded loop");
        }
        let mut lines = vec![format!("while({}) {{", self.condition.write_cpp(ctx)?)];
        lines.extend(write_conditional_block(ctx, &self.block)?);
        lines.push("}".to_string());
        Ok(lines)
    }
}

// ============================================================================
// return
// ============================================================================

/// Early return; unwinds through every enclosing block.
pub struct ReturnStmt {
    pub value: Box<dyn Expression>,
}

impl ReturnStmt {
    pub fn new(value: Box<dyn Expression>) -> Self {
        Self { value }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Statement>> {
        Ok(Box::new(ReturnStmt::new(regs.decode_expression(data)?)))
    }
}

impl Node for ReturnStmt {
    fn tag(&self) -> &'static str {
        "return"
    }

    fn to_data(&self) -> Json {
        self.value.to_json()
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![self.value.as_ref()]
    }
}

impl Statement for ReturnStmt {
    fn execute(&self, ctx: &mut ExecContext) -> Result<Flow> {
        Ok(Flow::Return(self.value.execute(ctx)?))
    }

    fn write_cpp(&self, ctx: &mut FoldContext) -> Result<Vec<String>> {
        Ok(vec![format!("return {}", self.value.write_cpp(ctx)?)])
    }
}

// ============================================================================
// ternary
// ============================================================================

/// Conditional expression. A statically decided condition collapses to the
/// taken branch; the untaken branch is neither evaluated nor rendered.
pub struct TernaryExpr {
    pub condition: Box<dyn Expression>,
    pub when_true: Box<dyn Expression>,
    pub when_false: Box<dyn Expression>,
}

impl TernaryExpr {
    pub fn new(
        condition: Box<dyn Expression>,
        when_true: Box<dyn Expression>,
        when_false: Box<dyn Expression>,
    ) -> Self {
        Self {
            condition,
            when_true,
            when_false,
        }
    }

    pub fn decode(_tag: &str, data: &Json, regs: &Registries) -> Result<Box<dyn Expression>> {
        let parts = data.as_array().filter(|parts| parts.len() == 3).ok_or_else(|| {
            ManualError::invalid_payload("ternary_operator data must be a 3-element array")
        })?;
        Ok(Box::new(TernaryExpr::new(
            regs.decode_expression(&parts[0])?,
            regs.decode_expression(&parts[1])?,
            regs.decode_expression(&parts[2])?,
        )))
    }
}

impl Node for TernaryExpr {
    fn tag(&self) -> &'static str {
        "ternary_operator"
    }

    fn to_data(&self) -> Json {
        json!([
            self.condition.to_json(),
            self.when_true.to_json(),
            self.when_false.to_json(),
        ])
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![
            self.condition.as_ref(),
            self.when_true.as_ref(),
            self.when_false.as_ref(),
        ]
    }
}

impl Expression for TernaryExpr {
    fn output_type(&self, types: &dyn TypeLookup) -> Result<VarType> {
        let when_true = self.when_true.output_type(types)?;
        let when_false = self.when_false.output_type(types)?;
        when_true.join(&when_false)
    }

    fn execute(&self, ctx: &mut ExecContext) -> Result<Value> {
        if self.condition.execute(ctx)?.as_bool()? {
            self.when_true.execute(ctx)
        } else {
            self.when_false.execute(ctx)
        }
    }

    fn constant_value(&self, ctx: &FoldContext) -> Result<Option<Value>> {
        match self.condition.constant_value(ctx)? {
            Some(value) if value.as_bool()? => self.when_true.constant_value(ctx),
            Some(_) => self.when_false.constant_value(ctx),
            None => Ok(None),
        }
    }

    fn write_cpp(&self, ctx: &FoldContext) -> Result<String> {
        match self.condition.constant_value(ctx)? {
            Some(value) if value.as_bool()? => self.when_true.write_cpp(ctx),
            Some(_) => self.when_false.write_cpp(ctx),
            None => Ok(format!(
                "({} ? {} : {})",
                self.condition.write_cpp(ctx)?,
                self.when_true.write_cpp(ctx)?,
                self.when_false.write_cpp(ctx)?,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::literal::BoolExpr;
    use crate::math::{ArithOp, CompareOp};
    use crate::variables::{AssignStmt, VarDeclStmt};
    use manuscript_core::EvalContext;

    fn boolean(value: bool) -> Box<dyn Expression> {
        Box::new(BoolExpr::new(value))
    }

    fn int(value: i32) -> Box<dyn Expression> {
        Box::new(NumberExpr::int(value))
    }

    #[test]
    fn statically_true_branch_emits_unconditionally() {
        let stmt = IfStmt::simple(boolean(true), vec![Box::new(ReturnStmt::new(int(10)))]);
        let mut ctx = EvalContext::default();
        assert_eq!(stmt.write_cpp(&mut ctx).unwrap(), vec!["return 10"]);
    }

    #[test]
    fn statically_false_branch_falls_to_else() {
        let stmt = IfStmt::new(
            vec![IfBranch::new(
                boolean(false),
                vec![Box::new(ReturnStmt::new(int(1)))],
            )],
            Some(vec![Box::new(ReturnStmt::new(int(2)))]),
        );
        let mut ctx = EvalContext::default();
        assert_eq!(stmt.write_cpp(&mut ctx).unwrap(), vec!["return 2"]);
    }

    #[test]
    fn later_true_branch_becomes_the_else() {
        let unknown = Box::new(VarExpr::new("flag"));
        let stmt = IfStmt::new(
            vec![
                IfBranch::new(unknown, vec![Box::new(ReturnStmt::new(int(1)))]),
                IfBranch::new(boolean(true), vec![Box::new(ReturnStmt::new(int(2)))]),
            ],
            Some(vec![Box::new(ReturnStmt::new(int(3)))]),
        );
        let mut ctx = EvalContext::default();
        ctx.declare("flag", StaticVariable::new(VarType::boolean(), None));
        assert_eq!(
            stmt.write_cpp(&mut ctx).unwrap(),
            vec!["if(flag) {", "return 1", "} else {", "return 2", "}"]
        );
    }

    #[test]
    fn if_executes_first_true_branch() {
        let stmt = IfStmt::new(
            vec![
                IfBranch::new(boolean(false), vec![Box::new(ReturnStmt::new(int(1)))]),
                IfBranch::new(boolean(true), vec![Box::new(ReturnStmt::new(int(2)))]),
            ],
            None,
        );
        let mut ctx = EvalContext::default();
        assert_eq!(
            stmt.execute(&mut ctx).unwrap(),
            Flow::Return(Value::Int(2))
        );
    }

    #[test]
    fn branch_declarations_do_not_escape() {
        let stmt = IfStmt::simple(
            boolean(true),
            vec![Box::new(VarDeclStmt::new("inner", int(1)))],
        );
        let mut ctx = EvalContext::default();
        assert_eq!(stmt.execute(&mut ctx).unwrap(), Flow::Continue);
        assert!(!ctx.contains("inner"));
    }

    #[test]
    fn while_false_emits_nothing() {
        let stmt = WhileStmt::new(boolean(false), vec![Box::new(ReturnStmt::new(int(1)))]);
        let mut ctx = EvalContext::default();
        assert!(stmt.write_cpp(&mut ctx).unwrap().is_empty());
    }

    #[test]
    fn while_sums_by_mutating_outer_binding() {
        // x = 0; while (x < 3) { x = x + 1 }
        let mut ctx = EvalContext::default();
        VarDeclStmt::new("x", int(0)).execute(&mut ctx).unwrap();
        let stmt = WhileStmt::new(
            Box::new(CompareExpr::new(
                CompareOp::Less,
                Box::new(VarExpr::new("x")),
                int(3),
            )),
            vec![Box::new(AssignStmt::new(
                "x",
                Box::new(BinaryExpr::new(
                    ArithOp::Add,
                    Box::new(VarExpr::new("x")),
                    int(1),
                )),
            ))],
        );
        assert_eq!(stmt.execute(&mut ctx).unwrap(), Flow::Continue);
        assert_eq!(ctx.get("x").unwrap().value(), &Value::Int(3));
    }

    #[test]
    fn assignment_in_an_undecided_branch_forgets_the_constant() {
        // x = 0; if (flag) { x = 1 }; a later read must stay symbolic.
        let mut ctx = EvalContext::default();
        VarDeclStmt::new("x", int(0)).write_cpp(&mut ctx).unwrap();
        ctx.declare("flag", StaticVariable::new(VarType::boolean(), None));
        let stmt = IfStmt::simple(
            Box::new(VarExpr::new("flag")),
            vec![Box::new(AssignStmt::new("x", int(1)))],
        );
        assert_eq!(
            stmt.write_cpp(&mut ctx).unwrap(),
            vec!["if(flag) {", "x = 1", "}"]
        );
        assert_eq!(VarExpr::new("x").write_cpp(&ctx).unwrap(), "x");
    }

    #[test]
    fn loop_body_writes_compile_against_unknown_state() {
        // x = 0; while (x < 3) { x = x + 1 }
        let mut ctx = EvalContext::default();
        VarDeclStmt::new("x", int(0)).write_cpp(&mut ctx).unwrap();
        let stmt = WhileStmt::new(
            Box::new(CompareExpr::less(Box::new(VarExpr::new("x")), int(3))),
            vec![Box::new(AssignStmt::new(
                "x",
                Box::new(BinaryExpr::add(Box::new(VarExpr::new("x")), int(1))),
            ))],
        );
        assert_eq!(
            stmt.write_cpp(&mut ctx).unwrap(),
            vec!["while((x < 3)) {", "x = (x + 1)", "}"]
        );
        assert_eq!(VarExpr::new("x").write_cpp(&ctx).unwrap(), "x");
    }

    #[test]
    fn for_compiles_with_unknown_iterator() {
        let stmt = ForStmt::new(
            "i",
            int(0),
            Box::new(CompareExpr::new(
                CompareOp::Less,
                Box::new(VarExpr::new("i")),
                int(4),
            )),
            Box::new(BinaryExpr::new(
                ArithOp::Add,
                Box::new(VarExpr::new("i")),
                int(1),
            )),
            vec![Box::new(ReturnStmt::new(Box::new(VarExpr::new("i"))))],
        );
        let mut ctx = EvalContext::default();
        assert_eq!(
            stmt.write_cpp(&mut ctx).unwrap(),
            vec![
                "for(int i = 0; (i < 4); i = (i + 1)) {",
                "return i",
                "}"
            ]
        );
    }

    #[test]
    fn for_with_false_condition_vanishes() {
        let stmt = ForStmt::new(
            "i",
            int(0),
            boolean(false),
            int(0),
            vec![Box::new(ReturnStmt::new(int(1)))],
        );
        let mut ctx = EvalContext::default();
        assert!(stmt.write_cpp(&mut ctx).unwrap().is_empty());
    }

    #[test]
    fn for_executes_each_iteration_in_a_fresh_scope() {
        // total = 0; for (i = 0; i < 3; i = i + 1) { total = total + i }
        let mut ctx = EvalContext::default();
        VarDeclStmt::new("total", int(0)).execute(&mut ctx).unwrap();
        let stmt = ForStmt::new(
            "i",
            int(0),
            Box::new(CompareExpr::new(
                CompareOp::Less,
                Box::new(VarExpr::new("i")),
                int(3),
            )),
            Box::new(BinaryExpr::new(
                ArithOp::Add,
                Box::new(VarExpr::new("i")),
                int(1),
            )),
            vec![Box::new(AssignStmt::new(
                "total",
                Box::new(BinaryExpr::new(
                    ArithOp::Add,
                    Box::new(VarExpr::new("total")),
                    Box::new(VarExpr::new("i")),
                )),
            ))],
        );
        assert_eq!(stmt.execute(&mut ctx).unwrap(), Flow::Continue);
        assert_eq!(ctx.get("total").unwrap().value(), &Value::Int(3));
        assert!(!ctx.contains("i"));
    }

    #[test]
    fn counted_loop_helper_builds_the_usual_shape() {
        let stmt = ForStmt::count(3, vec![Box::new(ReturnStmt::new(int(9)))]);
        let mut ctx = EvalContext::default();
        assert_eq!(
            stmt.write_cpp(&mut ctx).unwrap(),
            vec!["for(int i = 0; (i < 3); i = (i + 1)) {", "return 9", "}"]
        );
    }

    /// Records whether it was ever evaluated, folded, or rendered.
    struct SpyExpr {
        touched: Rc<Cell<bool>>,
    }

    impl Node for SpyExpr {
        fn tag(&self) -> &'static str {
            "spy"
        }

        fn to_data(&self) -> Json {
            Json::Null
        }
    }

    impl Expression for SpyExpr {
        fn output_type(&self, _types: &dyn TypeLookup) -> Result<VarType> {
            Ok(VarType::int())
        }

        fn execute(&self, _ctx: &mut ExecContext) -> Result<Value> {
            self.touched.set(true);
            Ok(Value::Int(0))
        }

        fn constant_value(&self, _ctx: &FoldContext) -> Result<Option<Value>> {
            self.touched.set(true);
            Ok(Some(Value::Int(0)))
        }

        fn write_cpp(&self, _ctx: &FoldContext) -> Result<String> {
            self.touched.set(true);
            Ok("0".to_string())
        }
    }

    #[test]
    fn ternary_never_touches_the_untaken_branch() {
        let touched = Rc::new(Cell::new(false));
        let expr = TernaryExpr::new(
            boolean(true),
            int(1),
            Box::new(SpyExpr {
                touched: touched.clone(),
            }),
        );
        let mut exec = EvalContext::default();
        assert_eq!(expr.execute(&mut exec).unwrap(), Value::Int(1));
        let fold: FoldContext = EvalContext::default();
        assert_eq!(expr.write_cpp(&fold).unwrap(), "1");
        assert_eq!(expr.constant_value(&fold).unwrap(), Some(Value::Int(1)));
        assert!(!touched.get());
    }

    #[test]
    fn ternary_collapses_on_folded_condition() {
        let expr = TernaryExpr::new(boolean(true), int(1), Box::new(VarExpr::new("missing")));
        let ctx = EvalContext::default();
        assert_eq!(expr.write_cpp(&ctx).unwrap(), "1");
    }

    #[test]
    fn ternary_renders_all_three_when_undecided() {
        let expr = TernaryExpr::new(Box::new(VarExpr::new("flag")), int(1), int(2));
        let mut ctx: FoldContext = EvalContext::default();
        ctx.declare("flag", StaticVariable::new(VarType::boolean(), None));
        assert_eq!(expr.write_cpp(&ctx).unwrap(), "(flag ? 1 : 2)");
    }
}
