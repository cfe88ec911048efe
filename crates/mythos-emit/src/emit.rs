//! The bytecode emitter.
//!
//! Walks the AST and produces one [`CodeObject`] per function, the
//! top-level program included. Identifier resolution happens entirely at
//! compile time through a chain of per-function scopes:
//!
//! - names declared in the current function resolve to local slots;
//! - names found in a lexically enclosing function become upvalues,
//!   recorded as capture descriptors on the inner code object;
//! - everything else compiles to a global load or store by name.
//!
//! Local slots come from parameters, `for` loop variables, `catch`
//! bindings, and nested `function`/`class` declarations. A plain
//! assignment never declares: if the name does not resolve to a local
//! or upvalue, the store targets a global, which is also what makes
//! top-level bindings visible to every function and to later REPL
//! lines.
//!
//! Control-flow lowering notes:
//!
//! - `and`/`or` expand to `DUP` + conditional jump + `POP`, leaving the
//!   deciding value on the stack.
//! - `match` keeps the discriminant on the stack between arms and pops
//!   it on entry to the winning arm (or at the very end).
//! - A `finally` block is emitted up to three times: inline on the
//!   normal path, inline on each early exit (`break`/`continue`/
//!   `return`), and once more as the exceptional-entry copy terminated
//!   by `END_FINALLY`. This keeps the invariant that every exit path
//!   runs each finally exactly once.

use std::rc::Rc;

use mythos_par::ast::*;
use mythos_util::{Handler, Span, Symbol};

use crate::code::{ClassProto, CodeObject, Constant, Inst, Op, UpvalDesc};

/// Compile a parsed program into its top-level code object.
///
/// Errors and warnings go to the handler; `None` means at least one
/// error was reported.
pub fn compile(program: &Program, handler: &Handler) -> Option<Rc<CodeObject>> {
    let mut emitter = Emitter {
        handler,
        stack: Vec::new(),
    };
    emitter.compile_program(program)
}

/// One local variable slot.
///
/// The list is append-only so that slots are never reused within a
/// function: a captured slot must keep its cell identity even after its
/// scope ends.
struct LocalVar {
    name: Symbol,
    depth: u32,
    alive: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LoopKind {
    While,
    /// Keeps its iterator on the operand stack; `break` must pop it.
    For,
}

struct LoopCtx {
    kind: LoopKind,
    continue_target: usize,
    break_jumps: Vec<usize>,
    /// Depth of the try stack at loop entry; early exits unwind down to
    /// this.
    try_depth: usize,
}

/// Per-function compile state.
struct FnCtx {
    code: CodeObject,
    locals: Vec<LocalVar>,
    scope_depth: u32,
    loops: Vec<LoopCtx>,
    /// Active try statements; the payload is the finally block to
    /// re-emit on early exits.
    trys: Vec<Option<Block>>,
    is_method: bool,
}

/// Function body shapes handed to [`Emitter::compile_function`].
enum FnBody<'b> {
    Block(&'b Block),
    Expr(&'b Expr),
}

pub struct Emitter<'a> {
    handler: &'a Handler,
    /// Compiler chain, innermost function last.
    stack: Vec<FnCtx>,
}

impl<'a> Emitter<'a> {
    // =========================================================================
    // TOP LEVEL
    // =========================================================================

    fn compile_program(&mut self, program: &Program) -> Option<Rc<CodeObject>> {
        self.push_fn("<main>", &[], false);

        let mut returned = false;
        for (index, stmt) in program.body.iter().enumerate() {
            // The final expression statement becomes the program result.
            if index == program.body.len() - 1 {
                if let Stmt::Expr(es) = stmt {
                    self.compile_expr(&es.expr)?;
                    self.emit(Op::Return, es.span);
                    returned = true;
                    break;
                }
            }
            self.compile_stmt(stmt)?;
        }
        if !returned {
            let k = self.add_const(Constant::Null);
            self.emit(Op::LoadConst(k), program.span);
            self.emit(Op::Return, program.span);
        }

        let code = self.pop_fn();
        Some(Rc::new(code))
    }

    fn push_fn(&mut self, name: &str, params: &[Symbol], is_method: bool) {
        let mut all_params: Vec<Symbol> = Vec::new();
        if is_method {
            all_params.push(Symbol::intern("this"));
        }
        all_params.extend_from_slice(params);

        let locals: Vec<LocalVar> = all_params
            .iter()
            .map(|p| LocalVar {
                name: *p,
                depth: 0,
                alive: true,
            })
            .collect();

        self.stack.push(FnCtx {
            code: CodeObject {
                name: name.to_string(),
                params: all_params.iter().map(|p| p.to_string()).collect(),
                local_names: all_params.iter().map(|p| p.to_string()).collect(),
                ..CodeObject::default()
            },
            locals,
            scope_depth: 0,
            loops: Vec::new(),
            trys: Vec::new(),
            is_method,
        });
    }

    fn pop_fn(&mut self) -> CodeObject {
        let ctx = self.stack.pop().expect("compiler chain underflow");
        let mut code = ctx.code;
        code.num_locals = ctx.locals.len() as u32;
        code
    }

    /// Compile a nested function and register its prototype in the
    /// enclosing code object. Returns the prototype index.
    fn compile_function(
        &mut self,
        name: &str,
        params: &[Symbol],
        body: FnBody<'_>,
        is_method: bool,
        span: Span,
    ) -> Option<u32> {
        self.push_fn(name, params, is_method);

        match body {
            FnBody::Block(block) => {
                for stmt in &block.body {
                    self.compile_stmt(stmt)?;
                }
                let k = self.add_const(Constant::Null);
                self.emit(Op::LoadConst(k), span);
                self.emit(Op::Return, span);
            }
            FnBody::Expr(expr) => {
                self.compile_expr(expr)?;
                self.emit(Op::Return, span);
            }
        }

        let code = self.pop_fn();
        let parent = self.cur();
        parent.code.protos.push(Rc::new(code));
        Some((parent.code.protos.len() - 1) as u32)
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    fn compile_stmt(&mut self, stmt: &Stmt) -> Option<()> {
        match stmt {
            Stmt::Expr(s) => {
                self.compile_expr(&s.expr)?;
                self.emit(Op::Pop, s.span);
                Some(())
            }
            Stmt::Block(block) => self.compile_block(block),
            Stmt::If(s) => self.compile_if(s),
            Stmt::While(s) => self.compile_while(s),
            Stmt::ForIn(s) => self.compile_for_in(s),
            Stmt::Function(decl) => self.compile_function_decl(decl),
            Stmt::Return(s) => self.compile_return(s),
            Stmt::Break(s) => self.compile_break(s),
            Stmt::Continue(s) => self.compile_continue(s),
            Stmt::Class(decl) => self.compile_class_decl(decl),
            Stmt::Try(s) => self.compile_try(s),
            Stmt::Throw(s) => {
                self.compile_expr(&s.value)?;
                self.emit(Op::Throw, s.span);
                Some(())
            }
            Stmt::Match(s) => self.compile_match(s),
            Stmt::Scene(s) => self.compile_scene(s),
            Stmt::WebApp(s) => self.compile_web_app(s),
            Stmt::Import(s) => {
                self.handler
                    .warning("import is not supported by the core and is ignored", s.span);
                Some(())
            }
            Stmt::Export(s) => {
                self.handler
                    .warning("export is not supported by the core and is ignored", s.span);
                self.compile_stmt(&s.inner)
            }
            Stmt::Const(s) => {
                self.compile_expr(&s.value)?;
                self.compile_store(s.name, s.span);
                Some(())
            }
        }
    }

    fn compile_block(&mut self, block: &Block) -> Option<()> {
        self.begin_scope();
        for stmt in &block.body {
            self.compile_stmt(stmt)?;
        }
        self.end_scope();
        Some(())
    }

    fn compile_if(&mut self, stmt: &IfStmt) -> Option<()> {
        let span = stmt.span;
        let mut end_jumps = Vec::new();

        self.compile_expr(&stmt.cond)?;
        let mut next = self.emit(Op::JumpIfFalse(0), stmt.cond.span());
        self.compile_block(&stmt.then_block)?;

        for (cond, block) in &stmt.elif_branches {
            end_jumps.push(self.emit(Op::Jump(0), span));
            self.patch_jump(next);
            self.compile_expr(cond)?;
            next = self.emit(Op::JumpIfFalse(0), cond.span());
            self.compile_block(block)?;
        }

        if let Some(else_block) = &stmt.else_block {
            end_jumps.push(self.emit(Op::Jump(0), span));
            self.patch_jump(next);
            self.compile_block(else_block)?;
        } else {
            self.patch_jump(next);
        }

        for jump in end_jumps {
            self.patch_jump(jump);
        }
        Some(())
    }

    fn compile_while(&mut self, stmt: &WhileStmt) -> Option<()> {
        let loop_start = self.here();
        self.compile_expr(&stmt.cond)?;
        let exit = self.emit(Op::JumpIfFalse(0), stmt.cond.span());

        let try_depth = self.cur().trys.len();
        self.cur().loops.push(LoopCtx {
            kind: LoopKind::While,
            continue_target: loop_start,
            break_jumps: Vec::new(),
            try_depth,
        });

        self.compile_block(&stmt.body)?;
        self.emit_loop(loop_start, stmt.span);

        self.patch_jump(exit);
        let finished = self.cur().loops.pop().expect("loop stack underflow");
        for jump in finished.break_jumps {
            self.patch_jump(jump);
        }
        Some(())
    }

    fn compile_for_in(&mut self, stmt: &ForInStmt) -> Option<()> {
        self.compile_expr(&stmt.iterable)?;
        self.emit(Op::GetIter, stmt.iterable.span());

        // At top level the loop variable is a global, like any other
        // top-level binding; inside a function it is a scoped local.
        self.begin_scope();
        let slot = if self.in_script() {
            None
        } else {
            Some(self.declare_local(stmt.var))
        };

        let loop_head = self.here();
        let exit = self.emit(Op::ForIter(0), stmt.span);
        match slot {
            Some(slot) => {
                self.emit(Op::StoreLocal(slot), stmt.span);
            }
            None => {
                let name = self.add_name(stmt.var.as_str());
                self.emit(Op::StoreGlobal(name), stmt.span);
            }
        }

        let try_depth = self.cur().trys.len();
        self.cur().loops.push(LoopCtx {
            kind: LoopKind::For,
            continue_target: loop_head,
            break_jumps: Vec::new(),
            try_depth,
        });

        self.compile_block(&stmt.body)?;
        self.emit_loop(loop_head, stmt.span);

        self.patch_jump(exit);
        let finished = self.cur().loops.pop().expect("loop stack underflow");
        for jump in finished.break_jumps {
            self.patch_jump(jump);
        }
        self.end_scope();
        Some(())
    }

    fn compile_function_decl(&mut self, decl: &FunctionDecl) -> Option<()> {
        if decl.is_async {
            self.handler.warning(
                "async has no effect: the core runtime is synchronous",
                decl.span,
            );
        }

        if self.in_script() {
            let proto = self.compile_function(
                decl.name.as_str(),
                &decl.params,
                FnBody::Block(&decl.body),
                false,
                decl.span,
            )?;
            self.emit(Op::MakeFunction(proto), decl.span);
            let name = self.add_name(decl.name.as_str());
            self.emit(Op::StoreGlobal(name), decl.span);
        } else {
            // Declare before compiling the body so the function can
            // capture its own slot for recursion.
            let slot = match self.resolve_local_here(decl.name) {
                Some(slot) => slot,
                None => self.declare_local(decl.name),
            };
            let proto = self.compile_function(
                decl.name.as_str(),
                &decl.params,
                FnBody::Block(&decl.body),
                false,
                decl.span,
            )?;
            self.emit(Op::MakeFunction(proto), decl.span);
            self.emit(Op::StoreLocal(slot), decl.span);
        }
        Some(())
    }

    fn compile_class_decl(&mut self, decl: &ClassDecl) -> Option<()> {
        let mut methods = Vec::new();
        for method in &decl.methods {
            let proto = self.compile_function(
                method.name.as_str(),
                &method.params,
                FnBody::Block(&method.body),
                true,
                method.span,
            )?;
            methods.push((method.name.to_string(), proto));
        }

        match decl.base {
            Some(base) => self.compile_name_load(base, decl.span),
            None => {
                let k = self.add_const(Constant::Null);
                self.emit(Op::LoadConst(k), decl.span);
            }
        }

        let ctx = self.cur();
        ctx.code.classes.push(ClassProto {
            name: decl.name.to_string(),
            methods,
        });
        let class_idx = (ctx.code.classes.len() - 1) as u32;
        self.emit(Op::MakeClass(class_idx), decl.span);

        if self.in_script() {
            let name = self.add_name(decl.name.as_str());
            self.emit(Op::StoreGlobal(name), decl.span);
        } else {
            let slot = match self.resolve_local_here(decl.name) {
                Some(slot) => slot,
                None => self.declare_local(decl.name),
            };
            self.emit(Op::StoreLocal(slot), decl.span);
        }
        Some(())
    }

    fn compile_return(&mut self, stmt: &ReturnStmt) -> Option<()> {
        match &stmt.value {
            Some(value) => self.compile_expr(value)?,
            None => {
                let k = self.add_const(Constant::Null);
                self.emit(Op::LoadConst(k), stmt.span);
            }
        }
        // Run every enclosing finally before leaving the frame.
        self.unwind_trys_to(0, stmt.span)?;
        self.emit(Op::Return, stmt.span);
        Some(())
    }

    fn compile_break(&mut self, stmt: &BreakStmt) -> Option<()> {
        if self.cur().loops.is_empty() {
            self.handler.error("'break' outside of a loop", stmt.span);
            return None;
        }
        let (kind, try_depth) = {
            let top = self.cur().loops.last().expect("loop stack");
            (top.kind, top.try_depth)
        };

        self.unwind_trys_to(try_depth, stmt.span)?;
        if kind == LoopKind::For {
            self.emit(Op::Pop, stmt.span); // the loop iterator
        }
        let jump = self.emit(Op::Jump(0), stmt.span);
        self.cur()
            .loops
            .last_mut()
            .expect("loop vanished while compiling break")
            .break_jumps
            .push(jump);
        Some(())
    }

    fn compile_continue(&mut self, stmt: &ContinueStmt) -> Option<()> {
        if self.cur().loops.is_empty() {
            self.handler
                .error("'continue' outside of a loop", stmt.span);
            return None;
        }
        let (target, try_depth) = {
            let top = self.cur().loops.last().expect("loop stack");
            (top.continue_target, top.try_depth)
        };

        self.unwind_trys_to(try_depth, stmt.span)?;
        self.emit_loop(target, stmt.span);
        Some(())
    }

    /// Emit `POP_TRY` plus the inline finally copy for every try region
    /// deeper than `depth`, innermost first. The compile-time try stack
    /// itself is left untouched: this only covers one early-exit path.
    fn unwind_trys_to(&mut self, depth: usize, span: Span) -> Option<()> {
        let pending: Vec<Option<Block>> = self.cur().trys[depth..].to_vec();
        for finally in pending.iter().rev() {
            self.emit(Op::PopTry, span);
            if let Some(block) = finally {
                self.compile_block(block)?;
            }
        }
        Some(())
    }

    fn compile_try(&mut self, stmt: &TryStmt) -> Option<()> {
        let span = stmt.span;

        let outer_push = self.emit(
            Op::PushTry {
                catch: None,
                finally: None,
            },
            span,
        );
        self.cur().trys.push(stmt.finally.clone());
        self.compile_block(&stmt.body)?;
        self.cur().trys.pop();
        self.emit(Op::PopTry, span);
        if let Some(finally) = &stmt.finally {
            self.compile_block(finally)?;
        }

        let mut end_jumps = vec![self.emit(Op::Jump(0), span)];
        let mut catch_target = None;
        let mut catch_push = None;

        if let Some(catch) = &stmt.catch {
            catch_target = Some(self.here());
            // The VM pushed the raised value; bind it.
            self.begin_scope();
            let slot = self.declare_local(catch.binding);
            self.emit(Op::StoreLocal(slot), catch.span);

            if stmt.finally.is_some() {
                catch_push = Some(self.emit(
                    Op::PushTry {
                        catch: None,
                        finally: None,
                    },
                    span,
                ));
                self.cur().trys.push(stmt.finally.clone());
            }

            for s in &catch.body.body {
                self.compile_stmt(s)?;
            }
            self.end_scope();

            if catch_push.is_some() {
                self.cur().trys.pop();
                self.emit(Op::PopTry, span);
                if let Some(finally) = &stmt.finally {
                    self.compile_block(finally)?;
                }
            }
            end_jumps.push(self.emit(Op::Jump(0), span));
        }

        let mut finally_target = None;
        if let Some(finally) = &stmt.finally {
            // Exceptional-entry copy: the pending error is held by the
            // VM and unwinding resumes at END_FINALLY.
            finally_target = Some(self.here());
            self.compile_block(finally)?;
            self.emit(Op::EndFinally, span);
        }

        for jump in end_jumps {
            self.patch_jump(jump);
        }
        self.patch_push_try(outer_push, catch_target, finally_target);
        if let Some(inner) = catch_push {
            self.patch_push_try(inner, None, finally_target);
        }
        Some(())
    }

    fn compile_match(&mut self, stmt: &MatchStmt) -> Option<()> {
        self.compile_expr(&stmt.subject)?;

        let mut end_jumps = Vec::new();
        for arm in &stmt.arms {
            self.emit(Op::Dup, arm.span);
            self.compile_expr(&arm.value)?;
            self.emit(Op::Eq, arm.span);
            let next = self.emit(Op::JumpIfFalse(0), arm.span);
            self.emit(Op::Pop, arm.span); // discriminant
            self.compile_block(&arm.body)?;
            end_jumps.push(self.emit(Op::Jump(0), arm.span));
            self.patch_jump(next);
        }

        self.emit(Op::Pop, stmt.span); // discriminant on the fall-through path
        if let Some(default) = &stmt.default {
            self.compile_block(default)?;
        }

        for jump in end_jumps {
            self.patch_jump(jump);
        }
        Some(())
    }

    fn compile_scene(&mut self, stmt: &SceneDecl) -> Option<()> {
        let callee = self.add_name("__scene");
        self.emit(Op::LoadGlobal(callee), stmt.span);
        let name = self.add_const(Constant::Str(stmt.name.to_string()));
        self.emit(Op::LoadConst(name), stmt.span);
        let proto = self.compile_function(
            &format!("<scene {}>", stmt.name),
            &[],
            FnBody::Block(&stmt.body),
            false,
            stmt.span,
        )?;
        self.emit(Op::MakeFunction(proto), stmt.span);
        self.emit(Op::Call(2), stmt.span);
        self.emit(Op::Pop, stmt.span);
        Some(())
    }

    fn compile_web_app(&mut self, stmt: &WebAppDecl) -> Option<()> {
        for route in &stmt.routes {
            let callee = self.add_name("__route");
            self.emit(Op::LoadGlobal(callee), route.span);
            let path = self.add_const(Constant::Str(route.path.to_string()));
            self.emit(Op::LoadConst(path), route.span);
            let proto = self.compile_function(
                &format!("<route {}>", route.path),
                &[],
                FnBody::Block(&route.body),
                false,
                route.span,
            )?;
            self.emit(Op::MakeFunction(proto), route.span);
            self.emit(Op::Call(2), route.span);
            self.emit(Op::Pop, route.span);
        }
        Some(())
    }

    // =========================================================================
    // EXPRESSIONS
    // =========================================================================

    fn compile_expr(&mut self, expr: &Expr) -> Option<()> {
        match expr {
            Expr::Number(lit) => {
                let k = self.add_const(Constant::Number(lit.value));
                self.emit(Op::LoadConst(k), lit.span);
                Some(())
            }
            Expr::Str(lit) => {
                let k = self.add_const(Constant::Str(lit.value.to_string()));
                self.emit(Op::LoadConst(k), lit.span);
                Some(())
            }
            Expr::Bool(lit) => {
                let k = self.add_const(Constant::Bool(lit.value));
                self.emit(Op::LoadConst(k), lit.span);
                Some(())
            }
            Expr::Null(lit) => {
                let k = self.add_const(Constant::Null);
                self.emit(Op::LoadConst(k), lit.span);
                Some(())
            }
            Expr::Ident(ident) => {
                self.compile_name_load(ident.name, ident.span);
                Some(())
            }
            Expr::This(this) => self.compile_this(this.span),
            Expr::Unary(unary) => {
                self.compile_expr(&unary.operand)?;
                let op = match unary.op {
                    UnOp::Neg => Op::Neg,
                    UnOp::Not => Op::Not,
                };
                self.emit(op, unary.span);
                Some(())
            }
            Expr::Binary(binary) => {
                self.compile_expr(&binary.lhs)?;
                self.compile_expr(&binary.rhs)?;
                self.emit(binop_code(binary.op), binary.span);
                Some(())
            }
            Expr::Logical(logical) => self.compile_logical(logical),
            Expr::Assign(assign) => self.compile_assign(assign),
            Expr::Array(array) => {
                for element in &array.elements {
                    self.compile_expr(element)?;
                }
                self.emit(Op::MakeArray(array.elements.len() as u32), array.span);
                Some(())
            }
            Expr::Object(object) => {
                for (key, value) in &object.entries {
                    let k = self.add_const(Constant::Str(key.to_string()));
                    self.emit(Op::LoadConst(k), object.span);
                    self.compile_expr(value)?;
                }
                self.emit(Op::MakeObject(object.entries.len() as u32), object.span);
                Some(())
            }
            Expr::Member(member) => {
                self.compile_expr(&member.object)?;
                let name = self.add_name(member.name.as_str());
                self.emit(Op::GetMember(name), member.span);
                Some(())
            }
            Expr::Index(index) => {
                self.compile_expr(&index.object)?;
                self.compile_expr(&index.index)?;
                self.emit(Op::GetIndex, index.span);
                Some(())
            }
            Expr::Call(call) => {
                self.compile_expr(&call.callee)?;
                let argc = self.check_argc(call.args.len(), call.span)?;
                for arg in &call.args {
                    self.compile_expr(arg)?;
                }
                self.emit(Op::Call(argc), call.span);
                Some(())
            }
            Expr::MethodCall(call) => {
                self.compile_expr(&call.recv)?;
                let argc = self.check_argc(call.args.len(), call.span)?;
                for arg in &call.args {
                    self.compile_expr(arg)?;
                }
                let name = self.add_name(call.method.as_str());
                self.emit(Op::CallMethod { name, argc }, call.span);
                Some(())
            }
            Expr::SuperCall(call) => {
                if !self.cur().is_method {
                    self.handler
                        .error("'super' outside of a method", call.span);
                    return None;
                }
                let name = self.add_name(call.method.as_str());
                self.emit(Op::LoadSuper(name), call.span);
                self.emit(Op::LoadThis, call.span);
                let argc = self.check_argc(call.args.len() + 1, call.span)?;
                for arg in &call.args {
                    self.compile_expr(arg)?;
                }
                self.emit(Op::Call(argc), call.span);
                Some(())
            }
            Expr::Lambda(lambda) => {
                let proto = match &lambda.body {
                    LambdaBody::Block(block) => self.compile_function(
                        "<lambda>",
                        &lambda.params,
                        FnBody::Block(block),
                        false,
                        lambda.span,
                    )?,
                    LambdaBody::Expr(expr) => self.compile_function(
                        "<lambda>",
                        &lambda.params,
                        FnBody::Expr(expr),
                        false,
                        lambda.span,
                    )?,
                };
                self.emit(Op::MakeFunction(proto), lambda.span);
                Some(())
            }
            Expr::New(new) => {
                self.compile_expr(&new.class)?;
                let argc = self.check_argc(new.args.len(), new.span)?;
                for arg in &new.args {
                    self.compile_expr(arg)?;
                }
                self.emit(Op::New(argc), new.span);
                Some(())
            }
            Expr::Await(awaited) => {
                self.handler.warning(
                    "await has no effect: the core runtime is synchronous",
                    awaited.span,
                );
                self.compile_expr(&awaited.value)
            }
        }
    }

    fn compile_logical(&mut self, logical: &LogicalExpr) -> Option<()> {
        self.compile_expr(&logical.lhs)?;
        self.emit(Op::Dup, logical.span);
        let short = match logical.op {
            LogicalOp::And => self.emit(Op::JumpIfFalse(0), logical.span),
            LogicalOp::Or => self.emit(Op::JumpIfTrue(0), logical.span),
        };
        self.emit(Op::Pop, logical.span);
        self.compile_expr(&logical.rhs)?;
        self.patch_jump(short);
        Some(())
    }

    /// Assignment leaves the assigned value on the stack (assignments
    /// are expressions; expression statements pop it).
    fn compile_assign(&mut self, assign: &AssignExpr) -> Option<()> {
        let span = assign.span;
        match (&*assign.target, assign.op) {
            (Expr::Ident(ident), None) => {
                self.compile_expr(&assign.value)?;
                self.emit(Op::Dup, span);
                self.compile_store(ident.name, span);
            }
            (Expr::Ident(ident), Some(op)) => {
                self.compile_name_load(ident.name, ident.span);
                self.compile_expr(&assign.value)?;
                self.emit(binop_code(op), span);
                self.emit(Op::Dup, span);
                self.compile_store(ident.name, span);
            }
            (Expr::Member(member), None) => {
                self.compile_expr(&member.object)?;
                self.compile_expr(&assign.value)?;
                let name = self.add_name(member.name.as_str());
                self.emit(Op::SetMember(name), span);
            }
            (Expr::Member(member), Some(op)) => {
                self.compile_expr(&member.object)?;
                self.emit(Op::Dup, span);
                let name = self.add_name(member.name.as_str());
                self.emit(Op::GetMember(name), member.span);
                self.compile_expr(&assign.value)?;
                self.emit(binop_code(op), span);
                self.emit(Op::SetMember(name), span);
            }
            (Expr::Index(index), None) => {
                self.compile_expr(&index.object)?;
                self.compile_expr(&index.index)?;
                self.compile_expr(&assign.value)?;
                self.emit(Op::SetIndex, span);
            }
            (Expr::Index(index), Some(op)) => {
                self.compile_expr(&index.object)?;
                self.compile_expr(&index.index)?;
                self.emit(Op::Dup2, span);
                self.emit(Op::GetIndex, index.span);
                self.compile_expr(&assign.value)?;
                self.emit(binop_code(op), span);
                self.emit(Op::SetIndex, span);
            }
            _ => unreachable!("parser rejects other assignment targets"),
        }
        Some(())
    }

    fn compile_this(&mut self, span: Span) -> Option<()> {
        let this = Symbol::intern("this");
        if self.resolve_local_here(this).is_some() {
            // slot 0 of the current method frame
            self.emit(Op::LoadThis, span);
            return Some(());
        }
        let top = self.stack.len() - 1;
        if let Some(upval) = self.resolve_upvalue(top, this) {
            self.emit(Op::LoadUpval(upval), span);
            return Some(());
        }
        self.handler.error("'this' outside of a method", span);
        None
    }

    // =========================================================================
    // NAME RESOLUTION
    // =========================================================================

    fn compile_name_load(&mut self, name: Symbol, span: Span) {
        if let Some(slot) = self.resolve_local_here(name) {
            self.emit(Op::LoadLocal(slot), span);
            return;
        }
        let top = self.stack.len() - 1;
        if let Some(upval) = self.resolve_upvalue(top, name) {
            self.emit(Op::LoadUpval(upval), span);
            return;
        }
        let n = self.add_name(name.as_str());
        self.emit(Op::LoadGlobal(n), span);
    }

    fn compile_store(&mut self, name: Symbol, span: Span) {
        if let Some(slot) = self.resolve_local_here(name) {
            self.emit(Op::StoreLocal(slot), span);
            return;
        }
        let top = self.stack.len() - 1;
        if let Some(upval) = self.resolve_upvalue(top, name) {
            self.emit(Op::StoreUpval(upval), span);
            return;
        }
        // Not a local or a captured variable anywhere up the chain:
        // the store targets a global, mirroring global loads. Locals
        // only come from parameters, loop variables, catch bindings,
        // and nested declarations.
        let n = self.add_name(name.as_str());
        self.emit(Op::StoreGlobal(n), span);
    }

    /// True while compiling the top-level program itself.
    fn in_script(&self) -> bool {
        self.stack.len() == 1
    }

    fn resolve_local_here(&self, name: Symbol) -> Option<u32> {
        resolve_local(self.stack.last().expect("empty compiler chain"), name)
    }

    fn resolve_upvalue(&mut self, fi: usize, name: Symbol) -> Option<u32> {
        if fi == 0 {
            return None;
        }
        if let Some(slot) = resolve_local(&self.stack[fi - 1], name) {
            return Some(self.add_upvalue(
                fi,
                UpvalDesc {
                    is_local: true,
                    index: slot,
                },
            ));
        }
        if let Some(upval) = self.resolve_upvalue(fi - 1, name) {
            return Some(self.add_upvalue(
                fi,
                UpvalDesc {
                    is_local: false,
                    index: upval,
                },
            ));
        }
        None
    }

    fn add_upvalue(&mut self, fi: usize, desc: UpvalDesc) -> u32 {
        let code = &mut self.stack[fi].code;
        if let Some(existing) = code.upvals.iter().position(|d| *d == desc) {
            return existing as u32;
        }
        code.upvals.push(desc);
        (code.upvals.len() - 1) as u32
    }

    fn declare_local(&mut self, name: Symbol) -> u32 {
        let ctx = self.cur();
        let depth = ctx.scope_depth;
        ctx.locals.push(LocalVar {
            name,
            depth,
            alive: true,
        });
        ctx.code.local_names.push(name.to_string());
        (ctx.locals.len() - 1) as u32
    }

    fn begin_scope(&mut self) {
        self.cur().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        let ctx = self.cur();
        let depth = ctx.scope_depth;
        for local in ctx.locals.iter_mut() {
            if local.alive && local.depth == depth {
                local.alive = false;
            }
        }
        ctx.scope_depth -= 1;
    }

    // =========================================================================
    // LOW-LEVEL EMISSION
    // =========================================================================

    fn cur(&mut self) -> &mut FnCtx {
        self.stack.last_mut().expect("empty compiler chain")
    }

    fn here(&mut self) -> usize {
        self.cur().code.instructions.len()
    }

    fn emit(&mut self, op: Op, span: Span) -> usize {
        let code = &mut self.cur().code;
        code.instructions.push(Inst { op, span });
        code.instructions.len() - 1
    }

    /// Patch a forward jump at `at` to land on the next instruction.
    fn patch_jump(&mut self, at: usize) {
        let target = self.here();
        let offset = (target - (at + 1)) as i32;
        match &mut self.cur().code.instructions[at].op {
            Op::Jump(slot) | Op::JumpIfFalse(slot) | Op::JumpIfTrue(slot) | Op::ForIter(slot) => {
                *slot = offset;
            }
            other => unreachable!("patching non-jump {:?}", other),
        }
    }

    fn patch_push_try(&mut self, at: usize, catch_to: Option<usize>, finally_to: Option<usize>) {
        let relative =
            |target: Option<usize>| target.map(|t| (t as i64 - (at as i64 + 1)) as i32);
        let (catch, finally) = (relative(catch_to), relative(finally_to));
        match &mut self.cur().code.instructions[at].op {
            Op::PushTry {
                catch: catch_slot,
                finally: finally_slot,
            } => {
                *catch_slot = catch;
                *finally_slot = finally;
            }
            other => unreachable!("patching non-PUSH_TRY {:?}", other),
        }
    }

    /// Emit an unconditional backward jump to `target`.
    fn emit_loop(&mut self, target: usize, span: Span) {
        let offset = target as i64 - (self.here() as i64 + 1);
        self.emit(Op::Jump(offset as i32), span);
    }

    fn add_const(&mut self, constant: Constant) -> u32 {
        let code = &mut self.cur().code;
        if let Some(existing) = code.consts.iter().position(|c| *c == constant) {
            return existing as u32;
        }
        code.consts.push(constant);
        (code.consts.len() - 1) as u32
    }

    fn add_name(&mut self, name: &str) -> u32 {
        let code = &mut self.cur().code;
        if let Some(existing) = code.names.iter().position(|n| n == name) {
            return existing as u32;
        }
        code.names.push(name.to_string());
        (code.names.len() - 1) as u32
    }

    fn check_argc(&mut self, count: usize, span: Span) -> Option<u8> {
        if count > u8::MAX as usize {
            self.handler
                .error("too many arguments (the limit is 255)", span);
            return None;
        }
        Some(count as u8)
    }
}

fn resolve_local(ctx: &FnCtx, name: Symbol) -> Option<u32> {
    ctx.locals
        .iter()
        .enumerate()
        .rev()
        .find(|(_, local)| local.alive && local.name == name)
        .map(|(index, _)| index as u32)
}

fn binop_code(op: BinOp) -> Op {
    match op {
        BinOp::Add => Op::Add,
        BinOp::Sub => Op::Sub,
        BinOp::Mul => Op::Mul,
        BinOp::Div => Op::Div,
        BinOp::Mod => Op::Mod,
        BinOp::Pow => Op::Pow,
        BinOp::Eq => Op::Eq,
        BinOp::NotEq => Op::Ne,
        BinOp::Lt => Op::Lt,
        BinOp::Gt => Op::Gt,
        BinOp::LtEq => Op::Le,
        BinOp::GtEq => Op::Ge,
    }
}
