//! The statement walker: drives scope management, declaration handling,
//! the function header binder, and contract emission for every statement
//! form, delegating sub-expressions to the expression walker and type
//! expressions to the type resolver.

use gosift_ast::{
    AssignTok, CaseClause, CommClause, ExprId, ExprKind, FuncDecl, GenDecl, Ident, Spec, StmtId,
    StmtKind, TypeCaseClause, TypeExprKind, UnaryOp,
};
use gosift_contracts::{Contract, TypeVar};
use gosift_symbols::{SymbolDef, SymbolError};
use gosift_types::DataType;
use smol_str::SmolStr;
use tracing::debug;

use crate::{error::ExtractError, EnclosingFunc, Extractor};

/// Where the slots of an uneven assignment come from.
enum RhsSource {
    /// One right-hand expression per left-hand position.
    General,
    /// A single call providing its results positionally; a foreign call
    /// contributes one extra synthesised error slot.
    Call { attr: crate::Attr, is_cgo: bool },
    /// `v, ok := m[key]`
    Index { expr: ExprId },
    /// `v, ok := x.(T)`
    Assert { x_tv: TypeVar, ty: DataType },
}

impl<'a> Extractor<'a> {
    // ── Function declarations ─────────────────────────────────────

    /// Parse a function or method signature into its symbol payload.
    /// The body is handled separately by [`Extractor::parse_func_body`].
    pub fn parse_func_decl(&mut self, decl: &FuncDecl) -> Result<DataType, ExtractError> {
        debug!(name = %decl.name.name, "processing function declaration");
        let func_def = self.parse_type(decl.sig)?;
        if decl.recv.is_empty() {
            return Ok(func_def);
        }
        self.check_receiver_shape(decl)?;
        let receiver = self.parse_receiver(decl.recv[0].type_expr, false)?;
        Ok(DataType::Method {
            receiver: Box::new(receiver),
            signature: Box::new(func_def),
        })
    }

    /// Walk a function body: a header scope for receiver, parameters and
    /// results, a body scope for the block, both released on every exit
    /// path. The outer file-level table is left untouched.
    pub fn parse_func_body(&mut self, decl: &FuncDecl) -> Result<(), ExtractError> {
        debug!(name = %decl.name.name, "processing function body");
        let results = match self.parse_type(decl.sig)? {
            DataType::Function { results, .. } => results,
            _ => Vec::new(),
        };

        self.stack.push();
        if let Err(err) = self.bind_func_header(decl) {
            self.stack.pop();
            return Err(err);
        }
        self.stack.push();

        let enclosing = EnclosingFunc {
            type_var: TypeVar::Variable {
                package: self.package.clone(),
                name: decl.name.name.clone(),
                pos: self.pos(decl.name.span),
            },
            results,
        };
        let saved = self.current_func.replace(enclosing);
        let result = match &decl.body {
            Some(stmts) => stmts.iter().try_for_each(|s| self.parse_stmt(*s)),
            // declaration without a body (foreign definition)
            None => Ok(()),
        };
        self.current_func = saved;

        self.stack.pop();
        self.stack.pop();
        result
    }

    fn check_receiver_shape(&self, decl: &FuncDecl) -> Result<(), ExtractError> {
        if decl.recv.len() != 1 {
            return Err(ExtractError::MalformedConstruct(format!(
                "method `{}` does not have a single receiver",
                decl.name.name
            )));
        }
        if decl.recv[0].names.len() > 2 {
            return Err(ExtractError::MalformedConstruct(
                "receiver is not a single parameter".into(),
            ));
        }
        Ok(())
    }

    /// Receiver types must be `T` or `*T` with T an in-scope type name.
    /// Called with `skip_allocated` when the signature has already been
    /// recorded and the use must not be double-counted.
    fn parse_receiver(
        &mut self,
        type_expr: gosift_ast::TypeExprId,
        skip_allocated: bool,
    ) -> Result<DataType, ExtractError> {
        let file = self.file;
        let stripped = file.strip_type_parens(type_expr);
        let span = file.type_exprs[stripped].span;
        match &file.type_exprs[stripped].kind {
            TypeExprKind::Ident(name) => {
                let name = name.clone();
                let Some(sym) = self.stack.lookup_data_type(&name) else {
                    return Err(ExtractError::UnresolvedSymbol(name));
                };
                let sym_package = sym.package.clone();
                if !skip_allocated {
                    let pos = self.pos(span);
                    self.allocated.add_data_type(sym_package, name.clone(), pos);
                }
                Ok(DataType::identifier(name, self.package.clone()))
            }
            TypeExprKind::Pointer(inner) => {
                let inner = file.strip_type_parens(*inner);
                let TypeExprKind::Ident(name) = &file.type_exprs[inner].kind else {
                    return Err(ExtractError::MalformedConstruct(
                        "receiver is not a pointer to an identifier".into(),
                    ));
                };
                let name = name.clone();
                let Some(sym) = self.stack.lookup_data_type(&name) else {
                    return Err(ExtractError::UnresolvedSymbol(name));
                };
                let sym_package = sym.package.clone();
                if !skip_allocated {
                    let pos = self.pos(file.type_exprs[inner].span);
                    self.allocated.add_data_type(sym_package, name.clone(), pos);
                }
                Ok(DataType::pointer(DataType::identifier(
                    name,
                    self.package.clone(),
                )))
            }
            _ => Err(ExtractError::MalformedConstruct(
                "receiver is not an identifier or a pointer to an identifier".into(),
            )),
        }
    }

    /// Bind receiver, parameters and results into the header scope. The
    /// allocation table is locked around the binding so a header's
    /// allocations are observed as one batch.
    fn bind_func_header(&mut self, decl: &FuncDecl) -> Result<(), ExtractError> {
        self.allocated.lock();
        let result = self.bind_func_header_inner(decl);
        self.allocated.unlock();
        result
    }

    fn bind_func_header_inner(&mut self, decl: &FuncDecl) -> Result<(), ExtractError> {
        if !decl.recv.is_empty() {
            self.check_receiver_shape(decl)?;
            let def = self.parse_receiver(decl.recv[0].type_expr, true)?;
            if let Some(name) = decl.recv[0].names.first() {
                if !name.is_blank() {
                    let sym = SymbolDef::new(
                        name.name.clone(),
                        "",
                        Some(def.clone()),
                        self.pos(name.span),
                    );
                    self.contracts.add_contract(Contract::PropagatesTo {
                        x: TypeVar::constant(self.package.clone(), def.clone()),
                        y: TypeVar::from_symbol(&sym),
                        expected: Some(def),
                    });
                    self.stack.add_variable(sym)?;
                }
            }
        }
        self.bind_signature(decl.sig)
    }

    /// Declare all parameter and result names of a signature. Every
    /// field is type-parsed first and the entries are inserted only at
    /// the end, so a parameter name cannot shadow a package qualifier
    /// used further right in the signature.
    pub(crate) fn bind_signature(
        &mut self,
        sig: gosift_ast::TypeExprId,
    ) -> Result<(), ExtractError> {
        let file = self.file;
        let stripped = file.strip_type_parens(sig);
        let TypeExprKind::Func { params, results } = &file.type_exprs[stripped].kind else {
            return Err(ExtractError::MalformedConstruct(
                "expected a function signature".into(),
            ));
        };

        let mut symbols = Vec::new();
        for field in params.iter().chain(results.iter()) {
            let def = self.parse_type(field.type_expr)?;
            for name in &field.names {
                if name.is_blank() {
                    continue;
                }
                let sym = SymbolDef::new(
                    name.name.clone(),
                    "",
                    Some(def.clone()),
                    self.pos(name.span),
                );
                self.contracts.add_contract(Contract::PropagatesTo {
                    x: TypeVar::constant(self.package.clone(), def.clone()),
                    y: TypeVar::from_symbol(&sym),
                    expected: Some(def.clone()),
                });
                symbols.push(sym);
            }
        }
        for sym in symbols {
            self.stack.add_variable(sym)?;
        }
        Ok(())
    }

    // ── Declarations ──────────────────────────────────────────────

    /// One grouped declaration; `last_const_type` is scoped to the
    /// group.
    pub fn parse_decl(&mut self, decl: &GenDecl) -> Result<(), ExtractError> {
        self.last_const_type = None;
        for spec in &decl.specs {
            match spec {
                Spec::Value(spec) => {
                    let defs = self.parse_value_spec(spec)?;
                    for def in defs {
                        // a replayed group may legally re-insert
                        if let Err(err) = self.stack.add_variable(def) {
                            if !matches!(err, SymbolError::AlreadyDefined { .. }) {
                                return Err(err.into());
                            }
                        }
                    }
                }
                Spec::Type(spec) => self.parse_type_spec(spec)?,
            }
        }
        Ok(())
    }

    /// A type spec is inserted in two phases so the name is visible to
    /// its own definition; the second insertion completes the
    /// placeholder.
    pub fn parse_type_spec(
        &mut self,
        spec: &gosift_ast::TypeSpec,
    ) -> Result<(), ExtractError> {
        debug!(name = %spec.name.name, "processing type spec");
        self.stack.add_data_type(SymbolDef::new(
            spec.name.name.clone(),
            self.package.clone(),
            None,
            self.pos(spec.name.span),
        ))?;
        let def = self.parse_type(spec.type_expr)?;
        self.stack.add_data_type(SymbolDef::new(
            spec.name.name.clone(),
            self.package.clone(),
            Some(def),
            self.pos(spec.name.span),
        ))?;
        Ok(())
    }

    /// Value specs declare N names against V value expressions with an
    /// optional explicit type; see the returned symbols into the scope
    /// yourself (file-level and statement-level insertion differ).
    pub fn parse_value_spec(
        &mut self,
        spec: &gosift_ast::ValueSpec,
    ) -> Result<Vec<SymbolDef>, ExtractError> {
        debug!(names = ?spec.names.iter().map(|n| n.name.as_str()).collect::<Vec<_>>(),
               "processing value spec");
        let n_len = spec.names.len();
        let v_len = spec.values.len();

        let type_def = match spec.type_ann {
            Some(ty) => Some(self.parse_type(ty)?),
            None => None,
        };

        let mut symbols = Vec::new();

        if v_len == 1 {
            let value_attr = self.parse_expr(spec.values[0])?;
            let first_is_iota = value_attr
                .data_types
                .first()
                .map(|dt| dt.is_iota())
                .unwrap_or(false);
            if !first_is_iota {
                // single RHS providing all positions (tuple form)
                if n_len != value_attr.len() {
                    return Err(ExtractError::ArityMismatch {
                        lhs: n_len,
                        rhs: value_attr.len(),
                    });
                }
                for (i, name) in spec.names.iter().enumerate() {
                    if name.is_blank() {
                        continue;
                    }
                    let sym = match &type_def {
                        None => {
                            let sym =
                                self.make_symbol(name, value_attr.data_types[i].clone());
                            self.contracts.add_contract(Contract::PropagatesTo {
                                x: value_attr.type_vars[i].clone(),
                                y: TypeVar::from_symbol(&sym),
                                expected: sym.def.clone(),
                            });
                            sym
                        }
                        Some(ty) => {
                            let sym = self.make_symbol(name, ty.clone());
                            self.contracts.add_contract(Contract::IsCompatibleWith {
                                x: value_attr.type_vars[i].clone(),
                                y: TypeVar::from_symbol(&sym),
                                expected: sym.def.clone(),
                                weak: false,
                            });
                            sym
                        }
                    };
                    symbols.push(sym);
                }
                return Ok(symbols);
            }
            // iota on the right: handled element-wise below
        }

        if n_len < v_len {
            return Err(ExtractError::ArityMismatch {
                lhs: n_len,
                rhs: v_len,
            });
        }

        for i in 0..v_len {
            let value_attr = self.parse_expr(spec.values[i])?;
            let (value_dt, value_tv) = value_attr.expect_single()?;
            let value_dt = value_dt.clone();
            let value_tv = value_tv.clone();
            if spec.names[i].is_blank() {
                continue;
            }
            match &type_def {
                Some(ty) => {
                    let sym = self.make_symbol(&spec.names[i], ty.clone());
                    self.contracts.add_contract(Contract::IsCompatibleWith {
                        x: value_tv,
                        y: TypeVar::from_symbol(&sym),
                        expected: sym.def.clone(),
                        weak: false,
                    });
                    if value_dt.is_iota() {
                        self.last_const_type = Some(ty.clone());
                    }
                    symbols.push(sym);
                }
                None => {
                    let def = match value_dt {
                        // an unqualified iota constant defaults to int
                        DataType::Builtin { def, .. } if def == "iota" => {
                            DataType::untyped("int")
                        }
                        other => other,
                    };
                    if matches!(def, DataType::Builtin { .. }) {
                        self.last_const_type = Some(def.clone());
                    }
                    let sym = self.make_symbol(&spec.names[i], def);
                    self.contracts.add_contract(Contract::PropagatesTo {
                        x: value_tv,
                        y: TypeVar::from_symbol(&sym),
                        expected: sym.def.clone(),
                    });
                    symbols.push(sym);
                }
            }
        }

        // trailing names inherit the established constant type and emit
        // no contracts of their own
        for i in v_len..n_len {
            let def = match type_def.clone().or_else(|| self.last_const_type.clone()) {
                Some(def) => def,
                None => return Err(ExtractError::MissingConstType { index: i + 1 }),
            };
            if spec.names[i].is_blank() {
                continue;
            }
            symbols.push(self.make_symbol(&spec.names[i], def));
        }

        Ok(symbols)
    }

    // ── Statement dispatch ────────────────────────────────────────

    pub fn parse_stmt(&mut self, id: StmtId) -> Result<(), ExtractError> {
        let file = self.file;
        match &file.stmts[id].kind {
            StmtKind::Decl(decl) => self.parse_decl(decl),
            StmtKind::Labeled { stmt, .. } => self.parse_stmt(*stmt),
            StmtKind::Expr(expr) => {
                self.parse_expr(*expr)?;
                Ok(())
            }
            StmtKind::Send { chan, value } => self.parse_send(*chan, *value),
            StmtKind::IncDec { x, .. } => {
                let attr = self.parse_expr(*x)?;
                let (_, tv) = attr.expect_single()?;
                self.contracts
                    .add_contract(Contract::IsIncDecable { x: tv.clone() });
                Ok(())
            }
            StmtKind::Assign { lhs, rhs, tok } => self.parse_assign(lhs, rhs, *tok),
            StmtKind::Go(call) | StmtKind::Defer(call) => {
                // spawning or deferring does not alter typing
                self.parse_expr(*call)?;
                Ok(())
            }
            StmtKind::Return { results } => self.parse_return(results),
            StmtKind::Branch { .. } => Ok(()),
            StmtKind::Block(stmts) => self.parse_block(stmts),
            StmtKind::If {
                init,
                cond,
                body,
                else_stmt,
            } => self.parse_if(*init, *cond, body, *else_stmt),
            StmtKind::Switch { init, tag, cases } => self.parse_switch(*init, *tag, cases),
            StmtKind::TypeSwitch { init, guard, cases } => {
                self.parse_type_switch(*init, *guard, cases)
            }
            StmtKind::Select { clauses } => self.parse_select(clauses),
            StmtKind::For {
                init,
                cond,
                post,
                body,
            } => self.parse_for(*init, *cond, *post, body),
            StmtKind::Range {
                key,
                value,
                tok,
                x,
                body,
            } => self.parse_range(*key, *value, *tok, *x, body),
            StmtKind::Empty => Ok(()),
        }
    }

    pub(crate) fn parse_block(&mut self, stmts: &'a [StmtId]) -> Result<(), ExtractError> {
        self.scoped(|sp| stmts.iter().try_for_each(|s| sp.parse_stmt(*s)))
    }

    fn parse_send(&mut self, chan: ExprId, value: ExprId) -> Result<(), ExtractError> {
        let chan_attr = self.parse_expr(chan)?;
        let (_, chan_tv) = chan_attr.expect_single()?;
        let chan_tv = chan_tv.clone();
        let value_attr = self.parse_expr(value)?;
        let (_, value_tv) = value_attr.expect_single()?;
        self.contracts.add_contract(Contract::IsSendableTo {
            x: value_tv.clone(),
            y: chan_tv,
        });
        Ok(())
    }

    fn parse_return(&mut self, results: &'a [ExprId]) -> Result<(), ExtractError> {
        let Some(enclosing) = self.current_func.clone() else {
            for result in results {
                self.parse_expr(*result)?;
            }
            return Ok(());
        };
        if results.is_empty() {
            // a bare return is always position-complete
            return Ok(());
        }
        let mut index = 0;
        for result in results {
            let attr = self.parse_expr(*result)?;
            for tv in &attr.type_vars {
                if index >= enclosing.results.len() {
                    return Err(ExtractError::ArityMismatch {
                        lhs: enclosing.results.len(),
                        rhs: index + 1,
                    });
                }
                self.contracts.add_contract(Contract::IsCompatibleWith {
                    x: tv.clone(),
                    y: TypeVar::return_type(enclosing.type_var.clone(), index),
                    expected: Some(enclosing.results[index].clone()),
                    weak: false,
                });
                index += 1;
            }
        }
        if index != enclosing.results.len() {
            return Err(ExtractError::ArityMismatch {
                lhs: enclosing.results.len(),
                rhs: index,
            });
        }
        Ok(())
    }

    // ── Assignment ────────────────────────────────────────────────

    fn parse_assign(
        &mut self,
        lhs: &'a [ExprId],
        rhs: &'a [ExprId],
        tok: AssignTok,
    ) -> Result<(), ExtractError> {
        let file = self.file;
        let exprs_size = lhs.len();
        let r_expr_size = rhs.len();

        let source = if exprs_size == r_expr_size {
            RhsSource::General
        } else {
            if r_expr_size != 1 {
                return Err(ExtractError::ArityMismatch {
                    lhs: exprs_size,
                    rhs: r_expr_size,
                });
            }
            let r0 = file.strip_parens(rhs[0]);
            match &file.exprs[r0].kind {
                ExprKind::Call { fun, .. } => {
                    let fun_id = file.strip_parens(*fun);
                    let is_cgo = match &file.exprs[fun_id].kind {
                        ExprKind::Selector { x, .. } => {
                            let base = file.strip_parens(*x);
                            matches!(&file.exprs[base].kind, ExprKind::Ident(n) if n == "C")
                        }
                        _ => false,
                    };
                    let attr = self.parse_expr(r0)?;
                    let provided = attr.len();
                    if exprs_size != provided && !(is_cgo && exprs_size == provided + 1) {
                        return Err(ExtractError::ArityMismatch {
                            lhs: exprs_size,
                            rhs: provided,
                        });
                    }
                    RhsSource::Call { attr, is_cgo }
                }
                ExprKind::Index { .. } => {
                    if exprs_size != 2 {
                        return Err(ExtractError::ArityMismatch {
                            lhs: exprs_size,
                            rhs: 2,
                        });
                    }
                    RhsSource::Index { expr: r0 }
                }
                ExprKind::TypeAssert { x, type_expr } => {
                    if exprs_size != 2 {
                        return Err(ExtractError::ArityMismatch {
                            lhs: exprs_size,
                            rhs: 2,
                        });
                    }
                    let Some(type_expr) = *type_expr else {
                        return Err(ExtractError::MalformedConstruct(
                            "type-switch guard outside a type switch".into(),
                        ));
                    };
                    let x_attr = self.parse_expr(*x)?;
                    let (_, x_tv) = x_attr.expect_single()?;
                    let x_tv = x_tv.clone();
                    let ty = self.parse_type(type_expr)?;
                    RhsSource::Assert { x_tv, ty }
                }
                _ => {
                    return Err(ExtractError::ShapeMismatch(
                        "expected a call, index or type assertion on the right-hand side"
                            .into(),
                    ))
                }
            }
        };

        for i in 0..exprs_size {
            let (rhs_dt, rhs_tv) = self.rhs_slot(&source, rhs, i)?;
            let target = file.strip_parens(lhs[i]);
            match &file.exprs[target].kind {
                ExprKind::Ident(name) if name == "_" => continue,
                ExprKind::Ident(name) => {
                    let fresh = tok.is_define()
                        && self
                            .stack
                            .table(self.stack.current_level())
                            .ok()
                            .and_then(|t| t.lookup_variable(name))
                            .is_none();
                    if fresh {
                        let ident = Ident::new(name.clone(), file.exprs[target].span);
                        let sym = self.make_symbol(&ident, rhs_dt.clone());
                        let tv = TypeVar::from_symbol(&sym);
                        self.stack.add_variable(sym)?;
                        self.contracts.add_contract(Contract::PropagatesTo {
                            x: rhs_tv,
                            y: tv,
                            expected: Some(rhs_dt),
                        });
                    } else {
                        let (sym_tv, sym_def) = {
                            let sym = self
                                .stack
                                .lookup_variable(name)
                                .ok_or_else(|| ExtractError::UnresolvedSymbol(name.clone()))?;
                            (TypeVar::from_symbol(sym), sym.def.clone())
                        };
                        self.contracts.add_contract(Contract::IsCompatibleWith {
                            x: rhs_tv,
                            y: sym_tv,
                            expected: sym_def,
                            weak: false,
                        });
                    }
                }
                ExprKind::Selector { .. } | ExprKind::Star(_) | ExprKind::Index { .. } => {
                    let attr = self.parse_expr(target)?;
                    let (dt, tv) = attr.expect_single()?;
                    self.contracts.add_contract(Contract::IsCompatibleWith {
                        x: rhs_tv,
                        y: tv.clone(),
                        expected: Some(dt.clone()),
                        weak: false,
                    });
                }
                _ => {
                    return Err(ExtractError::ShapeMismatch(format!(
                        "left-hand side {} of the assignment is not assignable",
                        i
                    )))
                }
            }
        }
        Ok(())
    }

    fn rhs_slot(
        &mut self,
        source: &RhsSource,
        rhs: &'a [ExprId],
        i: usize,
    ) -> Result<(DataType, TypeVar), ExtractError> {
        match source {
            RhsSource::General => {
                let attr = self.parse_expr(rhs[i])?;
                let (dt, tv) = attr.expect_single()?;
                Ok((dt.clone(), tv.clone()))
            }
            RhsSource::Call { attr, is_cgo } => {
                if i < attr.len() {
                    Ok((attr.data_types[i].clone(), attr.type_vars[i].clone()))
                } else if *is_cgo && i == attr.len() {
                    Ok((DataType::builtin("error"), TypeVar::Cgo))
                } else {
                    panic!("rhs indexer out of range: {}", i);
                }
            }
            RhsSource::Index { expr } => match i {
                0 => {
                    let attr = self.parse_expr(*expr)?;
                    let (dt, tv) = attr.expect_single()?;
                    Ok((dt.clone(), tv.clone()))
                }
                1 => Ok((
                    DataType::builtin("bool"),
                    TypeVar::constant("builtin", DataType::builtin("bool")),
                )),
                _ => panic!("rhs indexer out of range: {}", i),
            },
            RhsSource::Assert { x_tv, ty } => match i {
                0 => {
                    let y = TypeVar::constant(self.package.clone(), ty.clone());
                    self.contracts.add_contract(Contract::IsCompatibleWith {
                        x: x_tv.clone(),
                        y: y.clone(),
                        expected: Some(ty.clone()),
                        weak: false,
                    });
                    Ok((ty.clone(), y))
                }
                1 => Ok((
                    DataType::builtin("bool"),
                    TypeVar::constant("builtin", DataType::builtin("bool")),
                )),
                _ => panic!("rhs indexer out of range: {}", i),
            },
        }
    }

    // ── Control flow ──────────────────────────────────────────────

    fn parse_if(
        &mut self,
        init: Option<StmtId>,
        cond: ExprId,
        body: &'a [StmtId],
        else_stmt: Option<StmtId>,
    ) -> Result<(), ExtractError> {
        if let Some(init) = init {
            return self.scoped(|sp| {
                sp.parse_stmt(init)?;
                sp.parse_if_tail(cond, body, else_stmt)
            });
        }
        self.parse_if_tail(cond, body, else_stmt)
    }

    fn parse_if_tail(
        &mut self,
        cond: ExprId,
        body: &'a [StmtId],
        else_stmt: Option<StmtId>,
    ) -> Result<(), ExtractError> {
        self.parse_expr(cond)?;
        self.parse_block(body)?;
        if let Some(else_stmt) = else_stmt {
            return self.parse_stmt(else_stmt);
        }
        Ok(())
    }

    fn parse_for(
        &mut self,
        init: Option<StmtId>,
        cond: Option<ExprId>,
        post: Option<StmtId>,
        body: &'a [StmtId],
    ) -> Result<(), ExtractError> {
        self.scoped(|sp| {
            if let Some(init) = init {
                sp.parse_stmt(init)?;
            }
            if let Some(cond) = cond {
                sp.parse_expr(cond)?;
            }
            if let Some(post) = post {
                sp.parse_stmt(post)?;
            }
            sp.parse_block(body)
        })
    }

    fn parse_switch(
        &mut self,
        init: Option<StmtId>,
        tag: Option<ExprId>,
        cases: &'a [CaseClause],
    ) -> Result<(), ExtractError> {
        if let Some(init) = init {
            return self.scoped(|sp| {
                sp.parse_stmt(init)?;
                sp.parse_switch_tail(tag, cases)
            });
        }
        self.parse_switch_tail(tag, cases)
    }

    fn parse_switch_tail(
        &mut self,
        tag: Option<ExprId>,
        cases: &'a [CaseClause],
    ) -> Result<(), ExtractError> {
        let tag_tv = match tag {
            // a tagless switch compares against true
            None => TypeVar::constant("builtin", DataType::builtin("bool")),
            Some(tag) => {
                let attr = self.parse_expr(tag)?;
                attr.expect_single()?.1.clone()
            }
        };
        for case in cases {
            for expr in &case.exprs {
                let attr = self.parse_expr(*expr)?;
                let (_, case_tv) = attr.expect_single()?;
                self.contracts.add_contract(Contract::IsCompatibleWith {
                    x: case_tv.clone(),
                    y: tag_tv.clone(),
                    expected: None,
                    weak: false,
                });
            }
            self.parse_block(&case.body)?;
        }
        Ok(())
    }

    fn parse_type_switch(
        &mut self,
        init: Option<StmtId>,
        guard: StmtId,
        cases: &'a [TypeCaseClause],
    ) -> Result<(), ExtractError> {
        if let Some(init) = init {
            return self.scoped(|sp| {
                sp.parse_stmt(init)?;
                sp.scoped(|sp| sp.parse_type_switch_tail(guard, cases))
            });
        }
        self.scoped(|sp| sp.parse_type_switch_tail(guard, cases))
    }

    fn parse_type_switch_tail(
        &mut self,
        guard: StmtId,
        cases: &'a [TypeCaseClause],
    ) -> Result<(), ExtractError> {
        let file = self.file;
        match &file.stmts[guard].kind {
            StmtKind::Expr(expr) => {
                let guard_tv = self.type_switch_guard_var(*expr)?;
                self.parse_type_switch_cases(None, guard_tv, cases)
            }
            StmtKind::Assign { lhs, rhs, .. } => self.scoped(|sp| {
                if lhs.len() != 1 {
                    return Err(ExtractError::MalformedConstruct(
                        "type-switch guard must assign a single expression".into(),
                    ));
                }
                if rhs.len() != 1 {
                    return Err(ExtractError::MalformedConstruct(
                        "type-switch guard must have a single expression on the right".into(),
                    ));
                }
                let guard_tv = sp.type_switch_guard_var(rhs[0])?;
                let target = file.strip_parens(lhs[0]);
                let ExprKind::Ident(name) = &file.exprs[target].kind else {
                    return Err(ExtractError::MalformedConstruct(
                        "type-switch guard binding must be an identifier".into(),
                    ));
                };
                let binding = (name != "_").then(|| name.clone());
                sp.parse_type_switch_cases(binding, guard_tv, cases)
            }),
            _ => Err(ExtractError::MalformedConstruct(
                "unsupported statement in a type-switch guard".into(),
            )),
        }
    }

    /// The asserted expression's type variable; rejects a guard whose
    /// assertion carries a syntactic type annotation.
    fn type_switch_guard_var(&mut self, expr: ExprId) -> Result<TypeVar, ExtractError> {
        let file = self.file;
        let stripped = file.strip_parens(expr);
        let ExprKind::TypeAssert { x, type_expr } = &file.exprs[stripped].kind else {
            return Err(ExtractError::MalformedConstruct(
                "expecting a type assertion in a type-switch guard".into(),
            ));
        };
        if type_expr.is_some() {
            return Err(ExtractError::MalformedConstruct(
                "type-switch assertion must use the literal type keyword".into(),
            ));
        }
        let attr = self.parse_expr(*x)?;
        Ok(attr.expect_single()?.1.clone())
    }

    fn parse_type_switch_cases(
        &mut self,
        binding: Option<SmolStr>,
        guard_tv: TypeVar,
        cases: &'a [TypeCaseClause],
    ) -> Result<(), ExtractError> {
        for case in cases {
            self.scoped(|sp| {
                if case.types.len() == 1 {
                    let ty = sp.parse_type(case.types[0])?;
                    sp.contracts.add_contract(Contract::IsCompatibleWith {
                        x: TypeVar::constant(sp.package.clone(), ty.clone()),
                        y: guard_tv.clone(),
                        expected: None,
                        weak: true,
                    });
                    if let Some(name) = &binding {
                        // the binding has a different identity in every
                        // clause scope; the clause position keeps them
                        // distinct
                        let sym = SymbolDef::new(
                            name.clone(),
                            "",
                            Some(ty.clone()),
                            sp.pos(case.span),
                        );
                        sp.contracts.add_contract(Contract::PropagatesTo {
                            x: TypeVar::constant(sp.package.clone(), ty),
                            y: TypeVar::from_symbol(&sym),
                            expected: None,
                        });
                        sp.stack.add_variable(sym)?;
                    }
                } else {
                    // multiple listed types (or default): the binding is
                    // only known to satisfy the empty interface
                    for type_expr in &case.types {
                        let ty = sp.parse_type(*type_expr)?;
                        sp.contracts.add_contract(Contract::IsCompatibleWith {
                            x: TypeVar::constant(sp.package.clone(), ty),
                            y: guard_tv.clone(),
                            expected: None,
                            weak: true,
                        });
                    }
                    if let Some(name) = &binding {
                        let iface = DataType::any();
                        let sym = SymbolDef::new(
                            name.clone(),
                            "",
                            Some(iface.clone()),
                            sp.pos(case.span),
                        );
                        sp.contracts.add_contract(Contract::PropagatesTo {
                            x: TypeVar::constant(sp.package.clone(), iface),
                            y: TypeVar::from_symbol(&sym),
                            expected: None,
                        });
                        sp.stack.add_variable(sym)?;
                    }
                }
                sp.parse_block(&case.body)
            })?;
        }
        Ok(())
    }

    fn parse_select(&mut self, clauses: &'a [CommClause]) -> Result<(), ExtractError> {
        let file = self.file;
        for clause in clauses {
            self.scoped(|sp| {
                if let Some(comm) = clause.comm {
                    match &file.stmts[comm].kind {
                        StmtKind::Expr(expr) => {
                            sp.parse_expr(*expr)?;
                        }
                        StmtKind::Send { chan, value } => {
                            sp.parse_send(*chan, *value)?;
                        }
                        StmtKind::Assign { lhs, rhs, tok } => {
                            sp.parse_select_receive(lhs, rhs, *tok)?;
                        }
                        _ => {
                            return Err(ExtractError::MalformedConstruct(
                                "unrecognized select communication clause".into(),
                            ))
                        }
                    }
                }
                sp.scoped(|sp| clause.body.iter().try_for_each(|s| sp.parse_stmt(*s)))
            })?;
        }
        Ok(())
    }

    fn parse_select_receive(
        &mut self,
        lhs: &'a [ExprId],
        rhs: &'a [ExprId],
        tok: AssignTok,
    ) -> Result<(), ExtractError> {
        let file = self.file;
        if rhs.len() != 1 {
            return Err(ExtractError::MalformedConstruct(
                "expecting a single expression on the right of a receive clause".into(),
            ));
        }
        let receive = file.strip_parens(rhs[0]);
        let ExprKind::Unary {
            op: UnaryOp::Recv, ..
        } = &file.exprs[receive].kind
        else {
            return Err(ExtractError::MalformedConstruct(
                "receive clause must have the form <-chan".into(),
            ));
        };
        if lhs.is_empty() {
            return Err(ExtractError::MalformedConstruct(
                "expecting at least one position on the left of a receive clause".into(),
            ));
        }
        if lhs.len() > 2 {
            return Err(ExtractError::MalformedConstruct(
                "expecting at most two positions on the left of a receive clause".into(),
            ));
        }

        // the receive expression carries the channel checks (including
        // the send-only rejection) and allocates the virtual variable
        // for the received value
        let attr = self.parse_expr(receive)?;
        let (elem, y) = {
            let (dt, tv) = attr.expect_single()?;
            (dt.clone(), tv.clone())
        };

        let bind_ident = |id: ExprId| -> Result<Ident, ExtractError> {
            let stripped = file.strip_parens(id);
            match &file.exprs[stripped].kind {
                ExprKind::Ident(name) => {
                    Ok(Ident::new(name.clone(), file.exprs[stripped].span))
                }
                _ => Err(ExtractError::MalformedConstruct(
                    "receive clause bindings must be identifiers".into(),
                )),
            }
        };

        if tok.is_define() {
            let first = bind_ident(lhs[0])?;
            if !first.is_blank() {
                let sym = self.make_symbol(&first, elem);
                self.contracts.add_contract(Contract::PropagatesTo {
                    x: y.clone(),
                    y: TypeVar::from_symbol(&sym),
                    expected: None,
                });
                self.stack.add_variable(sym)?;
            }
            if let Some(&ok_expr) = lhs.get(1) {
                let second = bind_ident(ok_expr)?;
                if !second.is_blank() {
                    let sym = self.make_symbol(&second, DataType::builtin("bool"));
                    self.contracts.add_contract(Contract::PropagatesTo {
                        x: TypeVar::constant("builtin", DataType::builtin("bool")),
                        y: TypeVar::from_symbol(&sym),
                        expected: None,
                    });
                    self.stack.add_variable(sym)?;
                }
            }
        } else {
            let value_attr = self.parse_expr(lhs[0])?;
            let (_, tv) = value_attr.expect_single()?;
            self.contracts.add_contract(Contract::IsCompatibleWith {
                x: y,
                y: tv.clone(),
                expected: None,
                weak: false,
            });
            if let Some(&ok_expr) = lhs.get(1) {
                let ok_attr = self.parse_expr(ok_expr)?;
                let (_, ok_tv) = ok_attr.expect_single()?;
                self.contracts.add_contract(Contract::IsCompatibleWith {
                    x: TypeVar::constant("builtin", DataType::builtin("bool")),
                    y: ok_tv.clone(),
                    expected: None,
                    weak: false,
                });
            }
        }
        Ok(())
    }

    // ── Range ─────────────────────────────────────────────────────

    fn parse_range(
        &mut self,
        key: Option<ExprId>,
        value: Option<ExprId>,
        tok: AssignTok,
        x: ExprId,
        body: &'a [StmtId],
    ) -> Result<(), ExtractError> {
        let x_attr = self.parse_expr(x)?;
        let (x_dt, x_tv) = x_attr.expect_single()?;
        let x_dt = x_dt.clone();
        let x_tv = x_tv.clone();

        self.scoped(|sp| {
            sp.contracts
                .add_contract(Contract::IsRangeable { x: x_tv.clone() });

            // ranging through a pointer reaches the pointed-to value
            let range_expr = match x_dt.clone() {
                DataType::Pointer { def } => *def,
                other => other,
            };
            let range_expr = sp.find_first_non_ident(&range_expr)?;

            let (key_ty, value_ty): (DataType, Option<DataType>) = match &range_expr {
                DataType::Array { elem, .. }
                | DataType::Slice { elem }
                | DataType::Ellipsis { elem } => {
                    (DataType::builtin("int"), Some((**elem).clone()))
                }
                DataType::Builtin { def, .. } if def == "string" => {
                    (DataType::builtin("int"), Some(DataType::builtin("rune")))
                }
                DataType::Map { key, value } => ((**key).clone(), Some((**value).clone())),
                DataType::Channel { elem, .. } => ((**elem).clone(), None),
                other => {
                    return Err(ExtractError::ShapeMismatch(format!(
                        "cannot range over a value of type {}",
                        other
                    )))
                }
            };

            if let Some(key) = key {
                sp.parse_range_position(key, tok, key_ty, true, &x_tv)?;
            }
            if let Some(value) = value {
                if let Some(value_ty) = value_ty {
                    sp.parse_range_position(value, tok, value_ty, false, &x_tv)?;
                }
            }

            sp.parse_block(body)
        })
    }

    /// Bind or check one key/value position of a range statement.
    fn parse_range_position(
        &mut self,
        expr: ExprId,
        tok: AssignTok,
        ty: DataType,
        is_key: bool,
        x_tv: &TypeVar,
    ) -> Result<(), ExtractError> {
        let file = self.file;
        let make_source = |tv: TypeVar| {
            if is_key {
                TypeVar::range_key(tv)
            } else {
                TypeVar::range_value(tv)
            }
        };
        if tok.is_define() {
            let ExprKind::Ident(name) = &file.exprs[expr].kind else {
                return Err(ExtractError::MalformedConstruct(
                    "range binding must be a bare identifier".into(),
                ));
            };
            if name == "_" {
                return Ok(());
            }
            let ident = Ident::new(name.clone(), file.exprs[expr].span);
            let sym = self.make_symbol(&ident, ty.clone());
            let tv = TypeVar::from_symbol(&sym);
            self.stack.add_variable(sym)?;
            self.contracts.add_contract(Contract::PropagatesTo {
                x: make_source(x_tv.clone()),
                y: tv,
                expected: Some(ty),
            });
            Ok(())
        } else {
            let stripped = file.strip_parens(expr);
            let ExprKind::Ident(name) = &file.exprs[stripped].kind else {
                return Err(ExtractError::MalformedConstruct(
                    "range position must be an identifier".into(),
                ));
            };
            if name == "_" {
                return Ok(());
            }
            let attr = self.parse_expr(stripped)?;
            let (dt, tv) = attr.expect_single()?;
            self.contracts.add_contract(Contract::IsCompatibleWith {
                x: make_source(x_tv.clone()),
                y: tv.clone(),
                expected: Some(dt.clone()),
                weak: false,
            });
            Ok(())
        }
    }
}
