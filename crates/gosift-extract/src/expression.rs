//! The expression walker: returns an attribute record per expression
//! and appends contracts for every nontrivial node. A peer of the
//! statement walker, sharing its scope stack and contract table; the
//! attribute record is the only return channel.

use gosift_ast::{ExprId, Ident, Span, UnaryOp};
use gosift_contracts::{Contract, TypeVar};
use gosift_symbols::SymbolKind;
use gosift_types::{is_builtin_type, ChanDir, DataType};
use smol_str::SmolStr;
use tracing::trace;

use crate::{error::ExtractError, Attr, Extractor};

const BUILTIN_FUNCS: &[&str] = &[
    "make", "new", "len", "cap", "append", "copy", "delete", "close", "panic", "print", "println",
    "recover",
];

impl<'a> Extractor<'a> {
    pub fn parse_expr(&mut self, id: ExprId) -> Result<Attr, ExtractError> {
        use gosift_ast::ExprKind::*;
        let file = self.file;
        let span = file.exprs[id].span;
        match &file.exprs[id].kind {
            Ident(name) => self.parse_ident_expr(name.clone(), span),
            IntLit(_) => Ok(self.untyped_const("int")),
            FloatLit(_) => Ok(self.untyped_const("float64")),
            StringLit(_) => Ok(self.untyped_const("string")),
            RuneLit(_) => Ok(self.untyped_const("rune")),
            Paren(inner) => self.parse_expr(*inner),
            TypeLit(ty) => {
                let def = self.parse_type(*ty)?;
                let tv = TypeVar::constant(self.package.clone(), def.clone());
                Ok(Attr::single(def, tv))
            }
            CompositeLit { type_expr, elems } => self.parse_composite_lit(*type_expr, elems, None),
            KeyValue { .. } => Err(ExtractError::ShapeMismatch(
                "key: value element outside a composite literal".into(),
            )),
            Selector { x, sel } => self.parse_selector(*x, sel.clone()),
            Index { x, index } => self.parse_index(*x, *index),
            Slice { x, low, high } => self.parse_slice(*x, *low, *high),
            TypeAssert { x, type_expr } => self.parse_type_assert(*x, *type_expr),
            Call { fun, args, .. } => self.parse_call(*fun, args),
            Star(x) => self.parse_star(*x),
            Unary { op, x } => self.parse_unary_expr(*op, *x),
            Binary { op, x, y } => self.parse_binary_expr(*op, *x, *y),
            FuncLit { sig, body } => self.parse_func_lit(*sig, body),
        }
    }

    fn untyped_const(&mut self, name: &str) -> Attr {
        let def = DataType::untyped(name);
        Attr::single(def.clone(), TypeVar::constant("builtin", def))
    }

    fn parse_ident_expr(&mut self, name: SmolStr, _span: Span) -> Result<Attr, ExtractError> {
        if name == "_" {
            return Err(ExtractError::ShapeMismatch(
                "blank identifier in expression position".into(),
            ));
        }
        match name.as_str() {
            "iota" => return Ok(self.untyped_const("iota")),
            "true" | "false" => return Ok(self.untyped_const("bool")),
            "nil" => return Ok(self.untyped_const("nil")),
            _ => {}
        }

        if let Some((sym, kind)) = self.stack.lookup(&name) {
            match kind {
                SymbolKind::Variable | SymbolKind::Function => {
                    let def = sym
                        .def
                        .clone()
                        .ok_or_else(|| ExtractError::UnresolvedSymbol(name.clone()))?;
                    let tv = TypeVar::from_symbol(sym);
                    return Ok(Attr::single(def, tv));
                }
                SymbolKind::DataType => {
                    // a type name in expression position (conversion target)
                    let package = self.package.clone();
                    let def = DataType::identifier(name, package.clone());
                    let tv = TypeVar::constant(package, def.clone());
                    return Ok(Attr::single(def, tv));
                }
            }
        }
        if is_builtin_type(&name) {
            let def = DataType::builtin(name);
            let tv = TypeVar::constant("builtin", def.clone());
            return Ok(Attr::single(def, tv));
        }
        if let Some(path) = self.imports.get(&name).cloned() {
            let def = DataType::PackageQualifier {
                name,
                path: path.clone(),
            };
            let tv = TypeVar::constant(path, def.clone());
            return Ok(Attr::single(def, tv));
        }
        trace!(%name, "identifier not resolvable yet");
        Err(ExtractError::UnresolvedSymbol(name))
    }

    // ── Composite literals ────────────────────────────────────────

    fn parse_composite_lit(
        &mut self,
        type_expr: Option<gosift_ast::TypeExprId>,
        elems: &'a [ExprId],
        inherited: Option<DataType>,
    ) -> Result<Attr, ExtractError> {
        let ty = match type_expr {
            Some(t) => self.parse_type(t)?,
            None => inherited.ok_or_else(|| {
                ExtractError::ShapeMismatch("composite literal without a type".into())
            })?,
        };
        let underlying = self.find_first_non_ident(&ty)?;

        let file = self.file;
        match &underlying {
            DataType::Struct { fields } => {
                for (i, elem) in elems.iter().enumerate() {
                    match &file.exprs[*elem].kind {
                        gosift_ast::ExprKind::KeyValue { key, value } => {
                            let key_id = file.strip_parens(*key);
                            let gosift_ast::ExprKind::Ident(field_name) =
                                &file.exprs[key_id].kind
                            else {
                                return Err(ExtractError::ShapeMismatch(
                                    "struct literal key is not a field name".into(),
                                ));
                            };
                            let expected =
                                fields.iter().find(|f| &f.name == field_name).map(|f| f.def.clone());
                            self.check_lit_elem(*value, expected)?;
                        }
                        _ => {
                            let expected = fields.get(i).map(|f| f.def.clone());
                            self.check_lit_elem(*elem, expected)?;
                        }
                    }
                }
            }
            DataType::Map { key, value } => {
                for elem in elems {
                    match &file.exprs[*elem].kind {
                        gosift_ast::ExprKind::KeyValue { key: k, value: v } => {
                            self.check_lit_elem(*k, Some((**key).clone()))?;
                            self.check_lit_elem(*v, Some((**value).clone()))?;
                        }
                        _ => {
                            return Err(ExtractError::ShapeMismatch(
                                "map literal element without a key".into(),
                            ))
                        }
                    }
                }
            }
            DataType::Slice { elem: elem_ty }
            | DataType::Array { elem: elem_ty, .. }
            | DataType::Ellipsis { elem: elem_ty } => {
                let elem_ty = (**elem_ty).clone();
                for elem in elems {
                    match &file.exprs[*elem].kind {
                        gosift_ast::ExprKind::KeyValue { key, value } => {
                            self.check_lit_elem(*key, Some(DataType::builtin("int")))?;
                            self.check_lit_elem(*value, Some(elem_ty.clone()))?;
                        }
                        _ => self.check_lit_elem(*elem, Some(elem_ty.clone()))?,
                    }
                }
            }
            _ => {
                for elem in elems {
                    match &file.exprs[*elem].kind {
                        gosift_ast::ExprKind::KeyValue { key, value } => {
                            self.check_lit_elem(*key, None)?;
                            self.check_lit_elem(*value, None)?;
                        }
                        _ => self.check_lit_elem(*elem, None)?,
                    }
                }
            }
        }

        let tv = TypeVar::constant(self.package.clone(), ty.clone());
        Ok(Attr::single(ty, tv))
    }

    /// Parse one composite-literal element, propagating the expected
    /// type into nested untyped literals, and pin it to the expected
    /// type when one is known.
    fn check_lit_elem(
        &mut self,
        value: ExprId,
        expected: Option<DataType>,
    ) -> Result<(), ExtractError> {
        let file = self.file;
        let stripped = file.strip_parens(value);
        let attr = match &file.exprs[stripped].kind {
            gosift_ast::ExprKind::CompositeLit {
                type_expr: None,
                elems,
            } => self.parse_composite_lit(None, elems, expected.clone())?,
            _ => self.parse_expr(value)?,
        };
        if let Some(expected) = expected {
            let (_, tv) = attr.expect_single()?;
            let y = TypeVar::constant(self.package.clone(), expected.clone());
            self.contracts.add_contract(Contract::IsCompatibleWith {
                x: tv.clone(),
                y,
                expected: Some(expected),
                weak: false,
            });
        }
        Ok(())
    }

    // ── Selectors ─────────────────────────────────────────────────

    fn parse_selector(&mut self, x: ExprId, sel: Ident) -> Result<Attr, ExtractError> {
        let file = self.file;
        let base = file.strip_parens(x);
        if let gosift_ast::ExprKind::Ident(name) = &file.exprs[base].kind {
            if self.stack.lookup_variable(name).is_none() {
                if let Some(path) = self.imports.get(name).cloned() {
                    return self.parse_qualified_symbol(path, sel);
                }
            }
        }

        let x_attr = self.parse_expr(x)?;
        let (x_dt, x_tv) = x_attr.expect_single()?;
        let x_dt = x_dt.clone();
        let x_tv = x_tv.clone();

        let receiver = match x_dt.clone() {
            DataType::Pointer { def } => *def,
            other => other,
        };
        let underlying = self.find_first_non_ident(&receiver)?;

        let member = match &underlying {
            DataType::Struct { fields } => fields
                .iter()
                .enumerate()
                .find(|(_, f)| f.name == sel.name)
                .map(|(i, f)| (i, f.def.clone())),
            DataType::Interface { methods } => methods
                .iter()
                .enumerate()
                .find(|(_, m)| m.name == sel.name)
                .map(|(i, m)| (i, m.def.clone())),
            _ => None,
        };
        let (index, def) = match member {
            Some(found) => found,
            None => (0, self.lookup_method(&receiver, &sel.name)?),
        };

        self.contracts.add_contract(Contract::HasField {
            x: x_tv.clone(),
            field: sel.name.clone(),
            index,
        });
        let tv = TypeVar::field(x_tv, sel.name, index);
        Ok(Attr::single(def, tv))
    }

    /// Resolve `recv.name` as a method of the named receiver type.
    fn lookup_method(
        &self,
        receiver: &DataType,
        name: &SmolStr,
    ) -> Result<DataType, ExtractError> {
        let DataType::Identifier { def: type_name, package } = receiver else {
            return Err(ExtractError::UnresolvedSymbol(name.clone()));
        };
        let table = if package.is_empty() || *package == self.package {
            self.stack.table(0).ok()
        } else {
            self.global.lookup(package)
        };
        let sym = table
            .and_then(|t| t.lookup_function(name))
            .ok_or_else(|| ExtractError::UnresolvedSymbol(name.clone()))?;
        match &sym.def {
            Some(DataType::Method {
                receiver: method_recv,
                signature,
            }) => {
                let mut recv_name = method_recv;
                if let DataType::Pointer { def } = &**recv_name {
                    recv_name = def;
                }
                if let DataType::Identifier { def, .. } = &**recv_name {
                    if def == type_name {
                        return Ok((**signature).clone());
                    }
                }
                Err(ExtractError::UnresolvedSymbol(name.clone()))
            }
            _ => Err(ExtractError::UnresolvedSymbol(name.clone())),
        }
    }

    fn parse_qualified_symbol(
        &mut self,
        path: SmolStr,
        sel: Ident,
    ) -> Result<Attr, ExtractError> {
        if path == "C" {
            // foreign symbols are opaque: one untyped result, any
            // arguments; the extra error slot is synthesised by the
            // assignment walker
            let def = DataType::Function {
                params: Vec::new(),
                results: vec![DataType::any()],
                variadic: true,
            };
            let tv = TypeVar::Variable {
                package: path,
                name: sel.name,
                pos: SmolStr::default(),
            };
            return Ok(Attr::single(def, tv));
        }
        let Some(table) = self.global.lookup(&path) else {
            return Err(ExtractError::UnresolvedSymbol(path));
        };
        match table.lookup(&sel.name) {
            Some((_, SymbolKind::DataType)) => {
                let pos = self.pos(sel.span);
                self.allocated
                    .add_data_type(path.clone(), sel.name.clone(), pos);
                let def = DataType::identifier(sel.name, path.clone());
                let tv = TypeVar::constant(path, def.clone());
                Ok(Attr::single(def, tv))
            }
            Some((sym, _)) => {
                let def = sym
                    .def
                    .clone()
                    .ok_or_else(|| ExtractError::UnresolvedSymbol(sel.name.clone()))?;
                let tv = TypeVar::from_symbol(sym);
                Ok(Attr::single(def, tv))
            }
            None => Err(ExtractError::UnresolvedSymbol(sel.name)),
        }
    }

    // ── Indexing and slicing ──────────────────────────────────────

    fn parse_index(&mut self, x: ExprId, index: ExprId) -> Result<Attr, ExtractError> {
        let x_attr = self.parse_expr(x)?;
        let (x_dt, x_tv) = x_attr.expect_single()?;
        let x_dt = x_dt.clone();
        let x_tv = x_tv.clone();
        let idx_attr = self.parse_expr(index)?;
        let (_, idx_tv) = idx_attr.expect_single()?;
        let idx_tv = idx_tv.clone();

        let base = match x_dt {
            DataType::Pointer { def } => *def,
            other => other,
        };
        let underlying = self.find_first_non_ident(&base)?;

        let (elem, is_slice) = match &underlying {
            DataType::Map { key, value } => {
                self.contracts.add_contract(Contract::IsCompatibleWith {
                    x: idx_tv.clone(),
                    y: TypeVar::map_key(x_tv.clone()),
                    expected: Some((**key).clone()),
                    weak: false,
                });
                ((**value).clone(), false)
            }
            DataType::Slice { elem }
            | DataType::Array { elem, .. }
            | DataType::Ellipsis { elem } => {
                self.contracts.add_contract(Contract::IsCompatibleWith {
                    x: idx_tv.clone(),
                    y: TypeVar::list_key(x_tv.clone()),
                    expected: Some(DataType::builtin("int")),
                    weak: true,
                });
                ((**elem).clone(), true)
            }
            DataType::Builtin { def, .. } if def == "string" => {
                self.contracts.add_contract(Contract::IsCompatibleWith {
                    x: idx_tv.clone(),
                    y: TypeVar::list_key(x_tv.clone()),
                    expected: Some(DataType::builtin("int")),
                    weak: true,
                });
                (DataType::builtin("byte"), true)
            }
            other => {
                return Err(ExtractError::ShapeMismatch(format!(
                    "cannot index a value of type {}",
                    other
                )))
            }
        };

        self.contracts.add_contract(Contract::IsIndexable {
            x: x_tv,
            key: idx_tv,
            is_slice,
        });
        let y = self.contracts.new_virtual_var();
        Ok(Attr::single(elem, y))
    }

    fn parse_slice(
        &mut self,
        x: ExprId,
        low: Option<ExprId>,
        high: Option<ExprId>,
    ) -> Result<Attr, ExtractError> {
        let x_attr = self.parse_expr(x)?;
        let (x_dt, x_tv) = x_attr.expect_single()?;
        let x_dt = x_dt.clone();
        let x_tv = x_tv.clone();

        for bound in [low, high].into_iter().flatten() {
            let attr = self.parse_expr(bound)?;
            let (_, tv) = attr.expect_single()?;
            self.contracts.add_contract(Contract::IsCompatibleWith {
                x: tv.clone(),
                y: TypeVar::list_key(x_tv.clone()),
                expected: Some(DataType::builtin("int")),
                weak: true,
            });
        }

        let def = match self.find_first_non_ident(&x_dt) {
            Ok(DataType::Array { elem, .. }) | Ok(DataType::Ellipsis { elem }) => {
                DataType::Slice { elem }
            }
            Ok(DataType::Slice { elem }) => DataType::Slice { elem },
            _ => x_dt,
        };
        let y = self.contracts.new_virtual_var();
        Ok(Attr::single(def, y))
    }

    fn parse_type_assert(
        &mut self,
        x: ExprId,
        type_expr: Option<gosift_ast::TypeExprId>,
    ) -> Result<Attr, ExtractError> {
        let Some(type_expr) = type_expr else {
            return Err(ExtractError::MalformedConstruct(
                "type-switch guard outside a type switch".into(),
            ));
        };
        let x_attr = self.parse_expr(x)?;
        let (_, x_tv) = x_attr.expect_single()?;
        let x_tv = x_tv.clone();
        let ty = self.parse_type(type_expr)?;
        let y = TypeVar::constant(self.package.clone(), ty.clone());
        self.contracts.add_contract(Contract::IsCompatibleWith {
            x: x_tv,
            y: y.clone(),
            expected: Some(ty.clone()),
            weak: false,
        });
        Ok(Attr::single(ty, y))
    }

    // ── Calls ─────────────────────────────────────────────────────

    fn parse_call(&mut self, fun: ExprId, args: &'a [ExprId]) -> Result<Attr, ExtractError> {
        let file = self.file;
        let fun_id = file.strip_parens(fun);
        if let gosift_ast::ExprKind::Ident(name) = &file.exprs[fun_id].kind {
            if BUILTIN_FUNCS.contains(&name.as_str()) && self.stack.lookup(name).is_none() {
                return self.parse_builtin_call(name.clone(), args);
            }
        }

        let fun_attr = self.parse_expr(fun)?;
        let (fun_dt, fun_tv) = fun_attr.expect_single()?;
        let fun_dt = fun_dt.clone();
        let fun_tv = fun_tv.clone();

        // A type witness in call position is a conversion.
        let is_conversion = matches!(fun_tv, TypeVar::Constant { .. })
            && !matches!(fun_dt, DataType::Function { .. } | DataType::Method { .. });
        if is_conversion {
            if args.len() != 1 {
                return Err(ExtractError::ArityMismatch {
                    lhs: 1,
                    rhs: args.len(),
                });
            }
            let arg_attr = self.parse_expr(args[0])?;
            let (_, arg_tv) = arg_attr.expect_single()?;
            let y = TypeVar::constant(self.package.clone(), fun_dt.clone());
            self.contracts.add_contract(Contract::IsCompatibleWith {
                x: arg_tv.clone(),
                y: y.clone(),
                expected: Some(fun_dt.clone()),
                weak: true,
            });
            return Ok(Attr::single(fun_dt, y));
        }

        let signature = match fun_dt {
            DataType::Function { .. } => fun_dt,
            DataType::Method { signature, .. } => *signature,
            other => {
                return Err(ExtractError::ShapeMismatch(format!(
                    "cannot call a value of type {}",
                    other
                )))
            }
        };
        self.contracts.add_contract(Contract::IsInvocable {
            f: fun_tv.clone(),
            arg_count: args.len(),
        });

        let DataType::Function {
            params,
            results,
            variadic,
        } = signature
        else {
            unreachable!("signature is a function");
        };

        for (i, arg) in args.iter().enumerate() {
            let attr = self.parse_expr(*arg)?;
            let (_, arg_tv) = attr.expect_single()?;
            let expected = if i < params.len() {
                match &params[i] {
                    DataType::Ellipsis { elem } => Some((**elem).clone()),
                    p => Some(p.clone()),
                }
            } else if variadic {
                match params.last() {
                    Some(DataType::Ellipsis { elem }) => Some((**elem).clone()),
                    _ => None,
                }
            } else {
                None
            };
            self.contracts.add_contract(Contract::IsCompatibleWith {
                x: arg_tv.clone(),
                y: TypeVar::argument(fun_tv.clone(), i),
                expected,
                weak: false,
            });
        }

        let type_vars = (0..results.len())
            .map(|i| TypeVar::return_type(fun_tv.clone(), i))
            .collect();
        Ok(Attr {
            data_types: results,
            type_vars,
        })
    }

    /// A call argument that must denote a type (`make`, `new`).
    fn type_argument(&mut self, arg: ExprId) -> Result<DataType, ExtractError> {
        let file = self.file;
        let stripped = file.strip_parens(arg);
        match &file.exprs[stripped].kind {
            gosift_ast::ExprKind::TypeLit(ty) => self.parse_type(*ty),
            gosift_ast::ExprKind::Ident(name) => {
                if let Some(sym) = self.stack.lookup_data_type(name) {
                    let package = sym.package.clone();
                    let package = if package.is_empty() {
                        self.package.clone()
                    } else {
                        package
                    };
                    return Ok(DataType::identifier(name.clone(), package));
                }
                if is_builtin_type(name) {
                    return Ok(DataType::builtin(name.clone()));
                }
                Err(ExtractError::UnresolvedSymbol(name.clone()))
            }
            _ => Err(ExtractError::ShapeMismatch(
                "expected a type argument".into(),
            )),
        }
    }

    fn parse_builtin_call(
        &mut self,
        name: SmolStr,
        args: &'a [ExprId],
    ) -> Result<Attr, ExtractError> {
        let require = |want: usize, got: usize| -> Result<(), ExtractError> {
            if want != got {
                return Err(ExtractError::ArityMismatch {
                    lhs: want,
                    rhs: got,
                });
            }
            Ok(())
        };
        match name.as_str() {
            "make" => {
                if args.is_empty() {
                    return Err(ExtractError::ArityMismatch { lhs: 1, rhs: 0 });
                }
                let ty = self.type_argument(args[0])?;
                for arg in &args[1..] {
                    let attr = self.parse_expr(*arg)?;
                    let (_, tv) = attr.expect_single()?;
                    self.contracts.add_contract(Contract::IsCompatibleWith {
                        x: tv.clone(),
                        y: TypeVar::constant("builtin", DataType::builtin("int")),
                        expected: Some(DataType::builtin("int")),
                        weak: true,
                    });
                }
                let tv = TypeVar::constant(self.package.clone(), ty.clone());
                Ok(Attr::single(ty, tv))
            }
            "new" => {
                require(1, args.len())?;
                let ty = DataType::pointer(self.type_argument(args[0])?);
                let tv = TypeVar::constant(self.package.clone(), ty.clone());
                Ok(Attr::single(ty, tv))
            }
            "len" | "cap" => {
                require(1, args.len())?;
                self.parse_expr(args[0])?.expect_single()?;
                let y = self.contracts.new_virtual_var();
                self.contracts.add_contract(Contract::PropagatesTo {
                    x: TypeVar::constant("builtin", DataType::builtin("int")),
                    y: y.clone(),
                    expected: Some(DataType::builtin("int")),
                });
                Ok(Attr::single(DataType::builtin("int"), y))
            }
            "append" => {
                if args.is_empty() {
                    return Err(ExtractError::ArityMismatch { lhs: 1, rhs: 0 });
                }
                let first = self.parse_expr(args[0])?;
                let (first_dt, first_tv) = first.expect_single()?;
                let first_dt = first_dt.clone();
                let first_tv = first_tv.clone();
                let elem = match self.find_first_non_ident(&first_dt) {
                    Ok(DataType::Slice { elem }) => Some(*elem),
                    _ => None,
                };
                for arg in &args[1..] {
                    let attr = self.parse_expr(*arg)?;
                    let (_, tv) = attr.expect_single()?;
                    if let Some(elem) = &elem {
                        self.contracts.add_contract(Contract::IsCompatibleWith {
                            x: tv.clone(),
                            y: TypeVar::constant(self.package.clone(), elem.clone()),
                            expected: Some(elem.clone()),
                            weak: false,
                        });
                    }
                }
                Ok(Attr::single(first_dt, first_tv))
            }
            "copy" => {
                require(2, args.len())?;
                self.parse_expr(args[0])?.expect_single()?;
                self.parse_expr(args[1])?.expect_single()?;
                let y = self.contracts.new_virtual_var();
                self.contracts.add_contract(Contract::PropagatesTo {
                    x: TypeVar::constant("builtin", DataType::builtin("int")),
                    y: y.clone(),
                    expected: Some(DataType::builtin("int")),
                });
                Ok(Attr::single(DataType::builtin("int"), y))
            }
            "delete" => {
                require(2, args.len())?;
                let map_attr = self.parse_expr(args[0])?;
                let (map_dt, map_tv) = map_attr.expect_single()?;
                let map_dt = map_dt.clone();
                let map_tv = map_tv.clone();
                let key_attr = self.parse_expr(args[1])?;
                let (_, key_tv) = key_attr.expect_single()?;
                let expected = match self.find_first_non_ident(&map_dt) {
                    Ok(DataType::Map { key, .. }) => Some(*key),
                    _ => None,
                };
                self.contracts.add_contract(Contract::IsCompatibleWith {
                    x: key_tv.clone(),
                    y: TypeVar::map_key(map_tv),
                    expected,
                    weak: false,
                });
                Ok(Attr::empty())
            }
            "close" => {
                require(1, args.len())?;
                self.parse_expr(args[0])?.expect_single()?;
                Ok(Attr::empty())
            }
            "panic" | "print" | "println" => {
                for arg in args {
                    self.parse_expr(*arg)?;
                }
                Ok(Attr::empty())
            }
            "recover" => {
                require(0, args.len())?;
                let y = self.contracts.new_virtual_var();
                Ok(Attr::single(DataType::any(), y))
            }
            _ => unreachable!("not a builtin function: {}", name),
        }
    }

    // ── Unary forms ───────────────────────────────────────────────

    fn parse_star(&mut self, x: ExprId) -> Result<Attr, ExtractError> {
        let x_attr = self.parse_expr(x)?;
        let (x_dt, x_tv) = x_attr.expect_single()?;
        let x_dt = x_dt.clone();
        let x_tv = x_tv.clone();
        self.contracts
            .add_contract(Contract::IsDereferenceable { x: x_tv.clone() });
        let y = self.contracts.new_virtual_var();
        self.contracts.add_contract(Contract::DereferenceOf {
            x: x_tv,
            y: y.clone(),
        });
        let def = if let DataType::Pointer { def } = &x_dt {
            (**def).clone()
        } else {
            match self.find_first_non_ident(&x_dt) {
                Ok(DataType::Pointer { def }) => *def,
                _ => x_dt,
            }
        };
        Ok(Attr::single(def, y))
    }

    fn parse_unary_expr(&mut self, op: UnaryOp, x: ExprId) -> Result<Attr, ExtractError> {
        match op {
            UnaryOp::Recv => {
                let x_attr = self.parse_expr(x)?;
                let (x_dt, x_tv) = x_attr.expect_single()?;
                let x_dt = x_dt.clone();
                let x_tv = x_tv.clone();
                let DataType::Channel { dir, elem } = self.find_first_non_ident(&x_dt)? else {
                    return Err(ExtractError::MalformedConstruct(
                        "receive from a non-channel value".into(),
                    ));
                };
                if dir == ChanDir::Send {
                    return Err(ExtractError::MalformedConstruct(
                        "receive from a send-only channel".into(),
                    ));
                }
                let y = self.contracts.new_virtual_var();
                self.contracts.add_contract(Contract::IsReceiveableFrom {
                    x: x_tv,
                    y: y.clone(),
                    expected: Some((*elem).clone()),
                });
                Ok(Attr::single(*elem, y))
            }
            UnaryOp::Addr => {
                let x_attr = self.parse_expr(x)?;
                let (x_dt, x_tv) = x_attr.expect_single()?;
                let x_dt = x_dt.clone();
                let x_tv = x_tv.clone();
                self.contracts
                    .add_contract(Contract::IsReferenceable { x: x_tv.clone() });
                let y = self.contracts.new_virtual_var();
                self.contracts.add_contract(Contract::ReferenceOf {
                    x: x_tv,
                    y: y.clone(),
                });
                Ok(Attr::single(DataType::pointer(x_dt), y))
            }
            UnaryOp::Plus | UnaryOp::Minus | UnaryOp::Xor | UnaryOp::Not => {
                let x_attr = self.parse_expr(x)?;
                let (x_dt, x_tv) = x_attr.expect_single()?;
                let x_dt = x_dt.clone();
                let x_tv = x_tv.clone();
                let y = self.contracts.new_virtual_var();
                self.contracts.add_contract(Contract::UnaryOp {
                    op,
                    x: x_tv,
                    y: y.clone(),
                    expected: Some(x_dt.clone()),
                });
                Ok(Attr::single(x_dt, y))
            }
        }
    }

    fn parse_binary_expr(
        &mut self,
        op: gosift_ast::BinaryOp,
        x: ExprId,
        y: ExprId,
    ) -> Result<Attr, ExtractError> {
        let x_attr = self.parse_expr(x)?;
        let (x_dt, x_tv) = x_attr.expect_single()?;
        let x_dt = x_dt.clone();
        let x_tv = x_tv.clone();
        let y_attr = self.parse_expr(y)?;
        let (y_dt, y_tv) = y_attr.expect_single()?;
        let y_dt = y_dt.clone();
        let y_tv = y_tv.clone();

        let is_untyped =
            |dt: &DataType| matches!(dt, DataType::Builtin { untyped, .. } if *untyped);
        let result = if op.is_comparison() || op.is_logical() {
            DataType::untyped("bool")
        } else if matches!(op, gosift_ast::BinaryOp::Shl | gosift_ast::BinaryOp::Shr) {
            x_dt
        } else if !is_untyped(&x_dt) {
            x_dt
        } else {
            y_dt
        };

        let z = self.contracts.new_virtual_var();
        self.contracts.add_contract(Contract::BinaryOp {
            op,
            x: x_tv,
            y: y_tv,
            z: z.clone(),
            expected: Some(result.clone()),
        });
        Ok(Attr::single(result, z))
    }

    // ── Function literals ─────────────────────────────────────────

    fn parse_func_lit(
        &mut self,
        sig: gosift_ast::TypeExprId,
        body: &'a [gosift_ast::StmtId],
    ) -> Result<Attr, ExtractError> {
        let fn_dt = self.parse_type(sig)?;
        let tv = self.contracts.new_virtual_var();
        self.contracts.add_contract(Contract::PropagatesTo {
            x: TypeVar::constant(self.package.clone(), fn_dt.clone()),
            y: tv.clone(),
            expected: Some(fn_dt.clone()),
        });

        let results = match &fn_dt {
            DataType::Function { results, .. } => results.clone(),
            _ => Vec::new(),
        };

        self.stack.push();
        let bound = self.bind_signature(sig);
        let walked = bound.and_then(|()| {
            self.stack.push();
            let saved = self.current_func.replace(crate::EnclosingFunc {
                type_var: tv.clone(),
                results,
            });
            let result = body.iter().try_for_each(|s| self.parse_stmt(*s));
            self.current_func = saved;
            self.stack.pop();
            result
        });
        self.stack.pop();
        walked?;

        Ok(Attr::single(fn_dt, tv))
    }
}
