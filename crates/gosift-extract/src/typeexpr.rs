//! Type-expression resolution: AST type expressions into `DataType`
//! values. Emits no contracts; records cross-package type uses in the
//! allocation table.

use gosift_ast::{ChanDir as AstChanDir, ExprKind, Field, Span, TypeExprId, TypeExprKind};
use gosift_types::{is_builtin_type, ChanDir, DataType, InterfaceMethod, StructField};
use smol_str::SmolStr;
use tracing::trace;

use crate::{error::ExtractError, Extractor};

impl<'a> Extractor<'a> {
    pub fn parse_type(&mut self, id: TypeExprId) -> Result<DataType, ExtractError> {
        let file = self.file;
        let id = file.strip_type_parens(id);
        let span = file.type_exprs[id].span;
        match &file.type_exprs[id].kind {
            TypeExprKind::Ident(name) => self.resolve_type_name(name.clone(), span),
            TypeExprKind::Qualified { package, name } => {
                self.resolve_qualified_type(package.clone(), name.clone(), span)
            }
            TypeExprKind::Pointer(inner) => {
                let def = self.parse_type(*inner)?;
                Ok(DataType::pointer(def))
            }
            TypeExprKind::Array { len, elem } => {
                let len = self.array_length(*len);
                let elem = self.parse_type(*elem)?;
                Ok(DataType::Array {
                    len,
                    elem: Box::new(elem),
                })
            }
            TypeExprKind::Slice(elem) => {
                let elem = self.parse_type(*elem)?;
                Ok(DataType::slice(elem))
            }
            TypeExprKind::Map { key, value } => {
                let key = self.parse_type(*key)?;
                let value = self.parse_type(*value)?;
                Ok(DataType::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            TypeExprKind::Chan { dir, elem } => {
                let elem = self.parse_type(*elem)?;
                let dir = match dir {
                    AstChanDir::Both => ChanDir::Both,
                    AstChanDir::Send => ChanDir::Send,
                    AstChanDir::Recv => ChanDir::Recv,
                };
                Ok(DataType::Channel {
                    dir,
                    elem: Box::new(elem),
                })
            }
            TypeExprKind::Ellipsis(elem) => {
                let elem = self.parse_type(*elem)?;
                Ok(DataType::Ellipsis {
                    elem: Box::new(elem),
                })
            }
            TypeExprKind::Func { params, results } => self.signature_type(params, results),
            TypeExprKind::Interface { methods } => {
                let mut out = Vec::with_capacity(methods.len());
                for method in methods {
                    let def = self.parse_type(method.sig)?;
                    out.push(InterfaceMethod {
                        name: method.name.name.clone(),
                        def,
                    });
                }
                Ok(DataType::Interface { methods: out })
            }
            TypeExprKind::Struct { fields } => {
                let mut out = Vec::new();
                for field in fields {
                    let def = self.parse_type(field.type_expr)?;
                    if field.names.is_empty() {
                        let name = embedded_field_name(&def).ok_or_else(|| {
                            ExtractError::MalformedConstruct(
                                "embedded field is not a named type".into(),
                            )
                        })?;
                        out.push(StructField { name, def });
                    } else {
                        for name in &field.names {
                            out.push(StructField {
                                name: name.name.clone(),
                                def: def.clone(),
                            });
                        }
                    }
                }
                Ok(DataType::Struct { fields: out })
            }
            TypeExprKind::Paren(_) => unreachable!("parens were stripped"),
        }
    }

    fn resolve_type_name(&mut self, name: SmolStr, span: Span) -> Result<DataType, ExtractError> {
        let pos = self.pos(span);
        if let Some(sym) = self.stack.lookup_data_type(&name) {
            let sym_package = sym.package.clone();
            self.allocated.add_data_type(sym_package, name.clone(), pos);
            return Ok(DataType::identifier(name, self.package.clone()));
        }
        if is_builtin_type(&name) {
            return Ok(DataType::builtin(name));
        }
        trace!(%name, "type name not resolvable yet");
        Err(ExtractError::UnresolvedSymbol(name))
    }

    fn resolve_qualified_type(
        &mut self,
        package: SmolStr,
        name: SmolStr,
        span: Span,
    ) -> Result<DataType, ExtractError> {
        let Some(path) = self.imports.get(&package).cloned() else {
            return Err(ExtractError::UnresolvedSymbol(package));
        };
        let Some(table) = self.global.lookup(&path) else {
            return Err(ExtractError::UnresolvedSymbol(path));
        };
        if table.lookup_data_type(&name).is_none() {
            return Err(ExtractError::UnresolvedSymbol(name));
        }
        let pos = self.pos(span);
        self.allocated.add_data_type(path.clone(), name.clone(), pos);
        Ok(DataType::identifier(name, path))
    }

    /// Flatten a signature's parameter/result field groups into the
    /// positional `Function` shape.
    pub(crate) fn signature_type(
        &mut self,
        params: &[Field],
        results: &[Field],
    ) -> Result<DataType, ExtractError> {
        let flatten = |sp: &mut Self, fields: &[Field]| -> Result<Vec<DataType>, ExtractError> {
            let mut out = Vec::new();
            for field in fields {
                let def = sp.parse_type(field.type_expr)?;
                let copies = field.names.len().max(1);
                for _ in 0..copies {
                    out.push(def.clone());
                }
            }
            Ok(out)
        };
        let params = flatten(self, params)?;
        let results = flatten(self, results)?;
        let variadic = matches!(params.last(), Some(DataType::Ellipsis { .. }));
        Ok(DataType::Function {
            params,
            results,
            variadic,
        })
    }

    fn array_length(&self, len: gosift_ast::ExprId) -> Option<u64> {
        let file = self.file;
        let stripped = file.strip_parens(len);
        match &file.exprs[stripped].kind {
            ExprKind::IntLit(n) if *n >= 0 => Some(*n as u64),
            _ => None,
        }
    }

    /// Follow a chain of named types to the first non-identifier
    /// definition, consulting the scope stack for local names and the
    /// global table for foreign packages.
    pub(crate) fn find_first_non_ident(&self, dt: &DataType) -> Result<DataType, ExtractError> {
        let mut current = dt.clone();
        loop {
            match current {
                DataType::Identifier { def, package } => {
                    let sym = if package.is_empty() || package == self.package {
                        self.stack.lookup_data_type(&def)
                    } else {
                        self.global
                            .lookup(&package)
                            .and_then(|table| table.lookup_data_type(&def))
                    };
                    let Some(sym) = sym else {
                        return Err(ExtractError::UnresolvedSymbol(def));
                    };
                    let Some(next) = sym.def.clone() else {
                        return Err(ExtractError::UnresolvedSymbol(def));
                    };
                    current = next;
                }
                other => return Ok(other),
            }
        }
    }
}

/// The implicit field name of an embedded struct field.
fn embedded_field_name(def: &DataType) -> Option<SmolStr> {
    match def {
        DataType::Identifier { def, .. } => Some(def.clone()),
        DataType::Builtin { def, .. } => Some(def.clone()),
        DataType::Pointer { def } => embedded_field_name(def),
        _ => None,
    }
}
