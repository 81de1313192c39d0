//! Signature validation.
//!
//! Types must resolve to something declared earlier in the module or in an
//! import. Annotation expressions may only read parameters of the same list,
//! and by default only parameters declared before the annotated one.

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use crate::core::{
    is_identifier, Annotation, AnnotationDecl, Descriptor, Direction, Expr, Operand, ParamDecl,
    Parameter, TypeRef,
};

use super::{DeclError, Registry};

impl Registry {
    /// Check that a type is usable at `site` of `descriptor`.
    ///
    /// Bare `void` is only valid as a return type; `void*` is always fine.
    pub(super) fn check_type(
        &self,
        descriptor: &str,
        site: &str,
        ty: &TypeRef,
        allow_void: bool,
    ) -> Result<(), DeclError> {
        if ty.is_void() && !allow_void {
            return Err(self.signature_error(
                descriptor,
                Some(site),
                "`void` is only valid as a return type or behind a pointer",
            ));
        }

        if let Some(name) = ty.referenced_name() {
            match self.lookup(name) {
                Some(d) if d.is_type() => {}
                _ => {
                    return Err(DeclError::UnknownType {
                        module: self.module.name.clone(),
                        descriptor: descriptor.to_string(),
                        site: site.to_string(),
                        type_name: name.to_string(),
                    })
                }
            }
        }

        Ok(())
    }

    /// Resolve the declared return type; no `returns` means `void`.
    pub(super) fn check_return(
        &self,
        descriptor: &str,
        returns: &[TypeRef],
    ) -> Result<TypeRef, DeclError> {
        match returns {
            [] => Ok(TypeRef::VOID),
            [ty] => {
                self.check_type(descriptor, "return", ty, true)?;
                Ok(ty.clone())
            }
            many => Err(self.signature_error(
                descriptor,
                Some("return"),
                format!("declares {} return types, at most one is allowed", many.len()),
            )),
        }
    }

    /// Whether a value of `ty` is a pointer at the ABI level.
    pub(super) fn is_pointer_like(&self, ty: &TypeRef) -> bool {
        match ty {
            TypeRef::Pointer { .. } => true,
            TypeRef::Named(name) => self.lookup(name).is_some_and(Descriptor::is_pointer),
            TypeRef::Primitive(_) => false,
        }
    }

    /// Whether `ty` is an integer, directly or through an alias.
    pub(super) fn is_integer_like(&self, ty: &TypeRef) -> bool {
        match ty {
            TypeRef::Primitive(p) => p.is_integer(),
            TypeRef::Named(name) => self
                .lookup(name)
                .and_then(Descriptor::as_primitive)
                .is_some_and(|p| p.is_integer()),
            TypeRef::Pointer { .. } => false,
        }
    }

    /// Validate a parameter list and resolve its annotations.
    pub(super) fn check_params(
        &self,
        descriptor: &str,
        params: &[ParamDecl],
    ) -> Result<Vec<Parameter>, DeclError> {
        let mut seen = HashSet::new();
        for p in params {
            if !is_identifier(&p.name) {
                return Err(self.signature_error(
                    descriptor,
                    Some(&p.name),
                    format!("`{}` is not a valid parameter name", p.name),
                ));
            }
            if !seen.insert(p.name.as_str()) {
                return Err(self.signature_error(
                    descriptor,
                    Some(&p.name),
                    format!("parameter `{}` is declared twice", p.name),
                ));
            }

            self.check_type(descriptor, &p.name, &p.ty, false)?;

            if p.direction == Direction::Out && !self.is_pointer_like(&p.ty) {
                return Err(self.signature_error(
                    descriptor,
                    Some(&p.name),
                    format!("OUT parameter must be a pointer, found `{}`", p.ty),
                ));
            }
        }

        let resolved = params
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                let annotation = match &p.annotation {
                    None => None,
                    Some(decl) => Some(self.check_annotation(descriptor, params, idx, decl)?),
                };
                Ok(Parameter {
                    name: p.name.clone(),
                    ty: p.ty.clone(),
                    direction: p.direction,
                    doc: p.doc.clone(),
                    annotation,
                })
            })
            .collect::<Result<Vec<_>, DeclError>>()?;

        self.check_default_cycles(descriptor, &resolved)?;
        Ok(resolved)
    }

    /// Defaults that read other defaulted parameters must not form a cycle,
    /// or no call could ever complete them. Only reachable with forward
    /// references enabled.
    fn check_default_cycles(
        &self,
        descriptor: &str,
        params: &[Parameter],
    ) -> Result<(), DeclError> {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let nodes: Vec<_> = (0..params.len()).map(|i| graph.add_node(i)).collect();

        for (i, p) in params.iter().enumerate() {
            let Some(Annotation::Default(expr)) = &p.annotation else {
                continue;
            };
            for operand in expr.operands() {
                let Some(j) = params.iter().position(|q| q.name == operand.name()) else {
                    continue;
                };
                if matches!(params[j].annotation, Some(Annotation::Default(_))) {
                    graph.add_edge(nodes[j], nodes[i], ());
                }
            }
        }

        toposort(&graph, None).map(drop).map_err(|cycle| {
            let p = &params[graph[cycle.node_id()]];
            let expr = match &p.annotation {
                Some(Annotation::Default(expr)) => expr.to_string(),
                _ => String::new(),
            };
            DeclError::InvalidExpression {
                module: self.module.name.clone(),
                descriptor: descriptor.to_string(),
                param: p.name.clone(),
                expr,
                reason: format!(
                    "the default of `{}` depends on itself through other defaults",
                    p.name
                ),
            }
        })
    }

    fn check_annotation(
        &self,
        descriptor: &str,
        params: &[ParamDecl],
        idx: usize,
        decl: &AnnotationDecl,
    ) -> Result<Annotation, DeclError> {
        let param = &params[idx];
        let invalid = |src: &str, reason: String| DeclError::InvalidExpression {
            module: self.module.name.clone(),
            descriptor: descriptor.to_string(),
            param: param.name.clone(),
            expr: src.to_string(),
            reason,
        };

        match decl {
            AnnotationDecl::AutoSize(target) => {
                let src = format!("length({})", target);
                let target_idx = self
                    .position(params, target, idx)
                    .map_err(|reason| invalid(&src, reason))?;

                if !self.is_pointer_like(&params[target_idx].ty) {
                    return Err(invalid(
                        &src,
                        format!("auto-size target `{}` is not a buffer parameter", target),
                    ));
                }
                if !self.is_integer_like(&param.ty) {
                    return Err(invalid(
                        &src,
                        format!("auto-size parameter must be an integer, found `{}`", param.ty),
                    ));
                }

                Ok(Annotation::AutoSize {
                    target: target.clone(),
                })
            }

            AnnotationDecl::Check(src) => {
                let expr = Expr::parse(src).map_err(|e| invalid(src, e.to_string()))?;
                if !self.is_pointer_like(&param.ty) {
                    return Err(invalid(
                        src,
                        format!(
                            "checks apply to buffer parameters, `{}` is `{}`",
                            param.name, param.ty
                        ),
                    ));
                }
                self.check_operands(params, idx, &expr)
                    .map_err(|reason| invalid(src, reason))?;
                Ok(Annotation::Check(expr))
            }

            AnnotationDecl::Default(src) => {
                let expr = Expr::parse(src).map_err(|e| invalid(src, e.to_string()))?;
                self.check_operands(params, idx, &expr)
                    .map_err(|reason| invalid(src, reason))?;
                Ok(Annotation::Default(expr))
            }
        }
    }

    fn check_operands(&self, params: &[ParamDecl], idx: usize, expr: &Expr) -> Result<(), String> {
        for operand in expr.operands() {
            let j = self.position(params, operand.name(), idx)?;
            let other = &params[j];

            match operand {
                Operand::Value(name) => {
                    if other.direction != Direction::In {
                        return Err(format!("reads OUT parameter `{}`", name));
                    }
                    if !self.is_integer_like(&other.ty) {
                        return Err(format!(
                            "`{}` is `{}`, only integer parameters have a value",
                            name, other.ty
                        ));
                    }
                }
                Operand::Length(name) => {
                    if !self.is_pointer_like(&other.ty) {
                        return Err(format!("`length({})` needs a buffer parameter", name));
                    }
                }
            }
        }
        Ok(())
    }

    /// Index of the parameter named `name`, as seen from the parameter at `from`.
    fn position(&self, params: &[ParamDecl], name: &str, from: usize) -> Result<usize, String> {
        let j = params
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| format!("references unknown parameter `{}`", name))?;

        if j == from {
            return Err(format!("`{}` references itself", name));
        }
        if j > from && !self.options.allow_forward_references {
            return Err(format!(
                "references `{}`, which is declared after `{}`",
                name, params[from].name
            ));
        }
        Ok(j)
    }
}

#[cfg(test)]
mod tests {
    use crate::core::{CallbackDecl, FunctionDecl, ParamDecl, Primitive, TypeRef};
    use crate::registry::{DeclError, Registry, RegistryOptions};

    fn bytes() -> TypeRef {
        TypeRef::Primitive(Primitive::UChar).pointer()
    }

    fn registry() -> Registry {
        Registry::new("m")
    }

    fn expression_reason(err: DeclError) -> String {
        match err {
            DeclError::InvalidExpression { reason, .. } => reason,
            other => panic!("expected InvalidExpression, got {:?}", other),
        }
    }

    #[test]
    fn test_check_over_earlier_params() {
        let mut registry = registry();
        let f = registry
            .declare_function(
                FunctionDecl::new("Bake")
                    .param(ParamDecl::input("pw", TypeRef::INT))
                    .param(ParamDecl::input("ph", TypeRef::INT))
                    .param(ParamDecl::output("pixels", bytes()).check("pw * ph")),
            )
            .unwrap();
        let pixels = f.param("pixels").unwrap();
        assert_eq!(
            pixels.annotation.as_ref().map(|a| a.to_string()),
            Some("check(pw * ph)".to_string())
        );
    }

    #[test]
    fn test_check_with_unknown_name() {
        let mut registry = registry();
        let err = registry
            .declare_function(
                FunctionDecl::new("Bake")
                    .param(ParamDecl::input("pw", TypeRef::INT))
                    .param(ParamDecl::input("ph", TypeRef::INT))
                    .param(ParamDecl::output("pixels", bytes()).check("pw * px")),
            )
            .unwrap_err();
        match err {
            DeclError::InvalidExpression {
                descriptor,
                param,
                expr,
                reason,
                ..
            } => {
                assert_eq!(descriptor, "Bake");
                assert_eq!(param, "pixels");
                assert_eq!(expr, "pw * px");
                assert!(reason.contains("`px`"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_check_syntax_error() {
        let mut registry = registry();
        let err = registry
            .declare_function(
                FunctionDecl::new("f")
                    .param(ParamDecl::input("n", TypeRef::INT))
                    .param(ParamDecl::output("buf", bytes()).check("n +")),
            )
            .unwrap_err();
        assert!(matches!(err, DeclError::InvalidExpression { .. }));
    }

    #[test]
    fn test_auto_size_must_follow_target() {
        let decl = || {
            FunctionDecl::new("f")
                .param(ParamDecl::input("count", TypeRef::INT).auto_size("chardata"))
                .param(ParamDecl::output("chardata", bytes()))
        };

        let err = registry().declare_function(decl()).unwrap_err();
        assert!(expression_reason(err).contains("declared after `count`"));

        let mut relaxed = registry().with_options(RegistryOptions {
            allow_forward_references: true,
        });
        assert!(relaxed.declare_function(decl()).is_ok());
    }

    #[test]
    fn test_auto_size_after_target() {
        let mut registry = registry();
        registry
            .declare_function(
                FunctionDecl::new("f")
                    .param(ParamDecl::input("data", bytes()))
                    .param(ParamDecl::input("len", TypeRef::INT).auto_size("data")),
            )
            .unwrap();
    }

    #[test]
    fn test_auto_size_needs_buffer_target_and_integer_type() {
        let err = registry()
            .declare_function(
                FunctionDecl::new("f")
                    .param(ParamDecl::input("n", TypeRef::INT))
                    .param(ParamDecl::input("m", TypeRef::INT).auto_size("n")),
            )
            .unwrap_err();
        assert!(expression_reason(err).contains("not a buffer"));

        let err = registry()
            .declare_function(
                FunctionDecl::new("f")
                    .param(ParamDecl::input("data", bytes()))
                    .param(ParamDecl::input("scale", TypeRef::FLOAT).auto_size("data")),
            )
            .unwrap_err();
        assert!(expression_reason(err).contains("must be an integer"));
    }

    #[test]
    fn test_check_cannot_read_out_param() {
        let mut registry = registry();
        registry.declare_pointer("int_p", TypeRef::INT.pointer()).unwrap();
        // `n` is an OUT pointer, so `n` has no value at call time
        let err = registry
            .declare_function(
                FunctionDecl::new("f")
                    .param(ParamDecl::output("n", TypeRef::named("int_p")))
                    .param(ParamDecl::output("buf", bytes()).check("n")),
            )
            .unwrap_err();
        assert!(expression_reason(err).contains("OUT parameter `n`"));
    }

    #[test]
    fn test_check_only_on_buffers() {
        let err = registry()
            .declare_function(
                FunctionDecl::new("f")
                    .param(ParamDecl::input("n", TypeRef::INT))
                    .param(ParamDecl::input("m", TypeRef::INT).check("n")),
            )
            .unwrap_err();
        assert!(expression_reason(err).contains("buffer parameters"));
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let mut relaxed = registry().with_options(RegistryOptions {
            allow_forward_references: true,
        });
        let err = relaxed
            .declare_function(
                FunctionDecl::new("f").param(ParamDecl::input("n", TypeRef::INT).default_expr("n")),
            )
            .unwrap_err();
        assert!(expression_reason(err).contains("references itself"));
    }

    #[test]
    fn test_cyclic_defaults_are_rejected() {
        let mut relaxed = registry().with_options(RegistryOptions {
            allow_forward_references: true,
        });
        let err = relaxed
            .declare_function(
                FunctionDecl::new("f")
                    .param(ParamDecl::input("a", TypeRef::INT).default_expr("b"))
                    .param(ParamDecl::input("b", TypeRef::INT).default_expr("a")),
            )
            .unwrap_err();
        assert!(expression_reason(err).contains("depends on itself"));
        assert!(relaxed.is_empty());

        // A chain of defaults is fine
        relaxed
            .declare_function(
                FunctionDecl::new("g")
                    .param(ParamDecl::input("a", TypeRef::INT).default_expr("b * 2"))
                    .param(ParamDecl::input("b", TypeRef::INT).default_expr("c"))
                    .param(ParamDecl::input("c", TypeRef::INT)),
            )
            .unwrap();
    }

    #[test]
    fn test_default_constant() {
        let mut registry = registry();
        let f = registry
            .declare_function(
                FunctionDecl::new("f").param(ParamDecl::input("offset", TypeRef::INT).default_expr("0")),
            )
            .unwrap();
        assert!(f.params[0].annotation.is_some());
    }

    #[test]
    fn test_out_param_must_be_pointer() {
        let err = registry()
            .declare_function(FunctionDecl::new("f").param(ParamDecl::output("n", TypeRef::INT)))
            .unwrap_err();
        assert!(matches!(err, DeclError::InvalidSignature { site: Some(ref s), .. } if s == "n"));
    }

    #[test]
    fn test_out_param_through_pointer_alias() {
        let mut registry = registry();
        registry.declare_type(Primitive::UChar, "stbi_uc").unwrap();
        registry
            .declare_pointer("stbi_uc_p", TypeRef::named("stbi_uc"))
            .unwrap();
        registry
            .declare_function(
                FunctionDecl::new("f").param(ParamDecl::output("out", TypeRef::named("stbi_uc_p"))),
            )
            .unwrap();
    }

    #[test]
    fn test_callback_out_param_must_be_pointer() {
        let mut registry = registry();
        let err = registry
            .declare_callback(
                CallbackDecl::new("STBIReadCallback")
                    .param(ParamDecl::input("user", TypeRef::VOID.pointer()))
                    .param(ParamDecl::output("size", TypeRef::INT)),
            )
            .unwrap_err();
        assert!(matches!(err, DeclError::InvalidSignature { site: Some(ref s), .. } if s == "size"));
        assert!(registry.is_empty());

        registry
            .declare_callback(
                CallbackDecl::new("STBIReadCallback")
                    .param(ParamDecl::input("user", TypeRef::VOID.pointer()))
                    .param(ParamDecl::output("data", bytes())),
            )
            .unwrap();
    }

    #[test]
    fn test_callback_multiple_returns() {
        let err = registry()
            .declare_callback(
                CallbackDecl::new("cb")
                    .returns(TypeRef::INT)
                    .returns(TypeRef::INT),
            )
            .unwrap_err();
        assert!(matches!(err, DeclError::InvalidSignature { site: Some(ref s), .. } if s == "return"));
    }

    #[test]
    fn test_callback_unknown_types() {
        let err = registry()
            .declare_callback(
                CallbackDecl::new("cb").param(ParamDecl::input("user", TypeRef::named("missing_t"))),
            )
            .unwrap_err();
        assert_eq!(
            err,
            DeclError::UnknownType {
                module: "m".into(),
                descriptor: "cb".into(),
                site: "user".into(),
                type_name: "missing_t".into(),
            }
        );

        let err = registry()
            .declare_callback(CallbackDecl::new("cb").returns(TypeRef::named("stbi_uc")))
            .unwrap_err();
        assert!(matches!(err, DeclError::UnknownType { ref site, .. } if site == "return"));
    }

    #[test]
    fn test_duplicate_param_and_multiple_returns() {
        let err = registry()
            .declare_function(
                FunctionDecl::new("f")
                    .param(ParamDecl::input("a", TypeRef::INT))
                    .param(ParamDecl::input("a", TypeRef::INT)),
            )
            .unwrap_err();
        assert!(matches!(err, DeclError::InvalidSignature { .. }));

        let err = registry()
            .declare_function(
                FunctionDecl::new("f")
                    .returns(TypeRef::INT)
                    .returns(TypeRef::FLOAT),
            )
            .unwrap_err();
        assert!(err.to_string().contains("at most one"));
    }

    #[test]
    fn test_void_param_rejected_but_void_pointer_allowed() {
        let err = registry()
            .declare_function(FunctionDecl::new("f").param(ParamDecl::input("v", TypeRef::VOID)))
            .unwrap_err();
        assert!(matches!(err, DeclError::InvalidSignature { .. }));

        registry()
            .declare_function(
                FunctionDecl::new("f").param(ParamDecl::input("user", TypeRef::VOID.pointer())),
            )
            .unwrap();
    }

    #[test]
    fn test_integer_alias_counts_as_integer() {
        let mut registry = registry();
        registry.declare_type(Primitive::Size, "size_t_alias").unwrap();
        registry
            .declare_function(
                FunctionDecl::new("f")
                    .param(ParamDecl::input("data", bytes()))
                    .param(
                        ParamDecl::input("len", TypeRef::named("size_t_alias")).auto_size("data"),
                    ),
            )
            .unwrap();
    }
}
