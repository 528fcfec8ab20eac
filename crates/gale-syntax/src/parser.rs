use crate::lexer::{lex, TokKind, Token};
use crate::tree::*;
use crate::ParseError;

/// Parse a whole compilation unit.
pub fn parse_compilation_unit(text: &str) -> Result<CompUnit, ParseError> {
    let tokens = lex(text)?;
    Parser { tokens, pos: 0 }.compilation_unit()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&TokKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn nth(&self, n: usize) -> Option<&TokKind> {
        self.tokens.get(self.pos + n).map(|t| &t.kind)
    }

    fn current_pos(&self) -> u32 {
        self.tokens
            .get(self.pos)
            .map(|t| t.pos)
            .unwrap_or_else(|| self.tokens.last().map(|t| t.pos).unwrap_or(0))
    }

    fn bump(&mut self) -> Option<TokKind> {
        let tok = self.tokens.get(self.pos)?.kind.clone();
        self.pos += 1;
        Some(tok)
    }

    fn at(&self, kind: &TokKind) -> bool {
        self.peek() == Some(kind)
    }

    fn at_ident(&self, text: &str) -> bool {
        matches!(self.peek(), Some(TokKind::Ident(s)) if s == text)
    }

    fn nth_is_ident(&self, n: usize, text: &str) -> bool {
        matches!(self.nth(n), Some(TokKind::Ident(s)) if s == text)
    }

    fn eat(&mut self, kind: &TokKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, text: &str) -> bool {
        if self.at_ident(text) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokKind, what: &str) -> Result<(), ParseError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.fail(format!("expected {what}")))
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(TokKind::Ident(s)) => {
                let s = s.clone();
                self.pos += 1;
                Ok(s)
            }
            _ => Err(self.fail("expected identifier")),
        }
    }

    fn fail(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.current_pos(), message)
    }

    /// Consume a `>` where generics need one, splitting `>>`, `>>>`, and
    /// `>=` tokens in place.
    fn close_angle(&mut self) -> Result<(), ParseError> {
        let Some(tok) = self.tokens.get_mut(self.pos) else {
            return Err(self.fail("expected `>`"));
        };
        match tok.kind {
            TokKind::Gt => {
                self.pos += 1;
                Ok(())
            }
            TokKind::Shr => {
                tok.pos += 1;
                tok.kind = TokKind::Gt;
                Ok(())
            }
            TokKind::UShr => {
                tok.pos += 1;
                tok.kind = TokKind::Shr;
                Ok(())
            }
            TokKind::Ge => {
                tok.pos += 1;
                tok.kind = TokKind::Assign;
                Ok(())
            }
            _ => Err(self.fail("expected `>`")),
        }
    }

    fn compilation_unit(&mut self) -> Result<CompUnit, ParseError> {
        let mut unit = CompUnit::default();

        // Leading annotations belong either to a package declaration
        // (package-info.java) or to the first type declaration.
        let mut pending_annotations = Vec::new();
        while self.at(&TokKind::At) && !self.nth_is_ident(1, "interface") {
            self.pos += 1;
            pending_annotations.push(self.annotation()?);
        }

        if self.at_ident("package") {
            let pos = self.current_pos();
            self.pos += 1;
            let name = self.qualified_name()?;
            self.expect(&TokKind::Semi, "`;`")?;
            unit.package = Some(PkgDecl {
                pos,
                annotations: std::mem::take(&mut pending_annotations),
                name,
            });
        }

        while self.at_ident("import") {
            if !pending_annotations.is_empty() {
                return Err(self.fail("annotations are not allowed on imports"));
            }
            let pos = self.current_pos();
            self.pos += 1;
            let is_static = self.eat_ident("static");
            let mut name = vec![self.ident()?];
            let mut wildcard = false;
            while self.eat(&TokKind::Dot) {
                if self.eat(&TokKind::Star) {
                    wildcard = true;
                    break;
                }
                name.push(self.ident()?);
            }
            self.expect(&TokKind::Semi, "`;`")?;
            unit.imports.push(ImportDecl {
                pos,
                is_static,
                wildcard,
                name,
            });
        }

        if self.at_ident("module") || (self.at_ident("open") && self.nth_is_ident(1, "module")) {
            unit.module = Some(self.module_decl()?);
            if self.peek().is_some() {
                return Err(self.fail("unexpected input after module declaration"));
            }
            return Ok(unit);
        }

        let mut first = true;
        while self.peek().is_some() {
            if self.eat(&TokKind::Semi) {
                continue;
            }
            let (mut annotations, mods) = self.annotations_and_modifiers()?;
            if first && !pending_annotations.is_empty() {
                pending_annotations.append(&mut annotations);
                annotations = std::mem::take(&mut pending_annotations);
            }
            first = false;
            unit.types.push(self.type_decl(annotations, mods)?);
        }

        Ok(unit)
    }

    fn module_decl(&mut self) -> Result<ModDecl, ParseError> {
        let pos = self.current_pos();
        let open = self.eat_ident("open");
        if !self.eat_ident("module") {
            return Err(self.fail("expected `module`"));
        }
        let name = self.qualified_name()?;
        self.expect(&TokKind::LBrace, "`{`")?;

        let mut directives = Vec::new();
        while !self.eat(&TokKind::RBrace) {
            if self.eat_ident("requires") {
                let mut transitive = false;
                let mut static_phase = false;
                // `transitive` and `static` are contextual; a bare
                // `requires transitive;` requires one lookahead.
                loop {
                    if self.at_ident("transitive") && !matches!(self.nth(1), Some(TokKind::Semi)) {
                        self.pos += 1;
                        transitive = true;
                    } else if self.at_ident("static")
                        && !matches!(self.nth(1), Some(TokKind::Semi))
                    {
                        self.pos += 1;
                        static_phase = true;
                    } else {
                        break;
                    }
                }
                let module = self.qualified_name()?;
                self.expect(&TokKind::Semi, "`;`")?;
                directives.push(ModDirective::Requires {
                    transitive,
                    static_phase,
                    module,
                });
            } else if self.eat_ident("exports") {
                let package = self.qualified_name()?;
                let to = self.module_target_list()?;
                directives.push(ModDirective::Exports { package, to });
            } else if self.eat_ident("opens") {
                let package = self.qualified_name()?;
                let to = self.module_target_list()?;
                directives.push(ModDirective::Opens { package, to });
            } else if self.eat_ident("uses") {
                let service = self.qualified_name()?;
                self.expect(&TokKind::Semi, "`;`")?;
                directives.push(ModDirective::Uses { service });
            } else if self.eat_ident("provides") {
                let service = self.qualified_name()?;
                if !self.eat_ident("with") {
                    return Err(self.fail("expected `with`"));
                }
                let mut implementations = vec![self.qualified_name()?];
                while self.eat(&TokKind::Comma) {
                    implementations.push(self.qualified_name()?);
                }
                self.expect(&TokKind::Semi, "`;`")?;
                directives.push(ModDirective::Provides {
                    service,
                    implementations,
                });
            } else {
                return Err(self.fail("expected module directive"));
            }
        }

        Ok(ModDecl {
            pos,
            open,
            name,
            directives,
        })
    }

    fn module_target_list(&mut self) -> Result<Vec<Vec<String>>, ParseError> {
        let mut to = Vec::new();
        if self.eat_ident("to") {
            to.push(self.qualified_name()?);
            while self.eat(&TokKind::Comma) {
                to.push(self.qualified_name()?);
            }
        }
        self.expect(&TokKind::Semi, "`;`")?;
        Ok(to)
    }

    fn qualified_name(&mut self) -> Result<Vec<String>, ParseError> {
        let mut name = vec![self.ident()?];
        while self.at(&TokKind::Dot) && matches!(self.nth(1), Some(TokKind::Ident(_))) {
            self.pos += 1;
            name.push(self.ident()?);
        }
        Ok(name)
    }

    fn annotations_and_modifiers(&mut self) -> Result<(Vec<AnnoExpr>, Modifiers), ParseError> {
        let mut annotations = Vec::new();
        let mut mods = Modifiers::default();
        loop {
            if self.at(&TokKind::At) && !self.nth_is_ident(1, "interface") {
                self.pos += 1;
                annotations.push(self.annotation()?);
                continue;
            }
            let flag = match self.peek() {
                Some(TokKind::Ident(s)) => match s.as_str() {
                    "public" => Modifiers::PUBLIC,
                    "protected" => Modifiers::PROTECTED,
                    "private" => Modifiers::PRIVATE,
                    "static" => Modifiers::STATIC,
                    "final" => Modifiers::FINAL,
                    "abstract" => Modifiers::ABSTRACT,
                    "native" => Modifiers::NATIVE,
                    "synchronized" => Modifiers::SYNCHRONIZED,
                    "transient" => Modifiers::TRANSIENT,
                    "volatile" => Modifiers::VOLATILE,
                    "strictfp" => Modifiers::STRICTFP,
                    "default" => Modifiers::DEFAULT,
                    "sealed" => Modifiers::SEALED,
                    "non" if matches!(self.nth(1), Some(TokKind::Minus))
                        && self.nth_is_ident(2, "sealed") =>
                    {
                        self.pos += 2;
                        Modifiers::NON_SEALED
                    }
                    _ => break,
                },
                _ => break,
            };
            self.pos += 1;
            mods.insert(flag);
        }
        Ok((annotations, mods))
    }

    /// An annotation use; the leading `@` is already consumed.
    fn annotation(&mut self) -> Result<AnnoExpr, ParseError> {
        let pos = self.current_pos();
        let name = self.qualified_name()?;
        let mut args = Vec::new();
        if self.eat(&TokKind::LParen) {
            if !self.at(&TokKind::RParen) {
                loop {
                    // `name = value` vs the single-element shorthand.
                    let key = if matches!(self.peek(), Some(TokKind::Ident(_)))
                        && matches!(self.nth(1), Some(TokKind::Assign))
                    {
                        let key = self.ident()?;
                        self.pos += 1;
                        Some(key)
                    } else {
                        None
                    };
                    let value = self.element_value()?;
                    args.push((key, value));
                    if !self.eat(&TokKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokKind::RParen, "`)`")?;
        }
        Ok(AnnoExpr { pos, name, args })
    }

    fn element_value(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some(TokKind::At) => {
                self.pos += 1;
                Ok(Expr::Anno(self.annotation()?))
            }
            Some(TokKind::LBrace) => {
                let pos = self.current_pos();
                self.pos += 1;
                let mut elements = Vec::new();
                if !self.at(&TokKind::RBrace) {
                    loop {
                        if self.at(&TokKind::RBrace) {
                            break; // trailing comma
                        }
                        elements.push(self.element_value()?);
                        if !self.eat(&TokKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokKind::RBrace, "`}`")?;
                Ok(Expr::ArrayInit { pos, elements })
            }
            _ => self.expression(),
        }
    }

    fn type_decl(
        &mut self,
        annotations: Vec<AnnoExpr>,
        mods: Modifiers,
    ) -> Result<TyDecl, ParseError> {
        let pos = self.current_pos();
        let kind = if self.eat_ident("class") {
            TyKind::Class
        } else if self.eat_ident("interface") {
            TyKind::Interface
        } else if self.eat_ident("enum") {
            TyKind::Enum
        } else if self.at(&TokKind::At) && self.nth_is_ident(1, "interface") {
            self.pos += 2;
            TyKind::Annotation
        } else if self.at_ident("record") && matches!(self.nth(1), Some(TokKind::Ident(_))) {
            self.pos += 1;
            TyKind::Record
        } else {
            return Err(self.fail("expected type declaration"));
        };

        let name = self.ident()?;
        let type_params = self.type_params_if_present()?;

        let mut decl = TyDecl {
            pos,
            annotations,
            mods,
            kind,
            name,
            type_params,
            extends: None,
            implements: Vec::new(),
            components: Vec::new(),
            enum_constants: Vec::new(),
            members: Vec::new(),
        };

        if kind == TyKind::Record {
            self.expect(&TokKind::LParen, "`(`")?;
            if !self.at(&TokKind::RParen) {
                loop {
                    decl.components.push(self.formal_parameter()?.0);
                    if !self.eat(&TokKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(&TokKind::RParen, "`)`")?;
        }

        if self.eat_ident("extends") {
            if kind == TyKind::Interface {
                // Interfaces may extend several interfaces; they lower to
                // the implements list.
                decl.implements.push(self.named_type()?);
                while self.eat(&TokKind::Comma) {
                    decl.implements.push(self.named_type()?);
                }
            } else {
                decl.extends = Some(self.named_type()?);
            }
        }
        if self.eat_ident("implements") {
            decl.implements.push(self.named_type()?);
            while self.eat(&TokKind::Comma) {
                decl.implements.push(self.named_type()?);
            }
        }
        if self.eat_ident("permits") {
            // Permits lists don't survive into headers; parse and drop.
            self.named_type()?;
            while self.eat(&TokKind::Comma) {
                self.named_type()?;
            }
        }

        self.expect(&TokKind::LBrace, "`{`")?;

        if kind == TyKind::Enum {
            self.enum_constants(&mut decl)?;
        }

        while !self.eat(&TokKind::RBrace) {
            if self.peek().is_none() {
                return Err(self.fail("unexpected end of input in type body"));
            }
            if self.eat(&TokKind::Semi) {
                continue;
            }
            decl.members.extend(self.member(&decl.name)?);
        }

        Ok(decl)
    }

    fn enum_constants(&mut self, decl: &mut TyDecl) -> Result<(), ParseError> {
        loop {
            if self.at(&TokKind::Semi) || self.at(&TokKind::RBrace) {
                break;
            }
            let mut annotations = Vec::new();
            while self.eat(&TokKind::At) {
                annotations.push(self.annotation()?);
            }
            let pos = self.current_pos();
            let name = self.ident()?;
            if self.at(&TokKind::LParen) {
                self.skip_balanced(&TokKind::LParen, &TokKind::RParen)?;
            }
            let has_body = self.at(&TokKind::LBrace);
            if has_body {
                // Constant bodies are anonymous classes; headers never see them.
                self.skip_balanced(&TokKind::LBrace, &TokKind::RBrace)?;
            }
            decl.enum_constants.push(EnumConstant {
                pos,
                annotations,
                name,
                has_body,
            });
            if !self.eat(&TokKind::Comma) {
                break;
            }
        }
        // The constant list may end the body or be followed by members.
        self.eat(&TokKind::Semi);
        Ok(())
    }

    /// Parse one member declaration. Returns an empty list for initializer
    /// blocks, and one field per declarator for multi-declarator fields.
    fn member(&mut self, enclosing_name: &str) -> Result<Vec<Member>, ParseError> {
        let (annotations, mods) = self.annotations_and_modifiers()?;

        // Initializer blocks (static or instance) have no header footprint.
        if self.at(&TokKind::LBrace) {
            self.skip_balanced(&TokKind::LBrace, &TokKind::RBrace)?;
            return Ok(Vec::new());
        }

        if self.at_ident("class")
            || self.at_ident("interface")
            || self.at_ident("enum")
            || (self.at(&TokKind::At) && self.nth_is_ident(1, "interface"))
            || (self.at_ident("record") && matches!(self.nth(1), Some(TokKind::Ident(_))))
        {
            return Ok(vec![Member::Type(self.type_decl(annotations, mods)?)]);
        }

        let pos = self.current_pos();
        let type_params = self.type_params_if_present()?;

        // Compact record constructors (`Name { ... }`) contribute nothing the
        // canonical constructor synthesis doesn't already cover.
        if self.at_ident(enclosing_name) && matches!(self.nth(1), Some(TokKind::LBrace)) {
            self.pos += 1;
            self.skip_balanced(&TokKind::LBrace, &TokKind::RBrace)?;
            return Ok(Vec::new());
        }

        // Constructors: the "type" is the enclosing class name, immediately
        // followed by the parameter list.
        if self.at_ident(enclosing_name) && matches!(self.nth(1), Some(TokKind::LParen)) {
            let name = self.ident()?;
            return Ok(vec![Member::Method(self.method_rest(
                pos,
                annotations,
                mods,
                type_params,
                TypeRef::Void,
                name,
                true,
            )?)]);
        }

        let ty = if self.eat_ident("void") {
            TypeRef::Void
        } else {
            self.type_ref()?
        };
        let name = self.ident()?;

        if self.at(&TokKind::LParen) {
            return Ok(vec![Member::Method(self.method_rest(
                pos,
                annotations,
                mods,
                type_params,
                ty,
                name,
                false,
            )?)]);
        }

        if !type_params.is_empty() {
            return Err(self.fail("type parameters are only allowed on methods"));
        }

        // Field declarator list; each declarator becomes its own member.
        let mut fields = Vec::new();
        let mut current_name = name;
        loop {
            let mut field_ty = ty.clone();
            while self.eat(&TokKind::LBracket) {
                self.expect(&TokKind::RBracket, "`]`")?;
                field_ty = TypeRef::Array {
                    elem: Box::new(field_ty),
                    annotations: Vec::new(),
                };
            }
            let init = if self.eat(&TokKind::Assign) {
                self.variable_initializer()
            } else {
                None
            };
            fields.push(Member::Field(FieldDecl {
                pos,
                annotations: annotations.clone(),
                mods,
                ty: field_ty,
                name: current_name,
                init,
            }));
            if self.eat(&TokKind::Comma) {
                current_name = self.ident()?;
            } else {
                break;
            }
        }
        self.expect(&TokKind::Semi, "`;`")?;
        Ok(fields)
    }

    /// Parse an initializer, recovering (to `None`) when it uses expression
    /// forms headers don't evaluate, e.g. method calls or `new`.
    fn variable_initializer(&mut self) -> Option<Expr> {
        let save = self.pos;
        let parsed = if self.at(&TokKind::LBrace) {
            self.element_value()
        } else {
            self.expression()
        };
        match parsed {
            Ok(expr)
                if matches!(self.peek(), Some(TokKind::Comma) | Some(TokKind::Semi)) =>
            {
                Some(expr)
            }
            _ => {
                self.pos = save;
                self.skip_initializer();
                None
            }
        }
    }

    /// Skip to the `,` or `;` terminating a declarator, balancing brackets.
    fn skip_initializer(&mut self) {
        let mut depth = 0usize;
        while let Some(kind) = self.peek() {
            match kind {
                TokKind::LParen | TokKind::LBrace | TokKind::LBracket => depth += 1,
                TokKind::RParen | TokKind::RBrace | TokKind::RBracket => {
                    depth = depth.saturating_sub(1)
                }
                TokKind::Comma | TokKind::Semi if depth == 0 => return,
                _ => {}
            }
            self.pos += 1;
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn method_rest(
        &mut self,
        pos: u32,
        annotations: Vec<AnnoExpr>,
        mods: Modifiers,
        type_params: Vec<TyParamDecl>,
        return_ty: TypeRef,
        name: String,
        is_constructor: bool,
    ) -> Result<MethodDecl, ParseError> {
        self.expect(&TokKind::LParen, "`(`")?;
        let mut params = Vec::new();
        let mut varargs = false;
        if !self.at(&TokKind::RParen) {
            loop {
                let (param, is_varargs) = self.formal_parameter()?;
                varargs |= is_varargs;
                params.push(param);
                if !self.eat(&TokKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokKind::RParen, "`)`")?;

        let mut return_ty = return_ty;
        while self.eat(&TokKind::LBracket) {
            self.expect(&TokKind::RBracket, "`]`")?;
            return_ty = TypeRef::Array {
                elem: Box::new(return_ty),
                annotations: Vec::new(),
            };
        }

        let mut throws = Vec::new();
        if self.eat_ident("throws") {
            throws.push(self.named_type()?);
            while self.eat(&TokKind::Comma) {
                throws.push(self.named_type()?);
            }
        }

        let mut default_value = None;
        if self.eat_ident("default") {
            default_value = Some(self.element_value()?);
            self.expect(&TokKind::Semi, "`;`")?;
        } else if self.at(&TokKind::LBrace) {
            self.skip_balanced(&TokKind::LBrace, &TokKind::RBrace)?;
        } else {
            self.expect(&TokKind::Semi, "`;`")?;
        }

        Ok(MethodDecl {
            pos,
            annotations,
            mods,
            type_params,
            return_ty,
            name,
            is_constructor,
            params,
            varargs,
            throws,
            default_value,
        })
    }

    fn formal_parameter(&mut self) -> Result<(VarDecl, bool), ParseError> {
        let pos = self.current_pos();
        let (annotations, mut mods) = self.annotations_and_modifiers()?;
        mods.0 &= Modifiers::FINAL; // only `final` is legal on parameters
        let mut ty = self.type_ref()?;
        let varargs = self.eat(&TokKind::Ellipsis);
        if varargs {
            ty = TypeRef::Array {
                elem: Box::new(ty),
                annotations: Vec::new(),
            };
        }
        let name = self.ident()?;
        let mut ty = ty;
        while self.eat(&TokKind::LBracket) {
            self.expect(&TokKind::RBracket, "`]`")?;
            ty = TypeRef::Array {
                elem: Box::new(ty),
                annotations: Vec::new(),
            };
        }
        Ok((
            VarDecl {
                pos,
                annotations,
                mods,
                ty,
                name,
            },
            varargs,
        ))
    }

    fn type_params_if_present(&mut self) -> Result<Vec<TyParamDecl>, ParseError> {
        if !self.eat(&TokKind::Lt) {
            return Ok(Vec::new());
        }
        let mut params = Vec::new();
        loop {
            let pos = self.current_pos();
            let mut annotations = Vec::new();
            while self.eat(&TokKind::At) {
                annotations.push(self.annotation()?);
            }
            let name = self.ident()?;
            let mut bounds = Vec::new();
            if self.eat_ident("extends") {
                bounds.push(self.named_type()?);
                while self.eat(&TokKind::Amp) {
                    bounds.push(self.named_type()?);
                }
            }
            params.push(TyParamDecl {
                pos,
                annotations,
                name,
                bounds,
            });
            if !self.eat(&TokKind::Comma) {
                break;
            }
        }
        self.close_angle()?;
        Ok(params)
    }

    fn named_type(&mut self) -> Result<NamedTy, ParseError> {
        match self.type_ref()? {
            TypeRef::Named(named) => Ok(named),
            _ => Err(self.fail("expected class or interface type")),
        }
    }

    fn type_ref(&mut self) -> Result<TypeRef, ParseError> {
        let mut leading = Vec::new();
        while self.eat(&TokKind::At) {
            leading.push(self.annotation()?);
        }

        let pos = self.current_pos();
        let mut ty = if let Some(TokKind::Ident(name)) = self.peek() {
            if let Some(kind) = prim_kind(name) {
                self.pos += 1;
                TypeRef::Prim {
                    pos,
                    kind,
                    annotations: leading,
                }
            } else {
                let mut segments = Vec::new();
                let mut seg_annotations = leading;
                loop {
                    let name = self.ident()?;
                    let type_args = self.type_args_if_present()?;
                    segments.push(TySegment {
                        name,
                        annotations: std::mem::take(&mut seg_annotations),
                        type_args,
                    });
                    if self.at(&TokKind::Dot) {
                        // Stop at `.class` and other non-name continuations.
                        let mut n = 1;
                        while matches!(self.nth(n), Some(TokKind::At)) {
                            // Skip only simple type annotations in lookahead.
                            n += 2;
                        }
                        if !matches!(self.nth(n), Some(TokKind::Ident(s)) if s != "class") {
                            break;
                        }
                        self.pos += 1;
                        while self.eat(&TokKind::At) {
                            seg_annotations.push(self.annotation()?);
                        }
                    } else {
                        break;
                    }
                }
                TypeRef::Named(NamedTy { pos, segments })
            }
        } else {
            return Err(self.fail("expected type"));
        };

        loop {
            let mut bracket_annotations = Vec::new();
            let mut n = 0;
            while matches!(self.nth(n), Some(TokKind::At)) {
                n += 2;
            }
            if !matches!(self.nth(n), Some(TokKind::LBracket)) {
                break;
            }
            while self.eat(&TokKind::At) {
                bracket_annotations.push(self.annotation()?);
            }
            self.expect(&TokKind::LBracket, "`[`")?;
            self.expect(&TokKind::RBracket, "`]`")?;
            ty = TypeRef::Array {
                elem: Box::new(ty),
                annotations: bracket_annotations,
            };
        }

        Ok(ty)
    }

    fn type_args_if_present(&mut self) -> Result<Vec<TypeArg>, ParseError> {
        if !self.eat(&TokKind::Lt) {
            return Ok(Vec::new());
        }
        let mut args = Vec::new();
        if self.at(&TokKind::Gt) {
            // Diamond; headers never emit it but tolerate the syntax.
            self.pos += 1;
            return Ok(args);
        }
        loop {
            if self.at(&TokKind::Question)
                || (self.at(&TokKind::At) && {
                    let mut n = 0;
                    while matches!(self.nth(n), Some(TokKind::At)) {
                        n += 2;
                    }
                    matches!(self.nth(n), Some(TokKind::Question))
                })
            {
                let mut annotations = Vec::new();
                while self.eat(&TokKind::At) {
                    annotations.push(self.annotation()?);
                }
                self.expect(&TokKind::Question, "`?`")?;
                if self.eat_ident("extends") {
                    args.push(TypeArg::WildUpper {
                        bound: self.type_ref()?,
                        annotations,
                    });
                } else if self.eat_ident("super") {
                    args.push(TypeArg::WildLower {
                        bound: self.type_ref()?,
                        annotations,
                    });
                } else {
                    args.push(TypeArg::Wild { annotations });
                }
            } else {
                args.push(TypeArg::Ty(self.type_ref()?));
            }
            if !self.eat(&TokKind::Comma) {
                break;
            }
        }
        self.close_angle()?;
        Ok(args)
    }

    // ---- expressions -------------------------------------------------------

    fn expression(&mut self) -> Result<Expr, ParseError> {
        let pos = self.current_pos();
        let cond = self.binary(0)?;
        if self.eat(&TokKind::Question) {
            let then = self.expression()?;
            self.expect(&TokKind::Colon, "`:`")?;
            let els = self.expression()?;
            Ok(Expr::Conditional {
                pos,
                cond: Box::new(cond),
                then: Box::new(then),
                els: Box::new(els),
            })
        } else {
            Ok(cond)
        }
    }

    fn binary(&mut self, min_level: u8) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let Some((op, level)) = self.peek().and_then(bin_op) else { break };
            if level < min_level {
                break;
            }
            let pos = self.current_pos();
            self.pos += 1;
            let rhs = self.binary(level + 1)?;
            lhs = Expr::Binary {
                pos,
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.current_pos();
        let op = match self.peek() {
            Some(TokKind::Plus) => Some(UnOp::Plus),
            Some(TokKind::Minus) => Some(UnOp::Neg),
            Some(TokKind::Tilde) => Some(UnOp::BitNot),
            Some(TokKind::Bang) => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            return Ok(Expr::Unary {
                pos,
                op,
                expr: Box::new(self.unary()?),
            });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let pos = self.current_pos();
        match self.peek() {
            Some(TokKind::Literal(value)) => {
                let value = value.clone();
                self.pos += 1;
                Ok(Expr::Literal { pos, value })
            }
            Some(TokKind::LParen) => self.paren_or_cast(),
            Some(TokKind::Ident(name)) => {
                if prim_kind(name).is_some() || name == "void" {
                    return self.class_literal();
                }
                let mut segments = vec![self.ident()?];
                loop {
                    if !self.at(&TokKind::Dot) {
                        break;
                    }
                    match self.nth(1) {
                        Some(TokKind::Ident(s)) if s == "class" => {
                            self.pos += 2;
                            let ty = TypeRef::Named(NamedTy {
                                pos,
                                segments: segments
                                    .into_iter()
                                    .map(|name| TySegment {
                                        name,
                                        annotations: Vec::new(),
                                        type_args: Vec::new(),
                                    })
                                    .collect(),
                            });
                            return Ok(Expr::ClassLit { pos, ty });
                        }
                        Some(TokKind::Ident(_)) => {
                            self.pos += 1;
                            segments.push(self.ident()?);
                        }
                        _ => break,
                    }
                }
                if self.at(&TokKind::LBracket) && matches!(self.nth(1), Some(TokKind::RBracket)) {
                    return self.array_class_literal(
                        pos,
                        TypeRef::Named(NamedTy {
                            pos,
                            segments: segments
                                .into_iter()
                                .map(|name| TySegment {
                                    name,
                                    annotations: Vec::new(),
                                    type_args: Vec::new(),
                                })
                                .collect(),
                        }),
                    );
                }
                Ok(Expr::Name { pos, segments })
            }
            _ => Err(self.fail("expected expression")),
        }
    }

    /// `int.class`, `void.class`, `long[].class`, ...
    fn class_literal(&mut self) -> Result<Expr, ParseError> {
        let pos = self.current_pos();
        let name = self.ident()?;
        let ty = if name == "void" {
            TypeRef::Void
        } else {
            TypeRef::Prim {
                pos,
                kind: prim_kind(&name).expect("checked by caller"),
                annotations: Vec::new(),
            }
        };
        if self.at(&TokKind::LBracket) {
            return self.array_class_literal(pos, ty);
        }
        self.expect(&TokKind::Dot, "`.`")?;
        if !self.eat_ident("class") {
            return Err(self.fail("expected `class`"));
        }
        Ok(Expr::ClassLit { pos, ty })
    }

    fn array_class_literal(&mut self, pos: u32, mut ty: TypeRef) -> Result<Expr, ParseError> {
        while self.eat(&TokKind::LBracket) {
            self.expect(&TokKind::RBracket, "`]`")?;
            ty = TypeRef::Array {
                elem: Box::new(ty),
                annotations: Vec::new(),
            };
        }
        self.expect(&TokKind::Dot, "`.`")?;
        if !self.eat_ident("class") {
            return Err(self.fail("expected `class`"));
        }
        Ok(Expr::ClassLit { pos, ty })
    }

    fn paren_or_cast(&mut self) -> Result<Expr, ParseError> {
        let pos = self.current_pos();
        let save = self.pos;
        self.expect(&TokKind::LParen, "`(`")?;

        // Try a cast first: `(type) unary`.
        if let Ok(ty) = self.type_ref() {
            if self.at(&TokKind::RParen) {
                let is_prim_cast = matches!(ty, TypeRef::Prim { .. } | TypeRef::Array { .. });
                let next_starts_operand = match self.nth(1) {
                    Some(TokKind::Literal(_))
                    | Some(TokKind::LParen)
                    | Some(TokKind::Tilde)
                    | Some(TokKind::Bang) => true,
                    Some(TokKind::Ident(_)) => true,
                    // `(int) -1` is a cast; `(x) - 1` is subtraction.
                    Some(TokKind::Plus) | Some(TokKind::Minus) => is_prim_cast,
                    _ => false,
                };
                if next_starts_operand {
                    self.pos += 1; // `)`
                    let expr = self.unary()?;
                    return Ok(Expr::Cast {
                        pos,
                        ty,
                        expr: Box::new(expr),
                    });
                }
            }
        }

        self.pos = save;
        self.expect(&TokKind::LParen, "`(`")?;
        let inner = self.expression()?;
        self.expect(&TokKind::RParen, "`)`")?;
        Ok(inner)
    }

    // ---- utilities ---------------------------------------------------------

    fn skip_balanced(&mut self, open: &TokKind, close: &TokKind) -> Result<(), ParseError> {
        let start = self.current_pos();
        self.expect(open, "opening delimiter")?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                None => return Err(ParseError::new(start, "unbalanced delimiters")),
                Some(kind) if kind == open => depth += 1,
                Some(kind) if kind == close => depth -= 1,
                // Nested `{}` inside `()` (array literals in ctor args) and
                // vice versa nest without interaction at this level.
                Some(_) => {}
            }
            self.pos += 1;
        }
        Ok(())
    }
}

fn prim_kind(name: &str) -> Option<PrimKind> {
    Some(match name {
        "boolean" => PrimKind::Boolean,
        "byte" => PrimKind::Byte,
        "short" => PrimKind::Short,
        "int" => PrimKind::Int,
        "long" => PrimKind::Long,
        "char" => PrimKind::Char,
        "float" => PrimKind::Float,
        "double" => PrimKind::Double,
        _ => return None,
    })
}

fn bin_op(kind: &TokKind) -> Option<(BinOp, u8)> {
    Some(match kind {
        TokKind::PipePipe => (BinOp::Or, 0),
        TokKind::AmpAmp => (BinOp::And, 1),
        TokKind::Pipe => (BinOp::BitOr, 2),
        TokKind::Caret => (BinOp::BitXor, 3),
        TokKind::Amp => (BinOp::BitAnd, 4),
        TokKind::EqEq => (BinOp::Eq, 5),
        TokKind::NotEq => (BinOp::Ne, 5),
        TokKind::Lt => (BinOp::Lt, 6),
        TokKind::Gt => (BinOp::Gt, 6),
        TokKind::Le => (BinOp::Le, 6),
        TokKind::Ge => (BinOp::Ge, 6),
        TokKind::Shl => (BinOp::Shl, 7),
        TokKind::Shr => (BinOp::Shr, 7),
        TokKind::UShr => (BinOp::UShr, 7),
        TokKind::Plus => (BinOp::Add, 8),
        TokKind::Minus => (BinOp::Sub, 8),
        TokKind::Star => (BinOp::Mul, 9),
        TokKind::Slash => (BinOp::Div, 9),
        TokKind::Percent => (BinOp::Rem, 9),
        _ => return None,
    })
}
