//! Recursive descent parser for executable GraphQL documents.

use crate::ast::*;
use crate::lexer::{block_string_value, string_value, Lexer};
use crate::token::{Token, TokenKind};
use gqlx_core::{diagnostics::codes, DiagnosticBag, LineIndex, Span};

/// Names that begin a top-level definition.
const DEFINITION_KEYWORDS: &[&str] = &[
    "query",
    "mutation",
    "subscription",
    "fragment",
    "extend",
    "schema",
    "scalar",
    "type",
    "interface",
    "union",
    "enum",
    "input",
    "directive",
];

/// Parser for executable GraphQL documents.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    source: &'a str,
    current: Token,
    /// End offset of the last consumed token.
    last_end: u32,
    diagnostics: DiagnosticBag,
}

/// Result of parsing.
#[derive(Debug)]
pub struct ParseResult {
    pub document: Document,
    pub diagnostics: DiagnosticBag,
}

impl ParseResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Parses a source string into a document.
#[must_use]
pub fn parse(source: &str) -> ParseResult {
    let mut parser = Parser::new(source);
    let document = parser.parse_document();
    ParseResult {
        document,
        diagnostics: parser.diagnostics,
    }
}

impl<'a> Parser<'a> {
    /// Creates a new parser.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            source,
            current,
            last_end: 0,
            diagnostics: DiagnosticBag::new(),
        }
    }

    #[inline]
    fn at(&self) -> TokenKind {
        self.current.kind
    }

    #[inline]
    fn at_kind(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    /// Returns true if the current token is the name `keyword`.
    fn at_keyword(&self, keyword: &str) -> bool {
        self.at_kind(TokenKind::Name) && self.current_text() == keyword
    }

    fn advance(&mut self) {
        self.last_end = self.current.span.end;
        self.current = self.lexer.next_token();
    }

    fn expect(&mut self, kind: TokenKind) -> bool {
        if self.at_kind(kind) {
            self.advance();
            true
        } else {
            self.error_expected(&format!("`{kind}`"));
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.advance();
            true
        } else {
            self.error_expected(&format!("`{keyword}`"));
            false
        }
    }

    fn current_text(&self) -> &'a str {
        self.lexer.span_text(self.current.span)
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.last_end.max(start))
    }

    fn error(&mut self, span: Span, message: &str) {
        self.diagnostics
            .error(codes::INVALID_SYNTAX, "invalid syntax", span, message);
    }

    fn error_expected(&mut self, expected: &str) {
        if self.at_kind(TokenKind::Eof) {
            self.diagnostics.error(
                codes::UNEXPECTED_EOF,
                "unexpected end of input",
                self.current.span,
                format!("expected {expected}"),
            );
            return;
        }

        let found = match self.at() {
            TokenKind::Name => format!("`{}`", self.current_text()),
            TokenKind::Error => format!("invalid token `{}`", self.current_text()),
            kind if kind.is_literal() => kind.as_str().to_string(),
            kind => format!("`{kind}`"),
        };
        self.diagnostics.error(
            codes::UNEXPECTED_TOKEN,
            "unexpected token",
            self.current.span,
            format!("expected {expected}, found {found}"),
        );
    }

    /// Parses items until `close` (or EOF), skipping a token whenever an
    /// item makes no progress.
    fn list_until<T>(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> Option<T>,
    ) -> Vec<T> {
        let mut items = Vec::new();
        while !self.at_kind(close) && !self.at_kind(TokenKind::Eof) {
            let before = self.current.span;
            if let Some(node) = item(self) {
                items.push(node);
            }
            if self.current.span == before {
                self.advance();
            }
        }
        items
    }

    /// Parses a document.
    pub fn parse_document(&mut self) -> Document {
        let mut definitions = Vec::new();

        while !self.at_kind(TokenKind::Eof) {
            let before = self.current.span;
            if let Some(def) = self.parse_definition() {
                definitions.push(def);
            }
            if self.current.span == before {
                // Recovery: skip the offending token
                self.advance();
            }
        }

        Document {
            definitions,
            span: Span::new(0, self.source.len() as u32),
            line_index: LineIndex::new(self.source),
        }
    }

    fn parse_definition(&mut self) -> Option<Definition> {
        match self.at() {
            TokenKind::LBrace => Some(Definition::Operation(self.parse_operation())),
            TokenKind::StringLiteral | TokenKind::BlockStringLiteral => {
                // Descriptions only precede type-system definitions
                let start = self.current.span.start;
                self.advance();
                self.parse_type_system_definition(start, false)
            }
            TokenKind::Name => {
                let text = self.current_text();
                if OperationType::from_keyword(text).is_some() {
                    Some(Definition::Operation(self.parse_operation()))
                } else if text == "fragment" {
                    Some(Definition::Fragment(self.parse_fragment_definition()))
                } else if text == "extend" {
                    let start = self.current.span.start;
                    self.advance();
                    self.parse_type_system_definition(start, true)
                } else {
                    let start = self.current.span.start;
                    self.parse_type_system_definition(start, false)
                }
            }
            _ => {
                self.error_expected("a definition");
                None
            }
        }
    }

    /// Recognises a type-system definition and skips over its body.
    fn parse_type_system_definition(&mut self, start: u32, extension: bool) -> Option<Definition> {
        let kind = if self.at_kind(TokenKind::Name) {
            TypeSystemKind::from_keyword(self.current_text())
        } else {
            None
        };
        let Some(kind) = kind else {
            self.error_expected("a definition");
            return None;
        };
        self.advance();

        let name = match kind {
            TypeSystemKind::Schema => None,
            TypeSystemKind::Directive => {
                self.expect(TokenKind::At);
                Some(self.parse_name())
            }
            _ => Some(self.parse_name()),
        };

        self.skip_type_system_body(kind);

        Some(Definition::TypeSystem(TypeSystemDefinition {
            kind,
            extension,
            name,
            span: self.span_from(start),
        }))
    }

    fn skip_type_system_body(&mut self, kind: TypeSystemKind) {
        let mut depth = 0u32;

        loop {
            match self.at() {
                TokenKind::Eof => return,
                TokenKind::LBrace
                    if depth == 0
                        && matches!(
                            kind,
                            TypeSystemKind::Scalar
                                | TypeSystemKind::Union
                                | TypeSystemKind::Directive
                        ) =>
                {
                    // No body for these kinds; an anonymous query follows
                    return;
                }
                TokenKind::StringLiteral | TokenKind::BlockStringLiteral if depth == 0 => return,
                TokenKind::Name
                    if depth == 0 && DEFINITION_KEYWORDS.contains(&self.current_text()) =>
                {
                    return;
                }
                TokenKind::LBrace | TokenKind::LParen | TokenKind::LBracket => depth += 1,
                TokenKind::RBrace | TokenKind::RParen | TokenKind::RBracket => {
                    let closes_body = self.at_kind(TokenKind::RBrace) && depth <= 1;
                    depth = depth.saturating_sub(1);
                    if closes_body {
                        self.advance();
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn parse_name(&mut self) -> Name {
        if self.at_kind(TokenKind::Name) {
            let name = Name {
                value: self.current_text().to_string(),
                span: self.current.span,
            };
            self.advance();
            name
        } else {
            self.error_expected("a name");
            Name {
                value: String::new(),
                span: Span::empty(self.current.span.start),
            }
        }
    }

    fn parse_operation(&mut self) -> OperationDefinition {
        let start = self.current.span.start;

        if self.at_kind(TokenKind::LBrace) {
            let selection_set = self.parse_selection_set();
            return OperationDefinition {
                operation: OperationType::Query,
                name: None,
                variable_definitions: Vec::new(),
                directives: Vec::new(),
                selection_set,
                span: self.span_from(start),
            };
        }

        let operation = OperationType::from_keyword(self.current_text()).unwrap_or(OperationType::Query);
        self.advance();

        let name = if self.at_kind(TokenKind::Name) {
            Some(self.parse_name())
        } else {
            None
        };

        let variable_definitions = if self.at_kind(TokenKind::LParen) {
            self.advance();
            let vars = self.list_until(TokenKind::RParen, Self::parse_variable_definition);
            self.expect(TokenKind::RParen);
            vars
        } else {
            Vec::new()
        };

        let directives = self.parse_directives(false);
        let selection_set = self.parse_selection_set();

        OperationDefinition {
            operation,
            name,
            variable_definitions,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    fn parse_variable_definition(&mut self) -> Option<VariableDefinition> {
        let start = self.current.span.start;
        if !self.at_kind(TokenKind::Dollar) {
            self.error_expected("a variable");
            return None;
        }
        self.advance();

        let mut variable = self.parse_name();
        variable.span = self.span_from(start);

        self.expect(TokenKind::Colon);
        let ty = self.parse_type();

        let default_value = if self.at_kind(TokenKind::Eq) {
            self.advance();
            Some(self.parse_value(true))
        } else {
            None
        };

        let directives = self.parse_directives(true);

        Some(VariableDefinition {
            variable,
            ty,
            default_value,
            directives,
            span: self.span_from(start),
        })
    }

    fn parse_type(&mut self) -> Type {
        let start = self.current.span.start;

        let ty = if self.at_kind(TokenKind::LBracket) {
            self.advance();
            let inner = self.parse_type();
            self.expect(TokenKind::RBracket);
            Type::List(Box::new(inner), self.span_from(start))
        } else {
            Type::Named(self.parse_name())
        };

        if self.at_kind(TokenKind::Bang) {
            self.advance();
            Type::NonNull(Box::new(ty), self.span_from(start))
        } else {
            ty
        }
    }

    fn parse_fragment_definition(&mut self) -> FragmentDefinition {
        let start = self.current.span.start;
        self.advance(); // fragment

        if self.at_keyword("on") {
            let span = self.current.span;
            self.error(span, "a fragment cannot be named `on`");
        }
        let name = self.parse_name();
        self.expect_keyword("on");
        let type_condition = self.parse_name();
        let directives = self.parse_directives(false);
        let selection_set = self.parse_selection_set();

        FragmentDefinition {
            name,
            type_condition,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    fn parse_selection_set(&mut self) -> SelectionSet {
        let start = self.current.span.start;
        if !self.expect(TokenKind::LBrace) {
            return SelectionSet {
                selections: Vec::new(),
                span: Span::empty(start),
            };
        }

        let selections = self.list_until(TokenKind::RBrace, Self::parse_selection);
        if selections.is_empty() {
            let span = self.current.span;
            self.error(span, "a selection set cannot be empty");
        }
        self.expect(TokenKind::RBrace);

        SelectionSet {
            selections,
            span: self.span_from(start),
        }
    }

    fn parse_selection(&mut self) -> Option<Selection> {
        match self.at() {
            TokenKind::Spread => Some(self.parse_fragment_selection()),
            TokenKind::Name => Some(Selection::Field(self.parse_field())),
            _ => {
                self.error_expected("a selection");
                None
            }
        }
    }

    fn parse_fragment_selection(&mut self) -> Selection {
        let start = self.current.span.start;
        self.advance(); // ...

        if self.at_keyword("on") {
            self.advance();
            let type_condition = Some(self.parse_name());
            let directives = self.parse_directives(false);
            let selection_set = self.parse_selection_set();
            Selection::InlineFragment(InlineFragment {
                type_condition,
                directives,
                selection_set,
                span: self.span_from(start),
            })
        } else if self.at_kind(TokenKind::LBrace) || self.at_kind(TokenKind::At) {
            let directives = self.parse_directives(false);
            let selection_set = self.parse_selection_set();
            Selection::InlineFragment(InlineFragment {
                type_condition: None,
                directives,
                selection_set,
                span: self.span_from(start),
            })
        } else {
            let fragment_name = self.parse_name();
            let directives = self.parse_directives(false);
            Selection::FragmentSpread(FragmentSpread {
                fragment_name,
                directives,
                span: self.span_from(start),
            })
        }
    }

    fn parse_field(&mut self) -> Field {
        let start = self.current.span.start;

        let first_name = self.parse_name();
        let (alias, name) = if self.at_kind(TokenKind::Colon) {
            self.advance();
            (Some(first_name), self.parse_name())
        } else {
            (None, first_name)
        };

        let arguments = self.parse_arguments(false);
        let directives = self.parse_directives(false);

        let selection_set = if self.at_kind(TokenKind::LBrace) {
            Some(self.parse_selection_set())
        } else {
            None
        };

        Field {
            alias,
            name,
            arguments,
            directives,
            selection_set,
            span: self.span_from(start),
        }
    }

    fn parse_arguments(&mut self, constant: bool) -> Vec<Argument> {
        if !self.at_kind(TokenKind::LParen) {
            return Vec::new();
        }
        self.advance();
        let args = self.list_until(TokenKind::RParen, |p| p.parse_argument(constant));
        self.expect(TokenKind::RParen);
        args
    }

    fn parse_argument(&mut self, constant: bool) -> Option<Argument> {
        if !self.at_kind(TokenKind::Name) {
            self.error_expected("an argument name");
            return None;
        }
        let start = self.current.span.start;
        let name = self.parse_name();
        self.expect(TokenKind::Colon);
        let value = self.parse_value(constant);
        Some(Argument {
            name,
            value,
            span: self.span_from(start),
        })
    }

    fn parse_directives(&mut self, constant: bool) -> Vec<Directive> {
        let mut directives = Vec::new();
        while self.at_kind(TokenKind::At) {
            let start = self.current.span.start;
            self.advance(); // @
            let name = self.parse_name();
            let arguments = self.parse_arguments(constant);
            directives.push(Directive {
                name,
                arguments,
                span: self.span_from(start),
            });
        }
        directives
    }

    /// Parses a value. Variables are rejected when `constant` is set.
    fn parse_value(&mut self, constant: bool) -> Value {
        let start = self.current.span.start;
        let span = self.current.span;

        match self.at() {
            TokenKind::Dollar => {
                self.advance();
                let mut name = self.parse_name();
                name.span = self.span_from(start);
                if constant {
                    self.error(name.span, "variables are not allowed in constant values");
                }
                Value::Variable(name)
            }
            TokenKind::IntLiteral => {
                let value = self.current_text().parse::<i64>();
                self.advance();
                let n = match value {
                    Ok(n) => n,
                    Err(_) => {
                        self.error(span, "integer literal is out of range");
                        0
                    }
                };
                Value::Int(n, span)
            }
            TokenKind::FloatLiteral => {
                let value = self.current_text().parse::<f64>().unwrap_or(0.0);
                self.advance();
                Value::Float(value, span)
            }
            TokenKind::StringLiteral => {
                let decoded = string_value(self.current_text());
                self.advance();
                match decoded {
                    Ok(s) => Value::String(s, span),
                    Err(message) => {
                        self.error(span, &message);
                        Value::String(String::new(), span)
                    }
                }
            }
            TokenKind::BlockStringLiteral => {
                let value = block_string_value(self.current_text());
                self.advance();
                Value::String(value, span)
            }
            TokenKind::Name => match self.current_text() {
                "true" => {
                    self.advance();
                    Value::Boolean(true, span)
                }
                "false" => {
                    self.advance();
                    Value::Boolean(false, span)
                }
                "null" => {
                    self.advance();
                    Value::Null(span)
                }
                _ => Value::Enum(self.parse_name()),
            },
            TokenKind::LBracket => {
                self.advance();
                let values = self.list_until(TokenKind::RBracket, |p| Some(p.parse_value(constant)));
                self.expect(TokenKind::RBracket);
                Value::List(values, self.span_from(start))
            }
            TokenKind::LBrace => {
                self.advance();
                let fields = self.list_until(TokenKind::RBrace, |p| {
                    if !p.at_kind(TokenKind::Name) {
                        p.error_expected("an object field");
                        return None;
                    }
                    let name = p.parse_name();
                    p.expect(TokenKind::Colon);
                    Some((name, p.parse_value(constant)))
                });
                self.expect(TokenKind::RBrace);
                Value::Object(fields, self.span_from(start))
            }
            _ => {
                self.error_expected("a value");
                Value::Null(Span::empty(start))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Document {
        let result = parse(source);
        assert!(
            !result.has_errors(),
            "unexpected diagnostics: {:?}",
            result.diagnostics.iter().collect::<Vec<_>>()
        );
        result.document
    }

    fn first_operation(doc: &Document) -> &OperationDefinition {
        doc.operations().next().expect("operation")
    }

    fn field(selection: &Selection) -> &Field {
        match selection {
            Selection::Field(f) => f,
            other => panic!("expected field, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_anonymous_query() {
        let doc = parse_ok("{ name }");
        let op = first_operation(&doc);
        assert_eq!(op.operation, OperationType::Query);
        assert!(op.name.is_none());
        assert_eq!(op.name_str(), "");
        assert_eq!(field(&op.selection_set.selections[0]).name.value, "name");
    }

    #[test]
    fn test_parse_named_operations() {
        let doc = parse_ok("query A { a } mutation B { b } subscription C { c }");
        let ops: Vec<_> = doc
            .operations()
            .map(|op| (op.operation, op.name_str().to_string()))
            .collect();
        assert_eq!(
            ops,
            vec![
                (OperationType::Query, "A".to_string()),
                (OperationType::Mutation, "B".to_string()),
                (OperationType::Subscription, "C".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_field_details() {
        let doc = parse_ok(r#"{ user: node(id: "4", first: 10) @include(if: $show) { id } }"#);
        let f = field(&first_operation(&doc).selection_set.selections[0]);

        assert_eq!(f.response_key(), "user");
        assert_eq!(f.name.value, "node");
        assert_eq!(f.arguments.len(), 2);
        assert!(matches!(&f.argument("id").unwrap().value, Value::String(s, _) if s == "4"));
        assert!(matches!(f.argument("first").unwrap().value, Value::Int(10, _)));
        assert_eq!(f.directives[0].name.value, "include");
        assert!(matches!(
            &f.directives[0].argument("if").unwrap().value,
            Value::Variable(v) if v.value == "show"
        ));
        assert_eq!(f.selection_set.as_ref().unwrap().selections.len(), 1);
    }

    #[test]
    fn test_parse_variable_definitions() {
        let doc = parse_ok("query Q($id: ID!, $tags: [String!] = [\"a\"], $n: Int = 3) { a }");
        let vars = &first_operation(&doc).variable_definitions;

        assert_eq!(vars.len(), 3);
        assert_eq!(vars[0].variable.value, "id");
        assert_eq!(vars[0].ty.to_string(), "ID!");
        assert_eq!(vars[1].ty.to_string(), "[String!]");
        assert!(matches!(&vars[1].default_value, Some(Value::List(items, _)) if items.len() == 1));
        assert!(matches!(vars[2].default_value, Some(Value::Int(3, _))));
    }

    #[test]
    fn test_parse_fragments() {
        let doc = parse_ok(
            r"
            query {
                ...UserFields
                ... on Query { name }
                ... @skip(if: true) { id }
            }
            fragment UserFields on Query { id }
            ",
        );

        let selections = &first_operation(&doc).selection_set.selections;
        assert!(matches!(
            &selections[0],
            Selection::FragmentSpread(s) if s.fragment_name.value == "UserFields"
        ));
        assert!(matches!(
            &selections[1],
            Selection::InlineFragment(f) if f.type_condition.as_ref().unwrap().value == "Query"
        ));
        assert!(matches!(
            &selections[2],
            Selection::InlineFragment(f) if f.type_condition.is_none() && f.directives.len() == 1
        ));

        let frag = doc.fragments().next().unwrap();
        assert_eq!(frag.name.value, "UserFields");
        assert_eq!(frag.type_condition.value, "Query");
    }

    #[test]
    fn test_keywords_are_contextual() {
        let doc = parse_ok("{ query { fragment on type } }");
        let outer = field(&first_operation(&doc).selection_set.selections[0]);
        assert_eq!(outer.name.value, "query");

        let inner: Vec<_> = outer
            .selection_set
            .as_ref()
            .unwrap()
            .selections
            .iter()
            .map(|s| field(s).name.value.as_str())
            .collect();
        assert_eq!(inner, vec!["fragment", "on", "type"]);
    }

    #[test]
    fn test_parse_values() {
        let doc = parse_ok(
            r#"{ f(a: -1.5e3, b: true, c: null, d: RED, e: {x: [1, 2], y: """  block  """}) }"#,
        );
        let f = field(&first_operation(&doc).selection_set.selections[0]);

        assert!(matches!(f.argument("a").unwrap().value, Value::Float(v, _) if v == -1500.0));
        assert!(matches!(f.argument("b").unwrap().value, Value::Boolean(true, _)));
        assert!(matches!(f.argument("c").unwrap().value, Value::Null(_)));
        assert!(matches!(&f.argument("d").unwrap().value, Value::Enum(n) if n.value == "RED"));

        let Value::Object(fields, _) = &f.argument("e").unwrap().value else {
            panic!("expected object");
        };
        assert_eq!(fields[0].0.value, "x");
        assert!(matches!(&fields[0].1, Value::List(items, _) if items.len() == 2));
        assert!(matches!(&fields[1].1, Value::String(s, _) if s == "  block  "));
    }

    #[test]
    fn test_type_system_definitions_are_recognised() {
        let doc = parse_ok(
            r#"
            "The root"
            type Query implements Node @key(fields: "id") { id: ID! name(arg: Int = 1): String }
            union Result = A | B
            scalar Date
            extend type Query { extra: Int }
            directive @auth(role: String) on FIELD_DEFINITION | OBJECT
            { name }
            "#,
        );

        let kinds: Vec<_> = doc.definitions.iter().map(Definition::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "ObjectTypeDefinition",
                "UnionTypeDefinition",
                "ScalarTypeDefinition",
                "ObjectTypeExtension",
                "DirectiveDefinition",
                "OperationDefinition",
            ]
        );
    }

    #[test]
    fn test_locations() {
        let doc = parse_ok("{\n  name\n}");
        let f = field(&first_operation(&doc).selection_set.selections[0]);
        let loc = doc.location(f.span).unwrap();
        assert_eq!((loc.line, loc.column), (2, 3));
    }

    #[test]
    fn test_unexpected_eof() {
        let result = parse("{ name");
        assert!(result.has_errors());
        let diag = result.diagnostics.errors().next().unwrap();
        assert_eq!(diag.code, codes::UNEXPECTED_EOF);
    }

    #[test]
    fn test_unexpected_token_recovers() {
        let result = parse("{ a } ) { b }");
        assert_eq!(result.diagnostics.error_count(), 1);
        let diag = result.diagnostics.errors().next().unwrap();
        assert_eq!(diag.code, codes::UNEXPECTED_TOKEN);
        assert_eq!(result.document.operations().count(), 2);
    }

    #[test]
    fn test_variable_in_constant_is_invalid() {
        let result = parse("query ($a: Int = $b) { f }");
        let diag = result.diagnostics.errors().next().unwrap();
        assert_eq!(diag.code, codes::INVALID_SYNTAX);
    }

    #[test]
    fn test_empty_selection_set_is_invalid() {
        let result = parse("{ }");
        assert!(result.has_errors());
    }
}
