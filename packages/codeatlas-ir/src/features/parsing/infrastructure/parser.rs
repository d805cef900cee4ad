//! Resilient tree-sitter parser
//!
//! Contract: syntactic failure never fails the parse. Error and missing
//! nodes become `ParseDiagnostic`s attached to a best-effort partial tree.
//! Resource caps (file size, AST depth) fail hard with `ResourceExceeded`.

use tree_sitter::{InputEdit, Parser as TsParser, Point, Tree};

use crate::features::parsing::domain::{ParseDiagnostic, ParsedTree, SourceEdit, SyntaxKind, SyntaxNode};
use crate::shared::models::{AtlasError, Result, Span};

/// Maximum file size accepted by the parser (10 MiB)
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Maximum AST nesting depth
pub const MAX_AST_DEPTH: usize = 100;

/// Supported languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    TypeScript,
}

impl Language {
    /// Detect language from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "py" | "pyi" => Some(Language::Python),
            "ts" | "tsx" => Some(Language::TypeScript),
            _ => None,
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit('.').next()?;
        Self::from_extension(ext)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::TypeScript => "typescript",
        }
    }

    fn ts_language(&self) -> tree_sitter::Language {
        match self {
            Language::Python => tree_sitter_python::language(),
            Language::TypeScript => tree_sitter_typescript::language_typescript(),
        }
    }
}

/// Resilient parser producing language-neutral trees
pub struct ResilientParser {
    language: Language,
}

impl ResilientParser {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    pub fn python() -> Self {
        Self::new(Language::Python)
    }

    pub fn typescript() -> Self {
        Self::new(Language::TypeScript)
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Parse source into a language-neutral tree.
    pub fn parse(&self, source: &str, file_path: &str) -> Result<ParsedTree> {
        self.check_size(source, file_path)?;
        let tree = self.ts_parse(source, None, file_path)?;
        self.convert_tree(&tree, source, file_path)
    }

    /// Incremental reparse: apply the edit between `old_source` and
    /// `new_source` to the previous tree so unchanged subtrees are reused.
    pub fn parse_incremental(
        &self,
        old_source: &str,
        new_source: &str,
        edit: SourceEdit,
        file_path: &str,
    ) -> Result<ParsedTree> {
        self.check_size(new_source, file_path)?;

        let mut old_tree = self.ts_parse(old_source, None, file_path)?;
        old_tree.edit(&InputEdit {
            start_byte: edit.start_byte,
            old_end_byte: edit.old_end_byte,
            new_end_byte: edit.new_end_byte,
            start_position: byte_to_point(old_source, edit.start_byte),
            old_end_position: byte_to_point(old_source, edit.old_end_byte),
            new_end_position: byte_to_point(new_source, edit.new_end_byte),
        });

        let tree = self.ts_parse(new_source, Some(&old_tree), file_path)?;
        self.convert_tree(&tree, new_source, file_path)
    }

    fn check_size(&self, source: &str, file_path: &str) -> Result<()> {
        if source.len() > MAX_FILE_SIZE {
            return Err(AtlasError::resource_exceeded(format!(
                "file exceeds {} byte cap ({} bytes)",
                MAX_FILE_SIZE,
                source.len()
            ))
            .with_file(file_path));
        }
        Ok(())
    }

    fn ts_parse(&self, source: &str, old_tree: Option<&Tree>, file_path: &str) -> Result<Tree> {
        let mut parser = TsParser::new();
        parser
            .set_language(&self.language.ts_language())
            .map_err(|e| AtlasError::internal(format!("failed to set language: {}", e)))?;

        parser
            .parse(source, old_tree)
            .ok_or_else(|| AtlasError::parse("parser produced no tree").with_file(file_path))
    }

    fn convert_tree(&self, tree: &Tree, source: &str, file_path: &str) -> Result<ParsedTree> {
        let ts_root = tree.root_node();
        let root = self.convert_node(&ts_root, source, 1, file_path)?;

        let mut errors = Vec::new();
        collect_errors(&ts_root, &mut errors);

        Ok(ParsedTree::new(
            root,
            source.to_string(),
            file_path.to_string(),
            self.language.name().to_string(),
        )
        .with_errors(errors))
    }

    fn convert_node(
        &self,
        node: &tree_sitter::Node,
        source: &str,
        depth: usize,
        file_path: &str,
    ) -> Result<SyntaxNode> {
        if depth > MAX_AST_DEPTH {
            return Err(AtlasError::resource_exceeded(format!(
                "AST depth exceeds cap of {}",
                MAX_AST_DEPTH
            ))
            .with_file(file_path)
            .with_line(node.start_position().row as u32 + 1));
        }

        // Anonymous tokens (keywords, punctuation) never map to structural
        // kinds; they are kept only for raw-kind and text lookups.
        let kind = if node.is_named() {
            self.map_node_kind(node.kind())
        } else {
            SyntaxKind::Other(node.kind().to_string())
        };
        let span = node_span(node);

        let text = if node.named_child_count() == 0 {
            Some(source.get(node.byte_range()).unwrap_or("").to_string())
        } else {
            None
        };

        let mut children = Vec::with_capacity(node.child_count());
        for i in 0..node.child_count() {
            if let Some(child) = node.child(i) {
                if child.is_extra() {
                    continue; // comments etc.
                }
                children.push(self.convert_node(&child, source, depth + 1, file_path)?);
            }
        }

        // Hoist decorators: `decorated_definition` wraps the definition in
        // Python; normalize so decorators are children of the definition.
        if node.kind() == "decorated_definition"
            && children.iter().any(|c| c.kind.is_definition())
        {
            let mut decorators = Vec::new();
            let mut definition = None;
            for child in children {
                if child.kind == SyntaxKind::Decorator {
                    decorators.push(child);
                } else if child.kind.is_definition() && definition.is_none() {
                    definition = Some(child);
                }
            }
            let mut def = definition.expect("checked above");
            decorators.extend(def.children);
            def.children = decorators;
            def.span = span;
            return Ok(def);
        }

        let mut out = SyntaxNode::new(kind, span)
            .with_raw_kind(node.kind())
            .with_children(children);
        if let Some(t) = text {
            out = out.with_text(t);
        }
        Ok(out)
    }

    fn map_node_kind(&self, ts_kind: &str) -> SyntaxKind {
        match self.language {
            Language::Python => map_python_kind(ts_kind),
            Language::TypeScript => map_typescript_kind(ts_kind),
        }
    }
}

fn node_span(node: &tree_sitter::Node) -> Span {
    Span::new(
        node.start_position().row as u32 + 1,
        node.start_position().column as u32,
        node.end_position().row as u32 + 1,
        node.end_position().column as u32,
    )
}

fn collect_errors(node: &tree_sitter::Node, errors: &mut Vec<ParseDiagnostic>) {
    if node.is_error() || node.is_missing() {
        errors.push(ParseDiagnostic {
            message: format!("syntax error near {:?}", node.kind()),
            span: node_span(node),
        });
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect_errors(&child, errors);
        }
    }
}

fn byte_to_point(source: &str, byte: usize) -> Point {
    let clamped = byte.min(source.len());
    let prefix = &source.as_bytes()[..clamped];
    let row = prefix.iter().filter(|&&b| b == b'\n').count();
    let col = prefix
        .iter()
        .rev()
        .take_while(|&&b| b != b'\n')
        .count();
    Point::new(row, col)
}

fn map_python_kind(ts_kind: &str) -> SyntaxKind {
    match ts_kind {
        "function_definition" => SyntaxKind::FunctionDef,
        "class_definition" => SyntaxKind::ClassDef,
        "lambda" => SyntaxKind::LambdaDef,

        "assignment" | "augmented_assignment" => SyntaxKind::AssignmentStmt,
        "parameter" | "default_parameter" | "typed_parameter" | "typed_default_parameter" => {
            SyntaxKind::ParameterDecl
        }
        "import_statement" | "import_from_statement" => SyntaxKind::ImportDecl,

        "call" => SyntaxKind::CallExpr,
        "identifier" => SyntaxKind::NameExpr,
        "attribute" => SyntaxKind::AttributeExpr,
        "string" | "integer" | "float" | "true" | "false" | "none" => SyntaxKind::LiteralExpr,
        "binary_operator" | "comparison_operator" => SyntaxKind::BinaryExpr,
        "boolean_operator" => SyntaxKind::BooleanExpr,
        "unary_operator" | "not_operator" => SyntaxKind::UnaryExpr,
        "list_comprehension" | "set_comprehension" | "dictionary_comprehension"
        | "generator_expression" => SyntaxKind::ComprehensionExpr,

        "return_statement" => SyntaxKind::ReturnStmt,
        "if_statement" | "conditional_expression" => SyntaxKind::IfStmt,
        "for_statement" => SyntaxKind::ForStmt,
        "while_statement" => SyntaxKind::WhileStmt,
        "try_statement" => SyntaxKind::TryStmt,
        "except_clause" => SyntaxKind::ExceptClause,
        "finally_clause" => SyntaxKind::FinallyClause,
        "with_statement" => SyntaxKind::WithStmt,
        "match_statement" => SyntaxKind::MatchStmt,
        "case_clause" => SyntaxKind::MatchCase,

        "break_statement" => SyntaxKind::BreakStmt,
        "continue_statement" => SyntaxKind::ContinueStmt,
        "raise_statement" => SyntaxKind::RaiseStmt,
        "yield" => SyntaxKind::YieldExpr,
        "await" => SyntaxKind::AwaitExpr,

        "block" | "module" => SyntaxKind::Block,
        "decorator" => SyntaxKind::Decorator,
        "type" => SyntaxKind::TypeAnnotation,

        other => SyntaxKind::Other(other.to_string()),
    }
}

fn map_typescript_kind(ts_kind: &str) -> SyntaxKind {
    match ts_kind {
        "function_declaration" | "function_expression" | "generator_function_declaration" => {
            SyntaxKind::FunctionDef
        }
        "class_declaration" => SyntaxKind::ClassDef,
        "method_definition" => SyntaxKind::MethodDef,
        "arrow_function" => SyntaxKind::LambdaDef,

        "variable_declarator" => SyntaxKind::VariableDecl,
        "required_parameter" | "optional_parameter" => SyntaxKind::ParameterDecl,
        "import_statement" => SyntaxKind::ImportDecl,
        "public_field_definition" => SyntaxKind::FieldDecl,

        "call_expression" | "new_expression" => SyntaxKind::CallExpr,
        "identifier" | "property_identifier" => SyntaxKind::NameExpr,
        "member_expression" => SyntaxKind::AttributeExpr,
        "string" | "number" | "true" | "false" | "null" | "undefined" | "template_string" => {
            SyntaxKind::LiteralExpr
        }
        "binary_expression" => SyntaxKind::BinaryExpr,
        "unary_expression" => SyntaxKind::UnaryExpr,

        "assignment_expression" | "lexical_declaration" | "variable_declaration" => {
            SyntaxKind::AssignmentStmt
        }
        "return_statement" => SyntaxKind::ReturnStmt,
        "if_statement" | "ternary_expression" => SyntaxKind::IfStmt,
        "for_statement" | "for_in_statement" => SyntaxKind::ForStmt,
        "while_statement" | "do_statement" => SyntaxKind::WhileStmt,
        "try_statement" => SyntaxKind::TryStmt,
        "catch_clause" => SyntaxKind::ExceptClause,
        "finally_clause" => SyntaxKind::FinallyClause,
        "switch_statement" => SyntaxKind::MatchStmt,
        "switch_case" => SyntaxKind::MatchCase,

        "break_statement" => SyntaxKind::BreakStmt,
        "continue_statement" => SyntaxKind::ContinueStmt,
        "throw_statement" => SyntaxKind::RaiseStmt,
        "yield_expression" => SyntaxKind::YieldExpr,
        "await_expression" => SyntaxKind::AwaitExpr,

        "statement_block" | "program" | "class_body" => SyntaxKind::Block,
        "decorator" => SyntaxKind::Decorator,
        "type_annotation" => SyntaxKind::TypeAnnotation,

        other => SyntaxKind::Other(other.to_string()),
    }
}
