//! Semantic highlighting from a tree-sitter parse tree
//!
//! A depth-first walk over named leaf nodes, a fixed node-kind to
//! token-kind table, and an LSP delta encoder. Parse trees are treated as
//! immutable input; there is no incremental state between documents.

pub mod grammar;

use lsp_types::{SemanticToken, SemanticTokenType};
use tree_sitter::{Node, Parser, Point, Tree};

use crate::error::GrammarError;
use grammar::Grammar;

/// Token categories the editor legend exposes, in legend order. A token's
/// `token_type` is its index here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Comment,
    Keyword,
    String,
    Number,
    Function,
    Type,
    Variable,
    Operator,
    Property,
}

/// Legend order, as a client registers it.
pub const TOKEN_KINDS: [TokenKind; 9] = [
    TokenKind::Comment,
    TokenKind::Keyword,
    TokenKind::String,
    TokenKind::Number,
    TokenKind::Function,
    TokenKind::Type,
    TokenKind::Variable,
    TokenKind::Operator,
    TokenKind::Property,
];

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Comment => "comment",
            TokenKind::Keyword => "keyword",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::Function => "function",
            TokenKind::Type => "type",
            TokenKind::Variable => "variable",
            TokenKind::Operator => "operator",
            TokenKind::Property => "property",
        }
    }

    pub fn as_lsp_type(&self) -> SemanticTokenType {
        match self {
            TokenKind::Comment => SemanticTokenType::COMMENT,
            TokenKind::Keyword => SemanticTokenType::KEYWORD,
            TokenKind::String => SemanticTokenType::STRING,
            TokenKind::Number => SemanticTokenType::NUMBER,
            TokenKind::Function => SemanticTokenType::FUNCTION,
            TokenKind::Type => SemanticTokenType::TYPE,
            TokenKind::Variable => SemanticTokenType::VARIABLE,
            TokenKind::Operator => SemanticTokenType::OPERATOR,
            TokenKind::Property => SemanticTokenType::PROPERTY,
        }
    }
}

/// The legend a client registers before consuming encoded tokens.
pub fn legend() -> Vec<SemanticTokenType> {
    TOKEN_KINDS.iter().map(TokenKind::as_lsp_type).collect()
}

/// Leaf node kinds of the ctrmml grammar and the category they highlight
/// as. Kinds absent here stay unhighlighted.
const NODE_TOKEN_MAP: &[(&str, TokenKind)] = &[
    ("comment", TokenKind::Comment),
    ("platform_command_keyword", TokenKind::Keyword),
    ("string", TokenKind::String),
    ("number", TokenKind::Number),
    ("meta_keyword", TokenKind::Keyword),
    ("meta_platform_value", TokenKind::Keyword),
    ("meta_value", TokenKind::String),
    ("at_command", TokenKind::Function),
    ("track_selector", TokenKind::Type),
    ("instrument_type", TokenKind::Type),
    ("note", TokenKind::Variable),
    ("rest", TokenKind::Variable),
    ("command_with_number", TokenKind::Keyword),
    ("command", TokenKind::Keyword),
    ("escape_command", TokenKind::Keyword),
    ("operator", TokenKind::Operator),
    ("punctuation", TokenKind::Operator),
    ("param_key", TokenKind::Property),
];

/// Token category a leaf node kind highlights as, if any.
pub fn token_kind_for_node(kind: &str) -> Option<TokenKind> {
    lookup(NODE_TOKEN_MAP, kind)
}

fn lookup(map: &[(&str, TokenKind)], kind: &str) -> Option<TokenKind> {
    map.iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, token)| *token)
}

/// A highlighted source span before LSP encoding. Positions are tree-sitter
/// points: zero-based rows and byte columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSpan {
    pub start: Point,
    pub end: Point,
    pub kind: TokenKind,
}

/// Collect highlight spans from every mapped named leaf of `tree`, in
/// document order.
pub fn collect_spans(tree: &Tree, source: &str) -> Vec<TokenSpan> {
    collect_spans_in(tree, source, NODE_TOKEN_MAP)
}

fn collect_spans_in(tree: &Tree, source: &str, map: &[(&str, TokenKind)]) -> Vec<TokenSpan> {
    let mut spans = Vec::new();
    visit(tree.root_node(), source, map, &mut spans);
    spans
}

fn visit(node: Node<'_>, source: &str, map: &[(&str, TokenKind)], spans: &mut Vec<TokenSpan>) {
    if !node.is_named() {
        return;
    }
    if node.named_child_count() == 0 {
        if let Some(span) = leaf_span(&node, source, map) {
            spans.push(span);
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        visit(child, source, map, spans);
    }
}

fn leaf_span(node: &Node<'_>, source: &str, map: &[(&str, TokenKind)]) -> Option<TokenSpan> {
    let kind = lookup(map, node.kind())?;
    let start_byte = node.start_byte();
    let end_byte = node.end_byte();

    let (start, text) = if trims_leading_whitespace(node.kind()) {
        let (offset, point) =
            advance_over_whitespace(&source[start_byte..end_byte], node.start_position());
        if start_byte + offset >= end_byte {
            return None;
        }
        (point, &source[start_byte + offset..end_byte])
    } else {
        (node.start_position(), &source[start_byte..end_byte])
    };

    Some(TokenSpan {
        start,
        end: node.end_position(),
        kind: resolve_token_kind(node.kind(), text, kind),
    })
}

/// Meta values begin right after the separator, so the grammar hands them
/// over with the separator's trailing whitespace attached.
fn trims_leading_whitespace(node_kind: &str) -> bool {
    matches!(node_kind, "meta_value" | "meta_platform_value")
}

/// `noextpitch` reads as a keyword even though the grammar labels it a
/// plain meta value.
fn resolve_token_kind(node_kind: &str, text: &str, kind: TokenKind) -> TokenKind {
    if node_kind == "meta_value" && text.trim() == "noextpitch" {
        return TokenKind::Keyword;
    }
    kind
}

/// Advance `point` across the leading whitespace of `text`, returning the
/// byte offset of the first non-whitespace character together with its
/// position.
fn advance_over_whitespace(text: &str, mut point: Point) -> (usize, Point) {
    let mut offset = 0;
    for ch in text.chars() {
        if !ch.is_whitespace() {
            break;
        }
        offset += ch.len_utf8();
        if ch == '\n' {
            point.row += 1;
            point.column = 0;
        } else {
            point.column += ch.len_utf8();
        }
    }
    (offset, point)
}

/// Delta-encode spans into LSP semantic tokens. Spans must arrive in
/// document order. Columns and lengths are UTF-16 code units, per the
/// protocol default; a span crossing lines becomes one token per line.
pub fn encode(spans: &[TokenSpan], source: &str) -> Vec<SemanticToken> {
    let lines: Vec<&str> = source.split('\n').collect();
    let mut tokens = Vec::new();
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;

    for span in spans {
        let mut row = span.start.row;
        let mut start_byte = span.start.column;
        while row <= span.end.row {
            let Some(line) = lines.get(row) else { break };
            let start_byte_clamped = start_byte.min(line.len());
            let end_byte = if row == span.end.row {
                span.end.column.min(line.len())
            } else {
                line.len()
            };
            if end_byte > start_byte_clamped {
                let start = utf16_len(&line[..start_byte_clamped]);
                let length = utf16_len(&line[start_byte_clamped..end_byte]);
                let line_index = row as u32;
                let delta_line = line_index - prev_line;
                let delta_start = if delta_line == 0 { start - prev_start } else { start };
                tokens.push(SemanticToken {
                    delta_line,
                    delta_start,
                    length,
                    token_type: span.kind as u32,
                    token_modifiers_bitset: 0,
                });
                prev_line = line_index;
                prev_start = start;
            }
            row += 1;
            start_byte = 0;
        }
    }
    tokens
}

fn utf16_len(text: &str) -> u32 {
    text.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Computes highlight tokens for ctrmml documents.
///
/// Holds the grammar handle it was given; a fresh parser is created per
/// document, so one highlighter serves any number of call sites without
/// locking.
pub struct Highlighter {
    grammar: Grammar,
}

impl Highlighter {
    pub fn new(grammar: Grammar) -> Self {
        Self { grammar }
    }

    /// Raw highlight spans for `source`. A document the parser gives up on
    /// yields no spans rather than an error.
    pub fn spans(&self, source: &str) -> Result<Vec<TokenSpan>, GrammarError> {
        let language = self.grammar.language()?;
        let mut parser = Parser::new();
        parser
            .set_language(language)
            .map_err(|err| GrammarError::Load(err.to_string()))?;
        match parser.parse(source, None) {
            Some(tree) => Ok(collect_spans(&tree, source)),
            None => Ok(Vec::new()),
        }
    }

    /// LSP-encoded semantic tokens for `source`.
    pub fn tokens(&self, source: &str) -> Result<Vec<SemanticToken>, GrammarError> {
        Ok(encode(&self.spans(source)?, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tree_sitter::Language;

    fn rust_tree(source: &str) -> Tree {
        let language: Language = tree_sitter_rust::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&language).unwrap();
        parser.parse(source, None).unwrap()
    }

    fn span(kind: TokenKind, start: (usize, usize), end: (usize, usize)) -> TokenSpan {
        TokenSpan {
            start: Point {
                row: start.0,
                column: start.1,
            },
            end: Point {
                row: end.0,
                column: end.1,
            },
            kind,
        }
    }

    fn token(delta_line: u32, delta_start: u32, length: u32, kind: TokenKind) -> SemanticToken {
        SemanticToken {
            delta_line,
            delta_start,
            length,
            token_type: kind as u32,
            token_modifiers_bitset: 0,
        }
    }

    #[test]
    fn test_legend_order_matches_token_indices() {
        let legend = legend();
        assert_eq!(legend.len(), TOKEN_KINDS.len());
        for (index, kind) in TOKEN_KINDS.iter().enumerate() {
            assert_eq!(*kind as usize, index);
            assert_eq!(legend[index], kind.as_lsp_type());
        }
        assert_eq!(legend[0], SemanticTokenType::COMMENT);
        assert_eq!(legend[8], SemanticTokenType::PROPERTY);
    }

    #[test]
    fn test_node_map_lookup() {
        assert_eq!(token_kind_for_node("comment"), Some(TokenKind::Comment));
        assert_eq!(token_kind_for_node("note"), Some(TokenKind::Variable));
        assert_eq!(token_kind_for_node("at_command"), Some(TokenKind::Function));
        assert_eq!(token_kind_for_node("param_key"), Some(TokenKind::Property));
        assert_eq!(token_kind_for_node("meta_value"), Some(TokenKind::String));
        assert_eq!(token_kind_for_node("source_file"), None);
    }

    #[test]
    fn test_noextpitch_reads_as_keyword() {
        assert_eq!(
            resolve_token_kind("meta_value", " noextpitch ", TokenKind::String),
            TokenKind::Keyword
        );
        assert_eq!(
            resolve_token_kind("meta_value", "ym2612", TokenKind::String),
            TokenKind::String
        );
        assert_eq!(
            resolve_token_kind("note", "noextpitch", TokenKind::Variable),
            TokenKind::Variable
        );
    }

    #[test]
    fn test_advance_over_whitespace() {
        let (offset, point) =
            advance_over_whitespace(" \t value", Point { row: 2, column: 4 });
        assert_eq!(offset, 3);
        assert_eq!(point, Point { row: 2, column: 7 });

        let (offset, point) = advance_over_whitespace("\n  value", Point { row: 3, column: 10 });
        assert_eq!(offset, 3);
        assert_eq!(point, Point { row: 4, column: 2 });

        let (offset, _) = advance_over_whitespace("   ", Point { row: 0, column: 0 });
        assert_eq!(offset, 3);
    }

    #[test]
    fn test_walk_visits_named_leaves_in_order() {
        let map: &[(&str, TokenKind)] = &[
            ("line_comment", TokenKind::Comment),
            ("integer_literal", TokenKind::Number),
            ("identifier", TokenKind::Variable),
        ];
        let source = "// greeting\nfn main() { let answer = 42; }\n";
        let tree = rust_tree(source);

        let spans = collect_spans_in(&tree, source, map);
        let kinds: Vec<_> = spans.iter().map(|span| span.kind).collect();
        assert_eq!(
            kinds,
            [
                TokenKind::Comment,
                TokenKind::Variable,
                TokenKind::Variable,
                TokenKind::Number
            ]
        );
        assert_eq!(spans[0].start, Point { row: 0, column: 0 });
        assert_eq!(spans[0].end, Point { row: 0, column: 11 });
        assert_eq!(spans[3].start, Point { row: 1, column: 25 });
        assert_eq!(spans[3].end, Point { row: 1, column: 27 });
        for pair in spans.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
    }

    #[test]
    fn test_unmapped_kinds_produce_no_spans() {
        let source = "fn main() {}\n";
        let tree = rust_tree(source);
        assert!(collect_spans(&tree, source).is_empty());
    }

    #[test]
    fn test_encode_same_line_deltas() {
        let source = "A1 v12 @05\n";
        let spans = [
            span(TokenKind::Type, (0, 0), (0, 2)),
            span(TokenKind::Keyword, (0, 3), (0, 6)),
            span(TokenKind::Function, (0, 7), (0, 10)),
        ];
        assert_eq!(
            encode(&spans, source),
            [
                token(0, 0, 2, TokenKind::Type),
                token(0, 3, 3, TokenKind::Keyword),
                token(0, 4, 3, TokenKind::Function),
            ]
        );
    }

    #[test]
    fn test_encode_line_transitions() {
        let source = "; header\nA1 cdef\n#title song\n";
        let spans = [
            span(TokenKind::Comment, (0, 0), (0, 8)),
            span(TokenKind::Keyword, (2, 0), (2, 6)),
        ];
        assert_eq!(
            encode(&spans, source),
            [
                token(0, 0, 8, TokenKind::Comment),
                token(2, 0, 6, TokenKind::Keyword),
            ]
        );
    }

    #[test]
    fn test_encode_counts_utf16_units() {
        // two four-byte scalars before the token: 8 source bytes, 4 UTF-16
        // units
        let source = "\u{1F3B5}\u{1F3B5} ab\n";
        let spans = [span(TokenKind::Variable, (0, 9), (0, 11))];
        assert_eq!(encode(&spans, source), [token(0, 5, 2, TokenKind::Variable)]);
    }

    #[test]
    fn test_encode_splits_multiline_spans() {
        let source = "abc\ndef\ngh\n";
        let spans = [span(TokenKind::Comment, (0, 1), (2, 1))];
        assert_eq!(
            encode(&spans, source),
            [
                token(0, 1, 2, TokenKind::Comment),
                token(1, 0, 3, TokenKind::Comment),
                token(1, 0, 1, TokenKind::Comment),
            ]
        );
    }

    #[test]
    fn test_encode_drops_empty_spans() {
        let source = "abc\n";
        let spans = [
            span(TokenKind::Comment, (0, 1), (0, 1)),
            span(TokenKind::Number, (0, 1), (0, 3)),
        ];
        assert_eq!(encode(&spans, source), [token(0, 1, 2, TokenKind::Number)]);
    }

    #[test]
    fn test_highlighter_surfaces_missing_grammar() {
        let highlighter = Highlighter::new(Grammar::new("/nonexistent/ctrmml.so"));
        assert!(matches!(
            highlighter.tokens("A1 cde"),
            Err(GrammarError::Missing { .. })
        ));
    }
}
