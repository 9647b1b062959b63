use core::fmt;

use crate::parser::{Rule, Span};

/// Parse error with the byte range it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// Unexpected token (converted from a pest parsing error).
    UnexpectedToken { expected: String },
    /// Integer literal that does not fit in an `i64`.
    InvalidNumber { text: String },
    /// Maximum nesting depth exceeded.
    MaxDepthExceeded { max_depth: usize },
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ParseErrorKind::UnexpectedToken { expected } => {
                write!(f, "expected {}", expected)?;
            }
            ParseErrorKind::InvalidNumber { text } => {
                write!(f, "invalid integer literal '{}'", text)?;
            }
            ParseErrorKind::MaxDepthExceeded { max_depth } => {
                write!(
                    f,
                    "expression nesting depth exceeds maximum of {} levels",
                    max_depth
                )?;
            }
        }
        write!(f, " at {}..{}", self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

/// Convert a pest error into a human-readable [`ParseError`].
pub fn convert_pest_error(err: pest::error::Error<Rule>) -> ParseError {
    use pest::error::ErrorVariant;

    let span = match err.location {
        pest::error::InputLocation::Pos(pos) => Span::new(pos, pos),
        pest::error::InputLocation::Span((start, end)) => Span::new(start, end),
    };

    let kind = match err.variant {
        ErrorVariant::ParsingError { positives, .. } => ParseErrorKind::UnexpectedToken {
            expected: format_expected_rules(&positives),
        },
        ErrorVariant::CustomError { message } => ParseErrorKind::UnexpectedToken {
            expected: message,
        },
    };

    ParseError::new(kind, span)
}

/// Group pest's rule names into the handful of concepts users think in.
fn format_expected_rules(rules: &[Rule]) -> String {
    let mut concepts: Vec<&str> = Vec::new();
    let push = |concept: &'static str, concepts: &mut Vec<&str>| {
        if !concepts.contains(&concept) {
            concepts.push(concept);
        }
    };

    for rule in rules {
        match rule {
            Rule::integer | Rule::boolean | Rule::string => push("a literal", &mut concepts),
            Rule::ident | Rule::param_list => push("an identifier", &mut concepts),
            Rule::EOI => push("end of input", &mut concepts),
            Rule::statement
            | Rule::let_statement
            | Rule::return_statement
            | Rule::expression_statement => push("a statement", &mut concepts),
            _ => push("an expression", &mut concepts),
        }
    }

    match concepts.len() {
        0 => "something else".to_string(),
        1 => concepts[0].to_string(),
        _ => {
            let last = concepts.pop().expect("len checked above");
            format!("{} or {}", concepts.join(", "), last)
        }
    }
}
