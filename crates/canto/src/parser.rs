use chumsky::{input::ValueInput, prelude::*};

mod lexer;
pub use lexer::{Token, lexer};

use crate::pipeline::{Problem, ProblemReport};

pub use chumsky::prelude::{Input, Parser};

pub type Span = SimpleSpan;
pub type ParseError<'src, T> = Rich<'src, T, Span>;

type Extra<'src> = extra::Err<ParseError<'src, Token<'src>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub span: Span,
    pub node: T,
}

/// Top-level item of a source unit.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedItem {
    Site {
        name: Spanned<String>,
        definitions: Vec<ParsedDefinition>,
    },
    Definition(ParsedDefinition),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDefinition {
    pub name: Spanned<String>,
    pub is_external: bool,
    pub parameters: Option<Vec<Spanned<String>>>,
    pub shape: Shape,
    pub supertype: Option<Spanned<Expression>>,
    pub body: ParsedBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    None,
    Expression(Spanned<Expression>),
    Block(Vec<ParsedDefinition>),
}

/// Collection marker written after a definition name: `name[]` or `name{}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Shape {
    #[default]
    Scalar,
    Array,
    Table,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Reference(Vec<Spanned<NamePartSyntax>>),
    Array(Vec<Spanned<Expression>>),
    Table(Vec<(Spanned<String>, Spanned<Expression>)>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamePartSyntax {
    pub name: String,
    pub arguments: Option<Vec<Spanned<Expression>>>,
    pub indexes: Vec<Spanned<Expression>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn expression<'src, I>() -> impl Parser<'src, I, Spanned<Expression>, Extra<'src>> + Clone
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    recursive(|expression| {
        let comma = just(Token::Comma);
        let identifier = select! { Token::Identifier(identifier) => identifier.to_string() };

        let literal = select! {
            Token::Null => Literal::Null,
            Token::True => Literal::Bool(true),
            Token::False => Literal::Bool(false),
            Token::Int(number) => Literal::Int(number),
            Token::Float(number) => Literal::Float(number),
            Token::Text(text) => Literal::Text(text.to_string()),
        };
        let expression_literal = literal.map(Expression::Literal);

        let arguments = expression
            .clone()
            .separated_by(comma.clone())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketRoundOpen), just(Token::BracketRoundClose));

        let index = expression
            .clone()
            .delimited_by(just(Token::BracketSquareOpen), just(Token::BracketSquareClose));

        let name_part = identifier
            .then(arguments.or_not())
            .then(index.repeated().collect::<Vec<_>>())
            .map_with(|((name, arguments), indexes), extra| Spanned {
                node: NamePartSyntax {
                    name,
                    arguments,
                    indexes,
                },
                span: extra.span(),
            });

        let reference = name_part
            .separated_by(just(Token::Dot))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(Expression::Reference);

        let array = expression
            .clone()
            .separated_by(comma.clone())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketSquareOpen), just(Token::BracketSquareClose))
            .map(Expression::Array);

        let key = select! {
            Token::Identifier(key) => key.to_string(),
            Token::Text(key) => key.to_string(),
            Token::Int(key) => key.to_string(),
        }
        .map_with(|key, extra| Spanned {
            node: key,
            span: extra.span(),
        });

        let entry = key
            .then_ignore(just(Token::Equals).or(just(Token::Colon)))
            .then(expression.clone());

        let table = entry
            .separated_by(comma)
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketCurlyOpen), just(Token::BracketCurlyClose))
            .map(Expression::Table);

        choice((expression_literal, array, table, reference)).map_with(|node, extra| Spanned {
            node,
            span: extra.span(),
        })
    })
}

fn definition<'src, I>() -> impl Parser<'src, I, ParsedDefinition, Extra<'src>> + Clone
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    recursive(|definition| {
        let expression = expression();
        let identifier = select! { Token::Identifier(identifier) => identifier.to_string() }
            .map_with(|identifier, extra| Spanned {
                node: identifier,
                span: extra.span(),
            });

        let parameters = identifier
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketRoundOpen), just(Token::BracketRoundClose));

        let shape = choice((
            just(Token::BracketSquareOpen)
                .then(just(Token::BracketSquareClose))
                .to(Shape::Array),
            just(Token::BracketCurlyOpen)
                .then(just(Token::BracketCurlyClose))
                .to(Shape::Table),
        ));

        let supertype = just(Token::Colon).ignore_then(expression.clone());

        let block = definition
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just(Token::BracketCurlyOpen), just(Token::BracketCurlyClose))
            .map(ParsedBody::Block);

        let body = just(Token::Equals)
            .ignore_then(expression)
            .map(ParsedBody::Expression)
            .or(block);

        // `name{} = ...` must win over an empty block, so the shape is only
        // taken when a body follows it.
        let tail = choice((
            shape
                .clone()
                .then(supertype.clone().or_not())
                .then(body.clone())
                .map(|((shape, supertype), body)| (shape, supertype, body)),
            supertype
                .or_not()
                .then(body.or_not())
                .map(|(supertype, body)| (Shape::Scalar, supertype, body.unwrap_or(ParsedBody::None))),
        ));

        let external_collection = just(Token::External)
            .ignore_then(identifier.clone())
            .then(shape)
            .map(|(name, shape)| (true, name, None, (shape, None, ParsedBody::None)));

        let regular = just(Token::External)
            .or_not()
            .map(|external| external.is_some())
            .then(identifier)
            .then(parameters.or_not())
            .then(tail)
            .map(|(((is_external, name), parameters), tail)| (is_external, name, parameters, tail));

        external_collection
            .or(regular)
            .then_ignore(just(Token::Semicolon).or_not())
            .try_map(|(is_external, name, parameters, (shape, supertype, body)), span| {
                match (&body, is_external) {
                    (ParsedBody::None, false) => {
                        return Err(ParseError::custom(
                            span,
                            format!("Definition '{}' has no body", name.node),
                        ));
                    }
                    (ParsedBody::Expression(_) | ParsedBody::Block(_), true) => {
                        return Err(ParseError::custom(
                            span,
                            format!("External definition '{}' cannot have a body", name.node),
                        ));
                    }
                    (ParsedBody::Block(_), false) if shape != Shape::Scalar => {
                        return Err(ParseError::custom(
                            span,
                            format!("Collection definition '{}' needs a '=' body", name.node),
                        ));
                    }
                    _ => {}
                }
                Ok(ParsedDefinition {
                    name,
                    is_external,
                    parameters,
                    shape,
                    supertype,
                    body,
                    span,
                })
            })
    })
}

pub fn parser<'src, I>() -> impl Parser<'src, I, Vec<ParsedItem>, Extra<'src>>
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    let definition = definition();
    let site = just(Token::Site)
        .ignore_then(select! { Token::Identifier(name) => name.to_string() }.map_with(
            |name, extra| Spanned {
                node: name,
                span: extra.span(),
            },
        ))
        .then(
            definition
                .clone()
                .repeated()
                .collect::<Vec<_>>()
                .delimited_by(just(Token::BracketCurlyOpen), just(Token::BracketCurlyClose)),
        )
        .map(|(name, definitions)| ParsedItem::Site { name, definitions });

    site.or(definition.map(ParsedItem::Definition))
        .repeated()
        .collect()
        .then_ignore(end())
}

/// Lexes and parses a complete source unit.
///
/// Lexer and parser errors are collected into one report.
pub fn parse_source(source_code: &str) -> Result<Vec<ParsedItem>, ProblemReport> {
    let mut report = ProblemReport::default();

    let (tokens, errors) = lexer().parse(source_code).into_output_errors();
    for error in errors {
        report.push(Problem::new(error.to_string()).with_span(error.span().into_range()));
    }
    let Some(mut tokens) = tokens else {
        return Err(report);
    };
    if !report.is_empty() {
        return Err(report);
    }

    tokens.retain(|spanned_token| !matches!(spanned_token.node, Token::Comment(_)));
    let tokens = tokens
        .into_iter()
        .map(|Spanned { node, span }| (node, span))
        .collect::<Vec<_>>();

    let end_of_input = Span::from(source_code.len()..source_code.len());
    let (items, errors) = parser()
        .parse(tokens.as_slice().map(end_of_input, |(token, span)| (token, span)))
        .into_output_errors();
    for error in errors {
        report.push(Problem::new(error.to_string()).with_span(error.span().into_range()));
    }

    match items {
        Some(items) if report.is_empty() => Ok(items),
        _ => Err(report),
    }
}
