use super::{ParseError, Spanned};
use chumsky::prelude::*;
use std::borrow::Cow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'src> {
    BracketRoundOpen,
    BracketRoundClose,
    BracketCurlyOpen,
    BracketCurlyClose,
    BracketSquareOpen,
    BracketSquareClose,
    Comment(&'src str),
    Int(i64),
    Float(f64),
    Text(&'src str),
    Identifier(&'src str),
    Equals,
    Colon,
    Semicolon,
    Comma,
    Dot,
    Site,
    External,
    Null,
    True,
    False,
}

impl<'src> Token<'src> {
    pub fn into_cow_str(self) -> Cow<'src, str> {
        match self {
            Self::BracketRoundOpen => "(".into(),
            Self::BracketRoundClose => ")".into(),
            Self::BracketCurlyOpen => "{".into(),
            Self::BracketCurlyClose => "}".into(),
            Self::BracketSquareOpen => "[".into(),
            Self::BracketSquareClose => "]".into(),
            Self::Comment(comment) => comment.into(),
            Self::Int(number) => number.to_string().into(),
            Self::Float(number) => number.to_string().into(),
            Self::Text(text) => format!("\"{text}\"").into(),
            Self::Identifier(identifier) => identifier.into(),
            Self::Equals => "=".into(),
            Self::Colon => ":".into(),
            Self::Semicolon => ";".into(),
            Self::Comma => ",".into(),
            Self::Dot => ".".into(),
            Self::Site => "site".into(),
            Self::External => "external".into(),
            Self::Null => "null".into(),
            Self::True => "true".into(),
            Self::False => "false".into(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into_cow_str())
    }
}

pub fn lexer<'src>()
-> impl Parser<'src, &'src str, Vec<Spanned<Token<'src>>>, extra::Err<ParseError<'src, char>>> {
    let bracket = choice((
        just('(').to(Token::BracketRoundOpen),
        just(')').to(Token::BracketRoundClose),
        just('{').to(Token::BracketCurlyOpen),
        just('}').to(Token::BracketCurlyClose),
        just('[').to(Token::BracketSquareOpen),
        just(']').to(Token::BracketSquareClose),
    ));

    let punctuation = choice((
        just('=').to(Token::Equals),
        just(':').to(Token::Colon),
        just(';').to(Token::Semicolon),
        just(',').to(Token::Comma),
        just('.').to(Token::Dot),
    ));

    let comment = just("//")
        .ignore_then(any().and_is(text::newline().not()).repeated())
        .to_slice()
        .map(Token::Comment);

    let number = just('-')
        .or_not()
        .then(text::int(10))
        .then(just('.').then(text::digits(10)).or_not())
        .to_slice()
        .try_map(|number: &str, span| {
            if number.contains('.') {
                number
                    .parse::<f64>()
                    .map(Token::Float)
                    .map_err(|error| ParseError::custom(span, format!("Invalid number '{number}': {error}")))
            } else {
                number
                    .parse::<i64>()
                    .map(Token::Int)
                    .map_err(|error| ParseError::custom(span, format!("Invalid number '{number}': {error}")))
            }
        });

    // @TODO escapes inside text literals
    let text = just('"')
        .ignore_then(none_of('"').repeated().to_slice())
        .then_ignore(just('"'))
        .map(Token::Text);

    let word = text::ident().map(|word| match word {
        "site" => Token::Site,
        "external" => Token::External,
        "null" => Token::Null,
        "true" => Token::True,
        "false" => Token::False,
        identifier => Token::Identifier(identifier),
    });

    let token = choice((comment, bracket, number, text, punctuation, word));

    token
        .map_with(|token, extra| Spanned {
            node: token,
            span: extra.span(),
        })
        .padded()
        .recover_with(skip_then_retry_until(any().ignored(), end()))
        .repeated()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chumsky::prelude::Parser;

    fn tokens(source: &str) -> Vec<Token<'_>> {
        let result = lexer().parse(source);
        result.output().unwrap().iter().map(|t| t.node).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            tokens("external site_name true null"),
            vec![
                Token::External,
                Token::Identifier("site_name"),
                Token::True,
                Token::Null
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            tokens("[1, -2, 3.5]"),
            vec![
                Token::BracketSquareOpen,
                Token::Int(1),
                Token::Comma,
                Token::Int(-2),
                Token::Comma,
                Token::Float(3.5),
                Token::BracketSquareClose,
            ]
        );
    }

    #[test]
    fn test_comment_runs_to_end_of_line() {
        assert_eq!(
            tokens("a = 1 // trailing\nb"),
            vec![
                Token::Identifier("a"),
                Token::Equals,
                Token::Int(1),
                Token::Comment("// trailing"),
                Token::Identifier("b"),
            ]
        );
    }
}
