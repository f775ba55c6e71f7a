use crate::language::token::{Token, TokenKind};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{anychar, char, digit0, digit1, one_of, satisfy},
    combinator::{map, opt, recognize, value},
    sequence::{pair, tuple},
    IResult,
};

/// Splits source text into tokens. Never fails: characters that start no
/// known token become `TokenKind::Unknown` and are left for the parser to
/// reject. The stream always ends with a single `Eof` token.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut remaining = source;
    let mut line = 1usize;

    while !remaining.is_empty() {
        if let Ok((rest, _)) = lex_trivia(remaining) {
            remaining = rest;
            continue;
        }

        let offset = source.len() - remaining.len();
        let Ok((rest, kind)) = lex_token(remaining) else {
            break;
        };
        let consumed = &remaining[..remaining.len() - rest.len()];
        remaining = rest;

        if kind == TokenKind::Identifier && consumed.eq_ignore_ascii_case("rem") {
            if let Ok((rest, _)) = rest_of_line(remaining) {
                remaining = rest;
            }
            continue;
        }

        let text = match kind {
            TokenKind::String => string_contents(consumed),
            _ => consumed,
        };
        tokens.push(Token::new(kind, text, line, offset..offset + consumed.len()));
        line += consumed.matches('\n').count();
    }

    tokens.push(Token::new(
        TokenKind::Eof,
        "",
        line,
        source.len()..source.len(),
    ));
    tokens
}

fn lex_trivia(input: &str) -> IResult<&str, ()> {
    alt((lex_blank, lex_comment))(input)
}

fn lex_blank(input: &str) -> IResult<&str, ()> {
    value((), take_while1(|c: char| c == ' ' || c == '\t' || c == '\r'))(input)
}

fn lex_comment(input: &str) -> IResult<&str, ()> {
    value((), pair(char('\''), rest_of_line))(input)
}

fn rest_of_line(input: &str) -> IResult<&str, &str> {
    take_till(|c: char| c == '\n')(input)
}

fn lex_token(input: &str) -> IResult<&str, TokenKind> {
    alt((
        lex_newline,
        lex_string,
        lex_number,
        lex_word,
        lex_comparison,
        lex_punctuation,
        lex_unknown,
    ))(input)
}

fn lex_newline(input: &str) -> IResult<&str, TokenKind> {
    value(TokenKind::Newline, char('\n'))(input)
}

fn lex_string(input: &str) -> IResult<&str, TokenKind> {
    value(
        TokenKind::String,
        tuple((char('"'), take_till(|c: char| c == '"'), opt(char('"')))),
    )(input)
}

fn lex_number(input: &str) -> IResult<&str, TokenKind> {
    value(
        TokenKind::Number,
        recognize(tuple((
            digit1,
            opt(pair(char('.'), digit0)),
            opt(one_of("%&@!#")),
        ))),
    )(input)
}

fn lex_word(input: &str) -> IResult<&str, TokenKind> {
    map(
        recognize(pair(
            satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        |word: &str| TokenKind::keyword(word).unwrap_or(TokenKind::Identifier),
    )(input)
}

fn lex_comparison(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::NotEq, tag("<>")),
        value(TokenKind::LtEq, tag("<=")),
        value(TokenKind::GtEq, tag(">=")),
        value(TokenKind::Lt, char('<')),
        value(TokenKind::Gt, char('>')),
        value(TokenKind::Eq, char('=')),
    ))(input)
}

fn lex_punctuation(input: &str) -> IResult<&str, TokenKind> {
    alt((
        value(TokenKind::Plus, char('+')),
        value(TokenKind::Minus, char('-')),
        value(TokenKind::Star, char('*')),
        value(TokenKind::Slash, char('/')),
        value(TokenKind::Backslash, char('\\')),
        value(TokenKind::Caret, char('^')),
        value(TokenKind::Ampersand, char('&')),
        value(TokenKind::Comma, char(',')),
        value(TokenKind::Dot, char('.')),
        value(TokenKind::Colon, char(':')),
        value(TokenKind::LParen, char('(')),
        value(TokenKind::RParen, char(')')),
    ))(input)
}

fn lex_unknown(input: &str) -> IResult<&str, TokenKind> {
    value(TokenKind::Unknown, anychar)(input)
}

fn string_contents(literal: &str) -> &str {
    let inner = literal.strip_prefix('"').unwrap_or(literal);
    inner.strip_suffix('"').unwrap_or(inner)
}
