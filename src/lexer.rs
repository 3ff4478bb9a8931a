//! Tokenizer for SQL-shaped statement text, built with nom.
//!
//! Keywords are not distinguished from identifiers here; the parser
//! matches words case-insensitively.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{map, opt, recognize, value},
    sequence::{delimited, pair, tuple},
    IResult,
};

use crate::error::{SqlRestError, SqlRestResult};

/// A lexical token.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or keyword, original case preserved.
    Word(String),
    /// `"quoted identifier"`
    QuotedWord(String),
    /// `?`
    Placeholder,
    /// `'string literal'` with `''` unescaped.
    Str(String),
    /// Integer or decimal literal, as written.
    Number(String),
    Comma,
    LParen,
    RParen,
    Dot,
    Star,
    Semicolon,
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Token {
    /// Case-insensitive keyword check. Quoted identifiers never match.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        match self {
            Token::Word(w) => w.eq_ignore_ascii_case(keyword),
            _ => false,
        }
    }

    /// Identifier text, for bare or quoted words.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Token::Word(w) | Token::QuotedWord(w) => Some(w),
            _ => None,
        }
    }
}

/// A token with its byte range in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
    pub end: usize,
}

/// Split statement text into tokens.
pub fn tokenize(input: &str) -> SqlRestResult<Vec<Spanned>> {
    let mut tokens = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        let start = input.len() - rest.len();
        match token(rest) {
            Ok((remaining, token)) => {
                let end = input.len() - remaining.len();
                tokens.push(Spanned { token, start, end });
                rest = remaining.trim_start();
            }
            Err(_) => {
                let found = rest.chars().next().unwrap_or_default();
                return Err(SqlRestError::parse(
                    start,
                    format!("unexpected character '{}'", found),
                ));
            }
        }
    }

    Ok(tokens)
}

fn token(input: &str) -> IResult<&str, Token> {
    alt((
        value(Token::Placeholder, char('?')),
        value(Token::Gte, tag(">=")),
        value(Token::Lte, tag("<=")),
        value(Token::Ne, alt((tag("!="), tag("<>")))),
        value(Token::Gt, char('>')),
        value(Token::Lt, char('<')),
        value(Token::Eq, char('=')),
        value(Token::Comma, char(',')),
        value(Token::LParen, char('(')),
        value(Token::RParen, char(')')),
        value(Token::Dot, char('.')),
        value(Token::Star, char('*')),
        value(Token::Semicolon, char(';')),
        string_literal,
        quoted_identifier,
        number,
        word,
    ))(input)
}

fn word(input: &str) -> IResult<&str, Token> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
        |s: &str| Token::Word(s.to_string()),
    )(input)
}

fn quoted_identifier(input: &str) -> IResult<&str, Token> {
    map(
        delimited(char('"'), take_while1(|c: char| c != '"'), char('"')),
        |s: &str| Token::QuotedWord(s.to_string()),
    )(input)
}

fn number(input: &str) -> IResult<&str, Token> {
    map(
        recognize(tuple((
            opt(char('-')),
            digit1,
            opt(pair(char('.'), digit1)),
        ))),
        |s: &str| Token::Number(s.to_string()),
    )(input)
}

/// `'it''s'` -> `it's`
fn string_literal(input: &str) -> IResult<&str, Token> {
    let (mut rest, _) = char('\'')(input)?;
    let mut content = String::new();

    loop {
        let (after, chunk) = take_while(|c: char| c != '\'')(rest)?;
        content.push_str(chunk);
        let (after, _) = char('\'')(after)?;
        match after.strip_prefix('\'') {
            Some(escaped) => {
                content.push('\'');
                rest = escaped;
            }
            None => return Ok((after, Token::Str(content))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_insert_tokens() {
        assert_eq!(
            kinds("INSERT INTO t (a,b) VALUES (?,?)"),
            vec![
                Token::Word("INSERT".into()),
                Token::Word("INTO".into()),
                Token::Word("t".into()),
                Token::LParen,
                Token::Word("a".into()),
                Token::Comma,
                Token::Word("b".into()),
                Token::RParen,
                Token::Word("VALUES".into()),
                Token::LParen,
                Token::Placeholder,
                Token::Comma,
                Token::Placeholder,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            kinds("a>=? b<=? c>? d<? e=? f<>?"),
            vec![
                Token::Word("a".into()),
                Token::Gte,
                Token::Placeholder,
                Token::Word("b".into()),
                Token::Lte,
                Token::Placeholder,
                Token::Word("c".into()),
                Token::Gt,
                Token::Placeholder,
                Token::Word("d".into()),
                Token::Lt,
                Token::Placeholder,
                Token::Word("e".into()),
                Token::Eq,
                Token::Placeholder,
                Token::Word("f".into()),
                Token::Ne,
                Token::Placeholder,
            ]
        );
    }

    #[test]
    fn test_string_literal_escape() {
        assert_eq!(
            kinds("status = 'it''s AND done'"),
            vec![
                Token::Word("status".into()),
                Token::Eq,
                Token::Str("it's AND done".into()),
            ]
        );
    }

    #[test]
    fn test_numbers_and_qualified_names() {
        assert_eq!(
            kinds("calls.score > -1.5 LIMIT 10"),
            vec![
                Token::Word("calls".into()),
                Token::Dot,
                Token::Word("score".into()),
                Token::Gt,
                Token::Number("-1.5".into()),
                Token::Word("LIMIT".into()),
                Token::Number("10".into()),
            ]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("  id = ?").unwrap();
        assert_eq!((tokens[0].start, tokens[0].end), (2, 4));
        assert_eq!((tokens[2].start, tokens[2].end), (7, 8));
    }

    #[test]
    fn test_unterminated_string() {
        let err = tokenize("name = 'abc").unwrap_err();
        assert!(matches!(err, SqlRestError::Parse { position: 7, .. }));
    }

    #[test]
    fn test_line_comment_rejected() {
        let err = tokenize("SELECT * FROM t -- trailing").unwrap_err();
        assert!(matches!(err, SqlRestError::Parse { position: 16, .. }));
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        assert!(Token::Word("wHeRe".into()).is_keyword("WHERE"));
        assert!(!Token::QuotedWord("where".into()).is_keyword("WHERE"));
    }
}
