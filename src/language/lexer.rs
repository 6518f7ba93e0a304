use crate::language::{
    span::Span,
    token::{Token, TokenKind},
};
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{alpha1, alphanumeric1, digit1, hex_digit1},
    combinator::{opt, recognize},
    multi::many0_count,
    sequence::{pair, preceded, tuple},
    IResult,
};

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    Lexer::new(source).run()
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"), tag("$"))),
        many0_count(alt((alphanumeric1, tag("_"), tag("$")))),
    ))(input)
}

fn hex_number(input: &str) -> IResult<&str, &str> {
    preceded(tag_no_case("0x"), hex_digit1)(input)
}

fn decimal_number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        digit1,
        opt(pair(tag("."), digit1)),
        opt(tuple((tag_no_case("e"), opt(alt((tag("+"), tag("-")))), digit1))),
    )))(input)
}

fn symbol(input: &str) -> IResult<&str, TokenKind> {
    // Longest symbols first so e.g. `===` wins over `==` and `=`.
    let (input, text) = alt((
        alt((
            tag("==="),
            tag("!=="),
            tag(">>>"),
            tag("++"),
            tag("--"),
            tag("+="),
            tag("-="),
            tag("*="),
            tag("/="),
            tag("%="),
            tag("=="),
            tag("!="),
            tag("<="),
            tag(">="),
            tag("<<"),
            tag(">>"),
            tag("&&"),
            tag("||"),
        )),
        alt((
            tag("+"),
            tag("-"),
            tag("*"),
            tag("/"),
            tag("%"),
            tag("="),
            tag("!"),
            tag("<"),
            tag(">"),
            tag("&"),
            tag("|"),
            tag("^"),
            tag("~"),
            tag("?"),
            tag(":"),
            tag(";"),
            tag(","),
            tag("."),
        )),
        alt((
            tag("("),
            tag(")"),
            tag("{"),
            tag("}"),
            tag("["),
            tag("]"),
        )),
    ))(input)?;
    let kind = match text {
        "===" => TokenKind::EqEqEq,
        "!==" => TokenKind::BangEqEq,
        ">>>" => TokenKind::Ushr,
        "++" => TokenKind::PlusPlus,
        "--" => TokenKind::MinusMinus,
        "+=" => TokenKind::PlusEq,
        "-=" => TokenKind::MinusEq,
        "*=" => TokenKind::StarEq,
        "/=" => TokenKind::SlashEq,
        "%=" => TokenKind::PercentEq,
        "==" => TokenKind::EqEq,
        "!=" => TokenKind::BangEq,
        "<=" => TokenKind::LtEq,
        ">=" => TokenKind::GtEq,
        "<<" => TokenKind::Shl,
        ">>" => TokenKind::Shr,
        "&&" => TokenKind::AmpersandAmpersand,
        "||" => TokenKind::PipePipe,
        "+" => TokenKind::Plus,
        "-" => TokenKind::Minus,
        "*" => TokenKind::Star,
        "/" => TokenKind::Slash,
        "%" => TokenKind::Percent,
        "=" => TokenKind::Eq,
        "!" => TokenKind::Bang,
        "<" => TokenKind::Lt,
        ">" => TokenKind::Gt,
        "&" => TokenKind::Ampersand,
        "|" => TokenKind::Pipe,
        "^" => TokenKind::Caret,
        "~" => TokenKind::Tilde,
        "?" => TokenKind::Question,
        ":" => TokenKind::Colon,
        ";" => TokenKind::Semi,
        "," => TokenKind::Comma,
        "." => TokenKind::Dot,
        "(" => TokenKind::LParen,
        ")" => TokenKind::RParen,
        "{" => TokenKind::LBrace,
        "}" => TokenKind::RBrace,
        "[" => TokenKind::LBracket,
        "]" => TokenKind::RBracket,
        _ => unreachable!("symbol table covers every tag"),
    };
    Ok((input, kind))
}

struct Lexer<'a> {
    src: &'a str,
    rest: &'a str,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            rest: src,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn offset(&self) -> usize {
        self.src.len() - self.rest.len()
    }

    fn run(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        loop {
            self.skip_trivia();
            let Some(ch) = self.rest.chars().next() else {
                break;
            };
            let start = self.offset();
            if ch == '"' || ch == '\'' {
                self.lex_string(ch);
            } else if ch == '/' && self.regex_allowed() {
                self.lex_regex();
            } else if let Ok((rest, word)) = identifier(self.rest) {
                self.rest = rest;
                let kind = TokenKind::keyword(word)
                    .unwrap_or_else(|| TokenKind::Identifier(word.to_string()));
                self.push(kind, start);
            } else if let Ok((rest, digits)) = hex_number(self.rest) {
                self.rest = rest;
                match u64::from_str_radix(digits, 16) {
                    Ok(v) => self.push(
                        TokenKind::Number {
                            value: v as f64,
                            radix: 16,
                        },
                        start,
                    ),
                    Err(_) => self.error("hex literal out of range", start),
                }
            } else if let Ok((rest, digits)) = decimal_number(self.rest) {
                self.rest = rest;
                match digits.parse::<f64>() {
                    Ok(v) => self.push(TokenKind::Number { value: v, radix: 10 }, start),
                    Err(_) => self.error("malformed number literal", start),
                }
            } else if let Ok((rest, kind)) = symbol(self.rest) {
                self.rest = rest;
                self.push(kind, start);
            } else {
                self.rest = &self.rest[ch.len_utf8()..];
                self.error(format!("unexpected character `{ch}`"), start);
            }
        }
        let end = self.offset();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(end, end),
        });

        if self.errors.is_empty() {
            Ok(self.tokens)
        } else {
            Err(self.errors)
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            let trimmed = self.rest.trim_start();
            if let Some(stripped) = trimmed.strip_prefix("//") {
                self.rest = match stripped.find('\n') {
                    Some(idx) => &stripped[idx + 1..],
                    None => "",
                };
            } else if let Some(stripped) = trimmed.strip_prefix("/*") {
                match stripped.find("*/") {
                    Some(idx) => self.rest = &stripped[idx + 2..],
                    None => {
                        let start = self.src.len() - trimmed.len();
                        self.error("unterminated block comment", start);
                        self.rest = "";
                    }
                }
            } else {
                self.rest = trimmed;
                return;
            }
        }
    }

    fn lex_string(&mut self, quote: char) {
        let start = self.offset();
        let mut chars = self.rest.char_indices();
        chars.next(); // opening quote
        let mut text = String::new();
        while let Some((idx, ch)) = chars.next() {
            match ch {
                c if c == quote => {
                    self.rest = &self.rest[idx + ch.len_utf8()..];
                    self.push(TokenKind::String(text), start);
                    return;
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => text.push('\n'),
                    Some((_, 't')) => text.push('\t'),
                    Some((_, 'r')) => text.push('\r'),
                    Some((_, '\\')) => text.push('\\'),
                    Some((_, '\'')) => text.push('\''),
                    Some((_, '"')) => text.push('"'),
                    Some((_, '0')) => text.push('\0'),
                    Some((_, other)) => text.push(other),
                    None => break,
                },
                '\n' => break,
                other => text.push(other),
            }
        }
        self.rest = "";
        self.error("unterminated string literal", start);
    }

    /// A `/` opens a regex literal only where an expression may begin; after
    /// a token that can end an expression it is division instead.
    fn regex_allowed(&self) -> bool {
        match self.tokens.last().map(|t| &t.kind) {
            None => true,
            Some(
                TokenKind::Identifier(_)
                | TokenKind::Number { .. }
                | TokenKind::String(_)
                | TokenKind::Regex(_)
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::This
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Null
                | TokenKind::PlusPlus
                | TokenKind::MinusMinus,
            ) => false,
            Some(_) => true,
        }
    }

    fn lex_regex(&mut self) {
        let start = self.offset();
        let mut chars = self.rest.char_indices();
        chars.next(); // opening slash
        let mut in_class = false;
        let mut escaped = false;
        while let Some((idx, ch)) = chars.next() {
            if escaped {
                escaped = false;
                continue;
            }
            match ch {
                '\\' => escaped = true,
                '[' => in_class = true,
                ']' => in_class = false,
                '/' if !in_class => {
                    let mut end = idx + 1;
                    for (flag_idx, flag) in chars.by_ref() {
                        if !flag.is_ascii_alphabetic() {
                            break;
                        }
                        end = flag_idx + flag.len_utf8();
                    }
                    let text = self.rest[..end].to_string();
                    self.rest = &self.rest[end..];
                    self.push(TokenKind::Regex(text), start);
                    return;
                }
                '\n' => break,
                _ => {}
            }
        }
        self.rest = "";
        self.error("unterminated regex literal", start);
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        let span = Span::new(start, self.offset());
        self.tokens.push(Token { kind, span });
    }

    fn error(&mut self, message: impl Into<String>, start: usize) {
        self.errors.push(LexError {
            message: message.into(),
            span: Span::new(start, self.offset().max(start + 1)),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_keywords_identifiers_and_symbols() {
        let kinds = kinds("var x = y + 1;");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Var,
                TokenKind::Identifier("x".into()),
                TokenKind::Eq,
                TokenKind::Identifier("y".into()),
                TokenKind::Plus,
                TokenKind::Number {
                    value: 1.0,
                    radix: 10
                },
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn longest_symbol_wins() {
        assert_eq!(
            kinds("a === b >>> c"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::EqEqEq,
                TokenKind::Identifier("b".into()),
                TokenKind::Ushr,
                TokenKind::Identifier("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_hex_and_float_literals() {
        assert_eq!(
            kinds("0xFF 1.25 2e3"),
            vec![
                TokenKind::Number {
                    value: 255.0,
                    radix: 16
                },
                TokenKind::Number {
                    value: 1.25,
                    radix: 10
                },
                TokenKind::Number {
                    value: 2000.0,
                    radix: 10
                },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_strings_with_escapes() {
        assert_eq!(
            kinds(r#""a\n" 'b'"#),
            vec![
                TokenKind::String("a\n".into()),
                TokenKind::String("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds("1 // line\n/* block */ 2"),
            vec![
                TokenKind::Number {
                    value: 1.0,
                    radix: 10
                },
                TokenKind::Number {
                    value: 2.0,
                    radix: 10
                },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn slash_position_decides_regex_or_division() {
        assert_eq!(
            kinds("var r = /a+[/]b/gi;"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier("r".into()),
                TokenKind::Eq,
                TokenKind::Regex("/a+[/]b/gi".into()),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("a / b"),
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Slash,
                TokenKind::Identifier("b".into()),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("(a) / 2"),
            vec![
                TokenKind::LParen,
                TokenKind::Identifier("a".into()),
                TokenKind::RParen,
                TokenKind::Slash,
                TokenKind::Number {
                    value: 2.0,
                    radix: 10
                },
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_regex_reports_error() {
        let errors = lex("var r = /ab").expect_err("should fail");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unterminated regex"));
    }

    #[test]
    fn unterminated_string_reports_error() {
        let errors = lex("\"abc").expect_err("should fail");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("unterminated"));
    }
}
