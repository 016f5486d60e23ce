use super::error::{Error, ErrorKind, Result};
use super::token::{Token, TokenKind};
use combine::easy;
use combine::error::{ParseError, StreamError};
use combine::parser::char::{alpha_num, digit, letter, space, string};
use combine::parser::EasyParser;
use combine::stream::{Stream, StreamErrorFor};
use combine::{
    attempt, choice, many, many1, one_of, optional, parser, satisfy, satisfy_map, skip_many,
    token, Parser,
};
use std::fmt;

enum NumberSuffix {
    Ratio(String),
    Complex(char, String),
    Imaginary,
}

fn digits<Input>() -> impl Parser<Input, Output = String>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    many1::<String, _, _>(digit())
}

fn unsigned<Input>() -> impl Parser<Input, Output = String>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    (digits(), optional(attempt(token('.').with(digits())))).map(
        |(whole, fraction): (String, Option<String>)| match fraction {
            Some(fraction) => format!("{}.{}", whole, fraction),
            None => whole,
        },
    )
}

fn classify(head: String, suffix: Option<NumberSuffix>) -> std::result::Result<TokenKind, String> {
    let float = |text: &str| {
        text.parse::<f64>()
            .map_err(|_| format!("invalid numeric literal `{}`", text))
    };
    let integer = |text: &str| {
        text.parse::<i64>()
            .map_err(|_| format!("integer literal `{}` does not fit in 64 bits", text))
    };

    match suffix {
        None if head.contains('.') => float(&head).map(TokenKind::Float),
        None => integer(&head).map(TokenKind::Int),
        Some(NumberSuffix::Ratio(den)) => {
            if head.contains('.') {
                return Err(format!(
                    "rational literal `{}/{}` needs integer parts",
                    head, den
                ));
            }
            let num = integer(&head)?;
            let den = integer(&den)?;
            if den == 0 {
                return Err(format!(
                    "rational literal `{}/0` has a zero denominator",
                    num
                ));
            }
            Ok(TokenKind::Rational(num, den))
        }
        Some(NumberSuffix::Complex(sign, imaginary)) => {
            let re = float(&head)?;
            let im = float(&imaginary)?;
            Ok(TokenKind::Complex(re, if sign == '-' { -im } else { im }))
        }
        Some(NumberSuffix::Imaginary) => Ok(TokenKind::Complex(0.0, float(&head)?)),
    }
}

fn number<Input>() -> impl Parser<Input, Output = TokenKind>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    let ratio = attempt((token('/'), digits())).map(|(_, den)| NumberSuffix::Ratio(den));
    let complex = attempt((one_of("+-".chars()), unsigned(), token('i')))
        .map(|(sign, im, _)| NumberSuffix::Complex(sign, im));
    let imaginary = token('i').map(|_| NumberSuffix::Imaginary);

    (unsigned(), optional(choice((ratio, complex, imaginary)))).and_then(|(head, suffix)| {
        classify(head, suffix).map_err(StreamErrorFor::<Input>::message_format)
    })
}

fn radix_value(digits: &str, radix: u32) -> std::result::Result<i64, String> {
    let name = if radix == 16 { "hexadecimal" } else { "binary" };
    if digits.is_empty() {
        return Err(format!("missing {} digits", name));
    }
    if let Some(bad) = digits.chars().find(|c| !c.is_digit(radix)) {
        return Err(format!("invalid {} digit `{}`", name, bad));
    }
    i64::from_str_radix(digits, radix)
        .map_err(|_| format!("{} literal `{}` does not fit in 64 bits", name, digits))
}

fn radix<Input>() -> impl Parser<Input, Output = TokenKind>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    let hex = attempt(string("0x"))
        .with(many::<String, _, _>(alpha_num()))
        .and_then(|digits: String| {
            radix_value(&digits, 16)
                .map(TokenKind::Hex)
                .map_err(StreamErrorFor::<Input>::message_format)
        });
    let binary = attempt(string("0b"))
        .with(many::<String, _, _>(alpha_num()))
        .and_then(|digits: String| {
            radix_value(&digits, 2)
                .map(TokenKind::Binary)
                .map_err(StreamErrorFor::<Input>::message_format)
        });

    choice((hex, binary))
}

fn name<Input>() -> impl Parser<Input, Output = String>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    (
        choice((letter(), token('_'))),
        many::<String, _, _>(choice((alpha_num(), token('_')))),
    )
        .map(|(first, rest): (char, String)| format!("{}{}", first, rest))
}

fn word<Input>() -> impl Parser<Input, Output = TokenKind>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    name().map(|word: String| TokenKind::keyword(&word).unwrap_or(TokenKind::Ident(word)))
}

fn operator<Input>() -> impl Parser<Input, Output = TokenKind>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    use TokenKind::*;

    let double = choice((
        attempt(string("==")).map(|_| EqEq),
        attempt(string("+=")).map(|_| PlusAssign),
        attempt(string("-=")).map(|_| MinusAssign),
        attempt(string("<=")).map(|_| LtEq),
        attempt(string(">=")).map(|_| GtEq),
        attempt(string("..")).map(|_| DotDot),
    ));
    let single = satisfy_map(|c: char| match c {
        '=' => Some(Assign),
        '+' => Some(Plus),
        '-' => Some(Minus),
        '*' => Some(Star),
        '/' => Some(Slash),
        '<' => Some(Lt),
        '>' => Some(Gt),
        '(' => Some(LParen),
        ')' => Some(RParen),
        '{' => Some(LBrace),
        '}' => Some(RBrace),
        ',' => Some(Comma),
        ';' => Some(Semicolon),
        ':' => Some(Colon),
        _ => None,
    });

    choice((double, single))
}

fn comment<Input>() -> impl Parser<Input, Output = ()>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    (attempt(string("//")), skip_many(satisfy(|c: char| c != '\n'))).map(|_| ())
}

fn trivia<Input>() -> impl Parser<Input, Output = ()>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    skip_many(choice((space().map(|_| ()), comment())))
}

fn lex_<Input>() -> impl Parser<Input, Output = TokenKind>
where
    Input: Stream<Token = char>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    choice((
        radix(),
        number(),
        word(),
        (token('\''), name()).map(|(_, name)| TokenKind::Symbol(name)),
        (token('@'), name()).map(|(_, name)| TokenKind::Annotation(name)),
        operator(),
    ))
    .expected("token")
}

parser! {
    pub(crate) fn lex[Input]()(Input) -> TokenKind
        where [Input: Stream<Token = char>]
    {
        lex_()
    }
}

/// Splits `source` into tokens, recording the byte offset and line of each.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = source;
    let mut line = 1;
    let mut cursor = 0;

    loop {
        let offset = source.len() - rest.len();
        let after = match trivia().easy_parse(rest) {
            Ok(((), after)) => after,
            Err(e) => {
                return Err(Error::from(ErrorKind::Lex {
                    offset,
                    message: describe(&e),
                }))
            }
        };
        if after.is_empty() {
            break;
        }

        let offset = source.len() - after.len();
        line += source[cursor..offset].matches('\n').count();
        cursor = offset;

        match lex().easy_parse(after) {
            Ok((kind, remaining)) => {
                let lexeme = &after[..after.len() - remaining.len()];
                tokens.push(Token {
                    kind,
                    lexeme: lexeme.to_owned(),
                    offset,
                    line,
                });
                rest = remaining;
            }
            Err(e) => {
                return Err(Error::from(ErrorKind::Lex {
                    offset,
                    message: describe(&e),
                }))
            }
        }
    }

    Ok(tokens)
}

fn info<T, R>(info: &easy::Info<T, R>) -> String
where
    T: fmt::Display,
{
    match info {
        easy::Info::Token(t) => format!("`{}`", t),
        easy::Info::Range(_) => "input".to_owned(),
        easy::Info::Owned(s) => s.clone(),
        easy::Info::Static(s) => (*s).to_owned(),
    }
}

/// Renders combine's error list, preferring explicit messages over the
/// unexpected/expected summary.
pub(crate) fn describe<T, R, P>(errors: &easy::Errors<T, R, P>) -> String
where
    T: fmt::Display,
{
    let mut unexpected = Vec::new();
    let mut expected = Vec::new();
    let mut messages = Vec::new();

    for error in &errors.errors {
        match error {
            easy::Error::Unexpected(i) => unexpected.push(info(i)),
            easy::Error::Expected(i) => expected.push(info(i)),
            easy::Error::Message(i) => messages.push(info(i)),
            easy::Error::Other(e) => messages.push(e.to_string()),
        }
    }

    if !messages.is_empty() {
        return messages.join("; ");
    }

    let mut text = match unexpected.first() {
        Some(u) => format!("unexpected {}", u),
        None => "unexpected input".to_owned(),
    };
    if !expected.is_empty() {
        expected.dedup();
        text.push_str(&format!(", expected {}", expected.join(" or ")));
    }
    text
}

#[cfg(test)]
mod test {
    use super::super::token::TokenKind::*;
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lex_offset(source: &str) -> usize {
        match tokenize(source).unwrap_err().kind() {
            ErrorKind::Lex { offset, .. } => *offset,
            e => panic!("expected a lex error, got {:?}", e),
        }
    }

    #[test]
    fn test_number() {
        assert_eq!(number().easy_parse("42").map(|x| x.0), Ok(Int(42)));
        assert_eq!(number().easy_parse("3.25").map(|x| x.0), Ok(Float(3.25)));
        assert_eq!(number().easy_parse("1/2").map(|x| x.0), Ok(Rational(1, 2)));
        assert_eq!(
            number().easy_parse("3+4i").map(|x| x.0),
            Ok(Complex(3.0, 4.0))
        );
        assert_eq!(
            number().easy_parse("2.5-1i").map(|x| x.0),
            Ok(Complex(2.5, -1.0))
        );
        assert_eq!(number().easy_parse("4i").map(|x| x.0), Ok(Complex(0.0, 4.0)));
    }

    #[test]
    fn test_number_leaves_operators() {
        assert_eq!(number().easy_parse("2..5").map(|x| x.1), Ok("..5"));
        assert_eq!(number().easy_parse("3+4").map(|x| x.1), Ok("+4"));
        assert_eq!(number().easy_parse("1/x").map(|x| x.1), Ok("/x"));
    }

    #[test]
    fn test_radix() {
        assert_eq!(radix().easy_parse("0x1F").map(|x| x.0), Ok(Hex(31)));
        assert_eq!(radix().easy_parse("0b101").map(|x| x.0), Ok(Binary(5)));
    }

    #[test]
    fn test_word() {
        assert_eq!(word().easy_parse("reverse").map(|x| x.0), Ok(Reverse));
        assert_eq!(
            word().easy_parse("user_value").map(|x| x.0),
            Ok(Ident("user_value".to_owned()))
        );
    }

    #[test]
    fn test_comment() {
        assert_eq!(comment().easy_parse("// hoge").map(|x| x.0), Ok(()));
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            kinds("x = 5; y += 'pi // note\n@pure fn"),
            vec![
                Ident("x".to_owned()),
                Assign,
                Int(5),
                Semicolon,
                Ident("y".to_owned()),
                PlusAssign,
                Symbol("pi".to_owned()),
                Annotation("pure".to_owned()),
                Fn,
            ]
        );

        assert_eq!(
            kinds("for i in 2..n+1 {}"),
            vec![
                For,
                Ident("i".to_owned()),
                In,
                Int(2),
                DotDot,
                Ident("n".to_owned()),
                Plus,
                Int(1),
                LBrace,
                RBrace,
            ]
        );
    }

    #[test]
    fn test_offsets_and_lines() {
        let tokens = tokenize("a = 1\n\nb = 0x10").unwrap();
        let b = &tokens[3];
        assert_eq!(b.kind, Ident("b".to_owned()));
        assert_eq!(b.offset, 7);
        assert_eq!(b.line, 3);
        assert_eq!(tokens[5].lexeme, "0x10");
    }

    #[test]
    fn test_malformed_literals() {
        assert_eq!(lex_offset("0x"), 0);
        assert_eq!(lex_offset("x = 0x;"), 4);
        assert_eq!(lex_offset("y = 0b102"), 4);
        assert_eq!(lex_offset("z = 1/0"), 4);
        assert_eq!(lex_offset("w = 99999999999999999999"), 4);
        assert_eq!(lex_offset("v = $"), 4);
    }
}
