use logos::Logos;
use smol_str::SmolStr;

/// Source span as byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

fn parse_string(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut result = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => result.push('\n'),
                't' => result.push('\t'),
                'r' => result.push('\r'),
                '\\' => result.push('\\'),
                '"' => result.push('"'),
                '0' => result.push('\0'),
                other => {
                    result.push('\\');
                    result.push(other);
                }
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

fn parse_raw_string(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    slice[1..slice.len() - 1].to_string()
}

fn parse_rune(lex: &mut logos::Lexer<Token>) -> Option<char> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut chars = inner.chars();
    let first = chars.next()?;
    if first != '\\' {
        return Some(first);
    }
    match chars.next()? {
        'n' => Some('\n'),
        't' => Some('\t'),
        'r' => Some('\r'),
        '\\' => Some('\\'),
        '\'' => Some('\''),
        '0' => Some('\0'),
        other => Some(other),
    }
}

fn parse_int(lex: &mut logos::Lexer<Token>) -> Option<i64> {
    let text: String = lex.slice().chars().filter(|c| *c != '_').collect();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()
    } else {
        text.parse::<i64>().ok()
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token {
    #[token("\n")]
    Newline,

    // ── Keywords ────────────────────────────────────────────────
    #[token("package")]
    KwPackage,
    #[token("import")]
    KwImport,
    #[token("func")]
    KwFunc,
    #[token("return")]
    KwReturn,
    #[token("var")]
    KwVar,
    #[token("const")]
    KwConst,
    #[token("type")]
    KwType,
    #[token("struct")]
    KwStruct,
    #[token("interface")]
    KwInterface,
    #[token("map")]
    KwMap,
    #[token("chan")]
    KwChan,
    #[token("if")]
    KwIf,
    #[token("else")]
    KwElse,
    #[token("for")]
    KwFor,
    #[token("range")]
    KwRange,
    #[token("switch")]
    KwSwitch,
    #[token("case")]
    KwCase,
    #[token("default")]
    KwDefault,
    #[token("select")]
    KwSelect,
    #[token("go")]
    KwGo,
    #[token("defer")]
    KwDefer,
    #[token("break")]
    KwBreak,
    #[token("continue")]
    KwContinue,
    #[token("goto")]
    KwGoto,
    #[token("fallthrough")]
    KwFallthrough,

    // ── Literals ────────────────────────────────────────────────
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?", priority = 3, callback = |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+", priority = 3, callback = |lex| lex.slice().parse::<f64>().ok())]
    Float(f64),

    #[regex(r"0[xX][0-9a-fA-F_]+", priority = 3, callback = parse_int)]
    #[regex(r"0[bB][01_]+", priority = 3, callback = parse_int)]
    #[regex(r"[0-9][0-9_]*", priority = 2, callback = parse_int)]
    Int(i64),

    #[regex(r#""([^"\\\n]|\\.)*""#, callback = parse_string)]
    Str(String),

    #[regex(r"`[^`]*`", callback = parse_raw_string)]
    RawStr(String),

    #[regex(r"'([^'\\\n]|\\.)*'", callback = parse_rune)]
    Rune(char),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", callback = |lex| SmolStr::new(lex.slice()))]
    Ident(SmolStr),

    // ── Operators and delimiters ────────────────────────────────
    #[token("<-")]
    Arrow,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token(":=")]
    ColonEq,
    #[token("=")]
    Eq,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,
    #[token("&=")]
    AmpEq,
    #[token("|=")]
    PipeEq,
    #[token("^=")]
    CaretEq,
    #[token("<<=")]
    ShlEq,
    #[token(">>=")]
    ShrEq,
    #[token("&^=")]
    AmpCaretEq,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("&^")]
    AmpCaret,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("!")]
    Not,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token("...")]
    DotDotDot,
    #[token(".")]
    Dot,
    #[token(":")]
    Colon,
}

impl Token {
    /// A newline after these tokens terminates the statement.
    fn ends_statement(&self) -> bool {
        matches!(
            self,
            Token::Ident(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::Str(_)
                | Token::RawStr(_)
                | Token::Rune(_)
                | Token::KwReturn
                | Token::KwBreak
                | Token::KwContinue
                | Token::KwFallthrough
                | Token::Inc
                | Token::Dec
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
        )
    }
}

/// Lex source code into a list of (token, span) pairs.
///
/// Newlines are folded away here: one following a statement-ending token is
/// replaced with an explicit `Semi` (the automatic-terminator rule), all
/// others are dropped.
pub fn lex(source: &str) -> (Vec<(Token, Span)>, Vec<Span>) {
    let mut tokens: Vec<(Token, Span)> = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = Token::lexer(source);

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span::new(range.start as u32, range.end as u32);
        match result {
            Ok(Token::Newline) => {
                if let Some((last, _)) = tokens.last() {
                    if last.ends_statement() {
                        tokens.push((Token::Semi, span));
                    }
                }
            }
            Ok(token) => tokens.push((token, span)),
            Err(_) => errors.push(span),
        }
    }

    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_tokens(source: &str) -> Vec<Token> {
        let (tokens, errors) = lex(source);
        assert!(errors.is_empty(), "unexpected lex errors: {:?}", errors);
        tokens.into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            lex_tokens("func main x"),
            vec![
                Token::KwFunc,
                Token::Ident("main".into()),
                Token::Ident("x".into()),
            ]
        );
    }

    #[test]
    fn integers() {
        assert_eq!(lex_tokens("42"), vec![Token::Int(42)]);
        assert_eq!(lex_tokens("0"), vec![Token::Int(0)]);
        assert_eq!(lex_tokens("0xff"), vec![Token::Int(255)]);
        assert_eq!(lex_tokens("1_000"), vec![Token::Int(1000)]);
    }

    #[test]
    fn floats() {
        assert_eq!(lex_tokens("3.25"), vec![Token::Float(3.25)]);
        assert_eq!(lex_tokens("1.0e10"), vec![Token::Float(1.0e10)]);
        assert_eq!(lex_tokens("1e3"), vec![Token::Float(1e3)]);
    }

    #[test]
    fn strings() {
        assert_eq!(
            lex_tokens(r#""hello\nworld""#),
            vec![Token::Str("hello\nworld".into())]
        );
        assert_eq!(lex_tokens("`raw\\n`"), vec![Token::RawStr("raw\\n".into())]);
    }

    #[test]
    fn runes() {
        assert_eq!(lex_tokens("'a'"), vec![Token::Rune('a')]);
        assert_eq!(lex_tokens(r"'\n'"), vec![Token::Rune('\n')]);
    }

    #[test]
    fn compound_operators() {
        assert_eq!(
            lex_tokens("<- ++ := == &^ <<="),
            vec![
                Token::Arrow,
                Token::Inc,
                Token::ColonEq,
                Token::EqEq,
                Token::AmpCaret,
                Token::ShlEq,
            ]
        );
    }

    #[test]
    fn dots() {
        assert_eq!(
            lex_tokens("a.b ...int"),
            vec![
                Token::Ident("a".into()),
                Token::Dot,
                Token::Ident("b".into()),
                Token::DotDotDot,
                Token::Ident("int".into()),
            ]
        );
    }

    #[test]
    fn comments_skipped() {
        assert_eq!(
            lex_tokens("1 // line\n/* block */ 2"),
            vec![Token::Int(1), Token::Semi, Token::Int(2)]
        );
    }

    #[test]
    fn terminator_after_ident() {
        assert_eq!(
            lex_tokens("x\ny"),
            vec![
                Token::Ident("x".into()),
                Token::Semi,
                Token::Ident("y".into()),
            ]
        );
    }

    #[test]
    fn terminator_after_closers_and_incdec() {
        assert_eq!(
            lex_tokens(")\n]\n}\ni++\n"),
            vec![
                Token::RParen,
                Token::Semi,
                Token::RBracket,
                Token::Semi,
                Token::RBrace,
                Token::Semi,
                Token::Ident("i".into()),
                Token::Inc,
                Token::Semi,
            ]
        );
    }

    #[test]
    fn no_terminator_after_operators() {
        assert_eq!(
            lex_tokens("x +\ny"),
            vec![
                Token::Ident("x".into()),
                Token::Plus,
                Token::Ident("y".into()),
            ]
        );
    }

    #[test]
    fn terminator_after_return() {
        assert_eq!(
            lex_tokens("return\n}"),
            vec![Token::KwReturn, Token::Semi, Token::RBrace]
        );
    }

    #[test]
    fn spans() {
        let (tokens, _) = lex("a := 1");
        assert_eq!(tokens[0], (Token::Ident("a".into()), Span::new(0, 1)));
        assert_eq!(tokens[1], (Token::ColonEq, Span::new(2, 4)));
        assert_eq!(tokens[2], (Token::Int(1), Span::new(5, 6)));
    }
}
