use std::collections::BTreeMap;
use std::str::FromStr;

use super::ast::{
    AggregateFn, CompareOp, ExprNode, LogicOp, SubExpr, DEFAULT_PERIODS, DEFAULT_WINDOW_SECS,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    UnexpectedChar(char),
    UnexpectedEnd,
    UnexpectedToken(String),
    UnknownFunction(String),
    BadOperator(String),
    BadNumber(String),
    BadDimension(String),
    DuplicateDimension(String),
    UnbalancedParens,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedChar(c) => write!(f, "unexpected character: {c:?}"),
            Self::UnexpectedEnd => write!(f, "unexpected end of expression"),
            Self::UnexpectedToken(t) => write!(f, "unexpected token: {t}"),
            Self::UnknownFunction(name) => write!(f, "unknown aggregation function: {name}"),
            Self::BadOperator(op) => write!(f, "invalid comparison operator: {op}"),
            Self::BadNumber(n) => write!(f, "invalid number: {n}"),
            Self::BadDimension(d) => write!(f, "malformed dimension: {d}"),
            Self::DuplicateDimension(k) => write!(f, "duplicate dimension key: {k}"),
            Self::UnbalancedParens => write!(f, "unbalanced parentheses"),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    Comma,
    // Identifiers and numbers both lex as words; the parser decides which
    // one the position calls for.
    Word(String),
    Dims(Vec<(String, String)>),
    Sym(String),
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Comma => ",".into(),
            Token::Word(w) => w.clone(),
            Token::Dims(_) => "{...}".into(),
            Token::Sym(s) => s.clone(),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.'
}

fn lex(text: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c == '(' {
            tokens.push(Token::LParen);
            i += 1;
        } else if c == ')' {
            tokens.push(Token::RParen);
            i += 1;
        } else if c == ',' {
            tokens.push(Token::Comma);
            i += 1;
        } else if c == '{' {
            let start = i + 1;
            let mut end = start;
            while end < chars.len() && chars[end] != '}' {
                end += 1;
            }
            if end == chars.len() {
                return Err(ParseError::UnexpectedEnd);
            }
            let inner: String = chars[start..end].iter().collect();
            tokens.push(Token::Dims(lex_dimensions(&inner)?));
            i = end + 1;
        } else if c == '>' || c == '<' {
            if chars.get(i + 1) == Some(&'=') {
                tokens.push(Token::Sym(format!("{c}=")));
                i += 2;
            } else {
                tokens.push(Token::Sym(c.to_string()));
                i += 1;
            }
        } else if c == '=' {
            tokens.push(Token::Sym("=".into()));
            i += 1;
        } else if is_word_char(c) {
            let start = i;
            while i < chars.len() && is_word_char(chars[i]) {
                i += 1;
            }
            tokens.push(Token::Word(chars[start..i].iter().collect()));
        } else {
            return Err(ParseError::UnexpectedChar(c));
        }
    }

    Ok(tokens)
}

fn lex_dimensions(inner: &str) -> Result<Vec<(String, String)>, ParseError> {
    let mut dims = Vec::new();
    for pair in inner.split(',') {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| ParseError::BadDimension(pair.trim().to_string()))?;
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() || value.contains('=') {
            return Err(ParseError::BadDimension(pair.trim().to_string()));
        }
        if dims.iter().any(|(k, _)| k == key) {
            return Err(ParseError::DuplicateDimension(key.to_string()));
        }
        dims.push((key.to_string(), value.to_string()));
    }
    Ok(dims)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Parses an alarm expression into its logic tree.
///
/// `and` binds tighter than `or`, both case-insensitive; runs of the same
/// operator flatten into one n-ary node. Any malformation yields a
/// `ParseError` and never a partial tree.
pub fn parse(text: &str) -> Result<ExprNode, ParseError> {
    let tokens = lex(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let node = parser.parse_or()?;
    match parser.peek() {
        None => Ok(node),
        Some(Token::RParen) => Err(ParseError::UnbalancedParens),
        Some(t) => Err(ParseError::UnexpectedToken(t.describe())),
    }
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if let Some(Token::Word(w)) = self.peek() {
            if w.eq_ignore_ascii_case(kw) {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn expect_word(&mut self) -> Result<String, ParseError> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            Some(t) => Err(ParseError::UnexpectedToken(t.describe())),
            None => Err(ParseError::UnexpectedEnd),
        }
    }

    fn parse_or(&mut self) -> Result<ExprNode, ParseError> {
        let mut children = vec![self.parse_and()?];
        while self.eat_keyword("or") {
            children.push(self.parse_and()?);
        }
        Ok(combine(LogicOp::Or, children))
    }

    fn parse_and(&mut self) -> Result<ExprNode, ParseError> {
        let mut children = vec![self.parse_operand()?];
        while self.eat_keyword("and") {
            children.push(self.parse_operand()?);
        }
        Ok(combine(LogicOp::And, children))
    }

    fn parse_operand(&mut self) -> Result<ExprNode, ParseError> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let node = self.parse_or()?;
            match self.next() {
                Some(Token::RParen) => Ok(node),
                Some(t) => Err(ParseError::UnexpectedToken(t.describe())),
                None => Err(ParseError::UnbalancedParens),
            }
        } else {
            self.parse_leaf()
        }
    }

    fn parse_leaf(&mut self) -> Result<ExprNode, ParseError> {
        let func_name = self.expect_word()?;
        let function = AggregateFn::from_str(&func_name)
            .map_err(|_| ParseError::UnknownFunction(func_name))?;

        match self.next() {
            Some(Token::LParen) => {}
            Some(t) => return Err(ParseError::UnexpectedToken(t.describe())),
            None => return Err(ParseError::UnexpectedEnd),
        }

        let metric_name = self.expect_word()?;

        let dimensions: BTreeMap<String, String> = match self.peek() {
            Some(Token::Dims(_)) => match self.next() {
                Some(Token::Dims(dims)) => dims.into_iter().collect(),
                _ => unreachable!(),
            },
            _ => BTreeMap::new(),
        };

        let mut window_secs = DEFAULT_WINDOW_SECS;
        if self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            let w = self.expect_word()?;
            window_secs = w
                .parse::<i64>()
                .ok()
                .filter(|w| *w > 0)
                .ok_or(ParseError::BadNumber(w))?;
        }

        match self.next() {
            Some(Token::RParen) => {}
            Some(t) => return Err(ParseError::UnexpectedToken(t.describe())),
            None => return Err(ParseError::UnbalancedParens),
        }

        let operator = match self.next() {
            Some(Token::Sym(s)) => {
                CompareOp::from_str(&s).map_err(|_| ParseError::BadOperator(s))?
            }
            Some(Token::Word(w)) => {
                CompareOp::from_str(&w).map_err(|_| ParseError::BadOperator(w))?
            }
            Some(t) => return Err(ParseError::UnexpectedToken(t.describe())),
            None => return Err(ParseError::UnexpectedEnd),
        };

        let threshold_word = self.expect_word()?;
        let threshold = threshold_word
            .parse::<f64>()
            .map_err(|_| ParseError::BadNumber(threshold_word))?;

        let mut periods = DEFAULT_PERIODS;
        if self.eat_keyword("times") {
            let p = self.expect_word()?;
            periods = p
                .parse::<usize>()
                .ok()
                .filter(|p| *p >= 1)
                .ok_or(ParseError::BadNumber(p))?;
        }

        Ok(ExprNode::Leaf(SubExpr {
            function,
            metric_name,
            dimensions,
            window_secs,
            operator,
            threshold,
            periods,
        }))
    }
}

fn combine(op: LogicOp, mut children: Vec<ExprNode>) -> ExprNode {
    if children.len() == 1 {
        children.pop().unwrap()
    } else {
        ExprNode::Combinator { op, children }
    }
}
