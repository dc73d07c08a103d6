//! Formula text to validated parts
//!
//! One left-to-right scan collects raw parts (operators, names, operands),
//! recursing into parenthesized groups and function arguments. A second pass
//! validates operator positions and turns the remaining names into
//! references.

use crate::ast::{BinaryOperator, Call, Operand, Part, Reference, Resolution, Single, UnaryOperator};
use crate::cache::ParseCache;
use crate::compiler;
use crate::error::{FormulaError, FormulaResult};
use crate::expression::Expression;
use crate::literal::{LiteralNode, LITERAL_MARKER};
use crate::settings::FormulaSettings;
use crate::value::Value;
use lazy_regex::regex_is_match;
use scalc_decimal::{is_decimal_literal, ScaledDecimal};
use scalc_jsonx::{is_date_like, parse_relaxed, JsonxError};

/// Deepest nesting of groups, call arguments and embedded-literal values
pub const MAX_NESTING_DEPTH: usize = 128;

/// What a parse needs from its engine
#[derive(Clone, Copy)]
pub(crate) struct ParseEnv<'a> {
    pub settings: &'a FormulaSettings,
    pub cache: &'a ParseCache,
    pub settings_id: u64,
    depth: usize,
}

impl<'a> ParseEnv<'a> {
    pub fn new(settings: &'a FormulaSettings, cache: &'a ParseCache, settings_id: u64) -> Self {
        Self {
            settings,
            cache,
            settings_id,
            depth: 0,
        }
    }

    /// Environment for text nested one level inside this one
    fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..*self
        }
    }
}

/// Why an embedded literal could not be built
enum LiteralFailure {
    /// Not relaxed JSON; the source is kept as text
    Syntax(JsonxError),
    Formula(FormulaError),
}

/// Parse `text` into an expression
///
/// `with_plan` asks for a specialized plan (when the settings allow it).
/// Groups and call arguments are parsed without one; the enclosing plan
/// inlines them. Text nested deeper than [`MAX_NESTING_DEPTH`] is rejected.
pub(crate) fn parse_expression(
    text: &str,
    env: &ParseEnv<'_>,
    with_plan: bool,
) -> FormulaResult<Expression> {
    if env.depth > MAX_NESTING_DEPTH {
        return Err(FormulaError::NestingTooDeep(MAX_NESTING_DEPTH));
    }
    let raw = Scanner::new(text, env).run()?;
    let parts = finish(raw, env)?;
    let single = single_of(&parts);
    let numeric = env.settings.is_numeric_mode();

    let plan = if with_plan && env.settings.is_compile_enabled() && single.is_none() {
        match compiler::compile(&parts, numeric) {
            Ok(program) => Some(program),
            Err(e) => {
                log::warn!("formula {:?} falls back to the interpreter: {}", text, e);
                None
            }
        }
    } else {
        None
    };

    Ok(Expression::new(text, parts, single, numeric, plan))
}

/// Parts before validation
enum RawPart {
    Operator(String),
    /// Bare name: a reference, or a function when `(` follows
    Name(String),
    /// `[name]`, exempt from the default reference grammar
    BracketName(String),
    Operand(Operand),
}

fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '!' | '^' | '*' | '/' | '%' | '+' | '-' | '<' | '>' | '=' | '&' | '|' | '?'
    )
}

fn closer(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

/// Index just past the quote closing the one at `start`
fn skip_quoted(chars: &[char], start: usize, escapes: bool) -> Option<usize> {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if escapes => i += 2,
            c if c == quote => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Index of the delimiter closing the group opened at `start`
///
/// Quotes are skipped; backslash escapes count only inside braces or brackets,
/// where the relaxed literal syntax allows them.
fn group_end(chars: &[char], start: usize) -> FormulaResult<usize> {
    let mut stack = vec![closer(chars[start])];
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' | '`' => {
                let escapes = stack.iter().any(|&close| close != ')');
                i = skip_quoted(chars, i, escapes).ok_or(FormulaError::UnmatchedDelimiter(c))?;
                continue;
            }
            '(' | '[' | '{' => stack.push(closer(c)),
            ')' | ']' | '}' => {
                if stack.pop() != Some(c) {
                    return Err(FormulaError::UnmatchedDelimiter(c));
                }
                if stack.is_empty() {
                    return Ok(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(FormulaError::UnmatchedDelimiter(chars[start]))
}

/// Split argument text on top-level `,` and `;`
fn split_args(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut args = Vec::new();
    let mut stack: Vec<char> = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' | '`' => {
                let escapes = stack.iter().any(|&close| close != ')');
                i = skip_quoted(&chars, i, escapes).unwrap_or(chars.len());
                continue;
            }
            '(' | '[' | '{' => stack.push(closer(c)),
            ')' | ']' | '}' => {
                stack.pop();
            }
            ',' | ';' if stack.is_empty() => {
                args.push(chars[start..i].iter().collect());
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    args.push(chars[start..].iter().collect());
    args
}

/// `[name]` rather than an embedded array
///
/// A lone number or date is an array of one, as it is inside `{...}`.
fn is_bracket_reference(inner: &str) -> bool {
    let name = inner.trim();
    !name.is_empty()
        && !is_decimal_literal(name)
        && !is_date_like(name)
        && !name.contains([',', '[', ']', '{', '}', '"', '\'', '`'])
}

struct Scanner<'e, 'a> {
    env: &'e ParseEnv<'a>,
    chars: Vec<char>,
    pos: usize,
    token: String,
    raw: Vec<RawPart>,
    /// Position right after the last operator character
    operator_end: Option<usize>,
}

impl<'e, 'a> Scanner<'e, 'a> {
    fn new(text: &str, env: &'e ParseEnv<'a>) -> Self {
        Self {
            env,
            chars: text.chars().collect(),
            pos: 0,
            token: String::new(),
            raw: Vec::new(),
            operator_end: None,
        }
    }

    fn run(mut self) -> FormulaResult<Vec<RawPart>> {
        while self.pos < self.chars.len() {
            let c = self.chars[self.pos];
            match c {
                '"' | '\'' | '`' => self.read_quoted(c)?,
                '(' => self.read_parenthesized()?,
                '[' => self.read_bracketed()?,
                '{' => self.read_braced()?,
                ')' | ']' | '}' => return Err(FormulaError::UnmatchedDelimiter(c)),
                c if c.is_whitespace() => {
                    self.flush()?;
                    self.pos += 1;
                }
                c if is_operator_char(c) && !self.continues_exponent(c) => self.read_operator(c)?,
                c => {
                    self.token.push(c);
                    self.pos += 1;
                }
            }
        }
        self.flush()?;
        Ok(self.raw)
    }

    fn text(&self, from: usize, to: usize) -> String {
        self.chars[from..to].iter().collect()
    }

    /// `+`/`-` right after the `e` of a number such as `1e-5`
    fn continues_exponent(&self, c: char) -> bool {
        (c == '+' || c == '-')
            && self.token.ends_with(['e', 'E'])
            && is_decimal_literal(&format!("{}0", self.token))
    }

    /// Classify the pending bare token
    fn flush(&mut self) -> FormulaResult<()> {
        if self.token.is_empty() {
            return Ok(());
        }
        let token = std::mem::take(&mut self.token);

        if is_decimal_literal(&token) {
            let number = ScaledDecimal::parse(&token)
                .map_err(|_| FormulaError::InvalidToken(token.clone()))?;
            self.raw.push(RawPart::Operand(Operand::Constant(Value::Number(number))));
            return Ok(());
        }
        let settings = self.env.settings;
        if !settings.constants().is_empty() {
            if let Some(value) = settings.constant(&token) {
                self.raw.push(RawPart::Operand(Operand::Constant(value.clone())));
                return Ok(());
            }
        }
        if !regex_is_match!(r"^[\w$#.@:]+$", &token) {
            return Err(FormulaError::InvalidToken(token));
        }
        self.raw.push(RawPart::Name(token));
        Ok(())
    }

    fn read_operator(&mut self, c: char) -> FormulaResult<()> {
        self.flush()?;
        if self.operator_end == Some(self.pos) {
            if let Some(RawPart::Operator(previous)) = self.raw.last_mut() {
                let mut merged = previous.clone();
                merged.push(c);
                if previous.chars().count() == 1 && BinaryOperator::from_symbol(&merged).is_some() {
                    *previous = merged;
                    self.pos += 1;
                    self.operator_end = None;
                    return Ok(());
                }
            }
        }
        self.raw.push(RawPart::Operator(c.to_string()));
        self.pos += 1;
        self.operator_end = Some(self.pos);
        Ok(())
    }

    /// Quoted string; no escapes inside
    fn read_quoted(&mut self, quote: char) -> FormulaResult<()> {
        self.flush()?;
        let end = skip_quoted(&self.chars, self.pos, false)
            .ok_or(FormulaError::UnmatchedDelimiter(quote))?;
        let content = self.text(self.pos + 1, end - 1);
        self.pos = end;

        let operand = if is_decimal_literal(&content) {
            match ScaledDecimal::parse(&content) {
                Ok(number) => Operand::Constant(Value::Number(number)),
                Err(_) => Operand::Literal(content),
            }
        } else {
            Operand::Literal(content)
        };
        self.raw.push(RawPart::Operand(operand));
        Ok(())
    }

    fn read_parenthesized(&mut self) -> FormulaResult<()> {
        self.flush()?;
        let end = group_end(&self.chars, self.pos)?;
        let inner = self.text(self.pos + 1, end);
        self.pos = end + 1;

        if matches!(self.raw.last(), Some(RawPart::Name(_))) {
            if let Some(RawPart::Name(name)) = self.raw.pop() {
                let call = self.call(name, &inner)?;
                self.raw.push(RawPart::Operand(Operand::Call(call)));
            }
            return Ok(());
        }

        if inner.trim().is_empty() {
            return Err(FormulaError::EmptyExpression);
        }
        let segment = parse_expression(&inner, &self.env.nested(), false)?;
        self.raw.push(RawPart::Operand(Operand::Segment(segment)));
        Ok(())
    }

    fn call(&self, name: String, inner: &str) -> FormulaResult<Call> {
        let def = self
            .env
            .settings
            .functions()
            .get(&name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;

        let texts = if inner.trim().is_empty() {
            Vec::new()
        } else {
            split_args(inner)
        };
        if let Some(reason) = def.arity_error(texts.len()) {
            return Err(FormulaError::InvalidArguments { function: name, reason });
        }

        let env = self.env.nested();
        let mut args = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            if text.trim().is_empty() {
                return Err(FormulaError::InvalidArguments {
                    function: name,
                    reason: format!("argument {} is empty", i + 1),
                });
            }
            args.push(parse_expression(text, &env, false)?);
        }

        Ok(Call {
            function: def.implementation.clone(),
            name,
            args,
        })
    }

    fn read_bracketed(&mut self) -> FormulaResult<()> {
        self.flush()?;
        let end = group_end(&self.chars, self.pos)?;
        let inner = self.text(self.pos + 1, end);
        if is_bracket_reference(&inner) {
            self.raw.push(RawPart::BracketName(inner.trim().to_string()));
        } else {
            let source = self.text(self.pos, end + 1);
            let operand = self.embedded_literal(&source)?;
            self.raw.push(RawPart::Operand(operand));
        }
        self.pos = end + 1;
        Ok(())
    }

    fn read_braced(&mut self) -> FormulaResult<()> {
        self.flush()?;
        let end = group_end(&self.chars, self.pos)?;
        let source = self.text(self.pos, end + 1);
        let operand = self.embedded_literal(&source)?;
        self.raw.push(RawPart::Operand(operand));
        self.pos = end + 1;
        Ok(())
    }

    /// Literal tree for `source`, or its text when it is not relaxed JSON
    fn embedded_literal(&self, source: &str) -> FormulaResult<Operand> {
        let env = self.env;
        let nested = env.nested();
        let compile = env.settings.is_compile_enabled();
        let build = |text: &str| -> Result<LiteralNode, LiteralFailure> {
            let json = parse_relaxed(text, LITERAL_MARKER, env.settings.is_wrapping_function_calls())
                .map_err(LiteralFailure::Syntax)?;
            let mut parse = |inner: &str| parse_expression(inner, &nested, compile);
            LiteralNode::from_json(json, &mut parse).map_err(LiteralFailure::Formula)
        };
        match env.cache.literal_tree(env.settings_id, source, build) {
            Ok(tree) => Ok(Operand::Tree(tree)),
            Err(LiteralFailure::Syntax(e)) => {
                log::debug!("embedded literal {:?} kept as text: {}", source, e);
                Ok(Operand::Literal(source.trim().to_string()))
            }
            Err(LiteralFailure::Formula(e)) => Err(e),
        }
    }
}

/// Validate operator positions and resolve names
fn finish(raw: Vec<RawPart>, env: &ParseEnv<'_>) -> FormulaResult<Vec<Part>> {
    let mut parts = Vec::with_capacity(raw.len());
    let mut expect_operand = true;

    for part in raw {
        let operand = match part {
            RawPart::Operator(symbol) => {
                if expect_operand {
                    match UnaryOperator::from_symbol(&symbol) {
                        Some(op) => parts.push(Part::Prefix(op)),
                        None if BinaryOperator::from_symbol(&symbol).is_some() => {
                            return Err(FormulaError::OperatorPosition(symbol))
                        }
                        None => return Err(FormulaError::UnknownOperator(symbol)),
                    }
                } else {
                    match BinaryOperator::from_symbol(&symbol) {
                        Some(op) => parts.push(Part::Binary(op)),
                        None if UnaryOperator::from_symbol(&symbol).is_some() => {
                            return Err(FormulaError::OperatorPosition(symbol))
                        }
                        None => return Err(FormulaError::UnknownOperator(symbol)),
                    }
                    expect_operand = true;
                }
                continue;
            }
            RawPart::Name(name) | RawPart::BracketName(name) => {
                Operand::Reference(reference(name, env)?)
            }
            RawPart::Operand(operand) => operand,
        };
        if !expect_operand {
            return Err(FormulaError::MissingOperator);
        }
        parts.push(Part::Operand(operand));
        expect_operand = false;
    }

    if parts.is_empty() {
        return Err(FormulaError::EmptyExpression);
    }
    if expect_operand {
        return Err(FormulaError::TrailingOperator);
    }
    Ok(parts)
}

fn reference(name: String, env: &ParseEnv<'_>) -> FormulaResult<Reference> {
    let settings = env.settings;
    if let Some(pattern) = settings.token_pattern() {
        if !pattern.is_match(&name) {
            return Err(FormulaError::InvalidReference(name));
        }
    }
    let resolution = match settings.reference() {
        Some(factory) => {
            Resolution::Custom(env.cache.resolver(env.settings_id, &name, |n| factory(n))?)
        }
        None => Resolution::Context {
            default: settings.default_value().cloned(),
        },
    };
    Ok(Reference { name, resolution })
}

fn single_of(parts: &[Part]) -> Option<Single> {
    match parts {
        [Part::Operand(operand)] => match operand {
            Operand::Reference(reference) => Some(Single::Reference(reference.name.clone())),
            Operand::Literal(text) => Some(Single::Value(Value::String(text.clone()))),
            Operand::Constant(value) => Some(Single::Value(value.clone())),
            Operand::Tree(tree) => Some(Single::Tree(tree.clone())),
            Operand::Call(_) | Operand::Segment(_) => None,
        },
        _ => None,
    }
}
