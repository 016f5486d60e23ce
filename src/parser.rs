use super::ast::*;
use super::error::{Error, Result};
use super::lexer;
use super::number::NumericValue;
use super::symbols::SymbolTable;
use super::token::{Span, Token, TokenKind};
use combine::error::{ParseError, StreamError};
use combine::parser::repeat::chainl1;
use combine::parser::EasyParser;
use combine::stream::{position, Stream, StreamErrorFor};
use combine::{
    attempt, between, choice, eof, look_ahead, many, optional, parser, satisfy, satisfy_map,
    sep_by, skip_many, Parser,
};
use std::collections::{HashMap, HashSet};

pub(crate) const PRINT: &str = "print";

/// Deepest bracket nesting accepted. Each `else if` arm counts as one more
/// level for as long as its chain is open.
pub const MAX_NESTING: usize = 32;

fn kind<Input>(expected: TokenKind) -> impl Parser<Input, Output = Token>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    let name = expected.describe();
    satisfy(move |t: Token| t.kind == expected).expected(name)
}

fn semicolons<Input>() -> impl Parser<Input, Output = ()>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    skip_many(kind(TokenKind::Semicolon))
}

fn ident<Input>() -> impl Parser<Input, Output = (String, Span)>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    satisfy_map(|t: Token| {
        let span = t.span();
        match t.kind {
            TokenKind::Ident(name) => Some((name, span)),
            _ => None,
        }
    })
    .expected("identifier")
}

fn reject<Input, T>(message: String) -> std::result::Result<T, StreamErrorFor<Input>>
where
    Input: Stream,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    Err(StreamErrorFor::<Input>::message_format(message))
}

fn literal_value(kind: TokenKind) -> Option<NumericValue> {
    Some(match kind {
        TokenKind::Int(n) => NumericValue::Int(n),
        TokenKind::Float(x) => NumericValue::Float(x),
        TokenKind::Rational(n, d) => return NumericValue::rational(n, d).ok(),
        TokenKind::Complex(re, im) => NumericValue::complex(re, im),
        TokenKind::Hex(n) => NumericValue::Hex(n),
        TokenKind::Binary(n) => NumericValue::Binary(n),
        TokenKind::Symbol(name) => NumericValue::symbol(name),
        _ => return None,
    })
}

fn literal<Input>() -> impl Parser<Input, Output = DataNode>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    satisfy_map(|t: Token| literal_value(t.kind).map(DataNode::Literal)).expected("literal")
}

fn term<Input>() -> impl Parser<Input, Output = DataNode>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    use TokenKind::*;

    let pure_call = (
        attempt((ident(), kind(LParen))),
        sep_by::<Vec<DataNode>, _, _, _>(data_expr(), kind(Comma)),
        kind(RParen),
    )
        .map(|(((name, span), _), args, _)| DataNode::PureCall { name, args, span });

    choice((
        literal(),
        pure_call,
        ident().map(|(name, _)| DataNode::Identifier(name)),
        between(kind(LParen), kind(RParen), data_expr()),
    ))
    .expected("data expression")
}

fn data_expr_<Input>() -> impl Parser<Input, Output = DataNode>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    chainl1(
        term(),
        kind(TokenKind::Plus)
            .map(|_| |l: DataNode, r: DataNode| DataNode::BinaryAdd(Box::new(l), Box::new(r))),
    )
}

parser! {
    fn data_expr[Input]()(Input) -> DataNode
        where [Input: Stream<Token = Token>]
    {
        data_expr_()
    }
}

fn guard<Input>() -> impl Parser<Input, Output = Guard>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    let op = satisfy_map(|t: Token| match t.kind {
        TokenKind::EqEq => Some(CmpOp::Eq),
        TokenKind::Lt => Some(CmpOp::Lt),
        TokenKind::Gt => Some(CmpOp::Gt),
        TokenKind::LtEq => Some(CmpOp::Le),
        TokenKind::GtEq => Some(CmpOp::Ge),
        _ => None,
    })
    .expected("comparison operator");

    (data_expr(), op, data_expr()).map(|(lhs, op, rhs)| Guard { lhs, op, rhs })
}

fn call<Input>() -> impl Parser<Input, Output = Call>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    (
        attempt((ident(), kind(TokenKind::LParen))),
        sep_by::<Vec<ControlExpr>, _, _, _>(control_expr(), kind(TokenKind::Comma)),
        kind(TokenKind::RParen),
    )
        .map(|(((name, span), _), args, _)| Call { name, args, span })
}

fn atom<Input>() -> impl Parser<Input, Output = ControlExpr>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    choice((
        literal().map(ControlExpr::Data),
        call().map(ControlExpr::Call),
        ident().map(|(name, _)| ControlExpr::Data(DataNode::Identifier(name))),
        between(
            kind(TokenKind::LParen),
            kind(TokenKind::RParen),
            control_expr(),
        ),
    ))
    .expected("expression")
}

fn product<Input>() -> impl Parser<Input, Output = ControlExpr>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    let op = satisfy_map(|t: Token| match t.kind {
        TokenKind::Star => Some(ArithOp::Mul),
        TokenKind::Slash => Some(ArithOp::Div),
        _ => None,
    });
    chainl1(
        atom(),
        op.map(|op| move |l: ControlExpr, r: ControlExpr| ControlExpr::binary(op, l, r)),
    )
}

fn control_expr_<Input>() -> impl Parser<Input, Output = ControlExpr>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    let op = satisfy_map(|t: Token| match t.kind {
        TokenKind::Plus => Some(ArithOp::Add),
        TokenKind::Minus => Some(ArithOp::Sub),
        _ => None,
    });
    chainl1(
        product(),
        op.map(|op| move |l: ControlExpr, r: ControlExpr| ControlExpr::binary(op, l, r)),
    )
}

parser! {
    fn control_expr[Input]()(Input) -> ControlExpr
        where [Input: Stream<Token = Token>]
    {
        control_expr_()
    }
}

fn reverse_body<Input>() -> impl Parser<Input, Output = Vec<ReversibleStmt>>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    between(
        kind(TokenKind::LBrace),
        kind(TokenKind::RBrace),
        semicolons().with(many::<Vec<ReversibleStmt>, _, _>(reversible())),
    )
}

fn reversible_<Input>() -> impl Parser<Input, Output = ReversibleStmt>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    let direction = satisfy_map(|t: Token| match t.kind {
        TokenKind::PlusAssign => Some(Direction::Increment),
        TokenKind::MinusAssign => Some(Direction::Decrement),
        _ => None,
    });
    let update = (attempt((ident(), direction)), data_expr()).map(
        |(((target, span), direction), amount)| ReversibleStmt::Update {
            target,
            direction,
            amount,
            span,
        },
    );

    let assign = attempt((ident(), kind(TokenKind::Assign))).and_then(
        |((name, _), _): ((String, Span), Token)| {
            reject::<Input, ReversibleStmt>(format!(
                "plain assignment to `{}` is not reversible, use `+=` or `-=`",
                name
            ))
        },
    );
    let call = attempt((ident(), kind(TokenKind::LParen))).and_then(
        |((name, _), _): ((String, Span), Token)| {
            reject::<Input, ReversibleStmt>(format!(
                "call to `{}` is not permitted inside a reverse block",
                name
            ))
        },
    );
    let forbidden = satisfy_map(|t: Token| match t.kind {
        TokenKind::While | TokenKind::For | TokenKind::Return | TokenKind::Reverse | TokenKind::Fn => {
            Some(t.lexeme)
        }
        _ => None,
    })
    .and_then(|word: String| {
        reject::<Input, ReversibleStmt>(format!(
            "`{}` is not permitted inside a reverse block",
            word
        ))
    });

    let conditional = (
        kind(TokenKind::If),
        guard(),
        reverse_body(),
        optional(kind(TokenKind::Else).with(reverse_body())),
    )
        .map(|(t, guard, then_branch, else_branch)| ReversibleStmt::If {
            guard,
            then_branch,
            else_branch: else_branch.unwrap_or_default(),
            span: t.span(),
        });

    choice((update, assign, call, conditional, forbidden)).skip(semicolons())
}

parser! {
    fn reversible[Input]()(Input) -> ReversibleStmt
        where [Input: Stream<Token = Token>]
    {
        reversible_()
    }
}

fn block<Input>() -> impl Parser<Input, Output = Block>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    between(
        kind(TokenKind::LBrace),
        kind(TokenKind::RBrace),
        semicolons().with(many::<Vec<Stmt>, _, _>(statement())),
    )
}

fn if_stmt_<Input>() -> impl Parser<Input, Output = Stmt>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    let else_branch =
        kind(TokenKind::Else).with(choice((block(), if_stmt().map(|s| vec![s]))));

    (kind(TokenKind::If), guard(), block(), optional(else_branch)).map(
        |(t, guard, then_branch, else_branch)| {
            Stmt::new(
                ControlNode::If {
                    guard,
                    then_branch,
                    else_branch,
                },
                t.span(),
            )
        },
    )
}

parser! {
    fn if_stmt[Input]()(Input) -> Stmt
        where [Input: Stream<Token = Token>]
    {
        if_stmt_()
    }
}

fn statement_<Input>() -> impl Parser<Input, Output = Stmt>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    use TokenKind::*;

    let while_stmt = (kind(While), guard(), block())
        .map(|(t, guard, body)| Stmt::new(ControlNode::While { guard, body }, t.span()));

    let for_stmt = (
        kind(For),
        ident(),
        kind(In),
        data_expr(),
        kind(DotDot),
        data_expr(),
        block(),
    )
        .map(|(t, (var, _), _, start, _, end, body)| {
            Stmt::new(
                ControlNode::For {
                    var,
                    start,
                    end,
                    body,
                },
                t.span(),
            )
        });

    // A value is only taken from the line `return` is on.
    let return_stmt = kind(Return).then(|t: Token| {
        let line = t.line;
        optional(look_ahead(satisfy(move |next: Token| next.line == line)).with(control_expr()))
            .map(move |value| Stmt::new(ControlNode::Return(value), t.span()))
    });

    let reverse_stmt = (kind(Reverse), reverse_body()).map(|(t, body)| {
        Stmt::new(
            ControlNode::Reverse(ReverseBlock {
                id: BlockId(t.offset),
                body,
                span: t.span(),
            }),
            t.span(),
        )
    });

    let call_stmt = call().map(|c| {
        let span = c.span;
        Stmt::new(ControlNode::Call(c), span)
    });

    let assignment = (attempt((ident(), kind(Assign))), control_expr()).map(
        |(((target, span), _), value)| Stmt::new(ControlNode::Assignment { target, value }, span),
    );

    let compound = attempt((
        ident(),
        satisfy(|t: Token| t.kind == PlusAssign || t.kind == MinusAssign),
    ))
    .and_then(|((name, _), _): ((String, Span), Token)| {
        reject::<Input, Stmt>(format!(
            "compound assignment to `{}` is only permitted inside a reverse block",
            name
        ))
    });

    let unsupported = satisfy_map(|t: Token| match t.kind {
        Module | Import => Some(format!("`{}` is reserved; modules are not supported", t.lexeme)),
        Fn | Annotation(_) => {
            Some("function declarations are only permitted at top level".to_owned())
        }
        _ => None,
    })
    .and_then(reject::<Input, Stmt>);

    choice((
        if_stmt(),
        while_stmt,
        for_stmt,
        return_stmt,
        reverse_stmt,
        call_stmt,
        assignment,
        compound,
        unsupported,
    ))
    .skip(semicolons())
    .expected("statement")
}

parser! {
    fn statement[Input]()(Input) -> Stmt
        where [Input: Stream<Token = Token>]
    {
        statement_()
    }
}

fn annotation<Input>() -> impl Parser<Input, Output = bool>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    satisfy_map(|t: Token| match t.kind {
        TokenKind::Annotation(name) => Some(name),
        _ => None,
    })
    .and_then(|name: String| match name.as_str() {
        "pure" => Ok(true),
        "total" => reject::<Input, bool>(
            "`@total` cannot be declared; totality is derived by the checker".to_owned(),
        ),
        other => reject::<Input, bool>(format!("unknown annotation `@{}`", other)),
    })
}

fn param<Input>() -> impl Parser<Input, Output = Param>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    (ident(), optional(kind(TokenKind::Colon).with(ident()))).map(|((name, _), annotation)| {
        Param {
            name,
            annotation: annotation.map(|(ty, _)| ty),
        }
    })
}

fn function_decl<Input>() -> impl Parser<Input, Output = FunctionDef>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    use TokenKind::*;

    (
        optional(annotation()),
        kind(Fn),
        ident(),
        between(
            kind(LParen),
            kind(RParen),
            sep_by::<Vec<Param>, _, _, _>(param(), kind(Comma)),
        ),
        optional(kind(Colon).with(ident())),
        block(),
    )
        .map(|(pure, _, (name, span), params, returns, body)| FunctionDef {
            name,
            params,
            returns: returns.map(|(ty, _)| ty),
            body,
            pure: pure.unwrap_or(false),
            span,
        })
        .skip(semicolons())
}

enum Item {
    Function(FunctionDef),
    Statement(Stmt),
}

fn toplevel<Input>() -> impl Parser<Input, Output = Vec<Item>>
where
    Input: Stream<Token = Token>,
    Input::Error: ParseError<Input::Token, Input::Range, Input::Position>,
{
    let item = choice((
        function_decl().map(Item::Function),
        statement().map(Item::Statement),
    ));
    (semicolons(), many::<Vec<Item>, _, _>(item), eof()).map(|(_, items, _)| items)
}

fn parse_items(source: &str, tokens: &[Token]) -> Result<Vec<Item>> {
    match toplevel().easy_parse(position::Stream::new(tokens)) {
        Ok((items, _)) => Ok(items),
        Err(e) => {
            let (offset, line) = match tokens.get(e.position) {
                Some(t) => (t.offset, t.line),
                None => (source.len(), source.matches('\n').count() + 1),
            };
            Err(Error::parse(offset, line, lexer::describe(&e)))
        }
    }
}

/// Rejects inputs nested deeper than `MAX_NESTING` before the recursive
/// grammar sees them.
fn check_nesting(tokens: &[Token]) -> Result<()> {
    use TokenKind::*;

    // One entry per open bracket plus the top level, holding the number of
    // `else if` arms in the chain open at that level.
    let mut chains = vec![0usize];
    for (i, t) in tokens.iter().enumerate() {
        let next = tokens.get(i + 1).map(|n| &n.kind);
        match t.kind {
            LParen | LBrace => chains.push(0),
            RParen | RBrace => {
                if chains.len() > 1 {
                    chains.pop();
                }
                if t.kind == RBrace && next != Some(&Else) {
                    if let Some(arms) = chains.last_mut() {
                        *arms = 0;
                    }
                }
                continue;
            }
            Else if next == Some(&If) => {
                if let Some(arms) = chains.last_mut() {
                    *arms += 1;
                }
            }
            _ => continue,
        }
        let depth = chains.len() - 1 + chains.iter().sum::<usize>();
        if depth > MAX_NESTING {
            return Err(Error::parse(
                t.offset,
                t.line,
                format!("input is nested too deeply (max depth: {})", MAX_NESTING),
            ));
        }
    }
    Ok(())
}

/// Parses and resolves `source` into a program.
pub fn parse(source: &str) -> Result<Program> {
    let tokens = lexer::tokenize(source)?;
    check_nesting(&tokens)?;
    let items = parse_items(source, &tokens)?;
    Resolver::resolve(items)
}

struct Signature {
    pure: bool,
    arity: usize,
}

/// Binds call sites against the hoisted function signatures and folds
/// all-Data subtrees of Control expressions back into `DataNode`s.
struct Resolver {
    signatures: HashMap<String, Signature>,
}

fn error_at(span: Span, message: String) -> Error {
    Error::parse(span.start, span.line, message)
}

impl Resolver {
    fn resolve(items: Vec<Item>) -> Result<Program> {
        let mut signatures = HashMap::new();
        for item in &items {
            if let Item::Function(def) = item {
                if def.name == PRINT {
                    return Err(error_at(
                        def.span,
                        format!("`{}` is a builtin and cannot be redefined", PRINT),
                    ));
                }
                let mut seen = HashSet::new();
                if let Some(dup) = def.params.iter().find(|p| !seen.insert(p.name.as_str())) {
                    return Err(error_at(
                        def.span,
                        format!("parameter `{}` of `{}` is declared twice", dup.name, def.name),
                    ));
                }
                let signature = Signature {
                    pure: def.pure,
                    arity: def.arity(),
                };
                if signatures.insert(def.name.clone(), signature).is_some() {
                    return Err(error_at(
                        def.span,
                        format!("function `{}` is declared more than once", def.name),
                    ));
                }
            }
        }

        let resolver = Resolver { signatures };
        let mut functions = SymbolTable::default();
        let mut body = Vec::new();
        for item in items {
            match item {
                Item::Function(mut def) => {
                    def.body = resolver.block(def.body)?;
                    body.push(Stmt::new(ControlNode::FunctionDecl(def.name.clone()), def.span));
                    functions.insert(def);
                }
                Item::Statement(stmt) => body.push(resolver.stmt(stmt)?),
            }
        }

        Ok(Program { body, functions })
    }

    fn is_pure(&self, name: &str) -> bool {
        self.signatures.get(name).map_or(false, |s| s.pure)
    }

    fn arity(&self, name: &str, expected: usize, found: usize, span: Span) -> Result<()> {
        if expected == found {
            Ok(())
        } else {
            Err(error_at(
                span,
                format!(
                    "`{}` takes {} argument(s) but {} were supplied",
                    name, expected, found
                ),
            ))
        }
    }

    fn block(&self, stmts: Block) -> Result<Block> {
        stmts.into_iter().map(|s| self.stmt(s)).collect()
    }

    fn stmt(&self, stmt: Stmt) -> Result<Stmt> {
        let Stmt { node, span } = stmt;
        let node = match node {
            ControlNode::Assignment { target, value } => ControlNode::Assignment {
                target,
                value: self.control(value)?,
            },
            ControlNode::If {
                guard,
                then_branch,
                else_branch,
            } => {
                self.guard(&guard)?;
                ControlNode::If {
                    guard,
                    then_branch: self.block(then_branch)?,
                    else_branch: else_branch.map(|b| self.block(b)).transpose()?,
                }
            }
            ControlNode::While { guard, body } => {
                self.guard(&guard)?;
                ControlNode::While {
                    guard,
                    body: self.block(body)?,
                }
            }
            ControlNode::For {
                var,
                start,
                end,
                body,
            } => {
                self.data(&start)?;
                self.data(&end)?;
                ControlNode::For {
                    var,
                    start,
                    end,
                    body: self.block(body)?,
                }
            }
            ControlNode::Return(value) => {
                ControlNode::Return(value.map(|v| self.control(v)).transpose()?)
            }
            ControlNode::Call(call) => ControlNode::Call(self.call(call)?),
            ControlNode::Reverse(block) => {
                self.reversible(&block.body)?;
                ControlNode::Reverse(block)
            }
            decl @ ControlNode::FunctionDecl(_) => decl,
        };
        Ok(Stmt { node, span })
    }

    fn guard(&self, guard: &Guard) -> Result<()> {
        self.data(&guard.lhs)?;
        self.data(&guard.rhs)
    }

    fn reversible(&self, body: &[ReversibleStmt]) -> Result<()> {
        for stmt in body {
            match stmt {
                ReversibleStmt::Update { amount, .. } => self.data(amount)?,
                ReversibleStmt::If {
                    guard,
                    then_branch,
                    else_branch,
                    ..
                } => {
                    self.guard(guard)?;
                    self.reversible(then_branch)?;
                    self.reversible(else_branch)?;
                }
            }
        }
        Ok(())
    }

    fn data(&self, node: &DataNode) -> Result<()> {
        match node {
            DataNode::Literal(_) | DataNode::Identifier(_) => Ok(()),
            DataNode::BinaryAdd(lhs, rhs) => {
                self.data(lhs)?;
                self.data(rhs)
            }
            DataNode::PureCall { name, args, span } => match self.signatures.get(name) {
                Some(sig) if sig.pure => {
                    self.arity(name, sig.arity, args.len(), *span)?;
                    args.iter().try_for_each(|a| self.data(a))
                }
                Some(_) => Err(error_at(
                    *span,
                    format!(
                        "`{}` is not declared @pure and cannot be called in data position",
                        name
                    ),
                )),
                None if name == PRINT => Err(error_at(
                    *span,
                    format!("`{}` performs I/O and cannot be called in data position", name),
                )),
                None => Err(error_at(
                    *span,
                    format!("undefined function `{}` in data position", name),
                )),
            },
        }
    }

    fn call(&self, call: Call) -> Result<Call> {
        let Call { name, args, span } = call;
        if name != PRINT {
            match self.signatures.get(&name) {
                Some(sig) => self.arity(&name, sig.arity, args.len(), span)?,
                None => return Err(error_at(span, format!("undefined function `{}`", name))),
            }
        }
        let args = args
            .into_iter()
            .map(|a| self.control(a))
            .collect::<Result<Vec<_>>>()?;
        Ok(Call { name, args, span })
    }

    fn control(&self, expr: ControlExpr) -> Result<ControlExpr> {
        match expr {
            ControlExpr::Data(node) => {
                self.data(&node)?;
                Ok(ControlExpr::Data(node))
            }
            ControlExpr::Binary { op, lhs, rhs } => {
                let lhs = self.control(*lhs)?;
                let rhs = self.control(*rhs)?;
                Ok(match (op, lhs, rhs) {
                    (ArithOp::Add, ControlExpr::Data(l), ControlExpr::Data(r)) => {
                        ControlExpr::Data(DataNode::BinaryAdd(Box::new(l), Box::new(r)))
                    }
                    (op, lhs, rhs) => ControlExpr::binary(op, lhs, rhs),
                })
            }
            ControlExpr::Call(call) => {
                let Call { name, args, span } = self.call(call)?;
                if self.is_pure(&name) && args.iter().all(|a| matches!(a, ControlExpr::Data(_))) {
                    let args = args
                        .into_iter()
                        .filter_map(|a| match a {
                            ControlExpr::Data(d) => Some(d),
                            _ => None,
                        })
                        .collect();
                    Ok(ControlExpr::Data(DataNode::PureCall { name, args, span }))
                } else {
                    Ok(ControlExpr::Call(Call { name, args, span }))
                }
            }
        }
    }
}
