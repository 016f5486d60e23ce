use super::ast::*;
use super::diagnostic::{Diagnostic, DiagnosticKind};
use super::parser::PRINT;
use super::symbols::{FunctionId, SymbolTable};
use super::token::Span;

struct CallSite<'p> {
    name: &'p str,
    callee: Option<FunctionId>,
    span: Span,
}

/// Syntactic facts about one function body.
struct Facts<'p> {
    loops: Vec<(&'static str, Span)>,
    calls: Vec<CallSite<'p>>,
}

enum Node<'p> {
    Stmt(&'p Stmt),
    Control(&'p ControlExpr),
    Data(&'p DataNode),
    Reversible(&'p ReversibleStmt),
}

fn collect<'p>(body: &'p [Stmt], functions: &SymbolTable) -> Facts<'p> {
    let mut facts = Facts {
        loops: Vec::new(),
        calls: Vec::new(),
    };
    let mut pending: Vec<Node<'p>> = body.iter().rev().map(Node::Stmt).collect();

    let call = |facts: &mut Facts<'p>, name: &'p str, span: Span| {
        facts.calls.push(CallSite {
            name,
            callee: functions.id(name),
            span,
        })
    };

    while let Some(node) = pending.pop() {
        match node {
            Node::Stmt(stmt) => match &stmt.node {
                ControlNode::Assignment { value, .. } => pending.push(Node::Control(value)),
                ControlNode::If {
                    guard,
                    then_branch,
                    else_branch,
                } => {
                    if let Some(b) = else_branch {
                        pending.extend(b.iter().rev().map(Node::Stmt));
                    }
                    pending.extend(then_branch.iter().rev().map(Node::Stmt));
                    pending.push(Node::Data(&guard.rhs));
                    pending.push(Node::Data(&guard.lhs));
                }
                ControlNode::While { guard, body } => {
                    facts.loops.push(("while", stmt.span));
                    pending.extend(body.iter().rev().map(Node::Stmt));
                    pending.push(Node::Data(&guard.rhs));
                    pending.push(Node::Data(&guard.lhs));
                }
                ControlNode::For {
                    start, end, body, ..
                } => {
                    facts.loops.push(("for", stmt.span));
                    pending.extend(body.iter().rev().map(Node::Stmt));
                    pending.push(Node::Data(end));
                    pending.push(Node::Data(start));
                }
                ControlNode::Return(value) => pending.extend(value.iter().map(Node::Control)),
                ControlNode::Call(c) => {
                    call(&mut facts, &c.name, c.span);
                    pending.extend(c.args.iter().rev().map(Node::Control));
                }
                ControlNode::Reverse(block) => {
                    pending.extend(block.body.iter().rev().map(Node::Reversible))
                }
                ControlNode::FunctionDecl(_) => {}
            },
            Node::Control(expr) => match expr {
                ControlExpr::Data(d) => pending.push(Node::Data(d)),
                ControlExpr::Binary { lhs, rhs, .. } => {
                    pending.push(Node::Control(rhs));
                    pending.push(Node::Control(lhs));
                }
                ControlExpr::Call(c) => {
                    call(&mut facts, &c.name, c.span);
                    pending.extend(c.args.iter().rev().map(Node::Control));
                }
            },
            Node::Data(data) => match data {
                DataNode::Literal(_) | DataNode::Identifier(_) => {}
                DataNode::BinaryAdd(lhs, rhs) => {
                    pending.push(Node::Data(rhs));
                    pending.push(Node::Data(lhs));
                }
                DataNode::PureCall { name, args, span } => {
                    call(&mut facts, name, *span);
                    pending.extend(args.iter().rev().map(Node::Data));
                }
            },
            Node::Reversible(stmt) => match stmt {
                ReversibleStmt::Update { amount, .. } => pending.push(Node::Data(amount)),
                ReversibleStmt::If {
                    guard,
                    then_branch,
                    else_branch,
                    ..
                } => {
                    pending.extend(else_branch.iter().rev().map(Node::Reversible));
                    pending.extend(then_branch.iter().rev().map(Node::Reversible));
                    pending.push(Node::Data(&guard.rhs));
                    pending.push(Node::Data(&guard.lhs));
                }
            },
        }
    }

    facts
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    White,
    Grey,
    Black,
}

/// Finds the first call cycle reachable from `root` through pure functions.
/// Returns the chain of names and the span of the call closing it.
fn find_cycle(
    root: FunctionId,
    graph: &[Facts],
    functions: &SymbolTable,
) -> Option<(Vec<FunctionId>, Span)> {
    let mut marks = vec![Mark::White; graph.len()];
    // (function, index of the next outgoing call to inspect)
    let mut stack = vec![(root, 0)];
    marks[root.0] = Mark::Grey;

    while let Some(top) = stack.last_mut() {
        let node = top.0;
        let calls = &graph[node.0].calls;
        if top.1 == calls.len() {
            marks[node.0] = Mark::Black;
            stack.pop();
            continue;
        }
        let site = &calls[top.1];
        top.1 += 1;

        let callee = match site.callee {
            Some(id) if functions.def(id).pure => id,
            _ => continue,
        };
        match marks[callee.0] {
            Mark::White => {
                marks[callee.0] = Mark::Grey;
                stack.push((callee, 0));
            }
            Mark::Grey => {
                let start = stack.iter().position(|&(f, _)| f == callee).unwrap_or(0);
                let mut chain: Vec<FunctionId> = stack[start..].iter().map(|&(f, _)| f).collect();
                chain.push(callee);
                return Some((chain, site.span));
            }
            Mark::Black => {}
        }
    }

    None
}

/// Outcome of checking a program: every diagnostic plus the derived
/// totality of each function, indexed by `FunctionId`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub diagnostics: Vec<Diagnostic>,
    total: Vec<bool>,
}

impl Analysis {
    pub fn is_total(&self, id: FunctionId) -> bool {
        self.total.get(id.0).copied().unwrap_or(false)
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

pub fn analyze(program: &Program) -> Analysis {
    let functions = &program.functions;
    let graph: Vec<Facts> = functions
        .iter()
        .map(|(_, def)| collect(&def.body, functions))
        .collect();

    let mut analysis = Analysis {
        diagnostics: Vec::new(),
        total: vec![false; functions.len()],
    };

    for (id, def) in functions.iter().filter(|(_, def)| def.pure) {
        let facts = &graph[id.0];
        let before = analysis.diagnostics.len();
        let mut report = |kind, message: String, span: Span| {
            analysis.diagnostics.push(Diagnostic {
                kind,
                function: def.name.clone(),
                message,
                span,
            })
        };

        for &(keyword, span) in &facts.loops {
            report(
                DiagnosticKind::TotalityViolation,
                format!("`{}` loop on line {} may not terminate", keyword, span.line),
                span,
            );
        }

        for site in &facts.calls {
            let impure = match site.callee {
                Some(callee) => !functions.def(callee).pure,
                None => site.name == PRINT,
            };
            if impure {
                report(
                    DiagnosticKind::PurityViolation,
                    format!(
                        "call to impure `{}` on line {}",
                        site.name, site.span.line
                    ),
                    site.span,
                );
            }
        }

        if let Some((chain, span)) = find_cycle(id, &graph, functions) {
            let names: Vec<&str> = chain
                .iter()
                .map(|&f| functions.def(f).name.as_str())
                .collect();
            report(
                DiagnosticKind::TotalityViolation,
                format!(
                    "recursive call chain {} closes on line {}",
                    names.join(" -> "),
                    span.line
                ),
                span,
            );
        }

        if analysis.diagnostics.len() == before {
            analysis.total[id.0] = true;
        }
    }

    analysis
}

/// Every totality and purity finding for `program`; empty when it may run.
pub fn check_totality(program: &Program) -> Vec<Diagnostic> {
    analyze(program).diagnostics
}

#[cfg(test)]
mod test {
    use super::super::parser::parse;
    use super::*;

    fn diagnostics(source: &str) -> Vec<Diagnostic> {
        check_totality(&parse(source).unwrap())
    }

    #[test]
    fn test_clean_pure_functions() {
        let program = parse(
            "@pure fn double(n) { return n + n }
             @pure fn quad(n) { return double(double(n)) }
             @pure fn sign(n) { if n < 0 { return 0 - 1 } else { return 1 } }
             fn noisy(n) { while n < 3 { n = n + 1 } print(n) }",
        )
        .unwrap();
        let analysis = analyze(&program);
        assert!(analysis.is_clean(), "{:?}", analysis.diagnostics);
        for name in &["double", "quad", "sign"] {
            assert!(analysis.is_total(program.functions.id(name).unwrap()));
        }
        assert!(!analysis.is_total(program.functions.id("noisy").unwrap()));
    }

    #[test]
    fn test_loop_in_pure_function() {
        let found = diagnostics(
            "@pure fn sum(n) {\n  total = 0\n  for i in 0..n {\n    total = total + i\n  }\n  return total\n}",
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].kind, DiagnosticKind::TotalityViolation);
        assert_eq!(found[0].function, "sum");
        assert_eq!(found[0].line(), 3);
        assert!(found[0].message.contains("`for`"));

        let found = diagnostics("@pure fn spin(n) {\n  while n < 10 { n = n }\n  return n\n}");
        assert_eq!(found[0].line(), 2);
        assert!(found[0].message.contains("`while`"));
    }

    #[test]
    fn test_impure_calls() {
        let found = diagnostics(
            "fn log(n) { print(n) }
             @pure fn f(n) {
               log(n)
               print(n)
               return n
             }",
        );
        assert_eq!(found.len(), 2);
        assert!(found
            .iter()
            .all(|d| d.kind == DiagnosticKind::PurityViolation && d.function == "f"));
        assert!(found[0].message.contains("`log`"));
        assert!(found[1].message.contains("`print`"));
        assert_eq!(found[1].line(), 4);
    }

    #[test]
    fn test_recursion() {
        let found = diagnostics("@pure fn loop_(n) {\n  return loop_(n)\n}");
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("loop_ -> loop_"));
        assert_eq!(found[0].line(), 2);

        let found = diagnostics(
            "@pure fn even(n) { if n == 0 { return 1 } return odd(n) }
             @pure fn odd(n) { if n == 0 { return 0 } return even(n) }",
        );
        assert_eq!(found.len(), 2);
        assert!(found[0].message.contains("even -> odd -> even"));
        assert!(found[1].message.contains("odd -> even -> odd"));
        assert!(found
            .iter()
            .all(|d| d.kind == DiagnosticKind::TotalityViolation));
    }

    #[test]
    fn test_cycle_reachable_through_callee() {
        let program = parse(
            "@pure fn spin(n) { return spin(n) }
             @pure fn outer(n) { return spin(n) + 1 }",
        )
        .unwrap();
        let analysis = analyze(&program);
        assert_eq!(analysis.diagnostics.len(), 2);
        assert_eq!(analysis.diagnostics[1].function, "outer");
        assert!(!analysis.is_total(program.functions.id("outer").unwrap()));
    }

    #[test]
    fn test_ordinary_functions_unchecked() {
        assert!(diagnostics("fn forever() { while 1 == 1 { } forever() }").is_empty());
    }

    #[test]
    fn test_deep_call_chain() {
        let mut source = String::new();
        for i in 0..2000 {
            source.push_str(&format!("@pure fn f{}(n) {{ return f{}(n) }}\n", i, i + 1));
        }
        source.push_str("@pure fn f2000(n) { return n }\n");
        assert!(diagnostics(&source).is_empty());
    }
}
