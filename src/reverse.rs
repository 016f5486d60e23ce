use super::ast::*;
use super::error::{Error, ErrorKind, Result};
use super::interpreter::Interpreter;
use super::number::{Kind, NumericValue};
use super::trace::Event;
use log::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LogEntry {
    target: String,
    direction: Direction,
    amount: NumericValue,
}

/// Updates applied by one forward execution of a reverse block.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReverseLog {
    block: BlockId,
    entries: Vec<LogEntry>,
}

fn apply(value: &NumericValue, direction: Direction, amount: &NumericValue) -> Result<NumericValue> {
    match direction {
        Direction::Increment => value.add(amount),
        Direction::Decrement => value.sub(amount),
    }
}

fn operator(direction: Direction) -> &'static str {
    match direction {
        Direction::Increment => "+=",
        Direction::Decrement => "-=",
    }
}

impl<'p> Interpreter<'p> {
    /// Every call reachable from the block's operands must target a function
    /// the checker proved total.
    fn validate(&self, block: &ReverseBlock) -> Result<()> {
        let mut stmts: Vec<&ReversibleStmt> = block.body.iter().collect();
        let mut data: Vec<&DataNode> = Vec::new();

        while let Some(stmt) = stmts.pop() {
            match stmt {
                ReversibleStmt::Update { amount, .. } => data.push(amount),
                ReversibleStmt::If {
                    guard,
                    then_branch,
                    else_branch,
                    ..
                } => {
                    data.push(&guard.lhs);
                    data.push(&guard.rhs);
                    stmts.extend(then_branch);
                    stmts.extend(else_branch);
                }
            }
        }

        while let Some(node) = data.pop() {
            match node {
                DataNode::Literal(_) | DataNode::Identifier(_) => {}
                DataNode::BinaryAdd(lhs, rhs) => {
                    data.push(lhs);
                    data.push(rhs);
                }
                DataNode::PureCall { name, args, .. } => {
                    let total = self
                        .program
                        .functions
                        .id(name)
                        .map_or(false, |id| self.analysis.is_total(id));
                    if !total {
                        return Err(Error::irreversible(format!(
                            "`{}` is not a proven-total function",
                            name
                        )));
                    }
                    data.extend(args);
                }
            }
        }

        Ok(())
    }

    /// Executes `block` forward against the current frame and records its log.
    pub fn run_reverse(&mut self, block: &ReverseBlock) -> Result<()> {
        self.begin();
        self.forward(block)
    }

    pub(crate) fn forward(&mut self, block: &ReverseBlock) -> Result<()> {
        self.validate(block)?;

        let mut entries = Vec::new();
        if let Err(e) = self.apply_all(&block.body, &mut entries) {
            debug!(
                "reverse @{} failed after {} update(s), undoing",
                block.id.0,
                entries.len()
            );
            if let Err(undo) = self.unwind(&entries) {
                warn!("could not undo reverse @{}: {}", block.id.0, undo);
            }
            return Err(e);
        }

        self.tracer.event(&Event::ReverseForward {
            block: block.id,
            entries: entries.len(),
        });
        self.frame_mut().reverse_logs.push(ReverseLog {
            block: block.id,
            entries,
        });
        Ok(())
    }

    fn apply_all(&mut self, body: &[ReversibleStmt], entries: &mut Vec<LogEntry>) -> Result<()> {
        for stmt in body {
            match stmt {
                ReversibleStmt::Update {
                    target,
                    direction,
                    amount,
                    span,
                } => {
                    self.tick(span.line)?;
                    let entry = self.update(target, *direction, amount)?;
                    entries.push(entry);
                }
                ReversibleStmt::If {
                    guard,
                    then_branch,
                    else_branch,
                    span,
                } => {
                    self.tick(span.line)?;
                    let branch = if self.guard(guard)? {
                        then_branch
                    } else {
                        else_branch
                    };
                    self.apply_all(branch, entries)?;
                }
            }
        }
        Ok(())
    }

    fn update(&mut self, target: &str, direction: Direction, amount: &DataNode) -> Result<LogEntry> {
        let current = match self.frame_mut().env.get(target) {
            Some(value) => value.clone(),
            None => {
                return Err(Error::irreversible(format!(
                    "`{}` must be bound in the current frame before a reverse block updates it",
                    target
                )))
            }
        };
        if current.kind() == Kind::Symbolic {
            return Err(Error::irreversible(format!(
                "`{}` holds the symbolic value {}",
                target, current
            )));
        }

        let amount = self.eval_data(amount)?;
        let next = apply(&current, direction, &amount)?;
        if next.kind() != current.kind() {
            return Err(Error::irreversible(format!(
                "`{} {} {}` would change `{}` from {} to {}",
                target,
                operator(direction),
                amount,
                target,
                current.kind(),
                next.kind()
            )));
        }

        if let Kind::Float | Kind::Complex = current.kind() {
            warn!(
                "reverse update of {} `{}` is only approximately invertible",
                current.kind(),
                target
            );
            if !self.degraded.iter().any(|d| d == target) {
                self.degraded.push(target.to_owned());
            }
        }

        self.tracer.event(&Event::Assign {
            name: target,
            value: &next,
        });
        self.frame_mut().env.set(target, next);
        Ok(LogEntry {
            target: target.to_owned(),
            direction,
            amount,
        })
    }

    /// Replays `entries` newest first with each direction inverted.
    fn unwind(&mut self, entries: &[LogEntry]) -> Result<()> {
        for entry in entries.iter().rev() {
            let env = &mut self.frame_mut().env;
            let current = env
                .get(&entry.target)
                .ok_or_else(|| Error::from(ErrorKind::UndefinedReference(entry.target.clone())))?;
            let restored = apply(current, entry.direction.inverse(), &entry.amount)?;
            env.set(&entry.target, restored);
        }
        Ok(())
    }

    /// Undoes the most recent forward execution of `block` in the current frame.
    pub fn rollback(&mut self, block: BlockId) -> Result<()> {
        let logs = &mut self.frame_mut().reverse_logs;
        let log = match logs.iter().rposition(|l| l.block == block) {
            Some(index) => logs.remove(index),
            None => {
                return Err(Error::irreversible(format!(
                    "reverse block @{} has no forward execution to roll back",
                    block.0
                )))
            }
        };

        if let Err(e) = self.unwind(&log.entries) {
            self.frame_mut().reverse_logs.push(log);
            return Err(e);
        }
        debug!(
            "rolled back reverse @{} ({} update(s))",
            block.0,
            log.entries.len()
        );
        self.tracer.event(&Event::ReverseRollback {
            block,
            entries: log.entries.len(),
        });
        Ok(())
    }
}
