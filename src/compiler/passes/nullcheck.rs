//! Redundant null-check elimination.
//!
//! A freshly boxed value is never null, so a null test whose operand is a
//! [`BoxedValue`](crate::analysis::boxing::BoxedValue) always goes the same way. This
//! pass runs the boxing interpreter without candidate tracking and rewrites such tests:
//!
//! - `if_null L` never branches and is removed
//! - `if_non_null L` always branches and becomes `goto L`
//!
//! The tested value must still be consumed: a `dup` directly before the test is removed
//! together with it, otherwise a `pop` is inserted.
//!
//! # Algorithm
//!
//! 1. Compute frames with the plain boxing interpreter
//! 2. Collect every reachable null test whose operand is a boxed value
//! 3. Stop if there is none, otherwise rewrite all of them in one batch
//! 4. Repeat from 1, since a rewrite can make other tests redundant
//!
//! Every round removes at least one null test, so the number of rounds is bounded by the
//! number of null tests in the original body.

use std::sync::Arc;

use crate::{
    analysis::{
        boxing::{AbstractValue, BoxingInterpreter, SymbolClassifier, TransparentOps, WrapperSymbols},
        frames::FrameAnalyzer,
    },
    assembly::{Edit, MethodBody, Opcode},
    compiler::{pass::MethodPass, CompilerContext, EventKind, EventLog},
    Error, Result,
};

/// What one run of [`RedundantNullCheckPass::transform`] changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullCheckReport {
    /// Null tests removed or turned into jumps
    pub null_checks_removed: usize,
    /// `if_non_null` tests turned into `goto`
    pub branches_simplified: usize,
    /// Rounds that rewrote at least one test
    pub rounds: usize,
}

impl NullCheckReport {
    /// Returns `true` if the body was changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.null_checks_removed > 0
    }
}

/// Redundant null-check elimination pass.
pub struct RedundantNullCheckPass {
    symbols: Arc<dyn SymbolClassifier>,
    transparent: TransparentOps,
}

impl Default for RedundantNullCheckPass {
    fn default() -> Self {
        Self::new(Arc::new(WrapperSymbols))
    }
}

impl RedundantNullCheckPass {
    /// Creates a pass recognizing calls through `symbols`.
    #[must_use]
    pub fn new(symbols: Arc<dyn SymbolClassifier>) -> Self {
        Self {
            symbols,
            transparent: TransparentOps::default(),
        }
    }

    /// Sets the operations through which a boxed value keeps its identity.
    #[must_use]
    pub fn with_transparent_ops(mut self, transparent: TransparentOps) -> Self {
        self.transparent = transparent;
        self
    }

    /// Removes every null test of `method` whose operand is a freshly boxed value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Analysis`] if frames cannot be computed and
    /// [`Error::InvariantViolation`] if the rewrite loop does not converge within its
    /// bound.
    pub fn transform(&self, method: &mut MethodBody) -> Result<NullCheckReport> {
        self.simplify(method, &EventLog::new())
    }

    fn simplify(&self, method: &mut MethodBody, changes: &EventLog) -> Result<NullCheckReport> {
        let bound = method.iter().filter(|insn| insn.op.is_null_test()).count();
        let mut report = NullCheckReport::default();

        loop {
            let edits = self.scan(method, changes, &mut report)?;
            if edits.is_empty() {
                break;
            }
            if report.rounds == bound {
                return Err(Error::invariant(
                    method.name(),
                    0,
                    format!("null-check rewriting did not converge after {bound} rounds"),
                ));
            }
            report.rounds += 1;
            method.apply(edits)?;
        }

        if report.changed() {
            tracing::debug!(
                method = method.name(),
                removed = report.null_checks_removed,
                rounds = report.rounds,
                "redundant null checks removed"
            );
        }
        Ok(report)
    }

    /// Runs the analysis once and collects the edits for every redundant null test.
    fn scan(
        &self,
        method: &MethodBody,
        changes: &EventLog,
        report: &mut NullCheckReport,
    ) -> Result<Vec<Edit>> {
        let interpreter = BoxingInterpreter::new(Arc::clone(&self.symbols), self.transparent);
        let frames = FrameAnalyzer::new(interpreter).analyze(method)?;

        let mut edits = Vec::new();
        for (position, frame) in frames.iter() {
            let Some(insn) = method.instruction_at(position) else {
                continue;
            };
            if !insn.op.is_null_test() {
                continue;
            }
            let Some(AbstractValue::Boxed(boxed)) = frame.stack_top() else {
                continue;
            };

            let previous = position
                .checked_sub(1)
                .and_then(|p| method.instruction_at(p))
                .filter(|prev| prev.op == Opcode::Dup);
            match previous {
                Some(dup) => edits.push(Edit::Remove(dup.id)),
                None => edits.push(Edit::InsertBefore(insn.id, Opcode::Pop)),
            }

            match &insn.op {
                Opcode::IfNull(_) => edits.push(Edit::Remove(insn.id)),
                Opcode::IfNonNull(target) => {
                    edits.push(Edit::Replace(insn.id, Opcode::Goto(*target)));
                    report.branches_simplified += 1;
                    changes
                        .record(EventKind::BranchSimplified)
                        .at(method.name(), position);
                }
                op => {
                    return Err(Error::invariant(
                        method.name(),
                        position,
                        format!("'{op}' is not a null test"),
                    ));
                }
            }

            report.null_checks_removed += 1;
            changes
                .record(EventKind::NullCheckRemoved)
                .at(method.name(), position)
                .message(format!("operand is {boxed}"));
        }
        Ok(edits)
    }
}

impl MethodPass for RedundantNullCheckPass {
    fn name(&self) -> &'static str {
        "redundant-null-check"
    }

    fn description(&self) -> &'static str {
        "Removes null tests on values that were just boxed"
    }

    fn should_run(&self, method: &MethodBody, _ctx: &CompilerContext) -> bool {
        method.iter().any(|insn| insn.op.is_null_test())
    }

    fn run_on_method(&self, method: &mut MethodBody, ctx: &CompilerContext) -> Result<bool> {
        let changes = EventLog::new();
        let report = self.simplify(method, &changes)?;
        if report.changed() {
            ctx.events.merge(&changes);
        }
        Ok(report.changed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{MethodBuilder, PrimitiveType};

    #[test]
    fn test_dup_and_if_null_are_removed() {
        let mut body = MethodBuilder::new("checked")
            .param(PrimitiveType::Int)
            .returns(PrimitiveType::Int)
            .load(0)
            .box_value(PrimitiveType::Int)
            .dup()
            .if_null("fail")
            .unbox(PrimitiveType::Int)
            .ret()
            .label("fail")
            .const_int(-1)
            .ret()
            .build()
            .unwrap();

        let report = RedundantNullCheckPass::default().transform(&mut body).unwrap();
        assert_eq!(report.null_checks_removed, 1);
        assert_eq!(report.rounds, 1);
        let mnemonics: Vec<_> = body.iter().map(|i| i.op.mnemonic()).collect();
        assert_eq!(
            mnemonics,
            vec!["load", "invoke_static", "invoke_virtual", "return", "label", "const", "return"]
        );
    }

    #[test]
    fn test_if_non_null_becomes_goto() {
        let mut body = MethodBuilder::new("branch")
            .param(PrimitiveType::Long)
            .load(0)
            .box_value(PrimitiveType::Long)
            .if_non_null("ok")
            .ret_void()
            .label("ok")
            .ret_void()
            .build()
            .unwrap();

        let report = RedundantNullCheckPass::default().transform(&mut body).unwrap();
        assert_eq!(report.null_checks_removed, 1);
        assert_eq!(report.branches_simplified, 1);
        let mnemonics: Vec<_> = body.iter().map(|i| i.op.mnemonic()).collect();
        assert_eq!(
            mnemonics,
            vec!["load", "invoke_static", "pop", "goto", "return_void", "label", "return_void"]
        );
    }

    #[test]
    fn test_unknown_reference_is_kept() {
        let mut body = MethodBuilder::new("param")
            .param(crate::assembly::TypeSig::object("core.Int"))
            .load(0)
            .if_null("none")
            .ret_void()
            .label("none")
            .ret_void()
            .build()
            .unwrap();
        let report = RedundantNullCheckPass::default().transform(&mut body).unwrap();
        assert_eq!(report, NullCheckReport::default());
    }
}
