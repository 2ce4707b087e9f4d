//! Candidate tracking on top of the boxing interpreter.
//!
//! [`CandidateTracking`] turns the interpreter's events into [`CandidateSet`] updates:
//! every new box site is admitted, every escape or failed merge disqualifies, and two
//! boxed values meeting at a join point are tied together so that they share a fate.
//! Duplicating a boxed value on the stack also disqualifies it, since the copy may be
//! used in ways the analysis cannot attach to the box site.
//!
//! After the frame analysis converges, [`RedundantBoxingInterpreter::final_candidates`]
//! yields the box sites that may be eliminated.

use crate::{
    analysis::boxing::{
        candidates::CandidateSet,
        interpreter::{BoxingHooks, BoxingInterpreter, EscapeReason},
        value::{BoxedRecord, BoxedValue},
    },
};

/// Hook strategy maintaining the set of eliminable box sites.
#[derive(Debug, Clone, Default)]
pub struct CandidateTracking {
    candidates: CandidateSet,
}

impl CandidateTracking {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current candidate set.
    #[must_use]
    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }
}

impl BoxingHooks for CandidateTracking {
    fn on_new_boxed_value(&mut self, value: &BoxedValue) {
        self.candidates.add(value.site());
    }

    fn on_escaped(&mut self, value: &BoxedValue, _reason: EscapeReason) {
        self.candidates.remove(value.site());
    }

    fn on_merge_failed(&mut self, value: &BoxedValue) {
        self.candidates.remove(value.site());
    }

    fn on_boxed_merge(&mut self, first: &BoxedValue, second: &BoxedValue) {
        self.candidates.merge(first.site(), second.site());
    }

    fn on_opaque_copy(&mut self, _value: &BoxedValue) -> bool {
        true
    }
}

/// The boxing interpreter used for boxing elimination.
pub type RedundantBoxingInterpreter = BoxingInterpreter<CandidateTracking>;

impl BoxingInterpreter<CandidateTracking> {
    /// The candidate set as it stands.
    #[must_use]
    pub fn candidates(&self) -> &CandidateSet {
        self.hooks().candidates()
    }

    /// Records of the box sites that survived analysis and were unboxed exactly.
    ///
    /// Only meaningful once the frame analysis has converged. Records come out in
    /// box-site order.
    pub fn final_candidates(&self) -> impl Iterator<Item = &BoxedRecord> + '_ {
        let candidates = self.candidates();
        self.records()
            .values()
            .filter(move |record| record.was_unboxed() && candidates.contains(record.value().site()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        analysis::{
            boxing::{interpreter::TransparentOps, symbols::WrapperSymbols},
            frames::FrameAnalyzer,
        },
        assembly::{MethodBody, MethodBuilder, PrimitiveType},
    };

    fn analyze(body: &MethodBody) -> RedundantBoxingInterpreter {
        let interp = BoxingInterpreter::with_hooks(
            Arc::new(WrapperSymbols),
            TransparentOps::default(),
            CandidateTracking::new(),
        );
        let mut analyzer = FrameAnalyzer::new(interp);
        analyzer.analyze(body).unwrap();
        analyzer.into_interpreter()
    }

    #[test]
    fn test_local_round_trip_survives() {
        let body = MethodBuilder::new("round_trip")
            .param(PrimitiveType::Int)
            .returns(PrimitiveType::Int)
            .load(0)
            .box_value(PrimitiveType::Int)
            .store(1)
            .load(1)
            .unbox(PrimitiveType::Int)
            .ret()
            .build()
            .unwrap();
        let interp = analyze(&body);
        let survivors: Vec<_> = interp.final_candidates().collect();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].associated_instructions().len(), 2);
    }

    #[test]
    fn test_never_unboxed_is_not_final() {
        let body = MethodBuilder::new("dropped")
            .param(PrimitiveType::Long)
            .load(0)
            .box_value(PrimitiveType::Long)
            .pop()
            .ret_void()
            .build()
            .unwrap();
        let interp = analyze(&body);
        assert_eq!(interp.candidates().len(), 1);
        assert_eq!(interp.final_candidates().count(), 0);
    }

    #[test]
    fn test_dup_disqualifies() {
        let body = MethodBuilder::new("dup")
            .param(PrimitiveType::Int)
            .returns(PrimitiveType::Int)
            .load(0)
            .box_value(PrimitiveType::Int)
            .dup()
            .pop()
            .unbox(PrimitiveType::Int)
            .ret()
            .build()
            .unwrap();
        let interp = analyze(&body);
        assert!(interp.candidates().is_empty());
        assert_eq!(interp.final_candidates().count(), 0);
    }

    #[test]
    fn test_merge_with_null_disqualifies() {
        let body = MethodBuilder::new("or_null")
            .param(PrimitiveType::Bool)
            .param(PrimitiveType::Int)
            .const_null()
            .store(2)
            .load(0)
            .if_false("join")
            .load(1)
            .box_value(PrimitiveType::Int)
            .store(2)
            .load(2)
            .unbox(PrimitiveType::Int)
            .pop()
            .label("join")
            .ret_void()
            .build()
            .unwrap();
        let interp = analyze(&body);
        assert_eq!(interp.records().len(), 1);
        assert!(interp.candidates().is_empty());
        assert_eq!(interp.final_candidates().count(), 0);
    }

    #[test]
    fn test_returned_box_escapes() {
        let body = MethodBuilder::new("escapes")
            .param(PrimitiveType::Int)
            .returns(crate::assembly::TypeSig::object("core.Int"))
            .load(0)
            .box_value(PrimitiveType::Int)
            .ret()
            .build()
            .unwrap();
        let interp = analyze(&body);
        assert!(interp.candidates().is_empty());
    }
}
