//! Property-based soundness tests for the boxing pipeline.
//!
//! Methods are generated from fragments that each leave the operand stack empty and
//! fold their result into an accumulator in slot 1. For every generated method:
//! 1. The optimized method is indistinguishable from the original on sampled inputs
//! 2. The optimized method never allocates more than the original
//! 3. A second pipeline run changes nothing
//!
//! A separate property checks the candidate set's taint propagation against a naive
//! model.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::sync::Arc;

use boxelide::{
    analysis::boxing::{CandidateSet, SymbolClassifier, WrapperSymbols},
    assembly::{
        runtime::{has_next_method, iterator_method, next_method, range_class, range_factory},
        ArithOp, FieldRef, InsnId, MethodBody, MethodBuilder, PrimitiveType, StackType, TypeSig,
    },
    compiler::{BoxingConfig, CompilerContext, PassScheduler, RedundantBoxingPass},
    emulation::{runtime::ARITHMETIC_EXCEPTION, EmValue, Executor},
};
use proptest::prelude::*;

// -- Method Generation --

const ACC: u16 = 1;
const BOXED: u16 = 2;
const LOOP_BOX: u16 = 3;
const COUNTER: u16 = 4;
const ITERATOR: u16 = 5;

/// A stack-neutral piece of a generated method.
#[derive(Debug, Clone)]
enum Fragment {
    /// Box and unbox immediately
    RoundTrip,
    /// Box into a local, optionally cast and null-test, then unbox
    Parked { cast: Option<&'static str>, null_test: bool },
    /// Box and store into a field of a fresh object
    FieldEscape,
    /// Box, then unbox through a widening accessor
    Widening,
    /// Box on both arms of a branch, unbox after the join
    Diamond { pivot: i32 },
    /// Unbox one wrapper on every iteration of a counted loop
    Loop { trips: i32 },
    /// Sum a range through the generic iterator protocol
    RangeSum { first: i32, last: i32 },
    /// Dup a fresh wrapper and test it for null
    NullTest,
    /// Publish the accumulator through a static
    PublishAcc,
    /// Publish a wrapper through a static
    PublishBox,
    /// Divide with a handler for division by zero
    GuardedDiv { dividend: i32 },
    /// Cast a wrapper to an unrelated wrapper class
    FailingCast,
}

fn fragment_strategy() -> impl Strategy<Value = Fragment> {
    let cast = prop_oneof![
        Just(None),
        Just(Some("core.Int")),
        Just(Some("core.Number")),
        Just(Some("core.Object")),
    ];
    prop_oneof![
        3 => Just(Fragment::RoundTrip),
        4 => (cast, any::<bool>()).prop_map(|(cast, null_test)| Fragment::Parked { cast, null_test }),
        2 => Just(Fragment::FieldEscape),
        2 => Just(Fragment::Widening),
        3 => (-20i32..20).prop_map(|pivot| Fragment::Diamond { pivot }),
        3 => (0i32..4).prop_map(|trips| Fragment::Loop { trips }),
        3 => (-3i32..3, -3i32..6).prop_map(|(first, last)| Fragment::RangeSum { first, last }),
        3 => Just(Fragment::NullTest),
        1 => Just(Fragment::PublishAcc),
        1 => Just(Fragment::PublishBox),
        2 => (-100i32..100).prop_map(|dividend| Fragment::GuardedDiv { dividend }),
        1 => Just(Fragment::FailingCast),
    ]
}

fn holder_field() -> FieldRef {
    FieldRef::new("gen.Holder", "value", TypeSig::object("core.Int"))
}

fn total_static() -> FieldRef {
    FieldRef::new("gen.Counter", "total", PrimitiveType::Int.into())
}

fn last_static() -> FieldRef {
    FieldRef::new("gen.Counter", "last", TypeSig::object("core.Object"))
}

/// Adds the int on top of the stack to the accumulator.
fn accumulate(builder: MethodBuilder) -> MethodBuilder {
    builder.load(ACC).add().store(ACC)
}

fn emit(builder: MethodBuilder, fragment: &Fragment, index: usize) -> MethodBuilder {
    let label = |name: &str| format!("{name}_{index}");
    match fragment {
        Fragment::RoundTrip => {
            let b = builder.load(0).box_value(PrimitiveType::Int).unbox(PrimitiveType::Int);
            accumulate(b)
        }
        Fragment::Parked { cast, null_test } => {
            let mut b = builder.load(0).box_value(PrimitiveType::Int).store(BOXED);
            if *null_test {
                let skip = label("skip");
                b = b.load(BOXED).if_null(&skip).label(&skip);
            }
            b = b.load(BOXED);
            if let Some(class) = cast {
                b = b.checkcast(class);
            }
            accumulate(b.unbox(PrimitiveType::Int))
        }
        Fragment::FieldEscape => builder
            .new_object("gen.Holder")
            .load(0)
            .box_value(PrimitiveType::Int)
            .put_field(holder_field()),
        Fragment::Widening => {
            let b = builder
                .load(0)
                .box_value(PrimitiveType::Int)
                .unbox_via("core.Number", PrimitiveType::Long)
                .convert(StackType::Int);
            accumulate(b)
        }
        Fragment::Diamond { pivot } => {
            let (other, join) = (label("other"), label("join"));
            let b = builder
                .load(0)
                .const_int(*pivot)
                .if_cmp_lt(&other)
                .load(0)
                .box_value(PrimitiveType::Int)
                .goto(&join)
                .label(&other)
                .load(0)
                .const_int(1)
                .add()
                .box_value(PrimitiveType::Int)
                .label(&join)
                .unbox(PrimitiveType::Int);
            accumulate(b)
        }
        Fragment::Loop { trips } => {
            let (head, done) = (label("head"), label("done"));
            let b = builder
                .load(0)
                .box_value(PrimitiveType::Int)
                .store(LOOP_BOX)
                .const_int(*trips)
                .store(COUNTER)
                .label(&head)
                .load(COUNTER)
                .if_false(&done)
                .load(LOOP_BOX)
                .unbox(PrimitiveType::Int);
            accumulate(b)
                .load(COUNTER)
                .const_int(1)
                .sub()
                .store(COUNTER)
                .goto(&head)
                .label(&done)
        }
        Fragment::RangeSum { first, last } => {
            let range = range_class("core.IntRange").expect("known range class");
            let (head, done) = (label("head"), label("done"));
            let b = builder
                .const_int(*first)
                .const_int(*last)
                .invoke_static(range_factory(range))
                .invoke_virtual(iterator_method(range.class))
                .store(ITERATOR)
                .label(&head)
                .load(ITERATOR)
                .invoke_virtual(has_next_method())
                .if_false(&done)
                .load(ITERATOR)
                .invoke_virtual(next_method())
                .checkcast("core.Int")
                .unbox(PrimitiveType::Int);
            accumulate(b).goto(&head).label(&done)
        }
        Fragment::NullTest => {
            let ok = label("ok");
            let b = builder
                .load(0)
                .box_value(PrimitiveType::Int)
                .dup()
                .if_non_null(&ok)
                .const_int(0)
                .store(ACC)
                .label(&ok)
                .unbox(PrimitiveType::Int);
            accumulate(b)
        }
        Fragment::PublishAcc => builder.load(ACC).put_static(total_static()),
        Fragment::PublishBox => builder
            .load(ACC)
            .box_value(PrimitiveType::Int)
            .put_static(last_static()),
        Fragment::GuardedDiv { dividend } => {
            let (start, end, handler, after) =
                (label("try"), label("end"), label("handler"), label("after"));
            let b = builder
                .try_catch(&start, &end, &handler, Some(ARITHMETIC_EXCEPTION))
                .label(&start)
                .const_int(*dividend)
                .load(0)
                .arith(ArithOp::Div);
            accumulate(b)
                .label(&end)
                .goto(&after)
                .label(&handler)
                .pop()
                .label(&after)
        }
        Fragment::FailingCast => {
            let b = builder
                .load(0)
                .box_value(PrimitiveType::Int)
                .checkcast("core.Long")
                .unbox(PrimitiveType::Long)
                .convert(StackType::Int);
            accumulate(b)
        }
    }
}

fn generate(fragments: &[Fragment]) -> MethodBody {
    let builder = MethodBuilder::new("generated")
        .param(PrimitiveType::Int)
        .returns(PrimitiveType::Int)
        .const_int(0)
        .store(ACC);
    fragments
        .iter()
        .enumerate()
        .fold(builder, |b, (index, fragment)| emit(b, fragment, index))
        .load(ACC)
        .ret()
        .build()
        .expect("generated method is well-formed")
}

fn optimize(body: &MethodBody) -> MethodBody {
    let symbols: Arc<dyn SymbolClassifier> = Arc::new(WrapperSymbols);
    let config = BoxingConfig::default().with_parallel(false);
    let ctx = CompilerContext::with_methods([body.clone()]);
    PassScheduler::boxing_pipeline(&symbols, &config)
        .run_pipeline(&ctx)
        .expect("pipeline succeeds");
    ctx.method(body.name()).expect("method is still present")
}

fn input_strategy() -> impl Strategy<Value = i32> {
    prop_oneof![
        4 => -30i32..30,
        1 => Just(0),
        1 => Just(i32::MIN),
        1 => Just(i32::MAX),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        max_shrink_iters: 500,
        ..ProptestConfig::default()
    })]

    /// The optimized method behaves exactly like the original.
    #[test]
    fn optimized_method_is_indistinguishable(
        fragments in prop::collection::vec(fragment_strategy(), 1..8),
        inputs in prop::collection::vec(input_strategy(), 1..4),
    ) {
        let original = generate(&fragments);
        let optimized = optimize(&original);

        for input in inputs {
            let before = Executor::new().run(&original, &[EmValue::I32(input)]).unwrap();
            let after = Executor::new().run(&optimized, &[EmValue::I32(input)]).unwrap();
            prop_assert!(
                before.same_observations(&after),
                "input {}: {:?} became {:?}\noriginal:\n{}\noptimized:\n{}",
                input,
                before.completion,
                after.completion,
                original,
                optimized
            );
            prop_assert!(after.allocations <= before.allocations);
        }
    }

    /// Optimizing an optimized method changes nothing.
    #[test]
    fn pipeline_reaches_fixpoint(
        fragments in prop::collection::vec(fragment_strategy(), 1..8),
    ) {
        let optimized = optimize(&generate(&fragments));
        let mut again = optimized.clone();
        let report = RedundantBoxingPass::default().transform(&mut again).unwrap();
        prop_assert!(!report.changed());
        prop_assert_eq!(again.len(), optimized.len());
    }
}

// -- Candidate Set --

#[derive(Debug, Clone)]
enum SetOp {
    Add(usize),
    Remove(usize),
    Merge(usize, usize),
}

const SITES: usize = 12;

fn set_op_strategy() -> impl Strategy<Value = SetOp> {
    prop_oneof![
        4 => (0..SITES).prop_map(SetOp::Add),
        1 => (0..SITES).prop_map(SetOp::Remove),
        3 => (0..SITES, 0..SITES).prop_map(|(a, b)| SetOp::Merge(a, b)),
    ]
}

/// Quadratic reference implementation: explicit class labels and per-class taint.
struct NaiveSet {
    class: Vec<Option<usize>>,
    tainted: Vec<bool>,
}

impl NaiveSet {
    fn new() -> Self {
        Self {
            class: vec![None; SITES],
            tainted: vec![false; SITES],
        }
    }

    fn intern(&mut self, site: usize, tainted: bool) -> usize {
        if let Some(class) = self.class[site] {
            return class;
        }
        self.class[site] = Some(site);
        self.tainted[site] = tainted;
        site
    }

    fn apply(&mut self, op: &SetOp) {
        match *op {
            SetOp::Add(site) => {
                self.intern(site, false);
            }
            SetOp::Remove(site) => {
                let class = self.intern(site, true);
                self.tainted[class] = true;
            }
            SetOp::Merge(a, b) => {
                let (ca, cb) = (self.intern(a, true), self.intern(b, true));
                if ca != cb {
                    let tainted = self.tainted[ca] || self.tainted[cb];
                    for class in self.class.iter_mut().flatten() {
                        if *class == cb {
                            *class = ca;
                        }
                    }
                    self.tainted[ca] = tainted;
                }
            }
        }
    }

    fn contains(&self, site: usize) -> bool {
        self.class[site].is_some_and(|class| !self.tainted[class])
    }
}

fn site_ids() -> Vec<InsnId> {
    let body = (0..SITES)
        .fold(MethodBuilder::new("sites"), |b, _| b.nop())
        .ret_void()
        .build()
        .unwrap();
    body.iter().take(SITES).map(|insn| insn.id).collect()
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// Membership always agrees with the naive model, after every operation.
    #[test]
    fn taint_propagates_through_merge_classes(
        ops in prop::collection::vec(set_op_strategy(), 0..40),
    ) {
        let ids = site_ids();
        let mut set = CandidateSet::new();
        let mut model = NaiveSet::new();

        for op in &ops {
            match *op {
                SetOp::Add(site) => set.add(ids[site]),
                SetOp::Remove(site) => set.remove(ids[site]),
                SetOp::Merge(a, b) => set.merge(ids[a], ids[b]),
            }
            model.apply(op);

            for site in 0..SITES {
                prop_assert_eq!(set.contains(ids[site]), model.contains(site), "site {} after {:?}", site, op);
            }
        }

        let expected = (0..SITES).filter(|&site| model.contains(site)).count();
        prop_assert_eq!(set.len(), expected);
        prop_assert_eq!(set.is_empty(), expected == 0);
    }
}
