#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pledge_core::{defer, Resolution};
use pledge_test::{check, FuzzOp};

#[derive(Arbitrary, Debug)]
enum Op {
    Register,
    Progress(u32),
    Resolve(u32),
    Reject(u32),
}

impl From<&Op> for FuzzOp {
    fn from(op: &Op) -> Self {
        match *op {
            Op::Register => FuzzOp::Register,
            Op::Progress(p) => FuzzOp::Progress(p),
            Op::Resolve(v) => FuzzOp::Resolve(v),
            Op::Reject(r) => FuzzOp::Reject(r),
        }
    }
}

#[derive(Arbitrary, Debug)]
struct Input {
    ops: Vec<Op>,
    /// Settle the same sequence again behind an adopting deferred
    adopt: bool,
}

fuzz_target!(|input: Input| {
    let ops: Vec<FuzzOp> = input.ops.iter().map(FuzzOp::from).collect();
    let result = check(&ops);
    assert!(result.is_clean(), "violations: {:?}", result.violations);

    if input.adopt {
        let outer = defer::<u32, u32, u32>();
        let inner = defer::<u32, u32, u32>();
        outer
            .resolve(Resolution::thenable(inner.promise()))
            .expect("fresh deferred accepts adoption");

        let mut settled = None;
        for op in &ops {
            let outcome = match *op {
                FuzzOp::Register | FuzzOp::Progress(_) => continue,
                FuzzOp::Resolve(v) => inner.resolve(v).map(|_| Ok(v)),
                FuzzOp::Reject(r) => inner.reject(r).map(|_| Err(r)),
            };
            if let Ok(outcome) = outcome {
                assert!(settled.is_none(), "inner settled twice");
                settled = Some(outcome);
            }
            assert!(outer.resolve(0).is_err());
        }
        assert_eq!(outer.promise().peek(), settled);
    }
});
