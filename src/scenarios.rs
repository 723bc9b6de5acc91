//! Built-in tests.

use futures::future::{BoxFuture, FutureExt};

use crate::error::TbResult;
use crate::sequence::{DirectedSeq, RandomSeq, Sequence, SweepSeq};
use crate::test::{Test, TestContext, TestSet};

pub const RANDOM_ITEMS: usize = 50;

async fn run_scenario<S: Sequence>(ctx: &TestContext, seq: S) -> TbResult {
    let mut env = ctx.env();
    env.start();
    env.reset().await?;
    env.run(seq).await?;
    Ok(())
}

/// One item per opcode.
pub fn simple_test(ctx: TestContext) -> BoxFuture<'static, TbResult> {
    async move {
        let seq = SweepSeq::new("simple_seq", Some(&ctx), ctx.config.operand_width);
        run_scenario(&ctx, seq).await
    }
    .boxed()
}

pub fn add_test(ctx: TestContext) -> BoxFuture<'static, TbResult> {
    async move {
        let seq = DirectedSeq::add("add_seq", Some(&ctx), ctx.config.operand_width);
        run_scenario(&ctx, seq).await
    }
    .boxed()
}

pub fn random_test(ctx: TestContext) -> BoxFuture<'static, TbResult> {
    async move {
        let seq = RandomSeq::new("random_seq", Some(&ctx), RANDOM_ITEMS, ctx.config.operand_width);
        run_scenario(&ctx, seq).await
    }
    .boxed()
}

pub fn all_tests() -> TestSet {
    let mut tests = TestSet::new();
    tests.push(Test::new("simple_test", simple_test));
    tests.push(Test::new("add_test", add_test));
    tests.push(Test::new("random_test", random_test));
    tests
}
