use alutb::dashboard::Dashboard;
use alutb::prelude::*;
use alutb::scenarios;
use alutb::sequence::collect_items;
use std::cell::RefCell;

thread_local! {
    static OBSERVED: RefCell<Vec<AluTxn>> = RefCell::new(Vec::new());
    static PHASES: RefCell<Vec<(TbPhase, bool)>> = RefCell::new(Vec::new());
}

const SNIFFED_ITEMS: usize = 20;

fn quiet(seed: u64) -> TbConfig {
    TbConfig::default().seed(seed).write_reports(false)
}

fn only(name: &str) -> TestSet {
    scenarios::all_tests().filter(&[name.to_string()])
}

fn single(name: &str, generator: TestFn) -> TestSet {
    let mut set = TestSet::new();
    set.push(Test::new(name, generator));
    set
}

/// Random traffic with an extra subscriber recording every observed transaction.
fn sniffing_test(ctx: TestContext) -> BoxFuture<'static, TbResult> {
    async move {
        let mut env = ctx.env();
        let sniffer = Mailbox::new("sniffer");
        env.agent.connect(sniffer.clone());
        Task::fork(async move {
            loop {
                let item = sniffer.recv().await;
                OBSERVED.with(|o| o.borrow_mut().push(item));
            }
        });
        env.start();
        env.reset().await?;
        let seq = RandomSeq::new("random_seq", Some(&ctx), SNIFFED_ITEMS, ctx.config.operand_width);
        env.run(seq).await?;
        Ok(())
    }
    .boxed()
}

/// Records the phase and the reset-complete flag after each step.
fn phase_tracking_test(ctx: TestContext) -> BoxFuture<'static, TbResult> {
    async move {
        let mut env = ctx.env();
        let record = |env: &AluEnv| {
            let step = (env.phase(), env.reset_done().is_set());
            PHASES.with(|p| p.borrow_mut().push(step));
        };
        record(&env);
        env.start();
        env.reset().await?;
        record(&env);
        let seq = DirectedSeq::add("add_seq", Some(&ctx), ctx.config.operand_width);
        env.run(seq).await?;
        record(&env);
        Ok(())
    }
    .boxed()
}

fn hanging_test(ctx: TestContext) -> BoxFuture<'static, TbResult> {
    async move {
        let mut env = ctx.env();
        env.start();
        std::future::pending::<()>().await;
        Ok(())
    }
    .boxed()
}

fn clockless_test(ctx: TestContext) -> BoxFuture<'static, TbResult> {
    async move {
        ctx.dut.clk.rising_edge().await;
        Ok(())
    }
    .boxed()
}

fn out_of_order_test(ctx: TestContext) -> BoxFuture<'static, TbResult> {
    async move {
        let mut env = ctx.env();
        env.start();
        let seq = DirectedSeq::add("add_seq", Some(&ctx), ctx.config.operand_width);
        env.run(seq).await?;
        Ok(())
    }
    .boxed()
}

#[test]
fn add_test_checks_five_additions() {
    let report = Runner::new(quiet(42)).unwrap().run(&only("add_test")).unwrap();
    assert!(report.passed(), "{:?}", report.outcomes);
    let add = &report.checks.by_opcode[&AluOp::Add];
    assert_eq!((add.passed, add.failed), (5, 0));
    assert_eq!(report.checks.passed(), 5);
}

#[test]
fn simple_test_checks_every_opcode_once() {
    let report = Runner::new(quiet(42)).unwrap().run(&only("simple_test")).unwrap();
    assert!(report.passed(), "{:?}", report.outcomes);
    for op in AluOp::ALL {
        assert_eq!(report.checks.by_opcode[&op].passed, 1, "{}", op);
    }
    assert_eq!(report.checks.failed(), 0);
}

#[test]
fn random_test_passes() {
    let report = Runner::new(quiet(3)).unwrap().run(&only("random_test")).unwrap();
    assert!(report.passed(), "{:?}", report.outcomes);
    assert_eq!(report.checks.passed() as usize, scenarios::RANDOM_ITEMS);
}

#[test]
fn injected_fault_fails_exactly_that_opcode() {
    let cfg = quiet(42).inject_fault(Some(AluOp::Xor));
    let report = Runner::new(cfg).unwrap().run(&only("simple_test")).unwrap();
    assert!(!report.passed());
    assert_eq!(report.failed_tests(), vec!["simple_test"]);
    assert_eq!(report.checks.failed_opcodes(), vec![AluOp::Xor]);
    assert_eq!(report.checks.failed(), 1);
    // the sweep stops at the first mismatch; opcodes before XOR were checked
    for op in [AluOp::Add, AluOp::Sub, AluOp::And, AluOp::Or] {
        assert_eq!(report.checks.by_opcode[&op].passed, 1, "{}", op);
    }
    let msg = report.outcomes[0].verdict.as_ref().unwrap_err();
    assert!(msg.starts_with("XOR failed. Input:"), "{}", msg);
}

#[test]
fn observed_traffic_follows_the_handshake() {
    OBSERVED.with(|o| o.borrow_mut().clear());
    let report = Runner::new(quiet(42))
        .unwrap()
        .run(&single("sniffing_test", sniffing_test))
        .unwrap();
    assert!(report.passed(), "{:?}", report.outcomes);
    let observed = OBSERVED.with(|o| o.borrow().clone());
    assert_eq!(observed.len(), SNIFFED_ITEMS);

    // what was applied is what was generated, in order
    let root = RngNode::for_test("sniffing_test", 42);
    let stimulus = collect_items(RandomSeq::new("random_seq", Some(&root), SNIFFED_ITEMS, 8));
    for (seen, sent) in observed.iter().zip(&stimulus) {
        assert_eq!((seen.opcode, seen.a, seen.b), (sent.opcode, sent.a, sent.b));
        assert_eq!(seen.result, expected(seen.opcode, seen.a, seen.b, 32));
    }

    // one item in flight: each response one cycle after its request, before the next request
    for item in &observed {
        let (begin, end) = (item.begin_time.unwrap(), item.end_time.unwrap());
        assert!((end - begin - 1.0).abs() < 1e-9, "{}: {} -> {}", item, begin, end);
    }
    for pair in observed.windows(2) {
        assert!(pair[1].begin_time.unwrap() > pair[0].end_time.unwrap());
    }
}

#[test]
fn same_seed_reproduces_the_run() {
    let run = |seed| {
        OBSERVED.with(|o| o.borrow_mut().clear());
        Runner::new(quiet(seed))
            .unwrap()
            .run(&single("sniffing_test", sniffing_test))
            .unwrap();
        OBSERVED.with(|o| o.borrow().clone())
    };
    let first = run(11);
    let second = run(11);
    assert_eq!(first.len(), second.len());
    assert!(first.iter().zip(&second).all(|(a, b)| a.same_payload(b)));
    let other = run(12);
    assert!(!first.iter().zip(&other).all(|(a, b)| a.same_payload(b)));
}

#[test]
fn env_walks_through_reset_and_run_phases() {
    PHASES.with(|p| p.borrow_mut().clear());
    let report = Runner::new(quiet(5))
        .unwrap()
        .run(&single("phase_tracking_test", phase_tracking_test))
        .unwrap();
    assert!(report.passed(), "{:?}", report.outcomes);
    let phases = PHASES.with(|p| p.borrow().clone());
    assert_eq!(
        phases,
        vec![(TbPhase::Init, false), (TbPhase::Ready, true), (TbPhase::Done, true)]
    );
}

#[test]
fn hang_is_caught_by_the_watchdog() {
    let cfg = quiet(1).timeout_ns(200);
    let report = Runner::new(cfg)
        .unwrap()
        .run(&single("hanging_test", hanging_test))
        .unwrap();
    let msg = report.outcomes[0].verdict.as_ref().unwrap_err();
    assert_eq!(msg, &TbError::Timeout(200).to_string());
    assert!(report.outcomes[0].sim_time_ns <= 200.0);
}

#[test]
fn idle_simulation_is_reported_as_stalled() {
    let report = Runner::new(quiet(1))
        .unwrap()
        .run(&single("clockless_test", clockless_test))
        .unwrap();
    let msg = report.outcomes[0].verdict.as_ref().unwrap_err();
    assert_eq!(msg, &TbError::Stalled.to_string());
}

#[test]
fn running_before_reset_is_rejected() {
    let report = Runner::new(quiet(1))
        .unwrap()
        .run(&single("out_of_order_test", out_of_order_test))
        .unwrap();
    let msg = report.outcomes[0].verdict.as_ref().unwrap_err();
    let expected = TbError::Phase {
        from: TbPhase::Init,
        to: TbPhase::Running,
    };
    assert_eq!(msg, &expected.to_string());
}

#[test]
fn reports_feed_the_dashboard() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = TbConfig::default()
        .seed(42)
        .coverage(true)
        .out_dir(dir.path())
        .out_prefix("alu");
    let report = Runner::new(cfg).unwrap().run(&scenarios::all_tests()).unwrap();
    assert!(report.passed(), "{:?}", report.outcomes);
    for file in ["alu_results.xml", "alu_func_cov.log", "alu_func_cov.json"] {
        assert!(dir.path().join(file).exists(), "{} missing", file);
    }

    let coverage = report.coverage.as_ref().unwrap();
    // every opcode was seen at least by the sweep
    for op in AluOp::ALL {
        assert!(coverage.hits("alu.opcode", op.name()) >= 1);
    }

    let dashboard = Dashboard::generate(dir.path()).unwrap();
    assert_eq!(dashboard.tests.total_tests, 3);
    assert_eq!(dashboard.tests.failed_tests, 0);
    assert!((dashboard.functional_coverage - coverage.percent()).abs() < 1e-9);
}
