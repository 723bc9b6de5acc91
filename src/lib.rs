pub mod analysis;
pub mod config;
pub mod coverage;
pub mod dashboard;
pub mod driver;
pub mod env;
pub mod error;
pub mod event;
mod executor;
pub mod handshake;
pub mod interface;
mod junit;
pub mod kernel;
pub mod monitor;
pub mod prelude;
pub mod rng;
pub mod runner;
pub mod scenarios;
pub mod scoreboard;
pub mod sequence;
pub mod sequencer;
mod signal;
pub mod sim_if;
mod tb_obj;
pub mod testbench;
pub mod transaction;
mod trigger;
pub mod utils;
pub mod uut;

use executor::Task;
use sim_if::{SimIf, SIM_IF};
use std::cell::RefCell;
use std::sync::Arc;
use tb_obj::TbObj;
use test::Verdict;

pub use error::{TbError, TbResult};

thread_local! {
    static CURRENT_TEST: RefCell<Option<(Arc<Task>, TbObj<Option<Verdict>>)>> = RefCell::new(None);
}

pub(crate) fn set_current_test(task: Arc<Task>, verdict: TbObj<Option<Verdict>>) {
    CURRENT_TEST.with(|c| {
        let _ = c.borrow_mut().replace((task, verdict));
    });
}

fn take_current_test() -> Option<(Arc<Task>, TbObj<Option<Verdict>>)> {
    CURRENT_TEST.with(|c| c.borrow_mut().take())
}

/// Passes the running test unless it already passed or failed.
pub fn pass_test(msg: &str) {
    if let Some((task, verdict)) = take_current_test() {
        verdict.with_mut(|v| *v = Some(Ok(msg.to_string())));
        tear_down_test(task);
    }
}

/// Fails the running test unless it already passed or failed.
pub fn fail_test(msg: &str) {
    if let Some((task, verdict)) = take_current_test() {
        verdict.with_mut(|v| *v = Some(Err(msg.to_string())));
        tear_down_test(task);
    }
}

fn tear_down_test(test: Arc<Task>) {
    trigger::cancel_all_triggers();
    executor::clear_ready_queue();
    test.cancel();
    SIM_IF.finish();
}
