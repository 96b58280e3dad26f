use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use rrmflow::types::{Step, StepStatus};
use rrmflow_test_utils::builders::PipelineBuilder;
use rrmflow_test_utils::fake_launcher::{FakeEvent, ScriptedLauncher};
use rrmflow_test_utils::static_probe::StaticProbe;

/// Random acyclic graph over a prefix of the step list: step `i` may only
/// depend on steps before it.
#[derive(Debug, Clone)]
struct Case {
    deps: Vec<(Step, Vec<Step>)>,
    failures: BTreeMap<Step, usize>,
    budget: u32,
}

fn case_strategy() -> impl Strategy<Value = Case> {
    (1..=Step::ALL.len()).prop_flat_map(|n| {
        (
            proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), n),
            proptest::collection::vec(0usize..4, n),
            0u32..3,
        )
            .prop_map(move |(raw_deps, fails, budget)| {
                let all = Step::ALL;
                let steps = &all[..n];
                let deps = steps
                    .iter()
                    .enumerate()
                    .map(|(i, step)| {
                        let after: BTreeSet<Step> = if i == 0 {
                            BTreeSet::new()
                        } else {
                            raw_deps[i].iter().map(|d| steps[d % i]).collect()
                        };
                        (*step, after.into_iter().collect())
                    })
                    .collect();
                let failures = steps.iter().copied().zip(fails).collect();
                Case {
                    deps,
                    failures,
                    budget,
                }
            })
    })
}

proptest! {
    #[test]
    fn run_terminates_and_respects_dependencies_and_budget(case in case_strategy()) {
        let mut launcher = ScriptedLauncher::new();
        for (step, n) in &case.failures {
            launcher = launcher.always(*step, 1, *n);
        }

        let mut builder = PipelineBuilder::new()
            .retry_attempts(case.budget)
            .max_iter(1_000);
        for (step, after) in &case.deps {
            builder = builder.step(*step, after);
        }
        let mut scheduler = builder.build(launcher.clone(), StaticProbe::empty()).unwrap();

        loop {
            let report = scheduler.run_iteration().unwrap();
            if report.done {
                break;
            }
        }

        // No launch before every dependency exited successfully.
        let events = launcher.events();
        let deps: BTreeMap<Step, Vec<Step>> = case.deps.iter().cloned().collect();
        for (idx, event) in events.iter().enumerate() {
            if let FakeEvent::Launched { step, .. } = event {
                for dep in &deps[step] {
                    let done_before = events[..idx].iter().any(|e| {
                        matches!(e, FakeEvent::Exited { step: s, code: 0, .. } if s == dep)
                    });
                    prop_assert!(done_before, "{step} launched before {dep} completed");
                }
            }
        }

        // Final status follows from failure counts and the budget.
        let mut complete = BTreeSet::new();
        for (step, after) in &case.deps {
            prop_assert!(scheduler.retries_of(*step) <= case.budget);

            let deps_ok = after.iter().all(|d| complete.contains(d));
            let own_ok = case.failures[step] <= case.budget as usize;
            let status = scheduler.status_of(*step);
            if deps_ok && own_ok {
                prop_assert_eq!(status, StepStatus::Complete);
                complete.insert(*step);
            } else if deps_ok {
                prop_assert_eq!(status, StepStatus::Failed);
            } else {
                prop_assert_eq!(status, StepStatus::ToDo);
                prop_assert_eq!(launcher.attempts_of(*step), 0);
            }
        }
    }
}
