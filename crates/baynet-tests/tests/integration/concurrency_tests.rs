use std::thread;

use baynet_core::{Evidence, VariableElimination};
use baynet_tests::bank_loan_network;

#[test]
fn concurrent_queries_share_one_model() {
    let model = bank_loan_network();
    let engine = VariableElimination::new(&model);
    let expected = engine
        .infer(&["BankLoan"], &Evidence::from([("Income", "Low")]))
        .unwrap();

    let results: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    engine
                        .infer(&["BankLoan"], &Evidence::from([("Income", "Low")]))
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for result in results {
        assert_eq!(result, expected);
    }
}
