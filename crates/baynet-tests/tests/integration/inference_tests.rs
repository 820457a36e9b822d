use baynet_core::{
    EliminationConfig, EliminationOrder, ErrorKind, Evidence, OrderingHeuristic,
    VariableElimination,
};
use baynet_tests::{bank_loan_network, brute_force_posterior, two_node_network};

const EPS: f64 = 1e-9;

#[test]
fn two_node_prior_and_posterior() {
    crate::init_tracing();
    let model = two_node_network();

    let b = model.infer(&["B"], &Evidence::new()).unwrap();
    assert!((b.probability(&[("B", "Yes")]).unwrap() - 0.55).abs() < EPS);
    assert!((b.probability(&[("B", "No")]).unwrap() - 0.45).abs() < EPS);

    let a = model.infer(&["A"], &Evidence::from([("B", "Yes")])).unwrap();
    assert!((a.probability(&[("A", "Low")]).unwrap() - 0.8181818181).abs() < 1e-6);
    assert!((a.probability(&[("A", "High")]).unwrap() - 0.1818181818).abs() < 1e-6);
}

#[test]
fn bank_loan_marginals_by_hand() {
    crate::init_tracing();
    let model = bank_loan_network();

    let ratio = model.infer(&["DebtIncomeRatio"], &Evidence::new()).unwrap();
    assert!((ratio.probability(&[("DebtIncomeRatio", "Low")]).unwrap() - 0.5).abs() < EPS);

    let history = model.infer(&["PaymentHistory"], &Evidence::new()).unwrap();
    // 0.5 * 0.6 + 0.5 * 0.1
    assert!(
        (history
            .probability(&[("PaymentHistory", "Excellent")])
            .unwrap()
            - 0.35)
            .abs()
            < EPS
    );

    let age = model.infer(&["Age"], &Evidence::new()).unwrap();
    // 0.35 * 0.6 + 0.30 * 0.334 + 0.35 * 0.1
    assert!((age.probability(&[("Age", "Over65")]).unwrap() - 0.3452).abs() < EPS);
}

#[test]
fn bank_loan_matches_full_joint() {
    let model = bank_loan_network();
    let cases: Vec<(Vec<&str>, Evidence)> = vec![
        (vec!["BankLoan"], Evidence::new()),
        (
            vec!["BankLoan"],
            Evidence::from([("Age", "Over65"), ("Income", "Low")]),
        ),
        (
            vec!["Reliability", "FutureIncome"],
            Evidence::from([("BankLoan", "Negative")]),
        ),
        (
            vec!["DebtIncomeRatio"],
            Evidence::from([("BankLoan", "Positive"), ("Assets", "High")]),
        ),
        (
            vec!["Income", "PaymentHistory", "Age"],
            Evidence::from([("Reliability", "Unreliable")]),
        ),
    ];

    for (query, evidence) in cases {
        let expected = brute_force_posterior(&model, &query, &evidence).unwrap();
        let actual = VariableElimination::new(&model)
            .infer_factor(&query, &evidence)
            .unwrap();
        assert!(
            actual.approx_eq(&expected, 1e-9),
            "query {:?} given {:?}",
            query,
            evidence
        );
    }
}

#[test]
fn every_ordering_gives_the_same_posterior() {
    let model = bank_loan_network();
    let evidence = Evidence::from([("BankLoan", "Positive"), ("Age", "Between16and25")]);
    let query = ["FutureIncome"];
    let baseline = VariableElimination::new(&model)
        .infer_factor(&query, &evidence)
        .unwrap();

    let heuristics = [
        OrderingHeuristic::MinFill,
        OrderingHeuristic::MinNeighbors,
        OrderingHeuristic::MinWeight,
        OrderingHeuristic::WeightedMinFill,
    ];
    for heuristic in heuristics {
        for (max_greedy_variables, prune_barren) in [(256, true), (256, false), (0, false)] {
            let config = EliminationConfig {
                order: EliminationOrder::Heuristic(heuristic),
                max_greedy_variables,
                prune_barren,
            };
            let posterior = VariableElimination::with_config(&model, config)
                .infer_factor(&query, &evidence)
                .unwrap();
            assert!(posterior.approx_eq(&baseline, 1e-9), "{:?}", heuristic);
        }
    }

    let hidden = [
        "DebtIncomeRatio",
        "PaymentHistory",
        "Reliability",
        "Income",
        "Assets",
    ];
    for order in [hidden.to_vec(), hidden.iter().rev().copied().collect()] {
        let config = EliminationConfig {
            order: EliminationOrder::Explicit(order.iter().map(|s| s.to_string()).collect()),
            ..EliminationConfig::default()
        };
        let posterior = VariableElimination::with_config(&model, config)
            .infer_factor(&query, &evidence)
            .unwrap();
        assert!(posterior.approx_eq(&baseline, 1e-9));
    }
}

#[test]
fn posteriors_sum_to_one() {
    let model = bank_loan_network();
    let evidence = Evidence::from([("Income", "Medium")]);
    let joint = model
        .infer(&["BankLoan", "Reliability", "Age"], &evidence)
        .unwrap();
    assert_eq!(joint.len(), 2 * 2 * 3);
    assert!((joint.total() - 1.0).abs() < 1e-9);
    assert!(joint.probabilities().iter().all(|p| (0.0..=1.0).contains(p)));

    let loan = joint.marginal("BankLoan").unwrap();
    let direct = model.infer(&["BankLoan"], &evidence).unwrap();
    assert!((loan[0].1 - direct.probabilities()[0]).abs() < 1e-9);
}

#[test]
fn diagnostics_report_pruning_and_order() {
    let model = bank_loan_network();
    let (_, diagnostics) = VariableElimination::new(&model)
        .infer_with_diagnostics(&["Age"], &Evidence::new())
        .unwrap();
    let mut pruned = diagnostics.pruned.clone();
    pruned.sort();
    assert_eq!(
        pruned,
        vec![
            "Assets",
            "BankLoan",
            "FutureIncome",
            "Income",
            "Reliability"
        ]
    );
    let mut order = diagnostics.order.clone();
    order.sort();
    assert_eq!(order, vec!["DebtIncomeRatio", "PaymentHistory"]);
    assert!(!diagnostics.search_bounded);
    assert!(diagnostics.largest_factor >= 3);
}

#[test]
fn map_query_picks_most_probable_assignment() {
    let model = two_node_network();
    let map = VariableElimination::new(&model)
        .map_query(&["A"], &Evidence::from([("B", "No")]))
        .unwrap();
    // P(A=High | B=No) = 0.4 / 0.45
    assert_eq!(map.state_of("A"), Some("High"));
    assert!((map.probability - 0.4 / 0.45).abs() < EPS);
}

#[test]
fn invalid_queries_leave_model_usable() {
    let model = bank_loan_network();
    let engine = VariableElimination::new(&model);

    let err = engine
        .infer(&["BankLoan"], &Evidence::from([("Age", "Ancient")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownState);

    let err = engine
        .infer(&["Mortgage"], &Evidence::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownVariable);

    let err = engine
        .infer(&["BankLoan"], &Evidence::from([("BankLoan", "Positive")]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::QueryEvidenceOverlap);

    assert!(model.is_finalized());
    assert!(engine.infer(&["BankLoan"], &Evidence::new()).is_ok());
}

#[test]
fn elimination_order_excludes_query_and_evidence() {
    let model = bank_loan_network();
    let order = VariableElimination::new(&model)
        .elimination_order(&["BankLoan"], &Evidence::from([("Income", "High")]))
        .unwrap();
    assert!(!order.iter().any(|v| v == "BankLoan" || v == "Income"));
    assert_eq!(order.len(), 6);
}

#[test]
fn single_variable_returns_its_cpt() {
    let mut model = baynet_core::BayesianModel::new();
    model
        .define_variable("Weather", &["Sun", "Rain", "Snow"])
        .unwrap();
    model
        .add_cpd(baynet_core::Cpt::marginal("Weather", vec![0.6, 0.3, 0.1]).unwrap())
        .unwrap();
    model.finalize().unwrap();

    let d = model.infer(&["Weather"], &Evidence::new()).unwrap();
    assert_eq!(d.len(), 3);
    for (p, expected) in d.probabilities().iter().zip([0.6, 0.3, 0.1]) {
        assert!((p - expected).abs() < EPS);
    }
}

#[test]
fn querying_every_variable_eliminates_nothing() {
    let model = bank_loan_network();
    let all: Vec<&str> = model.registry().iter().map(|v| v.name()).collect();
    let (joint, diagnostics) = VariableElimination::new(&model)
        .infer_with_diagnostics(&all, &Evidence::new())
        .unwrap();
    assert!(diagnostics.order.is_empty());
    assert!(diagnostics.pruned.is_empty());
    assert_eq!(joint.len(), 2 * 3 * 3 * 2 * 3 * 3 * 2 * 2);
    assert!((joint.total() - 1.0).abs() < 1e-9);

    let age = joint.marginal("Age").unwrap();
    let direct = model.infer(&["Age"], &Evidence::new()).unwrap();
    for ((_, p), q) in age.iter().zip(direct.probabilities()) {
        assert!((p - q).abs() < 1e-9);
    }
}
