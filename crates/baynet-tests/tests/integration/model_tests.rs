use baynet_core::{BayesianModel, Cpt, ErrorKind, Evidence, NetworkError};
use baynet_tests::{bank_loan_network, two_node_network};

fn unvalidated_two_node() -> BayesianModel {
    let mut model = BayesianModel::new();
    model.define_variable("A", &["Low", "High"]).unwrap();
    model.define_variable("B", &["Yes", "No"]).unwrap();
    model.add_edge("A", "B").unwrap();
    model
}

#[test]
fn finalize_reports_every_problem() {
    crate::init_tracing();
    let mut model = unvalidated_two_node();
    model.define_variable("C", &["x", "y"]).unwrap();
    model
        .add_cpd(Cpt::marginal("A", vec![0.5, 0.6]).unwrap())
        .unwrap();
    model
        .add_cpd(Cpt::from_rows("B", vec![("C", 2)], vec![vec![0.9, 0.2], vec![0.1, 0.8]]).unwrap())
        .unwrap();

    let report = model.finalize().unwrap_err();
    assert_eq!(report.len(), 3);
    assert!(report.contains_kind(ErrorKind::CptNotNormalized));
    assert!(report.contains_kind(ErrorKind::EvidenceParentMismatch));
    assert!(report
        .iter()
        .any(|e| *e == NetworkError::MissingCpd { variable: "C".into() }));
    assert!(!model.is_finalized());
    assert!(report.to_string().contains("3 error"));
}

#[test]
fn finalize_reports_every_failure_of_one_cpt() {
    let mut model = unvalidated_two_node();
    model
        .add_cpd(Cpt::marginal("A", vec![0.5, 0.5]).unwrap())
        .unwrap();
    // ignores its parent and is not normalized
    model
        .add_cpd(Cpt::marginal("B", vec![0.5, 0.6]).unwrap())
        .unwrap();

    let report = model.finalize().unwrap_err();
    let kinds: Vec<ErrorKind> = report.iter().map(NetworkError::kind).collect();
    assert_eq!(
        kinds,
        vec![ErrorKind::CptNotNormalized, ErrorKind::EvidenceParentMismatch]
    );

    model
        .add_cpd(
            Cpt::from_rows("B", vec![("A", 2)], vec![vec![0.5, 0.5], vec![0.6, 0.6]]).unwrap(),
        )
        .unwrap();
    let report = model.finalize().unwrap_err();
    let columns: Vec<usize> = report
        .iter()
        .map(|e| match e {
            NetworkError::CptNotNormalized { target, column, .. } => {
                assert_eq!(target, "B");
                *column
            }
            other => panic!("expected a normalization error, got {:?}", other),
        })
        .collect();
    assert_eq!(columns, vec![0, 1]);
    assert!(report.to_string().contains("2 error"));
}

#[test]
fn cycle_is_reported_alone() {
    let mut model = unvalidated_two_node();
    model.add_edge_unchecked("B", "A").unwrap();

    let report = model.finalize().unwrap_err();
    let errors = report.into_errors();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        NetworkError::CycleDetected { cycle } => {
            assert!(cycle.contains(&"A".to_string()));
            assert!(cycle.contains(&"B".to_string()));
        }
        other => panic!("expected a cycle, got {:?}", other),
    }
}

#[test]
fn add_edge_rejects_cycles_immediately() {
    let mut model = bank_loan_network();
    let err = model.add_edge("BankLoan", "DebtIncomeRatio").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CycleDetected);
    assert_eq!(
        model.parents_of("DebtIncomeRatio").unwrap(),
        Vec::<&str>::new()
    );
    // The rejected edge did not invalidate the model.
    assert!(model.is_finalized());
}

#[test]
fn mutation_clears_finalized_flag() {
    let mut model = two_node_network();
    assert!(model.is_finalized());

    let previous = model
        .add_cpd(Cpt::marginal("A", vec![0.3, 0.7]).unwrap())
        .unwrap();
    assert!(previous.is_some());
    assert!(!model.is_finalized());

    let err = model.infer(&["B"], &Evidence::new()).unwrap_err();
    assert_eq!(err, NetworkError::NotFinalized);

    model.finalize().unwrap();
    let b = model.infer(&["B"], &Evidence::new()).unwrap();
    // 0.3 * 0.9 + 0.7 * 0.2
    assert!((b.probability(&[("B", "Yes")]).unwrap() - 0.41).abs() < 1e-9);
}

#[test]
fn bad_state_lookup_does_not_alter_model() {
    let model = two_node_network();
    let cpd = model.cpd("B").unwrap().clone();
    let err = cpd
        .probability(model.registry(), "Maybe", &[("A", "Low")])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownState);
    assert_eq!(model.cpd("B"), Some(&cpd));
    assert!(model.is_finalized());

    let p = cpd
        .probability(model.registry(), "Yes", &[("A", "High")])
        .unwrap();
    assert!((p - 0.2).abs() < 1e-12);
}

#[test]
fn tolerance_is_configurable() {
    let mut model = unvalidated_two_node();
    model
        .add_cpd(Cpt::marginal("A", vec![0.5, 0.5001]).unwrap())
        .unwrap();
    model
        .add_cpd(Cpt::from_rows("B", vec![("A", 2)], vec![vec![0.9, 0.2], vec![0.1, 0.8]]).unwrap())
        .unwrap();
    assert!(model.finalize().is_err());

    model.set_tolerance(1e-3).unwrap();
    model.finalize().unwrap();

    assert_eq!(
        model.set_tolerance(-1.0).unwrap_err().kind(),
        ErrorKind::InvalidConfig
    );
}

#[test]
fn structure_queries() {
    let model = bank_loan_network();
    assert_eq!(model.roots(), vec!["DebtIncomeRatio", "Income"]);
    assert_eq!(model.leaves(), vec!["BankLoan"]);

    let mut parents = model.parents_of("BankLoan").unwrap();
    parents.sort();
    assert_eq!(parents, vec!["DebtIncomeRatio", "FutureIncome", "Reliability"]);

    let order = model.topological_order().unwrap();
    let pos = |name: &str| order.iter().position(|v| *v == name).unwrap();
    assert!(pos("PaymentHistory") < pos("Age"));
    assert!(pos("Age") < pos("Reliability"));
    assert!(pos("Assets") < pos("FutureIncome"));
    assert_eq!(pos("BankLoan"), order.len() - 1);

    let mut blanket = model.markov_blanket("Reliability").unwrap();
    blanket.sort();
    assert_eq!(
        blanket,
        vec!["Age", "BankLoan", "DebtIncomeRatio", "FutureIncome", "PaymentHistory"]
    );
}

#[test]
fn registry_rejects_bad_definitions() {
    let mut model = BayesianModel::new();
    model.define_variable("A", &["x", "y"]).unwrap();
    assert_eq!(
        model.define_variable("A", &["x", "y"]).unwrap_err().kind(),
        ErrorKind::DuplicateVariable
    );
    assert_eq!(
        model.define_variable("B", &["x", "x"]).unwrap_err().kind(),
        ErrorKind::InvalidStateList
    );
    assert_eq!(
        model.define_variable("C", &[]).unwrap_err().kind(),
        ErrorKind::InvalidStateList
    );
    assert_eq!(
        model
            .add_cpd(Cpt::marginal("Z", vec![1.0, 0.0]).unwrap())
            .unwrap_err()
            .kind(),
        ErrorKind::UnknownVariable
    );
    assert_eq!(model.registry().len(), 1);
}
