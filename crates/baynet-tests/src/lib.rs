//! Shared fixtures for the baynet integration and property tests.

use baynet_core::{BayesianModel, Cpt, Evidence, Factor, NetworkError};

/// `A -> B` with `P(A) = [0.5, 0.5]` and `P(B | A) = [[0.9, 0.2], [0.1, 0.8]]`.
///
/// `P(B=Yes) = 0.55` and `P(A=Low | B=Yes) = 0.45 / 0.55`.
pub fn two_node_network() -> BayesianModel {
    let mut model = BayesianModel::new();
    model.define_variable("A", &["Low", "High"]).unwrap();
    model.define_variable("B", &["Yes", "No"]).unwrap();
    model.add_edge("A", "B").unwrap();
    model
        .add_cpd(Cpt::marginal("A", vec![0.5, 0.5]).unwrap())
        .unwrap();
    model
        .add_cpd(
            Cpt::from_rows("B", vec![("A", 2)], vec![vec![0.9, 0.2], vec![0.1, 0.8]]).unwrap(),
        )
        .unwrap();
    model.finalize().unwrap();
    model
}

/// The bank-loan network: eight variables deciding whether a loan is approved.
///
/// ```text
/// DebtIncomeRatio -> PaymentHistory -> Age -> Reliability
///                    PaymentHistory ---------> Reliability
/// Income -> Assets -> FutureIncome
/// Income -----------> FutureIncome
/// DebtIncomeRatio, Reliability, FutureIncome -> BankLoan
/// ```
pub fn bank_loan_network() -> BayesianModel {
    let mut model = BayesianModel::new();
    let variables: [(&str, &[&str]); 8] = [
        ("DebtIncomeRatio", &["Low", "High"]),
        ("PaymentHistory", &["Excellent", "Acceptable", "Unacceptable"]),
        ("Age", &["Between16and25", "Between26and64", "Over65"]),
        ("Reliability", &["Reliable", "Unreliable"]),
        ("Income", &["High", "Medium", "Low"]),
        ("Assets", &["High", "Medium", "Low"]),
        ("FutureIncome", &["Promising", "Not_promising"]),
        ("BankLoan", &["Positive", "Negative"]),
    ];
    for (name, states) in variables {
        model.define_variable(name, states).unwrap();
    }

    for (parent, child) in [
        ("DebtIncomeRatio", "PaymentHistory"),
        ("PaymentHistory", "Age"),
        ("PaymentHistory", "Reliability"),
        ("Age", "Reliability"),
        ("Income", "Assets"),
        ("Income", "FutureIncome"),
        ("Assets", "FutureIncome"),
        ("DebtIncomeRatio", "BankLoan"),
        ("Reliability", "BankLoan"),
        ("FutureIncome", "BankLoan"),
    ] {
        model.add_edge(parent, child).unwrap();
    }

    model
        .add_cpds([
            Cpt::marginal("DebtIncomeRatio", vec![0.5, 0.5]).unwrap(),
            Cpt::marginal("Income", vec![0.333, 0.333, 0.334]).unwrap(),
            Cpt::from_rows(
                "PaymentHistory",
                vec![("DebtIncomeRatio", 2)],
                vec![vec![0.6, 0.1], vec![0.3, 0.3], vec![0.1, 0.6]],
            )
            .unwrap(),
            Cpt::from_rows(
                "Age",
                vec![("PaymentHistory", 3)],
                vec![
                    vec![0.1, 0.333, 0.6],
                    vec![0.3, 0.333, 0.3],
                    vec![0.6, 0.334, 0.1],
                ],
            )
            .unwrap(),
            Cpt::from_rows(
                "Reliability",
                vec![("PaymentHistory", 3), ("Age", 3)],
                vec![
                    vec![0.7, 0.8, 0.9, 0.6, 0.7, 0.8, 0.5, 0.6, 0.7],
                    vec![0.3, 0.2, 0.1, 0.4, 0.3, 0.2, 0.5, 0.4, 0.3],
                ],
            )
            .unwrap(),
            Cpt::from_rows(
                "Assets",
                vec![("Income", 3)],
                vec![
                    vec![0.7, 0.3, 0.1],
                    vec![0.2, 0.5, 0.3],
                    vec![0.1, 0.2, 0.6],
                ],
            )
            .unwrap(),
            Cpt::from_rows(
                "FutureIncome",
                vec![("Income", 3), ("Assets", 3)],
                vec![
                    vec![0.9, 0.8, 0.7, 0.7, 0.6, 0.5, 0.5, 0.3, 0.1],
                    vec![0.1, 0.2, 0.3, 0.3, 0.4, 0.5, 0.5, 0.7, 0.9],
                ],
            )
            .unwrap(),
            Cpt::from_rows(
                "BankLoan",
                vec![("DebtIncomeRatio", 2), ("Reliability", 2), ("FutureIncome", 2)],
                vec![
                    vec![0.8, 0.6, 0.6, 0.4, 0.6, 0.4, 0.4, 0.2],
                    vec![0.2, 0.4, 0.4, 0.6, 0.4, 0.6, 0.6, 0.8],
                ],
            )
            .unwrap(),
        ])
        .unwrap();
    model.finalize().unwrap();
    model
}

/// Posterior computed from the full joint, without any elimination ordering.
///
/// Multiplies every CPT, reduces by the evidence, sums out everything that is
/// not queried, and normalizes. Exponential in the number of variables.
pub fn brute_force_posterior(
    model: &BayesianModel,
    query: &[&str],
    evidence: &Evidence,
) -> Result<Factor, NetworkError> {
    let registry = model.registry();
    let factors = model
        .cpds()
        .map(|cpt| Factor::from_cpt(cpt, registry))
        .collect::<Result<Vec<_>, _>>()?;
    let joint = Factor::product_all(&factors)?.reduce(evidence)?;

    let query_vars = query
        .iter()
        .map(|name| registry.resolve(name).cloned())
        .collect::<Result<Vec<_>, _>>()?;
    let hidden: Vec<_> = joint
        .scope()
        .iter()
        .filter(|v| !query.contains(&v.name()))
        .cloned()
        .collect();

    joint
        .sum_out_all(&hidden)?
        .reorder(&query_vars)?
        .normalize()
}
