use baynet_core::{Cpt, Distribution, EliminationConfig, EliminationOrder, Evidence};
use baynet_tests::two_node_network;

#[test]
fn cpt_round_trips_through_json() {
    let model = two_node_network();
    let cpd = model.cpd("B").unwrap();
    let json = serde_json::to_string(cpd).unwrap();
    let back: Cpt = serde_json::from_str(&json).unwrap();
    assert_eq!(&back, cpd);
}

#[test]
fn posterior_serializes_with_labels() {
    let model = two_node_network();
    let posterior = model.infer(&["A"], &Evidence::from([("B", "No")])).unwrap();
    let json = serde_json::to_value(&posterior).unwrap();
    assert_eq!(json["variables"][0], "A");
    assert_eq!(json["states"][0][1], "High");

    let back: Distribution = serde_json::from_value(json).unwrap();
    assert_eq!(back, posterior);
}

#[test]
fn posterior_with_mismatched_lengths_is_rejected() {
    let json = r#"{"variables":["A"],"states":[["Low","High"]],"probabilities":[1.0]}"#;
    assert!(serde_json::from_str::<Distribution>(json).is_err());

    let json = r#"{"variables":["A","B"],"states":[["Low","High"]],"probabilities":[0.5,0.5]}"#;
    assert!(serde_json::from_str::<Distribution>(json).is_err());

    let json = r#"{"variables":["A"],"states":[["Low","High"]],"probabilities":[0.3,0.7]}"#;
    let posterior: Distribution = serde_json::from_str(json).unwrap();
    assert!((posterior.probability(&[("A", "High")]).unwrap() - 0.7).abs() < 1e-12);
}

#[test]
fn config_and_evidence_deserialize() {
    let config: EliminationConfig = serde_json::from_str(
        r#"{"order":{"Explicit":["X","Y"]},"max_greedy_variables":8,"prune_barren":false}"#,
    )
    .unwrap();
    assert_eq!(
        config.order,
        EliminationOrder::Explicit(vec!["X".into(), "Y".into()])
    );
    assert!(!config.prune_barren);

    let evidence: Evidence =
        serde_json::from_str(r#"{"observations":{"B":"Yes"}}"#).unwrap();
    assert_eq!(evidence.state_of("B"), Some("Yes"));
}
