use baynet_core::{Evidence, Factor, VariableRegistry};
use baynet_tests::two_node_network;

#[test]
fn cpt_factor_product_is_the_joint() {
    let model = two_node_network();
    let registry = model.registry();
    let a = Factor::from_cpt(model.cpd("A").unwrap(), registry).unwrap();
    let b = Factor::from_cpt(model.cpd("B").unwrap(), registry).unwrap();

    let joint = b.multiply(&a).unwrap();
    assert!((joint.total() - 1.0).abs() < 1e-12);
    let p = joint.value_of(&[("A", "High"), ("B", "Yes")]).unwrap();
    assert!((p - 0.1).abs() < 1e-12);

    let reduced = joint.reduce(&Evidence::from([("B", "Yes")])).unwrap();
    assert_eq!(reduced.scope().len(), 1);
    let posterior = reduced.normalize().unwrap();
    assert!((posterior.values()[0] - 0.45 / 0.55).abs() < 1e-12);
}

#[test]
fn sum_out_order_does_not_matter() {
    let mut registry = VariableRegistry::new();
    let x = registry.define("X", &["a", "b"]).unwrap();
    let y = registry.define("Y", &["a", "b", "c"]).unwrap();
    let z = registry.define("Z", &["a", "b"]).unwrap();

    let f = Factor::new(
        vec![x.clone(), y.clone()],
        vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6],
    )
    .unwrap();
    let g = Factor::new(vec![y.clone(), z.clone()], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let product = f.multiply(&g).unwrap();
    assert_eq!(product.len(), 12);

    let left = product.sum_out_all(&[x.clone(), y.clone()]).unwrap();
    let right = product.sum_out_all(&[y, x]).unwrap();
    assert!(left.approx_eq(&right, 1e-12));
    assert_eq!(left.scope()[0].name(), "Z");
    assert!((left.total() - product.total()).abs() < 1e-12);
}

#[test]
fn reorder_preserves_cells() {
    let mut registry = VariableRegistry::new();
    let x = registry.define("X", &["a", "b"]).unwrap();
    let y = registry.define("Y", &["a", "b", "c"]).unwrap();
    let f = Factor::new(vec![x.clone(), y.clone()], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();

    let swapped = f.reorder(&[y.clone(), x.clone()]).unwrap();
    assert_eq!(swapped.values(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    assert_eq!(swapped.value(&[2, 0]), f.value(&[0, 2]));
    assert!(swapped.approx_eq(&f, 0.0));
    assert_eq!(f.argmax(), Some((vec![1, 2], 6.0)));
}
