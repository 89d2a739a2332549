//! Integration test: compiled stack matrices against hand-composed products
//! and closed-form thin-film results.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{arr1, Array1, Array2};
use num_complex::Complex64;

use filmstack_core::operators::{numeric_interface, numeric_propagation, DomainError};
use filmstack_core::{
    Argument, EvalError, Layer, Matrix2, ScatteringArrays, ScatteringModel, StackError,
};

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

fn three_layers() -> Vec<Layer> {
    vec![
        Layer::new(1, 72.0, c(2.35, -0.004)),
        Layer::new(2, 118.0, c(1.45, 0.0)),
        Layer::new(3, 0.0, c(3.88, -0.019)),
    ]
}

/// I(0,1)·P(1)·I(1,2)·P(2)·I(2,3), composed by hand.
fn manual_product(layers: &[Layer], wavelength: f64) -> Matrix2<Complex64> {
    let air = Layer::ambient();
    let i01 = numeric_interface(&air, &layers[0]).unwrap();
    let p1 = numeric_propagation(&layers[0], wavelength).unwrap();
    let i12 = numeric_interface(&layers[0], &layers[1]).unwrap();
    let p2 = numeric_propagation(&layers[1], wavelength).unwrap();
    let i23 = numeric_interface(&layers[1], &layers[2]).unwrap();
    i01.matmul(&p1).matmul(&i12).matmul(&p2).matmul(&i23)
}

fn stored_arguments(model: &ScatteringModel, wavelength: f64) -> Vec<Complex64> {
    let mut inputs = vec![c(wavelength, 0.0)];
    for layer in model.layers() {
        inputs.push(layer.refractive_index);
        inputs.push(c(layer.thickness, 0.0));
    }
    inputs
}

#[test]
fn test_three_layer_stack_matches_manual_product() {
    let layers = three_layers();
    let model = ScatteringModel::build(&layers).unwrap();

    for wavelength in [380.0, 532.0, 633.0, 1064.0] {
        let expected = manual_product(&layers, wavelength);
        let got = model
            .evaluate_point(&stored_arguments(&model, wavelength))
            .unwrap();
        let scale = expected.m11.norm();
        assert!(
            got.max_abs_diff(&expected) / scale < 1e-12,
            "mismatch at {wavelength} nm: {got:?} vs {expected:?}"
        );
    }
}

#[test]
fn test_single_unit_index_layer_is_quarter_identity() {
    let model = ScatteringModel::from_layers([(250.0, c(1.0, 0.0))]).unwrap();
    let s = model.evaluate_point(&stored_arguments(&model, 500.0)).unwrap();

    let quarter = Matrix2::identity().scale(c(0.25, 0.0));
    assert!(s.max_abs_diff(&quarter) < 1e-15);
    assert_eq!(s.m12, c(0.0, 0.0));
    assert_eq!(s.m21, c(0.0, 0.0));
}

#[test]
fn test_wavelength_sweep_matches_scalar_calls() {
    let layers = three_layers();
    let model = ScatteringModel::build(&layers).unwrap();
    let wavelengths = Array1::linspace(400.0, 800.0, 50);

    let mut params = model.parameters();
    params.wavelength(wavelengths.clone());
    let sweep = params.evaluate().unwrap();
    assert_eq!(sweep.shape(), &[50]);

    for (i, &wl) in wavelengths.iter().enumerate() {
        let point = model.evaluate_point(&stored_arguments(&model, wl)).unwrap();
        let from_sweep = sweep.get(&[i]).unwrap();
        assert!(from_sweep.max_abs_diff(&point) / point.m11.norm() < 1e-13);

        let s11 = model
            .s11()
            .call_scalar(&stored_arguments(&model, wl))
            .unwrap();
        assert_relative_eq!(s11.re, point.m11.re, max_relative = 1e-12);
        assert_relative_eq!(s11.im, point.m11.im, max_relative = 1e-12, epsilon = 1e-18);
    }
}

#[test]
fn test_thickness_and_wavelength_broadcast_to_grid() {
    let model = ScatteringModel::build(&three_layers()).unwrap();
    let wavelengths = Array1::linspace(450.0, 650.0, 21);
    let thicknesses = Array2::from_shape_vec((4, 1), vec![50.0, 70.0, 90.0, 110.0]).unwrap();

    let mut params = model.parameters();
    params.wavelength(wavelengths.clone());
    params.thickness(1, thicknesses.into_dyn()).unwrap();
    let grid = params.evaluate().unwrap();
    assert_eq!(grid.shape(), &[4, 21]);

    let mut reference = three_layers();
    reference[0].thickness = 90.0;
    let expected = manual_product(&reference, wavelengths[7]);
    let got = grid.get(&[2, 7]).unwrap();
    assert!(got.max_abs_diff(&expected) / expected.m11.norm() < 1e-12);
}

#[test]
fn test_quarter_wave_coating_cancels_reflection() {
    let substrate = 1.52_f64;
    let coating = substrate.sqrt();
    let design = 550.0;
    let model = ScatteringModel::from_layers([
        (design / (4.0 * coating), c(coating, 0.0)),
        (0.0, c(substrate, 0.0)),
    ])
    .unwrap();

    let mut params = model.parameters();
    params.wavelength(vec![design, 400.0]);
    let reflectance = params.evaluate().unwrap().reflectance().unwrap();

    assert_abs_diff_eq!(reflectance[[0]], 0.0, epsilon = 1e-12);
    assert!(reflectance[[1]] > 1e-3);

    let bare = ((1.0 - substrate) / (1.0 + substrate)).powi(2);
    assert!(reflectance[[1]] < bare);
}

#[test]
fn test_opposite_indices_raise_domain_error() {
    let model = ScatteringModel::build(&[
        Layer::new(1, 40.0, c(1.5, 0.0)),
        Layer::new(2, 0.0, c(-1.5, 0.0)),
    ])
    .unwrap();
    let mut params = model.parameters();
    params.wavelength(600.0);

    match params.evaluate().unwrap_err() {
        EvalError::Domain(err @ DomainError::DivisionByZero { .. }) => {
            assert_eq!(err.site(), "interface 1|2");
            assert_eq!(err.element(), Some(0));
        }
        other => panic!("expected a division by zero, got {other:?}"),
    }
}

#[test]
fn test_zero_wavelength_reports_element() {
    let model = ScatteringModel::build(&three_layers()).unwrap();
    let mut params = model.parameters();
    params.wavelength(vec![500.0, 510.0, 0.0, 530.0]);

    let err = params.evaluate().unwrap_err();
    match err {
        EvalError::Domain(d) => {
            assert_eq!(d.site(), "propagation in layer 1");
            assert_eq!(d.element(), Some(2));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

/// Two absorbing layers whose attenuation is 500 e-folds each at 500 nm.
fn overflowing_model() -> ScatteringModel {
    let d = 500.0 * 500.0 / (2.0 * std::f64::consts::PI);
    ScatteringModel::from_layers([(d, c(1.5, -1.0)), (d, c(1.5, -1.0)), (0.0, c(1.5, 0.0))])
        .unwrap()
}

#[test]
fn test_overflowing_product_is_an_error() {
    let model = overflowing_model();
    let mut params = model.parameters();
    params.wavelength(vec![2000.0, 500.0]);

    for result in [params.evaluate(), params.evaluate_parallel()] {
        match result.unwrap_err() {
            EvalError::Domain(err @ DomainError::NonFinite { .. }) => {
                assert_eq!(err.element(), Some(1));
            }
            other => panic!("expected a non-finite value, got {other:?}"),
        }
    }

    params.wavelength(2000.0);
    let reflectance = params.evaluate().unwrap().reflectance().unwrap();
    assert!(reflectance.iter().all(|r| r.is_finite()));
}

#[test]
fn test_numeric_matrix_overflow_is_an_error() {
    let model = overflowing_model();
    let err = model.numeric_matrix(500.0).unwrap_err();
    assert!(matches!(err, DomainError::NonFinite { .. }));
    assert_eq!(err.site(), "scattering product");
    assert!(model.numeric_matrix(2000.0).is_ok());
}

#[test]
fn test_overflowing_reflection_coefficient_is_an_error() {
    let one = arr1(&[c(1.0, 0.0), c(1.0, 0.0)]).into_dyn();
    let arrays = ScatteringArrays {
        s11: arr1(&[c(1.0, 0.0), c(1e-300, 0.0)]).into_dyn(),
        s12: one.clone(),
        s21: arr1(&[c(0.5, 0.0), c(1e300, 0.0)]).into_dyn(),
        s22: one,
    };
    let err = arrays.reflectance().unwrap_err();
    assert!(matches!(err, DomainError::NonFinite { .. }));
    assert_eq!(err.site(), "reflection coefficient");
    assert_eq!(err.element(), Some(1));
}

#[test]
fn test_structural_errors() {
    assert!(matches!(ScatteringModel::build(&[]), Err(StackError::Empty)));
    assert!(matches!(
        ScatteringModel::build(&[Layer::new(0, 10.0, c(1.5, 0.0))]),
        Err(StackError::ReservedIndex)
    ));
    assert!(matches!(
        ScatteringModel::build(&[Layer::with_index(3), Layer::with_index(1), Layer::with_index(3)]),
        Err(StackError::DuplicateIndex(3))
    ));
}

#[test]
fn test_arity_mismatch() {
    let model = ScatteringModel::build(&three_layers()).unwrap();
    let err = model
        .evaluate(&[Argument::real(500.0), Argument::real(1.0)])
        .unwrap_err();
    assert!(matches!(err, EvalError::ArityMismatch { expected: 9, found: 2 }));
}

#[test]
fn test_parallel_evaluation_matches_serial() {
    let model = ScatteringModel::build(&three_layers()).unwrap();
    let mut params = model.parameters();
    params.wavelength(Array1::linspace(300.0, 1200.0, 2048));
    params
        .refractive_index(2, Array1::linspace(1.40, 1.60, 2048).mapv(|n| c(n, -0.001)))
        .unwrap();

    let serial = params.evaluate().unwrap();
    let parallel = params.evaluate_parallel().unwrap();
    assert_eq!(serial, parallel);
}

#[test]
fn test_deep_stack_matches_direct_composition() {
    let layers: Vec<(f64, Complex64)> = (0..40)
        .map(|i| {
            if i % 2 == 0 {
                (95.0, c(2.3, 0.0))
            } else {
                (140.0, c(1.46, 0.0))
            }
        })
        .chain(std::iter::once((0.0, c(1.52, 0.0))))
        .collect();
    let model = ScatteringModel::from_layers(layers).unwrap();
    assert_eq!(model.layer_count(), 41);

    let direct = model.numeric_matrix(870.0).unwrap();
    let compiled = model.evaluate_point(&stored_arguments(&model, 870.0)).unwrap();
    assert!(compiled.max_abs_diff(&direct) / direct.m11.norm() < 1e-9);

    // A dielectric mirror reflects strongly inside its stop band.
    let r = direct.m21 / direct.m11;
    assert!(r.norm_sqr() > 0.99);
}
