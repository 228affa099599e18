#![cfg(test)]

use approx::assert_relative_eq;

use super::backend::MaterialBackend;
use super::error::MaterialError;
use super::field::Field2D;
use super::grid::Grid2D;
use super::mask::{AxisRange, MaskSpec};
use super::material::MaterialStack;
use super::reference::ReferenceBackend;
use super::response::{dielectric, LinearResponse, MemoryCell, ResponseSpec};
use super::units::EPSILON_0;

fn stack(nx: usize, ny: usize) -> MaterialStack<ReferenceBackend> {
    MaterialStack::new(ReferenceBackend::new(), Grid2D::new(nx, ny, 1.0, 1.0)).unwrap()
}

#[test]
fn scalar_layer_with_full_array_mask_scales_both_axes() {
    let mut stack = MaterialStack::with_extent(ReferenceBackend::new(), [2.0, 2.0], [1.0, 1.0])
        .unwrap();
    let grid = stack.grid();
    stack
        .define_layer(Field2D::filled(grid, 1.0), 2.0)
        .unwrap();

    let flux = Field2D::filled(grid, 1.0);
    let (ex, ey) = stack.apply_host(&flux, &flux, 1.0, 0.0).unwrap();
    assert_eq!(ex.as_slice(), &[2.0; 4]);
    assert_eq!(ey.as_slice(), &[2.0; 4]);

    let (memory_x, memory_y) = stack.memory(0).unwrap();
    assert!(memory_x.integral().as_slice().iter().all(|m| *m == 0.0));
    assert!(memory_y.integral().as_slice().iter().all(|m| *m == 0.0));
}

#[test]
fn every_output_has_the_canonical_grid_shape() {
    let mut stack = MaterialStack::with_extent(ReferenceBackend::new(), [3.0, 1.0], [0.5, 0.25])
        .unwrap();
    stack.define_layer(MaskSpec::full(), dielectric(2.0, 0.1).unwrap()).unwrap();
    let grid = stack.grid();
    assert_eq!(grid.shape(), (6, 4));

    let flux = Field2D::filled(grid, 1e-9);
    let (ex, ey) = stack.apply((&flux, &flux), 1e-12, 0.0).unwrap();
    assert_eq!(ex.shape(), (6, 4));
    assert_eq!(ey.shape(), (6, 4));
    assert_eq!(stack.mask(0).unwrap().shape(), (6, 4));
    let (memory_x, memory_y) = stack.memory(0).unwrap();
    assert_eq!(memory_x.integral().shape(), (6, 4));
    assert_eq!(memory_y.integral().shape(), (6, 4));
}

#[test]
fn empty_stack_returns_zero_fields() {
    let mut stack = stack(3, 3);
    let flux = Field2D::filled(stack.grid(), 5.0);
    let (ex, ey) = stack.apply((&flux, &flux), 1.0, 0.0).unwrap();
    assert!(ex.as_slice().iter().chain(ey.as_slice()).all(|v| *v == 0.0));
}

#[test]
fn single_layer_result_is_weighted_by_its_mask() {
    let mut stack = stack(4, 1);
    let weights = Field2D::from_vec(stack.grid(), vec![0.0, 0.25, 0.5, 1.0]);
    stack.define_layer(weights.clone(), 4.0).unwrap();

    let flux = Field2D::from_vec(stack.grid(), vec![1.0, 2.0, 3.0, 4.0]);
    let (ex, _) = stack.apply((&flux, &flux), 1.0, 0.0).unwrap();
    for ((field, m), d) in ex.as_slice().iter().zip(weights.as_slice()).zip(flux.as_slice()) {
        assert_relative_eq!(*field, m * 4.0 * d);
    }
}

#[test]
fn disjoint_layers_add_and_leave_uncovered_cells_at_zero() {
    let mut stack = stack(6, 2);
    stack
        .define_layer((AxisRange::new(0.0, 2.0), AxisRange::full()), 2.0)
        .unwrap();
    stack
        .define_layer((AxisRange::new(3.0, 5.0), AxisRange::full()), 3.0)
        .unwrap();

    let flux = Field2D::filled(stack.grid(), 1.0);
    let (ex, ey) = stack.apply((&flux, &flux), 1.0, 0.0).unwrap();
    for field in [&ex, &ey] {
        for iy in 0..2 {
            let row: Vec<f64> = (0..6).map(|ix| field.get(ix, iy)).collect();
            assert_eq!(row, vec![2.0, 2.0, 0.0, 3.0, 3.0, 0.0]);
        }
    }
}

#[test]
fn later_layer_overrides_earlier_layer_on_full_overlap() {
    let mut stack = stack(3, 3);
    stack.define_layer(MaskSpec::full(), 100.0).unwrap();
    stack.define_layer(MaskSpec::full(), -1.5).unwrap();

    let flux = Field2D::filled(stack.grid(), 2.0);
    let (ex, ey) = stack.apply((&flux, &flux), 1.0, 0.0).unwrap();
    assert!(ex.as_slice().iter().chain(ey.as_slice()).all(|v| *v == -3.0));
}

#[test]
fn partial_weights_blend_with_earlier_layers() {
    let mut stack = stack(2, 1);
    stack.define_layer(MaskSpec::full(), 1.0).unwrap();
    stack
        .define_layer(MaskSpec::from_predicate(|x, _| if x < 0.5 { 0.25 } else { 0.0 }), 5.0)
        .unwrap();

    let flux = Field2D::filled(stack.grid(), 2.0);
    let (ex, _) = stack.apply((&flux, &flux), 1.0, 0.0).unwrap();
    // 0.25 * 10 + 0.75 * 2 on the first cell, untouched on the second
    assert_relative_eq!(ex.get(0, 0), 4.0);
    assert_relative_eq!(ex.get(1, 0), 2.0);
}

#[test]
fn pair_response_drives_axes_independently() {
    let mut stack = stack(2, 2);
    stack
        .define_layer(
            MaskSpec::full(),
            ResponseSpec::from_pair(LinearResponse::new(2.0), LinearResponse::new(-1.0)),
        )
        .unwrap();

    let flux_x = Field2D::filled(stack.grid(), 3.0);
    let flux_y = Field2D::filled(stack.grid(), 5.0);
    let (ex, ey) = stack.apply((&flux_x, &flux_y), 1.0, 0.0).unwrap();
    assert!(ex.as_slice().iter().all(|v| *v == 6.0));
    assert!(ey.as_slice().iter().all(|v| *v == -5.0));
}

#[test]
fn memory_persists_across_steps_and_is_private_to_each_layer_and_axis() {
    let mut stack = stack(2, 1);
    let lossy = dielectric(1.0, 0.5).unwrap();
    stack.define_layer(MaskSpec::full(), lossy).unwrap();
    stack.define_layer(MaskSpec::full(), lossy).unwrap();

    let (d, dt) = (1e-9, 1e-11);
    let flux_x = Field2D::filled(stack.grid(), d);
    let flux_y = Field2D::zeros(stack.grid());
    let mut integral = 0.0;
    for step in 0..4 {
        let (ex, ey) = stack
            .apply((&flux_x, &flux_y), dt, step as f64 * dt)
            .unwrap();
        let expected = (d - integral) / (EPSILON_0 + 0.5 * dt);
        integral += 0.5 * expected * dt;
        assert_relative_eq!(ex.get(0, 0), expected, max_relative = 1e-12);
        assert!(ey.as_slice().iter().all(|v| *v == 0.0));
    }

    for layer in 0..2 {
        let (memory_x, memory_y) = stack.memory(layer).unwrap();
        assert_relative_eq!(memory_x.integral().get(1, 0), integral, max_relative = 1e-12);
        assert!(memory_y.integral().as_slice().iter().all(|m| *m == 0.0));
    }
}

#[test]
fn y_axis_uses_the_y_function() {
    let mut stack = stack(1, 1);
    let tagged = |value: f64| {
        move |backend: &ReferenceBackend,
              _flux: &Field2D,
              _dt: f64,
              _t: f64,
              _memory: &mut MemoryCell<Field2D>,
              out: &mut Field2D|
              -> Result<(), MaterialError> { backend.fill(out, value) }
    };
    stack
        .define_layer(MaskSpec::full(), ResponseSpec::from_pair(tagged(1.0), tagged(2.0)))
        .unwrap();

    let flux = Field2D::zeros(stack.grid());
    let (ex, ey) = stack.apply((&flux, &flux), 1.0, 0.0).unwrap();
    assert_eq!(ex.get(0, 0), 1.0);
    assert_eq!(ey.get(0, 0), 2.0);
}

#[test]
fn time_is_passed_through_to_responses() {
    let mut stack = stack(1, 1);
    let clock = |backend: &ReferenceBackend,
                 _flux: &Field2D,
                 _dt: f64,
                 t: f64,
                 _memory: &mut MemoryCell<Field2D>,
                 out: &mut Field2D|
     -> Result<(), MaterialError> { backend.fill(out, t) };
    stack
        .define_layer(MaskSpec::full(), ResponseSpec::from_single(clock))
        .unwrap();

    let flux = Field2D::zeros(stack.grid());
    let (ex, ey) = stack.apply((&flux, &flux), 0.5, 7.25).unwrap();
    assert_eq!(ex.get(0, 0), 7.25);
    assert_eq!(ey.get(0, 0), 7.25);
}

#[test]
fn responses_start_from_a_zeroed_output() {
    let mut stack = stack(2, 1);
    let accumulate = |_backend: &ReferenceBackend,
                      _flux: &Field2D,
                      _dt: f64,
                      _t: f64,
                      _memory: &mut MemoryCell<Field2D>,
                      out: &mut Field2D|
     -> Result<(), MaterialError> {
        for value in out.as_mut_slice() {
            *value += 1.0;
        }
        Ok(())
    };
    stack.define_layer(MaskSpec::full(), 5.0).unwrap();
    stack
        .define_layer(
            MaskSpec::from_range(AxisRange::starting_at(1.0), AxisRange::full()),
            ResponseSpec::from_single(accumulate),
        )
        .unwrap();

    let flux = Field2D::filled(stack.grid(), 1.0);
    let (ex, ey) = stack.apply((&flux, &flux), 1.0, 0.0).unwrap();
    assert_eq!(ex.as_slice(), &[5.0, 1.0]);
    assert_eq!(ey.as_slice(), &[5.0, 1.0]);
}

#[test]
fn response_error_aborts_the_step_after_earlier_layers_advanced() {
    let mut stack = stack(2, 2);
    let failing = |_backend: &ReferenceBackend,
                   _flux: &Field2D,
                   _dt: f64,
                   _t: f64,
                   _memory: &mut MemoryCell<Field2D>,
                   _out: &mut Field2D|
     -> Result<(), MaterialError> {
        Err(MaterialError::Device("response failed".into()))
    };
    stack.define_layer(MaskSpec::full(), dielectric(1.0, 1.0).unwrap()).unwrap();
    stack
        .define_layer(MaskSpec::full(), ResponseSpec::from_single(failing))
        .unwrap();

    let flux = Field2D::filled(stack.grid(), 1.0);
    let err = stack.apply((&flux, &flux), 1e-12, 0.0).unwrap_err();
    assert!(matches!(err, MaterialError::Device(_)), "{err}");

    let (memory_x, _) = stack.memory(0).unwrap();
    assert!(memory_x.integral().as_slice().iter().all(|m| *m > 0.0));
}

#[test]
fn mismatched_flux_shape_aborts_before_memory_changes() {
    let mut stack = stack(3, 3);
    stack.define_layer(MaskSpec::full(), dielectric(1.0, 1.0).unwrap()).unwrap();

    let good = Field2D::filled(stack.grid(), 1.0);
    let bad = Field2D::filled(Grid2D::new(3, 2, 1.0, 1.0), 1.0);
    let err = stack.apply((&good, &bad), 1e-12, 0.0).unwrap_err();
    assert!(matches!(err, MaterialError::ShapeMismatch { .. }), "{err}");

    let err = stack.apply_host(&bad, &good, 1e-12, 0.0).unwrap_err();
    assert!(matches!(err, MaterialError::ShapeMismatch { .. }), "{err}");

    let (memory_x, memory_y) = stack.memory(0).unwrap();
    assert!(memory_x.integral().as_slice().iter().all(|m| *m == 0.0));
    assert!(memory_y.integral().as_slice().iter().all(|m| *m == 0.0));
}

#[test]
fn non_positive_time_step_is_rejected() {
    let mut stack = stack(2, 2);
    stack.define_layer(MaskSpec::full(), 1.0).unwrap();
    let flux = Field2D::zeros(stack.grid());
    for dt in [0.0, -1.0, f64::NAN] {
        let err = stack.apply((&flux, &flux), dt, 0.0).unwrap_err();
        assert!(matches!(err, MaterialError::InvalidTimeStep(_)), "{err}");
    }
}

#[test]
fn invalid_layers_are_rejected_at_registration() {
    let mut stack = stack(2, 2);
    let wrong_shape = Field2D::zeros(Grid2D::new(1, 2, 1.0, 1.0));
    assert!(matches!(
        stack.define_layer(wrong_shape, 1.0),
        Err(MaterialError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        stack.define_layer(MaskSpec::full(), f64::INFINITY),
        Err(MaterialError::InvalidLayer(_))
    ));
    assert!(stack.is_empty());
}

#[test]
fn stack_rejects_non_integral_extent() {
    let result = MaterialStack::with_extent(ReferenceBackend::new(), [1.0, 1.0], [0.3, 1.0]);
    assert!(matches!(result, Err(MaterialError::InvalidGeometry(_))));
}
