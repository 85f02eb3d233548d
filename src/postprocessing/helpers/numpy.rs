/* PORTED NUMPY FUNCTIONS */

use ndarray::{Array2, ArrayView1, ArrayView3, Axis};

/// Returns the location of the maximum element in the array.
///
/// Ties resolve to the first occurrence, like `numpy.argmax`.
///
/// # Arguments
///
/// * `arr` - Input array.
///
/// # Returns
///
/// * The location of the maximum element in the array, or `None` if the array is empty.
pub fn arg_max(arr: ArrayView1<f32>) -> Option<usize> {
    arr.iter()
        .enumerate()
        .reduce(|(max_index, max_value), (current_index, current_value)| {
            if current_value > max_value {
                (current_index, current_value)
            } else {
                (max_index, max_value)
            }
        })
        .map(|(index, _)| index)
}

/// Returns the location of the maximum element along the last axis of a 3D array.
///
/// # Arguments
///
/// * `arr` - Input array of shape (a, b, c).
///
/// # Returns
///
/// * An (a, b) array with the arg-max over `c` for every lane. Empty lanes map to 0.
pub fn arg_max_axis2(arr: ArrayView3<f32>) -> Array2<usize> {
    arr.map_axis(Axis(2), |lane| arg_max(lane).unwrap_or(0))
}
