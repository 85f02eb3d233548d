use log::{debug, info, trace};
use ndarray::{s, Array2, Array3, ArrayView2, Axis};

use crate::config::PipelineConfig;
use crate::error::{Result, TabError};
use crate::preprocessing::cqt::SpectralTransform;
use crate::preprocessing::load_audio::AudioSignal;

/// Sliding, centred windows over a (frames, bins) matrix.
///
/// Yields one (bins, width) window per frame. Frames missing at the start or
/// end of the signal are replaced by zero columns on that side.
pub struct SpectralWindows<'a> {
    frames: ArrayView2<'a, f32>,
    width: usize,
    index: usize,
}

impl<'a> Iterator for SpectralWindows<'a> {
    type Item = Array2<f32>;

    fn next(&mut self) -> Option<Self::Item> {
        let n_frames = self.frames.nrows();
        if self.index >= n_frames {
            return None;
        }

        let half_width = self.width / 2;
        let lbound = self.index.saturating_sub(half_width);
        let rbound = (self.index + half_width + 1).min(n_frames);
        let pad_left = half_width.saturating_sub(self.index);
        let pad_right = self.width - pad_left - (rbound - lbound);

        if pad_left > 0 || pad_right > 0 {
            trace!(
                "Padding window {}: frames {}..{}, {} left, {} right.",
                self.index,
                lbound,
                rbound,
                pad_left,
                pad_right
            );
        }

        let mut window = Array2::zeros((self.frames.ncols(), self.width));
        window
            .slice_mut(s![.., pad_left..pad_left + (rbound - lbound)])
            .assign(&self.frames.slice(s![lbound..rbound, ..]).t());

        self.index += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.frames.nrows().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SpectralWindows<'_> {}

/// Windows of an odd `width` over `frames`; even or zero widths have no centre frame.
pub fn window_frames(frames: ArrayView2<f32>, width: usize) -> Result<SpectralWindows> {
    if width == 0 || width % 2 == 0 {
        return Err(TabError::Config(format!("window width must be odd and positive, got {}", width)));
    }
    Ok(SpectralWindows { frames, width, index: 0 })
}

/// Collects every window of `frames` into a (frames, bins, width) array.
pub fn extract_windows(frames: ArrayView2<f32>, width: usize) -> Result<Array3<f32>> {
    let windows_iter = window_frames(frames, width)?;
    if width >= frames.nrows() {
        return Err(TabError::Config(format!(
            "window width {} needs more than the {} available frames",
            width,
            frames.nrows()
        )));
    }

    let mut windows = Array3::zeros((frames.nrows(), frames.ncols(), width));
    for (mut slot, window) in windows.axis_iter_mut(Axis(0)).zip(windows_iter) {
        slot.assign(&window);
    }
    Ok(windows)
}

/// Runs the transform over a signal and cuts it into windows.
pub fn preprocess_audio(
    signal: &AudioSignal,
    transform: &dyn SpectralTransform,
    config: &PipelineConfig,
) -> Result<Array3<f32>> {
    let frames = transform.transform(signal.samples.view());
    if frames.ncols() != config.bins {
        return Err(TabError::Shape {
            expected: format!("(*, {})", config.bins),
            actual: frames.shape().to_vec(),
        });
    }
    debug!("Transform produced {} frames x {} bins.", frames.nrows(), frames.ncols());

    let windows = extract_windows(frames.view(), config.window_width)?;
    info!("Extracted {} windows of shape ({}, {}).", windows.len_of(Axis(0)), config.bins, config.window_width);
    Ok(windows)
}
