use std::path::Path;

use log::{debug, info};
use ndarray::{concatenate, Array3, ArrayView3, Axis, Ix3};
use ort::{GraphOptimizationLevel, Session, Tensor};

use crate::config::PipelineConfig;
use crate::constants::INFERENCE_BATCH_SIZE;
use crate::error::{Result, TabError};
use crate::postprocessing::decode::{check_shape, decode_tab, TabEvent};
use crate::preprocessing::cqt::SpectralTransform;
use crate::preprocessing::load_audio::{load_signal, AudioSource};
use crate::preprocessing::spectral_windows::preprocess_audio;

/// Maps (windows, bins, width) spectral windows to (windows, strings, classes) scores.
pub trait FretModel {
    fn predict(&mut self, windows: ArrayView3<f32>) -> Result<Array3<f32>>;
}

/// A network exported to ONNX, fed with (batch, bins, width, 1) tensors.
pub struct OnnxFretModel {
    session: Session,
    batch_size: usize,
    n_strings: usize,
    n_classes: usize,
}

impl OnnxFretModel {
    pub fn from_file<P: AsRef<Path>>(model_path: P, config: &PipelineConfig) -> Result<Self> {
        let model_path = model_path.as_ref();
        if !model_path.exists() {
            return Err(TabError::io(
                model_path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "model file not found"),
            ));
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(model_path)?;
        info!("Loaded model {}.", model_path.display());

        Ok(OnnxFretModel {
            session,
            batch_size: INFERENCE_BATCH_SIZE,
            n_strings: config.n_strings(),
            n_classes: config.n_classes(),
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl FretModel for OnnxFretModel {
    fn predict(&mut self, windows: ArrayView3<f32>) -> Result<Array3<f32>> {
        let mut batches: Vec<Array3<f32>> = vec![];

        for batch in windows.axis_chunks_iter(Axis(0), self.batch_size) {
            // The network expects a trailing channel axis.
            let batch = batch.insert_axis(Axis(3)).to_owned();
            let input_shape: Vec<i64> = batch.shape().iter().map(|&dim| dim as i64).collect();
            let input_data: Vec<f32> = batch.into_raw_vec();
            let input_tensor = Tensor::from_array((input_shape, input_data))?;
            let outputs = self.session.run(ort::inputs![input_tensor]?)?;

            let (_, value) = outputs.iter().next().ok_or_else(|| TabError::Shape {
                expected: "one model output".to_string(),
                actual: vec![],
            })?;
            let prediction = value.try_extract_tensor::<f32>()?.into_dimensionality::<Ix3>()?.to_owned();
            check_shape(prediction.view(), self.n_strings, self.n_classes)?;
            debug!("Predicted batch of {} windows.", prediction.len_of(Axis(0)));
            batches.push(prediction);
        }

        if batches.is_empty() {
            return Ok(Array3::zeros((0, self.n_strings, self.n_classes)));
        }
        let views: Vec<ArrayView3<f32>> = batches.iter().map(|b| b.view()).collect();
        Ok(concatenate(Axis(0), &views)?)
    }
}

/// Audio in, tab out: load, window, predict, decode.
pub fn transcribe(
    source: &dyn AudioSource,
    transform: &dyn SpectralTransform,
    model: &mut dyn FretModel,
    config: &PipelineConfig,
) -> Result<Vec<TabEvent>> {
    let signal = load_signal(source, config)?;
    let windows = preprocess_audio(&signal, transform, config)?;

    let predictions = model.predict(windows.view())?;
    if predictions.len_of(Axis(0)) != windows.len_of(Axis(0)) {
        return Err(TabError::Shape {
            expected: format!("({}, {}, {})", windows.len_of(Axis(0)), config.n_strings(), config.n_classes()),
            actual: predictions.shape().to_vec(),
        });
    }

    decode_tab(predictions.view(), config)
}
