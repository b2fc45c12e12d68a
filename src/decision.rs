use comms::msg::{Decision, Lights, Reading};
use log::info;
use machine_learning::arch::Classifier;
use ndarray::ArrayView1;

/// The label the model uses for "lights on".
const LIGHTS_ON: i64 = 1;

/// Decides whether the lights should be on for `reading`.
///
/// # Arguments
/// * `model` - A classifier trained on `(temperature, light, occupancy)`.
/// * `reading` - The live reading.
///
/// # Returns
/// `ON` when the model predicts `1`, `OFF` for any other label, stamped with the current
/// wall-clock time.
pub fn decide<C: Classifier + ?Sized>(model: &C, reading: &Reading) -> Decision {
    let features = reading.features();
    let lights = match model.predict(ArrayView1::from(&features[..])) {
        LIGHTS_ON => Lights::On,
        _ => Lights::Off,
    };

    info!("AI decision: turn {lights} lights");
    Decision::now(lights)
}
