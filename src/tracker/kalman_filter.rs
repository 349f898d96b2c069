//! Constant-velocity Kalman filter over center/size bounding box space.
//!
//! The state is `[cx, cy, w, h, vcx, vcy, vw, vh]`; the observation is the
//! first four components. Noise scales with the box size, so large and small
//! objects get comparable relative uncertainty.

use ndarray::{Array1, Array2};
use tracing::warn;

use crate::geometry::Rect;

const NDIM: usize = 4;

/// Transition and observation model shared by all tracks of a tracker.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let mut motion_mat = Array2::eye(2 * NDIM);
        for i in 0..NDIM {
            motion_mat[[i, NDIM + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((NDIM, 2 * NDIM));
        for i in 0..NDIM {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Start a new predictor at `bbox` with zero velocity.
    pub fn initiate(&self, bbox: &Rect) -> MotionPredictor {
        let measurement = measurement(bbox);
        let mut mean = Array1::zeros(2 * NDIM);
        for i in 0..NDIM {
            mean[i] = measurement[i];
        }

        let (w, h) = (measurement[2], measurement[3]);
        let pos = 2.0 * self.std_weight_position;
        let vel = 10.0 * self.std_weight_velocity;
        let std = [
            pos * w,
            pos * h,
            pos * w,
            pos * h,
            vel * w,
            vel * h,
            vel * w,
            vel * h,
        ];

        MotionPredictor {
            mean,
            covariance: diagonal(&std),
        }
    }

    fn process_noise(&self, mean: &Array1<f64>) -> Array2<f64> {
        let (w, h) = (mean[2], mean[3]);
        let pos = self.std_weight_position;
        let vel = self.std_weight_velocity;
        diagonal(&[
            pos * w,
            pos * h,
            pos * w,
            pos * h,
            vel * w,
            vel * h,
            vel * w,
            vel * h,
        ])
    }

    fn measurement_noise(&self, mean: &Array1<f64>) -> Array2<f64> {
        let (w, h) = (mean[2], mean[3]);
        let pos = self.std_weight_position;
        diagonal(&[pos * w, pos * h, pos * w, pos * h])
    }

    /// x' = F·x, P' = F·P·Fᵀ + Q
    fn predict(&self, state: &mut MotionPredictor) {
        let motion_cov = self.process_noise(&state.mean);
        state.mean = self.motion_mat.dot(&state.mean);
        state.covariance =
            self.motion_mat.dot(&state.covariance).dot(&self.motion_mat.t()) + motion_cov;
    }

    /// Project the state into measurement space: (H·x, H·P·Hᵀ + R).
    fn project(&self, state: &MotionPredictor) -> (Array1<f64>, Array2<f64>) {
        let innovation_cov = self.measurement_noise(&state.mean);
        let mean = self.update_mat.dot(&state.mean);
        let covariance =
            self.update_mat.dot(&state.covariance).dot(&self.update_mat.t()) + innovation_cov;
        (mean, covariance)
    }

    fn update(&self, state: &mut MotionPredictor, bbox: &Rect) {
        let (projected_mean, projected_cov) = self.project(state);
        let innovation = Array1::from_vec(measurement(bbox).to_vec()) - projected_mean;

        // K = P·Hᵀ·S⁻¹
        let Some(s_inv) = invert_4x4(&projected_cov) else {
            warn!("singular innovation covariance, keeping predicted state");
            return;
        };
        let pht = state.covariance.dot(&self.update_mat.t());
        let kalman_gain = pht.dot(&s_inv);

        state.mean = &state.mean + &kalman_gain.dot(&innovation);
        state.covariance =
            &state.covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());
    }
}

/// Per-track filter state. Each track owns exactly one.
#[derive(Debug, Clone)]
pub struct MotionPredictor {
    mean: Array1<f64>,
    covariance: Array2<f64>,
}

impl MotionPredictor {
    /// Advance one frame and return the predicted box.
    pub fn predict(&mut self, kf: &KalmanFilter) -> Rect {
        // A shrinking box must not collapse through zero.
        for i in 2..NDIM {
            if self.mean[i] + self.mean[NDIM + i] <= 0.0 {
                self.mean[NDIM + i] = 0.0;
            }
        }
        kf.predict(self);
        self.bbox()
    }

    /// Correct the state with an observed box.
    pub fn update(&mut self, kf: &KalmanFilter, bbox: &Rect) {
        kf.update(self, bbox);
    }

    /// Current state estimate as a box.
    pub fn bbox(&self) -> Rect {
        Rect::from_xywh(
            self.mean[0] as f32,
            self.mean[1] as f32,
            self.mean[2] as f32,
            self.mean[3] as f32,
        )
    }

    /// Estimated center velocity in pixels per frame.
    pub fn velocity(&self) -> (f32, f32) {
        (self.mean[4] as f32, self.mean[5] as f32)
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn covariance(&self) -> &Array2<f64> {
        &self.covariance
    }
}

fn measurement(bbox: &Rect) -> [f64; 4] {
    let [cx, cy, w, h] = bbox.to_xywh();
    [cx as f64, cy as f64, w as f64, h as f64]
}

fn diagonal(std: &[f64]) -> Array2<f64> {
    let mut m = Array2::zeros((std.len(), std.len()));
    for (i, s) in std.iter().enumerate() {
        m[[i, i]] = s * s;
    }
    m
}

/// Invert a 4x4 matrix using nalgebra (pure Rust).
fn invert_4x4(m: &Array2<f64>) -> Option<Array2<f64>> {
    let mut nm = nalgebra::Matrix4::zeros();
    for i in 0..4 {
        for j in 0..4 {
            nm[(i, j)] = m[[i, j]];
        }
    }
    let inv = nm.try_inverse()?;
    let mut res = Array2::zeros((4, 4));
    for i in 0..4 {
        for j in 0..4 {
            res[[i, j]] = inv[(i, j)];
        }
    }
    Some(res)
}
