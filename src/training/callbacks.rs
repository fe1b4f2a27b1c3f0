//! End-of-epoch policies over the validation loss
//!
//! Both policies watch the same metric but keep their own counters, so a
//! learning-rate reduction never delays early stopping and vice versa.

/// Multiply the learning rate by `factor` after `patience` epochs without
/// improvement
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    best_metric: f64,
    epochs_without_improvement: usize,
    current_lr: f64,
    factor: f64,
    patience: usize,
    min_delta: f64,
    min_lr: f64,
}

impl ReduceLrOnPlateau {
    pub fn new(initial_lr: f64, factor: f64, patience: usize, min_delta: f64, min_lr: f64) -> Self {
        Self {
            best_metric: f64::INFINITY,
            epochs_without_improvement: 0,
            current_lr: initial_lr,
            factor,
            patience,
            min_delta,
            min_lr,
        }
    }

    /// factor 0.1, patience 5, min_delta 1e-4, no floor
    pub fn with_defaults(initial_lr: f64) -> Self {
        Self::new(initial_lr, 0.1, 5, 1e-4, 0.0)
    }

    /// Feed one epoch's validation loss; returns the new rate when it was reduced
    pub fn step(&mut self, metric: f64) -> Option<f64> {
        if metric < self.best_metric - self.min_delta {
            self.best_metric = metric;
            self.epochs_without_improvement = 0;
            return None;
        }

        self.epochs_without_improvement += 1;
        if self.epochs_without_improvement >= self.patience {
            let new_lr = (self.current_lr * self.factor).max(self.min_lr);
            if new_lr < self.current_lr {
                self.current_lr = new_lr;
                self.epochs_without_improvement = 0;
                return Some(new_lr);
            }
        }

        None
    }

    pub fn lr(&self) -> f64 {
        self.current_lr
    }

    pub fn wait(&self) -> usize {
        self.epochs_without_improvement
    }
}

/// Stop after `patience` epochs without improvement, keeping a snapshot of the
/// state seen at the best metric
#[derive(Debug, Clone)]
pub struct EarlyStopping<S: Clone> {
    best_metric: f64,
    best_epoch: usize,
    epochs_without_improvement: usize,
    patience: usize,
    min_delta: f64,
    best_state: Option<S>,
    stopped_epoch: Option<usize>,
}

impl<S: Clone> EarlyStopping<S> {
    pub fn new(patience: usize, min_delta: f64) -> Self {
        Self {
            best_metric: f64::INFINITY,
            best_epoch: 0,
            epochs_without_improvement: 0,
            patience,
            min_delta,
            best_state: None,
            stopped_epoch: None,
        }
    }

    /// patience 8, min_delta 0
    pub fn with_defaults() -> Self {
        Self::new(8, 0.0)
    }

    /// Feed one epoch's validation loss and the state reached after it.
    /// Returns `true` when training should stop.
    pub fn on_epoch_end(&mut self, epoch: usize, metric: f64, state: &S) -> bool {
        // The first epoch is always kept so there is something to restore.
        if self.best_state.is_none() {
            self.best_state = Some(state.clone());
            self.best_epoch = epoch;
        }

        self.epochs_without_improvement += 1;
        if metric - self.min_delta < self.best_metric {
            self.best_metric = metric;
            self.best_epoch = epoch;
            self.best_state = Some(state.clone());
            self.epochs_without_improvement = 0;
            return false;
        }

        if self.epochs_without_improvement >= self.patience && epoch > 0 {
            self.stopped_epoch = Some(epoch);
            return true;
        }

        false
    }

    pub fn best_metric(&self) -> f64 {
        self.best_metric
    }

    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }

    pub fn stopped_epoch(&self) -> Option<usize> {
        self.stopped_epoch
    }

    pub fn wait(&self) -> usize {
        self.epochs_without_improvement
    }

    /// Take the snapshot captured at the best metric
    pub fn take_best_state(&mut self) -> Option<S> {
        self.best_state.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plateau_reduces_after_patience() {
        let mut plateau = ReduceLrOnPlateau::with_defaults(1e-2);

        assert_eq!(plateau.step(1.0), None);
        for _ in 0..4 {
            assert_eq!(plateau.step(1.0), None);
        }
        let reduced = plateau.step(1.0).unwrap();
        assert!((reduced - 1e-3).abs() < 1e-12);
        assert_eq!(plateau.wait(), 0);
    }

    #[test]
    fn test_plateau_min_delta() {
        let mut plateau = ReduceLrOnPlateau::with_defaults(1.0);
        plateau.step(1.0);

        // smaller than min_delta does not count as improvement
        for i in 1..=4 {
            assert_eq!(plateau.step(1.0 - 0.00001 * i as f64), None);
        }
        assert!(plateau.step(0.99995).is_some());
        assert_eq!(plateau.step(0.5), None);
        assert_eq!(plateau.wait(), 0);
    }

    #[test]
    fn test_plateau_respects_floor() {
        let mut plateau = ReduceLrOnPlateau::new(1e-3, 0.1, 1, 0.0, 1e-3);
        plateau.step(1.0);
        assert_eq!(plateau.step(2.0), None);
        assert_eq!(plateau.lr(), 1e-3);
    }

    #[test]
    fn test_early_stopping_restores_best() {
        let mut stopper = EarlyStopping::<usize>::with_defaults();
        let losses = [1.0, 0.8, 0.6, 0.7, 0.7, 0.8, 0.9, 0.9, 1.0, 1.1, 1.2];

        let mut stopped_at = None;
        for (epoch, loss) in losses.iter().enumerate() {
            // state is the 1-based epoch number
            if stopper.on_epoch_end(epoch, *loss, &(epoch + 1)) {
                stopped_at = Some(epoch + 1);
                break;
            }
        }

        assert_eq!(stopped_at, Some(11));
        assert_eq!(stopper.stopped_epoch(), Some(10));
        assert_eq!(stopper.best_epoch(), 2);
        assert_eq!(stopper.take_best_state(), Some(3));
    }

    #[test]
    fn test_nan_is_not_an_improvement() {
        let mut stopper = EarlyStopping::<u8>::new(2, 0.0);
        assert!(!stopper.on_epoch_end(0, 1.0, &0));
        assert!(!stopper.on_epoch_end(1, f64::NAN, &1));
        assert!(stopper.on_epoch_end(2, f64::NAN, &2));
        assert_eq!(stopper.take_best_state(), Some(0));
    }

    #[test]
    fn test_counters_are_independent() {
        let mut plateau = ReduceLrOnPlateau::with_defaults(1e-2);
        let mut stopper = EarlyStopping::<()>::with_defaults();

        let mut reductions = Vec::new();
        let mut stop = None;
        for epoch in 0..20 {
            let loss = if epoch == 0 { 1.0 } else { 2.0 };
            if plateau.step(loss).is_some() {
                reductions.push(epoch + 1);
            }
            if stopper.on_epoch_end(epoch, loss, &()) {
                stop = Some(epoch + 1);
                break;
            }
        }

        // reduction after 5 bad epochs (epoch 6) and stop after 8 (epoch 9)
        assert_eq!(reductions, vec![6]);
        assert_eq!(stop, Some(9));
    }
}
